//! Layered YAML loads to a stable canonical hash.

use tna_config::load_layered_yaml_from_strings;

const BASE_YAML: &str = r#"
refresh:
  interval_secs: 60
  backoff_secs: 10
sources:
  prematch:
    sport_id: 13
    keys_env:
      api_token: "BETSAPI_TOKEN"
  inplay:
    api_host: "tennis-live-data.p.rapidapi.com"
"#;

const BASE_YAML_REORDERED: &str = r#"
sources:
  inplay:
    api_host: "tennis-live-data.p.rapidapi.com"
  prematch:
    keys_env:
      api_token: "BETSAPI_TOKEN"
    sport_id: 13
refresh:
  backoff_secs: 10
  interval_secs: 60
"#;

const OVERLAY_YAML: &str = r#"
refresh:
  interval_secs: 15
"#;

#[test]
fn same_input_produces_identical_hash() {
    let a = load_layered_yaml_from_strings(&[BASE_YAML]).unwrap();
    let b = load_layered_yaml_from_strings(&[BASE_YAML]).unwrap();
    assert_eq!(a.config_hash, b.config_hash);
    assert_eq!(a.canonical_json, b.canonical_json);
    assert_eq!(a.config_hash.len(), 64);
}

#[test]
fn reordered_keys_produce_same_hash() {
    let a = load_layered_yaml_from_strings(&[BASE_YAML]).unwrap();
    let b = load_layered_yaml_from_strings(&[BASE_YAML_REORDERED]).unwrap();
    assert_eq!(a.config_hash, b.config_hash);
}

#[test]
fn overlay_changes_value_and_hash() {
    let base = load_layered_yaml_from_strings(&[BASE_YAML]).unwrap();
    let merged = load_layered_yaml_from_strings(&[BASE_YAML, OVERLAY_YAML]).unwrap();

    assert_ne!(base.config_hash, merged.config_hash);
    assert_eq!(
        merged.config_json.pointer("/refresh/interval_secs").and_then(|v| v.as_u64()),
        Some(15)
    );
    // Sibling keys from the base layer survive the overlay.
    assert_eq!(
        merged.config_json.pointer("/refresh/backoff_secs").and_then(|v| v.as_u64()),
        Some(10)
    );
}

#[test]
fn empty_layer_is_ignored() {
    let a = load_layered_yaml_from_strings(&[BASE_YAML]).unwrap();
    let b = load_layered_yaml_from_strings(&[BASE_YAML, ""]).unwrap();
    assert_eq!(a.config_hash, b.config_hash);
}

#[test]
fn invalid_yaml_is_an_error() {
    let err = load_layered_yaml_from_strings(&["refresh: [unterminated"]).unwrap_err();
    assert!(err.to_string().contains("invalid yaml"));
}
