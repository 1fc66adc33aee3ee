//! tna-daemon entry point.
//!
//! Thin on purpose: load config and secrets, build the adapters, start the
//! refresh loop and serve HTTP until Ctrl-C. Handlers live in `routes.rs`,
//! shared state in `state.rs`, the loop in `refresh.rs`.

use std::{net::SocketAddr, sync::Arc, time::Duration};

use anyhow::Context;
use clap::Parser;
use tna_config::{
    load_layered_yaml, report_unused_keys, resolve_source_secrets, AggregatorConfig,
    SecretsPolicy, UnusedKeyPolicy,
};
use tna_daemon::{
    refresh::{spawn_refresh_loop, LoopSettings, RefreshLoop},
    routes, state,
};
use tna_sources::{InplayHttpSource, PrematchHttpSource};
use tower_http::trace::{DefaultMakeSpan, DefaultOnResponse, TraceLayer};
use tracing::{info, warn, Level};

#[derive(Parser)]
#[command(name = "tna-daemon")]
#[command(about = "Tennis odds aggregator daemon", long_about = None)]
struct Args {
    /// Layered config paths in merge order (later files override earlier).
    /// Without any, built-in defaults are used.
    #[arg(long = "config")]
    config_paths: Vec<String>,

    /// Listen address; overrides TNA_DAEMON_ADDR and daemon.addr.
    #[arg(long)]
    addr: Option<SocketAddr>,

    /// Refuse to start when the config has keys nothing reads.
    #[arg(long, default_value_t = false)]
    strict_config: bool,

    /// Refuse to start unless every feed credential is set.
    #[arg(long, default_value_t = false)]
    require_secrets: bool,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Silent if the file does not exist; production injects env vars directly.
    let _ = dotenvy::from_filename(".env.local");

    init_tracing();
    let args = Args::parse();

    let paths: Vec<&str> = args.config_paths.iter().map(String::as_str).collect();
    let loaded = load_layered_yaml(&paths).context("config load failed")?;

    let unused_policy = if args.strict_config {
        UnusedKeyPolicy::Fail
    } else {
        UnusedKeyPolicy::Warn
    };
    let unused = report_unused_keys(&loaded.config_json, unused_policy)?;
    for key in &unused.unused_leaf_pointers {
        warn!(key = %key, "config key is not read by tna-daemon");
    }

    let cfg = AggregatorConfig::from_json(&loaded.config_json)?;
    info!(config_hash = %loaded.config_hash, layers = paths.len(), "config loaded");

    let secrets_policy = if args.require_secrets {
        SecretsPolicy::RequireAll
    } else {
        SecretsPolicy::AllowPartial
    };
    let secrets = resolve_source_secrets(&cfg, secrets_policy)?;
    for feed in secrets.missing_feeds() {
        warn!(feed, "no credential configured; feed will report unavailable every cycle");
    }

    let settings = LoopSettings::from_config(&cfg);
    let http = reqwest::Client::builder()
        .timeout(settings.fetch_timeout)
        .build()
        .context("http client build failed")?;

    let pre_cfg = &cfg.sources.prematch;
    let prematch = PrematchHttpSource::new_with_base_url(
        secrets.prematch_api_token.clone().unwrap_or_default(),
        pre_cfg.base_url.clone(),
    )
    .with_sport_id(pre_cfg.sport_id)
    .with_max_pages(pre_cfg.max_pages)
    .with_http_client(http.clone());

    let inp_cfg = &cfg.sources.inplay;
    let inplay = InplayHttpSource::new_with_base_url(
        secrets.inplay_api_key.clone().unwrap_or_default(),
        inp_cfg.api_host.clone(),
        inp_cfg.base_url.clone(),
    )
    .with_http_client(http);

    let shared = Arc::new(state::AppState::new().with_config_hash(loaded.config_hash.clone()));
    state::spawn_heartbeat(shared.bus.clone(), Duration::from_secs(1));

    let (shutdown_tx, shutdown_rx) = tokio::sync::watch::channel(false);
    let refresh = RefreshLoop::new(
        Arc::new(prematch),
        Arc::new(inplay),
        settings,
        Arc::clone(&shared),
    );
    let refresh_handle = spawn_refresh_loop(refresh, shutdown_rx);

    info!(origins = ?cfg.daemon.cors_origins, "cors");
    let app = routes::build_router(Arc::clone(&shared))
        .layer(
            TraceLayer::new_for_http()
                .make_span_with(DefaultMakeSpan::new().level(Level::INFO))
                .on_response(DefaultOnResponse::new().level(Level::INFO)),
        )
        .layer(routes::cors_layer(&cfg.daemon));

    let addr = match args.addr.or_else(bind_addr_from_env) {
        Some(a) => a,
        None => cfg.daemon.socket_addr()?,
    };
    info!("tna-daemon listening on http://{}", addr);

    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .with_context(|| format!("bind failed: {addr}"))?;

    axum::serve(listener, app)
        .with_graceful_shutdown(async move {
            let _ = tokio::signal::ctrl_c().await;
            info!("shutdown requested");
            let _ = shutdown_tx.send(true);
        })
        .await
        .context("server crashed")?;

    refresh_handle.await.context("refresh loop task failed")?;
    Ok(())
}

fn init_tracing() {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| "info".into()),
        )
        .init();
}

fn bind_addr_from_env() -> Option<SocketAddr> {
    std::env::var("TNA_DAEMON_ADDR").ok()?.parse().ok()
}
