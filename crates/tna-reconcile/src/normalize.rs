//! Participant-name and start-time normalization.
//!
//! # Rules
//!
//! - Case-fold, then fold Latin diacritics to their base letter (`đ` → `d`).
//! - Hyphens and apostrophes join (`"Auger-Aliassime"` → `"augeraliassime"`),
//!   every other non-alphanumeric character separates tokens.
//! - A player reduces to `"<surname> <first initial>"`, so `"Alice Smith"`,
//!   `"A. Smith"`, `"Smith A."` and `"Smith, Alice"` all normalize to
//!   `"smith a"`.
//! - A doubles team (`"Smith/Jones"`) normalizes each member and joins the
//!   member keys sorted with `/`.
//! - The participant set of a match is sorted, so feed order never matters.

use chrono::{DateTime, FixedOffset, Utc};

/// Fold a lower-case Latin letter with a diacritic to its base letter.
fn fold_char(c: char) -> char {
    match c {
        'à' | 'á' | 'â' | 'ã' | 'ä' | 'å' | 'ā' | 'ă' | 'ą' => 'a',
        'ç' | 'ć' | 'č' | 'ĉ' => 'c',
        'ď' | 'đ' => 'd',
        'è' | 'é' | 'ê' | 'ë' | 'ē' | 'ė' | 'ę' | 'ě' => 'e',
        'ğ' | 'ģ' => 'g',
        'ì' | 'í' | 'î' | 'ï' | 'ī' | 'į' | 'ı' => 'i',
        'ķ' => 'k',
        'ł' | 'ľ' | 'ĺ' | 'ļ' => 'l',
        'ñ' | 'ń' | 'ň' | 'ņ' => 'n',
        'ò' | 'ó' | 'ô' | 'õ' | 'ö' | 'ø' | 'ō' | 'ő' => 'o',
        'ŕ' | 'ř' => 'r',
        'ś' | 'š' | 'ş' | 'ș' => 's',
        'ť' | 'ţ' | 'ț' => 't',
        'ù' | 'ú' | 'û' | 'ü' | 'ū' | 'ů' | 'ű' | 'ų' => 'u',
        'ý' | 'ÿ' => 'y',
        'ź' | 'ż' | 'ž' => 'z',
        other => other,
    }
}

/// Case-fold and strip diacritics.
pub fn fold_text(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    for c in s.chars().flat_map(char::to_lowercase) {
        match c {
            'ß' => out.push_str("ss"),
            'æ' => out.push_str("ae"),
            'œ' => out.push_str("oe"),
            c => out.push(fold_char(c)),
        }
    }
    out
}

fn tokens(s: &str) -> Vec<String> {
    let folded = fold_text(s);
    let mut out = Vec::new();
    let mut cur = String::new();
    for c in folded.chars() {
        if c.is_alphanumeric() {
            cur.push(c);
        } else if matches!(c, '-' | '\'' | '’') {
            // joiners: keep building the current token
        } else if !cur.is_empty() {
            out.push(std::mem::take(&mut cur));
        }
    }
    if !cur.is_empty() {
        out.push(cur);
    }
    out
}

/// Normalize one player name to `"<surname> <initial>"`.
///
/// Returns `None` for a name with no usable characters.
pub fn player_key(name: &str) -> Option<String> {
    // "Smith, Alice": explicit surname-first form.
    if let Some((surname, given)) = name.split_once(',') {
        let surname = tokens(surname).pop();
        let initial = tokens(given).first().and_then(|t| t.chars().next());
        if let (Some(surname), Some(initial)) = (surname, initial) {
            return Some(format!("{surname} {initial}"));
        }
    }

    let toks = tokens(name);
    let first = toks.first()?;
    if toks.len() == 1 {
        return Some(first.clone());
    }

    let is_initial = |t: &String| t.chars().count() == 1;

    // "Smith A." / "Del Potro J. M.": surname first, initials trailing.
    let trailing = toks.iter().rev().take_while(|t| is_initial(t)).count();
    if trailing > 0 && trailing < toks.len() && !is_initial(first) {
        let surname = &toks[toks.len() - trailing - 1];
        let initial = &toks[toks.len() - trailing];
        return Some(format!("{surname} {initial}"));
    }

    // "Alice Smith" / "A. Smith" / "J. M. Del Potro": given name(s) first.
    let surname = toks.last()?;
    let initial = first.chars().next()?;
    Some(format!("{surname} {initial}"))
}

/// Normalize a participant entry: a single player or a `/`-separated team.
pub fn participant_key(name: &str) -> Option<String> {
    let mut members: Vec<String> = name.split('/').filter_map(player_key).collect();
    if members.is_empty() {
        return None;
    }
    members.sort();
    Some(members.join("/"))
}

/// Normalized, order-independent participant set.
///
/// Returns `None` unless at least two participants survive normalization.
pub fn participant_set(names: &[String]) -> Option<Vec<String>> {
    let mut keys: Vec<String> = names.iter().filter_map(|n| participant_key(n)).collect();
    if keys.len() < 2 {
        return None;
    }
    keys.sort();
    Some(keys)
}

/// Canonical time zone for all comparisons.
pub fn canonical_time(t: &DateTime<FixedOffset>) -> DateTime<Utc> {
    t.with_timezone(&Utc)
}
