//! src/utils.rs
//! Name normalization, query escaping, id and timestamp helpers

use std::sync::{LazyLock, Mutex};

use chrono::{DateTime, NaiveDate, NaiveDateTime, TimeZone, Utc};
use uuid::Uuid;
use uuid::timestamp::{Timestamp, context::ContextV7};

/// Characters that carry meaning in Lucene query syntax
const LUCENE_SPECIAL: &[char] = &[
    '+', '-', '&', '|', '!', '(', ')', '{', '}', '[', ']', '^', '"', '~', '*', '?', ':', '\\', '/',
];

/// Shared v7 context so ids minted in the same millisecond stay ordered
static V7_CONTEXT: LazyLock<Mutex<ContextV7>> = LazyLock::new(|| Mutex::new(ContextV7::new()));

/// Generate a time-ordered UUID v7.
///
/// Lexicographic order of the string form follows creation order.
pub fn generate_id() -> Uuid {
    Uuid::new_v7(Timestamp::now(&*V7_CONTEXT))
}

/// Current UTC time as ISO-8601 with millisecond precision.
pub fn now_iso8601() -> String {
    Utc::now().format("%Y-%m-%dT%H:%M:%S%.3fZ").to_string()
}

/// Check that a string parses as an ISO-8601 date or datetime with valid
/// calendar components. `2026-13-45` is rejected by the parser.
pub fn is_valid_timestamp(s: &str) -> bool {
    parse_timestamp(s).is_some()
}

/// Parse an ISO-8601 timestamp, accepting a full RFC-3339 datetime, a naive
/// datetime, or a bare date (midnight UTC).
pub fn parse_timestamp(s: &str) -> Option<DateTime<Utc>> {
    if let Ok(dt) = DateTime::parse_from_rfc3339(s) {
        return Some(dt.with_timezone(&Utc));
    }
    if let Ok(naive) = NaiveDateTime::parse_from_str(s, "%Y-%m-%dT%H:%M:%S%.f") {
        return Some(Utc.from_utc_datetime(&naive));
    }
    if let Ok(date) = NaiveDate::parse_from_str(s, "%Y-%m-%d") {
        return Some(Utc.from_utc_datetime(&date.and_hms_opt(0, 0, 0)?));
    }
    None
}

/// Normalize an entity name to Title Case while preserving brand casing and
/// acronyms.
///
/// Tokens are split on spaces (runs of spaces survive) and hyphens. A token
/// that mixes lowercase with uppercase (`TypeScript`, `iPhone`, `Neo4j`) is
/// kept verbatim; an all-uppercase token of length >= 2 with optional digits
/// (`AWS`, `GPT4`) is kept as an acronym; anything else gets its first
/// alphabetic character uppercased.
///
/// Idempotent: normalizing an already-normalized name is a no-op.
pub fn normalize_entity_name(name: &str) -> String {
    name.split(' ')
        .map(normalize_token)
        .collect::<Vec<_>>()
        .join(" ")
}

fn normalize_token(token: &str) -> String {
    token
        .split('-')
        .map(normalize_word)
        .collect::<Vec<_>>()
        .join("-")
}

fn normalize_word(word: &str) -> String {
    let has_lower = word.chars().any(|c| c.is_lowercase());
    let has_upper = word.chars().any(|c| c.is_uppercase());

    // Mixed/brand case: keep verbatim
    if has_lower && has_upper {
        return word.to_string();
    }

    // Acronym: all uppercase letters with optional digits, length >= 2
    if word.len() >= 2
        && has_upper
        && word.chars().all(|c| c.is_uppercase() || c.is_ascii_digit())
    {
        return word.to_string();
    }

    // Title-case the first alphabetic character, leave the rest untouched
    let mut out = String::with_capacity(word.len());
    let mut capitalized = false;
    for ch in word.chars() {
        if !capitalized && ch.is_alphabetic() {
            out.extend(ch.to_uppercase());
            capitalized = true;
        } else {
            out.push(ch);
        }
    }
    out
}

/// Escape Lucene query syntax by prefixing each special character with a
/// backslash. Only the characters in [`LUCENE_SPECIAL`] are touched.
pub fn sanitize_lucene(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    for ch in s.chars() {
        if LUCENE_SPECIAL.contains(&ch) {
            out.push('\\');
        }
        out.push(ch);
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_normalize_title_cases_plain_words() {
        assert_eq!(normalize_entity_name("rust"), "Rust");
        assert_eq!(
            normalize_entity_name("test-driven development"),
            "Test-Driven Development"
        );
    }

    #[test]
    fn test_normalize_preserves_brand_case() {
        assert_eq!(normalize_entity_name("TypeScript"), "TypeScript");
        assert_eq!(normalize_entity_name("iPhone"), "iPhone");
        assert_eq!(normalize_entity_name("Neo4j"), "Neo4j");
    }

    #[test]
    fn test_normalize_preserves_acronyms() {
        assert_eq!(normalize_entity_name("AWS"), "AWS");
        assert_eq!(normalize_entity_name("GPT-4"), "GPT-4");
        assert_eq!(normalize_entity_name("GPT4"), "GPT4");
    }

    #[test]
    fn test_normalize_preserves_consecutive_spaces() {
        assert_eq!(normalize_entity_name("foo  bar"), "Foo  Bar");
    }

    #[test]
    fn test_normalize_is_idempotent() {
        for input in [
            "test-driven development",
            "iPhone",
            "AWS",
            "GPT-4",
            "a",
            "4x engine",
            "",
        ] {
            let once = normalize_entity_name(input);
            assert_eq!(normalize_entity_name(&once), once, "input: {input:?}");
        }
    }

    #[test]
    fn test_sanitize_lucene_escapes_special_set() {
        assert_eq!(
            sanitize_lucene("C++ programming (advanced)"),
            r"C\+\+ programming \(advanced\)"
        );
        assert_eq!(sanitize_lucene(""), "");
        // Each special character gains exactly one backslash
        for ch in LUCENE_SPECIAL {
            let escaped = sanitize_lucene(&ch.to_string());
            assert_eq!(escaped, format!("\\{ch}"));
        }
    }

    #[test]
    fn test_sanitize_lucene_leaves_other_chars() {
        assert_eq!(sanitize_lucene("hello world 123"), "hello world 123");
    }

    #[test]
    fn test_generate_id_is_v7_and_unique() {
        let ids: Vec<Uuid> = (0..1000).map(|_| generate_id()).collect();

        for id in &ids {
            assert_eq!(id.get_version_num(), 7);
        }

        let distinct: std::collections::HashSet<String> =
            ids.iter().map(|id| id.to_string()).collect();
        assert_eq!(distinct.len(), 1000);

        let strings: Vec<String> = ids.iter().map(|id| id.to_string()).collect();
        let mut sorted = strings.clone();
        sorted.sort();
        assert_eq!(strings, sorted, "v7 ids must sort by creation order");
    }

    #[test]
    fn test_now_iso8601_shape() {
        let now = now_iso8601();
        assert!(now.ends_with('Z'));
        assert!(is_valid_timestamp(&now));
    }

    #[test]
    fn test_is_valid_timestamp() {
        assert!(is_valid_timestamp("2026-01-15T10:30:00.000Z"));
        assert!(is_valid_timestamp("2026-01-15T10:30:00"));
        assert!(is_valid_timestamp("2026-01-15"));

        assert!(!is_valid_timestamp("2026-13-45"));
        assert!(!is_valid_timestamp("not-a-date"));
        assert!(!is_valid_timestamp(""));
        assert!(!is_valid_timestamp("2026-02-30"));
    }
}
