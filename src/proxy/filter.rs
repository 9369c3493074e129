// src/proxy/filter.rs
// Skip-pattern filter: requests matching a configured pattern bypass
// retrieval entirely and are forwarded untouched.
//
// Matching is isolated here so a regex variant can replace it without
// touching callers.

/// Case-insensitive substring match against the configured pattern list.
pub fn should_skip(text: &str, patterns: &[String]) -> bool {
    if patterns.is_empty() {
        return false;
    }
    let haystack = text.to_lowercase();
    patterns
        .iter()
        .any(|p| !p.is_empty() && haystack.contains(&p.to_lowercase()))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn patterns(items: &[&str]) -> Vec<String> {
        items.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn test_substring_match_is_case_insensitive() {
        let ps = patterns(&["do not remember"]);
        assert!(should_skip("Please DO NOT remember this", &ps));
        assert!(should_skip("do not remember", &ps));
        assert!(!should_skip("please remember this", &ps));
    }

    #[test]
    fn test_empty_patterns_never_skip() {
        assert!(!should_skip("anything", &[]));
        assert!(!should_skip("anything", &patterns(&[""])));
    }
}
