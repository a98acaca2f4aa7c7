//! The query analyzer: query cells never define names; their refs are the
//! set of identifiers inside `{{ ... }}` placeholders.

use std::collections::BTreeSet;
use std::sync::LazyLock;

use regex::Regex;

static PLACEHOLDER: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\{\{\s*([A-Za-z_][A-Za-z0-9_]*)\s*\}\}").unwrap());

/// Returns `(defs, refs)` for a query cell body. `defs` is always empty.
pub fn analyze(code: &str) -> (BTreeSet<String>, BTreeSet<String>) {
    let refs = PLACEHOLDER
        .captures_iter(code)
        .map(|c| c[1].to_string())
        .collect();
    (BTreeSet::new(), refs)
}

/// Placeholder names in the order they appear, including duplicates — used by
/// the query executor to interpolate each occurrence in source order.
pub fn placeholders_in_order(code: &str) -> Vec<String> {
    PLACEHOLDER.captures_iter(code).map(|c| c[1].to_string()).collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn extracts_placeholder_names() {
        let (defs, refs) = analyze("SELECT * FROM users WHERE id = {{ user_id }}");
        assert!(defs.is_empty());
        assert!(refs.contains("user_id"));
    }

    #[test]
    fn tolerates_no_whitespace() {
        let (_, refs) = analyze("SELECT {{x}}, {{y}}");
        assert!(refs.contains("x"));
        assert!(refs.contains("y"));
    }

    #[test]
    fn placeholders_in_order_preserves_duplicates() {
        let order = placeholders_in_order("{{a}} AND {{b}} OR {{a}}");
        assert_eq!(order, vec!["a".to_string(), "b".to_string(), "a".to_string()]);
    }
}
