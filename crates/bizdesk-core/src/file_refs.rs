//! File reference tokens
//!
//! A document marks an attachment as used by embedding `files:<uuid>` in any
//! string value of its JSON body (for example `"logo": "files:0d4c..."` or a
//! markdown link inside a note). The scanner walks every string leaf of the
//! document; object keys are never scanned.

use std::collections::BTreeSet;
use std::sync::OnceLock;

use regex::Regex;
use serde_json::Value;
use uuid::Uuid;

use crate::constants::FILE_TOKEN_PREFIX;

fn token_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(
            r"(?i)files:([0-9a-f]{8}-[0-9a-f]{4}-[0-9a-f]{4}-[0-9a-f]{4}-[0-9a-f]{12})",
        )
        .expect("file token regex is valid")
    })
}

/// Build the token that references `id`.
pub fn file_token(id: Uuid) -> String {
    format!("{}{}", FILE_TOKEN_PREFIX, id)
}

/// Collect every file id referenced anywhere inside `value`.
pub fn extract_file_ids(value: &Value) -> BTreeSet<Uuid> {
    let mut ids = BTreeSet::new();
    collect(value, &mut ids);
    ids
}

fn collect(value: &Value, ids: &mut BTreeSet<Uuid>) {
    match value {
        Value::String(s) => scan_str(s, ids),
        Value::Array(items) => items.iter().for_each(|item| collect(item, ids)),
        Value::Object(map) => map.values().for_each(|v| collect(v, ids)),
        Value::Null | Value::Bool(_) | Value::Number(_) => {}
    }
}

fn scan_str(s: &str, ids: &mut BTreeSet<Uuid>) {
    if !s.contains(':') {
        return;
    }
    for caps in token_regex().captures_iter(s) {
        if let Some(id) = caps.get(1).and_then(|m| Uuid::parse_str(m.as_str()).ok()) {
            ids.insert(id);
        }
    }
}

/// Compare the references of two document versions.
///
/// Returns `(added, removed)`; ids present in both are in neither set.
pub fn diff_file_ids(
    before: Option<&Value>,
    after: Option<&Value>,
) -> (BTreeSet<Uuid>, BTreeSet<Uuid>) {
    let before = before.map(extract_file_ids).unwrap_or_default();
    let after = after.map(extract_file_ids).unwrap_or_default();

    let added = after.difference(&before).copied().collect();
    let removed = before.difference(&after).copied().collect();
    (added, removed)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    const A: &str = "0d4c6a1e-8f1b-4a53-9b7e-1f2a3b4c5d6e";
    const B: &str = "7e2f9b3a-1c4d-4e5f-8a6b-9c0d1e2f3a4b";

    fn id(s: &str) -> Uuid {
        Uuid::parse_str(s).unwrap()
    }

    #[test]
    fn finds_tokens_in_nested_values() {
        let doc = json!({
            "logo": format!("files:{A}"),
            "lines": [
                { "attachment": format!("see files:{B} and files:{A}") },
                { "qty": 3 }
            ],
            "note": null
        });

        let ids = extract_file_ids(&doc);
        assert_eq!(ids.len(), 2);
        assert!(ids.contains(&id(A)));
        assert!(ids.contains(&id(B)));
    }

    #[test]
    fn ignores_object_keys_and_malformed_tokens() {
        let doc = json!({
            format!("files:{A}"): "value",
            "bad": "files:not-a-uuid",
            "short": "files:0d4c6a1e-8f1b-4a53-9b7e",
        });
        assert!(extract_file_ids(&doc).is_empty());
    }

    #[test]
    fn token_match_is_case_insensitive() {
        let doc = json!({ "logo": format!("FILES:{}", A.to_uppercase()) });
        assert_eq!(extract_file_ids(&doc).into_iter().collect::<Vec<_>>(), vec![id(A)]);
    }

    #[test]
    fn file_token_round_trips_through_scanner() {
        let doc = json!(file_token(id(B)));
        assert!(extract_file_ids(&doc).contains(&id(B)));
    }

    #[test]
    fn diff_reports_added_and_removed() {
        let before = json!({ "a": format!("files:{A}") });
        let after = json!({ "b": format!("files:{B}") });

        let (added, removed) = diff_file_ids(Some(&before), Some(&after));
        assert_eq!(added.into_iter().collect::<Vec<_>>(), vec![id(B)]);
        assert_eq!(removed.into_iter().collect::<Vec<_>>(), vec![id(A)]);

        let (added, removed) = diff_file_ids(Some(&before), Some(&before));
        assert!(added.is_empty() && removed.is_empty());

        let (added, removed) = diff_file_ids(None, Some(&before));
        assert_eq!(added.len(), 1);
        assert!(removed.is_empty());
    }
}
