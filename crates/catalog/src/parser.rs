//! Metadata block parser for capability documents.
//!
//! Document format:
//! ```markdown
//! ---
//! name: review-pr
//! description: Review a pull request end to end
//! frameworks: [rails, react]
//! ---
//!
//! # Review
//! ...
//! ```
//!
//! The block is only recognised when the very first line is `---`; it ends at the
//! next line that is exactly `---`. Its content is YAML restricted to a flat mapping.

use crate::types::{Metadata, MetadataValue};
use capforge_core::{Error, Result};

/// Opening and closing line of a metadata block
pub const DELIMITER: &str = "---";

/// A located metadata block
struct Block<'a> {
    content: &'a str,
    body: &'a str,
}

/// Locate the leading block. `Ok(None)` when the text does not open one.
fn split_block(text: &str) -> Result<Option<Block<'_>>> {
    let text = text.strip_prefix('\u{feff}').unwrap_or(text);
    let mut lines = text.split_inclusive('\n');

    let Some(first) = lines.next() else {
        return Ok(None);
    };
    if first.trim_end() != DELIMITER {
        return Ok(None);
    }

    let content_start = first.len();
    let mut offset = content_start;
    for line in lines {
        if line.trim_end() == DELIMITER {
            return Ok(Some(Block { content: &text[content_start..offset], body: &text[offset + line.len()..] }));
        }
        offset += line.len();
    }

    Err(Error::config_at("metadata block opened on line 1 is never closed", 1, Some(1)))
}

/// Parse the leading metadata block and return it with the body.
///
/// Text without a block yields empty metadata and the whole text as body.
pub fn parse_strict(text: &str) -> Result<(Metadata, String)> {
    match split_block(text)? {
        Some(block) => Ok((parse_block(block.content)?, block.body.to_string())),
        None => Ok((Metadata::new(), text.to_string())),
    }
}

/// Like [`parse_strict`] but never fails: problems are logged and yield empty metadata.
pub fn parse_tolerant(text: &str) -> Metadata {
    match parse_strict(text) {
        Ok((metadata, _)) => metadata,
        Err(e) => {
            tracing::warn!(error = %e, "ignoring malformed metadata block");
            Metadata::new()
        }
    }
}

/// Remove the leading metadata block; no-op when there is none or it is unclosed.
pub fn strip_metadata(text: &str) -> &str {
    match split_block(text) {
        Ok(Some(block)) => block.body,
        _ => text,
    }
}

/// Outcome of [`validate_required_fields`]
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FieldValidation {
    pub valid: bool,
    pub missing: Vec<String>,
}

/// Check that every `required` key is present with a non-empty value.
pub fn validate_required_fields(metadata: &Metadata, required: &[&str]) -> FieldValidation {
    let missing: Vec<String> = required
        .iter()
        .filter(|key| metadata.get(**key).is_none_or(MetadataValue::is_empty))
        .map(|key| key.to_string())
        .collect();

    FieldValidation { valid: missing.is_empty(), missing }
}

/// Block content starts on line 2 of the document.
const BLOCK_LINE_OFFSET: usize = 1;

fn parse_block(content: &str) -> Result<Metadata> {
    if content.trim().is_empty() {
        return Ok(Metadata::new());
    }

    let value: serde_yml::Value = serde_yml::from_str(content).map_err(|e| {
        if let Some((key, line)) = duplicate_key(&e.to_string(), content) {
            return Error::config_at(
                format!("invalid metadata: duplicate entry with key \"{key}\""),
                line + BLOCK_LINE_OFFSET,
                None,
            );
        }
        match e.location() {
            Some(loc) => {
                Error::config_at(format!("invalid metadata: {e}"), loc.line() + BLOCK_LINE_OFFSET, Some(loc.column()))
            }
            None => Error::config(format!("invalid metadata: {e}")),
        }
    })?;

    let serde_yml::Value::Mapping(mapping) = value else {
        return Err(Error::config_at(
            "metadata block must contain `key: value` lines",
            1 + BLOCK_LINE_OFFSET,
            None,
        ));
    };

    let mut metadata = Metadata::new();
    for (key, value) in mapping {
        let key = scalar_to_string(&key)
            .filter(|k| !k.trim().is_empty())
            .ok_or_else(|| Error::config(format!("metadata keys must be plain scalars, found {key:?}")))?;
        metadata.insert(key, convert_value(value));
    }

    Ok(metadata)
}

/// The repeated key and the block line of its second top-level occurrence.
///
/// serde_yml locates duplicate keys at the start of the mapping, not at the repeat.
fn duplicate_key(message: &str, content: &str) -> Option<(String, usize)> {
    let rest = message.split_once("duplicate entry with key \"")?.1;
    let key = rest.split_once('"')?.0.to_string();
    let line = content
        .lines()
        .enumerate()
        .filter(|(_, line)| line.strip_prefix(key.as_str()).is_some_and(|after| after.trim_start().starts_with(':')))
        .nth(1)
        .map(|(index, _)| index + 1)?;
    Some((key, line))
}

fn scalar_to_string(value: &serde_yml::Value) -> Option<String> {
    match value {
        serde_yml::Value::String(s) => Some(s.clone()),
        serde_yml::Value::Number(n) => Some(n.to_string()),
        serde_yml::Value::Bool(b) => Some(b.to_string()),
        serde_yml::Value::Null => Some(String::new()),
        _ => None,
    }
}

/// Scalars become text, sequences become lists; nested structures keep a compact JSON rendering.
fn convert_value(value: serde_yml::Value) -> MetadataValue {
    if let Some(text) = scalar_to_string(&value) {
        return MetadataValue::Text(text);
    }

    match value {
        serde_yml::Value::Sequence(items) => MetadataValue::List(
            items
                .iter()
                .map(|item| scalar_to_string(item).unwrap_or_else(|| compact_json(item)))
                .collect(),
        ),
        other => MetadataValue::Text(compact_json(&other)),
    }
}

fn compact_json(value: &serde_yml::Value) -> String {
    serde_json::to_string(value).unwrap_or_default()
}

#[cfg(test)]
mod tests {
    use super::*;
    use capforge_core::ErrorCode;

    #[test]
    fn test_parse_strict_valid() {
        let content = r#"---
name: plan
description: "Plan a feature"
frameworks: [rails, react]
---

# Plan

Body text.
"#;
        let (meta, body) = parse_strict(content).unwrap();
        assert_eq!(meta.get("name"), Some(&MetadataValue::Text("plan".into())));
        assert_eq!(meta.get("description"), Some(&MetadataValue::Text("Plan a feature".into())));
        assert_eq!(meta.get("frameworks"), Some(&MetadataValue::List(vec!["rails".into(), "react".into()])));
        assert_eq!(body, "\n# Plan\n\nBody text.\n");
    }

    #[test]
    fn test_parse_strict_without_block() {
        let content = "# Just a body\n\nNo metadata here.\n";
        let (meta, body) = parse_strict(content).unwrap();
        assert!(meta.is_empty());
        assert_eq!(body, content);
    }

    #[test]
    fn test_block_must_start_at_first_line() {
        let content = "\n---\nname: late\n---\nbody";
        let (meta, body) = parse_strict(content).unwrap();
        assert!(meta.is_empty());
        assert_eq!(body, content);
    }

    #[test]
    fn test_parse_strict_unclosed_block() {
        let err = parse_strict("---\nname: broken\n\n# Body\n").unwrap_err();
        assert_eq!(err.code(), ErrorCode::Config);
        assert_eq!(err.context().get("line").map(String::as_str), Some("1"));
        assert!(err.to_string().contains("never closed"));
    }

    #[test]
    fn test_parse_strict_malformed_yaml_reports_line() {
        let err = parse_strict("---\nname: ok\ndescription: [unterminated\n---\nbody").unwrap_err();
        assert_eq!(err.code(), ErrorCode::Config);
        let line: usize = err.context().get("line").unwrap().parse().unwrap();
        assert!(line >= 2);
    }

    #[test]
    fn test_duplicate_key_reports_the_repeat() {
        let err = parse_strict("---\nname: ok\ndescription: fine\nname: dup\n---\nbody").unwrap_err();
        assert_eq!(err.code(), ErrorCode::Config);
        assert_eq!(err.context().get("line").map(String::as_str), Some("4"));
        assert!(err.context().get("column").is_none());
        assert!(err.to_string().contains("duplicate entry with key \"name\""));
    }

    #[test]
    fn test_parse_strict_rejects_non_mapping() {
        let err = parse_strict("---\njust some words\n---\nbody").unwrap_err();
        assert!(err.to_string().contains("key: value"));
    }

    #[test]
    fn test_scalars_and_nested_values() {
        let content = "---\nname: x\nversion: 2\nenabled: true\nempty:\noptions:\n  a: 1\n---\n";
        let (meta, body) = parse_strict(content).unwrap();
        assert_eq!(meta.get("version"), Some(&MetadataValue::Text("2".into())));
        assert_eq!(meta.get("enabled"), Some(&MetadataValue::Text("true".into())));
        assert_eq!(meta.get("empty"), Some(&MetadataValue::Text(String::new())));
        assert_eq!(meta.get("options"), Some(&MetadataValue::Text("{\"a\":1}".into())));
        assert_eq!(body, "");
    }

    #[test]
    fn test_block_list_syntax() {
        let content = "---\nname: x\nframeworks:\n  - rails\n  - django\n---\nbody";
        let (meta, _) = parse_strict(content).unwrap();
        assert_eq!(meta.get("frameworks"), Some(&MetadataValue::List(vec!["rails".into(), "django".into()])));
    }

    #[test]
    fn test_crlf_delimiters() {
        let content = "---\r\nname: win\r\n---\r\nbody\r\n";
        let (meta, body) = parse_strict(content).unwrap();
        assert_eq!(meta.get("name"), Some(&MetadataValue::Text("win".into())));
        assert_eq!(body, "body\r\n");
    }

    #[test]
    fn test_empty_block() {
        let (meta, body) = parse_strict("---\n---\nbody").unwrap();
        assert!(meta.is_empty());
        assert_eq!(body, "body");
    }

    #[test]
    fn test_parse_tolerant_returns_empty_on_failure() {
        assert!(parse_tolerant("---\nname: broken\n").is_empty());
        let meta = parse_tolerant("---\nname: fine\n---\n");
        assert_eq!(meta.len(), 1);
    }

    #[test]
    fn test_strip_metadata() {
        assert_eq!(strip_metadata("---\nname: a\n---\n# Body\n"), "# Body\n");
        assert_eq!(strip_metadata("# Body\n"), "# Body\n");
        assert_eq!(strip_metadata("---\nname: a\n# never closed\n"), "---\nname: a\n# never closed\n");
    }

    #[test]
    fn test_delimiter_inside_value_does_not_close_block() {
        let content = "---\ndescription: use --- carefully\n---\nbody";
        let (meta, body) = parse_strict(content).unwrap();
        assert_eq!(meta.get("description"), Some(&MetadataValue::Text("use --- carefully".into())));
        assert_eq!(body, "body");
    }

    #[test]
    fn test_validate_required_fields() {
        let (meta, _) = parse_strict("---\nname: a\ndescription: \"\"\nframeworks: []\n---\n").unwrap();
        let result = validate_required_fields(&meta, &["name", "description", "category", "frameworks"]);
        assert!(!result.valid);
        assert_eq!(result.missing, vec!["description", "category", "frameworks"]);

        let result = validate_required_fields(&meta, &["name"]);
        assert!(result.valid);
        assert!(result.missing.is_empty());
    }
}
