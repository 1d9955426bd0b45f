//! Metadata headers for generated files.

/// Render a `---` delimited header from ordered `key: value` pairs.
pub(crate) fn render(fields: &[(&str, String)]) -> String {
    let mut out = String::from("---\n");
    for (key, value) in fields {
        out.push_str(key);
        out.push_str(": ");
        out.push_str(value);
        out.push('\n');
    }
    out.push_str("---\n");
    out
}

/// A YAML scalar for `value`: plain when unambiguous, double-quoted otherwise.
pub(crate) fn scalar(value: &str) -> String {
    if is_plain(value) { value.to_string() } else { quoted(value) }
}

/// Double-quoted scalar. JSON string syntax is valid YAML.
pub(crate) fn quoted(value: &str) -> String {
    serde_json::to_string(value).unwrap_or_else(|_| format!("\"{}\"", value.replace('"', "'")))
}

/// A Cursor `globs` value. Cursor expects glob patterns unquoted (`**/*`), so only
/// values that would break the `key: value` line are quoted.
pub(crate) fn globs(value: &str) -> String {
    let breaks_line = value.contains(": ")
        || value.contains(" #")
        || value.ends_with(':')
        || value.starts_with(['"', '\'', '#'])
        || value.contains(['\n', '\r']);
    if breaks_line { quoted(value) } else { value.to_string() }
}

fn is_plain(value: &str) -> bool {
    const LEADING: &[char] = &['-', '?', ':', ',', '[', ']', '{', '}', '#', '&', '*', '!', '|', '>', '\'', '"', '%', '@', '`'];

    !value.is_empty()
        && value.trim() == value
        && !value.starts_with(LEADING)
        && !value.contains(": ")
        && !value.contains(" #")
        && !value.ends_with(':')
        && !value.contains(['\n', '\r', '\t'])
        && !matches!(value.to_ascii_lowercase().as_str(), "true" | "false" | "yes" | "no" | "null" | "~")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_render() {
        let header = render(&[("description", scalar("Plan a feature")), ("alwaysApply", "false".to_string())]);
        assert_eq!(header, "---\ndescription: Plan a feature\nalwaysApply: false\n---\n");
    }

    #[test]
    fn test_scalar_quotes_when_needed() {
        assert_eq!(scalar("Compound workflow command"), "Compound workflow command");
        assert_eq!(scalar("Review: security"), "\"Review: security\"");
        assert_eq!(scalar("- starts like a list"), "\"- starts like a list\"");
        assert_eq!(scalar("true"), "\"true\"");
        assert_eq!(scalar(""), "\"\"");
        assert_eq!(scalar("say \"hi\"\nthen go"), "\"say \\\"hi\\\"\\nthen go\"");
    }

    #[test]
    fn test_globs_stay_plain_unless_they_break_the_line() {
        assert_eq!(globs("**/*"), "**/*");
        assert_eq!(globs("app/**/*.rb,lib/**/*.rb"), "app/**/*.rb,lib/**/*.rb");
        assert_eq!(globs("src: lib"), "\"src: lib\"");
        assert_eq!(globs("a\nb"), "\"a\\nb\"");
    }
}
