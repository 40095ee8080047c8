//! Span-selection stages: markdown unwrap and balanced-brace extraction.

const FENCE: &str = "```";

/// Inner content of the first fenced code block, trimmed.
///
/// A language tag directly after the opening fence (`json`, `JSON`, ...) is
/// skipped. An unclosed fence yields everything after the opening marker.
pub fn unwrap_markdown(text: &str) -> Option<&str> {
    let start = text.find(FENCE)?;
    let after = &text[start + FENCE.len()..];

    let tag_len: usize = after
        .chars()
        .take_while(|c| c.is_ascii_alphanumeric() || *c == '-' || *c == '_')
        .map(char::len_utf8)
        .sum();
    let body = &after[tag_len..];

    let inner = match body.find(FENCE) {
        Some(end) => &body[..end],
        None => body,
    };
    Some(inner.trim())
}

/// First span that opens with `{` and returns to depth zero.
///
/// String literals are tracked from the start of `text`, so a brace inside
/// quoted prose never opens the span and escaped quotes do not end a string.
/// A `}` seen before any `{` is ignored.
pub fn extract_balanced(text: &str) -> Option<&str> {
    let mut start = None;
    let mut depth = 0usize;
    let mut in_string = false;
    let mut escaped = false;

    for (offset, c) in text.char_indices() {
        if in_string {
            if escaped {
                escaped = false;
            } else if c == '\\' {
                escaped = true;
            } else if c == '"' {
                in_string = false;
            }
            continue;
        }

        match c {
            '"' => in_string = true,
            '{' => {
                if depth == 0 {
                    start = Some(offset);
                }
                depth += 1;
            }
            '}' if depth > 0 => {
                depth -= 1;
                if depth == 0 {
                    let end = offset + c.len_utf8();
                    return start.map(|start| &text[start..end]);
                }
            }
            _ => {}
        }
    }

    None
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_unwrap_markdown_variants() {
        assert_eq!(unwrap_markdown("```json\n{\"a\":1}\n```"), Some("{\"a\":1}"));
        assert_eq!(unwrap_markdown("```JSON\n{\"a\":1}\n```"), Some("{\"a\":1}"));
        assert_eq!(unwrap_markdown("```\n{\"a\":1}\n```"), Some("{\"a\":1}"));
        assert_eq!(unwrap_markdown("text ```{\"a\":1}``` more"), Some("{\"a\":1}"));
        assert_eq!(unwrap_markdown("```json\n{\"a\":1"), Some("{\"a\":1"));
        assert_eq!(unwrap_markdown("no fences here"), None);
    }

    #[test]
    fn test_unwrap_takes_first_block() {
        let text = "```json\n{\"first\":1}\n```\n```json\n{\"second\":2}\n```";
        assert_eq!(unwrap_markdown(text), Some("{\"first\":1}"));
    }

    #[test]
    fn test_extract_balanced_quote_aware() {
        let text = r#"older text {"summary": "a {weird} string"} trailing"#;
        assert_eq!(extract_balanced(text), Some(r#"{"summary": "a {weird} string"}"#));
    }

    #[test]
    fn test_extract_balanced_escaped_quotes() {
        let text = r#"x {"a": "say \"}\" now", "b": {"c": 1}} y"#;
        assert_eq!(extract_balanced(text), Some(r#"{"a": "say \"}\" now", "b": {"c": 1}}"#));
    }

    #[test]
    fn test_extract_balanced_unbalanced() {
        assert_eq!(extract_balanced(r#"{"a": {"b": 1}"#), None);
        assert_eq!(extract_balanced("no braces"), None);
        assert_eq!(extract_balanced("} stray {}"), Some("{}"));
    }

    #[test]
    fn test_extract_balanced_skips_quoted_prose_braces() {
        let text = r#"Output of "echo {x" follows: {"summary": "ok"} done"#;
        assert_eq!(extract_balanced(text), Some(r#"{"summary": "ok"}"#));
        assert_eq!(extract_balanced(r#"note "}" then {"a": 1}"#), Some(r#"{"a": 1}"#));
    }

    #[test]
    fn test_extract_balanced_multibyte() {
        let text = "préambule {\"résumé\": \"ok\"} fin";
        assert_eq!(extract_balanced(text), Some("{\"résumé\": \"ok\"}"));
    }
}
