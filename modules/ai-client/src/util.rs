/// Truncate a string to at most `max_bytes` bytes at a character boundary.
pub fn truncate_to_char_boundary(s: &str, max_bytes: usize) -> &str {
    if s.len() <= max_bytes {
        return s;
    }
    let mut end = max_bytes;
    while !s.is_char_boundary(end) && end > 0 {
        end -= 1;
    }
    &s[..end]
}

/// Strip markdown code blocks from a response.
pub fn strip_code_blocks(response: &str) -> &str {
    response
        .trim()
        .trim_start_matches("```json")
        .trim_start_matches("```")
        .trim_end_matches("```")
        .trim()
}

/// Locate the single JSON array embedded in semi-structured model output.
///
/// Models asked for "a JSON array" tend to wrap it in prose or code fences.
/// Returns the slice from the first `[` to its matching `]`, tracking string
/// literals so brackets inside values don't confuse the balance.
pub fn extract_json_array(response: &str) -> Option<&str> {
    let text = strip_code_blocks(response);
    let start = text.find('[')?;

    let mut depth = 0usize;
    let mut in_string = false;
    let mut escaped = false;

    for (i, c) in text[start..].char_indices() {
        if in_string {
            match c {
                _ if escaped => escaped = false,
                '\\' => escaped = true,
                '"' => in_string = false,
                _ => {}
            }
            continue;
        }
        match c {
            '"' => in_string = true,
            '[' => depth += 1,
            ']' => {
                depth -= 1;
                if depth == 0 {
                    return Some(&text[start..start + i + 1]);
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
    fn truncate_respects_char_boundary() {
        let text = "Hello 世界";
        let truncated = truncate_to_char_boundary(text, 8);
        assert!(truncated.len() <= 8);
        assert!(text.starts_with(truncated));
    }

    #[test]
    fn truncate_within_bounds_is_identity() {
        assert_eq!(truncate_to_char_boundary("Hello", 100), "Hello");
    }

    #[test]
    fn strip_code_blocks_handles_fences() {
        assert_eq!(strip_code_blocks("```json\n{}\n```"), "{}");
        assert_eq!(strip_code_blocks("```\n{}\n```"), "{}");
        assert_eq!(strip_code_blocks("{}"), "{}");
    }

    #[test]
    fn extract_array_from_prose() {
        let response = "Here are the matches:\n[{\"name\": \"A\"}, {\"name\": \"B\"}]\nHope that helps!";
        assert_eq!(
            extract_json_array(response),
            Some(r#"[{"name": "A"}, {"name": "B"}]"#)
        );
    }

    #[test]
    fn extract_array_from_code_fence() {
        let response = "```json\n[1, 2, 3]\n```";
        assert_eq!(extract_json_array(response), Some("[1, 2, 3]"));
    }

    #[test]
    fn extract_array_handles_nested_brackets_and_strings() {
        let response = r#"[{"tags": ["a", "b]"], "name": "x"}]"#;
        assert_eq!(extract_json_array(response), Some(response));
    }

    #[test]
    fn extract_array_missing_returns_none() {
        assert_eq!(extract_json_array("no array here"), None);
        assert_eq!(extract_json_array("[1, 2"), None);
    }
}
