//! Tolerant `<tag>...</tag>` extraction from oracle responses.

/// Extract the content of every `<name>...</name>` pair in `text`.
///
/// Matching is case-sensitive and non-greedy: each opening tag is paired
/// with the nearest closing tag after it, so nested markup inside a section
/// is returned verbatim. Multiple occurrences of the same tag concatenate
/// in encounter order. An absent or unclosed tag yields an empty string —
/// extraction never fails, and callers must tolerate missing fields.
pub fn extract_tag(text: &str, name: &str) -> String {
    let open = format!("<{}>", name);
    let close = format!("</{}>", name);

    let mut out = String::new();
    let mut cursor = 0;

    while let Some(start) = text[cursor..].find(&open) {
        let content_start = cursor + start + open.len();
        let Some(end) = text[content_start..].find(&close) else {
            break;
        };
        out.push_str(text[content_start..content_start + end].trim());
        cursor = content_start + end + close.len();
    }

    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_extract_single_tag() {
        let text = "prose before <action>{\"task_type\":\"click\"}</action> prose after";
        assert_eq!(extract_tag(text, "action"), "{\"task_type\":\"click\"}");
    }

    #[test]
    fn test_extract_multiline_content() {
        let text = "<visual_steps>\n[] check the list\n[] check the button\n</visual_steps>";
        assert_eq!(
            extract_tag(text, "visual_steps"),
            "[] check the list\n[] check the button"
        );
    }

    #[test]
    fn test_missing_tag_yields_empty() {
        assert_eq!(extract_tag("no tags here", "action"), "");
    }

    #[test]
    fn test_unclosed_tag_yields_empty() {
        assert_eq!(extract_tag("<action>{\"task_type\":", "action"), "");
    }

    #[test]
    fn test_multiple_occurrences_concatenate_in_order() {
        let text = "<note>first</note> middle <note>second</note>";
        assert_eq!(extract_tag(text, "note"), "firstsecond");
    }

    #[test]
    fn test_nested_content_verbatim() {
        let text = "<execution_notes>use <b>bold</b> captions</execution_notes>";
        assert_eq!(extract_tag(text, "execution_notes"), "use <b>bold</b> captions");
    }

    #[test]
    fn test_case_sensitive_names() {
        let text = "<Action>nope</Action>";
        assert_eq!(extract_tag(text, "action"), "");
    }

    #[test]
    fn test_empty_tag() {
        assert_eq!(extract_tag("<error></error>", "error"), "");
    }
}
