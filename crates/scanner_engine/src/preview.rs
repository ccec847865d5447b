const TRUNCATED_MARKER: &str = "\n\n... [Output Truncated]";
/// Characters of a snapshot shown in a job's result preview.
pub const MAX_PREVIEW_CHARS: usize = 2_000;

/// Cuts `content` to at most `max_chars` characters, marking the cut.
pub fn preview(content: &str, max_chars: usize) -> String {
    match content.char_indices().nth(max_chars) {
        None => content.to_string(),
        Some((end, _)) => format!("{}{TRUNCATED_MARKER}", &content[..end]),
    }
}

#[cfg(test)]
mod tests {
    use super::{preview, MAX_PREVIEW_CHARS, TRUNCATED_MARKER};

    #[test]
    fn short_content_kept_as_is() {
        assert_eq!(preview("short preview", MAX_PREVIEW_CHARS), "short preview");
    }

    #[test]
    fn exact_length_is_not_marked() {
        let content = "a".repeat(MAX_PREVIEW_CHARS);
        assert_eq!(preview(&content, MAX_PREVIEW_CHARS), content);
    }

    #[test]
    fn long_content_is_cut_and_marked() {
        let content = "a".repeat(MAX_PREVIEW_CHARS + 128);
        let shown = preview(&content, MAX_PREVIEW_CHARS);
        assert!(shown.ends_with(TRUNCATED_MARKER));
        assert_eq!(shown.len(), MAX_PREVIEW_CHARS + TRUNCATED_MARKER.len());
    }

    #[test]
    fn cut_respects_multibyte_characters() {
        assert_eq!(preview("ééé", 2), format!("éé{TRUNCATED_MARKER}"));
    }
}
