//! Text processing utilities.

/// First `max_chars` characters of `text`, on a char boundary.
pub fn preview(text: &str, max_chars: usize) -> String {
    text.chars().take(max_chars).collect()
}

/// Like [`preview`] but marks truncation with an ellipsis.
pub fn truncate_with_ellipsis(text: &str, max_chars: usize) -> String {
    if text.chars().count() <= max_chars {
        text.to_string()
    } else {
        format!("{}...", preview(text, max_chars))
    }
}
