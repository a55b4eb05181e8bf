//! Small helpers shared across modules.

/// Truncates a string to at most `max_chars` characters, appending "..."
/// when anything was cut. Counts characters, not bytes, so multi-byte
/// input never panics.
pub fn truncate_str(s: &str, max_chars: usize) -> String {
    if s.chars().count() <= max_chars {
        return s.to_string();
    }
    if max_chars <= 3 {
        return s.chars().take(max_chars).collect();
    }
    let head: String = s.chars().take(max_chars - 3).collect();
    format!("{}...", head)
}
