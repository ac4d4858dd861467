//! Text helpers.

/// Truncate `s` to at most `max_chars` characters on a char boundary.
///
/// Used to log a recognizable prefix of secrets such as push tokens.
pub fn truncate_str(s: &str, max_chars: usize) -> &str {
    match s.char_indices().nth(max_chars) {
        Some((idx, _)) => &s[..idx],
        None => s,
    }
}
