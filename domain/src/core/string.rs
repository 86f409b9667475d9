//! String utilities for the domain layer.

/// Shorten `s` to at most `max_len` bytes, ending in `...` when cut.
///
/// The cut never splits a UTF-8 character.
pub fn truncate(s: &str, max_len: usize) -> String {
    if s.len() <= max_len {
        s.to_string()
    } else {
        let target = max_len.saturating_sub(3);
        let mut end = target.min(s.len());
        while end > 0 && !s.is_char_boundary(end) {
            end -= 1;
        }
        format!("{}...", &s[..end])
    }
}

/// Normalize a resource path so that spellings of the same file compare equal.
///
/// Trims whitespace, drops leading `./` segments, collapses repeated slashes
/// and removes a trailing slash. Returns `None` for blank input.
pub fn normalize_path(raw: &str) -> Option<String> {
    let trimmed = raw.trim();
    if trimmed.is_empty() {
        return None;
    }

    let absolute = trimmed.starts_with('/');
    let segments: Vec<&str> = trimmed
        .split('/')
        .filter(|s| !s.is_empty() && *s != ".")
        .collect();

    if segments.is_empty() {
        return Some(if absolute { "/".to_string() } else { ".".to_string() });
    }

    let joined = segments.join("/");
    Some(if absolute { format!("/{joined}") } else { joined })
}
