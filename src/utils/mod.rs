//! Utility functions

pub mod classify;
pub mod time;
pub mod urls;

pub use classify::{file_type, should_exclude_from_stats};
pub use urls::{display_url, redact_credentials};

/// Format an integer with thousands separators (`12345` → `12,345`).
pub fn format_with_commas(n: usize) -> String {
    let digits = n.to_string();
    let mut out = String::with_capacity(digits.len() + digits.len() / 3);
    for (i, ch) in digits.chars().enumerate() {
        if i > 0 && (digits.len() - i) % 3 == 0 {
            out.push(',');
        }
        out.push(ch);
    }
    out
}

/// Truncate to at most `max_chars` characters without splitting a code point.
pub fn truncate_chars(text: &str, max_chars: usize) -> &str {
    match text.char_indices().nth(max_chars) {
        Some((idx, _)) => &text[..idx],
        None => text,
    }
}
