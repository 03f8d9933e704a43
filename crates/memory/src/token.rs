//! Token estimation.
//!
//! Character heuristic: ~4 characters per token, rounded up.

/// Estimate the token count for a string.
pub fn estimate_tokens(text: &str) -> usize {
    if text.is_empty() {
        return 0;
    }
    text.chars().count().div_ceil(4)
}
