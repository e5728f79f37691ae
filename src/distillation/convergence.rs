//! Lexical convergence check between successive distillation outputs.
//!
//! This is a cheap proxy for "the model stopped changing the text": the mean
//! of the length ratio and the share of positions holding the same
//! (lower-cased) character. Not an edit distance and not semantic.

/// Default similarity score at or above which distillation stops.
pub const CONVERGENCE_THRESHOLD: f64 = 0.95;

/// Returns true when `current` is similar enough to `previous`.
///
/// Lengths and positions are counted in characters. An empty `current` never
/// converges; an empty `previous` only scores through the length ratio, which
/// is then zero.
pub fn has_converged(previous: &str, current: &str, threshold: f64) -> bool {
    similarity(previous, current).is_some_and(|score| score >= threshold)
}

/// The raw score used by [`has_converged`]; `None` when `current` is empty.
pub fn similarity(previous: &str, current: &str) -> Option<f64> {
    let current_len = current.chars().count();
    if current_len == 0 {
        return None;
    }
    let previous_len = previous.chars().count();

    // current_len > 0, so longest > 0
    let longest = previous_len.max(current_len) as f64;
    let length_ratio = previous_len.min(current_len) as f64 / longest;

    let common = previous
        .to_lowercase()
        .chars()
        .zip(current.to_lowercase().chars())
        .filter(|(a, b)| a == b)
        .count();
    let char_similarity = common as f64 / longest;

    Some((length_ratio + char_similarity) / 2.0)
}
