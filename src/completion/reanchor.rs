//! Locating a bound task's line again after the document may have moved.
//!
//! Matching is by a prefix of the task text captured at bind time. It is a
//! heuristic, not an identity: two tasks sharing a prefix are indistinguishable.

/// Prefix length the completion logger requires at the stored line.
pub const VALIDATION_PREFIX_CHARS: usize = 5;

/// Prefix length used when searching the document for a moved task.
pub const REANCHOR_PREFIX_CHARS: usize = 15;

/// First `chars` characters of `snapshot`, cut on a char boundary.
pub fn snapshot_prefix(snapshot: &str, chars: usize) -> &str {
    match snapshot.char_indices().nth(chars) {
        Some((idx, _)) => &snapshot[..idx],
        None => snapshot,
    }
}

pub fn line_matches(line: &str, snapshot: &str, chars: usize) -> bool {
    line.contains(snapshot_prefix(snapshot, chars))
}

/// The hinted line if it still carries the task, without searching elsewhere.
pub fn validate_at_hint(lines: &[&str], hint: usize, snapshot: &str) -> Option<usize> {
    lines
        .get(hint)
        .filter(|line| line_matches(line, snapshot, VALIDATION_PREFIX_CHARS))
        .map(|_| hint)
}

/// The hinted line if it still matches, otherwise the first line carrying both
/// the snapshot prefix and the tag.
pub fn reanchor_by_prefix(
    snapshot: &str,
    lines: &[&str],
    hint: usize,
    tag: &str,
) -> Option<usize> {
    let prefix = snapshot_prefix(snapshot, REANCHOR_PREFIX_CHARS);

    if lines.get(hint).is_some_and(|line| line.contains(prefix)) {
        return Some(hint);
    }

    lines
        .iter()
        .position(|line| line.contains(prefix) && line.contains(tag))
}
