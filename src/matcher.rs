//! Hierarchical topic pattern matching.
//!
//! Topics are dot-segmented strings (`user.login`, `video.play`). Patterns
//! may use `*` to match exactly one segment and `**` to match the rest of
//! the path. The matcher serves both wildcard subscription dispatch and
//! history replay filtering.

/// Whether a registered topic is a wildcard pattern rather than a
/// concrete topic.
pub fn is_pattern(topic: &str) -> bool {
    topic.contains('*')
}

/// Match a concrete topic against a pattern, segment by segment.
///
/// `*` consumes exactly one segment; `**` matches one or more trailing
/// segments and short-circuits the match. Without a `**`, segment counts
/// must be equal.
pub fn matches(topic: &str, pattern: &str) -> bool {
    let segments: Vec<&str> = topic.split('.').collect();
    let pattern_segments: Vec<&str> = pattern.split('.').collect();

    for (i, part) in pattern_segments.iter().enumerate() {
        match *part {
            "**" => return true,
            "*" => continue,
            literal => {
                if segments.get(i) != Some(&literal) {
                    return false;
                }
            }
        }
    }

    segments.len() == pattern_segments.len()
}
