//! Input validation for topic names, state keys, and namespaces.
//!
//! All checks are pure and return a tagged result; callers decide whether a
//! failure is raised (strict mode) or logged and degraded (lenient mode).

use crate::error::BusError;

/// State keys starting with this prefix are reserved for internal use.
pub const RESERVED_STATE_PREFIX: char = '_';

/// Validate a topic name or subscription pattern.
///
/// Topics are dot-segmented and may contain alphanumerics, dots,
/// underscores, hyphens, and wildcard stars.
pub fn topic(name: &str) -> Result<(), BusError> {
    if name.is_empty() {
        return Err(BusError::Validation("topic name cannot be empty".into()));
    }
    if !name
        .chars()
        .all(|c| c.is_ascii_alphanumeric() || matches!(c, '.' | '_' | '-' | '*'))
    {
        return Err(BusError::Validation(format!(
            "topic name '{name}' contains invalid characters; \
             use only alphanumerics, dots, underscores, and hyphens"
        )));
    }
    Ok(())
}

/// Validate a state key.
pub fn state_key(key: &str) -> Result<(), BusError> {
    if key.is_empty() {
        return Err(BusError::Validation("state key cannot be empty".into()));
    }
    if key.starts_with(RESERVED_STATE_PREFIX) {
        return Err(BusError::Validation(format!(
            "state key '{key}' cannot start with '{RESERVED_STATE_PREFIX}' (reserved for internal use)"
        )));
    }
    Ok(())
}

/// Validate a subscription namespace tag.
pub fn namespace(ns: &str) -> Result<(), BusError> {
    if ns.is_empty() {
        return Err(BusError::Validation("namespace cannot be empty".into()));
    }
    Ok(())
}
