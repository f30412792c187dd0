//! Path pattern matching for `ignored-configs` entries.
//!
//! Three pattern shapes are recognized: bare exact paths, single-star
//! globs within a path segment, and a single recursive `prefix**suffix`
//! pattern. Patterns with multiple `**` or a leading `**` do not match
//! anything.

use glob::{MatchOptions, Pattern};

/// Check whether `path` matches `pattern`.
pub fn matches_glob(pattern: &str, path: &str) -> bool {
    if pattern.contains("**") {
        let parts: Vec<&str> = pattern.splitn(2, "**").collect();
        let (mut prefix, mut suffix) = (parts[0], parts[1]);
        if prefix.is_empty() || suffix.contains("**") {
            return false;
        }
        if let Some(stripped) = prefix.strip_suffix("/*") {
            prefix = stripped;
        } else if let Some(stripped) = prefix.strip_suffix('*') {
            prefix = stripped;
        }
        if let Some(stripped) = suffix.strip_prefix("/*") {
            suffix = stripped;
        } else if let Some(stripped) = suffix.strip_prefix('*') {
            suffix = stripped;
        }
        return path.starts_with(prefix) && path.ends_with(suffix);
    }

    // Shell semantics: a single star stays within one path segment.
    let options = MatchOptions {
        require_literal_separator: true,
        ..Default::default()
    };
    Pattern::new(pattern)
        .map(|p| p.matches_with(path, options))
        .unwrap_or(false)
}
