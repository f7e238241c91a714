//! Glob pattern matching for path-based backend selection.
//!
//! # Responsibilities
//! - Compile a tenant's glob patterns into anchored matchers
//! - Pick the best match for a request path
//!
//! # Design Decisions
//! - Most specific (longest) pattern wins; equal lengths keep declaration
//!   order via a stable sort
//! - `*` matches one path segment (one or more non-`/` characters), `**`
//!   matches across segment boundaries (zero or more characters)
//! - Everything else in the pattern reaches the regex engine verbatim, so
//!   character classes and quantifiers work as a documented extension
//! - A pattern that fails to compile is skipped, never fatal

use regex::Regex;

/// Compile one glob pattern into an anchored regex.
///
/// The empty pattern compiles to `^$` and matches only the empty path.
fn compile(pattern: &str) -> Option<Regex> {
    // placeholder keeps the `**` expansion out of the `*` pass
    let source = pattern
        .replace("**", "\u{1}")
        .replace('*', "([^/]+)")
        .replace('\u{1}', "(.*)");
    match Regex::new(&format!("^{source}$")) {
        Ok(re) => Some(re),
        Err(err) => {
            tracing::debug!(pattern = %pattern, error = %err, "skipping uncompilable pattern");
            None
        }
    }
}

/// Select the best-matching pattern for `path`, or `None`.
///
/// Callers are expected to have excluded the literal `default` key; it is a
/// fallback lookup, not a pattern.
pub fn find_match<'a, I>(patterns: I, path: &str) -> Option<&'a str>
where
    I: IntoIterator<Item = &'a str>,
{
    let mut candidates: Vec<&str> = patterns.into_iter().collect();
    // stable: equal lengths keep declaration order
    candidates.sort_by(|a, b| b.len().cmp(&a.len()));
    candidates
        .into_iter()
        .find(|pattern| compile(pattern).is_some_and(|re| re.is_match(path)))
}
