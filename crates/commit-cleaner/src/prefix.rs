//! Recognition and removal of the generated merge prefix.
//!
//! The host writes `Merged PR 12345: <title>` (sometimes with `#`, sometimes
//! without the colon) into the squash commit message. Matching is anchored at
//! the start of the text and ignores case.

use std::borrow::Cow;
use std::sync::LazyLock;

use regex::Regex;

static PREFIX: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)^Merged\s+PR\s+#?[0-9]+\s*(?::\s*)?").expect("prefix pattern is valid")
});

/// The anchored, case-insensitive `Merged PR #123:` pattern.
pub struct PrefixPattern;

impl PrefixPattern {
    /// Does `text` start with a generated prefix?
    pub fn is_match(text: &str) -> bool {
        PREFIX.is_match(text)
    }

    /// Byte length of the leading prefix, if any.
    pub fn leading_len(text: &str) -> Option<usize> {
        PREFIX.find(text).map(|m| m.end())
    }
}

/// Strip the generated prefix from the start of `text`.
///
/// Only the first match is removed; whatever follows it is left exactly as
/// written, even if it happens to look like another prefix. Returns the input
/// borrowed when nothing matched.
pub fn clean(text: &str) -> Cow<'_, str> {
    match PrefixPattern::leading_len(text) {
        Some(len) if len > 0 => Cow::Owned(text[len..].to_owned()),
        _ => Cow::Borrowed(text),
    }
}
