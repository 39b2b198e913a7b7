//! Repository exclusion matching
//!
//! Operators name repositories to skip either by their on-disk mirror name
//! (`dotfiles.git`) or by the bare repository name (`dotfiles`). Both forms
//! are checked against the basename of the clone URL.

use std::collections::HashSet;

/// Final path segment of a clone URL.
///
/// Trailing slashes are ignored. scp-style URLs (`git@host:owner/repo.git`)
/// resolve the same way as `https://host/owner/repo.git`.
pub fn basename(url: &str) -> &str {
    let trimmed = url.trim_end_matches('/');
    let tail = trimmed.rsplit('/').next().unwrap_or(trimmed);
    // `git@host:repo.git` has no slash at all
    tail.rsplit(':').next().unwrap_or(tail)
}

/// Strip the final `.ext` from a name.
///
/// A leading dot does not start a suffix, so `.git` and `.config` are
/// returned unchanged.
pub fn strip_suffix(name: &str) -> &str {
    match name.rfind('.') {
        Some(idx) if name[..idx].trim_start_matches('.').is_empty() => name,
        Some(idx) => &name[..idx],
        None => name,
    }
}

/// Set of repository names that are never mirrored or updated
#[derive(Debug, Clone, Default)]
pub struct ExclusionSet {
    names: HashSet<String>,
}

impl ExclusionSet {
    pub fn new<I, S>(names: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            names: names.into_iter().map(Into::into).collect(),
        }
    }

    /// True if the URL's basename, with or without its suffix, is excluded
    pub fn matches(&self, url: &str) -> bool {
        let name = basename(url);
        self.names.contains(name) || self.names.contains(strip_suffix(name))
    }
}
