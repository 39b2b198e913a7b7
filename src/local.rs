//! Local mirror directory inspection
//!
//! Every mirror lives directly under the mirror root in a directory named
//! after the basename of its clone URL.

use anyhow::{bail, Context, Result};
use std::collections::BTreeSet;
use std::path::{Path, PathBuf};
use tracing::debug;

use crate::exclude::basename;

/// Name of a git working tree's control directory. The mirror root may
/// itself be a checkout, in which case this entry is not a mirror.
const CONTROL_DIR: &str = ".git";

/// The directory holding all mirrors
#[derive(Debug, Clone)]
pub struct MirrorRoot {
    path: PathBuf,
    suffix: String,
}

impl MirrorRoot {
    pub fn new(path: impl Into<PathBuf>, suffix: impl Into<String>) -> Self {
        Self {
            path: path.into(),
            suffix: suffix.into(),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Directory a clone URL mirrors into
    pub fn mirror_path(&self, url: &str) -> Result<PathBuf> {
        let name = basename(url);
        if name.is_empty() || name == "." || name == ".." {
            bail!("Cannot derive a mirror directory name from URL: {}", url);
        }
        Ok(self.path.join(name))
    }

    /// True if a mirror directory for this URL already exists
    pub fn is_mirrored(&self, url: &str) -> Result<bool> {
        Ok(self.mirror_path(url)?.is_dir())
    }

    /// Names of every mirror directory under the root
    pub fn list_local_mirrors(&self) -> Result<BTreeSet<String>> {
        let entries = std::fs::read_dir(&self.path)
            .with_context(|| format!("Failed to read mirror root: {}", self.path.display()))?;

        let mut names = BTreeSet::new();
        for entry in entries {
            let entry = entry
                .with_context(|| format!("Failed to read entry in {}", self.path.display()))?;
            let name = entry.file_name().to_string_lossy().into_owned();

            if name == CONTROL_DIR || !name.ends_with(&self.suffix) {
                continue;
            }
            if !entry.path().is_dir() {
                debug!("Ignoring non-directory entry: {}", name);
                continue;
            }
            names.insert(name);
        }

        Ok(names)
    }
}
