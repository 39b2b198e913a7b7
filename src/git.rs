use anyhow::{anyhow, Context, Result};
use async_trait::async_trait;
use std::path::{Path, PathBuf};
use tokio::io::AsyncWriteExt;
use tokio::process::Command as AsyncCommand;
use tracing::{debug, info};

use crate::github::RepositoryRecord;
use crate::local::MirrorRoot;

/// Free-text description read by gitweb and friends
pub const DESCRIPTION_FILE: &str = "description";

/// Presence of this file lets `git daemon` export the repository
pub const EXPORT_MARKER_FILE: &str = "git-daemon-export-ok";

/// The version-control operations a mirror needs
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait GitBackend: Send + Sync {
    /// Create a bare mirror of `url` at `dest`
    async fn clone_mirror(&self, url: &str, dest: &Path) -> Result<()>;

    /// Fetch every remote of the mirror at `dir`
    async fn remote_update(&self, dir: &Path) -> Result<()>;
}

/// `GitBackend` that shells out to the `git` binary
#[derive(Debug, Clone, Default)]
pub struct GitCli;

impl GitCli {
    pub fn new() -> Self {
        Self
    }
}

#[async_trait]
impl GitBackend for GitCli {
    async fn clone_mirror(&self, url: &str, dest: &Path) -> Result<()> {
        debug!("git clone --mirror {} {}", url, dest.display());

        let output = AsyncCommand::new("git")
            .args(["clone", "--mirror", url])
            .arg(dest)
            .output()
            .await
            .context("Failed to execute git clone")?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            return Err(anyhow!("Git clone failed for {}: {}", url, stderr.trim()));
        }

        Ok(())
    }

    async fn remote_update(&self, dir: &Path) -> Result<()> {
        debug!("git remote update in {}", dir.display());

        let output = AsyncCommand::new("git")
            .args(["remote", "update"])
            .current_dir(dir)
            .output()
            .await
            .context("Failed to execute git remote update")?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            return Err(anyhow!(
                "Git remote update failed in {}: {}",
                dir.display(),
                stderr.trim()
            ));
        }

        Ok(())
    }
}

/// Creates and refreshes mirrors, keeping their metadata files current
pub struct MirrorExecutor<B: GitBackend> {
    backend: B,
    root: MirrorRoot,
}

impl<B: GitBackend> MirrorExecutor<B> {
    pub fn new(backend: B, root: MirrorRoot) -> Self {
        Self { backend, root }
    }

    pub fn root(&self) -> &MirrorRoot {
        &self.root
    }

    /// Clone a repository that has no local mirror yet
    pub async fn mirror(&self, record: &RepositoryRecord) -> Result<PathBuf> {
        let target = self.root.mirror_path(&record.url)?;
        info!("Mirroring {} -> {}", record.url, target.display());

        self.backend.clone_mirror(&record.url, &target).await?;
        if record.description.is_none() {
            remove_template_description(&target).await?;
        }
        write_metadata(&target, record.description.as_deref()).await?;

        Ok(target)
    }

    /// Fetch into an existing mirror
    pub async fn update(&self, record: &RepositoryRecord) -> Result<PathBuf> {
        let target = self.root.mirror_path(&record.url)?;
        info!("Updating {} in {}", record.url, target.display());

        self.backend.remote_update(&target).await?;
        write_metadata(&target, record.description.as_deref()).await?;

        Ok(target)
    }
}

/// `git clone` installs the template `description` into every new
/// repository. A fresh mirror without a description must not keep it.
async fn remove_template_description(dir: &Path) -> Result<()> {
    let path = dir.join(DESCRIPTION_FILE);
    match tokio::fs::remove_file(&path).await {
        Ok(()) => {
            debug!("Removed template description from {}", dir.display());
            Ok(())
        }
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
        Err(e) => Err(e).with_context(|| format!("Failed to remove {}", path.display())),
    }
}

/// Refresh the description and export marker of a mirror.
///
/// A `None` description leaves any existing description file as it is. The
/// export marker is created empty when missing and never rewritten.
pub async fn write_metadata(dir: &Path, description: Option<&str>) -> Result<()> {
    if let Some(description) = description {
        let path = dir.join(DESCRIPTION_FILE);
        tokio::fs::write(&path, format!("{}\n", description))
            .await
            .with_context(|| format!("Failed to write {}", path.display()))?;
    }

    let marker = dir.join(EXPORT_MARKER_FILE);
    let mut file = tokio::fs::OpenOptions::new()
        .create(true)
        .append(true)
        .open(&marker)
        .await
        .with_context(|| format!("Failed to create {}", marker.display()))?;
    file.flush().await?;

    Ok(())
}
