//! Sync Engine - Reconciles the local mirror root with an account's repositories
//!
//! A pass runs in three phases, strictly one step at a time:
//!
//! 1. **Discover** every repository of the account (all pages, before any work)
//! 2. **Sync** each one in listing order: skip excluded, update existing, mirror new
//! 3. **Prune** local mirrors that have no remote counterpart (opt-in)

use crate::config::FailurePolicy;
use crate::exclude::ExclusionSet;
use crate::git::{GitBackend, GitCli, MirrorExecutor};
use crate::github::RepositoryRecord;
use crate::local::MirrorRoot;
use crate::{Config, GitHubClient};
use anyhow::{Context, Result};
use std::collections::BTreeSet;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::{debug, error, info, warn};

/// What happened to one repository during a pass
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SyncOutcome {
    /// A new mirror was cloned
    Mirrored { path: PathBuf },
    /// An existing mirror was fetched
    Updated { path: PathBuf },
    /// The repository matched an exclusion and was left alone
    Excluded { url: String },
    /// Mirroring or updating failed (only recorded under `FailurePolicy::Continue`)
    Failed { url: String, error: String },
    /// A local mirror without a remote counterpart was deleted
    Pruned { path: PathBuf },
}

/// Results from a complete sync pass
#[derive(Debug, Clone)]
pub struct SyncSummary {
    pub total_repositories: usize,
    pub mirrored: usize,
    pub updated: usize,
    pub excluded: usize,
    pub failed: usize,
    pub pruned: usize,
    pub duration: Duration,
    pub results: Vec<SyncOutcome>,
}

impl SyncSummary {
    fn compile(total_repositories: usize, results: Vec<SyncOutcome>, duration: Duration) -> Self {
        let mut summary = Self {
            total_repositories,
            mirrored: 0,
            updated: 0,
            excluded: 0,
            failed: 0,
            pruned: 0,
            duration,
            results: Vec::new(),
        };

        for result in &results {
            match result {
                SyncOutcome::Mirrored { .. } => summary.mirrored += 1,
                SyncOutcome::Updated { .. } => summary.updated += 1,
                SyncOutcome::Excluded { .. } => summary.excluded += 1,
                SyncOutcome::Failed { .. } => summary.failed += 1,
                SyncOutcome::Pruned { .. } => summary.pruned += 1,
            }
        }

        summary.results = results;
        summary
    }

    pub fn has_failures(&self) -> bool {
        self.failed > 0
    }
}

/// The reconciler driving a pass for one account
pub struct SyncEngine<B: GitBackend = GitCli> {
    config: Arc<Config>,
    github_client: GitHubClient,
    executor: MirrorExecutor<B>,
    exclusions: ExclusionSet,
}

impl SyncEngine<GitCli> {
    /// Create a sync engine that runs the `git` binary
    pub fn new(config: Config) -> Result<Self> {
        Self::with_backend(config, GitCli::new())
    }
}

impl<B: GitBackend> SyncEngine<B> {
    /// Create a sync engine with a specific git backend
    pub fn with_backend(config: Config, backend: B) -> Result<Self> {
        let github_client = GitHubClient::new(&config)?;
        let root = MirrorRoot::new(config.mirror_root_path(), config.mirror.suffix.clone());
        let exclusions = ExclusionSet::new(config.mirror.exclude.iter().cloned());

        Ok(Self {
            config: Arc::new(config),
            github_client,
            executor: MirrorExecutor::new(backend, root),
            exclusions,
        })
    }

    /// Run a complete pass: discover, sync and optionally prune
    pub async fn run_sync(&self, account: &str) -> Result<SyncSummary> {
        let start_time = Instant::now();
        let root = self.executor.root();

        info!(
            "Starting mirror sync of {} into {}",
            account,
            root.path().display()
        );

        tokio::fs::create_dir_all(root.path())
            .await
            .with_context(|| format!("Failed to create mirror root: {}", root.path().display()))?;

        let records = self
            .discover(account)
            .await
            .context("Failed to discover repositories")?;

        let mut results = self.sync_records(&records).await?;

        if self.config.mirror.prune {
            if results.iter().any(|r| matches!(r, SyncOutcome::Failed { .. })) {
                warn!("Skipping prune because some repositories failed to sync");
            } else {
                let pruned = self.prune(&records).await?;
                results.extend(pruned);
            }
        }

        let summary = SyncSummary::compile(records.len(), results, start_time.elapsed());

        info!(
            "Sync completed in {:.2}s: {} mirrored, {} updated, {} excluded, {} failed, {} pruned",
            summary.duration.as_secs_f64(),
            summary.mirrored,
            summary.updated,
            summary.excluded,
            summary.failed,
            summary.pruned
        );

        Ok(summary)
    }

    /// Fetch the complete listing so prune sees every remote repository
    pub async fn discover(&self, account: &str) -> Result<Vec<RepositoryRecord>> {
        debug!("Discovering repositories for {}", account);
        self.github_client.list_repositories(account).await
    }

    /// Mirror or update each record in order
    pub async fn sync_records(&self, records: &[RepositoryRecord]) -> Result<Vec<SyncOutcome>> {
        let mut results = Vec::with_capacity(records.len());

        for record in records {
            if self.exclusions.matches(&record.url) {
                info!("Skipping excluded repository: {}", record.basename());
                results.push(SyncOutcome::Excluded {
                    url: record.url.clone(),
                });
                continue;
            }

            match self.sync_one(record).await {
                Ok(outcome) => results.push(outcome),
                Err(e) => match self.config.mirror.on_failure {
                    FailurePolicy::Abort => {
                        return Err(e).with_context(|| format!("Failed to sync {}", record.url));
                    }
                    FailurePolicy::Continue => {
                        error!("Failed to sync {}: {:#}", record.url, e);
                        results.push(SyncOutcome::Failed {
                            url: record.url.clone(),
                            error: format!("{:#}", e),
                        });
                    }
                },
            }
        }

        Ok(results)
    }

    async fn sync_one(&self, record: &RepositoryRecord) -> Result<SyncOutcome> {
        if self.executor.root().is_mirrored(&record.url)? {
            let path = self.executor.update(record).await?;
            Ok(SyncOutcome::Updated { path })
        } else {
            let path = self.executor.mirror(record).await?;
            Ok(SyncOutcome::Mirrored { path })
        }
    }

    /// Local mirror names with no matching remote record
    pub fn orphaned_mirrors(&self, records: &[RepositoryRecord]) -> Result<BTreeSet<String>> {
        let remote: BTreeSet<&str> = records.iter().map(|r| r.basename()).collect();
        let local = self.executor.root().list_local_mirrors()?;

        Ok(local
            .into_iter()
            .filter(|name| !remote.contains(name.as_str()))
            .collect())
    }

    /// Delete every orphaned mirror. Not reversible.
    pub async fn prune(&self, records: &[RepositoryRecord]) -> Result<Vec<SyncOutcome>> {
        let orphans = self.orphaned_mirrors(records)?;
        let mut results = Vec::with_capacity(orphans.len());

        for name in orphans {
            let path = self.executor.root().path().join(&name);
            info!("Deleting mirror with no remote counterpart: {}", path.display());

            tokio::fs::remove_dir_all(&path)
                .await
                .with_context(|| format!("Failed to delete {}", path.display()))?;

            results.push(SyncOutcome::Pruned { path });
        }

        Ok(results)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::git::MockGitBackend;
    use assert_matches::assert_matches;
    use serde_json::json;
    use std::path::Path;
    use tempfile::TempDir;
    use wiremock::matchers::{method, path, query_param};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    async fn serve_listing(server: &MockServer, repos: serde_json::Value) {
        Mock::given(method("GET"))
            .and(path("/users/octocat/repos"))
            .and(query_param("page", "1"))
            .respond_with(ResponseTemplate::new(200).set_body_json(repos))
            .mount(server)
            .await;
        Mock::given(method("GET"))
            .and(path("/users/octocat/repos"))
            .and(query_param("page", "2"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!([])))
            .mount(server)
            .await;
    }

    fn test_config(server: &MockServer, root: &Path) -> Config {
        let mut config = Config::default();
        config.github.api_url = server.uri();
        config.mirror_root = root.to_string_lossy().into_owned();
        config
    }

    fn cloning_backend() -> MockGitBackend {
        let mut mock = MockGitBackend::new();
        mock.expect_clone_mirror().returning(|_, dest| {
            std::fs::create_dir_all(dest)?;
            Ok(())
        });
        mock.expect_remote_update().returning(|_| Ok(()));
        mock
    }

    fn repo(name: &str) -> serde_json::Value {
        json!({"description": name, "clone_url": format!("https://github.com/octocat/{}.git", name)})
    }

    #[tokio::test]
    async fn test_mirrors_new_and_updates_existing() {
        let server = MockServer::start().await;
        serve_listing(&server, json!([repo("fresh"), repo("known")])).await;
        let temp = TempDir::new().unwrap();
        std::fs::create_dir(temp.path().join("known.git")).unwrap();

        let mut mock = MockGitBackend::new();
        mock.expect_clone_mirror()
            .withf(|url, _| url.ends_with("/fresh.git"))
            .times(1)
            .returning(|_, dest| {
                std::fs::create_dir_all(dest)?;
                Ok(())
            });
        mock.expect_remote_update()
            .withf(|dir| dir.ends_with("known.git"))
            .times(1)
            .returning(|_| Ok(()));

        let engine = SyncEngine::with_backend(test_config(&server, temp.path()), mock).unwrap();
        let summary = engine.run_sync("octocat").await.unwrap();

        assert_eq!(summary.total_repositories, 2);
        assert_eq!(summary.mirrored, 1);
        assert_eq!(summary.updated, 1);
        assert_matches!(&summary.results[0], SyncOutcome::Mirrored { path } if path.ends_with("fresh.git"));
        assert_matches!(&summary.results[1], SyncOutcome::Updated { path } if path.ends_with("known.git"));
    }

    #[tokio::test]
    async fn test_excluded_repositories_are_never_touched() {
        let server = MockServer::start().await;
        serve_listing(&server, json!([repo("demo"), repo("priv")])).await;
        let temp = TempDir::new().unwrap();

        let mut mock = MockGitBackend::new();
        mock.expect_clone_mirror()
            .withf(|url, _| url.ends_with("/demo.git"))
            .times(1)
            .returning(|_, dest| {
                std::fs::create_dir_all(dest)?;
                Ok(())
            });

        let mut config = test_config(&server, temp.path());
        config.mirror.exclude = vec!["priv".to_string()];

        let engine = SyncEngine::with_backend(config, mock).unwrap();
        let summary = engine.run_sync("octocat").await.unwrap();

        assert_eq!(summary.excluded, 1);
        assert!(!temp.path().join("priv.git").exists());
    }

    #[tokio::test]
    async fn test_prune_deletes_only_orphans() {
        let server = MockServer::start().await;
        serve_listing(&server, json!([repo("a"), repo("c")])).await;
        let temp = TempDir::new().unwrap();
        for name in ["a.git", "b.git", "c.git"] {
            std::fs::create_dir(temp.path().join(name)).unwrap();
        }

        let mut config = test_config(&server, temp.path());
        config.mirror.prune = true;

        let engine = SyncEngine::with_backend(config, cloning_backend()).unwrap();
        let summary = engine.run_sync("octocat").await.unwrap();

        assert_eq!(summary.pruned, 1);
        assert!(temp.path().join("a.git").is_dir());
        assert!(!temp.path().join("b.git").exists());
        assert!(temp.path().join("c.git").is_dir());
    }

    #[tokio::test]
    async fn test_prune_disabled_by_default() {
        let server = MockServer::start().await;
        serve_listing(&server, json!([repo("a")])).await;
        let temp = TempDir::new().unwrap();
        std::fs::create_dir(temp.path().join("gone.git")).unwrap();

        let engine =
            SyncEngine::with_backend(test_config(&server, temp.path()), cloning_backend()).unwrap();
        let summary = engine.run_sync("octocat").await.unwrap();

        assert_eq!(summary.pruned, 0);
        assert!(temp.path().join("gone.git").is_dir());
    }

    #[tokio::test]
    async fn test_prune_keeps_excluded_mirrors() {
        let server = MockServer::start().await;
        serve_listing(&server, json!([repo("a"), repo("priv")])).await;
        let temp = TempDir::new().unwrap();
        std::fs::create_dir(temp.path().join("priv.git")).unwrap();

        let mut config = test_config(&server, temp.path());
        config.mirror.prune = true;
        config.mirror.exclude = vec!["priv".to_string()];

        let engine = SyncEngine::with_backend(config, cloning_backend()).unwrap();
        engine.run_sync("octocat").await.unwrap();

        assert!(temp.path().join("priv.git").is_dir());
    }

    #[tokio::test]
    async fn test_abort_policy_stops_at_first_failure() {
        let server = MockServer::start().await;
        serve_listing(&server, json!([repo("one"), repo("broken"), repo("three")])).await;
        let temp = TempDir::new().unwrap();
        std::fs::create_dir(temp.path().join("orphan.git")).unwrap();

        let mut mock = MockGitBackend::new();
        mock.expect_clone_mirror()
            .withf(|url, _| url.ends_with("/one.git"))
            .times(1)
            .returning(|_, dest| {
                std::fs::create_dir_all(dest)?;
                Ok(())
            });
        mock.expect_clone_mirror()
            .withf(|url, _| url.ends_with("/broken.git"))
            .times(1)
            .returning(|_, _| Err(anyhow::anyhow!("remote hung up")));
        mock.expect_clone_mirror()
            .withf(|url, _| url.ends_with("/three.git"))
            .never();

        let mut config = test_config(&server, temp.path());
        config.mirror.prune = true;

        let engine = SyncEngine::with_backend(config, mock).unwrap();
        let err = engine.run_sync("octocat").await.unwrap_err();

        let message = format!("{:#}", err);
        assert!(message.contains("broken.git"), "{}", message);
        assert!(message.contains("remote hung up"), "{}", message);
        assert!(temp.path().join("one.git").is_dir());
        assert!(!temp.path().join("three.git").exists());
        // The pass aborted before prune
        assert!(temp.path().join("orphan.git").is_dir());
    }

    #[tokio::test]
    async fn test_continue_policy_records_failure_and_moves_on() {
        let server = MockServer::start().await;
        serve_listing(&server, json!([repo("broken"), repo("two")])).await;
        let temp = TempDir::new().unwrap();
        std::fs::create_dir(temp.path().join("orphan.git")).unwrap();

        let mut mock = MockGitBackend::new();
        mock.expect_clone_mirror()
            .withf(|url, _| url.ends_with("/broken.git"))
            .returning(|_, _| Err(anyhow::anyhow!("remote hung up")));
        mock.expect_clone_mirror()
            .withf(|url, _| url.ends_with("/two.git"))
            .times(1)
            .returning(|_, dest| {
                std::fs::create_dir_all(dest)?;
                Ok(())
            });

        let mut config = test_config(&server, temp.path());
        config.mirror.on_failure = FailurePolicy::Continue;
        config.mirror.prune = true;

        let engine = SyncEngine::with_backend(config, mock).unwrap();
        let summary = engine.run_sync("octocat").await.unwrap();

        assert!(summary.has_failures());
        assert_eq!(summary.failed, 1);
        assert_eq!(summary.mirrored, 1);
        assert_matches!(&summary.results[0], SyncOutcome::Failed { error, .. } if error.contains("remote hung up"));
        // Prune is skipped after a failure
        assert!(temp.path().join("orphan.git").is_dir());
    }

    #[tokio::test]
    async fn test_discovery_failure_aborts_before_sync() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/users/octocat/repos"))
            .respond_with(ResponseTemplate::new(500))
            .mount(&server)
            .await;
        let temp = TempDir::new().unwrap();

        let mut mock = MockGitBackend::new();
        mock.expect_clone_mirror().never();
        mock.expect_remote_update().never();

        let engine = SyncEngine::with_backend(test_config(&server, temp.path()), mock).unwrap();
        let err = engine.run_sync("octocat").await.unwrap_err();

        assert!(err.to_string().contains("discover"));
    }

    #[test]
    fn test_sync_summary_calculation() {
        let results = vec![
            SyncOutcome::Mirrored {
                path: "/tmp/a.git".into(),
            },
            SyncOutcome::Updated {
                path: "/tmp/b.git".into(),
            },
            SyncOutcome::Excluded {
                url: "https://github.com/octocat/c.git".to_string(),
            },
            SyncOutcome::Failed {
                url: "https://github.com/octocat/d.git".to_string(),
                error: "Network error".to_string(),
            },
            SyncOutcome::Pruned {
                path: "/tmp/e.git".into(),
            },
        ];

        let duration = Duration::from_secs(60);
        let summary = SyncSummary::compile(4, results, duration);

        assert_eq!(summary.total_repositories, 4);
        assert_eq!(summary.mirrored, 1);
        assert_eq!(summary.updated, 1);
        assert_eq!(summary.excluded, 1);
        assert_eq!(summary.failed, 1);
        assert_eq!(summary.pruned, 1);
        assert!(summary.has_failures());
        assert_eq!(summary.duration, duration);
        assert_eq!(summary.results.len(), 5);
    }
}
