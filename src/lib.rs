//! mirrorsync - Keep a directory of bare git mirrors in sync with a GitHub account
//!
//! mirrorsync lists every repository an account owns, clones the new ones as
//! bare mirrors, refreshes the ones already present, keeps the git-daemon
//! metadata files (`description`, `git-daemon-export-ok`) current and can
//! delete mirrors whose upstream repository is gone.
//!
//! ## Modules
//!
//! - [`config`]: Configuration management and parsing
//! - [`github`]: Paginated repository listing
//! - [`exclude`]: Exclusion matching on clone URL basenames
//! - [`local`]: Local mirror directory inspection
//! - [`git`]: Mirror clone/update and metadata files
//! - [`sync`]: The reconciliation pass
//! - [`health`]: Preflight checks

pub mod config;
pub mod exclude;
pub mod git;
pub mod github;
pub mod health;
pub mod local;
pub mod sync;

pub use config::{Config, FailurePolicy};
pub use exclude::ExclusionSet;
pub use git::{GitBackend, GitCli, MirrorExecutor};
pub use github::{GitHubClient, RepositoryRecord};
pub use health::HealthCheck;
pub use local::MirrorRoot;
pub use sync::{SyncEngine, SyncOutcome, SyncSummary};
