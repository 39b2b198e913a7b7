use anyhow::{anyhow, Context, Result};
use dirs::config_dir;
use path_clean::PathClean;
use reqwest::Url;
use serde::Deserialize;
use std::path::{Path, PathBuf};

/// Main configuration structure for mirrorsync
#[derive(Debug, Deserialize, Clone)]
pub struct Config {
    /// Directory holding the bare mirrors
    #[serde(default = "default_mirror_root")]
    pub mirror_root: String,

    /// Listing API settings
    #[serde(default)]
    pub github: GitHubConfig,

    /// Mirroring behavior settings
    #[serde(default)]
    pub mirror: MirrorConfig,

    /// Logging configuration
    #[serde(default)]
    pub logging: LoggingConfig,
}

/// Listing API configuration
#[derive(Debug, Deserialize, Clone)]
pub struct GitHubConfig {
    /// API base URL, without trailing path
    #[serde(default = "default_api_url")]
    pub api_url: String,

    /// User-Agent header sent with every listing request
    #[serde(default = "default_user_agent")]
    pub user_agent: String,
}

/// Mirroring configuration
#[derive(Debug, Deserialize, Clone)]
pub struct MirrorConfig {
    /// Suffix carried by mirror directory names
    #[serde(default = "default_suffix")]
    pub suffix: String,

    /// Repository names to skip, with or without the suffix
    #[serde(default)]
    pub exclude: Vec<String>,

    /// Delete local mirrors that no longer exist remotely
    #[serde(default)]
    pub prune: bool,

    /// What to do when a single repository fails to sync
    #[serde(default)]
    pub on_failure: FailurePolicy,
}

/// Logging configuration
#[derive(Debug, Deserialize, Clone)]
pub struct LoggingConfig {
    /// Log level
    #[serde(default = "default_log_level")]
    pub level: String, // "info"
}

/// Behavior of a pass when a repository fails to mirror or update
#[derive(Debug, Deserialize, Clone, Copy, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
pub enum FailurePolicy {
    /// Stop the whole pass at the first failure
    #[default]
    Abort,
    /// Record the failure and move on to the next repository
    Continue,
}

// Default value functions
fn default_mirror_root() -> String {
    ".".to_string()
}
fn default_api_url() -> String {
    "https://api.github.com".to_string()
}
fn default_user_agent() -> String {
    format!("mirrorsync/{}", env!("CARGO_PKG_VERSION"))
}
fn default_suffix() -> String {
    ".git".to_string()
}
fn default_log_level() -> String {
    "info".to_string()
}

// Default implementations
impl Default for GitHubConfig {
    fn default() -> Self {
        Self {
            api_url: default_api_url(),
            user_agent: default_user_agent(),
        }
    }
}

impl Default for MirrorConfig {
    fn default() -> Self {
        Self {
            suffix: default_suffix(),
            exclude: Vec::new(),
            prune: false,
            on_failure: FailurePolicy::default(),
        }
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
        }
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            mirror_root: default_mirror_root(),
            github: GitHubConfig::default(),
            mirror: MirrorConfig::default(),
            logging: LoggingConfig::default(),
        }
    }
}

impl Config {
    /// Load configuration from the default location, falling back to defaults
    pub fn load_or_default() -> Result<Self> {
        let config_path = Self::default_config_path()?;

        if config_path.exists() {
            Self::load(&config_path)
        } else {
            tracing::debug!("No configuration at {:?}, using defaults", config_path);
            Ok(Self::default())
        }
    }

    /// Load configuration from a specific file
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {:?}", path))?;

        let mut config: Config = serde_yaml::from_str(&content)
            .with_context(|| format!("Failed to parse config file: {:?}", path))?;

        // Expand environment variables in paths
        config.expand_paths()?;

        Ok(config)
    }

    /// Get the default configuration file path (XDG compliant)
    pub fn default_config_path() -> Result<PathBuf> {
        let config_dir = config_dir().context("Failed to get user config directory")?;

        Ok(config_dir.join("mirrorsync").join("config.yml"))
    }

    /// Expand environment variables and `~` in configuration paths
    pub fn expand_paths(&mut self) -> Result<()> {
        self.mirror_root = shellexpand::full(&self.mirror_root)
            .context("Failed to expand mirror_root path")?
            .into_owned();

        Ok(())
    }

    /// The mirror root as a normalized path. Expansion already happened in
    /// `load`, so the value is taken literally here.
    pub fn mirror_root_path(&self) -> PathBuf {
        PathBuf::from(&self.mirror_root).clean()
    }

    /// Listing endpoint for one page of an account's repositories.
    ///
    /// The account is percent-encoded as a single path segment.
    pub fn repos_url(&self, account: &str, page: u32) -> Result<Url> {
        let mut url = Url::parse(&self.github.api_url)
            .with_context(|| format!("Invalid API URL: {}", self.github.api_url))?;

        url.path_segments_mut()
            .map_err(|_| anyhow!("API URL cannot take a path: {}", self.github.api_url))?
            .pop_if_empty()
            .extend(["users", account, "repos"]);
        url.query_pairs_mut()
            .append_pair("page", &page.to_string());

        Ok(url)
    }
}
