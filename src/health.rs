//! System health checks for mirrorsync
//!
//! Preflight checks run before every sync and by the `doctor` subcommand.

use crate::Config;

/// Result of system health checks
#[derive(Debug, Clone)]
pub struct HealthCheck {
    /// Git installation status
    pub git: CheckResult,
    /// Mirror root status
    pub mirror_root: CheckResult,
    /// Listing API configuration status
    pub api: CheckResult,
}

/// Result of an individual health check
#[derive(Debug, Clone)]
pub struct CheckResult {
    pub passed: bool,
    pub message: String,
    pub details: Option<String>,
    pub is_warning: bool,
}

impl CheckResult {
    fn ok_with_details(message: impl Into<String>, details: impl Into<String>) -> Self {
        Self {
            passed: true,
            message: message.into(),
            details: Some(details.into()),
            is_warning: false,
        }
    }

    fn error(message: impl Into<String>) -> Self {
        Self {
            passed: false,
            message: message.into(),
            details: None,
            is_warning: false,
        }
    }

    fn error_with_details(message: impl Into<String>, details: impl Into<String>) -> Self {
        Self {
            passed: false,
            message: message.into(),
            details: Some(details.into()),
            is_warning: false,
        }
    }

    fn warning_with_details(message: impl Into<String>, details: impl Into<String>) -> Self {
        Self {
            passed: true,
            message: message.into(),
            details: Some(details.into()),
            is_warning: true,
        }
    }
}

impl HealthCheck {
    /// Run all health checks
    pub fn run(config: &Config) -> Self {
        Self {
            git: Self::check_git(),
            mirror_root: Self::check_mirror_root(config),
            api: Self::check_api(config),
        }
    }

    /// Check if all required checks passed (excludes warnings)
    pub fn all_passed(&self) -> bool {
        self.git.passed && self.mirror_root.passed && self.api.passed
    }

    /// Get list of failed checks
    pub fn errors(&self) -> Vec<&CheckResult> {
        [&self.git, &self.mirror_root, &self.api]
            .into_iter()
            .filter(|r| !r.passed)
            .collect()
    }

    /// Get list of warnings
    pub fn warnings(&self) -> Vec<&CheckResult> {
        [&self.git, &self.mirror_root, &self.api]
            .into_iter()
            .filter(|r| r.is_warning)
            .collect()
    }

    /// Check git installation
    fn check_git() -> CheckResult {
        match std::process::Command::new("git").arg("--version").output() {
            Ok(output) if output.status.success() => {
                let version = String::from_utf8_lossy(&output.stdout);
                CheckResult::ok_with_details("Git installed", version.trim().to_string())
            }
            Ok(_) => CheckResult::error("Git command failed"),
            Err(_) => CheckResult::error_with_details(
                "Git not found in PATH",
                "Install git: https://git-scm.com/downloads",
            ),
        }
    }

    /// Check the mirror root is a usable directory
    fn check_mirror_root(config: &Config) -> CheckResult {
        let path = config.mirror_root_path();

        if path.is_dir() {
            let read_only = std::fs::metadata(&path)
                .map(|m| m.permissions().readonly())
                .unwrap_or(false);
            if read_only {
                CheckResult::error_with_details(
                    "Mirror root is read-only",
                    path.display().to_string(),
                )
            } else {
                CheckResult::ok_with_details("Mirror root exists", path.display().to_string())
            }
        } else if path.exists() {
            CheckResult::error_with_details(
                "Mirror root is not a directory",
                path.display().to_string(),
            )
        } else {
            CheckResult::warning_with_details(
                "Mirror root does not exist yet",
                format!("It will be created on the next sync: {}", path.display()),
            )
        }
    }

    /// Check the listing API base URL is usable
    fn check_api(config: &Config) -> CheckResult {
        match reqwest::Url::parse(&config.github.api_url) {
            Ok(url) if url.scheme() == "http" || url.scheme() == "https" => {
                CheckResult::ok_with_details("Listing API configured", url.to_string())
            }
            Ok(url) => CheckResult::error_with_details(
                "Listing API must use http or https",
                url.to_string(),
            ),
            Err(e) => CheckResult::error_with_details(
                "Invalid listing API URL",
                format!("{}: {}", config.github.api_url, e),
            ),
        }
    }

    /// Get all checks for iteration
    pub fn all_checks(&self) -> [(&'static str, &CheckResult); 3] {
        [
            ("Git Installation", &self.git),
            ("Mirror Root", &self.mirror_root),
            ("Listing API", &self.api),
        ]
    }
}
