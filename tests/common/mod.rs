/// Common test utilities and helpers for mirrorsync tests
use serde_json::json;
use std::path::{Path, PathBuf};
use std::process::Command;
use tempfile::TempDir;
use wiremock::matchers::{method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

/// Scratch layout for one test: upstream repositories, a mirror root and a
/// private config directory so the user's own config is never read
pub struct TestEnvironment {
    pub temp_dir: TempDir,
    pub upstream_dir: PathBuf,
    pub mirror_root: PathBuf,
    pub config_home: PathBuf,
}

impl TestEnvironment {
    pub fn new() -> Self {
        let temp_dir = TempDir::new().expect("Failed to create temp dir");
        let upstream_dir = temp_dir.path().join("upstream");
        let mirror_root = temp_dir.path().join("mirrors");
        let config_home = temp_dir.path().join("config");
        for dir in [&upstream_dir, &mirror_root, &config_home] {
            std::fs::create_dir_all(dir).expect("Failed to create test dir");
        }

        Self {
            temp_dir,
            upstream_dir,
            mirror_root,
            config_home,
        }
    }

    /// Create a bare upstream repository with one commit, returning its URL
    pub fn create_upstream(&self, name: &str) -> String {
        let work = self.temp_dir.path().join(format!("work-{}", name));
        let bare = self.upstream_dir.join(format!("{}.git", name));

        run_git(self.temp_dir.path(), &["init", "-q", work.to_str().unwrap()]);
        run_git(
            &work,
            &[
                "-c",
                "user.name=mirrorsync",
                "-c",
                "user.email=mirrorsync@example.com",
                "commit",
                "-q",
                "--allow-empty",
                "-m",
                "initial",
            ],
        );
        run_git(
            self.temp_dir.path(),
            &["clone", "-q", "--bare", work.to_str().unwrap(), bare.to_str().unwrap()],
        );

        bare.to_string_lossy().into_owned()
    }

    /// URL of an upstream repository that does not exist
    pub fn missing_upstream(&self, name: &str) -> String {
        self.upstream_dir
            .join(format!("{}.git", name))
            .to_string_lossy()
            .into_owned()
    }

    pub fn mirror(&self, name: &str) -> PathBuf {
        self.mirror_root.join(name)
    }
}

fn run_git(dir: &Path, args: &[&str]) {
    let output = Command::new("git")
        .args(args)
        .current_dir(dir)
        .output()
        .expect("Failed to run git");
    assert!(
        output.status.success(),
        "git {:?} failed: {}",
        args,
        String::from_utf8_lossy(&output.stderr)
    );
}

/// True when a `git` binary is on PATH
pub fn git_available() -> bool {
    Command::new("git")
        .arg("--version")
        .output()
        .map(|output| output.status.success())
        .unwrap_or(false)
}

/// Serve `repos` as page 1 of octocat's listing, followed by an empty page 2
pub async fn serve_listing(server: &MockServer, repos: Vec<serde_json::Value>) {
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

pub fn repo_json(description: Option<&str>, clone_url: &str) -> serde_json::Value {
    json!({
        "name": clone_url.rsplit('/').next().unwrap_or(clone_url),
        "description": description,
        "clone_url": clone_url,
        "fork": false
    })
}
