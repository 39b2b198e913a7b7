use anyhow::{anyhow, Context, Result};
use futures::stream::{self, BoxStream, StreamExt, TryStreamExt};
use reqwest::header::{self, HeaderMap, HeaderValue};
use serde::Deserialize;
use tracing::{debug, info};

use crate::config::Config;

/// A remote repository as far as mirroring is concerned
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RepositoryRecord {
    pub description: Option<String>,
    pub url: String,
}

impl RepositoryRecord {
    pub fn new(description: Option<&str>, url: impl Into<String>) -> Self {
        Self {
            description: description.map(str::to_string),
            url: url.into(),
        }
    }

    /// Directory name of this repository's mirror
    pub fn basename(&self) -> &str {
        crate::exclude::basename(&self.url)
    }
}

/// One entry of the listing response. Every other field is ignored.
#[derive(Debug, Deserialize)]
struct RepoEntry {
    description: Option<String>,
    clone_url: String,
}

impl From<RepoEntry> for RepositoryRecord {
    fn from(entry: RepoEntry) -> Self {
        Self {
            description: entry.description,
            url: entry.clone_url,
        }
    }
}

/// Client for the paginated `/users/{account}/repos` listing
#[derive(Clone)]
pub struct GitHubClient {
    client: reqwest::Client,
    config: Config,
}

impl GitHubClient {
    /// Create a listing client. No authentication is sent.
    pub fn new(config: &Config) -> Result<Self> {
        let mut headers = HeaderMap::new();
        headers.insert(
            header::ACCEPT,
            HeaderValue::from_static("application/vnd.github+json"),
        );
        headers.insert(
            header::USER_AGENT,
            HeaderValue::from_str(&config.github.user_agent)
                .context("Invalid user agent in configuration")?,
        );

        let client = reqwest::Client::builder()
            .default_headers(headers)
            .build()
            .context("Failed to create HTTP client")?;

        Ok(Self {
            client,
            config: config.clone(),
        })
    }

    /// Fetch a single page of an account's repositories
    pub async fn fetch_page(&self, account: &str, page: u32) -> Result<Vec<RepositoryRecord>> {
        let url = self.config.repos_url(account, page)?;
        debug!("Fetching repository page {} for {}: {}", page, account, url);

        let response = self
            .client
            .get(url)
            .send()
            .await
            .with_context(|| format!("Failed to fetch repositories page {} for {}", page, account))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(anyhow!(
                "Listing repositories page {} for {} returned {}: {}",
                page,
                account,
                status,
                body.trim()
            ));
        }

        let body = response
            .text()
            .await
            .with_context(|| format!("Failed to read repositories page {} for {}", page, account))?;

        let entries: Vec<RepoEntry> = serde_json::from_str(&body)
            .with_context(|| format!("Failed to decode repositories page {} for {}", page, account))?;

        Ok(entries.into_iter().map(RepositoryRecord::from).collect())
    }

    /// Lazily walk the listing one page at a time.
    ///
    /// Pages are requested from 1 upward until the first empty page; the
    /// declared total is never consulted. An error ends the stream.
    pub fn pages<'a>(&'a self, account: &'a str) -> BoxStream<'a, Result<Vec<RepositoryRecord>>> {
        stream::try_unfold(1u32, move |page| async move {
            let records = self.fetch_page(account, page).await?;
            let next = if records.is_empty() {
                debug!("Page {} for {} is empty, listing complete", page, account);
                None
            } else {
                Some((records, page + 1))
            };
            Ok::<_, anyhow::Error>(next)
        })
        .boxed()
    }

    /// Lazily yield every repository of an account in listing order
    pub fn repositories<'a>(&'a self, account: &'a str) -> BoxStream<'a, Result<RepositoryRecord>> {
        self.pages(account)
            .map_ok(|records| stream::iter(records.into_iter().map(Ok::<_, anyhow::Error>)))
            .try_flatten()
            .boxed()
    }

    /// Fetch every page before returning
    pub async fn list_repositories(&self, account: &str) -> Result<Vec<RepositoryRecord>> {
        let records: Vec<RepositoryRecord> = self.repositories(account).try_collect().await?;
        info!("Found {} repositories for {}", records.len(), account);
        Ok(records)
    }
}
