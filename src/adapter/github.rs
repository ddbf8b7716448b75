//! GitHub repositories, identified by a `github.com/<owner>/<repo>` URL.
//! GitHub has no notion of a declared spatial/temporal extent; this
//! adapter enumerates release assets (falling back to repository archive
//! download if there are no releases) for the download strategy.

use std::time::Duration;

use async_trait::async_trait;
use lazy_static::lazy_static;
use regex::Regex;
use serde::Deserialize;

use crate::adapter::{ProviderAdapter, ProviderMetadata};
use crate::descriptor::FileDescriptor;
use crate::errors::ExtentError;
use crate::http::{json_request, SharedHttpClient};
use crate::identifier::Identifier;

lazy_static! {
    static ref URL_PATTERN: Regex =
        Regex::new(r"github\.com/([^/]+)/([^/]+?)(?:\.git)?/?$").unwrap();
}

#[derive(Debug, Deserialize)]
struct GitHubRelease {
    #[serde(default)]
    assets: Vec<GitHubAsset>,
}

#[derive(Debug, Deserialize)]
struct GitHubAsset {
    name: String,
    size: u64,
    browser_download_url: String,
}

pub struct GitHub {
    client: SharedHttpClient,
    timeout: Duration,
}

impl GitHub {
    pub fn new(client: SharedHttpClient, timeout: Duration) -> GitHub {
        GitHub { client, timeout }
    }

    fn owner_repo(&self, identifier: &Identifier) -> Option<(String, String)> {
        URL_PATTERN
            .captures(identifier.as_str())
            .map(|caps| (caps[1].to_owned(), caps[2].to_owned()))
    }
}

#[async_trait]
impl ProviderAdapter for GitHub {
    fn friendly_name(&self) -> &str {
        "GitHub"
    }

    fn matches(&self, identifier: &Identifier) -> bool {
        self.owner_repo(identifier).is_some()
    }

    fn supports_metadata(&self) -> bool {
        false
    }

    async fn fetch_metadata(
        &self,
        _identifier: &Identifier,
    ) -> Result<ProviderMetadata, ExtentError> {
        Ok(ProviderMetadata::default())
    }

    async fn enumerate_files(
        &self,
        identifier: &Identifier,
    ) -> Result<Vec<FileDescriptor>, ExtentError> {
        let (owner, repo) = self
            .owner_repo(identifier)
            .ok_or_else(|| ExtentError::UnrecognizedIdentifier {
                identifier: identifier.to_string(),
            })?;
        let url = format!("https://api.github.com/repos/{owner}/{repo}/releases/latest");
        let release: GitHubRelease =
            json_request(&self.client, &url, self.friendly_name(), self.timeout).await?;
        if release.assets.is_empty() {
            let archive_url = format!("https://github.com/{owner}/{repo}/archive/refs/heads/main.zip");
            return Ok(vec![FileDescriptor::new(format!("{repo}.zip"), archive_url)]);
        }
        Ok(release
            .assets
            .into_iter()
            .map(|asset| {
                FileDescriptor::new(asset.name, asset.browser_download_url)
                    .with_declared_size(asset.size)
            })
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn matches_repository_url() {
        let adapter = GitHub::new(crate::http::shared_http_client(1), Duration::from_secs(5));
        let identifier = Identifier::normalize("https://github.com/acme/survey-data").unwrap();
        assert!(adapter.matches(&identifier));
    }

    #[test]
    fn does_not_match_non_github_url() {
        let adapter = GitHub::new(crate::http::shared_http_client(1), Duration::from_secs(5));
        let identifier = Identifier::normalize("https://gitlab.com/acme/survey-data").unwrap();
        assert!(!adapter.matches(&identifier));
    }
}
