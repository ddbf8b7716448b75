//! Dryad, identified by a `10.5061/dryad.<suffix>` DOI.

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
    static ref DOI_PATTERN: Regex = Regex::new(r"^10\.5061/dryad\.[a-z0-9]+$").unwrap();
}

#[derive(Debug, Deserialize)]
struct DryadDataset {
    #[serde(rename = "_links")]
    links: DryadLinks,
}

#[derive(Debug, Deserialize)]
struct DryadLinks {
    #[serde(rename = "stash:version")]
    version: DryadLink,
}

#[derive(Debug, Deserialize)]
struct DryadLink {
    href: String,
}

#[derive(Debug, Deserialize)]
struct DryadFileList {
    #[serde(rename = "_embedded")]
    embedded: DryadFileListEmbedded,
}

#[derive(Debug, Deserialize)]
struct DryadFileListEmbedded {
    #[serde(rename = "stash:files")]
    files: Vec<DryadFile>,
}

#[derive(Debug, Deserialize)]
struct DryadFile {
    path: String,
    size: u64,
    #[serde(rename = "_links")]
    links: DryadFileLinks,
}

#[derive(Debug, Deserialize)]
struct DryadFileLinks {
    #[serde(rename = "stash:download")]
    download: DryadLink,
}

pub struct Dryad {
    client: SharedHttpClient,
    timeout: Duration,
}

impl Dryad {
    pub fn new(client: SharedHttpClient, timeout: Duration) -> Dryad {
        Dryad { client, timeout }
    }
}

#[async_trait]
impl ProviderAdapter for Dryad {
    fn friendly_name(&self) -> &str {
        "Dryad"
    }

    fn matches(&self, identifier: &Identifier) -> bool {
        DOI_PATTERN.is_match(identifier.as_str())
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
        let encoded_doi = percent_encoding::utf8_percent_encode(
            identifier.as_str(),
            percent_encoding::NON_ALPHANUMERIC,
        )
        .to_string();
        let dataset_url =
            format!("https://datadryad.org/api/v2/datasets/doi:{encoded_doi}");
        let dataset: DryadDataset =
            json_request(&self.client, &dataset_url, self.friendly_name(), self.timeout).await?;
        let files_url = format!(
            "https://datadryad.org{}/files",
            dataset.links.version.href
        );
        let file_list: DryadFileList =
            json_request(&self.client, &files_url, self.friendly_name(), self.timeout).await?;
        Ok(file_list
            .embedded
            .files
            .into_iter()
            .map(|file| {
                let url = format!("https://datadryad.org{}", file.links.download.href);
                FileDescriptor::new(file.path, url).with_declared_size(file.size)
            })
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn matches_dryad_doi() {
        let adapter = Dryad::new(crate::http::shared_http_client(1), Duration::from_secs(5));
        let identifier = Identifier::normalize("10.5061/dryad.abc123").unwrap();
        assert!(adapter.matches(&identifier));
    }

    #[test]
    fn does_not_match_other_dois() {
        let adapter = Dryad::new(crate::http::shared_http_client(1), Duration::from_secs(5));
        let identifier = Identifier::normalize("10.5281/zenodo.1").unwrap();
        assert!(!adapter.matches(&identifier));
    }
}
