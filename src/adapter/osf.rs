//! The Open Science Framework, identified by a `10.17605/OSF.IO/<id>` DOI
//! or an `osf.io/<id>` URL. OSF nodes have no declared spatial extent; this
//! adapter only enumerates files.

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
    static ref DOI_PATTERN: Regex = Regex::new(r"(?i)^10\.17605/osf\.io/([a-z0-9]+)$").unwrap();
    static ref URL_PATTERN: Regex = Regex::new(r"osf\.io/([a-zA-Z0-9]+)/?$").unwrap();
}

#[derive(Debug, Deserialize)]
struct OsfFileList {
    data: Vec<OsfFile>,
}

#[derive(Debug, Deserialize)]
struct OsfFile {
    attributes: OsfFileAttributes,
    links: OsfFileLinks,
}

#[derive(Debug, Deserialize)]
struct OsfFileAttributes {
    name: String,
    #[serde(default)]
    size: Option<u64>,
}

#[derive(Debug, Deserialize)]
struct OsfFileLinks {
    download: String,
}

pub struct Osf {
    client: SharedHttpClient,
    timeout: Duration,
}

impl Osf {
    pub fn new(client: SharedHttpClient, timeout: Duration) -> Osf {
        Osf { client, timeout }
    }

    fn node_id(&self, identifier: &Identifier) -> Option<String> {
        let s = identifier.as_str();
        DOI_PATTERN
            .captures(s)
            .or_else(|| URL_PATTERN.captures(s))
            .map(|caps| caps[1].to_owned())
    }
}

#[async_trait]
impl ProviderAdapter for Osf {
    fn friendly_name(&self) -> &str {
        "OSF"
    }

    fn matches(&self, identifier: &Identifier) -> bool {
        self.node_id(identifier).is_some()
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
        let node_id = self
            .node_id(identifier)
            .ok_or_else(|| ExtentError::UnrecognizedIdentifier {
                identifier: identifier.to_string(),
            })?;
        let url = format!("https://api.osf.io/v2/nodes/{node_id}/files/osfstorage/");
        let file_list: OsfFileList =
            json_request(&self.client, &url, self.friendly_name(), self.timeout).await?;
        Ok(file_list
            .data
            .into_iter()
            .map(|file| {
                let mut descriptor = FileDescriptor::new(file.attributes.name, file.links.download);
                if let Some(size) = file.attributes.size {
                    descriptor = descriptor.with_declared_size(size);
                }
                descriptor
            })
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn matches_osf_short_url() {
        let adapter = Osf::new(crate::http::shared_http_client(1), Duration::from_secs(5));
        let identifier = Identifier::normalize("https://osf.io/9sj2k").unwrap();
        assert!(adapter.matches(&identifier));
    }

    #[test]
    fn matches_osf_doi() {
        let adapter = Osf::new(crate::http::shared_http_client(1), Duration::from_secs(5));
        let identifier = Identifier::normalize("10.17605/OSF.IO/9sj2k").unwrap();
        assert!(adapter.matches(&identifier));
    }
}
