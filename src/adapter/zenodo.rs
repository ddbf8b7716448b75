//! Zenodo: an InvenioRDM instance operated by CERN, identified by either a
//! `10.5281/zenodo.<id>` DOI or a `zenodo.org/record(s)/<id>` URL.

use std::time::Duration;

use async_trait::async_trait;
use lazy_static::lazy_static;
use regex::Regex;

use crate::adapter::{invenio_rdm, ProviderAdapter, ProviderMetadata};
use crate::descriptor::FileDescriptor;
use crate::errors::ExtentError;
use crate::http::SharedHttpClient;
use crate::identifier::Identifier;

const BASE_URL: &str = "https://zenodo.org";

lazy_static! {
    static ref DOI_PATTERN: Regex = Regex::new(r"^10\.5281/zenodo\.(\d+)$").unwrap();
    static ref URL_PATTERN: Regex =
        Regex::new(r"zenodo\.org/record(?:s)?/(\d+)").unwrap();
}

pub struct Zenodo {
    client: SharedHttpClient,
    timeout: Duration,
}

impl Zenodo {
    pub fn new(client: SharedHttpClient, timeout: Duration) -> Zenodo {
        Zenodo { client, timeout }
    }

    fn record_id(&self, identifier: &Identifier) -> Option<String> {
        let s = identifier.as_str();
        DOI_PATTERN
            .captures(s)
            .or_else(|| URL_PATTERN.captures(s))
            .map(|caps| caps[1].to_owned())
    }
}

#[async_trait]
impl ProviderAdapter for Zenodo {
    fn friendly_name(&self) -> &str {
        "Zenodo"
    }

    fn matches(&self, identifier: &Identifier) -> bool {
        self.record_id(identifier).is_some()
    }

    async fn fetch_metadata(
        &self,
        identifier: &Identifier,
    ) -> Result<ProviderMetadata, ExtentError> {
        let record_id = self
            .record_id(identifier)
            .ok_or_else(|| ExtentError::UnrecognizedIdentifier {
                identifier: identifier.to_string(),
            })?;
        let record =
            invenio_rdm::fetch_record(&self.client, BASE_URL, &record_id, self.friendly_name(), self.timeout)
                .await?;
        Ok(ProviderMetadata {
            envelope: invenio_rdm::envelope_from_record(&record),
            temporal: invenio_rdm::temporal_from_record(&record),
            external_metadata_links: Vec::new(),
        })
    }

    async fn enumerate_files(
        &self,
        identifier: &Identifier,
    ) -> Result<Vec<FileDescriptor>, ExtentError> {
        let record_id = self
            .record_id(identifier)
            .ok_or_else(|| ExtentError::UnrecognizedIdentifier {
                identifier: identifier.to_string(),
            })?;
        let record =
            invenio_rdm::fetch_record(&self.client, BASE_URL, &record_id, self.friendly_name(), self.timeout)
                .await?;
        Ok(invenio_rdm::descriptors_from_record(&record))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn zenodo() -> Zenodo {
        Zenodo::new(crate::http::shared_http_client(1), Duration::from_secs(5))
    }

    #[test]
    fn matches_zenodo_doi() {
        let identifier = Identifier::normalize("10.5281/zenodo.1234567").unwrap();
        assert!(zenodo().matches(&identifier));
    }

    #[test]
    fn matches_zenodo_record_url() {
        let identifier = Identifier::normalize("https://zenodo.org/record/1234567").unwrap();
        assert!(zenodo().matches(&identifier));
    }

    #[test]
    fn does_not_match_unrelated_doi() {
        let identifier = Identifier::normalize("10.5061/dryad.abc123").unwrap();
        assert!(!zenodo().matches(&identifier));
    }
}
