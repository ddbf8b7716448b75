//! PANGAEA, identified by a `10.1594/PANGAEA.<id>` DOI. PANGAEA datasets
//! carry a declared geographic bounding box and, often, a single tabular
//! data file — metadata-first almost always succeeds here.

use std::time::Duration;

use async_trait::async_trait;
use lazy_static::lazy_static;
use regex::Regex;
use serde::Deserialize;

use crate::adapter::{ProviderAdapter, ProviderMetadata};
use crate::descriptor::FileDescriptor;
use crate::envelope::{BoundingBox, Envelope};
use crate::errors::ExtentError;
use crate::http::{json_request, SharedHttpClient};
use crate::identifier::Identifier;

lazy_static! {
    static ref DOI_PATTERN: Regex = Regex::new(r"(?i)^10\.1594/pangaea\.(\d+)$").unwrap();
}

#[derive(Debug, Deserialize)]
struct PangaeaDataset {
    #[serde(default)]
    geo_extent: Option<PangaeaGeoExtent>,
    #[serde(default)]
    min_date: Option<String>,
    #[serde(default)]
    max_date: Option<String>,
    #[serde(default)]
    download_url: Option<String>,
    #[serde(default)]
    byte_size: Option<u64>,
}

#[derive(Debug, Deserialize)]
struct PangaeaGeoExtent {
    south: f64,
    west: f64,
    north: f64,
    east: f64,
}

pub struct Pangaea {
    client: SharedHttpClient,
    timeout: Duration,
}

impl Pangaea {
    pub fn new(client: SharedHttpClient, timeout: Duration) -> Pangaea {
        Pangaea { client, timeout }
    }

    fn dataset_id(&self, identifier: &Identifier) -> Option<String> {
        DOI_PATTERN
            .captures(identifier.as_str())
            .map(|caps| caps[1].to_owned())
    }

    async fn fetch_dataset(&self, dataset_id: &str) -> Result<PangaeaDataset, ExtentError> {
        let url = format!("https://doi.pangaea.de/10.1594/PANGAEA.{dataset_id}?format=metadata_json");
        json_request(&self.client, &url, self.friendly_name(), self.timeout).await
    }
}

#[async_trait]
impl ProviderAdapter for Pangaea {
    fn friendly_name(&self) -> &str {
        "PANGAEA"
    }

    fn matches(&self, identifier: &Identifier) -> bool {
        self.dataset_id(identifier).is_some()
    }

    async fn fetch_metadata(
        &self,
        identifier: &Identifier,
    ) -> Result<ProviderMetadata, ExtentError> {
        let dataset_id = self
            .dataset_id(identifier)
            .ok_or_else(|| ExtentError::UnrecognizedIdentifier {
                identifier: identifier.to_string(),
            })?;
        let dataset = self.fetch_dataset(&dataset_id).await?;
        let envelope = dataset.geo_extent.map(|extent| {
            Envelope::BoundingBox(BoundingBox::from_lon_lat(
                extent.west,
                extent.south,
                extent.east,
                extent.north,
            ))
        });
        let temporal = match (&dataset.min_date, &dataset.max_date) {
            (Some(min), Some(max)) => {
                let start = chrono::NaiveDate::parse_from_str(min, "%Y-%m-%d").ok();
                let end = chrono::NaiveDate::parse_from_str(max, "%Y-%m-%d").ok();
                match (start, end) {
                    (Some(start), Some(end)) => Some(crate::temporal::TimeInterval::closed(start, end)),
                    _ => None,
                }
            }
            _ => None,
        };
        Ok(ProviderMetadata {
            envelope,
            temporal,
            external_metadata_links: Vec::new(),
        })
    }

    async fn enumerate_files(
        &self,
        identifier: &Identifier,
    ) -> Result<Vec<FileDescriptor>, ExtentError> {
        let dataset_id = self
            .dataset_id(identifier)
            .ok_or_else(|| ExtentError::UnrecognizedIdentifier {
                identifier: identifier.to_string(),
            })?;
        let dataset = self.fetch_dataset(&dataset_id).await?;
        match dataset.download_url {
            Some(url) => {
                let mut descriptor = FileDescriptor::new(format!("PANGAEA.{dataset_id}.tab"), url);
                if let Some(size) = dataset.byte_size {
                    descriptor = descriptor.with_declared_size(size);
                }
                Ok(vec![descriptor])
            }
            None => Ok(vec![]),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn matches_pangaea_doi_case_insensitively() {
        let adapter = Pangaea::new(crate::http::shared_http_client(1), Duration::from_secs(5));
        let identifier = Identifier::normalize("10.1594/PANGAEA.123456").unwrap();
        assert!(adapter.matches(&identifier));
    }
}
