//! GBIF, identified by a `10.15468/<suffix>` DOI or a raw dataset UUID.
//! GBIF datasets declare a geographic coverage bounding box and a temporal
//! coverage directly in their metadata record.

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
    static ref DOI_PATTERN: Regex = Regex::new(r"^10\.15468/[a-z0-9]+$").unwrap();
    static ref UUID_PATTERN: Regex = Regex::new(
        r"^[0-9a-f]{8}-[0-9a-f]{4}-[0-9a-f]{4}-[0-9a-f]{4}-[0-9a-f]{12}$"
    )
    .unwrap();
}

#[derive(Debug, Deserialize)]
struct GbifDataset {
    key: String,
    #[serde(default)]
    geographic_coverages: Vec<GbifGeographicCoverage>,
    #[serde(default)]
    temporal_coverages: Vec<GbifTemporalCoverage>,
    #[serde(default)]
    endpoints: Vec<GbifEndpoint>,
}

#[derive(Debug, Deserialize)]
struct GbifGeographicCoverage {
    #[serde(default)]
    bounding_box: Option<GbifBoundingBox>,
}

#[derive(Debug, Deserialize)]
struct GbifBoundingBox {
    min_latitude: f64,
    max_latitude: f64,
    min_longitude: f64,
    max_longitude: f64,
}

#[derive(Debug, Deserialize)]
struct GbifTemporalCoverage {
    #[serde(default)]
    start: Option<String>,
    #[serde(default)]
    end: Option<String>,
}

#[derive(Debug, Deserialize)]
struct GbifEndpoint {
    #[serde(rename = "type")]
    kind: String,
    url: String,
}

pub struct Gbif {
    client: SharedHttpClient,
    timeout: Duration,
}

impl Gbif {
    pub fn new(client: SharedHttpClient, timeout: Duration) -> Gbif {
        Gbif { client, timeout }
    }

    async fn resolve_dataset_key(&self, identifier: &Identifier) -> Result<String, ExtentError> {
        let s = identifier.as_str();
        if UUID_PATTERN.is_match(s) {
            return Ok(s.to_owned());
        }
        // A DOI must be resolved through GBIF's DOI lookup endpoint to get
        // the dataset UUID.
        let url = format!("https://api.gbif.org/v1/dataset/doi/{s}");
        #[derive(Deserialize)]
        struct DoiLookup {
            results: Vec<GbifDataset>,
        }
        let lookup: DoiLookup = json_request(&self.client, &url, self.friendly_name(), self.timeout).await?;
        lookup
            .results
            .into_iter()
            .next()
            .map(|d| d.key)
            .ok_or_else(|| ExtentError::UnrecognizedIdentifier {
                identifier: identifier.to_string(),
            })
    }

    async fn fetch_dataset(&self, key: &str) -> Result<GbifDataset, ExtentError> {
        let url = format!("https://api.gbif.org/v1/dataset/{key}");
        json_request(&self.client, &url, self.friendly_name(), self.timeout).await
    }
}

#[async_trait]
impl ProviderAdapter for Gbif {
    fn friendly_name(&self) -> &str {
        "GBIF"
    }

    fn matches(&self, identifier: &Identifier) -> bool {
        let s = identifier.as_str();
        DOI_PATTERN.is_match(s) || UUID_PATTERN.is_match(s)
    }

    async fn fetch_metadata(
        &self,
        identifier: &Identifier,
    ) -> Result<ProviderMetadata, ExtentError> {
        let key = self.resolve_dataset_key(identifier).await?;
        let dataset = self.fetch_dataset(&key).await?;
        let envelope = dataset
            .geographic_coverages
            .iter()
            .find_map(|cov| cov.bounding_box.as_ref())
            .map(|bbox| {
                Envelope::BoundingBox(BoundingBox::from_lon_lat(
                    bbox.min_longitude,
                    bbox.min_latitude,
                    bbox.max_longitude,
                    bbox.max_latitude,
                ))
            });
        let temporal = dataset.temporal_coverages.iter().find_map(|cov| {
            let start = cov
                .start
                .as_deref()
                .and_then(|s| chrono::NaiveDate::parse_from_str(s, "%Y-%m-%d").ok());
            let end = cov
                .end
                .as_deref()
                .and_then(|s| chrono::NaiveDate::parse_from_str(s, "%Y-%m-%d").ok());
            match (start, end) {
                (Some(start), Some(end)) => Some(crate::temporal::TimeInterval::closed(start, end)),
                (Some(start), None) => Some(crate::temporal::TimeInterval::starting_at(start)),
                (None, Some(end)) => Some(crate::temporal::TimeInterval::ending_at(end)),
                (None, None) => None,
            }
        });
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
        let key = self.resolve_dataset_key(identifier).await?;
        let dataset = self.fetch_dataset(&key).await?;
        Ok(dataset
            .endpoints
            .into_iter()
            .filter(|e| e.kind == "DWC_ARCHIVE")
            .map(|e| FileDescriptor::new(format!("{key}.zip"), e.url))
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn matches_raw_uuid() {
        let adapter = Gbif::new(crate::http::shared_http_client(1), Duration::from_secs(5));
        let identifier =
            Identifier::normalize("38b4c89f-584f-4f8c-9d3b-1cfe9dc267d6").unwrap();
        assert!(adapter.matches(&identifier));
    }

    #[test]
    fn matches_gbif_doi() {
        let adapter = Gbif::new(crate::http::shared_http_client(1), Duration::from_secs(5));
        let identifier = Identifier::normalize("10.15468/dl.abc123").unwrap();
        assert!(adapter.matches(&identifier));
    }
}
