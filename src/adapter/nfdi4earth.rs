//! NFDI4Earth's Knowledge Hub, identified by a
//! `nfdi4earth.de/...resources/<uuid>` URL. Knowledge Hub entries describe
//! services and datasets across the earth-system-science community; most
//! carry no file payload of their own; this adapter exposes whatever
//! declared extent is present and defers file enumeration to whatever
//! `external_metadata_links` it surfaces.

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
    static ref URL_PATTERN: Regex = Regex::new(
        r"nfdi4earth\.de/[^?]*resources/([0-9a-f-]{36})"
    )
    .unwrap();
}

#[derive(Debug, Deserialize)]
struct KnowledgeHubResource {
    #[serde(default)]
    spatial_coverage: Option<KnowledgeHubBoundingBox>,
    #[serde(default)]
    related_resources: Vec<String>,
}

#[derive(Debug, Deserialize)]
struct KnowledgeHubBoundingBox {
    west: f64,
    south: f64,
    east: f64,
    north: f64,
}

pub struct Nfdi4Earth {
    client: SharedHttpClient,
    timeout: Duration,
}

impl Nfdi4Earth {
    pub fn new(client: SharedHttpClient, timeout: Duration) -> Nfdi4Earth {
        Nfdi4Earth { client, timeout }
    }

    fn resource_id(&self, identifier: &Identifier) -> Option<String> {
        URL_PATTERN
            .captures(identifier.as_str())
            .map(|caps| caps[1].to_owned())
    }
}

#[async_trait]
impl ProviderAdapter for Nfdi4Earth {
    fn friendly_name(&self) -> &str {
        "NFDI4Earth"
    }

    fn matches(&self, identifier: &Identifier) -> bool {
        self.resource_id(identifier).is_some()
    }

    async fn fetch_metadata(
        &self,
        identifier: &Identifier,
    ) -> Result<ProviderMetadata, ExtentError> {
        let resource_id = self
            .resource_id(identifier)
            .ok_or_else(|| ExtentError::UnrecognizedIdentifier {
                identifier: identifier.to_string(),
            })?;
        let url = format!("https://nfdi4earth.de/api/knowledgehub/resources/{resource_id}");
        let resource: KnowledgeHubResource =
            json_request(&self.client, &url, self.friendly_name(), self.timeout).await?;
        let envelope = resource.spatial_coverage.map(|bbox| {
            Envelope::BoundingBox(BoundingBox::from_lon_lat(
                bbox.west, bbox.south, bbox.east, bbox.north,
            ))
        });
        Ok(ProviderMetadata {
            envelope,
            temporal: None,
            external_metadata_links: resource.related_resources,
        })
    }

    async fn enumerate_files(
        &self,
        _identifier: &Identifier,
    ) -> Result<Vec<FileDescriptor>, ExtentError> {
        Ok(vec![])
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn matches_knowledge_hub_resource_url() {
        let adapter = Nfdi4Earth::new(crate::http::shared_http_client(1), Duration::from_secs(5));
        let identifier = Identifier::normalize(
            "https://nfdi4earth.de/portal/resources/4c2ab1dd-c35e-4f94-8db0-e5a5c4e5aa5b",
        )
        .unwrap();
        assert!(adapter.matches(&identifier));
    }
}
