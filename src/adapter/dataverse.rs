//! Dataverse, a family-base adapter: one instance per installation (e.g.
//! Harvard Dataverse, a university's own Dataverse), matched by host, all
//! sharing the same `/api/datasets/:persistentId/` JSON shape.

use std::time::Duration;

use async_trait::async_trait;
use serde::Deserialize;

use crate::adapter::{ProviderAdapter, ProviderMetadata};
use crate::descriptor::FileDescriptor;
use crate::envelope::{BoundingBox, Envelope};
use crate::errors::ExtentError;
use crate::http::{json_request, SharedHttpClient};
use crate::identifier::Identifier;

#[derive(Debug, Deserialize)]
struct DataverseResponse {
    data: DataverseDatasetData,
}

#[derive(Debug, Deserialize)]
struct DataverseDatasetData {
    #[serde(rename = "latestVersion")]
    latest_version: DataverseVersion,
}

#[derive(Debug, Deserialize)]
struct DataverseVersion {
    #[serde(rename = "metadataBlocks")]
    metadata_blocks: DataverseMetadataBlocks,
    #[serde(default)]
    files: Vec<DataverseFile>,
}

#[derive(Debug, Default, Deserialize)]
struct DataverseMetadataBlocks {
    #[serde(default)]
    geospatial: Option<DataverseGeospatialBlock>,
}

#[derive(Debug, Deserialize)]
struct DataverseGeospatialBlock {
    fields: Vec<DataverseField>,
}

#[derive(Debug, Deserialize)]
struct DataverseField {
    #[serde(rename = "typeName")]
    type_name: String,
    value: serde_json::Value,
}

#[derive(Debug, Deserialize)]
struct DataverseFile {
    label: String,
    #[serde(rename = "dataFile")]
    data_file: DataverseDataFile,
}

#[derive(Debug, Deserialize)]
struct DataverseDataFile {
    id: u64,
    #[serde(default)]
    filesize: Option<u64>,
}

/// A Dataverse installation, identified by the hostname its persistent IDs
/// resolve through (e.g. `dataverse.harvard.edu`).
pub struct Dataverse {
    host: String,
    client: SharedHttpClient,
    timeout: Duration,
    friendly_name: String,
}

impl Dataverse {
    pub fn new(host: impl Into<String>, client: SharedHttpClient, timeout: Duration) -> Dataverse {
        let host = host.into();
        let friendly_name = format!("Dataverse ({host})");
        Dataverse {
            host,
            client,
            timeout,
            friendly_name,
        }
    }

    async fn fetch_geospatial_block(
        &self,
        identifier: &Identifier,
    ) -> Result<DataverseVersion, ExtentError> {
        let url = format!(
            "https://{}/api/datasets/:persistentId/?persistentId={}",
            self.host,
            identifier.as_str()
        );
        let response: DataverseResponse =
            json_request(&self.client, &url, &self.friendly_name, self.timeout).await?;
        Ok(response.data.latest_version)
    }
}

fn geospatial_bbox(block: &DataverseGeospatialBlock) -> Option<Envelope> {
    let mut west = None;
    let mut east = None;
    let mut north = None;
    let mut south = None;
    for field in &block.fields {
        match field.type_name.as_str() {
            "westLongitude" => west = field.value.as_str().and_then(|s| s.parse::<f64>().ok()),
            "eastLongitude" => east = field.value.as_str().and_then(|s| s.parse::<f64>().ok()),
            "northLatitude" => north = field.value.as_str().and_then(|s| s.parse::<f64>().ok()),
            "southLatitude" => south = field.value.as_str().and_then(|s| s.parse::<f64>().ok()),
            _ => {}
        }
    }
    match (west, south, east, north) {
        (Some(west), Some(south), Some(east), Some(north)) => {
            Some(Envelope::BoundingBox(BoundingBox::from_lon_lat(west, south, east, north)))
        }
        _ => None,
    }
}

#[async_trait]
impl ProviderAdapter for Dataverse {
    fn friendly_name(&self) -> &str {
        &self.friendly_name
    }

    fn matches(&self, _identifier: &Identifier) -> bool {
        // Routing a DOI to a specific Dataverse installation requires
        // knowing that installation's DOI prefix; `registry_data` wraps
        // this adapter with that host-specific matcher, so this base
        // adapter is never consulted for `matches` directly.
        false
    }

    async fn fetch_metadata(
        &self,
        identifier: &Identifier,
    ) -> Result<ProviderMetadata, ExtentError> {
        let version = self.fetch_geospatial_block(identifier).await?;
        let envelope = version
            .metadata_blocks
            .geospatial
            .as_ref()
            .and_then(geospatial_bbox);
        Ok(ProviderMetadata {
            envelope,
            temporal: None,
            external_metadata_links: Vec::new(),
        })
    }

    async fn enumerate_files(
        &self,
        identifier: &Identifier,
    ) -> Result<Vec<FileDescriptor>, ExtentError> {
        let version = self.fetch_geospatial_block(identifier).await?;
        Ok(version
            .files
            .into_iter()
            .map(|file| {
                let url = format!(
                    "https://{}/api/access/datafile/{}",
                    self.host, file.data_file.id
                );
                let mut descriptor = FileDescriptor::new(file.label, url);
                if let Some(size) = file.data_file.filesize {
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
    fn extracts_bounding_box_from_geospatial_fields() {
        let block = DataverseGeospatialBlock {
            fields: vec![
                DataverseField {
                    type_name: "westLongitude".to_owned(),
                    value: serde_json::json!("-10.0"),
                },
                DataverseField {
                    type_name: "eastLongitude".to_owned(),
                    value: serde_json::json!("10.0"),
                },
                DataverseField {
                    type_name: "northLatitude".to_owned(),
                    value: serde_json::json!("50.0"),
                },
                DataverseField {
                    type_name: "southLatitude".to_owned(),
                    value: serde_json::json!("40.0"),
                },
            ],
        };
        let envelope = geospatial_bbox(&block).unwrap();
        let bbox = envelope.bounding_box();
        assert_eq!(bbox.min_lon, -10.0);
        assert_eq!(bbox.max_lat, 50.0);
    }

    #[test]
    fn incomplete_geospatial_fields_yield_no_envelope() {
        let block = DataverseGeospatialBlock {
            fields: vec![DataverseField {
                type_name: "westLongitude".to_owned(),
                value: serde_json::json!("-10.0"),
            }],
        };
        assert!(geospatial_bbox(&block).is_none());
    }
}
