//! STAC (SpatioTemporal Asset Catalog), a family-base adapter: one instance
//! per STAC API root (e.g. Microsoft's Planetary Computer), matched by
//! host. STAC Items declare `bbox` and a `datetime`/`start_datetime`/
//! `end_datetime` triple directly, and list their files as `assets`. STAC
//! Collections (the shape returned by `.../collections/{id}` with no item
//! id) declare the same information nested under `extent.spatial.bbox[]`
//! and `extent.temporal.interval[]`, and have no per-file assets worth
//! enumerating. [`StacItem`] deserializes either shape; callers fall back
//! to the collection-shaped fields when the item-shaped ones are absent.

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
struct StacItem {
    #[serde(default)]
    bbox: Option<Vec<f64>>,
    #[serde(default)]
    properties: StacProperties,
    #[serde(default)]
    assets: std::collections::BTreeMap<String, StacAsset>,
    #[serde(default)]
    extent: Option<StacExtent>,
}

#[derive(Debug, Default, Deserialize)]
struct StacProperties {
    #[serde(default)]
    datetime: Option<String>,
    #[serde(default)]
    start_datetime: Option<String>,
    #[serde(default)]
    end_datetime: Option<String>,
}

/// A STAC Collection's `extent` object.
#[derive(Debug, Default, Deserialize)]
struct StacExtent {
    #[serde(default)]
    spatial: Option<StacSpatialExtent>,
    #[serde(default)]
    temporal: Option<StacTemporalExtent>,
}

#[derive(Debug, Default, Deserialize)]
struct StacSpatialExtent {
    #[serde(default)]
    bbox: Vec<Vec<f64>>,
}

#[derive(Debug, Default, Deserialize)]
struct StacTemporalExtent {
    #[serde(default)]
    interval: Vec<Vec<Option<String>>>,
}

#[derive(Debug, Deserialize)]
struct StacAsset {
    href: String,
    #[serde(default)]
    #[serde(rename = "file:size")]
    file_size: Option<u64>,
}

/// A STAC API root, identified by the host its item URLs resolve through.
pub struct Stac {
    base_url: String,
    client: SharedHttpClient,
    timeout: Duration,
    friendly_name: String,
}

impl Stac {
    pub fn new(base_url: impl Into<String>, client: SharedHttpClient, timeout: Duration) -> Stac {
        let base_url = base_url.into();
        let friendly_name = format!("STAC ({base_url})");
        Stac {
            base_url,
            client,
            timeout,
            friendly_name,
        }
    }

    async fn fetch_item(&self, item_path: &str) -> Result<StacItem, ExtentError> {
        let url = format!("{}/{}", self.base_url.trim_end_matches('/'), item_path.trim_start_matches('/'));
        json_request(&self.client, &url, &self.friendly_name, self.timeout).await
    }
}

fn parse_rfc3339_date(s: &str) -> Option<chrono::NaiveDate> {
    chrono::DateTime::parse_from_rfc3339(s)
        .ok()
        .map(|dt| dt.date_naive())
}

fn temporal_from_properties(properties: &StacProperties) -> Option<crate::temporal::TimeInterval> {
    if let Some(datetime) = &properties.datetime {
        let date = parse_rfc3339_date(datetime)?;
        return Some(crate::temporal::TimeInterval::closed(date, date));
    }
    match (&properties.start_datetime, &properties.end_datetime) {
        (Some(start), Some(end)) => {
            let start = parse_rfc3339_date(start)?;
            let end = parse_rfc3339_date(end)?;
            Some(crate::temporal::TimeInterval::closed(start, end))
        }
        (Some(start), None) => parse_rfc3339_date(start).map(crate::temporal::TimeInterval::starting_at),
        (None, Some(end)) => parse_rfc3339_date(end).map(crate::temporal::TimeInterval::ending_at),
        (None, None) => None,
    }
}

fn envelope_from_bbox(bbox: &[f64]) -> Option<Envelope> {
    match bbox {
        [min_lon, min_lat, max_lon, max_lat] => Some(Envelope::BoundingBox(
            BoundingBox::from_lon_lat(*min_lon, *min_lat, *max_lon, *max_lat),
        )),
        [min_lon, min_lat, _min_alt, max_lon, max_lat, _max_alt] => Some(Envelope::BoundingBox(
            BoundingBox::from_lon_lat(*min_lon, *min_lat, *max_lon, *max_lat),
        )),
        _ => None,
    }
}

/// The first spatial extent declared by a Collection's `extent.spatial.bbox`
/// (the overall extent is always the first entry; any further entries are
/// per-summary breakdowns we don't need).
fn envelope_from_extent(extent: &StacExtent) -> Option<Envelope> {
    let bbox = extent.spatial.as_ref()?.bbox.first()?;
    envelope_from_bbox(bbox)
}

/// The first temporal extent declared by a Collection's
/// `extent.temporal.interval`, where either end may be `null` for an
/// open-ended interval.
fn temporal_from_extent(extent: &StacExtent) -> Option<crate::temporal::TimeInterval> {
    let interval = extent.temporal.as_ref()?.interval.first()?;
    match interval.as_slice() {
        [Some(start), Some(end)] => {
            let start = parse_rfc3339_date(start)?;
            let end = parse_rfc3339_date(end)?;
            Some(crate::temporal::TimeInterval::closed(start, end))
        }
        [Some(start), None] => parse_rfc3339_date(start).map(crate::temporal::TimeInterval::starting_at),
        [None, Some(end)] => parse_rfc3339_date(end).map(crate::temporal::TimeInterval::ending_at),
        _ => None,
    }
}

#[async_trait]
impl ProviderAdapter for Stac {
    fn friendly_name(&self) -> &str {
        &self.friendly_name
    }

    fn matches(&self, _identifier: &Identifier) -> bool {
        // Host-scoped via `registry_data`; see `dataverse`'s note.
        false
    }

    async fn fetch_metadata(
        &self,
        identifier: &Identifier,
    ) -> Result<ProviderMetadata, ExtentError> {
        let item = self.fetch_item(identifier.as_str()).await?;
        let envelope = item
            .bbox
            .as_deref()
            .and_then(envelope_from_bbox)
            .or_else(|| item.extent.as_ref().and_then(envelope_from_extent));
        let temporal = temporal_from_properties(&item.properties)
            .or_else(|| item.extent.as_ref().and_then(temporal_from_extent));
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
        let item = self.fetch_item(identifier.as_str()).await?;
        Ok(item
            .assets
            .into_iter()
            .map(|(key, asset)| {
                let mut descriptor = FileDescriptor::new(key, asset.href);
                if let Some(size) = asset.file_size {
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
    use chrono::NaiveDate;

    #[test]
    fn three_d_bbox_is_reduced_to_its_2d_footprint() {
        let bbox = vec![-10.0, 40.0, 0.0, 10.0, 50.0, 100.0];
        let envelope = match bbox.as_slice() {
            [min_lon, min_lat, _min_alt, max_lon, max_lat, _max_alt] => {
                Envelope::BoundingBox(BoundingBox::from_lon_lat(*min_lon, *min_lat, *max_lon, *max_lat))
            }
            _ => panic!("unexpected shape"),
        };
        let result = envelope.bounding_box();
        assert_eq!(result.min_lon, -10.0);
        assert_eq!(result.max_lat, 50.0);
    }

    #[test]
    fn single_datetime_becomes_a_one_day_interval() {
        let properties = StacProperties {
            datetime: Some("2021-06-15T00:00:00Z".to_owned()),
            start_datetime: None,
            end_datetime: None,
        };
        let interval = temporal_from_properties(&properties).unwrap();
        assert_eq!(interval.start, interval.end);
    }

    #[test]
    fn collection_json_is_parsed_from_its_nested_extent() {
        let body = r#"{
            "type": "Collection",
            "id": "naip",
            "extent": {
                "spatial": {"bbox": [[-180.0, -90.0, 180.0, 90.0], [-124.8, 24.5, -66.9, 49.4]]},
                "temporal": {"interval": [["2010-01-01T00:00:00Z", null]]}
            }
        }"#;
        let item: StacItem = serde_json::from_str(body).unwrap();
        assert!(item.bbox.is_none());
        assert!(item.assets.is_empty());

        let envelope = item
            .bbox
            .as_deref()
            .and_then(envelope_from_bbox)
            .or_else(|| item.extent.as_ref().and_then(envelope_from_extent))
            .unwrap();
        let bbox = envelope.bounding_box();
        assert_eq!(bbox.min_lon, -180.0);
        assert_eq!(bbox.max_lon, 180.0);

        let temporal = temporal_from_properties(&item.properties)
            .or_else(|| item.extent.as_ref().and_then(temporal_from_extent))
            .unwrap();
        assert_eq!(temporal.start, NaiveDate::from_ymd_opt(2010, 1, 1).unwrap());
    }
}
