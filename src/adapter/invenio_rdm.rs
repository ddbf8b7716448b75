//! Shared support for InvenioRDM-family repositories (Zenodo and its
//! self-hosted siblings), sharing a common `/api/records/{id}` JSON shape.

use std::time::Duration;

use serde::Deserialize;

use crate::descriptor::FileDescriptor;
use crate::envelope::{BoundingBox, Envelope};
use crate::errors::ExtentError;
use crate::http::{json_request, SharedHttpClient};

#[derive(Debug, Deserialize)]
pub struct InvenioRecord {
    #[serde(default)]
    pub metadata: InvenioMetadata,
    #[serde(default)]
    pub files: Vec<InvenioFile>,
}

#[derive(Debug, Default, Deserialize)]
pub struct InvenioMetadata {
    #[serde(default)]
    pub locations: Option<InvenioLocations>,
    #[serde(default)]
    pub dates: Vec<InvenioDateRange>,
}

#[derive(Debug, Deserialize)]
pub struct InvenioLocations {
    #[serde(default)]
    pub features: Vec<InvenioLocationFeature>,
}

#[derive(Debug, Deserialize)]
pub struct InvenioLocationFeature {
    #[serde(default)]
    pub geometry: Option<InvenioGeometry>,
}

#[derive(Debug, Deserialize)]
pub struct InvenioGeometry {
    #[serde(rename = "type")]
    pub kind: String,
    /// `[lon, lat]` for a `Point`, nested rings for a `Polygon`.
    pub coordinates: serde_json::Value,
}

#[derive(Debug, Deserialize)]
pub struct InvenioDateRange {
    #[serde(default)]
    pub r#type: Option<InvenioDateType>,
    #[serde(default)]
    pub date: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct InvenioDateType {
    #[serde(default)]
    pub id: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct InvenioFile {
    pub key: String,
    #[serde(default)]
    pub size: Option<u64>,
    #[serde(default)]
    pub links: Option<InvenioFileLinks>,
}

#[derive(Debug, Deserialize)]
pub struct InvenioFileLinks {
    #[serde(default)]
    pub content: Option<String>,
    #[serde(default)]
    pub download: Option<String>,
}

/// Fetch one record by numeric id from an InvenioRDM instance rooted at
/// `base_url` (e.g. `https://zenodo.org`).
pub async fn fetch_record(
    client: &SharedHttpClient,
    base_url: &str,
    record_id: &str,
    provider: &str,
    timeout: Duration,
) -> Result<InvenioRecord, ExtentError> {
    let url = format!("{base_url}/api/records/{record_id}");
    json_request(client, &url, provider, timeout).await
}

/// Extract a geographic point or polygon envelope from InvenioRDM's
/// GeoJSON-shaped `metadata.locations.features[].geometry`, if present.
pub fn envelope_from_record(record: &InvenioRecord) -> Option<Envelope> {
    let locations = record.metadata.locations.as_ref()?;
    let mut points: Vec<(f64, f64)> = Vec::new();
    for feature in &locations.features {
        if let Some(geometry) = &feature.geometry {
            collect_points(&geometry.coordinates, &mut points);
        }
    }
    if points.is_empty() {
        return None;
    }
    if points.len() == 1 {
        let (lon, lat) = points[0];
        return Some(Envelope::BoundingBox(BoundingBox::from_point(lon, lat)));
    }
    Some(Envelope::ConvexHull(
        crate::envelope::ConvexHull::from_points(&points),
    ))
}

fn collect_points(value: &serde_json::Value, out: &mut Vec<(f64, f64)>) {
    match value {
        serde_json::Value::Array(items) => {
            if items.len() == 2 && items.iter().all(|v| v.is_number()) {
                if let (Some(lon), Some(lat)) = (items[0].as_f64(), items[1].as_f64()) {
                    out.push((lon, lat));
                    return;
                }
            }
            for item in items {
                collect_points(item, out);
            }
        }
        _ => {}
    }
}

/// Extract a temporal interval from InvenioRDM's `metadata.dates`, using
/// the first `"coverage"`-typed entry that parses as an ISO interval
/// (`start/end` or a single date).
pub fn temporal_from_record(record: &InvenioRecord) -> Option<crate::temporal::TimeInterval> {
    for date_range in &record.metadata.dates {
        let is_coverage = date_range
            .r#type
            .as_ref()
            .and_then(|t| t.id.as_deref())
            .map(|id| id == "coverage" || id == "collected")
            .unwrap_or(false);
        if !is_coverage {
            continue;
        }
        if let Some(date_str) = &date_range.date {
            if let Some((start, end)) = date_str.split_once('/') {
                if let (Ok(start), Ok(end)) = (
                    chrono::NaiveDate::parse_from_str(start, "%Y-%m-%d"),
                    chrono::NaiveDate::parse_from_str(end, "%Y-%m-%d"),
                ) {
                    return Some(crate::temporal::TimeInterval::closed(start, end));
                }
            } else if let Ok(date) = chrono::NaiveDate::parse_from_str(date_str, "%Y-%m-%d") {
                return Some(crate::temporal::TimeInterval::closed(date, date));
            }
        }
    }
    None
}

/// Turn a record's file list into descriptors, preferring the `content`
/// link InvenioRDM issues over the legacy `download` one.
pub fn descriptors_from_record(record: &InvenioRecord) -> Vec<FileDescriptor> {
    record
        .files
        .iter()
        .filter_map(|file| {
            let url = file
                .links
                .as_ref()
                .and_then(|links| links.content.clone().or_else(|| links.download.clone()))?;
            let mut descriptor = FileDescriptor::new(file.key.clone(), url);
            if let Some(size) = file.size {
                descriptor = descriptor.with_declared_size(size);
            }
            Some(descriptor)
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn single_point_geometry_becomes_a_degenerate_bbox() {
        let record = InvenioRecord {
            metadata: InvenioMetadata {
                locations: Some(InvenioLocations {
                    features: vec![InvenioLocationFeature {
                        geometry: Some(InvenioGeometry {
                            kind: "Point".to_owned(),
                            coordinates: serde_json::json!([7.6, 51.9]),
                        }),
                    }],
                }),
                dates: vec![],
            },
            files: vec![],
        };
        let envelope = envelope_from_record(&record).unwrap();
        let bbox = envelope.bounding_box();
        assert_eq!(bbox.min_lon, 7.6);
        assert_eq!(bbox.min_lat, 51.9);
    }

    #[test]
    fn missing_locations_yields_no_envelope() {
        let record = InvenioRecord {
            metadata: InvenioMetadata::default(),
            files: vec![],
        };
        assert!(envelope_from_record(&record).is_none());
    }

    #[test]
    fn files_without_a_content_link_are_skipped() {
        let record = InvenioRecord {
            metadata: InvenioMetadata::default(),
            files: vec![InvenioFile {
                key: "data.csv".to_owned(),
                size: Some(100),
                links: None,
            }],
        };
        assert!(descriptors_from_record(&record).is_empty());
    }
}
