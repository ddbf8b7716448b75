//! CKAN, a family-base adapter: one instance per CKAN portal (e.g.
//! data.gov.uk), matched by host, all sharing the
//! `/api/3/action/package_show` JSON shape. Spatial extent, when present,
//! rides in the `extras` array as a GeoJSON-encoded string under the key
//! `spatial` (the de facto convention CKAN's spatial extension uses).

use std::time::Duration;

use async_trait::async_trait;
use serde::Deserialize;

use crate::adapter::{ProviderAdapter, ProviderMetadata};
use crate::descriptor::FileDescriptor;
use crate::envelope::{ConvexHull, Envelope};
use crate::errors::ExtentError;
use crate::http::{json_request, SharedHttpClient};
use crate::identifier::Identifier;

#[derive(Debug, Deserialize)]
struct CkanResponse {
    result: CkanPackage,
}

#[derive(Debug, Deserialize)]
struct CkanPackage {
    #[serde(default)]
    extras: Vec<CkanExtra>,
    #[serde(default)]
    resources: Vec<CkanResource>,
}

#[derive(Debug, Deserialize)]
struct CkanExtra {
    key: String,
    value: String,
}

#[derive(Debug, Deserialize)]
struct CkanResource {
    name: Option<String>,
    url: String,
    #[serde(default)]
    size: Option<serde_json::Value>,
}

pub struct Ckan {
    host: String,
    client: SharedHttpClient,
    timeout: Duration,
    friendly_name: String,
}

impl Ckan {
    pub fn new(host: impl Into<String>, client: SharedHttpClient, timeout: Duration) -> Ckan {
        let host = host.into();
        let friendly_name = format!("CKAN ({host})");
        Ckan {
            host,
            client,
            timeout,
            friendly_name,
        }
    }

    async fn fetch_package(&self, package_id: &str) -> Result<CkanPackage, ExtentError> {
        let url = format!(
            "https://{}/api/3/action/package_show?id={}",
            self.host, package_id
        );
        let response: CkanResponse =
            json_request(&self.client, &url, &self.friendly_name, self.timeout).await?;
        Ok(response.result)
    }
}

fn spatial_envelope(package: &CkanPackage) -> Option<Envelope> {
    let spatial_json = package
        .extras
        .iter()
        .find(|extra| extra.key == "spatial")?
        .value
        .clone();
    let geometry: geojson::Geometry = spatial_json.parse().ok()?;
    let mut points = Vec::new();
    collect_geojson_points(&geometry.value, &mut points);
    if points.is_empty() {
        None
    } else {
        Some(Envelope::ConvexHull(ConvexHull::from_points(&points)))
    }
}

fn collect_geojson_points(value: &geojson::Value, out: &mut Vec<(f64, f64)>) {
    use geojson::Value::*;
    match value {
        Point(p) => {
            if p.len() >= 2 {
                out.push((p[0], p[1]));
            }
        }
        MultiPoint(points) | LineString(points) => {
            for p in points {
                if p.len() >= 2 {
                    out.push((p[0], p[1]));
                }
            }
        }
        Polygon(rings) | MultiLineString(rings) => {
            for ring in rings {
                for p in ring {
                    if p.len() >= 2 {
                        out.push((p[0], p[1]));
                    }
                }
            }
        }
        MultiPolygon(polygons) => {
            for polygon in polygons {
                for ring in polygon {
                    for p in ring {
                        if p.len() >= 2 {
                            out.push((p[0], p[1]));
                        }
                    }
                }
            }
        }
        GeometryCollection(geometries) => {
            for geometry in geometries {
                collect_geojson_points(&geometry.value, out);
            }
        }
    }
}

#[async_trait]
impl ProviderAdapter for Ckan {
    fn friendly_name(&self) -> &str {
        &self.friendly_name
    }

    fn matches(&self, _identifier: &Identifier) -> bool {
        // Matching is host-scoped by `registry_data`'s per-instance
        // configuration; by construction this adapter is only consulted
        // for identifiers already routed to this CKAN installation.
        false
    }

    async fn fetch_metadata(
        &self,
        identifier: &Identifier,
    ) -> Result<ProviderMetadata, ExtentError> {
        let package = self.fetch_package(identifier.as_str()).await?;
        Ok(ProviderMetadata {
            envelope: spatial_envelope(&package),
            temporal: None,
            external_metadata_links: Vec::new(),
        })
    }

    async fn enumerate_files(
        &self,
        identifier: &Identifier,
    ) -> Result<Vec<FileDescriptor>, ExtentError> {
        let package = self.fetch_package(identifier.as_str()).await?;
        Ok(package
            .resources
            .into_iter()
            .map(|resource| {
                let name = resource.name.unwrap_or_else(|| resource.url.clone());
                let mut descriptor = FileDescriptor::new(name, resource.url);
                if let Some(size) = resource.size.and_then(|v| v.as_u64()) {
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
    fn extracts_spatial_extent_from_geojson_extra() {
        let package = CkanPackage {
            extras: vec![CkanExtra {
                key: "spatial".to_owned(),
                value: r#"{"type":"Point","coordinates":[-0.1,51.5]}"#.to_owned(),
            }],
            resources: vec![],
        };
        let envelope = spatial_envelope(&package).unwrap();
        let bbox = envelope.bounding_box();
        assert_eq!(bbox.min_lon, -0.1);
        assert_eq!(bbox.min_lat, 51.5);
    }

    #[test]
    fn missing_spatial_extra_yields_no_envelope() {
        let package = CkanPackage {
            extras: vec![],
            resources: vec![],
        };
        assert!(spatial_envelope(&package).is_none());
    }
}
