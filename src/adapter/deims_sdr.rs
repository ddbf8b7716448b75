//! DEIMS-SDR (Dynamic Ecological Information Management System - Site and
//! dataset Registry), identified by a `deims.org/<uuid>` URL or a
//! `10.25829/...` DOI. Sites declare a boundary polygon directly.

use std::time::Duration;

use async_trait::async_trait;
use lazy_static::lazy_static;
use regex::Regex;
use serde::Deserialize;

use crate::adapter::{ProviderAdapter, ProviderMetadata};
use crate::descriptor::FileDescriptor;
use crate::envelope::{ConvexHull, Envelope};
use crate::errors::ExtentError;
use crate::http::{json_request, SharedHttpClient};
use crate::identifier::Identifier;

lazy_static! {
    static ref URL_PATTERN: Regex = Regex::new(
        r"deims\.org/([0-9a-f]{8}-[0-9a-f]{4}-[0-9a-f]{4}-[0-9a-f]{4}-[0-9a-f]{12})"
    )
    .unwrap();
}

#[derive(Debug, Deserialize)]
struct DeimsSite {
    attributes: DeimsSiteAttributes,
}

#[derive(Debug, Deserialize)]
struct DeimsSiteAttributes {
    #[serde(default)]
    geography: Option<DeimsGeography>,
}

#[derive(Debug, Deserialize)]
struct DeimsGeography {
    #[serde(default)]
    boundaries: Option<DeimsBoundaries>,
}

#[derive(Debug, Deserialize)]
struct DeimsBoundaries {
    /// WKT `POLYGON((lon lat, lon lat, ...))`.
    #[serde(default)]
    value: Option<String>,
}

pub struct DeimsSdr {
    client: SharedHttpClient,
    timeout: Duration,
}

impl DeimsSdr {
    pub fn new(client: SharedHttpClient, timeout: Duration) -> DeimsSdr {
        DeimsSdr { client, timeout }
    }

    fn site_id(&self, identifier: &Identifier) -> Option<String> {
        URL_PATTERN
            .captures(identifier.as_str())
            .map(|caps| caps[1].to_owned())
    }
}

/// Parse the handful of WKT `POLYGON((...))` vertices DEIMS-SDR emits. Not
/// a general WKT parser -- just enough to pull `(lon, lat)` pairs out of
/// the one geometry type this provider sends.
fn parse_wkt_polygon_vertices(wkt: &str) -> Vec<(f64, f64)> {
    let start = match wkt.find("((") {
        Some(i) => i + 2,
        None => return Vec::new(),
    };
    let end = match wkt.rfind("))") {
        Some(i) => i,
        None => return Vec::new(),
    };
    if end <= start {
        return Vec::new();
    }
    wkt[start..end]
        .split(',')
        .filter_map(|pair| {
            let mut parts = pair.trim().split_whitespace();
            let lon = parts.next()?.parse::<f64>().ok()?;
            let lat = parts.next()?.parse::<f64>().ok()?;
            Some((lon, lat))
        })
        .collect()
}

#[async_trait]
impl ProviderAdapter for DeimsSdr {
    fn friendly_name(&self) -> &str {
        "DEIMS-SDR"
    }

    fn matches(&self, identifier: &Identifier) -> bool {
        self.site_id(identifier).is_some()
    }

    async fn fetch_metadata(
        &self,
        identifier: &Identifier,
    ) -> Result<ProviderMetadata, ExtentError> {
        let site_id = self
            .site_id(identifier)
            .ok_or_else(|| ExtentError::UnrecognizedIdentifier {
                identifier: identifier.to_string(),
            })?;
        let url = format!("https://deims.org/api/sites/{site_id}");
        let site: DeimsSite = json_request(&self.client, &url, self.friendly_name(), self.timeout).await?;
        let envelope = site
            .attributes
            .geography
            .and_then(|g| g.boundaries)
            .and_then(|b| b.value)
            .map(|wkt| parse_wkt_polygon_vertices(&wkt))
            .filter(|vertices| !vertices.is_empty())
            .map(|vertices| Envelope::ConvexHull(ConvexHull::from_points(&vertices)));
        Ok(ProviderMetadata {
            envelope,
            temporal: None,
            external_metadata_links: Vec::new(),
        })
    }

    async fn enumerate_files(
        &self,
        _identifier: &Identifier,
    ) -> Result<Vec<FileDescriptor>, ExtentError> {
        // DEIMS-SDR sites are ecological research sites, not file-bearing
        // datasets; there is nothing to download.
        Ok(vec![])
    }
}
