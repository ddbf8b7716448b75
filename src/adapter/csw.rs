//! CSW (OGC Catalog Service for the Web), a family-base adapter: one
//! instance per CSW endpoint, matched by host. Unlike the other families,
//! CSW speaks XML (`GetRecordById`), so this adapter extracts just the
//! `ows:BoundingBox` corners out of the response rather than deserializing
//! the full ISO 19139 record.

use std::time::Duration;

use async_trait::async_trait;
use quick_xml::events::Event;
use quick_xml::Reader;

use crate::adapter::{ProviderAdapter, ProviderMetadata};
use crate::descriptor::FileDescriptor;
use crate::envelope::{BoundingBox, Envelope};
use crate::errors::ExtentError;
use crate::http::SharedHttpClient;
use crate::identifier::Identifier;

/// A CSW endpoint, identified by the host its `GetRecordById` requests
/// resolve through.
pub struct Csw {
    endpoint_url: String,
    client: SharedHttpClient,
    timeout: Duration,
    friendly_name: String,
}

impl Csw {
    pub fn new(endpoint_url: impl Into<String>, client: SharedHttpClient, timeout: Duration) -> Csw {
        let endpoint_url = endpoint_url.into();
        let friendly_name = format!("CSW ({endpoint_url})");
        Csw {
            endpoint_url,
            client,
            timeout,
            friendly_name,
        }
    }

    async fn fetch_record_xml(&self, record_id: &str) -> Result<String, ExtentError> {
        let url = format!(
            "{}?service=CSW&version=2.0.2&request=GetRecordById&id={}&outputSchema=http://www.isotc211.org/2005/gmd&elementSetName=full",
            self.endpoint_url, record_id
        );
        let req = hyper::Request::builder()
            .method("GET")
            .uri(url.as_str())
            .body(hyper::Body::empty())
            .map_err(|err| ExtentError::ProviderPermanent {
                provider: self.friendly_name.clone(),
                message: err.to_string(),
            })?;
        let response = tokio::time::timeout(self.timeout, self.client.request(req))
            .await
            .map_err(|_| ExtentError::ProviderTransient {
                provider: self.friendly_name.clone(),
                message: "request timed out".to_owned(),
            })?
            .map_err(|err| ExtentError::ProviderTransient {
                provider: self.friendly_name.clone(),
                message: err.to_string(),
            })?;
        if !response.status().is_success() {
            return Err(ExtentError::ProviderPermanent {
                provider: self.friendly_name.clone(),
                message: format!("{} from CSW endpoint", response.status()),
            });
        }
        let bytes = hyper::body::to_bytes(response.into_body())
            .await
            .map_err(|err| ExtentError::ProviderTransient {
                provider: self.friendly_name.clone(),
                message: err.to_string(),
            })?;
        String::from_utf8(bytes.to_vec()).map_err(|err| ExtentError::DecodeFailed {
            name: format!("CSW record {record_id}: {err}"),
        })
    }
}

/// Pull the first `ows:LowerCorner`/`ows:UpperCorner` pair (a space-separated
/// `"lat lon"` pair, per OGC convention) out of a CSW/ISO 19139 XML record.
fn extract_bounding_box(xml: &str) -> Option<Envelope> {
    let mut reader = Reader::from_str(xml);
    reader.trim_text(true);
    let mut buf = Vec::new();
    let mut lower: Option<(f64, f64)> = None;
    let mut upper: Option<(f64, f64)> = None;
    let mut in_lower = false;
    let mut in_upper = false;

    loop {
        match reader.read_event_into(&mut buf) {
            Ok(Event::Start(ref e)) => {
                let local = local_name(e.name().as_ref());
                in_lower = local == "LowerCorner";
                in_upper = local == "UpperCorner";
            }
            Ok(Event::Text(e)) => {
                if in_lower || in_upper {
                    let text = e.unescape().ok()?.into_owned();
                    let mut parts = text.split_whitespace();
                    let lat = parts.next()?.parse::<f64>().ok()?;
                    let lon = parts.next()?.parse::<f64>().ok()?;
                    if in_lower {
                        lower = Some((lon, lat));
                    } else {
                        upper = Some((lon, lat));
                    }
                }
            }
            Ok(Event::Eof) => break,
            Err(_) => return None,
            _ => {}
        }
        buf.clear();
        if lower.is_some() && upper.is_some() {
            break;
        }
    }

    match (lower, upper) {
        (Some((min_lon, min_lat)), Some((max_lon, max_lat))) => Some(Envelope::BoundingBox(
            BoundingBox::from_lon_lat(min_lon, min_lat, max_lon, max_lat),
        )),
        _ => None,
    }
}

fn local_name(qualified: &[u8]) -> String {
    let s = String::from_utf8_lossy(qualified);
    s.rsplit(':').next().unwrap_or(&s).to_owned()
}

#[async_trait]
impl ProviderAdapter for Csw {
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
        let xml = self.fetch_record_xml(identifier.as_str()).await?;
        Ok(ProviderMetadata {
            envelope: extract_bounding_box(&xml),
            temporal: None,
            external_metadata_links: Vec::new(),
        })
    }

    async fn enumerate_files(
        &self,
        _identifier: &Identifier,
    ) -> Result<Vec<FileDescriptor>, ExtentError> {
        // CSW is a metadata catalog protocol; it has no standard notion of
        // enumerable data files independent of the linked resource's own
        // distribution format, which varies per catalog.
        Ok(vec![])
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn extracts_bounding_box_from_ows_corners() {
        let xml = r#"
            <gmd:EX_GeographicBoundingBox>
                <ows:LowerCorner>40.0 -10.0</ows:LowerCorner>
                <ows:UpperCorner>50.0 10.0</ows:UpperCorner>
            </gmd:EX_GeographicBoundingBox>
        "#;
        let envelope = extract_bounding_box(xml).unwrap();
        let bbox = envelope.bounding_box();
        assert_eq!(bbox.min_lat, 40.0);
        assert_eq!(bbox.min_lon, -10.0);
        assert_eq!(bbox.max_lat, 50.0);
        assert_eq!(bbox.max_lon, 10.0);
    }

    #[test]
    fn missing_corners_yield_no_envelope() {
        let xml = "<gmd:MD_Metadata></gmd:MD_Metadata>";
        assert!(extract_bounding_box(xml).is_none());
    }
}
