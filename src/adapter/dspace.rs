//! DSpace 7.x, a family-base adapter: one instance per installation (e.g.
//! TU Dresden's Opara), matched by host. DSpace's REST API has no notion of
//! a declared geospatial extent, so this adapter only ever contributes
//! files, never metadata (spec §4.6: "Adapters fronting APIs with no notion
//! of a declared extent ... return false" for `supports_metadata`).

use std::time::Duration;

use async_trait::async_trait;
use serde::Deserialize;

use crate::adapter::{ProviderAdapter, ProviderMetadata};
use crate::descriptor::FileDescriptor;
use crate::errors::ExtentError;
use crate::http::{json_request, SharedHttpClient};
use crate::identifier::Identifier;

#[derive(Debug, Deserialize)]
struct DSpaceItem {
    uuid: String,
}

#[derive(Debug, Deserialize)]
struct DSpaceSearchResponse {
    #[serde(rename = "_embedded")]
    embedded: DSpaceSearchEmbedded,
}

#[derive(Debug, Deserialize)]
struct DSpaceSearchEmbedded {
    #[serde(default)]
    #[serde(rename = "searchResult")]
    search_result: Option<DSpaceSearchResult>,
}

#[derive(Debug, Deserialize)]
struct DSpaceSearchResult {
    #[serde(default)]
    #[serde(rename = "_embedded")]
    embedded: Option<DSpaceSearchResultEmbedded>,
}

#[derive(Debug, Deserialize)]
struct DSpaceSearchResultEmbedded {
    #[serde(default)]
    #[serde(rename = "objects")]
    objects: Vec<DSpaceSearchObjectWrapper>,
}

#[derive(Debug, Deserialize)]
struct DSpaceSearchObjectWrapper {
    #[serde(rename = "_embedded")]
    embedded: DSpaceSearchObjectEmbedded,
}

#[derive(Debug, Deserialize)]
struct DSpaceSearchObjectEmbedded {
    #[serde(rename = "indexableObject")]
    indexable_object: DSpaceItem,
}

#[derive(Debug, Deserialize)]
struct DSpaceBundlesResponse {
    #[serde(rename = "_embedded")]
    embedded: DSpaceBundlesEmbedded,
}

#[derive(Debug, Deserialize)]
struct DSpaceBundlesEmbedded {
    #[serde(default)]
    bundles: Vec<DSpaceBundle>,
}

#[derive(Debug, Deserialize)]
struct DSpaceBundle {
    uuid: String,
}

#[derive(Debug, Deserialize)]
struct DSpaceBitstreamsResponse {
    #[serde(rename = "_embedded")]
    embedded: DSpaceBitstreamsEmbedded,
}

#[derive(Debug, Deserialize)]
struct DSpaceBitstreamsEmbedded {
    #[serde(default)]
    bitstreams: Vec<DSpaceBitstream>,
}

#[derive(Debug, Deserialize)]
struct DSpaceBitstream {
    name: String,
    #[serde(default)]
    #[serde(rename = "sizeBytes")]
    size_bytes: Option<u64>,
    uuid: String,
}

/// A DSpace 7.x installation, identified by the hostname its handles resolve
/// through (e.g. `opara.zih.tu-dresden.de`).
pub struct DSpace {
    host: String,
    client: SharedHttpClient,
    timeout: Duration,
    friendly_name: String,
}

impl DSpace {
    pub fn new(host: impl Into<String>, client: SharedHttpClient, timeout: Duration) -> DSpace {
        let host = host.into();
        let friendly_name = format!("DSpace ({host})");
        DSpace {
            host,
            client,
            timeout,
            friendly_name,
        }
    }

    /// Resolve a handle (`prefix/suffix`, as carried by a DOI's suffix or a
    /// bare handle identifier) to the item's internal UUID via the search
    /// endpoint, since bitstream enumeration needs the UUID, not the handle.
    async fn resolve_uuid(&self, handle: &str) -> Result<String, ExtentError> {
        let url = format!(
            "https://{}/server/api/discover/search/objects?query=handle:{}",
            self.host,
            handle.replace('/', "%2F")
        );
        let response: DSpaceSearchResponse =
            json_request(&self.client, &url, &self.friendly_name, self.timeout).await?;
        response
            .embedded
            .search_result
            .and_then(|r| r.embedded)
            .and_then(|e| e.objects.into_iter().next())
            .map(|o| o.embedded.indexable_object.uuid)
            .ok_or_else(|| ExtentError::ProviderPermanent {
                provider: self.friendly_name.clone(),
                message: format!("no item found for handle {handle}"),
            })
    }

    async fn bundle_uuids(&self, item_uuid: &str) -> Result<Vec<String>, ExtentError> {
        let url = format!(
            "https://{}/server/api/core/items/{item_uuid}/bundles",
            self.host
        );
        let response: DSpaceBundlesResponse =
            json_request(&self.client, &url, &self.friendly_name, self.timeout).await?;
        Ok(response.embedded.bundles.into_iter().map(|b| b.uuid).collect())
    }

    async fn bitstreams(&self, bundle_uuid: &str) -> Result<Vec<DSpaceBitstream>, ExtentError> {
        let url = format!(
            "https://{}/server/api/core/bundles/{bundle_uuid}/bitstreams",
            self.host
        );
        let response: DSpaceBitstreamsResponse =
            json_request(&self.client, &url, &self.friendly_name, self.timeout).await?;
        Ok(response.embedded.bitstreams)
    }
}

#[async_trait]
impl ProviderAdapter for DSpace {
    fn friendly_name(&self) -> &str {
        &self.friendly_name
    }

    fn matches(&self, _identifier: &Identifier) -> bool {
        // Host-scoped via `registry_data`; see `dataverse`'s note.
        false
    }

    fn supports_metadata(&self) -> bool {
        false
    }

    async fn fetch_metadata(
        &self,
        _identifier: &Identifier,
    ) -> Result<ProviderMetadata, ExtentError> {
        Ok(ProviderMetadata::default())
    }

    async fn enumerate_files(
        &self,
        identifier: &Identifier,
    ) -> Result<Vec<FileDescriptor>, ExtentError> {
        let item_uuid = self.resolve_uuid(identifier.as_str()).await?;
        let mut descriptors = Vec::new();
        for bundle_uuid in self.bundle_uuids(&item_uuid).await? {
            for bitstream in self.bitstreams(&bundle_uuid).await? {
                let url = format!(
                    "https://{}/server/api/core/bitstreams/{}/content",
                    self.host, bitstream.uuid
                );
                let mut descriptor = FileDescriptor::new(bitstream.name, url);
                if let Some(size) = bitstream.size_bytes {
                    descriptor = descriptor.with_declared_size(size);
                }
                descriptors.push(descriptor);
            }
        }
        Ok(descriptors)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn does_not_self_match_until_wrapped_by_registry_data() {
        let adapter = DSpace::new("opara.zih.tu-dresden.de", crate::http::shared_http_client(1), Duration::from_secs(5));
        let identifier = Identifier::normalize("10.25532/OPARA-581").unwrap();
        assert!(!adapter.matches(&identifier));
    }

    #[test]
    fn never_claims_to_support_metadata() {
        let adapter = DSpace::new("opara.zih.tu-dresden.de", crate::http::shared_http_client(1), Duration::from_secs(5));
        assert!(!adapter.supports_metadata());
    }
}
