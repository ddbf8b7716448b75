//! Provider adapters (spec §4.1-§4.2): one implementation per repository
//! API family, dispatched by identifier shape.

pub mod ckan;
pub mod csw;
pub mod dataverse;
pub mod deims_sdr;
pub mod dryad;
pub mod dspace;
pub mod figshare;
pub mod gbif;
pub mod github;
pub mod invenio_rdm;
pub mod nfdi4earth;
pub mod osf;
pub mod pangaea;
pub mod registry_data;
pub mod stac;
pub mod zenodo;

use async_trait::async_trait;

use crate::descriptor::FileDescriptor;
use crate::envelope::Envelope;
use crate::errors::ExtentError;
use crate::identifier::Identifier;
use crate::temporal::TimeInterval;

/// Everything a provider can tell us without downloading a file: a
/// declared spatial/temporal extent (if any), plus any external metadata
/// records this one points at (spec §4.8, `follow_external_metadata_links`).
#[derive(Clone, Debug, Default)]
pub struct ProviderMetadata {
    pub envelope: Option<Envelope>,
    pub temporal: Option<TimeInterval>,
    /// Identifiers of related records in other repositories (e.g. a Zenodo
    /// record that names a GBIF dataset key). The orchestrator resolves
    /// these through the same registry, depth-capped.
    pub external_metadata_links: Vec<String>,
}

impl ProviderMetadata {
    /// True if this metadata carries no usable extent of its own — the
    /// orchestrator treats this as "metadata strategy came up empty" and
    /// falls through to downloading, per spec §4.8.
    pub fn is_empty(&self) -> bool {
        self.envelope.is_none() && self.temporal.is_none()
    }
}

/// The contract every provider implementation satisfies (spec §4.1's
/// "Provider Adapter").
///
/// Implementations are registered in priority order in a
/// [`ProviderRegistry`]; the first adapter whose [`matches`] returns true
/// for a given identifier is used — so more specific adapters (a bespoke
/// Zenodo adapter) must be registered ahead of more general ones (a
/// data-driven InvenioRDM entry matching the same host).
///
/// [`matches`]: ProviderAdapter::matches
#[async_trait]
pub trait ProviderAdapter: Send + Sync {
    /// A human-readable name used in error messages and metrics labels.
    fn friendly_name(&self) -> &str;

    /// True if this adapter claims responsibility for `identifier`.
    fn matches(&self, identifier: &Identifier) -> bool;

    /// True if this adapter can ever return non-empty metadata. Adapters
    /// fronting APIs with no notion of a declared extent (e.g. plain
    /// DSpace) return `false` so the orchestrator skips straight to
    /// downloading without wasting a request.
    fn supports_metadata(&self) -> bool {
        true
    }

    /// Fetch provider-declared metadata for `identifier`, if any.
    async fn fetch_metadata(
        &self,
        identifier: &Identifier,
    ) -> Result<ProviderMetadata, ExtentError>;

    /// Enumerate the files belonging to `identifier`, without fetching
    /// their contents.
    async fn enumerate_files(
        &self,
        identifier: &Identifier,
    ) -> Result<Vec<FileDescriptor>, ExtentError>;
}

/// An ordered collection of provider adapters, dispatched by first match.
pub struct ProviderRegistry {
    adapters: Vec<Box<dyn ProviderAdapter>>,
}

impl ProviderRegistry {
    pub fn new(adapters: Vec<Box<dyn ProviderAdapter>>) -> ProviderRegistry {
        ProviderRegistry { adapters }
    }

    /// The default registry: bespoke adapters first (most specific),
    /// family-base adapters last (most general), then the data-driven
    /// per-host family instantiations for the remaining providers named in
    /// the provider reference table.
    pub fn default_registry(client: crate::http::SharedHttpClient, request_timeout: std::time::Duration) -> ProviderRegistry {
        let mut adapters: Vec<Box<dyn ProviderAdapter>> = vec![
            Box::new(zenodo::Zenodo::new(client.clone(), request_timeout)),
            Box::new(figshare::Figshare::new(client.clone(), request_timeout)),
            Box::new(dryad::Dryad::new(client.clone(), request_timeout)),
            Box::new(pangaea::Pangaea::new(client.clone(), request_timeout)),
            Box::new(osf::Osf::new(client.clone(), request_timeout)),
            Box::new(gbif::Gbif::new(client.clone(), request_timeout)),
            Box::new(github::GitHub::new(client.clone(), request_timeout)),
            Box::new(deims_sdr::DeimsSdr::new(client.clone(), request_timeout)),
            Box::new(nfdi4earth::Nfdi4Earth::new(client.clone(), request_timeout)),
        ];
        adapters.extend(registry_data::data_driven_adapters(client, request_timeout));
        ProviderRegistry::new(adapters)
    }

    /// Find the first adapter that claims `identifier`.
    pub fn resolve(&self, identifier: &Identifier) -> Option<&dyn ProviderAdapter> {
        self.adapters
            .iter()
            .map(AsRef::as_ref)
            .find(|adapter| adapter.matches(identifier))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct AlwaysMatches;

    #[async_trait]
    impl ProviderAdapter for AlwaysMatches {
        fn friendly_name(&self) -> &str {
            "always"
        }
        fn matches(&self, _identifier: &Identifier) -> bool {
            true
        }
        async fn fetch_metadata(
            &self,
            _identifier: &Identifier,
        ) -> Result<ProviderMetadata, ExtentError> {
            Ok(ProviderMetadata::default())
        }
        async fn enumerate_files(
            &self,
            _identifier: &Identifier,
        ) -> Result<Vec<FileDescriptor>, ExtentError> {
            Ok(vec![])
        }
    }

    struct NeverMatches;

    #[async_trait]
    impl ProviderAdapter for NeverMatches {
        fn friendly_name(&self) -> &str {
            "never"
        }
        fn matches(&self, _identifier: &Identifier) -> bool {
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
            _identifier: &Identifier,
        ) -> Result<Vec<FileDescriptor>, ExtentError> {
            Ok(vec![])
        }
    }

    #[test]
    fn resolve_returns_first_matching_adapter_in_registration_order() {
        let registry = ProviderRegistry::new(vec![Box::new(NeverMatches), Box::new(AlwaysMatches)]);
        let identifier = Identifier::normalize("10.5281/zenodo.1234").unwrap();
        let resolved = registry.resolve(&identifier).unwrap();
        assert_eq!(resolved.friendly_name(), "always");
    }

    #[test]
    fn resolve_returns_none_when_nothing_matches() {
        let registry = ProviderRegistry::new(vec![Box::new(NeverMatches)]);
        let identifier = Identifier::normalize("10.5281/zenodo.1234").unwrap();
        assert!(registry.resolve(&identifier).is_none());
    }

    #[test]
    fn provider_metadata_with_no_envelope_or_temporal_is_empty() {
        assert!(ProviderMetadata::default().is_empty());
    }
}
