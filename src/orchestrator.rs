//! The Extraction Orchestrator (spec §4.8): the state machine that turns
//! one identifier into an [`ExtractionResult`], dispatching between the
//! metadata and download strategies per [`StrategyPreference`], and
//! [`extract_batch`], which runs a list of identifiers and merges them.

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use tracing::{info, instrument, warn};

use crate::adapter::{ProviderAdapter, ProviderMetadata, ProviderRegistry};
use crate::budget;
use crate::config::{RunConfig, StrategyPreference};
use crate::download::{CancellationToken, Pool};
use crate::envelope::Envelope;
use crate::errors::ExtentError;
use crate::identifier::Identifier;
use crate::merge;
use crate::temporal::TimeInterval;

/// The per-format geospatial decoder boundary (spec §1 Non-goals: "per-format
/// geospatial decoders ... are treated as black boxes with defined
/// interfaces"). This crate defines the interface; concrete implementations
/// (shapefile, GeoTIFF, GeoJSON, ...) are supplied by the caller.
pub trait FileExtentDecoder: Send + Sync {
    /// Probe one local file and return its envelope and, if the format
    /// carries one, its temporal extent. `assume_wgs84` is threaded through
    /// for ungeoreferenced rasters that legitimately need it (spec §4.8).
    fn decode(
        &self,
        local_path: &std::path::Path,
        assume_wgs84: bool,
    ) -> Result<Option<(Envelope, Option<TimeInterval>)>, ExtentError>;
}

/// A decoder that never recognizes anything. The default when a caller
/// doesn't supply one — downloaded files are then fetched and archive-
/// expanded, but contribute no extent, which in practice means a run under
/// `download-only` (with no decoder configured) always ends in
/// [`ExtentError::EmptyResult`] unless `metadata_fallback_enabled` rescues
/// it under `auto`.
#[derive(Default)]
pub struct NullDecoder;

impl FileExtentDecoder for NullDecoder {
    fn decode(
        &self,
        _local_path: &std::path::Path,
        _assume_wgs84: bool,
    ) -> Result<Option<(Envelope, Option<TimeInterval>)>, ExtentError> {
        Ok(None)
    }
}

/// The strategy that actually produced a successful [`ExtractionResult`].
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum StrategyUsed {
    Metadata,
    Download,
    MetadataFallback,
}

/// One file's contribution to the merged extent, kept around for callers
/// that want to show their work.
#[derive(Clone, Debug)]
pub struct PerFileDetail {
    pub name: String,
    pub envelope: Option<Envelope>,
}

/// The outcome of extracting one identifier.
#[derive(Clone, Debug)]
pub struct ExtractionResult {
    pub identifier: String,
    /// `None` when `config.extract_spatial` is false, or when a metadata
    /// record only had a temporal interval to offer.
    pub envelope: Option<Envelope>,
    /// Always 4326 (WGS84); carried explicitly since callers serialize this
    /// alongside the envelope.
    pub crs_epsg: u32,
    pub temporal: Option<TimeInterval>,
    pub strategy_used: StrategyUsed,
    pub provider: String,
    pub warnings: Vec<String>,
    pub per_file_details: Option<Vec<PerFileDetail>>,
    /// Set when the run's deadline elapsed before completion and this
    /// result was assembled from whatever was collected before cancellation
    /// propagated to the download pool (spec §5: "partial per-file results
    /// collected so far are merged and returned with a `Timeout` flag").
    pub timed_out: bool,
}

/// The outcome of [`extract_batch`]: per-identifier results plus an overall
/// merged envelope across every identifier that succeeded (spec §4.8:
/// "Multi-identifier runs iterate sequentially and merge results").
#[derive(Debug, Default)]
pub struct BatchResult {
    pub total: usize,
    pub successful: usize,
    pub failed: usize,
    pub results: Vec<Result<ExtractionResult, (String, ExtentError)>>,
    pub merged_envelope: Option<Envelope>,
}

/// Extract the extent of a single identifier.
///
/// `client` is the shared, connection-pooled HTTP client (spec §5: "The
/// HTTP connection pool is shared across workers") — the same one used to
/// build `registry` via [`ProviderRegistry::default_registry`], reused here
/// for the download pool rather than opened fresh per identifier.
///
/// `decoder` is the external per-format decoder boundary (spec §1); pass
/// [`NullDecoder`] if the caller has no concrete decoders wired up, which is
/// a valid configuration under `metadata-only`/`metadata-first`/`auto` but
/// makes `download-only` unable to ever produce a non-empty envelope.
#[instrument(level = "info", skip(registry, client, decoder), fields(identifier = %identifier))]
pub async fn extract(
    identifier: &str,
    registry: &ProviderRegistry,
    client: &crate::http::SharedHttpClient,
    config: &RunConfig,
    decoder: Arc<dyn FileExtentDecoder>,
) -> Result<ExtractionResult, ExtentError> {
    let cancel = CancellationToken::new();
    let work = async {
        let normalized = Identifier::normalize(identifier)?;
        let adapter = registry.resolve(&normalized).ok_or_else(|| {
            ExtentError::UnrecognizedIdentifier {
                identifier: identifier.to_owned(),
            }
        })?;

        let mut visited = std::collections::HashSet::new();
        visited.insert(normalized.as_str().to_owned());

        run_state_machine(&normalized, adapter, registry, client, config, &decoder, &mut visited, 0, &cancel).await
    };

    let Some(deadline) = config.deadline else {
        return work.await;
    };

    tokio::pin!(work);
    tokio::select! {
        result = &mut work => result,
        _ = tokio::time::sleep(deadline) => {
            warn!("run deadline elapsed, signalling cancellation to the download pool");
            cancel.cancel();
            // Chunk reads already in flight run to their natural end (spec
            // §5), so give the now-cancelled work a bounded grace period to
            // unwind and hand back whatever it collected before giving up
            // and surfacing a bare deadline error.
            match tokio::time::timeout(config.request_timeout, work).await {
                Ok(Ok(mut result)) => {
                    result.timed_out = true;
                    Ok(result)
                }
                Ok(Err(err)) => Err(err),
                Err(_) => Err(ExtentError::DeadlineExceeded),
            }
        }
    }
}

/// Run the state machine of spec §4.8 for one (already-normalized,
/// already-dispatched) identifier. `visited` guards
/// `follow_external_metadata_links` against cycles; `depth` is checked
/// against `config.max_follow_depth`.
#[allow(clippy::too_many_arguments)]
async fn run_state_machine(
    identifier: &Identifier,
    adapter: &dyn ProviderAdapter,
    registry: &ProviderRegistry,
    client: &crate::http::SharedHttpClient,
    config: &RunConfig,
    decoder: &Arc<dyn FileExtentDecoder>,
    visited: &mut std::collections::HashSet<String>,
    depth: u32,
    cancel: &CancellationToken,
) -> Result<ExtractionResult, ExtentError> {
    let provider = adapter.friendly_name().to_owned();

    match config.strategy_pref {
        StrategyPreference::MetadataOnly => {
            run_metadata(identifier, adapter, registry, config, visited, depth)
                .await?
                .ok_or(ExtentError::EmptyResult)
                .map(|(envelope, temporal, warnings)| ExtractionResult {
                    identifier: identifier.to_string(),
                    envelope,
                    crs_epsg: 4326,
                    temporal,
                    strategy_used: StrategyUsed::Metadata,
                    provider,
                    warnings,
                    per_file_details: None,
                    timed_out: false,
                })
        }
        StrategyPreference::MetadataFirst => {
            if adapter.supports_metadata() {
                if let Some((envelope, temporal, warnings)) =
                    run_metadata(identifier, adapter, registry, config, visited, depth).await?
                {
                    return Ok(ExtractionResult {
                        identifier: identifier.to_string(),
                        envelope,
                        crs_epsg: 4326,
                        temporal,
                        strategy_used: StrategyUsed::Metadata,
                        provider,
                        warnings,
                        per_file_details: None,
                        timed_out: false,
                    });
                }
            }
            run_download(identifier, adapter, client, config, decoder, cancel)
                .await
                .map(|(envelope, temporal, warnings, details)| ExtractionResult {
                    identifier: identifier.to_string(),
                    envelope,
                    crs_epsg: 4326,
                    temporal,
                    strategy_used: StrategyUsed::Download,
                    provider,
                    warnings,
                    per_file_details: Some(details),
                    timed_out: false,
                })
        }
        StrategyPreference::DownloadOnly => run_download(identifier, adapter, client, config, decoder, cancel)
            .await
            .map(|(envelope, temporal, warnings, details)| ExtractionResult {
                identifier: identifier.to_string(),
                envelope,
                crs_epsg: 4326,
                temporal,
                strategy_used: StrategyUsed::Download,
                provider,
                warnings,
                per_file_details: Some(details),
                timed_out: false,
            }),
        StrategyPreference::Auto => {
            match run_download(identifier, adapter, client, config, decoder, cancel).await {
                Ok((envelope, temporal, warnings, details)) => Ok(ExtractionResult {
                    identifier: identifier.to_string(),
                    envelope,
                    crs_epsg: 4326,
                    temporal,
                    strategy_used: StrategyUsed::Download,
                    provider,
                    warnings,
                    per_file_details: Some(details),
                    timed_out: false,
                }),
                Err(err) if config.metadata_fallback_enabled && adapter.supports_metadata() => {
                    warn!("download strategy came up empty ({err}), falling back to metadata");
                    let (envelope, temporal, warnings) =
                        run_metadata(identifier, adapter, registry, config, visited, depth)
                            .await?
                            .ok_or(ExtentError::EmptyResult)?;
                    Ok(ExtractionResult {
                        identifier: identifier.to_string(),
                        envelope,
                        crs_epsg: 4326,
                        temporal,
                        strategy_used: StrategyUsed::MetadataFallback,
                        provider,
                        warnings,
                        per_file_details: None,
                        timed_out: false,
                    })
                }
                Err(err) => Err(err),
            }
        }
    }
}

/// The METADATA state: fetch the adapter's declared metadata, recursing
/// into `external_metadata_links` (depth-capped, cycle-safe) when
/// `follow_external_metadata_links` is set. Returns `None` (not an error)
/// when the adapter came up empty, so callers can decide whether that's a
/// fallback trigger or a terminal failure.
#[allow(clippy::too_many_arguments)]
fn run_metadata<'a>(
    identifier: &'a Identifier,
    adapter: &'a dyn ProviderAdapter,
    registry: &'a ProviderRegistry,
    config: &'a RunConfig,
    visited: &'a mut std::collections::HashSet<String>,
    depth: u32,
) -> std::pin::Pin<Box<dyn std::future::Future<Output = Result<Option<(Option<Envelope>, Option<TimeInterval>, Vec<String>)>, ExtentError>> + 'a>> {
    Box::pin(async move {
        if !adapter.supports_metadata() {
            return Ok(None);
        }

        let metadata: ProviderMetadata = adapter.fetch_metadata(identifier).await?;

        let envelope = if config.extract_spatial {
            metadata.envelope.as_ref()
        } else {
            None
        };
        if let Some(envelope) = envelope {
            crate::envelope::validate_wgs84(envelope, config.assume_wgs84)?;
        }
        let temporal = if config.extract_temporal {
            metadata.temporal
        } else {
            None
        };

        if envelope.is_some() || temporal.is_some() {
            return Ok(Some((envelope.cloned(), temporal, Vec::new())));
        }

        // Nothing usable once extract_spatial/extract_temporal are applied
        // (either the provider genuinely had nothing, or what it had was
        // filtered out) — try the next external link the same way a fully
        // empty record would.
        if config.follow_external_metadata_links && depth < config.max_follow_depth {
            for link in &metadata.external_metadata_links {
                if visited.contains(link) {
                    continue;
                }
                let Ok(linked_identifier) = Identifier::normalize(link) else {
                    continue;
                };
                let Some(linked_adapter) = registry.resolve(&linked_identifier) else {
                    continue;
                };
                visited.insert(linked_identifier.as_str().to_owned());
                if let Some(result) = run_metadata(
                    &linked_identifier,
                    linked_adapter,
                    registry,
                    config,
                    visited,
                    depth + 1,
                )
                .await?
                {
                    return Ok(Some(result));
                }
            }
        }
        Ok(None)
    })
}

/// The DOWNLOAD state: enumerate files, run them through the size-budget
/// selector, download the selection (with archive expansion happening
/// inline per file), probe each local file with the external decoder, and
/// merge + validate the result.
async fn run_download(
    identifier: &Identifier,
    adapter: &dyn ProviderAdapter,
    client: &crate::http::SharedHttpClient,
    config: &RunConfig,
    decoder: &Arc<dyn FileExtentDecoder>,
    cancel: &CancellationToken,
) -> Result<(Option<Envelope>, Option<TimeInterval>, Vec<String>, Vec<PerFileDetail>), ExtentError> {
    let provider = adapter.friendly_name();
    let descriptors = adapter.enumerate_files(identifier).await?;
    let selection = budget::select(&descriptors, config, provider)?;
    let mut warnings = selection.warnings;

    if selection.selected.is_empty() {
        return Err(ExtentError::EmptyResult);
    }

    let dest_dir = ScopedTempDir::new(scoped_temp_dir(identifier));
    let pool = Pool::new(client.clone(), config.download_concurrency, config.request_timeout)
        .with_max_archive_expansion_ratio(config.max_archive_expansion_ratio);

    let outcome = pool
        .download_all(&selection.selected, dest_dir.path(), provider, cancel.clone())
        .await
        .map_err(|err| if cancel.is_cancelled() { ExtentError::Cancelled } else { err })?;

    for failure in &outcome.failures {
        warnings.push(format!("file download failed: {failure}"));
    }

    let mut envelopes = Vec::new();
    let mut temporal: Option<TimeInterval> = None;
    let mut details = Vec::new();

    for file in &outcome.downloaded {
        match decoder.decode(&file.local_path, config.assume_wgs84) {
            Ok(Some((envelope, file_temporal))) => {
                details.push(PerFileDetail {
                    name: file.descriptor.name.clone(),
                    envelope: Some(envelope.clone()),
                });
                envelopes.push(envelope);
                if config.extract_temporal {
                    temporal = merge::merge_temporal(temporal.as_ref(), file_temporal.as_ref());
                }
            }
            Ok(None) => {
                details.push(PerFileDetail {
                    name: file.descriptor.name.clone(),
                    envelope: None,
                });
            }
            Err(err) => {
                warnings.push(format!("could not decode {}: {err}", file.descriptor.name));
            }
        }
    }

    let merged = if config.extract_spatial {
        if envelopes.is_empty() {
            return Err(ExtentError::EmptyResult);
        }
        Some(merge::merge_and_validate(envelopes.iter(), config.assume_wgs84, config.use_convex_hull)?)
    } else {
        None
    };

    if merged.is_none() && temporal.is_none() {
        return Err(ExtentError::EmptyResult);
    }

    info!(provider, file_count = outcome.downloaded.len(), "computed extent from downloaded files");
    Ok((merged, temporal, warnings, details))
}

/// Build a per-identifier scoped temporary directory name, so concurrent
/// (sequential, in practice — spec §5) runs never collide on disk.
fn scoped_temp_dir(identifier: &Identifier) -> PathBuf {
    let sanitized: String = identifier
        .as_str()
        .chars()
        .map(|c| if c.is_alphanumeric() { c } else { '_' })
        .collect();
    std::env::temp_dir().join(format!("geoextent-{sanitized}"))
}

/// Owns a scoped temporary directory and removes it on drop, so the
/// directory is cleaned up on every exit path out of [`run_download`] —
/// success, an early `?`/`return Err`, or the enclosing future simply being
/// dropped when the orchestrator's deadline elapses (spec §3: "guaranteed
/// release on every exit path"; spec §8: "under cancellation, the temporary
/// directory is empty after close returns").
struct ScopedTempDir(PathBuf);

impl ScopedTempDir {
    fn new(path: PathBuf) -> ScopedTempDir {
        ScopedTempDir(path)
    }

    fn path(&self) -> &std::path::Path {
        &self.0
    }
}

impl Drop for ScopedTempDir {
    fn drop(&mut self) {
        let _ = std::fs::remove_dir_all(&self.0);
    }
}

/// Run every identifier in `identifiers` sequentially (spec §5: "Multiple
/// identifiers are processed one at a time"), recording per-identifier
/// failures without aborting the batch, and merge every successful result's
/// envelope into one overall extent.
pub async fn extract_batch(
    identifiers: &[String],
    registry: &ProviderRegistry,
    client: &crate::http::SharedHttpClient,
    config: &RunConfig,
    decoder: Arc<dyn FileExtentDecoder>,
) -> BatchResult {
    let mut batch = BatchResult {
        total: identifiers.len(),
        ..BatchResult::default()
    };

    let mut envelopes = Vec::new();
    for identifier in identifiers {
        match extract(identifier, registry, client, config, decoder.clone()).await {
            Ok(result) => {
                batch.successful += 1;
                if let Some(envelope) = &result.envelope {
                    envelopes.push(envelope.clone());
                }
                batch.results.push(Ok(result));
            }
            Err(err) => {
                batch.failed += 1;
                warn!("extraction failed for {identifier}: {err}");
                batch.results.push(Err((identifier.clone(), err)));
            }
        }
    }

    batch.merged_envelope = merge::merge_all_envelopes_configured(envelopes.iter(), config.use_convex_hull);
    batch
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn null_decoder_never_recognizes_anything() {
        let decoder = NullDecoder;
        let result = decoder.decode(std::path::Path::new("/tmp/whatever"), false).unwrap();
        assert!(result.is_none());
    }

    #[test]
    fn scoped_temp_dir_sanitizes_identifier_characters() {
        let identifier = Identifier::normalize("10.5281/zenodo.1234").unwrap();
        let dir = scoped_temp_dir(&identifier);
        assert!(dir.to_string_lossy().contains("10_5281_zenodo_1234"));
    }

    #[tokio::test]
    async fn extract_batch_counts_successes_and_failures_without_aborting() {
        let registry = ProviderRegistry::new(vec![]);
        let config = RunConfig::default();
        let client = crate::http::shared_http_client(config.download_concurrency);
        let decoder: Arc<dyn FileExtentDecoder> = Arc::new(NullDecoder);
        let identifiers = vec!["not-a-real-identifier".to_owned(), "also-bogus".to_owned()];
        let batch = extract_batch(&identifiers, &registry, &client, &config, decoder).await;
        assert_eq!(batch.total, 2);
        assert_eq!(batch.failed, 2);
        assert_eq!(batch.successful, 0);
        assert!(batch.merged_envelope.is_none());
    }

    #[test]
    fn scoped_temp_dir_removes_directory_on_drop() {
        let dir = std::env::temp_dir().join("geoextent-orchestrator-drop-test");
        std::fs::create_dir_all(&dir).unwrap();
        std::fs::write(dir.join("partial.bin"), b"leftover").unwrap();
        {
            let guard = ScopedTempDir::new(dir.clone());
            assert!(guard.path().exists());
        }
        assert!(!dir.exists());
    }
}
