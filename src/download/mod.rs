//! The Download Pool (spec §4.6): fetches a selected set of
//! [`FileDescriptor`]s with bounded concurrency, streaming each to a scoped
//! temporary directory, retrying transient failures and recovering from
//! permanent per-file failures without aborting the run.

pub mod archive;
pub mod retry;

use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use futures::stream::{self, StreamExt};
use hyper::{Body, Request};
use metrics::counter;
use tokio::io::AsyncWriteExt;
use tracing::{instrument, warn};

use crate::descriptor::FileDescriptor;
use crate::errors::ExtentError;
use crate::http::SharedHttpClient;

/// 1 MiB chunks, matching the spec's streaming-write requirement.
const CHUNK_SIZE_HINT: usize = 1024 * 1024;

/// A cooperative cancellation flag shared between the orchestrator and a
/// download pool. Checked between chunks and between files so a cancelled
/// run stops promptly without leaving a half-written file behind.
#[derive(Clone, Default)]
pub struct CancellationToken {
    cancelled: Arc<AtomicBool>,
}

impl CancellationToken {
    pub fn new() -> CancellationToken {
        CancellationToken::default()
    }

    pub fn cancel(&self) {
        self.cancelled.store(true, Ordering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancelled.load(Ordering::SeqCst)
    }
}

/// One downloaded file, now resident on local disk. If the file was an
/// archive, it has already been expanded in place (spec §4.7: "after each
/// file completes, the Archive Expander is invoked on it") and `local_path`
/// points at one of its expanded members rather than the archive itself.
#[derive(Debug)]
pub struct DownloadedFile {
    pub descriptor: FileDescriptor,
    pub local_path: PathBuf,
}

/// The outcome of running a whole selection through the pool.
#[derive(Debug, Default)]
pub struct DownloadOutcome {
    pub downloaded: Vec<DownloadedFile>,
    /// Per-file failures, recovered locally; the run continues.
    pub failures: Vec<ExtentError>,
}

/// Bounded-concurrency download pool.
pub struct Pool {
    client: SharedHttpClient,
    concurrency: usize,
    max_retries: u8,
    request_timeout: Duration,
    max_archive_expansion_ratio: u64,
}

impl Pool {
    pub fn new(client: SharedHttpClient, concurrency: usize, request_timeout: Duration) -> Pool {
        Pool {
            client,
            concurrency,
            max_retries: 3,
            request_timeout,
            max_archive_expansion_ratio: 100,
        }
    }

    /// Override the decompression-bomb ratio guard used when expanding
    /// downloaded archives (spec §4.7; default 100x, matching
    /// [`crate::config::RunConfig::max_archive_expansion_ratio`]'s default).
    pub fn with_max_archive_expansion_ratio(mut self, ratio: u64) -> Pool {
        self.max_archive_expansion_ratio = ratio;
        self
    }

    /// Download every descriptor in `selected` into `dest_dir`, honoring
    /// `cancel`. Order of completion is not preserved — unlike the CSV
    /// geocoding pipeline's row-order-preserving `buffered`, file downloads
    /// have no ordering requirement, so we use `buffer_unordered` to let
    /// faster files finish without waiting on slower siblings (spec §4.6).
    ///
    /// Returns [`ExtentError::AllFilesFailed`] if every file failed; a
    /// partial failure is recorded in [`DownloadOutcome::failures`] and the
    /// run proceeds with whatever did succeed.
    #[instrument(level = "debug", skip(self, selected, cancel), fields(count = selected.len()))]
    pub async fn download_all(
        &self,
        selected: &[FileDescriptor],
        dest_dir: &Path,
        provider: &str,
        cancel: CancellationToken,
    ) -> Result<DownloadOutcome, ExtentError> {
        tokio::fs::create_dir_all(dest_dir)
            .await
            .map_err(|err| ExtentError::FileFetchFailed {
                name: dest_dir.display().to_string(),
                reason: err.to_string(),
            })?;

        if selected.is_empty() {
            return Ok(DownloadOutcome::default());
        }

        let max_expansion_ratio = self.max_archive_expansion_ratio;
        let results: Vec<Result<Vec<DownloadedFile>, ExtentError>> = stream::iter(selected.iter().cloned())
            .map(|descriptor| {
                let client = self.client.clone();
                let dest_dir = dest_dir.to_owned();
                let cancel = cancel.clone();
                let max_retries = self.max_retries;
                let timeout = self.request_timeout;
                async move {
                    if cancel.is_cancelled() {
                        return Err(ExtentError::Cancelled);
                    }
                    let downloaded = retry::with_backoff(max_retries, Duration::from_secs(1), || {
                        download_one(client.clone(), &descriptor, &dest_dir, &cancel, timeout)
                    })
                    .await?;
                    expand_if_archive(downloaded, max_expansion_ratio)
                }
            })
            .buffer_unordered(self.concurrency)
            .collect()
            .await;

        let mut outcome = DownloadOutcome::default();
        for result in results {
            match result {
                Ok(files) => {
                    counter!("geoextent.download.files_succeeded.count", 1, "provider" => provider.to_owned());
                    outcome.downloaded.extend(files);
                }
                Err(err) => {
                    counter!("geoextent.download.files_failed.count", 1, "provider" => provider.to_owned());
                    warn!("file download failed: {err}");
                    outcome.failures.push(err);
                }
            }
        }

        if outcome.downloaded.is_empty() && !outcome.failures.is_empty() {
            return Err(ExtentError::AllFilesFailed {
                provider: provider.to_owned(),
                count: outcome.failures.len(),
            });
        }

        Ok(outcome)
    }
}

async fn download_one(
    client: SharedHttpClient,
    descriptor: &FileDescriptor,
    dest_dir: &Path,
    cancel: &CancellationToken,
    timeout: Duration,
) -> Result<DownloadedFile, ExtentError> {
    let req = Request::builder()
        .method("GET")
        .uri(descriptor.url.as_str())
        .body(Body::empty())
        .map_err(|err| ExtentError::FileFetchFailed {
            name: descriptor.name.clone(),
            reason: format!("could not build request: {err}"),
        })?;

    let response = tokio::time::timeout(timeout, client.request(req))
        .await
        .map_err(|_| ExtentError::ProviderTransient {
            provider: descriptor.name.clone(),
            message: "request timed out".to_owned(),
        })?
        .map_err(|err| ExtentError::ProviderTransient {
            provider: descriptor.name.clone(),
            message: format!("transport error: {err}"),
        })?;

    let status = response.status();
    if status.is_server_error() || status.as_u16() == 429 {
        return Err(ExtentError::ProviderTransient {
            provider: descriptor.name.clone(),
            message: format!("{status} fetching {}", descriptor.name),
        });
    }
    if !status.is_success() {
        return Err(ExtentError::FileFetchFailed {
            name: descriptor.name.clone(),
            reason: format!("server returned {status}"),
        });
    }

    let local_path = dest_dir.join(&descriptor.name);
    if let Some(parent) = local_path.parent() {
        tokio::fs::create_dir_all(parent)
            .await
            .map_err(|err| ExtentError::FileFetchFailed {
                name: descriptor.name.clone(),
                reason: err.to_string(),
            })?;
    }

    let mut out_file =
        tokio::fs::File::create(&local_path)
            .await
            .map_err(|err| ExtentError::FileFetchFailed {
                name: descriptor.name.clone(),
                reason: err.to_string(),
            })?;

    let mut body = response.into_body();
    let mut buffered = Vec::with_capacity(CHUNK_SIZE_HINT);
    while let Some(chunk_result) = futures::StreamExt::next(&mut body).await {
        if cancel.is_cancelled() {
            return Err(ExtentError::Cancelled);
        }
        let chunk = chunk_result.map_err(|err| ExtentError::ProviderTransient {
            provider: descriptor.name.clone(),
            message: format!("error reading body: {err}"),
        })?;
        buffered.extend_from_slice(&chunk);
        if buffered.len() >= CHUNK_SIZE_HINT {
            out_file
                .write_all(&buffered)
                .await
                .map_err(|err| ExtentError::FileFetchFailed {
                    name: descriptor.name.clone(),
                    reason: err.to_string(),
                })?;
            buffered.clear();
        }
    }
    if !buffered.is_empty() {
        out_file
            .write_all(&buffered)
            .await
            .map_err(|err| ExtentError::FileFetchFailed {
                name: descriptor.name.clone(),
                reason: err.to_string(),
            })?;
    }
    out_file
        .flush()
        .await
        .map_err(|err| ExtentError::FileFetchFailed {
            name: descriptor.name.clone(),
            reason: err.to_string(),
        })?;

    Ok(DownloadedFile {
        descriptor: descriptor.clone(),
        local_path,
    })
}

/// If `downloaded` is an archive, expand it in place and return one
/// [`DownloadedFile`] per non-archive member found, sharing the original
/// descriptor's metadata (so downstream consumers still know which
/// provider file this came from). Non-archives pass through unchanged.
fn expand_if_archive(
    downloaded: DownloadedFile,
    max_expansion_ratio: u64,
) -> Result<Vec<DownloadedFile>, ExtentError> {
    if !archive::is_archive(&downloaded.local_path) {
        return Ok(vec![downloaded]);
    }
    let compressed_size = std::fs::metadata(&downloaded.local_path)
        .map(|m| m.len())
        .unwrap_or(0);
    let dest_dir = downloaded.local_path.with_extension("expanded");
    let members = archive::expand(&downloaded.local_path, &dest_dir, compressed_size, max_expansion_ratio)?;
    Ok(members
        .into_iter()
        .map(|local_path| DownloadedFile {
            descriptor: downloaded.descriptor.clone(),
            local_path,
        })
        .collect())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn cancellation_token_starts_uncancelled() {
        let token = CancellationToken::new();
        assert!(!token.is_cancelled());
        token.cancel();
        assert!(token.is_cancelled());
    }

    #[test]
    fn cancellation_token_clones_share_state() {
        let token = CancellationToken::new();
        let clone = token.clone();
        clone.cancel();
        assert!(token.is_cancelled());
    }

    #[tokio::test]
    async fn empty_selection_downloads_nothing() {
        let client = crate::http::shared_http_client(1);
        let pool = Pool::new(client, 2, Duration::from_secs(5));
        let dir = std::env::temp_dir().join("geoextent-test-empty-download");
        let outcome = pool
            .download_all(&[], &dir, "test", CancellationToken::new())
            .await
            .unwrap();
        assert!(outcome.downloaded.is_empty());
        assert!(outcome.failures.is_empty());
    }
}
