//! Error taxonomy for the extraction pipeline.
//!
//! Every error a caller can observe from this crate is a variant of
//! [`ExtentError`]. Per-file and per-identifier failures are *not* usually
//! propagated as `Err` — they're recovered locally and folded into
//! [`crate::ExtractionResult::warnings`] or a batch's failure list. The
//! variants below exist so that recovery code has something typed to match
//! on, not because every variant is expected to unwind a call stack.

use thiserror::Error;

/// The error taxonomy described by the extraction pipeline's error handling
/// design. Each variant carries enough context to build a user-visible
/// diagnostic line without leaking internal stack traces.
#[derive(Debug, Error)]
pub enum ExtentError {
    /// Input was empty or contained control characters.
    #[error("malformed identifier: {reason}")]
    MalformedIdentifier { reason: String },

    /// The identifier didn't match any registered provider after
    /// normalization.
    #[error("unrecognized identifier: {identifier}")]
    UnrecognizedIdentifier { identifier: String },

    /// A provider API call failed transiently (network error, 5xx, timeout)
    /// and retries were exhausted.
    #[error("{provider}: transient error: {message}")]
    ProviderTransient { provider: String, message: String },

    /// A provider API call failed permanently (4xx, not found, permission
    /// denied).
    #[error("{provider}: permanent error: {message}")]
    ProviderPermanent { provider: String, message: String },

    /// The size budget selector's soft-limit flag was set and the total
    /// estimated size exceeds the limit.
    #[error(
        "{provider}: estimated download size {estimated} bytes exceeds limit {limit} bytes"
    )]
    BudgetExceeded {
        estimated: u64,
        limit: u64,
        provider: String,
    },

    /// A single file failed to download. Never aborts a run.
    #[error("could not fetch {name}: {reason}")]
    FileFetchFailed { name: String, reason: String },

    /// An archive was rejected as unsafe (path escape, decompression bomb).
    #[error("archive unsafe: {reason}")]
    ArchiveUnsafe { reason: String },

    /// A decoder rejected a file. Per-file warning, run continues.
    #[error("could not decode {name}")]
    DecodeFailed { name: String },

    /// Neither metadata nor any decoded file yielded a usable envelope.
    #[error("no usable spatial/temporal extent could be extracted")]
    EmptyResult,

    /// The final envelope failed WGS84 validation.
    #[error("invalid WGS84 extent: {reason}")]
    InvalidWgs84 { reason: String },

    /// The run was cancelled before completion.
    #[error("run was cancelled")]
    Cancelled,

    /// The run's overall deadline elapsed before completion.
    #[error("run deadline exceeded")]
    DeadlineExceeded,

    /// Every file in the selected set failed to download.
    #[error("{provider}: all {count} selected files failed to download")]
    AllFilesFailed { provider: String, count: usize },
}

impl ExtentError {
    /// A short machine-stable code for this error kind, independent of the
    /// interpolated message. Used by callers building structured output.
    pub fn code(&self) -> &'static str {
        match self {
            ExtentError::MalformedIdentifier { .. } => "malformed_identifier",
            ExtentError::UnrecognizedIdentifier { .. } => "unrecognized_identifier",
            ExtentError::ProviderTransient { .. } => "provider_transient",
            ExtentError::ProviderPermanent { .. } => "provider_permanent",
            ExtentError::BudgetExceeded { .. } => "budget_exceeded",
            ExtentError::FileFetchFailed { .. } => "file_fetch_failed",
            ExtentError::ArchiveUnsafe { .. } => "archive_unsafe",
            ExtentError::DecodeFailed { .. } => "decode_failed",
            ExtentError::EmptyResult => "empty_result",
            ExtentError::InvalidWgs84 { .. } => "invalid_wgs84",
            ExtentError::Cancelled => "cancelled",
            ExtentError::DeadlineExceeded => "deadline_exceeded",
            ExtentError::AllFilesFailed { .. } => "all_files_failed",
        }
    }

    /// The provider this error is attributable to, if any.
    pub fn provider(&self) -> Option<&str> {
        match self {
            ExtentError::ProviderTransient { provider, .. }
            | ExtentError::ProviderPermanent { provider, .. }
            | ExtentError::BudgetExceeded { provider, .. }
            | ExtentError::AllFilesFailed { provider, .. } => Some(provider),
            _ => None,
        }
    }
}

/// Display an [`anyhow::Error`], plus all of its wrapped causes, plus a
/// backtrace, to stderr. Used at the CLI boundary only — the library itself
/// never prints anything.
pub fn display_causes_and_backtrace(err: &anyhow::Error) {
    eprintln!("Error: {}", err);
    for cause in err.chain().skip(1) {
        eprintln!("  caused by: {}", cause);
    }
    eprintln!("{}", err.backtrace());
}
