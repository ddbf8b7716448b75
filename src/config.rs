//! Run configuration (spec §6.1).

use std::time::Duration;

use crate::budget::SelectionMethod;

/// The strategy an orchestrator run should prefer when a provider supports
/// more than one (spec §4.8, `strategy_pref`).
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum StrategyPreference {
    /// Download first; if the result comes up empty and
    /// `metadata_fallback_enabled` is set (and the adapter supports
    /// metadata at all), fall through to metadata. This is the default.
    Auto,
    /// Only ever consult provider-declared metadata. If the adapter has
    /// none (or doesn't support metadata at all), the run fails rather than
    /// downloading anything.
    MetadataOnly,
    /// Try provider-declared metadata first (when the adapter supports it),
    /// falling back to downloading files if that comes up empty. The
    /// fallback always happens here, unlike `Auto`'s
    /// `metadata_fallback_enabled` gate — and the direction is reversed:
    /// metadata first, download second.
    MetadataFirst,
    /// Always download and compute the extent from file contents, skipping
    /// metadata entirely.
    DownloadOnly,
}

impl Default for StrategyPreference {
    fn default() -> Self {
        StrategyPreference::Auto
    }
}

/// All tunables for one extraction run (spec §6.1). Constructed from parsed
/// CLI flags in `main.rs` for the binary entry point, or directly by a
/// library caller.
#[derive(Clone, Debug)]
pub struct RunConfig {
    /// Whether to compute a spatial envelope at all.
    pub extract_spatial: bool,
    /// Whether to compute a temporal interval at all. Off by default since
    /// most callers only want the spatial extent and temporal metadata is
    /// less reliably declared across providers.
    pub extract_temporal: bool,
    /// Request a convex-hull merge (spec §4.9) instead of the default
    /// element-wise bounding-box merge — every per-file envelope, bounding
    /// boxes included, contributes its vertices to a single hull.
    pub use_convex_hull: bool,
    /// Which strategy to attempt first.
    pub strategy_pref: StrategyPreference,
    /// Whether to recurse into external metadata links the provider points
    /// at (e.g. a Zenodo record pointing at a GBIF dataset), capped at
    /// depth 2 per spec §4.8.
    pub follow_external_metadata_links: bool,
    /// Under `StrategyPreference::Auto`, whether an empty metadata result
    /// falls through to downloading. Meaningless under the other three
    /// strategies, which each hard-code their own fallback behavior.
    pub metadata_fallback_enabled: bool,
    /// Maximum total bytes to download for one identifier. `None` means
    /// unbounded.
    pub max_download_size: Option<u64>,
    /// If true, exceeding `max_download_size` is a hard error
    /// ([`crate::errors::ExtentError::BudgetExceeded`]) rather than a
    /// silent truncation to the largest selection that fits.
    pub download_size_soft_limit: bool,
    /// How to choose which files to keep when not everything fits the
    /// budget.
    pub selection_method: SelectionMethod,
    /// Seed for the `random` selection method. `None` selects a
    /// fixed default so that runs remain reproducible unless the caller
    /// asks for different randomness.
    pub selection_seed: Option<u64>,
    /// Restrict the download selection to geospatial-looking file
    /// extensions (spec §4.3 step 1). Off by default: most identifiers
    /// enumerate only a handful of files, so filtering is opt-in.
    pub geospatial_only: bool,
    /// Extensions to additionally treat as geospatial, on top of
    /// [`crate::descriptor::DEFAULT_GEOSPATIAL_EXTENSIONS`].
    pub extra_geospatial_extensions: Vec<String>,
    /// Treat input coordinates as already WGS84 without the "looks
    /// projected" sanity heuristic (spec §4.8). Use for providers known to
    /// sometimes emit full-world-extent boxes legitimately.
    pub assume_wgs84: bool,
    /// Recursion depth cap for `follow_external_metadata_links`.
    pub max_follow_depth: u32,
    /// Maximum concurrent file downloads.
    pub download_concurrency: usize,
    /// Maximum time a single HTTP request may take before it's treated as
    /// transient and retried.
    pub request_timeout: Duration,
    /// Overall wall-clock deadline for one identifier's extraction. `None`
    /// means no deadline.
    pub deadline: Option<Duration>,
    /// Maximum archive expansion ratio (expanded size / compressed size)
    /// before the archive expander treats an archive as a decompression
    /// bomb and aborts it (spec §4.7).
    pub max_archive_expansion_ratio: u64,
    /// Precision to render temporal output at.
    pub temporal_precision: crate::temporal::TemporalPrecision,
}

impl Default for RunConfig {
    fn default() -> RunConfig {
        RunConfig {
            extract_spatial: true,
            extract_temporal: false,
            use_convex_hull: false,
            strategy_pref: StrategyPreference::default(),
            follow_external_metadata_links: true,
            metadata_fallback_enabled: true,
            max_download_size: Some(500 * 1024 * 1024),
            download_size_soft_limit: false,
            selection_method: SelectionMethod::default(),
            selection_seed: None,
            geospatial_only: false,
            extra_geospatial_extensions: Vec::new(),
            assume_wgs84: false,
            max_follow_depth: 2,
            download_concurrency: 4,
            request_timeout: Duration::from_secs(30),
            deadline: None,
            max_archive_expansion_ratio: 100,
            temporal_precision: crate::temporal::TemporalPrecision::default(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_match_spec_baseline() {
        let config = RunConfig::default();
        assert_eq!(config.strategy_pref, StrategyPreference::Auto);
        assert!(config.follow_external_metadata_links);
        assert!(config.metadata_fallback_enabled);
        assert_eq!(config.max_follow_depth, 2);
        assert!(!config.download_size_soft_limit);
        assert!(!config.geospatial_only);
        assert!(config.extract_spatial);
        assert!(!config.extract_temporal);
        assert!(!config.use_convex_hull);
    }
}
