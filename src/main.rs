//! A thin CLI driving the extraction pipeline over a list of identifiers.
//!
//! Argument parsing, output serialization (GeoJSON/WKT/WKB), progress UI,
//! and per-format decoding are all external collaborators per spec §1; this
//! binary exists only to exercise [`geoextent_core::orchestrator`] from the
//! command line, printing a minimal JSON summary rather than implementing
//! any of those external contracts itself.

use std::str::FromStr;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{format_err, Error, Result};
use clap::{Parser, ValueEnum};
use metrics::describe_counter;
use metrics_exporter_prometheus::PrometheusBuilder;
use tracing::{debug, info_span};
use tracing_subscriber::{
    fmt::{format::FmtSpan, Subscriber},
    prelude::*,
    EnvFilter,
};

use geoextent_core::adapter::ProviderRegistry;
use geoextent_core::budget::SelectionMethod;
use geoextent_core::config::{RunConfig, StrategyPreference};
use geoextent_core::decoder::GeoJsonProbe;
use geoextent_core::http::shared_http_client;
use geoextent_core::orchestrator::extract_batch;

/// CLI-facing mirror of [`StrategyPreference`] so `clap` can derive parsing
/// for it without the library itself depending on `clap`.
#[derive(Clone, Copy, Debug, ValueEnum)]
enum Strategy {
    Auto,
    MetadataOnly,
    MetadataFirst,
    DownloadOnly,
}

impl From<Strategy> for StrategyPreference {
    fn from(value: Strategy) -> StrategyPreference {
        match value {
            Strategy::Auto => StrategyPreference::Auto,
            Strategy::MetadataOnly => StrategyPreference::MetadataOnly,
            Strategy::MetadataFirst => StrategyPreference::MetadataFirst,
            Strategy::DownloadOnly => StrategyPreference::DownloadOnly,
        }
    }
}

/// CLI-facing mirror of [`SelectionMethod`].
#[derive(Clone, Copy, Debug, ValueEnum)]
enum Selection {
    Ordered,
    Random,
    Smallest,
    Largest,
}

impl From<Selection> for SelectionMethod {
    fn from(value: Selection) -> SelectionMethod {
        match value {
            Selection::Ordered => SelectionMethod::Ordered,
            Selection::Random => SelectionMethod::Random,
            Selection::Smallest => SelectionMethod::Smallest,
            Selection::Largest => SelectionMethod::Largest,
        }
    }
}

/// `key=value` extension registered with [`RunConfig::extra_geospatial_extensions`].
#[derive(Clone, Debug)]
struct Extension(String);

impl FromStr for Extension {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        if s.is_empty() {
            return Err(format_err!("extension cannot be empty"));
        }
        Ok(Extension(s.trim_start_matches('.').to_ascii_lowercase()))
    }
}

/// Extract the geospatial and temporal extent of one or more dataset
/// identifiers (DOIs, DOI URLs, or provider landing-page URLs).
#[derive(Debug, Parser)]
#[command(author, version, about = "extract the geospatial/temporal extent of research datasets")]
struct Opt {
    /// Dataset identifiers: DOIs, DOI URLs, or provider landing pages.
    identifiers: Vec<String>,

    /// Which extraction strategy to use.
    #[arg(long = "strategy", value_enum, default_value = "auto")]
    strategy: Strategy,

    /// Don't compute a spatial envelope at all.
    #[arg(long = "no-extract-spatial")]
    no_extract_spatial: bool,

    /// Also compute a temporal interval, where providers or files declare
    /// one.
    #[arg(long = "extract-temporal")]
    extract_temporal: bool,

    /// Merge per-file envelopes into a convex hull instead of an
    /// axis-aligned bounding box.
    #[arg(long = "use-convex-hull")]
    use_convex_hull: bool,

    /// Disable falling back to metadata after an empty download under
    /// `auto` strategy.
    #[arg(long = "no-metadata-fallback")]
    no_metadata_fallback: bool,

    /// Don't follow `landingPage` links to another registered provider.
    #[arg(long = "no-follow-external-metadata")]
    no_follow_external_metadata: bool,

    /// Maximum total bytes to download for one identifier.
    #[arg(long = "max-download-size")]
    max_download_size: Option<u64>,

    /// Fail with an error instead of silently truncating when the total
    /// size of all files exceeds `--max-download-size`.
    #[arg(long = "download-size-soft-limit")]
    download_size_soft_limit: bool,

    /// How to choose which files to keep when not everything fits the
    /// budget.
    #[arg(long = "selection-method", value_enum, default_value = "ordered")]
    selection_method: Selection,

    /// Seed for `--selection-method=random`.
    #[arg(long = "selection-seed")]
    selection_seed: Option<u64>,

    /// Restrict the download selection to files with a recognized
    /// geospatial extension, instead of considering every enumerated file.
    #[arg(long = "geospatial-only")]
    geospatial_only: bool,

    /// Additional file extensions to treat as geospatial.
    #[arg(long = "extra-geospatial-extension", value_name = "EXT")]
    extra_geospatial_extensions: Vec<Extension>,

    /// Assume ungeoreferenced rasters are WGS84 rather than rejecting them.
    #[arg(long = "assume-wgs84")]
    assume_wgs84: bool,

    /// Maximum concurrent file downloads.
    #[arg(long = "parallelism", default_value = "4")]
    parallelism: usize,

    /// Overall wall-clock deadline per identifier, in seconds.
    #[arg(long = "run-deadline-secs")]
    run_deadline_secs: Option<u64>,
}

impl Opt {
    fn into_run_config(self) -> RunConfig {
        let mut config = RunConfig {
            extract_spatial: !self.no_extract_spatial,
            extract_temporal: self.extract_temporal,
            use_convex_hull: self.use_convex_hull,
            strategy_pref: self.strategy.into(),
            metadata_fallback_enabled: !self.no_metadata_fallback,
            follow_external_metadata_links: !self.no_follow_external_metadata,
            max_download_size: self.max_download_size,
            download_size_soft_limit: self.download_size_soft_limit,
            selection_method: self.selection_method.into(),
            selection_seed: self.selection_seed,
            geospatial_only: self.geospatial_only,
            extra_geospatial_extensions: self
                .extra_geospatial_extensions
                .into_iter()
                .map(|e| e.0)
                .collect(),
            assume_wgs84: self.assume_wgs84,
            download_concurrency: self.parallelism,
            deadline: self.run_deadline_secs.map(Duration::from_secs),
            ..RunConfig::default()
        };
        if config.download_concurrency == 0 {
            config.download_concurrency = 1;
        }
        config
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let filter = EnvFilter::from_default_env();
    Subscriber::builder()
        .with_writer(std::io::stderr)
        .with_span_events(FmtSpan::NEW | FmtSpan::CLOSE)
        .with_env_filter(filter)
        .finish()
        .init();
    let _span = info_span!("geoextent").entered();
    debug!("{} {}", env!("CARGO_PKG_NAME"), env!("CARGO_PKG_VERSION"));

    let opt = Opt::parse();
    let identifiers = opt.identifiers.clone();
    if identifiers.is_empty() {
        return Err(format_err!("at least one identifier is required"));
    }

    PrometheusBuilder::new()
        .install_recorder()
        .map_err(|err| format_err!("could not install metrics recorder: {err}"))?;
    describe_counter!(
        "geoextent.selected_errors.count",
        "Particularly interesting errors, by component and cause"
    );

    let client = shared_http_client(opt.parallelism.max(1));
    let registry = ProviderRegistry::default_registry(client.clone(), Duration::from_secs(30));
    let config = opt.into_run_config();
    let decoder: Arc<dyn geoextent_core::orchestrator::FileExtentDecoder> =
        Arc::new(GeoJsonProbe);

    let batch = extract_batch(&identifiers, &registry, &client, &config, decoder).await;

    for result in &batch.results {
        match result {
            Ok(extraction) => {
                let summary = serde_json::json!({
                    "identifier": extraction.identifier,
                    "envelope": extraction.envelope,
                    "crs": extraction.crs_epsg,
                    "temporal": extraction.temporal,
                    "strategy_used": format!("{:?}", extraction.strategy_used),
                    "provider": extraction.provider,
                    "warnings": extraction.warnings,
                });
                println!("{}", serde_json::to_string_pretty(&summary)?);
            }
            Err((identifier, err)) => {
                eprintln!("error extracting {identifier}: {err} [{}]", err.code());
            }
        }
    }

    if let Some(merged) = &batch.merged_envelope {
        println!(
            "{}",
            serde_json::to_string_pretty(&serde_json::json!({
                "total": batch.total,
                "successful": batch.successful,
                "failed": batch.failed,
                "merged_envelope": merged,
            }))?
        );
    }

    if batch.failed > 0 && batch.successful == 0 {
        std::process::exit(1);
    }
    Ok(())
}
