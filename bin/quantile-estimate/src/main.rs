//! Estimates quantiles from the cumulative buckets of a classic histogram.

#![deny(warnings)]
#![deny(missing_docs)]

use anyhow::Context as _;
use bucket_quantile::QuantileEstimator;
use clap::Parser as _;
use tracing::{error, info};
use tracing_subscriber::{filter::LevelFilter, EnvFilter};

mod config;
use self::config::{Cli, Config, ENV_PREFIX};

mod input;
use self::input::HistogramDocument;

mod report;
use self::report::Report;

fn main() {
    tracing_subscriber::fmt()
        .compact()
        .with_env_filter(
            EnvFilter::builder()
                .with_default_directive(LevelFilter::INFO.into())
                .from_env_lossy(),
        )
        .with_ansi(true)
        .with_target(true)
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    if let Err(e) = run(cli) {
        error!("{:?}", e);
        std::process::exit(1);
    }
}

fn run(cli: Cli) -> Result<(), anyhow::Error> {
    let config = Config::from_sources(cli.config.as_deref(), ENV_PREFIX)?.with_cli_overrides(&cli);
    let estimator =
        QuantileEstimator::from_config(&config.estimator_config()).context("Invalid estimator configuration.")?;

    let document = HistogramDocument::from_file(&cli.histogram_file)?;
    info!(histogram = document.name(), file = %cli.histogram_file.display(), "Estimating from histogram.");

    let report = Report::from_document(&estimator, &document)
        .with_context(|| format!("Failed to estimate from histogram '{}'.", document.name()))?;
    report.log_corrections();

    report
        .write_to(config.output_format, std::io::stdout().lock())
        .context("Failed to write estimates.")
}
