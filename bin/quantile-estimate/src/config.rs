use std::path::{Path, PathBuf};

use anyhow::Context as _;
use bucket_quantile::{EstimatorConfig, LowerBoundPolicy, DEFAULT_MONOTONICITY_TOLERANCE};
use clap::{Parser, ValueEnum};
use figment::{
    providers::{Env, Format as _, Serialized, Yaml},
    Figment,
};
use serde::{Deserialize, Serialize};

/// Prefix for environment variables which override configuration values.
pub const ENV_PREFIX: &str = "QUANTILE_ESTIMATE_";

#[derive(Clone, Parser)]
#[command(about)]
pub struct Cli {
    /// Path to a YAML configuration file.
    ///
    /// Values in the configuration file can be overridden by environment variables prefixed with
    /// `QUANTILE_ESTIMATE_`, such as `QUANTILE_ESTIMATE_MONOTONICITY_TOLERANCE`.
    #[arg(long, short = 'c')]
    pub config: Option<PathBuf>,

    /// Output format.
    ///
    /// Takes precedence over the configuration file and environment.
    #[arg(long, value_enum)]
    pub format: Option<OutputFormat>,

    /// Path to the histogram to estimate from.
    ///
    /// Files ending in `.json` are read as JSON, and all others as YAML.
    pub histogram_file: PathBuf,
}

#[derive(Clone, Copy, Debug, Default, Deserialize, Eq, PartialEq, Serialize, ValueEnum)]
#[serde(rename_all = "snake_case")]
pub enum OutputFormat {
    /// Human-readable text, one estimate per line.
    #[default]
    Text,

    /// JSON, one estimate per line.
    Json,
}

#[derive(Clone, Debug, Deserialize, PartialEq, Serialize)]
#[serde(default)]
pub struct Config {
    /// Relative tolerance under which a decrease in bucket counts is considered floating-point noise.
    pub monotonicity_tolerance: f64,

    /// How the lower edge of a bucket is treated when interpolating within it.
    pub lower_bound_policy: LowerBoundPolicy,

    /// Output format.
    pub output_format: OutputFormat,
}

impl Config {
    /// Loads the configuration from the built-in defaults, the given YAML file (if any), and then from environment
    /// variables with the given prefix, in increasing order of precedence.
    ///
    /// # Errors
    ///
    /// If the configuration file cannot be read, or if any value is of the wrong type, an error is returned.
    pub fn from_sources(config_path: Option<&Path>, env_prefix: &str) -> Result<Self, anyhow::Error> {
        let mut figment = Figment::from(Serialized::defaults(Self::default()));
        if let Some(config_path) = config_path {
            if !config_path.exists() {
                anyhow::bail!("Configuration file '{}' does not exist.", config_path.display());
            }

            figment = figment.merge(Yaml::file(config_path));
        }

        figment
            .merge(Env::prefixed(env_prefix))
            .extract()
            .context("Failed to load configuration.")
    }

    /// Applies any overrides given on the command line.
    pub fn with_cli_overrides(mut self, cli: &Cli) -> Self {
        if let Some(format) = cli.format {
            self.output_format = format;
        }
        self
    }

    /// Returns the estimator configuration.
    pub fn estimator_config(&self) -> EstimatorConfig {
        EstimatorConfig::default()
            .with_monotonicity_tolerance(self.monotonicity_tolerance)
            .with_lower_bound_policy(self.lower_bound_policy)
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            monotonicity_tolerance: DEFAULT_MONOTONICITY_TOLERANCE,
            lower_bound_policy: LowerBoundPolicy::default(),
            output_format: OutputFormat::default(),
        }
    }
}
