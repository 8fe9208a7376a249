use std::io::{self, Write};

use bucket_quantile::{Corrections, QuantileEstimator};
use serde::Serialize;
use tracing::{debug, warn};

use crate::{config::OutputFormat, input::HistogramDocument};

#[derive(Clone, Debug, PartialEq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Estimate {
    /// Estimated value at a quantile.
    Quantile { quantile: f64, value: f64 },

    /// Estimated fraction of observations within a range.
    Fraction { lower: f64, upper: f64, value: f64 },
}

/// Estimates made from a single histogram.
#[derive(Debug)]
pub struct Report {
    name: String,
    estimates: Vec<Estimate>,
    corrections: Corrections,
}

impl Report {
    /// Makes all estimates requested by the given histogram document.
    ///
    /// # Errors
    ///
    /// If the buckets of the histogram are invalid, an error is returned.
    pub fn from_document(estimator: &QuantileEstimator, document: &HistogramDocument) -> Result<Self, anyhow::Error> {
        let name = document.name().to_string();
        let buckets = document.buckets()?;
        debug!(histogram = %name, buckets = buckets.len(), "Loaded histogram.");

        let quantiles = estimator.quantiles(document.quantiles(), buckets.clone());
        let mut estimates = quantiles
            .values
            .into_iter()
            .map(|(quantile, value)| Estimate::Quantile { quantile, value })
            .collect::<Vec<_>>();

        for range in &document.fractions {
            let (lower, upper) = (range.lower.get(), range.upper.get());
            let fraction = estimator.fraction(lower, upper, buckets.clone());
            estimates.push(Estimate::Fraction {
                lower,
                upper,
                value: fraction.value,
            });
        }

        for estimate in &estimates {
            debug!(histogram = %name, ?estimate, "Estimated.");
        }

        Ok(Self {
            name,
            estimates,
            corrections: quantiles.corrections,
        })
    }

    /// Emits any corrections made to the bucket counts.
    ///
    /// Forced corrections mean the histogram data itself was inconsistent, which can make estimates inaccurate, so they
    /// are logged as warnings. Corrections of floating-point noise are expected and only logged at debug level.
    pub fn log_corrections(&self) {
        if self.corrections.forced() {
            warn!(
                histogram = %self.name,
                "Bucket counts were not monotonically increasing and had to be corrected. Estimates may be inaccurate."
            );
        } else if self.corrections.fixed() {
            debug!(histogram = %self.name, "Corrected floating-point imprecision in bucket counts.");
        }
    }

    /// Writes the report in the given format.
    ///
    /// In JSON, values which are not finite (such as the NaN returned when a histogram has no observations) are written
    /// as `null`.
    ///
    /// # Errors
    ///
    /// If an error occurs while writing, it will be returned.
    pub fn write_to<W: Write>(&self, format: OutputFormat, mut writer: W) -> io::Result<()> {
        for estimate in &self.estimates {
            match format {
                OutputFormat::Text => match estimate {
                    Estimate::Quantile { quantile, value } => {
                        writeln!(writer, "{} quantile({}) = {}", self.name, quantile, value)?
                    }
                    Estimate::Fraction { lower, upper, value } => {
                        writeln!(writer, "{} fraction({}, {}) = {}", self.name, lower, upper, value)?
                    }
                },
                OutputFormat::Json => {
                    let line = serde_json::json!({
                        "histogram": self.name,
                        "estimate": estimate,
                        "forced": self.corrections.forced(),
                        "fixed": self.corrections.fixed(),
                    });
                    writeln!(writer, "{}", line)?;
                }
            }
        }

        writer.flush()
    }
}
