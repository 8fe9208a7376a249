use std::path::Path;

use anyhow::Context as _;
use bucket_quantile::{Bucket, Buckets, BucketsError};
use serde::Deserialize;

/// Quantiles estimated when a histogram document doesn't ask for anything.
const DEFAULT_QUANTILES: &[f64] = &[0.5, 0.9, 0.95, 0.99];

/// A bound on a histogram value.
///
/// Deserializes from either a number or a string, as bucket bounds are often exported as label values, such as `"0.5"`
/// or `"+Inf"`.
#[derive(Clone, Copy, Debug, Deserialize, PartialEq)]
#[serde(try_from = "RawBound")]
pub struct Bound(f64);

impl Bound {
    /// Returns the bound as a floating-point number.
    pub fn get(self) -> f64 {
        self.0
    }
}

#[derive(Deserialize)]
#[serde(untagged)]
enum RawBound {
    Number(f64),
    Text(String),
}

impl TryFrom<RawBound> for Bound {
    type Error = String;

    fn try_from(value: RawBound) -> Result<Self, Self::Error> {
        let bound = match value {
            RawBound::Number(bound) => bound,
            // Parsing already understands signed, case-insensitive spellings of infinity, such as `+Inf`.
            RawBound::Text(raw) => raw
                .trim()
                .parse::<f64>()
                .map_err(|e| format!("invalid bound '{}': {}", raw, e))?,
        };

        if bound.is_nan() {
            return Err("bound must not be NaN".to_string());
        }

        Ok(Self(bound))
    }
}

#[derive(Clone, Debug, Deserialize)]
pub struct BucketSpec {
    /// Upper bound (inclusive) of the bucket.
    pub le: Bound,

    /// Cumulative count of observations less than or equal to the upper bound.
    pub count: f64,
}

#[derive(Clone, Debug, Deserialize)]
pub struct FractionSpec {
    /// Lower bound (exclusive) of the range.
    pub lower: Bound,

    /// Upper bound (inclusive) of the range.
    pub upper: Bound,
}

/// A histogram, and the estimates to make from it.
#[derive(Clone, Debug, Deserialize)]
pub struct HistogramDocument {
    /// Name of the histogram.
    #[serde(default)]
    pub name: Option<String>,

    /// Cumulative buckets of the histogram, in any order.
    pub buckets: Vec<BucketSpec>,

    /// Quantiles to estimate.
    #[serde(default)]
    pub quantiles: Vec<f64>,

    /// Ranges to estimate the fraction of observations within.
    #[serde(default)]
    pub fractions: Vec<FractionSpec>,
}

impl HistogramDocument {
    /// Loads a histogram document from the given file.
    ///
    /// Files with a `.json` extension are parsed as JSON, and all other files as YAML.
    ///
    /// # Errors
    ///
    /// If the file cannot be read, or cannot be parsed, an error is returned.
    pub fn from_file<P>(path: P) -> Result<Self, anyhow::Error>
    where
        P: AsRef<Path>,
    {
        let path = path.as_ref();
        let raw = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read histogram file '{}'.", path.display()))?;

        let is_json = path
            .extension()
            .is_some_and(|extension| extension.eq_ignore_ascii_case("json"));
        if is_json {
            Self::from_json(&raw)
        } else {
            Self::from_yaml(&raw)
        }
    }

    fn from_json(raw: &str) -> Result<Self, anyhow::Error> {
        serde_json::from_str(raw).context("Failed to parse histogram as JSON.")
    }

    fn from_yaml(raw: &str) -> Result<Self, anyhow::Error> {
        serde_yaml::from_str(raw).context("Failed to parse histogram as YAML.")
    }

    /// Returns the name of the histogram, or a placeholder if it has none.
    pub fn name(&self) -> &str {
        self.name.as_deref().unwrap_or("<unnamed>")
    }

    /// Returns the quantiles to estimate.
    ///
    /// When the document asks for neither quantiles nor fractions, a default set of quantiles is returned.
    pub fn quantiles(&self) -> &[f64] {
        if self.quantiles.is_empty() && self.fractions.is_empty() {
            DEFAULT_QUANTILES
        } else {
            &self.quantiles
        }
    }

    /// Assembles the buckets of the histogram.
    ///
    /// # Errors
    ///
    /// If any bucket has an invalid count, an error is returned.
    pub fn buckets(&self) -> Result<Buckets, BucketsError> {
        Buckets::from_unsorted(
            self.buckets
                .iter()
                .map(|bucket| Bucket::new(bucket.le.get(), bucket.count)),
        )
    }
}
