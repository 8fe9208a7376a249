//! Quantile estimation over cumulative histogram buckets.
//!
//! Classic histograms, such as those exposed by Prometheus, only carry a set of buckets: an upper bound, and the number
//! of observations less than or equal to that bound. This crate estimates quantiles (and the fraction of observations
//! within a range) from such buckets, without access to the raw observations.
//!
//! Estimation happens in two steps:
//!
//! - counts are made non-decreasing by a [`MonotonicityEnforcer`], which also reports whether the corrections it made
//!   were floating-point noise or a genuine anomaly in the data
//! - the repaired buckets are handed to an [`Interpolator`], which locates the bucket holding the requested rank and
//!   linearly interpolates within it
//!
//! [`QuantileEstimator`] wires the two together.
//!
//! # Example
//!
//! ```
//! use bucket_quantile::{Buckets, QuantileEstimator};
//!
//! let buckets = Buckets::from([(1.0, 10.0), (5.0, 14.0), (10.0, 15.0), (f64::INFINITY, 15.0)]);
//! let estimate = QuantileEstimator::default().quantile(0.5, buckets);
//!
//! assert_eq!(estimate.value, 0.75);
//! assert!(estimate.corrections.is_clean());
//! ```
//!
//! # Features
//!
//! This crate exposes a single feature, `serde`, which enables serialization and deserialization of buckets and of the
//! estimator configuration.
#![deny(warnings)]
#![deny(missing_docs)]

mod bucket;
pub use self::bucket::{Bucket, Buckets, BucketsError};

mod config;
pub use self::config::{ConfigError, EstimatorConfig, LowerBoundPolicy};

mod estimator;
pub use self::estimator::{bucket_quantile, FractionEstimate, QuantileEstimate, QuantileEstimates, QuantileEstimator};

mod interpolate;
pub use self::interpolate::Interpolator;

mod monotonicity;
pub use self::monotonicity::{
    Corrections, Enforced, MonotonicBuckets, MonotonicityEnforcer, DEFAULT_MONOTONICITY_TOLERANCE,
};
