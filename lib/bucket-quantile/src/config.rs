use snafu::{ensure, Snafu};

use crate::DEFAULT_MONOTONICITY_TOLERANCE;

/// A configuration error.
#[derive(Debug, Snafu, PartialEq)]
#[snafu(context(suffix(false)))]
pub enum ConfigError {
    /// The monotonicity tolerance was not a finite, non-negative number.
    #[snafu(display(
        "Monotonicity tolerance must be a finite, non-negative number, got {} instead.",
        tolerance
    ))]
    InvalidTolerance {
        /// The invalid tolerance.
        tolerance: f64,
    },
}

/// How the lower edge of a bucket is treated when interpolating within it.
#[derive(Clone, Copy, Debug, Default, Eq, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Deserialize, serde::Serialize))]
#[cfg_attr(feature = "serde", serde(rename_all = "snake_case"))]
pub enum LowerBoundPolicy {
    /// Lower edges below zero are raised to zero.
    ///
    /// Suitable for histograms over values which cannot be negative, such as durations or sizes. Clamping only
    /// applies to interpolation: the bucket a rank falls into is chosen from the unclamped bounds.
    #[default]
    ClampToZero,

    /// Lower edges are used as-is.
    ///
    /// Suitable for histograms over arbitrary real-valued domains, such as temperatures.
    Unclamped,
}

impl LowerBoundPolicy {
    /// Applies the policy to the given lower edge.
    pub fn apply(self, lower_bound: f64) -> f64 {
        match self {
            Self::ClampToZero => lower_bound.max(0.0),
            Self::Unclamped => lower_bound,
        }
    }
}

/// Estimator configuration.
#[derive(Clone, Copy, Debug, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Deserialize, serde::Serialize))]
#[cfg_attr(feature = "serde", serde(default))]
pub struct EstimatorConfig {
    /// Relative tolerance under which a monotonicity violation is considered floating-point noise.
    ///
    /// Defaults to [`DEFAULT_MONOTONICITY_TOLERANCE`].
    pub monotonicity_tolerance: f64,

    /// How the lower edge of a bucket is treated when interpolating within it.
    ///
    /// Defaults to [`LowerBoundPolicy::ClampToZero`].
    pub lower_bound_policy: LowerBoundPolicy,
}

impl EstimatorConfig {
    /// Sets the relative monotonicity tolerance.
    pub fn with_monotonicity_tolerance(mut self, tolerance: f64) -> Self {
        self.monotonicity_tolerance = tolerance;
        self
    }

    /// Sets the lower bound policy.
    pub fn with_lower_bound_policy(mut self, policy: LowerBoundPolicy) -> Self {
        self.lower_bound_policy = policy;
        self
    }

    /// Validates the configuration.
    ///
    /// # Errors
    ///
    /// If the monotonicity tolerance is NaN, infinite, or negative, an error is returned.
    pub fn validate(&self) -> Result<(), ConfigError> {
        let tolerance = self.monotonicity_tolerance;
        ensure!(tolerance.is_finite() && tolerance >= 0.0, InvalidTolerance { tolerance });

        Ok(())
    }
}

impl Default for EstimatorConfig {
    fn default() -> Self {
        Self {
            monotonicity_tolerance: DEFAULT_MONOTONICITY_TOLERANCE,
            lower_bound_policy: LowerBoundPolicy::default(),
        }
    }
}
