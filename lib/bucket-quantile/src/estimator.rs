use crate::{Buckets, ConfigError, Corrections, EstimatorConfig, Interpolator, MonotonicityEnforcer};

/// A quantile estimated from a set of buckets.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct QuantileEstimate {
    /// The estimated value.
    pub value: f64,

    /// Corrections made to the bucket counts before estimating.
    pub corrections: Corrections,
}

/// Several quantiles estimated from the same set of buckets.
#[derive(Clone, Debug, PartialEq)]
pub struct QuantileEstimates {
    /// Quantiles and their estimated values, in the order they were requested.
    pub values: Vec<(f64, f64)>,

    /// Corrections made to the bucket counts before estimating.
    pub corrections: Corrections,
}

/// A fraction of observations estimated from a set of buckets.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct FractionEstimate {
    /// The estimated fraction, between 0 and 1.
    pub value: f64,

    /// Corrections made to the bucket counts before estimating.
    pub corrections: Corrections,
}

/// Estimates quantiles from cumulative histogram buckets.
///
/// Buckets are first repaired by a [`MonotonicityEnforcer`], and then handed to an [`Interpolator`]. Any corrections
/// made along the way are reported alongside the estimate, leaving it up to the caller to decide whether or not they
/// are worth surfacing.
#[derive(Clone, Copy, Debug, Default)]
pub struct QuantileEstimator {
    enforcer: MonotonicityEnforcer,
    interpolator: Interpolator,
}

impl QuantileEstimator {
    /// Creates a new `QuantileEstimator` from the given configuration.
    ///
    /// # Errors
    ///
    /// If the configuration is invalid, an error is returned.
    pub fn from_config(config: &EstimatorConfig) -> Result<Self, ConfigError> {
        config.validate()?;

        Ok(Self {
            enforcer: MonotonicityEnforcer::new(config.monotonicity_tolerance),
            interpolator: Interpolator::new(config.lower_bound_policy),
        })
    }

    /// Estimates the value at quantile `q`.
    ///
    /// See [`Interpolator::quantile`] for the values returned for degenerate inputs.
    pub fn quantile(&self, q: f64, buckets: Buckets) -> QuantileEstimate {
        let enforced = self.enforcer.enforce(buckets);

        QuantileEstimate {
            value: self.interpolator.quantile(q, &enforced.buckets),
            corrections: enforced.corrections,
        }
    }

    /// Estimates the values at each of the given quantiles.
    ///
    /// The buckets are only repaired once, regardless of how many quantiles are requested.
    pub fn quantiles(&self, qs: &[f64], buckets: Buckets) -> QuantileEstimates {
        let enforced = self.enforcer.enforce(buckets);

        QuantileEstimates {
            values: qs
                .iter()
                .map(|q| (*q, self.interpolator.quantile(*q, &enforced.buckets)))
                .collect(),
            corrections: enforced.corrections,
        }
    }

    /// Estimates the fraction of observations greater than `lower` and less than or equal to `upper`.
    ///
    /// See [`Interpolator::fraction`] for the values returned for degenerate inputs.
    pub fn fraction(&self, lower: f64, upper: f64, buckets: Buckets) -> FractionEstimate {
        let enforced = self.enforcer.enforce(buckets);

        FractionEstimate {
            value: self.interpolator.fraction(lower, upper, &enforced.buckets),
            corrections: enforced.corrections,
        }
    }
}

/// Estimates the value at quantile `q` using the default configuration.
///
/// Returns the estimated value, whether or not any count needed a forced correction, and whether or not any count was
/// corrected at all, in that order.
pub fn bucket_quantile(q: f64, buckets: Buckets) -> (f64, bool, bool) {
    let estimate = QuantileEstimator::default().quantile(q, buckets);
    (
        estimate.value,
        estimate.corrections.forced(),
        estimate.corrections.fixed(),
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::LowerBoundPolicy;

    #[test]
    fn from_config_rejects_invalid() {
        let config = EstimatorConfig::default().with_monotonicity_tolerance(-1.0);
        assert!(matches!(
            QuantileEstimator::from_config(&config),
            Err(ConfigError::InvalidTolerance { .. })
        ));
    }

    #[test]
    fn quantile_reports_corrections() {
        let buckets = Buckets::from([(1.0, 5.0), (2.0, 4.0), (f64::INFINITY, 10.0)]);
        let estimate = QuantileEstimator::default().quantile(0.25, buckets);

        assert_eq!(estimate.value, 0.5);
        assert!(estimate.corrections.forced());
        assert!(estimate.corrections.fixed());
    }

    #[test]
    fn quantiles_share_repair() {
        let buckets = Buckets::from([(10.0, 10.0), (20.0, 9.0), (f64::INFINITY, 20.0)]);
        let estimates = QuantileEstimator::default().quantiles(&[0.25, 0.5, 2.0], buckets);

        assert_eq!(estimates.values, vec![(0.25, 5.0), (0.5, 10.0), (2.0, f64::INFINITY)]);
        assert!(estimates.corrections.forced());
    }

    #[test]
    fn looser_tolerance_downgrades_to_fixed() {
        let config = EstimatorConfig::default().with_monotonicity_tolerance(0.2);
        let estimator = QuantileEstimator::from_config(&config).unwrap();

        let buckets = Buckets::from([(10.0, 10.0), (20.0, 9.0), (f64::INFINITY, 20.0)]);
        let estimate = estimator.quantile(0.5, buckets);
        assert!(estimate.corrections.fixed());
        assert!(!estimate.corrections.forced());
    }

    #[test]
    fn configured_lower_bound_policy() {
        let config = EstimatorConfig::default().with_lower_bound_policy(LowerBoundPolicy::Unclamped);
        let estimator = QuantileEstimator::from_config(&config).unwrap();

        let buckets = Buckets::from([(-10.0, 2.0), (10.0, 4.0), (f64::INFINITY, 4.0)]);
        assert_eq!(estimator.quantile(0.75, buckets.clone()).value, 0.0);
        assert_eq!(QuantileEstimator::default().quantile(0.75, buckets).value, 5.0);
    }

    #[test]
    fn fraction_reports_corrections() {
        let buckets = Buckets::from([(1.0, 2.0), (2.0, 1.0), (f64::INFINITY, 4.0)]);
        let estimate = QuantileEstimator::default().fraction(0.0, 2.0, buckets);

        assert_eq!(estimate.value, 0.5);
        assert!(estimate.corrections.forced());
    }

    #[test]
    fn bucket_quantile_tuple() {
        let buckets = Buckets::from([(1.0, 1.0), (2.0, 2.0), (f64::INFINITY, 2.0)]);
        assert_eq!(bucket_quantile(0.5, buckets), (1.0, false, false));
    }
}
