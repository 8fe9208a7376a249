use crate::{Bucket, Buckets};

/// Default relative tolerance used to tell floating-point noise apart from genuine monotonicity violations.
///
/// A bucket whose count deviates from the preceding count by no more than this fraction of the preceding count is
/// considered to be suffering from floating-point imprecision (for example, from summing the same series in a
/// different order) and is corrected silently. A larger decrease is reported as a forced correction.
pub const DEFAULT_MONOTONICITY_TOLERANCE: f64 = 1e-12;

/// Corrections made while enforcing monotonicity.
#[derive(Clone, Copy, Debug, Default, Eq, PartialEq)]
pub struct Corrections {
    forced: bool,
    fixed: bool,
}

impl Corrections {
    /// Returns `true` if any count had to be corrected by more than the tolerance.
    ///
    /// This indicates a genuine anomaly in the input data, rather than floating-point noise, and may be worth
    /// surfacing as a correctness caveat. A forced correction is always also a fixed correction.
    pub fn forced(&self) -> bool {
        self.forced
    }

    /// Returns `true` if any count had to be corrected at all.
    pub fn fixed(&self) -> bool {
        self.fixed
    }

    /// Returns `true` if no count was corrected.
    pub fn is_clean(&self) -> bool {
        !self.fixed
    }
}

/// A set of buckets whose counts are known to be non-decreasing.
///
/// This can only be obtained from [`MonotonicityEnforcer`], which ensures that interpolation never sees unrepaired
/// counts.
#[derive(Clone, Debug, PartialEq)]
pub struct MonotonicBuckets(Buckets);

impl MonotonicBuckets {
    /// Returns the buckets as a slice.
    pub fn as_slice(&self) -> &[Bucket] {
        self.0.as_slice()
    }

    /// Returns the number of buckets.
    pub fn len(&self) -> usize {
        self.0.len()
    }

    /// Returns `true` if there are no buckets.
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Consumes `self`, returning the underlying buckets.
    pub fn into_inner(self) -> Buckets {
        self.0
    }
}

impl AsRef<Buckets> for MonotonicBuckets {
    fn as_ref(&self) -> &Buckets {
        &self.0
    }
}

/// The result of enforcing monotonicity over a set of buckets.
#[derive(Clone, Debug, PartialEq)]
pub struct Enforced {
    /// The repaired buckets.
    pub buckets: MonotonicBuckets,

    /// Corrections that were made to produce `buckets`.
    pub corrections: Corrections,
}

/// Enforces that cumulative bucket counts never decrease.
///
/// Cumulative counts are non-decreasing by definition, but once they have been aggregated across sources or run
/// through floating-point arithmetic they may not look that way. The enforcer walks the buckets once, from lowest to
/// highest upper bound, and raises any count which is lower than its predecessor up to the predecessor's count.
///
/// Corrections are classified by their relative size. A count within the tolerance of its predecessor, in either
/// direction, is treated as floating-point noise and set equal to the predecessor: this is a fixed correction. A count
/// lower than its predecessor by more than the tolerance is a genuine anomaly: this is a forced correction.
#[derive(Clone, Copy, Debug)]
pub struct MonotonicityEnforcer {
    tolerance: f64,
}

impl MonotonicityEnforcer {
    /// Creates a new `MonotonicityEnforcer` with the given relative tolerance.
    ///
    /// The tolerance is not validated. A NaN or negative tolerance treats every deviation as genuine, so every decrease
    /// is a forced correction and every increase advances the running count. Use [`EstimatorConfig::validate`] (or
    /// [`QuantileEstimator::from_config`]) to reject such tolerances up front.
    ///
    /// [`EstimatorConfig::validate`]: crate::EstimatorConfig::validate
    /// [`QuantileEstimator::from_config`]: crate::QuantileEstimator::from_config
    pub fn new(tolerance: f64) -> Self {
        Self { tolerance }
    }

    /// Returns the relative tolerance of this enforcer.
    pub fn tolerance(&self) -> f64 {
        self.tolerance
    }

    /// Enforces monotonicity over the given buckets, returning the repaired buckets and the corrections made.
    pub fn enforce(&self, mut buckets: Buckets) -> Enforced {
        let corrections = self.enforce_in_place(buckets.as_mut_slice());

        Enforced {
            buckets: MonotonicBuckets(buckets),
            corrections,
        }
    }

    /// Enforces monotonicity over the given buckets in place, returning the corrections made.
    ///
    /// Counts of NaN are left as-is.
    pub fn enforce_in_place(&self, buckets: &mut [Bucket]) -> Corrections {
        let mut corrections = Corrections::default();

        let Some((first, rest)) = buckets.split_first_mut() else {
            return corrections;
        };

        let mut prev_count = first.count;
        for bucket in rest {
            if bucket.count == prev_count {
                continue;
            }

            // Deviations within the tolerance are noise in either direction, and never become the new baseline.
            if self.is_negligible(prev_count, bucket.count) {
                bucket.count = prev_count;
                corrections.fixed = true;
                continue;
            }

            if bucket.count < prev_count {
                bucket.count = prev_count;
                corrections.fixed = true;
                corrections.forced = true;
                continue;
            }

            prev_count = bucket.count;
        }

        corrections
    }

    fn is_negligible(&self, prev_count: f64, count: f64) -> bool {
        // Nothing is a small deviation relative to zero: a zero predecessor can only be undercut by a negative count,
        // or followed by a genuine increase.
        if prev_count == 0.0 {
            return false;
        }

        (count - prev_count).abs() / prev_count.abs() <= self.tolerance
    }
}

impl Default for MonotonicityEnforcer {
    fn default() -> Self {
        Self::new(DEFAULT_MONOTONICITY_TOLERANCE)
    }
}

#[cfg(test)]
mod tests {
    use proptest::prelude::*;

    use super::*;

    fn counts(buckets: &[Bucket]) -> Vec<f64> {
        buckets.iter().map(|bucket| bucket.count).collect()
    }

    #[test]
    fn already_monotonic() {
        let buckets = Buckets::from([(1.0, 1.0), (2.0, 1.0), (3.0, 4.0), (f64::INFINITY, 4.0)]);
        let enforced = MonotonicityEnforcer::default().enforce(buckets.clone());

        assert!(enforced.corrections.is_clean());
        assert!(!enforced.corrections.forced());
        assert_eq!(enforced.buckets.into_inner(), buckets);
    }

    #[test]
    fn noise_is_fixed_but_not_forced() {
        let buckets = Buckets::from([(10.0, 10.0), (15.0, 15.0), (20.0, 15.00000000001), (30.0, 15.0)]);
        let enforced = MonotonicityEnforcer::default().enforce(buckets);

        assert!(enforced.corrections.fixed());
        assert!(!enforced.corrections.forced());
        assert_eq!(counts(enforced.buckets.as_slice()), vec![10.0, 15.0, 15.0, 15.0]);
    }

    #[test]
    fn upward_noise_does_not_advance_baseline() {
        let buckets = Buckets::from([
            (64.0, 46008473.85855638),
            (80.0, 46008473.85855639),
            (100.0, 46008473.85855638),
            (f64::INFINITY, 46008473.85855638),
        ]);
        let enforced = MonotonicityEnforcer::default().enforce(buckets);

        assert!(enforced.corrections.fixed());
        assert!(!enforced.corrections.forced());
        assert_eq!(counts(enforced.buckets.as_slice()), vec![46008473.85855638; 4]);
    }

    #[test]
    fn large_drop_is_forced() {
        let buckets = Buckets::from([(1.0, 5.0), (2.0, 3.0), (3.0, 4.0), (f64::INFINITY, 6.0)]);
        let enforced = MonotonicityEnforcer::default().enforce(buckets);

        assert!(enforced.corrections.fixed());
        assert!(enforced.corrections.forced());
        assert_eq!(counts(enforced.buckets.as_slice()), vec![5.0, 5.0, 5.0, 6.0]);
    }

    #[test]
    fn tolerance_boundary() {
        // A drop of exactly 10% is within a 10% tolerance, but anything beyond it is not.
        let enforcer = MonotonicityEnforcer::new(0.1);

        let mut within = [Bucket::new(1.0, 100.0), Bucket::new(2.0, 90.0)];
        let corrections = enforcer.enforce_in_place(&mut within);
        assert!(corrections.fixed());
        assert!(!corrections.forced());

        let mut beyond = [Bucket::new(1.0, 100.0), Bucket::new(2.0, 89.0)];
        let corrections = enforcer.enforce_in_place(&mut beyond);
        assert!(corrections.fixed());
        assert!(corrections.forced());
    }

    #[test]
    fn unusable_tolerance_treats_all_deviations_as_genuine() {
        for tolerance in [f64::NAN, -1.0] {
            let enforcer = MonotonicityEnforcer::new(tolerance);

            let mut buckets = [
                Bucket::new(1.0, 15.0),
                Bucket::new(2.0, 15.00000000001),
                Bucket::new(3.0, 15.0),
            ];
            let corrections = enforcer.enforce_in_place(&mut buckets);

            assert!(corrections.forced());
            assert_eq!(counts(&buckets), vec![15.0, 15.00000000001, 15.00000000001]);
        }
    }

    #[test]
    fn negative_count_after_zero_is_forced() {
        let mut buckets = [Bucket::new(1.0, 0.0), Bucket::new(2.0, -1.0)];
        let corrections = MonotonicityEnforcer::default().enforce_in_place(&mut buckets);
        assert!(corrections.forced());
        assert_eq!(buckets[1].count, 0.0);
    }

    #[test]
    fn degenerate_lengths() {
        let enforcer = MonotonicityEnforcer::default();
        assert_eq!(enforcer.enforce_in_place(&mut []), Corrections::default());

        let mut single = [Bucket::new(f64::INFINITY, 3.0)];
        assert_eq!(enforcer.enforce_in_place(&mut single), Corrections::default());
    }

    proptest! {
        #[test]
        fn property_test_monotonic_after_enforce(raw_counts in proptest::collection::vec(0.0f64..1.0e9, 0..32)) {
            let buckets = raw_counts
                .iter()
                .enumerate()
                .map(|(i, count)| Bucket::new(i as f64, *count))
                .collect::<Buckets>();

            let enforced = MonotonicityEnforcer::default().enforce(buckets);
            for pair in enforced.buckets.as_slice().windows(2) {
                prop_assert!(pair[0].count <= pair[1].count);
            }

            if enforced.corrections.forced() {
                prop_assert!(enforced.corrections.fixed());
            }
        }

        #[test]
        fn property_test_idempotent(raw_counts in proptest::collection::vec(0.0f64..1.0e9, 0..32)) {
            let buckets = raw_counts
                .iter()
                .enumerate()
                .map(|(i, count)| Bucket::new(i as f64, *count))
                .collect::<Buckets>();

            let enforcer = MonotonicityEnforcer::default();
            let first = enforcer.enforce(buckets);
            let repaired = first.buckets.into_inner();

            let second = enforcer.enforce(repaired.clone());
            prop_assert_eq!(second.corrections, Corrections::default());
            prop_assert_eq!(second.buckets.into_inner(), repaired);
        }
    }
}
