use crate::{Bucket, LowerBoundPolicy, MonotonicBuckets};

/// Estimates values from cumulative histogram buckets by linear interpolation.
///
/// Observations are assumed to be uniformly distributed within each bucket. The first bucket is assumed to start at
/// zero, unless its upper bound is itself at or below zero, in which case it is never subdivided.
#[derive(Clone, Copy, Debug, Default)]
pub struct Interpolator {
    lower_bound_policy: LowerBoundPolicy,
}

impl Interpolator {
    /// Creates a new `Interpolator` with the given lower bound policy.
    pub fn new(lower_bound_policy: LowerBoundPolicy) -> Self {
        Self { lower_bound_policy }
    }

    /// Estimates the value at the given quantile.
    ///
    /// Never fails, but returns sentinel values for degenerate inputs:
    ///
    /// - negative infinity if `q` is less than 0, and positive infinity if `q` is greater than 1
    /// - NaN if `q` is NaN, if there are fewer than two buckets, or if there are no observations
    ///
    /// When the quantile falls into the last bucket, which has no upper bound to interpolate towards, the upper bound of
    /// the second-to-last bucket is returned.
    pub fn quantile(&self, q: f64, buckets: &MonotonicBuckets) -> f64 {
        if q.is_nan() {
            return f64::NAN;
        }

        if q < 0.0 {
            return f64::NEG_INFINITY;
        }

        if q > 1.0 {
            return f64::INFINITY;
        }

        let buckets = buckets.as_slice();
        let Some(total) = observations(buckets) else {
            return f64::NAN;
        };

        let mut rank = q * total;

        // Counts are non-decreasing, so the buckets are partitioned by whether or not they cover the rank.
        let bounded = &buckets[..buckets.len() - 1];
        let b = bounded.partition_point(|bucket| bucket.count < rank);
        if b == bounded.len() {
            return bounded[b - 1].upper_bound;
        }

        if b == 0 && buckets[0].upper_bound <= 0.0 {
            return buckets[0].upper_bound;
        }

        let bucket_end = buckets[b].upper_bound;
        let mut bucket_count = buckets[b].count;
        let mut bucket_start = 0.0;
        if b > 0 {
            let prev = &buckets[b - 1];
            bucket_start = prev.upper_bound;
            bucket_count -= prev.count;
            rank -= prev.count;
        }

        let bucket_start = self.lower_bound_policy.apply(bucket_start);

        // Only reachable for a rank of zero landing in an empty first bucket.
        if bucket_count == 0.0 {
            return bucket_start;
        }

        bucket_start + (bucket_end - bucket_start) * (rank / bucket_count)
    }

    /// Estimates the fraction of observations greater than `lower` and less than or equal to `upper`.
    ///
    /// Returns a value between 0 and 1, inclusive. Returns 0 if `lower` is not less than `upper`. Returns NaN if either
    /// bound is NaN, if there are fewer than two buckets, or if there are no observations.
    pub fn fraction(&self, lower: f64, upper: f64, buckets: &MonotonicBuckets) -> f64 {
        if lower.is_nan() || upper.is_nan() {
            return f64::NAN;
        }

        let buckets = buckets.as_slice();
        let Some(total) = observations(buckets) else {
            return f64::NAN;
        };

        if lower >= upper {
            return 0.0;
        }

        let upper_rank = self.rank_at(upper, buckets);
        let lower_rank = self.rank_at(lower, buckets);
        ((upper_rank - lower_rank) / total).clamp(0.0, 1.0)
    }

    /// Estimates the number of observations less than or equal to `value`.
    fn rank_at(&self, value: f64, buckets: &[Bucket]) -> f64 {
        let last = buckets.len() - 1;

        let b = buckets.partition_point(|bucket| bucket.upper_bound < value);
        if b > last {
            return buckets[last].count;
        }

        let bucket = &buckets[b];
        if b == 0 {
            if bucket.upper_bound <= 0.0 {
                return if value < bucket.upper_bound { 0.0 } else { bucket.count };
            }

            if value <= 0.0 {
                return 0.0;
            }

            return bucket.count * (value / bucket.upper_bound);
        }

        let prev = &buckets[b - 1];
        if bucket.upper_bound == f64::INFINITY {
            // Nothing is known about where observations sit in the unbounded tail.
            return if value == f64::INFINITY { bucket.count } else { prev.count };
        }

        if value >= bucket.upper_bound {
            return bucket.count;
        }

        // Clamping can push the start to or past the end of a bucket below zero, leaving a step at its upper bound.
        let bucket_start = self.lower_bound_policy.apply(prev.upper_bound);
        if value <= bucket_start || bucket_start >= bucket.upper_bound {
            return prev.count;
        }

        let position = (value - bucket_start) / (bucket.upper_bound - bucket_start);
        prev.count + (bucket.count - prev.count) * position
    }
}

/// Returns the total number of observations, if there is enough data to interpolate.
fn observations(buckets: &[Bucket]) -> Option<f64> {
    if buckets.len() < 2 {
        return None;
    }

    let total = buckets[buckets.len() - 1].count;
    if total == 0.0 {
        return None;
    }

    Some(total)
}
