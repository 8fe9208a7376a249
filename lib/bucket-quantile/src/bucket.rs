use ordered_float::OrderedFloat;
use smallvec::SmallVec;
use snafu::{ensure, Snafu};

/// Number of buckets that can be held without spilling to the heap.
///
/// Classic histograms rarely carry more than a dozen or so buckets, so this covers the common case.
const INLINE_BUCKETS: usize = 16;

/// An error encountered while assembling a set of buckets.
#[derive(Debug, Snafu, PartialEq)]
#[snafu(context(suffix(false)))]
pub enum BucketsError {
    /// A bucket had an upper bound which was not a number.
    #[snafu(display("Bucket at index {} has an upper bound of NaN.", index))]
    NanUpperBound {
        /// Index of the offending bucket, in input order.
        index: usize,
    },

    /// A bucket had a count which was either not a number or negative.
    #[snafu(display("Bucket with upper bound {} has an invalid count ({}).", upper_bound, count))]
    InvalidCount {
        /// Upper bound of the offending bucket.
        upper_bound: f64,

        /// The invalid count.
        count: f64,
    },

    /// Upper bounds were not strictly increasing.
    #[snafu(display(
        "Bucket upper bounds must be strictly increasing, but {} follows {}.",
        upper_bound,
        previous_upper_bound
    ))]
    Unordered {
        /// Upper bound of the bucket preceding the offending bucket.
        previous_upper_bound: f64,

        /// Upper bound of the offending bucket.
        upper_bound: f64,
    },
}

/// A cumulative histogram bucket.
#[derive(Clone, Copy, Debug, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Deserialize, serde::Serialize))]
pub struct Bucket {
    /// The upper limit (inclusive) of values counted by the bucket.
    ///
    /// Only the last bucket in a set of buckets may have an upper bound of positive infinity.
    pub upper_bound: f64,

    /// The number of observations less than or equal to `upper_bound`.
    pub count: f64,
}

impl Bucket {
    /// Creates a new `Bucket`.
    pub const fn new(upper_bound: f64, count: f64) -> Self {
        Self { upper_bound, count }
    }

    fn validate(&self, index: usize) -> Result<(), BucketsError> {
        ensure!(!self.upper_bound.is_nan(), NanUpperBound { index });

        // NaN counts fail this comparison too.
        ensure!(
            self.count >= 0.0,
            InvalidCount {
                upper_bound: self.upper_bound,
                count: self.count,
            }
        );

        Ok(())
    }
}

impl From<(f64, f64)> for Bucket {
    fn from((upper_bound, count): (f64, f64)) -> Self {
        Self::new(upper_bound, count)
    }
}

/// An ordered set of cumulative histogram buckets.
///
/// Buckets are expected to be ordered by strictly increasing upper bound, with the last bucket having an upper bound
/// of positive infinity and holding the total number of observations. When the last bucket is finite, its count is
/// still treated as the total.
///
/// The infallible conversions (`From<Vec<Bucket>>`, `FromIterator<Bucket>`, and so on) take the ordering on trust. Use
/// [`try_from_sorted`][Self::try_from_sorted] to have it checked, or [`from_unsorted`][Self::from_unsorted] to have it
/// established.
#[derive(Clone, Debug, Default, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Deserialize, serde::Serialize))]
#[cfg_attr(feature = "serde", serde(transparent))]
pub struct Buckets {
    buckets: SmallVec<[Bucket; INLINE_BUCKETS]>,
}

impl Buckets {
    /// Creates a `Buckets` from buckets that are already ordered by upper bound.
    ///
    /// # Errors
    ///
    /// If any bucket has an upper bound of NaN, a count that is NaN or negative, or if the upper bounds are not strictly
    /// increasing, an error is returned.
    pub fn try_from_sorted<I>(buckets: I) -> Result<Self, BucketsError>
    where
        I: IntoIterator,
        I::Item: Into<Bucket>,
    {
        let buckets = buckets.into_iter().map(Into::into).collect::<SmallVec<[Bucket; INLINE_BUCKETS]>>();
        for (index, bucket) in buckets.iter().enumerate() {
            bucket.validate(index)?;
        }

        for pair in buckets.windows(2) {
            ensure!(
                pair[1].upper_bound > pair[0].upper_bound,
                Unordered {
                    previous_upper_bound: pair[0].upper_bound,
                    upper_bound: pair[1].upper_bound,
                }
            );
        }

        Ok(Self { buckets })
    }

    /// Creates a `Buckets` from buckets in any order.
    ///
    /// Buckets are sorted by upper bound, and buckets which share the same upper bound are coalesced into a single bucket
    /// by summing their counts. This happens when the same bound is reported under differently formatted labels, such
    /// as `1` and `1.0`.
    ///
    /// # Errors
    ///
    /// If any bucket has an upper bound of NaN, or a count that is NaN or negative, an error is returned.
    pub fn from_unsorted<I>(buckets: I) -> Result<Self, BucketsError>
    where
        I: IntoIterator,
        I::Item: Into<Bucket>,
    {
        let mut sorted = SmallVec::<[Bucket; INLINE_BUCKETS]>::new();
        for (index, bucket) in buckets.into_iter().map(Into::into).enumerate() {
            bucket.validate(index)?;
            sorted.push(bucket);
        }

        // Upper bounds are known to not be NaN at this point, so the ordering is total.
        sorted.sort_unstable_by_key(|bucket| OrderedFloat(bucket.upper_bound));

        let mut coalesced = SmallVec::<[Bucket; INLINE_BUCKETS]>::with_capacity(sorted.len());
        for bucket in sorted {
            match coalesced.last_mut() {
                Some(last) if last.upper_bound == bucket.upper_bound => last.count += bucket.count,
                _ => coalesced.push(bucket),
            }
        }

        Ok(Self { buckets: coalesced })
    }

    /// Returns the number of buckets.
    pub fn len(&self) -> usize {
        self.buckets.len()
    }

    /// Returns `true` if there are no buckets.
    pub fn is_empty(&self) -> bool {
        self.buckets.is_empty()
    }

    /// Returns an iterator over the buckets, in order.
    pub fn iter(&self) -> std::slice::Iter<'_, Bucket> {
        self.buckets.iter()
    }

    /// Returns the buckets as a slice.
    pub fn as_slice(&self) -> &[Bucket] {
        &self.buckets
    }

    pub(crate) fn as_mut_slice(&mut self) -> &mut [Bucket] {
        &mut self.buckets
    }

    /// Returns the total number of observations, taken from the last bucket.
    ///
    /// If there are no buckets, `None` is returned.
    pub fn total_count(&self) -> Option<f64> {
        self.buckets.last().map(|bucket| bucket.count)
    }

    /// Returns `true` if the last bucket has an upper bound of positive infinity.
    pub fn has_unbounded_tail(&self) -> bool {
        self.buckets
            .last()
            .is_some_and(|bucket| bucket.upper_bound == f64::INFINITY)
    }

    /// Consumes `self`, returning the buckets as a vector.
    pub fn into_vec(self) -> Vec<Bucket> {
        self.buckets.into_vec()
    }
}

impl From<Vec<Bucket>> for Buckets {
    fn from(buckets: Vec<Bucket>) -> Self {
        Self {
            buckets: SmallVec::from_vec(buckets),
        }
    }
}

impl<const N: usize> From<[(f64, f64); N]> for Buckets {
    fn from(buckets: [(f64, f64); N]) -> Self {
        buckets.into_iter().map(Bucket::from).collect()
    }
}

impl FromIterator<Bucket> for Buckets {
    fn from_iter<I: IntoIterator<Item = Bucket>>(iter: I) -> Self {
        Self {
            buckets: iter.into_iter().collect(),
        }
    }
}

impl<'a> IntoIterator for &'a Buckets {
    type Item = &'a Bucket;
    type IntoIter = std::slice::Iter<'a, Bucket>;

    fn into_iter(self) -> Self::IntoIter {
        self.buckets.iter()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn total_count_and_tail() {
        let buckets = Buckets::from([(1.0, 2.0), (5.0, 4.0), (f64::INFINITY, 7.0)]);
        assert_eq!(buckets.len(), 3);
        assert_eq!(buckets.total_count(), Some(7.0));
        assert!(buckets.has_unbounded_tail());

        let finite = Buckets::from([(1.0, 2.0), (5.0, 4.0)]);
        assert_eq!(finite.total_count(), Some(4.0));
        assert!(!finite.has_unbounded_tail());

        let empty = Buckets::default();
        assert!(empty.is_empty());
        assert_eq!(empty.total_count(), None);
        assert!(!empty.has_unbounded_tail());
    }

    #[test]
    fn try_from_sorted_accepts_ordered() {
        let buckets = Buckets::try_from_sorted([(0.5, 1.0), (1.0, 3.0), (f64::INFINITY, 3.0)]).unwrap();
        assert_eq!(buckets.as_slice()[1], Bucket::new(1.0, 3.0));
    }

    #[test]
    fn try_from_sorted_rejects_unordered() {
        let result = Buckets::try_from_sorted([(1.0, 1.0), (1.0, 3.0), (f64::INFINITY, 3.0)]);
        assert_eq!(
            result,
            Err(BucketsError::Unordered {
                previous_upper_bound: 1.0,
                upper_bound: 1.0
            })
        );

        let result = Buckets::try_from_sorted([(2.0, 1.0), (1.0, 3.0)]);
        assert!(matches!(result, Err(BucketsError::Unordered { .. })));
    }

    #[test]
    fn try_from_sorted_rejects_invalid_values() {
        let result = Buckets::try_from_sorted([(1.0, 1.0), (f64::NAN, 3.0)]);
        assert_eq!(result, Err(BucketsError::NanUpperBound { index: 1 }));

        let result = Buckets::try_from_sorted([(1.0, -1.0), (f64::INFINITY, 3.0)]);
        assert!(matches!(result, Err(BucketsError::InvalidCount { upper_bound, .. }) if upper_bound == 1.0));

        let result = Buckets::try_from_sorted([(1.0, f64::NAN)]);
        assert!(matches!(result, Err(BucketsError::InvalidCount { .. })));
    }

    #[test]
    fn from_unsorted_sorts_and_coalesces() {
        let buckets =
            Buckets::from_unsorted([(f64::INFINITY, 10.0), (1.0, 2.0), (0.5, 1.0), (1.0, 3.0), (2.0, 8.0)]).unwrap();

        let expected = Buckets::from([(0.5, 1.0), (1.0, 5.0), (2.0, 8.0), (f64::INFINITY, 10.0)]);
        assert_eq!(buckets, expected);
    }

    #[test]
    fn from_unsorted_rejects_nan_bound() {
        let result = Buckets::from_unsorted([(1.0, 2.0), (f64::NAN, 3.0)]);
        assert_eq!(result, Err(BucketsError::NanUpperBound { index: 1 }));
    }

    #[test]
    fn error_display() {
        let error = BucketsError::Unordered {
            previous_upper_bound: 5.0,
            upper_bound: 2.0,
        };
        assert_eq!(
            error.to_string(),
            "Bucket upper bounds must be strictly increasing, but 2 follows 5."
        );
    }
}
