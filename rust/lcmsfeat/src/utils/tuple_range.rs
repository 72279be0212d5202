use serde::{
    Deserialize,
    Serialize,
};
use thiserror::Error;

/// Finds the index range of elements in a sorted slice whose keys fall within
/// the closed interval `[low, high]`.
///
/// The slice must be sorted by `key_fn`. Works on floating point keys, which
/// is the common case here (m/z and retention time), so `Ord` is not required.
///
/// # Examples
///
/// ```
/// use lcmsfeat::utils::binary_search_range_by_key;
///
/// let rts = vec![1.0f32, 2.0, 3.0, 4.0, 5.0];
/// let range = binary_search_range_by_key(&rts, 2.0, 4.0, |x| *x);
/// assert_eq!(&rts[range], &[2.0, 3.0, 4.0]);
///
/// let empty = binary_search_range_by_key(&rts, 10.0, 20.0, |x| *x);
/// assert!(rts[empty].is_empty());
/// ```
pub fn binary_search_range_by_key<T, K, F>(
    slice: &[T],
    low: K,
    high: K,
    key_fn: F,
) -> std::ops::Range<usize>
where
    F: Fn(&T) -> K,
    K: PartialOrd,
{
    let start_idx = slice.partition_point(|x| key_fn(x) < low);
    let end_idx = start_idx + slice[start_idx..].partition_point(|x| key_fn(x) <= high);

    start_idx..end_idx
}

/// TupleRange represents a closed-closed range [a, b].
///
/// Construction guarantees `a <= b`, so an inverted window can never be
/// propagated through the pipeline.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct TupleRange<T: Copy + PartialOrd>(T, T);

#[derive(Error, Debug)]
pub enum TupleRangeError<T: Copy + PartialOrd + std::fmt::Debug> {
    #[error(
        "Expected the first element to be less than or equal to the second, got ({0:?}, {1:?})"
    )]
    ExpectedOrderedRange(T, T),
}

impl<T: Copy + PartialOrd + std::fmt::Debug> TupleRange<T> {
    pub fn try_new(left: T, right: T) -> Result<Self, TupleRangeError<T>> {
        // Also rejects NaN bounds, since every comparison with NaN is false.
        if left <= right {
            Ok(Self(left, right))
        } else {
            Err(TupleRangeError::ExpectedOrderedRange(left, right))
        }
    }

    /// Builds a range from two values in any order.
    pub fn spanning(a: T, b: T) -> Self {
        if a <= b { Self(a, b) } else { Self(b, a) }
    }

    pub fn as_tuple(&self) -> (T, T) {
        (self.0, self.1)
    }

    pub fn contains(&self, x: T) -> bool {
        self.0 <= x && x <= self.1
    }

    pub fn start(&self) -> T {
        self.0
    }

    pub fn end(&self) -> T {
        self.1
    }

    pub fn intersects(&self, other: Self) -> bool {
        !(self.end() < other.start() || other.end() < self.start())
    }

    /// Smallest range covering both `self` and `other`.
    pub fn union(&self, other: Self) -> Self {
        let start = if other.0 < self.0 { other.0 } else { self.0 };
        let end = if other.1 > self.1 { other.1 } else { self.1 };
        Self(start, end)
    }
}

impl TupleRange<f32> {
    pub fn width(&self) -> f32 {
        self.1 - self.0
    }

    pub fn center(&self) -> f32 {
        (self.0 + self.1) / 2.0
    }
}

impl TupleRange<f64> {
    pub fn width(&self) -> f64 {
        self.1 - self.0
    }

    pub fn center(&self) -> f64 {
        (self.0 + self.1) / 2.0
    }
}

impl<T> TryFrom<(T, T)> for TupleRange<T>
where
    T: Copy + PartialOrd + std::fmt::Debug,
{
    type Error = TupleRangeError<T>;

    fn try_from(value: (T, T)) -> Result<Self, Self::Error> {
        TupleRange::try_new(value.0, value.1)
    }
}
