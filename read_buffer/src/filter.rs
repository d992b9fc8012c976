//! Chunk-level pruning statistics: range filters and their degenerate
//! min/max form.
//!
//! A filter answers two questions about a chunk without scanning it:
//! "could this predicate possibly match any row?" (`estimate_cardinality`)
//! and "what does this filter look like once we know a predicate holds?"
//! (`slice_with_predicate`). Both are advisory: a `MatchesApproximately`
//! verdict never promises a match, only that one hasn't been ruled out.

use std::cmp::Ordering;

use crate::predicate::PredicateCondition;
#[cfg(test)]
use crate::Error;
use crate::{EmptyInputSnafu, Result};

/// A type a [`RangeFilter`]/[`MinMaxFilter`] can be built over: one of the
/// engine's numeric column types.
pub trait FilterValue: Copy + std::fmt::Debug + Send + Sync + PartialEq + 'static {
    /// A total order over `Self`, including for floats (no `NaN` is ever
    /// stored in a column fed to these filters).
    fn cmp_total(&self, other: &Self) -> Ordering;

    /// Length of the gap between `self` and a strictly larger `next`,
    /// as an `f64` purely for gap-ranking purposes.
    fn gap_to(self, next: Self) -> f64;

    /// The representable value immediately below `self` (`v - 1` for
    /// integers, `next_down` for floats).
    fn predecessor(self) -> Self;

    /// The representable value immediately above `self`.
    fn successor(self) -> Self;
}

macro_rules! impl_filter_value_int {
    ($t:ty) => {
        impl FilterValue for $t {
            fn cmp_total(&self, other: &Self) -> Ordering {
                self.cmp(other)
            }

            fn gap_to(self, next: Self) -> f64 {
                (next as f64) - (self as f64)
            }

            fn predecessor(self) -> Self {
                self - 1
            }

            fn successor(self) -> Self {
                self + 1
            }
        }
    };
}

macro_rules! impl_filter_value_float {
    ($t:ty) => {
        impl FilterValue for $t {
            fn cmp_total(&self, other: &Self) -> Ordering {
                <$t>::total_cmp(self, other)
            }

            fn gap_to(self, next: Self) -> f64 {
                (next as f64) - (self as f64)
            }

            fn predecessor(self) -> Self {
                self.next_down()
            }

            fn successor(self) -> Self {
                self.next_up()
            }
        }
    };
}

impl_filter_value_int!(i32);
impl_filter_value_int!(i64);
impl_filter_value_float!(f32);
impl_filter_value_float!(f64);

/// The verdict a filter returns for a predicate: either the predicate is
/// guaranteed to match nothing in the domain the filter describes, or it
/// might match something and a scan is required.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Estimate {
    MatchesNone,
    MatchesApproximately,
}

impl Estimate {
    pub fn is_none(self) -> bool {
        self == Estimate::MatchesNone
    }
}

/// A statistics object produced by slicing a filter under a predicate.
/// Consumers that don't recognise a variant simply treat it as "cannot
/// prune".
#[derive(Debug, Clone, PartialEq)]
pub enum StatisticsObject<T> {
    Range(RangeFilter<T>),
    MinMax(MinMaxFilter<T>),
    Empty,
}

impl<T: FilterValue> StatisticsObject<T> {
    pub fn is_empty(&self) -> bool {
        matches!(self, StatisticsObject::Empty)
    }
}

/// A finite, non-empty, sorted sequence of closed, strictly disjoint
/// ranges describing a value domain. See `SPEC_FULL.md` §5.1.
#[derive(Debug, Clone, PartialEq)]
pub struct RangeFilter<T> {
    ranges: Vec<(T, T)>,
}

impl<T: FilterValue> RangeFilter<T> {
    /// Builds a range filter from an unsorted, possibly-duplicated value
    /// sequence, keeping at most `max_ranges` ranges by merging across the
    /// smallest gaps first.
    #[tracing::instrument(level = "debug", skip(values))]
    pub fn build(values: &[T], max_ranges: usize) -> Result<Self> {
        if values.is_empty() {
            return EmptyInputSnafu.fail();
        }
        assert!(max_ranges >= 1, "max_ranges must be at least 1");

        let mut sorted = values.to_vec();
        sorted.sort_by(|a, b| a.cmp_total(b));
        sorted.dedup_by(|a, b| a.cmp_total(b) == Ordering::Equal);
        tracing::debug!(distinct_values = sorted.len(), max_ranges, "building range filter");

        if sorted.len() == 1 || max_ranges == 1 {
            let lo = sorted[0];
            let hi = *sorted.last().unwrap();
            return Ok(Self { ranges: vec![(lo, hi)] });
        }

        let n_gaps = sorted.len() - 1;
        let mut gaps: Vec<(usize, f64)> = (0..n_gaps)
            .map(|i| (i, sorted[i].gap_to(sorted[i + 1])))
            .collect();
        // Largest gap first; a stable sort keeps ties in ascending-index
        // order, which is "prefer earlier indices" per spec.
        gaps.sort_by(|a, b| b.1.partial_cmp(&a.1).unwrap());

        let take = (max_ranges - 1).min(n_gaps);
        let mut adopted: Vec<usize> = gaps.into_iter().take(take).map(|(i, _)| i).collect();
        adopted.sort_unstable();

        let mut ranges = Vec::with_capacity(adopted.len() + 1);
        let mut start = 0;
        for &gap_idx in &adopted {
            ranges.push((sorted[start], sorted[gap_idx]));
            start = gap_idx + 1;
        }
        ranges.push((sorted[start], *sorted.last().unwrap()));

        let filter = Self { ranges };
        filter.debug_check_invariants();
        Ok(filter)
    }

    pub fn min(&self) -> T {
        self.ranges[0].0
    }

    pub fn max(&self) -> T {
        self.ranges[self.ranges.len() - 1].1
    }

    pub fn ranges(&self) -> &[(T, T)] {
        &self.ranges
    }

    pub fn estimate_cardinality(&self, op: PredicateCondition, v1: T, v2: Option<T>) -> Estimate {
        estimate_ranges(&self.ranges, op, v1, v2)
    }

    pub fn slice_with_predicate(&self, op: PredicateCondition, v1: T, v2: Option<T>) -> StatisticsObject<T> {
        use PredicateCondition::*;
        match op {
            Equals => {
                if estimate_ranges(&self.ranges, Equals, v1, None).is_none() {
                    StatisticsObject::Empty
                } else {
                    StatisticsObject::MinMax(MinMaxFilter::new(v1, v1))
                }
            }
            NotEquals => StatisticsObject::Range(self.clone()),
            LessThan | LessThanEquals | GreaterThan | GreaterThanEquals => {
                match slice_directional(&self.ranges, op, v1) {
                    Some(ranges) => StatisticsObject::Range(Self { ranges }),
                    None => StatisticsObject::Empty,
                }
            }
            Between => {
                let hi = v2.expect("Between requires an upper bound");
                if hi.cmp_total(&v1) == Ordering::Less {
                    return StatisticsObject::Empty;
                }
                let after_upper = match slice_directional(&self.ranges, LessThanEquals, hi) {
                    Some(ranges) => ranges,
                    None => return StatisticsObject::Empty,
                };
                match slice_directional(&after_upper, GreaterThanEquals, v1) {
                    Some(ranges) => StatisticsObject::Range(Self { ranges }),
                    None => StatisticsObject::Empty,
                }
            }
            Like | NotLike | In => StatisticsObject::Range(self.clone()),
        }
    }

    fn debug_check_invariants(&self) {
        debug_assert!(!self.ranges.is_empty());
        for &(lo, hi) in &self.ranges {
            debug_assert_ne!(lo.cmp_total(&hi), Ordering::Greater);
        }
        for w in self.ranges.windows(2) {
            debug_assert_eq!(w[0].1.cmp_total(&w[1].0), Ordering::Less);
        }
    }
}

/// A single `(min, max)` pair: a degenerate range filter. Slicing a
/// min/max filter with a tightening predicate can only shrink it to
/// `Empty` or another min/max filter — it never grows gaps.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct MinMaxFilter<T> {
    min: T,
    max: T,
}

impl<T: FilterValue> MinMaxFilter<T> {
    pub fn new(min: T, max: T) -> Self {
        assert_ne!(min.cmp_total(&max), Ordering::Greater, "min must be <= max");
        Self { min, max }
    }

    pub fn min(&self) -> T {
        self.min
    }

    pub fn max(&self) -> T {
        self.max
    }

    pub fn estimate_cardinality(&self, op: PredicateCondition, v1: T, v2: Option<T>) -> Estimate {
        estimate_ranges(&[(self.min, self.max)], op, v1, v2)
    }

    pub fn slice_with_predicate(&self, op: PredicateCondition, v1: T, v2: Option<T>) -> StatisticsObject<T> {
        use PredicateCondition::*;
        let ranges = [(self.min, self.max)];
        match op {
            Equals => {
                if estimate_ranges(&ranges, Equals, v1, None).is_none() {
                    StatisticsObject::Empty
                } else {
                    StatisticsObject::MinMax(MinMaxFilter::new(v1, v1))
                }
            }
            NotEquals => StatisticsObject::MinMax(*self),
            LessThan | LessThanEquals | GreaterThan | GreaterThanEquals => {
                match slice_directional(&ranges, op, v1) {
                    Some(r) => {
                        let (lo, hi) = r[0];
                        StatisticsObject::MinMax(MinMaxFilter::new(lo, hi))
                    }
                    None => StatisticsObject::Empty,
                }
            }
            Between => {
                let hi = v2.expect("Between requires an upper bound");
                if hi.cmp_total(&v1) == Ordering::Less {
                    return StatisticsObject::Empty;
                }
                let after_upper = match slice_directional(&ranges, LessThanEquals, hi) {
                    Some(r) => r,
                    None => return StatisticsObject::Empty,
                };
                match slice_directional(&after_upper, GreaterThanEquals, v1) {
                    Some(r) => {
                        let (lo, hi) = r[0];
                        StatisticsObject::MinMax(MinMaxFilter::new(lo, hi))
                    }
                    None => StatisticsObject::Empty,
                }
            }
            Like | NotLike | In => StatisticsObject::MinMax(*self),
        }
    }
}

fn value_in_gap<T: FilterValue>(ranges: &[(T, T)], v: T) -> bool {
    ranges.windows(2).any(|w| {
        let (_, hi) = w[0];
        let (lo_next, _) = w[1];
        hi.cmp_total(&v) == Ordering::Less && v.cmp_total(&lo_next) == Ordering::Less
    })
}

fn interval_in_single_gap<T: FilterValue>(ranges: &[(T, T)], lo: T, hi: T) -> bool {
    ranges.windows(2).any(|w| {
        let (_, hi_i) = w[0];
        let (lo_next, _) = w[1];
        hi_i.cmp_total(&lo) == Ordering::Less && hi.cmp_total(&lo_next) == Ordering::Less
    })
}

fn estimate_ranges<T: FilterValue>(ranges: &[(T, T)], op: PredicateCondition, v1: T, v2: Option<T>) -> Estimate {
    use PredicateCondition::*;
    let min = ranges[0].0;
    let max = ranges[ranges.len() - 1].1;

    let none = match op {
        Equals => v1.cmp_total(&min) == Ordering::Less || v1.cmp_total(&max) == Ordering::Greater || value_in_gap(ranges, v1),
        NotEquals => false,
        LessThan => v1.cmp_total(&min) != Ordering::Greater,
        LessThanEquals => v1.cmp_total(&min) == Ordering::Less,
        GreaterThan => v1.cmp_total(&max) != Ordering::Less,
        GreaterThanEquals => v1.cmp_total(&max) == Ordering::Greater,
        Between => {
            let hi = v2.expect("Between requires an upper bound");
            hi.cmp_total(&v1) == Ordering::Less
                || hi.cmp_total(&min) == Ordering::Less
                || v1.cmp_total(&max) == Ordering::Greater
                || interval_in_single_gap(ranges, v1, hi)
        }
        Like | NotLike | In => false,
    };

    if none {
        Estimate::MatchesNone
    } else {
        Estimate::MatchesApproximately
    }
}

/// Shared implementation for slicing with `LessThan`/`LessThanEquals`/
/// `GreaterThan`/`GreaterThanEquals`. Returns `None` for an empty result.
fn slice_directional<T: FilterValue>(ranges: &[(T, T)], op: PredicateCondition, v: T) -> Option<Vec<(T, T)>> {
    use PredicateCondition::*;

    if estimate_ranges(ranges, op, v, None).is_none() {
        return None;
    }

    match op {
        LessThan | LessThanEquals => {
            let bound = if op == LessThan { v.predecessor() } else { v };
            let mut kept: Vec<(T, T)> = ranges
                .iter()
                .copied()
                .take_while(|&(lo, _)| lo.cmp_total(&bound) != Ordering::Greater)
                .collect();
            if let Some(last) = kept.last_mut() {
                if last.1.cmp_total(&bound) == Ordering::Greater {
                    last.1 = bound;
                }
            }
            if kept.is_empty() { None } else { Some(kept) }
        }
        GreaterThan | GreaterThanEquals => {
            let bound = if op == GreaterThan { v.successor() } else { v };
            let mut kept: Vec<(T, T)> = ranges
                .iter()
                .copied()
                .rev()
                .take_while(|&(_, hi)| hi.cmp_total(&bound) != Ordering::Less)
                .collect();
            kept.reverse();
            if let Some(first) = kept.first_mut() {
                if first.0.cmp_total(&bound) == Ordering::Less {
                    first.0 = bound;
                }
            }
            if kept.is_empty() { None } else { Some(kept) }
        }
        _ => unreachable!("slice_directional only handles the four comparison ops"),
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::predicate::PredicateCondition::*;

    const VALUES: [i64; 13] = [-1000, 2, 3, 4, 7, 8, 10, 17, 100, 101, 102, 103, 123456];

    #[test]
    fn build_empty_fails() {
        let empty: [i64; 0] = [];
        assert!(matches!(RangeFilter::build(&empty, 3), Err(Error::EmptyInput)));
    }

    #[test]
    fn s1_single_range() {
        let filter = RangeFilter::build(&VALUES, 1).unwrap();
        assert_eq!(filter.ranges(), &[(-1000, 123456)]);
        assert_eq!(filter.estimate_cardinality(LessThan, -1000, None), Estimate::MatchesNone);
        assert_eq!(filter.estimate_cardinality(GreaterThan, 123456, None), Estimate::MatchesNone);
        assert_eq!(filter.estimate_cardinality(Equals, 50000, None), Estimate::MatchesApproximately);
    }

    #[test]
    fn s2_pruning_in_a_gap() {
        // max_ranges=3 adopts the two largest gaps: 123353 (last gap) and
        // 1002 (first gap), giving three ranges.
        let filter = RangeFilter::build(&VALUES, 3).unwrap();
        assert_eq!(filter.ranges(), &[(-1000, -1000), (2, 103), (123456, 123456)]);
        assert_eq!(filter.estimate_cardinality(Equals, 17, None), Estimate::MatchesApproximately);
        assert_eq!(filter.estimate_cardinality(Equals, 123000, None), Estimate::MatchesNone);
    }

    #[test]
    fn s3_between_slicing() {
        let ranges = vec![(5, 10), (20, 25), (35, 100)];
        let filter = RangeFilter { ranges };
        let sliced = filter.slice_with_predicate(Between, 17, Some(27));
        match sliced {
            StatisticsObject::Range(r) => assert_eq!(r.ranges(), &[(20, 25)]),
            other => panic!("expected a range filter, got {:?}", other),
        }

        let sliced = filter.slice_with_predicate(Between, 17, Some(27));
        if let StatisticsObject::Range(r) = sliced {
            assert_eq!(r.estimate_cardinality(Equals, 22, None), Estimate::MatchesApproximately);
            assert_eq!(r.estimate_cardinality(Equals, 30, None), Estimate::MatchesNone);
        }
    }

    #[test]
    fn invariant_never_false_negative_for_contained_values() {
        let filter = RangeFilter::build(&VALUES, 3).unwrap();
        for &v in &VALUES {
            assert_ne!(filter.estimate_cardinality(Equals, v, None), Estimate::MatchesNone);
        }
    }

    #[test]
    fn invariant_out_of_bounds_always_pruned() {
        let filter = RangeFilter::build(&VALUES, 3).unwrap();
        assert_eq!(filter.estimate_cardinality(Equals, filter.min() - 1, None), Estimate::MatchesNone);
        assert_eq!(filter.estimate_cardinality(Equals, filter.max() + 1, None), Estimate::MatchesNone);
    }

    #[test]
    fn slice_at_boundaries() {
        let filter = RangeFilter::build(&VALUES, 3).unwrap();
        assert!(filter.slice_with_predicate(LessThan, filter.min(), None).is_empty());
        assert!(!filter.slice_with_predicate(LessThanEquals, filter.min(), None).is_empty());
        assert!(filter.slice_with_predicate(GreaterThan, filter.max(), None).is_empty());
        assert!(!filter.slice_with_predicate(GreaterThanEquals, filter.max(), None).is_empty());
    }

    #[test]
    fn between_with_inverted_bounds_is_empty() {
        let filter = RangeFilter::build(&VALUES, 3).unwrap();
        assert!(filter.slice_with_predicate(Between, 10, Some(5)).is_empty());
    }

    #[test]
    fn min_max_filter_degenerate_contract() {
        let filter = MinMaxFilter::new(10_i64, 20);
        assert_eq!(filter.estimate_cardinality(Equals, 15, None), Estimate::MatchesApproximately);
        assert_eq!(filter.estimate_cardinality(Equals, 25, None), Estimate::MatchesNone);
        match filter.slice_with_predicate(LessThanEquals, 15, None) {
            StatisticsObject::MinMax(f) => assert_eq!((f.min(), f.max()), (10, 15)),
            other => panic!("expected min/max filter, got {:?}", other),
        }
    }

    #[test]
    fn float_predecessor_is_strictly_smaller() {
        let v = 1.0_f64;
        assert!(v.predecessor() < v);
        assert!(v.successor() > v);
    }

    #[test]
    fn invariants_hold_over_random_value_sets() {
        use rand::rngs::StdRng;
        use rand::{Rng, SeedableRng};

        let mut rng = StdRng::seed_from_u64(0xF11_7E12);
        for _ in 0..200 {
            let n = rng.gen_range(1..50);
            let values: Vec<i64> = (0..n).map(|_| rng.gen_range(-500..500)).collect();
            let max_ranges = rng.gen_range(1..10);
            let filter = RangeFilter::build(&values, max_ranges).unwrap();

            assert!(filter.ranges().len() <= max_ranges);
            assert_eq!(filter.min(), filter.ranges().first().unwrap().0);
            assert_eq!(filter.max(), filter.ranges().last().unwrap().1);
            for window in filter.ranges().windows(2) {
                assert!(window[0].1 < window[1].0, "ranges must stay strictly disjoint");
            }
            for &v in &values {
                assert_ne!(
                    filter.estimate_cardinality(Equals, v, None),
                    Estimate::MatchesNone,
                    "originally-contained value must never be pruned"
                );
            }
            assert_eq!(filter.estimate_cardinality(Equals, filter.min() - 1, None), Estimate::MatchesNone);
            assert_eq!(filter.estimate_cardinality(Equals, filter.max() + 1, None), Estimate::MatchesNone);
        }
    }
}
