//! Predicate conditions shared by the pruning filters and (eventually) any
//! scan operator that wants to push a predicate down to chunk statistics.

/// The closed set of comparison operators a predicate can use.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PredicateCondition {
    Equals,
    NotEquals,
    LessThan,
    LessThanEquals,
    GreaterThan,
    GreaterThanEquals,
    Between,
    Like,
    NotLike,
    In,
}

/// Maps a comparison op to its argument-swap equivalent, e.g. `a < b` is the
/// same fact as `b > a`. `Like`/`NotLike` have no flip and return `None`.
pub fn flip(op: PredicateCondition) -> Option<PredicateCondition> {
    use PredicateCondition::*;
    match op {
        Equals => Some(Equals),
        NotEquals => Some(NotEquals),
        LessThan => Some(GreaterThan),
        LessThanEquals => Some(GreaterThanEquals),
        GreaterThan => Some(LessThan),
        GreaterThanEquals => Some(LessThanEquals),
        Between => Some(Between),
        In => Some(In),
        Like | NotLike => None,
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn flip_comparisons() {
        assert_eq!(flip(PredicateCondition::LessThan), Some(PredicateCondition::GreaterThan));
        assert_eq!(
            flip(PredicateCondition::GreaterThanEquals),
            Some(PredicateCondition::LessThanEquals)
        );
        assert_eq!(flip(PredicateCondition::Like), None);
    }
}
