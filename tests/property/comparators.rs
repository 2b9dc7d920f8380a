//! Property-based tests for predicate evaluation

use pgas_comms::wait::{test, Comparator};
use proptest::prelude::*;
use std::sync::atomic::{AtomicI16, AtomicI32, AtomicI64};

proptest! {
    /// `test` agrees with the plain comparison at every width.
    #[test]
    fn test_predicate_matches_integer_comparison(a in any::<i16>(), b in any::<i16>()) {
        for comparator in Comparator::ALL {
            let expected = match comparator {
                Comparator::Eq => a == b,
                Comparator::Ne => a != b,
                Comparator::Gt => a > b,
                Comparator::Lt => a < b,
                Comparator::Ge => a >= b,
                Comparator::Le => a <= b,
            };
            prop_assert_eq!(test(&AtomicI16::new(a), comparator, b), expected);
            prop_assert_eq!(test(&AtomicI32::new(i32::from(a)), comparator, i32::from(b)), expected);
            prop_assert_eq!(test(&AtomicI64::new(i64::from(a)), comparator, i64::from(b)), expected);
        }
    }

    /// `ne` is the negation of `eq`, `ge` of `lt`, `le` of `gt`.
    #[test]
    fn test_complementary_comparators(a in any::<i64>(), b in any::<i64>()) {
        prop_assert_eq!(Comparator::Ne.compare(a, b), !Comparator::Eq.compare(a, b));
        prop_assert_eq!(Comparator::Ge.compare(a, b), !Comparator::Lt.compare(a, b));
        prop_assert_eq!(Comparator::Le.compare(a, b), !Comparator::Gt.compare(a, b));
    }
}
