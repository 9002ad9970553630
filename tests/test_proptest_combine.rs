//! Property-based tests for the type combination laws.
//!
//! `TypeString::combine` must be idempotent, commutative and absorbed by
//! `_undefined`; `ExpressionResultString::combine` pads to the longer result
//! and is the identity without a second operand.
#![cfg(feature = "proptest")]

use magik::hir::{ExpressionResultString, TypeString};
use proptest::prelude::*;

// ============================================================================
// PROPTEST STRATEGIES
// ============================================================================

/// Strategy for leaf and combined type references.
fn arb_type_string() -> impl Strategy<Value = TypeString> {
    let leaf = prop_oneof![
        Just(TypeString::UNDEFINED),
        Just(TypeString::SELF),
        "[a-z]{1,6}".prop_map(TypeString::parameter),
        ("[a-z]{1,4}", "[a-z][a-z0-9_]{0,8}").prop_map(|(p, n)| TypeString::simple(p, n)),
    ];
    leaf.prop_recursive(2, 8, 3, |inner| {
        prop::collection::vec(inner, 1..4).prop_map(|members| {
            members
                .iter()
                .skip(1)
                .fold(members[0].clone(), |acc, m| TypeString::combine(&acc, m))
        })
    })
}

/// Strategy for short results.
fn arb_result() -> impl Strategy<Value = ExpressionResultString> {
    prop::collection::vec(arb_type_string(), 0..6).prop_map(ExpressionResultString::new)
}

// ============================================================================
// PROPERTIES
// ============================================================================

proptest! {
    #[test]
    fn combine_is_idempotent(a in arb_type_string()) {
        prop_assert_eq!(TypeString::combine(&a, &a), a);
    }

    #[test]
    fn combine_with_undefined_is_undefined(a in arb_type_string()) {
        prop_assert_eq!(TypeString::combine(&a, &TypeString::UNDEFINED), TypeString::UNDEFINED);
    }

    #[test]
    fn combine_is_commutative(a in arb_type_string(), b in arb_type_string()) {
        prop_assert_eq!(TypeString::combine(&a, &b), TypeString::combine(&b, &a));
    }

    #[test]
    fn result_combine_without_second_is_identity(r in arb_result()) {
        prop_assert_eq!(ExpressionResultString::combine(&r, None), r);
    }

    #[test]
    fn result_combine_length_is_max(a in arb_result(), b in arb_result()) {
        let combined = ExpressionResultString::combine(&a, Some(&b));
        prop_assert_eq!(combined.len(), a.len().max(b.len()));
    }

    #[test]
    fn undefined_result_get_within_capacity(i in 0usize..magik::hir::MAX_ITEMS) {
        let undefined = ExpressionResultString::undefined();
        prop_assert!(undefined.get(i, &TypeString::SW_UNSET).is_undefined());
    }

    #[test]
    fn type_string_display_parses_back(a in arb_type_string()) {
        prop_assert_eq!(TypeString::parse(&a.to_string(), "sw"), a);
    }
}
