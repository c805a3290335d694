//! Per-predicate coverage of the condition table.
//!
//! Wrong predicate logic is a silent correctness bug rather than a crash, so
//! every predicate is pinned against the full signed-comparison flag algebra.

use super::Condition;
use crate::machine::Flags;

fn flags(sign: bool, zero: bool, overflow: bool) -> Flags {
    Flags { sign, zero, overflow, carry: false }
}

#[test]
fn always_holds_regardless_of_flags() {
    for sign in [false, true] {
        for zero in [false, true] {
            for overflow in [false, true] {
                assert!(Condition::Always.holds(flags(sign, zero, overflow)));
            }
        }
    }
}

#[test]
fn equal_tracks_zero_flag() {
    assert!(Condition::Equal.holds(flags(false, true, false)));
    assert!(!Condition::Equal.holds(flags(false, false, false)));
    assert!(!Condition::NotEqual.holds(flags(false, true, false)));
    assert!(Condition::NotEqual.holds(flags(false, false, false)));
}

#[test]
fn sign_tracks_sign_flag() {
    assert!(Condition::Sign.holds(flags(true, false, false)));
    assert!(!Condition::Sign.holds(flags(false, false, false)));
    assert!(Condition::NotSign.holds(flags(false, false, false)));
    assert!(!Condition::NotSign.holds(flags(true, false, false)));
}

#[test]
fn greater_requires_nonzero_and_sign_equals_overflow() {
    assert!(Condition::Greater.holds(flags(false, false, false)));
    assert!(Condition::Greater.holds(flags(true, false, true)));
    assert!(!Condition::Greater.holds(flags(false, true, false))); // equal
    assert!(!Condition::Greater.holds(flags(true, false, false))); // less
}

#[test]
fn greater_equal_is_sign_equals_overflow() {
    assert!(Condition::GreaterEqual.holds(flags(false, false, false)));
    assert!(Condition::GreaterEqual.holds(flags(true, true, true)));
    assert!(!Condition::GreaterEqual.holds(flags(true, false, false)));
    assert!(!Condition::GreaterEqual.holds(flags(false, false, true)));
}

#[test]
fn less_is_sign_differs_from_overflow() {
    assert!(Condition::Less.holds(flags(true, false, false)));
    assert!(Condition::Less.holds(flags(false, false, true)));
    assert!(!Condition::Less.holds(flags(false, false, false)));
    assert!(!Condition::Less.holds(flags(true, false, true)));
}

#[test]
fn less_equal_is_zero_or_sign_differs_from_overflow() {
    assert!(Condition::LessEqual.holds(flags(false, true, false)));
    assert!(Condition::LessEqual.holds(flags(true, false, false)));
    assert!(!Condition::LessEqual.holds(flags(false, false, false)));
    assert!(!Condition::LessEqual.holds(flags(true, false, true)));
}

#[test]
fn suffix_lookup_covers_aliases() {
    assert_eq!(Condition::from_suffix("e"), Some(Condition::Equal));
    assert_eq!(Condition::from_suffix("z"), Some(Condition::Equal));
    assert_eq!(Condition::from_suffix("ne"), Some(Condition::NotEqual));
    assert_eq!(Condition::from_suffix("nz"), Some(Condition::NotEqual));
    assert_eq!(Condition::from_suffix("s"), Some(Condition::Sign));
    assert_eq!(Condition::from_suffix("ns"), Some(Condition::NotSign));
    assert_eq!(Condition::from_suffix("g"), Some(Condition::Greater));
    assert_eq!(Condition::from_suffix("ge"), Some(Condition::GreaterEqual));
    assert_eq!(Condition::from_suffix("l"), Some(Condition::Less));
    assert_eq!(Condition::from_suffix("le"), Some(Condition::LessEqual));
    assert_eq!(Condition::from_suffix("x"), None);
}
