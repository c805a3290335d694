//! Condition predicates for `set` and conditional-jump instructions.

use crate::machine::Flags;

/// A condition predicate over the status flags, chosen at parse time from the
/// mnemonic suffix and evaluated against the *incoming* flag state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Condition {
    /// Unconditional (`jmp`).
    Always,
    Equal,
    NotEqual,
    Sign,
    NotSign,
    Greater,
    GreaterEqual,
    Less,
    LessEqual,
}

impl Condition {
    /// Map a mnemonic suffix to its predicate. `z`/`nz` are the conventional
    /// aliases for `e`/`ne`.
    pub fn from_suffix(suffix: &str) -> Option<Condition> {
        match suffix {
            "e" | "z" => Some(Condition::Equal),
            "ne" | "nz" => Some(Condition::NotEqual),
            "s" => Some(Condition::Sign),
            "ns" => Some(Condition::NotSign),
            "g" => Some(Condition::Greater),
            "ge" => Some(Condition::GreaterEqual),
            "l" => Some(Condition::Less),
            "le" => Some(Condition::LessEqual),
            _ => None,
        }
    }

    /// Canonical suffix, used when rendering a line back to source text.
    pub fn suffix(self) -> &'static str {
        match self {
            Condition::Always => "mp",
            Condition::Equal => "e",
            Condition::NotEqual => "ne",
            Condition::Sign => "s",
            Condition::NotSign => "ns",
            Condition::Greater => "g",
            Condition::GreaterEqual => "ge",
            Condition::Less => "l",
            Condition::LessEqual => "le",
        }
    }

    /// Standard signed-comparison flag algebra.
    pub fn holds(self, flags: Flags) -> bool {
        match self {
            Condition::Always => true,
            Condition::Equal => flags.zero,
            Condition::NotEqual => !flags.zero,
            Condition::Sign => flags.sign,
            Condition::NotSign => !flags.sign,
            Condition::Greater => !flags.zero && flags.sign == flags.overflow,
            Condition::GreaterEqual => flags.sign == flags.overflow,
            Condition::Less => flags.sign != flags.overflow,
            Condition::LessEqual => flags.zero || flags.sign != flags.overflow,
        }
    }
}
