//! Typed program lines and their evaluation semantics.
//!
//! A program line is a label declaration, a single-operand instruction, or a
//! two-operand instruction. `eval` is the single public contract: a pure
//! function from the incoming machine state (plus the program's label table)
//! to the successor state. Dispatch is an exhaustive match over the operation
//! tag; no behavior is stored as data.

mod binary;
mod condition;
mod unary;

#[cfg(test)]
mod condition_test;


pub use condition::Condition;

use core::fmt;

use smallvec::SmallVec;

use crate::errors::SimulationError;
use crate::machine::MachineState;
use crate::operand::Operand;
use crate::program::LabelTable;
use crate::value::OpSize;

/// Single-operand operation kinds.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UnaryOp {
    Inc,
    Dec,
    Neg,
    Not,
    Push,
    Pop,
    Call,
    Set(Condition),
    Jump(Condition),
}

/// Two-operand operation kinds.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BinaryOp {
    Mov,
    Lea,
    Add,
    Sub,
    Imul,
    Cmp,
    Test,
    And,
    Or,
    Xor,
    Sal,
    Shl,
    Sar,
    Shr,
}

impl BinaryOp {
    pub(crate) fn mnemonic_base(self) -> &'static str {
        match self {
            BinaryOp::Mov => "mov",
            BinaryOp::Lea => "lea",
            BinaryOp::Add => "add",
            BinaryOp::Sub => "sub",
            BinaryOp::Imul => "imul",
            BinaryOp::Cmp => "cmp",
            BinaryOp::Test => "test",
            BinaryOp::And => "and",
            BinaryOp::Or => "or",
            BinaryOp::Xor => "xor",
            BinaryOp::Sal => "sal",
            BinaryOp::Shl => "shl",
            BinaryOp::Sar => "sar",
            BinaryOp::Shr => "shr",
        }
    }
}

/// What a line is, independent of its position in the program.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LineKind {
    /// A label declaration: a pure jump target. Executing one just moves to
    /// the next line.
    Label(String),
    Unary { op: UnaryOp, size: OpSize, operand: Operand },
    Binary { op: BinaryOp, size: OpSize, src: Operand, dst: Operand },
}

/// One line of a program: its kind, its (dense) line number, and a breakpoint
/// marker. The marker is display/control state only; it never affects
/// evaluation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProgramLine {
    number: u64,
    breakpoint: bool,
    kind: LineKind,
}

impl ProgramLine {
    pub(crate) fn new(number: u64, kind: LineKind) -> Self {
        ProgramLine { number, breakpoint: false, kind }
    }

    pub fn number(&self) -> u64 {
        self.number
    }

    pub(crate) fn set_number(&mut self, number: u64) {
        self.number = number;
    }

    pub fn kind(&self) -> &LineKind {
        &self.kind
    }

    pub fn breakpoint(&self) -> bool {
        self.breakpoint
    }

    pub(crate) fn toggle_breakpoint(&mut self) {
        self.breakpoint = !self.breakpoint;
    }

    pub(crate) fn set_breakpoint(&mut self, breakpoint: bool) {
        self.breakpoint = breakpoint;
    }

    /// Evaluate this line against `state`, producing the successor state.
    pub fn eval(
        &self,
        state: &MachineState,
        labels: &LabelTable,
    ) -> Result<MachineState, SimulationError> {
        match &self.kind {
            LineKind::Label(_) => Ok(state.advanced(Default::default())),
            LineKind::Unary { op, size, operand } => {
                unary::eval(*op, *size, operand, state, labels)
            }
            LineKind::Binary { op, size, src, dst } => {
                binary::eval(*op, *size, src, dst, state, labels)
            }
        }
    }

    /// Base names of the registers this line's operands touch.
    pub fn used_registers(&self) -> SmallVec<[&'static str; 4]> {
        let mut used = SmallVec::new();
        match &self.kind {
            LineKind::Label(_) => {}
            LineKind::Unary { operand, .. } => used.extend(operand.used_registers()),
            LineKind::Binary { src, dst, .. } => {
                used.extend(src.used_registers());
                used.extend(dst.used_registers());
            }
        }
        used
    }
}

/// Renders canonical source syntax; re-parsing the output reconstructs an
/// equal line.
impl fmt::Display for ProgramLine {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.kind {
            LineKind::Label(name) => write!(f, "{}:", name),
            LineKind::Unary { op, size, operand } => {
                match op {
                    UnaryOp::Inc => write!(f, "inc{}", size.suffix())?,
                    UnaryOp::Dec => write!(f, "dec{}", size.suffix())?,
                    UnaryOp::Neg => write!(f, "neg{}", size.suffix())?,
                    UnaryOp::Not => write!(f, "not{}", size.suffix())?,
                    UnaryOp::Push => write!(f, "push{}", size.suffix())?,
                    UnaryOp::Pop => write!(f, "pop{}", size.suffix())?,
                    UnaryOp::Call => write!(f, "call")?,
                    UnaryOp::Set(cond) => write!(f, "set{}", cond.suffix())?,
                    UnaryOp::Jump(cond) => write!(f, "j{}", cond.suffix())?,
                }
                write!(f, " {}", operand)
            }
            LineKind::Binary { op, size, src, dst } => {
                write!(f, "{}{} {}, {}", op.mnemonic_base(), size.suffix(), src, dst)
            }
        }
    }
}
