//! Instruction operands: register, immediate, memory reference, label.
//!
//! An operand knows two things: how to read its current value out of a
//! machine state, and how to produce the successor state that reflects a
//! write to its location. Label operands resolve through the program's label
//! table at evaluation time, so a program stays editable line-by-line with
//! forward references.

use core::fmt;

use smallvec::SmallVec;

use crate::errors::SimulationError;
use crate::machine::{FlagDelta, MachineState, RegSlice};
use crate::program::LabelTable;
use crate::value::{self, OpSize};

/// A memory reference: `displacement(base, index, scale)`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MemoryRef {
    pub displacement: i64,
    pub base: RegSlice,
    pub index: Option<RegSlice>,
    pub scale: u8,
}

impl MemoryRef {
    /// Bare `(%reg)` reference, used internally for stack traffic.
    pub(crate) fn indirect(base: RegSlice) -> MemoryRef {
        MemoryRef { displacement: 0, base, index: None, scale: 1 }
    }

    /// base + index * scale + displacement, with wrapping address arithmetic.
    pub fn effective_address(&self, state: &MachineState) -> u64 {
        let base = state.register_bits(self.base.reg);
        let index = self
            .index
            .map(|slice| state.register_bits(slice.reg).wrapping_mul(self.scale as u64))
            .unwrap_or(0);
        base.wrapping_add(index).wrapping_add(self.displacement as u64)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Operand {
    Register(RegSlice),
    Immediate(i64),
    Memory(MemoryRef),
    Label(String),
}

impl Operand {
    /// Read this operand's current value, sign-extended. Memory reads use the
    /// instruction's operand `size`; registers use their own slice width.
    pub fn value_in(
        &self,
        state: &MachineState,
        labels: &LabelTable,
        size: OpSize,
    ) -> Result<i64, SimulationError> {
        match self {
            Operand::Register(slice) => Ok(state.register(*slice)),
            Operand::Immediate(value) => Ok(*value),
            Operand::Memory(mem) => {
                let bits = state.read_stack(mem.effective_address(state), size)?;
                Ok(value::sign_extend(bits, size))
            }
            Operand::Label(name) => labels
                .resolve(name)
                .map(|line| line as i64)
                .ok_or_else(|| SimulationError::UnresolvedLabel(name.clone())),
        }
    }

    /// Produce the successor state for a write of `bits` (already truncated
    /// to `size`) to this operand's location, merging `delta` over the prior
    /// flags.
    ///
    /// The instruction pointer advances by one line unless `advance_rip` is
    /// false; a label destination instead sets the pointer to the written
    /// value (that is how taken jumps and calls transfer control).
    ///
    /// An immediate destination is rejected by the parser, so reaching one
    /// here is a programming defect, not a runtime condition.
    pub fn apply(
        &self,
        state: &MachineState,
        bits: Option<u64>,
        size: OpSize,
        delta: FlagDelta,
        advance_rip: bool,
    ) -> Result<MachineState, SimulationError> {
        match (self, bits) {
            (Operand::Register(slice), Some(bits)) => {
                Ok(state.with_register(*slice, bits, delta, advance_rip))
            }
            (Operand::Memory(mem), Some(bits)) => {
                let addr = mem.effective_address(state);
                Ok(state.with_memory(addr, size, bits, delta, advance_rip))
            }
            (Operand::Label(_), Some(target)) => Ok(state.with_rip(target, delta)),
            (Operand::Immediate(_), Some(_)) => {
                unreachable!("immediate operand as a destination")
            }
            // No value to write: merge flags and advance.
            (_, None) => {
                if advance_rip {
                    Ok(state.advanced(delta))
                } else {
                    Ok(state.with_rip(state.rip(), delta))
                }
            }
        }
    }

    /// Base names of the registers this operand touches.
    pub fn used_registers(&self) -> SmallVec<[&'static str; 2]> {
        let mut used = SmallVec::new();
        match self {
            Operand::Register(slice) => used.push(slice.reg.name()),
            Operand::Memory(mem) => {
                used.push(mem.base.reg.name());
                if let Some(index) = mem.index {
                    used.push(index.reg.name());
                }
            }
            Operand::Immediate(_) | Operand::Label(_) => {}
        }
        used
    }
}

impl fmt::Display for Operand {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Operand::Register(slice) => write!(f, "%{}", slice.name()),
            Operand::Immediate(value) => write!(f, "${}", value),
            Operand::Memory(mem) => {
                if mem.displacement != 0 {
                    write!(f, "{}", mem.displacement)?;
                }
                write!(f, "(%{}", mem.base.name())?;
                if let Some(index) = mem.index {
                    write!(f, ",%{},{}", index.name(), mem.scale)?;
                }
                write!(f, ")")
            }
            Operand::Label(name) => write!(f, "{}", name),
        }
    }
}
