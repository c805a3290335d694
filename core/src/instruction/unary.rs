//! Transition functions for single-operand instructions.

use crate::errors::SimulationError;
use crate::machine::{FlagDelta, MachineState, Reg, RegSlice};
use crate::operand::{MemoryRef, Operand};
use crate::program::LabelTable;
use crate::value::{self, OpSize};

use super::UnaryOp;

pub(super) fn eval(
    op: UnaryOp,
    size: OpSize,
    operand: &Operand,
    state: &MachineState,
    labels: &LabelTable,
) -> Result<MachineState, SimulationError> {
    match op {
        UnaryOp::Inc => step_by(1, size, operand, state, labels),
        UnaryOp::Dec => step_by(-1, size, operand, state, labels),
        UnaryOp::Neg => neg(size, operand, state, labels),
        UnaryOp::Not => not(size, operand, state, labels),
        UnaryOp::Push => push(size, operand, state, labels),
        UnaryOp::Pop => pop(size, operand, state, labels),
        UnaryOp::Call => call(size, operand, state, labels),
        UnaryOp::Set(cond) => set(cond, size, operand, state),
        UnaryOp::Jump(cond) => jump(cond, size, operand, state, labels),
    }
}

/// `inc` / `dec`: the carry flag is explicitly unaffected.
fn step_by(
    amount: i128,
    size: OpSize,
    dest: &Operand,
    state: &MachineState,
    labels: &LabelTable,
) -> Result<MachineState, SimulationError> {
    let result = dest.value_in(state, labels, size)? as i128 + amount;
    let mut delta = FlagDelta::NONE;
    delta.overflow = Some(value::overflows(result, size));
    let bits = value::truncate(result, size);
    delta.set_sign_zero(bits, size);
    dest.apply(state, Some(bits), size, delta, true)
}

fn neg(
    size: OpSize,
    dest: &Operand,
    state: &MachineState,
    labels: &LabelTable,
) -> Result<MachineState, SimulationError> {
    let orig = dest.value_in(state, labels, size)?;
    let result = -(orig as i128);
    let mut delta = FlagDelta::NONE;
    delta.overflow = Some(value::overflows(result, size));
    let bits = value::truncate(result, size);
    delta.set_sign_zero(bits, size);
    delta.carry = Some(orig != 0);
    dest.apply(state, Some(bits), size, delta, true)
}

fn not(
    size: OpSize,
    dest: &Operand,
    state: &MachineState,
    labels: &LabelTable,
) -> Result<MachineState, SimulationError> {
    let result = !(dest.value_in(state, labels, size)? as i128);
    dest.apply(state, Some(value::truncate(result, size)), size, FlagDelta::NONE, true)
}

/// `push`: decrement the stack pointer by 8, then store the source at the new
/// top. The source is re-read after the decrement, so `push %rsp` stores the
/// decremented pointer.
fn push(
    size: OpSize,
    src: &Operand,
    state: &MachineState,
    labels: &LabelTable,
) -> Result<MachineState, SimulationError> {
    let rsp = Operand::Register(RegSlice::RSP);
    let new_top = state.register_bits(Reg::Rsp).wrapping_sub(8);
    let lowered = rsp.apply(state, Some(new_top), OpSize::Quad, FlagDelta::NONE, false)?;

    let slot = Operand::Memory(MemoryRef::indirect(RegSlice::RSP));
    let bits = value::truncate(src.value_in(&lowered, labels, size)? as i128, size);
    slot.apply(&lowered, Some(bits), size, FlagDelta::NONE, true)
}

/// `pop`: load the stack top into the destination, then increment the stack
/// pointer by 8.
fn pop(
    size: OpSize,
    dest: &Operand,
    state: &MachineState,
    labels: &LabelTable,
) -> Result<MachineState, SimulationError> {
    let slot = Operand::Memory(MemoryRef::indirect(RegSlice::RSP));
    let bits = value::truncate(slot.value_in(state, labels, size)? as i128, size);
    let loaded = dest.apply(state, Some(bits), size, FlagDelta::NONE, true)?;

    let rsp = Operand::Register(RegSlice::RSP);
    let raised = loaded.register_bits(Reg::Rsp).wrapping_add(8);
    rsp.apply(&loaded, Some(raised), OpSize::Quad, FlagDelta::NONE, false)
}

/// `call`: push the return address (the line after this one), then transfer
/// control to the target label.
fn call(
    size: OpSize,
    dest: &Operand,
    state: &MachineState,
    labels: &LabelTable,
) -> Result<MachineState, SimulationError> {
    let rsp = Operand::Register(RegSlice::RSP);
    let new_top = state.register_bits(Reg::Rsp).wrapping_sub(8);
    let lowered = rsp.apply(state, Some(new_top), OpSize::Quad, FlagDelta::NONE, false)?;

    let return_line = lowered.rip() + 1;
    let slot = Operand::Memory(MemoryRef::indirect(RegSlice::RSP));
    let pushed = slot.apply(&lowered, Some(return_line), size, FlagDelta::NONE, false)?;

    let target = dest.value_in(state, labels, size)? as u64;
    dest.apply(&pushed, Some(target), size, FlagDelta::NONE, false)
}

/// `setcc`: write 1 or 0 depending on the incoming flags. Flags themselves
/// are untouched.
fn set(
    cond: super::Condition,
    size: OpSize,
    dest: &Operand,
    state: &MachineState,
) -> Result<MachineState, SimulationError> {
    let bits = if cond.holds(state.flags()) { 1 } else { 0 };
    dest.apply(state, Some(bits), size, FlagDelta::NONE, true)
}

/// `jmp` / `jcc`: a taken jump sets the instruction pointer to the target
/// line; an untaken one falls through to the next line.
fn jump(
    cond: super::Condition,
    size: OpSize,
    dest: &Operand,
    state: &MachineState,
    labels: &LabelTable,
) -> Result<MachineState, SimulationError> {
    if cond.holds(state.flags()) {
        let target = dest.value_in(state, labels, size)? as u64;
        dest.apply(state, Some(target), size, FlagDelta::NONE, false)
    } else {
        dest.apply(state, None, size, FlagDelta::NONE, true)
    }
}
