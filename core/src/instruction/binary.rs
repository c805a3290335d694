//! Transition functions for two-operand instructions.
//!
//! AT&T operand order throughout: the first operand is the source, the
//! second the destination (`addq %rbx, %rax` adds rbx into rax).

use crate::errors::SimulationError;
use crate::machine::{FlagDelta, MachineState};
use crate::operand::Operand;
use crate::program::LabelTable;
use crate::value::{self, OpSize};

use super::BinaryOp;

pub(super) fn eval(
    op: BinaryOp,
    size: OpSize,
    src: &Operand,
    dst: &Operand,
    state: &MachineState,
    labels: &LabelTable,
) -> Result<MachineState, SimulationError> {
    match op {
        BinaryOp::Mov => {
            let bits = value::truncate(src.value_in(state, labels, size)? as i128, size);
            dst.apply(state, Some(bits), size, FlagDelta::NONE, true)
        }
        BinaryOp::Lea => {
            let Operand::Memory(mem) = src else {
                unreachable!("lea source is always a memory reference")
            };
            let bits = value::truncate(mem.effective_address(state) as i128, size);
            dst.apply(state, Some(bits), size, FlagDelta::NONE, true)
        }
        BinaryOp::Add | BinaryOp::Sub | BinaryOp::Cmp | BinaryOp::Imul => {
            arithmetic(op, size, src, dst, state, labels)
        }
        BinaryOp::And | BinaryOp::Or | BinaryOp::Xor | BinaryOp::Test => {
            logical(op, size, src, dst, state, labels)
        }
        BinaryOp::Sal | BinaryOp::Shl | BinaryOp::Sar | BinaryOp::Shr => {
            shift(op, size, src, dst, state, labels)
        }
    }
}

fn arithmetic(
    op: BinaryOp,
    size: OpSize,
    src: &Operand,
    dst: &Operand,
    state: &MachineState,
    labels: &LabelTable,
) -> Result<MachineState, SimulationError> {
    let a = dst.value_in(state, labels, size)? as i128;
    let b = src.value_in(state, labels, size)? as i128;

    // Unsigned views of the stored operand bits, for carry/borrow.
    let au = value::truncate(a, size) as u128;
    let bu = value::truncate(b, size) as u128;

    let (result, carry) = match op {
        BinaryOp::Add => (a + b, (au + bu) >> size.bits() != 0),
        BinaryOp::Sub | BinaryOp::Cmp => (a - b, au < bu),
        BinaryOp::Imul => {
            let product = a * b;
            (product, value::overflows(product, size))
        }
        _ => unreachable!("not an arithmetic op: {op:?}"),
    };

    let mut delta = FlagDelta::NONE;
    delta.overflow = Some(value::overflows(result, size));
    delta.carry = Some(carry);
    let bits = value::truncate(result, size);
    delta.set_sign_zero(bits, size);

    let written = if op == BinaryOp::Cmp { None } else { Some(bits) };
    dst.apply(state, written, size, delta, true)
}

/// `and` / `or` / `xor` / `test`: overflow and carry are cleared.
fn logical(
    op: BinaryOp,
    size: OpSize,
    src: &Operand,
    dst: &Operand,
    state: &MachineState,
    labels: &LabelTable,
) -> Result<MachineState, SimulationError> {
    let a = dst.value_in(state, labels, size)? as i128;
    let b = src.value_in(state, labels, size)? as i128;
    let result = match op {
        BinaryOp::And | BinaryOp::Test => a & b,
        BinaryOp::Or => a | b,
        BinaryOp::Xor => a ^ b,
        _ => unreachable!("not a logical op: {op:?}"),
    };

    let mut delta = FlagDelta::NONE;
    delta.overflow = Some(false);
    delta.carry = Some(false);
    let bits = value::truncate(result, size);
    delta.set_sign_zero(bits, size);

    let written = if op == BinaryOp::Test { None } else { Some(bits) };
    dst.apply(state, written, size, delta, true)
}

/// Shift counts are masked to 6 bits at quad size and 5 bits otherwise, the
/// way the hardware masks them. A masked count of zero leaves every flag
/// unchanged.
fn shift(
    op: BinaryOp,
    size: OpSize,
    src: &Operand,
    dst: &Operand,
    state: &MachineState,
    labels: &LabelTable,
) -> Result<MachineState, SimulationError> {
    let count_mask = if size == OpSize::Quad { 0x3F } else { 0x1F };
    let count = (src.value_in(state, labels, size)? as u32) & count_mask;
    if count == 0 {
        return dst.apply(state, None, size, FlagDelta::NONE, true);
    }

    let a = dst.value_in(state, labels, size)? as i128;
    let stored = value::truncate(a, size);
    let bits_in_size = size.bits();

    let mut delta = FlagDelta::NONE;
    let result = match op {
        BinaryOp::Sal | BinaryOp::Shl => {
            let carried =
                count <= bits_in_size && (stored >> (bits_in_size - count)) & 1 == 1;
            delta.carry = Some(carried);
            delta.overflow = Some(value::overflows(a << count, size));
            a << count
        }
        BinaryOp::Sar => {
            let carried = if count <= bits_in_size {
                (stored >> (count - 1)) & 1 == 1
            } else {
                // Shifting past the width keeps filling with the sign bit.
                a < 0
            };
            delta.carry = Some(carried);
            delta.overflow = Some(false);
            a >> count.min(127)
        }
        BinaryOp::Shr => {
            let carried = count <= bits_in_size && (stored >> (count - 1)) & 1 == 1;
            delta.carry = Some(carried);
            delta.overflow = Some(false);
            if count >= bits_in_size { 0 } else { (stored >> count) as i128 }
        }
        _ => unreachable!("not a shift op: {op:?}"),
    };

    let bits = value::truncate(result, size);
    delta.set_sign_zero(bits, size);
    dst.apply(state, Some(bits), size, delta, true)
}
