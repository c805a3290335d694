//! Unit tests for machine-state snapshots.

use pretty_assertions::assert_eq;

use super::*;
use crate::value::OpSize;

fn slice(name: &str) -> RegSlice {
    lookup(name).unwrap()
}

#[test]
fn initial_state() {
    let state = MachineState::new();
    assert_eq!(state.rip(), 0);
    assert_eq!(state.register_bits(Reg::Rsp), INITIAL_RSP);
    assert_eq!(state.register_bits(Reg::Rax), 0);
    assert_eq!(state.flags(), Flags::default());
    assert!(state.stack_entries().is_empty());
}

#[test]
fn register_write_produces_new_state() {
    let state = MachineState::new();
    let next = state.with_register(slice("rax"), 42, FlagDelta::NONE, true);
    // The original snapshot is untouched.
    assert_eq!(state.register(slice("rax")), 0);
    assert_eq!(state.rip(), 0);
    assert_eq!(next.register(slice("rax")), 42);
    assert_eq!(next.rip(), 1);
}

#[test]
fn memory_write_records_originating_line() {
    let state = MachineState::new().with_rip(7, FlagDelta::NONE);
    let next = state.with_memory(0x2000, OpSize::Quad, 99, FlagDelta::NONE, true);
    let entries = next.stack_entries();
    assert_eq!(entries.len(), 1);
    assert_eq!(entries[0].start, 0x2000);
    assert_eq!(entries[0].value(), 99);
    assert_eq!(entries[0].origin, 7);
    assert_eq!(next.read_stack(0x2000, OpSize::Quad).unwrap(), 99);
}

#[test]
fn flag_delta_merges_over_prior_flags() {
    let state = MachineState::new();
    let carry_set = FlagDelta { carry: Some(true), ..FlagDelta::NONE };
    let with_carry = state.advanced(carry_set);
    assert!(with_carry.flags().carry);

    // An update that does not mention the carry flag leaves it set.
    let zero_set = FlagDelta { zero: Some(true), ..FlagDelta::NONE };
    let next = with_carry.advanced(zero_set);
    assert!(next.flags().carry);
    assert!(next.flags().zero);
}

#[test]
fn explicit_rip_update_does_not_advance() {
    let state = MachineState::new();
    let jumped = state.with_rip(12, FlagDelta::NONE);
    assert_eq!(jumped.rip(), 12);
}
