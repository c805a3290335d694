//! Errors surfaced while driving a simulation.
//!
//! Parse-time failures live in [`crate::parser::ParseError`]; everything here
//! happens at evaluation time. An evaluation error aborts the single step that
//! raised it and leaves the state history untouched — new machine states are
//! only ever produced wholesale, so a partial update is impossible by
//! construction.

use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SimulationError {
    /// A label operand whose target is not (or no longer) declared anywhere
    /// in the program.
    #[error("label '{0}' does not exist")]
    UnresolvedLabel(String),

    /// A memory read touched a byte no previous instruction has written.
    #[error("read of uninitialized stack memory at {0:#x}")]
    UninitializedRead(u64),

    /// `step_forward` was called after the program finished.
    #[error("the simulation has already finished")]
    ProgramFinished,

    /// `step_backward` was called at the initial state.
    #[error("the simulation is at its initial state")]
    NothingToUndo,
}
