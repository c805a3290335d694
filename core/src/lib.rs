//! backstep-core simulates a textual x86-64 assembly dialect.
//!
//! Source lines are parsed into typed program lines, and a program executes
//! by transforming immutable machine-state snapshots (registers, flags, stack
//! memory, instruction pointer). Because every step produces a whole new
//! snapshot, execution can step forward, step backward, restart, and run to a
//! breakpoint without ever un-doing a mutation.
//!
//! ## Example
//!
//! ```
//! use backstep_core::Simulation;
//!
//! let mut sim = Simulation::from_text("movq $5, %rax\nincq %rax\n").unwrap();
//! sim.step_forward().unwrap();
//! sim.step_forward().unwrap();
//! assert_eq!(sim.registers(), vec![("rax", 6)]);
//! sim.step_backward().unwrap();
//! assert_eq!(sim.registers(), vec![("rax", 5)]);
//! ```

pub mod errors;
pub mod instruction;
pub mod machine;
pub mod operand;
pub mod parser;
pub mod program;
pub mod simulation;
pub mod value;

pub use errors::SimulationError;
pub use machine::{FlagDelta, Flags, MachineState, StackEntry};
pub use operand::Operand;
pub use parser::{ParseError, ParseErrorKind, ProgramParseError, Span};
pub use program::Program;
pub use simulation::{FinishStatus, RUN_CAP, Simulation};
pub use value::OpSize;
