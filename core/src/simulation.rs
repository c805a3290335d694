//! Driving a program: history, stepping, breakpoints, run-to-completion.
//!
//! The simulation owns a program and a non-empty history of machine states
//! (index 0 is the pristine initial state). Stepping forward evaluates the
//! current line and pushes the produced state; stepping backward pops it.
//! Alongside the state history runs a register-usage history — one entry per
//! register name an executed line touched, duplicates allowed — which decides
//! which registers are interesting enough to surface to a frontend.

use tracing::{debug, trace};

use crate::errors::SimulationError;
use crate::instruction::ProgramLine;
use crate::machine::{Flags, MachineState, StackEntry};
use crate::parser::{ParseError, ProgramParseError};
use crate::program::Program;

/// Cap on evaluations per [`Simulation::finish`] call. A program stuck in a
/// loop hands control back to the caller after this many steps instead of
/// hanging it; calling `finish` again continues past the cap.
pub const RUN_CAP: usize = 100;

/// Result of a [`Simulation::finish`] call.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FinishStatus {
    /// The program ran off its last line.
    pub finished: bool,
    /// Execution stopped on a breakpoint-marked line.
    pub at_breakpoint: bool,
}

#[derive(Debug, Clone)]
pub struct Simulation {
    program: Program,
    state_history: Vec<MachineState>,
    reg_history: Vec<&'static str>,
    current_line: Option<u64>,
}

impl Default for Simulation {
    fn default() -> Self {
        Self::new()
    }
}

impl Simulation {
    /// A simulation over an empty program.
    pub fn new() -> Self {
        Self::with_program(Program::new())
    }

    pub fn with_program(program: Program) -> Self {
        let mut sim = Simulation {
            program,
            state_history: vec![MachineState::new()],
            reg_history: Vec::new(),
            current_line: None,
        };
        sim.select_first_line();
        sim
    }

    /// Parse a complete program text and wrap it in a fresh simulation.
    pub fn from_text(text: &str) -> Result<Self, ProgramParseError> {
        Ok(Self::with_program(Program::parse(text)?))
    }

    pub fn program(&self) -> &Program {
        &self.program
    }

    /// The newest machine state.
    pub fn state(&self) -> &MachineState {
        self.state_history.last().expect("history is never empty")
    }

    /// Every state produced so far, oldest first. Index 0 is the initial
    /// state; the slice is never empty.
    pub fn history(&self) -> &[MachineState] {
        &self.state_history
    }

    /// The line the next forward step will execute.
    pub fn current_line(&self) -> Option<&ProgramLine> {
        self.current_line.and_then(|number| self.program.line(number))
    }

    /// Whether execution has moved past the last program line.
    pub fn is_finished(&self) -> bool {
        self.state().rip() >= self.program.len()
    }

    /// Evaluate the current line and push the produced state.
    ///
    /// On an evaluation error the history is untouched: states are pushed
    /// only after a successful evaluation.
    pub fn step_forward(&mut self) -> Result<(), SimulationError> {
        if self.is_finished() {
            return Err(SimulationError::ProgramFinished);
        }
        let number = self.current_line.expect("an unfinished simulation has a current line");
        let line = self.program.line(number).expect("current line is in bounds");
        trace!(line = %line, number, "step");

        let next = line.eval(self.state(), self.program.labels())?;
        self.state_history.push(next);

        if self.is_finished() {
            self.current_line = None;
        } else {
            let number = self.state().rip();
            let line = self.program.line(number).expect("rip of an unfinished state is in bounds");
            self.reg_history.extend(line.used_registers());
            self.current_line = Some(number);
        }
        Ok(())
    }

    /// Undo the most recent step: pop the newest state and retire one
    /// occurrence of each register name the undone line had contributed.
    pub fn step_backward(&mut self) -> Result<(), SimulationError> {
        if self.state_history.len() == 1 {
            return Err(SimulationError::NothingToUndo);
        }
        self.state_history.pop();

        let undone = self.current_line().map(|line| line.used_registers()).unwrap_or_default();
        for name in undone {
            if let Some(at) = self.reg_history.iter().rposition(|&used| used == name) {
                self.reg_history.remove(at);
            }
        }
        self.current_line = Some(self.state().rip());
        Ok(())
    }

    /// Step until the program finishes, a breakpoint is reached after at
    /// least one step, or [`RUN_CAP`] evaluations have run in this call.
    pub fn finish(&mut self) -> Result<FinishStatus, SimulationError> {
        let mut executed = 0;
        while !self.is_finished()
            && (executed == 0 || !self.at_breakpoint())
            && executed < RUN_CAP
        {
            self.step_forward()?;
            executed += 1;
        }
        let status =
            FinishStatus { finished: self.is_finished(), at_breakpoint: self.at_breakpoint() };
        debug!(executed, ?status, "run stopped");
        Ok(status)
    }

    /// Throw away all execution state and return to the initial machine
    /// state, keeping the program.
    pub fn restart(&mut self) {
        debug!("restart");
        self.state_history.truncate(1);
        self.reg_history.clear();
        self.current_line = None;
        self.select_first_line();
    }

    // -- program editing ----------------------------------------------------

    /// Append a parsed line to the program. If the simulation had nothing
    /// left to execute (empty program, or already finished), the new line
    /// becomes the current line.
    pub fn append_line(&mut self, text: &str) -> Result<(), ParseError> {
        self.program.append_line(text)?;
        if self.current_line.is_none() && !self.is_finished() {
            let number = self.state().rip();
            let line = self.program.line(number).expect("rip of an unfinished state is in bounds");
            self.reg_history.extend(line.used_registers());
            self.current_line = Some(number);
        }
        Ok(())
    }

    /// Remove a line and restart: the history was produced by a program that
    /// no longer exists.
    ///
    /// Panics if `number` is out of bounds.
    pub fn remove_line(&mut self, number: u64) {
        self.program.remove_line(number);
        self.restart();
    }

    /// Replace a line (keeping its breakpoint) and restart.
    ///
    /// Panics if `number` is out of bounds.
    pub fn replace_line(&mut self, number: u64, text: &str) -> Result<(), ParseError> {
        self.program.replace_line(number, text)?;
        self.restart();
        Ok(())
    }

    /// Panics if `number` is out of bounds.
    pub fn toggle_breakpoint(&mut self, number: u64) {
        self.program.toggle_breakpoint(number);
    }

    // -- display accessors --------------------------------------------------

    /// Registers touched so far, in first-use order, with their current
    /// full-width values.
    pub fn registers(&self) -> Vec<(&'static str, i64)> {
        let mut seen = Vec::new();
        for &name in &self.reg_history {
            if !seen.contains(&name) {
                seen.push(name);
            }
        }
        let state = self.state();
        seen.into_iter()
            .map(|name| {
                let slice = crate::machine::lookup(name).expect("usage history holds register names");
                (name, state.register(slice))
            })
            .collect()
    }

    /// Live stack entries of the newest state, highest address first.
    pub fn stack_entries(&self) -> Vec<&StackEntry> {
        self.state().stack_entries()
    }

    pub fn flags(&self) -> Flags {
        self.state().flags()
    }

    fn at_breakpoint(&self) -> bool {
        self.current_line().is_some_and(|line| line.breakpoint())
    }

    fn select_first_line(&mut self) {
        if !self.program.is_empty() {
            self.current_line = Some(0);
            let first = self.program.line(0).expect("program is non-empty");
            self.reg_history.extend(first.used_registers());
        }
    }
}
