//! Interactive terminal frontend for the backstep simulator.
//!
//! Loads a program from a file (or starts empty), then drives the simulation
//! through a small REPL: step, back, run, restart, breakpoints, and register,
//! stack and flag display. Typing an instruction line appends it to the
//! program.

use std::fs;
use std::path::PathBuf;

use backstep_core::Simulation;
use clap::Parser;
use miette::{IntoDiagnostic, Result};
use tracing_subscriber::EnvFilter;

mod render;
mod repl;

#[derive(Parser, Debug)]
#[command(name = "backstep", version,
    about = "A steppable x86-64 assembly simulator", long_about = None)]
struct Cli {
    /// Assembly program to load, one instruction per line.
    program: Option<PathBuf>,
}

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")))
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();

    let sim = match &cli.program {
        Some(path) => {
            let text = fs::read_to_string(path).into_diagnostic()?;
            match Simulation::from_text(&text) {
                Ok(sim) => sim,
                Err(err) => {
                    let offending = text.lines().nth(err.line).unwrap_or_default();
                    render::report_parse_error(offending, &err.error, Some(err.line));
                    std::process::exit(1);
                }
            }
        }
        None => Simulation::new(),
    };

    repl::run(sim)
}
