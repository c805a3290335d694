//! Terminal rendering of simulator state and errors.

use backstep_core::{ParseError, Simulation};
use miette::{Diagnostic, SourceSpan};
use nu_ansi_term::Color;
use thiserror::Error;

/// Wraps a core parse error so miette can render the offending span inside
/// the source line.
#[derive(Debug, Error, Diagnostic)]
#[error("{message}")]
struct ParseDiagnostic {
    message: String,
    #[source_code]
    src: String,
    #[label("here")]
    span: SourceSpan,
}

pub fn report_parse_error(source: &str, error: &ParseError, line: Option<usize>) {
    let offset = error.span.start().min(source.len());
    let len = error.span.end().saturating_sub(error.span.start());
    let diagnostic = ParseDiagnostic {
        message: match line {
            Some(line) => format!("line {}: {}", line, error),
            None => error.to_string(),
        },
        src: source.to_string(),
        span: SourceSpan::new(offset.into(), len),
    };
    eprintln!("{:?}", miette::Report::new(diagnostic));
}

/// Program listing with the current line and breakpoints marked.
pub fn listing(sim: &Simulation) {
    let current = sim.current_line().map(|line| line.number());
    for line in sim.program().lines() {
        let cursor = if current == Some(line.number()) { "->" } else { "  " };
        let marker = if line.breakpoint() { "*" } else { " " };
        let text = format!("{} {}{:>3}: {}", cursor, marker, line.number(), line);
        if current == Some(line.number()) {
            println!("{}", Color::Cyan.bold().paint(text));
        } else {
            println!("{}", text);
        }
    }
    if sim.is_finished() {
        println!("{}", Color::DarkGray.paint("   (finished)"));
    }
}

/// Registers touched so far, with hex and decimal values.
pub fn registers(sim: &Simulation) {
    let registers = sim.registers();
    if registers.is_empty() {
        println!("no registers used yet");
        return;
    }
    for (name, value) in registers {
        println!(
            "  {:<4} {:#018x}  {}",
            Color::Green.paint(format!("%{}", name)),
            value as u64,
            value
        );
    }
}

/// Live stack entries, highest address first.
pub fn stack(sim: &Simulation) {
    let entries = sim.stack_entries();
    if entries.is_empty() {
        println!("stack is empty");
        return;
    }
    for entry in entries {
        println!(
            "  {:#018x}..{:#018x}  {:<20}  (line {})",
            entry.start,
            entry.end(),
            entry.value(),
            entry.origin
        );
    }
}

pub fn flags(sim: &Simulation) {
    let flags = sim.flags();
    let bit = |set: bool| if set { "1" } else { "0" };
    println!(
        "  SF={} ZF={} OF={} CF={}",
        bit(flags.sign),
        bit(flags.zero),
        bit(flags.overflow),
        bit(flags.carry)
    );
}
