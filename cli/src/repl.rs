//! The interactive command loop.

use backstep_core::{Simulation, SimulationError};
use miette::{IntoDiagnostic, Result};
use nu_ansi_term::Color;
use reedline::{DefaultPrompt, DefaultPromptSegment, Reedline, Signal};
use tracing::debug;

use crate::render;

const HELP: &str = "\
commands:
  s, step          execute the current line
  b, back          undo the last step
  r, run           run to completion, breakpoint, or step cap
  restart          return to the initial machine state
  break <line>     toggle a breakpoint
  del <line>       remove a program line
  l, list          show the program
  regs             show touched registers
  stack            show stack entries
  flags            show SF/ZF/OF/CF
  h, help          this text
  q, quit          leave

anything else is parsed as an instruction and appended to the program";

pub fn run(mut sim: Simulation) -> Result<()> {
    let mut editor = Reedline::create();
    let prompt = DefaultPrompt::new(
        DefaultPromptSegment::Basic("backstep".to_string()),
        DefaultPromptSegment::Empty,
    );

    println!("backstep - type 'help' for commands");
    render::listing(&sim);

    loop {
        match editor.read_line(&prompt).into_diagnostic()? {
            Signal::Success(input) => {
                let input = input.trim();
                if input.is_empty() {
                    continue;
                }
                debug!(input, "command");
                if !dispatch(&mut sim, input) {
                    break;
                }
            }
            Signal::CtrlC => continue,
            Signal::CtrlD => break,
        }
    }
    Ok(())
}

/// Returns false when the loop should exit.
fn dispatch(sim: &mut Simulation, input: &str) -> bool {
    let mut words = input.split_whitespace();
    let command = words.next().unwrap_or_default();
    let argument = words.next();

    match (command, argument) {
        ("q" | "quit" | "exit", _) => return false,
        ("h" | "help", _) => println!("{}", HELP),
        ("s" | "step", _) => {
            if let Err(err) = sim.step_forward() {
                report_simulation_error(&err);
            } else {
                render::listing(sim);
            }
        }
        ("b" | "back", _) => {
            if let Err(err) = sim.step_backward() {
                report_simulation_error(&err);
            } else {
                render::listing(sim);
            }
        }
        ("r" | "run", _) => match sim.finish() {
            Ok(status) => {
                if status.at_breakpoint {
                    println!("{}", Color::Yellow.paint("stopped at breakpoint"));
                } else if !status.finished {
                    println!(
                        "{}",
                        Color::Yellow.paint("step cap reached; 'run' again to continue")
                    );
                }
                render::listing(sim);
            }
            Err(err) => report_simulation_error(&err),
        },
        ("restart", _) => {
            sim.restart();
            render::listing(sim);
        }
        ("break", Some(line)) => match parse_line_number(sim, line) {
            Some(number) => sim.toggle_breakpoint(number),
            None => println!("no line numbered {}", line),
        },
        ("del", Some(line)) => match parse_line_number(sim, line) {
            Some(number) => {
                sim.remove_line(number);
                render::listing(sim);
            }
            None => println!("no line numbered {}", line),
        },
        ("l" | "list", _) => render::listing(sim),
        ("regs", _) => render::registers(sim),
        ("stack", _) => render::stack(sim),
        ("flags", _) => render::flags(sim),
        // Not a command: treat the whole input as an instruction line.
        _ => match sim.append_line(input) {
            Ok(()) => render::listing(sim),
            Err(err) => render::report_parse_error(input, &err, None),
        },
    }
    true
}

fn parse_line_number(sim: &Simulation, text: &str) -> Option<u64> {
    let number = text.parse::<u64>().ok()?;
    (number < sim.program().len()).then_some(number)
}

fn report_simulation_error(error: &SimulationError) {
    println!("{}", Color::Red.paint(format!("error: {}", error)));
}
