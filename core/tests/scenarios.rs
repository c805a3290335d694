//! End-to-end simulation scenarios and properties.

use indoc::indoc;
use pretty_assertions::assert_eq;

use backstep_core::errors::SimulationError;
use backstep_core::machine::{INITIAL_RSP, Reg};
use backstep_core::{FinishStatus, OpSize, RUN_CAP, Simulation};

fn sim(text: &str) -> Simulation {
    Simulation::from_text(text).unwrap()
}

fn reg_value(sim: &Simulation, name: &str) -> Option<i64> {
    sim.registers().iter().find(|(n, _)| *n == name).map(|(_, v)| *v)
}

#[test]
fn mov_then_inc_yields_six() {
    let mut sim = sim("mov $5, %eax\ninc %eax\n");
    sim.step_forward().unwrap();
    sim.step_forward().unwrap();
    assert_eq!(reg_value(&sim, "rax"), Some(6));
    assert!(!sim.flags().zero);
    assert!(!sim.flags().sign);
    assert!(sim.is_finished());
}

#[test]
fn push_pop_balances_the_stack_pointer() {
    let mut sim = sim("movq $1234, %rax\npushq %rax\npopq %rbx\n");
    sim.step_forward().unwrap();
    let rsp_before = sim.state().register_bits(Reg::Rsp);
    sim.step_forward().unwrap();
    sim.step_forward().unwrap();
    assert_eq!(sim.state().register_bits(Reg::Rsp), rsp_before);
    assert_eq!(reg_value(&sim, "rbx"), Some(1234));
}

#[test]
fn undo_is_the_exact_inverse_of_stepping() {
    let mut sim = sim(indoc! {"
        movq $3, %rax
        pushq %rax
        incq %rax
        popq %rbx
    "});

    let initial_state = sim.state().clone();
    let initial_registers = sim.registers();

    let mut snapshots = Vec::new();
    for _ in 0..3 {
        sim.step_forward().unwrap();
        snapshots.push((sim.state().clone(), sim.registers()));
    }

    // Walk back down and compare against each recorded snapshot.
    sim.step_backward().unwrap();
    assert_eq!((sim.state().clone(), sim.registers()), snapshots[1]);
    sim.step_backward().unwrap();
    assert_eq!((sim.state().clone(), sim.registers()), snapshots[0]);
    sim.step_backward().unwrap();
    assert_eq!(sim.state(), &initial_state);
    assert_eq!(sim.registers(), initial_registers);

    assert_eq!(sim.step_backward(), Err(SimulationError::NothingToUndo));
}

#[test]
fn restart_reruns_deterministically() {
    let text = indoc! {"
        movq $7, %rax
        pushq %rax
        decq %rax
        jne skip
        incq %rax
        skip:
        popq %rbx
    "};
    let mut sim = sim(text);
    while !sim.is_finished() {
        sim.step_forward().unwrap();
    }
    let first_run: Vec<_> = sim.history().to_vec();

    sim.restart();
    assert_eq!(sim.history().len(), 1);
    while !sim.is_finished() {
        sim.step_forward().unwrap();
    }
    assert_eq!(sim.history(), &first_run[..]);
}

#[test]
fn finish_caps_runaway_loops() {
    let mut sim = sim("spin:\njmp spin\n");
    let status = sim.finish().unwrap();
    assert_eq!(status, FinishStatus { finished: false, at_breakpoint: false });
    // Initial state plus exactly RUN_CAP evaluations.
    assert_eq!(sim.history().len(), RUN_CAP + 1);

    // A second call picks up where the cap stopped the first.
    let status = sim.finish().unwrap();
    assert_eq!(status.finished, false);
    assert_eq!(sim.history().len(), 2 * RUN_CAP + 1);
}

#[test]
fn finish_runs_to_completion() {
    let mut sim = sim("movq $2, %rax\ndecq %rax\ndecq %rax\n");
    let status = sim.finish().unwrap();
    assert_eq!(status, FinishStatus { finished: true, at_breakpoint: false });
    assert_eq!(reg_value(&sim, "rax"), Some(0));
    assert!(sim.flags().zero);
}

#[test]
fn finish_stops_on_a_breakpoint() {
    let mut sim = sim("movq $1, %rax\nincq %rax\nincq %rax\n");
    sim.toggle_breakpoint(2);
    let status = sim.finish().unwrap();
    assert_eq!(status, FinishStatus { finished: false, at_breakpoint: true });
    assert_eq!(sim.current_line().unwrap().number(), 2);
    // The breakpoint line has not executed yet.
    assert_eq!(reg_value(&sim, "rax"), Some(2));

    // Finishing again executes past the breakpoint to the end.
    let status = sim.finish().unwrap();
    assert!(status.finished);
    assert_eq!(reg_value(&sim, "rax"), Some(3));
}

#[test]
fn undefined_label_fails_at_evaluation_not_at_append() {
    let mut sim = Simulation::new();
    // Line-by-line entry allows forward references, so this parses.
    sim.append_line("jnz undefined_label").unwrap();

    let err = sim.step_forward().unwrap_err();
    assert_eq!(err, SimulationError::UnresolvedLabel("undefined_label".into()));
    // The failed step must not corrupt the history.
    assert_eq!(sim.history().len(), 1);
    assert!(!sim.is_finished());
}

#[test]
fn loading_a_file_with_an_undefined_label_fails_eagerly() {
    let err = Simulation::from_text("jnz undefined_label\n").unwrap_err();
    assert_eq!(err.line, 0);
}

#[test]
fn stack_entries_carry_their_originating_line() {
    let mut sim = sim("movq $5, %rax\npushq %rax\nmovq $9, -16(%rsp)\n");
    sim.finish().unwrap();

    let entries = sim.stack_entries();
    assert_eq!(entries.len(), 2);
    // Highest address first: the pushed quad, then the explicit store.
    assert_eq!(entries[0].start, INITIAL_RSP - 8);
    assert_eq!(entries[0].value(), 5);
    assert_eq!(entries[0].origin, 1);
    assert_eq!(entries[1].start, INITIAL_RSP - 8 - 16);
    assert_eq!(entries[1].value(), 9);
    assert_eq!(entries[1].origin, 2);
    assert_eq!(entries[0].size, OpSize::Quad);
}

#[test]
fn registers_surface_only_touched_names_in_first_use_order() {
    let mut sim = sim("movq $1, %rcx\nmovq $2, %rbx\n");
    sim.finish().unwrap();
    let names: Vec<_> = sim.registers().iter().map(|(n, _)| *n).collect();
    assert_eq!(names, vec!["rcx", "rbx"]);
}

#[test]
fn call_transfers_control_and_pushes_the_return_line() {
    let mut sim = sim(indoc! {"
        movq $1, %rdi
        call double
        jmp done
        double:
        addq %rdi, %rdi
        done:
    "});
    sim.step_forward().unwrap();
    sim.step_forward().unwrap();
    assert_eq!(sim.current_line().unwrap().number(), 3);
    assert_eq!(sim.stack_entries()[0].value(), 2);

    sim.step_forward().unwrap(); // label line
    sim.step_forward().unwrap(); // addq
    assert_eq!(reg_value(&sim, "rdi"), Some(2));
}

#[test]
fn appending_to_a_finished_simulation_resumes_there() {
    let mut sim = sim("movq $1, %rax\n");
    sim.finish().unwrap();
    assert!(sim.is_finished());

    sim.append_line("incq %rax").unwrap();
    assert!(!sim.is_finished());
    assert_eq!(sim.current_line().unwrap().number(), 1);
    sim.step_forward().unwrap();
    assert_eq!(reg_value(&sim, "rax"), Some(2));
}

#[test]
fn empty_program_is_finished_and_refuses_to_step() {
    let mut sim = Simulation::new();
    assert!(sim.is_finished());
    assert!(sim.current_line().is_none());
    assert_eq!(sim.step_forward(), Err(SimulationError::ProgramFinished));
    assert_eq!(sim.step_backward(), Err(SimulationError::NothingToUndo));
    let status = sim.finish().unwrap();
    assert!(status.finished);
}

#[test]
fn stepping_backward_over_a_taken_jump_returns_to_the_jump() {
    let mut sim = sim("jmp over\nincq %rax\nover:\ndecq %rbx\n");
    sim.step_forward().unwrap();
    assert_eq!(sim.current_line().unwrap().number(), 2);
    sim.step_backward().unwrap();
    assert_eq!(sim.current_line().unwrap().number(), 0);
    assert_eq!(sim.history().len(), 1);
}

#[test]
fn program_round_trip_preserves_resolved_labels() {
    let text = indoc! {"
        start:
        movq $2, %rax
        decq %rax
        jne start
    "};
    let first = sim(text);
    let reparsed = Simulation::from_text(&first.program().to_text()).unwrap();
    assert_eq!(first.program(), reparsed.program());
    assert_eq!(reparsed.program().resolve_label("start"), Some(0));
}
