//! Black-box coverage of §8's cross-cutting invariants: determinism,
//! `stop()` idempotence, `resumeWithValue` no-ops on a mismatched or absent
//! request, and the suspend discipline (the last command before
//! `WAITING_FOR_RESPONSE` is always the `*_REQUEST` that the next
//! `resumeWithValue` call must answer).

mod support;

use std::cell::RefCell;
use std::rc::Rc;

use sketch_core::command::Command;
use sketch_core::runtime::{RequestId, Value};
use sketch_core::{Ast, Interpreter, InterpreterOptions, InterpreterState};

fn analog_read_and_println_sketch() -> Ast {
    let mut ast = Ast::new();
    support::program(&mut ast, |ast| {
        let sensor_call = support::call(ast, "analogRead", vec![support::name_ref(ast, "A0")]);
        let decl = support::declarator(ast, "sensor", Some(sensor_call));
        let var_decl = support::var_decl(ast, "int", vec![decl]);
        let println = support::expr_stmt(
            ast,
            support::member_call(ast, "Serial", "println", vec![support::name_ref(ast, "sensor")]),
        );
        let setup = support::func_def(ast, "setup", vec![var_decl, println]);
        let lp = support::func_def(ast, "loop", vec![]);
        vec![setup, lp]
    });
    ast
}

fn collect(interp: &mut Interpreter) -> Rc<RefCell<Vec<Command>>> {
    let seen = Rc::new(RefCell::new(Vec::new()));
    let seen_clone = seen.clone();
    interp.set_command_listener(move |record| seen_clone.borrow_mut().push(record.command.clone()));
    seen
}

#[test]
fn identical_ast_and_responses_produce_an_identical_command_stream() {
    let options = InterpreterOptions::builder().max_top_level_loop_iterations(1).build();

    let mut run_once = || {
        let mut interp = Interpreter::new(analog_read_and_println_sketch(), options.clone());
        let seen = collect(&mut interp);
        interp.start();
        while interp.get_state() == InterpreterState::WaitingForResponse {
            let request_id = interp
                .command_history()
                .last()
                .and_then(|r| r.command.request_id())
                .expect("WaitingForResponse always follows a *_REQUEST command");
            interp.resume_with_value(request_id, Value::Int32(512));
        }
        seen.borrow().clone()
    };

    let first = run_once();
    let second = run_once();
    assert_eq!(first, second, "same AST + same answers must yield the same command stream");
    assert!(first.iter().any(|c| matches!(c, Command::AnalogReadRequest { .. })));
    assert!(first.iter().any(|c| matches!(c, Command::SerialPrintln { data } if data == "512")));
}

#[test]
fn stop_is_idempotent_and_only_the_first_call_emits_program_end() {
    let mut ast = Ast::new();
    support::program(&mut ast, |ast| vec![support::func_def(ast, "setup", vec![])]);
    let mut interp = Interpreter::new(ast, InterpreterOptions::default());
    let seen = collect(&mut interp);
    interp.start();
    assert_eq!(interp.get_state(), InterpreterState::Complete);

    let len_after_start = seen.borrow().len();
    interp.stop();
    interp.stop();
    assert_eq!(seen.borrow().len(), len_after_start, "stop() on a completed run must not emit anything further");
    assert_eq!(seen.borrow().iter().filter(|c| matches!(c, Command::ProgramEnd)).count(), 1);
}

#[test]
fn resume_with_value_is_a_noop_before_start() {
    let mut ast = Ast::new();
    support::program(&mut ast, |ast| vec![support::func_def(ast, "setup", vec![])]);
    let mut interp = Interpreter::new(ast, InterpreterOptions::default());
    assert!(!interp.resume_with_value(RequestId::new(1), Value::Int32(0)));
    assert_eq!(interp.get_state(), InterpreterState::Idle);
}

#[test]
fn resume_with_value_rejects_a_request_id_that_does_not_match_the_pending_one() {
    let options = InterpreterOptions::builder().max_top_level_loop_iterations(1).build();
    let mut interp = Interpreter::new(analog_read_and_println_sketch(), options);
    interp.start();
    assert_eq!(interp.get_state(), InterpreterState::WaitingForResponse);

    let pending = interp
        .command_history()
        .last()
        .and_then(|r| r.command.request_id())
        .expect("a pending analogRead request");
    let wrong = RequestId::new(pending.raw() + 1);

    assert!(!interp.resume_with_value(wrong, Value::Int32(0)));
    assert_eq!(
        interp.get_state(),
        InterpreterState::WaitingForResponse,
        "an unmatched request id must leave the run parked exactly where it was"
    );

    assert!(interp.resume_with_value(pending, Value::Int32(512)));
}

#[test]
fn the_command_immediately_before_waiting_for_response_is_always_a_request() {
    let options = InterpreterOptions::builder().max_top_level_loop_iterations(1).build();
    let mut interp = Interpreter::new(analog_read_and_println_sketch(), options);
    interp.start();
    assert_eq!(interp.get_state(), InterpreterState::WaitingForResponse);

    let last = interp.command_history().last().expect("at least one command emitted").command.clone();
    assert!(last.is_request(), "expected a *_REQUEST, got {last:?}");
    let request_id = last.request_id().unwrap();

    assert!(interp.resume_with_value(request_id, Value::Int32(512)));
}

#[test]
fn replayed_prefix_does_not_duplicate_commands_already_forwarded() {
    // `setup()` issues two sequential external-data requests; answering the
    // first must not re-emit the FUNCTION_CALL/VAR_SET that preceded it when
    // the call body replays to reach the second.
    let mut ast = Ast::new();
    support::program(&mut ast, |ast| {
        let first = support::declarator(ast, "a", Some(support::call(ast, "millis", vec![])));
        let first_decl = support::var_decl(ast, "unsigned long", vec![first]);
        let second = support::declarator(ast, "b", Some(support::call(ast, "micros", vec![])));
        let second_decl = support::var_decl(ast, "unsigned long", vec![second]);
        let setup = support::func_def(ast, "setup", vec![first_decl, second_decl]);
        let lp = support::func_def(ast, "loop", vec![]);
        vec![setup, lp]
    });
    let options = InterpreterOptions::builder().max_top_level_loop_iterations(1).build();
    let mut interp = Interpreter::new(ast, options);
    let seen = collect(&mut interp);
    interp.start();

    let first_request = interp.command_history().last().unwrap().command.request_id().unwrap();
    assert!(interp.resume_with_value(first_request, Value::UInt32(100)));

    let function_calls = seen.borrow().iter().filter(|c| matches!(c, Command::FunctionCall { function, .. } if function == "setup")).count();
    assert_eq!(function_calls, 1, "replay must not re-emit setup's own FUNCTION_CALL");
    let var_sets = seen.borrow().iter().filter(|c| matches!(c, Command::VarSet { variable, .. } if variable == "a")).count();
    assert_eq!(var_sets, 1, "replay must not re-emit the already-forwarded VAR_SET for `a`");

    let second_request = interp.command_history().last().unwrap().command.request_id().unwrap();
    assert!(interp.resume_with_value(second_request, Value::UInt32(200)));
    assert_eq!(interp.get_state(), InterpreterState::Complete);
}
