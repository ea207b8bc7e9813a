//! `sketch-run`: a small CLI front end for `sketch_core` (§6 "External
//! Interfaces"). Loads a CompactAST binary, drives the interpreter to
//! completion, and prints the command stream as newline-delimited JSON —
//! useful for snapshotting a sketch's behavior in a shell pipeline or CI
//! check without embedding the crate in a larger host.
//!
//! External-data requests (`analogRead`, `millis`, ...) are answered by a
//! fixed deterministic mock rather than real hardware, since there is no
//! hardware here; see `MockResponder` below.

use std::env;
use std::fs;
use std::process::ExitCode;

use sketch_core::command::Command;
use sketch_core::interpreter::ResponseHandler;
use sketch_core::runtime::Value;
use sketch_core::{Interpreter, InterpreterOptions, InterpreterState};

/// Answers every external-data request with a fixed, deterministic value
/// so a sketch's command stream is reproducible across runs (§8
/// determinism property extended to the mock layer itself).
struct MockResponder;

impl ResponseHandler for MockResponder {
    fn respond(&mut self, command: &Command) -> Option<Value> {
        match command {
            Command::DigitalReadRequest { .. } => Some(Value::Int32(0)),
            Command::AnalogReadRequest { .. } => Some(Value::Int32(512)),
            Command::MillisRequest { .. } => Some(Value::UInt32(0)),
            Command::MicrosRequest { .. } => Some(Value::UInt32(0)),
            Command::LibraryMethodRequest { .. } => Some(Value::Void),
            _ => None,
        }
    }
}

fn print_usage(program: &str) {
    eprintln!("usage: {program} <compact-ast-file> [--max-loop N] [--sync]");
}

fn main() -> ExitCode {
    env_logger::init();

    let args: Vec<String> = env::args().collect();
    let program = args.first().cloned().unwrap_or_else(|| "sketch-run".to_owned());
    let Some(path) = args.get(1) else {
        print_usage(&program);
        return ExitCode::FAILURE;
    };

    let mut max_loop = 3;
    let mut synchronous = false;
    let mut i = 2;
    while i < args.len() {
        match args[i].as_str() {
            "--max-loop" => {
                i += 1;
                match args.get(i).and_then(|s| s.parse().ok()) {
                    Some(n) => max_loop = n,
                    None => {
                        eprintln!("--max-loop requires a numeric argument");
                        return ExitCode::FAILURE;
                    }
                }
            }
            "--sync" => synchronous = true,
            other => {
                eprintln!("unrecognized argument: {other}");
                print_usage(&program);
                return ExitCode::FAILURE;
            }
        }
        i += 1;
    }

    let bytes = match fs::read(path) {
        Ok(b) => b,
        Err(e) => {
            eprintln!("failed to read {path}: {e}");
            return ExitCode::FAILURE;
        }
    };

    let ast = match sketch_core::compact_ast::decode(&bytes) {
        Ok(ast) => ast,
        Err(e) => {
            eprintln!("failed to decode CompactAST: {e}");
            return ExitCode::FAILURE;
        }
    };

    let options = InterpreterOptions::builder()
        .max_top_level_loop_iterations(max_loop)
        .synchronous_mode(synchronous)
        .build();
    let mut interpreter = Interpreter::new(ast, options);
    interpreter.set_command_listener(|record| match serde_json::to_string(record) {
        Ok(line) => println!("{line}"),
        Err(e) => log::warn!("failed to serialize command record: {e}"),
    });
    interpreter.set_response_handler(MockResponder);

    interpreter.start();
    while interpreter.is_running() {
        let Some(request_id) = pending_request_id(&interpreter) else {
            break;
        };
        let answer = MockResponder.respond_for_history(&interpreter, request_id);
        interpreter.resume_with_value(request_id, answer);
    }

    match interpreter.get_state() {
        InterpreterState::Error => ExitCode::FAILURE,
        _ => ExitCode::SUCCESS,
    }
}

/// Finds the `request_id` of the most recently emitted request command, so
/// the synchronous driving loop above knows what to answer when
/// `synchronous_mode` is off and the interpreter parked in
/// `WaitingForResponse` (§4.3.1).
fn pending_request_id(interpreter: &Interpreter) -> Option<sketch_core::runtime::RequestId> {
    interpreter
        .command_history()
        .iter()
        .rev()
        .find_map(|record| record.command.request_id())
}

impl MockResponder {
    /// Re-derives the answer for a parked request by replaying it through
    /// the same mapping `respond` uses, keyed off the command history
    /// instead of the live command (the live `Command` value isn't kept
    /// around once `WAITING_FOR_RESPONSE` is reached outside synchronous
    /// mode).
    fn respond_for_history(&mut self, interpreter: &Interpreter, request_id: sketch_core::runtime::RequestId) -> Value {
        let command = interpreter
            .command_history()
            .iter()
            .rev()
            .find(|record| record.command.request_id() == Some(request_id))
            .map(|record| record.command.clone());
        command.and_then(|c| self.respond(&c)).unwrap_or(Value::Void)
    }
}
