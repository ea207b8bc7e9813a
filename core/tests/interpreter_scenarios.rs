//! The worked end-to-end scenarios from §8, each driven through the public
//! `Interpreter` API exactly as a host embedding would.

mod support;

use std::cell::RefCell;
use std::rc::Rc;

use sketch_core::ast::{AssignOperator, BinaryOperator};
use sketch_core::command::{Command, LoopLimitSeverity, PinMode};
use sketch_core::compact_ast::{decode, encode};
use sketch_core::runtime::Value;
use sketch_core::{Ast, Interpreter, InterpreterOptions, InterpreterState};

fn collect(interp: &mut Interpreter) -> Rc<RefCell<Vec<Command>>> {
    let seen = Rc::new(RefCell::new(Vec::new()));
    let seen_clone = seen.clone();
    interp.set_command_listener(move |record| seen_clone.borrow_mut().push(record.command.clone()));
    seen
}

/// Scenario 1: the bare-minimum sketch (empty `setup`/`loop`) runs exactly
/// one `loop()` attempt and ends via the iteration cap.
#[test]
fn bare_minimum_setup_and_loop_ends_via_the_iteration_cap() {
    let mut ast = Ast::new();
    support::program(&mut ast, |ast| {
        vec![support::func_def(ast, "setup", vec![]), support::func_def(ast, "loop", vec![])]
    });
    let options = InterpreterOptions::builder().max_top_level_loop_iterations(1).build();
    let mut interp = Interpreter::new(ast, options);
    let seen = collect(&mut interp);
    interp.start();

    assert_eq!(interp.get_state(), InterpreterState::Complete);
    assert_eq!(
        *seen.borrow(),
        vec![
            Command::ProgramStart,
            Command::FunctionCall {
                function: "setup".to_owned(),
                arguments: None
            },
            Command::LoopIteration { n: 0 },
            Command::FunctionCall {
                function: "loop".to_owned(),
                arguments: None
            },
            Command::LoopLimitReached {
                message: "loop() iteration limit (1) reached".to_owned(),
                severity: LoopLimitSeverity::Lifecycle,
            },
            Command::ProgramEnd,
        ]
    );
}

/// Scenario 2: a one-step digital blink — `pinMode` in `setup()`, a
/// write-high/delay/write-low/delay pair in a single `loop()` iteration.
#[test]
fn digital_blink_one_step() {
    let mut ast = Ast::new();
    support::program(&mut ast, |ast| {
        let pin_mode_call = support::call(ast, "pinMode", vec![support::int_lit(ast, 13), support::name_ref(ast, "OUTPUT")]);
        let setup = support::func_def(ast, "setup", vec![support::expr_stmt(ast, pin_mode_call)]);

        let write_high = support::call(ast, "digitalWrite", vec![support::int_lit(ast, 13), support::name_ref(ast, "HIGH")]);
        let delay_a = support::call(ast, "delay", vec![support::int_lit(ast, 1000)]);
        let write_low = support::call(ast, "digitalWrite", vec![support::int_lit(ast, 13), support::name_ref(ast, "LOW")]);
        let delay_b = support::call(ast, "delay", vec![support::int_lit(ast, 1000)]);
        let lp = support::func_def(
            ast,
            "loop",
            vec![
                support::expr_stmt(ast, write_high),
                support::expr_stmt(ast, delay_a),
                support::expr_stmt(ast, write_low),
                support::expr_stmt(ast, delay_b),
            ],
        );
        vec![setup, lp]
    });

    let options = InterpreterOptions::builder().max_top_level_loop_iterations(1).build();
    let mut interp = Interpreter::new(ast, options);
    let seen = collect(&mut interp);
    interp.start();

    assert_eq!(interp.get_state(), InterpreterState::Complete);
    let commands = seen.borrow();
    assert!(commands.contains(&Command::PinMode { pin: 13, mode: PinMode::Output }));
    assert!(commands.contains(&Command::DigitalWrite { pin: 13, value: 1 }));
    assert!(commands.contains(&Command::DigitalWrite { pin: 13, value: 0 }));
    assert_eq!(commands.iter().filter(|c| matches!(c, Command::Delay { duration: 1000 })).count(), 2);
}

/// Scenario 3: `analogRead` suspends the run; `resumeWithValue` replays
/// `loop()` from its snapshot and the memoized answer reaches `Serial.println`.
#[test]
fn analog_read_request_then_response_reaches_serial_println() {
    let mut ast = Ast::new();
    support::program(&mut ast, |ast| {
        let begin = support::member_call(ast, "Serial", "begin", vec![support::int_lit(ast, 9600)]);
        let setup = support::func_def(ast, "setup", vec![support::expr_stmt(ast, begin)]);

        let sensor_call = support::call(ast, "analogRead", vec![support::name_ref(ast, "A0")]);
        let decl = support::declarator(ast, "sensor", Some(sensor_call));
        let var_decl = support::var_decl(ast, "int", vec![decl]);
        let println = support::expr_stmt(
            ast,
            support::member_call(ast, "Serial", "println", vec![support::name_ref(ast, "sensor")]),
        );
        let lp = support::func_def(ast, "loop", vec![var_decl, println]);
        vec![setup, lp]
    });

    let options = InterpreterOptions::builder().max_top_level_loop_iterations(1).build();
    let mut interp = Interpreter::new(ast, options);
    let seen = collect(&mut interp);
    interp.start();

    assert_eq!(interp.get_state(), InterpreterState::WaitingForResponse);
    let request = interp.command_history().last().unwrap().command.clone();
    let Command::AnalogReadRequest { pin, request_id } = request else {
        panic!("expected AnalogReadRequest, got {request:?}");
    };
    assert_eq!(pin, 14, "A0 resolves to the digital-pin-count-continuation constant");

    assert!(interp.resume_with_value(request_id, Value::Int32(512)));
    assert_eq!(interp.get_state(), InterpreterState::Complete);

    assert_eq!(
        *seen.borrow(),
        vec![
            Command::ProgramStart,
            Command::FunctionCall {
                function: "setup".to_owned(),
                arguments: None
            },
            Command::SerialBegin { baud_rate: 9600 },
            Command::LoopIteration { n: 0 },
            Command::FunctionCall {
                function: "loop".to_owned(),
                arguments: None
            },
            Command::AnalogReadRequest { pin: 14, request_id },
            Command::VarSet {
                variable: "sensor".to_owned(),
                value: "512".to_owned(),
                value_type: Some("int".to_owned()),
            },
            Command::SerialPrintln { data: "512".to_owned() },
            Command::LoopLimitReached {
                message: "loop() iteration limit (1) reached".to_owned(),
                severity: LoopLimitSeverity::Lifecycle,
            },
            Command::ProgramEnd,
        ]
    );
}

/// Scenario 4: a ternary initializer picks its consequent branch and is
/// reported with the declared type, same as any other initializer.
#[test]
fn ternary_initializer_evaluates_the_taken_branch() {
    let mut ast = Ast::new();
    support::program(&mut ast, |ast| {
        let condition = support::binary(ast, BinaryOperator::Gt, support::int_lit(ast, 5), support::int_lit(ast, 3));
        let ternary = support::ternary(ast, condition, support::int_lit(ast, 1), support::int_lit(ast, 0));
        let decl = support::declarator(ast, "x", Some(ternary));
        let var_decl = support::var_decl(ast, "int", vec![decl]);
        vec![support::func_def(ast, "setup", vec![var_decl])]
    });

    let mut interp = Interpreter::new(ast, InterpreterOptions::default());
    let seen = collect(&mut interp);
    interp.start();

    assert_eq!(interp.get_state(), InterpreterState::Complete);
    assert!(seen.borrow().contains(&Command::VarSet {
        variable: "x".to_owned(),
        value: "1".to_owned(),
        value_type: Some("int".to_owned()),
    }));
}

/// Scenario 5: a `for` loop that `break`s out partway through leaves its
/// counter at the value it held at the break, not one past it.
#[test]
fn break_in_a_for_loop_stops_before_the_final_increment() {
    let mut ast = Ast::new();
    support::program(&mut ast, |ast| {
        let i_decl = support::var_decl(ast, "int", vec![support::declarator(ast, "i", None)]);

        let init = support::expr_stmt(ast, support::assign(ast, AssignOperator::Assign, support::name_ref(ast, "i"), support::int_lit(ast, 0)));
        let condition = support::binary(ast, BinaryOperator::Lt, support::name_ref(ast, "i"), support::int_lit(ast, 10));
        let next = support::binary(ast, BinaryOperator::Add, support::name_ref(ast, "i"), support::int_lit(ast, 1));
        let increment = support::assign(ast, AssignOperator::Assign, support::name_ref(ast, "i"), next);

        let hit_three = support::binary(ast, BinaryOperator::Eq, support::name_ref(ast, "i"), support::int_lit(ast, 3));
        let break_block = support::compound(ast, vec![support::break_stmt(ast)]);
        let if_break = support::if_stmt(ast, hit_three, break_block, None);
        let for_body = support::compound(ast, vec![if_break]);
        let for_stmt = support::for_stmt(ast, Some(init), Some(condition), Some(increment), for_body);

        let println = support::expr_stmt(ast, support::member_call(ast, "Serial", "println", vec![support::name_ref(ast, "i")]));
        vec![support::func_def(ast, "setup", vec![i_decl, for_stmt, println])]
    });

    let mut interp = Interpreter::new(ast, InterpreterOptions::default());
    let seen = collect(&mut interp);
    interp.start();

    assert_eq!(interp.get_state(), InterpreterState::Complete);
    assert!(seen.borrow().contains(&Command::SerialPrintln { data: "3".to_owned() }));
    let i_assignments = seen
        .borrow()
        .iter()
        .filter(|c| matches!(c, Command::VarSet { variable, .. } if variable == "i"))
        .count();
    assert_eq!(i_assignments, 5, "declare + for-init + three increments (0->1, 1->2, 2->3)");
}

/// Scenario 6: a CompactAST-encoded `int x = 5;` program with no
/// `setup`/`loop` runs its global initializer during the prelude, before
/// `PROGRAM_START`, and ends immediately afterward.
#[test]
fn compact_ast_global_initializer_runs_in_the_prelude() {
    let mut ast = Ast::new();
    support::program(&mut ast, |ast| {
        let decl = support::declarator(ast, "x", Some(support::int_lit(ast, 5)));
        vec![support::var_decl(ast, "int", vec![decl])]
    });
    let bytes = encode(&ast).unwrap();
    let decoded = decode(&bytes).unwrap();

    let mut interp = Interpreter::new(decoded, InterpreterOptions::default());
    let seen = collect(&mut interp);
    interp.start();

    assert_eq!(interp.get_state(), InterpreterState::Complete);
    assert_eq!(
        *seen.borrow(),
        vec![
            Command::VarSet {
                variable: "x".to_owned(),
                value: "5".to_owned(),
                value_type: Some("int".to_owned()),
            },
            Command::ProgramStart,
            Command::ProgramEnd,
        ]
    );
}

/// A sized array declaration (`int arr[3];`) allocates a zero-filled heap
/// array and binds it, so a subsequent element read sees `0`, not an
/// `UnknownIdentifier` error.
#[test]
fn sized_array_declaration_allocates_and_binds() {
    let mut ast = Ast::new();
    support::program(&mut ast, |ast| {
        let size = support::int_lit(ast, 3);
        let arr_decl = support::var_decl(ast, "int", vec![support::array_declarator(ast, "arr", size)]);
        let read = support::array_access(ast, support::name_ref(ast, "arr"), support::int_lit(ast, 0));
        let println = support::expr_stmt(ast, support::member_call(ast, "Serial", "println", vec![read]));
        vec![support::func_def(ast, "setup", vec![arr_decl, println])]
    });

    let mut interp = Interpreter::new(ast, InterpreterOptions::default());
    let seen = collect(&mut interp);
    interp.start();

    assert_eq!(interp.get_state(), InterpreterState::Complete);
    assert!(seen
        .borrow()
        .iter()
        .any(|c| matches!(c, Command::VarSet { variable, value_type, .. } if variable == "arr" && value_type.as_deref() == Some("int"))));
    assert!(seen.borrow().contains(&Command::SerialPrintln { data: "0".to_owned() }));
}

/// Scenario: a global array mutated in place (`arr[0] = arr[0] + 1;`)
/// before a suspending `analogRead()` call must see that mutation applied
/// exactly once, even though the first attempt of `loop()` is discarded and
/// replayed from the pre-call snapshot after `resumeWithValue`.
#[test]
fn heap_mutation_before_a_suspend_point_is_not_replayed_twice() {
    let mut ast = Ast::new();
    support::program(&mut ast, |ast| {
        let size = support::int_lit(ast, 1);
        let global_arr = support::var_decl(ast, "int", vec![support::array_declarator(ast, "arr", size)]);

        let setup = support::func_def(ast, "setup", vec![]);

        let target = support::array_access(ast, support::name_ref(ast, "arr"), support::int_lit(ast, 0));
        let current = support::array_access(ast, support::name_ref(ast, "arr"), support::int_lit(ast, 0));
        let incremented = support::binary(ast, BinaryOperator::Add, current, support::int_lit(ast, 1));
        let bump = support::expr_stmt(ast, support::assign(ast, AssignOperator::Assign, target, incremented));

        let sensor_call = support::call(ast, "analogRead", vec![support::name_ref(ast, "A0")]);
        let sensor_decl = support::var_decl(ast, "int", vec![support::declarator(ast, "sensor", Some(sensor_call))]);

        let read = support::array_access(ast, support::name_ref(ast, "arr"), support::int_lit(ast, 0));
        let println = support::expr_stmt(ast, support::member_call(ast, "Serial", "println", vec![read]));

        let lp = support::func_def(ast, "loop", vec![bump, sensor_decl, println]);
        vec![global_arr, setup, lp]
    });

    let options = InterpreterOptions::builder().max_top_level_loop_iterations(1).build();
    let mut interp = Interpreter::new(ast, options);
    let seen = collect(&mut interp);
    interp.start();

    assert_eq!(interp.get_state(), InterpreterState::WaitingForResponse);
    let request = interp.command_history().last().unwrap().command.clone();
    let Command::AnalogReadRequest { request_id, .. } = request else {
        panic!("expected AnalogReadRequest, got {request:?}");
    };

    assert!(interp.resume_with_value(request_id, Value::Int32(512)));
    assert_eq!(interp.get_state(), InterpreterState::Complete);

    assert!(
        seen.borrow().contains(&Command::SerialPrintln { data: "1".to_owned() }),
        "arr[0] must read back 1, not 2, after the replayed attempt: {:?}",
        seen.borrow()
    );
}
