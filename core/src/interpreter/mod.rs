//! The tree-walking interpreter (§4.3): evaluates a [`crate::ast::Ast`]
//! against the Command Protocol, exposing the life cycle described in
//! §4.3.1 and §6.3.
//!
//! The hardest part of this module is §4.3.4's suspend/resume: a request
//! whose value can only come from the host (`analogRead`, `millis`, a
//! library method, ...) must park evaluation *at the exact expression*
//! and later continue as though nothing happened. The teacher's bytecode
//! VM (`crates/monty/src/run.rs`) solves the analogous problem by capturing
//! an explicit `Snapshot<T>` (namespaces, heap, a `position_stack` of saved
//! frame continuations) and handing it back to the host as part of
//! `RunProgress::FunctionCall` — execution later resumes by calling
//! `Snapshot::run(self, value)`. A tree-walking evaluator has no bytecode
//! instruction pointer to save; the native Rust call stack *is* the
//! continuation, and Rust gives no way to snapshot or replay a call stack
//! directly.
//!
//! This interpreter reaches the same externally observable result —
//! suspend at the exact pending expression, resume and continue from
//! there — with a **replay-with-memoized-answers** strategy instead of a
//! captured continuation, entirely in synchronous, non-async, non-threaded
//! Rust (§5 forbids internal threads):
//!
//! - Each top-level call (`setup()`, or one `loop()` iteration) begins by
//!   snapshotting the global scope ([`crate::runtime::Scope::snapshot`]).
//! - External-data requests reached during the call are numbered in
//!   encounter order (`request_cursor`). The first time a given ordinal is
//!   reached with no stored answer yet, the request command is emitted and
//!   the whole call unwinds with [`EvalFlow::Suspend`] — discarding the
//!   native stack built up so far is safe because nothing outside this
//!   module observed intermediate values.
//! - `resume_with_value` records the answer for that ordinal and restarts
//!   the call from the snapshot. Because the sketch code run so far is
//!   side-effect-free from the host's point of view except via emitted
//!   commands, and the replayed prefix reaches the identical sequence of
//!   requests in the identical order (the AST and bindings are unchanged),
//!   every earlier ordinal now has a memoized answer and is satisfied
//!   without re-emitting its request or re-asking the host.
//! - [`Interpreter::emit`] suppresses re-delivery of commands already
//!   forwarded to the listener during an earlier attempt of the same call
//!   (`TopLevelCall::already_emitted`), so a replayed prefix is invisible
//!   to the host even though the Rust code that produces it runs again.
//!
//! The one accepted cost (documented rather than engineered away): heap
//! allocations made by an aborted attempt are not freed until
//! [`crate::runtime::Heap::clear`] — see `DESIGN.md`.

mod builtins;
mod eval;
mod response;

pub use response::ResponseHandler;

use ahash::AHashMap;

use crate::ast::{Ast, NodeId};
use crate::command::{Command, CommandEmitter, LoopLimitSeverity};
use crate::error::EvalError;
use crate::options::InterpreterOptions;
use crate::runtime::{
    ControlFlow, FunctionTable, Heap, HeapData, HeapSnapshot, RequestId, RequestIdAllocator, Scope, Value,
};

/// Life cycle states (§4.3.1).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InterpreterState {
    Idle,
    Running,
    WaitingForResponse,
    Paused,
    Complete,
    Error,
}

/// Bubbled out of statement/expression evaluation instead of returned to
/// the host directly (§4.3.6, §10.1): a `Suspend` unwinds the whole
/// top-level call so it can be replayed; an `Error` is caught at the call
/// boundary and turned into an `ERROR` command.
#[derive(Debug)]
pub(crate) enum EvalFlow {
    Error(EvalError),
    Suspend(RequestId),
}

impl From<EvalError> for EvalFlow {
    fn from(e: EvalError) -> Self {
        Self::Error(e)
    }
}

pub(crate) type EvalResult<T> = Result<T, EvalFlow>;

/// Which top-level driver call is in flight (§4.3.2's `setup()` then
/// repeated `loop()`).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum TopLevelKind {
    Setup,
    Loop(u32),
}

/// Replay bookkeeping for the call currently in flight; see the module
/// docs' "replay-with-memoized-answers" section.
#[derive(Debug)]
struct TopLevelCall {
    kind: TopLevelKind,
    global_snapshot: AHashMap<String, Value>,
    /// Heap arena as it stood before this call's first attempt: array/struct
    /// mutations performed in-place (`arr[0] = ...`) are not visible through
    /// `global_snapshot` alone, since a global only ever holds a `HeapId`
    /// handle, so a discarded attempt must also roll the heap back before
    /// replaying (see module docs' "replay-with-memoized-answers" section).
    heap_snapshot: HeapSnapshot,
    /// Answers accepted so far, in the order their requests were first
    /// encountered (ordinal == index).
    answered: Vec<Value>,
    /// How many requests have been reached so far *in the current attempt*;
    /// reset to 0 at the start of each attempt.
    request_cursor: usize,
    /// High-water mark: commands genuinely forwarded to the sink across all
    /// attempts of this call so far.
    already_emitted: usize,
    /// Commands emitted so far *in the current attempt*; reset to 0 at the
    /// start of each attempt, compared against `already_emitted` to decide
    /// suppression.
    emitted_this_attempt: usize,
}

/// Where the program-level driver is (§4.3.2): run `setup()` once, then
/// `loop()` repeatedly up to the configured cap, then stop.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum DriverStep {
    Setup,
    Loop(u32),
    Done,
}

/// Evaluates one [`Ast`] and emits a [`Command`] stream (§4.3).
pub struct Interpreter {
    ast: Ast,
    options: InterpreterOptions,
    state: InterpreterState,
    globals: Scope,
    functions: FunctionTable,
    heap: Heap,
    emitter: CommandEmitter,
    request_alloc: RequestIdAllocator,
    response_handler: Option<Box<dyn ResponseHandler>>,

    driver_step: DriverStep,
    current_call: Option<TopLevelCall>,
    pending_request: Option<RequestId>,
    /// Per-frame control-flow intent (§4.3.3, §9); consumed at loop/switch/
    /// function boundaries, never read across a `Suspend` unwind (a
    /// suspend only ever happens mid-expression, before any enclosing
    /// statement has produced a control signal).
    control: ControlFlow,
    paused_requested: bool,
}

impl Interpreter {
    /// Constructs an interpreter over `ast`, ready for [`Interpreter::start`]
    /// (§6.3 `create`).
    #[must_use]
    pub fn new(ast: Ast, options: InterpreterOptions) -> Self {
        Self {
            ast,
            options,
            state: InterpreterState::Idle,
            globals: Scope::root(),
            functions: FunctionTable::new(),
            heap: Heap::new(),
            emitter: CommandEmitter::new(),
            request_alloc: RequestIdAllocator::new(),
            response_handler: None,
            driver_step: DriverStep::Setup,
            current_call: None,
            pending_request: None,
            control: ControlFlow::None,
            paused_requested: false,
        }
    }

    /// Registers the callback that observes every emitted command, in
    /// order (§6.3 `setCommandListener`).
    pub fn set_command_listener(&mut self, listener: impl FnMut(&crate::command::CommandRecord) + 'static) {
        self.emitter.set_listener(listener);
    }

    /// Registers the handler consulted inline when
    /// [`InterpreterOptions::synchronous_mode`] is set (§4.3.4 "optional
    /// synchronous mode... lets a mock handler supply the value inline
    /// during emission"; §6.3 `setResponseHandler`).
    pub fn set_response_handler(&mut self, handler: impl ResponseHandler + 'static) {
        self.response_handler = Some(Box::new(handler));
    }

    #[must_use]
    pub fn state(&self) -> InterpreterState {
        self.state
    }

    /// §6.3 `getState`.
    #[must_use]
    pub fn get_state(&self) -> InterpreterState {
        self.state
    }

    /// §6.3 `isRunning`: true once started and not yet in a terminal or
    /// idle state.
    #[must_use]
    pub fn is_running(&self) -> bool {
        !matches!(
            self.state,
            InterpreterState::Idle | InterpreterState::Complete | InterpreterState::Error
        )
    }

    #[must_use]
    pub fn command_history(&self) -> &[crate::command::CommandRecord] {
        self.emitter.history()
    }

    /// Begins execution (§4.3.2, §6.3 `start`). Returns `false` if the
    /// interpreter was not `Idle`.
    pub fn start(&mut self) -> bool {
        if self.state != InterpreterState::Idle {
            return false;
        }
        self.state = InterpreterState::Running;
        match self.run_prelude() {
            Ok(()) => {}
            Err(e) => {
                self.fail(e);
                return true;
            }
        }
        self.emitter.emit(Command::ProgramStart);
        log::debug!("interpreter started");
        self.drive();
        true
    }

    /// §6.3 `tick`: advances execution one bounded step. From `Idle` this
    /// is equivalent to `start()`; from `Paused` it resumes the driver;
    /// otherwise (already terminal, or waiting on a host response) it is a
    /// no-op.
    pub fn tick(&mut self) -> bool {
        match self.state {
            InterpreterState::Idle => self.start(),
            InterpreterState::Paused => {
                self.state = InterpreterState::Running;
                self.drive();
                true
            }
            _ => false,
        }
    }

    /// Requests a pause. Takes effect the next time the driver is between
    /// top-level calls (§4.3.1 `RUNNING ↔ PAUSED`); a call already in
    /// flight always runs to completion or suspension first, since the
    /// only suspension point in this evaluator is `WAITING_FOR_RESPONSE`
    /// (§5 "the sole suspension point").
    pub fn pause(&mut self) {
        self.paused_requested = true;
    }

    /// §6.3 `stop`: idempotent; transitions to an absorbing terminal state
    /// and discards any outstanding request, without emitting further
    /// commands except a final `PROGRAM_END` (§5 "Cancellation and
    /// timeouts").
    pub fn stop(&mut self) {
        if matches!(self.state, InterpreterState::Complete | InterpreterState::Error) {
            return;
        }
        self.current_call = None;
        self.pending_request = None;
        self.emitter.emit(Command::ProgramEnd);
        self.state = InterpreterState::Complete;
    }

    /// §6.3 `resumeWithValue`: supplies the value for the outstanding
    /// request. Returns `false` (a no-op, §8 idempotence law) unless the
    /// interpreter is genuinely `WAITING_FOR_RESPONSE` for this exact
    /// `request_id`.
    pub fn resume_with_value(&mut self, request_id: RequestId, value: Value) -> bool {
        if self.state != InterpreterState::WaitingForResponse {
            return false;
        }
        let Some(pending) = self.pending_request else {
            return false;
        };
        if pending != request_id {
            return false;
        }
        let Some(call) = self.current_call.as_mut() else {
            return false;
        };
        call.answered.push(value);
        self.pending_request = None;
        self.state = InterpreterState::Running;
        log::debug!("resumed with value for request {request_id}");
        self.drive();
        true
    }

    /// Raw emission, bypassing replay suppression: used for commands that
    /// happen exactly once regardless of how many attempts a top-level
    /// call needed (`PROGRAM_START`, `PROGRAM_END`, `ERROR`,
    /// `LOOP_LIMIT_REACHED`, `LOOP_ITERATION`).
    fn emit_raw(&mut self, command: Command) {
        log::trace!("emit {command:?}");
        self.emitter.emit(command);
    }

    /// Emission from inside a top-level call's body: suppressed if this
    /// exact ordinal position was already forwarded during an earlier
    /// attempt of the same call (see module docs).
    fn emit(&mut self, command: Command) {
        if let Some(call) = self.current_call.as_mut() {
            let idx = call.emitted_this_attempt;
            call.emitted_this_attempt += 1;
            if idx < call.already_emitted {
                return;
            }
        }
        self.emit_raw(command);
        if let Some(call) = self.current_call.as_mut() {
            call.already_emitted = call.emitted_this_attempt;
        }
    }

    fn fail(&mut self, error: EvalError) {
        log::warn!("evaluator error: {error}");
        let subcode = error_subcode(&error);
        self.current_call = None;
        self.pending_request = None;
        self.emitter.emit(Command::Error {
            message: error.to_string(),
            subcode: Some(subcode.to_owned()),
        });
        self.state = InterpreterState::Error;
    }

    /// §4.3.2's single prelude pass: register every `FuncDef`, then
    /// evaluate top-level `VarDecl` initializers in source order.
    fn run_prelude(&mut self) -> Result<(), EvalError> {
        let root = self.ast.root();
        let body = match &self.ast.get(root).data {
            crate::ast::NodeData::Program { body } => body.clone(),
            other => panic!("Interpreter::new expects a Program root node, found {other:?}"),
        };
        for stmt in &body {
            if let crate::ast::NodeData::FuncDef {
                return_type,
                params,
                body: fn_body,
            } = &self.ast.get(*stmt).data
            {
                let name = self
                    .ast
                    .get(*stmt)
                    .name()
                    .expect("FuncDef node must carry its name")
                    .to_owned();
                let return_type = self.ast.get(*return_type).name().unwrap_or("int").to_owned();
                let params = params
                    .iter()
                    .map(|p| {
                        let param_type = match &self.ast.get(*p).data {
                            crate::ast::NodeData::Param { param_type } => *param_type,
                            _ => panic!("FuncDef params must be Param nodes"),
                        };
                        crate::runtime::function::Param {
                            name: self.ast.get(*p).name().unwrap_or_default().to_owned(),
                            declared_type: self.ast.get(param_type).name().unwrap_or("int").to_owned(),
                        }
                    })
                    .collect();
                self.functions
                    .register(crate::runtime::FunctionRecord {
                        name,
                        return_type,
                        params,
                        body: *fn_body,
                    })
                    .map_err(|_name| EvalError::WrongArity {
                        name: "<prelude>".to_owned(),
                        expected: 0,
                        found: 0,
                    })?;
            }
        }
        for stmt in &body {
            if let crate::ast::NodeData::VarDecl { var_type, declarators } = &self.ast.get(*stmt).data {
                let var_type = *var_type;
                let declarators = declarators.clone();
                self.exec_global_var_decl(var_type, &declarators)?;
            }
        }
        Ok(())
    }

    fn exec_global_var_decl(&mut self, var_type: NodeId, declarators: &[NodeId]) -> Result<(), EvalError> {
        let type_name = self.ast.get(var_type).name().unwrap_or("int").to_owned();
        let globals = self.globals.clone();
        enum Kind {
            Scalar { initializer: Option<NodeId> },
            Array { size: NodeId },
        }
        for decl in declarators {
            let (name, kind) = match &self.ast.get(*decl).data {
                crate::ast::NodeData::Declarator { initializer } => (
                    self.ast.get(*decl).name().unwrap_or_default().to_owned(),
                    Kind::Scalar { initializer: *initializer },
                ),
                crate::ast::NodeData::ArrayDeclarator { size: Some(size) } => (
                    self.ast.get(*decl).name().unwrap_or_default().to_owned(),
                    Kind::Array { size: *size },
                ),
                _ => continue,
            };
            let value = match kind {
                Kind::Scalar { initializer } => match initializer {
                    Some(init) => match self.eval_expr(init, &globals) {
                        Ok(v) => v,
                        Err(EvalFlow::Error(e)) => return Err(e),
                        Err(EvalFlow::Suspend(_)) => {
                            // Global initializers are not part of any replayable
                            // top-level call; requesting external data here has
                            // nowhere to resume from, and is not needed by any
                            // Arduino sketch in practice (§11's scope).
                            return Err(EvalError::TypeMismatch {
                                expected: "a locally-computable initializer".to_owned(),
                                found: "an external-data request".to_owned(),
                            });
                        }
                    },
                    None => Value::zero_for_type(&type_name),
                },
                Kind::Array { size } => {
                    let len = match self.eval_expr(size, &globals) {
                        Ok(v) => usize::try_from(v.as_i64().unwrap_or(0).max(0)).unwrap_or(0),
                        Err(EvalFlow::Error(e)) => return Err(e),
                        Err(EvalFlow::Suspend(_)) => {
                            return Err(EvalError::TypeMismatch {
                                expected: "a locally-computable array size".to_owned(),
                                found: "an external-data request".to_owned(),
                            });
                        }
                    };
                    let elements = vec![Value::zero_for_type(&type_name); len];
                    let heap_id = self.heap.allocate(HeapData::Array(elements));
                    Value::Array(heap_id)
                }
            };
            globals.declare(name.clone(), value.clone());
            self.emit_raw(Command::VarSet {
                variable: name,
                value: value.display_string(),
                value_type: Some(type_name.clone()),
            });
        }
        Ok(())
    }

    /// Runs the driver loop (§4.3.2): start/continue the current step until
    /// the interpreter stops being `Running` (suspended, paused, or
    /// terminal).
    fn drive(&mut self) {
        loop {
            if self.paused_requested && self.current_call.is_none() {
                self.paused_requested = false;
                self.state = InterpreterState::Paused;
                return;
            }
            if self.state != InterpreterState::Running {
                return;
            }
            if self.current_call.is_some() {
                let name = match self.current_call.as_ref().unwrap().kind {
                    TopLevelKind::Setup => "setup",
                    TopLevelKind::Loop(_) => "loop",
                };
                match self.attempt_current_call(name) {
                    Ok(()) => self.advance_driver_step(),
                    Err(()) => return,
                }
                continue;
            }
            match self.driver_step {
                DriverStep::Setup => {
                    if self.functions.contains("setup") {
                        self.begin_call(TopLevelKind::Setup);
                    } else {
                        self.driver_step = self.step_after_setup();
                    }
                }
                DriverStep::Loop(n) => {
                    if n >= self.options.max_top_level_loop_iterations {
                        self.emit_raw(Command::LoopLimitReached {
                            message: format!(
                                "loop() iteration limit ({}) reached",
                                self.options.max_top_level_loop_iterations
                            ),
                            severity: LoopLimitSeverity::Lifecycle,
                        });
                        self.driver_step = DriverStep::Done;
                    } else {
                        self.emit_raw(Command::LoopIteration { n });
                        self.begin_call(TopLevelKind::Loop(n));
                    }
                }
                DriverStep::Done => {
                    self.emit_raw(Command::ProgramEnd);
                    self.state = InterpreterState::Complete;
                    return;
                }
            }
        }
    }

    fn step_after_setup(&self) -> DriverStep {
        if self.functions.contains("loop") {
            DriverStep::Loop(0)
        } else {
            DriverStep::Done
        }
    }

    fn advance_driver_step(&mut self) {
        self.driver_step = match self.driver_step {
            DriverStep::Setup => self.step_after_setup(),
            DriverStep::Loop(n) => DriverStep::Loop(n + 1),
            DriverStep::Done => DriverStep::Done,
        };
    }

    fn begin_call(&mut self, kind: TopLevelKind) {
        self.current_call = Some(TopLevelCall {
            kind,
            global_snapshot: self.globals.snapshot(),
            heap_snapshot: self.heap.snapshot(),
            answered: Vec::new(),
            request_cursor: 0,
            already_emitted: 0,
            emitted_this_attempt: 0,
        });
    }

    /// Runs one attempt (first or replay) of the call in `self.current_call`.
    /// `Ok(())` means the call ran to completion (its commands are final and
    /// `current_call` has been cleared); `Err(())` means it suspended or
    /// errored (state already reflects which).
    fn attempt_current_call(&mut self, name: &str) -> Result<(), ()> {
        {
            let call = self.current_call.as_mut().expect("attempt_current_call without a call");
            call.request_cursor = 0;
            call.emitted_this_attempt = 0;
            let snapshot = call.global_snapshot.clone();
            self.globals.restore(&snapshot);
            self.heap.restore(&call.heap_snapshot);
        }

        let Some(func_id) = self.functions.lookup(name) else {
            self.current_call = None;
            return Ok(());
        };
        let record = self.functions.get(func_id).clone();
        let scope = Scope::child_of(&self.globals);

        let result: EvalResult<()> = (|| {
            self.emit(Command::FunctionCall {
                function: name.to_owned(),
                arguments: None,
            });
            self.control = ControlFlow::None;
            self.exec_block(&self.body_of(record.body), &scope)?;
            self.control = ControlFlow::None;
            Ok(())
        })();

        match result {
            Ok(()) => {
                self.current_call = None;
                Ok(())
            }
            Err(EvalFlow::Suspend(id)) => {
                self.pending_request = Some(id);
                self.state = InterpreterState::WaitingForResponse;
                Err(())
            }
            Err(EvalFlow::Error(e)) => {
                self.fail(e);
                Err(())
            }
        }
    }

    fn body_of(&self, body: NodeId) -> Vec<NodeId> {
        match &self.ast.get(body).data {
            crate::ast::NodeData::Compound { body } => body.clone(),
            _ => vec![body],
        }
    }
}

/// A short machine-readable subcode for `ERROR.subcode` (§4.4, §7).
fn error_subcode(error: &EvalError) -> &'static str {
    match error {
        EvalError::UnknownIdentifier { .. } => "UNKNOWN_IDENTIFIER",
        EvalError::TypeMismatch { .. } => "TYPE_MISMATCH",
        EvalError::DivisionByZero => "DIVISION_BY_ZERO",
        EvalError::ArrayIndexOutOfBounds { .. } => "ARRAY_INDEX_OUT_OF_BOUNDS",
        EvalError::UnknownMember { .. } => "UNKNOWN_MEMBER",
        EvalError::WrongArity { .. } => "WRONG_ARITY",
        EvalError::ReturnOutsideFunction => "RETURN_OUTSIDE_FUNCTION",
        EvalError::BreakContinueOutsideLoop => "BREAK_CONTINUE_OUTSIDE_LOOP",
        EvalError::ResponseTimeout { .. } => "RESPONSE_TIMEOUT",
        EvalError::ResumeWithUnknownRequest { .. } => "RESUME_WITH_UNKNOWN_REQUEST",
    }
}
