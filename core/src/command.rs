//! The Command Protocol (§4.4, §6.2): the interpreter's only externally
//! visible effect. `Command` is the closed vocabulary of emitted records;
//! `CommandEmitter` is the sink the interpreter pushes them through.
//!
//! Modeled after the teacher's callback-based observation points
//! (`run.rs`'s event hooks) rather than a channel: the host registers a
//! listener closure once, and every command is delivered synchronously as
//! it's produced, in emission order, with no buffering the interpreter
//! itself needs to reason about.

use serde::Serialize;

use crate::runtime::request::RequestId;

/// A pin mode, as passed to `pinMode()` and reported in `PIN_MODE` (§11).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum PinMode {
    Input,
    Output,
    InputPullup,
}

/// Severity marker for a loop-limit command: only the *top-level* `loop()`
/// driver's cap is a normal lifecycle transition; caps on loops nested
/// inside functions are reported as warnings (§4.3.3, §12 Open Question i).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum LoopLimitSeverity {
    Lifecycle,
    Warning,
}

/// One record in the command stream (§4.4). `timestamp` is carried
/// out-of-band by [`CommandEmitter`] rather than on every variant, since it
/// is a cross-cutting concern (and is normalized away for equivalence
/// checks regardless, per §4.4/§8).
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "type")]
pub enum Command {
    #[serde(rename = "PROGRAM_START")]
    ProgramStart,
    #[serde(rename = "PROGRAM_END")]
    ProgramEnd,
    #[serde(rename = "ERROR")]
    Error {
        message: String,
        subcode: Option<String>,
    },
    #[serde(rename = "LOOP_LIMIT_REACHED")]
    LoopLimitReached {
        message: String,
        severity: LoopLimitSeverity,
    },

    #[serde(rename = "PIN_MODE")]
    PinMode { pin: i32, mode: PinMode },
    #[serde(rename = "DIGITAL_WRITE")]
    DigitalWrite { pin: i32, value: u8 },

    #[serde(rename = "ANALOG_READ_REQUEST")]
    AnalogReadRequest { pin: i32, request_id: RequestId },
    #[serde(rename = "DIGITAL_READ_REQUEST")]
    DigitalReadRequest { pin: i32, request_id: RequestId },
    #[serde(rename = "MILLIS_REQUEST")]
    MillisRequest { request_id: RequestId },
    #[serde(rename = "MICROS_REQUEST")]
    MicrosRequest { request_id: RequestId },
    #[serde(rename = "LIBRARY_METHOD_REQUEST")]
    LibraryMethodRequest {
        object: String,
        method: String,
        args: Vec<String>,
        request_id: RequestId,
    },

    #[serde(rename = "SERIAL_BEGIN")]
    SerialBegin { baud_rate: u32 },
    #[serde(rename = "SERIAL_PRINT")]
    SerialPrint { data: String },
    #[serde(rename = "SERIAL_PRINTLN")]
    SerialPrintln { data: String },

    #[serde(rename = "DELAY")]
    Delay { duration: u64 },
    #[serde(rename = "DELAY_MICROSECONDS")]
    DelayMicroseconds { duration: u64 },

    #[serde(rename = "VAR_SET")]
    VarSet {
        variable: String,
        value: String,
        #[serde(rename = "type", skip_serializing_if = "Option::is_none")]
        value_type: Option<String>,
    },

    #[serde(rename = "FUNCTION_CALL")]
    FunctionCall {
        function: String,
        #[serde(skip_serializing_if = "Option::is_none")]
        arguments: Option<Vec<String>>,
    },
    #[serde(rename = "LOOP_ITERATION")]
    LoopIteration { n: u32 },
}

impl Command {
    /// True for the three commands allowed to end a stream (§8 invariant 3).
    #[must_use]
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::ProgramEnd | Self::Error { .. })
    }

    /// True for commands that suspend the run awaiting `resumeWithValue`
    /// (§4.3.4, §8 invariant 4).
    #[must_use]
    pub fn is_request(&self) -> bool {
        matches!(
            self,
            Self::AnalogReadRequest { .. }
                | Self::DigitalReadRequest { .. }
                | Self::MillisRequest { .. }
                | Self::MicrosRequest { .. }
                | Self::LibraryMethodRequest { .. }
        )
    }

    /// The `requestId` a request-class command carries, if any.
    #[must_use]
    pub fn request_id(&self) -> Option<RequestId> {
        match self {
            Self::AnalogReadRequest { request_id, .. }
            | Self::DigitalReadRequest { request_id, .. }
            | Self::MillisRequest { request_id }
            | Self::MicrosRequest { request_id }
            | Self::LibraryMethodRequest { request_id, .. } => Some(*request_id),
            _ => None,
        }
    }
}

/// A single timestamped entry in the emitted stream, the unit the host
/// actually observes (§4.4's `{type, timestamp, ...payload}` record shape).
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CommandRecord {
    pub timestamp: u64,
    #[serde(flatten)]
    pub command: Command,
}

/// Sink the interpreter pushes commands through. The default
/// implementation used when no listener is registered is a `Vec` buffer
/// (`VecCommandSink`), matching how the teacher's `run.rs` collects
/// instrumentation events when nothing else is listening.
pub trait CommandSink {
    fn emit(&mut self, record: CommandRecord);
}

/// Monotonic logical clock plus listener dispatch for emitted commands.
/// `tick()` is a simple incrementing counter rather than a wall-clock read:
/// determinism (§8 invariant 2) requires the same AST and inputs to always
/// produce the same normalized stream, and wall-clock timestamps would
/// defeat that before normalization even applies.
pub struct CommandEmitter {
    clock: u64,
    listener: Option<Box<dyn FnMut(&CommandRecord)>>,
    history: Vec<CommandRecord>,
}

impl std::fmt::Debug for CommandEmitter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CommandEmitter")
            .field("clock", &self.clock)
            .field("history_len", &self.history.len())
            .finish_non_exhaustive()
    }
}

impl Default for CommandEmitter {
    fn default() -> Self {
        Self {
            clock: 0,
            listener: None,
            history: Vec::new(),
        }
    }
}

impl CommandEmitter {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set_listener(&mut self, listener: impl FnMut(&CommandRecord) + 'static) {
        self.listener = Some(Box::new(listener));
    }

    /// Pushes `command` onto the stream. Panics if a terminal command has
    /// already been emitted (§8 invariant 3 is an interpreter-internal
    /// contract, violating it is a bug in the evaluator, not host input).
    pub fn emit(&mut self, command: Command) {
        if let Some(last) = self.history.last() {
            assert!(
                !last.command.is_terminal(),
                "attempted to emit a command after a terminal command"
            );
        }
        let record = CommandRecord {
            timestamp: self.clock,
            command,
        };
        self.clock += 1;
        if let Some(listener) = &mut self.listener {
            listener(&record);
        }
        self.history.push(record);
    }

    #[must_use]
    pub fn history(&self) -> &[CommandRecord] {
        &self.history
    }
}
