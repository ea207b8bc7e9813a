//! Error types for construction-time failures.
//!
//! [`FormatError`] covers CompactAST decode failures (§4.2.2, §8 invariant
//! 5): these are returned as `Result::Err` because there is no partially
//! built interpreter yet to report them through. [`EvalError`] covers
//! failures discovered while walking the tree; note these are *not*
//! generally returned to callers as `Result::Err` — the interpreter catches
//! them internally, emits an `ERROR` command, and transitions to
//! [`crate::interpreter::InterpreterState::Error`] (§4.5, §6.2). The enum
//! still exists as a typed `Result::Err` so `eval` functions read the same
//! way the teacher's functions do (`?` throughout), rather than each one
//! hand-rolling its own failure signaling.

use thiserror::Error;

/// CompactAST decode failure (§4.2.2).
#[derive(Debug, Error, PartialEq, Eq)]
pub enum FormatError {
    #[error("bad magic bytes: expected b\"ASTP\", found {found:08X}")]
    InvalidMagic { found: u32 },

    #[error("unsupported CompactAST version {found:04X}, expected 0x0100")]
    UnsupportedVersion { found: u16 },

    #[error("buffer truncated: needed {needed} more byte(s) at offset {offset}")]
    TruncatedBuffer { offset: usize, needed: usize },

    #[error("string table corrupt at offset {offset}: {reason}")]
    CorruptStringTable { offset: usize, reason: String },

    #[error("node {index} has unrecognized type byte {byte:#04X}")]
    InvalidNodeType { index: usize, byte: u8 },

    #[error("node {index} references child index {child} which is out of range (node count {node_count})")]
    ChildIndexOutOfRange {
        index: usize,
        child: u32,
        node_count: usize,
    },

    #[error("node {index} lists node 0 (the root) as a child, which is never permitted")]
    RootUsedAsChild { index: usize },
}

/// A failure discovered while evaluating the tree (§4.3, §4.5).
///
/// `LoopIterationCapExceeded`/`LoopLimitReached` are deliberately absent:
/// per §4.3.3 and §6.2 they are ordinary control events communicated as a
/// `LOOP_LIMIT_REACHED` command, not interpreter errors.
#[derive(Debug, Error, Clone, PartialEq)]
pub enum EvalError {
    #[error("unknown identifier `{name}`")]
    UnknownIdentifier { name: String },

    #[error("type mismatch: expected {expected}, found {found}")]
    TypeMismatch { expected: String, found: String },

    #[error("division by zero")]
    DivisionByZero,

    #[error("array index {index} out of bounds for length {len}")]
    ArrayIndexOutOfBounds { index: i64, len: usize },

    #[error("unknown member `{member}` on `{type_name}`")]
    UnknownMember { type_name: String, member: String },

    #[error("`{name}` expects {expected} argument(s), got {found}")]
    WrongArity {
        name: String,
        expected: usize,
        found: usize,
    },

    #[error("`return` used outside of a function body")]
    ReturnOutsideFunction,

    #[error("`break`/`continue` used outside of a loop")]
    BreakContinueOutsideLoop,

    #[error("timed out waiting for a response to request {request_id}")]
    ResponseTimeout { request_id: u64 },

    #[error("resumeWithValue referenced unknown or already-resolved request {request_id}")]
    ResumeWithUnknownRequest { request_id: u64 },
}
