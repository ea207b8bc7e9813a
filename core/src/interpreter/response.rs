//! The inline responder consulted in [`crate::options::InterpreterOptions::synchronous_mode`]
//! (§4.3.4, §6.3 `setResponseHandler`).

use crate::command::Command;
use crate::runtime::Value;

/// Supplies an immediate answer to an external-data request without a full
/// suspend/resume round trip. Implemented by a deterministic mock in tests
/// and by the CLI's canned responder; a host embedding outside synchronous
/// mode has no need for this at all (§4.3.4 "optional").
pub trait ResponseHandler {
    /// Returns `Some(value)` to answer `command` inline, or `None` to fall
    /// back to the ordinary suspend/`resumeWithValue` path.
    fn respond(&mut self, command: &Command) -> Option<Value>;
}

impl<F> ResponseHandler for F
where
    F: FnMut(&Command) -> Option<Value>,
{
    fn respond(&mut self, command: &Command) -> Option<Value> {
        self(command)
    }
}
