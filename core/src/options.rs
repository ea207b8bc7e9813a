//! Interpreter configuration (§10.3: a builder struct, not a config file or
//! environment schema — the host embeds this crate and wires up its own
//! configuration surface around it).

/// Tunables for a single [`crate::interpreter::Interpreter`] run.
#[derive(Debug, Clone, PartialEq)]
pub struct InterpreterOptions {
    /// Cap on iterations of a `loop()`-body-level (top-level) loop before a
    /// `LOOP_LIMIT_REACHED` command is emitted and the run ends (§4.3.3).
    pub max_top_level_loop_iterations: u32,
    /// Cap on iterations of any loop nested inside a function body.
    pub max_inner_loop_iterations: u32,
    /// When true, external-data requests (`digitalRead`, `millis`, ...) block
    /// the call site until [`crate::interpreter::Interpreter::resume_with_value`]
    /// is invoked, instead of suspending the whole run into
    /// `WaitingForResponse` (§4.5, Open Question resolved in `DESIGN.md`).
    pub synchronous_mode: bool,
    /// Enables `debug!`/`trace!`-level diagnostic logging of step-by-step
    /// evaluation (§10.2); never affects the emitted command stream.
    pub verbose: bool,
}

impl Default for InterpreterOptions {
    fn default() -> Self {
        Self {
            max_top_level_loop_iterations: 3,
            max_inner_loop_iterations: 10_000,
            synchronous_mode: false,
            verbose: false,
        }
    }
}

impl InterpreterOptions {
    #[must_use]
    pub fn builder() -> InterpreterOptionsBuilder {
        InterpreterOptionsBuilder::default()
    }
}

#[derive(Debug, Clone, Default)]
pub struct InterpreterOptionsBuilder {
    options: InterpreterOptionsFields,
}

#[derive(Debug, Clone)]
struct InterpreterOptionsFields {
    max_top_level_loop_iterations: u32,
    max_inner_loop_iterations: u32,
    synchronous_mode: bool,
    verbose: bool,
}

impl Default for InterpreterOptionsFields {
    fn default() -> Self {
        let defaults = InterpreterOptions::default();
        Self {
            max_top_level_loop_iterations: defaults.max_top_level_loop_iterations,
            max_inner_loop_iterations: defaults.max_inner_loop_iterations,
            synchronous_mode: defaults.synchronous_mode,
            verbose: defaults.verbose,
        }
    }
}

impl InterpreterOptionsBuilder {
    #[must_use]
    pub fn max_top_level_loop_iterations(mut self, n: u32) -> Self {
        self.options.max_top_level_loop_iterations = n;
        self
    }

    #[must_use]
    pub fn max_inner_loop_iterations(mut self, n: u32) -> Self {
        self.options.max_inner_loop_iterations = n;
        self
    }

    #[must_use]
    pub fn synchronous_mode(mut self, on: bool) -> Self {
        self.options.synchronous_mode = on;
        self
    }

    #[must_use]
    pub fn verbose(mut self, on: bool) -> Self {
        self.options.verbose = on;
        self
    }

    #[must_use]
    pub fn build(self) -> InterpreterOptions {
        InterpreterOptions {
            max_top_level_loop_iterations: self.options.max_top_level_loop_iterations,
            max_inner_loop_iterations: self.options.max_inner_loop_iterations,
            synchronous_mode: self.options.synchronous_mode,
            verbose: self.options.verbose,
        }
    }
}
