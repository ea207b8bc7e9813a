//! `sketch_core`: the CompactAST codec, tree-walking interpreter, and
//! command protocol for Arduino-sketch ASTs.
//!
//! This crate is the CORE described by the specification: it consumes an
//! already-parsed [`ast::Ast`] (built directly or decoded from
//! [`compact_ast`] bytes) and evaluates it with [`interpreter::Interpreter`],
//! whose only externally observable effect is the [`command`] stream it
//! emits. Source parsing, the preprocessor, board descriptions, and any
//! host UI are deliberately out of scope (see `spec.md` §1) and live
//! outside this crate.

pub mod ast;
pub mod command;
pub mod compact_ast;
pub mod error;
pub mod interpreter;
pub mod options;
pub mod runtime;

pub use ast::{Ast, AstNode, NodeData, NodeId};
pub use command::{Command, CommandRecord};
pub use error::{EvalError, FormatError};
pub use interpreter::{Interpreter, InterpreterState};
pub use options::InterpreterOptions;
