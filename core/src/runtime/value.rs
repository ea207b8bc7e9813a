//! The runtime `Value` (§3.2): a tagged union evaluation produces, distinct
//! from [`crate::ast::Literal`] (which is what the *tree* carries before
//! anything has run).
//!
//! Follows the teacher's immediate-vs-heap split (`Value::Ref(HeapId)` in
//! `value.rs`): small values are stored inline, and only the two
//! genuinely-shared, genuinely-mutable shapes (arrays and structs) live in
//! [`crate::runtime::heap::Heap`] and are referenced by id. Strings are
//! immediate but `Rc`-backed rather than an owned `String`, since a `Value`
//! clone (passing an argument, storing into a scope) should be O(1) the way
//! cloning an immediate `Value` is in the teacher's enum.

use std::rc::Rc;

use crate::runtime::heap::HeapId;

/// One Arduino-sketch runtime value (§3.2).
#[derive(Debug, Clone)]
pub enum Value {
    Void,
    Bool(bool),
    Int32(i32),
    UInt32(u32),
    Int64(i64),
    UInt64(u64),
    Double(f64),
    String(Rc<str>),
    /// Reference to a heap-allocated array (§11 array support).
    Array(HeapId),
    /// Reference to a heap-allocated struct instance (§11 struct support).
    Struct(HeapId),
    /// An opaque address-like value; Arduino sketches rarely construct
    /// these directly but `PointerDeclarator`-typed parameters need a slot.
    Pointer(u64),
    /// Reference to a user-defined function, for function-pointer-typed
    /// variables and callbacks.
    Function(crate::runtime::function::FunctionId),
}

impl Value {
    #[must_use]
    pub fn type_name(&self) -> &'static str {
        match self {
            Self::Void => "void",
            Self::Bool(_) => "bool",
            Self::Int32(_) => "int32",
            Self::UInt32(_) => "uint32",
            Self::Int64(_) => "int64",
            Self::UInt64(_) => "uint64",
            Self::Double(_) => "double",
            Self::String(_) => "string",
            Self::Array(_) => "array",
            Self::Struct(_) => "struct",
            Self::Pointer(_) => "pointer",
            Self::Function(_) => "function",
        }
    }

    /// C-style truthiness: 0/0.0/false/empty-pointer are falsy, everything
    /// else (including non-empty strings and any array/struct/function
    /// reference) is truthy (§4.3.3 integer↔bool conversion).
    #[must_use]
    pub fn is_truthy(&self) -> bool {
        match self {
            Self::Void => false,
            Self::Bool(b) => *b,
            Self::Int32(v) => *v != 0,
            Self::UInt32(v) => *v != 0,
            Self::Int64(v) => *v != 0,
            Self::UInt64(v) => *v != 0,
            Self::Double(v) => *v != 0.0,
            Self::String(s) => !s.is_empty(),
            Self::Pointer(p) => *p != 0,
            Self::Array(_) | Self::Struct(_) | Self::Function(_) => true,
        }
    }

    /// Widens an integral or bool value to `i64`, per C integer promotion
    /// (§4.3.3). Returns `None` for non-integral values.
    #[must_use]
    pub fn as_i64(&self) -> Option<i64> {
        match *self {
            Self::Bool(b) => Some(i64::from(b)),
            Self::Int32(v) => Some(i64::from(v)),
            Self::UInt32(v) => Some(i64::from(v)),
            Self::Int64(v) => Some(v),
            Self::UInt64(v) => i64::try_from(v).ok(),
            _ => None,
        }
    }

    /// Widens a numeric value to `f64` (§4.3.3 integer↔float conversion).
    #[must_use]
    pub fn as_f64(&self) -> Option<f64> {
        match *self {
            Self::Double(v) => Some(v),
            _ => self.as_i64().map(|v| v as f64),
        }
    }

    #[must_use]
    pub fn is_numeric(&self) -> bool {
        matches!(
            self,
            Self::Bool(_) | Self::Int32(_) | Self::UInt32(_) | Self::Int64(_) | Self::UInt64(_) | Self::Double(_)
        )
    }

    /// The zero value for a declared type name, used when a non-void
    /// function falls off the end of its body without a `return`
    /// (§4.3.3 function call semantics) and for default-initializing
    /// declared-but-uninitialized variables.
    #[must_use]
    pub fn zero_for_type(type_name: &str) -> Self {
        match type_name {
            "void" => Self::Void,
            "bool" | "boolean" => Self::Bool(false),
            "float" | "double" => Self::Double(0.0),
            "unsigned int" | "unsigned" | "uint32_t" | "word" => Self::UInt32(0),
            "long long" | "int64_t" => Self::Int64(0),
            "unsigned long long" | "uint64_t" => Self::UInt64(0),
            "String" | "string" | "char*" => Self::String(Rc::from("")),
            _ => Self::Int32(0),
        }
    }

    /// Renders a value the way `VAR_SET`/`SERIAL_PRINT`/`SERIAL_PRINTLN`
    /// payloads do: plain textual form, no type annotation (§6.2).
    #[must_use]
    pub fn display_string(&self) -> String {
        match self {
            Self::Void => String::new(),
            Self::Bool(b) => b.to_string(),
            Self::Int32(v) => v.to_string(),
            Self::UInt32(v) => v.to_string(),
            Self::Int64(v) => v.to_string(),
            Self::UInt64(v) => v.to_string(),
            Self::Double(v) => v.to_string(),
            Self::String(s) => s.to_string(),
            Self::Array(id) | Self::Struct(id) => format!("#{}", id.raw()),
            Self::Pointer(p) => format!("0x{p:x}"),
            Self::Function(id) => format!("<function {}>", id.raw()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn truthiness_matches_c_semantics() {
        assert!(!Value::Int32(0).is_truthy());
        assert!(Value::Int32(1).is_truthy());
        assert!(!Value::Double(0.0).is_truthy());
        assert!(!Value::String(Rc::from("")).is_truthy());
        assert!(Value::String(Rc::from("x")).is_truthy());
    }

    #[test]
    fn zero_for_type_matches_declared_width() {
        assert!(matches!(Value::zero_for_type("void"), Value::Void));
        assert!(matches!(Value::zero_for_type("bool"), Value::Bool(false)));
        assert!(matches!(Value::zero_for_type("float"), Value::Double(v) if v == 0.0));
        assert!(matches!(Value::zero_for_type("int"), Value::Int32(0)));
    }
}
