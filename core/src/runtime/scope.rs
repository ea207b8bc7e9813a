//! Lexical scope chain (§3.2, §3.3): created on entry to a block, function
//! call, or `for`-loop header, and destroyed on every exit path including
//! exceptional ones (an ordinary drop in Rust handles that for free, unlike
//! the teacher's namespace-slot-reuse bookkeeping, which exists to avoid
//! reallocating namespaces across frames in a bytecode VM — a tree-walker
//! has no such hot path to optimize).

use std::cell::RefCell;
use std::rc::Rc;

use ahash::AHashMap;

use crate::error::EvalError;
use crate::runtime::value::Value;

#[derive(Debug, Default)]
struct ScopeInner {
    bindings: AHashMap<String, Value>,
    parent: Option<Scope>,
}

/// A reference-counted scope frame. Cloning a `Scope` clones the handle,
/// not the bindings, so capturing "the defining scope" on a function record
/// (§3.2) is cheap.
#[derive(Debug, Clone, Default)]
pub struct Scope(Rc<RefCell<ScopeInner>>);

impl Scope {
    #[must_use]
    pub fn root() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn child_of(parent: &Scope) -> Self {
        Self(Rc::new(RefCell::new(ScopeInner {
            bindings: AHashMap::new(),
            parent: Some(parent.clone()),
        })))
    }

    /// Binds `name` in *this* frame, shadowing any outer binding of the
    /// same name (declaration semantics, not assignment).
    pub fn declare(&self, name: impl Into<String>, value: Value) {
        self.0.borrow_mut().bindings.insert(name.into(), value);
    }

    #[must_use]
    pub fn get(&self, name: &str) -> Option<Value> {
        let inner = self.0.borrow();
        if let Some(value) = inner.bindings.get(name) {
            return Some(value.clone());
        }
        inner.parent.as_ref().and_then(|parent| parent.get(name))
    }

    /// Assigns to the nearest enclosing binding of `name` (lvalue
    /// assignment, §4.3.3), walking outward until found.
    pub fn assign(&self, name: &str, value: Value) -> Result<(), EvalError> {
        let mut inner = self.0.borrow_mut();
        if let Some(slot) = inner.bindings.get_mut(name) {
            *slot = value;
            return Ok(());
        }
        let parent = inner.parent.clone();
        drop(inner);
        match parent {
            Some(parent) => parent.assign(name, value),
            None => Err(EvalError::UnknownIdentifier {
                name: name.to_owned(),
            }),
        }
    }

    #[must_use]
    pub fn contains(&self, name: &str) -> bool {
        let inner = self.0.borrow();
        inner.bindings.contains_key(name)
            || inner.parent.as_ref().is_some_and(|parent| parent.contains(name))
    }

    /// Copies every binding in *this* frame (not any parent). Used by the
    /// interpreter to snapshot global scope before a (re-)attempt of a
    /// top-level call, so a suspended call can be replayed from the same
    /// starting state (see `interpreter::TopLevelCall`).
    #[must_use]
    pub fn snapshot(&self) -> AHashMap<String, Value> {
        self.0.borrow().bindings.clone()
    }

    /// Overwrites this frame's bindings with `snapshot`, discarding any
    /// bindings this frame gained since the snapshot was taken.
    pub fn restore(&self, snapshot: &AHashMap<String, Value>) {
        self.0.borrow_mut().bindings = snapshot.clone();
    }
}
