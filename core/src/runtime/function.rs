//! Function records (§3.2, §3.3): created once during the program prelude
//! and persisted for the run's lifetime, the same "registered during a
//! single pass over top-level declarations, then read-only" lifecycle the
//! teacher gives bytecode `Function` objects.

use ahash::AHashMap;

use crate::ast::NodeId;

/// Identifies a registered function. Arduino has no closures, so unlike
/// the teacher's `FunctionId` (which indexes into a per-module table built
/// by a compiler pass) this one only ever points at a global-scope
/// definition (§3.2 "for Arduino, only global").
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct FunctionId(u32);

impl FunctionId {
    #[must_use]
    pub fn raw(self) -> u32 {
        self.0
    }
}

#[derive(Debug, Clone)]
pub struct Param {
    pub name: String,
    pub declared_type: String,
}

/// A user-defined function's immutable, prelude-registered shape.
#[derive(Debug, Clone)]
pub struct FunctionRecord {
    pub name: String,
    pub return_type: String,
    pub params: Vec<Param>,
    pub body: NodeId,
}

/// Table of every `FuncDef` registered during the program prelude
/// (§4.3.2). Lookup is by name since Arduino sketches call functions by
/// identifier, not by a pre-resolved id; `FunctionId` exists for `Value::Function`
/// to carry a cheap, stable handle once a function has been looked up once.
#[derive(Debug, Default)]
pub struct FunctionTable {
    records: Vec<FunctionRecord>,
    by_name: AHashMap<String, FunctionId>,
}

impl FunctionTable {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers a function, returning an error description if a function
    /// with the same name was already registered (Arduino sketches do not
    /// support overloading).
    pub fn register(&mut self, record: FunctionRecord) -> Result<FunctionId, String> {
        if self.by_name.contains_key(&record.name) {
            return Err(format!("function `{}` redefined", record.name));
        }
        let id = FunctionId(u32::try_from(self.records.len()).expect("too many functions"));
        self.by_name.insert(record.name.clone(), id);
        self.records.push(record);
        Ok(id)
    }

    #[must_use]
    pub fn get(&self, id: FunctionId) -> &FunctionRecord {
        &self.records[id.0 as usize]
    }

    #[must_use]
    pub fn lookup(&self, name: &str) -> Option<FunctionId> {
        self.by_name.get(name).copied()
    }

    #[must_use]
    pub fn contains(&self, name: &str) -> bool {
        self.by_name.contains_key(name)
    }
}
