//! Statement and expression evaluation (§4.3.3): one method per node
//! family, operating directly on [`crate::ast::NodeData`] rather than
//! through [`crate::ast::AstVisitor`] — a plain recursive `match` reads
//! more directly next to the suspend/replay bookkeeping in `mod.rs`, and
//! every arm still needs `&mut Interpreter` and a [`Scope`] rather than the
//! single `Output` type the visitor trait assumes.

use std::rc::Rc;

use crate::ast::{AssignOperator, BinaryOperator, Literal, NodeData, NodeId, UnaryOperator};
use crate::command::Command;
use crate::error::EvalError;
use crate::runtime::{ControlFlow, HeapData, Scope, Value};

use super::{EvalFlow, EvalResult, Interpreter};

/// An lvalue resolved enough to be read or written without re-evaluating
/// its sub-expressions twice (§4.3.3 "`a` evaluated once for address
/// purposes").
enum Lvalue {
    Identifier(String),
    ArrayElement(crate::runtime::HeapId, usize),
    StructField(crate::runtime::HeapId, String),
}

impl Interpreter {
    /// Executes a sequence of statements in `scope`, stopping early if a
    /// control signal starts interrupting the block (§4.3.3, §9).
    pub(super) fn exec_block(&mut self, stmts: &[NodeId], scope: &Scope) -> EvalResult<()> {
        for stmt in stmts {
            self.exec_stmt(*stmt, scope)?;
            if self.control.interrupts_block() {
                break;
            }
        }
        Ok(())
    }

    pub(super) fn exec_stmt(&mut self, id: NodeId, scope: &Scope) -> EvalResult<()> {
        let data = self.ast.get(id).data.clone();
        match data {
            NodeData::ExpressionStmt { expr } => {
                self.eval_expr(expr, scope)?;
                Ok(())
            }
            NodeData::Compound { body } => {
                let inner = Scope::child_of(scope);
                self.exec_block(&body, &inner)
            }
            NodeData::If {
                condition,
                consequent,
                alternate,
            } => {
                let cond = self.eval_expr(condition, scope)?;
                if cond.is_truthy() {
                    self.exec_stmt(consequent, scope)
                } else if let Some(alt) = alternate {
                    self.exec_stmt(alt, scope)
                } else {
                    Ok(())
                }
            }
            NodeData::While { condition, body } => self.exec_while(condition, body, scope),
            NodeData::DoWhile { condition, body } => self.exec_do_while(condition, body, scope),
            NodeData::For {
                init,
                condition,
                increment,
                body,
            } => self.exec_for(init, condition, increment, body, scope),
            NodeData::RangeFor { binding, iterable, body } => self.exec_range_for(binding, iterable, body, scope),
            NodeData::Switch { discriminant, cases } => self.exec_switch(discriminant, &cases, scope),
            NodeData::Return { value } => {
                let v = match value {
                    Some(expr) => self.eval_expr(expr, scope)?,
                    None => Value::Void,
                };
                self.control = ControlFlow::Return(v);
                Ok(())
            }
            NodeData::Break => {
                self.control = ControlFlow::Break;
                Ok(())
            }
            NodeData::Continue => {
                self.control = ControlFlow::Continue;
                Ok(())
            }
            NodeData::Empty | NodeData::Comment | NodeData::ErrorNode => Ok(()),
            NodeData::VarDecl { var_type, declarators } => self.exec_var_decl(var_type, &declarators, scope),
            NodeData::FuncDef { .. } | NodeData::FuncDecl { .. } | NodeData::StructDecl { .. } | NodeData::TypedefDecl { .. } => {
                // Declarations are handled once, in the program prelude
                // (§4.3.2); encountering one mid-body (nested functions are
                // not part of Arduino's language subset) is a no-op.
                Ok(())
            }
            other => Err(EvalFlow::Error(EvalError::TypeMismatch {
                expected: "a statement".to_owned(),
                found: format!("{other:?}"),
            })),
        }
    }

    fn exec_var_decl(&mut self, var_type: NodeId, declarators: &[NodeId], scope: &Scope) -> EvalResult<()> {
        let type_name = self.ast.get(var_type).name().unwrap_or("int").to_owned();
        enum Kind {
            Scalar { initializer: Option<NodeId> },
            Array { size: NodeId },
        }
        for decl in declarators {
            let (name, kind) = match &self.ast.get(*decl).data {
                NodeData::Declarator { initializer } => (
                    self.ast.get(*decl).name().unwrap_or_default().to_owned(),
                    Kind::Scalar { initializer: *initializer },
                ),
                NodeData::ArrayDeclarator { size: Some(size) } => (
                    self.ast.get(*decl).name().unwrap_or_default().to_owned(),
                    Kind::Array { size: *size },
                ),
                _ => continue,
            };
            let value = match kind {
                Kind::Scalar { initializer } => match initializer {
                    Some(init) => self.eval_expr(init, scope)?,
                    None => Value::zero_for_type(&type_name),
                },
                Kind::Array { size } => {
                    let len_value = self.eval_expr(size, scope)?;
                    let len = usize::try_from(len_value.as_i64().unwrap_or(0).max(0)).unwrap_or(0);
                    let elements = vec![Value::zero_for_type(&type_name); len];
                    Value::Array(self.heap.allocate(HeapData::Array(elements)))
                }
            };
            scope.declare(name.clone(), value.clone());
            self.emit(Command::VarSet {
                variable: name,
                value: value.display_string(),
                value_type: Some(type_name.clone()),
            });
        }
        Ok(())
    }

    fn exec_while(&mut self, condition: NodeId, body: NodeId, scope: &Scope) -> EvalResult<()> {
        let mut iterations = 0u32;
        loop {
            if !self.eval_expr(condition, scope)?.is_truthy() {
                break;
            }
            if iterations >= self.options.max_inner_loop_iterations {
                self.emit_inner_loop_limit();
                break;
            }
            iterations += 1;
            self.exec_stmt(body, scope)?;
            if self.consume_loop_control() {
                break;
            }
        }
        Ok(())
    }

    fn exec_do_while(&mut self, condition: NodeId, body: NodeId, scope: &Scope) -> EvalResult<()> {
        let mut iterations = 0u32;
        loop {
            iterations += 1;
            self.exec_stmt(body, scope)?;
            if self.consume_loop_control() {
                break;
            }
            if iterations >= self.options.max_inner_loop_iterations {
                self.emit_inner_loop_limit();
                break;
            }
            if !self.eval_expr(condition, scope)?.is_truthy() {
                break;
            }
        }
        Ok(())
    }

    fn exec_for(
        &mut self,
        init: Option<NodeId>,
        condition: Option<NodeId>,
        increment: Option<NodeId>,
        body: NodeId,
        scope: &Scope,
    ) -> EvalResult<()> {
        let loop_scope = Scope::child_of(scope);
        if let Some(init) = init {
            self.exec_stmt(init, &loop_scope)?;
        }
        let mut iterations = 0u32;
        loop {
            if let Some(cond) = condition {
                if !self.eval_expr(cond, &loop_scope)?.is_truthy() {
                    break;
                }
            }
            if iterations >= self.options.max_inner_loop_iterations {
                self.emit_inner_loop_limit();
                break;
            }
            iterations += 1;
            self.exec_stmt(body, &loop_scope)?;
            if self.consume_loop_control() {
                break;
            }
            if let Some(incr) = increment {
                self.eval_expr(incr, &loop_scope)?;
            }
        }
        Ok(())
    }

    fn exec_range_for(&mut self, binding: NodeId, iterable: NodeId, body: NodeId, scope: &Scope) -> EvalResult<()> {
        let name = self.ast.get(binding).name().unwrap_or_default().to_owned();
        let iterable_value = self.eval_expr(iterable, scope)?;
        let items: Vec<Value> = match &iterable_value {
            Value::String(s) => s.chars().map(|c| Value::Int32(c as i32)).collect(),
            Value::Array(id) => match self.heap.get(*id) {
                HeapData::Array(elements) => elements.clone(),
                HeapData::Struct { .. } => {
                    return Err(EvalFlow::Error(EvalError::TypeMismatch {
                        expected: "an array".to_owned(),
                        found: "struct".to_owned(),
                    }))
                }
            },
            other if other.as_i64().is_some() => {
                let n = other.as_i64().unwrap_or(0);
                (0..n.max(0)).map(|i| Value::Int64(i)).collect()
            }
            other => {
                return Err(EvalFlow::Error(EvalError::TypeMismatch {
                    expected: "a string, array, or integer".to_owned(),
                    found: other.type_name().to_owned(),
                }))
            }
        };
        let mut iterations = 0u32;
        for item in items {
            if iterations >= self.options.max_inner_loop_iterations {
                self.emit_inner_loop_limit();
                break;
            }
            iterations += 1;
            let loop_scope = Scope::child_of(scope);
            loop_scope.declare(name.clone(), item);
            self.exec_stmt(body, &loop_scope)?;
            if self.consume_loop_control() {
                break;
            }
        }
        Ok(())
    }

    /// Consumes a `Break`/`Continue` signal at the loop boundary (§4.3.3,
    /// §9): `Break` stops the loop, `Continue` just stops this iteration,
    /// anything else (`Return`, or `None`) is left alone for an outer
    /// construct (function call / nothing) to see.
    fn consume_loop_control(&mut self) -> bool {
        match self.control {
            ControlFlow::Break => {
                self.control = ControlFlow::None;
                true
            }
            ControlFlow::Continue => {
                self.control = ControlFlow::None;
                false
            }
            ControlFlow::Return(_) => true,
            ControlFlow::None => false,
        }
    }

    fn emit_inner_loop_limit(&mut self) {
        self.emit(Command::LoopLimitReached {
            message: format!("inner loop iteration limit ({}) reached", self.options.max_inner_loop_iterations),
            severity: crate::command::LoopLimitSeverity::Warning,
        });
    }

    fn exec_switch(&mut self, discriminant: NodeId, cases: &[NodeId], scope: &Scope) -> EvalResult<()> {
        let disc = self.eval_expr(discriminant, scope)?;
        let mut case_bodies = Vec::with_capacity(cases.len());
        let mut default_index = None;
        let mut match_index = None;
        for (i, case) in cases.iter().enumerate() {
            let (test, body) = match &self.ast.get(*case).data {
                NodeData::Case { test, body } => (*test, body.clone()),
                _ => continue,
            };
            case_bodies.push(body);
            match test {
                None => default_index = default_index.or(Some(i)),
                Some(test_expr) => {
                    if match_index.is_none() {
                        let test_val = self.eval_expr(test_expr, scope)?;
                        if values_equal(&disc, &test_val) {
                            match_index = Some(i);
                        }
                    }
                }
            }
        }
        let start = match match_index.or(default_index) {
            Some(i) => i,
            None => return Ok(()),
        };
        let switch_scope = Scope::child_of(scope);
        for body in &case_bodies[start..] {
            self.exec_block(body, &switch_scope)?;
            match self.control {
                ControlFlow::Break => {
                    self.control = ControlFlow::None;
                    break;
                }
                ControlFlow::None => {}
                ControlFlow::Continue | ControlFlow::Return(_) => break,
            }
        }
        Ok(())
    }

    pub(super) fn eval_expr(&mut self, id: NodeId, scope: &Scope) -> EvalResult<Value> {
        let data = self.ast.get(id).data.clone();
        match data {
            NodeData::BinaryOp { left, right } => self.eval_binary_op(id, left, right, scope),
            NodeData::UnaryOp { operand, prefix } => self.eval_unary_op(id, operand, prefix, scope),
            NodeData::Postfix { operand } => self.eval_postfix(id, operand, scope),
            NodeData::Assignment { target, value } => self.eval_assignment(id, target, value, scope),
            NodeData::FuncCall { callee, args } => self.eval_func_call(callee, &args, scope),
            NodeData::MemberAccess { object, property } => self.eval_member_access(object, property, scope),
            NodeData::ArrayAccess { array, index } => {
                let (heap_id, idx) = self.resolve_array_access(array, index, scope)?;
                self.array_get(heap_id, idx)
            }
            NodeData::ConstructorCall { type_name, args } => self.eval_constructor_call(type_name, &args, scope),
            NodeData::Ternary {
                condition,
                consequent,
                alternate,
            } => {
                if self.eval_expr(condition, scope)?.is_truthy() {
                    self.eval_expr(consequent, scope)
                } else {
                    self.eval_expr(alternate, scope)
                }
            }
            NodeData::Comma { items } => {
                let mut last = Value::Void;
                for item in items {
                    last = self.eval_expr(item, scope)?;
                }
                Ok(last)
            }
            NodeData::ArrayInit { elements } => {
                let mut values = Vec::with_capacity(elements.len());
                for el in elements {
                    values.push(self.eval_expr(el, scope)?);
                }
                Ok(Value::Array(self.heap.allocate(HeapData::Array(values))))
            }
            NodeData::NameRef => {
                let name = self.ast.get(id).name().unwrap_or_default();
                self.eval_name_ref(name, scope)
            }
            NodeData::Leaf => Ok(literal_to_value(self.ast.get(id).value.as_ref())),
            other => Err(EvalFlow::Error(EvalError::TypeMismatch {
                expected: "an expression".to_owned(),
                found: format!("{other:?}"),
            })),
        }
    }

    /// Resolves a bare name reference: a local/global variable if bound,
    /// otherwise an Arduino constant (`HIGH`, `A0`, ...), otherwise a
    /// first-class reference to a registered function.
    fn eval_name_ref(&mut self, name: &str, scope: &Scope) -> EvalResult<Value> {
        if let Some(v) = scope.get(name) {
            return Ok(v);
        }
        if let Some(v) = super::builtins::constant(name) {
            return Ok(v);
        }
        if let Some(id) = self.functions.lookup(name) {
            return Ok(Value::Function(id));
        }
        Err(EvalFlow::Error(EvalError::UnknownIdentifier { name: name.to_owned() }))
    }

    fn eval_binary_op(&mut self, id: NodeId, left: NodeId, right: NodeId, scope: &Scope) -> EvalResult<Value> {
        let op = self
            .ast
            .get(id)
            .binary_operator()
            .expect("BinaryOp node must carry a valid operator literal");
        match op {
            BinaryOperator::LogAnd => {
                let l = self.eval_expr(left, scope)?;
                if !l.is_truthy() {
                    return Ok(Value::Bool(false));
                }
                let r = self.eval_expr(right, scope)?;
                Ok(Value::Bool(r.is_truthy()))
            }
            BinaryOperator::LogOr => {
                let l = self.eval_expr(left, scope)?;
                if l.is_truthy() {
                    return Ok(Value::Bool(true));
                }
                let r = self.eval_expr(right, scope)?;
                Ok(Value::Bool(r.is_truthy()))
            }
            _ => {
                let l = self.eval_expr(left, scope)?;
                let r = self.eval_expr(right, scope)?;
                apply_binary(op, &l, &r).map_err(EvalFlow::Error)
            }
        }
    }

    fn eval_unary_op(&mut self, id: NodeId, operand: NodeId, prefix: bool, scope: &Scope) -> EvalResult<Value> {
        let op = self
            .ast
            .get(id)
            .unary_operator()
            .expect("UnaryOp node must carry a valid operator literal");
        if prefix && matches!(op, UnaryOperator::Inc | UnaryOperator::Dec) {
            let lvalue = self.resolve_lvalue(operand, scope)?;
            let current = self.read_lvalue(&lvalue, scope)?;
            let delta = if op == UnaryOperator::Inc { 1 } else { -1 };
            let updated = numeric_step(&current, delta).map_err(EvalFlow::Error)?;
            self.write_lvalue(&lvalue, scope, updated.clone())?;
            return Ok(updated);
        }
        let v = self.eval_expr(operand, scope)?;
        apply_unary(op, &v).map_err(EvalFlow::Error)
    }

    fn eval_postfix(&mut self, id: NodeId, operand: NodeId, scope: &Scope) -> EvalResult<Value> {
        let op = self
            .ast
            .get(id)
            .unary_operator()
            .expect("Postfix node must carry a valid operator literal");
        let lvalue = self.resolve_lvalue(operand, scope)?;
        let current = self.read_lvalue(&lvalue, scope)?;
        let delta = if op == UnaryOperator::Inc { 1 } else { -1 };
        let updated = numeric_step(&current, delta).map_err(EvalFlow::Error)?;
        self.write_lvalue(&lvalue, scope, updated)?;
        Ok(current)
    }

    fn eval_assignment(&mut self, id: NodeId, target: NodeId, value: NodeId, scope: &Scope) -> EvalResult<Value> {
        let op = self
            .ast
            .get(id)
            .assign_operator()
            .expect("Assignment node must carry a valid operator literal");
        let lvalue = self.resolve_lvalue(target, scope)?;
        let rhs = self.eval_expr(value, scope)?;
        let new_value = match op.as_binary() {
            None => rhs,
            Some(binop) => {
                let current = self.read_lvalue(&lvalue, scope)?;
                apply_binary(binop, &current, &rhs).map_err(EvalFlow::Error)?
            }
        };
        self.write_lvalue(&lvalue, scope, new_value.clone())?;
        Ok(new_value)
    }

    fn resolve_lvalue(&mut self, id: NodeId, scope: &Scope) -> EvalResult<Lvalue> {
        match self.ast.get(id).data.clone() {
            NodeData::NameRef => {
                let name = self.ast.get(id).name().unwrap_or_default().to_owned();
                Ok(Lvalue::Identifier(name))
            }
            NodeData::ArrayAccess { array, index } => {
                let (heap_id, idx) = self.resolve_array_access(array, index, scope)?;
                Ok(Lvalue::ArrayElement(heap_id, idx))
            }
            NodeData::MemberAccess { object, property } => {
                let obj = self.eval_expr(object, scope)?;
                let field = self.ast.get(property).name().unwrap_or_default().to_owned();
                match obj {
                    Value::Struct(heap_id) => Ok(Lvalue::StructField(heap_id, field)),
                    other => Err(EvalFlow::Error(EvalError::TypeMismatch {
                        expected: "a struct".to_owned(),
                        found: other.type_name().to_owned(),
                    })),
                }
            }
            other => Err(EvalFlow::Error(EvalError::TypeMismatch {
                expected: "an lvalue (identifier, array element, or struct field)".to_owned(),
                found: format!("{other:?}"),
            })),
        }
    }

    fn read_lvalue(&mut self, lvalue: &Lvalue, scope: &Scope) -> EvalResult<Value> {
        match lvalue {
            Lvalue::Identifier(name) => scope
                .get(name)
                .ok_or_else(|| EvalFlow::Error(EvalError::UnknownIdentifier { name: name.clone() })),
            Lvalue::ArrayElement(heap_id, idx) => self.array_get(*heap_id, *idx),
            Lvalue::StructField(heap_id, field) => match self.heap.get(*heap_id) {
                HeapData::Struct { fields, type_name } => fields.get(field).cloned().ok_or_else(|| {
                    EvalFlow::Error(EvalError::UnknownMember {
                        type_name: type_name.clone(),
                        member: field.clone(),
                    })
                }),
                HeapData::Array(_) => Err(EvalFlow::Error(EvalError::TypeMismatch {
                    expected: "a struct".to_owned(),
                    found: "array".to_owned(),
                })),
            },
        }
    }

    fn write_lvalue(&mut self, lvalue: &Lvalue, scope: &Scope, value: Value) -> EvalResult<()> {
        match lvalue {
            Lvalue::Identifier(name) => {
                if scope.contains(name) {
                    scope.assign(name, value).map_err(EvalFlow::Error)?;
                } else {
                    // First assignment to a not-yet-declared name behaves as
                    // an implicit declaration in the current scope, matching
                    // how a loose C-subset interpreter tolerates a missing
                    // `var` keyword; emits the same VAR_SET as a VarDecl.
                    scope.declare(name.clone(), value.clone());
                }
                self.emit(Command::VarSet {
                    variable: name.clone(),
                    value: value.display_string(),
                    value_type: None,
                });
                Ok(())
            }
            Lvalue::ArrayElement(heap_id, idx) => {
                match self.heap.get_mut(*heap_id) {
                    HeapData::Array(elements) => {
                        let len = elements.len();
                        let slot = elements
                            .get_mut(*idx)
                            .ok_or(EvalError::ArrayIndexOutOfBounds { index: *idx as i64, len })
                            .map_err(EvalFlow::Error)?;
                        *slot = value;
                    }
                    HeapData::Struct { .. } => {
                        return Err(EvalFlow::Error(EvalError::TypeMismatch {
                            expected: "an array".to_owned(),
                            found: "struct".to_owned(),
                        }))
                    }
                }
                Ok(())
            }
            Lvalue::StructField(heap_id, field) => {
                match self.heap.get_mut(*heap_id) {
                    HeapData::Struct { fields, .. } => {
                        fields.insert(field.clone(), value);
                    }
                    HeapData::Array(_) => {
                        return Err(EvalFlow::Error(EvalError::TypeMismatch {
                            expected: "a struct".to_owned(),
                            found: "array".to_owned(),
                        }))
                    }
                }
                Ok(())
            }
        }
    }

    fn resolve_array_access(&mut self, array: NodeId, index: NodeId, scope: &Scope) -> EvalResult<(crate::runtime::HeapId, usize)> {
        let array_value = self.eval_expr(array, scope)?;
        let index_value = self.eval_expr(index, scope)?;
        let idx = index_value
            .as_i64()
            .ok_or_else(|| EvalFlow::Error(EvalError::TypeMismatch {
                expected: "an integer index".to_owned(),
                found: index_value.type_name().to_owned(),
            }))?;
        match array_value {
            Value::Array(id) => Ok((id, idx.max(0) as usize)),
            other => Err(EvalFlow::Error(EvalError::TypeMismatch {
                expected: "an array".to_owned(),
                found: other.type_name().to_owned(),
            })),
        }
    }

    fn array_get(&mut self, heap_id: crate::runtime::HeapId, idx: usize) -> EvalResult<Value> {
        match self.heap.get(heap_id) {
            HeapData::Array(elements) => elements
                .get(idx)
                .cloned()
                .ok_or(EvalError::ArrayIndexOutOfBounds {
                    index: idx as i64,
                    len: elements.len(),
                })
                .map_err(EvalFlow::Error),
            HeapData::Struct { .. } => Err(EvalFlow::Error(EvalError::TypeMismatch {
                expected: "an array".to_owned(),
                found: "struct".to_owned(),
            })),
        }
    }

    fn eval_member_access(&mut self, object: NodeId, property: NodeId, scope: &Scope) -> EvalResult<Value> {
        let lvalue = self.resolve_lvalue_or_plain_read(object, property, scope)?;
        self.read_lvalue(&lvalue, scope)
    }

    fn resolve_lvalue_or_plain_read(&mut self, object: NodeId, property: NodeId, scope: &Scope) -> EvalResult<Lvalue> {
        let obj = self.eval_expr(object, scope)?;
        let field = self.ast.get(property).name().unwrap_or_default().to_owned();
        match obj {
            Value::Struct(heap_id) => Ok(Lvalue::StructField(heap_id, field)),
            other => Err(EvalFlow::Error(EvalError::TypeMismatch {
                expected: "a struct".to_owned(),
                found: other.type_name().to_owned(),
            })),
        }
    }

    fn eval_constructor_call(&mut self, type_name: NodeId, args: &[NodeId], scope: &Scope) -> EvalResult<Value> {
        let name = self.ast.get(type_name).name().unwrap_or_default().to_owned();
        let mut values = Vec::with_capacity(args.len());
        for a in args {
            values.push(self.eval_expr(*a, scope)?);
        }
        if name == "String" {
            let text = values.first().map(Value::display_string).unwrap_or_default();
            return Ok(Value::String(Rc::from(text.as_str())));
        }
        // A bare struct literal: field values supplied positionally, named
        // by the registered `StructDecl` — for the subset this interpreter
        // supports, an empty-field struct is allocated and populated by
        // subsequent member assignments (§11 struct support).
        let fields = ahash::AHashMap::new();
        Ok(Value::Struct(self.heap.allocate(HeapData::Struct { type_name: name, fields })))
    }

    /// Calls a function: built-in Arduino primitive, `Serial`/library
    /// method, or a user-defined `FuncDef` (§4.3.3 "Function call").
    fn eval_func_call(&mut self, callee: NodeId, args: &[NodeId], scope: &Scope) -> EvalResult<Value> {
        match self.ast.get(callee).data.clone() {
            NodeData::MemberAccess { object, property } => {
                let object_name = self.ast.get(object).name().unwrap_or_default().to_owned();
                let method_name = self.ast.get(property).name().unwrap_or_default().to_owned();
                let mut values = Vec::with_capacity(args.len());
                for a in args {
                    values.push(self.eval_expr(*a, scope)?);
                }
                self.call_object_method(&object_name, &method_name, values)
            }
            NodeData::NameRef => {
                let name = self.ast.get(callee).name().unwrap_or_default().to_owned();
                let mut values = Vec::with_capacity(args.len());
                for a in args {
                    values.push(self.eval_expr(*a, scope)?);
                }
                if let Some(v) = super::builtins::call_free_function(self, &name, &values)? {
                    return Ok(v);
                }
                if let Some(func_id) = self.functions.lookup(&name) {
                    return self.call_user_function(&name, func_id, values);
                }
                Err(EvalFlow::Error(EvalError::UnknownIdentifier { name }))
            }
            other => Err(EvalFlow::Error(EvalError::TypeMismatch {
                expected: "a callable".to_owned(),
                found: format!("{other:?}"),
            })),
        }
    }

    fn call_user_function(&mut self, name: &str, func_id: crate::runtime::FunctionId, args: Vec<Value>) -> EvalResult<Value> {
        let record = self.functions.get(func_id).clone();
        if args.len() != record.params.len() {
            return Err(EvalFlow::Error(EvalError::WrongArity {
                name: name.to_owned(),
                expected: record.params.len(),
                found: args.len(),
            }));
        }
        let call_scope = Scope::child_of(&self.globals);
        for (param, value) in record.params.iter().zip(args.iter()) {
            call_scope.declare(param.name.clone(), value.clone());
        }
        self.emit(Command::FunctionCall {
            function: name.to_owned(),
            arguments: Some(args.iter().map(Value::display_string).collect()),
        });
        let saved_control = std::mem::replace(&mut self.control, ControlFlow::None);
        let body = self.body_of(record.body);
        let result = self.exec_block(&body, &call_scope);
        let returned = std::mem::replace(&mut self.control, saved_control);
        result?;
        match returned {
            ControlFlow::Return(v) => Ok(v),
            ControlFlow::Break | ControlFlow::Continue => Err(EvalFlow::Error(EvalError::BreakContinueOutsideLoop)),
            ControlFlow::None => Ok(Value::zero_for_type(&record.return_type)),
        }
    }

    /// Dispatches `object.method(args)`: `Serial.*` is a direct effect
    /// (§11); anything else is a host-answered `LIBRARY_METHOD_REQUEST`
    /// (§4.3.4).
    fn call_object_method(&mut self, object: &str, method: &str, args: Vec<Value>) -> EvalResult<Value> {
        if object == "Serial" {
            return super::builtins::call_serial_method(self, method, &args);
        }
        let display_args: Vec<String> = args.iter().map(Value::display_string).collect();
        let object_owned = object.to_owned();
        let method_owned = method.to_owned();
        self.request_value(move |request_id| Command::LibraryMethodRequest {
            object: object_owned.clone(),
            method: method_owned.clone(),
            args: display_args.clone(),
            request_id,
        })
    }

    /// The suspend/resume primitive (§4.3.4): returns the memoized answer
    /// if this call site was already resolved in an earlier attempt,
    /// otherwise emits the request and unwinds with `Suspend` — unless
    /// synchronous mode and an inline handler can answer it immediately.
    pub(super) fn request_value(&mut self, make_command: impl FnOnce(crate::runtime::RequestId) -> Command) -> EvalResult<Value> {
        let idx = {
            let call = self
                .current_call
                .as_mut()
                .expect("external-data request outside a top-level call");
            let idx = call.request_cursor;
            call.request_cursor += 1;
            idx
        };
        if let Some(value) = self.current_call.as_ref().and_then(|c| c.answered.get(idx)).cloned() {
            return Ok(value);
        }

        let request_id = self.request_alloc.allocate();
        let command = make_command(request_id);

        if self.options.synchronous_mode {
            if let Some(mut handler) = self.response_handler.take() {
                let inline = handler.respond(&command);
                self.response_handler = Some(handler);
                if let Some(value) = inline {
                    self.emit(command);
                    self.current_call.as_mut().unwrap().answered.push(value.clone());
                    return Ok(value);
                }
            }
        }

        self.emit(command);
        Err(EvalFlow::Suspend(request_id))
    }
}

fn literal_to_value(literal: Option<&Literal>) -> Value {
    match literal {
        None => Value::Void,
        Some(Literal::Void) | Some(Literal::Null) => Value::Void,
        Some(Literal::Bool(b)) => Value::Bool(*b),
        Some(Literal::Int8(v)) => Value::Int32(i32::from(*v)),
        Some(Literal::UInt8(v)) => Value::Int32(i32::from(*v)),
        Some(Literal::Int16(v)) => Value::Int32(i32::from(*v)),
        Some(Literal::UInt16(v)) => Value::Int32(i32::from(*v)),
        Some(Literal::Int32(v)) => Value::Int32(*v),
        Some(Literal::UInt32(v)) => Value::UInt32(*v),
        Some(Literal::Int64(v)) => Value::Int64(*v),
        Some(Literal::UInt64(v)) => Value::UInt64(*v),
        Some(Literal::Float32(v)) => Value::Double(f64::from(*v)),
        Some(Literal::Float64(v)) => Value::Double(*v),
        Some(Literal::String(s)) => Value::String(Rc::from(s.as_str())),
    }
}

/// Picks the widest integer representation present between `a`/`b`, per
/// C's usual arithmetic conversions (simplified to this runtime's four
/// integer widths rather than the full C promotion ladder).
#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
enum IntWidth {
    I32,
    U32,
    I64,
    U64,
}

fn int_width(v: &Value) -> Option<IntWidth> {
    match v {
        Value::Bool(_) | Value::Int32(_) => Some(IntWidth::I32),
        Value::UInt32(_) => Some(IntWidth::U32),
        Value::Int64(_) => Some(IntWidth::I64),
        Value::UInt64(_) => Some(IntWidth::U64),
        _ => None,
    }
}

fn make_int(width: IntWidth, v: i64) -> Value {
    match width {
        IntWidth::I32 => Value::Int32(v as i32),
        IntWidth::U32 => Value::UInt32(v as u32),
        IntWidth::I64 => Value::Int64(v),
        IntWidth::U64 => Value::UInt64(v as u64),
    }
}

fn numeric_step(current: &Value, delta: i64) -> Result<Value, EvalError> {
    if let Value::Double(v) = current {
        return Ok(Value::Double(v + delta as f64));
    }
    let width = int_width(current).ok_or_else(|| EvalError::TypeMismatch {
        expected: "a numeric lvalue".to_owned(),
        found: current.type_name().to_owned(),
    })?;
    let v = current.as_i64().unwrap_or(0);
    Ok(make_int(width, v.wrapping_add(delta)))
}

/// Applies a binary operator to two already-evaluated operands (§4.3.3
/// numeric semantics: C integer promotion, two's-complement wrap, IEEE-754
/// floats, string concatenation via `+`).
fn apply_binary(op: BinaryOperator, l: &Value, r: &Value) -> Result<Value, EvalError> {
    if matches!(l, Value::String(_)) || matches!(r, Value::String(_)) {
        return apply_string_binary(op, l, r);
    }
    match op {
        BinaryOperator::Eq | BinaryOperator::Ne | BinaryOperator::Lt | BinaryOperator::Le | BinaryOperator::Gt | BinaryOperator::Ge => {
            let (lf, rf) = numeric_pair_f64(l, r)?;
            Ok(Value::Bool(compare(op, lf, rf)))
        }
        BinaryOperator::Add | BinaryOperator::Sub | BinaryOperator::Mul | BinaryOperator::Div => {
            if matches!(l, Value::Double(_)) || matches!(r, Value::Double(_)) {
                let (lf, rf) = numeric_pair_f64(l, r)?;
                arithmetic_f64(op, lf, rf)
            } else {
                arithmetic_int(op, l, r)
            }
        }
        BinaryOperator::Mod | BinaryOperator::BitAnd | BinaryOperator::BitOr | BinaryOperator::BitXor | BinaryOperator::Shl | BinaryOperator::Shr => {
            arithmetic_int(op, l, r)
        }
        BinaryOperator::LogAnd | BinaryOperator::LogOr => unreachable!("short-circuited before apply_binary"),
    }
}

fn apply_string_binary(op: BinaryOperator, l: &Value, r: &Value) -> Result<Value, EvalError> {
    match op {
        BinaryOperator::Add => Ok(Value::String(Rc::from(format!("{}{}", l.display_string(), r.display_string())))),
        BinaryOperator::Eq => Ok(Value::Bool(l.display_string() == r.display_string())),
        BinaryOperator::Ne => Ok(Value::Bool(l.display_string() != r.display_string())),
        _ => Err(EvalError::TypeMismatch {
            expected: "a numeric operand".to_owned(),
            found: "string".to_owned(),
        }),
    }
}

fn numeric_pair_f64(l: &Value, r: &Value) -> Result<(f64, f64), EvalError> {
    let lf = l.as_f64().ok_or_else(|| EvalError::TypeMismatch {
        expected: "a numeric operand".to_owned(),
        found: l.type_name().to_owned(),
    })?;
    let rf = r.as_f64().ok_or_else(|| EvalError::TypeMismatch {
        expected: "a numeric operand".to_owned(),
        found: r.type_name().to_owned(),
    })?;
    Ok((lf, rf))
}

fn compare(op: BinaryOperator, l: f64, r: f64) -> bool {
    match op {
        BinaryOperator::Eq => l == r,
        BinaryOperator::Ne => l != r,
        BinaryOperator::Lt => l < r,
        BinaryOperator::Le => l <= r,
        BinaryOperator::Gt => l > r,
        BinaryOperator::Ge => l >= r,
        _ => unreachable!(),
    }
}

fn arithmetic_f64(op: BinaryOperator, l: f64, r: f64) -> Result<Value, EvalError> {
    Ok(Value::Double(match op {
        BinaryOperator::Add => l + r,
        BinaryOperator::Sub => l - r,
        BinaryOperator::Mul => l * r,
        BinaryOperator::Div => {
            if r == 0.0 {
                return Err(EvalError::DivisionByZero);
            }
            l / r
        }
        _ => unreachable!(),
    }))
}

fn arithmetic_int(op: BinaryOperator, l: &Value, r: &Value) -> Result<Value, EvalError> {
    let width = int_width(l)
        .into_iter()
        .chain(int_width(r))
        .max()
        .ok_or_else(|| EvalError::TypeMismatch {
            expected: "an integer operand".to_owned(),
            found: format!("{}/{}", l.type_name(), r.type_name()),
        })?;
    let lv = l.as_i64().ok_or_else(|| EvalError::TypeMismatch {
        expected: "an integer operand".to_owned(),
        found: l.type_name().to_owned(),
    })?;
    let rv = r.as_i64().ok_or_else(|| EvalError::TypeMismatch {
        expected: "an integer operand".to_owned(),
        found: r.type_name().to_owned(),
    })?;
    let result = match op {
        BinaryOperator::Add => lv.wrapping_add(rv),
        BinaryOperator::Sub => lv.wrapping_sub(rv),
        BinaryOperator::Mul => lv.wrapping_mul(rv),
        BinaryOperator::Div => {
            if rv == 0 {
                return Err(EvalError::DivisionByZero);
            }
            lv.wrapping_div(rv)
        }
        BinaryOperator::Mod => {
            if rv == 0 {
                return Err(EvalError::DivisionByZero);
            }
            lv.wrapping_rem(rv)
        }
        BinaryOperator::BitAnd => lv & rv,
        BinaryOperator::BitOr => lv | rv,
        BinaryOperator::BitXor => lv ^ rv,
        BinaryOperator::Shl => lv.wrapping_shl(rv as u32),
        BinaryOperator::Shr => lv.wrapping_shr(rv as u32),
        _ => unreachable!(),
    };
    Ok(make_int(width, result))
}

fn apply_unary(op: UnaryOperator, v: &Value) -> Result<Value, EvalError> {
    match op {
        UnaryOperator::Plus => {
            if v.is_numeric() {
                Ok(v.clone())
            } else {
                Err(EvalError::TypeMismatch {
                    expected: "a numeric operand".to_owned(),
                    found: v.type_name().to_owned(),
                })
            }
        }
        UnaryOperator::Neg => match v {
            Value::Double(d) => Ok(Value::Double(-d)),
            _ => {
                let width = int_width(v).ok_or_else(|| EvalError::TypeMismatch {
                    expected: "a numeric operand".to_owned(),
                    found: v.type_name().to_owned(),
                })?;
                let n = v.as_i64().unwrap_or(0);
                Ok(make_int(width, n.wrapping_neg()))
            }
        },
        UnaryOperator::Not => Ok(Value::Bool(!v.is_truthy())),
        UnaryOperator::BitNot => {
            let width = int_width(v).ok_or_else(|| EvalError::TypeMismatch {
                expected: "an integer operand".to_owned(),
                found: v.type_name().to_owned(),
            })?;
            let n = v.as_i64().unwrap_or(0);
            Ok(make_int(width, !n))
        }
        UnaryOperator::Inc | UnaryOperator::Dec => unreachable!("handled as an lvalue update in eval_unary_op"),
    }
}

/// Value equality for `Switch`/`Case` matching and `==`/`!=` on
/// non-numeric-non-string values (heap references compare by identity).
pub(super) fn values_equal(a: &Value, b: &Value) -> bool {
    match (a, b) {
        (Value::String(x), Value::String(y)) => x == y,
        (Value::Array(x), Value::Array(y)) | (Value::Struct(x), Value::Struct(y)) => x == y,
        (Value::Function(x), Value::Function(y)) => x == y,
        _ if a.is_numeric() && b.is_numeric() => a.as_f64() == b.as_f64(),
        _ => false,
    }
}
