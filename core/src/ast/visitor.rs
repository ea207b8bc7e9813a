//! Visitor dispatch over an [`super::Ast`] (§4.1: "a visitor/dispatch
//! mechanism routes evaluation by node type tag").
//!
//! The interpreter's evaluator is the primary implementor, but the trait is
//! generic over a return type `T` so non-evaluating consumers (a formatter,
//! a static checker) can reuse the same dispatch without depending on
//! `crate::interpreter`.

use super::{Ast, NodeData, NodeId};

/// Dispatches on an [`super::AstNode`]'s [`NodeData`] variant and recurses
/// through `ast` as needed. Implementors provide one method per node-kind
/// family; [`AstVisitor::visit`] does the routing so callers never match on
/// `NodeKind` by hand.
pub trait AstVisitor {
    type Output;

    fn visit(&mut self, ast: &Ast, id: NodeId) -> Self::Output {
        let node = ast.get(id);
        match &node.data {
            NodeData::Program { body } => self.visit_program(ast, id, body),
            NodeData::ErrorNode => self.visit_error(ast, id),
            NodeData::Comment => self.visit_comment(ast, id),
            NodeData::Compound { body } => self.visit_compound(ast, id, body),
            NodeData::ExpressionStmt { expr } => self.visit_expression_stmt(ast, id, *expr),
            NodeData::If {
                condition,
                consequent,
                alternate,
            } => self.visit_if(ast, id, *condition, *consequent, *alternate),
            NodeData::While { condition, body } => self.visit_while(ast, id, *condition, *body),
            NodeData::DoWhile { condition, body } => {
                self.visit_do_while(ast, id, *condition, *body)
            }
            NodeData::For {
                init,
                condition,
                increment,
                body,
            } => self.visit_for(ast, id, *init, *condition, *increment, *body),
            NodeData::RangeFor {
                binding,
                iterable,
                body,
            } => self.visit_range_for(ast, id, *binding, *iterable, *body),
            NodeData::Switch {
                discriminant,
                cases,
            } => self.visit_switch(ast, id, *discriminant, cases),
            NodeData::Case { test, body } => self.visit_case(ast, id, *test, body),
            NodeData::Return { value } => self.visit_return(ast, id, *value),
            NodeData::Break => self.visit_break(ast, id),
            NodeData::Continue => self.visit_continue(ast, id),
            NodeData::Empty => self.visit_empty(ast, id),
            NodeData::VarDecl {
                var_type,
                declarators,
            } => self.visit_var_decl(ast, id, *var_type, declarators),
            NodeData::FuncDef {
                return_type,
                params,
                body,
            } => self.visit_func_def(ast, id, *return_type, params, *body),
            NodeData::FuncDecl {
                return_type,
                params,
            } => self.visit_func_decl(ast, id, *return_type, params),
            NodeData::StructDecl { fields } => self.visit_struct_decl(ast, id, fields),
            NodeData::TypedefDecl { underlying } => self.visit_typedef_decl(ast, id, *underlying),
            NodeData::BinaryOp { left, right } => self.visit_binary_op(ast, id, *left, *right),
            NodeData::UnaryOp { operand, prefix } => {
                self.visit_unary_op(ast, id, *operand, *prefix)
            }
            NodeData::Assignment { target, value } => {
                self.visit_assignment(ast, id, *target, *value)
            }
            NodeData::FuncCall { callee, args } => self.visit_func_call(ast, id, *callee, args),
            NodeData::MemberAccess { object, property } => {
                self.visit_member_access(ast, id, *object, *property)
            }
            NodeData::ArrayAccess { array, index } => {
                self.visit_array_access(ast, id, *array, *index)
            }
            NodeData::ConstructorCall { type_name, args } => {
                self.visit_constructor_call(ast, id, *type_name, args)
            }
            NodeData::Postfix { operand } => self.visit_postfix(ast, id, *operand),
            NodeData::Ternary {
                condition,
                consequent,
                alternate,
            } => self.visit_ternary(ast, id, *condition, *consequent, *alternate),
            NodeData::Comma { items } => self.visit_comma(ast, id, items),
            NodeData::NameRef => self.visit_name(ast, id),
            NodeData::Leaf => self.visit_leaf(ast, id),
            NodeData::Declarator { initializer } => {
                self.visit_declarator(ast, id, node.name().unwrap_or(""), *initializer)
            }
            NodeData::Param { param_type } => {
                self.visit_param(ast, id, node.name().unwrap_or(""), *param_type)
            }
            NodeData::FunctionPointerDeclarator { params } => {
                self.visit_function_pointer_declarator(ast, id, node.name().unwrap_or(""), params)
            }
            NodeData::ArrayDeclarator { size } => {
                self.visit_array_declarator(ast, id, node.name().unwrap_or(""), *size)
            }
            NodeData::ArrayInit { elements } => self.visit_array_init(ast, id, elements),
            NodeData::Unknown { children } => self.visit_unknown(ast, id, children),
        }
    }

    fn visit_program(&mut self, ast: &Ast, id: NodeId, body: &[NodeId]) -> Self::Output;
    fn visit_error(&mut self, ast: &Ast, id: NodeId) -> Self::Output;
    fn visit_comment(&mut self, ast: &Ast, id: NodeId) -> Self::Output;
    fn visit_compound(&mut self, ast: &Ast, id: NodeId, body: &[NodeId]) -> Self::Output;
    fn visit_expression_stmt(&mut self, ast: &Ast, id: NodeId, expr: NodeId) -> Self::Output;
    fn visit_if(
        &mut self,
        ast: &Ast,
        id: NodeId,
        condition: NodeId,
        consequent: NodeId,
        alternate: Option<NodeId>,
    ) -> Self::Output;
    fn visit_while(&mut self, ast: &Ast, id: NodeId, condition: NodeId, body: NodeId) -> Self::Output;
    fn visit_do_while(
        &mut self,
        ast: &Ast,
        id: NodeId,
        condition: NodeId,
        body: NodeId,
    ) -> Self::Output;
    #[allow(clippy::too_many_arguments)]
    fn visit_for(
        &mut self,
        ast: &Ast,
        id: NodeId,
        init: Option<NodeId>,
        condition: Option<NodeId>,
        increment: Option<NodeId>,
        body: NodeId,
    ) -> Self::Output;
    fn visit_range_for(
        &mut self,
        ast: &Ast,
        id: NodeId,
        binding: NodeId,
        iterable: NodeId,
        body: NodeId,
    ) -> Self::Output;
    fn visit_switch(
        &mut self,
        ast: &Ast,
        id: NodeId,
        discriminant: NodeId,
        cases: &[NodeId],
    ) -> Self::Output;
    fn visit_case(&mut self, ast: &Ast, id: NodeId, test: Option<NodeId>, body: &[NodeId]) -> Self::Output;
    fn visit_return(&mut self, ast: &Ast, id: NodeId, value: Option<NodeId>) -> Self::Output;
    fn visit_break(&mut self, ast: &Ast, id: NodeId) -> Self::Output;
    fn visit_continue(&mut self, ast: &Ast, id: NodeId) -> Self::Output;
    fn visit_empty(&mut self, ast: &Ast, id: NodeId) -> Self::Output;
    fn visit_var_decl(
        &mut self,
        ast: &Ast,
        id: NodeId,
        var_type: NodeId,
        declarators: &[NodeId],
    ) -> Self::Output;
    fn visit_func_def(
        &mut self,
        ast: &Ast,
        id: NodeId,
        return_type: NodeId,
        params: &[NodeId],
        body: NodeId,
    ) -> Self::Output;
    fn visit_func_decl(
        &mut self,
        ast: &Ast,
        id: NodeId,
        return_type: NodeId,
        params: &[NodeId],
    ) -> Self::Output;
    fn visit_struct_decl(&mut self, ast: &Ast, id: NodeId, fields: &[NodeId]) -> Self::Output;
    fn visit_typedef_decl(&mut self, ast: &Ast, id: NodeId, underlying: NodeId) -> Self::Output;
    fn visit_binary_op(&mut self, ast: &Ast, id: NodeId, left: NodeId, right: NodeId) -> Self::Output;
    fn visit_unary_op(&mut self, ast: &Ast, id: NodeId, operand: NodeId, prefix: bool) -> Self::Output;
    fn visit_assignment(&mut self, ast: &Ast, id: NodeId, target: NodeId, value: NodeId) -> Self::Output;
    fn visit_func_call(&mut self, ast: &Ast, id: NodeId, callee: NodeId, args: &[NodeId]) -> Self::Output;
    fn visit_member_access(
        &mut self,
        ast: &Ast,
        id: NodeId,
        object: NodeId,
        property: NodeId,
    ) -> Self::Output;
    fn visit_array_access(&mut self, ast: &Ast, id: NodeId, array: NodeId, index: NodeId) -> Self::Output;
    fn visit_constructor_call(
        &mut self,
        ast: &Ast,
        id: NodeId,
        type_name: NodeId,
        args: &[NodeId],
    ) -> Self::Output;
    fn visit_postfix(&mut self, ast: &Ast, id: NodeId, operand: NodeId) -> Self::Output;
    fn visit_ternary(
        &mut self,
        ast: &Ast,
        id: NodeId,
        condition: NodeId,
        consequent: NodeId,
        alternate: NodeId,
    ) -> Self::Output;
    fn visit_comma(&mut self, ast: &Ast, id: NodeId, items: &[NodeId]) -> Self::Output;
    fn visit_name(&mut self, ast: &Ast, id: NodeId) -> Self::Output;
    fn visit_leaf(&mut self, ast: &Ast, id: NodeId) -> Self::Output;
    fn visit_declarator(
        &mut self,
        ast: &Ast,
        id: NodeId,
        name: &str,
        initializer: Option<NodeId>,
    ) -> Self::Output;
    fn visit_param(&mut self, ast: &Ast, id: NodeId, name: &str, param_type: NodeId) -> Self::Output;
    fn visit_function_pointer_declarator(
        &mut self,
        ast: &Ast,
        id: NodeId,
        name: &str,
        params: &[NodeId],
    ) -> Self::Output;
    fn visit_array_declarator(
        &mut self,
        ast: &Ast,
        id: NodeId,
        name: &str,
        size: Option<NodeId>,
    ) -> Self::Output;
    fn visit_array_init(&mut self, ast: &Ast, id: NodeId, elements: &[NodeId]) -> Self::Output;
    fn visit_unknown(&mut self, ast: &Ast, id: NodeId, children: &[NodeId]) -> Self::Output;
}
