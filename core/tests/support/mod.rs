//! Shared AST-construction helpers for the black-box test suites. Builds
//! ASTs directly through the public `sketch_core::ast` API, the same way a
//! parser would, rather than going through CompactAST bytes — these tests
//! exercise the interpreter, not the codec.

#![allow(dead_code)]

use sketch_core::ast::{
    AssignOperator, Ast, AstNode, BinaryOperator, Literal, NodeData, NodeId, NodeKind, UnaryOperator,
};

pub fn named(ast: &mut Ast, kind: NodeKind, name: &str, data: NodeData) -> NodeId {
    ast.push(AstNode::new(kind, Some(Literal::String(name.to_owned())), data))
}

pub fn type_node(ast: &mut Ast, name: &str) -> NodeId {
    named(ast, NodeKind::Type, name, NodeData::NameRef)
}

pub fn name_ref(ast: &mut Ast, name: &str) -> NodeId {
    named(ast, NodeKind::Identifier, name, NodeData::NameRef)
}

pub fn int_lit(ast: &mut Ast, value: i32) -> NodeId {
    ast.push(AstNode::new(NodeKind::Number, Some(Literal::Int32(value)), NodeData::Leaf))
}

pub fn string_lit(ast: &mut Ast, value: &str) -> NodeId {
    ast.push(AstNode::new(
        NodeKind::StringLit,
        Some(Literal::String(value.to_owned())),
        NodeData::Leaf,
    ))
}

pub fn binary(ast: &mut Ast, op: BinaryOperator, left: NodeId, right: NodeId) -> NodeId {
    ast.push(AstNode::new(
        NodeKind::BinaryOp,
        Some(Literal::String(op.to_string())),
        NodeData::BinaryOp { left, right },
    ))
}

pub fn unary(ast: &mut Ast, op: UnaryOperator, operand: NodeId, prefix: bool) -> NodeId {
    ast.push(AstNode::new(
        NodeKind::UnaryOp,
        Some(Literal::String(op.to_string())),
        NodeData::UnaryOp { operand, prefix },
    ))
}

pub fn postfix(ast: &mut Ast, op: UnaryOperator, operand: NodeId) -> NodeId {
    ast.push(AstNode::new(
        NodeKind::Postfix,
        Some(Literal::String(op.to_string())),
        NodeData::Postfix { operand },
    ))
}

pub fn assign(ast: &mut Ast, op: AssignOperator, target: NodeId, value: NodeId) -> NodeId {
    ast.push(AstNode::new(
        NodeKind::Assignment,
        Some(Literal::String(op.to_string())),
        NodeData::Assignment { target, value },
    ))
}

pub fn ternary(ast: &mut Ast, condition: NodeId, consequent: NodeId, alternate: NodeId) -> NodeId {
    ast.push(AstNode::new(
        NodeKind::Ternary,
        None,
        NodeData::Ternary {
            condition,
            consequent,
            alternate,
        },
    ))
}

pub fn expr_stmt(ast: &mut Ast, expr: NodeId) -> NodeId {
    ast.push(AstNode::new(NodeKind::Expression, None, NodeData::ExpressionStmt { expr }))
}

pub fn call(ast: &mut Ast, name: &str, args: Vec<NodeId>) -> NodeId {
    let callee = name_ref(ast, name);
    ast.push(AstNode::new(NodeKind::FuncCall, None, NodeData::FuncCall { callee, args }))
}

pub fn member_call(ast: &mut Ast, object: &str, method: &str, args: Vec<NodeId>) -> NodeId {
    let object_ref = name_ref(ast, object);
    let property = name_ref(ast, method);
    let callee = ast.push(AstNode::new(
        NodeKind::MemberAccess,
        None,
        NodeData::MemberAccess {
            object: object_ref,
            property,
        },
    ));
    ast.push(AstNode::new(NodeKind::FuncCall, None, NodeData::FuncCall { callee, args }))
}

pub fn declarator(ast: &mut Ast, name: &str, initializer: Option<NodeId>) -> NodeId {
    named(ast, NodeKind::Declarator, name, NodeData::Declarator { initializer })
}

pub fn var_decl(ast: &mut Ast, type_name: &str, declarators: Vec<NodeId>) -> NodeId {
    let var_type = type_node(ast, type_name);
    ast.push(AstNode::new(NodeKind::VarDecl, None, NodeData::VarDecl { var_type, declarators }))
}

pub fn array_declarator(ast: &mut Ast, name: &str, size: NodeId) -> NodeId {
    named(ast, NodeKind::ArrayDeclarator, name, NodeData::ArrayDeclarator { size: Some(size) })
}

pub fn array_access(ast: &mut Ast, array: NodeId, index: NodeId) -> NodeId {
    ast.push(AstNode::new(NodeKind::ArrayAccess, None, NodeData::ArrayAccess { array, index }))
}

pub fn compound(ast: &mut Ast, body: Vec<NodeId>) -> NodeId {
    ast.push(AstNode::new(NodeKind::Compound, None, NodeData::Compound { body }))
}

pub fn func_def(ast: &mut Ast, name: &str, body: Vec<NodeId>) -> NodeId {
    let ret = type_node(ast, "void");
    let block = compound(ast, body);
    named(
        ast,
        NodeKind::FuncDef,
        name,
        NodeData::FuncDef {
            return_type: ret,
            params: vec![],
            body: block,
        },
    )
}

pub fn if_stmt(ast: &mut Ast, condition: NodeId, consequent: NodeId, alternate: Option<NodeId>) -> NodeId {
    ast.push(AstNode::new(
        NodeKind::If,
        None,
        NodeData::If {
            condition,
            consequent,
            alternate,
        },
    ))
}

pub fn break_stmt(ast: &mut Ast) -> NodeId {
    ast.push(AstNode::new(NodeKind::Break, None, NodeData::Break))
}

pub fn for_stmt(ast: &mut Ast, init: Option<NodeId>, condition: Option<NodeId>, increment: Option<NodeId>, body: NodeId) -> NodeId {
    ast.push(AstNode::new(
        NodeKind::For,
        None,
        NodeData::For {
            init,
            condition,
            increment,
            body,
        },
    ))
}

/// Builds a `Program` node and pins it at `NodeId::ROOT` (index 0), the
/// way `compact_ast::decoder::link` and `Interpreter::new` both require:
/// reserve the slot before any child exists, build the children (which
/// land at indices 1.., never touching 0), then overwrite the reservation.
/// Pushing `Program` last like an ordinary node would leave whatever was
/// built first sitting at index 0 instead.
pub fn program(ast: &mut Ast, build: impl FnOnce(&mut Ast) -> Vec<NodeId>) -> NodeId {
    let root = ast.push(AstNode::new(NodeKind::Program, None, NodeData::Program { body: vec![] }));
    let body = build(ast);
    *ast.get_mut(root) = AstNode::new(NodeKind::Program, None, NodeData::Program { body });
    root
}
