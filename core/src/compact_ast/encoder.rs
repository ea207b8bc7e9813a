//! Host-side encoder (§4.2.1). Builds a CompactAST byte buffer from an
//! [`Ast`]. Ships even though the spec only requires the byte format
//! itself to be host-language-agnostic, so the crate can round-trip its
//! own fixtures in tests without depending on an external tool (§11).

use ahash::AHashMap;

use crate::ast::{Ast, AstNode, Literal, NodeId};
use crate::error::FormatError;

use super::{align_to_4, HEADER_LEN, MAGIC, VERSION};

/// Encodes the subtree rooted at `ast.root()` into a CompactAST buffer.
///
/// # Errors
/// Returns [`FormatError`] only if the tree is too large for the wire
/// format's fixed-width fields (more than `u16::MAX` nodes or string-table
/// entries); a freshly decoded or hand-built `Ast` within those bounds
/// always encodes successfully.
pub fn encode(ast: &Ast) -> Result<Vec<u8>, FormatError> {
    let order = pre_order(ast, ast.root());
    if order.len() > usize::from(u16::MAX) {
        return Err(FormatError::ChildIndexOutOfRange {
            index: 0,
            child: u32::try_from(order.len()).unwrap_or(u32::MAX),
            node_count: order.len(),
        });
    }
    let wire_index: AHashMap<NodeId, u16> = order
        .iter()
        .enumerate()
        .map(|(i, id)| (*id, i as u16))
        .collect();

    let mut strings: Vec<String> = Vec::new();
    let mut string_index: AHashMap<String, u16> = AHashMap::new();
    for id in &order {
        if let Some(Literal::String(s)) = &ast.get(*id).value {
            intern(&mut strings, &mut string_index, s);
        }
    }

    let string_table = encode_string_table(&strings);
    let mut node_bytes = Vec::new();
    for id in &order {
        encode_node(ast.get(*id), &wire_index, &string_index, &mut node_bytes)?;
    }

    let mut out = Vec::with_capacity(HEADER_LEN + string_table.len() + node_bytes.len());
    out.extend_from_slice(&MAGIC.to_le_bytes());
    out.extend_from_slice(&VERSION.to_le_bytes());
    out.extend_from_slice(&0u16.to_le_bytes()); // flags, reserved
    out.extend_from_slice(&(order.len() as u32).to_le_bytes());
    out.extend_from_slice(&(string_table.len() as u32).to_le_bytes());
    out.extend_from_slice(&string_table);
    out.extend_from_slice(&node_bytes);
    Ok(out)
}

fn intern(strings: &mut Vec<String>, index: &mut AHashMap<String, u16>, s: &str) -> u16 {
    if let Some(&i) = index.get(s) {
        return i;
    }
    let i = strings.len() as u16;
    strings.push(s.to_owned());
    index.insert(s.to_owned(), i);
    i
}

fn encode_string_table(strings: &[String]) -> Vec<u8> {
    let mut buf = Vec::new();
    buf.extend_from_slice(&(strings.len() as u32).to_le_bytes());
    for s in strings {
        let bytes = s.as_bytes();
        buf.extend_from_slice(&(bytes.len() as u16).to_le_bytes());
        buf.extend_from_slice(bytes);
        buf.push(0x00);
    }
    let padded = align_to_4(buf.len());
    buf.resize(padded, 0);
    buf
}

/// Depth-first, children-before-returning traversal with the root fixed at
/// index 0 (§4.2.1 rule 1). Since every `NodeData` variant projects its
/// children through the same canonical slots the rest of the crate uses,
/// this already produces the `VarDecl` flattening the spec calls out: no
/// separate special case is needed (see `ast::NodeData::VarDecl`'s and
/// `Declarator`'s `children()` behavior).
fn pre_order(ast: &Ast, root: NodeId) -> Vec<NodeId> {
    let mut order = Vec::with_capacity(ast.len());
    let mut stack = vec![root];
    let mut emit_order = Vec::new();
    while let Some(id) = stack.pop() {
        emit_order.push(id);
        let children = ast.get(id).children();
        for child in children.into_iter().rev() {
            stack.push(child);
        }
    }
    // `stack`-based DFS above visits in pre-order already (LIFO reverses
    // children back to forward order); `emit_order` is that pre-order.
    order.extend(emit_order);
    order
}

fn encode_node(
    node: &AstNode,
    wire_index: &AHashMap<NodeId, u16>,
    string_index: &AHashMap<String, u16>,
    out: &mut Vec<u8>,
) -> Result<(), FormatError> {
    let mut payload = Vec::new();
    if let Some(value) = &node.value {
        encode_tagged_value(value, string_index, &mut payload);
    }
    if !node.children().is_empty() {
        for child in node.children() {
            let idx = *wire_index.get(&child).expect("child must be in traversal order");
            payload.extend_from_slice(&idx.to_le_bytes());
        }
    }

    out.push(node.kind.to_wire_byte());
    out.push(node.flags.bits());
    out.extend_from_slice(&(payload.len() as u16).to_le_bytes());
    out.extend_from_slice(&payload);
    Ok(())
}

fn encode_tagged_value(value: &Literal, string_index: &AHashMap<String, u16>, out: &mut Vec<u8>) {
    out.push(value.tag() as u8);
    match value {
        Literal::Void | Literal::Null => {}
        Literal::Bool(b) => out.push(u8::from(*b)),
        Literal::Int8(v) => out.push(*v as u8),
        Literal::UInt8(v) => out.push(*v),
        Literal::Int16(v) => out.extend_from_slice(&v.to_le_bytes()),
        Literal::UInt16(v) => out.extend_from_slice(&v.to_le_bytes()),
        Literal::Int32(v) => out.extend_from_slice(&v.to_le_bytes()),
        Literal::UInt32(v) => out.extend_from_slice(&v.to_le_bytes()),
        Literal::Int64(v) => out.extend_from_slice(&v.to_le_bytes()),
        Literal::UInt64(v) => out.extend_from_slice(&v.to_le_bytes()),
        Literal::Float32(v) => out.extend_from_slice(&v.to_le_bytes()),
        Literal::Float64(v) => out.extend_from_slice(&v.to_le_bytes()),
        Literal::String(s) => {
            let idx = *string_index.get(s).expect("string must be interned");
            out.extend_from_slice(&idx.to_le_bytes());
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ast::{AstNode, NodeData, NodeKind};

    #[test]
    fn encodes_header_with_correct_magic_and_counts() {
        let mut ast = Ast::new();
        ast.push(AstNode::new(NodeKind::Program, None, NodeData::Program { body: vec![] }));
        let bytes = encode(&ast).unwrap();
        assert_eq!(&bytes[0..4], &MAGIC.to_le_bytes());
        assert_eq!(u16::from_le_bytes([bytes[4], bytes[5]]), VERSION);
        let node_count = u32::from_le_bytes([bytes[8], bytes[9], bytes[10], bytes[11]]);
        assert_eq!(node_count, 1);
    }

    #[test]
    fn string_table_deduplicates_identical_strings() {
        // `Program` must sit at NodeId 0 (§4.2.1 rule 1) for `encode` to
        // traverse from it; reserve that slot before building its children.
        let mut ast = Ast::new();
        let root = ast.push(AstNode::new(NodeKind::Program, None, NodeData::Program { body: vec![] }));
        let a = ast.push(AstNode::new(
            NodeKind::Identifier,
            Some(Literal::String("x".to_owned())),
            NodeData::NameRef,
        ));
        let b = ast.push(AstNode::new(
            NodeKind::Identifier,
            Some(Literal::String("x".to_owned())),
            NodeData::NameRef,
        ));
        *ast.get_mut(root) = AstNode::new(NodeKind::Program, None, NodeData::Program { body: vec![a, b] });
        let bytes = encode(&ast).unwrap();
        let string_table_size =
            u32::from_le_bytes([bytes[12], bytes[13], bytes[14], bytes[15]]) as usize;
        let table = &bytes[HEADER_LEN..HEADER_LEN + string_table_size];
        let string_count = u32::from_le_bytes([table[0], table[1], table[2], table[3]]);
        assert_eq!(string_count, 1);
    }
}
