//! Host + embedded decoder (§4.2.2). Three re-entrant phases — header,
//! string table, nodes-and-linking — matching the spec's phase breakdown
//! so a caller could in principle cache each phase's output separately
//! (embedded targets decoding a large tree incrementally from ROM).

use crate::ast::{Ast, AstNode, Literal, NodeData, NodeId, NodeKind, NodeFlags, ValueTag};
use crate::error::FormatError;

use super::{align_to_4, HEADER_LEN, MAGIC, VERSION};

/// Decodes a CompactAST buffer into an [`Ast`].
///
/// # Errors
/// Returns [`FormatError`] for any malformed input: bad magic, unsupported
/// version, truncated buffer, a corrupt string table, an unrecognized
/// node-type byte outside the forward-compatible fallback, or an
/// out-of-range / root-as-child reference. All are fatal to the whole
/// parse (§4.2.2).
pub fn decode(bytes: &[u8]) -> Result<Ast, FormatError> {
    let header = Header::parse(bytes)?;
    log::debug!(
        "compact_ast: header parsed (node_count={}, string_table_size={})",
        header.node_count,
        header.string_table_size
    );
    let strings = parse_string_table(bytes, HEADER_LEN, header.string_table_size)?;
    log::debug!("compact_ast: string table has {} entr(y/ies)", strings.len());
    let node_data_start = HEADER_LEN + header.string_table_size;
    let raw_nodes = parse_raw_nodes(bytes, node_data_start, header.node_count, &strings)?;
    link(raw_nodes)
}

struct Header {
    node_count: usize,
    string_table_size: usize,
}

impl Header {
    fn parse(bytes: &[u8]) -> Result<Self, FormatError> {
        if bytes.len() < HEADER_LEN {
            return Err(FormatError::TruncatedBuffer {
                offset: bytes.len(),
                needed: HEADER_LEN - bytes.len(),
            });
        }
        let magic = read_u32(bytes, 0)?;
        if magic != MAGIC {
            return Err(FormatError::InvalidMagic { found: magic });
        }
        let version = read_u16(bytes, 4)?;
        if version != VERSION {
            return Err(FormatError::UnsupportedVersion { found: version });
        }
        // bytes[6..8] are the reserved flags field; ignored.
        let node_count = read_u32(bytes, 8)? as usize;
        if node_count == 0 {
            return Err(FormatError::TruncatedBuffer {
                offset: 8,
                needed: 1,
            });
        }
        let string_table_size = read_u32(bytes, 12)? as usize;
        if HEADER_LEN + string_table_size > bytes.len() {
            return Err(FormatError::TruncatedBuffer {
                offset: HEADER_LEN,
                needed: (HEADER_LEN + string_table_size).saturating_sub(bytes.len()),
            });
        }
        Ok(Self {
            node_count,
            string_table_size,
        })
    }
}

fn parse_string_table(bytes: &[u8], start: usize, size: usize) -> Result<Vec<String>, FormatError> {
    let table = &bytes[start..start + size];
    if table.len() < 4 {
        return Err(FormatError::CorruptStringTable {
            offset: start,
            reason: "missing string count".to_owned(),
        });
    }
    let count = u32::from_le_bytes([table[0], table[1], table[2], table[3]]) as usize;
    let mut strings = Vec::with_capacity(count);
    let mut offset = 4;
    for _ in 0..count {
        if offset + 2 > table.len() {
            return Err(FormatError::CorruptStringTable {
                offset: start + offset,
                reason: "truncated string length".to_owned(),
            });
        }
        let len = u16::from_le_bytes([table[offset], table[offset + 1]]) as usize;
        offset += 2;
        if offset + len + 1 > table.len() {
            return Err(FormatError::CorruptStringTable {
                offset: start + offset,
                reason: "truncated string payload or missing NUL terminator".to_owned(),
            });
        }
        let str_bytes = &table[offset..offset + len];
        let s = std::str::from_utf8(str_bytes)
            .map_err(|_| FormatError::CorruptStringTable {
                offset: start + offset,
                reason: "invalid UTF-8".to_owned(),
            })?
            .to_owned();
        offset += len;
        if table[offset] != 0x00 {
            return Err(FormatError::CorruptStringTable {
                offset: start + offset,
                reason: "missing NUL terminator".to_owned(),
            });
        }
        offset += 1;
        strings.push(s);
    }
    // Remaining bytes up to `size` are 4-byte-alignment padding; nothing to validate.
    let _ = align_to_4(offset);
    Ok(strings)
}

/// A node as read off the wire, before parent/child linking resolves its
/// named slots (§4.2.2 phase 3).
struct RawNode {
    kind: NodeKind,
    flags: NodeFlags,
    value: Option<Literal>,
    children: Vec<u32>,
}

fn parse_raw_nodes(
    bytes: &[u8],
    start: usize,
    node_count: usize,
    strings: &[String],
) -> Result<Vec<RawNode>, FormatError> {
    let mut nodes = Vec::with_capacity(node_count);
    let mut offset = start;
    for index in 0..node_count {
        if offset + 4 > bytes.len() {
            return Err(FormatError::TruncatedBuffer {
                offset,
                needed: offset + 4 - bytes.len(),
            });
        }
        let type_byte = bytes[offset];
        let flags = NodeFlags::from_bits_truncate(bytes[offset + 1]);
        let data_size = u16::from_le_bytes([bytes[offset + 2], bytes[offset + 3]]) as usize;
        offset += 4;
        if offset + data_size > bytes.len() {
            return Err(FormatError::TruncatedBuffer {
                offset,
                needed: offset + data_size - bytes.len(),
            });
        }
        let payload = &bytes[offset..offset + data_size];
        offset += data_size;

        let kind = NodeKind::from_wire_byte(type_byte);
        if kind == NodeKind::Unknown && type_byte != NodeKind::Unknown.to_wire_byte() {
            log::warn!(
                "compact_ast: node {index} has unrecognized type byte {type_byte:#04X}, mapping to generic Unknown node"
            );
        }

        let mut cursor = 0usize;
        let value = if flags.contains(NodeFlags::HAS_VALUE) {
            let (v, consumed) = parse_tagged_value(payload, cursor, strings, index)?;
            cursor += consumed;
            Some(v)
        } else {
            None
        };

        let children = if flags.contains(NodeFlags::HAS_CHILDREN) {
            parse_children(payload, cursor, index)?
        } else {
            Vec::new()
        };

        nodes.push(RawNode {
            kind,
            flags,
            value,
            children,
        });
    }
    Ok(nodes)
}

fn parse_tagged_value(
    payload: &[u8],
    offset: usize,
    strings: &[String],
    node_index: usize,
) -> Result<(Literal, usize), FormatError> {
    if offset >= payload.len() {
        return Err(FormatError::TruncatedBuffer {
            offset,
            needed: 1,
        });
    }
    let tag = ValueTag::from_wire_byte(payload[offset]).ok_or(FormatError::InvalidNodeType {
        index: node_index,
        byte: payload[offset],
    })?;
    let body = &payload[offset + 1..];
    let (literal, payload_len) = match tag {
        ValueTag::Void => (Literal::Void, 0),
        ValueTag::Null => (Literal::Null, 0),
        ValueTag::Bool => (Literal::Bool(need(body, 1, offset)?[0] != 0), 1),
        ValueTag::Int8 => (Literal::Int8(need(body, 1, offset)?[0] as i8), 1),
        ValueTag::UInt8 => (Literal::UInt8(need(body, 1, offset)?[0]), 1),
        ValueTag::Int16 => {
            let b = need(body, 2, offset)?;
            (Literal::Int16(i16::from_le_bytes([b[0], b[1]])), 2)
        }
        ValueTag::UInt16 => {
            let b = need(body, 2, offset)?;
            (Literal::UInt16(u16::from_le_bytes([b[0], b[1]])), 2)
        }
        ValueTag::Int32 => {
            let b = need(body, 4, offset)?;
            (Literal::Int32(i32::from_le_bytes([b[0], b[1], b[2], b[3]])), 4)
        }
        ValueTag::UInt32 => {
            let b = need(body, 4, offset)?;
            (Literal::UInt32(u32::from_le_bytes([b[0], b[1], b[2], b[3]])), 4)
        }
        ValueTag::Int64 => {
            let b = need(body, 8, offset)?;
            (
                Literal::Int64(i64::from_le_bytes(b.try_into().unwrap())),
                8,
            )
        }
        ValueTag::UInt64 => {
            let b = need(body, 8, offset)?;
            (
                Literal::UInt64(u64::from_le_bytes(b.try_into().unwrap())),
                8,
            )
        }
        ValueTag::Float32 => {
            let b = need(body, 4, offset)?;
            (
                Literal::Float32(f32::from_le_bytes([b[0], b[1], b[2], b[3]])),
                4,
            )
        }
        ValueTag::Float64 => {
            let b = need(body, 8, offset)?;
            (
                Literal::Float64(f64::from_le_bytes(b.try_into().unwrap())),
                8,
            )
        }
        ValueTag::String => {
            let b = need(body, 2, offset)?;
            let idx = u16::from_le_bytes([b[0], b[1]]) as usize;
            let s = strings
                .get(idx)
                .ok_or(FormatError::CorruptStringTable {
                    offset,
                    reason: format!("string index {idx} out of range"),
                })?
                .clone();
            (Literal::String(s), 2)
        }
    };
    Ok((literal, 1 + payload_len))
}

fn need(body: &[u8], len: usize, offset: usize) -> Result<&[u8], FormatError> {
    if body.len() < len {
        return Err(FormatError::TruncatedBuffer {
            offset,
            needed: len - body.len(),
        });
    }
    Ok(&body[..len])
}

fn parse_children(payload: &[u8], offset: usize, node_index: usize) -> Result<Vec<u32>, FormatError> {
    let remaining = &payload[offset..];
    if remaining.len() % 2 != 0 {
        return Err(FormatError::TruncatedBuffer {
            offset: offset + remaining.len() - (remaining.len() % 2),
            needed: 1,
        });
    }
    let mut children = Vec::with_capacity(remaining.len() / 2);
    for chunk in remaining.chunks_exact(2) {
        let idx = u16::from_le_bytes([chunk[0], chunk[1]]);
        let _ = node_index;
        children.push(u32::from(idx));
    }
    Ok(children)
}

fn read_u32(bytes: &[u8], offset: usize) -> Result<u32, FormatError> {
    bytes
        .get(offset..offset + 4)
        .map(|b| u32::from_le_bytes([b[0], b[1], b[2], b[3]]))
        .ok_or(FormatError::TruncatedBuffer {
            offset,
            needed: offset + 4 - bytes.len(),
        })
}

fn read_u16(bytes: &[u8], offset: usize) -> Result<u16, FormatError> {
    bytes
        .get(offset..offset + 2)
        .map(|b| u16::from_le_bytes([b[0], b[1]]))
        .ok_or(FormatError::TruncatedBuffer {
            offset,
            needed: offset + 2 - bytes.len(),
        })
}

/// Phase 3: assigns each node's wire-order child-index list into its typed
/// named slots (§4.2.2 linking rule). Walks parents in highest-index-first
/// order with the root deferred to last, exactly as the spec prescribes,
/// so that no node is read out of the raw array before every reference to
/// it as a child has already been consumed.
fn link(raw_nodes: Vec<RawNode>) -> Result<Ast, FormatError> {
    let node_count = raw_nodes.len();
    for (index, raw) in raw_nodes.iter().enumerate() {
        for &child in &raw.children {
            if child == 0 {
                return Err(FormatError::RootUsedAsChild { index });
            }
            if child as usize >= node_count {
                return Err(FormatError::ChildIndexOutOfRange {
                    index,
                    child,
                    node_count,
                });
            }
        }
    }

    let mut built: Vec<Option<AstNode>> = (0..node_count).map(|_| None).collect();
    // Highest-parent-index first, root (index 0) deferred to last.
    let mut order: Vec<usize> = (1..node_count).collect();
    order.sort_unstable_by(|a, b| b.cmp(a));
    order.push(0);

    for parent_index in order {
        let raw = &raw_nodes[parent_index];
        let data = build_node_data(raw.kind, &raw.children, raw.value.as_ref())?;
        built[parent_index] = Some(AstNode {
            kind: raw.kind,
            flags: raw.flags,
            value: raw.value.clone(),
            data,
        });
    }

    let mut ast = Ast::new();
    // `built` is indexed by original wire index; `Ast::push` assigns ids in
    // push order, so pushing 0..node_count in order keeps NodeId(i) == wire
    // index i, matching encode's `pre_order` numbering.
    let mut taken: Vec<AstNode> = built.into_iter().map(|n| n.expect("every node linked")).collect();
    taken.reverse();
    while let Some(node) = taken.pop() {
        ast.push(node);
    }
    Ok(ast)
}

/// Assigns `children` (wire indices of an already-built node) into the
/// canonical named-slot layout for `kind` (§4.2.2's per-kind assignment
/// rules). Nodes without a named-slot layout (`kind.is_structural_parent()`
/// is false) just keep an ordered generic child list.
///
/// `Case`'s `test: Option<NodeId>` can't be recovered from its children
/// alone (a `default:` case's body looks just like a test expression
/// followed by a shorter body), so a `Case` node's `value` slot always
/// carries `Literal::Bool(has_test)` rather than a name or constant; every
/// encoder producing this wire format must follow the same convention.
fn build_node_data(
    kind: NodeKind,
    children: &[u32],
    value: Option<&Literal>,
) -> Result<NodeData, FormatError> {
    let ids: Vec<NodeId> = children.iter().map(|&c| NodeId::new(c)).collect();

    Ok(match kind {
        NodeKind::Program => NodeData::Program { body: ids },
        NodeKind::Error => NodeData::ErrorNode,
        NodeKind::Comment => NodeData::Comment,
        NodeKind::Compound => NodeData::Compound { body: ids },
        NodeKind::Expression => NodeData::ExpressionStmt {
            expr: *ids.first().expect("Expression statement missing its expr child"),
        },
        NodeKind::If => {
            let condition = ids[0];
            let consequent = ids[1];
            let alternate = ids.get(2).copied();
            NodeData::If {
                condition,
                consequent,
                alternate,
            }
        }
        NodeKind::While => NodeData::While {
            condition: ids[0],
            body: ids[1],
        },
        NodeKind::DoWhile => NodeData::DoWhile {
            condition: ids[0],
            body: ids[1],
        },
        NodeKind::For => {
            // §4.2.2 canonical order: initializer, condition, increment, body.
            // Any of the first three may be absent (an `Empty` placeholder
            // node is never emitted for them by this encoder, so arity here
            // is exactly however many of the 4 canonical slots are present).
            let body = *ids.last().expect("For node missing body child");
            let optional = &ids[..ids.len() - 1];
            NodeData::For {
                init: optional.first().copied(),
                condition: optional.get(1).copied(),
                increment: optional.get(2).copied(),
                body,
            }
        }
        NodeKind::RangeFor => NodeData::RangeFor {
            binding: ids[0],
            iterable: ids[1],
            body: ids[2],
        },
        NodeKind::Switch => NodeData::Switch {
            discriminant: ids[0],
            cases: ids[1..].to_vec(),
        },
        NodeKind::Case => match value {
            Some(Literal::Bool(true)) => NodeData::Case {
                test: Some(*ids.first().expect("non-default Case missing its test child")),
                body: ids[1..].to_vec(),
            },
            Some(Literal::Bool(false)) => NodeData::Case { test: None, body: ids },
            // Tolerate wire input that omits the marker (any encoder not
            // following this crate's convention): a nonempty child list is
            // assumed test-first, an empty one is a bodyless default case.
            _ if ids.is_empty() => NodeData::Case { test: None, body: ids },
            _ => NodeData::Case {
                test: Some(ids[0]),
                body: ids[1..].to_vec(),
            },
        },
        NodeKind::Return => NodeData::Return { value: ids.first().copied() },
        NodeKind::Break => NodeData::Break,
        NodeKind::Continue => NodeData::Continue,
        NodeKind::Empty => NodeData::Empty,
        NodeKind::VarDecl => {
            let var_type = *ids.first().expect("VarDecl missing its type child");
            NodeData::VarDecl {
                var_type,
                declarators: ids[1..].to_vec(),
            }
        }
        NodeKind::FuncDef => {
            let return_type = *ids.first().expect("FuncDef missing its return-type child");
            let body = *ids.last().expect("FuncDef missing its body child");
            let params = ids[1..ids.len() - 1].to_vec();
            NodeData::FuncDef {
                return_type,
                params,
                body,
            }
        }
        NodeKind::FuncDecl => {
            let return_type = *ids.first().expect("FuncDecl missing its return-type child");
            NodeData::FuncDecl {
                return_type,
                params: ids[1..].to_vec(),
            }
        }
        NodeKind::StructDecl => NodeData::StructDecl { fields: ids },
        NodeKind::TypedefDecl => NodeData::TypedefDecl {
            underlying: *ids.first().expect("TypedefDecl missing its underlying child"),
        },
        NodeKind::BinaryOp => NodeData::BinaryOp {
            left: ids[0],
            right: ids[1],
        },
        NodeKind::UnaryOp => NodeData::UnaryOp {
            operand: ids[0],
            prefix: true,
        },
        NodeKind::Assignment => NodeData::Assignment {
            target: ids[0],
            value: ids[1],
        },
        NodeKind::FuncCall => {
            let callee = *ids.first().expect("FuncCall missing its callee child");
            NodeData::FuncCall {
                callee,
                args: ids[1..].to_vec(),
            }
        }
        NodeKind::MemberAccess => NodeData::MemberAccess {
            object: ids[0],
            property: ids[1],
        },
        NodeKind::ArrayAccess => NodeData::ArrayAccess {
            array: ids[0],
            index: ids[1],
        },
        NodeKind::ConstructorCall => {
            let type_name = *ids.first().expect("ConstructorCall missing its type-name child");
            NodeData::ConstructorCall {
                type_name,
                args: ids[1..].to_vec(),
            }
        }
        NodeKind::Postfix => NodeData::Postfix { operand: ids[0] },
        NodeKind::Ternary => NodeData::Ternary {
            condition: ids[0],
            consequent: ids[1],
            alternate: ids[2],
        },
        NodeKind::Comma => NodeData::Comma { items: ids },
        NodeKind::Number | NodeKind::StringLit | NodeKind::CharLit | NodeKind::Constant => NodeData::Leaf,
        NodeKind::Identifier => NodeData::NameRef,
        NodeKind::ArrayInit => NodeData::ArrayInit { elements: ids },
        NodeKind::Type | NodeKind::StructType => NodeData::NameRef,
        NodeKind::Declarator => NodeData::Declarator {
            initializer: ids.first().copied(),
        },
        NodeKind::Param => NodeData::Param {
            param_type: *ids.first().expect("Param missing its type child"),
        },
        NodeKind::FunctionPointerDeclarator => NodeData::FunctionPointerDeclarator { params: ids },
        NodeKind::ArrayDeclarator => NodeData::ArrayDeclarator {
            size: ids.first().copied(),
        },
        NodeKind::PointerDeclarator => NodeData::Declarator {
            initializer: ids.first().copied(),
        },
        NodeKind::Unknown => NodeData::Unknown { children: ids },
    })
}
