//! The closed family of AST node variants and their wire-stable type tags.
//!
//! Every node carries a [`NodeKind`], a [`NodeFlags`] bitset, an optional
//! [`Literal`] value, and zero or more children (see [`super::AstNode`]).
//! The numeric discriminants below are normative: they are exactly the byte
//! values written to and read from CompactAST node headers (§6.1), so they
//! must never be renumbered once a format version ships.

use strum::{Display, EnumString};

/// Stable, wire-level type tag for an AST node.
///
/// Discriminants match the CompactAST node-type table in the wire format
/// specification. Gaps inside an assigned range (e.g. `0x24..0x27` under
/// declarations) are reserved for future node kinds and must not be reused.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Display, EnumString)]
#[repr(u8)]
pub enum NodeKind {
    // Program / meta
    Program = 0x01,
    Error = 0x02,
    Comment = 0x03,

    // Statements (0x10..=0x1F)
    Compound = 0x10,
    Expression = 0x11,
    If = 0x12,
    While = 0x13,
    DoWhile = 0x14,
    For = 0x15,
    RangeFor = 0x16,
    Switch = 0x17,
    Case = 0x18,
    Return = 0x19,
    Break = 0x1A,
    Continue = 0x1B,
    Empty = 0x1F,

    // Declarations (0x20..=0x2F)
    VarDecl = 0x20,
    FuncDef = 0x21,
    FuncDecl = 0x22,
    StructDecl = 0x23,
    TypedefDecl = 0x27,

    // Expressions (0x30..=0x3F)
    BinaryOp = 0x30,
    UnaryOp = 0x31,
    Assignment = 0x32,
    FuncCall = 0x33,
    MemberAccess = 0x34,
    ArrayAccess = 0x35,
    ConstructorCall = 0x36,
    Postfix = 0x37,
    Ternary = 0x38,
    Comma = 0x39,

    // Literals (0x40..=0x4F)
    Number = 0x40,
    StringLit = 0x41,
    CharLit = 0x42,
    Identifier = 0x43,
    Constant = 0x44,
    ArrayInit = 0x45,

    // Types / declarator helpers (0x50..=0x5F)
    Type = 0x50,
    Declarator = 0x51,
    Param = 0x52,
    StructType = 0x53,
    FunctionPointerDeclarator = 0x54,
    ArrayDeclarator = 0x55,
    PointerDeclarator = 0x56,

    /// Forward-compatibility placeholder for a reserved/unrecognized tag
    /// encountered by the decoder (§4.2.2, Open Question 2 in `DESIGN.md`).
    /// Never produced by the encoder; only ever constructed by the decoder.
    Unknown = 0xFF,
}

impl NodeKind {
    /// Maps a raw wire byte to a `NodeKind`, falling back to `Unknown` for
    /// any value not in the closed set rather than failing the whole parse.
    #[must_use]
    pub fn from_wire_byte(byte: u8) -> Self {
        match byte {
            0x01 => Self::Program,
            0x02 => Self::Error,
            0x03 => Self::Comment,
            0x10 => Self::Compound,
            0x11 => Self::Expression,
            0x12 => Self::If,
            0x13 => Self::While,
            0x14 => Self::DoWhile,
            0x15 => Self::For,
            0x16 => Self::RangeFor,
            0x17 => Self::Switch,
            0x18 => Self::Case,
            0x19 => Self::Return,
            0x1A => Self::Break,
            0x1B => Self::Continue,
            0x1F => Self::Empty,
            0x20 => Self::VarDecl,
            0x21 => Self::FuncDef,
            0x22 => Self::FuncDecl,
            0x23 => Self::StructDecl,
            0x27 => Self::TypedefDecl,
            0x30 => Self::BinaryOp,
            0x31 => Self::UnaryOp,
            0x32 => Self::Assignment,
            0x33 => Self::FuncCall,
            0x34 => Self::MemberAccess,
            0x35 => Self::ArrayAccess,
            0x36 => Self::ConstructorCall,
            0x37 => Self::Postfix,
            0x38 => Self::Ternary,
            0x39 => Self::Comma,
            0x40 => Self::Number,
            0x41 => Self::StringLit,
            0x42 => Self::CharLit,
            0x43 => Self::Identifier,
            0x44 => Self::Constant,
            0x45 => Self::ArrayInit,
            0x50 => Self::Type,
            0x51 => Self::Declarator,
            0x52 => Self::Param,
            0x53 => Self::StructType,
            0x54 => Self::FunctionPointerDeclarator,
            0x55 => Self::ArrayDeclarator,
            0x56 => Self::PointerDeclarator,
            _ => Self::Unknown,
        }
    }

    /// Returns the wire byte for this kind. `Unknown` round-trips as `0xFF`,
    /// a reserved tag that decodes back to `Unknown` rather than the
    /// original (unrecoverable) tag value.
    #[must_use]
    pub fn to_wire_byte(self) -> u8 {
        self as u8
    }

    /// True for nodes whose children are projected through named slots
    /// (`if`'s condition/consequent/alternate, `for`'s init/cond/incr/body,
    /// etc.) rather than being a flat ordered list consumers index by hand.
    #[must_use]
    pub fn is_structural_parent(self) -> bool {
        matches!(
            self,
            Self::FuncDef
                | Self::VarDecl
                | Self::Expression
                | Self::FuncCall
                | Self::Ternary
                | Self::MemberAccess
                | Self::If
                | Self::While
                | Self::DoWhile
                | Self::For
                | Self::RangeFor
                | Self::Switch
                | Self::BinaryOp
                | Self::UnaryOp
                | Self::Assignment
                | Self::ArrayAccess
                | Self::Postfix
        )
    }
}

bitflags::bitflags! {
    /// Per-node bitset, written as a single byte in the CompactAST wire format.
    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    pub struct NodeFlags: u8 {
        /// Node's payload includes a trailing list of child indices.
        const HAS_CHILDREN = 0b0000_0001;
        /// Node's payload includes a leading tagged [`Literal`](super::Literal).
        const HAS_VALUE = 0b0000_0010;
    }
}
