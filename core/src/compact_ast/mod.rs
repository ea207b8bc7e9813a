//! CompactAST (§4.2, §6.1): byte-exact round trip between an in-memory
//! [`crate::ast::Ast`] and a compact, portable, 4-byte-aligned binary
//! representation.
//!
//! Hand-rolled little-endian encoding throughout (`to_le_bytes`,
//! `extend_from_slice`, chunked `u16`/`u32` reads), the same approach the
//! teacher's bytecode `builder.rs` uses rather than reaching for a crate
//! like `byteorder`: the wire layout is a handful of fixed-width integers
//! and the exact byte order is itself part of what's being specified, so
//! writing it out plainly is clearer than hiding it behind a trait.

mod decoder;
mod encoder;

pub use decoder::decode;
pub use encoder::encode;

pub(crate) const MAGIC: u32 = 0x4153_5450;
pub(crate) const VERSION: u16 = 0x0100;
pub(crate) const HEADER_LEN: usize = 16;

pub(crate) fn align_to_4(len: usize) -> usize {
    (len + 3) & !3
}
