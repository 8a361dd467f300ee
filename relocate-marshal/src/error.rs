// relocate-marshal/src/error.rs
//! Error types for marshal decoding and encoding

use thiserror::Error;

/// Result type for marshal operations
pub type Result<T> = std::result::Result<T, MarshalError>;

/// Errors raised while reading or writing a marshal stream
#[derive(Error, Debug)]
pub enum MarshalError {
    /// Input ended before a complete value could be read
    #[error("unexpected end of data at offset {offset} (needed {wanted} more bytes)")]
    Truncated { offset: usize, wanted: usize },

    /// Type byte does not name a known marshal type
    #[error("unknown type code 0x{code:02x} at offset {offset}")]
    UnknownType { code: u8, offset: usize },

    /// Back-reference to a slot that was never registered
    #[error("invalid back-reference {index} at offset {offset}")]
    BadReference { index: u32, offset: usize },

    /// Length or count field is negative
    #[error("negative length {len} at offset {offset}")]
    NegativeLength { len: i32, offset: usize },

    /// NULL appeared where an object is required
    #[error("unexpected NULL object at offset {0}")]
    UnexpectedNull(usize),

    /// Nesting exceeds the reader/writer depth limit
    #[error("object nesting deeper than {0} levels")]
    TooDeep(usize),

    /// Magic number does not belong to a supported Python 3 release
    #[error("unsupported magic number {0}")]
    UnsupportedMagic(u16),

    /// File header is shorter than its version requires or lacks `\r\n`
    #[error("bad header: {0}")]
    BadHeader(String),

    /// Bytes remain after the root object
    #[error("{0} trailing bytes after root object")]
    TrailingData(usize),

    /// A value cannot be represented in its recorded encoding
    #[error("value too large to encode: {0}")]
    Oversized(String),

    /// Graph has no root object to serialize
    #[error("object graph has no root")]
    EmptyGraph,
}
