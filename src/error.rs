//! Error types for codec construction, encoding and decoding

use thiserror::Error;

/// Result type for codec operations
pub type FecResult<T> = Result<T, FecError>;

/// Errors that can occur during Reed-Solomon codec operations
#[derive(Debug, Error, PartialEq, Eq)]
pub enum FecError {
    /// Field width outside the supported range
    #[error("unsupported field width {0} (supported range is 2..=16)")]
    UnsupportedFieldWidth(u32),

    /// Code parameters outside the legal range for the field
    #[error("invalid parameters k {k} n {n} for field of {capacity} elements")]
    InvalidParams { k: usize, n: usize, capacity: usize },

    /// Packet index outside the code
    #[error("invalid index {index} (max {max})")]
    InvalidIndex { index: usize, max: usize },

    /// Two received packets carry the same index
    #[error("duplicate packet index {0}")]
    DuplicateIndex(usize),

    /// Matrix inversion failed; the received index set is not decodable
    #[error("singular matrix at column {0}")]
    SingularMatrix(usize),

    /// Packet buffers passed to one call differ in length
    #[error("packet length mismatch: expected {expected} bytes, got {actual}")]
    LengthMismatch { expected: usize, actual: usize },

    /// Packet length does not divide into whole field elements
    #[error("packet length {len} is not a multiple of the {element_bytes}-byte element size")]
    UnalignedLength { len: usize, element_bytes: usize },

    /// Wrong number of packet buffers or indices for this code
    #[error("expected {expected} packets, got {actual}")]
    PacketCountMismatch { expected: usize, actual: usize },

    /// The descriptor's integrity tag no longer matches its contents
    #[error("corrupt codec descriptor (integrity tag mismatch)")]
    Corrupt,
}
