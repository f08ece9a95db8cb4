//! Error types for the identifier primitives.

use thiserror::Error;

/// Result type for identifier parsing operations.
pub type TypesResult<T> = Result<T, TypesError>;

/// Errors that can occur when parsing or constructing identifiers.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum TypesError {
    /// Hex string did not decode to valid bytes.
    #[error("invalid hex encoding: {0}")]
    InvalidHex(String),

    /// Decoded byte string had the wrong length for the target type.
    #[error("invalid length: expected {expected} bytes, got {actual}")]
    InvalidLength { expected: usize, actual: usize },

    /// `ItemId` string did not contain the expected `logicalTS:peerID` parts.
    #[error("invalid ItemId format: {0}")]
    InvalidItemId(String),
}
