//! Error types for wire encoding and decoding.

use crate::field::FieldKind;

/// Result alias used throughout the wire crate.
pub type Result<T> = std::result::Result<T, ProtocolError>;

/// Errors raised while reading, writing or mutating wire structures.
///
/// None of these are fatal to the engine. Decoding failures are reported to
/// the caller, which typically captures the offending bytes as an unknown
/// message and keeps going.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ProtocolError {
    /// Input ended before a field could be read.
    #[error("truncated input: need {needed} bytes, {available} available")]
    Truncated {
        /// Bytes required by the read
        needed: usize,
        /// Bytes left in the buffer
        available: usize,
    },

    /// A length does not fit into its wire field.
    #[error("value {value} does not fit in a {bits}-bit field")]
    LengthOverflow {
        /// Offending value
        value: usize,
        /// Width of the wire field
        bits: u8,
    },

    /// Serialisation reached a field that was neither computed nor forced.
    #[error("field '{field}' has no value")]
    FieldUnset {
        /// Field name from the variant's descriptor
        field: &'static str,
    },

    /// A field name is not part of the variant's descriptor list.
    #[error("unknown field '{name}'")]
    UnknownField {
        /// Requested name
        name: String,
    },

    /// A forced value has the wrong shape for the field.
    #[error("field '{field}' expects {expected:?}, got {actual:?}")]
    FieldKindMismatch {
        /// Field name
        field: String,
        /// Kind declared by the descriptor
        expected: FieldKind,
        /// Kind of the supplied value
        actual: FieldKind,
    },

    /// A handshake parser was pointed at a message of another type.
    #[error("unexpected handshake type {actual} (expected {expected})")]
    UnexpectedHandshakeType {
        /// Type the parser decodes
        expected: u8,
        /// Type byte found on the wire
        actual: u8,
    },

    /// The final wire bytes of a message were already recorded.
    #[error("complete resulting message already set")]
    CompleteMessageAlreadySet,
}
