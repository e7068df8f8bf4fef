//! Wire format for the tlsmith TLS testing engine.
//!
//! Everything in this crate is stateless: record framing, the handshake
//! header, bounds-checked readers and writers, and the typed message model.
//! Connection state, transcript hashing and the per-message pipeline live in
//! `tlsmith-core`.
//!
//! # Adversarial input
//!
//! The engine exists to send and receive broken TLS. Decoders therefore keep
//! unknown content types, versions and enum values as raw integers instead of
//! rejecting them, and the record layer accepts any byte string. Every read
//! is bounds checked and reports [`ProtocolError::Truncated`] rather than
//! panicking.
//!
//! # Fields
//!
//! Each message variant is a struct of [`Field`] values. A field is either
//! computed from connection state during preparation or forced by the test
//! author, never both. The overridable fields of each variant are declared
//! statically through [`ModifiableFields`], so mutation tooling can enumerate
//! and pin them by name without reflection.
#![forbid(unsafe_code)]
#![warn(missing_docs)]

pub mod constants;
pub mod errors;
pub mod field;
pub mod handshake;
pub mod messages;
pub mod record;
pub mod wire;

pub use constants::{
    AlertDescription, AlertLevel, CipherSuite, CompressionMethod, ContentType, HandshakeType,
    ProtocolVersion,
};
pub use errors::{ProtocolError, Result};
pub use field::{
    Field, FieldDescriptor, FieldKind, FieldType, FieldValue, ModifiableFields, random_field,
};
pub use handshake::{HANDSHAKE_HEADER_LENGTH, HandshakeHeader};
pub use messages::{
    Alert, ApplicationData, Certificate, ChangeCipherSpec, ClientHello, ClientKeyExchange,
    Finished, HandshakeFields, HelloRequest, HelloVerifyRequest, KeyExchangeComputations,
    MessageKind, MessageMeta, MessageVariant, ProtocolMessage, ServerHello, ServerHelloDone,
    Unknown,
};
pub use record::{ParsedRecords, Record, RecordHeader, RecordLayer, RecordStream, defragment};
pub use wire::{WireReader, WireWriter};
