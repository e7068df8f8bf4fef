//! Per-variant message handlers.
//!
//! Each variant has one zero-sized handler implementing four roles:
//!
//! - [`Parser`]: bytes at a cursor to a typed message
//! - [`Preparator`]: fill computed fields from the context
//! - [`Serializer`]: typed message to canonical bytes
//! - [`ContextAdjuster`]: apply the message's effect to the context
//!
//! The roles are typed over the variant struct. [`MessageHandler`] erases
//! them to [`ProtocolMessage`] so the pipeline can dispatch through
//! [`HandlerRegistry`] by [`MessageKind`].

mod content;
mod hello;
mod key_exchange;

use bytes::Bytes;
use tlsmith_proto::{
    HandshakeFields, HandshakeHeader, HandshakeType, MessageKind, MessageVariant, ProtocolError,
    ProtocolMessage, WireReader, handshake::wrap_handshake,
};

pub use content::{
    AlertHandler, ApplicationDataHandler, ChangeCipherSpecHandler, UnknownHandler,
};
pub use hello::{ClientHelloHandler, HelloVerifyRequestHandler, ServerHelloHandler};
pub use key_exchange::{
    CertificateHandler, ClientKeyExchangeHandler, FinishedHandler, HelloRequestHandler,
    ServerHelloDoneHandler,
};

use crate::{
    context::TlsContext,
    error::{AdjustmentError, PipelineError},
};

/// Binds a handler to the variant it serves.
pub trait Handler: Send + Sync + 'static {
    /// Variant struct
    type Message: MessageVariant;
}

/// Decodes one message starting at the reader's cursor.
pub trait Parser: Handler {
    /// Decode a message, leaving the cursor just past it.
    fn parse(&self, reader: &mut WireReader<'_>) -> Result<Self::Message, PipelineError>;
}

/// Computes field values from the context.
///
/// Every computation goes through [`tlsmith_proto::Field::compute`], so
/// forced fields are never overwritten.
pub trait Preparator: Handler {
    /// Compute the fields of an outbound message.
    fn prepare(&self, message: &mut Self::Message, context: &mut TlsContext)
    -> Result<(), PipelineError>;

    /// Compute fields that depend on the rest of the message, such as lengths.
    fn after_prepare(
        &self,
        _message: &mut Self::Message,
        _context: &mut TlsContext,
    ) -> Result<(), PipelineError> {
        Ok(())
    }

    /// Complete a received message. `reverse` flips the order in which the
    /// two sides' values are combined.
    fn prepare_after_parse(
        &self,
        _message: &mut Self::Message,
        _context: &mut TlsContext,
        _reverse: bool,
    ) -> Result<(), PipelineError> {
        Ok(())
    }
}

/// Encodes a prepared message.
pub trait Serializer: Handler {
    /// Canonical wire bytes. Fails on unset fields.
    fn serialize(&self, message: &Self::Message) -> Result<Bytes, PipelineError>;
}

/// Applies a message's effect to the context.
pub trait ContextAdjuster: Handler {
    /// Update the context. Failure is reported, never fatal.
    fn adjust(&self, message: &Self::Message, context: &mut TlsContext)
    -> Result<(), AdjustmentError>;
}

/// Type-erased handler over [`ProtocolMessage`].
pub trait MessageHandler: Send + Sync {
    /// Variant served.
    fn kind(&self) -> MessageKind;

    /// See [`Parser::parse`].
    fn parse(&self, reader: &mut WireReader<'_>) -> Result<ProtocolMessage, PipelineError>;

    /// See [`Preparator::prepare`].
    fn prepare(&self, message: &mut ProtocolMessage, context: &mut TlsContext)
    -> Result<(), PipelineError>;

    /// See [`Preparator::after_prepare`].
    fn after_prepare(
        &self,
        message: &mut ProtocolMessage,
        context: &mut TlsContext,
    ) -> Result<(), PipelineError>;

    /// See [`Preparator::prepare_after_parse`].
    fn prepare_after_parse(
        &self,
        message: &mut ProtocolMessage,
        context: &mut TlsContext,
        reverse: bool,
    ) -> Result<(), PipelineError>;

    /// See [`Serializer::serialize`].
    fn serialize(&self, message: &ProtocolMessage) -> Result<Bytes, PipelineError>;

    /// See [`ContextAdjuster::adjust`].
    fn adjust(&self, message: &ProtocolMessage, context: &mut TlsContext)
    -> Result<(), AdjustmentError>;
}

fn mismatch<M: MessageVariant>(message: &ProtocolMessage) -> PipelineError {
    PipelineError::VariantMismatch { expected: M::KIND, actual: message.kind() }
}

fn typed<M: MessageVariant>(message: &ProtocolMessage) -> Result<&M, PipelineError> {
    M::from_message(message).ok_or_else(|| mismatch::<M>(message))
}

fn typed_mut<M: MessageVariant>(message: &mut ProtocolMessage) -> Result<&mut M, PipelineError> {
    let actual = message.kind();
    M::from_message_mut(message)
        .ok_or(PipelineError::VariantMismatch { expected: M::KIND, actual })
}

impl<H> MessageHandler for H
where
    H: Parser + Preparator + Serializer + ContextAdjuster,
{
    fn kind(&self) -> MessageKind {
        H::Message::KIND
    }

    fn parse(&self, reader: &mut WireReader<'_>) -> Result<ProtocolMessage, PipelineError> {
        Parser::parse(self, reader).map(Into::into)
    }

    fn prepare(
        &self,
        message: &mut ProtocolMessage,
        context: &mut TlsContext,
    ) -> Result<(), PipelineError> {
        Preparator::prepare(self, typed_mut::<H::Message>(message)?, context)
    }

    fn after_prepare(
        &self,
        message: &mut ProtocolMessage,
        context: &mut TlsContext,
    ) -> Result<(), PipelineError> {
        Preparator::after_prepare(self, typed_mut::<H::Message>(message)?, context)
    }

    fn prepare_after_parse(
        &self,
        message: &mut ProtocolMessage,
        context: &mut TlsContext,
        reverse: bool,
    ) -> Result<(), PipelineError> {
        Preparator::prepare_after_parse(self, typed_mut::<H::Message>(message)?, context, reverse)
    }

    fn serialize(&self, message: &ProtocolMessage) -> Result<Bytes, PipelineError> {
        Serializer::serialize(self, typed::<H::Message>(message)?)
    }

    fn adjust(
        &self,
        message: &ProtocolMessage,
        context: &mut TlsContext,
    ) -> Result<(), AdjustmentError> {
        let typed = H::Message::from_message(message).ok_or_else(|| {
            AdjustmentError::not_adjustable(format!(
                "{} handler received {}",
                H::Message::KIND,
                message.kind()
            ))
        })?;
        ContextAdjuster::adjust(self, typed, context)
    }
}

/// Variant-keyed handler lookup.
#[derive(Debug, Clone, Copy, Default)]
pub struct HandlerRegistry;

impl HandlerRegistry {
    /// Handler for `kind`.
    pub fn handler(kind: MessageKind) -> &'static dyn MessageHandler {
        match kind {
            MessageKind::HelloRequest => &HelloRequestHandler,
            MessageKind::ClientHello => &ClientHelloHandler,
            MessageKind::ServerHello => &ServerHelloHandler,
            MessageKind::HelloVerifyRequest => &HelloVerifyRequestHandler,
            MessageKind::Certificate => &CertificateHandler,
            MessageKind::ServerHelloDone => &ServerHelloDoneHandler,
            MessageKind::ClientKeyExchange => &ClientKeyExchangeHandler,
            MessageKind::Finished => &FinishedHandler,
            MessageKind::ChangeCipherSpec => &ChangeCipherSpecHandler,
            MessageKind::Alert => &AlertHandler,
            MessageKind::ApplicationData => &ApplicationDataHandler,
            MessageKind::Unknown => &UnknownHandler,
        }
    }

    /// Handler for a message.
    pub fn for_message(message: &ProtocolMessage) -> &'static dyn MessageHandler {
        Self::handler(message.kind())
    }
}

/// Read a handshake header of type `expected` and return it with a reader
/// over exactly the declared body.
pub(crate) fn parse_handshake<'a>(
    reader: &mut WireReader<'a>,
    expected: HandshakeType,
) -> Result<(HandshakeFields, WireReader<'a>), PipelineError> {
    let header = HandshakeHeader::parse(reader).map_err(PipelineError::Parse)?;
    if header.msg_type != expected.to_u8() {
        return Err(PipelineError::Parse(ProtocolError::UnexpectedHandshakeType {
            expected: expected.to_u8(),
            actual: header.msg_type,
        }));
    }
    let body = reader.read_bytes(header.length as usize).map_err(PipelineError::Parse)?;

    let fields = HandshakeFields {
        msg_type: tlsmith_proto::Field::Set(header.msg_type),
        length: tlsmith_proto::Field::Set(header.length),
    };
    Ok((fields, WireReader::new(body)))
}

/// Compute the header type byte.
pub(crate) fn prepare_handshake_type(header: &mut HandshakeFields, msg_type: HandshakeType) {
    header.msg_type.compute(msg_type.to_u8());
}

/// Compute the header length from the serialised body.
pub(crate) fn prepare_handshake_length(header: &mut HandshakeFields, body: &[u8]) {
    header.length.compute(body.len() as u32);
}

/// Prefix `body` with the header fields.
pub(crate) fn serialize_handshake(
    kind: MessageKind,
    header: &HandshakeFields,
    body: &[u8],
) -> Result<Bytes, PipelineError> {
    let msg_type = *header.msg_type.require("msg_type").map_err(serialization(kind))?;
    let length = *header.length.require("length").map_err(serialization(kind))?;
    wrap_handshake(msg_type, length, body).map_err(serialization(kind))
}

/// Map a body encoding error to a serialisation failure of `kind`.
pub(crate) fn serialization(kind: MessageKind) -> impl Fn(ProtocolError) -> PipelineError {
    move |source| PipelineError::Serialization { kind, source }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn registry_covers_every_kind() {
        for kind in MessageKind::ALL {
            assert_eq!(HandlerRegistry::handler(kind).kind(), kind);
        }
    }

    #[test]
    fn erased_handler_rejects_other_variant() {
        let handler = HandlerRegistry::handler(MessageKind::Finished);
        let message: ProtocolMessage = tlsmith_proto::Alert::forced(1, 0).into();

        assert_eq!(
            handler.serialize(&message),
            Err(PipelineError::VariantMismatch {
                expected: MessageKind::Finished,
                actual: MessageKind::Alert
            })
        );
    }

    #[test]
    fn handshake_header_type_is_checked() {
        let bytes = [14u8, 0, 0, 0];
        let mut reader = WireReader::new(&bytes);

        assert!(matches!(
            parse_handshake(&mut reader, HandshakeType::Finished),
            Err(PipelineError::Parse(ProtocolError::UnexpectedHandshakeType {
                expected: 20,
                actual: 14
            }))
        ));
    }
}
