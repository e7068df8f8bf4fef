//! Typed message model.
//!
//! [`ProtocolMessage`] is a closed set of variants. Each variant struct holds
//! its wire fields as [`Field`](crate::field::Field) values plus a
//! [`MessageMeta`] with the final wire bytes and the digest/adjustment flags.
//! [`MessageKind`] is the fieldless tag handlers are registered under.

mod content;
mod hello;
mod key_exchange;

use std::fmt;

use bytes::Bytes;

pub use content::{Alert, ApplicationData, ChangeCipherSpec, Unknown};
pub use hello::{ClientHello, HelloVerifyRequest, ServerHello};
pub use key_exchange::{
    Certificate, ClientKeyExchange, Finished, HelloRequest, KeyExchangeComputations,
    ServerHelloDone,
};

use crate::{
    constants::{ContentType, HandshakeType},
    errors::{ProtocolError, Result},
    field::{Field, ModifiableFields},
};

/// Bookkeeping shared by every message.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MessageMeta {
    complete_resulting_message: Option<Bytes>,
    /// Count this message into the transcript digest (handshake messages only)
    pub include_in_digest: bool,
    /// Let sending or receiving this message adjust the connection context
    pub adjust_context: bool,
}

impl Default for MessageMeta {
    fn default() -> Self {
        Self { complete_resulting_message: None, include_in_digest: true, adjust_context: true }
    }
}

impl MessageMeta {
    /// The exact bytes this message was sent or received as.
    pub fn complete_resulting_message(&self) -> Option<&Bytes> {
        self.complete_resulting_message.as_ref()
    }

    /// Record the final wire bytes. Fails if they were already recorded.
    pub fn set_complete_resulting_message(&mut self, bytes: Bytes) -> Result<()> {
        if self.complete_resulting_message.is_some() {
            return Err(ProtocolError::CompleteMessageAlreadySet);
        }
        self.complete_resulting_message = Some(bytes);
        Ok(())
    }

    /// Forget the recorded bytes so the message can be sent again.
    pub fn clear_complete_resulting_message(&mut self) {
        self.complete_resulting_message = None;
    }
}

/// Type byte and 24-bit length shared by handshake messages.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct HandshakeFields {
    /// Handshake type byte
    pub msg_type: Field<u8>,
    /// Body length
    pub length: Field<u32>,
}

/// Registry key for handlers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum MessageKind {
    /// HelloRequest
    HelloRequest,
    /// ClientHello
    ClientHello,
    /// ServerHello
    ServerHello,
    /// HelloVerifyRequest
    HelloVerifyRequest,
    /// Certificate
    Certificate,
    /// ServerHelloDone
    ServerHelloDone,
    /// ClientKeyExchange
    ClientKeyExchange,
    /// Finished
    Finished,
    /// ChangeCipherSpec
    ChangeCipherSpec,
    /// Alert
    Alert,
    /// ApplicationData
    ApplicationData,
    /// Bytes no handler could decode
    Unknown,
}

impl MessageKind {
    /// Every kind, in declaration order.
    pub const ALL: [Self; 12] = [
        Self::HelloRequest,
        Self::ClientHello,
        Self::ServerHello,
        Self::HelloVerifyRequest,
        Self::Certificate,
        Self::ServerHelloDone,
        Self::ClientKeyExchange,
        Self::Finished,
        Self::ChangeCipherSpec,
        Self::Alert,
        Self::ApplicationData,
        Self::Unknown,
    ];

    /// Kind for a handshake type byte.
    pub fn from_handshake_type(msg_type: u8) -> Option<Self> {
        match HandshakeType::from_u8(msg_type)? {
            HandshakeType::HelloRequest => Some(Self::HelloRequest),
            HandshakeType::ClientHello => Some(Self::ClientHello),
            HandshakeType::ServerHello => Some(Self::ServerHello),
            HandshakeType::HelloVerifyRequest => Some(Self::HelloVerifyRequest),
            HandshakeType::Certificate => Some(Self::Certificate),
            HandshakeType::ServerHelloDone => Some(Self::ServerHelloDone),
            HandshakeType::ClientKeyExchange => Some(Self::ClientKeyExchange),
            HandshakeType::Finished => Some(Self::Finished),
            HandshakeType::ServerKeyExchange
            | HandshakeType::CertificateRequest
            | HandshakeType::CertificateVerify => None,
        }
    }

    /// Kind for a non-handshake content type byte.
    pub fn from_content_type(content_type: u8) -> Option<Self> {
        match ContentType::from_u8(content_type)? {
            ContentType::ChangeCipherSpec => Some(Self::ChangeCipherSpec),
            ContentType::Alert => Some(Self::Alert),
            ContentType::ApplicationData => Some(Self::ApplicationData),
            ContentType::Handshake | ContentType::Heartbeat => None,
        }
    }

    /// Handshake type of this kind, `None` for non-handshake kinds.
    pub fn handshake_type(self) -> Option<HandshakeType> {
        match self {
            Self::HelloRequest => Some(HandshakeType::HelloRequest),
            Self::ClientHello => Some(HandshakeType::ClientHello),
            Self::ServerHello => Some(HandshakeType::ServerHello),
            Self::HelloVerifyRequest => Some(HandshakeType::HelloVerifyRequest),
            Self::Certificate => Some(HandshakeType::Certificate),
            Self::ServerHelloDone => Some(HandshakeType::ServerHelloDone),
            Self::ClientKeyExchange => Some(HandshakeType::ClientKeyExchange),
            Self::Finished => Some(HandshakeType::Finished),
            Self::ChangeCipherSpec | Self::Alert | Self::ApplicationData | Self::Unknown => None,
        }
    }

    /// True for handshake messages.
    pub fn is_handshake(self) -> bool {
        self.handshake_type().is_some()
    }

    /// Record content type carrying this kind. `None` for [`Self::Unknown`],
    /// whose content type is stored on the message.
    pub fn content_type(self) -> Option<ContentType> {
        match self {
            Self::ChangeCipherSpec => Some(ContentType::ChangeCipherSpec),
            Self::Alert => Some(ContentType::Alert),
            Self::ApplicationData => Some(ContentType::ApplicationData),
            Self::Unknown => None,
            _ => Some(ContentType::Handshake),
        }
    }
}

impl fmt::Display for MessageKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Debug::fmt(self, f)
    }
}

/// A message of any variant.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ProtocolMessage {
    /// HelloRequest
    HelloRequest(HelloRequest),
    /// ClientHello
    ClientHello(ClientHello),
    /// ServerHello
    ServerHello(ServerHello),
    /// HelloVerifyRequest
    HelloVerifyRequest(HelloVerifyRequest),
    /// Certificate
    Certificate(Certificate),
    /// ServerHelloDone
    ServerHelloDone(ServerHelloDone),
    /// ClientKeyExchange
    ClientKeyExchange(ClientKeyExchange),
    /// Finished
    Finished(Finished),
    /// ChangeCipherSpec
    ChangeCipherSpec(ChangeCipherSpec),
    /// Alert
    Alert(Alert),
    /// ApplicationData
    ApplicationData(ApplicationData),
    /// Undecodable bytes
    Unknown(Unknown),
}

/// Expand `$body` once per variant with `$inner` bound to the variant struct.
macro_rules! each_variant {
    ($message:expr, $inner:ident => $body:expr) => {
        match $message {
            ProtocolMessage::HelloRequest($inner) => $body,
            ProtocolMessage::ClientHello($inner) => $body,
            ProtocolMessage::ServerHello($inner) => $body,
            ProtocolMessage::HelloVerifyRequest($inner) => $body,
            ProtocolMessage::Certificate($inner) => $body,
            ProtocolMessage::ServerHelloDone($inner) => $body,
            ProtocolMessage::ClientKeyExchange($inner) => $body,
            ProtocolMessage::Finished($inner) => $body,
            ProtocolMessage::ChangeCipherSpec($inner) => $body,
            ProtocolMessage::Alert($inner) => $body,
            ProtocolMessage::ApplicationData($inner) => $body,
            ProtocolMessage::Unknown($inner) => $body,
        }
    };
}

impl ProtocolMessage {
    /// Variant tag.
    pub fn kind(&self) -> MessageKind {
        match self {
            Self::HelloRequest(_) => MessageKind::HelloRequest,
            Self::ClientHello(_) => MessageKind::ClientHello,
            Self::ServerHello(_) => MessageKind::ServerHello,
            Self::HelloVerifyRequest(_) => MessageKind::HelloVerifyRequest,
            Self::Certificate(_) => MessageKind::Certificate,
            Self::ServerHelloDone(_) => MessageKind::ServerHelloDone,
            Self::ClientKeyExchange(_) => MessageKind::ClientKeyExchange,
            Self::Finished(_) => MessageKind::Finished,
            Self::ChangeCipherSpec(_) => MessageKind::ChangeCipherSpec,
            Self::Alert(_) => MessageKind::Alert,
            Self::ApplicationData(_) => MessageKind::ApplicationData,
            Self::Unknown(_) => MessageKind::Unknown,
        }
    }

    /// Shared bookkeeping.
    pub fn meta(&self) -> &MessageMeta {
        each_variant!(self, m => &m.meta)
    }

    /// Shared bookkeeping, mutably.
    pub fn meta_mut(&mut self) -> &mut MessageMeta {
        each_variant!(self, m => &mut m.meta)
    }

    /// Named field access.
    pub fn fields(&self) -> &dyn ModifiableFields {
        each_variant!(self, m => m as &dyn ModifiableFields)
    }

    /// Named field access, mutably.
    pub fn fields_mut(&mut self) -> &mut dyn ModifiableFields {
        each_variant!(self, m => m as &mut dyn ModifiableFields)
    }

    /// True for handshake messages.
    pub fn is_handshake(&self) -> bool {
        self.kind().is_handshake()
    }

    /// True if the message may enter the transcript digest: handshake
    /// variants, and captures of one framed handshake message of a type
    /// without a handler.
    pub fn is_digestible(&self) -> bool {
        match self {
            Self::Unknown(unknown) => unknown.is_framed_handshake(),
            other => other.is_handshake(),
        }
    }

    /// Record content type byte this message travels in.
    pub fn content_type(&self) -> u8 {
        match self {
            Self::Unknown(unknown) => unknown.content_type,
            other => other.kind().content_type().map_or(ContentType::Handshake.to_u8(), ContentType::to_u8),
        }
    }

    /// Final wire bytes, if produced.
    pub fn complete_resulting_message(&self) -> Option<&Bytes> {
        self.meta().complete_resulting_message()
    }
}

/// Typed access from the erased message to one variant struct.
pub trait MessageVariant: Sized + Into<ProtocolMessage> {
    /// Tag of this variant
    const KIND: MessageKind;

    /// Borrow the variant out of a message.
    fn from_message(message: &ProtocolMessage) -> Option<&Self>;

    /// Mutably borrow the variant out of a message.
    fn from_message_mut(message: &mut ProtocolMessage) -> Option<&mut Self>;
}

macro_rules! message_variant {
    ($($variant:ident),* $(,)?) => {
        $(
            impl MessageVariant for $variant {
                const KIND: MessageKind = MessageKind::$variant;

                fn from_message(message: &ProtocolMessage) -> Option<&Self> {
                    match message {
                        ProtocolMessage::$variant(inner) => Some(inner),
                        _ => None,
                    }
                }

                fn from_message_mut(message: &mut ProtocolMessage) -> Option<&mut Self> {
                    match message {
                        ProtocolMessage::$variant(inner) => Some(inner),
                        _ => None,
                    }
                }
            }

            impl From<$variant> for ProtocolMessage {
                fn from(inner: $variant) -> Self {
                    Self::$variant(inner)
                }
            }
        )*
    };
}

message_variant!(
    HelloRequest,
    ClientHello,
    ServerHello,
    HelloVerifyRequest,
    Certificate,
    ServerHelloDone,
    ClientKeyExchange,
    Finished,
    ChangeCipherSpec,
    Alert,
    ApplicationData,
    Unknown,
);
