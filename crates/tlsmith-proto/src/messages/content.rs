use super::MessageMeta;
use crate::{
    constants::ContentType,
    field::{Field, modifiable_fields},
    handshake::HandshakeHeader,
};

/// ChangeCipherSpec.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ChangeCipherSpec {
    /// Bookkeeping
    pub meta: MessageMeta,
    /// Always 1 in a valid message
    pub ccs_type: Field<u8>,
}

modifiable_fields!(ChangeCipherSpec {
    "ccs_type" => ccs_type: U8,
});

/// Alert.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Alert {
    /// Bookkeeping
    pub meta: MessageMeta,
    /// Level byte, kept raw
    pub level: Field<u8>,
    /// Description byte, kept raw
    pub description: Field<u8>,
}

modifiable_fields!(Alert {
    "level" => level: U8,
    "description" => description: U8,
});

impl Alert {
    /// Alert with both bytes forced.
    pub fn forced(level: u8, description: u8) -> Self {
        Self {
            meta: MessageMeta::default(),
            level: Field::Forced(level),
            description: Field::Forced(description),
        }
    }
}

/// ApplicationData, sent in the clear.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ApplicationData {
    /// Bookkeeping
    pub meta: MessageMeta,
    /// Payload
    pub data: Field<Vec<u8>>,
}

modifiable_fields!(ApplicationData {
    "data" => data: Bytes,
});

/// Capture of bytes no handler could decode.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Unknown {
    /// Bookkeeping
    pub meta: MessageMeta,
    /// Record content type the bytes arrived in
    pub content_type: u8,
    /// Raw bytes
    pub data: Field<Vec<u8>>,
}

modifiable_fields!(Unknown {
    "data" => data: Bytes,
});

impl Unknown {
    /// Capture `data` received under `content_type`.
    pub fn new(content_type: u8, data: Vec<u8>) -> Self {
        Self { meta: MessageMeta::default(), content_type, data: Field::Set(data) }
    }

    /// True if the bytes arrived as handshake content and hold exactly one
    /// message whose header length matches.
    pub fn is_framed_handshake(&self) -> bool {
        self.content_type == ContentType::Handshake.to_u8()
            && self.data.value().is_some_and(|data| {
                HandshakeHeader::peek(data, 0).is_some_and(|h| h.total_length() == data.len())
            })
    }
}
