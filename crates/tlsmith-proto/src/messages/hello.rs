use super::{HandshakeFields, MessageMeta};
use crate::field::{Field, modifiable_fields};

/// ClientHello.
///
/// Extensions are optional on the wire. They are emitted when
/// `extensions_length` or `extension_bytes` holds a value.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ClientHello {
    /// Bookkeeping
    pub meta: MessageMeta,
    /// Handshake header
    pub header: HandshakeFields,
    /// Highest version offered
    pub protocol_version: Field<u16>,
    /// First four bytes of the random
    pub unix_time: Field<u32>,
    /// Remaining 28 bytes of the random
    pub random: Field<Vec<u8>>,
    /// Session id length
    pub session_id_length: Field<u8>,
    /// Session id
    pub session_id: Field<Vec<u8>>,
    /// Cipher suite list length in bytes
    pub cipher_suite_length: Field<u16>,
    /// Cipher suites, two bytes each
    pub cipher_suites: Field<Vec<u8>>,
    /// Compression method count
    pub compression_length: Field<u8>,
    /// Compression methods
    pub compressions: Field<Vec<u8>>,
    /// Extension block length
    pub extensions_length: Field<u16>,
    /// Raw extension block
    pub extension_bytes: Field<Vec<u8>>,
}

modifiable_fields!(ClientHello {
    "msg_type" => header.msg_type: U8,
    "length" => header.length: U24,
    "protocol_version" => protocol_version: U16,
    "unix_time" => unix_time: U32,
    "random" => random: Bytes,
    "session_id_length" => session_id_length: U8,
    "session_id" => session_id: Bytes,
    "cipher_suite_length" => cipher_suite_length: U16,
    "cipher_suites" => cipher_suites: Bytes,
    "compression_length" => compression_length: U8,
    "compressions" => compressions: Bytes,
    "extensions_length" => extensions_length: U16,
    "extension_bytes" => extension_bytes: Bytes,
});

impl ClientHello {
    /// True if the extension block is present.
    pub fn has_extensions(&self) -> bool {
        self.extensions_length.is_set() || self.extension_bytes.is_set()
    }
}

/// ServerHello.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ServerHello {
    /// Bookkeeping
    pub meta: MessageMeta,
    /// Handshake header
    pub header: HandshakeFields,
    /// Selected version
    pub protocol_version: Field<u16>,
    /// First four bytes of the random
    pub unix_time: Field<u32>,
    /// Remaining 28 bytes of the random
    pub random: Field<Vec<u8>>,
    /// Session id length
    pub session_id_length: Field<u8>,
    /// Session id
    pub session_id: Field<Vec<u8>>,
    /// Selected cipher suite
    pub selected_cipher_suite: Field<u16>,
    /// Selected compression method
    pub selected_compression: Field<u8>,
    /// Extension block length
    pub extensions_length: Field<u16>,
    /// Raw extension block
    pub extension_bytes: Field<Vec<u8>>,
}

modifiable_fields!(ServerHello {
    "msg_type" => header.msg_type: U8,
    "length" => header.length: U24,
    "protocol_version" => protocol_version: U16,
    "unix_time" => unix_time: U32,
    "random" => random: Bytes,
    "session_id_length" => session_id_length: U8,
    "session_id" => session_id: Bytes,
    "selected_cipher_suite" => selected_cipher_suite: U16,
    "selected_compression" => selected_compression: U8,
    "extensions_length" => extensions_length: U16,
    "extension_bytes" => extension_bytes: Bytes,
});

impl ServerHello {
    /// True if the extension block is present.
    pub fn has_extensions(&self) -> bool {
        self.extensions_length.is_set() || self.extension_bytes.is_set()
    }
}

/// DTLS HelloVerifyRequest. The model exists so the message can be named in
/// traces; its handler reports every role as unsupported.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct HelloVerifyRequest {
    /// Bookkeeping
    pub meta: MessageMeta,
    /// Handshake header
    pub header: HandshakeFields,
    /// Server version
    pub protocol_version: Field<u16>,
    /// Cookie length
    pub cookie_length: Field<u8>,
    /// Cookie
    pub cookie: Field<Vec<u8>>,
}

modifiable_fields!(HelloVerifyRequest {
    "msg_type" => header.msg_type: U8,
    "length" => header.length: U24,
    "protocol_version" => protocol_version: U16,
    "cookie_length" => cookie_length: U8,
    "cookie" => cookie: Bytes,
});
