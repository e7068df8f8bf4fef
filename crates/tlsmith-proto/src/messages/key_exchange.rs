use super::{HandshakeFields, MessageMeta};
use crate::field::{Field, modifiable_fields};

/// HelloRequest: header only.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct HelloRequest {
    /// Bookkeeping
    pub meta: MessageMeta,
    /// Handshake header
    pub header: HandshakeFields,
}

modifiable_fields!(HelloRequest {
    "msg_type" => header.msg_type: U8,
    "length" => header.length: U24,
});

/// ServerHelloDone: header only.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ServerHelloDone {
    /// Bookkeeping
    pub meta: MessageMeta,
    /// Handshake header
    pub header: HandshakeFields,
}

modifiable_fields!(ServerHelloDone {
    "msg_type" => header.msg_type: U8,
    "length" => header.length: U24,
});

/// Certificate. The chain is kept as one opaque block.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Certificate {
    /// Bookkeeping
    pub meta: MessageMeta,
    /// Handshake header
    pub header: HandshakeFields,
    /// Length of the certificate list
    pub certificates_length: Field<u32>,
    /// Encoded certificate list
    pub certificate_bytes: Field<Vec<u8>>,
}

modifiable_fields!(Certificate {
    "msg_type" => header.msg_type: U8,
    "length" => header.length: U24,
    "certificates_length" => certificates_length: U24,
    "certificate_bytes" => certificate_bytes: Bytes,
});

/// Values derived while preparing a ClientKeyExchange. None of them travel on
/// the wire, but they are overridable like any other field.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct KeyExchangeComputations {
    /// Random values in the order fed to the master secret PRF
    pub client_server_random: Field<Vec<u8>>,
    /// Premaster secret
    pub premaster_secret: Field<Vec<u8>>,
    /// Master secret
    pub master_secret: Field<Vec<u8>>,
}

/// ClientKeyExchange with an opaque exchange key block.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ClientKeyExchange {
    /// Bookkeeping
    pub meta: MessageMeta,
    /// Handshake header
    pub header: HandshakeFields,
    /// Length of the exchange keys
    pub exchange_keys_length: Field<u16>,
    /// Encrypted premaster secret or public value
    pub exchange_keys: Field<Vec<u8>>,
    /// Derived secrets
    pub computations: KeyExchangeComputations,
}

modifiable_fields!(ClientKeyExchange {
    "msg_type" => header.msg_type: U8,
    "length" => header.length: U24,
    "exchange_keys_length" => exchange_keys_length: U16,
    "exchange_keys" => exchange_keys: Bytes,
    "client_server_random" => computations.client_server_random: Bytes,
    "premaster_secret" => computations.premaster_secret: Bytes,
    "master_secret" => computations.master_secret: Bytes,
});

/// Finished.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Finished {
    /// Bookkeeping
    pub meta: MessageMeta,
    /// Handshake header
    pub header: HandshakeFields,
    /// PRF output over the transcript hash
    pub verify_data: Field<Vec<u8>>,
}

modifiable_fields!(Finished {
    "msg_type" => header.msg_type: U8,
    "length" => header.length: U24,
    "verify_data" => verify_data: Bytes,
});
