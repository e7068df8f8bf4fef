//! Connection configuration.
//!
//! Preparators fall back on these values for every field they compute. The
//! config is an owned value handed to [`crate::context::TlsContext::new`].

use std::time::Duration;

use serde::{Deserialize, Serialize};
use tlsmith_proto::{
    AlertDescription, AlertLevel, CipherSuite, CompressionMethod, ProtocolVersion,
    constants::{MASTER_SECRET_LENGTH, MAX_FRAGMENT_LENGTH},
};

/// Which side of the connection the engine plays.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ConnectionEnd {
    /// Sends ClientHello
    Client,
    /// Sends ServerHello
    Server,
}

impl ConnectionEnd {
    /// The other side.
    pub fn peer(self) -> Self {
        match self {
            Self::Client => Self::Server,
            Self::Server => Self::Client,
        }
    }
}

/// Hash behind the transcript digest and the PRF.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DigestAlgorithm {
    /// SHA-256
    Sha256,
    /// SHA-384
    Sha384,
}

impl DigestAlgorithm {
    /// Hash a negotiated TLS 1.2 suite uses for its PRF and transcript.
    pub fn for_cipher_suite(suite: CipherSuite) -> Self {
        if suite.uses_sha384() { Self::Sha384 } else { Self::Sha256 }
    }

    /// Output length in bytes.
    pub fn output_len(self) -> usize {
        match self {
            Self::Sha256 => 32,
            Self::Sha384 => 48,
        }
    }
}

/// Engine configuration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct TlsConfig {
    /// Version offered in hellos
    pub highest_protocol_version: ProtocolVersion,
    /// Version written into record headers
    pub record_version: ProtocolVersion,
    /// Side played by the engine
    pub connection_end: ConnectionEnd,
    /// Suites offered by the client, first one selected by the server
    pub cipher_suites: Vec<CipherSuite>,
    /// Compression methods offered, first one selected
    pub compression_methods: Vec<CompressionMethod>,
    /// Session id sent in hellos
    pub session_id: Vec<u8>,
    /// Raw extension block; `None` omits extensions
    pub extension_bytes: Option<Vec<u8>>,
    /// Encoded certificate list sent in Certificate
    pub certificate_chain: Vec<u8>,
    /// Exchange keys sent in ClientKeyExchange
    pub client_key_exchange: Vec<u8>,
    /// Premaster secret fed to the master secret PRF
    pub premaster_secret: Vec<u8>,
    /// Master secret used before one was negotiated
    pub default_master_secret: Vec<u8>,
    /// Transcript and PRF hash
    pub digest_algorithm: DigestAlgorithm,
    /// Largest record fragment produced when sending
    pub max_fragment_length: usize,
    /// How long a receive waits for the peer
    #[serde(with = "duration_millis")]
    pub response_timeout: Duration,
    /// Order of the randoms in prepare-after-parse computations
    pub reverse_prepare_after_parse: bool,
    /// Level of prepared alerts
    pub alert_level: u8,
    /// Description of prepared alerts
    pub alert_description: u8,
    /// Payload of prepared application data
    pub application_data: Vec<u8>,
}

impl Default for TlsConfig {
    fn default() -> Self {
        let mut premaster_secret = vec![0u8; MASTER_SECRET_LENGTH];
        premaster_secret[..2].copy_from_slice(&ProtocolVersion::TLS12.to_bytes());

        Self {
            highest_protocol_version: ProtocolVersion::TLS12,
            record_version: ProtocolVersion::TLS12,
            connection_end: ConnectionEnd::Client,
            cipher_suites: vec![
                CipherSuite::TLS_RSA_WITH_AES_128_CBC_SHA,
                CipherSuite::TLS_ECDHE_RSA_WITH_AES_128_GCM_SHA256,
            ],
            compression_methods: vec![CompressionMethod::NULL],
            session_id: Vec::new(),
            extension_bytes: None,
            certificate_chain: Vec::new(),
            client_key_exchange: Vec::new(),
            premaster_secret,
            default_master_secret: vec![0u8; MASTER_SECRET_LENGTH],
            digest_algorithm: DigestAlgorithm::Sha256,
            max_fragment_length: MAX_FRAGMENT_LENGTH,
            response_timeout: Duration::from_secs(1),
            reverse_prepare_after_parse: false,
            alert_level: AlertLevel::Fatal as u8,
            alert_description: AlertDescription::HandshakeFailure as u8,
            application_data: b"test".to_vec(),
        }
    }
}

impl TlsConfig {
    /// Default configuration for a server.
    pub fn server() -> Self {
        Self { connection_end: ConnectionEnd::Server, ..Self::default() }
    }
}

mod duration_millis {
    use std::time::Duration;

    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(value: &Duration, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_u64(value.as_millis() as u64)
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Duration, D::Error> {
        u64::deserialize(deserializer).map(Duration::from_millis)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_premaster_carries_version() {
        let config = TlsConfig::default();
        assert_eq!(config.premaster_secret.len(), 48);
        assert_eq!(&config.premaster_secret[..2], &[0x03, 0x03]);
    }

    #[test]
    fn partial_json_fills_defaults() {
        let config: TlsConfig = serde_json::from_str(
            r#"{"connection_end": "server", "response_timeout": 250,
                "digest_algorithm": "sha384"}"#,
        )
        .expect("valid config");

        assert_eq!(config.connection_end, ConnectionEnd::Server);
        assert_eq!(config.response_timeout, Duration::from_millis(250));
        assert_eq!(config.digest_algorithm, DigestAlgorithm::Sha384);
        assert_eq!(config.max_fragment_length, 16_384);
    }

    #[test]
    fn json_round_trip() {
        let config = TlsConfig {
            extension_bytes: Some(vec![0xff, 0x01, 0x00, 0x01, 0x00]),
            ..TlsConfig::server()
        };
        let json = serde_json::to_string(&config).expect("serializable");
        let back: TlsConfig = serde_json::from_str(&json).expect("deserializable");
        assert_eq!(back, config);
    }
}
