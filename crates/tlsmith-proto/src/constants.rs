//! Protocol constants.
//!
//! Enumerations here are used for naming and display only. Wire structures
//! store the raw integer so that out-of-range values survive a round trip.

use std::fmt;

use serde::{Deserialize, Serialize};

/// Length of the random part of a hello message (the 4-byte timestamp is a
/// separate field).
pub const RANDOM_LENGTH: usize = 28;

/// Length of a hello random including the timestamp.
pub const FULL_RANDOM_LENGTH: usize = 32;

/// Length of TLS 1.2 Finished verify data.
pub const VERIFY_DATA_LENGTH: usize = 12;

/// Length of a TLS master secret.
pub const MASTER_SECRET_LENGTH: usize = 48;

/// Largest plaintext fragment allowed in one record.
pub const MAX_FRAGMENT_LENGTH: usize = 16_384;

/// Protocol version as carried on the wire.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct ProtocolVersion(pub u16);

impl ProtocolVersion {
    /// SSL 3.0
    pub const SSL3: Self = Self(0x0300);
    /// TLS 1.0
    pub const TLS10: Self = Self(0x0301);
    /// TLS 1.1
    pub const TLS11: Self = Self(0x0302);
    /// TLS 1.2
    pub const TLS12: Self = Self(0x0303);
    /// TLS 1.3
    pub const TLS13: Self = Self(0x0304);
    /// DTLS 1.0
    pub const DTLS10: Self = Self(0xFEFF);
    /// DTLS 1.2
    pub const DTLS12: Self = Self(0xFEFD);

    /// Big-endian wire form.
    pub fn to_bytes(self) -> [u8; 2] {
        self.0.to_be_bytes()
    }

    /// True for the datagram variants.
    pub fn is_dtls(self) -> bool {
        self.0 >> 8 == 0xFE
    }
}

impl fmt::Display for ProtocolVersion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match *self {
            Self::SSL3 => "SSL3",
            Self::TLS10 => "TLS1.0",
            Self::TLS11 => "TLS1.1",
            Self::TLS12 => "TLS1.2",
            Self::TLS13 => "TLS1.3",
            Self::DTLS10 => "DTLS1.0",
            Self::DTLS12 => "DTLS1.2",
            Self(other) => return write!(f, "0x{other:04x}"),
        };
        f.write_str(name)
    }
}

/// Cipher suite identifier.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct CipherSuite(pub u16);

impl CipherSuite {
    /// TLS_RSA_WITH_AES_128_CBC_SHA
    pub const TLS_RSA_WITH_AES_128_CBC_SHA: Self = Self(0x002F);
    /// TLS_RSA_WITH_AES_256_CBC_SHA
    pub const TLS_RSA_WITH_AES_256_CBC_SHA: Self = Self(0x0035);
    /// TLS_RSA_WITH_AES_128_CBC_SHA256
    pub const TLS_RSA_WITH_AES_128_CBC_SHA256: Self = Self(0x003C);
    /// TLS_RSA_WITH_AES_256_CBC_SHA256
    pub const TLS_RSA_WITH_AES_256_CBC_SHA256: Self = Self(0x003D);
    /// TLS_RSA_WITH_AES_256_GCM_SHA384
    pub const TLS_RSA_WITH_AES_256_GCM_SHA384: Self = Self(0x009D);
    /// TLS_ECDHE_ECDSA_WITH_AES_256_GCM_SHA384
    pub const TLS_ECDHE_ECDSA_WITH_AES_256_GCM_SHA384: Self = Self(0xC02C);
    /// TLS_ECDHE_RSA_WITH_AES_128_GCM_SHA256
    pub const TLS_ECDHE_RSA_WITH_AES_128_GCM_SHA256: Self = Self(0xC02F);
    /// TLS_ECDHE_RSA_WITH_AES_256_GCM_SHA384
    pub const TLS_ECDHE_RSA_WITH_AES_256_GCM_SHA384: Self = Self(0xC030);
    /// TLS_EMPTY_RENEGOTIATION_INFO_SCSV
    pub const TLS_EMPTY_RENEGOTIATION_INFO_SCSV: Self = Self(0x00FF);

    /// True for TLS 1.2 suites whose PRF and transcript hash is SHA-384.
    pub fn uses_sha384(self) -> bool {
        matches!(
            self.0,
            0x009D | 0x009F | 0x00A1 | 0x00A3 | 0x00A5 | 0x00A7 | 0x00A9 | 0x00AB | 0x00AD | 0x00AF
                | 0x00B1 | 0x00B3 | 0x00B5 | 0x00B7 | 0x00B9
                | 0xC024 | 0xC026 | 0xC028 | 0xC02A | 0xC02C | 0xC02E | 0xC030 | 0xC032
        )
    }

    /// Decode a cipher suite list, ignoring a trailing odd byte.
    pub fn list_from_bytes(bytes: &[u8]) -> Vec<Self> {
        bytes.chunks_exact(2).map(|pair| Self(u16::from_be_bytes([pair[0], pair[1]]))).collect()
    }

    /// Encode a cipher suite list without its length prefix.
    pub fn list_to_bytes(suites: &[Self]) -> Vec<u8> {
        suites.iter().flat_map(|suite| suite.0.to_be_bytes()).collect()
    }
}

/// Compression method identifier.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct CompressionMethod(pub u8);

impl CompressionMethod {
    /// No compression
    pub const NULL: Self = Self(0);
    /// DEFLATE
    pub const DEFLATE: Self = Self(1);
}

/// Record content types.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum ContentType {
    /// ChangeCipherSpec
    ChangeCipherSpec = 20,
    /// Alert
    Alert = 21,
    /// Handshake
    Handshake = 22,
    /// Application data
    ApplicationData = 23,
    /// Heartbeat
    Heartbeat = 24,
}

impl ContentType {
    /// Convert from the wire byte.
    pub fn from_u8(value: u8) -> Option<Self> {
        match value {
            20 => Some(Self::ChangeCipherSpec),
            21 => Some(Self::Alert),
            22 => Some(Self::Handshake),
            23 => Some(Self::ApplicationData),
            24 => Some(Self::Heartbeat),
            _ => None,
        }
    }

    /// Wire byte.
    pub fn to_u8(self) -> u8 {
        self as u8
    }
}

/// Handshake message types.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum HandshakeType {
    /// HelloRequest
    HelloRequest = 0,
    /// ClientHello
    ClientHello = 1,
    /// ServerHello
    ServerHello = 2,
    /// HelloVerifyRequest (DTLS)
    HelloVerifyRequest = 3,
    /// Certificate
    Certificate = 11,
    /// ServerKeyExchange
    ServerKeyExchange = 12,
    /// CertificateRequest
    CertificateRequest = 13,
    /// ServerHelloDone
    ServerHelloDone = 14,
    /// CertificateVerify
    CertificateVerify = 15,
    /// ClientKeyExchange
    ClientKeyExchange = 16,
    /// Finished
    Finished = 20,
}

impl HandshakeType {
    /// Convert from the wire byte.
    pub fn from_u8(value: u8) -> Option<Self> {
        match value {
            0 => Some(Self::HelloRequest),
            1 => Some(Self::ClientHello),
            2 => Some(Self::ServerHello),
            3 => Some(Self::HelloVerifyRequest),
            11 => Some(Self::Certificate),
            12 => Some(Self::ServerKeyExchange),
            13 => Some(Self::CertificateRequest),
            14 => Some(Self::ServerHelloDone),
            15 => Some(Self::CertificateVerify),
            16 => Some(Self::ClientKeyExchange),
            20 => Some(Self::Finished),
            _ => None,
        }
    }

    /// Wire byte.
    pub fn to_u8(self) -> u8 {
        self as u8
    }
}

/// Alert severity level.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum AlertLevel {
    /// Warning
    Warning = 1,
    /// Fatal
    Fatal = 2,
}

impl AlertLevel {
    /// Convert from the wire byte.
    pub fn from_u8(value: u8) -> Option<Self> {
        match value {
            1 => Some(Self::Warning),
            2 => Some(Self::Fatal),
            _ => None,
        }
    }
}

/// Alert descriptions used by the default configuration and tests.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum AlertDescription {
    /// close_notify
    CloseNotify = 0,
    /// unexpected_message
    UnexpectedMessage = 10,
    /// bad_record_mac
    BadRecordMac = 20,
    /// record_overflow
    RecordOverflow = 22,
    /// handshake_failure
    HandshakeFailure = 40,
    /// bad_certificate
    BadCertificate = 42,
    /// illegal_parameter
    IllegalParameter = 47,
    /// decode_error
    DecodeError = 50,
    /// decrypt_error
    DecryptError = 51,
    /// protocol_version
    ProtocolVersion = 70,
    /// internal_error
    InternalError = 80,
    /// no_renegotiation
    NoRenegotiation = 100,
}

impl AlertDescription {
    /// Convert from the wire byte.
    pub fn from_u8(value: u8) -> Option<Self> {
        match value {
            0 => Some(Self::CloseNotify),
            10 => Some(Self::UnexpectedMessage),
            20 => Some(Self::BadRecordMac),
            22 => Some(Self::RecordOverflow),
            40 => Some(Self::HandshakeFailure),
            42 => Some(Self::BadCertificate),
            47 => Some(Self::IllegalParameter),
            50 => Some(Self::DecodeError),
            51 => Some(Self::DecryptError),
            70 => Some(Self::ProtocolVersion),
            80 => Some(Self::InternalError),
            100 => Some(Self::NoRenegotiation),
            _ => None,
        }
    }
}
