//! Hello-phase handlers: ClientHello, ServerHello and HelloVerifyRequest.

use bytes::Bytes;
use tlsmith_proto::{
    CipherSuite, ClientHello, CompressionMethod, HandshakeType, HelloVerifyRequest, MessageKind,
    MessageVariant, ProtocolVersion, ServerHello, WireReader, WireWriter,
    constants::RANDOM_LENGTH, errors::Result as WireResult,
};
use tracing::debug;

use super::{
    ContextAdjuster, Handler, Parser, Preparator, Serializer, parse_handshake,
    prepare_handshake_length, prepare_handshake_type, serialization, serialize_handshake,
};
use crate::{
    config::DigestAlgorithm,
    context::TlsContext,
    error::{AdjustmentError, PipelineError},
};

fn len_of(value: Option<&Vec<u8>>) -> usize {
    value.map_or(0, Vec::len)
}

fn bytes_field(reader: &mut WireReader<'_>, len: usize) -> Result<Vec<u8>, PipelineError> {
    Ok(reader.read_bytes(len)?.to_vec())
}

fn joined_random(unix_time: Option<u32>, random: Option<&Vec<u8>>) -> Option<Vec<u8>> {
    let mut out = unix_time?.to_be_bytes().to_vec();
    out.extend_from_slice(random?);
    Some(out)
}

fn missing(field: &str) -> AdjustmentError {
    AdjustmentError::not_adjustable(format!("{field} is not set"))
}

/// ClientHello handler.
#[derive(Debug, Clone, Copy, Default)]
pub struct ClientHelloHandler;

impl Handler for ClientHelloHandler {
    type Message = ClientHello;
}

impl Parser for ClientHelloHandler {
    fn parse(&self, reader: &mut WireReader<'_>) -> Result<ClientHello, PipelineError> {
        let (header, mut body) = parse_handshake(reader, HandshakeType::ClientHello)?;
        let mut message = ClientHello { header, ..ClientHello::default() };

        message.protocol_version.compute(body.read_u16()?);
        message.unix_time.compute(body.read_u32()?);
        message.random.compute(bytes_field(&mut body, RANDOM_LENGTH)?);

        let session_id_length = body.read_u8()?;
        message.session_id_length.compute(session_id_length);
        message.session_id.compute(bytes_field(&mut body, usize::from(session_id_length))?);

        let cipher_suite_length = body.read_u16()?;
        message.cipher_suite_length.compute(cipher_suite_length);
        message.cipher_suites.compute(bytes_field(&mut body, usize::from(cipher_suite_length))?);

        let compression_length = body.read_u8()?;
        message.compression_length.compute(compression_length);
        message.compressions.compute(bytes_field(&mut body, usize::from(compression_length))?);

        if body.remaining() > 0 {
            let extensions_length = body.read_u16()?;
            message.extensions_length.compute(extensions_length);
            let extensions = bytes_field(&mut body, usize::from(extensions_length))?;
            message.extension_bytes.compute(extensions);
        }

        debug!(
            version = ?message.protocol_version,
            suites = cipher_suite_length / 2,
            extensions = message.has_extensions(),
            "parsed ClientHello"
        );
        Ok(message)
    }
}

impl Preparator for ClientHelloHandler {
    fn prepare(
        &self,
        message: &mut ClientHello,
        context: &mut TlsContext,
    ) -> Result<(), PipelineError> {
        prepare_handshake_type(&mut message.header, HandshakeType::ClientHello);

        let config = context.config();
        message.protocol_version.compute(config.highest_protocol_version.0);
        message.session_id.compute(config.session_id.clone());
        message.cipher_suites.compute(CipherSuite::list_to_bytes(&config.cipher_suites));
        message.compressions.compute(config.compression_methods.iter().map(|c| c.0).collect());
        if let Some(extensions) = &config.extension_bytes {
            message.extension_bytes.compute(extensions.clone());
        }

        message.unix_time.compute(context.unix_time());
        message.random.compute(context.random_bytes(RANDOM_LENGTH));

        message.session_id_length.compute(len_of(message.session_id.value()) as u8);
        message.cipher_suite_length.compute(len_of(message.cipher_suites.value()) as u16);
        message.compression_length.compute(len_of(message.compressions.value()) as u8);
        if message.extension_bytes.is_set() {
            message.extensions_length.compute(len_of(message.extension_bytes.value()) as u16);
        }
        Ok(())
    }

    fn after_prepare(
        &self,
        message: &mut ClientHello,
        _context: &mut TlsContext,
    ) -> Result<(), PipelineError> {
        let body = client_hello_body(message).map_err(serialization(ClientHello::KIND))?;
        prepare_handshake_length(&mut message.header, &body);
        Ok(())
    }
}

fn client_hello_body(message: &ClientHello) -> WireResult<Bytes> {
    let mut writer = WireWriter::new();
    writer.put_u16(*message.protocol_version.require("protocol_version")?);
    writer.put_u32(*message.unix_time.require("unix_time")?);
    writer.put_bytes(message.random.require("random")?);
    writer.put_u8(*message.session_id_length.require("session_id_length")?);
    writer.put_bytes(message.session_id.require("session_id")?);
    writer.put_u16(*message.cipher_suite_length.require("cipher_suite_length")?);
    writer.put_bytes(message.cipher_suites.require("cipher_suites")?);
    writer.put_u8(*message.compression_length.require("compression_length")?);
    writer.put_bytes(message.compressions.require("compressions")?);
    if let Some(length) = message.extensions_length.get() {
        writer.put_u16(length);
    }
    if let Some(extensions) = message.extension_bytes.value() {
        writer.put_bytes(extensions);
    }
    Ok(writer.freeze())
}

impl Serializer for ClientHelloHandler {
    fn serialize(&self, message: &ClientHello) -> Result<Bytes, PipelineError> {
        let body = client_hello_body(message).map_err(serialization(ClientHello::KIND))?;
        serialize_handshake(ClientHello::KIND, &message.header, &body)
    }
}

impl ContextAdjuster for ClientHelloHandler {
    fn adjust(
        &self,
        message: &ClientHello,
        context: &mut TlsContext,
    ) -> Result<(), AdjustmentError> {
        let client_random = joined_random(message.unix_time.get(), message.random.value())
            .ok_or_else(|| missing("client random"))?;
        let version = message.protocol_version.get().ok_or_else(|| missing("protocol_version"))?;
        let suites = message.cipher_suites.value().ok_or_else(|| missing("cipher_suites"))?;

        let params = context.params_mut();
        params.client_random = Some(client_random);
        params.offered_protocol_version = Some(ProtocolVersion(version));
        params.offered_cipher_suites = CipherSuite::list_from_bytes(suites);
        params.session_id = message.session_id.value().cloned();
        Ok(())
    }
}

/// ServerHello handler.
#[derive(Debug, Clone, Copy, Default)]
pub struct ServerHelloHandler;

impl Handler for ServerHelloHandler {
    type Message = ServerHello;
}

impl Parser for ServerHelloHandler {
    fn parse(&self, reader: &mut WireReader<'_>) -> Result<ServerHello, PipelineError> {
        let (header, mut body) = parse_handshake(reader, HandshakeType::ServerHello)?;
        let mut message = ServerHello { header, ..ServerHello::default() };

        message.protocol_version.compute(body.read_u16()?);
        message.unix_time.compute(body.read_u32()?);
        message.random.compute(bytes_field(&mut body, RANDOM_LENGTH)?);

        let session_id_length = body.read_u8()?;
        message.session_id_length.compute(session_id_length);
        message.session_id.compute(bytes_field(&mut body, usize::from(session_id_length))?);

        message.selected_cipher_suite.compute(body.read_u16()?);
        message.selected_compression.compute(body.read_u8()?);

        if body.remaining() > 0 {
            let extensions_length = body.read_u16()?;
            message.extensions_length.compute(extensions_length);
            let extensions = bytes_field(&mut body, usize::from(extensions_length))?;
            message.extension_bytes.compute(extensions);
        }

        debug!(suite = ?message.selected_cipher_suite, "parsed ServerHello");
        Ok(message)
    }
}

impl Preparator for ServerHelloHandler {
    fn prepare(
        &self,
        message: &mut ServerHello,
        context: &mut TlsContext,
    ) -> Result<(), PipelineError> {
        prepare_handshake_type(&mut message.header, HandshakeType::ServerHello);

        // First configured suite the client offered, or the first configured
        // suite when the client offered none of them.
        let offered = &context.params().offered_cipher_suites;
        let suite = context
            .config()
            .cipher_suites
            .iter()
            .find(|suite| offered.contains(suite))
            .copied()
            .unwrap_or_else(|| context.chosen_cipher_suite());

        let config = context.config();
        message.protocol_version.compute(config.highest_protocol_version.0);
        message.session_id.compute(config.session_id.clone());
        if let Some(extensions) = &config.extension_bytes {
            message.extension_bytes.compute(extensions.clone());
        }
        message.selected_cipher_suite.compute(suite.0);
        message.selected_compression.compute(context.chosen_compression().0);

        message.unix_time.compute(context.unix_time());
        message.random.compute(context.random_bytes(RANDOM_LENGTH));

        message.session_id_length.compute(len_of(message.session_id.value()) as u8);
        if message.extension_bytes.is_set() {
            message.extensions_length.compute(len_of(message.extension_bytes.value()) as u16);
        }
        Ok(())
    }

    fn after_prepare(
        &self,
        message: &mut ServerHello,
        _context: &mut TlsContext,
    ) -> Result<(), PipelineError> {
        let body = server_hello_body(message).map_err(serialization(ServerHello::KIND))?;
        prepare_handshake_length(&mut message.header, &body);
        Ok(())
    }
}

fn server_hello_body(message: &ServerHello) -> WireResult<Bytes> {
    let mut writer = WireWriter::new();
    writer.put_u16(*message.protocol_version.require("protocol_version")?);
    writer.put_u32(*message.unix_time.require("unix_time")?);
    writer.put_bytes(message.random.require("random")?);
    writer.put_u8(*message.session_id_length.require("session_id_length")?);
    writer.put_bytes(message.session_id.require("session_id")?);
    writer.put_u16(*message.selected_cipher_suite.require("selected_cipher_suite")?);
    writer.put_u8(*message.selected_compression.require("selected_compression")?);
    if let Some(length) = message.extensions_length.get() {
        writer.put_u16(length);
    }
    if let Some(extensions) = message.extension_bytes.value() {
        writer.put_bytes(extensions);
    }
    Ok(writer.freeze())
}

impl Serializer for ServerHelloHandler {
    fn serialize(&self, message: &ServerHello) -> Result<Bytes, PipelineError> {
        let body = server_hello_body(message).map_err(serialization(ServerHello::KIND))?;
        serialize_handshake(ServerHello::KIND, &message.header, &body)
    }
}

impl ContextAdjuster for ServerHelloHandler {
    fn adjust(
        &self,
        message: &ServerHello,
        context: &mut TlsContext,
    ) -> Result<(), AdjustmentError> {
        let server_random = joined_random(message.unix_time.get(), message.random.value())
            .ok_or_else(|| missing("server random"))?;
        let version = message.protocol_version.get().ok_or_else(|| missing("protocol_version"))?;
        let suite =
            message.selected_cipher_suite.get().ok_or_else(|| missing("selected_cipher_suite"))?;
        let compression =
            message.selected_compression.get().ok_or_else(|| missing("selected_compression"))?;

        let params = context.params_mut();
        params.server_random = Some(server_random);
        params.selected_protocol_version = Some(ProtocolVersion(version));
        params.selected_cipher_suite = Some(CipherSuite(suite));
        params.selected_compression = Some(CompressionMethod(compression));
        params.session_id = message.session_id.value().cloned();

        let algorithm = DigestAlgorithm::for_cipher_suite(CipherSuite(suite));
        debug!(?algorithm, "transcript hash follows the selected suite");
        context.set_digest_algorithm(algorithm);
        Ok(())
    }
}

/// HelloVerifyRequest handler.
///
/// Cookie handling is not implemented: every role reports the variant as
/// unsupported, so a received HelloVerifyRequest is captured as unknown bytes.
#[derive(Debug, Clone, Copy, Default)]
pub struct HelloVerifyRequestHandler;

impl Handler for HelloVerifyRequestHandler {
    type Message = HelloVerifyRequest;
}

fn unsupported() -> PipelineError {
    PipelineError::Unsupported { kind: MessageKind::HelloVerifyRequest }
}

impl Parser for HelloVerifyRequestHandler {
    fn parse(&self, _reader: &mut WireReader<'_>) -> Result<HelloVerifyRequest, PipelineError> {
        Err(unsupported())
    }
}

impl Preparator for HelloVerifyRequestHandler {
    fn prepare(
        &self,
        _message: &mut HelloVerifyRequest,
        _context: &mut TlsContext,
    ) -> Result<(), PipelineError> {
        Err(unsupported())
    }

    fn prepare_after_parse(
        &self,
        _message: &mut HelloVerifyRequest,
        _context: &mut TlsContext,
        _reverse: bool,
    ) -> Result<(), PipelineError> {
        Err(unsupported())
    }
}

impl Serializer for HelloVerifyRequestHandler {
    fn serialize(&self, _message: &HelloVerifyRequest) -> Result<Bytes, PipelineError> {
        Err(unsupported())
    }
}

impl ContextAdjuster for HelloVerifyRequestHandler {
    fn adjust(
        &self,
        _message: &HelloVerifyRequest,
        _context: &mut TlsContext,
    ) -> Result<(), AdjustmentError> {
        Err(AdjustmentError::Unsupported { kind: MessageKind::HelloVerifyRequest })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::TlsConfig;

    fn server_hello_for(suite: CipherSuite) -> ServerHello {
        let config = TlsConfig { cipher_suites: vec![suite], ..TlsConfig::server() };
        let mut server = TlsContext::new("server", config);
        let mut message = ServerHello::default();
        Preparator::prepare(&ServerHelloHandler, &mut message, &mut server).expect("prepare");
        message
    }

    #[test]
    fn sha384_suite_switches_transcript_hash() {
        let message = server_hello_for(CipherSuite::TLS_ECDHE_RSA_WITH_AES_256_GCM_SHA384);
        let mut client = TlsContext::new("client", TlsConfig::default());
        assert_eq!(client.prf_algorithm(), DigestAlgorithm::Sha256);

        ServerHelloHandler.adjust(&message, &mut client).expect("adjust");
        assert_eq!(client.prf_algorithm(), DigestAlgorithm::Sha384);
        assert_eq!(
            client.params().selected_cipher_suite,
            Some(CipherSuite::TLS_ECDHE_RSA_WITH_AES_256_GCM_SHA384)
        );
    }

    #[test]
    fn sha256_suite_keeps_default_hash() {
        let message = server_hello_for(CipherSuite::TLS_ECDHE_RSA_WITH_AES_128_GCM_SHA256);
        let mut client = TlsContext::new("client", TlsConfig::default());

        ServerHelloHandler.adjust(&message, &mut client).expect("adjust");
        assert_eq!(client.prf_algorithm(), DigestAlgorithm::Sha256);
    }
}
