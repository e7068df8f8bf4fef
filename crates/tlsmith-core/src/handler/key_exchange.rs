//! Key-exchange phase handlers: HelloRequest, ServerHelloDone, Certificate,
//! ClientKeyExchange and Finished.

use bytes::Bytes;
use tlsmith_proto::{
    Certificate, ClientKeyExchange, Finished, HandshakeType, HelloRequest, MessageVariant,
    ServerHelloDone, WireReader, WireWriter,
    constants::{MASTER_SECRET_LENGTH, VERIFY_DATA_LENGTH},
    errors::Result as WireResult,
};
use tracing::debug;

use super::{
    ContextAdjuster, Handler, Parser, Preparator, Serializer, parse_handshake,
    prepare_handshake_length, prepare_handshake_type, serialization, serialize_handshake,
};
use crate::{
    config::ConnectionEnd,
    context::TlsContext,
    error::{AdjustmentError, PipelineError},
    prf::{self, CLIENT_FINISHED_LABEL, MASTER_SECRET_LABEL, SERVER_FINISHED_LABEL},
};

/// Header-only messages: HelloRequest and ServerHelloDone.
macro_rules! empty_handshake_handler {
    ($handler:ident, $message:ident, $msg_type:expr) => {
        #[doc = concat!(stringify!($message), " handler.")]
        #[derive(Debug, Clone, Copy, Default)]
        pub struct $handler;

        impl Handler for $handler {
            type Message = $message;
        }

        impl Parser for $handler {
            fn parse(&self, reader: &mut WireReader<'_>) -> Result<$message, PipelineError> {
                let (header, _body) = parse_handshake(reader, $msg_type)?;
                Ok($message { header, ..$message::default() })
            }
        }

        impl Preparator for $handler {
            fn prepare(
                &self,
                message: &mut $message,
                _context: &mut TlsContext,
            ) -> Result<(), PipelineError> {
                prepare_handshake_type(&mut message.header, $msg_type);
                prepare_handshake_length(&mut message.header, &[]);
                Ok(())
            }
        }

        impl Serializer for $handler {
            fn serialize(&self, message: &$message) -> Result<Bytes, PipelineError> {
                serialize_handshake($message::KIND, &message.header, &[])
            }
        }

        impl ContextAdjuster for $handler {
            fn adjust(
                &self,
                _message: &$message,
                _context: &mut TlsContext,
            ) -> Result<(), AdjustmentError> {
                Ok(())
            }
        }
    };
}

empty_handshake_handler!(HelloRequestHandler, HelloRequest, HandshakeType::HelloRequest);
empty_handshake_handler!(ServerHelloDoneHandler, ServerHelloDone, HandshakeType::ServerHelloDone);

/// Certificate handler.
#[derive(Debug, Clone, Copy, Default)]
pub struct CertificateHandler;

impl Handler for CertificateHandler {
    type Message = Certificate;
}

impl Parser for CertificateHandler {
    fn parse(&self, reader: &mut WireReader<'_>) -> Result<Certificate, PipelineError> {
        let (header, mut body) = parse_handshake(reader, HandshakeType::Certificate)?;
        let mut message = Certificate { header, ..Certificate::default() };

        let certificates_length = body.read_u24()?;
        message.certificates_length.compute(certificates_length);
        message.certificate_bytes.compute(body.read_bytes(certificates_length as usize)?.to_vec());
        Ok(message)
    }
}

fn certificate_body(message: &Certificate) -> WireResult<Bytes> {
    let mut writer = WireWriter::new();
    writer.put_u24(*message.certificates_length.require("certificates_length")?)?;
    writer.put_bytes(message.certificate_bytes.require("certificate_bytes")?);
    Ok(writer.freeze())
}

impl Preparator for CertificateHandler {
    fn prepare(
        &self,
        message: &mut Certificate,
        context: &mut TlsContext,
    ) -> Result<(), PipelineError> {
        prepare_handshake_type(&mut message.header, HandshakeType::Certificate);
        message.certificate_bytes.compute(context.config().certificate_chain.clone());
        let length = message.certificate_bytes.value().map_or(0, Vec::len);
        message.certificates_length.compute(length as u32);
        Ok(())
    }

    fn after_prepare(
        &self,
        message: &mut Certificate,
        _context: &mut TlsContext,
    ) -> Result<(), PipelineError> {
        let body = certificate_body(message).map_err(serialization(Certificate::KIND))?;
        prepare_handshake_length(&mut message.header, &body);
        Ok(())
    }
}

impl Serializer for CertificateHandler {
    fn serialize(&self, message: &Certificate) -> Result<Bytes, PipelineError> {
        let body = certificate_body(message).map_err(serialization(Certificate::KIND))?;
        serialize_handshake(Certificate::KIND, &message.header, &body)
    }
}

impl ContextAdjuster for CertificateHandler {
    fn adjust(
        &self,
        message: &Certificate,
        context: &mut TlsContext,
    ) -> Result<(), AdjustmentError> {
        let chain = message
            .certificate_bytes
            .value()
            .cloned()
            .ok_or_else(|| AdjustmentError::not_adjustable("certificate_bytes is not set"))?;

        match context.talking_end() {
            ConnectionEnd::Server => context.params_mut().server_certificate = Some(chain),
            ConnectionEnd::Client => context.params_mut().client_certificate = Some(chain),
        }
        Ok(())
    }
}

/// ClientKeyExchange handler.
///
/// The exchange keys are opaque: the premaster secret comes from the
/// configuration and the master secret is derived from it with the PRF.
#[derive(Debug, Clone, Copy, Default)]
pub struct ClientKeyExchangeHandler;

impl Handler for ClientKeyExchangeHandler {
    type Message = ClientKeyExchange;
}

impl ClientKeyExchangeHandler {
    /// Fill the derived secrets from `client_server_random`.
    fn compute_secrets(
        message: &mut ClientKeyExchange,
        context: &TlsContext,
        randoms: Vec<u8>,
    ) -> Result<(), PipelineError> {
        let computations = &mut message.computations;
        computations.client_server_random.compute(randoms);
        computations.premaster_secret.compute(context.config().premaster_secret.clone());

        let premaster = computations.premaster_secret.value().cloned().unwrap_or_default();
        let randoms = computations.client_server_random.value().cloned().unwrap_or_default();
        let master = prf::prf(
            context.prf_algorithm(),
            &premaster,
            MASTER_SECRET_LABEL,
            &randoms,
            MASTER_SECRET_LENGTH,
        )?;
        computations.master_secret.compute(master);
        Ok(())
    }
}

impl Parser for ClientKeyExchangeHandler {
    fn parse(&self, reader: &mut WireReader<'_>) -> Result<ClientKeyExchange, PipelineError> {
        let (header, mut body) = parse_handshake(reader, HandshakeType::ClientKeyExchange)?;
        let mut message = ClientKeyExchange { header, ..ClientKeyExchange::default() };

        let length = body.read_u16()?;
        message.exchange_keys_length.compute(length);
        message.exchange_keys.compute(body.read_bytes(usize::from(length))?.to_vec());
        Ok(message)
    }
}

fn client_key_exchange_body(message: &ClientKeyExchange) -> WireResult<Bytes> {
    let mut writer = WireWriter::new();
    writer.put_u16(*message.exchange_keys_length.require("exchange_keys_length")?);
    writer.put_bytes(message.exchange_keys.require("exchange_keys")?);
    Ok(writer.freeze())
}

impl Preparator for ClientKeyExchangeHandler {
    fn prepare(
        &self,
        message: &mut ClientKeyExchange,
        context: &mut TlsContext,
    ) -> Result<(), PipelineError> {
        prepare_handshake_type(&mut message.header, HandshakeType::ClientKeyExchange);
        message.exchange_keys.compute(context.config().client_key_exchange.clone());
        let length = message.exchange_keys.value().map_or(0, Vec::len);
        message.exchange_keys_length.compute(length as u16);

        let mut randoms = context.client_random()?.to_vec();
        randoms.extend_from_slice(context.server_random()?);
        Self::compute_secrets(message, context, randoms)
    }

    fn after_prepare(
        &self,
        message: &mut ClientKeyExchange,
        _context: &mut TlsContext,
    ) -> Result<(), PipelineError> {
        let body =
            client_key_exchange_body(message).map_err(serialization(ClientKeyExchange::KIND))?;
        prepare_handshake_length(&mut message.header, &body);
        Ok(())
    }

    fn prepare_after_parse(
        &self,
        message: &mut ClientKeyExchange,
        context: &mut TlsContext,
        reverse: bool,
    ) -> Result<(), PipelineError> {
        let client = context.client_random()?;
        let server = context.server_random()?;
        let randoms = if reverse { [server, client].concat() } else { [client, server].concat() };

        debug!(reverse, "completing received ClientKeyExchange");
        Self::compute_secrets(message, context, randoms)
    }
}

impl Serializer for ClientKeyExchangeHandler {
    fn serialize(&self, message: &ClientKeyExchange) -> Result<Bytes, PipelineError> {
        let body =
            client_key_exchange_body(message).map_err(serialization(ClientKeyExchange::KIND))?;
        serialize_handshake(ClientKeyExchange::KIND, &message.header, &body)
    }
}

impl ContextAdjuster for ClientKeyExchangeHandler {
    fn adjust(
        &self,
        message: &ClientKeyExchange,
        context: &mut TlsContext,
    ) -> Result<(), AdjustmentError> {
        let computations = &message.computations;
        let premaster = computations
            .premaster_secret
            .value()
            .cloned()
            .ok_or_else(|| AdjustmentError::not_adjustable("premaster secret was not computed"))?;
        let master = computations
            .master_secret
            .value()
            .cloned()
            .ok_or_else(|| AdjustmentError::not_adjustable("master secret was not computed"))?;

        let params = context.params_mut();
        params.premaster_secret = Some(premaster);
        params.master_secret = Some(master);
        Ok(())
    }
}

/// Finished handler.
#[derive(Debug, Clone, Copy, Default)]
pub struct FinishedHandler;

impl Handler for FinishedHandler {
    type Message = Finished;
}

impl Parser for FinishedHandler {
    fn parse(&self, reader: &mut WireReader<'_>) -> Result<Finished, PipelineError> {
        let (header, mut body) = parse_handshake(reader, HandshakeType::Finished)?;
        let mut message = Finished { header, ..Finished::default() };
        message.verify_data.compute(body.read_rest().to_vec());
        Ok(message)
    }
}

impl Preparator for FinishedHandler {
    fn prepare(
        &self,
        message: &mut Finished,
        context: &mut TlsContext,
    ) -> Result<(), PipelineError> {
        prepare_handshake_type(&mut message.header, HandshakeType::Finished);

        let label = match context.connection_end() {
            ConnectionEnd::Client => CLIENT_FINISHED_LABEL,
            ConnectionEnd::Server => SERVER_FINISHED_LABEL,
        };
        let verify_data = prf::prf(
            context.prf_algorithm(),
            context.chosen_master_secret(),
            label,
            &context.digest().current_hash(),
            VERIFY_DATA_LENGTH,
        )?;
        message.verify_data.compute(verify_data);
        Ok(())
    }

    fn after_prepare(
        &self,
        message: &mut Finished,
        _context: &mut TlsContext,
    ) -> Result<(), PipelineError> {
        let length = message.verify_data.value().map_or(0, Vec::len);
        message.header.length.compute(length as u32);
        Ok(())
    }
}

impl Serializer for FinishedHandler {
    fn serialize(&self, message: &Finished) -> Result<Bytes, PipelineError> {
        let verify_data =
            message.verify_data.require("verify_data").map_err(serialization(Finished::KIND))?;
        serialize_handshake(Finished::KIND, &message.header, verify_data)
    }
}

impl ContextAdjuster for FinishedHandler {
    fn adjust(&self, message: &Finished, context: &mut TlsContext) -> Result<(), AdjustmentError> {
        let verify_data = message
            .verify_data
            .value()
            .cloned()
            .ok_or_else(|| AdjustmentError::not_adjustable("verify_data is not set"))?;

        match context.talking_end() {
            ConnectionEnd::Client => context.params_mut().client_verify_data = Some(verify_data),
            ConnectionEnd::Server => context.params_mut().server_verify_data = Some(verify_data),
        }
        Ok(())
    }
}
