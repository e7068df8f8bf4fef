//! Handlers for non-handshake content: ChangeCipherSpec, Alert,
//! ApplicationData and captured unknown bytes.

use bytes::Bytes;
use tlsmith_proto::{
    Alert, AlertLevel, ApplicationData, ChangeCipherSpec, MessageVariant, Unknown, WireReader,
    WireWriter,
};
use tracing::warn;

use super::{ContextAdjuster, Handler, Parser, Preparator, Serializer, serialization};
use crate::{
    context::TlsContext,
    error::{AdjustmentError, PipelineError},
};

/// Type byte of every valid ChangeCipherSpec.
const CCS_TYPE: u8 = 1;

/// ChangeCipherSpec handler.
#[derive(Debug, Clone, Copy, Default)]
pub struct ChangeCipherSpecHandler;

impl Handler for ChangeCipherSpecHandler {
    type Message = ChangeCipherSpec;
}

impl Parser for ChangeCipherSpecHandler {
    fn parse(&self, reader: &mut WireReader<'_>) -> Result<ChangeCipherSpec, PipelineError> {
        let mut message = ChangeCipherSpec::default();
        message.ccs_type.compute(reader.read_u8()?);
        Ok(message)
    }
}

impl Preparator for ChangeCipherSpecHandler {
    fn prepare(
        &self,
        message: &mut ChangeCipherSpec,
        _context: &mut TlsContext,
    ) -> Result<(), PipelineError> {
        message.ccs_type.compute(CCS_TYPE);
        Ok(())
    }
}

impl Serializer for ChangeCipherSpecHandler {
    fn serialize(&self, message: &ChangeCipherSpec) -> Result<Bytes, PipelineError> {
        let ccs_type =
            message.ccs_type.require("ccs_type").map_err(serialization(ChangeCipherSpec::KIND))?;
        Ok(Bytes::copy_from_slice(&[*ccs_type]))
    }
}

impl ContextAdjuster for ChangeCipherSpecHandler {
    fn adjust(
        &self,
        _message: &ChangeCipherSpec,
        context: &mut TlsContext,
    ) -> Result<(), AdjustmentError> {
        context.params_mut().ccs_count += 1;
        Ok(())
    }
}

/// Alert handler.
#[derive(Debug, Clone, Copy, Default)]
pub struct AlertHandler;

impl Handler for AlertHandler {
    type Message = Alert;
}

impl Parser for AlertHandler {
    fn parse(&self, reader: &mut WireReader<'_>) -> Result<Alert, PipelineError> {
        let mut message = Alert::default();
        message.level.compute(reader.read_u8()?);
        message.description.compute(reader.read_u8()?);
        Ok(message)
    }
}

impl Preparator for AlertHandler {
    fn prepare(&self, message: &mut Alert, context: &mut TlsContext) -> Result<(), PipelineError> {
        message.level.compute(context.config().alert_level);
        message.description.compute(context.config().alert_description);
        Ok(())
    }
}

impl Serializer for AlertHandler {
    fn serialize(&self, message: &Alert) -> Result<Bytes, PipelineError> {
        let to_error = serialization(Alert::KIND);
        let mut writer = WireWriter::with_capacity(2);
        writer.put_u8(*message.level.require("level").map_err(&to_error)?);
        writer.put_u8(*message.description.require("description").map_err(&to_error)?);
        Ok(writer.freeze())
    }
}

impl ContextAdjuster for AlertHandler {
    fn adjust(&self, message: &Alert, context: &mut TlsContext) -> Result<(), AdjustmentError> {
        let (Some(level), Some(description)) = (message.level.get(), message.description.get())
        else {
            return Err(AdjustmentError::not_adjustable("alert bytes are not set"));
        };

        let from_peer = context.talking_end() != context.connection_end();
        let params = context.params_mut();
        params.last_alert = Some((level, description));
        if from_peer && AlertLevel::from_u8(level) == Some(AlertLevel::Fatal) {
            warn!(description, "peer sent a fatal alert");
            params.received_fatal_alert = true;
        }
        Ok(())
    }
}

/// ApplicationData handler.
#[derive(Debug, Clone, Copy, Default)]
pub struct ApplicationDataHandler;

impl Handler for ApplicationDataHandler {
    type Message = ApplicationData;
}

impl Parser for ApplicationDataHandler {
    fn parse(&self, reader: &mut WireReader<'_>) -> Result<ApplicationData, PipelineError> {
        let mut message = ApplicationData::default();
        message.data.compute(reader.read_rest().to_vec());
        Ok(message)
    }
}

impl Preparator for ApplicationDataHandler {
    fn prepare(
        &self,
        message: &mut ApplicationData,
        context: &mut TlsContext,
    ) -> Result<(), PipelineError> {
        message.data.compute(context.config().application_data.clone());
        Ok(())
    }
}

impl Serializer for ApplicationDataHandler {
    fn serialize(&self, message: &ApplicationData) -> Result<Bytes, PipelineError> {
        let data = message.data.require("data").map_err(serialization(ApplicationData::KIND))?;
        Ok(Bytes::copy_from_slice(data))
    }
}

impl ContextAdjuster for ApplicationDataHandler {
    fn adjust(
        &self,
        message: &ApplicationData,
        context: &mut TlsContext,
    ) -> Result<(), AdjustmentError> {
        let data = message
            .data
            .value()
            .cloned()
            .ok_or_else(|| AdjustmentError::not_adjustable("data is not set"))?;
        context.params_mut().last_application_data = Some(data);
        Ok(())
    }
}

/// Handler for captured bytes.
///
/// Parsing takes everything left in the reader. The caller sets the
/// content type, since the reader does not know which record it came from.
#[derive(Debug, Clone, Copy, Default)]
pub struct UnknownHandler;

impl Handler for UnknownHandler {
    type Message = Unknown;
}

impl Parser for UnknownHandler {
    fn parse(&self, reader: &mut WireReader<'_>) -> Result<Unknown, PipelineError> {
        let mut message = Unknown::default();
        message.data.compute(reader.read_rest().to_vec());
        Ok(message)
    }
}

impl Preparator for UnknownHandler {
    fn prepare(
        &self,
        _message: &mut Unknown,
        _context: &mut TlsContext,
    ) -> Result<(), PipelineError> {
        Ok(())
    }
}

impl Serializer for UnknownHandler {
    fn serialize(&self, message: &Unknown) -> Result<Bytes, PipelineError> {
        let data = message.data.require("data").map_err(serialization(Unknown::KIND))?;
        Ok(Bytes::copy_from_slice(data))
    }
}

impl ContextAdjuster for UnknownHandler {
    fn adjust(&self, _message: &Unknown, _context: &mut TlsContext) -> Result<(), AdjustmentError> {
        Ok(())
    }
}
