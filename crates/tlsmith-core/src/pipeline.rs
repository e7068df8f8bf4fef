//! Outbound and inbound message processing.
//!
//! Both directions follow the same order: the message's complete bytes are
//! fixed first, then appended to the transcript digest, and only then is the
//! context adjusted. Outbound messages are digested only when prepared.
//! Adjustment failures never abort processing. They are logged, recorded in
//! the context's [`Diagnostics`](crate::context::Diagnostics) and returned
//! as [`AdjustOutcome::Failed`] for callers that care.

use bytes::Bytes;
use tlsmith_proto::{
    ContentType, HandshakeHeader, MessageKind, ProtocolMessage, Unknown, WireReader,
};
use tracing::{debug, warn};

use crate::{
    context::{Diagnostic, TlsContext},
    error::{AdjustmentError, PipelineError},
    handler::HandlerRegistry,
};

/// Whether inbound messages adjust the context as they are parsed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Adjustment {
    /// Adjust immediately
    #[default]
    Apply,
    /// Parse and digest only; the caller buffers the messages
    Defer,
}

/// Result of one context adjustment.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AdjustOutcome {
    /// The context was updated
    Applied,
    /// The message opted out of adjustment
    Skipped,
    /// Adjustment failed and was recorded as a diagnostic
    Failed(AdjustmentError),
}

impl AdjustOutcome {
    /// True unless adjustment failed.
    pub fn is_ok(&self) -> bool {
        !matches!(self, Self::Failed(_))
    }
}

/// Produce the wire bytes of an outbound message and apply its effects.
///
/// With `with_prepare` the message is prepared, serialised and, if it is a
/// handshake message flagged for the digest, appended to the transcript
/// before the context is adjusted. Without it the message's existing
/// complete bytes are reused, or it is serialised as it stands if it has
/// none, and the digest is left alone.
pub fn prepare_message(
    message: &mut ProtocolMessage,
    context: &mut TlsContext,
    with_prepare: bool,
) -> Result<Bytes, PipelineError> {
    let handler = HandlerRegistry::for_message(message);
    let kind = message.kind();
    let end = context.connection_end();
    context.set_talking_end(end);

    let bytes = if with_prepare {
        handler.prepare(message, context)?;
        handler.after_prepare(message, context)?;
        let serialized = handler.serialize(message)?;
        let bytes = set_complete_bytes(message, serialized)?;
        if message.is_digestible() && message.meta().include_in_digest {
            context.append_digest(&bytes);
        }
        bytes
    } else if let Some(existing) = message.complete_resulting_message() {
        existing.clone()
    } else {
        let serialized = handler.serialize(message)?;
        set_complete_bytes(message, serialized)?
    };
    debug!(%kind, len = bytes.len(), with_prepare, "prepared message");

    adjust_message(message, context);
    Ok(bytes)
}

/// Fix `bytes` as the message's complete bytes.
fn set_complete_bytes(
    message: &mut ProtocolMessage,
    bytes: Bytes,
) -> Result<Bytes, PipelineError> {
    let kind = message.kind();
    message
        .meta_mut()
        .set_complete_resulting_message(bytes.clone())
        .map_err(|source| PipelineError::Serialization { kind, source })?;
    Ok(bytes)
}

/// Decode one message of `kind` at `pos` and apply its effects.
///
/// The received bytes become the message's complete bytes. Returns the
/// message and the position just past it.
pub fn parse_message(
    kind: MessageKind,
    buf: &[u8],
    pos: usize,
    context: &mut TlsContext,
    adjustment: Adjustment,
) -> Result<(ProtocolMessage, usize), PipelineError> {
    let handler = HandlerRegistry::handler(kind);
    let mut reader = WireReader::at(buf, pos);
    let mut message = handler.parse(&mut reader)?;
    let end = reader.position();

    let received = buf.get(pos..end).map(Bytes::copy_from_slice).unwrap_or_default();
    message.meta_mut().set_complete_resulting_message(received)?;
    debug!(%kind, pos, end, "parsed message");

    complete_received(kind, &mut message, context, adjustment);
    Ok((message, end))
}

/// Digest, complete and adjust a message whose bytes were just received.
fn complete_received(
    kind: MessageKind,
    message: &mut ProtocolMessage,
    context: &mut TlsContext,
    adjustment: Adjustment,
) {
    let peer = context.connection_end().peer();
    context.set_talking_end(peer);

    if message.is_digestible()
        && message.meta().include_in_digest
        && let Some(bytes) = message.complete_resulting_message()
    {
        context.append_digest(bytes);
    }

    let handler = HandlerRegistry::handler(kind);
    let reverse = context.reverse_prepare_after_parse();
    if let Err(error) = handler.prepare_after_parse(message, context, reverse) {
        warn!(%kind, %error, "could not complete received message");
        context.diagnostics_mut().record(Diagnostic::CompletionFailed { kind, error });
        return;
    }

    if adjustment == Adjustment::Apply {
        adjust_message(message, context);
    }
}

/// Apply a message's effect to the context under the non-fatal policy.
///
/// Messages whose `adjust_context` flag is cleared are skipped.
pub fn adjust_message(message: &ProtocolMessage, context: &mut TlsContext) -> AdjustOutcome {
    if !message.meta().adjust_context {
        return AdjustOutcome::Skipped;
    }
    force_adjust(message, context)
}

/// Apply a message's effect to the context regardless of its
/// `adjust_context` flag. Failures are handled as in [`adjust_message`].
pub fn force_adjust(message: &ProtocolMessage, context: &mut TlsContext) -> AdjustOutcome {
    let kind = message.kind();
    match HandlerRegistry::for_message(message).adjust(message, context) {
        Ok(()) => AdjustOutcome::Applied,
        Err(error) => {
            warn!(alias = context.alias(), %kind, %error, "context adjustment failed");
            context
                .diagnostics_mut()
                .record(Diagnostic::AdjustmentFailed { kind, error: error.clone() });
            AdjustOutcome::Failed(error)
        },
    }
}

/// Decode a reassembled message-level stream of one content type.
///
/// Bytes no handler can decode are captured as [`Unknown`] messages, so the
/// whole input is always consumed.
pub fn parse_content(
    content_type: u8,
    data: &[u8],
    context: &mut TlsContext,
    adjustment: Adjustment,
) -> Vec<ProtocolMessage> {
    match ContentType::from_u8(content_type) {
        Some(ContentType::Handshake) => parse_handshake_stream(data, context, adjustment),
        Some(ContentType::ChangeCipherSpec) => {
            parse_repeated(MessageKind::ChangeCipherSpec, content_type, data, context, adjustment)
        },
        Some(ContentType::Alert) => {
            parse_repeated(MessageKind::Alert, content_type, data, context, adjustment)
        },
        Some(ContentType::ApplicationData) => {
            parse_repeated(MessageKind::ApplicationData, content_type, data, context, adjustment)
        },
        Some(ContentType::Heartbeat) | None => {
            if data.is_empty() {
                Vec::new()
            } else {
                vec![capture_unknown(content_type, data, context, adjustment)]
            }
        },
    }
}

/// Decode a stream of handshake messages.
pub fn parse_handshake_stream(
    data: &[u8],
    context: &mut TlsContext,
    adjustment: Adjustment,
) -> Vec<ProtocolMessage> {
    let handshake = ContentType::Handshake.to_u8();
    let mut messages = Vec::new();
    let mut pos = 0;

    while pos < data.len() {
        let Some(header) = HandshakeHeader::peek(data, pos) else {
            messages.push(capture_unknown(handshake, &data[pos..], context, adjustment));
            break;
        };
        let end = pos.saturating_add(header.total_length()).min(data.len());

        let parsed = MessageKind::from_handshake_type(header.msg_type)
            .filter(|_| header.is_complete_in(data.len() - pos))
            .map(|kind| parse_message(kind, data, pos, context, adjustment));

        match parsed {
            Some(Ok((message, next))) if next > pos => {
                messages.push(message);
                pos = next;
            },
            Some(Err(error)) => {
                debug!(msg_type = header.msg_type, %error, "capturing undecodable handshake");
                messages.push(capture_unknown(handshake, &data[pos..end], context, adjustment));
                pos = end;
            },
            _ => {
                messages.push(capture_unknown(handshake, &data[pos..end], context, adjustment));
                pos = end;
            },
        }
    }

    messages
}

/// Decode back-to-back messages of one non-handshake kind.
fn parse_repeated(
    kind: MessageKind,
    content_type: u8,
    data: &[u8],
    context: &mut TlsContext,
    adjustment: Adjustment,
) -> Vec<ProtocolMessage> {
    let mut messages = Vec::new();
    let mut pos = 0;

    while pos < data.len() {
        match parse_message(kind, data, pos, context, adjustment) {
            Ok((message, next)) if next > pos => {
                messages.push(message);
                pos = next;
            },
            _ => {
                messages.push(capture_unknown(content_type, &data[pos..], context, adjustment));
                break;
            },
        }
    }

    messages
}

/// Wrap raw bytes as an [`Unknown`] message received from the peer.
fn capture_unknown(
    content_type: u8,
    data: &[u8],
    context: &mut TlsContext,
    adjustment: Adjustment,
) -> ProtocolMessage {
    let mut message = ProtocolMessage::from(Unknown::new(content_type, data.to_vec()));
    // A fresh message has no complete bytes yet.
    let _ = message.meta_mut().set_complete_resulting_message(Bytes::copy_from_slice(data));
    complete_received(MessageKind::Unknown, &mut message, context, adjustment);
    message
}

#[cfg(test)]
mod tests {
    use tlsmith_proto::{Alert, ApplicationData, FieldValue, ServerHelloDone};

    use super::*;
    use crate::config::{ConnectionEnd, TlsConfig};

    fn client() -> TlsContext {
        TlsContext::new("client", TlsConfig::default())
    }

    #[test]
    fn prepare_sets_complete_bytes_and_digests_handshake() {
        let mut context = client();
        let mut message = ProtocolMessage::from(ServerHelloDone::default());

        let bytes = prepare_message(&mut message, &mut context, true).expect("prepare");
        assert_eq!(bytes.as_ref(), &[14, 0, 0, 0]);
        assert_eq!(message.complete_resulting_message(), Some(&bytes));
        assert_eq!(context.digest().raw(), bytes.as_ref());
    }

    #[test]
    fn non_handshake_messages_are_not_digested() {
        let mut context = client();
        let mut message = ProtocolMessage::from(Alert::forced(1, 0));

        prepare_message(&mut message, &mut context, true).expect("prepare");
        assert!(context.digest().is_empty());
        assert_eq!(context.params().last_alert, Some((1, 0)));
    }

    #[test]
    fn excluded_message_skips_digest() {
        let mut context = client();
        let mut message = ProtocolMessage::from(ServerHelloDone::default());
        message.meta_mut().include_in_digest = false;

        prepare_message(&mut message, &mut context, true).expect("prepare");
        assert!(context.digest().is_empty());
    }

    #[test]
    fn without_prepare_reuses_existing_bytes() {
        let mut context = client();
        let mut message = ProtocolMessage::from(ApplicationData::default());
        message
            .meta_mut()
            .set_complete_resulting_message(Bytes::from_static(b"raw"))
            .expect("fresh message");

        let bytes = prepare_message(&mut message, &mut context, false).expect("prepare");
        assert_eq!(bytes.as_ref(), b"raw");
    }

    #[test]
    fn without_prepare_handshake_bytes_stay_out_of_digest() {
        let mut context = client();
        let mut message = ProtocolMessage::from(ServerHelloDone::default());
        message
            .meta_mut()
            .set_complete_resulting_message(Bytes::from_static(&[14, 0, 0, 0]))
            .expect("fresh message");

        let bytes = prepare_message(&mut message, &mut context, false).expect("send as is");
        assert_eq!(bytes.as_ref(), &[14, 0, 0, 0]);
        assert!(context.digest().is_empty());
    }

    #[test]
    fn without_prepare_unserialised_message_gets_bytes_but_no_digest() {
        let mut context = client();
        let mut message = ProtocolMessage::from(ServerHelloDone::default());
        message.fields_mut().force_field("msg_type", FieldValue::U8(14)).expect("field");
        message.fields_mut().force_field("length", FieldValue::U24(0)).expect("field");

        let bytes = prepare_message(&mut message, &mut context, false).expect("serialise as is");
        assert_eq!(message.complete_resulting_message(), Some(&bytes));
        assert!(context.digest().is_empty());
    }

    #[test]
    fn failed_adjustment_is_recorded_not_fatal() {
        let mut context = client();
        let mut message = ProtocolMessage::from(ApplicationData::default());
        message
            .meta_mut()
            .set_complete_resulting_message(Bytes::from_static(b"raw"))
            .expect("fresh message");

        assert!(prepare_message(&mut message, &mut context, false).is_ok());
        let failures: Vec<_> = context.diagnostics().adjustment_failures().collect();
        assert_eq!(failures.len(), 1);
        assert_eq!(failures[0].0, MessageKind::ApplicationData);

        let outcome = adjust_message(&message, &mut context);
        assert!(matches!(outcome, AdjustOutcome::Failed(AdjustmentError::NotAdjustable { .. })));
    }

    #[test]
    fn received_message_flips_talking_end() {
        let mut context = client();
        let messages = parse_content(21, &[2, 40], &mut context, Adjustment::Apply);

        assert_eq!(messages.len(), 1);
        assert_eq!(context.talking_end(), ConnectionEnd::Server);
        assert!(context.params().received_fatal_alert);
    }

    #[test]
    fn garbage_handshake_stream_is_captured() {
        let mut context = client();
        let data = [0xff, 0, 0, 2, 0xaa, 0xbb, 0x01];
        let messages = parse_content(22, &data, &mut context, Adjustment::Apply);

        assert!(messages.iter().all(|m| m.kind() == MessageKind::Unknown));
        let captured: Vec<u8> = messages
            .iter()
            .filter_map(ProtocolMessage::complete_resulting_message)
            .flat_map(|b| b.to_vec())
            .collect();
        assert_eq!(captured, data);
        // The framed 0xff message is digested, the dangling byte is not.
        assert_eq!(context.digest().raw(), &data[..6]);
    }

    #[test]
    fn handshake_type_without_handler_is_digested_in_order() {
        let mut context = client();
        let data = [12, 0, 0, 2, 0xaa, 0xbb, 14, 0, 0, 0];
        let messages = parse_content(22, &data, &mut context, Adjustment::Apply);

        let kinds: Vec<_> = messages.iter().map(ProtocolMessage::kind).collect();
        assert_eq!(kinds, vec![MessageKind::Unknown, MessageKind::ServerHelloDone]);
        assert_eq!(context.digest().raw(), &data);
    }

    #[test]
    fn excluded_capture_is_not_digested() {
        let mut context = client();
        let mut message = ProtocolMessage::from(Unknown::new(22, vec![12, 0, 0, 0]));
        message.meta_mut().include_in_digest = false;
        message
            .meta_mut()
            .set_complete_resulting_message(Bytes::from_static(&[12, 0, 0, 0]))
            .expect("fresh message");

        complete_received(MessageKind::Unknown, &mut message, &mut context, Adjustment::Apply);
        assert!(context.digest().is_empty());
    }

    #[test]
    fn deferred_parse_leaves_context_untouched() {
        let mut context = client();
        let messages = parse_content(23, b"hello", &mut context, Adjustment::Defer);

        assert_eq!(messages.len(), 1);
        assert_eq!(context.params().last_application_data, None);
    }
}
