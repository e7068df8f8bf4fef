//! Workflow actions and their execution against a connection.

use bytes::{Buf, BytesMut};
use tlsmith_proto::{
    ContentType, MessageKind, ProtocolMessage, RecordLayer, defragment, handshake::split_messages,
};
use tracing::{debug, info, warn};

use super::{ActionOutcome, ActionState, Connection, State};
use crate::{
    context::TlsContext,
    error::WorkflowError,
    pipeline::{self, Adjustment},
    transport::TransportError,
};

/// One step of a workflow trace.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TlsAction {
    /// Prepare and send messages
    Send(SendAction),
    /// Receive and parse messages
    Receive(ReceiveAction),
    /// Adjust the context from buffered messages
    ApplyBufferedMessages(ApplyBufferedMessagesAction),
    /// Start a new handshake phase
    Renegotiation(RenegotiationAction),
    /// Drop buffered messages
    ClearBuffer(ClearBufferAction),
    /// Change the order of prepare-after-parse computations
    SetReversePrepareAfterParse(SetReversePrepareAfterParseAction),
}

macro_rules! each_action {
    ($action:expr, $inner:ident => $body:expr) => {
        match $action {
            TlsAction::Send($inner) => $body,
            TlsAction::Receive($inner) => $body,
            TlsAction::ApplyBufferedMessages($inner) => $body,
            TlsAction::Renegotiation($inner) => $body,
            TlsAction::ClearBuffer($inner) => $body,
            TlsAction::SetReversePrepareAfterParse($inner) => $body,
        }
    };
}

impl TlsAction {
    /// Send `messages` on `alias`, coalescing records by content type.
    pub fn send(alias: impl Into<String>, messages: Vec<ProtocolMessage>) -> Self {
        Self::Send(SendAction::new(alias, messages))
    }

    /// Expect `expected` on `alias` and adjust the context as they arrive.
    pub fn receive(alias: impl Into<String>, expected: Vec<MessageKind>) -> Self {
        Self::Receive(ReceiveAction::new(alias, expected, ReceiveMode::Apply))
    }

    /// Expect `expected` on `alias` and buffer them without adjustment.
    pub fn receive_buffered(alias: impl Into<String>, expected: Vec<MessageKind>) -> Self {
        Self::Receive(ReceiveAction::new(alias, expected, ReceiveMode::Buffer))
    }

    /// Adjust `alias`'s context from its buffered messages.
    pub fn apply_buffered_messages(alias: impl Into<String>) -> Self {
        Self::ApplyBufferedMessages(ApplyBufferedMessagesAction::new(alias))
    }

    /// Reset `alias`'s transcript digest.
    pub fn renegotiation(alias: impl Into<String>) -> Self {
        Self::Renegotiation(RenegotiationAction::new(alias))
    }

    /// Clear `alias`'s message buffer.
    pub fn clear_buffer(alias: impl Into<String>) -> Self {
        Self::ClearBuffer(ClearBufferAction::new(alias))
    }

    /// Set `alias`'s prepare-after-parse order.
    pub fn set_reverse_prepare_after_parse(alias: impl Into<String>, reverse: bool) -> Self {
        Self::SetReversePrepareAfterParse(SetReversePrepareAfterParseAction::new(alias, reverse))
    }

    /// Action name for logs and errors.
    pub fn name(&self) -> &'static str {
        match self {
            Self::Send(_) => "Send",
            Self::Receive(_) => "Receive",
            Self::ApplyBufferedMessages(_) => "ApplyBufferedMessages",
            Self::Renegotiation(_) => "Renegotiation",
            Self::ClearBuffer(_) => "ClearBuffer",
            Self::SetReversePrepareAfterParse(_) => "SetReversePrepareAfterParse",
        }
    }

    /// Alias of the connection the action runs on.
    pub fn connection_alias(&self) -> &str {
        each_action!(self, a => &a.connection_alias)
    }

    /// Execution state.
    pub fn state(&self) -> &ActionState {
        each_action!(self, a => &a.state)
    }

    fn state_mut(&mut self) -> &mut ActionState {
        each_action!(self, a => &mut a.state)
    }

    /// True once executed.
    pub fn is_executed(&self) -> bool {
        self.state().is_executed()
    }

    /// Outcome, once executed.
    pub fn outcome(&self) -> Option<&ActionOutcome> {
        self.state().outcome()
    }

    /// Run the action against its connection in `state`.
    ///
    /// Fails without side effects if the action was already executed or its
    /// connection is unknown.
    pub fn execute(&mut self, state: &mut State) -> Result<ActionOutcome, WorkflowError> {
        if self.is_executed() {
            return Err(WorkflowError::AlreadyExecuted {
                action: self.name(),
                alias: self.connection_alias().to_string(),
            });
        }
        let connection = state.connection_mut(self.connection_alias())?;

        *self.state_mut() = ActionState::Executing;
        let outcome = match self {
            Self::Send(action) => action.run(connection),
            Self::Receive(action) => action.run(connection),
            Self::ApplyBufferedMessages(_) => {
                ApplyBufferedMessagesAction::run(&mut connection.context)
            },
            Self::Renegotiation(_) => RenegotiationAction::run(&mut connection.context),
            Self::ClearBuffer(_) => {
                connection.context.clear_buffer();
                ActionOutcome::as_planned()
            },
            Self::SetReversePrepareAfterParse(action) => {
                connection.context.set_reverse_prepare_after_parse(action.reverse);
                ActionOutcome::as_planned()
            },
        };
        debug!(action = self.name(), as_planned = outcome.executed_as_planned, "action executed");

        *self.state_mut() = ActionState::Executed(outcome.clone());
        Ok(outcome)
    }

    /// Return to `NotExecuted`, discarding the outcome and any messages the
    /// action produced or received.
    pub fn reset(&mut self) {
        match self {
            Self::Send(action) => action.sent.clear(),
            Self::Receive(action) => action.received.clear(),
            Self::ApplyBufferedMessages(_)
            | Self::Renegotiation(_)
            | Self::ClearBuffer(_)
            | Self::SetReversePrepareAfterParse(_) => {},
        }
        *self.state_mut() = ActionState::NotExecuted;
    }
}

/// Prepares, frames and sends a list of messages.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SendAction {
    connection_alias: String,
    state: ActionState,
    /// Messages to send. Each execution works on fresh clones.
    pub messages: Vec<ProtocolMessage>,
    /// Put every message into its own records instead of coalescing
    pub record_per_message: bool,
    /// Run the preparators. Without it, messages go out as they stand.
    pub with_prepare: bool,
    sent: Vec<ProtocolMessage>,
}

impl SendAction {
    /// Send `messages` on `alias`.
    pub fn new(alias: impl Into<String>, messages: Vec<ProtocolMessage>) -> Self {
        Self {
            connection_alias: alias.into(),
            state: ActionState::NotExecuted,
            messages,
            record_per_message: false,
            with_prepare: true,
            sent: Vec::new(),
        }
    }

    /// Messages as they were sent by the last execution.
    pub fn sent_messages(&self) -> &[ProtocolMessage] {
        &self.sent
    }

    fn run(&mut self, connection: &mut Connection) -> ActionOutcome {
        let context = &mut connection.context;
        let config = context.config();
        let layer = RecordLayer::new(config.record_version, config.max_fragment_length);

        let mut failures = Vec::new();
        // (content type, message-level bytes) in send order
        let mut chunks: Vec<(u8, BytesMut)> = Vec::new();

        for template in &self.messages {
            let mut message = template.clone();
            match pipeline::prepare_message(&mut message, context, self.with_prepare) {
                Ok(bytes) => {
                    let content_type = message.content_type();
                    match chunks.last_mut() {
                        Some((last_type, data))
                            if !self.record_per_message && *last_type == content_type =>
                        {
                            data.extend_from_slice(&bytes);
                        },
                        _ => chunks.push((content_type, BytesMut::from(bytes.as_ref()))),
                    }
                    self.sent.push(message);
                },
                Err(error) => {
                    warn!(
                        alias = context.alias(),
                        kind = %message.kind(),
                        %error,
                        "could not prepare message"
                    );
                    failures.push(format!("{}: {error}", message.kind()));
                },
            }
        }

        let records: Vec<_> = chunks
            .iter()
            .flat_map(|(content_type, data)| layer.frame(*content_type, data))
            .collect();
        if !records.is_empty() {
            let wire = layer.encode(&records);
            debug!(records = records.len(), bytes = wire.len(), "sending records");
            if let Err(error) = connection.transport.send(&wire) {
                failures.push(format!("transport: {error}"));
            }
        }

        if failures.is_empty() {
            ActionOutcome::as_planned()
        } else {
            ActionOutcome::failed(failures.join("; "))
        }
    }
}

/// What a receive does with parsed messages.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum ReceiveMode {
    /// Adjust the context as messages arrive
    #[default]
    Apply,
    /// Digest only and queue the messages in the context buffer
    Buffer,
}

/// Reads records until the expected messages arrived or the peer went quiet.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReceiveAction {
    connection_alias: String,
    state: ActionState,
    /// Message kinds expected, in order
    pub expected: Vec<MessageKind>,
    /// Apply or buffer received messages
    pub mode: ReceiveMode,
    received: Vec<ProtocolMessage>,
}

impl ReceiveAction {
    /// Expect `expected` on `alias`.
    pub fn new(alias: impl Into<String>, expected: Vec<MessageKind>, mode: ReceiveMode) -> Self {
        Self {
            connection_alias: alias.into(),
            state: ActionState::NotExecuted,
            expected,
            mode,
            received: Vec::new(),
        }
    }

    /// Messages received by the last execution.
    pub fn received_messages(&self) -> &[ProtocolMessage] {
        &self.received
    }

    fn adjustment(&self) -> Adjustment {
        match self.mode {
            ReceiveMode::Apply => Adjustment::Apply,
            ReceiveMode::Buffer => Adjustment::Defer,
        }
    }

    /// Parse one reassembled stream, holding back an incomplete trailing
    /// handshake message until more bytes arrive.
    fn consume_stream(
        &mut self,
        content_type: u8,
        data: &[u8],
        handshake_carry: &mut Vec<u8>,
        context: &mut TlsContext,
    ) {
        let messages = if content_type == ContentType::Handshake.to_u8() {
            handshake_carry.extend_from_slice(data);
            let (_, complete) = split_messages(handshake_carry);
            let ready: Vec<u8> = handshake_carry.drain(..complete).collect();
            pipeline::parse_content(content_type, &ready, context, self.adjustment())
        } else {
            pipeline::parse_content(content_type, data, context, self.adjustment())
        };
        self.accept(messages, context);
    }

    fn accept(&mut self, messages: Vec<ProtocolMessage>, context: &mut TlsContext) {
        for message in messages {
            debug!(alias = context.alias(), kind = %message.kind(), "received message");
            if self.mode == ReceiveMode::Buffer {
                context.enqueue_message(message.clone());
            }
            self.received.push(message);
        }
    }

    fn wants_more(&self) -> bool {
        self.expected.is_empty() || self.received.len() < self.expected.len()
    }

    fn run(&mut self, connection: &mut Connection) -> ActionOutcome {
        let timeout = connection.context.config().response_timeout;
        let layer = RecordLayer::new(
            connection.context.config().record_version,
            connection.context.config().max_fragment_length,
        );
        let mut pending = BytesMut::new();
        let mut handshake_carry = Vec::new();
        let mut transport_failure = None;

        while self.wants_more() {
            match connection.transport.receive(timeout) {
                Ok(chunk) => {
                    pending.extend_from_slice(&chunk);
                    let (records, consumed) = layer.parse_complete_records(&pending);
                    pending.advance(consumed);
                    for stream in defragment(&records) {
                        self.consume_stream(
                            stream.content_type,
                            &stream.data,
                            &mut handshake_carry,
                            &mut connection.context,
                        );
                    }
                },
                Err(TransportError::Timeout(_) | TransportError::Closed) => break,
                Err(error) => {
                    warn!(alias = connection.context.alias(), %error, "receive failed");
                    transport_failure = Some(error.to_string());
                    break;
                },
            }
        }

        // Whatever is left can never complete: parse it as it stands.
        let leftover = layer.parse_records(&pending);
        for stream in defragment(&leftover.records) {
            self.consume_stream(
                stream.content_type,
                &stream.data,
                &mut handshake_carry,
                &mut connection.context,
            );
        }
        if !handshake_carry.is_empty() {
            let messages = pipeline::parse_content(
                ContentType::Handshake.to_u8(),
                &handshake_carry,
                &mut connection.context,
                self.adjustment(),
            );
            self.accept(messages, &mut connection.context);
        }

        let received: Vec<MessageKind> = self.received.iter().map(ProtocolMessage::kind).collect();
        match transport_failure {
            Some(error) => ActionOutcome::failed(format!("transport: {error}")),
            None if received == self.expected => ActionOutcome::as_planned(),
            None => ActionOutcome::failed(format!(
                "expected {:?}, received {:?}",
                self.expected, received
            )),
        }
    }
}

/// Adjusts the context from every buffered message.
///
/// Every message is applied, including those whose `adjust_context` flag is
/// cleared. Nothing is re-parsed or digested and the buffer is kept.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ApplyBufferedMessagesAction {
    connection_alias: String,
    state: ActionState,
}

impl ApplyBufferedMessagesAction {
    /// Apply `alias`'s buffer.
    pub fn new(alias: impl Into<String>) -> Self {
        Self { connection_alias: alias.into(), state: ActionState::NotExecuted }
    }

    fn run(context: &mut TlsContext) -> ActionOutcome {
        let buffered: Vec<ProtocolMessage> = context.buffered_messages().cloned().collect();
        let failed = buffered
            .iter()
            .filter(|message| !pipeline::force_adjust(message, context).is_ok())
            .count();
        debug!(
            alias = context.alias(),
            applied = buffered.len(),
            failed,
            "applied buffered messages"
        );

        // Adjustment failures stay non-fatal.
        let mut outcome = ActionOutcome::as_planned();
        if failed > 0 {
            outcome.detail = Some(format!("{failed} of {} adjustments failed", buffered.len()));
        }
        outcome
    }
}

/// Resets the transcript digest to start a new handshake phase.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RenegotiationAction {
    connection_alias: String,
    state: ActionState,
}

impl RenegotiationAction {
    /// Renegotiate on `alias`.
    pub fn new(alias: impl Into<String>) -> Self {
        Self { connection_alias: alias.into(), state: ActionState::NotExecuted }
    }

    fn run(context: &mut TlsContext) -> ActionOutcome {
        info!(
            alias = context.alias(),
            discarded = context.digest().raw().len(),
            "renegotiation resets the transcript digest"
        );
        context.reset_digest();
        ActionOutcome::as_planned()
    }
}

/// Drops buffered messages.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClearBufferAction {
    connection_alias: String,
    state: ActionState,
}

impl ClearBufferAction {
    /// Clear `alias`'s buffer.
    pub fn new(alias: impl Into<String>) -> Self {
        Self { connection_alias: alias.into(), state: ActionState::NotExecuted }
    }
}

/// Sets the prepare-after-parse order on the context.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SetReversePrepareAfterParseAction {
    connection_alias: String,
    state: ActionState,
    /// Value to set
    pub reverse: bool,
}

impl SetReversePrepareAfterParseAction {
    /// Set the order on `alias`.
    pub fn new(alias: impl Into<String>, reverse: bool) -> Self {
        Self { connection_alias: alias.into(), state: ActionState::NotExecuted, reverse }
    }
}
