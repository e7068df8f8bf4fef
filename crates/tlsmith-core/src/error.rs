//! Error types for the engine.
//!
//! Errors fall into two classes. [`AdjustmentError`] and [`PipelineError`]
//! describe bad input and are expected during testing: the pipeline logs them
//! and they end up in an action's outcome. [`WorkflowError`] describes a
//! misuse of the engine itself and aborts the trace.

use tlsmith_proto::{MessageKind, ProtocolError};

/// Context could not be updated from a message.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum AdjustmentError {
    /// The message content does not fit the current context
    #[error("message not adjustable: {reason}")]
    NotAdjustable {
        /// What was missing or malformed
        reason: String,
    },

    /// The variant has no adjustment logic
    #[error("adjustment unsupported for {kind}")]
    Unsupported {
        /// Offending variant
        kind: MessageKind,
    },
}

impl AdjustmentError {
    /// Shorthand for [`AdjustmentError::NotAdjustable`].
    pub fn not_adjustable(reason: impl Into<String>) -> Self {
        Self::NotAdjustable { reason: reason.into() }
    }
}

/// Negotiated parameter or primitive failure on the connection context.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ContextError {
    /// A parameter was read before anything set it
    #[error("context parameter '{0}' is not set")]
    UnsetParameter(&'static str),

    /// The PRF rejected its key
    #[error("PRF failure: {0}")]
    Prf(String),
}

/// A message could not be pushed through the pipeline.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum PipelineError {
    /// Decoding failed
    #[error("parse failed: {0}")]
    Parse(#[from] ProtocolError),

    /// Serialisation failed
    #[error("serialization of {kind} failed: {source}")]
    Serialization {
        /// Variant being serialised
        kind: MessageKind,
        /// Cause
        source: ProtocolError,
    },

    /// The variant does not support this role
    #[error("{kind} is not supported")]
    Unsupported {
        /// Offending variant
        kind: MessageKind,
    },

    /// Context access failed
    #[error(transparent)]
    Context(#[from] ContextError),

    /// A handler received a message of another variant
    #[error("handler for {expected} received {actual}")]
    VariantMismatch {
        /// Variant the handler serves
        expected: MessageKind,
        /// Variant it was given
        actual: MessageKind,
    },
}

/// Engine misuse. Aborts the current trace.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum WorkflowError {
    /// An executed action was executed again without a reset
    #[error("{action} on '{alias}' was already executed")]
    AlreadyExecuted {
        /// Action name
        action: &'static str,
        /// Connection alias
        alias: String,
    },

    /// The action names a connection the state does not hold
    #[error("unknown connection alias '{0}'")]
    UnknownConnection(String),

    /// Index past the end of the trace
    #[error("no action at index {0}")]
    NoSuchAction(usize),
}
