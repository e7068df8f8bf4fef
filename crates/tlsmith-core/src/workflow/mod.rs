//! Workflow action engine.
//!
//! A [`WorkflowTrace`] is an ordered list of [`TlsAction`]s, each bound to a
//! connection by alias. The [`WorkflowExecutor`] runs them strictly in order
//! against a [`State`] holding one [`Connection`] per alias.
//!
//! # Action lifecycle
//!
//! ```text
//! ┌─────────────┐ execute ┌───────────┐ effect done ┌──────────────────┐
//! │ NotExecuted │────────>│ Executing │────────────>│ Executed(outcome)│
//! └─────────────┘         └───────────┘             └──────────────────┘
//!        ^                                                   │
//!        └──────────────────────── reset ────────────────────┘
//! ```
//!
//! Executing an `Executed` action fails with
//! [`WorkflowError::AlreadyExecuted`](crate::error::WorkflowError) and
//! leaves the first outcome untouched. Resetting discards the outcome and
//! anything the action sent or received, so a trace can be replayed from any
//! point.

mod action;
mod executor;
mod trace;

use std::collections::BTreeMap;

pub use action::{
    ApplyBufferedMessagesAction, ClearBufferAction, ReceiveAction, ReceiveMode,
    RenegotiationAction, SendAction, SetReversePrepareAfterParseAction, TlsAction,
};
pub use executor::WorkflowExecutor;
pub use trace::WorkflowTrace;

use crate::{context::TlsContext, error::WorkflowError, transport::Transport};

/// What an executed action observed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ActionOutcome {
    /// The observed effect matched the action's expectation
    pub executed_as_planned: bool,
    /// Human-readable explanation when it did not
    pub detail: Option<String>,
}

impl ActionOutcome {
    /// Outcome that matched expectations.
    pub fn as_planned() -> Self {
        Self { executed_as_planned: true, detail: None }
    }

    /// Outcome that did not match expectations.
    pub fn failed(detail: impl Into<String>) -> Self {
        Self { executed_as_planned: false, detail: Some(detail.into()) }
    }
}

/// Execution state of one action.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub enum ActionState {
    /// Not run since creation or the last reset
    #[default]
    NotExecuted,
    /// Effect in progress
    Executing,
    /// Effect done
    Executed(ActionOutcome),
}

impl ActionState {
    /// True once the action has run.
    pub fn is_executed(&self) -> bool {
        matches!(self, Self::Executed(_))
    }

    /// Outcome, once executed.
    pub fn outcome(&self) -> Option<&ActionOutcome> {
        match self {
            Self::Executed(outcome) => Some(outcome),
            Self::NotExecuted | Self::Executing => None,
        }
    }
}

/// Context and transport of one named connection.
pub struct Connection {
    /// Connection state
    pub context: TlsContext,
    /// Byte pipe to the peer
    pub transport: Box<dyn Transport>,
}

impl std::fmt::Debug for Connection {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Connection").field("context", &self.context).finish_non_exhaustive()
    }
}

/// All connections a trace runs against, keyed by alias.
///
/// Contexts are only reachable mutably through the action that names them.
/// Other code reads them through [`State::context`].
#[derive(Debug, Default)]
pub struct State {
    connections: BTreeMap<String, Connection>,
}

impl State {
    /// Empty state.
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a connection under its context's alias, replacing any
    /// previous one with the same alias.
    pub fn add_connection(&mut self, context: TlsContext, transport: Box<dyn Transport>) {
        let alias = context.alias().to_string();
        self.connections.insert(alias, Connection { context, transport });
    }

    /// Read-only view of a connection's context.
    pub fn context(&self, alias: &str) -> Option<&TlsContext> {
        self.connections.get(alias).map(|connection| &connection.context)
    }

    /// Connection for `alias`.
    pub fn connection_mut(&mut self, alias: &str) -> Result<&mut Connection, WorkflowError> {
        self.connections
            .get_mut(alias)
            .ok_or_else(|| WorkflowError::UnknownConnection(alias.to_string()))
    }

    /// Registered aliases in order.
    pub fn aliases(&self) -> impl Iterator<Item = &str> {
        self.connections.keys().map(String::as_str)
    }

    /// Reset every context to its freshly created state.
    pub fn reset_contexts(&mut self) {
        for connection in self.connections.values_mut() {
            connection.context.reset();
        }
    }

    /// Close every transport.
    pub fn close_all(&mut self) {
        for connection in self.connections.values_mut() {
            connection.transport.close();
        }
    }
}
