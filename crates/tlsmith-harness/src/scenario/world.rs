//! World state after a scenario ran.

use tlsmith_core::{
    TlsContext,
    workflow::{State, TlsAction, WorkflowTrace},
};

/// Connections and trace as the scenario left them.
#[derive(Debug)]
pub struct World {
    state: State,
    trace: WorkflowTrace,
}

impl World {
    pub(crate) fn new(state: State, trace: WorkflowTrace) -> Self {
        Self { state, trace }
    }

    /// Context of a connection.
    pub fn context(&self, alias: &str) -> Option<&TlsContext> {
        self.state.context(alias)
    }

    /// Context of a connection, or a message naming the missing alias.
    pub fn require_context(&self, alias: &str) -> Result<&TlsContext, String> {
        self.context(alias).ok_or_else(|| format!("no connection named '{alias}'"))
    }

    /// The executed trace.
    pub fn trace(&self) -> &WorkflowTrace {
        &self.trace
    }

    /// Action at `index`.
    pub fn action(&self, index: usize) -> Option<&TlsAction> {
        self.trace.get(index)
    }

    /// Aliases of all connections.
    pub fn aliases(&self) -> Vec<String> {
        self.state.aliases().map(str::to_string).collect()
    }

    /// True if every action matched its expectation.
    pub fn all_executed_as_planned(&self) -> bool {
        self.trace.all_executed_as_planned()
    }

    /// True if both connections hold the same transcript bytes.
    pub fn digests_match(&self, a: &str, b: &str) -> bool {
        match (self.context(a), self.context(b)) {
            (Some(a), Some(b)) => a.digest().raw() == b.digest().raw(),
            _ => false,
        }
    }

    /// Take the state and trace back, for replay.
    pub fn into_parts(self) -> (State, WorkflowTrace) {
        (self.state, self.trace)
    }
}
