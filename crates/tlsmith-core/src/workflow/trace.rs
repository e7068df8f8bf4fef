//! Ordered action lists that make up a workflow.

use std::collections::BTreeSet;

use super::TlsAction;
use crate::error::WorkflowError;

/// Ordered, editable list of actions.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct WorkflowTrace {
    actions: Vec<TlsAction>,
}

impl WorkflowTrace {
    /// Empty trace.
    pub fn new() -> Self {
        Self::default()
    }

    /// Append an action.
    pub fn push(&mut self, action: TlsAction) -> &mut Self {
        self.actions.push(action);
        self
    }

    /// Insert an action before `index`. `index == len()` appends.
    pub fn insert(&mut self, index: usize, action: TlsAction) -> Result<(), WorkflowError> {
        if index > self.actions.len() {
            return Err(WorkflowError::NoSuchAction(index));
        }
        self.actions.insert(index, action);
        Ok(())
    }

    /// Remove and return the action at `index`.
    pub fn remove(&mut self, index: usize) -> Result<TlsAction, WorkflowError> {
        if index >= self.actions.len() {
            return Err(WorkflowError::NoSuchAction(index));
        }
        Ok(self.actions.remove(index))
    }

    /// Actions in order.
    pub fn actions(&self) -> &[TlsAction] {
        &self.actions
    }

    /// Actions in order, mutably, for editing between runs.
    pub fn actions_mut(&mut self) -> &mut [TlsAction] {
        &mut self.actions
    }

    /// Action at `index`.
    pub fn get(&self, index: usize) -> Option<&TlsAction> {
        self.actions.get(index)
    }

    /// Number of actions.
    pub fn len(&self) -> usize {
        self.actions.len()
    }

    /// True if the trace has no actions.
    pub fn is_empty(&self) -> bool {
        self.actions.is_empty()
    }

    /// Aliases of every connection the trace touches.
    pub fn connection_aliases(&self) -> BTreeSet<&str> {
        self.actions.iter().map(TlsAction::connection_alias).collect()
    }

    /// Reset every action.
    pub fn reset(&mut self) {
        self.reset_from(0);
    }

    /// Reset the actions from `index` on, keeping earlier outcomes.
    pub fn reset_from(&mut self, index: usize) {
        for action in self.actions.iter_mut().skip(index) {
            action.reset();
        }
    }

    /// Index of the first action not yet executed.
    pub fn next_pending(&self) -> Option<usize> {
        self.actions.iter().position(|action| !action.is_executed())
    }

    /// True if every action ran and matched its expectation.
    pub fn all_executed_as_planned(&self) -> bool {
        self.actions
            .iter()
            .all(|action| action.outcome().is_some_and(|outcome| outcome.executed_as_planned))
    }
}

impl FromIterator<TlsAction> for WorkflowTrace {
    fn from_iter<I: IntoIterator<Item = TlsAction>>(iter: I) -> Self {
        Self { actions: iter.into_iter().collect() }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn trace() -> WorkflowTrace {
        [
            TlsAction::renegotiation("client"),
            TlsAction::clear_buffer("client"),
            TlsAction::apply_buffered_messages("server"),
        ]
        .into_iter()
        .collect()
    }

    #[test]
    fn insert_and_remove_are_bounds_checked() {
        let mut trace = trace();

        assert_eq!(
            trace.insert(4, TlsAction::renegotiation("client")),
            Err(WorkflowError::NoSuchAction(4))
        );
        assert!(trace.insert(3, TlsAction::renegotiation("client")).is_ok());
        assert_eq!(trace.len(), 4);

        assert!(matches!(trace.remove(4), Err(WorkflowError::NoSuchAction(4))));
        assert_eq!(trace.remove(0).map(|a| a.name()), Ok("Renegotiation"));
    }

    #[test]
    fn pending_actions_are_not_planned() {
        assert!(WorkflowTrace::new().all_executed_as_planned());
        assert!(!trace().all_executed_as_planned());
        assert_eq!(trace().next_pending(), Some(0));
    }

    #[test]
    fn aliases_are_collected() {
        let trace = trace();
        let aliases: Vec<_> = trace.connection_aliases().into_iter().collect();
        assert_eq!(aliases, vec!["client", "server"]);
    }
}
