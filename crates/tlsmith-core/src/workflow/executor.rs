//! Sequential execution of a workflow trace.

use tracing::{debug_span, info, info_span};

use super::{ActionOutcome, State, WorkflowTrace};
use crate::error::WorkflowError;

/// Runs a trace's actions in order against a [`State`].
///
/// Execution is strictly sequential: one action finishes before the next
/// starts. A [`WorkflowError`] stops the run and leaves later actions
/// untouched, so the trace can be fixed and resumed.
#[derive(Debug)]
pub struct WorkflowExecutor<'a> {
    trace: &'a mut WorkflowTrace,
    state: &'a mut State,
}

impl<'a> WorkflowExecutor<'a> {
    /// Executor over `trace` and `state`.
    pub fn new(trace: &'a mut WorkflowTrace, state: &'a mut State) -> Self {
        Self { trace, state }
    }

    /// The trace being executed.
    pub fn trace(&self) -> &WorkflowTrace {
        self.trace
    }

    /// The connections being driven.
    pub fn state(&self) -> &State {
        self.state
    }

    /// Execute the next pending action.
    ///
    /// Returns its index and outcome, or `None` once every action ran.
    pub fn step(&mut self) -> Result<Option<(usize, ActionOutcome)>, WorkflowError> {
        let Some(index) = self.trace.next_pending() else {
            return Ok(None);
        };
        let action = self
            .trace
            .actions_mut()
            .get_mut(index)
            .ok_or(WorkflowError::NoSuchAction(index))?;

        let span =
            debug_span!("action", index, name = action.name(), alias = action.connection_alias());
        let _guard = span.enter();
        let outcome = action.execute(self.state)?;
        Ok(Some((index, outcome)))
    }

    /// Execute pending actions up to and including `index`.
    pub fn execute_until(&mut self, index: usize) -> Result<(), WorkflowError> {
        if index >= self.trace.len() {
            return Err(WorkflowError::NoSuchAction(index));
        }
        let span = info_span!("workflow", until = index);
        let _guard = span.enter();

        while let Some(next) = self.trace.next_pending() {
            if next > index {
                break;
            }
            self.step()?;
        }
        Ok(())
    }

    /// Execute every pending action.
    pub fn execute_all(&mut self) -> Result<(), WorkflowError> {
        let span = info_span!("workflow", actions = self.trace.len());
        let _guard = span.enter();

        while self.step()?.is_some() {}

        info!(as_planned = self.trace.all_executed_as_planned(), "workflow finished");
        Ok(())
    }
}
