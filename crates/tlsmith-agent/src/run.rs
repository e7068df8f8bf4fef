//! Start/stop bookkeeping for one instrumented execution.

use std::{fs, path::Path, time::SystemTime};

use tracing::{debug, info, warn};

use crate::{
    branch_trace::{BranchTrace, Termination, parse_branch_trace},
    error::AgentError,
};

/// Outcome of one execution.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AgentResult {
    /// The server crashed
    pub crash: bool,
    /// The server stopped responding
    pub timeout: bool,
    /// When the server was started
    pub start_time: Option<SystemTime>,
    /// When it was stopped. Equals `start_time` if no trace was produced.
    pub stop_time: Option<SystemTime>,
    /// Visited code paths
    pub trace: BranchTrace,
}

/// Lifecycle of one agent.
///
/// ```text
/// idle --start--> running --stop--> stopped --collect_result--> AgentResult
///                    ^                 |
///                    +------start------+
/// ```
///
/// Time is passed in by the caller.
#[derive(Debug, Clone, Default)]
pub struct AgentRun {
    running: bool,
    start_time: Option<SystemTime>,
    stop_time: Option<SystemTime>,
}

impl AgentRun {
    /// Idle agent.
    pub fn new() -> Self {
        Self::default()
    }

    /// True between `start` and `stop`.
    pub fn is_running(&self) -> bool {
        self.running
    }

    /// Mark the server as started.
    ///
    /// # Errors
    ///
    /// [`AgentError::AlreadyRunning`] if already started.
    pub fn start(&mut self, now: SystemTime) -> Result<(), AgentError> {
        if self.running {
            return Err(AgentError::AlreadyRunning);
        }
        self.running = true;
        self.start_time = Some(now);
        self.stop_time = None;
        debug!("agent started");
        Ok(())
    }

    /// Mark the server as stopped.
    ///
    /// # Errors
    ///
    /// [`AgentError::NotRunning`] if not started.
    pub fn stop(&mut self, now: SystemTime) -> Result<(), AgentError> {
        if !self.running {
            return Err(AgentError::NotRunning);
        }
        self.running = false;
        self.stop_time = Some(now);
        debug!("agent stopped");
        Ok(())
    }

    /// Build the result from the branch trace at `path`.
    ///
    /// A missing file yields an empty trace with the stop time equal to the
    /// start time. A trace that fails to decode still reports its
    /// termination, with an empty graph.
    ///
    /// # Errors
    ///
    /// [`AgentError::StillRunning`] before `stop`.
    pub fn collect_result(&self, path: &Path) -> Result<AgentResult, AgentError> {
        if self.running {
            return Err(AgentError::StillRunning);
        }

        let Ok(text) = fs::read_to_string(path) else {
            debug!(path = %path.display(), "no instrumentation output");
            return Ok(AgentResult {
                crash: false,
                timeout: false,
                start_time: self.start_time,
                stop_time: self.start_time,
                trace: BranchTrace::empty(),
            });
        };

        let termination = Termination::from_final_line(&text);
        match termination {
            Termination::Crash => info!(path = %path.display(), "found a crash"),
            Termination::Timeout => info!(path = %path.display(), "found a timeout"),
            Termination::Completed => {},
        }

        let trace = parse_branch_trace(&text).unwrap_or_else(|err| {
            warn!(path = %path.display(), error = %err, "undecodable branch trace, using an empty trace");
            BranchTrace { termination, ..BranchTrace::empty() }
        });

        Ok(AgentResult {
            crash: termination.is_crash(),
            timeout: termination.is_timeout(),
            start_time: self.start_time,
            stop_time: self.stop_time,
            trace,
        })
    }
}
