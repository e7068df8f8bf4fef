//! Error types for branch-trace decoding and run bookkeeping.

/// A branch trace could not be decoded.
///
/// Fatal for the file it came from. Callers that need a result anyway fall
/// back to an empty trace.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum BranchTraceError {
    /// A line is neither a base-16 vertex id nor a sentinel
    #[error("line {line_number}: unparsable branch trace entry '{line}'")]
    InvalidLine {
        /// One-based line number
        line_number: usize,
        /// Offending line
        line: String,
    },
}

/// A run was driven through its lifecycle out of order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
pub enum AgentError {
    /// `start` on a running agent
    #[error("agent is already running")]
    AlreadyRunning,

    /// `stop` on an agent that is not running
    #[error("agent is not running")]
    NotRunning,

    /// Results requested before the agent stopped
    #[error("cannot collect results while the agent is still running")]
    StillRunning,
}
