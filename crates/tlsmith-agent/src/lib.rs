//! Result artifacts of coverage-guided runs.
//!
//! An instrumented server writes one branch trace per execution: a text file
//! listing the ids of the basic blocks it visited, one base-16 id per line,
//! optionally terminated by a `CRASH` or `TIMEOUT` line. This crate decodes
//! those files into a [`BranchTrace`] graph and keeps the start/stop
//! bookkeeping of a run in an [`AgentRun`].
//!
//! Process management of the server under test is not handled here. The
//! caller starts and stops it and tells [`AgentRun`] when it did.

mod branch_trace;
mod error;
mod run;

pub use branch_trace::{BranchTrace, Edge, Termination, load_branch_trace, parse_branch_trace, termination};
pub use error::{AgentError, BranchTraceError};
pub use run::{AgentResult, AgentRun};
