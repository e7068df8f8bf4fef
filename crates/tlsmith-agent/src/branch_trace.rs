//! Branch-trace decoding.

use std::{
    collections::{BTreeMap, BTreeSet},
    fs,
    path::Path,
};

use tracing::{error, info};

use crate::error::BranchTraceError;

const CRASH: &str = "CRASH";
const TIMEOUT: &str = "TIMEOUT";

/// Directed transition between two visited vertices.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Edge {
    /// Vertex the transition left
    pub source: u64,
    /// Vertex the transition reached
    pub destination: u64,
}

/// How the traced execution ended.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum Termination {
    /// No sentinel on the final line
    #[default]
    Completed,
    /// The server crashed
    Crash,
    /// The server stopped responding
    Timeout,
}

impl Termination {
    /// Termination indicated by the final line of a trace file.
    pub fn from_final_line(text: &str) -> Self {
        match text.lines().last().map(str::trim_end) {
            Some(CRASH) => Self::Crash,
            Some(TIMEOUT) => Self::Timeout,
            _ => Self::Completed,
        }
    }

    /// True for [`Termination::Crash`].
    pub fn is_crash(self) -> bool {
        self == Self::Crash
    }

    /// True for [`Termination::Timeout`].
    pub fn is_timeout(self) -> bool {
        self == Self::Timeout
    }
}

/// Graph of the code paths one execution visited.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct BranchTrace {
    /// Every vertex id seen
    pub vertices: BTreeSet<u64>,
    /// Hit count per consecutive vertex pair
    pub edges: BTreeMap<Edge, u64>,
    /// Sentinel from the final line
    pub termination: Termination,
}

impl BranchTrace {
    /// Trace with no vertices.
    pub fn empty() -> Self {
        Self::default()
    }

    /// True if nothing was visited.
    pub fn is_empty(&self) -> bool {
        self.vertices.is_empty()
    }

    /// Hits recorded for `source -> destination`.
    pub fn edge_count(&self, source: u64, destination: u64) -> u64 {
        self.edges.get(&Edge { source, destination }).copied().unwrap_or(0)
    }
}

/// Decode a branch trace.
///
/// Each line is a base-16 vertex id or one of the `CRASH` / `TIMEOUT`
/// sentinels. Consecutive ids form an edge. Sentinels are skipped when
/// building the graph and only the final line decides [`Termination`].
///
/// # Errors
///
/// [`BranchTraceError::InvalidLine`] for the first line that is neither.
pub fn parse_branch_trace(text: &str) -> Result<BranchTrace, BranchTraceError> {
    let mut trace = BranchTrace { termination: Termination::from_final_line(text), ..BranchTrace::default() };
    let mut previous = None;

    for (index, raw) in text.lines().enumerate() {
        let line = raw.trim_end();
        if line == CRASH || line == TIMEOUT {
            continue;
        }
        let vertex = u64::from_str_radix(line, 16)
            .map_err(|_| BranchTraceError::InvalidLine { line_number: index + 1, line: line.to_string() })?;

        trace.vertices.insert(vertex);
        if let Some(source) = previous {
            *trace.edges.entry(Edge { source, destination: vertex }).or_insert(0) += 1;
        }
        previous = Some(vertex);
    }

    Ok(trace)
}

/// Read and decode a branch trace file.
///
/// A missing or unreadable file is logged and yields an empty trace.
///
/// # Errors
///
/// Decoding errors from [`parse_branch_trace`].
pub fn load_branch_trace(path: &Path) -> Result<BranchTrace, BranchTraceError> {
    match fs::read_to_string(path) {
        Ok(text) => parse_branch_trace(&text),
        Err(err) => {
            error!(path = %path.display(), error = %err, "could not read branch trace, using an empty trace");
            Ok(BranchTrace::empty())
        },
    }
}

/// Crash or timeout indicator of a decoded trace.
pub fn termination(trace: &BranchTrace) -> Termination {
    if trace.termination != Termination::Completed {
        info!(termination = ?trace.termination, vertices = trace.vertices.len(), "abnormal termination");
    }
    trace.termination
}
