//! tlsmith engine core
//!
//! Configurable TLS protocol engine for security testing. Every message
//! field can be computed from the connection state or forced to an
//! arbitrary value, so the engine can produce and digest traffic a
//! conforming implementation never would.
//!
//! # Architecture
//!
//! A [`context::TlsContext`] holds everything one connection has learned:
//! negotiated parameters, the transcript digest, buffered messages and
//! diagnostics. Messages move through the [`pipeline`] in one of two
//! directions:
//!
//! - outbound: prepare, serialize once, digest, adjust the context
//! - inbound: parse, capture the received bytes, digest, complete, adjust
//!
//! Per-variant behavior lives in [`handler`], looked up by message kind.
//!
//! A [`workflow::WorkflowTrace`] is an ordered list of actions (send,
//! receive, apply buffered messages, renegotiate) executed against named
//! connections. Actions execute at most once until reset, which makes a
//! trace replayable.
//!
//! Randomness and time come from an [`env::Environment`] and bytes move
//! over a [`transport::Transport`], so tests can swap in deterministic
//! implementations.
//!
//! # Components
//!
//! - [`config`]: Per-connection configuration
//! - [`context`]: Connection context and diagnostics
//! - [`digest`]: Transcript digest
//! - [`mod@env`]: Environment abstraction (time, RNG)
//! - [`error`]: Error types
//! - [`handler`]: Parser, preparator, serializer and adjuster per variant
//! - [`pipeline`]: Outbound and inbound message processing
//! - [`prf`]: TLS 1.2 PRF
//! - [`transport`]: Byte transport abstraction
//! - [`workflow`]: Actions, traces and the executor

pub mod config;
pub mod context;
pub mod digest;
pub mod env;
pub mod error;
pub mod handler;
pub mod pipeline;
pub mod prf;
pub mod transport;
pub mod workflow;

pub use config::{ConnectionEnd, DigestAlgorithm, TlsConfig};
pub use context::{Diagnostic, Diagnostics, NegotiatedParameters, TlsContext};
pub use env::{Environment, SystemEnv};
pub use error::{AdjustmentError, ContextError, PipelineError, WorkflowError};
pub use transport::{Transport, TransportError};
