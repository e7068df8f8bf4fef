//! Deterministic test harness for tlsmith.
//!
//! Seeded implementations of the Environment trait and in-memory
//! implementations of the Transport trait, plus a scenario builder that runs
//! a workflow trace between connections and checks the result with a
//! mandatory oracle.

#![forbid(unsafe_code)]
#![warn(missing_docs)]

pub mod scenario;
pub mod sim_env;
pub mod sim_transport;

pub use sim_env::SimEnv;
pub use sim_transport::{LoopbackTransport, ScriptedTransport, SentLog};

use tracing_subscriber::EnvFilter;

/// Install a test-friendly `tracing` subscriber.
///
/// Honours `RUST_LOG` and defaults to `warn`. Safe to call from every test;
/// only the first call installs anything.
pub fn init_tracing() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"));
    let _ = tracing_subscriber::fmt().with_env_filter(filter).with_test_writer().try_init();
}
