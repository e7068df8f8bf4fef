//! Scenario-based testing.
//!
//! A [`Scenario`] declares connections and a workflow trace. Calling
//! [`Scenario::oracle`] is the only way to obtain a [`RunnableScenario`], so
//! every scenario ends with an explicit check of the final [`World`].

mod builder;
pub mod oracle;
mod world;

pub use builder::{RunnableScenario, Scenario};
pub use world::World;

/// Verification run against the final world.
pub type OracleFn = Box<dyn Fn(&World) -> Result<(), String>>;
