//! Scenario builder API.
//!
//! Provides a declarative API for constructing scenario tests that enforce
//! the Oracle Pattern.

use tlsmith_core::{
    TlsConfig, TlsContext,
    workflow::{State, TlsAction, WorkflowExecutor, WorkflowTrace},
};
use tracing::info;

use crate::{
    scenario::{OracleFn, World},
    sim_env::SimEnv,
    sim_transport::LoopbackTransport,
};

/// Scenario builder.
///
/// Declare one client and one server, connected back to back, plus the
/// actions to run. Must call `.oracle()` to get a [`RunnableScenario`].
pub struct Scenario {
    name: String,
    seed: u64,
    clients: Vec<(String, TlsConfig)>,
    servers: Vec<(String, TlsConfig)>,
    actions: Vec<TlsAction>,
}

impl Scenario {
    /// Create a new scenario with the given name.
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            seed: 0,
            clients: Vec::new(),
            servers: Vec::new(),
            actions: Vec::new(),
        }
    }

    /// Seed for the connections' environments. Connection `n` uses
    /// `seed + n`.
    pub fn seed(mut self, seed: u64) -> Self {
        self.seed = seed;
        self
    }

    /// Add a client with the default configuration.
    pub fn client(self, alias: impl Into<String>) -> Self {
        self.client_with_config(alias, TlsConfig::default())
    }

    /// Add a client with a custom configuration.
    pub fn client_with_config(mut self, alias: impl Into<String>, config: TlsConfig) -> Self {
        self.clients.push((alias.into(), config));
        self
    }

    /// Add a server with the default server configuration.
    pub fn server(self, alias: impl Into<String>) -> Self {
        self.server_with_config(alias, TlsConfig::server())
    }

    /// Add a server with a custom configuration.
    pub fn server_with_config(mut self, alias: impl Into<String>, config: TlsConfig) -> Self {
        self.servers.push((alias.into(), config));
        self
    }

    /// Append an action to the trace.
    pub fn action(mut self, action: TlsAction) -> Self {
        self.actions.push(action);
        self
    }

    /// Set the oracle function and return a runnable scenario.
    ///
    /// The oracle is mandatory - you cannot run a scenario without
    /// verification.
    pub fn oracle(self, oracle: OracleFn) -> RunnableScenario {
        RunnableScenario { scenario: self, oracle }
    }
}

/// A scenario with an oracle function that can be executed.
pub struct RunnableScenario {
    scenario: Scenario,
    oracle: OracleFn,
}

impl RunnableScenario {
    /// Execute the scenario.
    ///
    /// Connects the client and server with a loopback transport, runs every
    /// action in order, then invokes the oracle on the final world. Returns
    /// the world so tests can inspect or replay it.
    pub fn run(self) -> Result<World, String> {
        let Scenario { name, seed, clients, servers, actions } = self.scenario;

        // Only 1:1 scenarios are supported: the loopback transport joins
        // exactly two ends.
        let ([client], [server]) = (clients.as_slice(), servers.as_slice()) else {
            return Err(format!(
                "Scenario '{name}': exactly one client and one server are supported \
                 (got {} clients, {} servers)",
                clients.len(),
                servers.len()
            ));
        };
        if client.0 == server.0 {
            return Err(format!("Scenario '{name}': client and server share alias '{}'", client.0));
        }

        let (client_transport, server_transport) = LoopbackTransport::pair();
        let mut state = State::new();
        for (offset, ((alias, config), transport)) in
            [(client, client_transport), (server, server_transport)].into_iter().enumerate()
        {
            let env = SimEnv::with_seed(seed.wrapping_add(offset as u64));
            let context = TlsContext::with_environment(alias.clone(), config.clone(), Box::new(env));
            state.add_connection(context, Box::new(transport));
        }

        let mut trace: WorkflowTrace = actions.into_iter().collect();
        info!(scenario = %name, actions = trace.len(), "running scenario");
        WorkflowExecutor::new(&mut trace, &mut state)
            .execute_all()
            .map_err(|e| format!("Scenario '{name}': workflow aborted: {e}"))?;

        let world = World::new(state, trace);
        (self.oracle)(&world).map_err(|e| format!("Scenario '{name}': oracle failed: {e}"))?;
        Ok(world)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn scenario_requires_oracle() {
        // This should compile - oracle provided
        let _scenario = Scenario::new("test").client("client").oracle(Box::new(|_world| Ok(())));

        // This should NOT compile - no oracle
        // let scenario = Scenario::new("test").client("client");
        // scenario.run(); // ERROR: no method `run` on type `Scenario`
    }

    #[test]
    fn scenario_creates_connections() {
        let world = Scenario::new("test")
            .client("client")
            .server("server")
            .oracle(Box::new(|world| {
                world.require_context("client")?;
                world.require_context("server")?;
                Ok(())
            }))
            .run()
            .expect("scenario should succeed");

        assert_eq!(world.aliases(), vec!["client".to_string(), "server".to_string()]);
    }

    #[test]
    fn scenario_rejects_missing_server() {
        let result = Scenario::new("lonely").client("client").oracle(Box::new(|_| Ok(()))).run();
        assert!(result.is_err());
    }

    #[test]
    fn oracle_failure_is_reported() {
        let result = Scenario::new("failing")
            .client("client")
            .server("server")
            .oracle(Box::new(|_| Err("nope".to_string())))
            .run();

        assert!(result.is_err_and(|e| e.contains("nope")));
    }
}
