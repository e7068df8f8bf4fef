//! Reusable oracles.

use super::{OracleFn, World};

/// Every action ran and matched its expectation.
pub fn all_executed_as_planned() -> OracleFn {
    Box::new(|world: &World| {
        if world.all_executed_as_planned() {
            return Ok(());
        }
        let failures: Vec<String> = world
            .trace()
            .actions()
            .iter()
            .enumerate()
            .filter(|(_, action)| !action.outcome().is_some_and(|o| o.executed_as_planned))
            .map(|(index, action)| {
                let detail = action
                    .outcome()
                    .and_then(|o| o.detail.clone())
                    .unwrap_or_else(|| "not executed".into());
                format!("#{index} {} on '{}': {detail}", action.name(), action.connection_alias())
            })
            .collect();
        Err(format!("actions not executed as planned: {}", failures.join(", ")))
    })
}

/// Both connections hold identical transcripts.
pub fn digests_match(a: &'static str, b: &'static str) -> OracleFn {
    Box::new(move |world: &World| {
        if world.digests_match(a, b) {
            Ok(())
        } else {
            Err(format!("transcript digests of '{a}' and '{b}' differ"))
        }
    })
}

/// No adjustment on `alias` failed.
pub fn no_adjustment_failures(alias: &'static str) -> OracleFn {
    Box::new(move |world: &World| {
        let context = world.require_context(alias)?;
        let failures: Vec<String> = context
            .diagnostics()
            .adjustment_failures()
            .map(|(kind, error)| format!("{kind}: {error}"))
            .collect();
        if failures.is_empty() {
            Ok(())
        } else {
            Err(format!("'{alias}' recorded adjustment failures: {}", failures.join(", ")))
        }
    })
}

/// Every oracle passes. Reports the first failure.
pub fn all_of(oracles: Vec<OracleFn>) -> OracleFn {
    Box::new(move |world: &World| oracles.iter().try_for_each(|oracle| oracle(world)))
}
