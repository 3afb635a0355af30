// src/runner/registry.rs: Session-scoped namespace -> Runner mapping

use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use crate::config::defs::{RunnerError, StopPolicy};
use crate::runner::runner::{DrainOutput, Runner};
use crate::utils::command::CommandLine;

/// Find-or-create registry of runners, one per namespace.
///
/// One instance is owned by each UI session and looked up on every render
/// pass, never reconstructed per pass; it is deliberately not a process-wide
/// singleton, so two sessions cannot see each other's runs. Runners are
/// handed out as `Arc`s, so a namespace entry stays valid across passes
/// while the registry lock is only held for the lookup itself.
///
/// Dropping the registry abandons any children still running; nothing
/// reparents or kills them. A crash of the controlling process has the
/// same effect. Known limitation.
#[derive(Default)]
pub struct RunnerRegistry {
    runners: Mutex<HashMap<String, Arc<Runner>>>,
}

impl RunnerRegistry {
    pub fn new() -> Self {
        RunnerRegistry {
            runners: Mutex::new(HashMap::new()),
        }
    }

    /// Returns the runner for `namespace`, creating an idle one if absent.
    pub fn runner(&self, namespace: &str) -> Arc<Runner> {
        let mut runners = self.runners.lock().unwrap();
        runners
            .entry(namespace.to_string())
            .or_insert_with(|| Arc::new(Runner::new(namespace)))
            .clone()
    }

    pub fn get(&self, namespace: &str) -> Option<Arc<Runner>> {
        self.runners.lock().unwrap().get(namespace).cloned()
    }

    pub fn namespaces(&self) -> Vec<String> {
        let mut names: Vec<String> = self.runners.lock().unwrap().keys().cloned().collect();
        names.sort();
        names
    }

    /// Starts `cmd` under `namespace`. Exactly one of two racing starts
    /// wins; the loser gets `AlreadyRunning`.
    pub fn start(&self, namespace: &str, cmd: &CommandLine) -> Result<(), RunnerError> {
        self.runner(namespace).start(cmd)
    }

    /// Drains new lines and state for `namespace`. Creates the namespace
    /// (as Idle) when it does not exist yet, so render code can drain
    /// unconditionally.
    pub fn drain(&self, namespace: &str) -> DrainOutput {
        self.runner(namespace).drain()
    }

    pub fn stop(&self, namespace: &str, policy: StopPolicy) -> Result<(), RunnerError> {
        match self.get(namespace) {
            Some(runner) => runner.stop(policy),
            None => Ok(()),
        }
    }

    pub fn reset(&self, namespace: &str) -> Result<(), RunnerError> {
        match self.get(namespace) {
            Some(runner) => runner.reset(),
            None => Ok(()),
        }
    }
}
