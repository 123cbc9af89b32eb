pub mod audit;
pub mod policy;
pub mod shell;

use anyhow::Context;
use lndis_policy::{PolicyEngine, SessionContext};

use crate::config::LndisConfig;

/// Load the configured rule document, or the compiled-in rules.
///
/// A bad rule document is fatal: nothing runs under a policy we could not read.
pub(crate) fn load_engine(config: &LndisConfig) -> anyhow::Result<PolicyEngine> {
    match &config.policy_path {
        Some(path) => PolicyEngine::load(path)
            .with_context(|| format!("load policy {}", path.display())),
        None => PolicyEngine::builtin().context("load built-in policy"),
    }
}

pub(crate) fn session_context(config: &LndisConfig) -> SessionContext {
    SessionContext::new(&config.workspace_root).with_network(config.network_enabled)
}
