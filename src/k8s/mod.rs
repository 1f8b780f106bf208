//! Kubernetes operations

pub mod apply;
pub mod cleanup;
pub mod client;
pub mod inspect;
pub mod labels;
pub mod resources;
pub mod rollout;
pub mod wait;

#[cfg(test)]
pub(crate) mod testing;

pub use inspect::{InstallState, Inspector};
pub use resources::{Orchestrator, OrchestratorConfig};
pub use rollout::RolloutUpdater;
pub use wait::ReadinessWaiter;
