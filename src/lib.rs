//! Lifecycle management for the Calyptia core operator and core instances
//! on Kubernetes.
//!
//! The library renders the operator manifest for a namespace and version,
//! applies or deletes it, creates the objects of a core instance, waits for
//! deployments to become ready and rolls out image updates. `corectl` is a
//! thin command line over these modules.

pub mod commands;
pub mod config;
pub mod install;
pub mod k8s;
pub mod utils;
