//! Utility modules for corectl

pub mod dryrun;
pub mod errors;
pub mod logger;
pub mod progress;
pub mod prompt;

// Re-export commonly used items
pub use errors::{Error, Result};
pub use prompt::{confirm, confirm_or_assume};
