//! tracing setup and the `log_*!` macros used across corectl

use tracing_subscriber::EnvFilter;

#[doc(hidden)]
pub use tracing;

/// Target every corectl event is emitted under
pub const TARGET: &str = "corectl";

/// Map the number of `-v` flags to a default filter directive
pub fn level_for_verbosity(verbose: u8) -> &'static str {
    match verbose {
        0 => "warn",
        1 => "info",
        2 => "debug",
        _ => "trace",
    }
}

/// Filter used when `RUST_LOG` is unset. The kube client stays at warn
/// until `-vvv` so request traces do not drown corectl's own output.
pub fn default_directives(verbose: u8) -> String {
    let level = level_for_verbosity(verbose);
    if verbose >= 3 {
        level.to_string()
    } else {
        format!("warn,{}={}", TARGET, level)
    }
}

/// Install the global subscriber. `RUST_LOG` wins over the verbosity flag.
pub fn init(verbose: u8) {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(default_directives(verbose)));

    // tests may initialise more than once; the first subscriber stays
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(std::io::stderr)
        .try_init();
}

#[macro_export]
macro_rules! log_info {
    ($($arg:tt)*) => {
        $crate::utils::logger::tracing::info!(target: $crate::utils::logger::TARGET, $($arg)*)
    };
}

#[macro_export]
macro_rules! log_warn {
    ($($arg:tt)*) => {
        $crate::utils::logger::tracing::warn!(target: $crate::utils::logger::TARGET, $($arg)*)
    };
}

#[macro_export]
macro_rules! log_error {
    ($($arg:tt)*) => {
        $crate::utils::logger::tracing::error!(target: $crate::utils::logger::TARGET, $($arg)*)
    };
}

#[macro_export]
macro_rules! log_debug {
    ($($arg:tt)*) => {
        $crate::utils::logger::tracing::debug!(target: $crate::utils::logger::TARGET, $($arg)*)
    };
}
