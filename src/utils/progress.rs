//! Spinner shown while corectl waits on the cluster

use indicatif::{ProgressBar, ProgressStyle};
use std::future::Future;
use std::time::Duration;

const TICKS: &[&str] = &["⠋", "⠙", "⠹", "⠸", "⠼", "⠴", "⠦", "⠧", "⠇", "⠏"];

/// Spinner with a cyan tick and `message`
pub fn create_spinner(message: &str) -> ProgressBar {
    let spinner = ProgressBar::new_spinner().with_message(message.to_string());
    if let Ok(style) = ProgressStyle::with_template("{spinner:.cyan} {msg}") {
        spinner.set_style(style.tick_strings(TICKS));
    }
    spinner.enable_steady_tick(Duration::from_millis(80));
    spinner
}

/// Await `task` behind a spinner, finishing with `done` or the error
pub async fn with_spinner_result<F, T, E>(message: &str, done: &str, task: F) -> Result<T, E>
where
    F: Future<Output = Result<T, E>>,
    E: std::fmt::Display,
{
    let spinner = create_spinner(message);
    let result = task.await;
    let summary = match &result {
        Ok(_) => format!("✓ {}", done),
        Err(e) => format!("✗ Failed: {}", e),
    };
    spinner.finish_with_message(summary);
    result
}
