//! Interactive confirmation before destructive cluster changes

use anyhow::{Result, bail};
use dialoguer::Confirm;
use std::io::IsTerminal;

/// Ask a yes/no question, defaulting to no.
/// Fails instead of blocking when stdin is not a terminal.
pub fn confirm(prompt: &str) -> Result<bool> {
    if !std::io::stdin().is_terminal() {
        bail!("Cannot ask \"{}\" without a terminal, pass --yes to proceed", prompt);
    }
    Ok(Confirm::new().with_prompt(prompt).default(false).interact()?)
}

/// Confirm unless `assume_yes` was given on the command line
pub fn confirm_or_assume(prompt: &str, assume_yes: bool) -> Result<bool> {
    if assume_yes {
        return Ok(true);
    }
    confirm(prompt)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_assume_yes_skips_prompt() {
        assert!(confirm_or_assume("Install anyway?", true).unwrap());
    }
}
