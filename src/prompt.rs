use anyhow::{Context, Result};
use dialoguer::{Input, theme::ColorfulTheme};

/// Source of MFA one-time codes
pub trait MfaPrompt: Send + Sync {
    /// Block until the operator enters the current code for `mfa_serial`
    fn read_token_code(&self, mfa_serial: &str) -> Result<String>;
}

/// Reads the code interactively from the controlling terminal
#[derive(Debug, Default, Clone, Copy)]
pub struct TerminalPrompt;

impl MfaPrompt for TerminalPrompt {
    fn read_token_code(&self, mfa_serial: &str) -> Result<String> {
        let code = Input::<String>::with_theme(&ColorfulTheme::default())
            .with_prompt(format!("MFA code for {mfa_serial}"))
            .validate_with(|input: &String| validate_token_code(input))
            .interact_text()
            .context("Failed to read MFA code")?;

        Ok(code.trim().to_string())
    }
}

fn validate_token_code(input: &str) -> Result<(), &'static str> {
    let code = input.trim();
    if code.is_empty() {
        Err("MFA code is required")
    } else if !code.chars().all(|c| c.is_ascii_digit()) {
        Err("MFA code must contain only digits")
    } else {
        Ok(())
    }
}
