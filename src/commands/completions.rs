use clap::{Args, CommandFactory};
use clap_complete::Shell;
use std::io;

use crate::cli::Cli;

#[derive(Debug, Clone, Args)]
pub struct CompletionsCommand {
    #[arg(value_enum, help = "Target shell for completion script")]
    pub shell: Shell,
}

impl CompletionsCommand {
    pub fn execute(self) {
        let mut cmd = Cli::command();
        let app_name = cmd.get_name().to_string();
        clap_complete::generate(self.shell, &mut cmd, app_name, &mut io::stdout());
    }

    #[cfg(test)]
    pub fn generate_to_string(&self) -> String {
        let mut cmd = Cli::command();
        let app_name = cmd.get_name().to_string();
        let mut buffer = Vec::new();
        clap_complete::generate(self.shell, &mut cmd, app_name, &mut buffer);
        String::from_utf8(buffer).unwrap_or_default()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_bash_completion() {
        let script = CompletionsCommand { shell: Shell::Bash }.generate_to_string();
        assert!(script.contains("_runas()"));
        assert!(script.contains("complete -F _runas"));
    }

    #[test]
    fn test_zsh_completion() {
        let script = CompletionsCommand { shell: Shell::Zsh }.generate_to_string();
        assert!(script.contains("#compdef runas"));
    }

    #[test]
    fn test_completion_contains_subcommands_and_flags() {
        for shell in [Shell::Bash, Shell::Zsh, Shell::Fish] {
            let script = CompletionsCommand { shell }.generate_to_string();

            for expected in ["exec", "cache", "completions", "account-id", "mfa-serial"] {
                assert!(
                    script.contains(expected),
                    "{expected} should be in {shell} completions"
                );
            }
        }
    }
}
