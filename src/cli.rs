use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use clap::{ArgAction, Parser, Subcommand};

use crate::{
    commands::{CacheCommand, CompletionsCommand, ExecCommand},
    constants::{self, CACHE_FILE_NAME, CONFIG_FILE_NAME},
};

#[derive(Debug, Clone, Parser)]
#[command(name = "runas", version, about = "Run a command with MFA-backed AWS assumed-role credentials", long_about = None, arg_required_else_help = true)]
pub struct Cli {
    #[arg(
        long,
        global = true,
        value_name = "DIR",
        help = "Directory holding the runas cache and config [default: ~/.runas]"
    )]
    pub config_dir: Option<PathBuf>,

    #[arg(short = 'v', long, global = true, action = ArgAction::Count, help = "Increase verbosity (-v info, -vv debug, -vvv trace)")]
    pub verbose: u8,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Debug, Clone, Subcommand)]
pub enum Commands {
    #[command(about = "Run a command with assumed role credentials")]
    Exec(ExecCommand),
    #[command(about = "Inspect the session token cache")]
    Cache(CacheCommand),
    #[command(about = "Generate shell completion scripts for runas")]
    Completions(CompletionsCommand),
}

/// Locations of the runas files
#[derive(Debug, Clone)]
pub struct Paths {
    dir: PathBuf,
}

impl Paths {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    pub fn cache_file(&self) -> PathBuf {
        self.dir.join(CACHE_FILE_NAME)
    }

    pub fn config_file(&self) -> PathBuf {
        self.dir.join(CONFIG_FILE_NAME)
    }
}

impl Cli {
    /// Run the selected subcommand, returning the process exit code
    pub async fn execute(self) -> Result<i32> {
        let paths = self.paths()?;

        match self.command {
            Commands::Exec(cmd) => cmd.execute(&paths).await,
            Commands::Cache(cmd) => cmd.execute(&paths).await.map(|()| 0),
            Commands::Completions(cmd) => {
                cmd.execute();
                Ok(0)
            }
        }
    }

    fn paths(&self) -> Result<Paths> {
        let dir = match &self.config_dir {
            Some(dir) => dir.clone(),
            None => constants::get_config_dir()
                .context("Could not determine home directory. Please set HOME or --config-dir")?,
        };
        Ok(Paths::new(dir))
    }
}
