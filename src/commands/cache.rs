use anyhow::Result;
use chrono::{DateTime, SecondsFormat, Utc};
use clap::{Args, Subcommand};

use crate::{
    cache::{CacheStore, CredentialCache},
    cli::Paths,
};

#[derive(Debug, Clone, Args)]
pub struct CacheCommand {
    #[command(subcommand)]
    pub action: CacheAction,
}

#[derive(Debug, Clone, Subcommand)]
pub enum CacheAction {
    #[command(about = "List cached session tokens and when they expire")]
    List,
}

impl CacheCommand {
    pub async fn execute(self, paths: &Paths) -> Result<()> {
        match self.action {
            CacheAction::List => {
                let cache = CacheStore::new(paths.cache_file()).load().await?;
                print!("{}", render_list(&cache, Utc::now()));
                Ok(())
            }
        }
    }
}

fn render_list(cache: &CredentialCache, now: DateTime<Utc>) -> String {
    if cache.is_empty() {
        return "No cached sessions.\n".to_string();
    }

    let width = cache.iter().map(|(key, _)| key.len()).max().unwrap_or(0);

    cache
        .iter()
        .map(|(key, creds)| {
            let status = if creds.expiration > now { "valid" } else { "expired" };
            format!(
                "{key:<width$}  {}  {status}\n",
                creds
                    .expiration
                    .to_rfc3339_opts(SecondsFormat::Secs, true)
            )
        })
        .collect()
}
