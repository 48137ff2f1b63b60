use std::env;

use anyhow::{Context, Result};
use clap::Args;
use tracing::info;

use crate::{
    aws::{SdkSecurityTokenService, SessionTokenProvider, roles},
    cache::CacheStore,
    cli::Paths,
    config::{self, ConfigSources, TargetRequest},
    constants,
    environment::ChildEnvironment,
    launcher,
    prompt::TerminalPrompt,
};

#[derive(Debug, Clone, Args)]
pub struct ExecCommand {
    #[arg(
        short = 'p',
        long,
        help = "Profile holding the MFA device [default: $AWS_PROFILE or \"default\"]"
    )]
    pub profile: Option<String>,

    #[arg(short = 'a', long, help = "Named account from the runas config file")]
    pub account: Option<String>,

    #[arg(long, help = "Target AWS account id")]
    pub account_id: Option<String>,

    #[arg(short = 'r', long, help = "IAM role name to assume in the target account")]
    pub role: Option<String>,

    #[arg(long, help = "AWS region exported to the command")]
    pub region: Option<String>,

    #[arg(long, help = "ARN or serial number of the MFA device")]
    pub mfa_serial: Option<String>,

    #[arg(short = 'd', long, help = "Session token lifetime in seconds [default: 900]")]
    pub duration: Option<i32>,

    #[arg(long, help = "Network timeout for AWS calls in seconds")]
    pub timeout: Option<u64>,

    #[arg(
        required = true,
        trailing_var_arg = true,
        value_name = "COMMAND",
        help = "Command to run with the assumed role credentials"
    )]
    pub command: Vec<String>,
}

impl ExecCommand {
    pub async fn execute(self, paths: &Paths) -> Result<i32> {
        let config_path = paths.config_file();
        let config = config::load(&config_path).await?;

        let sources = ConfigSources {
            config: config.as_ref(),
            config_path: &config_path,
            aws_config_path: constants::get_aws_config_path(),
        };
        let target = config::resolve(&self.target_request(), &sources)?;

        info!(
            "Running as {} via profile {}",
            target.role.arn(),
            target.profile
        );

        let store = CacheStore::new(paths.cache_file());
        let sts = SdkSecurityTokenService::new(&target.profile, &target.region)
            .with_long_term_keys(target.long_term_keys.clone())
            .with_timeout(target.timeout);

        let session = SessionTokenProvider::new(&store, &sts, &TerminalPrompt)
            .get_session_token(
                target.identity_key(),
                &target.mfa_serial,
                target.duration_seconds,
            )
            .await
            .with_context(|| format!("Failed to get a session token for '{}'", target.profile))?;

        let credentials = roles::assume_role(&sts, &session, &target.role)
            .await
            .with_context(|| format!("Failed to assume {}", target.role.arn()))?;

        let environment = ChildEnvironment::for_credentials(&credentials, &target.region);
        launcher::run(&self.command, &environment)
    }

    fn target_request(&self) -> TargetRequest {
        TargetRequest {
            account: self.account.clone(),
            profile: self.profile.clone(),
            account_id: self.account_id.clone(),
            role: self.role.clone(),
            region: self.region.clone(),
            mfa_serial: self.mfa_serial.clone(),
            duration_seconds: self.duration,
            timeout_seconds: self.timeout,
            default_profile: env::var("AWS_PROFILE").unwrap_or_else(|_| "default".to_string()),
        }
    }
}
