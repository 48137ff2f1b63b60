use std::{
    collections::BTreeMap,
    io::ErrorKind,
    path::{Path, PathBuf},
    time::Duration,
};

use anyhow::{Context, Result};
use ini::Ini;
use serde::Deserialize;
use tokio::fs;
use tracing::debug;

use crate::{
    aws::{roles::IamRole, sts::LongTermKeys},
    constants::{
        DEFAULT_SESSION_DURATION_SECS, MAX_SESSION_DURATION_SECS, MIN_SESSION_DURATION_SECS,
    },
    error::Error,
};

/// Contents of `config.yaml`
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Config {
    pub duration_seconds: Option<i32>,
    pub timeout_seconds: Option<u64>,
    #[serde(default)]
    pub accounts: BTreeMap<String, Account>,
    #[serde(default)]
    pub profiles: BTreeMap<String, Profile>,
}

/// A named target account
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Account {
    pub account_id: String,
    pub role: Option<String>,
    pub region: Option<String>,
    pub profile: Option<String>,
}

/// A named source identity holding the MFA device
#[derive(Clone, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Profile {
    pub aws_access_key_id: Option<String>,
    pub aws_secret_access_key: Option<String>,
    pub mfa_serial: Option<String>,
}

impl std::fmt::Debug for Profile {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Profile")
            .field("aws_access_key_id", &self.aws_access_key_id)
            .field("mfa_serial", &self.mfa_serial)
            .finish_non_exhaustive()
    }
}

impl Profile {
    fn long_term_keys(&self, name: &str) -> Result<Option<LongTermKeys>, Error> {
        match (&self.aws_access_key_id, &self.aws_secret_access_key) {
            (Some(access_key_id), Some(secret_access_key)) => Ok(Some(LongTermKeys {
                access_key_id: access_key_id.clone(),
                secret_access_key: secret_access_key.clone(),
            })),
            (None, None) => Ok(None),
            _ => Err(Error::config_invalid(format!(
                "profile '{name}' must set both aws_access_key_id and aws_secret_access_key"
            ))),
        }
    }
}

impl Config {
    pub fn parse(contents: &str, path: &Path) -> Result<Self, Error> {
        if contents.trim().is_empty() {
            return Ok(Self::default());
        }

        serde_yaml::from_str(contents)
            .map_err(|e| Error::config_invalid(format!("{}: {e}", path.display())))
    }
}

/// Load the config file, `None` if it does not exist
pub async fn load(path: &Path) -> Result<Option<Config>> {
    let contents = match fs::read_to_string(path).await {
        Ok(contents) => contents,
        Err(e) if e.kind() == ErrorKind::NotFound => {
            debug!("No config file at {}", path.display());
            return Ok(None);
        }
        Err(e) => {
            return Err(e)
                .with_context(|| format!("Failed to read config file {}", path.display()));
        }
    };

    Ok(Some(Config::parse(&contents, path)?))
}

/// Look up `mfa_serial` for `profile` in the AWS shared config file
pub fn shared_mfa_serial(aws_config_path: &Path, profile: &str) -> Option<String> {
    let ini = Ini::load_from_file(aws_config_path).ok()?;

    let section_name = if profile == "default" {
        profile.to_string()
    } else {
        format!("profile {profile}")
    };

    ini.section(Some(section_name))
        .and_then(|section| section.get("mfa_serial"))
        .map(str::to_string)
}

/// What the user asked for on the command line
#[derive(Debug, Clone, Default)]
pub struct TargetRequest {
    pub account: Option<String>,
    pub profile: Option<String>,
    pub account_id: Option<String>,
    pub role: Option<String>,
    pub region: Option<String>,
    pub mfa_serial: Option<String>,
    pub duration_seconds: Option<i32>,
    pub timeout_seconds: Option<u64>,
    /// Profile used when neither the flags nor the account name one
    pub default_profile: String,
}

/// Everything needed to obtain role credentials, resolved before any network call
#[derive(Debug, Clone)]
pub struct Target {
    pub profile: String,
    pub role: IamRole,
    pub region: String,
    pub mfa_serial: String,
    pub long_term_keys: Option<LongTermKeys>,
    pub duration_seconds: i32,
    pub timeout: Option<Duration>,
}

impl Target {
    /// Cache key for the profile's session token
    pub fn identity_key(&self) -> &str {
        &self.profile
    }
}

/// Files consulted while resolving a target
#[derive(Debug, Clone)]
pub struct ConfigSources<'a> {
    pub config: Option<&'a Config>,
    pub config_path: &'a Path,
    pub aws_config_path: Option<PathBuf>,
}

pub fn resolve(request: &TargetRequest, sources: &ConfigSources<'_>) -> Result<Target, Error> {
    let account = match &request.account {
        Some(name) => {
            let config = sources.config.ok_or_else(|| Error::ConfigMissing {
                path: sources.config_path.to_path_buf(),
            })?;
            let account = config.accounts.get(name).ok_or_else(|| {
                Error::config_invalid(format!(
                    "account '{name}' not found in {}",
                    sources.config_path.display()
                ))
            })?;
            Some(account)
        }
        None => None,
    };

    let profile = request
        .profile
        .clone()
        .or_else(|| account.and_then(|a| a.profile.clone()))
        .unwrap_or_else(|| request.default_profile.clone());

    let account_id = request
        .account_id
        .clone()
        .or_else(|| account.map(|a| a.account_id.clone()))
        .ok_or_else(|| Error::config_invalid("no account id; pass --account-id or --account"))?;
    validate_account_id(&account_id)?;

    let role = request
        .role
        .clone()
        .or_else(|| account.and_then(|a| a.role.clone()))
        .ok_or_else(|| Error::config_invalid("no role; pass --role"))?;

    let region = request
        .region
        .clone()
        .or_else(|| account.and_then(|a| a.region.clone()))
        .ok_or_else(|| Error::config_invalid("no region; pass --region"))?;

    let profile_entry = sources.config.and_then(|c| c.profiles.get(&profile));

    let long_term_keys = profile_entry
        .map(|p| p.long_term_keys(&profile))
        .transpose()?
        .flatten();

    let mfa_serial = request
        .mfa_serial
        .clone()
        .or_else(|| profile_entry.and_then(|p| p.mfa_serial.clone()))
        .or_else(|| {
            sources
                .aws_config_path
                .as_deref()
                .and_then(|path| shared_mfa_serial(path, &profile))
        })
        .ok_or_else(|| {
            Error::config_invalid(format!(
                "no MFA serial for profile '{profile}'; pass --mfa-serial or set mfa_serial"
            ))
        })?;

    let duration_seconds = request
        .duration_seconds
        .or_else(|| sources.config.and_then(|c| c.duration_seconds))
        .unwrap_or(DEFAULT_SESSION_DURATION_SECS);
    if !(MIN_SESSION_DURATION_SECS..=MAX_SESSION_DURATION_SECS).contains(&duration_seconds) {
        return Err(Error::config_invalid(format!(
            "session duration {duration_seconds}s is outside {MIN_SESSION_DURATION_SECS}..={MAX_SESSION_DURATION_SECS}"
        )));
    }

    let timeout = request
        .timeout_seconds
        .or_else(|| sources.config.and_then(|c| c.timeout_seconds))
        .map(Duration::from_secs);

    Ok(Target {
        role: IamRole::new(account_id, role),
        profile,
        region,
        mfa_serial,
        long_term_keys,
        duration_seconds,
        timeout,
    })
}

fn validate_account_id(account_id: &str) -> Result<(), Error> {
    if account_id.len() == 12 && account_id.chars().all(|c| c.is_ascii_digit()) {
        Ok(())
    } else {
        Err(Error::config_invalid(format!(
            "account id '{account_id}' must be twelve digits"
        )))
    }
}
