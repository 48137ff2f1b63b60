use std::time::Duration;

use anyhow::{Context, Result};
use async_trait::async_trait;
use aws_config::{BehaviorVersion, Region, SdkConfig};
use aws_sdk_sts::{Client as StsClient, config::Credentials as StaticCredentials};
use aws_smithy_types::{error::display::DisplayErrorContext, timeout::TimeoutConfig};
use tracing::{debug, info};

use super::Credentials;
use crate::error::Error;

/// Provider name attached to the static credentials handed to the SDK
const CREDENTIALS_PROVIDER_NAME: &str = "runas";

/// The two STS operations runas depends on
#[async_trait]
pub trait SecurityTokenService: Send + Sync {
    /// Exchange the caller's long-term credentials and an MFA code for a session token
    async fn get_session_token(
        &self,
        mfa_serial: &str,
        token_code: &str,
        duration_seconds: i32,
    ) -> Result<Credentials>;

    /// Assume `role_arn` using previously issued session credentials
    async fn assume_role(
        &self,
        session: &Credentials,
        role_arn: &str,
        session_name: &str,
    ) -> Result<Credentials>;
}

/// Long-term access key pair declared in the runas config file
#[derive(Clone)]
pub struct LongTermKeys {
    pub access_key_id: String,
    pub secret_access_key: String,
}

impl std::fmt::Debug for LongTermKeys {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LongTermKeys")
            .field("access_key_id", &self.access_key_id)
            .finish_non_exhaustive()
    }
}

/// STS backed by the AWS SDK
#[derive(Debug, Clone)]
pub struct SdkSecurityTokenService {
    profile: String,
    region: String,
    long_term_keys: Option<LongTermKeys>,
    timeout: Option<Duration>,
}

impl SdkSecurityTokenService {
    pub fn new(profile: impl Into<String>, region: impl Into<String>) -> Self {
        Self {
            profile: profile.into(),
            region: region.into(),
            long_term_keys: None,
            timeout: None,
        }
    }

    /// Use explicit keys for GetSessionToken instead of the shared AWS profile
    pub fn with_long_term_keys(mut self, keys: Option<LongTermKeys>) -> Self {
        self.long_term_keys = keys;
        self
    }

    pub fn with_timeout(mut self, timeout: Option<Duration>) -> Self {
        self.timeout = timeout;
        self
    }

    /// Config for GetSessionToken, authenticated with the profile's long-term credentials
    async fn long_term_config(&self) -> SdkConfig {
        let mut loader = aws_config::defaults(BehaviorVersion::latest())
            .profile_name(&self.profile)
            .region(Region::new(self.region.clone()));

        if let Some(keys) = &self.long_term_keys {
            debug!("Using access key {} from runas config", keys.access_key_id);
            loader = loader.credentials_provider(StaticCredentials::new(
                &keys.access_key_id,
                &keys.secret_access_key,
                None,
                None,
                CREDENTIALS_PROVIDER_NAME,
            ));
        }

        if let Some(timeout) = self.timeout {
            loader = loader.timeout_config(Self::timeout_config(timeout));
        }

        loader.load().await
    }

    /// Config for AssumeRole, authenticated only with the session token
    async fn session_config(&self, session: &Credentials) -> SdkConfig {
        let mut loader = aws_config::defaults(BehaviorVersion::latest())
            .region(Region::new(self.region.clone()))
            .credentials_provider(StaticCredentials::new(
                &session.access_key_id,
                &session.secret_access_key,
                Some(session.session_token.clone()),
                None,
                CREDENTIALS_PROVIDER_NAME,
            ));

        if let Some(timeout) = self.timeout {
            loader = loader.timeout_config(Self::timeout_config(timeout));
        }

        loader.load().await
    }

    fn timeout_config(timeout: Duration) -> TimeoutConfig {
        TimeoutConfig::builder()
            .connect_timeout(timeout)
            .operation_timeout(timeout)
            .build()
    }
}

#[async_trait]
impl SecurityTokenService for SdkSecurityTokenService {
    async fn get_session_token(
        &self,
        mfa_serial: &str,
        token_code: &str,
        duration_seconds: i32,
    ) -> Result<Credentials> {
        info!("Calling AWS STS GetSessionToken");
        debug!("Profile: {}", self.profile);
        debug!("MFA serial: {}", mfa_serial);
        debug!("Duration: {} seconds", duration_seconds);

        let client = StsClient::new(&self.long_term_config().await);

        let response = client
            .get_session_token()
            .serial_number(mfa_serial)
            .token_code(token_code)
            .duration_seconds(duration_seconds)
            .send()
            .await
            .map_err(|e| Error::AuthenticationFailed(DisplayErrorContext(&e).to_string()))?;

        let sts_creds = response
            .credentials()
            .context("AWS STS returned no session credentials")?;

        let credentials = Credentials::from_sdk(sts_creds)?;
        info!("Obtained session token valid until {}", credentials.expiration);
        Ok(credentials)
    }

    async fn assume_role(
        &self,
        session: &Credentials,
        role_arn: &str,
        session_name: &str,
    ) -> Result<Credentials> {
        info!("Calling AWS STS AssumeRole");
        debug!("Role ARN: {}", role_arn);
        debug!("Session name: {}", session_name);

        let client = StsClient::new(&self.session_config(session).await);

        let response = client
            .assume_role()
            .role_arn(role_arn)
            .role_session_name(session_name)
            .send()
            .await
            .map_err(|e| Error::AssumeRoleDenied(DisplayErrorContext(&e).to_string()))?;

        let sts_creds = response
            .credentials()
            .context("AWS STS returned no role credentials")?;

        let credentials = Credentials::from_sdk(sts_creds)?;
        info!("Successfully obtained AWS credentials");
        Ok(credentials)
    }
}
