use std::fmt;

use anyhow::{Context, Result};
use aws_smithy_types::DateTime as SmithyDateTime;
use chrono::{DateTime, Utc};

pub mod roles;
pub mod session;
pub mod sts;

/// AWS temporary credentials structure
///
/// The secret key and session token are left out of `Debug` output.
#[derive(Clone, PartialEq, Eq)]
pub struct Credentials {
    pub access_key_id: String,
    pub secret_access_key: String,
    pub session_token: String,
    pub expiration: DateTime<Utc>,
}

impl fmt::Debug for Credentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Credentials")
            .field("access_key_id", &self.access_key_id)
            .field("expiration", &self.expiration)
            .finish_non_exhaustive()
    }
}

impl Credentials {
    pub(crate) fn from_sdk(sts_creds: &aws_sdk_sts::types::Credentials) -> Result<Self> {
        Ok(Self {
            access_key_id: sts_creds.access_key_id().to_string(),
            secret_access_key: sts_creds.secret_access_key().to_string(),
            session_token: sts_creds.session_token().to_string(),
            expiration: to_utc(sts_creds.expiration())?,
        })
    }

    pub fn is_valid_at(&self, now: DateTime<Utc>) -> bool {
        self.expiration > now
    }
}

fn to_utc(expiration: &SmithyDateTime) -> Result<DateTime<Utc>> {
    DateTime::from_timestamp(expiration.secs(), expiration.subsec_nanos())
        .with_context(|| format!("AWS STS returned an out-of-range expiration: {expiration:?}"))
}

// Re-export commonly used types (functions should be accessed via module path)
pub use session::SessionTokenProvider;
pub use sts::{SdkSecurityTokenService, SecurityTokenService};

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration, TimeZone};

    #[test]
    fn test_to_utc_keeps_subsecond_precision() {
        let smithy = SmithyDateTime::from_secs_and_nanos(1_792_238_400, 500_000_000);
        let utc = to_utc(&smithy).unwrap();
        assert_eq!(
            utc,
            Utc.with_ymd_and_hms(2026, 10, 17, 12, 0, 0).unwrap() + Duration::milliseconds(500)
        );
    }

    #[test]
    fn test_from_sdk_credentials() {
        let sdk = aws_sdk_sts::types::Credentials::builder()
            .access_key_id("ASIAEXAMPLE")
            .secret_access_key("secret")
            .session_token("token")
            .expiration(SmithyDateTime::from_secs(1_792_238_400))
            .build()
            .unwrap();

        let creds = Credentials::from_sdk(&sdk).unwrap();
        assert_eq!(creds.access_key_id, "ASIAEXAMPLE");
        assert_eq!(creds.secret_access_key, "secret");
        assert_eq!(creds.session_token, "token");
        assert_eq!(
            creds.expiration,
            Utc.with_ymd_and_hms(2026, 10, 17, 12, 0, 0).unwrap()
        );
    }

    #[test]
    fn test_validity_is_strict() {
        let now = Utc.with_ymd_and_hms(2026, 10, 17, 12, 0, 0).unwrap();
        let creds = Credentials {
            access_key_id: "a".to_string(),
            secret_access_key: "b".to_string(),
            session_token: "c".to_string(),
            expiration: now,
        };
        assert!(!creds.is_valid_at(now));
        assert!(creds.is_valid_at(now - Duration::seconds(1)));
    }
}
