use anyhow::Result;
use tracing::info;

use super::{Credentials, SecurityTokenService};
use crate::constants::ROLE_SESSION_NAME;

/// Role to assume in a target account
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IamRole {
    pub account_id: String,
    pub name: String,
}

impl IamRole {
    pub fn new(account_id: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            account_id: account_id.into(),
            name: name.into(),
        }
    }

    /// ARN of the role (arn:aws:iam::123456789012:role/RoleName)
    pub fn arn(&self) -> String {
        format!("arn:aws:iam::{}:role/{}", self.account_id, self.name)
    }
}

/// Exchange session credentials for credentials scoped to `role`
pub async fn assume_role<S>(sts: &S, session: &Credentials, role: &IamRole) -> Result<Credentials>
where
    S: SecurityTokenService + ?Sized,
{
    let role_arn = role.arn();
    info!("Assuming role {} in account {}", role.name, role.account_id);

    sts.assume_role(session, &role_arn, ROLE_SESSION_NAME).await
}
