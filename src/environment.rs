use std::{collections::BTreeMap, process::Command};

use crate::aws::Credentials;

pub const AWS_ACCESS_KEY_ID: &str = "AWS_ACCESS_KEY_ID";
pub const AWS_SECRET_ACCESS_KEY: &str = "AWS_SECRET_ACCESS_KEY";
pub const AWS_SESSION_TOKEN: &str = "AWS_SESSION_TOKEN";
pub const AWS_DEFAULT_REGION: &str = "AWS_DEFAULT_REGION";
pub const AWS_REGION: &str = "AWS_REGION";

/// Legacy alias of AWS_SESSION_TOKEN still honoured by some tools
const AWS_SECURITY_TOKEN: &str = "AWS_SECURITY_TOKEN";

/// Variables the child process sees on top of the inherited environment
#[derive(Clone, Default, PartialEq, Eq)]
pub struct ChildEnvironment {
    set: BTreeMap<&'static str, String>,
    unset: Vec<&'static str>,
}

impl ChildEnvironment {
    /// Environment exposing `credentials` in `region` to AWS tooling
    pub fn for_credentials(credentials: &Credentials, region: &str) -> Self {
        let set = BTreeMap::from([
            (AWS_ACCESS_KEY_ID, credentials.access_key_id.clone()),
            (AWS_SECRET_ACCESS_KEY, credentials.secret_access_key.clone()),
            (AWS_SESSION_TOKEN, credentials.session_token.clone()),
            (AWS_DEFAULT_REGION, region.to_string()),
            (AWS_REGION, region.to_string()),
        ]);

        Self {
            set,
            unset: vec![AWS_SECURITY_TOKEN],
        }
    }

    pub fn get(&self, name: &str) -> Option<&str> {
        self.set.get(name).map(String::as_str)
    }

    pub fn removes(&self, name: &str) -> bool {
        self.unset.iter().any(|unset| *unset == name)
    }

    pub fn vars(&self) -> impl Iterator<Item = (&'static str, &str)> {
        self.set.iter().map(|(k, v)| (*k, v.as_str()))
    }

    /// Apply to a child command; values replace anything inherited
    pub fn apply(&self, command: &mut Command) {
        for name in &self.unset {
            command.env_remove(name);
        }
        command.envs(self.vars());
    }
}

impl std::fmt::Debug for ChildEnvironment {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ChildEnvironment")
            .field("set", &self.set.keys().collect::<Vec<_>>())
            .field("unset", &self.unset)
            .finish()
    }
}
