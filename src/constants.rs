use std::{env, path::PathBuf};

use dirs;

/// Per-user configuration directory name under the home directory
pub const CONFIG_DIR_NAME: &str = ".runas";

/// Environment variable overriding the configuration directory
pub const CONFIG_DIR_ENV: &str = "RUNAS_CONFIG_DIR";

/// Credential cache file name
pub const CACHE_FILE_NAME: &str = "cache";

/// Accounts and profiles file name
pub const CONFIG_FILE_NAME: &str = "config.yaml";

/// AWS configuration directory name
pub const AWS_CONFIG_DIR_NAME: &str = ".aws";

/// AWS configuration file name
pub const AWS_CONFIG_FILE_NAME: &str = "config";

/// Session name attached to every assumed role session
pub const ROLE_SESSION_NAME: &str = "runas";

/// Default lifetime of an MFA session token
pub const DEFAULT_SESSION_DURATION_SECS: i32 = 900;

/// Shortest session STS will issue
pub const MIN_SESSION_DURATION_SECS: i32 = 900;

/// Longest session STS will issue for an IAM user
pub const MAX_SESSION_DURATION_SECS: i32 = 129_600;

/// Current on-disk cache schema version
pub const CACHE_SCHEMA_VERSION: u32 = 1;

/// Get the runas configuration directory
/// Respects RUNAS_CONFIG_DIR environment variable if set
pub fn get_config_dir() -> Option<PathBuf> {
    if let Ok(path) = env::var(CONFIG_DIR_ENV) {
        return Some(PathBuf::from(path));
    }

    home_dir().map(|home| home.join(CONFIG_DIR_NAME))
}

/// Get the AWS config file path
/// Respects AWS_CONFIG_FILE environment variable if set
pub fn get_aws_config_path() -> Option<PathBuf> {
    if let Ok(path) = env::var("AWS_CONFIG_FILE") {
        return Some(PathBuf::from(path));
    }

    home_dir().map(|home| home.join(AWS_CONFIG_DIR_NAME).join(AWS_CONFIG_FILE_NAME))
}

fn home_dir() -> Option<PathBuf> {
    // Fallback to environment variables if dirs crate fails
    dirs::home_dir().or_else(|| {
        env::var("HOME")
            .or_else(|_| env::var("USERPROFILE"))
            .ok()
            .map(PathBuf::from)
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use serial_test::serial;

    #[test]
    #[serial]
    fn test_get_config_dir_with_env() {
        let original = env::var(CONFIG_DIR_ENV).ok();

        unsafe {
            env::set_var(CONFIG_DIR_ENV, "/custom/runas");
        }
        let path = get_config_dir();
        assert_eq!(path, Some(PathBuf::from("/custom/runas")));

        unsafe {
            match original {
                Some(val) => env::set_var(CONFIG_DIR_ENV, val),
                None => env::remove_var(CONFIG_DIR_ENV),
            }
        }
    }

    #[test]
    #[serial]
    fn test_get_config_dir_default() {
        let original = env::var(CONFIG_DIR_ENV).ok();

        unsafe {
            env::remove_var(CONFIG_DIR_ENV);
        }
        let path = get_config_dir();

        if let Some(p) = path {
            assert!(p.to_string_lossy().ends_with(CONFIG_DIR_NAME));
        }

        unsafe {
            if let Some(val) = original {
                env::set_var(CONFIG_DIR_ENV, val);
            }
        }
    }

    #[test]
    #[serial]
    fn test_get_aws_config_path_with_env() {
        let original = env::var("AWS_CONFIG_FILE").ok();

        unsafe {
            env::set_var("AWS_CONFIG_FILE", "/custom/aws/config");
        }
        let path = get_aws_config_path();
        assert_eq!(path, Some(PathBuf::from("/custom/aws/config")));

        unsafe {
            match original {
                Some(val) => env::set_var("AWS_CONFIG_FILE", val),
                None => env::remove_var("AWS_CONFIG_FILE"),
            }
        }
    }

    #[test]
    #[serial]
    fn test_get_aws_config_path_default() {
        let original = env::var("AWS_CONFIG_FILE").ok();

        unsafe {
            env::remove_var("AWS_CONFIG_FILE");
        }
        let path = get_aws_config_path();

        if let Some(p) = path {
            let path_str = p.to_string_lossy();
            assert!(path_str.contains(AWS_CONFIG_DIR_NAME));
            assert!(path_str.contains(AWS_CONFIG_FILE_NAME));
        }

        unsafe {
            if let Some(val) = original {
                env::set_var("AWS_CONFIG_FILE", val);
            }
        }
    }

    #[test]
    fn test_session_duration_bounds() {
        assert!(MIN_SESSION_DURATION_SECS <= DEFAULT_SESSION_DURATION_SECS);
        assert!(DEFAULT_SESSION_DURATION_SECS <= MAX_SESSION_DURATION_SECS);
    }
}
