//! On-disk cache of MFA session tokens, keyed by identity (profile name).
//!
//! Every [`CacheStore::save`] rewrites the whole file. There is no locking:
//! two invocations refreshing the same cache at the same moment can lose one
//! of the updates, and the loser simply prompts for MFA again next time.

use std::{
    collections::BTreeMap,
    io::ErrorKind,
    path::{Path, PathBuf},
};

use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tokio::{fs, io::AsyncWriteExt};
use tracing::{debug, info};

use crate::{aws::Credentials, constants::CACHE_SCHEMA_VERSION, error::Error};

/// Session credentials as persisted in the cache file
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CachedCredentials {
    pub access_key_id: String,
    pub secret_access_key: String,
    pub session_token: String,
    #[serde(with = "timestamp")]
    pub expiration: DateTime<Utc>,
}

impl std::fmt::Debug for CachedCredentials {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CachedCredentials")
            .field("access_key_id", &self.access_key_id)
            .field("expiration", &self.expiration)
            .finish_non_exhaustive()
    }
}

impl From<Credentials> for CachedCredentials {
    fn from(creds: Credentials) -> Self {
        Self {
            access_key_id: creds.access_key_id,
            secret_access_key: creds.secret_access_key,
            session_token: creds.session_token,
            expiration: creds.expiration,
        }
    }
}

impl From<CachedCredentials> for Credentials {
    fn from(cached: CachedCredentials) -> Self {
        Self {
            access_key_id: cached.access_key_id,
            secret_access_key: cached.secret_access_key,
            session_token: cached.session_token,
            expiration: cached.expiration,
        }
    }
}

/// Identity key to session credentials
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct CredentialCache {
    entries: BTreeMap<String, CachedCredentials>,
}

impl CredentialCache {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, identity_key: &str) -> Option<&CachedCredentials> {
        self.entries.get(identity_key)
    }

    pub fn put(&mut self, identity_key: impl Into<String>, credentials: CachedCredentials) {
        self.entries.insert(identity_key.into(), credentials);
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &CachedCredentials)> {
        self.entries.iter().map(|(k, v)| (k.as_str(), v))
    }
}

/// Versioned envelope written to disk
#[derive(Debug, Serialize, Deserialize)]
struct CacheFile {
    version: u32,
    #[serde(default)]
    entries: CredentialCache,
}

/// File-backed credential cache
#[derive(Debug, Clone)]
pub struct CacheStore {
    path: PathBuf,
}

impl CacheStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Read the cache, seeding an empty one if the file does not exist yet
    pub async fn load(&self) -> Result<CredentialCache> {
        let contents = match fs::read(&self.path).await {
            Ok(contents) => contents,
            Err(e) if e.kind() == ErrorKind::NotFound => {
                info!("Creating empty credential cache at {}", self.path.display());
                let cache = CredentialCache::new();
                self.save(&cache).await?;
                return Ok(cache);
            }
            Err(e) => {
                return Err(e).with_context(|| {
                    format!("Failed to read credential cache {}", self.path.display())
                });
            }
        };

        let cache = self.parse(&contents)?;
        debug!(
            "Loaded {} cached session(s) from {}",
            cache.len(),
            self.path.display()
        );
        Ok(cache)
    }

    /// Replace the cache file with the given contents
    pub async fn save(&self, cache: &CredentialCache) -> Result<()> {
        if let Some(parent) = self.path.parent() {
            fs::create_dir_all(parent)
                .await
                .with_context(|| format!("Failed to create directory: {}", parent.display()))?;
        }

        let file = CacheFile {
            version: CACHE_SCHEMA_VERSION,
            entries: cache.clone(),
        };
        let json = serde_json::to_vec_pretty(&file).context("Failed to serialize cache")?;

        let mut options = fs::OpenOptions::new();
        options.write(true).create(true).truncate(true);
        #[cfg(unix)]
        options.mode(0o600);

        let mut out = options
            .open(&self.path)
            .await
            .with_context(|| format!("Failed to open credential cache {}", self.path.display()))?;

        // `mode` only applies on creation; tighten files left by older writers
        #[cfg(unix)]
        {
            use std::os::unix::fs::PermissionsExt;
            out.set_permissions(std::fs::Permissions::from_mode(0o600)).await?;
        }

        out.write_all(&json)
            .await
            .with_context(|| format!("Failed to write credential cache {}", self.path.display()))?;
        out.flush().await?;

        debug!("Wrote {} cached session(s)", cache.len());
        Ok(())
    }

    fn parse(&self, contents: &[u8]) -> Result<CredentialCache> {
        let value: Value = serde_json::from_slice(contents)
            .map_err(|e| Error::cache_corrupt(&self.path, format!("invalid JSON ({e})")))?;

        if !value.is_object() {
            return Err(Error::cache_corrupt(&self.path, "top-level value is not a mapping").into());
        }

        let file: CacheFile = serde_json::from_value(value)
            .map_err(|e| Error::cache_corrupt(&self.path, e.to_string()))?;

        if file.version != CACHE_SCHEMA_VERSION {
            return Err(Error::cache_corrupt(
                &self.path,
                format!("unsupported schema version {}", file.version),
            )
            .into());
        }

        Ok(file.entries)
    }
}

/// UTC timestamps in the cache file.
///
/// Written as RFC 3339 with a `Z` suffix. Read leniently: any RFC 3339 offset
/// is normalised to UTC, a timestamp without an offset is taken to be UTC, and
/// a bare integer is seconds since the epoch.
pub(crate) mod timestamp {
    use chrono::{DateTime, NaiveDateTime, SecondsFormat, Utc};
    use serde::{Deserialize, Deserializer, Serializer, de};

    const NAIVE_FORMATS: [&str; 2] = ["%Y-%m-%dT%H:%M:%S%.f", "%Y-%m-%d %H:%M:%S%.f"];

    #[derive(Deserialize)]
    #[serde(untagged)]
    enum Raw {
        Secs(i64),
        Text(String),
    }

    pub fn serialize<S: Serializer>(dt: &DateTime<Utc>, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&dt.to_rfc3339_opts(SecondsFormat::AutoSi, true))
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<DateTime<Utc>, D::Error> {
        match Raw::deserialize(deserializer)? {
            Raw::Secs(secs) => DateTime::from_timestamp(secs, 0)
                .ok_or_else(|| de::Error::custom(format!("timestamp {secs} out of range"))),
            Raw::Text(text) => parse(&text).ok_or_else(|| {
                de::Error::custom(format!("unrecognised timestamp '{text}'"))
            }),
        }
    }

    pub fn parse(text: &str) -> Option<DateTime<Utc>> {
        if let Ok(dt) = DateTime::parse_from_rfc3339(text) {
            return Some(dt.with_timezone(&Utc));
        }

        NAIVE_FORMATS
            .iter()
            .find_map(|fmt| NaiveDateTime::parse_from_str(text, fmt).ok())
            .map(|naive| naive.and_utc())
    }
}
