use anyhow::Result;
use chrono::{DateTime, Utc};
use tracing::{debug, info};

use super::{Credentials, SecurityTokenService};
use crate::{
    cache::{CacheStore, CredentialCache},
    prompt::MfaPrompt,
};

/// Cached session for `identity_key` if it is still valid at `now`
///
/// An entry expiring exactly at `now` counts as expired.
pub fn cached_session(
    cache: &CredentialCache,
    identity_key: &str,
    now: DateTime<Utc>,
) -> Option<Credentials> {
    cache
        .get(identity_key)
        .cloned()
        .map(Credentials::from)
        .filter(|session| session.is_valid_at(now))
}

/// Hands out MFA session tokens, reusing cached ones until they expire
pub struct SessionTokenProvider<'a, S: ?Sized, P: ?Sized> {
    store: &'a CacheStore,
    sts: &'a S,
    prompt: &'a P,
}

impl<'a, S, P> SessionTokenProvider<'a, S, P>
where
    S: SecurityTokenService + ?Sized,
    P: MfaPrompt + ?Sized,
{
    pub fn new(store: &'a CacheStore, sts: &'a S, prompt: &'a P) -> Self {
        Self { store, sts, prompt }
    }

    pub async fn get_session_token(
        &self,
        identity_key: &str,
        mfa_serial: &str,
        duration_seconds: i32,
    ) -> Result<Credentials> {
        let cache = self.store.load().await?;

        if let Some(session) = cached_session(&cache, identity_key, Utc::now()) {
            info!(
                "Using cached session for {} (expires {})",
                identity_key, session.expiration
            );
            return Ok(session);
        }

        debug!("No valid cached session for {}", identity_key);
        let token_code = self.prompt.read_token_code(mfa_serial)?;

        let session = self
            .sts
            .get_session_token(mfa_serial, &token_code, duration_seconds)
            .await?;

        // Re-read so entries written by another invocation meanwhile survive
        let mut cache = self.store.load().await?;
        cache.put(identity_key, session.clone().into());
        self.store.save(&cache).await?;
        info!("Cached new session for {}", identity_key);

        Ok(session)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{cache::CachedCredentials, error::Error};
    use async_trait::async_trait;
    use chrono::{Duration, TimeZone};
    use std::sync::{
        Mutex,
        atomic::{AtomicUsize, Ordering},
    };
    use tempfile::TempDir;

    struct FakeSts {
        calls: Mutex<Vec<(String, String, i32)>>,
        reject: bool,
    }

    impl FakeSts {
        fn new() -> Self {
            Self {
                calls: Mutex::new(Vec::new()),
                reject: false,
            }
        }

        fn rejecting() -> Self {
            Self {
                reject: true,
                ..Self::new()
            }
        }

        fn call_count(&self) -> usize {
            self.calls.lock().unwrap().len()
        }
    }

    #[async_trait]
    impl SecurityTokenService for FakeSts {
        async fn get_session_token(
            &self,
            mfa_serial: &str,
            token_code: &str,
            duration_seconds: i32,
        ) -> Result<Credentials> {
            self.calls.lock().unwrap().push((
                mfa_serial.to_string(),
                token_code.to_string(),
                duration_seconds,
            ));
            if self.reject {
                return Err(Error::AuthenticationFailed("MultiFactorAuthentication failed".to_string()).into());
            }
            Ok(Credentials {
                access_key_id: "ASIAFRESH".to_string(),
                secret_access_key: "fresh-secret".to_string(),
                session_token: "fresh-token".to_string(),
                expiration: Utc::now() + Duration::seconds(i64::from(duration_seconds)),
            })
        }

        async fn assume_role(&self, _: &Credentials, _: &str, _: &str) -> Result<Credentials> {
            unreachable!("session provider never assumes roles")
        }
    }

    #[derive(Default)]
    struct FakePrompt {
        prompts: AtomicUsize,
    }

    impl MfaPrompt for FakePrompt {
        fn read_token_code(&self, _mfa_serial: &str) -> Result<String> {
            self.prompts.fetch_add(1, Ordering::SeqCst);
            Ok("123456".to_string())
        }
    }

    fn cached(expiration: DateTime<Utc>) -> CachedCredentials {
        CachedCredentials {
            access_key_id: "ASIACACHED".to_string(),
            secret_access_key: "cached-secret".to_string(),
            session_token: "cached-token".to_string(),
            expiration,
        }
    }

    async fn seeded_store(dir: &TempDir, key: &str, expiration: DateTime<Utc>) -> CacheStore {
        let store = CacheStore::new(dir.path().join("cache"));
        let mut cache = CredentialCache::new();
        cache.put(key, cached(expiration));
        store.save(&cache).await.unwrap();
        store
    }

    const SERIAL: &str = "arn:aws:iam::123456789012:mfa/operator";

    #[test]
    fn test_cached_session_expiration_boundary() {
        let now = Utc.with_ymd_and_hms(2026, 10, 17, 12, 0, 0).unwrap();
        let mut cache = CredentialCache::new();

        cache.put("prod", cached(now));
        assert!(cached_session(&cache, "prod", now).is_none());

        cache.put("prod", cached(now + Duration::seconds(1)));
        assert!(cached_session(&cache, "prod", now).is_some());

        cache.put("prod", cached(now - Duration::seconds(1)));
        assert!(cached_session(&cache, "prod", now).is_none());
    }

    #[test]
    fn test_cached_session_missing_key() {
        let cache = CredentialCache::new();
        assert!(cached_session(&cache, "prod", Utc::now()).is_none());
    }

    #[tokio::test]
    async fn test_cache_hit_skips_prompt_and_network() {
        let dir = TempDir::new().unwrap();
        let store = seeded_store(&dir, "prod", Utc::now() + Duration::minutes(10)).await;
        let sts = FakeSts::new();
        let prompt = FakePrompt::default();
        let provider = SessionTokenProvider::new(&store, &sts, &prompt);

        let first = provider.get_session_token("prod", SERIAL, 900).await.unwrap();
        let second = provider.get_session_token("prod", SERIAL, 900).await.unwrap();

        assert_eq!(first.access_key_id, "ASIACACHED");
        assert_eq!(first, second);
        assert_eq!(prompt.prompts.load(Ordering::SeqCst), 0);
        assert_eq!(sts.call_count(), 0);
    }

    #[tokio::test]
    async fn test_cache_miss_prompts_and_persists() {
        let dir = TempDir::new().unwrap();
        let store = CacheStore::new(dir.path().join("runas").join("cache"));
        let sts = FakeSts::new();
        let prompt = FakePrompt::default();
        let provider = SessionTokenProvider::new(&store, &sts, &prompt);

        let session = provider.get_session_token("prod", SERIAL, 3600).await.unwrap();

        assert_eq!(session.access_key_id, "ASIAFRESH");
        assert_eq!(prompt.prompts.load(Ordering::SeqCst), 1);
        assert_eq!(
            sts.calls.lock().unwrap()[0],
            (SERIAL.to_string(), "123456".to_string(), 3600)
        );

        let cache = store.load().await.unwrap();
        assert_eq!(cache.get("prod").unwrap().access_key_id, "ASIAFRESH");
        assert_eq!(cache.get("prod").unwrap().expiration, session.expiration);

        // The fresh entry now satisfies the next call
        let again = provider.get_session_token("prod", SERIAL, 3600).await.unwrap();
        assert_eq!(again, session);
        assert_eq!(prompt.prompts.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_expired_entry_is_replaced() {
        let dir = TempDir::new().unwrap();
        let store = seeded_store(&dir, "prod", Utc::now() - Duration::minutes(1)).await;
        let sts = FakeSts::new();
        let prompt = FakePrompt::default();
        let provider = SessionTokenProvider::new(&store, &sts, &prompt);

        let session = provider.get_session_token("prod", SERIAL, 900).await.unwrap();

        assert_eq!(session.access_key_id, "ASIAFRESH");
        assert_eq!(prompt.prompts.load(Ordering::SeqCst), 1);
        let cache = store.load().await.unwrap();
        assert_eq!(cache.len(), 1);
        assert_eq!(cache.get("prod").unwrap().access_key_id, "ASIAFRESH");
    }

    #[tokio::test]
    async fn test_other_identities_are_kept() {
        let dir = TempDir::new().unwrap();
        let store = seeded_store(&dir, "dev", Utc::now() + Duration::minutes(10)).await;
        let sts = FakeSts::new();
        let prompt = FakePrompt::default();
        let provider = SessionTokenProvider::new(&store, &sts, &prompt);

        provider.get_session_token("prod", SERIAL, 900).await.unwrap();

        let cache = store.load().await.unwrap();
        assert_eq!(cache.get("dev").unwrap().access_key_id, "ASIACACHED");
        assert_eq!(cache.get("prod").unwrap().access_key_id, "ASIAFRESH");
    }

    #[tokio::test]
    async fn test_rejected_code_leaves_cache_untouched() {
        let dir = TempDir::new().unwrap();
        let expiration = Utc::now() - Duration::minutes(1);
        let store = seeded_store(&dir, "prod", expiration).await;
        let sts = FakeSts::rejecting();
        let prompt = FakePrompt::default();
        let provider = SessionTokenProvider::new(&store, &sts, &prompt);

        let err = provider.get_session_token("prod", SERIAL, 900).await.unwrap_err();

        assert!(matches!(
            err.downcast_ref::<Error>(),
            Some(Error::AuthenticationFailed(_))
        ));
        assert_eq!(sts.call_count(), 1);
        let cache = store.load().await.unwrap();
        assert_eq!(cache.get("prod").unwrap().access_key_id, "ASIACACHED");
    }

    #[tokio::test]
    async fn test_corrupt_cache_fails_before_prompt() {
        let dir = TempDir::new().unwrap();
        let store = CacheStore::new(dir.path().join("cache"));
        std::fs::write(store.path(), "[]").unwrap();
        let sts = FakeSts::new();
        let prompt = FakePrompt::default();
        let provider = SessionTokenProvider::new(&store, &sts, &prompt);

        let err = provider.get_session_token("prod", SERIAL, 900).await.unwrap_err();

        assert!(matches!(
            err.downcast_ref::<Error>(),
            Some(Error::CacheCorrupt { .. })
        ));
        assert_eq!(prompt.prompts.load(Ordering::SeqCst), 0);
        assert_eq!(sts.call_count(), 0);
    }
}
