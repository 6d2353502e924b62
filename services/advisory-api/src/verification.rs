use crate::cache::{keys, ttl, CodeCache};
use crate::errors::{ApiError, Result};
use crate::metrics;
use governor::{DefaultKeyedRateLimiter, Quota, RateLimiter};
use rand::Rng;
use std::num::NonZeroU32;
use std::sync::Arc;
use tracing::{info, warn};

#[derive(Debug, Clone)]
pub struct VerificationSettings {
    pub code_length: usize,
    pub ttl_secs: u64,
    /// When set every issued code is this value (staging and tests).
    pub fixed_code: Option<String>,
    pub sends_per_minute: u32,
}

impl Default for VerificationSettings {
    fn default() -> Self {
        Self {
            code_length: 6,
            ttl_secs: ttl::SECURITY_CODE,
            fixed_code: None,
            sends_per_minute: 1,
        }
    }
}

/// Issues and checks the codes sent to a mobile number.
pub struct SecurityCodes {
    cache: Arc<dyn CodeCache>,
    limiter: DefaultKeyedRateLimiter<String>,
    settings: VerificationSettings,
}

impl SecurityCodes {
    pub fn new(cache: Arc<dyn CodeCache>, settings: VerificationSettings) -> Self {
        let per_minute = NonZeroU32::new(settings.sends_per_minute).unwrap_or(NonZeroU32::MIN);
        Self::with_quota(cache, settings, Quota::per_minute(per_minute))
    }

    fn with_quota(cache: Arc<dyn CodeCache>, settings: VerificationSettings, quota: Quota) -> Self {
        Self {
            cache,
            limiter: RateLimiter::keyed(quota),
            settings,
        }
    }

    fn generate(&self) -> String {
        if let Some(code) = &self.settings.fixed_code {
            return code.clone();
        }
        let mut rng = rand::thread_rng();
        (0..self.settings.code_length)
            .map(|_| char::from(b'0' + rng.gen_range(0..10u8)))
            .collect()
    }

    /// Stores a fresh code under `sc_{mobile}`, replacing any previous one.
    pub async fn issue(&self, mobile: &str) -> Result<String> {
        // Mobiles whose window has passed carry no state worth keeping.
        self.limiter.retain_recent();
        self.limiter.shrink_to_fit();

        // The quota is spent before the write: checking after a successful
        // put would replace a code already delivered with one never sent.
        // A failed put therefore costs the mobile one window.
        if self.limiter.check_key(&mobile.to_string()).is_err() {
            warn!(mobile, "security code send rate limited");
            return Err(ApiError::RateLimited);
        }

        let code = self.generate();
        if let Err(err) = self
            .cache
            .put(&keys::security_code(mobile), &code, self.settings.ttl_secs)
            .await
        {
            warn!(mobile, error = %err, "security code not stored, send quota already spent");
            return Err(err);
        }

        metrics::SECURITY_CODES_SENT.inc();
        info!(mobile, ttl_secs = self.settings.ttl_secs, "security code issued");
        Ok(code)
    }

    pub async fn verify(&self, mobile: &str, code: &str) -> Result<bool> {
        let stored = self.cache.get(&keys::security_code(mobile)).await?;
        Ok(stored.as_deref() == Some(code.trim()))
    }

    /// Codes are single use.
    pub async fn consume(&self, mobile: &str) -> Result<()> {
        self.cache.remove(&keys::security_code(mobile)).await
    }

    pub fn ttl_secs(&self) -> u64 {
        self.settings.ttl_secs
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cache::MemoryCodeCache;
    use async_trait::async_trait;
    use std::time::Duration;

    struct UnavailableCache;

    #[async_trait]
    impl CodeCache for UnavailableCache {
        async fn put(&self, _key: &str, _code: &str, _ttl_secs: u64) -> Result<()> {
            Err(ApiError::Internal("cache unavailable".to_string()))
        }

        async fn get(&self, _key: &str) -> Result<Option<String>> {
            Ok(None)
        }

        async fn remove(&self, _key: &str) -> Result<()> {
            Ok(())
        }
    }

    fn codes(settings: VerificationSettings) -> SecurityCodes {
        SecurityCodes::new(Arc::new(MemoryCodeCache::new()), settings)
    }

    #[tokio::test]
    async fn test_random_code_shape() {
        let codes = codes(VerificationSettings::default());
        let code = codes.issue("13800000000").await.unwrap();
        assert_eq!(code.len(), 6);
        assert!(code.chars().all(|c| c.is_ascii_digit()));
        assert!(codes.verify("13800000000", &code).await.unwrap());
    }

    #[tokio::test]
    async fn test_verify_trims_and_consumes() {
        let codes = codes(VerificationSettings {
            fixed_code: Some("1234".to_string()),
            ..Default::default()
        });
        codes.issue("13800000001").await.unwrap();
        assert!(codes.verify("13800000001", " 1234 ").await.unwrap());
        assert!(!codes.verify("13800000001", "4321").await.unwrap());
        assert!(!codes.verify("13800000002", "1234").await.unwrap());

        codes.consume("13800000001").await.unwrap();
        assert!(!codes.verify("13800000001", "1234").await.unwrap());
    }

    #[tokio::test]
    async fn test_sends_are_rate_limited_per_mobile() {
        let codes = codes(VerificationSettings {
            sends_per_minute: 1,
            ..Default::default()
        });
        codes.issue("13800000003").await.unwrap();
        let err = codes.issue("13800000003").await.unwrap_err();
        assert!(matches!(err, ApiError::RateLimited));
        assert!(codes.issue("13800000004").await.is_ok());
    }

    #[tokio::test]
    async fn test_idle_mobiles_are_evicted() {
        let quota = Quota::with_period(Duration::from_millis(20)).unwrap();
        let codes = SecurityCodes::with_quota(
            Arc::new(MemoryCodeCache::new()),
            VerificationSettings::default(),
            quota,
        );
        for i in 0..5 {
            codes.issue(&format!("1390000000{}", i)).await.unwrap();
        }
        assert_eq!(codes.limiter.len(), 5);

        tokio::time::sleep(Duration::from_millis(60)).await;
        codes.issue("13900000009").await.unwrap();
        assert_eq!(codes.limiter.len(), 1);
    }

    #[tokio::test]
    async fn test_failed_store_surfaces_and_spends_window() {
        let codes = SecurityCodes::new(Arc::new(UnavailableCache), VerificationSettings::default());
        let err = codes.issue("13800000005").await.unwrap_err();
        assert!(matches!(err, ApiError::Internal(_)));
        assert!(matches!(codes.issue("13800000005").await, Err(ApiError::RateLimited)));
    }
}
