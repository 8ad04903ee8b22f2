mod noop_store;
mod redis_store;

use std::future::Future;
use std::time::Duration;

use serde::Serialize;
use serde::de::DeserializeOwned;
use tracing::warn;

use noop_store::NoopCacheStore;
use redis_store::RedisCacheStore;

/// Default fixed window for the per-user spam counter.
pub const DEFAULT_SPAM_WINDOW: Duration = Duration::from_secs(10);
/// Default number of messages a user may send within one spam window.
pub const DEFAULT_SPAM_MESSAGE_LIMIT: u64 = 5;

#[derive(Clone, Debug)]
enum CacheBackend {
    Disabled(NoopCacheStore),
    Redis(RedisCacheStore),
}

#[derive(Clone, Debug)]
pub struct CacheService {
    key_prefix: String,
    backend: CacheBackend,
    spam_window: Duration,
    spam_message_limit: u64,
}

impl CacheService {
    pub fn disabled(prefix: impl Into<String>) -> Self {
        Self {
            key_prefix: prefix.into(),
            backend: CacheBackend::Disabled(NoopCacheStore),
            spam_window: DEFAULT_SPAM_WINDOW,
            spam_message_limit: DEFAULT_SPAM_MESSAGE_LIMIT,
        }
    }

    pub fn redis(redis_url: &str, prefix: impl Into<String>) -> anyhow::Result<Self> {
        Ok(Self {
            key_prefix: prefix.into(),
            backend: CacheBackend::Redis(RedisCacheStore::from_url(redis_url)?),
            spam_window: DEFAULT_SPAM_WINDOW,
            spam_message_limit: DEFAULT_SPAM_MESSAGE_LIMIT,
        })
    }

    pub fn is_redis_enabled(&self) -> bool {
        matches!(self.backend, CacheBackend::Redis(_))
    }

    pub async fn ping(&self) -> anyhow::Result<()> {
        match &self.backend {
            CacheBackend::Disabled(_) => Ok(()),
            CacheBackend::Redis(store) => store.ping().await,
        }
    }

    pub fn configure_spam_limit(&mut self, window: Duration, message_limit: u64) {
        self.spam_window = window;
        self.spam_message_limit = message_limit;
    }

    pub fn spam_window(&self) -> Duration {
        self.spam_window
    }

    pub fn spam_message_limit(&self) -> u64 {
        self.spam_message_limit
    }

    pub fn key(&self, suffix: impl AsRef<str>) -> String {
        format!("{}:{}", self.key_prefix, suffix.as_ref())
    }

    pub async fn get_json<T>(&self, key: &str) -> anyhow::Result<Option<T>>
    where
        T: DeserializeOwned,
    {
        let value = match &self.backend {
            CacheBackend::Disabled(store) => store.get(key).await,
            CacheBackend::Redis(store) => store.get(key).await,
        }?;

        match value {
            Some(bytes) => {
                let parsed = serde_json::from_slice(&bytes).map_err(|e| {
                    anyhow::anyhow!("failed to deserialize cache value for `{key}`: {e}")
                })?;
                Ok(Some(parsed))
            }
            None => Ok(None),
        }
    }

    pub async fn set_json<T>(&self, key: &str, value: &T, ttl: Duration) -> anyhow::Result<()>
    where
        T: Serialize,
    {
        let ttl_seconds = ttl.as_secs().max(1);
        let payload = serde_json::to_vec(value)
            .map_err(|e| anyhow::anyhow!("failed to serialize cache value for `{key}`: {e}"))?;

        match &self.backend {
            CacheBackend::Disabled(store) => store.set(key, payload, ttl_seconds).await,
            CacheBackend::Redis(store) => store.set(key, payload, ttl_seconds).await,
        }
    }

    pub async fn del(&self, key: &str) -> anyhow::Result<()> {
        match &self.backend {
            CacheBackend::Disabled(store) => store.del(key).await,
            CacheBackend::Redis(store) => store.del(key).await,
        }
    }

    /// Atomically increment the windowed counter at `key`; the window TTL is
    /// set only on the first increment.
    pub async fn increment_with_window(&self, key: &str, window: Duration) -> anyhow::Result<u64> {
        let ttl_seconds = window.as_secs().max(1);
        match &self.backend {
            CacheBackend::Disabled(store) => store.increment_with_window(key, ttl_seconds).await,
            CacheBackend::Redis(store) => store.increment_with_window(key, ttl_seconds).await,
        }
    }

    pub async fn get_or_load_json<T, F, Fut>(
        &self,
        key: &str,
        ttl: Duration,
        loader: F,
    ) -> anyhow::Result<T>
    where
        T: Serialize + DeserializeOwned + Clone,
        F: FnOnce() -> Fut,
        Fut: Future<Output = anyhow::Result<T>>,
    {
        match self.get_json::<T>(key).await {
            Ok(Some(cached)) => return Ok(cached),
            Ok(None) => {}
            Err(e) => warn!(
                ?e,
                cache_key = key,
                "cache get failed; falling back to database"
            ),
        }

        let loaded = loader().await?;

        if let Err(e) = self.set_json(key, &loaded, ttl).await {
            warn!(
                ?e,
                cache_key = key,
                "cache set failed; returning database value"
            );
        }

        Ok(loaded)
    }
}

/// Cache key for the per-user spam counter in a guild.
pub fn spam_counter_key(cache: &CacheService, guild_id: u64, user_id: u64) -> String {
    cache.key(format!("spam:{guild_id}:{user_id}"))
}

/// Cache key for the scheduler's guild-config listing.
pub fn guild_config_list_key(cache: &CacheService) -> String {
    cache.key("guilds:configs")
}
