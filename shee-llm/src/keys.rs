use std::collections::VecDeque;
use std::time::Duration;

use thiserror::Error;
use tokio::sync::Mutex;
use tokio::time::Instant;
use tracing::debug;

/// Requests allowed per credential within one sliding window.
pub const DEFAULT_MAX_PER_WINDOW: usize = 15;
/// Length of the sliding request window.
pub const DEFAULT_WINDOW: Duration = Duration::from_secs(60);
/// Cooldown applied after an upstream rate-limit response.
pub const DEFAULT_COOLDOWN: Duration = Duration::from_secs(60);

#[derive(Debug, Error)]
#[error("all generation credentials are rate limited or cooling down")]
pub struct AllKeysExhausted;

#[derive(Debug)]
struct KeyState {
    secret: String,
    /// Instants of recent uses, oldest first. Pruned on every touch.
    window: VecDeque<Instant>,
    cooldown_until: Option<Instant>,
}

impl KeyState {
    fn prune(&mut self, now: Instant, window: Duration) {
        while let Some(&front) = self.window.front() {
            if now.duration_since(front) >= window {
                self.window.pop_front();
            } else {
                break;
            }
        }
    }

    fn usable(&mut self, now: Instant, window: Duration, max_per_window: usize) -> bool {
        if let Some(until) = self.cooldown_until {
            if until > now {
                return false;
            }
            self.cooldown_until = None;
        }
        self.prune(now, window);
        self.window.len() < max_per_window
    }
}

#[derive(Debug)]
struct RotationState {
    keys: Vec<KeyState>,
    cursor: usize,
}

/// Round-robin credential pool with per-key sliding-window quotas.
///
/// State is process-local and resets on restart.
#[derive(Debug)]
pub struct KeyRotation {
    inner: Mutex<RotationState>,
    window: Duration,
    max_per_window: usize,
    cooldown: Duration,
}

impl KeyRotation {
    pub fn new(secrets: Vec<String>) -> anyhow::Result<Self> {
        Self::with_limits(secrets, DEFAULT_WINDOW, DEFAULT_MAX_PER_WINDOW, DEFAULT_COOLDOWN)
    }

    pub fn with_limits(
        secrets: Vec<String>,
        window: Duration,
        max_per_window: usize,
        cooldown: Duration,
    ) -> anyhow::Result<Self> {
        let secrets: Vec<String> = secrets
            .into_iter()
            .map(|s| s.trim().to_owned())
            .filter(|s| !s.is_empty())
            .collect();

        if secrets.is_empty() {
            anyhow::bail!("credential list is empty");
        }

        let keys = secrets
            .into_iter()
            .map(|secret| KeyState {
                secret,
                window: VecDeque::new(),
                cooldown_until: None,
            })
            .collect();

        Ok(Self {
            inner: Mutex::new(RotationState { keys, cursor: 0 }),
            window,
            max_per_window,
            cooldown,
        })
    }

    /// Select the next usable credential, record the use on it, and advance
    /// the cursor. Visits each credential at most once per call.
    pub async fn acquire(&self) -> Result<(usize, String), AllKeysExhausted> {
        let now = Instant::now();
        let mut state = self.inner.lock().await;
        let total = state.keys.len();

        for offset in 0..total {
            let idx = (state.cursor + offset) % total;
            let key = &mut state.keys[idx];
            if !key.usable(now, self.window, self.max_per_window) {
                continue;
            }

            key.window.push_back(now);
            let secret = key.secret.clone();
            state.cursor = (idx + 1) % total;
            return Ok((idx, secret));
        }

        Err(AllKeysExhausted)
    }

    /// Put a credential on cooldown after an upstream rate-limit signal.
    pub async fn mark_exhausted(&self, id: usize) {
        let mut state = self.inner.lock().await;
        if let Some(key) = state.keys.get_mut(id) {
            key.cooldown_until = Some(Instant::now() + self.cooldown);
            debug!(key_id = id, cooldown_secs = self.cooldown.as_secs(), "credential cooling down");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn rotation(keys: usize, window: Duration, max: usize, cooldown: Duration) -> KeyRotation {
        let secrets = (0..keys).map(|i| format!("key-{i}")).collect();
        KeyRotation::with_limits(secrets, window, max, cooldown).unwrap()
    }

    #[test]
    fn rejects_empty_credential_list() {
        assert!(KeyRotation::new(vec![]).is_err());
        assert!(KeyRotation::new(vec!["  ".to_owned()]).is_err());
    }

    #[tokio::test(start_paused = true)]
    async fn rotates_round_robin() {
        let pool = rotation(3, Duration::from_secs(60), 15, Duration::from_secs(60));
        let mut seen = Vec::new();
        for _ in 0..6 {
            let (id, _) = pool.acquire().await.unwrap();
            seen.push(id);
        }
        assert_eq!(seen, vec![0, 1, 2, 0, 1, 2]);
    }

    #[tokio::test(start_paused = true)]
    async fn exhausts_after_window_capacity_and_recovers() {
        let pool = rotation(2, Duration::from_secs(60), 3, Duration::from_secs(60));

        // 2 keys x 3 per window = 6 uses.
        for _ in 0..6 {
            pool.acquire().await.unwrap();
        }
        assert!(pool.acquire().await.is_err());

        tokio::time::advance(Duration::from_secs(61)).await;
        assert!(pool.acquire().await.is_ok());
    }

    #[tokio::test(start_paused = true)]
    async fn skips_cooled_down_credentials() {
        let pool = rotation(2, Duration::from_secs(60), 15, Duration::from_secs(60));

        let (first, _) = pool.acquire().await.unwrap();
        assert_eq!(first, 0);
        pool.mark_exhausted(0).await;

        // Key 0 is cooling down, only key 1 is served.
        let (id, _) = pool.acquire().await.unwrap();
        assert_eq!(id, 1);
        let (id, _) = pool.acquire().await.unwrap();
        assert_eq!(id, 1);

        tokio::time::advance(Duration::from_secs(61)).await;
        let (id, _) = pool.acquire().await.unwrap();
        assert_eq!(id, 0);
    }

    #[tokio::test(start_paused = true)]
    async fn all_cooled_down_is_exhausted() {
        let pool = rotation(2, Duration::from_secs(60), 15, Duration::from_secs(30));
        pool.mark_exhausted(0).await;
        pool.mark_exhausted(1).await;
        assert!(pool.acquire().await.is_err());

        tokio::time::advance(Duration::from_secs(31)).await;
        assert!(pool.acquire().await.is_ok());
    }
}
