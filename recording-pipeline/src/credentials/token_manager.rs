//! Per-account singleton token manager (§4.11). Serialises concurrent token
//! fetches for the same account, tracked with a `DashMap` keyed by account
//! the way the teacher's `credentials::tracker` keys its failure/check
//! trackers by `CredentialScope`.

use std::sync::Arc;
use std::time::Duration as StdDuration;

use async_trait::async_trait;
use chrono::{DateTime, Duration, Utc};
use dashmap::DashMap;
use tokio::sync::Mutex;
use tracing::warn;

use crate::{Error, Result};

/// Refresh-buffer window: a token is treated as invalid once it is within
/// this many seconds of its reported expiry.
const REFRESH_BUFFER_SECS: i64 = 60;

const MAX_BACKOFF_ATTEMPTS: u32 = 5;

#[derive(Debug, Clone)]
pub struct AccessToken {
    pub token: String,
    pub expires_at: DateTime<Utc>,
}

impl AccessToken {
    fn is_valid(&self, now: DateTime<Utc>) -> bool {
        self.expires_at - Duration::seconds(REFRESH_BUFFER_SECS) > now
    }
}

/// External collaborator that actually talks to the provider's OAuth
/// endpoint. Implemented outside the core (§1); the manager only serialises
/// and caches calls to it.
#[async_trait]
pub trait TokenFetcher: Send + Sync {
    async fn fetch(&self, account_key: &str) -> Result<AccessToken>;
}

/// Stand-in used when no OAuth adapter crate is wired into the container
/// (§1: the adapter itself is out of scope for this core). Fails every
/// fetch with `AuthExpired` so the first attempt to use a real credential
/// surfaces as a clear re-authentication error rather than a silent hang.
pub struct UnconfiguredTokenFetcher;

#[async_trait]
impl TokenFetcher for UnconfiguredTokenFetcher {
    async fn fetch(&self, account_key: &str) -> Result<AccessToken> {
        Err(Error::AuthExpired(format!(
            "no token fetcher configured for account {account_key}"
        )))
    }
}

struct AccountSlot {
    cached: Mutex<Option<AccessToken>>,
}

/// Process-local singleton, keyed by account. Callers ask for a valid token
/// and never mint their own; concurrent callers for the same account
/// serialise on that account's lock so only one refresh happens at a time.
pub struct TokenManager {
    fetcher: Arc<dyn TokenFetcher>,
    slots: DashMap<String, Arc<AccountSlot>>,
}

impl TokenManager {
    pub fn new(fetcher: Arc<dyn TokenFetcher>) -> Self {
        Self {
            fetcher,
            slots: DashMap::new(),
        }
    }

    fn slot_for(&self, account_key: &str) -> Arc<AccountSlot> {
        self.slots
            .entry(account_key.to_string())
            .or_insert_with(|| {
                Arc::new(AccountSlot {
                    cached: Mutex::new(None),
                })
            })
            .clone()
    }

    /// Returns a currently-valid token, refreshing if needed. Reads outside
    /// a refresh window are effectively lock-free since the cached token is
    /// returned without calling the fetcher; refreshes for the same account
    /// are serialised by the account's mutex.
    pub async fn get_token(&self, account_key: &str) -> Result<String> {
        let slot = self.slot_for(account_key);
        let mut guard = slot.cached.lock().await;

        if let Some(cached) = guard.as_ref() {
            if cached.is_valid(Utc::now()) {
                return Ok(cached.token.clone());
            }
        }

        let fetched = self.fetch_with_backoff(account_key).await?;
        let token = fetched.token.clone();
        *guard = Some(fetched);
        Ok(token)
    }

    /// Forces the next `get_token` call for this account to refresh.
    pub fn invalidate(&self, account_key: &str) {
        self.slots.remove(account_key);
    }

    async fn fetch_with_backoff(&self, account_key: &str) -> Result<AccessToken> {
        let mut attempt = 0u32;
        loop {
            match self.fetcher.fetch(account_key).await {
                Ok(token) => return Ok(token),
                Err(Error::AuthExpired(msg)) => {
                    // 401/403-equivalent: not retried, the caller must
                    // re-authenticate the account out of band.
                    return Err(Error::AuthExpired(msg));
                }
                Err(e) if attempt < MAX_BACKOFF_ATTEMPTS => {
                    attempt += 1;
                    let backoff = StdDuration::from_millis(200 * 2u64.pow(attempt));
                    warn!(account_key, attempt, error = %e, "token fetch failed, retrying");
                    tokio::time::sleep(backoff).await;
                    continue;
                }
                Err(e) => return Err(e),
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    struct CountingFetcher {
        calls: AtomicUsize,
    }

    #[async_trait]
    impl TokenFetcher for CountingFetcher {
        async fn fetch(&self, _account_key: &str) -> Result<AccessToken> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            Ok(AccessToken {
                token: "tok".to_string(),
                expires_at: Utc::now() + Duration::minutes(30),
            })
        }
    }

    #[tokio::test]
    async fn valid_token_is_cached_without_refetching() {
        let fetcher = Arc::new(CountingFetcher {
            calls: AtomicUsize::new(0),
        });
        let manager = TokenManager::new(fetcher.clone());

        let t1 = manager.get_token("acct-1").await.unwrap();
        let t2 = manager.get_token("acct-1").await.unwrap();

        assert_eq!(t1, t2);
        assert_eq!(fetcher.calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn invalidate_forces_refetch() {
        let fetcher = Arc::new(CountingFetcher {
            calls: AtomicUsize::new(0),
        });
        let manager = TokenManager::new(fetcher.clone());

        manager.get_token("acct-1").await.unwrap();
        manager.invalidate("acct-1");
        manager.get_token("acct-1").await.unwrap();

        assert_eq!(fetcher.calls.load(Ordering::SeqCst), 2);
    }

    struct DelayedFetcher {
        calls: AtomicUsize,
    }

    #[async_trait]
    impl TokenFetcher for DelayedFetcher {
        async fn fetch(&self, _account_key: &str) -> Result<AccessToken> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            tokio::time::sleep(StdDuration::from_millis(20)).await;
            Ok(AccessToken {
                token: "tok".to_string(),
                expires_at: Utc::now() + Duration::minutes(30),
            })
        }
    }

    // §8/S6: two callers racing on an absent cache for the same account
    // must produce exactly one outbound fetch — the second caller blocks on
    // the account's mutex and then observes the first caller's freshly
    // cached token instead of fetching again.
    #[tokio::test]
    async fn concurrent_fetches_for_same_account_are_serialised() {
        let fetcher = Arc::new(DelayedFetcher {
            calls: AtomicUsize::new(0),
        });
        let manager = Arc::new(TokenManager::new(fetcher.clone()));

        let m1 = manager.clone();
        let m2 = manager.clone();
        let (t1, t2) = tokio::join!(
            async move { m1.get_token("acct-1").await.unwrap() },
            async move { m2.get_token("acct-1").await.unwrap() },
        );

        assert_eq!(t1, t2);
        assert_eq!(fetcher.calls.load(Ordering::SeqCst), 1);
    }

    // Distinct accounts never share a slot, so they refresh independently.
    #[tokio::test]
    async fn concurrent_fetches_for_distinct_accounts_both_fetch() {
        let fetcher = Arc::new(DelayedFetcher {
            calls: AtomicUsize::new(0),
        });
        let manager = Arc::new(TokenManager::new(fetcher.clone()));

        let m1 = manager.clone();
        let m2 = manager.clone();
        tokio::join!(
            async move { m1.get_token("acct-1").await.unwrap() },
            async move { m2.get_token("acct-2").await.unwrap() },
        );

        assert_eq!(fetcher.calls.load(Ordering::SeqCst), 2);
    }
}
