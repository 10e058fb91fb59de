//! The expiring key-value store abstraction. Any implementation
//! satisfying this trait is acceptable to the flight-plan tracker; `redis`
//! is the concrete adapter, `memory_store` is the
//! in-process fake used in tests.

pub mod memory_store;
pub mod redis_store;

use anyhow::Result;
use async_trait::async_trait;
use std::time::Duration;

/// Outcome of (re-)arming a TTL sentinel.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ArmOutcome {
    /// The sentinel was (re-)armed against an existing or newly created key.
    Armed,
}

#[async_trait]
pub trait TtlStore: Send + Sync {
    /// Store a serialized record with no intrinsic expiry.
    async fn put(&self, key: &str, value: &[u8]) -> Result<()>;

    /// Fetch a stored value, if present.
    async fn get(&self, key: &str) -> Result<Option<Vec<u8>>>;

    /// Remove a key. No error if absent.
    async fn delete(&self, key: &str) -> Result<()>;

    /// List keys beginning with `prefix`.
    async fn scan(&self, prefix: &str) -> Result<Vec<String>>;

    /// Arm (or re-arm) an expiry sentinel on `key` with the given TTL.
    /// Re-arming replaces any prior sentinel on the same key.
    async fn arm(&self, key: &str, ttl: Duration) -> Result<ArmOutcome>;

    /// Register a callback invoked at-least-once per sentinel firing. The
    /// callback receives the full sentinel key (e.g. `"ttl:1-BAW1-EGLL"`).
    async fn subscribe_expiries(
        &self,
        callback: Box<dyn Fn(String) + Send + Sync>,
    ) -> Result<()>;
}

/// The two-key expiry protocol: the data key has no
/// intrinsic TTL, a sibling `ttl:<key>` sentinel carries the TTL and is
/// observed via `subscribe_expiries`. This lets the engine read the data
/// key's contents after the sentinel fires, which a store that expires the
/// value atomically with the sentinel would foreclose.
pub fn sentinel_key(data_key: &str) -> String {
    format!("ttl:{data_key}")
}

/// Inverse of `sentinel_key` - strips the `ttl:` prefix. Returns `None` if
/// `key` isn't a sentinel key.
pub fn data_key_from_sentinel(sentinel: &str) -> Option<&str> {
    sentinel.strip_prefix("ttl:")
}

/// Re-arm `key`'s sentinel, recreating the data key's presence if the store
/// reports the sentinel already fired or was evicted. `recreate` is called with the data key only
/// when the store has no live sentinel to re-arm against.
pub async fn refresh_ttl<S: TtlStore + ?Sized>(
    store: &S,
    data_key: &str,
    value: &[u8],
    ttl: Duration,
) -> Result<()> {
    let sentinel = sentinel_key(data_key);
    store.arm(&sentinel, ttl).await?;
    // redis_store/memory_store both treat arm on an absent key as a no-op
    // success at the protocol level; the idempotent-recovery guard lives at
    // the data layer, so ensure the data key still exists too.
    if store.get(data_key).await?.is_none() {
        store.put(data_key, value).await?;
        store.arm(&sentinel, ttl).await?;
    }
    Ok(())
}
