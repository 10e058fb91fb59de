//! Redis-backed `TtlStore`. Commands run over a multiplexed
//! `ConnectionManager`; the expiry subscription runs on its own dedicated
//! connection, since the blocking subscribe can't share a connection with
//! issuing commands.
//!
//! Expiry is observed via keyspace notifications on
//! `__keyevent@<db>__:expired`, which requires the server's
//! `notify-keyspace-events` to include `Ex` - a store-side configuration
//! concern this adapter doesn't manage.

use anyhow::{Context, Result};
use async_trait::async_trait;
use redis::AsyncCommands;
use redis::aio::ConnectionManager;
use std::time::{Duration, Instant};
use tracing::{error, warn};

use super::{ArmOutcome, TtlStore};
use crate::metrics::names;

pub struct RedisTtlStore {
    commands: ConnectionManager,
    client: redis::Client,
    db_index: u8,
}

impl RedisTtlStore {
    pub async fn connect(url: &str) -> Result<Self> {
        let client = redis::Client::open(url).context("invalid TTL store URL")?;
        let commands = client
            .get_connection_manager()
            .await
            .context("failed to connect to TTL store")?;
        let db_index = parse_db_index(url);
        Ok(Self {
            commands,
            client,
            db_index,
        })
    }
}

/// Pull the numeric db index out of a `redis://host:port/<db>` URL,
/// defaulting to 0 (db selection is the only part of the URL this adapter
/// needs to parse itself; everything else is handled by `redis::Client`).
fn parse_db_index(url: &str) -> u8 {
    url.rsplit('/')
        .next()
        .and_then(|segment| segment.split(['?', '#']).next())
        .and_then(|segment| segment.parse().ok())
        .unwrap_or(0)
}

#[async_trait]
impl TtlStore for RedisTtlStore {
    async fn put(&self, key: &str, value: &[u8]) -> Result<()> {
        let start = Instant::now();
        let mut conn = self.commands.clone();
        conn.set::<_, _, ()>(key, value)
            .await
            .with_context(|| format!("failed to PUT key {key}"))?;
        metrics::histogram!(names::TTL_STORE_OP_DURATION_MS, "op" => "put")
            .record(start.elapsed().as_secs_f64() * 1000.0);
        Ok(())
    }

    async fn get(&self, key: &str) -> Result<Option<Vec<u8>>> {
        let start = Instant::now();
        let mut conn = self.commands.clone();
        let value: Option<Vec<u8>> = conn
            .get(key)
            .await
            .with_context(|| format!("failed to GET key {key}"))?;
        metrics::histogram!(names::TTL_STORE_OP_DURATION_MS, "op" => "get")
            .record(start.elapsed().as_secs_f64() * 1000.0);
        Ok(value)
    }

    async fn delete(&self, key: &str) -> Result<()> {
        let mut conn = self.commands.clone();
        conn.del::<_, ()>(key)
            .await
            .with_context(|| format!("failed to DELETE key {key}"))?;
        Ok(())
    }

    async fn scan(&self, prefix: &str) -> Result<Vec<String>> {
        let mut conn = self.commands.clone();
        let pattern = format!("{prefix}*");
        let keys: Vec<String> = conn
            .keys(&pattern)
            .await
            .with_context(|| format!("failed to SCAN prefix {prefix}"))?;
        Ok(keys)
    }

    async fn arm(&self, key: &str, ttl: Duration) -> Result<ArmOutcome> {
        let mut conn = self.commands.clone();
        // SET with EX both creates and re-arms the sentinel in one
        // round-trip, replacing any prior expiry.
        conn.set_ex::<_, _, ()>(key, 1u8, ttl.as_secs().max(1))
            .await
            .with_context(|| format!("failed to arm sentinel {key}"))?;
        Ok(ArmOutcome::Armed)
    }

    async fn subscribe_expiries(
        &self,
        callback: Box<dyn Fn(String) + Send + Sync>,
    ) -> Result<()> {
        let channel = format!("__keyevent@{}__:expired", self.db_index);
        let mut pubsub = self
            .client
            .get_async_pubsub()
            .await
            .context("failed to open dedicated expiry subscription connection")?;
        pubsub
            .subscribe(&channel)
            .await
            .with_context(|| format!("failed to subscribe to {channel}"))?;

        let mut stream = pubsub.into_on_message();
        use futures_util::StreamExt;
        while let Some(msg) = stream.next().await {
            let key: String = match msg.get_payload() {
                Ok(k) => k,
                Err(e) => {
                    warn!(error = %e, "failed to decode expiry notification payload");
                    continue;
                }
            };
            callback(key);
        }
        error!("expiry subscription stream ended");
        Ok(())
    }
}
