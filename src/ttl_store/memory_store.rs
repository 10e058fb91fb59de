//! In-process `TtlStore` fake. Sentinel firing is modeled with
//! `tokio::time::sleep`, so tests that want deterministic timing should use
//! `#[tokio::test(start_paused = true)]` and `tokio::time::advance`.

use anyhow::Result;
use async_trait::async_trait;
use dashmap::DashMap;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use super::{ArmOutcome, TtlStore};

type Callback = Box<dyn Fn(String) + Send + Sync>;

#[derive(Default)]
pub struct MemoryTtlStore {
    data: DashMap<String, Vec<u8>>,
    // Generation per sentinel key: re-arming bumps it so an in-flight sleep
    // from a prior arm fizzles instead of firing a stale expiry.
    generations: DashMap<String, Arc<AtomicU64>>,
    callbacks: Arc<std::sync::Mutex<Vec<Callback>>>,
}

impl MemoryTtlStore {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }
}

#[async_trait]
impl TtlStore for MemoryTtlStore {
    async fn put(&self, key: &str, value: &[u8]) -> Result<()> {
        self.data.insert(key.to_string(), value.to_vec());
        Ok(())
    }

    async fn get(&self, key: &str) -> Result<Option<Vec<u8>>> {
        Ok(self.data.get(key).map(|v| v.clone()))
    }

    async fn delete(&self, key: &str) -> Result<()> {
        self.data.remove(key);
        Ok(())
    }

    async fn scan(&self, prefix: &str) -> Result<Vec<String>> {
        Ok(self
            .data
            .iter()
            .map(|entry| entry.key().clone())
            .filter(|k| k.starts_with(prefix))
            .collect())
    }

    async fn arm(&self, key: &str, ttl: Duration) -> Result<ArmOutcome> {
        let generation = self
            .generations
            .entry(key.to_string())
            .or_insert_with(|| Arc::new(AtomicU64::new(0)))
            .clone();
        let my_generation = generation.fetch_add(1, Ordering::SeqCst) + 1;

        let key = key.to_string();
        let callbacks = Arc::clone(&self.callbacks);
        tokio::spawn(async move {
            tokio::time::sleep(ttl).await;
            if generation.load(Ordering::SeqCst) == my_generation {
                let callbacks = callbacks.lock().unwrap();
                for cb in callbacks.iter() {
                    cb(key.clone());
                }
            }
        });

        Ok(ArmOutcome::Armed)
    }

    async fn subscribe_expiries(
        &self,
        callback: Box<dyn Fn(String) + Send + Sync>,
    ) -> Result<()> {
        self.callbacks.lock().unwrap().push(callback);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;

    #[tokio::test(start_paused = true)]
    async fn arm_fires_callback_after_ttl() {
        let store = MemoryTtlStore::new();
        let fired: Arc<Mutex<Vec<String>>> = Arc::new(Mutex::new(Vec::new()));
        let fired_clone = Arc::clone(&fired);
        store
            .subscribe_expiries(Box::new(move |key| fired_clone.lock().unwrap().push(key)))
            .await
            .unwrap();

        store.arm("ttl:1-BAW1-EGLL", Duration::from_secs(1)).await.unwrap();
        tokio::time::advance(Duration::from_millis(1100)).await;
        tokio::task::yield_now().await;

        assert_eq!(fired.lock().unwrap().as_slice(), ["ttl:1-BAW1-EGLL"]);
    }

    #[tokio::test(start_paused = true)]
    async fn rearming_suppresses_the_stale_timer() {
        let store = MemoryTtlStore::new();
        let fired: Arc<Mutex<Vec<String>>> = Arc::new(Mutex::new(Vec::new()));
        let fired_clone = Arc::clone(&fired);
        store
            .subscribe_expiries(Box::new(move |key| fired_clone.lock().unwrap().push(key)))
            .await
            .unwrap();

        store.arm("ttl:k", Duration::from_secs(1)).await.unwrap();
        tokio::time::advance(Duration::from_millis(500)).await;
        store.arm("ttl:k", Duration::from_secs(1)).await.unwrap();
        tokio::time::advance(Duration::from_millis(600)).await;
        tokio::task::yield_now().await;
        assert!(fired.lock().unwrap().is_empty(), "first timer must not fire after rearm");

        tokio::time::advance(Duration::from_millis(500)).await;
        tokio::task::yield_now().await;
        assert_eq!(fired.lock().unwrap().as_slice(), ["ttl:k"]);
    }
}
