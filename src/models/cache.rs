//! Process-owned cache of loaded inference models.
//!
//! Each distinct key is loaded at most once. Concurrent first use of the same key
//! waits on the in-flight load instead of starting another one. Entries are never
//! invalidated; a failed load leaves the slot empty so a later request can retry.
//!
//! A load that times out counts as failed, but its blocking thread cannot be
//! stopped and runs to completion with its result discarded. A retry in the
//! meantime loads the same model a second time alongside it.

use std::collections::HashMap;
use std::future::Future;
use std::sync::Arc;
use tokio::sync::{Mutex, OnceCell};
use tracing::{debug, info};

use crate::error::ModelError;

pub struct ModelCache<H: ?Sized> {
    slots: Mutex<HashMap<String, Arc<OnceCell<Arc<H>>>>>,
}

impl<H: ?Sized + Send + Sync> ModelCache<H> {
    pub fn new() -> Self {
        Self {
            slots: Mutex::new(HashMap::new()),
        }
    }

    /// Return the model for `key`, running `load` only if nothing is cached yet
    pub async fn get_or_load<F, Fut>(&self, key: &str, load: F) -> Result<Arc<H>, ModelError>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<Arc<H>, ModelError>>,
    {
        let slot = {
            let mut slots = self.slots.lock().await;
            slots.entry(key.to_string()).or_default().clone()
        };

        if let Some(handle) = slot.get() {
            debug!("Model cache hit: {}", key);
            return Ok(handle.clone());
        }

        let handle = slot
            .get_or_try_init(|| async move {
                info!("Loading model: {} (this may take a moment)...", key);
                let handle = load().await?;
                info!("Model loaded: {}", key);
                Ok::<_, ModelError>(handle)
            })
            .await?;

        Ok(handle.clone())
    }

    /// Whether `key` has finished loading
    pub async fn contains(&self, key: &str) -> bool {
        let slots = self.slots.lock().await;
        slots.get(key).map(|slot| slot.initialized()).unwrap_or(false)
    }

    /// Number of loaded models
    pub async fn len(&self) -> usize {
        let slots = self.slots.lock().await;
        slots.values().filter(|slot| slot.initialized()).count()
    }

    pub async fn is_empty(&self) -> bool {
        self.len().await == 0
    }
}

impl<H: ?Sized + Send + Sync> Default for ModelCache<H> {
    fn default() -> Self {
        Self::new()
    }
}
