//! Latest-alert cache writer.
//!
//! Keeps only the most recent violation text per entity. Each write fully
//! replaces the previous value and restarts its TTL; nothing is merged.

use std::sync::Arc;
use std::time::Duration;

use crate::cache::AlertCache;
use crate::error::CacheError;

/// Cache key for an entity: lowercase hex MD5 of its identifier.
pub fn alert_key(entity_id: &str) -> String {
    format!("{:x}", md5::compute(entity_id.as_bytes()))
}

#[derive(Clone)]
pub struct AlertWriter {
    cache: Arc<dyn AlertCache>,
    ttl: Duration,
}

impl AlertWriter {
    pub fn new(cache: Arc<dyn AlertCache>, ttl: Duration) -> Self {
        Self { cache, ttl }
    }

    pub fn ttl(&self) -> Duration {
        self.ttl
    }

    /// Store `"[<entity_id>] <text>"` under [`alert_key`]`(entity_id)`.
    pub async fn store_alert(&self, entity_id: &str, text: &str) -> Result<(), CacheError> {
        let value = format!("[{entity_id}] {text}");
        self.cache.set(&alert_key(entity_id), &value, self.ttl).await
    }
}
