//! In-memory storage backend.
//!
//! Objects are held in a `tokio::sync::RwLock<BTreeMap<...>>` keyed by the
//! full object key.  The ordered map turns prefix listing into a range scan.
//!
//! A configurable memory limit (`max_size_bytes`) caps total stored bytes.

use bytes::Bytes;
use std::collections::BTreeMap;
use std::future::Future;
use std::pin::Pin;
use std::time::SystemTime;

use super::backend::{
    compute_etag, group_listing, ListOptions, ListResult, ObjectMeta, ObjectStore, PutOptions,
    StoredObject,
};

/// One stored object.
#[derive(Debug, Clone)]
struct Entry {
    body: Bytes,
    meta: ObjectMeta,
}

/// In-memory object store.
///
/// Contents are lost when the process exits.
pub struct MemoryBackend {
    objects: tokio::sync::RwLock<BTreeMap<String, Entry>>,
    /// Current total body bytes stored.
    current_size: tokio::sync::RwLock<u64>,
    /// Maximum bytes allowed.  0 means unlimited.
    max_size_bytes: u64,
}

impl MemoryBackend {
    /// Create an empty backend.  `max_size_bytes == 0` disables the limit.
    pub fn new(max_size_bytes: u64) -> Self {
        Self {
            objects: tokio::sync::RwLock::new(BTreeMap::new()),
            current_size: tokio::sync::RwLock::new(0),
            max_size_bytes,
        }
    }

    // ── Memory accounting ──────────────────────────────────────────

    /// Check whether adding `additional` bytes would exceed the memory limit.
    async fn check_capacity(&self, additional: u64) -> anyhow::Result<()> {
        if self.max_size_bytes == 0 {
            return Ok(());
        }
        let current = *self.current_size.read().await;
        if current + additional > self.max_size_bytes {
            anyhow::bail!(
                "Memory limit exceeded: current={current}, additional={additional}, max={}",
                self.max_size_bytes
            );
        }
        Ok(())
    }

    /// Adjust the tracked size by a signed delta.
    async fn adjust_size(&self, delta: i64) {
        let mut size = self.current_size.write().await;
        if delta >= 0 {
            *size = size.saturating_add(delta as u64);
        } else {
            *size = size.saturating_sub(delta.unsigned_abs());
        }
    }
}

impl Default for MemoryBackend {
    fn default() -> Self {
        Self::new(0)
    }
}

// ── ObjectStore implementation ─────────────────────────────────────────

impl ObjectStore for MemoryBackend {
    fn head(
        &self,
        key: &str,
    ) -> Pin<Box<dyn Future<Output = anyhow::Result<Option<ObjectMeta>>> + Send + '_>> {
        let key = key.to_string();
        Box::pin(async move {
            let objects = self.objects.read().await;
            Ok(objects.get(&key).map(|entry| entry.meta.clone()))
        })
    }

    fn get(
        &self,
        key: &str,
    ) -> Pin<Box<dyn Future<Output = anyhow::Result<Option<StoredObject>>> + Send + '_>> {
        let key = key.to_string();
        Box::pin(async move {
            let objects = self.objects.read().await;
            Ok(objects.get(&key).map(|entry| StoredObject {
                body: entry.body.clone(),
                meta: entry.meta.clone(),
            }))
        })
    }

    fn put(
        &self,
        key: &str,
        body: Bytes,
        options: PutOptions,
    ) -> Pin<Box<dyn Future<Output = anyhow::Result<ObjectMeta>> + Send + '_>> {
        let key = key.to_string();
        Box::pin(async move {
            let new_len = body.len() as u64;

            // The objects guard is held across the size update so concurrent
            // writes to one key cannot double-count.
            let mut objects = self.objects.write().await;

            // Overwrites only account for the size difference.
            let old_len = objects.get(&key).map_or(0, |entry| entry.meta.size);
            let delta = new_len as i64 - old_len as i64;
            if delta > 0 {
                self.check_capacity(delta as u64).await?;
            }

            let meta = ObjectMeta {
                key: key.clone(),
                size: new_len,
                uploaded: SystemTime::now(),
                etag: compute_etag(&body),
                content_type: options.content_type,
            };
            objects.insert(
                key,
                Entry {
                    body,
                    meta: meta.clone(),
                },
            );
            self.adjust_size(delta).await;

            Ok(meta)
        })
    }

    fn delete(
        &self,
        key: &str,
    ) -> Pin<Box<dyn Future<Output = anyhow::Result<()>> + Send + '_>> {
        let key = key.to_string();
        Box::pin(async move {
            let mut objects = self.objects.write().await;
            if let Some(entry) = objects.remove(&key) {
                self.adjust_size(-(entry.meta.size as i64)).await;
            }
            Ok(())
        })
    }

    fn list(
        &self,
        options: ListOptions,
    ) -> Pin<Box<dyn Future<Output = anyhow::Result<ListResult>> + Send + '_>> {
        Box::pin(async move {
            let objects = self.objects.read().await;
            let candidates = objects
                .range(options.prefix.clone()..)
                .take_while(|(key, _)| key.starts_with(&options.prefix))
                .map(|(_, entry)| entry.meta.clone());
            Ok(group_listing(candidates, &options))
        })
    }
}
