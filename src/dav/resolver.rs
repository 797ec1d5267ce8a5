//! Directory classification over a flat key space.
//!
//! A path names a directory when it ends in `/`, when an explicit marker
//! object exists beneath it, or when any key lives under it.  This is a
//! heuristic: an empty, unmarked directory and a missing path look the same.

use tracing::debug;

use super::DIR_MARKER;
use crate::storage::backend::{ListOptions, ObjectStore};

/// Listing limit used when probing for children.  One entry is enough to
/// decide; a few more cost nothing extra.
pub const PROBE_LIMIT: usize = 5;

/// Decide whether `path` denotes a directory.
pub async fn is_directory(store: &dyn ObjectStore, path: &str) -> anyhow::Result<bool> {
    if path.ends_with('/') {
        return Ok(true);
    }

    let marker = format!("{path}/{DIR_MARKER}");
    if store.head(&marker).await?.is_some() {
        debug!("{} is a directory (marker present)", path);
        return Ok(true);
    }

    let listed = store
        .list(ListOptions::new(format!("{path}/"), PROBE_LIMIT).with_delimiter("/"))
        .await?;
    if !listed.is_empty() {
        debug!("{} is a directory (implied by children)", path);
        return Ok(true);
    }

    Ok(false)
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use crate::storage::backend::{ListResult, ObjectMeta, PutOptions, StoredObject};
    use crate::storage::memory::MemoryBackend;
    use bytes::Bytes;
    use std::future::Future;
    use std::pin::Pin;
    use std::sync::atomic::{AtomicUsize, Ordering};

    /// Memory store that counts every call it receives.
    #[derive(Default)]
    pub(crate) struct CountingStore {
        pub inner: MemoryBackend,
        pub calls: AtomicUsize,
    }

    impl CountingStore {
        pub fn calls(&self) -> usize {
            self.calls.load(Ordering::SeqCst)
        }

        fn bump(&self) {
            self.calls.fetch_add(1, Ordering::SeqCst);
        }
    }

    impl ObjectStore for CountingStore {
        fn head(
            &self,
            key: &str,
        ) -> Pin<Box<dyn Future<Output = anyhow::Result<Option<ObjectMeta>>> + Send + '_>>
        {
            self.bump();
            self.inner.head(key)
        }

        fn get(
            &self,
            key: &str,
        ) -> Pin<Box<dyn Future<Output = anyhow::Result<Option<StoredObject>>> + Send + '_>>
        {
            self.bump();
            self.inner.get(key)
        }

        fn put(
            &self,
            key: &str,
            body: Bytes,
            options: PutOptions,
        ) -> Pin<Box<dyn Future<Output = anyhow::Result<ObjectMeta>> + Send + '_>> {
            self.bump();
            self.inner.put(key, body, options)
        }

        fn delete(
            &self,
            key: &str,
        ) -> Pin<Box<dyn Future<Output = anyhow::Result<()>> + Send + '_>> {
            self.bump();
            self.inner.delete(key)
        }

        fn list(
            &self,
            options: ListOptions,
        ) -> Pin<Box<dyn Future<Output = anyhow::Result<ListResult>> + Send + '_>> {
            self.bump();
            self.inner.list(options)
        }
    }

    async fn seed(store: &MemoryBackend, key: &str) {
        store
            .put(key, Bytes::from("x"), PutOptions::default())
            .await
            .unwrap();
    }

    #[tokio::test]
    async fn test_trailing_slash_needs_no_store_call() {
        let store = CountingStore::default();
        for path in ["/", "/docs/", "/does/not/exist/"] {
            assert!(is_directory(&store, path).await.unwrap());
        }
        assert_eq!(store.calls(), 0);
    }

    #[tokio::test]
    async fn test_marker_makes_directory() {
        let store = MemoryBackend::default();
        store
            .put("/empty/.dir", Bytes::new(), PutOptions::default())
            .await
            .unwrap();
        assert!(is_directory(&store, "/empty").await.unwrap());
    }

    #[tokio::test]
    async fn test_children_imply_directory() {
        let store = MemoryBackend::default();
        seed(&store, "/photos/2024/a.jpg").await;
        assert!(is_directory(&store, "/photos").await.unwrap());
        assert!(is_directory(&store, "/photos/2024").await.unwrap());
    }

    #[tokio::test]
    async fn test_file_and_missing_are_not_directories() {
        let store = MemoryBackend::default();
        seed(&store, "/notes.txt").await;
        assert!(!is_directory(&store, "/notes.txt").await.unwrap());
        assert!(!is_directory(&store, "/missing").await.unwrap());
    }

    #[tokio::test]
    async fn test_sibling_with_shared_prefix_is_not_a_child() {
        let store = MemoryBackend::default();
        seed(&store, "/reports-2024.csv").await;
        assert!(!is_directory(&store, "/reports").await.unwrap());
    }
}
