//! Abstract object store trait.
//!
//! Every storage backend must implement [`ObjectStore`].  The trait models a
//! flat key space of byte blobs with a small amount of live metadata and a
//! prefix listing that can group keys at a delimiter.  Keys are plain path
//! strings; nothing here knows about directories.

use bytes::Bytes;
use std::collections::BTreeSet;
use std::convert::Infallible;
use std::future::Future;
use std::pin::Pin;
use std::time::SystemTime;

/// Metadata describing one stored object.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ObjectMeta {
    /// Full object key.
    pub key: String,
    /// Body length in bytes.
    pub size: u64,
    /// Time the object was last written.
    pub uploaded: SystemTime,
    /// Unquoted hex content hash (MD5 of the body).
    pub etag: String,
    /// Content type recorded at upload, if any.
    pub content_type: Option<String>,
}

/// A stored object's body plus its metadata.
#[derive(Debug, Clone)]
pub struct StoredObject {
    pub body: Bytes,
    pub meta: ObjectMeta,
}

/// Options accepted by [`ObjectStore::put`].
#[derive(Debug, Clone, Default)]
pub struct PutOptions {
    pub content_type: Option<String>,
}

/// Parameters for a prefix listing.
#[derive(Debug, Clone)]
pub struct ListOptions {
    /// Only keys starting with this prefix are returned.
    pub prefix: String,
    /// When set, keys containing the delimiter after the prefix are rolled up
    /// into a single entry of `delimited_prefixes`.
    pub delimiter: Option<String>,
    /// Maximum number of objects plus delimited prefixes to return.
    pub limit: usize,
}

impl ListOptions {
    pub fn new(prefix: impl Into<String>, limit: usize) -> Self {
        Self {
            prefix: prefix.into(),
            delimiter: None,
            limit,
        }
    }

    pub fn with_delimiter(mut self, delimiter: impl Into<String>) -> Self {
        self.delimiter = Some(delimiter.into());
        self
    }
}

/// Result of a prefix listing.
#[derive(Debug, Clone, Default)]
pub struct ListResult {
    /// Objects directly matched, in key order.
    pub objects: Vec<ObjectMeta>,
    /// Rolled-up prefixes, each ending with the delimiter, in key order.
    pub delimited_prefixes: Vec<String>,
    /// True when more entries existed past `limit`.
    pub truncated: bool,
}

impl ListResult {
    pub fn is_empty(&self) -> bool {
        self.objects.is_empty() && self.delimited_prefixes.is_empty()
    }
}

/// Async object store contract.
pub trait ObjectStore: Send + Sync + 'static {
    /// Fetch metadata for `key`, or `None` if no such object exists.
    fn head(
        &self,
        key: &str,
    ) -> Pin<Box<dyn Future<Output = anyhow::Result<Option<ObjectMeta>>> + Send + '_>>;

    /// Read the full object at `key`, or `None` if no such object exists.
    fn get(
        &self,
        key: &str,
    ) -> Pin<Box<dyn Future<Output = anyhow::Result<Option<StoredObject>>> + Send + '_>>;

    /// Write `body` to `key`, replacing any existing object.
    fn put(
        &self,
        key: &str,
        body: Bytes,
        options: PutOptions,
    ) -> Pin<Box<dyn Future<Output = anyhow::Result<ObjectMeta>> + Send + '_>>;

    /// Delete the object at `key`.  Deleting a missing key is not an error.
    fn delete(&self, key: &str)
        -> Pin<Box<dyn Future<Output = anyhow::Result<()>> + Send + '_>>;

    /// List objects by prefix, optionally grouping at a delimiter.
    fn list(
        &self,
        options: ListOptions,
    ) -> Pin<Box<dyn Future<Output = anyhow::Result<ListResult>> + Send + '_>>;
}

/// Build a [`ListResult`] from candidate objects already filtered to the
/// prefix and sorted by key.
pub fn group_listing<I>(sorted: I, options: &ListOptions) -> ListResult
where
    I: IntoIterator<Item = ObjectMeta>,
{
    match try_group_listing(sorted.into_iter().map(Ok::<_, Infallible>), options) {
        Ok(result) => result,
        Err(never) => match never {},
    }
}

/// Fallible form of [`group_listing`] for backends that read rows lazily.
///
/// Shared by every backend so delimiter semantics stay identical: a key
/// whose remainder after the prefix contains the delimiter contributes the
/// prefix up to and including the first delimiter occurrence, once.  The
/// input is consumed only until `limit` entries are collected plus one more
/// to decide `truncated`.
pub fn try_group_listing<I, E>(sorted: I, options: &ListOptions) -> Result<ListResult, E>
where
    I: IntoIterator<Item = Result<ObjectMeta, E>>,
{
    let mut result = ListResult::default();
    let mut seen_prefixes = BTreeSet::new();
    let mut count = 0usize;

    for meta in sorted {
        let meta = meta?;
        let rolled_up = options.delimiter.as_deref().and_then(|delim| {
            if delim.is_empty() {
                return None;
            }
            let rest = meta.key.get(options.prefix.len()..)?;
            rest.find(delim)
                .map(|pos| format!("{}{}", options.prefix, &rest[..pos + delim.len()]))
        });

        match rolled_up {
            Some(prefix) => {
                if seen_prefixes.contains(&prefix) {
                    continue;
                }
                if count == options.limit {
                    result.truncated = true;
                    break;
                }
                seen_prefixes.insert(prefix.clone());
                result.delimited_prefixes.push(prefix);
            }
            None => {
                if count == options.limit {
                    result.truncated = true;
                    break;
                }
                result.objects.push(meta);
            }
        }
        count += 1;
    }

    Ok(result)
}

/// Compute the unquoted MD5-hex etag for a body.
pub fn compute_etag(data: &[u8]) -> String {
    use md5::{Digest, Md5};
    let mut hasher = Md5::new();
    hasher.update(data);
    hex::encode(hasher.finalize())
}
