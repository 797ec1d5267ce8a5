//! Protocol-visible attributes of a single resource.

use tracing::warn;

use crate::storage::backend::{ObjectMeta, ObjectStore};

/// Content type reported when the store recorded none.
pub const DEFAULT_CONTENT_TYPE: &str = "application/octet-stream";

/// Live properties of one resource, built per request.
///
/// Byte-level fields are `None` for collections and for files whose
/// metadata could not be fetched.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResourceDescriptor {
    pub path: String,
    pub is_collection: bool,
    pub size: Option<u64>,
    /// HTTP-date of the last upload.
    pub last_modified: Option<String>,
    /// Quoted entity tag.
    pub etag: Option<String>,
    pub content_type: Option<String>,
}

impl ResourceDescriptor {
    /// A collection carries no blob metadata.
    pub fn collection(path: impl Into<String>) -> Self {
        Self {
            path: path.into(),
            is_collection: true,
            size: None,
            last_modified: None,
            etag: None,
            content_type: None,
        }
    }

    /// A file whose metadata is unknown.
    pub fn bare_file(path: impl Into<String>) -> Self {
        Self {
            is_collection: false,
            ..Self::collection(path)
        }
    }

    /// A file described from already-fetched store metadata.
    pub fn from_meta(meta: &ObjectMeta) -> Self {
        Self {
            path: meta.key.clone(),
            is_collection: false,
            size: Some(meta.size),
            last_modified: Some(httpdate::fmt_http_date(meta.uploaded)),
            etag: Some(quote_etag(&meta.etag)),
            content_type: Some(content_type_or_default(meta.content_type.as_deref()).to_string()),
        }
    }
}

/// Build the descriptor for `path`, fetching metadata for files.
///
/// A file that vanished between listing and `head` is still described, just
/// without its byte-level fields, so one missing member never fails a
/// whole listing.
pub async fn describe(
    store: &dyn ObjectStore,
    path: &str,
    is_collection: bool,
) -> anyhow::Result<ResourceDescriptor> {
    if is_collection {
        return Ok(ResourceDescriptor::collection(path));
    }

    match store.head(path).await? {
        Some(meta) => {
            let mut descriptor = ResourceDescriptor::from_meta(&meta);
            descriptor.path = path.to_string();
            Ok(descriptor)
        }
        None => {
            warn!("No object metadata for {}, describing without properties", path);
            Ok(ResourceDescriptor::bare_file(path))
        }
    }
}

/// Wrap a store etag in double quotes unless it already is.
pub fn quote_etag(etag: &str) -> String {
    if etag.len() >= 2 && etag.starts_with('"') && etag.ends_with('"') {
        etag.to_string()
    } else {
        format!("\"{etag}\"")
    }
}

pub fn content_type_or_default(content_type: Option<&str>) -> &str {
    match content_type {
        Some(ct) if !ct.is_empty() => ct,
        _ => DEFAULT_CONTENT_TYPE,
    }
}
