//! Collection handlers: `PROPFIND` and `MKCOL`.

use std::sync::Arc;

use axum::body::Bytes;
use axum::http::{header, StatusCode};
use axum::response::{IntoResponse, Response};
use tracing::debug;

use crate::dav::resolver::is_directory;
use crate::dav::resource::{describe, ResourceDescriptor};
use crate::dav::{ensure_trailing_slash, is_marker_key, Depth, DIR_MARKER};
use crate::errors::DavError;
use crate::storage::backend::{ListOptions, ObjectStore, PutOptions};
use crate::xml::MultistatusBuilder;
use crate::AppState;

/// Maximum immediate children listed per PROPFIND.
pub const CHILD_LISTING_LIMIT: usize = 10;

/// `PROPFIND` -- describe `path` and, unless `Depth: 0`, its children.
///
/// The requested resource always comes first.  Enumeration is a single
/// delimited listing, so `Depth: infinity` yields the same set as
/// `Depth: 1`.
pub async fn propfind(
    state: Arc<AppState>,
    path: &str,
    depth: Depth,
) -> Result<Response, DavError> {
    let store = state.store.as_ref();

    let is_dir = is_directory(store, path).await?;
    let path = if is_dir {
        ensure_trailing_slash(path)
    } else {
        path.to_string()
    };

    let mut builder = MultistatusBuilder::new();
    builder.push(&describe(store, &path, is_dir).await?);

    if is_dir && depth.enumerates() {
        for child in list_children(store, &path).await? {
            builder.push(&child);
        }
    }

    debug!(
        "PROPFIND {} depth={:?} -> {} entries",
        path,
        depth,
        builder.len()
    );

    Ok((
        StatusCode::MULTI_STATUS,
        [(header::CONTENT_TYPE, "application/xml; charset=utf-8")],
        builder.finish(),
    )
        .into_response())
}

/// Describe the immediate children of directory `dir` (ending in `/`).
///
/// Objects become file descriptors straight from listing metadata; grouped
/// sub-prefixes become collections.  The directory's own key and marker
/// objects are skipped and do not count toward [`CHILD_LISTING_LIMIT`].
/// Results are ordered by path.
pub async fn list_children(
    store: &dyn ObjectStore,
    dir: &str,
) -> anyhow::Result<Vec<ResourceDescriptor>> {
    // Room for the self key and the marker, which are filtered out below.
    let listed = store
        .list(ListOptions::new(dir, CHILD_LISTING_LIMIT + 2).with_delimiter("/"))
        .await?;

    let mut children: Vec<ResourceDescriptor> = listed
        .objects
        .iter()
        .filter(|meta| meta.key != dir && !is_marker_key(&meta.key))
        .map(ResourceDescriptor::from_meta)
        .chain(
            listed
                .delimited_prefixes
                .iter()
                .filter(|prefix| prefix.as_str() != dir)
                .map(ResourceDescriptor::collection),
        )
        .collect();
    children.sort_by(|a, b| a.path.cmp(&b.path));

    if listed.truncated || children.len() > CHILD_LISTING_LIMIT {
        debug!(
            "Listing of {} truncated at {} entries",
            dir, CHILD_LISTING_LIMIT
        );
        children.truncate(CHILD_LISTING_LIMIT);
    }
    Ok(children)
}

/// `MKCOL` -- create an empty marker object so the directory is listable.
///
/// Creating a collection that already exists simply rewrites its marker.
pub async fn make_collection(state: Arc<AppState>, path: &str) -> Result<Response, DavError> {
    let dir = ensure_trailing_slash(path);
    let marker = format!("{dir}{DIR_MARKER}");
    state
        .store
        .put(&marker, Bytes::new(), PutOptions::default())
        .await?;
    debug!("Created collection {}", dir);
    Ok(StatusCode::CREATED.into_response())
}
