//! Handlers that read, write, or remove a single resource:
//! `GET`, `HEAD`, `PUT`, and `DELETE`.

use std::sync::Arc;

use axum::body::{Body, Bytes};
use axum::http::{header, HeaderMap, HeaderValue, StatusCode};
use axum::response::{IntoResponse, Response};
use metrics::counter;
use tracing::{debug, info};

use super::insert_header;
use crate::dav::resolver::is_directory;
use crate::dav::resource::{content_type_or_default, quote_etag, DEFAULT_CONTENT_TYPE};
use crate::dav::{ensure_trailing_slash, Depth};
use crate::errors::DavError;
use crate::metrics::{BYTES_RECEIVED_TOTAL, BYTES_SENT_TOTAL};
use crate::storage::backend::{ListOptions, ObjectMeta, PutOptions};
use crate::AppState;

/// Page size used when removing every key under a collection.
const DELETE_BATCH: usize = 1000;

/// `GET` / `HEAD` -- return a file, or list a directory.
///
/// A path that resolves as a directory is answered as `PROPFIND` with
/// `Depth: 1` (for `HEAD`, just the status and content type).  Anything else
/// is fetched from the store and 404s when absent.
pub async fn get_resource(
    state: Arc<AppState>,
    path: &str,
    head_only: bool,
) -> Result<Response, DavError> {
    if is_directory(state.store.as_ref(), path).await? {
        if head_only {
            return Ok((
                StatusCode::OK,
                [(header::CONTENT_TYPE, "application/xml; charset=utf-8")],
            )
                .into_response());
        }
        return super::collection::propfind(state, path, Depth::One).await;
    }

    let not_found = || DavError::NotFound {
        path: path.to_string(),
    };

    if head_only {
        let meta = state.store.head(path).await?.ok_or_else(not_found)?;
        let mut response = StatusCode::OK.into_response();
        apply_object_headers(response.headers_mut(), &meta);
        return Ok(response);
    }

    let object = state.store.get(path).await?.ok_or_else(not_found)?;
    counter!(BYTES_SENT_TOTAL).increment(object.body.len() as u64);

    let mut response = (StatusCode::OK, object.body).into_response();
    apply_object_headers(response.headers_mut(), &object.meta);
    Ok(response)
}

/// Set the entity headers describing a stored object.
fn apply_object_headers(headers: &mut HeaderMap, meta: &ObjectMeta) {
    insert_header(
        headers,
        header::CONTENT_TYPE,
        content_type_or_default(meta.content_type.as_deref()),
    );
    headers.insert(header::CONTENT_LENGTH, HeaderValue::from(meta.size));
    insert_header(headers, header::ETAG, &quote_etag(&meta.etag));
    insert_header(
        headers,
        header::LAST_MODIFIED,
        &httpdate::fmt_http_date(meta.uploaded),
    );
}

/// `PUT` -- store the request body at `path`.
///
/// The content type comes from the request (default
/// `application/octet-stream`).  Responds 201 with the stored entity tag.
pub async fn put_resource(
    state: Arc<AppState>,
    path: &str,
    headers: &HeaderMap,
    body: Body,
) -> Result<Response, DavError> {
    if path.ends_with('/') {
        return Err(DavError::bad_request("cannot PUT to a collection path"));
    }

    let data = read_body(&state, headers, body).await?;
    counter!(BYTES_RECEIVED_TOTAL).increment(data.len() as u64);

    let content_type = headers
        .get(header::CONTENT_TYPE)
        .and_then(|v| v.to_str().ok())
        .filter(|v| !v.is_empty())
        .unwrap_or(DEFAULT_CONTENT_TYPE)
        .to_string();

    let meta = state
        .store
        .put(
            path,
            data,
            PutOptions {
                content_type: Some(content_type),
            },
        )
        .await?;
    debug!("Stored {} ({} bytes)", path, meta.size);

    let mut response = StatusCode::CREATED.into_response();
    let hdrs = response.headers_mut();
    hdrs.insert(header::CONTENT_LENGTH, HeaderValue::from_static("0"));
    insert_header(hdrs, header::ETAG, &quote_etag(&meta.etag));
    Ok(response)
}

/// Buffer a request body, enforcing `server.max_object_size`.
async fn read_body(state: &AppState, headers: &HeaderMap, body: Body) -> Result<Bytes, DavError> {
    let max = state.config.server.max_object_size;

    let declared = headers
        .get(header::CONTENT_LENGTH)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.trim().parse::<u64>().ok());
    if let Some(size) = declared {
        if size > max {
            return Err(DavError::PayloadTooLarge { size, max });
        }
    }

    let limit = usize::try_from(max).unwrap_or(usize::MAX);
    axum::body::to_bytes(body, limit)
        .await
        .map_err(|e| DavError::bad_request(format!("failed to read request body: {e}")))
}

/// `DELETE` -- remove the key at `path`; if `path` is a directory, also
/// remove every key beneath it.  Missing keys are not an error.
pub async fn delete_resource(state: Arc<AppState>, path: &str) -> Result<Response, DavError> {
    let store = state.store.as_ref();
    let is_dir = is_directory(store, path).await?;

    store.delete(path).await?;

    if is_dir {
        let prefix = ensure_trailing_slash(path);
        let mut removed = 0usize;
        loop {
            let batch = store.list(ListOptions::new(&prefix, DELETE_BATCH)).await?;
            if batch.objects.is_empty() {
                break;
            }
            for object in &batch.objects {
                store.delete(&object.key).await?;
            }
            removed += batch.objects.len();
        }
        info!("Deleted collection {} ({} keys)", prefix, removed);
    }

    Ok(StatusCode::NO_CONTENT.into_response())
}
