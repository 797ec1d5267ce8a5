//! `MOVE` and `COPY`.
//!
//! Both read the whole source object and write it, with its content type,
//! to the path named by the `Destination` header.  `MOVE` then deletes the
//! source.  The two steps are not atomic: if the delete fails the request
//! reports 500 and both copies remain.

use std::sync::Arc;

use axum::http::{HeaderMap, StatusCode, Uri};
use axum::response::{IntoResponse, Response};
use tracing::info;

use crate::dav::decode_path;
use crate::errors::DavError;
use crate::storage::backend::PutOptions;
use crate::AppState;

/// Which transfer to perform.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Mode {
    Move,
    Copy,
}

/// Copy (and for [`Mode::Move`], then remove) the object at `path`.
pub async fn transfer(
    state: Arc<AppState>,
    path: &str,
    headers: &HeaderMap,
    mode: Mode,
) -> Result<Response, DavError> {
    let destination = headers
        .get("destination")
        .ok_or_else(|| DavError::bad_request("Missing Destination header"))?
        .to_str()
        .map_err(|_| DavError::bad_request("Destination header is not valid text"))?;
    let target = destination_path(destination)?;

    // File keys never end in `/`; that shape names a collection.
    if target.ends_with('/') {
        return Err(DavError::bad_request("Destination names a collection path"));
    }
    if target == path {
        return Err(DavError::bad_request(
            "Source and destination are the same resource",
        ));
    }

    let source = state
        .store
        .get(path)
        .await?
        .ok_or_else(|| DavError::NotFound {
            path: path.to_string(),
        })?;

    state
        .store
        .put(
            &target,
            source.body,
            PutOptions {
                content_type: source.meta.content_type,
            },
        )
        .await?;

    if mode == Mode::Move {
        state.store.delete(path).await?;
    }

    info!("{:?} {} -> {}", mode, path, target);
    Ok(StatusCode::CREATED.into_response())
}

/// Extract the decoded object key from a `Destination` header.
///
/// Accepts an absolute URL (`http://host/a/b`) or an absolute path.
pub fn destination_path(destination: &str) -> Result<String, DavError> {
    let uri: Uri = destination
        .trim()
        .parse()
        .map_err(|_| DavError::bad_request("Destination is not a valid URI"))?;
    decode_path(uri.path())
        .ok_or_else(|| DavError::bad_request("Destination path is not valid UTF-8"))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_destination_absolute_url() {
        assert_eq!(
            destination_path("http://dav.example.com/docs/b.txt").unwrap(),
            "/docs/b.txt"
        );
    }

    #[test]
    fn test_destination_is_percent_decoded() {
        assert_eq!(
            destination_path("https://host:8443/my%20docs/a%26b.txt").unwrap(),
            "/my docs/a&b.txt"
        );
    }

    #[test]
    fn test_destination_absolute_path() {
        assert_eq!(destination_path("/x/y").unwrap(), "/x/y");
    }

    #[test]
    fn test_destination_query_is_ignored() {
        assert_eq!(destination_path("http://h/a?b=c").unwrap(), "/a");
    }

    #[test]
    fn test_destination_invalid() {
        assert!(matches!(
            destination_path("http://bad host/"),
            Err(DavError::BadRequest { .. })
        ));
    }
}
