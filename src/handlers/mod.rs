//! WebDAV method handlers.
//!
//! [`dispatch`] receives every authenticated request that is not an
//! infrastructure endpoint and routes it by [`DavMethod`].  The match is
//! exhaustive, so adding a verb means handling it here or the build fails.

pub mod collection;
pub mod file;
pub mod transfer;

use std::sync::Arc;

use axum::body::Body;
use axum::http::{header, HeaderMap, HeaderValue, StatusCode};
use axum::response::{IntoResponse, Response};
use metrics::counter;
use tracing::debug;

use crate::dav::{DavMethod, Depth, ALLOWED_METHODS};
use crate::errors::DavError;
use crate::metrics::{method_label, DAV_OPERATIONS_TOTAL};
use crate::AppState;

/// Route one request to the handler for its method.
///
/// `path` is the percent-decoded request path, used directly as the object
/// key.
pub async fn dispatch(
    state: Arc<AppState>,
    method: DavMethod,
    path: &str,
    headers: &HeaderMap,
    body: Body,
) -> Result<Response, DavError> {
    debug!("{} {}", method, path);

    let result = match &method {
        DavMethod::Options => Ok(options()),
        DavMethod::Get => file::get_resource(state, path, false).await,
        DavMethod::Head => file::get_resource(state, path, true).await,
        DavMethod::Put => file::put_resource(state, path, headers, body).await,
        DavMethod::Delete => file::delete_resource(state, path).await,
        DavMethod::Mkcol => collection::make_collection(state, path).await,
        DavMethod::Propfind => {
            let depth = Depth::from_header(headers.get("depth").and_then(|v| v.to_str().ok()));
            collection::propfind(state, path, depth).await
        }
        DavMethod::Move => transfer::transfer(state, path, headers, transfer::Mode::Move).await,
        DavMethod::Copy => transfer::transfer(state, path, headers, transfer::Mode::Copy).await,
        DavMethod::Unsupported(name) => Err(DavError::MethodNotAllowed {
            method: name.clone(),
        }),
    };

    let status = match &result {
        Ok(response) => response.status(),
        Err(err) => err.status_code(),
    };
    counter!(
        DAV_OPERATIONS_TOTAL,
        "method" => method_label(&method),
        "status" => status.as_u16().to_string()
    )
    .increment(1);

    result
}

/// `OPTIONS` -- advertise supported verbs and DAV compliance classes.
fn options() -> Response {
    (
        StatusCode::OK,
        [
            (header::ALLOW, HeaderValue::from_static(ALLOWED_METHODS)),
            (
                header::HeaderName::from_static("dav"),
                HeaderValue::from_static("1, 2"),
            ),
            (
                header::HeaderName::from_static("ms-author-via"),
                HeaderValue::from_static("DAV"),
            ),
            (header::CONTENT_LENGTH, HeaderValue::from_static("0")),
        ],
    )
        .into_response()
}

/// Insert a header whose value came from stored data, skipping values that
/// are not valid header text.
fn insert_header(headers: &mut HeaderMap, name: header::HeaderName, value: &str) {
    match HeaderValue::from_str(value) {
        Ok(v) => {
            headers.insert(name, v);
        }
        Err(_) => debug!("Dropping unrepresentable {} header value {:?}", name, value),
    }
}
