//! WebDAV error types.
//!
//! Every variant maps to one HTTP status.  The enum implements
//! [`axum::response::IntoResponse`] so handlers can simply return
//! `Err(DavError::NotFound { .. })`.  Error bodies are plain text; the
//! protocol defines no structured error document for these cases.

use axum::http::{header, HeaderValue, StatusCode};
use axum::response::{IntoResponse, Response};
use thiserror::Error;
use tracing::error;

use crate::dav::ALLOWED_METHODS;

/// Generate a 16-character hex request ID.
pub fn generate_request_id() -> String {
    let bytes: [u8; 8] = rand::random();
    hex::encode(bytes)
}

/// Failures surfaced to WebDAV clients.
#[derive(Debug, Error)]
pub enum DavError {
    /// Credentials missing or wrong.  `challenge` carries the realm to
    /// advertise in `WWW-Authenticate` when the client sent no usable
    /// `Authorization` header at all.
    #[error("Unauthorized")]
    Unauthorized { challenge: Option<String> },

    /// The request is malformed (e.g. missing `Destination`).
    #[error("Bad Request: {message}")]
    BadRequest { message: String },

    /// No object exists at the requested path.
    #[error("Not Found")]
    NotFound { path: String },

    /// The verb is not one the server implements.
    #[error("Method Not Allowed")]
    MethodNotAllowed { method: String },

    /// The request body exceeds the configured object size limit.
    #[error("Payload Too Large")]
    PayloadTooLarge { size: u64, max: u64 },

    /// Catch-all for store failures and other unexpected errors.
    #[error("Internal Server Error")]
    InternalError(#[from] anyhow::Error),
}

impl DavError {
    /// Return the HTTP status code for this error.
    pub fn status_code(&self) -> StatusCode {
        match self {
            DavError::Unauthorized { .. } => StatusCode::UNAUTHORIZED,
            DavError::BadRequest { .. } => StatusCode::BAD_REQUEST,
            DavError::NotFound { .. } => StatusCode::NOT_FOUND,
            DavError::MethodNotAllowed { .. } => StatusCode::METHOD_NOT_ALLOWED,
            DavError::PayloadTooLarge { .. } => StatusCode::PAYLOAD_TOO_LARGE,
            DavError::InternalError(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    pub fn bad_request(message: impl Into<String>) -> Self {
        DavError::BadRequest {
            message: message.into(),
        }
    }
}

impl IntoResponse for DavError {
    fn into_response(self) -> Response {
        let status = self.status_code();

        if let DavError::InternalError(ref err) = self {
            error!("Internal error while handling request: {err:#}");
        }

        let mut response = (
            status,
            [(header::CONTENT_TYPE, "text/plain; charset=utf-8")],
            self.to_string(),
        )
            .into_response();

        if let DavError::Unauthorized {
            challenge: Some(ref realm),
        } = self
        {
            let value = format!("Basic realm=\"{realm}\"");
            if let Ok(value) = HeaderValue::from_str(&value) {
                response
                    .headers_mut()
                    .insert(header::WWW_AUTHENTICATE, value);
            }
        }

        if let DavError::MethodNotAllowed { .. } = self {
            response
                .headers_mut()
                .insert(header::ALLOW, HeaderValue::from_static(ALLOWED_METHODS));
        }

        response
    }
}
