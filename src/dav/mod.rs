//! WebDAV protocol model.
//!
//! Request methods and the `Depth` header are parsed into closed enums here
//! so the dispatcher can match exhaustively.  The submodules synthesize a
//! directory tree over the flat key space of the object store.

pub mod resolver;
pub mod resource;

use std::fmt;

use axum::http::Method;

/// Key suffix of the zero-length object that marks an explicit directory.
pub const DIR_MARKER: &str = ".dir";

/// Every method the dispatcher implements, in `Allow` header order.
pub const ALLOWED_METHODS: &str = "OPTIONS, GET, HEAD, PUT, DELETE, MKCOL, PROPFIND, MOVE, COPY";

/// An HTTP method as understood by the WebDAV layer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DavMethod {
    Options,
    Get,
    Head,
    Put,
    Delete,
    Mkcol,
    Propfind,
    Move,
    Copy,
    /// Anything else, including PROPPATCH, LOCK and UNLOCK.
    Unsupported(String),
}

impl DavMethod {
    pub fn as_str(&self) -> &str {
        match self {
            DavMethod::Options => "OPTIONS",
            DavMethod::Get => "GET",
            DavMethod::Head => "HEAD",
            DavMethod::Put => "PUT",
            DavMethod::Delete => "DELETE",
            DavMethod::Mkcol => "MKCOL",
            DavMethod::Propfind => "PROPFIND",
            DavMethod::Move => "MOVE",
            DavMethod::Copy => "COPY",
            DavMethod::Unsupported(other) => other,
        }
    }
}

impl From<&Method> for DavMethod {
    fn from(method: &Method) -> Self {
        match method.as_str() {
            "OPTIONS" => DavMethod::Options,
            "GET" => DavMethod::Get,
            "HEAD" => DavMethod::Head,
            "PUT" => DavMethod::Put,
            "DELETE" => DavMethod::Delete,
            "MKCOL" => DavMethod::Mkcol,
            "PROPFIND" => DavMethod::Propfind,
            "MOVE" => DavMethod::Move,
            "COPY" => DavMethod::Copy,
            other => DavMethod::Unsupported(other.to_string()),
        }
    }
}

impl fmt::Display for DavMethod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Value of the `Depth` request header.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Depth {
    Zero,
    One,
    /// Accepted, but enumeration still stops after one level.
    Infinity,
}

impl Depth {
    /// Parse a `Depth` header value.  A missing header means `infinity`;
    /// unrecognised values are treated the same way.
    pub fn from_header(value: Option<&str>) -> Self {
        match value.map(str::trim) {
            Some("0") => Depth::Zero,
            Some("1") => Depth::One,
            Some(v) if v.eq_ignore_ascii_case("infinity") => Depth::Infinity,
            None => Depth::Infinity,
            Some(other) => {
                tracing::debug!("Unrecognised Depth header {:?}, using infinity", other);
                Depth::Infinity
            }
        }
    }

    /// Whether children should be listed.
    pub fn enumerates(self) -> bool {
        !matches!(self, Depth::Zero)
    }
}

/// Percent-decode a request URI path into an object key.
///
/// Returns `None` when the decoded bytes are not valid UTF-8.
pub fn decode_path(raw: &str) -> Option<String> {
    let decoded = percent_encoding::percent_decode_str(raw)
        .decode_utf8()
        .ok()?
        .into_owned();
    if decoded.is_empty() {
        Some("/".to_string())
    } else {
        Some(decoded)
    }
}

/// Append a trailing slash unless one is already present.
pub fn ensure_trailing_slash(path: &str) -> String {
    if path.ends_with('/') {
        path.to_string()
    } else {
        format!("{path}/")
    }
}

/// Whether `key` is a directory marker object rather than user content.
pub fn is_marker_key(key: &str) -> bool {
    key.ends_with(&format!("/{DIR_MARKER}"))
}
