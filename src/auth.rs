//! HTTP Basic authentication.
//!
//! One credential pair is configured; every request must present it in an
//! `Authorization: Basic <base64(user:pass)>` header.  Comparison runs in
//! constant time.

use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use subtle::ConstantTimeEq;

use crate::config::AuthConfig;
use crate::errors::DavError;

/// Credentials decoded from an `Authorization` header.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BasicCredentials {
    pub username: String,
    pub password: String,
}

/// Parse a Basic `Authorization` header value.
///
/// Returns `None` if the scheme is not `Basic`, the payload is not valid
/// base64 or UTF-8, or it contains no `:` separator.  The password may
/// itself contain colons.
pub fn parse_basic_auth(header: &str) -> Option<BasicCredentials> {
    let (scheme, payload) = header.trim().split_once(' ')?;
    if !scheme.eq_ignore_ascii_case("Basic") {
        return None;
    }
    let decoded = STANDARD.decode(payload.trim()).ok()?;
    let decoded = String::from_utf8(decoded).ok()?;
    let (username, password) = decoded.split_once(':')?;
    Some(BasicCredentials {
        username: username.to_string(),
        password: password.to_string(),
    })
}

/// Compare two strings in constant time.
pub fn constant_time_eq(a: &str, b: &str) -> bool {
    if a.len() != b.len() {
        return false;
    }
    a.as_bytes().ct_eq(b.as_bytes()).into()
}

/// Check an optional `Authorization` header against the configured pair.
///
/// A missing or malformed header yields a 401 carrying a Basic challenge;
/// well-formed but wrong credentials yield a bare 401.
pub fn authenticate(header: Option<&str>, config: &AuthConfig) -> Result<(), DavError> {
    let challenge = || DavError::Unauthorized {
        challenge: Some(config.realm.clone()),
    };

    let credentials = header.and_then(parse_basic_auth).ok_or_else(challenge)?;

    // An unconfigured pair would otherwise accept `Basic Og==` (":").
    if config.username.is_empty() || config.password.is_empty() {
        return Err(DavError::Unauthorized { challenge: None });
    }

    // Evaluate both comparisons so timing does not reveal which one failed.
    let user_ok = constant_time_eq(&credentials.username, &config.username);
    let pass_ok = constant_time_eq(&credentials.password, &config.password);
    if user_ok & pass_ok {
        Ok(())
    } else {
        Err(DavError::Unauthorized { challenge: None })
    }
}
