//! Axum router construction.
//!
//! WebDAV addresses resources by arbitrary path and uses extension methods
//! (`PROPFIND`, `MKCOL`, ...) that axum's method routers do not know, so the
//! whole key space is served by a single fallback handler that hands the
//! method, decoded path, headers, and body to [`crate::handlers::dispatch`].
//! The only explicit routes are the infrastructure endpoints under
//! [`INTERNAL_PREFIX`].

use axum::{
    body::Body,
    extract::{DefaultBodyLimit, State},
    http::{header, HeaderValue, Request, StatusCode},
    middleware::{self, Next},
    response::{IntoResponse, Response},
    routing::get,
    Router,
};
use std::sync::Arc;
use tower::ServiceBuilder;
use tower_http::trace::TraceLayer;
use tracing::warn;

use crate::auth;
use crate::dav::{decode_path, DavMethod};
use crate::errors::{generate_request_id, DavError};
use crate::metrics::{metrics_handler, metrics_middleware};
use crate::AppState;

/// Path prefix reserved for server endpoints outside the WebDAV namespace.
pub const INTERNAL_PREFIX: &str = "/_bucketdav";

/// Health probe path.
pub const HEALTH_PATH: &str = "/_bucketdav/health";

/// Prometheus exposition path.
pub const METRICS_PATH: &str = "/_bucketdav/metrics";

/// Build the axum [`Router`] serving WebDAV plus enabled infrastructure
/// endpoints.
///
/// The returned router is ready to be passed to `axum::serve`.
pub fn app(state: Arc<AppState>) -> Router {
    let observability = &state.config.observability;

    let mut router = Router::new();
    if observability.health_check {
        router = router.route(HEALTH_PATH, get(health_check));
    }
    if observability.metrics {
        router = router.route(METRICS_PATH, get(metrics_handler));
    }

    router
        .fallback(handle_dav)
        .with_state(state.clone())
        // ServiceBuilder layers run top to bottom: metrics and tracing see
        // the full request lifecycle, auth runs last before the handler.
        .layer(
            ServiceBuilder::new()
                .layer(DefaultBodyLimit::disable())
                .layer(middleware::from_fn(metrics_middleware))
                .layer(TraceLayer::new_for_http())
                .layer(middleware::from_fn(common_headers_middleware))
                .layer(middleware::from_fn_with_state(state, auth_middleware)),
        )
}

// -- Common headers middleware -----------------------------------------------

/// Middleware that adds common response headers to every response:
/// - `x-request-id`: 16-character hex string
/// - `Date`: RFC 7231 formatted timestamp
/// - `Server`: `bucketdav`
async fn common_headers_middleware(req: Request<Body>, next: Next) -> Response {
    let mut response = next.run(req).await;
    let headers = response.headers_mut();

    if !headers.contains_key("x-request-id") {
        if let Ok(value) = HeaderValue::from_str(&generate_request_id()) {
            headers.insert("x-request-id", value);
        }
    }

    let date = httpdate::fmt_http_date(std::time::SystemTime::now());
    if let Ok(value) = HeaderValue::from_str(&date) {
        headers.insert(header::DATE, value);
    }
    headers.insert(header::SERVER, HeaderValue::from_static("bucketdav"));

    response
}

// -- Auth middleware ---------------------------------------------------------

/// Whether `path` is an enabled infrastructure endpoint, which bypasses
/// authentication.
fn is_infrastructure_path(state: &AppState, path: &str) -> bool {
    let observability = &state.config.observability;
    (observability.health_check && path == HEALTH_PATH)
        || (observability.metrics && path == METRICS_PATH)
}

/// Basic authentication middleware.
///
/// Every WebDAV request, whatever its method, must carry the configured
/// credential pair.
async fn auth_middleware(
    State(state): State<Arc<AppState>>,
    req: Request<Body>,
    next: Next,
) -> Result<Response, DavError> {
    if is_infrastructure_path(&state, req.uri().path()) {
        return Ok(next.run(req).await);
    }

    let outcome = auth::authenticate(
        req.headers()
            .get(header::AUTHORIZATION)
            .and_then(|v| v.to_str().ok()),
        &state.config.auth,
    );
    if let Err(err) = outcome {
        warn!(
            "Rejected {} {}: authentication failed",
            req.method(),
            req.uri().path()
        );
        return Err(err);
    }

    Ok(next.run(req).await)
}

// -- Health check ------------------------------------------------------------

/// `GET /_bucketdav/health` -- Returns `{"status": "ok"}` with 200 OK.
async fn health_check() -> impl IntoResponse {
    (
        StatusCode::OK,
        [(header::CONTENT_TYPE, "application/json")],
        serde_json::json!({ "status": "ok" }).to_string(),
    )
}

// -- WebDAV entry point ------------------------------------------------------

/// Fallback handler: every non-infrastructure request lands here.
async fn handle_dav(
    State(state): State<Arc<AppState>>,
    req: Request<Body>,
) -> Result<Response, DavError> {
    let (parts, body) = req.into_parts();
    let method = DavMethod::from(&parts.method);
    let path = decode_path(parts.uri.path())
        .ok_or_else(|| DavError::bad_request("Request path is not valid UTF-8"))?;

    crate::handlers::dispatch(state, method, &path, &parts.headers, body).await
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Config;
    use crate::dav::resolver::tests::CountingStore;
    use crate::storage::backend::ObjectStore;
    use crate::storage::memory::MemoryBackend;
    use axum::http::Method;
    use base64::Engine;
    use tower::ServiceExt;

    const USERNAME: &str = "tester";
    const PASSWORD: &str = "correct horse";

    fn test_config() -> Config {
        let mut config = Config::default();
        config.auth.username = USERNAME.to_string();
        config.auth.password = PASSWORD.to_string();
        config
    }

    fn test_app() -> Router {
        test_app_with(test_config())
    }

    fn test_app_with(config: Config) -> Router {
        test_app_with_store(config, Arc::new(MemoryBackend::default()))
    }

    fn test_app_with_store(config: Config, store: Arc<dyn ObjectStore>) -> Router {
        app(Arc::new(AppState { config, store }))
    }

    fn credentials() -> String {
        let raw = format!("{USERNAME}:{PASSWORD}");
        format!(
            "Basic {}",
            base64::engine::general_purpose::STANDARD.encode(raw)
        )
    }

    fn request(method: &str, uri: &str) -> axum::http::request::Builder {
        Request::builder()
            .method(Method::from_bytes(method.as_bytes()).unwrap())
            .uri(uri)
            .header(header::AUTHORIZATION, credentials())
    }

    async fn send(app: &Router, req: Request<Body>) -> Response {
        app.clone().oneshot(req).await.unwrap()
    }

    async fn call(app: &Router, method: &str, uri: &str) -> Response {
        send(app, request(method, uri).body(Body::empty()).unwrap()).await
    }

    async fn put(app: &Router, uri: &str, body: &str) -> Response {
        send(
            app,
            request("PUT", uri)
                .header(header::CONTENT_TYPE, "text/plain")
                .body(Body::from(body.to_string()))
                .unwrap(),
        )
        .await
    }

    async fn propfind(app: &Router, uri: &str, depth: &str) -> (StatusCode, String) {
        let response = send(
            app,
            request("PROPFIND", uri)
                .header("depth", depth)
                .body(Body::empty())
                .unwrap(),
        )
        .await;
        let status = response.status();
        (status, body_string(response).await)
    }

    async fn body_string(response: Response) -> String {
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        String::from_utf8(bytes.to_vec()).unwrap()
    }

    fn response_count(xml: &str) -> usize {
        xml.matches("<D:response>").count()
    }

    // -- Authentication ------------------------------------------------------

    #[tokio::test]
    async fn test_missing_credentials_get_challenge() {
        let app = test_app();
        let req = Request::builder()
            .method(Method::GET)
            .uri("/a.txt")
            .body(Body::empty())
            .unwrap();
        let response = send(&app, req).await;
        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
        assert_eq!(
            response.headers().get(header::WWW_AUTHENTICATE).unwrap(),
            "Basic realm=\"WebDAV Server\""
        );
    }

    #[tokio::test]
    async fn test_wrong_credentials_rejected_without_challenge() {
        let app = test_app();
        let bad = base64::engine::general_purpose::STANDARD.encode(format!("{USERNAME}:nope"));
        let req = Request::builder()
            .method(Method::OPTIONS)
            .uri("/")
            .header(header::AUTHORIZATION, format!("Basic {bad}"))
            .body(Body::empty())
            .unwrap();
        let response = send(&app, req).await;
        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
        assert!(response.headers().get(header::WWW_AUTHENTICATE).is_none());
    }

    #[tokio::test]
    async fn test_non_basic_scheme_gets_challenge() {
        let app = test_app();
        let req = Request::builder()
            .method(Method::GET)
            .uri("/")
            .header(header::AUTHORIZATION, "Bearer abc")
            .body(Body::empty())
            .unwrap();
        let response = send(&app, req).await;
        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
        assert!(response.headers().get(header::WWW_AUTHENTICATE).is_some());
    }

    // -- Infrastructure endpoints ---------------------------------------------

    #[tokio::test]
    async fn test_health_check_skips_auth() {
        let app = test_app();
        let req = Request::builder()
            .uri(HEALTH_PATH)
            .body(Body::empty())
            .unwrap();
        let response = send(&app, req).await;
        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(body_string(response).await, r#"{"status":"ok"}"#);
    }

    #[tokio::test]
    async fn test_disabled_health_check_is_plain_webdav_path() {
        let mut config = test_config();
        config.observability.health_check = false;
        let app = test_app_with(config);
        let req = Request::builder()
            .uri(HEALTH_PATH)
            .body(Body::empty())
            .unwrap();
        let response = send(&app, req).await;
        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    }

    #[tokio::test]
    async fn test_common_headers_present() {
        let app = test_app();
        let response = call(&app, "OPTIONS", "/").await;
        let id = response.headers().get("x-request-id").unwrap();
        assert_eq!(id.len(), 16);
        assert_eq!(response.headers().get(header::SERVER).unwrap(), "bucketdav");
        assert!(response.headers().contains_key(header::DATE));
    }

    // -- OPTIONS / unsupported verbs -------------------------------------------

    #[tokio::test]
    async fn test_options_advertises_capabilities() {
        let app = test_app();
        let response = call(&app, "OPTIONS", "/any/path").await;
        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(
            response.headers().get(header::ALLOW).unwrap(),
            crate::dav::ALLOWED_METHODS
        );
        assert_eq!(response.headers().get("dav").unwrap(), "1, 2");
        assert_eq!(response.headers().get("ms-author-via").unwrap(), "DAV");
    }

    #[tokio::test]
    async fn test_unsupported_method_is_405() {
        let app = test_app();
        for verb in ["LOCK", "PROPPATCH", "POST"] {
            let response = call(&app, verb, "/a.txt").await;
            assert_eq!(response.status(), StatusCode::METHOD_NOT_ALLOWED, "{verb}");
            assert!(response.headers().contains_key(header::ALLOW));
        }
    }

    // -- GET / HEAD / PUT --------------------------------------------------------

    #[tokio::test]
    async fn test_put_then_get_round_trip() {
        let app = test_app();
        let created = put(&app, "/notes/a.txt", "hello").await;
        assert_eq!(created.status(), StatusCode::CREATED);
        let etag = created.headers().get(header::ETAG).unwrap().clone();

        let response = call(&app, "GET", "/notes/a.txt").await;
        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(
            response.headers().get(header::CONTENT_TYPE).unwrap(),
            "text/plain"
        );
        assert_eq!(response.headers().get(header::ETAG).unwrap(), &etag);
        assert!(response.headers().contains_key(header::LAST_MODIFIED));
        assert_eq!(body_string(response).await, "hello");
    }

    #[tokio::test]
    async fn test_put_without_content_type_defaults_to_octet_stream() {
        let app = test_app();
        let req = request("PUT", "/blob.bin")
            .body(Body::from(vec![0u8, 1, 2]))
            .unwrap();
        assert_eq!(send(&app, req).await.status(), StatusCode::CREATED);

        let response = call(&app, "GET", "/blob.bin").await;
        assert_eq!(
            response.headers().get(header::CONTENT_TYPE).unwrap(),
            "application/octet-stream"
        );
    }

    #[tokio::test]
    async fn test_get_missing_is_404() {
        let app = test_app();
        let response = call(&app, "GET", "/missing.txt").await;
        assert_eq!(response.status(), StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn test_head_reports_length() {
        let app = test_app();
        put(&app, "/a.txt", "hello").await;
        let response = call(&app, "HEAD", "/a.txt").await;
        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(response.headers().get(header::CONTENT_LENGTH).unwrap(), "5");

        let missing = call(&app, "HEAD", "/nope.txt").await;
        assert_eq!(missing.status(), StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn test_put_to_collection_path_is_rejected() {
        let app = test_app();
        let response = put(&app, "/docs/", "x").await;
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn test_oversized_put_is_413() {
        let mut config = test_config();
        config.server.max_object_size = 4;
        let app = test_app_with(config);
        let req = request("PUT", "/big.txt")
            .header(header::CONTENT_LENGTH, "10")
            .body(Body::from("0123456789"))
            .unwrap();
        let response = send(&app, req).await;
        assert_eq!(response.status(), StatusCode::PAYLOAD_TOO_LARGE);

        let stored = call(&app, "GET", "/big.txt").await;
        assert_eq!(stored.status(), StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn test_get_directory_returns_listing() {
        let app = test_app();
        put(&app, "/docs/a.txt", "a").await;
        let response = call(&app, "GET", "/docs").await;
        assert_eq!(response.status(), StatusCode::MULTI_STATUS);
        let xml = body_string(response).await;
        assert!(xml.contains("<D:href>/docs/</D:href>"));
        assert!(xml.contains("<D:href>/docs/a.txt</D:href>"));
    }

    #[tokio::test]
    async fn test_percent_encoded_path_is_decoded() {
        let app = test_app();
        put(&app, "/my%20file.txt", "x").await;
        let (status, xml) = propfind(&app, "/my%20file.txt", "0").await;
        assert_eq!(status, StatusCode::MULTI_STATUS);
        assert!(xml.contains("<D:href>/my file.txt</D:href>"));
    }

    // -- PROPFIND / MKCOL -------------------------------------------------------

    #[tokio::test]
    async fn test_propfind_depth_zero_describes_only_target() {
        let app = test_app();
        put(&app, "/docs/a.txt", "a").await;
        let (status, xml) = propfind(&app, "/docs", "0").await;
        assert_eq!(status, StatusCode::MULTI_STATUS);
        assert_eq!(response_count(&xml), 1);
        assert!(xml.contains("<D:collection/>"));
    }

    #[tokio::test]
    async fn test_propfind_depth_one_lists_children_without_marker() {
        let app = test_app();
        assert_eq!(call(&app, "MKCOL", "/docs").await.status(), StatusCode::CREATED);
        put(&app, "/docs/a.txt", "aaa").await;
        put(&app, "/docs/sub/b.txt", "b").await;

        let (status, xml) = propfind(&app, "/docs", "1").await;
        assert_eq!(status, StatusCode::MULTI_STATUS);
        assert_eq!(response_count(&xml), 3);
        assert!(xml.contains("<D:href>/docs/a.txt</D:href>"));
        assert!(xml.contains("<D:getcontentlength>3</D:getcontentlength>"));
        assert!(xml.contains("<D:href>/docs/sub/</D:href>"));
        assert!(!xml.contains(".dir"));
        assert!(!xml.contains("/docs/sub/b.txt"));
    }

    #[tokio::test]
    async fn test_propfind_depth_infinity_matches_depth_one() {
        let app = test_app();
        put(&app, "/docs/a.txt", "a").await;
        put(&app, "/docs/sub/b.txt", "b").await;

        let (_, one) = propfind(&app, "/docs/", "1").await;
        let (_, infinity) = propfind(&app, "/docs/", "infinity").await;
        assert_eq!(response_count(&one), response_count(&infinity));
    }

    #[tokio::test]
    async fn test_propfind_file_reports_properties() {
        let app = test_app();
        put(&app, "/a.txt", "hello").await;
        let (status, xml) = propfind(&app, "/a.txt", "1").await;
        assert_eq!(status, StatusCode::MULTI_STATUS);
        assert_eq!(response_count(&xml), 1);
        assert!(xml.contains("<D:getcontenttype>text/plain</D:getcontenttype>"));
        assert!(xml.contains("<D:resourcetype></D:resourcetype>"));
    }

    #[tokio::test]
    async fn test_propfind_missing_path_still_answers() {
        let app = test_app();
        let (status, xml) = propfind(&app, "/ghost.txt", "0").await;
        assert_eq!(status, StatusCode::MULTI_STATUS);
        assert!(xml.contains("<D:href>/ghost.txt</D:href>"));
        assert!(!xml.contains("getcontentlength"));
    }

    #[tokio::test]
    async fn test_mkcol_makes_empty_directory_visible() {
        let app = test_app();
        call(&app, "MKCOL", "/empty").await;
        let (_, xml) = propfind(&app, "/", "1").await;
        assert!(xml.contains("<D:href>/empty/</D:href>"));
    }

    #[tokio::test]
    async fn test_propfind_lists_at_most_ten_children() {
        let app = test_app();
        call(&app, "MKCOL", "/many").await;
        for i in 0..12 {
            put(&app, &format!("/many/f{i:02}.txt"), "x").await;
        }

        let (status, xml) = propfind(&app, "/many", "1").await;
        assert_eq!(status, StatusCode::MULTI_STATUS);
        assert_eq!(response_count(&xml), 1 + crate::handlers::collection::CHILD_LISTING_LIMIT);
        assert!(xml.contains("<D:href>/many/f00.txt</D:href>"));
        assert!(xml.contains("<D:href>/many/f09.txt</D:href>"));
        assert!(!xml.contains("/many/f10.txt"));
        assert!(!xml.contains(".dir"));
    }

    #[tokio::test]
    async fn test_marker_does_not_take_a_child_slot() {
        let app = test_app();
        call(&app, "MKCOL", "/ten").await;
        for i in 0..10 {
            put(&app, &format!("/ten/f{i:02}.txt"), "x").await;
        }

        let (_, xml) = propfind(&app, "/ten/", "1").await;
        assert_eq!(response_count(&xml), 11);
        assert!(xml.contains("<D:href>/ten/f09.txt</D:href>"));
    }

    // -- DELETE ------------------------------------------------------------------

    #[tokio::test]
    async fn test_delete_is_idempotent() {
        let app = test_app();
        put(&app, "/a.txt", "x").await;
        assert_eq!(call(&app, "DELETE", "/a.txt").await.status(), StatusCode::NO_CONTENT);
        assert_eq!(call(&app, "DELETE", "/a.txt").await.status(), StatusCode::NO_CONTENT);
        assert_eq!(call(&app, "GET", "/a.txt").await.status(), StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn test_delete_directory_removes_subtree() {
        let app = test_app();
        call(&app, "MKCOL", "/docs").await;
        put(&app, "/docs/a.txt", "a").await;
        put(&app, "/docs/deep/b.txt", "b").await;
        put(&app, "/docsibling.txt", "keep").await;

        let response = call(&app, "DELETE", "/docs").await;
        assert_eq!(response.status(), StatusCode::NO_CONTENT);

        assert_eq!(call(&app, "GET", "/docs/a.txt").await.status(), StatusCode::NOT_FOUND);
        assert_eq!(
            call(&app, "GET", "/docs/deep/b.txt").await.status(),
            StatusCode::NOT_FOUND
        );
        assert_eq!(call(&app, "GET", "/docsibling.txt").await.status(), StatusCode::OK);
    }

    // -- MOVE / COPY -------------------------------------------------------------

    fn transfer_request(method: &str, from: &str, to: &str) -> Request<Body> {
        request(method, from)
            .header("destination", to)
            .body(Body::empty())
            .unwrap()
    }

    #[tokio::test]
    async fn test_move_relocates_object() {
        let app = test_app();
        put(&app, "/a.txt", "payload").await;

        let response = send(
            &app,
            transfer_request("MOVE", "/a.txt", "http://localhost:8080/moved/b.txt"),
        )
        .await;
        assert_eq!(response.status(), StatusCode::CREATED);

        assert_eq!(call(&app, "GET", "/a.txt").await.status(), StatusCode::NOT_FOUND);
        let moved = call(&app, "GET", "/moved/b.txt").await;
        assert_eq!(moved.headers().get(header::CONTENT_TYPE).unwrap(), "text/plain");
        assert_eq!(body_string(moved).await, "payload");
    }

    #[tokio::test]
    async fn test_copy_keeps_source() {
        let app = test_app();
        put(&app, "/a.txt", "payload").await;

        let response = send(&app, transfer_request("COPY", "/a.txt", "/copy%20of.txt")).await;
        assert_eq!(response.status(), StatusCode::CREATED);

        assert_eq!(call(&app, "GET", "/a.txt").await.status(), StatusCode::OK);
        let copy = call(&app, "GET", "/copy%20of.txt").await;
        assert_eq!(body_string(copy).await, "payload");
    }

    #[tokio::test]
    async fn test_transfer_without_destination_is_400() {
        let app = test_app();
        put(&app, "/a.txt", "x").await;
        for verb in ["MOVE", "COPY"] {
            let response = call(&app, verb, "/a.txt").await;
            assert_eq!(response.status(), StatusCode::BAD_REQUEST, "{verb}");
        }
    }

    #[tokio::test]
    async fn test_rejected_destination_never_reaches_store() {
        let store = Arc::new(CountingStore::default());
        let app = test_app_with_store(test_config(), store.clone());
        put(&app, "/a.txt", "x").await;
        let before = store.calls();

        for verb in ["MOVE", "COPY"] {
            let response = call(&app, verb, "/a.txt").await;
            assert_eq!(response.status(), StatusCode::BAD_REQUEST, "{verb}");

            for destination in ["http://bad host/", "http://h/docs/", "/a.txt"] {
                let response = send(&app, transfer_request(verb, "/a.txt", destination)).await;
                assert_eq!(response.status(), StatusCode::BAD_REQUEST, "{verb} {destination}");
            }
        }
        assert_eq!(store.calls(), before);
    }

    #[tokio::test]
    async fn test_transfer_onto_collection_path_is_400() {
        let app = test_app();
        put(&app, "/a.txt", "payload").await;
        call(&app, "MKCOL", "/docs").await;

        for verb in ["MOVE", "COPY"] {
            let response = send(&app, transfer_request(verb, "/a.txt", "http://h/docs/")).await;
            assert_eq!(response.status(), StatusCode::BAD_REQUEST, "{verb}");
        }

        let source = call(&app, "GET", "/a.txt").await;
        assert_eq!(body_string(source).await, "payload");
        let (_, xml) = propfind(&app, "/docs/", "0").await;
        assert!(!xml.contains("getcontentlength"));
    }

    #[tokio::test]
    async fn test_transfer_missing_source_is_404() {
        let app = test_app();
        let response = send(&app, transfer_request("MOVE", "/nope.txt", "/b.txt")).await;
        assert_eq!(response.status(), StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn test_transfer_onto_itself_is_400() {
        let app = test_app();
        put(&app, "/a.txt", "x").await;
        let response = send(&app, transfer_request("COPY", "/a.txt", "http://h/a.txt")).await;
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        assert_eq!(call(&app, "GET", "/a.txt").await.status(), StatusCode::OK);
    }
}
