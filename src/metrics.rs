//! Prometheus metrics for bucketdav.
//!
//! Installs a global Prometheus recorder using `metrics-exporter-prometheus`,
//! defines metric name constants, provides an axum middleware for HTTP RED
//! metrics, and exposes the metrics endpoint handler.

use axum::http::{Request, StatusCode};
use axum::response::{IntoResponse, Response};
use metrics::{counter, describe_counter, describe_histogram, histogram};
use metrics_exporter_prometheus::{PrometheusBuilder, PrometheusHandle};
use std::sync::OnceLock;
use std::time::Instant;

use crate::dav::DavMethod;

// -- Metric name constants ----------------------------------------------------

/// Total HTTP requests (counter). Labels: method, status.
pub const HTTP_REQUESTS_TOTAL: &str = "bucketdav_http_requests_total";

/// HTTP request duration in seconds (histogram). Labels: method.
pub const HTTP_REQUEST_DURATION_SECONDS: &str = "bucketdav_http_request_duration_seconds";

/// Total WebDAV operations dispatched (counter). Labels: method, status.
pub const DAV_OPERATIONS_TOTAL: &str = "bucketdav_dav_operations_total";

/// Total bytes received in PUT bodies (counter).
pub const BYTES_RECEIVED_TOTAL: &str = "bucketdav_bytes_received_total";

/// Total bytes sent in GET bodies (counter).
pub const BYTES_SENT_TOTAL: &str = "bucketdav_bytes_sent_total";

// -- Global recorder installation ---------------------------------------------

/// Singleton handle to the Prometheus recorder.
static PROMETHEUS_HANDLE: OnceLock<PrometheusHandle> = OnceLock::new();

/// Install the global Prometheus metrics recorder.  Idempotent; a second
/// call returns the handle installed by the first.
pub fn init_metrics() -> anyhow::Result<&'static PrometheusHandle> {
    if let Some(handle) = PROMETHEUS_HANDLE.get() {
        return Ok(handle);
    }
    let handle = PrometheusBuilder::new().install_recorder()?;
    Ok(PROMETHEUS_HANDLE.get_or_init(|| handle))
}

/// Register metric descriptions with the global recorder. Call once after
/// `init_metrics()`.
pub fn describe_metrics() {
    describe_counter!(HTTP_REQUESTS_TOTAL, "Total HTTP requests");
    describe_histogram!(
        HTTP_REQUEST_DURATION_SECONDS,
        "HTTP request duration in seconds"
    );
    describe_counter!(DAV_OPERATIONS_TOTAL, "Total WebDAV operations by method");
    describe_counter!(BYTES_RECEIVED_TOTAL, "Total bytes received (PUT bodies)");
    describe_counter!(BYTES_SENT_TOTAL, "Total bytes sent (GET bodies)");
}

// -- Metrics middleware -------------------------------------------------------

/// Axum middleware that records HTTP RED metrics for every request.
///
/// Excludes the metrics endpoint itself to avoid feedback loops.
pub async fn metrics_middleware(
    req: Request<axum::body::Body>,
    next: axum::middleware::Next,
) -> Response {
    if req.uri().path() == crate::server::METRICS_PATH {
        return next.run(req).await;
    }

    let method = method_label(&DavMethod::from(req.method()));

    let start = Instant::now();
    let response = next.run(req).await;
    let duration = start.elapsed().as_secs_f64();
    let status = response.status().as_u16().to_string();

    counter!(HTTP_REQUESTS_TOTAL, "method" => method, "status" => status).increment(1);
    histogram!(HTTP_REQUEST_DURATION_SECONDS, "method" => method).record(duration);

    response
}

/// Collapse arbitrary client-chosen verbs into one label value so the
/// label set stays bounded.
pub fn method_label(method: &DavMethod) -> &'static str {
    match method {
        DavMethod::Options => "OPTIONS",
        DavMethod::Get => "GET",
        DavMethod::Head => "HEAD",
        DavMethod::Put => "PUT",
        DavMethod::Delete => "DELETE",
        DavMethod::Mkcol => "MKCOL",
        DavMethod::Propfind => "PROPFIND",
        DavMethod::Move => "MOVE",
        DavMethod::Copy => "COPY",
        DavMethod::Unsupported(_) => "UNSUPPORTED",
    }
}

// -- Metrics endpoint handler -------------------------------------------------

/// `GET /_bucketdav/metrics` -- Render Prometheus exposition format text.
pub async fn metrics_handler() -> Response {
    match PROMETHEUS_HANDLE.get() {
        Some(handle) => (
            StatusCode::OK,
            [("content-type", "text/plain; version=0.0.4")],
            handle.render(),
        )
            .into_response(),
        None => (
            StatusCode::SERVICE_UNAVAILABLE,
            "metrics recorder not initialized",
        )
            .into_response(),
    }
}

// -- Tests --------------------------------------------------------------------
