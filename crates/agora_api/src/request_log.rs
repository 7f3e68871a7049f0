//! Per-request access logging.

use axum::extract::Request;
use axum::middleware::Next;
use axum::response::Response;
use std::time::Instant;

/// Logs `event=http_request` with method, path, status and duration.
/// Query strings are left out; they may carry search terms.
pub async fn log_requests(request: Request, next: Next) -> Response {
    let started_at = Instant::now();
    let method = request.method().clone();
    let path = request.uri().path().to_string();

    let response = next.run(request).await;

    let status = response.status();
    let outcome = if status.is_server_error() { "error" } else { "ok" };
    log::info!(
        "event=http_request module=api status={outcome} method={method} path={path} http_status={} duration_ms={}",
        status.as_u16(),
        started_at.elapsed().as_millis()
    );
    response
}
