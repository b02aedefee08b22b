use axum::{
    body::{to_bytes, Body, Bytes},
    http::{header::CONTENT_LENGTH, Method, Request, StatusCode},
    middleware::Next,
    response::Response,
};
use std::time::Instant;

/// Error bodies larger than this are dropped rather than buffered.
const ERROR_BODY_LIMIT: usize = 64 * 1024;
const PREVIEW_CHARS: usize = 512;

/// What is known about a request that ended in a 4xx or 5xx.
struct FailedRequest {
    method: Method,
    /// Path only. Query strings carry login tokens and cancellation secrets.
    path: String,
    status: StatusCode,
    latency_ms: u64,
}

impl FailedRequest {
    fn log(&self, body: &str) {
        let status = self.status.as_u16();
        let method = self.method.as_str();
        if self.status.is_server_error() {
            tracing::error!(status, method, path = %self.path, latency_ms = self.latency_ms, body, "Request failed");
        } else {
            tracing::warn!(status, method, path = %self.path, latency_ms = self.latency_ms, body, "Request rejected");
        }
    }
}

/// Logs every 4xx/5xx response together with the start of its body (the
/// `AppError` JSON), then hands the unchanged response on.
pub async fn log_error_responses(req: Request<Body>, next: Next) -> Response {
    let method = req.method().clone();
    let path = req.uri().path().to_string();
    let started = Instant::now();

    let response = next.run(req).await;
    let status = response.status();
    if !(status.is_client_error() || status.is_server_error()) {
        return response;
    }

    let failed = FailedRequest {
        method,
        path,
        status,
        latency_ms: started.elapsed().as_millis() as u64,
    };
    let (mut parts, body) = response.into_parts();
    match to_bytes(body, ERROR_BODY_LIMIT).await {
        Ok(bytes) => {
            failed.log(&preview(&bytes));
            Response::from_parts(parts, Body::from(bytes))
        }
        Err(err) => {
            failed.log(&format!("<unreadable body: {}>", err));
            parts.headers.remove(CONTENT_LENGTH);
            Response::from_parts(parts, Body::empty())
        }
    }
}

fn preview(bytes: &Bytes) -> String {
    let text = String::from_utf8_lossy(bytes);
    if text.chars().count() <= PREVIEW_CHARS {
        return text.into_owned();
    }
    let head: String = text.chars().take(PREVIEW_CHARS).collect();
    format!("{}... ({} bytes)", head, bytes.len())
}
