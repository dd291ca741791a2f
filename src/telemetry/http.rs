//! Per-request span and metrics hooks for `tower_http::trace::TraceLayer`.

use std::time::Duration;

use axum::extract::MatchedPath;
use axum::http::{HeaderName, Request, Response};
use opentelemetry::KeyValue;
use tower_http::trace::{MakeSpan, OnResponse};
use tracing::Span;

use super::metrics::{HTTP_REQUEST_DURATION, HTTP_REQUESTS_TOTAL};

pub const REQUEST_ID_HEADER: HeaderName = HeaderName::from_static("x-request-id");

/// Opens the request span. The route is the matched template
/// (`/api/award/details/{award_id}`) so award ids stay out of span names.
#[derive(Clone, Copy, Debug, Default)]
pub struct RequestSpan;

impl<B> MakeSpan<B> for RequestSpan {
    fn make_span(&mut self, request: &Request<B>) -> Span {
        let method = request.method().as_str();
        let route = request
            .extensions()
            .get::<MatchedPath>()
            .map_or_else(|| request.uri().path(), MatchedPath::as_str);
        let header = |name: &HeaderName| {
            request
                .headers()
                .get(name)
                .and_then(|v| v.to_str().ok())
                .unwrap_or("")
                .to_string()
        };

        tracing::info_span!(
            "HTTP request",
            otel.name = %format!("{method} {route}"),
            http.method = %method,
            http.route = %route,
            http.target = %request.uri(),
            http.flavor = ?request.version(),
            http.user_agent = %header(&axum::http::header::USER_AGENT),
            request_id = %header(&REQUEST_ID_HEADER),
            http.response.status_code = tracing::field::Empty,
            otel.status_code = tracing::field::Empty,
        )
    }
}

/// Closes the request span and records the HTTP counters.
#[derive(Clone, Copy, Debug, Default)]
pub struct ResponseMetrics;

impl<B> OnResponse<B> for ResponseMetrics {
    fn on_response(self, response: &Response<B>, latency: Duration, span: &Span) {
        let status = response.status();
        let code = status.as_u16();
        let latency_ms = latency.as_secs_f64() * 1000.0;

        span.record("http.response.status_code", i64::from(code));
        span.record(
            "otel.status_code",
            if status.is_server_error() { "ERROR" } else { "OK" },
        );

        let attrs = [
            KeyValue::new("http.status_code", i64::from(code)),
            KeyValue::new("http.status_class", format!("{}xx", code / 100)),
        ];
        HTTP_REQUESTS_TOTAL.add(1, &attrs);
        HTTP_REQUEST_DURATION.record(latency_ms, &attrs);

        if status.is_server_error() {
            tracing::warn!(http.response.status_code = code, latency_ms, "request failed");
        } else {
            tracing::info!(http.response.status_code = code, latency_ms, "request completed");
        }
    }
}
