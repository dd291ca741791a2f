pub mod http;
mod init;
pub mod metrics;

pub use http::{REQUEST_ID_HEADER, RequestSpan, ResponseMetrics};
pub use init::{TelemetryGuard, init_telemetry};
