// Delivery module - HTTP surface for query streaming
//
// Serves stored values either as a timed SSE stream or as one JSON response,
// plus the editor API and a small tester page.

mod api;
mod static_assets;

pub use api::{router, AppState, DeliveryServer};

use axum::http::{header, HeaderMap};

/// How a query response is delivered.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum DeliveryMode {
    /// Chunks over Server-Sent Events, one per tick.
    EventStream,
    /// The whole value as `{"text": ...}`.
    SingleShot,
}

impl DeliveryMode {
    /// Pick the mode from the request's `Accept` header.
    pub fn from_headers(headers: &HeaderMap) -> Self {
        let accepts_stream = headers
            .get_all(header::ACCEPT)
            .iter()
            .filter_map(|value| value.to_str().ok())
            .any(|value| value.contains("text/event-stream"));

        if accepts_stream {
            DeliveryMode::EventStream
        } else {
            DeliveryMode::SingleShot
        }
    }
}
