//! Server-Sent Events framing of lifecycle events.

use crate::server::ServerEvent;
use actix_web::web::Bytes;

/// SSE event name of every lifecycle event
pub const SERVER_STATUS_EVENT: &str = "server-status";

/// Format a lifecycle event for the wire.
///
/// Returns `None` if the payload cannot be serialized.
pub fn format_sse_message(event: &ServerEvent) -> Option<Bytes> {
    match serde_json::to_string(event) {
        Ok(data) => Some(Bytes::from(format!(
            "event: {}\ndata: {}\n\n",
            SERVER_STATUS_EVENT, data
        ))),
        Err(e) => {
            tracing::error!(
                error = %e,
                event_type = SERVER_STATUS_EVENT,
                "Failed to serialize SSE event payload"
            );
            None
        }
    }
}

/// SSE comment line sent when a subscriber fell behind
pub fn format_lagged(skipped: u64) -> Bytes {
    Bytes::from(format!(": lagged {}\n\n", skipped))
}
