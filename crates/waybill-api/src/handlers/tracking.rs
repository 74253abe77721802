//! Carrier webhook endpoint.
//!
//! Hands the raw body and headers to the ingestor and turns its outcome into
//! a plain-text acknowledgement. No authentication: the only effect of a
//! forged call is overwriting tracking fields of an existing order.

use std::collections::HashMap;

use axum::{
    extract::State,
    http::{header::CONTENT_TYPE, HeaderMap},
    response::{IntoResponse, Response},
};
use bytes::Bytes;
use tracing::{debug, instrument};

use crate::AppState;

/// Receives a transaction update from the shipping provider.
///
/// Always answers `200` unless the store failed or the acknowledgement
/// policy is strict; the body says `ok - ...` or `Failed - <reason>.`.
#[instrument(
    name = "receive_tracking_update",
    skip(state, headers, body),
    fields(
        content_length = body.len(),
        user_agent = headers.get("user-agent").and_then(|v| v.to_str().ok()).unwrap_or("unknown"),
    )
)]
pub async fn receive_tracking_update(
    State(state): State<AppState>,
    headers: HeaderMap,
    body: Bytes,
) -> Response {
    let headers_map = extract_headers(&headers);
    let outcome = state.ingestor.ingest(&body, &headers_map).await;
    let ack = state.ingestor.acknowledge(&outcome);

    debug!(status = %ack.status, outcome = outcome.label(), "Acknowledging tracking update");

    (ack.status, [(CONTENT_TYPE, "text/plain; charset=utf-8")], ack.body).into_response()
}

/// Extracts headers into a HashMap for diagnostics.
fn extract_headers(headers: &HeaderMap) -> HashMap<String, String> {
    let mut map = HashMap::new();
    for (name, value) in headers {
        if let Ok(value_str) = value.to_str() {
            map.insert(name.as_str().to_string(), value_str.to_string());
        }
    }
    map
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn headers_extraction_preserves_all_values() {
        let mut headers = HeaderMap::new();
        headers.insert("content-type", "application/json".parse().unwrap());
        headers.insert("x-shippo-event", "track_updated".parse().unwrap());

        let extracted = extract_headers(&headers);

        assert_eq!(extracted.get("content-type").unwrap(), "application/json");
        assert_eq!(extracted.get("x-shippo-event").unwrap(), "track_updated");
    }
}
