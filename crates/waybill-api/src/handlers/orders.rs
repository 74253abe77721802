//! Customer-facing tracking view for an order.

use axum::{
    extract::{Path, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;
use tracing::{error, instrument};
use waybill_core::{is_shippable, OrderId, TrackingNotice};

use super::error_response;
use crate::AppState;

/// Tracking details as shown on the account page.
#[derive(Debug, Serialize)]
pub struct OrderTrackingView {
    /// Order identifier
    pub order_id: OrderId,
    /// Whether any line item ships
    pub shippable: bool,
    /// Complete tracking details, hidden for non-shippable orders
    pub tracking: Option<TrackingDetails>,
    /// Plain-text notice for the customer; empty when suppressed
    pub notice: String,
}

/// Tracking number, link and carrier.
#[derive(Debug, Serialize)]
pub struct TrackingDetails {
    /// Tracking number
    pub number: String,
    /// Tracking page URL
    pub url: String,
    /// Carrier name, if the URL is recognised
    pub carrier: Option<String>,
}

/// Returns the tracking view for one order.
///
/// A non-numeric id is a `400`; a number above the storable range cannot
/// name an order and is a `404`. Both answer with the JSON error body.
#[instrument(name = "get_order_tracking", skip(state))]
pub async fn get_order_tracking(
    Path(raw_id): Path<String>,
    State(state): State<AppState>,
) -> Response {
    let Ok(id) = raw_id.parse::<u64>() else {
        return error_response(
            StatusCode::BAD_REQUEST,
            "E1003",
            format!("order id must be an unsigned integer, got {raw_id:?}"),
        );
    };
    let Some(order_id) = OrderId::checked(id) else {
        return error_response(StatusCode::NOT_FOUND, "E1004", format!("order {id} not found"));
    };

    let order = match state.store().find_order(order_id).await {
        Ok(Some(order)) => order,
        Ok(None) => {
            return error_response(
                StatusCode::NOT_FOUND,
                "E1004",
                format!("order {order_id} not found"),
            );
        },
        Err(e) => {
            error!(error = %e, "Failed to load order");
            return error_response(StatusCode::INTERNAL_SERVER_ERROR, "E3001", e.to_string());
        },
    };

    let notice = TrackingNotice::for_order(&order, state.carriers());
    let tracking = match &notice {
        TrackingNotice::Available { carrier, tracking_number, tracking_url } => {
            Some(TrackingDetails {
                number: tracking_number.clone(),
                url: tracking_url.clone(),
                carrier: carrier.clone(),
            })
        },
        TrackingNotice::Suppressed | TrackingNotice::Unavailable => None,
    };

    let view = OrderTrackingView {
        order_id,
        shippable: is_shippable(&order.line_items),
        tracking,
        notice: notice.render_plain(),
    };

    (StatusCode::OK, Json(view)).into_response()
}
