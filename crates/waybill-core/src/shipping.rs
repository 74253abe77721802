//! Shippability classification for orders.

use crate::models::LineItem;

/// Whether any line of the order needs a physical shipment.
///
/// Orders made only of virtual, downloadable or gift card products are not
/// shippable, and an empty order is not shippable either. Tracking details
/// are never surfaced for non-shippable orders.
pub fn is_shippable(line_items: &[LineItem]) -> bool {
    line_items.iter().any(LineItem::requires_shipping)
}
