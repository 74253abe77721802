//! Customer-facing tracking notice for completed orders.
//!
//! Decides whether tracking is shown at all and renders the wording used in
//! order emails and on the account page, in plain text and HTML.

use serde::Serialize;

use crate::{
    carrier::CarrierResolver, models::Order, sanitize::sanitize_tracking_url,
    shipping::is_shippable,
};

const UNAVAILABLE: &str = "Sorry, tracking information is not available at this time.";
const LINK_STYLE: &str = "color: #a7bf49";

/// What a customer is told about shipment tracking.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum TrackingNotice {
    /// Nothing ships, so tracking is never mentioned.
    Suppressed,
    /// Shippable order with no complete tracking record yet.
    Unavailable,
    /// Tracking number and link are known.
    Available {
        /// Carrier name if the URL matched a known carrier
        carrier: Option<String>,
        /// Tracking number
        tracking_number: String,
        /// Tracking page URL, empty if the stored value is not an http(s) link
        tracking_url: String,
    },
}

impl TrackingNotice {
    /// Builds the notice for an order.
    ///
    /// The stored URL may have been written outside the ingestor, so it is
    /// sanitized again; anything that is not an http(s) link becomes empty.
    pub fn for_order(order: &Order, carriers: &CarrierResolver) -> Self {
        if !is_shippable(&order.line_items) {
            return Self::Suppressed;
        }

        match order.tracking.complete() {
            Some((number, url)) => {
                let tracking_url = sanitize_tracking_url(url).unwrap_or_default();
                Self::Available {
                    carrier: carriers.resolve(&tracking_url).map(str::to_string),
                    tracking_number: number.to_string(),
                    tracking_url,
                }
            },
            None => Self::Unavailable,
        }
    }

    /// Plain-text rendering. Empty when suppressed.
    pub fn render_plain(&self) -> String {
        match self {
            Self::Suppressed => String::new(),
            Self::Unavailable => UNAVAILABLE.to_string(),
            Self::Available { carrier: Some(carrier), tracking_number, tracking_url } => format!(
                "Your order has been shipped with {carrier}. The tracking number is \
                 {tracking_number} and you can track it at {tracking_url}."
            ),
            Self::Available { carrier: None, tracking_number, tracking_url } => format!(
                "Your order has been shipped. The tracking number is {tracking_number} and you \
                 can track it at {tracking_url}."
            ),
        }
    }

    /// HTML rendering with escaped values. Empty when suppressed.
    pub fn render_html(&self) -> String {
        match self {
            Self::Suppressed => String::new(),
            Self::Unavailable => format!("<h2>Tracking information</h2><p>{UNAVAILABLE}</p>"),
            Self::Available { carrier: Some(carrier), tracking_number, tracking_url } => format!(
                "<h2>Tracking information</h2><p>Your {} tracking number is <a href=\"{}\" \
                 style=\"{LINK_STYLE}\">{}</a>.</p>",
                escape_html(carrier),
                escape_html(tracking_url),
                escape_html(tracking_number)
            ),
            Self::Available { carrier: None, tracking_number, tracking_url } => format!(
                "<h2>Tracking information</h2><p>Your tracking number is <strong><a href=\"{}\" \
                 style=\"{LINK_STYLE}\">{}</a></strong>.</p>",
                escape_html(tracking_url),
                escape_html(tracking_number)
            ),
        }
    }
}

fn escape_html(raw: &str) -> String {
    let mut escaped = String::with_capacity(raw.len());
    for c in raw.chars() {
        match c {
            '&' => escaped.push_str("&amp;"),
            '<' => escaped.push_str("&lt;"),
            '>' => escaped.push_str("&gt;"),
            '"' => escaped.push_str("&quot;"),
            '\'' => escaped.push_str("&#39;"),
            _ => escaped.push(c),
        }
    }
    escaped
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{LineItem, TrackingRecord};

    fn shipped_order(url: &str) -> Order {
        Order {
            tracking: TrackingRecord::new("1Z999", url),
            ..Order::new(7, vec![LineItem::physical("Kettle")])
        }
    }

    #[test]
    fn virtual_order_suppresses_tracking() {
        let order = Order {
            tracking: TrackingRecord::new("1Z999", "https://www.ups.com/t"),
            ..Order::new(1, vec![LineItem::virtual_item("E-book")])
        };
        let notice = TrackingNotice::for_order(&order, &CarrierResolver::default());

        assert_eq!(notice, TrackingNotice::Suppressed);
        assert!(notice.render_plain().is_empty());
        assert!(notice.render_html().is_empty());
    }

    #[test]
    fn partial_record_is_unavailable() {
        let mut order = Order::new(2, vec![LineItem::physical("Kettle")]);
        order.tracking.tracking_number = Some("1Z999".to_string());
        let notice = TrackingNotice::for_order(&order, &CarrierResolver::default());

        assert_eq!(notice, TrackingNotice::Unavailable);
        assert_eq!(notice.render_plain(), UNAVAILABLE);
    }

    #[test]
    fn known_carrier_is_named() {
        let order = shipped_order("https://www.ups.com/track?1Z999");
        let notice = TrackingNotice::for_order(&order, &CarrierResolver::default());

        assert_eq!(
            notice.render_plain(),
            "Your order has been shipped with UPS. The tracking number is 1Z999 and you can \
             track it at https://www.ups.com/track?1Z999."
        );
        assert!(notice.render_html().contains("Your UPS tracking number is"));
    }

    #[test]
    fn unknown_carrier_uses_generic_wording() {
        let order = shipped_order("https://parcels.example.org/t?a=1&b=2");
        let notice = TrackingNotice::for_order(&order, &CarrierResolver::default());

        assert!(notice.render_plain().starts_with("Your order has been shipped. The tracking"));
        let html = notice.render_html();
        assert!(html.contains("href=\"https://parcels.example.org/t?a=1&amp;b=2\""));
        assert!(html.contains("<strong>"));
    }

    #[test]
    fn non_http_link_is_blanked() {
        let order = shipped_order("javascript:alert(document.cookie)//ups.com");
        let notice = TrackingNotice::for_order(&order, &CarrierResolver::default());

        let TrackingNotice::Available { ref tracking_url, ref carrier, .. } = notice else {
            panic!("expected available notice, got {notice:?}");
        };
        assert!(tracking_url.is_empty());
        assert!(carrier.is_none());

        let html = notice.render_html();
        assert!(html.contains("href=\"\""));
        assert!(!html.contains("javascript"));
        assert!(!notice.render_plain().contains("javascript"));
    }

    #[test]
    fn escape_covers_markup_characters() {
        assert_eq!(escape_html(r#"<a href="x">'&'</a>"#), "&lt;a href=&quot;x&quot;&gt;&#39;&amp;&#39;&lt;/a&gt;");
    }
}
