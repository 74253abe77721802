//! Input cleaning for untrusted tracking payload fields.
//!
//! Every function here is idempotent: feeding its output back in returns the
//! same value.

use url::Url;

use crate::models::OrderId;

/// Extracts the order id embedded in free text such as `"Order 1234"`.
///
/// All ASCII digits are concatenated in order and parsed. Returns `None` when
/// there are no digits or the number is above [`OrderId::MAX`].
pub fn extract_order_id(metadata: &str) -> Option<OrderId> {
    let digits: String = metadata.chars().filter(char::is_ascii_digit).collect();
    if digits.is_empty() {
        return None;
    }
    digits.parse::<u64>().ok().and_then(OrderId::checked)
}

/// Strips control characters and backticks from a tracking number.
///
/// Returns `None` if nothing is left.
pub fn sanitize_tracking_number(raw: &str) -> Option<String> {
    let cleaned: String = raw.chars().filter(|c| !c.is_control() && *c != '`').collect();
    (!cleaned.is_empty()).then_some(cleaned)
}

/// Normalizes a carrier tracking URL.
///
/// Whitespace and control characters are dropped before parsing. The result
/// must be an absolute `http` or `https` URL with a host, and is returned in
/// its canonical serialization.
pub fn sanitize_tracking_url(raw: &str) -> Option<String> {
    let cleaned: String = raw.chars().filter(|c| !c.is_whitespace() && !c.is_control()).collect();
    let url = Url::parse(&cleaned).ok()?;

    if !matches!(url.scheme(), "http" | "https") {
        return None;
    }
    if url.host_str().is_none_or(str::is_empty) {
        return None;
    }

    Some(url.into())
}
