#![no_main]

//! Fuzz target for tracking update parsing and sanitization.
//!
//! The webhook endpoint is unauthenticated, so any byte sequence can reach
//! the parser. None of it may panic, and whatever passes the sanitizers must
//! already be in sanitized form.

use libfuzzer_sys::fuzz_target;
use waybill_core::{
    ingest::TransactionUpdate,
    sanitize::{extract_order_id, sanitize_tracking_number, sanitize_tracking_url},
};

fuzz_target!(|data: &[u8]| {
    fuzz_tracking_payload(data);
});

fn fuzz_tracking_payload(data: &[u8]) {
    if let Ok(update) = TransactionUpdate::parse(data) {
        check_fields(&update.metadata, &update.tracking_number, &update.tracking_url_provider);
    }

    // Raw text straight into the field sanitizers.
    if let Ok(text) = std::str::from_utf8(data) {
        check_fields(text, text, text);
    }
}

fn check_fields(metadata: &str, tracking_number: &str, tracking_url: &str) {
    let _ = extract_order_id(metadata);

    if let Some(number) = sanitize_tracking_number(tracking_number) {
        assert!(!number.is_empty());
        assert!(!number.contains('`'));
        assert_eq!(sanitize_tracking_number(&number).as_deref(), Some(number.as_str()));
    }

    if let Some(url) = sanitize_tracking_url(tracking_url) {
        assert!(url.starts_with("http://") || url.starts_with("https://"));
        assert_eq!(sanitize_tracking_url(&url).as_deref(), Some(url.as_str()));
    }
}
