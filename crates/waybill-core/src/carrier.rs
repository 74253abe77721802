//! Carrier name lookup from tracking URLs.
//!
//! The mapping is an ordered list injected at construction. The first rule
//! whose fragment occurs in the URL wins, so more specific fragments must be
//! listed before broader ones.

use serde::{Deserialize, Serialize};

/// A single `(carrier, url fragment)` pair.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CarrierRule {
    /// Human-readable carrier name
    pub name: String,
    /// Case-sensitive substring identifying the carrier's tracking site
    pub url_fragment: String,
}

impl CarrierRule {
    /// Creates a rule.
    pub fn new(name: impl Into<String>, url_fragment: impl Into<String>) -> Self {
        Self { name: name.into(), url_fragment: url_fragment.into() }
    }
}

/// Built-in carrier table.
pub fn default_rules() -> Vec<CarrierRule> {
    vec![
        CarrierRule::new("USPS", "usps.com"),
        CarrierRule::new("FedEx", "fedex.com"),
        CarrierRule::new("UPS", "ups.com"),
    ]
}

/// Resolves a tracking URL to a carrier name.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CarrierResolver {
    rules: Vec<CarrierRule>,
}

impl CarrierResolver {
    /// Creates a resolver over the given rules, preserving their order.
    pub fn new(rules: Vec<CarrierRule>) -> Self {
        Self { rules }
    }

    /// Returns the first carrier whose fragment is contained in `url`.
    pub fn resolve(&self, url: &str) -> Option<&str> {
        self.rules
            .iter()
            .find(|rule| url.contains(rule.url_fragment.as_str()))
            .map(|rule| rule.name.as_str())
    }

    /// Configured rules in match order.
    pub fn rules(&self) -> &[CarrierRule] {
        &self.rules
    }
}

impl Default for CarrierResolver {
    fn default() -> Self {
        Self::new(default_rules())
    }
}
