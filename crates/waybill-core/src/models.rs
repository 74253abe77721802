//! Core domain models and strongly-typed identifiers.
//!
//! Defines orders, their line items, the two-field tracking record and the
//! `OrderId` newtype with its database encoding.

use std::fmt;

use serde::{Deserialize, Serialize};

type PgDb = sqlx::Postgres;
type PgValueRef<'r> = sqlx::postgres::PgValueRef<'r>;
type PgTypeInfo = sqlx::postgres::PgTypeInfo;
type PgArgumentBuffer = sqlx::postgres::PgArgumentBuffer;
type EncodeResult =
    Result<sqlx::encode::IsNull, Box<dyn std::error::Error + Send + Sync + 'static>>;
type BoxDynError = sqlx::error::BoxDynError;

/// Product types that are fulfilled without shipping, besides virtual and
/// downloadable products.
pub const GIFT_CARD_PRODUCT_TYPES: &[&str] = &["gift-card", "pw-gift-card"];

/// Strongly-typed order identifier.
///
/// Shop order numbers are unsigned. Stored as `BIGINT`, so only ids up to
/// [`OrderId::MAX`] can name an order; larger values fail to encode.
///
/// # Example
///
/// ```
/// use waybill_core::models::OrderId;
/// let order_id = OrderId(1234);
/// assert_eq!(order_id.to_string(), "1234");
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct OrderId(pub u64);

impl OrderId {
    /// Largest id a `BIGINT` column can hold.
    pub const MAX: Self = Self(i64::MAX as u64);

    /// Returns the id if it is within the storable range.
    pub const fn checked(id: u64) -> Option<Self> {
        if id <= Self::MAX.0 {
            Some(Self(id))
        } else {
            None
        }
    }

    /// Whether an order with this id can exist.
    pub const fn is_storable(self) -> bool {
        self.0 <= Self::MAX.0
    }
}

impl fmt::Display for OrderId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<u64> for OrderId {
    fn from(id: u64) -> Self {
        Self(id)
    }
}

impl sqlx::Type<PgDb> for OrderId {
    fn type_info() -> PgTypeInfo {
        <i64 as sqlx::Type<PgDb>>::type_info()
    }
}

impl<'r> sqlx::Decode<'r, PgDb> for OrderId {
    fn decode(value: PgValueRef<'r>) -> Result<Self, BoxDynError> {
        let id = <i64 as sqlx::Decode<PgDb>>::decode(value)?;
        Ok(Self(u64::try_from(id)?))
    }
}

impl sqlx::Encode<'_, PgDb> for OrderId {
    fn encode_by_ref(&self, buf: &mut PgArgumentBuffer) -> EncodeResult {
        let id = i64::try_from(self.0)?;
        <i64 as sqlx::Encode<PgDb>>::encode_by_ref(&id, buf)
    }
}

/// The two tracking fields an order carries.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TrackingField {
    /// Carrier tracking number
    TrackingNumber,
    /// Carrier tracking page URL
    TrackingUrl,
}

impl TrackingField {
    /// Column (and order meta key) holding this field.
    pub const fn column(self) -> &'static str {
        match self {
            Self::TrackingNumber => "tracking_number",
            Self::TrackingUrl => "tracking_url",
        }
    }
}

impl fmt::Display for TrackingField {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.column())
    }
}

/// Shipment tracking annotation attached to one order.
///
/// Either field may be missing at rest, e.g. after a partial manual edit.
/// Only a complete record is ever shown to customers.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize, sqlx::FromRow)]
pub struct TrackingRecord {
    /// Carrier tracking number.
    pub tracking_number: Option<String>,

    /// Carrier tracking page URL.
    pub tracking_url: Option<String>,
}

impl TrackingRecord {
    /// Creates a fully populated record.
    pub fn new(tracking_number: impl Into<String>, tracking_url: impl Into<String>) -> Self {
        Self { tracking_number: Some(tracking_number.into()), tracking_url: Some(tracking_url.into()) }
    }

    /// Returns the value of a single field.
    pub fn field(&self, field: TrackingField) -> Option<&str> {
        match field {
            TrackingField::TrackingNumber => self.tracking_number.as_deref(),
            TrackingField::TrackingUrl => self.tracking_url.as_deref(),
        }
    }

    /// Returns `(number, url)` when both are present and non-empty.
    pub fn complete(&self) -> Option<(&str, &str)> {
        match (self.tracking_number.as_deref(), self.tracking_url.as_deref()) {
            (Some(number), Some(url)) if !number.is_empty() && !url.is_empty() => {
                Some((number, url))
            },
            _ => None,
        }
    }

    /// Whether the record is eligible for display.
    pub fn is_complete(&self) -> bool {
        self.complete().is_some()
    }
}

/// A single order line.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, sqlx::FromRow)]
pub struct LineItem {
    /// Product name as shown on the order.
    pub name: String,

    /// Product needs no shipping.
    pub is_virtual: bool,

    /// Product is delivered as a download.
    pub is_downloadable: bool,

    /// Shop product type, e.g. `simple`, `variable`, `pw-gift-card`.
    pub product_type: String,
}

impl LineItem {
    /// Creates a physical line item of product type `simple`.
    pub fn physical(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            is_virtual: false,
            is_downloadable: false,
            product_type: "simple".to_string(),
        }
    }

    /// Creates a virtual line item.
    pub fn virtual_item(name: impl Into<String>) -> Self {
        Self { is_virtual: true, ..Self::physical(name) }
    }

    /// Creates a downloadable line item.
    pub fn downloadable(name: impl Into<String>) -> Self {
        Self { is_downloadable: true, ..Self::physical(name) }
    }

    /// Creates a gift card line item.
    pub fn gift_card(name: impl Into<String>) -> Self {
        Self { product_type: "pw-gift-card".to_string(), ..Self::physical(name) }
    }

    /// Whether the product type is one of the gift card types.
    pub fn is_gift_card(&self) -> bool {
        GIFT_CARD_PRODUCT_TYPES.contains(&self.product_type.as_str())
    }

    /// Whether this line needs a physical shipment.
    pub fn requires_shipping(&self) -> bool {
        !(self.is_virtual || self.is_downloadable || self.is_gift_card())
    }
}

/// An order as seen by the tracking service.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Order {
    /// Unique identifier for this order.
    pub id: OrderId,

    /// Lines on the order, in display order.
    pub line_items: Vec<LineItem>,

    /// Current tracking annotation.
    pub tracking: TrackingRecord,
}

impl Order {
    /// Creates an order without tracking information.
    pub fn new(id: impl Into<OrderId>, line_items: Vec<LineItem>) -> Self {
        Self { id: id.into(), line_items, tracking: TrackingRecord::default() }
    }
}
