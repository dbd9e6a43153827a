//! Remote entities persisted by the stores.
//!
//! Every type carries the site it belongs to. Natural keys are the remote
//! identifiers; the scope a record is stored under is chosen by the store.

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use storeflux_common::{NaturalKey, SiteId};
use storeflux_storage::Entity;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PaymentGateway {
    pub site_id: SiteId,
    pub gateway_id: String,
    pub title: String,
    #[serde(default)]
    pub description: String,
    pub enabled: bool,
    #[serde(default)]
    pub features: Vec<String>,
}

impl Entity for PaymentGateway {
    const ENTITY: &'static str = "payment_gateway";

    fn natural_key(&self) -> NaturalKey {
        NaturalKey::new(self.gateway_id.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OrderStatus {
    pub site_id: SiteId,
    pub slug: String,
    pub name: String,
    /// Number of orders currently in this status.
    #[serde(default)]
    pub total: i64,
}

impl Entity for OrderStatus {
    const ENTITY: &'static str = "order_status";

    fn natural_key(&self) -> NaturalKey {
        NaturalKey::new(self.slug.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Coupon {
    pub site_id: SiteId,
    pub coupon_id: i64,
    pub code: String,
    /// Decimal amount as sent by the remote.
    pub amount: String,
    pub discount_type: DiscountType,
    #[serde(default)]
    pub usage_count: i64,
    #[serde(default)]
    pub date_modified: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DiscountType {
    Percent,
    FixedCart,
    FixedProduct,
}

impl Entity for Coupon {
    const ENTITY: &'static str = "coupon";

    fn natural_key(&self) -> NaturalKey {
        NaturalKey::from(self.coupon_id)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ShipmentTracking {
    pub site_id: SiteId,
    pub order_id: i64,
    pub tracking_id: String,
    pub tracking_number: String,
    #[serde(default)]
    pub tracking_provider: Option<String>,
    #[serde(default)]
    pub tracking_url: Option<String>,
    #[serde(default)]
    pub date_shipped: Option<NaiveDate>,
}

impl Entity for ShipmentTracking {
    const ENTITY: &'static str = "shipment_tracking";

    fn natural_key(&self) -> NaturalKey {
        NaturalKey::new(self.tracking_id.as_str())
    }
}

/// A tracking to attach to an order. `tracking_url` is set for custom
/// providers the remote has no URL template for.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NewShipmentTracking {
    pub tracking_provider: String,
    pub tracking_number: String,
    #[serde(default)]
    pub tracking_url: Option<String>,
    #[serde(default)]
    pub date_shipped: Option<NaiveDate>,
}
