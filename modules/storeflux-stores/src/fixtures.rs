//! Remote collaborators that replay recorded JSON responses from disk.
//!
//! Fixture records omit the identifiers the request already carries
//! (`site_id`, and `order_id` for shipment trackings); they are filled in
//! from the request before decoding, the way a network mapper would.
//!
//! Layout of the fixtures directory:
//!
//! | file | shape |
//! |---|---|
//! | `payment-gateways.json` | array of gateways |
//! | `order-statuses.json` | array of statuses |
//! | `coupons.json` | array of coupons, paged in order |
//! | `shipment-trackings.json` | object of order id to array of trackings |
//! | `settings.json` | `{ "coupons_enabled": bool }` |

use std::path::{Path, PathBuf};

use anyhow::{anyhow, Context, Result};
use async_trait::async_trait;
use serde::de::DeserializeOwned;
use serde_json::{json, Value};
use storeflux_common::SiteId;
use tracing::debug;

use crate::model::{Coupon, NewShipmentTracking, OrderStatus, PaymentGateway, ShipmentTracking};
use crate::remote::{CouponsRemote, OrderStatusRemote, PaymentGatewaysRemote, ShipmentsRemote};

#[derive(Debug, Clone)]
pub struct FixtureRemote {
    dir: PathBuf,
}

impl FixtureRemote {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    async fn read(&self, file: &str) -> Result<Value> {
        let path = self.dir.join(file);
        let raw = tokio::fs::read_to_string(&path)
            .await
            .with_context(|| format!("Failed to read fixture {}", path.display()))?;
        debug!(fixture = file, bytes = raw.len(), "Loaded fixture");
        serde_json::from_str(&raw).with_context(|| format!("Malformed fixture {}", path.display()))
    }

    async fn records<T: DeserializeOwned>(&self, file: &str, site_id: SiteId) -> Result<Vec<T>> {
        let value = self.read(file).await?;
        decode_list(value, &[("site_id", json!(site_id))])
            .with_context(|| format!("Unexpected record shape in {file}"))
    }
}

fn decode_list<T: DeserializeOwned>(value: Value, stamp: &[(&str, Value)]) -> Result<Vec<T>> {
    let Value::Array(items) = value else {
        return Err(anyhow!("expected a JSON array"));
    };

    items
        .into_iter()
        .map(|mut item| {
            if let Value::Object(fields) = &mut item {
                for (name, value) in stamp {
                    fields.insert((*name).to_string(), value.clone());
                }
            }
            serde_json::from_value(item).map_err(anyhow::Error::from)
        })
        .collect()
}

#[async_trait]
impl PaymentGatewaysRemote for FixtureRemote {
    async fn load_all_payment_gateways(&self, site_id: SiteId) -> Result<Vec<PaymentGateway>> {
        self.records("payment-gateways.json", site_id).await
    }

    async fn load_payment_gateway(
        &self,
        site_id: SiteId,
        gateway_id: &str,
    ) -> Result<PaymentGateway> {
        self.load_all_payment_gateways(site_id)
            .await?
            .into_iter()
            .find(|gateway| gateway.gateway_id == gateway_id)
            .ok_or_else(|| anyhow!("No payment gateway `{gateway_id}` for site {site_id}"))
    }

    async fn update_payment_gateway(&self, gateway: PaymentGateway) -> Result<PaymentGateway> {
        // Recorded responses are read-only; the remote echoes the update.
        Ok(gateway)
    }
}

#[async_trait]
impl OrderStatusRemote for FixtureRemote {
    async fn load_order_statuses(&self, site_id: SiteId) -> Result<Vec<OrderStatus>> {
        self.records("order-statuses.json", site_id).await
    }
}

#[async_trait]
impl CouponsRemote for FixtureRemote {
    async fn load_all_coupons(
        &self,
        site_id: SiteId,
        page_number: u32,
        page_size: u32,
    ) -> Result<Vec<Coupon>> {
        let coupons: Vec<Coupon> = self.records("coupons.json", site_id).await?;
        let skip = page_number.saturating_sub(1) as usize * page_size as usize;
        Ok(coupons
            .into_iter()
            .skip(skip)
            .take(page_size as usize)
            .collect())
    }

    async fn load_coupon(&self, site_id: SiteId, coupon_id: i64) -> Result<Coupon> {
        let coupons: Vec<Coupon> = self.records("coupons.json", site_id).await?;
        coupons
            .into_iter()
            .find(|coupon| coupon.coupon_id == coupon_id)
            .ok_or_else(|| anyhow!("No coupon {coupon_id} for site {site_id}"))
    }

    async fn delete_coupon(&self, site_id: SiteId, coupon_id: i64) -> Result<Coupon> {
        self.load_coupon(site_id, coupon_id).await
    }

    async fn update_coupon(&self, coupon: Coupon) -> Result<Coupon> {
        self.load_coupon(coupon.site_id, coupon.coupon_id).await?;
        Ok(coupon)
    }

    /// Assigns the id after the highest recorded one.
    async fn create_coupon(&self, mut coupon: Coupon) -> Result<Coupon> {
        let coupons: Vec<Coupon> = self.records("coupons.json", coupon.site_id).await?;
        coupon.coupon_id = coupons.iter().map(|c| c.coupon_id).max().unwrap_or(0) + 1;
        Ok(coupon)
    }

    async fn coupons_enabled(&self, _site_id: SiteId) -> Result<bool> {
        let settings = self.read("settings.json").await?;
        settings
            .get("coupons_enabled")
            .and_then(Value::as_bool)
            .ok_or_else(|| anyhow!("settings.json has no boolean `coupons_enabled`"))
    }
}

#[async_trait]
impl ShipmentsRemote for FixtureRemote {
    async fn load_shipment_trackings(
        &self,
        site_id: SiteId,
        order_id: i64,
    ) -> Result<Vec<ShipmentTracking>> {
        let by_order = self.read("shipment-trackings.json").await?;
        let Some(trackings) = by_order.get(order_id.to_string()) else {
            return Ok(Vec::new());
        };

        decode_list(
            trackings.clone(),
            &[("site_id", json!(site_id)), ("order_id", json!(order_id))],
        )
        .context("Unexpected record shape in shipment-trackings.json")
    }

    async fn create_shipment_tracking(
        &self,
        site_id: SiteId,
        order_id: i64,
        tracking: NewShipmentTracking,
    ) -> Result<ShipmentTracking> {
        let recorded = self.load_shipment_trackings(site_id, order_id).await?;
        Ok(ShipmentTracking {
            site_id,
            order_id,
            tracking_id: format!("{order_id}-{}", recorded.len() + 1),
            tracking_number: tracking.tracking_number,
            tracking_provider: Some(tracking.tracking_provider),
            tracking_url: tracking.tracking_url,
            date_shipped: tracking.date_shipped,
        })
    }

    async fn delete_shipment_tracking(
        &self,
        site_id: SiteId,
        order_id: i64,
        tracking_id: &str,
    ) -> Result<()> {
        let recorded = self.load_shipment_trackings(site_id, order_id).await?;
        if recorded.iter().any(|tracking| tracking.tracking_id == tracking_id) {
            Ok(())
        } else {
            Err(anyhow!("No tracking `{tracking_id}` for order {order_id}"))
        }
    }
}
