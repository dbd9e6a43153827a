//! Remote collaborators the stores call into.
//!
//! Stores depend only on these traits; transport and authentication live in
//! the implementations.

use anyhow::Result;
use async_trait::async_trait;
use storeflux_common::SiteId;

use crate::model::{Coupon, NewShipmentTracking, OrderStatus, PaymentGateway, ShipmentTracking};

#[async_trait]
pub trait PaymentGatewaysRemote: Send + Sync {
    /// Every payment gateway configured for the site.
    async fn load_all_payment_gateways(&self, site_id: SiteId) -> Result<Vec<PaymentGateway>>;

    async fn load_payment_gateway(&self, site_id: SiteId, gateway_id: &str)
        -> Result<PaymentGateway>;

    /// Push `gateway` and return the remote's view of it.
    async fn update_payment_gateway(&self, gateway: PaymentGateway) -> Result<PaymentGateway>;
}

#[async_trait]
pub trait OrderStatusRemote: Send + Sync {
    async fn load_order_statuses(&self, site_id: SiteId) -> Result<Vec<OrderStatus>>;
}

#[async_trait]
pub trait CouponsRemote: Send + Sync {
    /// One page of coupons. Pages are numbered from 1.
    async fn load_all_coupons(
        &self,
        site_id: SiteId,
        page_number: u32,
        page_size: u32,
    ) -> Result<Vec<Coupon>>;

    async fn load_coupon(&self, site_id: SiteId, coupon_id: i64) -> Result<Coupon>;

    /// Delete a coupon. Returns the coupon the remote reports as deleted.
    async fn delete_coupon(&self, site_id: SiteId, coupon_id: i64) -> Result<Coupon>;

    async fn update_coupon(&self, coupon: Coupon) -> Result<Coupon>;

    /// Create `coupon`. The returned copy carries the assigned `coupon_id`.
    async fn create_coupon(&self, coupon: Coupon) -> Result<Coupon>;

    async fn coupons_enabled(&self, site_id: SiteId) -> Result<bool>;
}

#[async_trait]
pub trait ShipmentsRemote: Send + Sync {
    async fn load_shipment_trackings(
        &self,
        site_id: SiteId,
        order_id: i64,
    ) -> Result<Vec<ShipmentTracking>>;

    async fn create_shipment_tracking(
        &self,
        site_id: SiteId,
        order_id: i64,
        tracking: NewShipmentTracking,
    ) -> Result<ShipmentTracking>;

    async fn delete_shipment_tracking(
        &self,
        site_id: SiteId,
        order_id: i64,
        tracking_id: &str,
    ) -> Result<()>;
}
