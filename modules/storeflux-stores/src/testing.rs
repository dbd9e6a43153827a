// Test mocks for the stores.
//
// MockRemote implements all four remote traits from in-memory state that a
// test can change between dispatches:
// - set_* replaces what the next call returns
// - fail / recover toggle an error for one remote operation by name
// - echo_on_delete overrides the coupon the remote reports as deleted
// - echo_on_* overrides what a write answers with, for mismatch cases
//
// Plus StoreHarness, which wires every store to one dispatcher, an
// in-memory StorageManager and a foreground context, and dispatches actions
// through CompletionWatcher.

use std::collections::{HashMap, HashSet};
use std::sync::{Arc, Mutex};

use anyhow::{bail, Result};
use async_trait::async_trait;
use storeflux_common::{ScopeKey, SiteId, StoreResult};
use storeflux_engine::testing::CompletionWatcher;
use storeflux_engine::{
    Completion, DispatchOutcome, Dispatcher, ForegroundContext, MisconfigurationPolicy,
};
use storeflux_storage::{Entity, StorageManager, ViewStorage};

use crate::actions::Action;
use crate::model::{
    Coupon, DiscountType, NewShipmentTracking, OrderStatus, PaymentGateway, ShipmentTracking,
};
use crate::remote::{CouponsRemote, OrderStatusRemote, PaymentGatewaysRemote, ShipmentsRemote};
use crate::stores::{Remotes, Stores};

// ---------------------------------------------------------------------------
// Record builders
// ---------------------------------------------------------------------------

pub fn gateway(site_id: i64, gateway_id: &str, title: &str) -> PaymentGateway {
    PaymentGateway {
        site_id: SiteId(site_id),
        gateway_id: gateway_id.to_string(),
        title: title.to_string(),
        description: String::new(),
        enabled: true,
        features: vec!["products".to_string()],
    }
}

pub fn order_status(site_id: i64, slug: &str, name: &str, total: i64) -> OrderStatus {
    OrderStatus {
        site_id: SiteId(site_id),
        slug: slug.to_string(),
        name: name.to_string(),
        total,
    }
}

pub fn coupon(site_id: i64, coupon_id: i64, code: &str) -> Coupon {
    Coupon {
        site_id: SiteId(site_id),
        coupon_id,
        code: code.to_string(),
        amount: "10.00".to_string(),
        discount_type: DiscountType::Percent,
        usage_count: 0,
        date_modified: None,
    }
}

pub fn tracking(site_id: i64, order_id: i64, tracking_id: &str) -> ShipmentTracking {
    ShipmentTracking {
        site_id: SiteId(site_id),
        order_id,
        tracking_id: tracking_id.to_string(),
        tracking_number: format!("TRK-{tracking_id}"),
        tracking_provider: Some("USPS".to_string()),
        tracking_url: None,
        date_shipped: None,
    }
}

pub fn new_tracking(provider: &str, number: &str) -> NewShipmentTracking {
    NewShipmentTracking {
        tracking_provider: provider.to_string(),
        tracking_number: number.to_string(),
        tracking_url: None,
        date_shipped: None,
    }
}

// ---------------------------------------------------------------------------
// MockRemote
// ---------------------------------------------------------------------------

#[derive(Default)]
pub struct MockRemote {
    gateways: Mutex<HashMap<SiteId, Vec<PaymentGateway>>>,
    statuses: Mutex<HashMap<SiteId, Vec<OrderStatus>>>,
    coupons: Mutex<HashMap<SiteId, Vec<Coupon>>>,
    coupons_enabled: Mutex<HashMap<SiteId, bool>>,
    delete_echo: Mutex<Option<Coupon>>,
    coupon_write_echo: Mutex<Option<Coupon>>,
    gateway_update_echo: Mutex<Option<PaymentGateway>>,
    trackings: Mutex<HashMap<(SiteId, i64), Vec<ShipmentTracking>>>,
    tracking_add_echo: Mutex<Option<ShipmentTracking>>,
    next_id: Mutex<i64>,
    failing: Mutex<HashSet<String>>,
    calls: Mutex<Vec<String>>,
}

impl MockRemote {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn set_gateways(&self, site_id: i64, gateways: Vec<PaymentGateway>) {
        self.gateways.lock().unwrap().insert(SiteId(site_id), gateways);
    }

    pub fn set_order_statuses(&self, site_id: i64, statuses: Vec<OrderStatus>) {
        self.statuses.lock().unwrap().insert(SiteId(site_id), statuses);
    }

    pub fn set_coupons(&self, site_id: i64, coupons: Vec<Coupon>) {
        self.coupons.lock().unwrap().insert(SiteId(site_id), coupons);
    }

    pub fn set_coupons_enabled(&self, site_id: i64, enabled: bool) {
        self.coupons_enabled
            .lock()
            .unwrap()
            .insert(SiteId(site_id), enabled);
    }

    pub fn set_trackings(&self, site_id: i64, order_id: i64, trackings: Vec<ShipmentTracking>) {
        self.trackings
            .lock()
            .unwrap()
            .insert((SiteId(site_id), order_id), trackings);
    }

    /// Report `coupon` as deleted regardless of what was asked for.
    pub fn echo_on_delete(&self, coupon: Coupon) {
        *self.delete_echo.lock().unwrap() = Some(coupon);
    }

    /// Answer coupon updates and creations with `coupon`.
    pub fn echo_on_coupon_write(&self, coupon: Coupon) {
        *self.coupon_write_echo.lock().unwrap() = Some(coupon);
    }

    pub fn echo_on_gateway_update(&self, gateway: PaymentGateway) {
        *self.gateway_update_echo.lock().unwrap() = Some(gateway);
    }

    pub fn echo_on_add_tracking(&self, tracking: ShipmentTracking) {
        *self.tracking_add_echo.lock().unwrap() = Some(tracking);
    }

    /// Trackings the remote currently holds for an order.
    pub fn trackings(&self, site_id: i64, order_id: i64) -> Vec<ShipmentTracking> {
        self.trackings
            .lock()
            .unwrap()
            .get(&(SiteId(site_id), order_id))
            .cloned()
            .unwrap_or_default()
    }

    /// Make `operation` (a remote trait method name) fail until recovered.
    pub fn fail(&self, operation: &str) {
        self.failing.lock().unwrap().insert(operation.to_string());
    }

    pub fn recover(&self, operation: &str) {
        self.failing.lock().unwrap().remove(operation);
    }

    /// Remote operations called so far, in order.
    pub fn calls(&self) -> Vec<String> {
        self.calls.lock().unwrap().clone()
    }

    fn call(&self, operation: &str) -> Result<()> {
        self.calls.lock().unwrap().push(operation.to_string());
        if self.failing.lock().unwrap().contains(operation) {
            bail!("MockRemote: {operation} failed");
        }
        Ok(())
    }

    /// Remote-assigned identifiers start at 1000.
    fn assign_id(&self) -> i64 {
        let mut next = self.next_id.lock().unwrap();
        *next += 1;
        999 + *next
    }
}

#[async_trait]
impl PaymentGatewaysRemote for MockRemote {
    async fn load_all_payment_gateways(&self, site_id: SiteId) -> Result<Vec<PaymentGateway>> {
        self.call("load_all_payment_gateways")?;
        Ok(self
            .gateways
            .lock()
            .unwrap()
            .get(&site_id)
            .cloned()
            .unwrap_or_default())
    }

    async fn load_payment_gateway(
        &self,
        site_id: SiteId,
        gateway_id: &str,
    ) -> Result<PaymentGateway> {
        self.call("load_payment_gateway")?;
        let gateways = self.gateways.lock().unwrap();
        match gateways
            .get(&site_id)
            .and_then(|all| all.iter().find(|gateway| gateway.gateway_id == gateway_id))
        {
            Some(gateway) => Ok(gateway.clone()),
            None => bail!("MockRemote: no gateway {gateway_id} for site {site_id}"),
        }
    }

    async fn update_payment_gateway(&self, gateway: PaymentGateway) -> Result<PaymentGateway> {
        self.call("update_payment_gateway")?;
        Ok(self
            .gateway_update_echo
            .lock()
            .unwrap()
            .clone()
            .unwrap_or(gateway))
    }
}

#[async_trait]
impl OrderStatusRemote for MockRemote {
    async fn load_order_statuses(&self, site_id: SiteId) -> Result<Vec<OrderStatus>> {
        self.call("load_order_statuses")?;
        Ok(self
            .statuses
            .lock()
            .unwrap()
            .get(&site_id)
            .cloned()
            .unwrap_or_default())
    }
}

#[async_trait]
impl CouponsRemote for MockRemote {
    async fn load_all_coupons(
        &self,
        site_id: SiteId,
        page_number: u32,
        page_size: u32,
    ) -> Result<Vec<Coupon>> {
        self.call("load_all_coupons")?;
        let skip = page_number.saturating_sub(1) as usize * page_size as usize;
        Ok(self
            .coupons
            .lock()
            .unwrap()
            .get(&site_id)
            .map(|all| {
                all.iter()
                    .skip(skip)
                    .take(page_size as usize)
                    .cloned()
                    .collect()
            })
            .unwrap_or_default())
    }

    async fn load_coupon(&self, site_id: SiteId, coupon_id: i64) -> Result<Coupon> {
        self.call("load_coupon")?;
        let coupons = self.coupons.lock().unwrap();
        match coupons
            .get(&site_id)
            .and_then(|all| all.iter().find(|coupon| coupon.coupon_id == coupon_id))
        {
            Some(coupon) => Ok(coupon.clone()),
            None => bail!("MockRemote: no coupon {coupon_id} for site {site_id}"),
        }
    }

    async fn delete_coupon(&self, site_id: SiteId, coupon_id: i64) -> Result<Coupon> {
        self.call("delete_coupon")?;
        if let Some(echo) = self.delete_echo.lock().unwrap().clone() {
            return Ok(echo);
        }

        let mut coupons = self.coupons.lock().unwrap();
        let Some(all) = coupons.get_mut(&site_id) else {
            bail!("MockRemote: no coupons for site {site_id}");
        };
        match all.iter().position(|coupon| coupon.coupon_id == coupon_id) {
            Some(index) => Ok(all.remove(index)),
            None => bail!("MockRemote: no coupon {coupon_id} for site {site_id}"),
        }
    }

    async fn update_coupon(&self, coupon: Coupon) -> Result<Coupon> {
        self.call("update_coupon")?;
        if let Some(echo) = self.coupon_write_echo.lock().unwrap().clone() {
            return Ok(echo);
        }

        let mut coupons = self.coupons.lock().unwrap();
        let existing = coupons.get_mut(&coupon.site_id).and_then(|all| {
            all.iter_mut()
                .find(|stored| stored.coupon_id == coupon.coupon_id)
        });
        match existing {
            Some(stored) => {
                *stored = coupon.clone();
                Ok(coupon)
            }
            None => bail!(
                "MockRemote: no coupon {} for site {}",
                coupon.coupon_id,
                coupon.site_id
            ),
        }
    }

    async fn create_coupon(&self, mut coupon: Coupon) -> Result<Coupon> {
        self.call("create_coupon")?;
        if let Some(echo) = self.coupon_write_echo.lock().unwrap().clone() {
            return Ok(echo);
        }

        coupon.coupon_id = self.assign_id();
        self.coupons
            .lock()
            .unwrap()
            .entry(coupon.site_id)
            .or_default()
            .push(coupon.clone());
        Ok(coupon)
    }

    async fn coupons_enabled(&self, site_id: SiteId) -> Result<bool> {
        self.call("coupons_enabled")?;
        Ok(self
            .coupons_enabled
            .lock()
            .unwrap()
            .get(&site_id)
            .copied()
            .unwrap_or(false))
    }
}

#[async_trait]
impl ShipmentsRemote for MockRemote {
    async fn load_shipment_trackings(
        &self,
        site_id: SiteId,
        order_id: i64,
    ) -> Result<Vec<ShipmentTracking>> {
        self.call("load_shipment_trackings")?;
        Ok(self
            .trackings
            .lock()
            .unwrap()
            .get(&(site_id, order_id))
            .cloned()
            .unwrap_or_default())
    }

    async fn create_shipment_tracking(
        &self,
        site_id: SiteId,
        order_id: i64,
        tracking: NewShipmentTracking,
    ) -> Result<ShipmentTracking> {
        self.call("create_shipment_tracking")?;
        if let Some(echo) = self.tracking_add_echo.lock().unwrap().clone() {
            return Ok(echo);
        }

        let created = ShipmentTracking {
            site_id,
            order_id,
            tracking_id: format!("trk-{}", self.assign_id()),
            tracking_number: tracking.tracking_number,
            tracking_provider: Some(tracking.tracking_provider),
            tracking_url: tracking.tracking_url,
            date_shipped: tracking.date_shipped,
        };
        self.trackings
            .lock()
            .unwrap()
            .entry((site_id, order_id))
            .or_default()
            .push(created.clone());
        Ok(created)
    }

    async fn delete_shipment_tracking(
        &self,
        site_id: SiteId,
        order_id: i64,
        tracking_id: &str,
    ) -> Result<()> {
        self.call("delete_shipment_tracking")?;
        let mut trackings = self.trackings.lock().unwrap();
        let Some(all) = trackings.get_mut(&(site_id, order_id)) else {
            bail!("MockRemote: no trackings for order {order_id} of site {site_id}");
        };
        match all.iter().position(|tracking| tracking.tracking_id == tracking_id) {
            Some(index) => {
                all.remove(index);
                Ok(())
            }
            None => bail!("MockRemote: no tracking {tracking_id} for order {order_id}"),
        }
    }
}

// ---------------------------------------------------------------------------
// StoreHarness
// ---------------------------------------------------------------------------

/// Every store registered against one [`MockRemote`], with a foreground
/// context standing in for the UI thread.
pub struct StoreHarness {
    pub dispatcher: Dispatcher<Action>,
    pub storage: StorageManager,
    pub view: ViewStorage,
    pub remote: Arc<MockRemote>,
    pub foreground: Arc<ForegroundContext>,
    pub stores: Stores,
}

impl StoreHarness {
    /// Must be called from within a tokio runtime.
    pub fn new() -> Self {
        Self::with_storage(StorageManager::in_memory())
    }

    pub fn with_storage(storage: StorageManager) -> Self {
        let dispatcher = Dispatcher::new(MisconfigurationPolicy::reject());
        let remote = MockRemote::new();
        let stores = Stores::register_all(
            &dispatcher,
            &storage,
            tokio::runtime::Handle::current(),
            Remotes::shared(remote.clone()),
        );

        Self {
            view: storage.view_storage(),
            foreground: ForegroundContext::spawn("test-foreground").unwrap(),
            dispatcher,
            storage,
            remote,
            stores,
        }
    }

    /// Dispatch the action built by `make` and wait for its completion on
    /// the foreground context.
    pub async fn perform<T, F>(&self, make: F) -> StoreResult<T>
    where
        T: Send + 'static,
        F: FnOnce(Completion<T>) -> Action,
    {
        let (on_completion, watcher) = CompletionWatcher::on(&self.foreground);
        let outcome = self.dispatcher.dispatch(make(on_completion));
        assert_eq!(outcome, DispatchOutcome::Delivered);
        watcher.observe_on_foreground().await
    }

    /// Stored records of `E` under `scope`, sorted by natural key.
    pub fn stored<E: Entity>(&self, scope: ScopeKey) -> Vec<E> {
        let mut records = self.view.records(E::ENTITY, scope);
        records.sort_by(|a, b| a.key.cmp(&b.key));
        records
            .iter()
            .map(|record| record.decode::<E>().unwrap())
            .collect()
    }
}
