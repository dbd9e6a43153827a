//! Concrete stores and the wiring that registers them.

use std::sync::Arc;

use storeflux_engine::{ActionProcessor, Dispatcher, StoreContext};
use storeflux_storage::StorageManager;
use tokio::runtime::Handle;
use tracing::info;

use crate::actions::Action;
use crate::remote::{CouponsRemote, OrderStatusRemote, PaymentGatewaysRemote, ShipmentsRemote};

mod coupon;
mod order_status;
mod payment_gateway;
mod shipment;

pub use coupon::CouponStore;
pub use order_status::OrderStatusStore;
pub use payment_gateway::PaymentGatewayStore;
pub use shipment::ShipmentStore;

/// The remote collaborators handed to each store.
#[derive(Clone)]
pub struct Remotes {
    pub payment_gateways: Arc<dyn PaymentGatewaysRemote>,
    pub order_statuses: Arc<dyn OrderStatusRemote>,
    pub coupons: Arc<dyn CouponsRemote>,
    pub shipments: Arc<dyn ShipmentsRemote>,
}

impl Remotes {
    /// Use one implementation for every collaborator.
    pub fn shared<R>(remote: Arc<R>) -> Self
    where
        R: PaymentGatewaysRemote + OrderStatusRemote + CouponsRemote + ShipmentsRemote + 'static,
    {
        Self {
            payment_gateways: remote.clone(),
            order_statuses: remote.clone(),
            coupons: remote.clone(),
            shipments: remote,
        }
    }
}

/// Every store, registered with one dispatcher. The dispatcher only holds
/// the stores weakly, so this must be kept alive for as long as actions
/// should be handled.
pub struct Stores {
    pub payment_gateways: Arc<PaymentGatewayStore>,
    pub order_statuses: Arc<OrderStatusStore>,
    pub coupons: Arc<CouponStore>,
    pub shipments: Arc<ShipmentStore>,
}

impl Stores {
    pub fn register_all(
        dispatcher: &Dispatcher<Action>,
        storage: &StorageManager,
        runtime: Handle,
        remotes: Remotes,
    ) -> Self {
        let context = |name: &'static str| {
            StoreContext::new(name, storage.clone(), runtime.clone(), dispatcher.policy())
        };

        let stores = Self {
            payment_gateways: PaymentGatewayStore::new(
                context("payment_gateways"),
                remotes.payment_gateways,
            ),
            order_statuses: OrderStatusStore::new(context("order_statuses"), remotes.order_statuses),
            coupons: CouponStore::new(context("coupons"), remotes.coupons),
            shipments: ShipmentStore::new(context("shipments"), remotes.shipments),
        };

        stores.payment_gateways.register_supported_actions(dispatcher);
        stores.order_statuses.register_supported_actions(dispatcher);
        stores.coupons.register_supported_actions(dispatcher);
        stores.shipments.register_supported_actions(dispatcher);
        info!(kinds = dispatcher.registered_kinds().len(), "Stores registered");

        stores
    }

    /// Stop every store from receiving further actions.
    pub fn deregister_all(&self, dispatcher: &Dispatcher<Action>) {
        let processors: [Arc<dyn ActionProcessor<Action>>; 4] = [
            self.payment_gateways.clone(),
            self.order_statuses.clone(),
            self.coupons.clone(),
            self.shipments.clone(),
        ];
        for processor in &processors {
            dispatcher.unregister(processor);
        }
    }
}
