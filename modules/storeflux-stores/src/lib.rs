//! Concrete action families and the stores that handle them.
//!
//! Each store registers with a [`storeflux_engine::Dispatcher`] for one
//! [`ActionKind`], calls its remote collaborator off the dispatching thread,
//! reconciles the result into derived storage and resolves the action's
//! completion once the commit is visible.

pub mod actions;
pub mod fixtures;
pub mod model;
pub mod remote;
pub mod stores;
#[cfg(any(test, feature = "test-support"))]
pub mod testing;

pub use actions::{
    Action, ActionKind, CouponAction, OrderStatusAction, PaymentGatewayAction, ShipmentAction,
};
pub use fixtures::FixtureRemote;
pub use model::{
    Coupon, DiscountType, NewShipmentTracking, OrderStatus, PaymentGateway, ShipmentTracking,
};
pub use remote::{CouponsRemote, OrderStatusRemote, PaymentGatewaysRemote, ShipmentsRemote};
pub use stores::{CouponStore, OrderStatusStore, PaymentGatewayStore, Remotes, ShipmentStore, Stores};
