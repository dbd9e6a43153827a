//! The action families the stores handle.
//!
//! Every variant carries its inputs and exactly one [`Completion`].

use storeflux_common::{SiteId, StoreError};
use storeflux_engine::{ActionLike, Completion};

use crate::model::{Coupon, NewShipmentTracking, OrderStatus, PaymentGateway, ShipmentTracking};

/// One tag per action family. A store registers for exactly one.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ActionKind {
    PaymentGateway,
    OrderStatus,
    Coupon,
    Shipment,
}

#[derive(Debug)]
pub enum Action {
    PaymentGateway(PaymentGatewayAction),
    OrderStatus(OrderStatusAction),
    Coupon(CouponAction),
    Shipment(ShipmentAction),
}

impl ActionLike for Action {
    type Kind = ActionKind;

    fn kind(&self) -> ActionKind {
        match self {
            Action::PaymentGateway(_) => ActionKind::PaymentGateway,
            Action::OrderStatus(_) => ActionKind::OrderStatus,
            Action::Coupon(_) => ActionKind::Coupon,
            Action::Shipment(_) => ActionKind::Shipment,
        }
    }

    fn reject(self, error: StoreError) {
        match self {
            Action::PaymentGateway(action) => action.reject(error),
            Action::OrderStatus(action) => action.reject(error),
            Action::Coupon(action) => action.reject(error),
            Action::Shipment(action) => action.reject(error),
        }
    }
}

// ---------------------------------------------------------------------------
// Payment gateways
// ---------------------------------------------------------------------------

#[derive(Debug)]
pub enum PaymentGatewayAction {
    /// Replace the stored gateways of `site_id` with the remote set.
    SynchronizePaymentGateways {
        site_id: SiteId,
        on_completion: Completion<()>,
    },
    UpdatePaymentGateway {
        gateway: PaymentGateway,
        on_completion: Completion<PaymentGateway>,
    },
    RetrievePaymentGateway {
        site_id: SiteId,
        gateway_id: String,
        on_completion: Completion<PaymentGateway>,
    },
}

impl PaymentGatewayAction {
    fn reject(self, error: StoreError) {
        match self {
            Self::SynchronizePaymentGateways { on_completion, .. } => on_completion.fail(error),
            Self::UpdatePaymentGateway { on_completion, .. } => on_completion.fail(error),
            Self::RetrievePaymentGateway { on_completion, .. } => on_completion.fail(error),
        }
    }
}

impl From<PaymentGatewayAction> for Action {
    fn from(action: PaymentGatewayAction) -> Self {
        Action::PaymentGateway(action)
    }
}

// ---------------------------------------------------------------------------
// Order statuses
// ---------------------------------------------------------------------------

#[derive(Debug)]
pub enum OrderStatusAction {
    /// Replace the stored statuses of `site_id` and return the remote set.
    RetrieveOrderStatuses {
        site_id: SiteId,
        on_completion: Completion<Vec<OrderStatus>>,
    },
    /// Forget every stored status, for every site.
    ResetStoredOrderStatuses { on_completion: Completion<()> },
}

impl OrderStatusAction {
    fn reject(self, error: StoreError) {
        match self {
            Self::RetrieveOrderStatuses { on_completion, .. } => on_completion.fail(error),
            Self::ResetStoredOrderStatuses { on_completion } => on_completion.fail(error),
        }
    }
}

impl From<OrderStatusAction> for Action {
    fn from(action: OrderStatusAction) -> Self {
        Action::OrderStatus(action)
    }
}

// ---------------------------------------------------------------------------
// Coupons
// ---------------------------------------------------------------------------

#[derive(Debug)]
pub enum CouponAction {
    /// Fetch one page. The first page replaces what is stored for the site;
    /// later pages are added. Resolves with whether another page may exist.
    SynchronizeCoupons {
        site_id: SiteId,
        page_number: u32,
        page_size: u32,
        on_completion: Completion<bool>,
    },
    RetrieveCoupon {
        site_id: SiteId,
        coupon_id: i64,
        on_completion: Completion<Coupon>,
    },
    DeleteCoupon {
        site_id: SiteId,
        coupon_id: i64,
        on_completion: Completion<()>,
    },
    /// Push changes to an existing coupon. Resolves with the remote's copy.
    UpdateCoupon {
        coupon: Coupon,
        on_completion: Completion<Coupon>,
    },
    /// Create `coupon` remotely; its `coupon_id` is assigned by the remote.
    CreateCoupon {
        coupon: Coupon,
        on_completion: Completion<Coupon>,
    },
    /// Read-only: whether coupons are enabled on the site.
    CheckCouponsEnabled {
        site_id: SiteId,
        on_completion: Completion<bool>,
    },
}

impl CouponAction {
    /// First page number accepted by [`CouponAction::SynchronizeCoupons`].
    pub const FIRST_PAGE: u32 = 1;

    fn reject(self, error: StoreError) {
        match self {
            Self::SynchronizeCoupons { on_completion, .. } => on_completion.fail(error),
            Self::RetrieveCoupon { on_completion, .. } => on_completion.fail(error),
            Self::DeleteCoupon { on_completion, .. } => on_completion.fail(error),
            Self::UpdateCoupon { on_completion, .. } => on_completion.fail(error),
            Self::CreateCoupon { on_completion, .. } => on_completion.fail(error),
            Self::CheckCouponsEnabled { on_completion, .. } => on_completion.fail(error),
        }
    }
}

impl From<CouponAction> for Action {
    fn from(action: CouponAction) -> Self {
        Action::Coupon(action)
    }
}

// ---------------------------------------------------------------------------
// Shipment tracking
// ---------------------------------------------------------------------------

#[derive(Debug)]
pub enum ShipmentAction {
    /// Replace the stored trackings of one order with the remote set.
    SynchronizeShipmentTrackingData {
        site_id: SiteId,
        order_id: i64,
        on_completion: Completion<()>,
    },
    /// Attach a tracking to an order and store the remote's copy.
    AddTracking {
        site_id: SiteId,
        order_id: i64,
        tracking: NewShipmentTracking,
        on_completion: Completion<ShipmentTracking>,
    },
    DeleteTracking {
        site_id: SiteId,
        order_id: i64,
        tracking_id: String,
        on_completion: Completion<()>,
    },
}

impl ShipmentAction {
    fn reject(self, error: StoreError) {
        match self {
            Self::SynchronizeShipmentTrackingData { on_completion, .. } => on_completion.fail(error),
            Self::AddTracking { on_completion, .. } => on_completion.fail(error),
            Self::DeleteTracking { on_completion, .. } => on_completion.fail(error),
        }
    }
}

impl From<ShipmentAction> for Action {
    fn from(action: ShipmentAction) -> Self {
        Action::Shipment(action)
    }
}
