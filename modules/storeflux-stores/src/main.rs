use std::sync::Arc;

use anyhow::Result;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

use storeflux_common::{Config, ScopeKey};
use storeflux_engine::{Completion, Dispatcher, MisconfigurationPolicy, RuntimeContext};
use storeflux_storage::{Entity, StorageManager};
use storeflux_stores::{
    Action, Coupon, CouponAction, FixtureRemote, OrderStatus, OrderStatusAction, PaymentGateway,
    PaymentGatewayAction, Remotes, ShipmentAction, ShipmentTracking, Stores,
};

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env().add_directive("storeflux=info".parse()?))
        .init();

    info!("storeflux sync starting...");

    let config = Config::from_env();
    config.log_redacted();

    let storage = match &config.snapshot_path {
        Some(path) => StorageManager::open_json(path)?,
        None => StorageManager::in_memory(),
    };
    let dispatcher = Dispatcher::new(MisconfigurationPolicy::new(config.misconfiguration));
    let remote = Arc::new(FixtureRemote::new(&config.fixtures_dir));
    let stores = Stores::register_all(
        &dispatcher,
        &storage,
        tokio::runtime::Handle::current(),
        Remotes::shared(remote),
    );

    let site_id = config.site_id;

    let (on_completion, gateways) = Completion::channel(RuntimeContext::current());
    send(
        &dispatcher,
        PaymentGatewayAction::SynchronizePaymentGateways {
            site_id,
            on_completion,
        },
    );
    gateways.recv().await?;

    let (on_completion, statuses) = Completion::channel(RuntimeContext::current());
    send(
        &dispatcher,
        OrderStatusAction::RetrieveOrderStatuses {
            site_id,
            on_completion,
        },
    );
    let statuses = statuses.recv().await?;
    info!(count = statuses.len(), "Order statuses retrieved");

    let mut page_number = CouponAction::FIRST_PAGE;
    loop {
        let (on_completion, page) = Completion::channel(RuntimeContext::current());
        send(
            &dispatcher,
            CouponAction::SynchronizeCoupons {
                site_id,
                page_number,
                page_size: config.coupon_page_size,
                on_completion,
            },
        );
        if !page.recv().await? {
            break;
        }
        page_number += 1;
    }
    info!(pages = page_number, "Coupons synchronized");

    let (on_completion, coupons_enabled) = Completion::channel(RuntimeContext::current());
    send(
        &dispatcher,
        CouponAction::CheckCouponsEnabled {
            site_id,
            on_completion,
        },
    );
    match coupons_enabled.recv().await {
        Ok(enabled) => info!(enabled, "Coupons setting checked"),
        Err(err) => warn!(error = %err, "Could not check coupons setting"),
    }

    // Trackings are fetched for every order that has a recorded response.
    for order_id in tracked_orders(&config.fixtures_dir).await? {
        let (on_completion, trackings) = Completion::channel(RuntimeContext::current());
        send(
            &dispatcher,
            ShipmentAction::SynchronizeShipmentTrackingData {
                site_id,
                order_id,
                on_completion,
            },
        );
        trackings.recv().await?;
    }

    let view = storage.view_storage();
    let scope = ScopeKey::site(site_id);
    println!("site {site_id}");
    println!("  payment gateways:   {}", view.count_in_scope(PaymentGateway::ENTITY, scope));
    println!("  order statuses:     {}", view.count_in_scope(OrderStatus::ENTITY, scope));
    println!("  coupons:            {}", view.count_in_scope(Coupon::ENTITY, scope));
    println!("  shipment trackings: {}", view.count(ShipmentTracking::ENTITY));
    println!("  records total:      {}", view.len());

    stores.deregister_all(&dispatcher);
    Ok(())
}

fn send(dispatcher: &Dispatcher<Action>, action: impl Into<Action>) {
    // Unhandled actions have already been rejected through their completion.
    let _ = dispatcher.dispatch(action.into());
}

/// Order ids present in the recorded shipment tracking responses.
async fn tracked_orders(fixtures_dir: &std::path::Path) -> Result<Vec<i64>> {
    let path = fixtures_dir.join("shipment-trackings.json");
    let raw = match tokio::fs::read_to_string(&path).await {
        Ok(raw) => raw,
        Err(err) if err.kind() == std::io::ErrorKind::NotFound => return Ok(Vec::new()),
        Err(err) => return Err(err.into()),
    };

    let by_order: serde_json::Map<String, serde_json::Value> = serde_json::from_str(&raw)?;
    let mut orders = by_order
        .keys()
        .map(|key| key.parse::<i64>())
        .collect::<Result<Vec<_>, _>>()?;
    orders.sort_unstable();
    Ok(orders)
}
