//! ShipmentStore: trackings are reconciled, added and deleted per order.

use futures::future::join_all;
use storeflux_common::{ScopeKey, SiteId, StoreError};
use storeflux_stores::testing::{new_tracking, tracking, StoreHarness};
use storeflux_stores::{NewShipmentTracking, ShipmentAction, ShipmentTracking};

async fn synchronize(harness: &StoreHarness, site_id: i64, order_id: i64) -> Result<(), StoreError> {
    harness
        .perform(|on_completion| {
            ShipmentAction::SynchronizeShipmentTrackingData {
                site_id: SiteId(site_id),
                order_id,
                on_completion,
            }
            .into()
        })
        .await
}

async fn add(
    harness: &StoreHarness,
    site_id: i64,
    order_id: i64,
    tracking: NewShipmentTracking,
) -> Result<ShipmentTracking, StoreError> {
    harness
        .perform(|on_completion| {
            ShipmentAction::AddTracking {
                site_id: SiteId(site_id),
                order_id,
                tracking,
                on_completion,
            }
            .into()
        })
        .await
}

async fn delete(
    harness: &StoreHarness,
    site_id: i64,
    order_id: i64,
    tracking_id: &str,
) -> Result<(), StoreError> {
    harness
        .perform(|on_completion| {
            ShipmentAction::DeleteTracking {
                site_id: SiteId(site_id),
                order_id,
                tracking_id: tracking_id.to_string(),
                on_completion,
            }
            .into()
        })
        .await
}

fn tracking_ids(harness: &StoreHarness, site_id: i64, order_id: i64) -> Vec<String> {
    harness
        .stored::<ShipmentTracking>(ScopeKey::with_parent(site_id, order_id))
        .into_iter()
        .map(|tracking| tracking.tracking_id)
        .collect()
}

#[tokio::test]
async fn synchronize_only_replaces_trackings_of_the_requested_order() {
    let harness = StoreHarness::new();
    harness
        .remote
        .set_trackings(42, 1001, vec![tracking(42, 1001, "a"), tracking(42, 1001, "b")]);
    harness
        .remote
        .set_trackings(42, 1002, vec![tracking(42, 1002, "c")]);
    synchronize(&harness, 42, 1001).await.unwrap();
    synchronize(&harness, 42, 1002).await.unwrap();

    harness
        .remote
        .set_trackings(42, 1001, vec![tracking(42, 1001, "b")]);
    synchronize(&harness, 42, 1001).await.unwrap();

    assert_eq!(tracking_ids(&harness, 42, 1001), vec!["b"]);
    assert_eq!(tracking_ids(&harness, 42, 1002), vec!["c"]);
}

#[tokio::test]
async fn empty_result_clears_one_order() {
    let harness = StoreHarness::new();
    harness
        .remote
        .set_trackings(42, 1001, vec![tracking(42, 1001, "a")]);
    harness
        .remote
        .set_trackings(7, 1001, vec![tracking(7, 1001, "a")]);
    synchronize(&harness, 42, 1001).await.unwrap();
    synchronize(&harness, 7, 1001).await.unwrap();

    harness.remote.set_trackings(42, 1001, Vec::new());
    synchronize(&harness, 42, 1001).await.unwrap();

    assert!(tracking_ids(&harness, 42, 1001).is_empty());
    assert_eq!(tracking_ids(&harness, 7, 1001), vec!["a"]);
}

#[tokio::test]
async fn concurrent_syncs_for_different_orders_all_land() {
    let harness = StoreHarness::new();
    for order_id in 1..=8 {
        harness.remote.set_trackings(
            42,
            order_id,
            vec![tracking(42, order_id, &format!("t{order_id}"))],
        );
    }

    let results = join_all((1..=8).map(|order_id| synchronize(&harness, 42, order_id))).await;

    assert!(results.iter().all(Result::is_ok));
    for order_id in 1..=8 {
        assert_eq!(
            tracking_ids(&harness, 42, order_id),
            vec![format!("t{order_id}")]
        );
    }
}

// =========================================================================
// Add / delete
// =========================================================================

#[tokio::test]
async fn added_tracking_joins_the_stored_ones_of_its_order() {
    let harness = StoreHarness::new();
    harness
        .remote
        .set_trackings(42, 1001, vec![tracking(42, 1001, "a")]);
    synchronize(&harness, 42, 1001).await.unwrap();

    let added = add(&harness, 42, 1001, new_tracking("UPS", "1Z999")).await.unwrap();

    assert_eq!(added.tracking_number, "1Z999");
    assert_eq!(added.tracking_provider.as_deref(), Some("UPS"));
    let mut expected = vec!["a".to_string(), added.tracking_id.clone()];
    expected.sort();
    assert_eq!(tracking_ids(&harness, 42, 1001), expected);
    assert!(tracking_ids(&harness, 42, 1002).is_empty());
}

#[tokio::test]
async fn custom_provider_details_come_from_the_request() {
    let harness = StoreHarness::new();
    let mut echo = tracking(42, 1001, "custom");
    echo.tracking_provider = None;
    harness.remote.echo_on_add_tracking(echo);

    let mut custom = new_tracking("Local Courier", "LC-7");
    custom.tracking_url = Some("https://courier.example/track/LC-7".to_string());
    let added = add(&harness, 42, 1001, custom).await.unwrap();

    assert_eq!(added.tracking_provider.as_deref(), Some("Local Courier"));
    assert_eq!(
        added.tracking_url.as_deref(),
        Some("https://courier.example/track/LC-7")
    );
    assert_eq!(
        harness.stored::<ShipmentTracking>(ScopeKey::with_parent(42, 1001)),
        vec![added]
    );
}

#[tokio::test]
async fn tracking_created_for_another_order_is_not_stored() {
    let harness = StoreHarness::new();
    harness
        .remote
        .echo_on_add_tracking(tracking(42, 2002, "elsewhere"));

    let err = add(&harness, 42, 1001, new_tracking("UPS", "1Z999"))
        .await
        .unwrap_err();

    assert!(matches!(err, StoreError::UnexpectedResult(_)), "got {err:?}");
    assert!(harness.view.is_empty());
}

#[tokio::test]
async fn delete_removes_only_the_named_tracking() {
    let harness = StoreHarness::new();
    harness
        .remote
        .set_trackings(42, 1001, vec![tracking(42, 1001, "a"), tracking(42, 1001, "b")]);
    synchronize(&harness, 42, 1001).await.unwrap();

    delete(&harness, 42, 1001, "a").await.unwrap();

    assert_eq!(tracking_ids(&harness, 42, 1001), vec!["b"]);
    assert_eq!(harness.remote.trackings(42, 1001), vec![tracking(42, 1001, "b")]);
}

#[tokio::test]
async fn failed_remote_delete_keeps_the_stored_tracking() {
    let harness = StoreHarness::new();
    harness
        .remote
        .set_trackings(42, 1001, vec![tracking(42, 1001, "a")]);
    synchronize(&harness, 42, 1001).await.unwrap();
    harness.remote.fail("delete_shipment_tracking");

    let err = delete(&harness, 42, 1001, "a").await.unwrap_err();

    assert!(matches!(err, StoreError::Remote(_)));
    assert_eq!(tracking_ids(&harness, 42, 1001), vec!["a"]);
}
