//! CouponStore: paged synchronization, single-coupon writes with echo
//! checking, and the read-only settings check.

use storeflux_common::{NaturalKey, ScopeKey, SiteId, StoreError};
use storeflux_storage::Entity;
use storeflux_stores::testing::{coupon, StoreHarness};
use storeflux_stores::{Coupon, CouponAction};

async fn synchronize_page(
    harness: &StoreHarness,
    site_id: i64,
    page_number: u32,
    page_size: u32,
) -> Result<bool, StoreError> {
    harness
        .perform(|on_completion| {
            CouponAction::SynchronizeCoupons {
                site_id: SiteId(site_id),
                page_number,
                page_size,
                on_completion,
            }
            .into()
        })
        .await
}

async fn update(harness: &StoreHarness, coupon: Coupon) -> Result<Coupon, StoreError> {
    harness
        .perform(|on_completion| CouponAction::UpdateCoupon { coupon, on_completion }.into())
        .await
}

async fn create(harness: &StoreHarness, coupon: Coupon) -> Result<Coupon, StoreError> {
    harness
        .perform(|on_completion| CouponAction::CreateCoupon { coupon, on_completion }.into())
        .await
}

async fn delete(harness: &StoreHarness, site_id: i64, coupon_id: i64) -> Result<(), StoreError> {
    harness
        .perform(|on_completion| {
            CouponAction::DeleteCoupon {
                site_id: SiteId(site_id),
                coupon_id,
                on_completion,
            }
            .into()
        })
        .await
}

fn coupon_ids(harness: &StoreHarness, site_id: i64) -> Vec<i64> {
    let mut ids: Vec<i64> = harness
        .stored::<Coupon>(ScopeKey::site(site_id))
        .into_iter()
        .map(|coupon| coupon.coupon_id)
        .collect();
    ids.sort_unstable();
    ids
}

// =========================================================================
// Paging
// =========================================================================

#[tokio::test]
async fn pages_accumulate_and_report_whether_more_may_follow() {
    let harness = StoreHarness::new();
    harness.remote.set_coupons(
        42,
        vec![coupon(42, 1, "one"), coupon(42, 2, "two"), coupon(42, 3, "three")],
    );

    assert!(synchronize_page(&harness, 42, 1, 2).await.unwrap());
    assert_eq!(coupon_ids(&harness, 42), vec![1, 2]);

    assert!(!synchronize_page(&harness, 42, 2, 2).await.unwrap());
    assert_eq!(coupon_ids(&harness, 42), vec![1, 2, 3]);
}

#[tokio::test]
async fn first_page_drops_coupons_deleted_remotely() {
    let harness = StoreHarness::new();
    harness.remote.set_coupons(
        42,
        vec![coupon(42, 1, "one"), coupon(42, 2, "two"), coupon(42, 3, "three")],
    );
    synchronize_page(&harness, 42, 1, 25).await.unwrap();

    harness
        .remote
        .set_coupons(42, vec![coupon(42, 1, "one"), coupon(42, 3, "three")]);
    let has_next = synchronize_page(&harness, 42, 1, 25).await.unwrap();

    assert!(!has_next);
    assert_eq!(coupon_ids(&harness, 42), vec![1, 3]);
}

#[tokio::test]
async fn later_pages_never_drop_stored_coupons() {
    let harness = StoreHarness::new();
    harness
        .remote
        .set_coupons(42, vec![coupon(42, 1, "one"), coupon(42, 2, "two")]);
    synchronize_page(&harness, 42, 1, 25).await.unwrap();

    harness.remote.set_coupons(42, Vec::new());
    let has_next = synchronize_page(&harness, 42, 2, 25).await.unwrap();

    assert!(!has_next);
    assert_eq!(coupon_ids(&harness, 42), vec![1, 2]);
}

#[tokio::test]
async fn empty_page_size_is_rejected_and_keeps_stored_coupons() {
    let harness = StoreHarness::new();
    harness
        .remote
        .set_coupons(42, vec![coupon(42, 1, "one"), coupon(42, 2, "two")]);
    assert!(!synchronize_page(&harness, 42, 1, 10).await.unwrap());

    let err = synchronize_page(&harness, 42, 1, 0).await.unwrap_err();

    assert!(matches!(err, StoreError::Configuration(_)), "got {err:?}");
    assert_eq!(coupon_ids(&harness, 42), vec![1, 2]);
    assert_eq!(harness.remote.calls(), vec!["load_all_coupons"]);
}

#[tokio::test]
async fn page_zero_is_rejected() {
    let harness = StoreHarness::new();

    let err = synchronize_page(&harness, 42, 0, 25).await.unwrap_err();

    assert!(matches!(err, StoreError::Configuration(_)));
    assert!(harness.remote.calls().is_empty());
}

// =========================================================================
// Retrieve / update / create / delete
// =========================================================================

#[tokio::test]
async fn retrieve_refreshes_one_coupon() {
    let harness = StoreHarness::new();
    harness.remote.set_coupons(42, vec![coupon(42, 9, "nine")]);
    synchronize_page(&harness, 42, 1, 25).await.unwrap();

    let mut renamed = coupon(42, 9, "NINE");
    renamed.usage_count = 5;
    harness.remote.set_coupons(42, vec![renamed.clone()]);

    let retrieved = harness
        .perform(|on_completion| {
            CouponAction::RetrieveCoupon {
                site_id: SiteId(42),
                coupon_id: 9,
                on_completion,
            }
            .into()
        })
        .await
        .unwrap();

    assert_eq!(retrieved, renamed);
    assert_eq!(harness.stored::<Coupon>(ScopeKey::site(42)), vec![renamed]);
}

#[tokio::test]
async fn update_replaces_the_stored_coupon_and_keeps_the_others() {
    let harness = StoreHarness::new();
    harness
        .remote
        .set_coupons(42, vec![coupon(42, 1, "one"), coupon(42, 2, "two")]);
    synchronize_page(&harness, 42, 1, 25).await.unwrap();
    let original = harness
        .view
        .load(Coupon::ENTITY, ScopeKey::site(42), &NaturalKey::from(1_i64))
        .unwrap();

    let mut changed = coupon(42, 1, "ONE");
    changed.amount = "15.00".to_string();
    let updated = update(&harness, changed.clone()).await.unwrap();

    assert_eq!(updated, changed);
    let stored = harness
        .view
        .load(Coupon::ENTITY, ScopeKey::site(42), &NaturalKey::from(1_i64))
        .unwrap();
    assert_eq!(stored.object_id, original.object_id);
    assert_eq!(stored.decode::<Coupon>().unwrap(), changed);
    assert_eq!(coupon_ids(&harness, 42), vec![1, 2]);
}

#[tokio::test]
async fn failed_update_leaves_storage_alone() {
    let harness = StoreHarness::new();
    harness.remote.set_coupons(42, vec![coupon(42, 1, "one")]);
    synchronize_page(&harness, 42, 1, 25).await.unwrap();
    harness.remote.fail("update_coupon");

    let err = update(&harness, coupon(42, 1, "ONE")).await.unwrap_err();

    assert!(matches!(err, StoreError::Remote(_)));
    assert_eq!(
        harness.stored::<Coupon>(ScopeKey::site(42)),
        vec![coupon(42, 1, "one")]
    );
}

#[tokio::test]
async fn create_stores_the_coupon_under_its_assigned_id() {
    let harness = StoreHarness::new();
    harness.remote.set_coupons(42, vec![coupon(42, 1, "one")]);
    synchronize_page(&harness, 42, 1, 25).await.unwrap();

    let created = create(&harness, coupon(42, 0, "WELCOME")).await.unwrap();

    assert_ne!(created.coupon_id, 0);
    assert_eq!(created.code, "WELCOME");
    assert_eq!(coupon_ids(&harness, 42), vec![1, created.coupon_id]);
}

#[tokio::test]
async fn write_echo_for_another_site_is_rejected() {
    let harness = StoreHarness::new();
    harness.remote.echo_on_coupon_write(coupon(7, 1000, "WELCOME"));

    let err = create(&harness, coupon(42, 0, "WELCOME")).await.unwrap_err();
    assert!(matches!(err, StoreError::UnexpectedResult(_)), "got {err:?}");

    harness.remote.echo_on_coupon_write(coupon(42, 2, "two"));
    let err = update(&harness, coupon(42, 1, "one")).await.unwrap_err();
    assert!(matches!(err, StoreError::UnexpectedResult(_)), "got {err:?}");

    assert!(harness.view.is_empty());
}

#[tokio::test]
async fn delete_removes_the_stored_coupon() {
    let harness = StoreHarness::new();
    harness
        .remote
        .set_coupons(42, vec![coupon(42, 1, "one"), coupon(42, 2, "two")]);
    synchronize_page(&harness, 42, 1, 25).await.unwrap();

    delete(&harness, 42, 1).await.unwrap();

    assert_eq!(coupon_ids(&harness, 42), vec![2]);
}

#[tokio::test]
async fn unexpected_deletion_echo_is_an_error_and_keeps_storage() {
    let harness = StoreHarness::new();
    harness
        .remote
        .set_coupons(42, vec![coupon(42, 1, "one"), coupon(42, 2, "two")]);
    synchronize_page(&harness, 42, 1, 25).await.unwrap();

    harness.remote.echo_on_delete(coupon(42, 2, "two"));
    let err = delete(&harness, 42, 1).await.unwrap_err();

    assert!(matches!(err, StoreError::UnexpectedResult(_)), "got {err:?}");
    assert_eq!(coupon_ids(&harness, 42), vec![1, 2]);
}

#[tokio::test]
async fn echo_from_another_site_is_rejected() {
    let harness = StoreHarness::new();
    harness.remote.set_coupons(42, vec![coupon(42, 1, "one")]);
    synchronize_page(&harness, 42, 1, 25).await.unwrap();

    harness.remote.echo_on_delete(coupon(7, 1, "one"));
    let err = delete(&harness, 42, 1).await.unwrap_err();

    assert!(matches!(err, StoreError::UnexpectedResult(_)));
    assert_eq!(coupon_ids(&harness, 42), vec![1]);
}

// =========================================================================
// Read-only
// =========================================================================

#[tokio::test]
async fn coupons_enabled_check_does_not_touch_storage() {
    let harness = StoreHarness::new();
    harness.remote.set_coupons_enabled(42, true);

    let enabled = harness
        .perform(|on_completion| {
            CouponAction::CheckCouponsEnabled {
                site_id: SiteId(42),
                on_completion,
            }
            .into()
        })
        .await
        .unwrap();

    assert!(enabled);
    assert!(harness.view.is_empty());
}

#[tokio::test]
async fn coupons_enabled_failure_reaches_the_caller() {
    let harness = StoreHarness::new();
    harness.remote.fail("coupons_enabled");

    let err = harness
        .perform(|on_completion| {
            CouponAction::CheckCouponsEnabled {
                site_id: SiteId(42),
                on_completion,
            }
            .into()
        })
        .await
        .unwrap_err();

    assert!(err.to_string().contains("coupons_enabled failed"));
}
