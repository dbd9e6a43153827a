//! Reconciliation of remote result sets against derived storage.

use serde::{Deserialize, Serialize};
use storeflux_common::{NaturalKey, ScopeKey, StorageError};
use storeflux_engine::{reconcile, ReconcilePolicy, ReconcileSummary};
use storeflux_storage::{DerivedStorage, Entity, StorageManager, ViewStorage};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
struct Gateway {
    id: String,
    title: String,
    enabled: bool,
}

impl Entity for Gateway {
    const ENTITY: &'static str = "payment_gateway";

    fn natural_key(&self) -> NaturalKey {
        NaturalKey::new(self.id.clone())
    }
}

fn gateway(id: &str, title: &str) -> Gateway {
    Gateway {
        id: id.to_string(),
        title: title.to_string(),
        enabled: true,
    }
}

struct Harness {
    storage: StorageManager,
    view: ViewStorage,
    derived: DerivedStorage,
}

impl Harness {
    fn new() -> Self {
        let storage = StorageManager::in_memory();
        let view = storage.view_storage();
        let derived = storage.new_derived_storage().unwrap();
        Self {
            storage,
            view,
            derived,
        }
    }

    async fn apply(
        &self,
        scope: ScopeKey,
        remote: Vec<Gateway>,
        policy: ReconcilePolicy,
    ) -> Result<ReconcileSummary, StorageError> {
        self.derived
            .perform_and_save(move |session| reconcile(session, scope, &remote, policy))
            .await
            .map(|(summary, _)| summary)
    }

    fn ids(&self, scope: ScopeKey) -> Vec<String> {
        let mut ids: Vec<String> = self
            .view
            .records_typed::<Gateway>(scope)
            .unwrap()
            .into_iter()
            .map(|gateway| gateway.id)
            .collect();
        ids.sort();
        ids
    }
}

// =========================================================================
// Full replace
// =========================================================================

#[tokio::test]
async fn full_replace_mirrors_the_remote_set() {
    let harness = Harness::new();
    let scope = ScopeKey::site(42);

    harness
        .apply(scope, vec![gateway("bacs", "Direct bank transfer")], ReconcilePolicy::FullReplace)
        .await
        .unwrap();

    let summary = harness
        .apply(
            scope,
            vec![gateway("stripe", "Stripe"), gateway("paypal", "PayPal")],
            ReconcilePolicy::FullReplace,
        )
        .await
        .unwrap();

    assert_eq!(summary.inserted, 2);
    assert_eq!(summary.deleted, 1);
    assert_eq!(harness.ids(scope), vec!["paypal", "stripe"]);
}

#[tokio::test]
async fn applying_the_same_set_twice_changes_nothing() {
    let harness = Harness::new();
    let scope = ScopeKey::site(42);
    let remote = vec![gateway("stripe", "Stripe"), gateway("paypal", "PayPal")];

    harness
        .apply(scope, remote.clone(), ReconcilePolicy::FullReplace)
        .await
        .unwrap();
    let before = harness.view.snapshot();

    let summary = harness
        .apply(scope, remote, ReconcilePolicy::FullReplace)
        .await
        .unwrap();

    assert!(!summary.changed());
    assert_eq!(summary.unchanged, 2);
    assert_eq!(harness.view.snapshot(), before);
}

#[tokio::test]
async fn empty_remote_set_clears_the_scope() {
    let harness = Harness::new();
    let scope = ScopeKey::site(3);

    harness
        .apply(scope, vec![gateway("cod", "Cash on delivery")], ReconcilePolicy::FullReplace)
        .await
        .unwrap();
    let summary = harness
        .apply(scope, Vec::new(), ReconcilePolicy::FullReplace)
        .await
        .unwrap();

    assert_eq!(summary.deleted, 1);
    assert!(harness.ids(scope).is_empty());
}

#[tokio::test]
async fn full_replace_leaves_other_scopes_alone() {
    let harness = Harness::new();
    let ours = ScopeKey::site(42);
    let theirs = ScopeKey::site(7);
    let child = ScopeKey::with_parent(42, 1001);

    harness
        .apply(theirs, vec![gateway("bacs", "Bank")], ReconcilePolicy::FullReplace)
        .await
        .unwrap();
    harness
        .apply(child, vec![gateway("bacs", "Bank")], ReconcilePolicy::FullReplace)
        .await
        .unwrap();

    harness
        .apply(ours, vec![gateway("stripe", "Stripe")], ReconcilePolicy::FullReplace)
        .await
        .unwrap();
    harness
        .apply(ours, Vec::new(), ReconcilePolicy::FullReplace)
        .await
        .unwrap();

    assert!(harness.ids(ours).is_empty());
    assert_eq!(harness.ids(theirs), vec!["bacs"]);
    assert_eq!(harness.ids(child), vec!["bacs"]);
}

// =========================================================================
// Upsert semantics
// =========================================================================

#[tokio::test]
async fn matching_key_updates_in_place() {
    let harness = Harness::new();
    let scope = ScopeKey::site(42);

    harness
        .apply(scope, vec![gateway("stripe", "Stripe")], ReconcilePolicy::FullReplace)
        .await
        .unwrap();
    let key = NaturalKey::new("stripe");
    let original = harness
        .view
        .load(Gateway::ENTITY, scope, &key)
        .unwrap();

    let summary = harness
        .apply(
            scope,
            vec![gateway("stripe", "Stripe (test mode)")],
            ReconcilePolicy::AdditiveUpsert,
        )
        .await
        .unwrap();

    assert_eq!(summary.updated, 1);
    let updated = harness
        .view
        .load(Gateway::ENTITY, scope, &key)
        .unwrap();
    assert_eq!(updated.object_id, original.object_id);
    assert_eq!(updated.version, original.version + 1);
    assert_eq!(
        updated.decode::<Gateway>().unwrap().title,
        "Stripe (test mode)"
    );
    assert_eq!(harness.view.count_in_scope(Gateway::ENTITY, scope), 1);
}

#[tokio::test]
async fn additive_upsert_keeps_unmentioned_records() {
    let harness = Harness::new();
    let scope = ScopeKey::site(42);

    harness
        .apply(
            scope,
            vec![gateway("stripe", "Stripe"), gateway("paypal", "PayPal")],
            ReconcilePolicy::FullReplace,
        )
        .await
        .unwrap();
    let summary = harness
        .apply(scope, vec![gateway("bacs", "Bank")], ReconcilePolicy::AdditiveUpsert)
        .await
        .unwrap();

    assert_eq!(summary.deleted, 0);
    assert_eq!(harness.ids(scope), vec!["bacs", "paypal", "stripe"]);
}

#[tokio::test]
async fn duplicate_keys_in_one_result_set_resolve_last_write_wins() {
    let harness = Harness::new();
    let scope = ScopeKey::site(42);

    harness
        .apply(
            scope,
            vec![gateway("stripe", "First"), gateway("stripe", "Second")],
            ReconcilePolicy::FullReplace,
        )
        .await
        .unwrap();

    let stored = harness.view.records_typed::<Gateway>(scope).unwrap();
    assert_eq!(stored.len(), 1);
    assert_eq!(stored[0].title, "Second");
}

// =========================================================================
// Failure
// =========================================================================

#[tokio::test]
async fn rejected_record_aborts_the_whole_reconciliation() {
    let harness = Harness::new();
    let scope = ScopeKey::site(42);

    harness
        .apply(scope, vec![gateway("stripe", "Stripe")], ReconcilePolicy::FullReplace)
        .await
        .unwrap();

    let err = harness
        .apply(
            scope,
            vec![gateway("paypal", "PayPal"), gateway("", "Unnamed")],
            ReconcilePolicy::FullReplace,
        )
        .await
        .unwrap_err();

    assert!(matches!(err, StorageError::Rejected { .. }));
    assert_eq!(harness.ids(scope), vec!["stripe"]);
}

#[tokio::test]
async fn reset_storage_forgets_reconciled_records() {
    let harness = Harness::new();
    let scope = ScopeKey::site(42);

    harness
        .apply(scope, vec![gateway("stripe", "Stripe")], ReconcilePolicy::FullReplace)
        .await
        .unwrap();
    harness.storage.reset().unwrap();

    assert!(harness.view.is_empty());
    let summary = harness
        .apply(scope, vec![gateway("stripe", "Stripe")], ReconcilePolicy::FullReplace)
        .await
        .unwrap();
    assert_eq!(summary.inserted, 1);
}
