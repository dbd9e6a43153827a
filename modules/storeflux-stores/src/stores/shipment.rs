use std::sync::Arc;

use storeflux_common::{NaturalKey, ScopeKey, SiteId, StoreError};
use storeflux_engine::{
    reconcile, ActionProcessor, Completion, Dispatcher, ReconcilePolicy, StoreContext,
};
use storeflux_storage::Entity;
use tracing::error;

use crate::actions::{Action, ActionKind, ShipmentAction};
use crate::model::{NewShipmentTracking, ShipmentTracking};
use crate::remote::ShipmentsRemote;

/// Shipment trackings are stored per order: the scope of every tracking is
/// its site plus the order it belongs to.
pub struct ShipmentStore {
    context: StoreContext,
    remote: Arc<dyn ShipmentsRemote>,
}

impl ShipmentStore {
    pub fn new(context: StoreContext, remote: Arc<dyn ShipmentsRemote>) -> Arc<Self> {
        Arc::new(Self { context, remote })
    }

    pub fn register_supported_actions(self: &Arc<Self>, dispatcher: &Dispatcher<Action>) {
        dispatcher.register(self.clone(), ActionKind::Shipment);
    }

    fn synchronize_shipment_tracking_data(
        &self,
        site_id: SiteId,
        order_id: i64,
        on_completion: Completion<()>,
    ) {
        let context = self.context.clone();
        let remote = self.remote.clone();
        self.context.resolve_with(on_completion, async move {
            let trackings = remote
                .load_shipment_trackings(site_id, order_id)
                .await
                .map_err(|err| context.remote_failed("synchronize_shipment_tracking_data", err))?;

            context
                .merge("synchronize_shipment_tracking_data", move |session| {
                    reconcile(
                        session,
                        ScopeKey::with_parent(site_id, order_id),
                        &trackings,
                        ReconcilePolicy::FullReplace,
                    )
                })
                .await
                .map(|_| ())
        });
    }

    /// Custom providers are not echoed back by the remote, so the provider
    /// and URL of the request fill whatever the created tracking lacks.
    fn add_tracking(
        &self,
        site_id: SiteId,
        order_id: i64,
        tracking: NewShipmentTracking,
        on_completion: Completion<ShipmentTracking>,
    ) {
        let context = self.context.clone();
        let remote = self.remote.clone();
        self.context.resolve_with(on_completion, async move {
            let NewShipmentTracking {
                tracking_provider,
                tracking_url,
                ..
            } = tracking.clone();
            let mut created = remote
                .create_shipment_tracking(site_id, order_id, tracking)
                .await
                .map_err(|err| context.remote_failed("add_tracking", err))?;

            if created.site_id != site_id || created.order_id != order_id {
                error!(
                    created_site = %created.site_id,
                    created_order = created.order_id,
                    expected_site = %site_id,
                    expected_order = order_id,
                    "Remote created a tracking for another order"
                );
                return Err(StoreError::UnexpectedResult(format!(
                    "tracking {} was created for order {} of site {} instead of order {order_id} of site {site_id}",
                    created.tracking_id, created.order_id, created.site_id
                )));
            }
            if created.tracking_provider.is_none() {
                created.tracking_provider = Some(tracking_provider);
            }
            if created.tracking_url.is_none() {
                created.tracking_url = tracking_url;
            }

            context
                .merge("add_tracking", move |session| {
                    reconcile(
                        session,
                        ScopeKey::with_parent(site_id, order_id),
                        std::slice::from_ref(&created),
                        ReconcilePolicy::AdditiveUpsert,
                    )?;
                    Ok(created)
                })
                .await
        });
    }

    /// A tracking that was never stored locally is not an error once the
    /// remote has deleted it.
    fn delete_tracking(
        &self,
        site_id: SiteId,
        order_id: i64,
        tracking_id: String,
        on_completion: Completion<()>,
    ) {
        let context = self.context.clone();
        let remote = self.remote.clone();
        self.context.resolve_with(on_completion, async move {
            remote
                .delete_shipment_tracking(site_id, order_id, &tracking_id)
                .await
                .map_err(|err| context.remote_failed("delete_tracking", err))?;

            context
                .merge("delete_tracking", move |session| {
                    Ok(session.delete(
                        ShipmentTracking::ENTITY,
                        ScopeKey::with_parent(site_id, order_id),
                        &NaturalKey::new(tracking_id),
                    ))
                })
                .await
                .map(|_| ())
        });
    }
}

impl ActionProcessor<Action> for ShipmentStore {
    fn on_action(&self, action: Action) {
        let action = match action {
            Action::Shipment(action) => action,
            other => {
                self.context
                    .policy()
                    .reject_action(other, "ShipmentStore received an unsupported action");
                return;
            }
        };

        match action {
            ShipmentAction::SynchronizeShipmentTrackingData {
                site_id,
                order_id,
                on_completion,
            } => self.synchronize_shipment_tracking_data(site_id, order_id, on_completion),
            ShipmentAction::AddTracking {
                site_id,
                order_id,
                tracking,
                on_completion,
            } => self.add_tracking(site_id, order_id, tracking, on_completion),
            ShipmentAction::DeleteTracking {
                site_id,
                order_id,
                tracking_id,
                on_completion,
            } => self.delete_tracking(site_id, order_id, tracking_id, on_completion),
        }
    }
}
