use std::sync::Arc;

use storeflux_common::{ScopeKey, SiteId};
use storeflux_engine::{
    reconcile, ActionProcessor, Completion, Dispatcher, ReconcilePolicy, StoreContext,
};
use storeflux_storage::Entity;
use tracing::info;

use crate::actions::{Action, ActionKind, OrderStatusAction};
use crate::model::OrderStatus;
use crate::remote::OrderStatusRemote;

pub struct OrderStatusStore {
    context: StoreContext,
    remote: Arc<dyn OrderStatusRemote>,
}

impl OrderStatusStore {
    pub fn new(context: StoreContext, remote: Arc<dyn OrderStatusRemote>) -> Arc<Self> {
        Arc::new(Self { context, remote })
    }

    pub fn register_supported_actions(self: &Arc<Self>, dispatcher: &Dispatcher<Action>) {
        dispatcher.register(self.clone(), ActionKind::OrderStatus);
    }

    fn retrieve_order_statuses(
        &self,
        site_id: SiteId,
        on_completion: Completion<Vec<OrderStatus>>,
    ) {
        let context = self.context.clone();
        let remote = self.remote.clone();
        self.context.resolve_with(on_completion, async move {
            let statuses = remote
                .load_order_statuses(site_id)
                .await
                .map_err(|err| context.remote_failed("retrieve_order_statuses", err))?;

            context
                .merge("retrieve_order_statuses", move |session| {
                    reconcile(
                        session,
                        ScopeKey::site(site_id),
                        &statuses,
                        ReconcilePolicy::FullReplace,
                    )?;
                    Ok(statuses)
                })
                .await
        });
    }

    fn reset_stored_order_statuses(&self, on_completion: Completion<()>) {
        let context = self.context.clone();
        self.context.resolve_with(on_completion, async move {
            context
                .merge("reset_stored_order_statuses", |session| {
                    Ok(session.delete_all(OrderStatus::ENTITY))
                })
                .await
                .map(|deleted| info!(deleted, "Reset stored order statuses"))
        });
    }
}

impl ActionProcessor<Action> for OrderStatusStore {
    fn on_action(&self, action: Action) {
        let action = match action {
            Action::OrderStatus(action) => action,
            other => {
                self.context
                    .policy()
                    .reject_action(other, "OrderStatusStore received an unsupported action");
                return;
            }
        };

        match action {
            OrderStatusAction::RetrieveOrderStatuses {
                site_id,
                on_completion,
            } => self.retrieve_order_statuses(site_id, on_completion),
            OrderStatusAction::ResetStoredOrderStatuses { on_completion } => {
                self.reset_stored_order_statuses(on_completion)
            }
        }
    }
}
