use std::sync::Arc;

use storeflux_common::{ScopeKey, SiteId, StoreError, StoreResult};
use storeflux_engine::{
    reconcile, ActionProcessor, Completion, Dispatcher, ReconcilePolicy, StoreContext,
};
use tracing::error;

use crate::actions::{Action, ActionKind, PaymentGatewayAction};
use crate::model::PaymentGateway;
use crate::remote::PaymentGatewaysRemote;

/// Keeps the stored payment gateways of each site in sync with the remote.
pub struct PaymentGatewayStore {
    context: StoreContext,
    remote: Arc<dyn PaymentGatewaysRemote>,
}

impl PaymentGatewayStore {
    pub fn new(context: StoreContext, remote: Arc<dyn PaymentGatewaysRemote>) -> Arc<Self> {
        Arc::new(Self { context, remote })
    }

    pub fn register_supported_actions(self: &Arc<Self>, dispatcher: &Dispatcher<Action>) {
        dispatcher.register(self.clone(), ActionKind::PaymentGateway);
    }

    fn synchronize_payment_gateways(&self, site_id: SiteId, on_completion: Completion<()>) {
        let context = self.context.clone();
        let remote = self.remote.clone();
        self.context.resolve_with(on_completion, async move {
            let gateways = remote
                .load_all_payment_gateways(site_id)
                .await
                .map_err(|err| context.remote_failed("synchronize_payment_gateways", err))?;

            context
                .merge("synchronize_payment_gateways", move |session| {
                    reconcile(
                        session,
                        ScopeKey::site(site_id),
                        &gateways,
                        ReconcilePolicy::FullReplace,
                    )
                })
                .await
                .map(|_| ())
        });
    }

    fn update_payment_gateway(
        &self,
        gateway: PaymentGateway,
        on_completion: Completion<PaymentGateway>,
    ) {
        let context = self.context.clone();
        let remote = self.remote.clone();
        self.context.resolve_with(on_completion, async move {
            let (site_id, gateway_id) = (gateway.site_id, gateway.gateway_id.clone());
            let updated = remote
                .update_payment_gateway(gateway)
                .await
                .map_err(|err| context.remote_failed("update_payment_gateway", err))?;

            upsert(&context, "update_payment_gateway", site_id, &gateway_id, updated).await
        });
    }

    fn retrieve_payment_gateway(
        &self,
        site_id: SiteId,
        gateway_id: String,
        on_completion: Completion<PaymentGateway>,
    ) {
        let context = self.context.clone();
        let remote = self.remote.clone();
        self.context.resolve_with(on_completion, async move {
            let gateway = remote
                .load_payment_gateway(site_id, &gateway_id)
                .await
                .map_err(|err| context.remote_failed("retrieve_payment_gateway", err))?;

            upsert(&context, "retrieve_payment_gateway", site_id, &gateway_id, gateway).await
        });
    }
}

/// Store the gateway the remote answered with under the requested site.
async fn upsert(
    context: &StoreContext,
    operation: &str,
    site_id: SiteId,
    gateway_id: &str,
    gateway: PaymentGateway,
) -> StoreResult<PaymentGateway> {
    if gateway.site_id != site_id || gateway.gateway_id != gateway_id {
        error!(
            operation,
            echo_site = %gateway.site_id,
            echo_gateway = %gateway.gateway_id,
            expected_site = %site_id,
            expected_gateway = gateway_id,
            "Remote answered with an unexpected payment gateway"
        );
        return Err(StoreError::UnexpectedResult(format!(
            "{operation} returned gateway {} of site {} for gateway {gateway_id} of site {site_id}",
            gateway.gateway_id, gateway.site_id
        )));
    }

    context
        .merge(operation, move |session| {
            reconcile(
                session,
                ScopeKey::site(site_id),
                std::slice::from_ref(&gateway),
                ReconcilePolicy::AdditiveUpsert,
            )?;
            Ok(gateway)
        })
        .await
}

impl ActionProcessor<Action> for PaymentGatewayStore {
    fn on_action(&self, action: Action) {
        let action = match action {
            Action::PaymentGateway(action) => action,
            other => {
                self.context
                    .policy()
                    .reject_action(other, "PaymentGatewayStore received an unsupported action");
                return;
            }
        };

        match action {
            PaymentGatewayAction::SynchronizePaymentGateways {
                site_id,
                on_completion,
            } => self.synchronize_payment_gateways(site_id, on_completion),
            PaymentGatewayAction::UpdatePaymentGateway {
                gateway,
                on_completion,
            } => self.update_payment_gateway(gateway, on_completion),
            PaymentGatewayAction::RetrievePaymentGateway {
                site_id,
                gateway_id,
                on_completion,
            } => self.retrieve_payment_gateway(site_id, gateway_id, on_completion),
        }
    }
}
