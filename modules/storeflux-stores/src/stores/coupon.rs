use std::sync::Arc;

use storeflux_common::{NaturalKey, ScopeKey, SiteId, StoreError, StoreResult};
use storeflux_engine::{
    reconcile, ActionProcessor, Completion, Dispatcher, ReconcilePolicy, StoreContext,
};
use storeflux_storage::Entity;
use tracing::{debug, error};

use crate::actions::{Action, ActionKind, CouponAction};
use crate::model::Coupon;
use crate::remote::CouponsRemote;

pub struct CouponStore {
    context: StoreContext,
    remote: Arc<dyn CouponsRemote>,
}

impl CouponStore {
    pub fn new(context: StoreContext, remote: Arc<dyn CouponsRemote>) -> Arc<Self> {
        Arc::new(Self { context, remote })
    }

    pub fn register_supported_actions(self: &Arc<Self>, dispatcher: &Dispatcher<Action>) {
        dispatcher.register(self.clone(), ActionKind::Coupon);
    }

    /// The first page is authoritative for the whole site: coupons it does
    /// not list are dropped. Later pages only add or refresh.
    fn synchronize_coupons(
        &self,
        site_id: SiteId,
        page_number: u32,
        page_size: u32,
        on_completion: Completion<bool>,
    ) {
        if page_size == 0 || page_number < CouponAction::FIRST_PAGE {
            on_completion.fail(StoreError::Configuration(format!(
                "invalid coupon page {page_number} of size {page_size}"
            )));
            return;
        }

        let context = self.context.clone();
        let remote = self.remote.clone();
        self.context.resolve_with(on_completion, async move {
            let coupons = remote
                .load_all_coupons(site_id, page_number, page_size)
                .await
                .map_err(|err| context.remote_failed("synchronize_coupons", err))?;

            let has_next_page = coupons.len() == page_size as usize;
            let policy = if page_number == CouponAction::FIRST_PAGE {
                ReconcilePolicy::FullReplace
            } else {
                ReconcilePolicy::AdditiveUpsert
            };
            debug!(site = %site_id, page_number, fetched = coupons.len(), has_next_page, "Fetched coupon page");

            context
                .merge("synchronize_coupons", move |session| {
                    reconcile(session, ScopeKey::site(site_id), &coupons, policy)
                })
                .await
                .map(|_| has_next_page)
        });
    }

    fn retrieve_coupon(&self, site_id: SiteId, coupon_id: i64, on_completion: Completion<Coupon>) {
        let context = self.context.clone();
        let remote = self.remote.clone();
        self.context.resolve_with(on_completion, async move {
            let coupon = remote
                .load_coupon(site_id, coupon_id)
                .await
                .map_err(|err| context.remote_failed("retrieve_coupon", err))?;

            upsert(&context, "retrieve_coupon", site_id, Some(coupon_id), coupon).await
        });
    }

    fn update_coupon(&self, coupon: Coupon, on_completion: Completion<Coupon>) {
        let context = self.context.clone();
        let remote = self.remote.clone();
        self.context.resolve_with(on_completion, async move {
            let (site_id, coupon_id) = (coupon.site_id, coupon.coupon_id);
            let updated = remote
                .update_coupon(coupon)
                .await
                .map_err(|err| context.remote_failed("update_coupon", err))?;

            upsert(&context, "update_coupon", site_id, Some(coupon_id), updated).await
        });
    }

    fn create_coupon(&self, coupon: Coupon, on_completion: Completion<Coupon>) {
        let context = self.context.clone();
        let remote = self.remote.clone();
        self.context.resolve_with(on_completion, async move {
            let site_id = coupon.site_id;
            let created = remote
                .create_coupon(coupon)
                .await
                .map_err(|err| context.remote_failed("create_coupon", err))?;

            upsert(&context, "create_coupon", site_id, None, created).await
        });
    }

    fn delete_coupon(&self, site_id: SiteId, coupon_id: i64, on_completion: Completion<()>) {
        let context = self.context.clone();
        let remote = self.remote.clone();
        self.context.resolve_with(on_completion, async move {
            let deleted = remote
                .delete_coupon(site_id, coupon_id)
                .await
                .map_err(|err| context.remote_failed("delete_coupon", err))?;
            expect_echo("delete_coupon", site_id, Some(coupon_id), &deleted)?;

            context
                .merge("delete_coupon", move |session| {
                    Ok(session.delete(
                        Coupon::ENTITY,
                        ScopeKey::site(site_id),
                        &NaturalKey::from(coupon_id),
                    ))
                })
                .await
                .map(|_| ())
        });
    }

    fn check_coupons_enabled(&self, site_id: SiteId, on_completion: Completion<bool>) {
        let context = self.context.clone();
        let remote = self.remote.clone();
        self.context.resolve_with(on_completion, async move {
            remote
                .coupons_enabled(site_id)
                .await
                .map_err(|err| context.remote_failed("check_coupons_enabled", err))
        });
    }
}

/// Fails when the remote answered with a coupon other than the one asked
/// for. `coupon_id` is `None` when the remote assigns the id.
fn expect_echo(
    operation: &str,
    site_id: SiteId,
    coupon_id: Option<i64>,
    echo: &Coupon,
) -> StoreResult<()> {
    if echo.site_id == site_id && coupon_id.map_or(true, |id| id == echo.coupon_id) {
        return Ok(());
    }

    error!(
        operation,
        echo_site = %echo.site_id,
        echo_coupon = echo.coupon_id,
        expected_site = %site_id,
        expected_coupon = ?coupon_id,
        "Remote answered with an unexpected coupon"
    );
    Err(StoreError::UnexpectedResult(format!(
        "{operation} returned coupon {} of site {} for site {site_id}",
        echo.coupon_id, echo.site_id
    )))
}

/// Store one coupon under the requested site, leaving the rest in place.
async fn upsert(
    context: &StoreContext,
    operation: &str,
    site_id: SiteId,
    coupon_id: Option<i64>,
    coupon: Coupon,
) -> StoreResult<Coupon> {
    expect_echo(operation, site_id, coupon_id, &coupon)?;

    context
        .merge(operation, move |session| {
            reconcile(
                session,
                ScopeKey::site(site_id),
                std::slice::from_ref(&coupon),
                ReconcilePolicy::AdditiveUpsert,
            )?;
            Ok(coupon)
        })
        .await
}

impl ActionProcessor<Action> for CouponStore {
    fn on_action(&self, action: Action) {
        let action = match action {
            Action::Coupon(action) => action,
            other => {
                self.context
                    .policy()
                    .reject_action(other, "CouponStore received an unsupported action");
                return;
            }
        };

        match action {
            CouponAction::SynchronizeCoupons {
                site_id,
                page_number,
                page_size,
                on_completion,
            } => self.synchronize_coupons(site_id, page_number, page_size, on_completion),
            CouponAction::RetrieveCoupon {
                site_id,
                coupon_id,
                on_completion,
            } => self.retrieve_coupon(site_id, coupon_id, on_completion),
            CouponAction::DeleteCoupon {
                site_id,
                coupon_id,
                on_completion,
            } => self.delete_coupon(site_id, coupon_id, on_completion),
            CouponAction::UpdateCoupon {
                coupon,
                on_completion,
            } => self.update_coupon(coupon, on_completion),
            CouponAction::CreateCoupon {
                coupon,
                on_completion,
            } => self.create_coupon(coupon, on_completion),
            CouponAction::CheckCouponsEnabled {
                site_id,
                on_completion,
            } => self.check_coupons_enabled(site_id, on_completion),
        }
    }
}
