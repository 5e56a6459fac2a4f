use std::sync::Arc;

use axum::http::StatusCode;
use crates::domain::{
    entities::{plans::PlanEntity, subscriptions::SubscriptionEntity},
    repositories::{
        plans::PlanRepository, subscriptions::SubscriptionRepository,
        user_credits::UserCreditRepository,
    },
    value_objects::subscriptions::SubscriptionView,
};
use crates::payments::stripe_client::StripeSubscription;
use thiserror::Error;
use tracing::{debug, error, info, warn};
use uuid::Uuid;

use crate::{
    axum_http::error_responses::ApiError,
    usecases::{
        stripe_gateway::StripeGateway,
        subscription_view::{cached_plan_snapshot, resolve_billing_period, to_subscription_view},
    },
};

#[derive(Debug, Error)]
pub enum SubscriptionError {
    #[error("No active subscription")]
    NotFound,
    #[error("payment provider unavailable")]
    ProviderUnavailable(#[source] anyhow::Error),
    #[error(transparent)]
    Internal(#[from] anyhow::Error),
}

impl ApiError for SubscriptionError {
    fn status_code(&self) -> StatusCode {
        match self {
            SubscriptionError::NotFound => StatusCode::NOT_FOUND,
            SubscriptionError::ProviderUnavailable(_) => StatusCode::BAD_GATEWAY,
            SubscriptionError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

pub type UseCaseResult<T> = std::result::Result<T, SubscriptionError>;

pub struct SubscriptionUseCase<S, P, U, Stripe>
where
    S: SubscriptionRepository + Send + Sync + 'static,
    P: PlanRepository + Send + Sync + 'static,
    U: UserCreditRepository + Send + Sync + 'static,
    Stripe: StripeGateway + Send + Sync + 'static,
{
    subscription_repo: Arc<S>,
    plan_repo: Arc<P>,
    credit_repo: Arc<U>,
    stripe_client: Arc<Stripe>,
}

impl<S, P, U, Stripe> SubscriptionUseCase<S, P, U, Stripe>
where
    S: SubscriptionRepository + Send + Sync + 'static,
    P: PlanRepository + Send + Sync + 'static,
    U: UserCreditRepository + Send + Sync + 'static,
    Stripe: StripeGateway + Send + Sync + 'static,
{
    pub fn new(
        subscription_repo: Arc<S>,
        plan_repo: Arc<P>,
        credit_repo: Arc<U>,
        stripe_client: Arc<Stripe>,
    ) -> Self {
        Self {
            subscription_repo,
            plan_repo,
            credit_repo,
            stripe_client,
        }
    }

    pub async fn list_plans(&self) -> UseCaseResult<Vec<PlanEntity>> {
        let plans = self.plan_repo.list_active_plans().await.map_err(|err| {
            error!(db_error = ?err, "subscriptions: failed to list active plans");
            SubscriptionError::Internal(err)
        })?;

        info!(plan_count = plans.len(), "subscriptions: active plans loaded");
        Ok(plans)
    }

    /// Live view of the user's subscription. The cached row only tells us which
    /// provider subscription to fetch; status and dates always come from the provider.
    pub async fn refresh(&self, user_id: Uuid) -> UseCaseResult<SubscriptionView> {
        let Some((cached, provider_id)) = self.load_cached(user_id).await? else {
            debug!(%user_id, "subscriptions: no provider subscription");
            return Ok(SubscriptionView::none());
        };

        let live = self
            .stripe_client
            .retrieve_subscription(&provider_id)
            .await
            .map_err(|err| {
                error!(
                    %user_id,
                    subscription_id = %provider_id,
                    error = ?err,
                    "subscriptions: failed to retrieve provider subscription"
                );
                SubscriptionError::ProviderUnavailable(err)
            })?;

        self.reconcile(&cached, &live).await
    }

    /// `enable = Some(true)` resumes auto-renew; anything else schedules the
    /// cancellation at the end of the current period.
    pub async fn cancel(&self, user_id: Uuid, enable: Option<bool>) -> UseCaseResult<SubscriptionView> {
        let Some((cached, provider_id)) = self.load_cached(user_id).await? else {
            warn!(%user_id, "subscriptions: cancel requested without a subscription");
            return Err(SubscriptionError::NotFound);
        };

        let cancel_at_period_end = enable != Some(true);
        info!(
            %user_id,
            subscription_id = %provider_id,
            cancel_at_period_end,
            "subscriptions: updating cancel at period end"
        );

        let updated = self
            .stripe_client
            .set_cancel_at_period_end(&provider_id, cancel_at_period_end)
            .await
            .map_err(|err| {
                error!(
                    %user_id,
                    subscription_id = %provider_id,
                    error = ?err,
                    "subscriptions: failed to update provider subscription"
                );
                SubscriptionError::ProviderUnavailable(err)
            })?;

        let live = self
            .stripe_client
            .retrieve_subscription(&updated.id)
            .await
            .map_err(|err| {
                error!(
                    %user_id,
                    subscription_id = %updated.id,
                    error = ?err,
                    "subscriptions: failed to re-read provider subscription"
                );
                SubscriptionError::ProviderUnavailable(err)
            })?;

        self.reconcile(&cached, &live).await
    }

    async fn load_cached(&self, user_id: Uuid) -> UseCaseResult<Option<(SubscriptionEntity, String)>> {
        let cached = self
            .subscription_repo
            .find_latest_by_user_id(user_id)
            .await
            .map_err(|err| {
                error!(%user_id, db_error = ?err, "subscriptions: failed to load cached subscription");
                SubscriptionError::Internal(err)
            })?;

        Ok(cached.and_then(|row| {
            let provider_id = row
                .stripe_subscription_id
                .clone()
                .filter(|id| !id.trim().is_empty())?;
            Some((row, provider_id))
        }))
    }

    async fn resolve_plan(
        &self,
        live: &StripeSubscription,
        cached_slug: Option<&str>,
    ) -> UseCaseResult<Option<PlanEntity>> {
        if let Some(price) = live.first_price() {
            let plan = self
                .plan_repo
                .find_active_by_price_id(&price.id)
                .await
                .map_err(SubscriptionError::Internal)?;
            if plan.is_some() {
                return Ok(plan);
            }
        }

        match cached_slug {
            Some(slug) => self
                .plan_repo
                .find_active_by_slug(slug)
                .await
                .map_err(SubscriptionError::Internal),
            None => Ok(None),
        }
    }

    async fn reconcile(
        &self,
        cached: &SubscriptionEntity,
        live: &StripeSubscription,
    ) -> UseCaseResult<SubscriptionView> {
        let user_id = cached.user_id;
        let plan = self.resolve_plan(live, cached.plan_slug.as_deref()).await?;
        let view = to_subscription_view(live, plan.as_ref(), cached.plan_slug.as_deref());

        self.subscription_repo
            .update_cached_plan(cached.id, cached_plan_snapshot(&view, &live.status))
            .await
            .map_err(|err| {
                error!(
                    %user_id,
                    subscription_row_id = %cached.id,
                    db_error = ?err,
                    "subscriptions: failed to persist cached plan"
                );
                SubscriptionError::Internal(err)
            })?;

        if let Some(plan) = plan.as_ref() {
            self.apply_periodic_grant(cached, live, &view, plan).await;
        }

        info!(
            %user_id,
            status = %view.status,
            "subscriptions: subscription refreshed"
        );
        Ok(view)
    }

    /// Superlikes included with the plan, granted at most once per provider
    /// billing period. Failures here never fail the refresh.
    async fn apply_periodic_grant(
        &self,
        cached: &SubscriptionEntity,
        live: &StripeSubscription,
        view: &SubscriptionView,
        plan: &PlanEntity,
    ) {
        let quantity = plan.superlikes_per_period.unwrap_or(0);
        if quantity <= 0 || !view.status.grants_entitlements() {
            return;
        }

        let period = resolve_billing_period(live);
        let (Some(period_start), Some(period_end)) = (period.start, period.end) else {
            debug!(user_id = %cached.user_id, "subscriptions: billing period unknown, skipping grant");
            return;
        };

        match self
            .credit_repo
            .grant_subscription_period(cached.id, cached.user_id, period_start, period_end, quantity)
            .await
        {
            Ok(true) => info!(
                user_id = %cached.user_id,
                quantity,
                %period_end,
                "subscriptions: periodic superlikes granted"
            ),
            Ok(false) => debug!(
                user_id = %cached.user_id,
                %period_end,
                "subscriptions: period already granted"
            ),
            Err(err) => error!(
                user_id = %cached.user_id,
                db_error = ?err,
                "subscriptions: periodic grant failed"
            ),
        }
    }
}
