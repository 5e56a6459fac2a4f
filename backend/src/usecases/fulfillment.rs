use std::{collections::HashMap, sync::Arc};

use axum::http::StatusCode;
use crates::{
    domain::{
        entities::{
            fulfilled_purchases::InsertFulfilledPurchaseEntity,
            subscriptions::UpsertSubscriptionEntity,
        },
        repositories::{
            plans::PlanRepository, subscriptions::SubscriptionRepository,
            user_credits::UserCreditRepository,
        },
        value_objects::{
            credits::{CreditGrant, PurchaseGrant},
            enums::{
                credit_kinds::CreditKind, plan_intervals::PlanInterval,
                purchase_kinds::PurchaseKind,
            },
            plans::{LegacyPriceIds, PackQuantities, legacy_pack_kind},
            subscriptions::{ConfirmCheckoutResponse, CreateCheckoutRequest, CreateCheckoutResponse},
        },
    },
    payments::stripe_client::{
        CreateCheckoutParams, EVENT_CHECKOUT_SESSION_COMPLETED, Expandable, StripeCheckoutSession,
        StripeClient, StripeSubscription,
    },
};
use thiserror::Error;
use tracing::{debug, error, info, warn};
use uuid::Uuid;

use crate::{
    axum_http::error_responses::ApiError,
    usecases::{
        plan_sync::metadata_int, stripe_gateway::StripeGateway,
        subscription_view::resolve_billing_period,
    },
};

const SUBSCRIPTION_PLANS: [&str; 3] = ["weekly", "monthly", "yearly"];
const CHECKOUT_SESSION_PLACEHOLDER: &str = "{CHECKOUT_SESSION_ID}";

#[derive(Debug, Error)]
pub enum FulfillmentError {
    #[error("session_id required")]
    MissingSessionId,
    #[error("Invalid or missing Stripe price_id")]
    InvalidPrice,
    #[error("Forbidden")]
    Forbidden,
    #[error("Session not completed yet")]
    SessionNotCompleted,
    #[error(
        "No credits resolved for this purchase. Check Plan.price_id or Stripe Price metadata (credit_type, credit_quantity)."
    )]
    UnresolvedPurchase,
    #[error("invalid webhook signature")]
    InvalidSignature,
    #[error("invalid webhook payload: {0}")]
    InvalidWebhook(String),
    #[error("payment provider unavailable")]
    ProviderUnavailable(#[source] anyhow::Error),
    #[error(transparent)]
    Internal(#[from] anyhow::Error),
}

impl ApiError for FulfillmentError {
    fn status_code(&self) -> StatusCode {
        match self {
            FulfillmentError::MissingSessionId
            | FulfillmentError::InvalidPrice
            | FulfillmentError::InvalidSignature
            | FulfillmentError::InvalidWebhook(_) => StatusCode::BAD_REQUEST,
            FulfillmentError::Forbidden => StatusCode::FORBIDDEN,
            FulfillmentError::SessionNotCompleted => StatusCode::CONFLICT,
            FulfillmentError::UnresolvedPurchase => StatusCode::UNPROCESSABLE_ENTITY,
            FulfillmentError::ProviderUnavailable(_) => StatusCode::BAD_GATEWAY,
            FulfillmentError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

pub type UseCaseResult<T> = std::result::Result<T, FulfillmentError>;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WebhookOutcome {
    Fulfilled,
    /// Event type this service does not act on.
    Ignored,
    /// Checkout event that cannot be fulfilled; acknowledged so it is not redelivered.
    Skipped,
}

#[derive(Debug, Clone, Default)]
pub struct FulfillmentSettings {
    pub pack_quantities: PackQuantities,
    pub legacy_prices: LegacyPriceIds,
    pub frontend_url: String,
}

pub struct FulfillmentUseCase<U, S, P, Stripe>
where
    U: UserCreditRepository + Send + Sync + 'static,
    S: SubscriptionRepository + Send + Sync + 'static,
    P: PlanRepository + Send + Sync + 'static,
    Stripe: StripeGateway + Send + Sync + 'static,
{
    credit_repo: Arc<U>,
    subscription_repo: Arc<S>,
    plan_repo: Arc<P>,
    stripe_client: Arc<Stripe>,
    settings: FulfillmentSettings,
}

/// `credit_type` + `credit_quantity` price metadata as a grant. Zero or negative
/// quantities resolve to nothing.
fn grant_from_metadata(metadata: &HashMap<String, String>) -> Option<CreditGrant> {
    let kind = CreditKind::from_str(metadata.get("credit_type")?)?;
    let quantity = metadata_int(metadata, "credit_quantity")?;
    (quantity > 0).then_some(CreditGrant { kind, quantity })
}

fn encode(value: &str) -> String {
    url::form_urlencoded::byte_serialize(value.as_bytes()).collect()
}

fn non_blank(value: Option<String>) -> Option<String> {
    value
        .map(|value| value.trim().to_string())
        .filter(|value| !value.is_empty())
}

impl<U, S, P, Stripe> FulfillmentUseCase<U, S, P, Stripe>
where
    U: UserCreditRepository + Send + Sync + 'static,
    S: SubscriptionRepository + Send + Sync + 'static,
    P: PlanRepository + Send + Sync + 'static,
    Stripe: StripeGateway + Send + Sync + 'static,
{
    pub fn new(
        credit_repo: Arc<U>,
        subscription_repo: Arc<S>,
        plan_repo: Arc<P>,
        stripe_client: Arc<Stripe>,
        settings: FulfillmentSettings,
    ) -> Self {
        Self {
            credit_repo,
            subscription_repo,
            plan_repo,
            stripe_client,
            settings,
        }
    }

    pub async fn create_checkout(
        &self,
        user_id: Uuid,
        request: CreateCheckoutRequest,
    ) -> UseCaseResult<CreateCheckoutResponse> {
        let plan = non_blank(request.plan);
        let explicit_price = non_blank(request.price_id);
        info!(%user_id, plan = ?plan, price_id = ?explicit_price, "fulfillment: create checkout requested");

        let plan_row = match (&explicit_price, &plan) {
            (None, Some(slug)) => self
                .plan_repo
                .find_active_by_slug(slug)
                .await
                .map_err(|err| {
                    error!(%user_id, plan = %slug, db_error = ?err, "fulfillment: plan lookup failed");
                    FulfillmentError::Internal(err)
                })?,
            _ => None,
        };

        let price_id = explicit_price
            .clone()
            .or_else(|| plan_row.as_ref().map(|row| row.price_id.clone()))
            .or_else(|| {
                plan.as_deref()
                    .and_then(|slug| self.settings.legacy_prices.price_for(slug))
                    .map(str::to_string)
            })
            .filter(|price_id| price_id.starts_with("price_"))
            .ok_or_else(|| {
                warn!(%user_id, plan = ?plan, "fulfillment: checkout price could not be resolved");
                FulfillmentError::InvalidPrice
            })?;

        let mode = if explicit_price.is_some() {
            let price = self
                .stripe_client
                .retrieve_price(&price_id)
                .await
                .map_err(|err| {
                    error!(%user_id, %price_id, error = ?err, "fulfillment: failed to retrieve price");
                    FulfillmentError::ProviderUnavailable(err)
                })?;
            if price.recurring.is_some() {
                "subscription"
            } else {
                "payment"
            }
        } else if let Some(plan_type) = plan_row.as_ref().and_then(|row| row.plan_type()) {
            plan_type.checkout_mode()
        } else if plan
            .as_deref()
            .is_some_and(|slug| SUBSCRIPTION_PLANS.contains(&slug))
        {
            "subscription"
        } else {
            "payment"
        };

        let frontend = self.settings.frontend_url.trim_end_matches('/');
        let query = format!(
            "plan={}&price_id={}",
            encode(plan.as_deref().unwrap_or_default()),
            encode(&price_id)
        );
        let success_url = format!(
            "{frontend}/subscription?status=success&{query}&session_id={CHECKOUT_SESSION_PLACEHOLDER}"
        );
        let cancel_url = format!("{frontend}/subscription?status=cancel&{query}");

        let mut metadata = HashMap::from([
            ("userId".to_string(), user_id.to_string()),
            ("price_id".to_string(), price_id.clone()),
        ]);
        if let Some(plan) = plan.as_ref() {
            metadata.insert("plan".to_string(), plan.clone());
        }

        let url = self
            .stripe_client
            .create_checkout_session(CreateCheckoutParams {
                price_id: price_id.clone(),
                mode: mode.to_string(),
                success_url,
                cancel_url,
                metadata,
            })
            .await
            .map_err(|err| {
                error!(%user_id, %price_id, error = ?err, "fulfillment: failed to create checkout session");
                FulfillmentError::ProviderUnavailable(err)
            })?;

        info!(%user_id, %price_id, mode, "fulfillment: checkout session created");
        Ok(CreateCheckoutResponse { url })
    }

    /// Client-driven fulfillment after the provider redirects back.
    pub async fn confirm_checkout(
        &self,
        user_id: Uuid,
        session_id: Option<String>,
    ) -> UseCaseResult<ConfirmCheckoutResponse> {
        let session_id = non_blank(session_id).ok_or(FulfillmentError::MissingSessionId)?;

        let session = self
            .stripe_client
            .retrieve_checkout_session(&session_id)
            .await
            .map_err(|err| {
                error!(%user_id, %session_id, error = ?err, "fulfillment: failed to retrieve checkout session");
                FulfillmentError::ProviderUnavailable(err)
            })?;

        if let Some(owner) = session.metadata_value("userId") {
            if owner != user_id.to_string() {
                warn!(%user_id, %session_id, "fulfillment: checkout session belongs to another user");
                return Err(FulfillmentError::Forbidden);
            }
        }

        let ready = if session.is_subscription() {
            session.is_complete() && session.subscription_id().is_some()
        } else {
            session.is_complete() && session.is_paid()
        };
        if !ready {
            info!(
                %user_id,
                %session_id,
                status = ?session.status,
                payment_status = ?session.payment_status,
                "fulfillment: checkout session not completed"
            );
            return Err(FulfillmentError::SessionNotCompleted);
        }

        self.fulfill_session(user_id, &session).await
    }

    /// Provider-driven fulfillment. Nothing is read or written before the
    /// signature is verified.
    pub async fn handle_webhook(
        &self,
        payload: &[u8],
        signature: Option<&str>,
    ) -> UseCaseResult<WebhookOutcome> {
        let signature = signature.ok_or_else(|| {
            warn!("fulfillment: webhook without signature header");
            FulfillmentError::InvalidSignature
        })?;

        let event = self
            .stripe_client
            .verify_webhook_signature(payload, signature)
            .map_err(|err| {
                warn!(error = %err, "fulfillment: webhook signature verification failed");
                FulfillmentError::InvalidSignature
            })?;

        if event.type_ != EVENT_CHECKOUT_SESSION_COMPLETED {
            debug!(event_type = %event.type_, event_id = ?event.id, "fulfillment: webhook event ignored");
            return Ok(WebhookOutcome::Ignored);
        }

        let session = StripeClient::extract_checkout_session(&event).ok_or_else(|| {
            warn!(event_id = ?event.id, "fulfillment: webhook carries no checkout session");
            FulfillmentError::InvalidWebhook("checkout session object missing".to_string())
        })?;

        let Some(user_id) = session
            .metadata_value("userId")
            .and_then(|raw| Uuid::parse_str(raw).ok())
        else {
            warn!(session_id = %session.id, "fulfillment: webhook session without a valid userId");
            return Ok(WebhookOutcome::Skipped);
        };

        if session.is_subscription() && session.subscription_id().is_none() {
            warn!(%user_id, session_id = %session.id, "fulfillment: subscription session without subscription");
            return Ok(WebhookOutcome::Skipped);
        }
        if !session.is_subscription() && !session.is_paid() {
            info!(%user_id, session_id = %session.id, "fulfillment: one-time session not paid yet");
            return Ok(WebhookOutcome::Skipped);
        }

        match self.fulfill_session(user_id, &session).await {
            Ok(_) => Ok(WebhookOutcome::Fulfilled),
            Err(FulfillmentError::UnresolvedPurchase) => {
                warn!(%user_id, session_id = %session.id, "fulfillment: webhook purchase unresolved, acknowledging");
                Ok(WebhookOutcome::Skipped)
            }
            // The provider redelivers on 5xx.
            Err(FulfillmentError::ProviderUnavailable(err)) => Err(FulfillmentError::Internal(err)),
            Err(other) => Err(other),
        }
    }

    async fn fulfill_session(
        &self,
        user_id: Uuid,
        session: &StripeCheckoutSession,
    ) -> UseCaseResult<ConfirmCheckoutResponse> {
        if session.is_subscription() {
            self.fulfill_subscription(user_id, session).await
        } else {
            self.fulfill_one_time(user_id, session).await
        }
    }

    async fn load_subscription(&self, session: &StripeCheckoutSession) -> UseCaseResult<StripeSubscription> {
        match session.subscription.as_ref() {
            Some(Expandable::Object(subscription)) => Ok(subscription.as_ref().clone()),
            Some(Expandable::Id(subscription_id)) => self
                .stripe_client
                .retrieve_subscription(subscription_id)
                .await
                .map_err(|err| {
                    error!(%subscription_id, error = ?err, "fulfillment: failed to retrieve subscription");
                    FulfillmentError::ProviderUnavailable(err)
                }),
            None => Err(FulfillmentError::SessionNotCompleted),
        }
    }

    async fn fulfill_subscription(
        &self,
        user_id: Uuid,
        session: &StripeCheckoutSession,
    ) -> UseCaseResult<ConfirmCheckoutResponse> {
        let subscription = self.load_subscription(session).await?;
        let price = subscription.first_price();
        let price_id = price
            .map(|price| price.id.clone())
            .or_else(|| session.metadata_value("price_id").map(str::to_string));
        let plan_interval = price
            .and_then(|price| price.recurring.as_ref())
            .and_then(|recurring| PlanInterval::from_str(&recurring.interval))
            .map(|interval| interval.to_string());

        let plan_slug = match price_id.as_deref() {
            Some(price_id) => self
                .plan_repo
                .find_active_by_price_id(price_id)
                .await
                .map_err(FulfillmentError::Internal)?
                .and_then(|plan| plan.plan_slug),
            None => None,
        };

        let upsert = UpsertSubscriptionEntity {
            user_id,
            stripe_customer_id: session.customer.clone(),
            stripe_subscription_id: subscription.id.clone(),
            status: subscription.status.clone(),
            current_period_end: resolve_billing_period(&subscription).end,
            plan_price_id: price_id.clone(),
            plan_interval,
            plan_slug,
        };
        let purchase = InsertFulfilledPurchaseEntity {
            purchase_ref: session.id.clone(),
            user_id,
            purchase_kind: PurchaseKind::Subscription.to_string(),
            credit_type: None,
            quantity: 0,
        };

        let row_id = self
            .subscription_repo
            .activate_from_checkout(upsert, purchase)
            .await
            .map_err(|err| {
                error!(
                    %user_id,
                    session_id = %session.id,
                    subscription_id = %subscription.id,
                    db_error = ?err,
                    "fulfillment: failed to activate subscription"
                );
                FulfillmentError::Internal(err)
            })?;

        info!(
            %user_id,
            session_id = %session.id,
            subscription_id = %subscription.id,
            %row_id,
            price_id = ?price_id,
            "fulfillment: subscription activated"
        );
        Ok(ConfirmCheckoutResponse {
            ok: true,
            kind: PurchaseKind::Subscription,
            grant: None,
            already_applied: false,
        })
    }

    /// Local plan, then line-item price metadata, then the fetched price's
    /// metadata, then the legacy pack table.
    async fn resolve_one_time_grant(&self, session: &StripeCheckoutSession) -> UseCaseResult<Option<CreditGrant>> {
        let line_items = self
            .stripe_client
            .list_checkout_line_items(&session.id)
            .await
            .map_err(|err| {
                error!(session_id = %session.id, error = ?err, "fulfillment: failed to list line items");
                FulfillmentError::ProviderUnavailable(err)
            })?;
        let line_price = line_items.into_iter().find_map(|item| item.price);

        let price_id = session
            .metadata_value("price_id")
            .map(str::to_string)
            .or_else(|| line_price.as_ref().map(|price| price.id.clone()));

        if let Some(price_id) = price_id.as_deref() {
            let plan = self
                .plan_repo
                .find_active_by_price_id(price_id)
                .await
                .map_err(FulfillmentError::Internal)?;
            let from_plan = plan.and_then(|plan| {
                let kind = plan.credit_kind()?;
                (plan.credit_quantity > 0).then_some(CreditGrant {
                    kind,
                    quantity: plan.credit_quantity,
                })
            });
            if from_plan.is_some() {
                return Ok(from_plan);
            }

            if let Some(grant) = line_price.as_ref().and_then(|price| grant_from_metadata(&price.metadata)) {
                return Ok(Some(grant));
            }

            match self.stripe_client.retrieve_price(price_id).await {
                Ok(price) => {
                    if let Some(grant) = grant_from_metadata(&price.metadata) {
                        return Ok(Some(grant));
                    }
                }
                Err(err) => warn!(
                    session_id = %session.id,
                    %price_id,
                    error = ?err,
                    "fulfillment: price lookup failed, trying legacy packs"
                ),
            }
        }

        Ok(session
            .metadata_value("plan")
            .and_then(legacy_pack_kind)
            .map(|kind| CreditGrant {
                kind,
                quantity: self.settings.pack_quantities.quantity_for(kind).max(0),
            })
            .filter(|grant| grant.quantity > 0))
    }

    async fn fulfill_one_time(
        &self,
        user_id: Uuid,
        session: &StripeCheckoutSession,
    ) -> UseCaseResult<ConfirmCheckoutResponse> {
        let grant = self.resolve_one_time_grant(session).await?.ok_or_else(|| {
            warn!(%user_id, session_id = %session.id, "fulfillment: no credits resolved for purchase");
            FulfillmentError::UnresolvedPurchase
        })?;

        let outcome = self
            .credit_repo
            .grant_purchase(PurchaseGrant {
                purchase_ref: session.id.clone(),
                user_id,
                grant,
            })
            .await
            .map_err(|err| {
                error!(
                    %user_id,
                    session_id = %session.id,
                    db_error = ?err,
                    "fulfillment: failed to grant purchase"
                );
                FulfillmentError::Internal(err)
            })?;

        let already_applied = outcome.is_already_applied();
        info!(
            %user_id,
            session_id = %session.id,
            kind = %grant.kind,
            quantity = grant.quantity,
            already_applied,
            "fulfillment: one-time purchase fulfilled"
        );
        Ok(ConfirmCheckoutResponse {
            ok: true,
            kind: PurchaseKind::OneTime,
            grant: Some(grant),
            already_applied,
        })
    }
}
