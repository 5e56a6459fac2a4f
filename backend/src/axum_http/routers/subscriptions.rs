use std::sync::Arc;

use axum::{
    Router,
    body::Bytes,
    extract::State,
    response::IntoResponse,
    routing::{get, post},
};
use crates::{
    domain::{
        repositories::{
            plans::PlanRepository, subscriptions::SubscriptionRepository,
            user_credits::UserCreditRepository,
        },
        value_objects::subscriptions::CancelSubscriptionRequest,
    },
    infra::db::{
        postgres::postgres_connection::PgPoolSquad,
        repositories::{
            plans::PlanPostgres, subscriptions::SubscriptionPostgres,
            user_credits::UserCreditPostgres,
        },
    },
    payments::stripe_client::StripeClient,
};
use tracing::info;

use crate::{
    auth::AuthUser,
    axum_http::{
        error_responses::{api_error_response, data_response},
        routers::optional_json_body,
    },
    usecases::{stripe_gateway::StripeGateway, subscriptions::SubscriptionUseCase},
};

pub fn routes(db_pool: Arc<PgPoolSquad>, stripe_client: Arc<StripeClient>) -> Router {
    let subscription_repository = SubscriptionPostgres::new(Arc::clone(&db_pool));
    let plan_repository = PlanPostgres::new(Arc::clone(&db_pool));
    let credit_repository = UserCreditPostgres::new(Arc::clone(&db_pool));

    let usecase = SubscriptionUseCase::new(
        Arc::new(subscription_repository),
        Arc::new(plan_repository),
        Arc::new(credit_repository),
        stripe_client,
    );

    Router::new()
        .route("/", get(current_subscription))
        .route("/cancel", post(cancel_subscription))
        .route("/plans", get(list_plans))
        .with_state(Arc::new(usecase))
}

pub async fn current_subscription<S, P, U, Stripe>(
    State(usecase): State<Arc<SubscriptionUseCase<S, P, U, Stripe>>>,
    AuthUser { user_id }: AuthUser,
) -> impl IntoResponse
where
    S: SubscriptionRepository + Send + Sync + 'static,
    P: PlanRepository + Send + Sync + 'static,
    U: UserCreditRepository + Send + Sync + 'static,
    Stripe: StripeGateway + Send + Sync + 'static,
{
    match usecase.refresh(user_id).await {
        Ok(view) => data_response(view),
        Err(err) => api_error_response(err),
    }
}

pub async fn cancel_subscription<S, P, U, Stripe>(
    State(usecase): State<Arc<SubscriptionUseCase<S, P, U, Stripe>>>,
    AuthUser { user_id }: AuthUser,
    body: Bytes,
) -> impl IntoResponse
where
    S: SubscriptionRepository + Send + Sync + 'static,
    P: PlanRepository + Send + Sync + 'static,
    U: UserCreditRepository + Send + Sync + 'static,
    Stripe: StripeGateway + Send + Sync + 'static,
{
    let request: CancelSubscriptionRequest = match optional_json_body(&body) {
        Ok(request) => request,
        Err(response) => return response,
    };

    info!(%user_id, enable = ?request.enable, "subscriptions: cancel request received");
    match usecase.cancel(user_id, request.enable).await {
        Ok(view) => data_response(view),
        Err(err) => api_error_response(err),
    }
}

pub async fn list_plans<S, P, U, Stripe>(
    State(usecase): State<Arc<SubscriptionUseCase<S, P, U, Stripe>>>,
) -> impl IntoResponse
where
    S: SubscriptionRepository + Send + Sync + 'static,
    P: PlanRepository + Send + Sync + 'static,
    U: UserCreditRepository + Send + Sync + 'static,
    Stripe: StripeGateway + Send + Sync + 'static,
{
    match usecase.list_plans().await {
        Ok(plans) => data_response(plans),
        Err(err) => api_error_response(err),
    }
}
