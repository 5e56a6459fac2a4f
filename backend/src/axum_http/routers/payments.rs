use std::sync::Arc;

use axum::{
    Json, Router,
    body::Bytes,
    extract::State,
    http::{HeaderMap, StatusCode},
    response::IntoResponse,
    routing::post,
};
use crates::{
    domain::{
        repositories::{
            plans::PlanRepository, subscriptions::SubscriptionRepository,
            user_credits::UserCreditRepository,
        },
        value_objects::subscriptions::{ConfirmCheckoutRequest, CreateCheckoutRequest},
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
use serde_json::json;
use tracing::info;

use crate::{
    auth::AuthUser,
    axum_http::{
        error_responses::{api_error_response, data_response},
        routers::optional_json_body,
    },
    config::config_model::DotEnvyConfig,
    usecases::{
        fulfillment::{FulfillmentSettings, FulfillmentUseCase},
        stripe_gateway::StripeGateway,
    },
};

const STRIPE_SIGNATURE_HEADER: &str = "stripe-signature";

pub fn routes(
    db_pool: Arc<PgPoolSquad>,
    config: Arc<DotEnvyConfig>,
    stripe_client: Arc<StripeClient>,
) -> Router {
    let credit_repository = UserCreditPostgres::new(Arc::clone(&db_pool));
    let subscription_repository = SubscriptionPostgres::new(Arc::clone(&db_pool));
    let plan_repository = PlanPostgres::new(Arc::clone(&db_pool));

    let settings = FulfillmentSettings {
        pack_quantities: config.entitlements.pack_quantities,
        legacy_prices: config.stripe.legacy_prices.clone(),
        frontend_url: config.stripe.frontend_url.clone(),
    };

    let usecase = FulfillmentUseCase::new(
        Arc::new(credit_repository),
        Arc::new(subscription_repository),
        Arc::new(plan_repository),
        stripe_client,
        settings,
    );

    Router::new()
        .route("/checkout", post(create_checkout))
        .route("/confirm", post(confirm_checkout))
        .route("/webhook", post(webhook))
        .with_state(Arc::new(usecase))
}

pub async fn create_checkout<U, S, P, Stripe>(
    State(usecase): State<Arc<FulfillmentUseCase<U, S, P, Stripe>>>,
    AuthUser { user_id }: AuthUser,
    Json(request): Json<CreateCheckoutRequest>,
) -> impl IntoResponse
where
    U: UserCreditRepository + Send + Sync + 'static,
    S: SubscriptionRepository + Send + Sync + 'static,
    P: PlanRepository + Send + Sync + 'static,
    Stripe: StripeGateway + Send + Sync + 'static,
{
    match usecase.create_checkout(user_id, request).await {
        Ok(response) => (StatusCode::OK, Json(response)).into_response(),
        Err(err) => api_error_response(err),
    }
}

pub async fn confirm_checkout<U, S, P, Stripe>(
    State(usecase): State<Arc<FulfillmentUseCase<U, S, P, Stripe>>>,
    AuthUser { user_id }: AuthUser,
    body: Bytes,
) -> impl IntoResponse
where
    U: UserCreditRepository + Send + Sync + 'static,
    S: SubscriptionRepository + Send + Sync + 'static,
    P: PlanRepository + Send + Sync + 'static,
    Stripe: StripeGateway + Send + Sync + 'static,
{
    let request: ConfirmCheckoutRequest = match optional_json_body(&body) {
        Ok(request) => request,
        Err(response) => return response,
    };

    info!(%user_id, session_id = ?request.session_id, "payments: confirm request received");
    match usecase.confirm_checkout(user_id, request.session_id).await {
        Ok(response) => data_response(response),
        Err(err) => api_error_response(err),
    }
}

/// Raw body and signature header go to verification untouched.
pub async fn webhook<U, S, P, Stripe>(
    State(usecase): State<Arc<FulfillmentUseCase<U, S, P, Stripe>>>,
    headers: HeaderMap,
    body: Bytes,
) -> impl IntoResponse
where
    U: UserCreditRepository + Send + Sync + 'static,
    S: SubscriptionRepository + Send + Sync + 'static,
    P: PlanRepository + Send + Sync + 'static,
    Stripe: StripeGateway + Send + Sync + 'static,
{
    let signature = headers
        .get(STRIPE_SIGNATURE_HEADER)
        .and_then(|value| value.to_str().ok());

    match usecase.handle_webhook(&body, signature).await {
        Ok(outcome) => {
            info!(outcome = ?outcome, "payments: webhook processed");
            (StatusCode::OK, Json(json!({ "received": true }))).into_response()
        }
        Err(err) => api_error_response(err),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::usecases::{stripe_gateway::MockStripeGateway, test_support::InMemoryStore};
    use axum::{body::Body, http::Request};
    use crates::payments::stripe_client::StripeEvent;
    use tower::ServiceExt;

    fn webhook_app(stripe: MockStripeGateway) -> Router {
        let store = Arc::new(InMemoryStore::new());
        let usecase = FulfillmentUseCase::new(
            store.clone(),
            store.clone(),
            store,
            Arc::new(stripe),
            FulfillmentSettings::default(),
        );

        Router::new()
            .route(
                "/webhook",
                post(webhook::<InMemoryStore, InMemoryStore, InMemoryStore, MockStripeGateway>),
            )
            .with_state(Arc::new(usecase))
    }

    async fn body_json(response: axum::response::Response) -> serde_json::Value {
        let body = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        serde_json::from_slice(&body).unwrap()
    }

    #[tokio::test]
    async fn webhook_without_signature_is_rejected() {
        let mut stripe = MockStripeGateway::new();
        stripe.expect_verify_webhook_signature().never();

        let response = webhook_app(stripe)
            .oneshot(
                Request::builder()
                    .method("POST")
                    .uri("/webhook")
                    .body(Body::from("{}"))
                    .unwrap(),
            )
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        assert_eq!(
            body_json(response).await,
            json!({ "code": 400, "message": "invalid webhook signature" })
        );
    }

    #[tokio::test]
    async fn webhook_passes_raw_body_and_header_to_verification() {
        let payload = r#"{"id":"evt_1","type":"invoice.paid","data":{"object":{}}}"#;
        let mut stripe = MockStripeGateway::new();
        stripe
            .expect_verify_webhook_signature()
            .withf(move |body, signature| body == payload.as_bytes() && signature == "t=1,v1=abc")
            .times(1)
            .returning(|body, _| serde_json::from_slice::<StripeEvent>(body).map_err(anyhow::Error::from));

        let response = webhook_app(stripe)
            .oneshot(
                Request::builder()
                    .method("POST")
                    .uri("/webhook")
                    .header(STRIPE_SIGNATURE_HEADER, "t=1,v1=abc")
                    .body(Body::from(payload))
                    .unwrap(),
            )
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(body_json(response).await, json!({ "received": true }));
    }
}
