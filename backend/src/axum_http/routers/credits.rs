use std::sync::Arc;

use axum::{
    Json, Router,
    extract::State,
    response::IntoResponse,
    routing::{get, post},
};
use crates::{
    domain::{
        repositories::user_credits::UserCreditRepository,
        value_objects::credits::UseCreditRequest,
    },
    infra::db::{
        postgres::postgres_connection::PgPoolSquad,
        repositories::user_credits::UserCreditPostgres,
    },
};
use tracing::info;

use crate::{
    auth::AuthUser,
    axum_http::error_responses::{api_error_response, data_response},
    config::config_model::DotEnvyConfig,
    usecases::credits::CreditUseCase,
};

pub fn routes(db_pool: Arc<PgPoolSquad>, config: Arc<DotEnvyConfig>) -> Router {
    let credit_repository = UserCreditPostgres::new(Arc::clone(&db_pool));
    let usecase = CreditUseCase::new(
        Arc::new(credit_repository),
        config.entitlements.premium_token_days,
    );

    Router::new()
        .route("/", get(get_balances))
        .route("/history", get(history))
        .route("/use", post(use_credit))
        .with_state(Arc::new(usecase))
}

pub async fn get_balances<U>(
    State(usecase): State<Arc<CreditUseCase<U>>>,
    AuthUser { user_id }: AuthUser,
) -> impl IntoResponse
where
    U: UserCreditRepository + Send + Sync + 'static,
{
    match usecase.get_balances(user_id).await {
        Ok(balances) => data_response(balances),
        Err(err) => api_error_response(err),
    }
}

pub async fn history<U>(
    State(usecase): State<Arc<CreditUseCase<U>>>,
    AuthUser { user_id }: AuthUser,
) -> impl IntoResponse
where
    U: UserCreditRepository + Send + Sync + 'static,
{
    match usecase.history(user_id).await {
        Ok(events) => data_response(events),
        Err(err) => api_error_response(err),
    }
}

pub async fn use_credit<U>(
    State(usecase): State<Arc<CreditUseCase<U>>>,
    AuthUser { user_id }: AuthUser,
    Json(request): Json<UseCreditRequest>,
) -> impl IntoResponse
where
    U: UserCreditRepository + Send + Sync + 'static,
{
    info!(%user_id, kind = %request.kind, "credits: use credit request received");
    match usecase.use_credit(user_id, &request.kind).await {
        Ok(activation) => data_response(activation),
        Err(err) => api_error_response(err),
    }
}
