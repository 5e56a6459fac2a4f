use std::sync::Arc;

use axum::{
    Router,
    extract::State,
    response::IntoResponse,
    routing::{get, post},
};
use crates::{
    domain::repositories::boosts::BoostRepository,
    infra::db::{
        postgres::postgres_connection::PgPoolSquad, repositories::boosts::BoostPostgres,
    },
};
use tracing::info;

use crate::{
    auth::AuthUser,
    axum_http::error_responses::{api_error_response, data_response},
    config::config_model::DotEnvyConfig,
    usecases::boosts::BoostUseCase,
};

pub fn routes(db_pool: Arc<PgPoolSquad>, config: Arc<DotEnvyConfig>) -> Router {
    let boost_repository = BoostPostgres::new(Arc::clone(&db_pool));
    let usecase = BoostUseCase::new(
        Arc::new(boost_repository),
        config.entitlements.boost_minutes,
    );

    Router::new()
        .route("/activate", post(activate))
        .route("/active", get(list_active))
        .with_state(Arc::new(usecase))
}

pub async fn activate<B>(
    State(usecase): State<Arc<BoostUseCase<B>>>,
    AuthUser { user_id }: AuthUser,
) -> impl IntoResponse
where
    B: BoostRepository + Send + Sync + 'static,
{
    info!(%user_id, "boosts: activation request received");
    match usecase.activate(user_id).await {
        Ok(activation) => data_response(activation),
        Err(err) => api_error_response(err),
    }
}

pub async fn list_active<B>(
    State(usecase): State<Arc<BoostUseCase<B>>>,
    AuthUser { user_id }: AuthUser,
) -> impl IntoResponse
where
    B: BoostRepository + Send + Sync + 'static,
{
    match usecase.list_active(user_id).await {
        Ok(boosts) => data_response(boosts),
        Err(err) => api_error_response(err),
    }
}
