use std::sync::Arc;

use axum::{
    Router,
    extract::{Path, State},
    http::StatusCode,
    response::IntoResponse,
    routing::post,
};
use crates::{
    domain::repositories::relations::RelationRepository,
    infra::db::{
        postgres::postgres_connection::PgPoolSquad, repositories::relations::RelationPostgres,
    },
};
use tracing::{info, warn};
use uuid::Uuid;

use crate::{
    auth::AuthUser,
    axum_http::error_responses::{api_error_response, data_response, error_response},
    realtime::registry::NotificationRegistry,
    usecases::relations::SuperlikeUseCase,
};

pub fn routes(db_pool: Arc<PgPoolSquad>, registry: Arc<NotificationRegistry>) -> Router {
    let relation_repository = RelationPostgres::new(Arc::clone(&db_pool));
    let usecase = SuperlikeUseCase::new(Arc::new(relation_repository), registry);

    Router::new()
        .route("/:target_id/superlike", post(superlike))
        .with_state(Arc::new(usecase))
}

pub async fn superlike<R>(
    State(usecase): State<Arc<SuperlikeUseCase<R>>>,
    AuthUser { user_id }: AuthUser,
    Path(target_id): Path<String>,
) -> impl IntoResponse
where
    R: RelationRepository + Send + Sync + 'static,
{
    let Ok(target_id) = Uuid::parse_str(&target_id) else {
        warn!(%user_id, %target_id, "relations: invalid target id");
        return error_response(StatusCode::BAD_REQUEST, "invalid target id");
    };

    info!(%user_id, %target_id, "relations: superlike request received");
    match usecase.send_superlike(user_id, target_id).await {
        Ok(result) => data_response(result),
        Err(err) => api_error_response(err),
    }
}
