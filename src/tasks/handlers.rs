use axum::{
    extract::{Path, State},
    routing::get,
    Json, Router,
};
use tracing::instrument;
use uuid::Uuid;

use crate::{
    auth::services::AuthUser,
    error::{ApiError, ApiResult},
    state::AppState,
    tasks::repo::{self, TaskTemplate},
};

pub fn read_routes() -> Router<AppState> {
    Router::new()
        .route("/templates", get(list_templates))
        .route("/templates/:id", get(get_template))
}

#[instrument(skip(state))]
pub async fn list_templates(
    State(state): State<AppState>,
    AuthUser(_user_id): AuthUser,
) -> ApiResult<Json<Vec<TaskTemplate>>> {
    let templates = repo::list(&state.db).await?;
    Ok(Json(templates))
}

#[instrument(skip(state))]
pub async fn get_template(
    State(state): State<AppState>,
    AuthUser(_user_id): AuthUser,
    Path(id): Path<Uuid>,
) -> ApiResult<Json<TaskTemplate>> {
    let template = repo::find_by_id(&state.db, id)
        .await?
        .ok_or(ApiError::NotFound("task template"))?;
    Ok(Json(template))
}
