use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    routing::{get, post},
    Json, Router,
};
use time::OffsetDateTime;
use tracing::instrument;
use uuid::Uuid;

use crate::{
    auth::services::{require_guardian, AuthUser},
    daily::{
        dto::{
            CompleteRequest, DecideRequest, DecideResponse, InstanceResponse, ListQuery,
            PlanRequest,
        },
        repo::{self, PendingInstance},
        services,
    },
    error::ApiResult,
    state::AppState,
};

pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/daily", post(plan).get(list))
        .route("/daily/:id/start", post(start))
        .route("/daily/:id/complete", post(complete))
        .route("/daily/:id/skip", post(skip))
        .route("/daily/:id/decision", post(decide))
        .route("/approvals/pending", get(pending_approvals))
}

#[instrument(skip(state, payload))]
pub async fn plan(
    State(state): State<AppState>,
    AuthUser(caller): AuthUser,
    Json(payload): Json<PlanRequest>,
) -> ApiResult<(StatusCode, Json<InstanceResponse>)> {
    let instance = services::plan(
        &state.db,
        caller,
        payload.child_id,
        payload.template_id,
        payload.date,
        payload.notes.as_deref(),
    )
    .await?;
    Ok((StatusCode::CREATED, Json(instance.into())))
}

#[instrument(skip(state))]
pub async fn list(
    State(state): State<AppState>,
    AuthUser(caller): AuthUser,
    Query(q): Query<ListQuery>,
) -> ApiResult<Json<Vec<InstanceResponse>>> {
    let instances = services::list(&state.db, caller, q.child_id, q.date, q.status).await?;
    Ok(Json(instances.into_iter().map(Into::into).collect()))
}

#[instrument(skip(state))]
pub async fn start(
    State(state): State<AppState>,
    AuthUser(caller): AuthUser,
    Path(id): Path<Uuid>,
) -> ApiResult<Json<InstanceResponse>> {
    let instance = services::start(&state.db, caller, id).await?;
    Ok(Json(instance.into()))
}

#[instrument(skip(state, payload))]
pub async fn complete(
    State(state): State<AppState>,
    AuthUser(caller): AuthUser,
    Path(id): Path<Uuid>,
    Json(payload): Json<CompleteRequest>,
) -> ApiResult<Json<InstanceResponse>> {
    let evidence = payload.evidence_items(OffsetDateTime::now_utc());
    let instance = services::submit_complete(
        &state.db,
        caller,
        id,
        evidence,
        payload.metrics,
        payload.notes.as_deref(),
    )
    .await?;
    Ok(Json(instance.into()))
}

#[instrument(skip(state))]
pub async fn skip(
    State(state): State<AppState>,
    AuthUser(caller): AuthUser,
    Path(id): Path<Uuid>,
) -> ApiResult<Json<InstanceResponse>> {
    let instance = services::skip(&state.db, caller, id).await?;
    Ok(Json(instance.into()))
}

#[instrument(skip(state, payload))]
pub async fn decide(
    State(state): State<AppState>,
    AuthUser(caller): AuthUser,
    Path(id): Path<Uuid>,
    Json(payload): Json<DecideRequest>,
) -> ApiResult<Json<DecideResponse>> {
    let outcome = services::decide(
        &state.db,
        caller,
        id,
        payload.action.as_decision(),
        payload.notes.as_deref(),
    )
    .await?;
    Ok(Json(DecideResponse {
        instance: outcome.instance.into(),
        points_awarded: outcome.points_awarded,
    }))
}

#[instrument(skip(state))]
pub async fn pending_approvals(
    State(state): State<AppState>,
    AuthUser(caller): AuthUser,
) -> ApiResult<Json<Vec<PendingInstance>>> {
    require_guardian(&state.db, caller).await?;
    let pending = repo::pending_for_guardian(&state.db, caller).await?;
    Ok(Json(pending))
}
