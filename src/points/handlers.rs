use axum::{
    extract::{Path, Query, State},
    routing::{get, post, put},
    Json, Router,
};
use tracing::{info, instrument};
use uuid::Uuid;

use crate::{
    auth::services::{require_guardian, resolve_subject, AuthUser},
    error::ApiResult,
    points::{
        dto::{
            BalanceQuery, BalanceResponse, LedgerQuery, NewRuleRequest, RuleListQuery,
            UpdateRuleRequest,
        },
        ledger::{self, LedgerEntry},
        repo::{self, NewPointsRule, PointsRule, RuleChanges},
    },
    state::AppState,
};

pub fn read_routes() -> Router<AppState> {
    Router::new()
        .route("/points/balance", get(get_balance))
        .route("/points/ledger", get(get_ledger))
        .route("/points/rules", get(list_rules))
}

pub fn manage_routes() -> Router<AppState> {
    Router::new()
        .route("/points/rules", post(create_rule))
        .route("/points/rules/:id", put(update_rule))
}

#[instrument(skip(state))]
pub async fn get_balance(
    State(state): State<AppState>,
    AuthUser(caller): AuthUser,
    Query(q): Query<BalanceQuery>,
) -> ApiResult<Json<BalanceResponse>> {
    let user_id = resolve_subject(&state.db, caller, q.user_id).await?;
    let balance = ledger::balance(&state.db, user_id).await?;
    Ok(Json(BalanceResponse { user_id, balance }))
}

#[instrument(skip(state))]
pub async fn get_ledger(
    State(state): State<AppState>,
    AuthUser(caller): AuthUser,
    Query(q): Query<LedgerQuery>,
) -> ApiResult<Json<Vec<LedgerEntry>>> {
    let user_id = resolve_subject(&state.db, caller, q.user_id).await?;
    let entries = ledger::history(&state.db, user_id, q.limit, q.offset).await?;
    Ok(Json(entries))
}

#[instrument(skip(state))]
pub async fn list_rules(
    State(state): State<AppState>,
    AuthUser(_caller): AuthUser,
    Query(q): Query<RuleListQuery>,
) -> ApiResult<Json<Vec<PointsRule>>> {
    let rules = repo::list(&state.db, q.include_inactive).await?;
    Ok(Json(rules))
}

#[instrument(skip(state, payload))]
pub async fn create_rule(
    State(state): State<AppState>,
    AuthUser(caller): AuthUser,
    Json(payload): Json<NewRuleRequest>,
) -> ApiResult<Json<PointsRule>> {
    require_guardian(&state.db, caller).await?;
    let rule = repo::create(
        &state.db,
        NewPointsRule {
            category: payload.category,
            activity: payload.activity,
            base_points: payload.base_points,
            bonus_rules: payload.bonus_rules,
            multipliers: payload.multipliers,
            daily_limit: payload.daily_limit,
        },
    )
    .await?;
    info!(rule_id = %rule.id, activity = %rule.activity, "points rule created");
    Ok(Json(rule))
}

#[instrument(skip(state, payload))]
pub async fn update_rule(
    State(state): State<AppState>,
    AuthUser(caller): AuthUser,
    Path(id): Path<Uuid>,
    Json(payload): Json<UpdateRuleRequest>,
) -> ApiResult<Json<PointsRule>> {
    require_guardian(&state.db, caller).await?;
    let rule = repo::update(
        &state.db,
        id,
        RuleChanges {
            base_points: payload.base_points,
            bonus_rules: payload.bonus_rules,
            multipliers: payload.multipliers,
            daily_limit: payload.daily_limit,
            is_active: payload.is_active,
        },
    )
    .await?;
    info!(rule_id = %rule.id, version = rule.version, "points rule updated");
    Ok(Json(rule))
}
