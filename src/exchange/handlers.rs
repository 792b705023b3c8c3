use axum::{
    extract::State,
    routing::{get, post},
    Json, Router,
};
use tracing::instrument;

use crate::{
    auth::services::{require_guardian, AuthUser},
    error::ApiResult,
    exchange::{
        dto::{ConfigRequest, ExchangeGrantResponse, ExchangeRequest, TodayResponse},
        repo::{GameTimeConfig, NewGameTimeConfig},
        services,
    },
    state::AppState,
};

pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/exchange", post(exchange))
        .route("/exchange/today", get(today))
        .route("/exchange/config", get(get_config).put(put_config))
}

#[instrument(skip(state, payload))]
pub async fn exchange(
    State(state): State<AppState>,
    AuthUser(caller): AuthUser,
    Json(payload): Json<ExchangeRequest>,
) -> ApiResult<Json<ExchangeGrantResponse>> {
    let grant =
        services::request_exchange(&state.db, caller, payload.points, payload.activity_kind)
            .await?;
    Ok(Json(grant.into()))
}

#[instrument(skip(state))]
pub async fn today(
    State(state): State<AppState>,
    AuthUser(caller): AuthUser,
) -> ApiResult<Json<TodayResponse>> {
    let stats = services::today_stats(&state.db, caller).await?;
    Ok(Json(stats.into()))
}

#[instrument(skip(state))]
pub async fn get_config(
    State(state): State<AppState>,
    AuthUser(_caller): AuthUser,
) -> ApiResult<Json<GameTimeConfig>> {
    let config = crate::exchange::repo::active_config(&state.db).await?;
    Ok(Json(config))
}

#[instrument(skip(state, payload))]
pub async fn put_config(
    State(state): State<AppState>,
    AuthUser(caller): AuthUser,
    Json(payload): Json<ConfigRequest>,
) -> ApiResult<Json<GameTimeConfig>> {
    require_guardian(&state.db, caller).await?;
    let config = services::install_config(
        &state.db,
        NewGameTimeConfig {
            base_game_time_minutes: payload.base_game_time_minutes,
            points_to_minutes_ratio: payload.points_to_minutes_ratio,
            educational_game_bonus: payload.educational_game_bonus,
            daily_game_time_limit: payload.daily_game_time_limit,
            free_educational_minutes: payload.free_educational_minutes,
            weekly_accumulation_limit: payload.weekly_accumulation_limit,
            daily_points_limit: payload.daily_points_limit,
        },
    )
    .await?;
    Ok(Json(config))
}
