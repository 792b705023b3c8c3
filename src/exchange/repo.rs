use serde::Serialize;
use sqlx::{FromRow, PgExecutor, PgPool};
use time::{Date, OffsetDateTime};
use uuid::Uuid;

use crate::error::ApiError;
use crate::exchange::engine::ActivityKind;

/// Conversion configuration. Exactly one row is active; every exchange stores
/// the id of the snapshot it was computed under.
#[derive(Debug, Clone, Serialize, FromRow)]
pub struct GameTimeConfig {
    pub id: Uuid,
    pub base_game_time_minutes: i32,
    pub points_to_minutes_ratio: f64,
    pub educational_game_bonus: f64,
    pub daily_game_time_limit: i32,
    pub free_educational_minutes: i32,
    pub weekly_accumulation_limit: i32,
    pub daily_points_limit: i32,
    pub is_active: bool,
    pub created_at: OffsetDateTime,
    pub updated_at: OffsetDateTime,
}

const CONFIG_COLUMNS: &str = r#"
    id, base_game_time_minutes, points_to_minutes_ratio, educational_game_bonus,
    daily_game_time_limit, free_educational_minutes, weekly_accumulation_limit,
    daily_points_limit, is_active, created_at, updated_at
"#;

pub async fn active_config<'e>(ex: impl PgExecutor<'e>) -> Result<GameTimeConfig, ApiError> {
    sqlx::query_as::<_, GameTimeConfig>(&format!(
        "SELECT {CONFIG_COLUMNS} FROM game_time_configs WHERE is_active ORDER BY created_at DESC LIMIT 1"
    ))
    .fetch_optional(ex)
    .await?
    .ok_or(ApiError::NotFound("game time configuration"))
}

pub struct NewGameTimeConfig {
    pub base_game_time_minutes: i32,
    pub points_to_minutes_ratio: f64,
    pub educational_game_bonus: f64,
    pub daily_game_time_limit: i32,
    pub free_educational_minutes: i32,
    pub weekly_accumulation_limit: i32,
    pub daily_points_limit: i32,
}

/// Installing a new config deactivates every previous one; old rows stay for
/// the snapshot references.
pub async fn install_config(
    db: &PgPool,
    config: NewGameTimeConfig,
) -> Result<GameTimeConfig, ApiError> {
    let mut tx = db.begin().await?;
    sqlx::query("UPDATE game_time_configs SET is_active = FALSE, updated_at = now() WHERE is_active")
        .execute(&mut *tx)
        .await?;
    let row = sqlx::query_as::<_, GameTimeConfig>(&format!(
        r#"
        INSERT INTO game_time_configs
            (base_game_time_minutes, points_to_minutes_ratio, educational_game_bonus,
             daily_game_time_limit, free_educational_minutes, weekly_accumulation_limit,
             daily_points_limit)
        VALUES ($1, $2, $3, $4, $5, $6, $7)
        RETURNING {CONFIG_COLUMNS}
        "#
    ))
    .bind(config.base_game_time_minutes)
    .bind(config.points_to_minutes_ratio)
    .bind(config.educational_game_bonus)
    .bind(config.daily_game_time_limit)
    .bind(config.free_educational_minutes)
    .bind(config.weekly_accumulation_limit)
    .bind(config.daily_points_limit)
    .fetch_one(&mut *tx)
    .await?;
    tx.commit().await?;
    Ok(row)
}

#[derive(Debug, Clone, Serialize, FromRow)]
pub struct GameTimeExchange {
    pub id: Uuid,
    pub user_id: Uuid,
    pub date: Date,
    pub activity_kind: ActivityKind,
    pub points_spent: i32,
    pub minutes_granted: i32,
    pub config_id: Uuid,
    pub ledger_entry_id: Option<Uuid>,
    pub created_at: OffsetDateTime,
}

const EXCHANGE_COLUMNS: &str = r#"
    id, user_id, date, activity_kind, points_spent, minutes_granted,
    config_id, ledger_entry_id, created_at
"#;

pub async fn insert_exchange<'e>(
    ex: impl PgExecutor<'e>,
    user_id: Uuid,
    date: Date,
    activity_kind: ActivityKind,
    points_spent: i32,
    minutes_granted: i32,
    config_id: Uuid,
) -> Result<GameTimeExchange, ApiError> {
    let row = sqlx::query_as::<_, GameTimeExchange>(&format!(
        r#"
        INSERT INTO game_time_exchanges
            (user_id, date, activity_kind, points_spent, minutes_granted, config_id)
        VALUES ($1, $2, $3, $4, $5, $6)
        RETURNING {EXCHANGE_COLUMNS}
        "#
    ))
    .bind(user_id)
    .bind(date)
    .bind(activity_kind)
    .bind(points_spent)
    .bind(minutes_granted)
    .bind(config_id)
    .fetch_one(ex)
    .await?;
    Ok(row)
}

pub async fn set_ledger_ref<'e>(
    ex: impl PgExecutor<'e>,
    exchange_id: Uuid,
    ledger_entry_id: Uuid,
) -> Result<(), ApiError> {
    sqlx::query("UPDATE game_time_exchanges SET ledger_entry_id = $2 WHERE id = $1")
        .bind(exchange_id)
        .bind(ledger_entry_id)
        .execute(ex)
        .await?;
    Ok(())
}

pub async fn minutes_granted_on<'e>(
    ex: impl PgExecutor<'e>,
    user_id: Uuid,
    date: Date,
) -> Result<i64, ApiError> {
    let sum: i64 = sqlx::query_scalar(
        r#"
        SELECT COALESCE(SUM(minutes_granted), 0)::bigint
        FROM game_time_exchanges
        WHERE user_id = $1 AND date = $2
        "#,
    )
    .bind(user_id)
    .bind(date)
    .fetch_one(ex)
    .await?;
    Ok(sum)
}

/// Minutes already granted for free today (educational, zero points).
pub async fn free_minutes_used_on<'e>(
    ex: impl PgExecutor<'e>,
    user_id: Uuid,
    date: Date,
) -> Result<i64, ApiError> {
    let sum: i64 = sqlx::query_scalar(
        r#"
        SELECT COALESCE(SUM(minutes_granted), 0)::bigint
        FROM game_time_exchanges
        WHERE user_id = $1 AND date = $2
          AND activity_kind = 'educational' AND points_spent = 0
        "#,
    )
    .bind(user_id)
    .bind(date)
    .fetch_one(ex)
    .await?;
    Ok(sum)
}

pub async fn list_on(
    db: &PgPool,
    user_id: Uuid,
    date: Date,
) -> Result<Vec<GameTimeExchange>, ApiError> {
    let rows = sqlx::query_as::<_, GameTimeExchange>(&format!(
        r#"
        SELECT {EXCHANGE_COLUMNS}
        FROM game_time_exchanges
        WHERE user_id = $1 AND date = $2
        ORDER BY created_at ASC
        "#
    ))
    .bind(user_id)
    .bind(date)
    .fetch_all(db)
    .await?;
    Ok(rows)
}
