use sqlx::PgPool;
use time::OffsetDateTime;
use tracing::info;
use uuid::Uuid;

use crate::error::{ApiError, ApiResult};
use crate::exchange::engine::{self, ActivityKind, QuoteInput};
use crate::exchange::repo::{self, GameTimeConfig, GameTimeExchange, NewGameTimeConfig};
use crate::points::ledger::{self, LedgerReason, NewLedgerEntry};

#[derive(Debug)]
pub struct ExchangeGrant {
    pub exchange: GameTimeExchange,
    pub points_spent: i32,
    pub minutes_granted: i32,
    pub free_grant: bool,
    pub balance_after: i64,
}

/// Convert points into game-time minutes. The user row is locked for the
/// duration of the transaction, and balance plus caps are evaluated inside
/// it, so two racing requests serialize: the loser sees the updated ledger
/// and fails its own checks instead of overdrafting. The exchange record and
/// its debit entry land atomically.
pub async fn request_exchange(
    db: &PgPool,
    user_id: Uuid,
    requested_points: i32,
    kind: ActivityKind,
) -> ApiResult<ExchangeGrant> {
    if requested_points <= 0 {
        return Err(ApiError::BadRequest("points must be positive".into()));
    }

    let mut tx = db.begin().await?;

    let locked: Option<Uuid> = sqlx::query_scalar("SELECT id FROM users WHERE id = $1 FOR UPDATE")
        .bind(user_id)
        .fetch_optional(&mut *tx)
        .await?;
    if locked.is_none() {
        return Err(ApiError::NotFound("user"));
    }

    let config = repo::active_config(&mut *tx).await?;
    let today = OffsetDateTime::now_utc().date();

    let balance = ledger::balance(&mut *tx, user_id).await?;
    engine::ensure_funds(requested_points, balance)?;

    let (week_start, week_end) = engine::week_bounds(today);
    let spent_this_week = ledger::spent_between(&mut *tx, user_id, week_start, week_end).await?;
    let granted_today = repo::minutes_granted_on(&mut *tx, user_id, today).await?;
    let free_used_today = repo::free_minutes_used_on(&mut *tx, user_id, today).await?;

    let quote = engine::quote(&QuoteInput {
        requested_points,
        kind,
        points_to_minutes_ratio: config.points_to_minutes_ratio,
        educational_game_bonus: config.educational_game_bonus,
        free_minutes_remaining: (i64::from(config.free_educational_minutes) - free_used_today)
            .max(0) as i32,
        daily_minutes_remaining: (i64::from(config.daily_game_time_limit) - granted_today).max(0)
            as i32,
        weekly_points_remaining: i64::from(config.weekly_accumulation_limit) - spent_this_week,
    })?;

    let mut exchange = repo::insert_exchange(
        &mut *tx,
        user_id,
        today,
        kind,
        quote.points_charged,
        quote.minutes_granted,
        config.id,
    )
    .await?;

    if quote.points_charged > 0 {
        let entry = ledger::insert(
            &mut *tx,
            NewLedgerEntry {
                user_id,
                amount: -quote.points_charged,
                reason: LedgerReason::ExchangeDebit,
                task_instance_id: None,
                exchange_id: Some(exchange.id),
                rule_id: None,
                rule_version: None,
                entry_date: today,
                note: Some(format!("game time: {} min", quote.minutes_granted)),
            },
        )
        .await?;
        repo::set_ledger_ref(&mut *tx, exchange.id, entry.id).await?;
        exchange.ledger_entry_id = Some(entry.id);
    }

    tx.commit().await?;

    let balance_after = balance - i64::from(quote.points_charged);
    info!(
        user_id = %user_id,
        points = quote.points_charged,
        minutes = quote.minutes_granted,
        free = quote.free_grant,
        kind = ?kind,
        "game time exchanged"
    );
    Ok(ExchangeGrant {
        exchange,
        points_spent: quote.points_charged,
        minutes_granted: quote.minutes_granted,
        free_grant: quote.free_grant,
        balance_after,
    })
}

#[derive(Debug)]
pub struct TodayGameTime {
    pub date: time::Date,
    pub base_minutes: i32,
    pub minutes_granted: i64,
    pub daily_limit: i32,
    pub minutes_remaining: i64,
    pub free_educational_minutes: i32,
    pub free_minutes_used: i64,
    pub exchanges: Vec<GameTimeExchange>,
}

pub async fn today_stats(db: &PgPool, user_id: Uuid) -> ApiResult<TodayGameTime> {
    let config = repo::active_config(db).await?;
    let today = OffsetDateTime::now_utc().date();
    let minutes_granted = repo::minutes_granted_on(db, user_id, today).await?;
    let free_minutes_used = repo::free_minutes_used_on(db, user_id, today).await?;
    let exchanges = repo::list_on(db, user_id, today).await?;
    Ok(TodayGameTime {
        date: today,
        base_minutes: config.base_game_time_minutes,
        minutes_granted,
        daily_limit: config.daily_game_time_limit,
        minutes_remaining: (i64::from(config.daily_game_time_limit) - minutes_granted).max(0),
        free_educational_minutes: config.free_educational_minutes,
        free_minutes_used,
        exchanges,
    })
}

pub async fn install_config(db: &PgPool, config: NewGameTimeConfig) -> ApiResult<GameTimeConfig> {
    let installed = repo::install_config(db, config).await?;
    info!(config_id = %installed.id, "game time configuration installed");
    Ok(installed)
}
