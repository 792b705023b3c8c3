//! Append-only record of every points-affecting event. A user's balance is
//! the signed sum of their entries; nothing here mutates or deletes a row.

use serde::{Deserialize, Serialize};
use sqlx::{FromRow, PgExecutor, PgPool};
use time::{Date, OffsetDateTime};
use uuid::Uuid;

use crate::error::ApiError;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[serde(rename_all = "snake_case")]
#[sqlx(rename_all = "snake_case")]
pub enum LedgerReason {
    TaskSettlement,
    ExchangeDebit,
    ManualAdjustment,
}

#[derive(Debug, Clone, Serialize, FromRow)]
pub struct LedgerEntry {
    pub id: Uuid,
    pub user_id: Uuid,
    pub amount: i32,
    pub reason: LedgerReason,
    pub task_instance_id: Option<Uuid>,
    pub exchange_id: Option<Uuid>,
    pub rule_id: Option<Uuid>,
    pub rule_version: Option<i32>,
    pub entry_date: Date,
    pub note: Option<String>,
    pub created_at: OffsetDateTime,
}

#[derive(Debug, Clone)]
pub struct NewLedgerEntry {
    pub user_id: Uuid,
    pub amount: i32,
    pub reason: LedgerReason,
    pub task_instance_id: Option<Uuid>,
    pub exchange_id: Option<Uuid>,
    pub rule_id: Option<Uuid>,
    pub rule_version: Option<i32>,
    pub entry_date: Date,
    pub note: Option<String>,
}

const ENTRY_COLUMNS: &str = r#"
    id, user_id, amount, reason, task_instance_id, exchange_id, rule_id,
    rule_version, entry_date, note, created_at
"#;

pub async fn insert<'e>(
    ex: impl PgExecutor<'e>,
    entry: NewLedgerEntry,
) -> Result<LedgerEntry, ApiError> {
    let row = sqlx::query_as::<_, LedgerEntry>(&format!(
        r#"
        INSERT INTO ledger_entries
            (user_id, amount, reason, task_instance_id, exchange_id,
             rule_id, rule_version, entry_date, note)
        VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9)
        RETURNING {ENTRY_COLUMNS}
        "#
    ))
    .bind(entry.user_id)
    .bind(entry.amount)
    .bind(entry.reason)
    .bind(entry.task_instance_id)
    .bind(entry.exchange_id)
    .bind(entry.rule_id)
    .bind(entry.rule_version)
    .bind(entry.entry_date)
    .bind(entry.note)
    .fetch_one(ex)
    .await?;
    Ok(row)
}

/// Current balance: signed sum over all entries.
pub async fn balance<'e>(ex: impl PgExecutor<'e>, user_id: Uuid) -> Result<i64, ApiError> {
    let sum: i64 = sqlx::query_scalar(
        "SELECT COALESCE(SUM(amount), 0)::bigint FROM ledger_entries WHERE user_id = $1",
    )
    .bind(user_id)
    .fetch_one(ex)
    .await?;
    Ok(sum)
}

pub async fn history(
    db: &PgPool,
    user_id: Uuid,
    limit: i64,
    offset: i64,
) -> Result<Vec<LedgerEntry>, ApiError> {
    let rows = sqlx::query_as::<_, LedgerEntry>(&format!(
        r#"
        SELECT {ENTRY_COLUMNS}
        FROM ledger_entries
        WHERE user_id = $1
        ORDER BY created_at DESC
        LIMIT $2 OFFSET $3
        "#
    ))
    .bind(user_id)
    .bind(limit)
    .bind(offset)
    .fetch_all(db)
    .await?;
    Ok(rows)
}

/// Points spent on exchanges within [start, end], as a positive number.
pub async fn spent_between<'e>(
    ex: impl PgExecutor<'e>,
    user_id: Uuid,
    start: Date,
    end: Date,
) -> Result<i64, ApiError> {
    let sum: i64 = sqlx::query_scalar(
        r#"
        SELECT COALESCE(-SUM(amount), 0)::bigint
        FROM ledger_entries
        WHERE user_id = $1
          AND reason = 'exchange_debit'
          AND entry_date BETWEEN $2 AND $3
        "#,
    )
    .bind(user_id)
    .bind(start)
    .bind(end)
    .fetch_one(ex)
    .await?;
    Ok(sum)
}
