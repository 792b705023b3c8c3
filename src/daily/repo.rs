use serde::Serialize;
use sqlx::{FromRow, PgExecutor, PgPool};
use time::{Date, OffsetDateTime};
use uuid::Uuid;

use crate::daily::lifecycle::{Decision, EvidenceItem, SubmissionMetrics, TaskStatus};
use crate::error::ApiError;

/// One day's assignment of a template to a child; the lifecycle entity.
/// Rows are never deleted, only transitioned.
#[derive(Debug, Clone, Serialize, FromRow)]
pub struct TaskInstance {
    pub id: Uuid,
    pub child_id: Uuid,
    pub template_id: Uuid,
    pub date: Date,
    pub status: TaskStatus,
    pub decision: Decision,
    pub repeatable: bool,
    pub evidence: serde_json::Value,
    pub metrics: serde_json::Value,
    pub notes: Option<String>,
    pub completed_at: Option<OffsetDateTime>,
    pub points_earned: Option<i32>,
    pub decided_by: Option<Uuid>,
    pub decided_at: Option<OffsetDateTime>,
    pub decision_notes: Option<String>,
    pub created_at: OffsetDateTime,
    pub updated_at: OffsetDateTime,
}

impl TaskInstance {
    pub fn evidence_items(&self) -> anyhow::Result<Vec<EvidenceItem>> {
        Ok(serde_json::from_value(self.evidence.clone())?)
    }

    pub fn submission_metrics(&self) -> anyhow::Result<SubmissionMetrics> {
        Ok(serde_json::from_value(self.metrics.clone())?)
    }
}

const INSTANCE_COLUMNS: &str = r#"
    id, child_id, template_id, date, status, decision, repeatable, evidence,
    metrics, notes, completed_at, points_earned, decided_by, decided_at,
    decision_notes, created_at, updated_at
"#;

/// Plan an instance for (child, template, date). The partial unique index
/// rejects duplicates for non-repeatable templates; that surfaces as a
/// conflict rather than a second row.
pub async fn plan(
    db: &PgPool,
    child_id: Uuid,
    template_id: Uuid,
    repeatable: bool,
    date: Date,
    notes: Option<&str>,
) -> Result<TaskInstance, ApiError> {
    let res = sqlx::query_as::<_, TaskInstance>(&format!(
        r#"
        INSERT INTO task_instances (child_id, template_id, repeatable, date, notes)
        VALUES ($1, $2, $3, $4, $5)
        RETURNING {INSTANCE_COLUMNS}
        "#
    ))
    .bind(child_id)
    .bind(template_id)
    .bind(repeatable)
    .bind(date)
    .bind(notes)
    .fetch_one(db)
    .await;

    match res {
        Ok(row) => Ok(row),
        Err(sqlx::Error::Database(e)) if e.is_unique_violation() => {
            Err(ApiError::Conflict("task is already planned for this date"))
        }
        Err(e) => Err(e.into()),
    }
}

pub async fn find<'e>(ex: impl PgExecutor<'e>, id: Uuid) -> Result<Option<TaskInstance>, ApiError> {
    let row = sqlx::query_as::<_, TaskInstance>(&format!(
        "SELECT {INSTANCE_COLUMNS} FROM task_instances WHERE id = $1"
    ))
    .bind(id)
    .fetch_optional(ex)
    .await?;
    Ok(row)
}

pub async fn list_for_child(
    db: &PgPool,
    child_id: Uuid,
    date: Option<Date>,
    status: Option<TaskStatus>,
) -> Result<Vec<TaskInstance>, ApiError> {
    let rows = sqlx::query_as::<_, TaskInstance>(&format!(
        r#"
        SELECT {INSTANCE_COLUMNS}
        FROM task_instances
        WHERE child_id = $1
          AND ($2::date IS NULL OR date = $2)
          AND ($3::text IS NULL OR status = $3)
        ORDER BY date DESC, created_at DESC
        "#
    ))
    .bind(child_id)
    .bind(date)
    .bind(status)
    .fetch_all(db)
    .await?;
    Ok(rows)
}

/// `planned → in_progress`. Conditional on the current status; returns None
/// when the row was not in a startable state.
pub async fn mark_in_progress(db: &PgPool, id: Uuid) -> Result<Option<TaskInstance>, ApiError> {
    let row = sqlx::query_as::<_, TaskInstance>(&format!(
        r#"
        UPDATE task_instances
        SET status = 'in_progress', updated_at = now()
        WHERE id = $1 AND status = 'planned'
        RETURNING {INSTANCE_COLUMNS}
        "#
    ))
    .bind(id)
    .fetch_optional(db)
    .await?;
    Ok(row)
}

/// `{planned, in_progress} → completed`, stamping evidence and completion
/// time. The decision stays unset; settlement happens only at approval.
pub async fn mark_completed(
    db: &PgPool,
    id: Uuid,
    evidence: &serde_json::Value,
    metrics: &serde_json::Value,
    notes: Option<&str>,
) -> Result<Option<TaskInstance>, ApiError> {
    let row = sqlx::query_as::<_, TaskInstance>(&format!(
        r#"
        UPDATE task_instances
        SET status = 'completed',
            completed_at = now(),
            evidence = $2,
            metrics = $3,
            notes = COALESCE($4, notes),
            updated_at = now()
        WHERE id = $1 AND status IN ('planned', 'in_progress')
        RETURNING {INSTANCE_COLUMNS}
        "#
    ))
    .bind(id)
    .bind(evidence)
    .bind(metrics)
    .bind(notes)
    .fetch_optional(db)
    .await?;
    Ok(row)
}

/// `planned → skipped`; terminal, no points.
pub async fn mark_skipped(db: &PgPool, id: Uuid) -> Result<Option<TaskInstance>, ApiError> {
    let row = sqlx::query_as::<_, TaskInstance>(&format!(
        r#"
        UPDATE task_instances
        SET status = 'skipped', updated_at = now()
        WHERE id = $1 AND status = 'planned'
        RETURNING {INSTANCE_COLUMNS}
        "#
    ))
    .bind(id)
    .fetch_optional(db)
    .await?;
    Ok(row)
}

/// Conditional decision write: only succeeds while the instance is completed
/// and undecided, so the loser of two racing decisions gets None. Runs inside
/// the approval transaction.
pub async fn record_decision<'e>(
    ex: impl PgExecutor<'e>,
    id: Uuid,
    decision: Decision,
    decided_by: Uuid,
    notes: Option<&str>,
) -> Result<Option<TaskInstance>, ApiError> {
    let row = sqlx::query_as::<_, TaskInstance>(&format!(
        r#"
        UPDATE task_instances
        SET decision = $2,
            decided_by = $3,
            decided_at = now(),
            decision_notes = $4,
            updated_at = now()
        WHERE id = $1 AND status = 'completed' AND decision = 'unset'
        RETURNING {INSTANCE_COLUMNS}
        "#
    ))
    .bind(id)
    .bind(decision)
    .bind(decided_by)
    .bind(notes)
    .fetch_optional(ex)
    .await?;
    Ok(row)
}

/// Settlement stamp, conditional on the points still being unsettled.
/// Returns the number of rows written (0 means someone settled first).
pub async fn stamp_points<'e>(
    ex: impl PgExecutor<'e>,
    id: Uuid,
    amount: i32,
) -> Result<u64, ApiError> {
    let res = sqlx::query(
        r#"
        UPDATE task_instances
        SET points_earned = $2, updated_at = now()
        WHERE id = $1 AND points_earned IS NULL
        "#,
    )
    .bind(id)
    .bind(amount)
    .execute(ex)
    .await?;
    Ok(res.rows_affected())
}

/// A pending-approval row joined with what the guardian needs to judge it.
#[derive(Debug, Clone, Serialize, FromRow)]
pub struct PendingInstance {
    pub id: Uuid,
    pub child_id: Uuid,
    pub child_name: String,
    pub template_id: Uuid,
    pub template_title: String,
    pub activity: String,
    pub base_points: i32,
    pub date: Date,
    pub evidence: serde_json::Value,
    pub notes: Option<String>,
    pub completed_at: Option<OffsetDateTime>,
}

/// The guardian's queue: completed + undecided, for children whose
/// relationship is consistent in both directions. Matches purely on state
/// and decision; evidence presence plays no part.
pub async fn pending_for_guardian(
    db: &PgPool,
    guardian_id: Uuid,
) -> Result<Vec<PendingInstance>, ApiError> {
    let rows = sqlx::query_as::<_, PendingInstance>(
        r#"
        SELECT i.id, i.child_id, c.display_name AS child_name,
               i.template_id, t.title AS template_title, t.activity,
               t.base_points, i.date, i.evidence, i.notes, i.completed_at
        FROM task_instances i
        JOIN users c ON c.id = i.child_id
        JOIN guardian_children gc ON gc.child_id = c.id AND gc.guardian_id = $1
        JOIN task_templates t ON t.id = i.template_id
        WHERE c.parent_id = $1
          AND i.status = 'completed'
          AND i.decision = 'unset'
        ORDER BY i.completed_at ASC NULLS LAST
        "#,
    )
    .bind(guardian_id)
    .fetch_all(db)
    .await?;
    Ok(rows)
}
