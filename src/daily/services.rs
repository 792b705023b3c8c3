use sqlx::PgPool;
use time::Date;
use tracing::info;
use uuid::Uuid;

use crate::auth::repo::User;
use crate::auth::services::{require_guardian_of, resolve_subject};
use crate::daily::lifecycle::{self, Decision, EvidenceItem, SubmissionMetrics, TaskStatus};
use crate::daily::repo::{self, TaskInstance};
use crate::error::{ApiError, ApiResult};
use crate::points::services::settle_approved;
use crate::tasks::repo as templates;

/// Plan an instance. A child plans for themself; a guardian may plan for one
/// of their children.
pub async fn plan(
    db: &PgPool,
    caller: Uuid,
    child_id: Option<Uuid>,
    template_id: Uuid,
    date: Date,
    notes: Option<&str>,
) -> ApiResult<TaskInstance> {
    let child_id = match child_id {
        None => caller,
        Some(id) if id == caller => caller,
        Some(id) => {
            require_guardian_of(db, caller, id).await?;
            id
        }
    };

    let template = templates::find_by_id(db, template_id)
        .await?
        .ok_or(ApiError::NotFound("task template"))?;

    let instance = repo::plan(db, child_id, template.id, template.repeatable, date, notes).await?;
    info!(instance_id = %instance.id, child_id = %child_id, date = %date, "task planned");
    Ok(instance)
}

pub async fn list(
    db: &PgPool,
    caller: Uuid,
    child_id: Option<Uuid>,
    date: Option<Date>,
    status: Option<TaskStatus>,
) -> ApiResult<Vec<TaskInstance>> {
    let subject = resolve_subject(db, caller, child_id).await?;
    repo::list_for_child(db, subject, date, status).await
}

async fn load_owned(db: &PgPool, caller: Uuid, id: Uuid) -> ApiResult<TaskInstance> {
    let instance = repo::find(db, id)
        .await?
        .ok_or(ApiError::NotFound("task instance"))?;
    if instance.child_id != caller {
        return Err(ApiError::Unauthorized);
    }
    Ok(instance)
}

pub async fn start(db: &PgPool, caller: Uuid, id: Uuid) -> ApiResult<TaskInstance> {
    let instance = load_owned(db, caller, id).await?;
    lifecycle::can_start(instance.status)?;
    repo::mark_in_progress(db, id)
        .await?
        .ok_or(ApiError::InvalidTransition("only a planned task can be started"))
}

/// Child marks the task complete with evidence. The instance enters the
/// pending-approval queue; no points move until a guardian approves.
pub async fn submit_complete(
    db: &PgPool,
    caller: Uuid,
    id: Uuid,
    evidence: Vec<EvidenceItem>,
    metrics: SubmissionMetrics,
    notes: Option<&str>,
) -> ApiResult<TaskInstance> {
    let instance = load_owned(db, caller, id).await?;
    lifecycle::can_submit(instance.status)?;

    let template = templates::find_by_id(db, instance.template_id)
        .await?
        .ok_or(ApiError::NotFound("task template"))?;
    lifecycle::evidence_satisfies(template.requires_evidence, &template.evidence_kinds, &evidence)?;

    let evidence_json = serde_json::to_value(&evidence).map_err(anyhow::Error::from)?;
    let metrics_json = serde_json::to_value(&metrics).map_err(anyhow::Error::from)?;

    let updated = repo::mark_completed(db, id, &evidence_json, &metrics_json, notes)
        .await?
        .ok_or(ApiError::InvalidTransition("task is no longer open for completion"))?;
    info!(instance_id = %id, child_id = %caller, "task submitted for approval");
    Ok(updated)
}

pub async fn skip(db: &PgPool, caller: Uuid, id: Uuid) -> ApiResult<TaskInstance> {
    let instance = load_owned(db, caller, id).await?;
    lifecycle::can_skip(instance.status)?;
    repo::mark_skipped(db, id)
        .await?
        .ok_or(ApiError::InvalidTransition("only a planned task can be skipped"))
}

pub struct DecideOutcome {
    pub instance: TaskInstance,
    pub points_awarded: Option<i32>,
}

/// Guardian decision. The decision write is conditional on the instance
/// still being completed-and-undecided, so a second decision (or the loser
/// of a race) fails with InvalidTransition and changes nothing. Approval
/// settles points inside the same transaction: either the decision and its
/// ledger entry both land, or neither does.
pub async fn decide(
    db: &PgPool,
    guardian_id: Uuid,
    id: Uuid,
    decision: Decision,
    notes: Option<&str>,
) -> ApiResult<DecideOutcome> {
    if decision == Decision::Unset {
        return Err(ApiError::BadRequest("decision must be approved or rejected".into()));
    }

    let instance = repo::find(db, id)
        .await?
        .ok_or(ApiError::NotFound("task instance"))?;

    require_guardian_of(db, guardian_id, instance.child_id).await?;
    lifecycle::can_decide(instance.status, instance.decision)?;

    let template = templates::find_by_id(db, instance.template_id)
        .await?
        .ok_or(ApiError::NotFound("task template"))?;
    let child = User::find_by_id(db, instance.child_id)
        .await?
        .ok_or(ApiError::NotFound("child"))?;

    let mut tx = db.begin().await?;

    let decided = repo::record_decision(&mut *tx, id, decision, guardian_id, notes)
        .await?
        .ok_or(ApiError::InvalidTransition("task has already been decided"))?;

    let points_awarded = match decision {
        Decision::Approved => {
            let settlement = settle_approved(&mut tx, &decided, &template, &child).await?;
            if !settlement.newly_settled {
                tracing::debug!(instance_id = %id, "settlement returned previously recorded amount");
            }
            Some(settlement.amount)
        }
        Decision::Rejected => None,
        Decision::Unset => unreachable!("rejected above"),
    };

    tx.commit().await?;

    // Re-read so the response carries the settled points.
    let instance = repo::find(db, id)
        .await?
        .ok_or(ApiError::NotFound("task instance"))?;

    info!(
        instance_id = %id,
        guardian_id = %guardian_id,
        decision = ?decision,
        points = ?points_awarded,
        "task decided"
    );
    Ok(DecideOutcome { instance, points_awarded })
}
