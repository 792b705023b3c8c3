//! Pure lifecycle rules for a daily task instance.
//!
//! An instance moves `planned → in_progress → completed` and is then decided
//! by a guardian (`approved` / `rejected`), or goes `planned → skipped`.
//! The decided states are modeled as `completed` plus a tri-state decision
//! field rather than separate statuses. Every mutation in the store is
//! guarded by the predicates here AND by a conditional UPDATE, so a transition
//! attempted from a terminal or already-decided state is a no-op failure.

use serde::{Deserialize, Serialize};

use crate::error::ApiError;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[serde(rename_all = "snake_case")]
#[sqlx(rename_all = "snake_case")]
pub enum TaskStatus {
    Planned,
    InProgress,
    Completed,
    Skipped,
}

/// Explicit tri-state; the pending-approval queue matches on
/// `Completed` + `Unset`, never on evidence or field presence.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[serde(rename_all = "snake_case")]
#[sqlx(rename_all = "snake_case")]
pub enum Decision {
    Unset,
    Approved,
    Rejected,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EvidenceKind {
    Text,
    Photo,
    Video,
}

impl EvidenceKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            EvidenceKind::Text => "text",
            EvidenceKind::Photo => "photo",
            EvidenceKind::Video => "video",
        }
    }
}

/// Typed reference to submitted evidence; `content` is a text body or a
/// locator into external storage, never the binary itself.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EvidenceItem {
    pub kind: EvidenceKind,
    pub content: String,
    #[serde(with = "time::serde::rfc3339")]
    pub recorded_at: time::OffsetDateTime,
}

/// Self-reported measurements attached at completion time; bonus conditions
/// read these alongside the evidence items.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SubmissionMetrics {
    #[serde(default)]
    pub word_count: Option<i32>,
    #[serde(default)]
    pub duration_minutes: Option<i32>,
    #[serde(default)]
    pub quality: Option<String>,
    #[serde(default)]
    pub completed_early: bool,
}

pub fn can_start(status: TaskStatus) -> Result<(), ApiError> {
    match status {
        TaskStatus::Planned => Ok(()),
        _ => Err(ApiError::InvalidTransition("only a planned task can be started")),
    }
}

pub fn can_submit(status: TaskStatus) -> Result<(), ApiError> {
    match status {
        TaskStatus::Planned | TaskStatus::InProgress => Ok(()),
        TaskStatus::Completed => Err(ApiError::InvalidTransition("task is already completed")),
        TaskStatus::Skipped => Err(ApiError::InvalidTransition("task was skipped")),
    }
}

pub fn can_skip(status: TaskStatus) -> Result<(), ApiError> {
    match status {
        TaskStatus::Planned => Ok(()),
        _ => Err(ApiError::InvalidTransition("only a planned task can be skipped")),
    }
}

pub fn can_decide(status: TaskStatus, decision: Decision) -> Result<(), ApiError> {
    match (status, decision) {
        (TaskStatus::Completed, Decision::Unset) => Ok(()),
        (TaskStatus::Completed, _) => {
            Err(ApiError::InvalidTransition("task has already been decided"))
        }
        _ => Err(ApiError::InvalidTransition("only a completed task can be decided")),
    }
}

/// Completion evidence check: when the template mandates evidence, at least
/// one item of an accepted kind must be present.
pub fn evidence_satisfies(
    requires_evidence: bool,
    accepted_kinds: &[String],
    evidence: &[EvidenceItem],
) -> Result<(), ApiError> {
    if !requires_evidence {
        return Ok(());
    }
    let ok = evidence
        .iter()
        .any(|item| accepted_kinds.iter().any(|k| k == item.kind.as_str()));
    if ok {
        Ok(())
    } else {
        Err(ApiError::EvidenceRequired)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use time::OffsetDateTime;

    fn text_evidence() -> EvidenceItem {
        EvidenceItem {
            kind: EvidenceKind::Text,
            content: "read chapter three".into(),
            recorded_at: OffsetDateTime::now_utc(),
        }
    }

    fn photo_evidence() -> EvidenceItem {
        EvidenceItem {
            kind: EvidenceKind::Photo,
            content: "photos/abc123.jpg".into(),
            recorded_at: OffsetDateTime::now_utc(),
        }
    }

    #[test]
    fn submit_is_legal_from_planned_and_in_progress_only() {
        assert!(can_submit(TaskStatus::Planned).is_ok());
        assert!(can_submit(TaskStatus::InProgress).is_ok());
        assert!(matches!(
            can_submit(TaskStatus::Completed),
            Err(ApiError::InvalidTransition(_))
        ));
        assert!(matches!(
            can_submit(TaskStatus::Skipped),
            Err(ApiError::InvalidTransition(_))
        ));
    }

    #[test]
    fn skip_is_legal_from_planned_only() {
        assert!(can_skip(TaskStatus::Planned).is_ok());
        for status in [TaskStatus::InProgress, TaskStatus::Completed, TaskStatus::Skipped] {
            assert!(matches!(can_skip(status), Err(ApiError::InvalidTransition(_))));
        }
    }

    #[test]
    fn start_is_legal_from_planned_only() {
        assert!(can_start(TaskStatus::Planned).is_ok());
        for status in [TaskStatus::InProgress, TaskStatus::Completed, TaskStatus::Skipped] {
            assert!(matches!(can_start(status), Err(ApiError::InvalidTransition(_))));
        }
    }

    #[test]
    fn decide_requires_completed_and_undecided() {
        assert!(can_decide(TaskStatus::Completed, Decision::Unset).is_ok());
    }

    #[test]
    fn decide_twice_is_rejected() {
        // Double-approval guard: a decided instance can never be decided again.
        for decided in [Decision::Approved, Decision::Rejected] {
            assert!(matches!(
                can_decide(TaskStatus::Completed, decided),
                Err(ApiError::InvalidTransition(_))
            ));
        }
    }

    #[test]
    fn decide_from_non_completed_is_rejected() {
        for status in [TaskStatus::Planned, TaskStatus::InProgress, TaskStatus::Skipped] {
            assert!(matches!(
                can_decide(status, Decision::Unset),
                Err(ApiError::InvalidTransition(_))
            ));
        }
    }

    #[test]
    fn evidence_not_required_accepts_empty() {
        assert!(evidence_satisfies(false, &["text".into()], &[]).is_ok());
    }

    #[test]
    fn evidence_required_rejects_empty() {
        assert!(matches!(
            evidence_satisfies(true, &["text".into()], &[]),
            Err(ApiError::EvidenceRequired)
        ));
    }

    #[test]
    fn evidence_required_rejects_wrong_kind() {
        // Template accepts photos only; a text note does not count.
        assert!(matches!(
            evidence_satisfies(true, &["photo".into()], &[text_evidence()]),
            Err(ApiError::EvidenceRequired)
        ));
    }

    #[test]
    fn evidence_required_accepts_matching_kind() {
        let items = [text_evidence(), photo_evidence()];
        assert!(evidence_satisfies(true, &["photo".into()], &items).is_ok());
    }

    #[test]
    fn evidence_item_roundtrips_through_json() {
        let item = photo_evidence();
        let value = serde_json::to_value(&item).unwrap();
        assert_eq!(value["kind"], "photo");
        let back: EvidenceItem = serde_json::from_value(value).unwrap();
        assert_eq!(back.kind, EvidenceKind::Photo);
        assert_eq!(back.content, item.content);
    }
}
