use serde::{Deserialize, Serialize};
use time::{Date, OffsetDateTime};
use uuid::Uuid;

use crate::daily::lifecycle::{Decision, EvidenceItem, EvidenceKind, SubmissionMetrics, TaskStatus};
use crate::daily::repo::TaskInstance;

#[derive(Debug, Deserialize)]
pub struct PlanRequest {
    pub template_id: Uuid,
    pub date: Date,
    /// Guardians may plan on behalf of one of their children.
    #[serde(default)]
    pub child_id: Option<Uuid>,
    #[serde(default)]
    pub notes: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct ListQuery {
    #[serde(default)]
    pub child_id: Option<Uuid>,
    #[serde(default)]
    pub date: Option<Date>,
    #[serde(default)]
    pub status: Option<TaskStatus>,
}

/// Evidence as submitted; the server stamps the time.
#[derive(Debug, Deserialize)]
pub struct EvidenceIn {
    pub kind: EvidenceKind,
    pub content: String,
}

#[derive(Debug, Deserialize)]
pub struct CompleteRequest {
    #[serde(default)]
    pub evidence: Vec<EvidenceIn>,
    #[serde(default)]
    pub metrics: SubmissionMetrics,
    #[serde(default)]
    pub notes: Option<String>,
}

impl CompleteRequest {
    pub fn evidence_items(&self, now: OffsetDateTime) -> Vec<EvidenceItem> {
        self.evidence
            .iter()
            .map(|e| EvidenceItem {
                kind: e.kind,
                content: e.content.clone(),
                recorded_at: now,
            })
            .collect()
    }
}

#[derive(Debug, Clone, Copy, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DecisionAction {
    Approve,
    Reject,
}

impl DecisionAction {
    pub fn as_decision(self) -> Decision {
        match self {
            DecisionAction::Approve => Decision::Approved,
            DecisionAction::Reject => Decision::Rejected,
        }
    }
}

#[derive(Debug, Deserialize)]
pub struct DecideRequest {
    pub action: DecisionAction,
    #[serde(default)]
    pub notes: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct InstanceResponse {
    pub id: Uuid,
    pub child_id: Uuid,
    pub template_id: Uuid,
    pub date: Date,
    pub status: TaskStatus,
    pub decision: Decision,
    pub evidence: serde_json::Value,
    pub notes: Option<String>,
    pub completed_at: Option<OffsetDateTime>,
    pub points_earned: Option<i32>,
    pub decided_by: Option<Uuid>,
    pub decided_at: Option<OffsetDateTime>,
    pub decision_notes: Option<String>,
    pub created_at: OffsetDateTime,
}

impl From<TaskInstance> for InstanceResponse {
    fn from(i: TaskInstance) -> Self {
        Self {
            id: i.id,
            child_id: i.child_id,
            template_id: i.template_id,
            date: i.date,
            status: i.status,
            decision: i.decision,
            evidence: i.evidence,
            notes: i.notes,
            completed_at: i.completed_at,
            points_earned: i.points_earned,
            decided_by: i.decided_by,
            decided_at: i.decided_at,
            decision_notes: i.decision_notes,
            created_at: i.created_at,
        }
    }
}

#[derive(Debug, Serialize)]
pub struct DecideResponse {
    pub instance: InstanceResponse,
    /// Present on approval: the settled amount, after caps.
    pub points_awarded: Option<i32>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn decide_request_parses_actions() {
        let approve: DecideRequest =
            serde_json::from_str(r#"{"action": "approve", "notes": "nice work"}"#).unwrap();
        assert!(matches!(approve.action, DecisionAction::Approve));
        assert_eq!(approve.notes.as_deref(), Some("nice work"));

        let reject: DecideRequest = serde_json::from_str(r#"{"action": "reject"}"#).unwrap();
        assert!(matches!(reject.action, DecisionAction::Reject));
        assert!(reject.notes.is_none());
    }

    #[test]
    fn complete_request_defaults_are_empty() {
        let req: CompleteRequest = serde_json::from_str(r#"{}"#).unwrap();
        assert!(req.evidence.is_empty());
        assert!(req.metrics.word_count.is_none());
        assert!(!req.metrics.completed_early);
    }

    #[test]
    fn status_filter_parses_snake_case() {
        let q: ListQuery = serde_json::from_str(r#"{"status": "in_progress"}"#).unwrap();
        assert_eq!(q.status, Some(TaskStatus::InProgress));
    }
}
