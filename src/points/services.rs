use sqlx::{Postgres, Transaction};
use tracing::info;

use crate::auth::repo::User;
use crate::daily::repo::{self as daily_repo, TaskInstance};
use crate::error::ApiError;
use crate::points::engine::{self, SettlementInput};
use crate::points::ledger::{self, LedgerReason, NewLedgerEntry};
use crate::points::repo::{self, PointsRule};
use crate::tasks::repo::TaskTemplate;

#[derive(Debug, Clone, Copy)]
pub struct SettlementOutcome {
    pub amount: i32,
    /// False when the instance had already been settled and this call was a
    /// no-op returning the recorded amount.
    pub newly_settled: bool,
}

/// Where the numbers come from when settling: a matching active rule, or the
/// template's own base points when no rule exists for the activity.
#[derive(Debug)]
pub enum RuleSource {
    Rule(PointsRule),
    TemplateFallback { base_points: i32 },
}

/// The fallback is the template's own base value, never a constant. Only when
/// neither a rule nor a template base is available does resolution fail.
pub fn resolve_source(
    rule: Option<PointsRule>,
    template_base: Option<i32>,
    category: &str,
    activity: &str,
) -> Result<RuleSource, ApiError> {
    match (rule, template_base) {
        (Some(rule), _) => Ok(RuleSource::Rule(rule)),
        (None, Some(base_points)) => Ok(RuleSource::TemplateFallback { base_points }),
        (None, None) => Err(ApiError::RuleNotFound {
            category: category.to_string(),
            activity: activity.to_string(),
        }),
    }
}

/// Compute and post points for an approved instance. Runs inside the approval
/// transaction: any failure here rolls the decision back as well, so a
/// settlement can never half-happen.
///
/// Idempotent per instance: an already-settled instance returns its recorded
/// amount and posts nothing.
pub async fn settle_approved(
    tx: &mut Transaction<'_, Postgres>,
    instance: &TaskInstance,
    template: &TaskTemplate,
    child: &User,
) -> Result<SettlementOutcome, ApiError> {
    if let Some(existing) = instance.points_earned {
        return Ok(SettlementOutcome { amount: existing, newly_settled: false });
    }

    let rule = repo::find_active(&mut **tx, template.category, &template.activity).await?;
    let source = resolve_source(
        rule,
        Some(template.base_points),
        template.category.as_str(),
        &template.activity,
    )?;

    let metrics = instance.submission_metrics()?;
    let evidence = instance.evidence_items()?;
    let input = SettlementInput {
        difficulty: template.difficulty,
        metrics: &metrics,
        evidence: &evidence,
        medals: child.medals(),
    };

    let (amount, rule_stamp) = match &source {
        RuleSource::Rule(rule) => {
            let breakdown = engine::compute(
                rule.base_points,
                &rule.bonus_rules,
                rule.multipliers.as_ref(),
                &input,
            );
            let settled = match rule.daily_limit {
                Some(_) => {
                    repo::settled_on_date(&mut **tx, child.id, rule.id, instance.date).await?
                }
                None => 0,
            };
            let amount = engine::clamp_to_daily_limit(breakdown.total, rule.daily_limit, settled);
            (amount, Some((rule.id, rule.version)))
        }
        RuleSource::TemplateFallback { base_points } => {
            let breakdown = engine::compute(*base_points, &[], None, &input);
            (breakdown.total, None)
        }
    };

    ledger::insert(
        &mut **tx,
        NewLedgerEntry {
            user_id: child.id,
            amount,
            reason: LedgerReason::TaskSettlement,
            task_instance_id: Some(instance.id),
            exchange_id: None,
            rule_id: rule_stamp.map(|(id, _)| id),
            rule_version: rule_stamp.map(|(_, v)| v),
            entry_date: instance.date,
            note: Some(template.title.clone()),
        },
    )
    .await?;

    let stamped = daily_repo::stamp_points(&mut **tx, instance.id, amount).await?;
    if stamped == 0 {
        // The conditional decision write serializes settlements; reaching
        // this means the instance was settled outside it. Abort the tx.
        return Err(ApiError::InvalidTransition("instance is already settled"));
    }

    info!(
        instance_id = %instance.id,
        child_id = %child.id,
        amount,
        rule = ?rule_stamp,
        "task settled"
    );
    Ok(SettlementOutcome { amount, newly_settled: true })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fallback_uses_template_base_points() {
        let source = resolve_source(None, Some(25), "learning", "math_practice").unwrap();
        match source {
            RuleSource::TemplateFallback { base_points } => assert_eq!(base_points, 25),
            RuleSource::Rule(_) => panic!("expected template fallback"),
        }
    }

    #[test]
    fn resolution_fails_without_rule_or_template() {
        let err = resolve_source(None, None, "learning", "math_practice").unwrap_err();
        match err {
            ApiError::RuleNotFound { category, activity } => {
                assert_eq!(category, "learning");
                assert_eq!(activity, "math_practice");
            }
            other => panic!("unexpected error: {other}"),
        }
    }
}
