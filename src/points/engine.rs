//! Points computation for an approved task instance.
//!
//! Everything here is side-effect free: the settlement service resolves the
//! rule and the day's already-settled total, and this module turns those into
//! an amount. Order is fixed: base, then bonus conditions in stored order,
//! then multipliers (difficulty, quality, medal tier), with a single rounding
//! step after the last multiplier, then the per-rule daily cap.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};

use crate::daily::lifecycle::{EvidenceItem, EvidenceKind, SubmissionMetrics};
use crate::tasks::repo::Difficulty;

/// Streak medals held by the child; each held tier compounds its multiplier.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Medals {
    pub bronze: bool,
    pub silver: bool,
    pub gold: bool,
    pub diamond: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BonusKind {
    /// Repeating: every `threshold` words adds `bonus_points`.
    WordCount,
    /// Repeating: every `threshold` minutes adds `bonus_points`.
    DurationMinutes,
    /// Flag: quality was reported with the submission.
    Quality,
    /// Flag: the child finished ahead of plan.
    Completion,
    /// Flag: the evidence contains at least one photo.
    PhotoEvidence,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BonusRule {
    pub kind: BonusKind,
    pub threshold: i32,
    pub bonus_points: i32,
    #[serde(default)]
    pub max_bonus: Option<i32>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct MedalMultipliers {
    #[serde(default)]
    pub bronze: Option<f64>,
    #[serde(default)]
    pub silver: Option<f64>,
    #[serde(default)]
    pub gold: Option<f64>,
    #[serde(default)]
    pub diamond: Option<f64>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Multipliers {
    #[serde(default)]
    pub difficulty: Option<HashMap<String, f64>>,
    #[serde(default)]
    pub quality: Option<HashMap<String, f64>>,
    #[serde(default)]
    pub medal: Option<MedalMultipliers>,
}

const DEFAULT_BRONZE: f64 = 1.1;
const DEFAULT_SILVER: f64 = 1.2;
const DEFAULT_GOLD: f64 = 1.3;
const DEFAULT_DIAMOND: f64 = 1.4;

/// What the instance brings to the table at settlement time.
#[derive(Debug)]
pub struct SettlementInput<'a> {
    pub difficulty: Difficulty,
    pub metrics: &'a SubmissionMetrics,
    pub evidence: &'a [EvidenceItem],
    pub medals: Medals,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Breakdown {
    pub base: i32,
    pub bonus: i32,
    /// Base + bonuses with multipliers applied, before the daily cap.
    pub total: i32,
}

fn bonus_amount(rule: &BonusRule, input: &SettlementInput<'_>) -> i32 {
    let raw = match rule.kind {
        BonusKind::WordCount => repeating_bonus(rule, input.metrics.word_count),
        BonusKind::DurationMinutes => repeating_bonus(rule, input.metrics.duration_minutes),
        BonusKind::Quality => flag_bonus(rule, input.metrics.quality.is_some()),
        BonusKind::Completion => flag_bonus(rule, input.metrics.completed_early),
        BonusKind::PhotoEvidence => flag_bonus(
            rule,
            input.evidence.iter().any(|e| e.kind == EvidenceKind::Photo),
        ),
    };
    match rule.max_bonus {
        Some(cap) => raw.min(cap),
        None => raw,
    }
}

fn repeating_bonus(rule: &BonusRule, value: Option<i32>) -> i32 {
    match value {
        Some(v) if rule.threshold > 0 && v >= rule.threshold => {
            (v / rule.threshold) * rule.bonus_points
        }
        _ => 0,
    }
}

fn flag_bonus(rule: &BonusRule, triggered: bool) -> i32 {
    if triggered {
        rule.bonus_points
    } else {
        0
    }
}

fn medal_factor(table: &MedalMultipliers, medals: Medals) -> f64 {
    let mut factor = 1.0;
    if medals.bronze {
        factor *= table.bronze.unwrap_or(DEFAULT_BRONZE);
    }
    if medals.silver {
        factor *= table.silver.unwrap_or(DEFAULT_SILVER);
    }
    if medals.gold {
        factor *= table.gold.unwrap_or(DEFAULT_GOLD);
    }
    if medals.diamond {
        factor *= table.diamond.unwrap_or(DEFAULT_DIAMOND);
    }
    factor
}

pub fn compute(
    base_points: i32,
    bonus_rules: &[BonusRule],
    multipliers: Option<&Multipliers>,
    input: &SettlementInput<'_>,
) -> Breakdown {
    let bonus: i32 = bonus_rules.iter().map(|r| bonus_amount(r, input)).sum();

    let mut total = (base_points + bonus) as f64;
    if let Some(m) = multipliers {
        if let Some(table) = &m.difficulty {
            total *= table.get(input.difficulty.as_str()).copied().unwrap_or(1.0);
        }
        if let (Some(table), Some(quality)) = (&m.quality, input.metrics.quality.as_deref()) {
            total *= table.get(quality).copied().unwrap_or(1.0);
        }
        if let Some(table) = &m.medal {
            total *= medal_factor(table, input.medals);
        }
    }

    Breakdown {
        base: base_points,
        bonus,
        total: total.round() as i32,
    }
}

/// Partial credit up to the rule's per-day cap; never negative.
pub fn clamp_to_daily_limit(raw: i32, daily_limit: Option<i32>, settled_today: i64) -> i32 {
    match daily_limit {
        None => raw,
        Some(limit) => {
            let remaining = (i64::from(limit) - settled_today).max(0);
            raw.min(remaining as i32)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use time::OffsetDateTime;

    fn photo() -> EvidenceItem {
        EvidenceItem {
            kind: EvidenceKind::Photo,
            content: "photos/worksheet.jpg".into(),
            recorded_at: OffsetDateTime::now_utc(),
        }
    }

    fn metrics() -> SubmissionMetrics {
        SubmissionMetrics::default()
    }

    fn input<'a>(metrics: &'a SubmissionMetrics, evidence: &'a [EvidenceItem]) -> SettlementInput<'a> {
        SettlementInput {
            difficulty: Difficulty::Medium,
            metrics,
            evidence,
            medals: Medals::default(),
        }
    }

    #[test]
    fn base_points_only() {
        let m = metrics();
        let out = compute(10, &[], None, &input(&m, &[]));
        assert_eq!(out, Breakdown { base: 10, bonus: 0, total: 10 });
    }

    #[test]
    fn photo_bonus_applies_when_evidence_has_photo() {
        // Math practice: base 25, +5 with a photo, no multipliers.
        let rule = BonusRule {
            kind: BonusKind::PhotoEvidence,
            threshold: 1,
            bonus_points: 5,
            max_bonus: None,
        };
        let m = metrics();
        let ev = [photo()];
        let out = compute(25, &[rule.clone()], None, &input(&m, &ev));
        assert_eq!(out.total, 30);

        let out = compute(25, &[rule], None, &input(&m, &[]));
        assert_eq!(out.total, 25);
    }

    #[test]
    fn word_count_bonus_repeats_per_threshold() {
        // Diary: base 2, +1 per 50 words.
        let rule = BonusRule {
            kind: BonusKind::WordCount,
            threshold: 50,
            bonus_points: 1,
            max_bonus: Some(10),
        };
        let m = SubmissionMetrics { word_count: Some(250), ..Default::default() };
        let out = compute(2, &[rule], None, &input(&m, &[]));
        assert_eq!(out.bonus, 5);
        assert_eq!(out.total, 7);
    }

    #[test]
    fn word_count_bonus_is_capped() {
        let rule = BonusRule {
            kind: BonusKind::WordCount,
            threshold: 50,
            bonus_points: 1,
            max_bonus: Some(10),
        };
        let m = SubmissionMetrics { word_count: Some(5000), ..Default::default() };
        let out = compute(2, &[rule], None, &input(&m, &[]));
        assert_eq!(out.bonus, 10);
        assert_eq!(out.total, 12);
    }

    #[test]
    fn duration_below_threshold_earns_nothing() {
        let rule = BonusRule {
            kind: BonusKind::DurationMinutes,
            threshold: 10,
            bonus_points: 1,
            max_bonus: None,
        };
        let m = SubmissionMetrics { duration_minutes: Some(9), ..Default::default() };
        let out = compute(0, &[rule], None, &input(&m, &[]));
        assert_eq!(out.total, 0);
    }

    #[test]
    fn duration_bonus_floors_partial_intervals() {
        let rule = BonusRule {
            kind: BonusKind::DurationMinutes,
            threshold: 10,
            bonus_points: 1,
            max_bonus: None,
        };
        let m = SubmissionMetrics { duration_minutes: Some(35), ..Default::default() };
        let out = compute(0, &[rule], None, &input(&m, &[]));
        assert_eq!(out.total, 3);
    }

    #[test]
    fn zero_threshold_never_divides() {
        let rule = BonusRule {
            kind: BonusKind::WordCount,
            threshold: 0,
            bonus_points: 1,
            max_bonus: None,
        };
        let m = SubmissionMetrics { word_count: Some(100), ..Default::default() };
        let out = compute(1, &[rule], None, &input(&m, &[]));
        assert_eq!(out.total, 1);
    }

    #[test]
    fn bonuses_accumulate_in_order() {
        // Music practice: +1 per 15 minutes, +2 for reported quality.
        let rules = [
            BonusRule {
                kind: BonusKind::DurationMinutes,
                threshold: 15,
                bonus_points: 1,
                max_bonus: None,
            },
            BonusRule {
                kind: BonusKind::Quality,
                threshold: 1,
                bonus_points: 2,
                max_bonus: None,
            },
        ];
        let m = SubmissionMetrics {
            duration_minutes: Some(45),
            quality: Some("excellent".into()),
            ..Default::default()
        };
        let out = compute(0, &rules, None, &input(&m, &[]));
        assert_eq!(out.bonus, 5);
    }

    #[test]
    fn rounding_happens_once_after_all_multipliers() {
        // 5 * 1.3 = 6.5, * 1.3 = 8.45 → 8. Rounding after each step would
        // give round(6.5)=7, 7*1.3=9.1 → 9.
        let multipliers = Multipliers {
            difficulty: Some(HashMap::from([("medium".to_string(), 1.3)])),
            quality: Some(HashMap::from([("good".to_string(), 1.3)])),
            medal: None,
        };
        let m = SubmissionMetrics { quality: Some("good".into()), ..Default::default() };
        let out = compute(5, &[], Some(&multipliers), &input(&m, &[]));
        assert_eq!(out.total, 8);
    }

    #[test]
    fn difficulty_multiplier_uses_instance_difficulty() {
        let multipliers = Multipliers {
            difficulty: Some(HashMap::from([
                ("easy".to_string(), 1.0),
                ("medium".to_string(), 1.2),
                ("hard".to_string(), 1.5),
            ])),
            ..Default::default()
        };
        let m = metrics();
        let mut inp = input(&m, &[]);
        inp.difficulty = Difficulty::Hard;
        let out = compute(10, &[], Some(&multipliers), &inp);
        assert_eq!(out.total, 15);
    }

    #[test]
    fn unknown_difficulty_key_defaults_to_one() {
        let multipliers = Multipliers {
            difficulty: Some(HashMap::from([("hard".to_string(), 1.5)])),
            ..Default::default()
        };
        let m = metrics();
        let out = compute(10, &[], Some(&multipliers), &input(&m, &[]));
        assert_eq!(out.total, 10);
    }

    #[test]
    fn medal_multipliers_compound() {
        let multipliers = Multipliers {
            medal: Some(MedalMultipliers::default()),
            ..Default::default()
        };
        let m = metrics();
        let mut inp = input(&m, &[]);
        inp.medals = Medals { bronze: true, silver: true, ..Default::default() };
        // 10 * 1.1 * 1.2 = 13.2 → 13
        let out = compute(10, &[], Some(&multipliers), &inp);
        assert_eq!(out.total, 13);
    }

    #[test]
    fn medal_table_absent_means_no_streak_boost() {
        let m = metrics();
        let mut inp = input(&m, &[]);
        inp.medals = Medals { diamond: true, ..Default::default() };
        let out = compute(10, &[], None, &inp);
        assert_eq!(out.total, 10);
    }

    #[test]
    fn daily_cap_awards_partial_credit() {
        // Cap 3, 2 already settled today: a raw 3 shrinks to 1.
        assert_eq!(clamp_to_daily_limit(3, Some(3), 2), 1);
    }

    #[test]
    fn daily_cap_exhausted_awards_zero() {
        assert_eq!(clamp_to_daily_limit(5, Some(3), 3), 0);
        assert_eq!(clamp_to_daily_limit(5, Some(3), 7), 0);
    }

    #[test]
    fn no_daily_cap_passes_through() {
        assert_eq!(clamp_to_daily_limit(42, None, 1000), 42);
    }

    #[test]
    fn two_approvals_exceeding_cap_settle_to_exactly_the_cap() {
        // Raw values 2 + 2 against cap 3: first settles 2, second settles 1.
        let cap = Some(3);
        let first = clamp_to_daily_limit(2, cap, 0);
        let second = clamp_to_daily_limit(2, cap, i64::from(first));
        assert_eq!(first + second, 3);
    }

    #[test]
    fn bonus_rules_deserialize_from_stored_json() {
        let raw = serde_json::json!([
            {"kind": "word_count", "threshold": 50, "bonus_points": 1, "max_bonus": 10},
            {"kind": "photo_evidence", "threshold": 1, "bonus_points": 5}
        ]);
        let rules: Vec<BonusRule> = serde_json::from_value(raw).unwrap();
        assert_eq!(rules.len(), 2);
        assert_eq!(rules[0].kind, BonusKind::WordCount);
        assert_eq!(rules[1].max_bonus, None);
    }
}
