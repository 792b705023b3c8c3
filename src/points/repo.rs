use serde::Serialize;
use sqlx::{FromRow, PgExecutor, PgPool};
use time::{Date, OffsetDateTime};
use uuid::Uuid;

use crate::error::ApiError;
use crate::points::engine::{BonusRule, Multipliers};
use crate::tasks::repo::Category;

/// Versioned configuration governing point computation for one activity.
/// Settlement always reads the row active at decision time and stamps the
/// version it used onto the resulting ledger entry.
#[derive(Debug, Clone, Serialize)]
pub struct PointsRule {
    pub id: Uuid,
    pub category: Category,
    pub activity: String,
    pub base_points: i32,
    pub bonus_rules: Vec<BonusRule>,
    pub multipliers: Option<Multipliers>,
    pub daily_limit: Option<i32>,
    pub version: i32,
    pub is_active: bool,
    pub created_at: OffsetDateTime,
    pub updated_at: OffsetDateTime,
}

#[derive(Debug, FromRow)]
struct PointsRuleRow {
    id: Uuid,
    category: Category,
    activity: String,
    base_points: i32,
    bonus_rules: serde_json::Value,
    multipliers: Option<serde_json::Value>,
    daily_limit: Option<i32>,
    version: i32,
    is_active: bool,
    created_at: OffsetDateTime,
    updated_at: OffsetDateTime,
}

impl TryFrom<PointsRuleRow> for PointsRule {
    type Error = anyhow::Error;

    fn try_from(r: PointsRuleRow) -> Result<Self, Self::Error> {
        Ok(Self {
            id: r.id,
            category: r.category,
            activity: r.activity,
            base_points: r.base_points,
            bonus_rules: serde_json::from_value(r.bonus_rules)?,
            multipliers: r.multipliers.map(serde_json::from_value).transpose()?,
            daily_limit: r.daily_limit,
            version: r.version,
            is_active: r.is_active,
            created_at: r.created_at,
            updated_at: r.updated_at,
        })
    }
}

const RULE_COLUMNS: &str = r#"
    id, category, activity, base_points, bonus_rules, multipliers,
    daily_limit, version, is_active, created_at, updated_at
"#;

/// The rule currently in force for (category, activity), if any.
pub async fn find_active<'e>(
    ex: impl PgExecutor<'e>,
    category: Category,
    activity: &str,
) -> Result<Option<PointsRule>, ApiError> {
    let row = sqlx::query_as::<_, PointsRuleRow>(&format!(
        r#"
        SELECT {RULE_COLUMNS}
        FROM points_rules
        WHERE category = $1 AND activity = $2 AND is_active
        ORDER BY version DESC
        LIMIT 1
        "#
    ))
    .bind(category)
    .bind(activity)
    .fetch_optional(ex)
    .await?;
    row.map(PointsRule::try_from)
        .transpose()
        .map_err(ApiError::Internal)
}

pub async fn list(db: &PgPool, include_inactive: bool) -> Result<Vec<PointsRule>, ApiError> {
    let rows = sqlx::query_as::<_, PointsRuleRow>(&format!(
        r#"
        SELECT {RULE_COLUMNS}
        FROM points_rules
        WHERE is_active OR $1
        ORDER BY category, activity
        "#
    ))
    .bind(include_inactive)
    .fetch_all(db)
    .await?;
    rows.into_iter()
        .map(|r| PointsRule::try_from(r).map_err(ApiError::Internal))
        .collect()
}

pub struct NewPointsRule {
    pub category: Category,
    pub activity: String,
    pub base_points: i32,
    pub bonus_rules: Vec<BonusRule>,
    pub multipliers: Option<Multipliers>,
    pub daily_limit: Option<i32>,
}

pub async fn create(db: &PgPool, rule: NewPointsRule) -> Result<PointsRule, ApiError> {
    let bonus_rules = serde_json::to_value(&rule.bonus_rules).map_err(anyhow::Error::from)?;
    let multipliers = rule
        .multipliers
        .as_ref()
        .map(serde_json::to_value)
        .transpose()
        .map_err(anyhow::Error::from)?;

    let row = sqlx::query_as::<_, PointsRuleRow>(&format!(
        r#"
        INSERT INTO points_rules
            (category, activity, base_points, bonus_rules, multipliers, daily_limit)
        VALUES ($1, $2, $3, $4, $5, $6)
        RETURNING {RULE_COLUMNS}
        "#
    ))
    .bind(rule.category)
    .bind(&rule.activity)
    .bind(rule.base_points)
    .bind(bonus_rules)
    .bind(multipliers)
    .bind(rule.daily_limit)
    .fetch_one(db)
    .await?;
    PointsRule::try_from(row).map_err(ApiError::Internal)
}

#[derive(Default)]
pub struct RuleChanges {
    pub base_points: Option<i32>,
    pub bonus_rules: Option<Vec<BonusRule>>,
    pub multipliers: Option<Multipliers>,
    pub daily_limit: Option<Option<i32>>,
    pub is_active: Option<bool>,
}

/// Apply changes and bump the version so ledger stamps stay meaningful.
pub async fn update(db: &PgPool, id: Uuid, changes: RuleChanges) -> Result<PointsRule, ApiError> {
    let bonus_rules = changes
        .bonus_rules
        .as_ref()
        .map(serde_json::to_value)
        .transpose()
        .map_err(anyhow::Error::from)?;
    let multipliers = changes
        .multipliers
        .as_ref()
        .map(serde_json::to_value)
        .transpose()
        .map_err(anyhow::Error::from)?;

    let row = sqlx::query_as::<_, PointsRuleRow>(&format!(
        r#"
        UPDATE points_rules
        SET base_points = COALESCE($2, base_points),
            bonus_rules = COALESCE($3, bonus_rules),
            multipliers = COALESCE($4, multipliers),
            daily_limit = CASE WHEN $5 THEN $6 ELSE daily_limit END,
            is_active = COALESCE($7, is_active),
            version = version + 1,
            updated_at = now()
        WHERE id = $1
        RETURNING {RULE_COLUMNS}
        "#
    ))
    .bind(id)
    .bind(changes.base_points)
    .bind(bonus_rules)
    .bind(multipliers)
    .bind(changes.daily_limit.is_some())
    .bind(changes.daily_limit.flatten())
    .bind(changes.is_active)
    .fetch_optional(db)
    .await?
    .ok_or(ApiError::NotFound("points rule"))?;
    PointsRule::try_from(row).map_err(ApiError::Internal)
}

/// Points already settled for this rule on `date`, for the daily cap.
pub async fn settled_on_date<'e>(
    ex: impl PgExecutor<'e>,
    user_id: Uuid,
    rule_id: Uuid,
    date: Date,
) -> Result<i64, ApiError> {
    let sum: i64 = sqlx::query_scalar(
        r#"
        SELECT COALESCE(SUM(amount), 0)::bigint
        FROM ledger_entries
        WHERE user_id = $1
          AND rule_id = $2
          AND entry_date = $3
          AND reason = 'task_settlement'
        "#,
    )
    .bind(user_id)
    .bind(rule_id)
    .bind(date)
    .fetch_one(ex)
    .await?;
    Ok(sum)
}
