use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::points::engine::{BonusRule, Multipliers};
use crate::tasks::repo::Category;

#[derive(Debug, Deserialize)]
pub struct NewRuleRequest {
    pub category: Category,
    pub activity: String,
    pub base_points: i32,
    #[serde(default)]
    pub bonus_rules: Vec<BonusRule>,
    #[serde(default)]
    pub multipliers: Option<Multipliers>,
    #[serde(default)]
    pub daily_limit: Option<i32>,
}

/// Partial update; `daily_limit` distinguishes "leave alone" (absent) from
/// "clear" (null) via the nested Option.
#[derive(Debug, Deserialize)]
pub struct UpdateRuleRequest {
    #[serde(default)]
    pub base_points: Option<i32>,
    #[serde(default)]
    pub bonus_rules: Option<Vec<BonusRule>>,
    #[serde(default)]
    pub multipliers: Option<Multipliers>,
    #[serde(default, deserialize_with = "deserialize_double_option")]
    pub daily_limit: Option<Option<i32>>,
    #[serde(default)]
    pub is_active: Option<bool>,
}

fn deserialize_double_option<'de, D>(de: D) -> Result<Option<Option<i32>>, D::Error>
where
    D: serde::Deserializer<'de>,
{
    Ok(Some(Option::<i32>::deserialize(de)?))
}

#[derive(Debug, Deserialize)]
pub struct RuleListQuery {
    #[serde(default)]
    pub include_inactive: bool,
}

#[derive(Debug, Deserialize)]
pub struct BalanceQuery {
    #[serde(default)]
    pub user_id: Option<Uuid>,
}

#[derive(Debug, Serialize)]
pub struct BalanceResponse {
    pub user_id: Uuid,
    pub balance: i64,
}

#[derive(Debug, Deserialize)]
pub struct LedgerQuery {
    #[serde(default)]
    pub user_id: Option<Uuid>,
    #[serde(default = "default_limit")]
    pub limit: i64,
    #[serde(default)]
    pub offset: i64,
}

fn default_limit() -> i64 {
    20
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn update_request_distinguishes_absent_null_and_value() {
        let absent: UpdateRuleRequest = serde_json::from_str(r#"{}"#).unwrap();
        assert_eq!(absent.daily_limit, None);

        let cleared: UpdateRuleRequest = serde_json::from_str(r#"{"daily_limit": null}"#).unwrap();
        assert_eq!(cleared.daily_limit, Some(None));

        let set: UpdateRuleRequest = serde_json::from_str(r#"{"daily_limit": 3}"#).unwrap();
        assert_eq!(set.daily_limit, Some(Some(3)));
    }
}
