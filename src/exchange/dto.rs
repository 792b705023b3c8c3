use serde::{Deserialize, Serialize};
use time::Date;
use uuid::Uuid;

use crate::exchange::engine::ActivityKind;
use crate::exchange::repo::GameTimeExchange;
use crate::exchange::services::{ExchangeGrant, TodayGameTime};

#[derive(Debug, Deserialize)]
pub struct ExchangeRequest {
    pub points: i32,
    #[serde(default = "default_kind")]
    pub activity_kind: ActivityKind,
}

fn default_kind() -> ActivityKind {
    ActivityKind::Normal
}

#[derive(Debug, Serialize)]
pub struct ExchangeGrantResponse {
    pub exchange_id: Uuid,
    pub points_spent: i32,
    pub minutes_granted: i32,
    pub free_grant: bool,
    pub balance_after: i64,
}

impl From<ExchangeGrant> for ExchangeGrantResponse {
    fn from(g: ExchangeGrant) -> Self {
        Self {
            exchange_id: g.exchange.id,
            points_spent: g.points_spent,
            minutes_granted: g.minutes_granted,
            free_grant: g.free_grant,
            balance_after: g.balance_after,
        }
    }
}

#[derive(Debug, Serialize)]
pub struct TodayResponse {
    pub date: Date,
    pub base_minutes: i32,
    pub minutes_granted: i64,
    pub daily_limit: i32,
    pub minutes_remaining: i64,
    pub free_educational_minutes: i32,
    pub free_minutes_used: i64,
    pub exchanges: Vec<GameTimeExchange>,
}

impl From<TodayGameTime> for TodayResponse {
    fn from(t: TodayGameTime) -> Self {
        Self {
            date: t.date,
            base_minutes: t.base_minutes,
            minutes_granted: t.minutes_granted,
            daily_limit: t.daily_limit,
            minutes_remaining: t.minutes_remaining,
            free_educational_minutes: t.free_educational_minutes,
            free_minutes_used: t.free_minutes_used,
            exchanges: t.exchanges,
        }
    }
}

/// Config install payload; defaults mirror the seeded configuration.
#[derive(Debug, Deserialize)]
pub struct ConfigRequest {
    #[serde(default = "d_base_minutes")]
    pub base_game_time_minutes: i32,
    #[serde(default = "d_ratio")]
    pub points_to_minutes_ratio: f64,
    #[serde(default = "d_edu_bonus")]
    pub educational_game_bonus: f64,
    #[serde(default = "d_daily_limit")]
    pub daily_game_time_limit: i32,
    #[serde(default = "d_free_edu")]
    pub free_educational_minutes: i32,
    #[serde(default = "d_weekly")]
    pub weekly_accumulation_limit: i32,
    #[serde(default = "d_daily_points")]
    pub daily_points_limit: i32,
}

fn d_base_minutes() -> i32 {
    30
}
fn d_ratio() -> f64 {
    5.0
}
fn d_edu_bonus() -> f64 {
    2.0
}
fn d_daily_limit() -> i32 {
    120
}
fn d_free_edu() -> i32 {
    20
}
fn d_weekly() -> i32 {
    100
}
fn d_daily_points() -> i32 {
    20
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn exchange_request_defaults_to_normal_kind() {
        let req: ExchangeRequest = serde_json::from_str(r#"{"points": 10}"#).unwrap();
        assert_eq!(req.activity_kind, ActivityKind::Normal);

        let req: ExchangeRequest =
            serde_json::from_str(r#"{"points": 10, "activity_kind": "educational"}"#).unwrap();
        assert_eq!(req.activity_kind, ActivityKind::Educational);
    }

    #[test]
    fn config_request_fills_defaults() {
        let req: ConfigRequest = serde_json::from_str(r#"{}"#).unwrap();
        assert_eq!(req.points_to_minutes_ratio, 5.0);
        assert_eq!(req.daily_game_time_limit, 120);
        assert_eq!(req.weekly_accumulation_limit, 100);
    }
}
