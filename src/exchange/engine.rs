//! Quote computation for points → game-time exchanges.
//!
//! Side-effect free; the service supplies the config snapshot and the day's
//! and week's running totals, and posts whatever is quoted here atomically.

use serde::{Deserialize, Serialize};
use time::{Date, Duration};

use crate::error::ApiError;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[serde(rename_all = "lowercase")]
#[sqlx(rename_all = "lowercase")]
pub enum ActivityKind {
    Normal,
    Educational,
}

#[derive(Debug, Clone)]
pub struct QuoteInput {
    pub requested_points: i32,
    pub kind: ActivityKind,
    pub points_to_minutes_ratio: f64,
    pub educational_game_bonus: f64,
    /// Free educational minutes still available today.
    pub free_minutes_remaining: i32,
    /// Daily game-time cap minus minutes already granted today.
    pub daily_minutes_remaining: i32,
    /// Weekly spend cap minus points already spent this week.
    pub weekly_points_remaining: i64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ExchangeQuote {
    pub points_charged: i32,
    pub minutes_granted: i32,
    pub free_grant: bool,
}

/// Balance gate: the request is refused outright when it exceeds the current
/// ledger balance, before any clamping.
pub fn ensure_funds(requested_points: i32, balance: i64) -> Result<(), ApiError> {
    if i64::from(requested_points) > balance {
        return Err(ApiError::InsufficientBalance {
            balance,
            requested: i64::from(requested_points),
        });
    }
    Ok(())
}

fn effective_ratio(input: &QuoteInput) -> f64 {
    match input.kind {
        ActivityKind::Normal => input.points_to_minutes_ratio,
        ActivityKind::Educational => input.points_to_minutes_ratio * input.educational_game_bonus,
    }
}

pub fn quote(input: &QuoteInput) -> Result<ExchangeQuote, ApiError> {
    if input.requested_points <= 0 {
        return Err(ApiError::BadRequest("points must be positive".into()));
    }
    let ratio = effective_ratio(input);
    if ratio <= 0.0 {
        return Err(ApiError::BadRequest("conversion ratio is not positive".into()));
    }

    // Educational requests that fit entirely in today's free pool cost
    // nothing. The daily cap still binds.
    let raw_minutes = (f64::from(input.requested_points) * ratio).floor() as i32;
    if input.kind == ActivityKind::Educational
        && raw_minutes > 0
        && raw_minutes <= input.free_minutes_remaining
        && raw_minutes <= input.daily_minutes_remaining
    {
        return Ok(ExchangeQuote {
            points_charged: 0,
            minutes_granted: raw_minutes,
            free_grant: true,
        });
    }

    let spendable = i64::from(input.requested_points).min(input.weekly_points_remaining);
    if spendable <= 0 {
        return Err(ApiError::LimitExceeded { scope: "weekly exchange" });
    }

    let minutes = (spendable as f64 * ratio).floor() as i32;
    if minutes <= 0 {
        return Err(ApiError::BadRequest(
            "requested points convert to less than one minute".into(),
        ));
    }

    let granted = minutes.min(input.daily_minutes_remaining);
    if granted <= 0 {
        return Err(ApiError::LimitExceeded { scope: "daily game time" });
    }

    // When the daily cap truncates the grant, charge only for what was
    // granted; never points for clamped-away minutes.
    let charged = if granted < minutes {
        ((f64::from(granted) / ratio).ceil() as i64).clamp(1, spendable) as i32
    } else {
        spendable as i32
    };

    Ok(ExchangeQuote {
        points_charged: charged,
        minutes_granted: granted,
        free_grant: false,
    })
}

/// Monday-through-Sunday bounds of the week containing `d`.
pub fn week_bounds(d: Date) -> (Date, Date) {
    let days_from_monday = i64::from(d.weekday().number_days_from_monday());
    let start = d - Duration::days(days_from_monday);
    (start, start + Duration::days(6))
}

#[cfg(test)]
mod tests {
    use super::*;
    use time::macros::date;

    fn base_input(points: i32, kind: ActivityKind) -> QuoteInput {
        QuoteInput {
            requested_points: points,
            kind,
            points_to_minutes_ratio: 5.0,
            educational_game_bonus: 2.0,
            free_minutes_remaining: 0,
            daily_minutes_remaining: 120,
            weekly_points_remaining: 100,
        }
    }

    #[test]
    fn normal_exchange_converts_at_base_ratio() {
        let q = quote(&base_input(10, ActivityKind::Normal)).unwrap();
        assert_eq!(q, ExchangeQuote { points_charged: 10, minutes_granted: 50, free_grant: false });
    }

    #[test]
    fn educational_exchange_applies_bonus_factor() {
        let q = quote(&base_input(5, ActivityKind::Educational)).unwrap();
        assert_eq!(q.minutes_granted, 50);
        assert_eq!(q.points_charged, 5);
    }

    #[test]
    fn educational_request_within_free_pool_costs_nothing() {
        let mut input = base_input(2, ActivityKind::Educational);
        input.free_minutes_remaining = 20;
        // 2 points * 10 min/point = 20 minutes, exactly the free pool.
        let q = quote(&input).unwrap();
        assert_eq!(q, ExchangeQuote { points_charged: 0, minutes_granted: 20, free_grant: true });
    }

    #[test]
    fn educational_request_beyond_free_pool_is_paid() {
        let mut input = base_input(5, ActivityKind::Educational);
        input.free_minutes_remaining = 20;
        let q = quote(&input).unwrap();
        assert!(!q.free_grant);
        assert_eq!(q.points_charged, 5);
        assert_eq!(q.minutes_granted, 50);
    }

    #[test]
    fn fractional_ratio_floors_minutes() {
        let mut input = base_input(100, ActivityKind::Normal);
        input.points_to_minutes_ratio = 0.5;
        let q = quote(&input).unwrap();
        assert_eq!(q.minutes_granted, 50);

        input.requested_points = 1;
        let err = quote(&input).unwrap_err();
        assert!(matches!(err, ApiError::BadRequest(_)));
    }

    #[test]
    fn weekly_cap_clamps_spendable_points() {
        let mut input = base_input(10, ActivityKind::Normal);
        input.weekly_points_remaining = 4;
        let q = quote(&input).unwrap();
        assert_eq!(q.points_charged, 4);
        assert_eq!(q.minutes_granted, 20);
    }

    #[test]
    fn weekly_cap_exhausted_rejects() {
        let mut input = base_input(10, ActivityKind::Normal);
        input.weekly_points_remaining = 0;
        assert!(matches!(
            quote(&input),
            Err(ApiError::LimitExceeded { scope: "weekly exchange" })
        ));
    }

    #[test]
    fn daily_cap_truncates_grant_and_charge() {
        let mut input = base_input(10, ActivityKind::Normal);
        input.daily_minutes_remaining = 30;
        // 10 points would be 50 minutes; only 30 fit, costing ceil(30/5)=6.
        let q = quote(&input).unwrap();
        assert_eq!(q.minutes_granted, 30);
        assert_eq!(q.points_charged, 6);
    }

    #[test]
    fn daily_cap_exhausted_rejects() {
        let mut input = base_input(10, ActivityKind::Normal);
        input.daily_minutes_remaining = 0;
        assert!(matches!(
            quote(&input),
            Err(ApiError::LimitExceeded { scope: "daily game time" })
        ));
    }

    #[test]
    fn zero_or_negative_points_rejected() {
        assert!(matches!(
            quote(&base_input(0, ActivityKind::Normal)),
            Err(ApiError::BadRequest(_))
        ));
        assert!(matches!(
            quote(&base_input(-3, ActivityKind::Normal)),
            Err(ApiError::BadRequest(_))
        ));
    }

    #[test]
    fn ensure_funds_rejects_overdraft() {
        // Balance 40, request 100: refused, nothing changes.
        let err = ensure_funds(100, 40).unwrap_err();
        assert!(matches!(err, ApiError::InsufficientBalance { balance: 40, requested: 100 }));
        assert!(ensure_funds(40, 40).is_ok());
    }

    #[test]
    fn week_bounds_are_monday_through_sunday() {
        // 2025-06-11 is a Wednesday.
        let (start, end) = week_bounds(date!(2025 - 06 - 11));
        assert_eq!(start, date!(2025 - 06 - 09));
        assert_eq!(end, date!(2025 - 06 - 15));

        // Monday and Sunday map onto their own week.
        assert_eq!(week_bounds(date!(2025 - 06 - 09)).0, date!(2025 - 06 - 09));
        assert_eq!(week_bounds(date!(2025 - 06 - 15)).1, date!(2025 - 06 - 15));
    }
}
