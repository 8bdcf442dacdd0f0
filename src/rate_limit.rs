//! Rate-Limit Controller.
//!
//! Pure over a campaign's counters and reset timestamps. Never throws; a
//! request that can't proceed is deferred by the caller, not rejected.

use crate::clock::{is_new_day, is_new_iso_week, next_day_reset, next_week_reset};
use chrono::{DateTime, Utc};

#[derive(Debug, Clone, Copy)]
pub struct RateLimitConfig {
    pub daily_limit: i32,
    pub weekly_limit: i32,
}

impl Default for RateLimitConfig {
    fn default() -> Self {
        Self {
            daily_limit: 60,
            weekly_limit: 200,
        }
    }
}

impl RateLimitConfig {
    pub fn from_env() -> Self {
        let daily_limit = std::env::var("DAILY_LIMIT")
            .ok()
            .and_then(|v| v.parse().ok())
            .unwrap_or(60);
        let weekly_limit = std::env::var("WEEKLY_LIMIT")
            .ok()
            .and_then(|v| v.parse().ok())
            .unwrap_or(200);
        Self {
            daily_limit,
            weekly_limit,
        }
    }
}

/// The counters and reset timestamps a `check` call reads.
#[derive(Debug, Clone, Copy)]
pub struct CampaignCounters {
    pub requests_sent_this_day: i32,
    pub requests_sent_this_week: i32,
    pub last_daily_requests_reset: DateTime<Utc>,
    pub last_weekly_requests_reset: DateTime<Utc>,
}

/// A patch to apply to the campaign row. Reset fields are `Some` only when
/// a boundary was actually crossed, so a caller can tell "no reset needed"
/// from "reset to zero" without inspecting the counters themselves.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CounterPatch {
    pub reset_day: Option<i32>,
    pub reset_day_at: Option<DateTime<Utc>>,
    pub reset_week: Option<i32>,
    pub reset_week_at: Option<DateTime<Utc>>,
    pub increment_day: i32,
    pub increment_week: i32,
}

impl CounterPatch {
    pub fn is_empty(&self) -> bool {
        self.reset_day.is_none()
            && self.reset_week.is_none()
            && self.increment_day == 0
            && self.increment_week == 0
    }

    /// Merges an increment (e.g. "a connection request was just sent") into
    /// a patch that may already carry a reset, so the two never race as two
    /// separate writes.
    pub fn merge_increment(mut self, day: i32, week: i32) -> Self {
        self.increment_day += day;
        self.increment_week += week;
        self
    }

    /// The counter value a write should persist for the day column, given
    /// the counters the `check` call observed.
    pub fn resulting_day_count(&self, observed: i32) -> i32 {
        let base = self.reset_day.unwrap_or(observed);
        base + self.increment_day
    }

    pub fn resulting_week_count(&self, observed: i32) -> i32 {
        let base = self.reset_week.unwrap_or(observed);
        base + self.increment_week
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RateLimitDecision {
    pub can_proceed: bool,
    /// Milliseconds from `now` until the applicable limit resets — a
    /// duration, not an absolute timestamp. Callers compute
    /// `execute_after = floor((now + wait_until_ms)/1000)`.
    pub wait_until_ms: Option<i64>,
    pub requests_sent_this_day: i32,
    pub requests_sent_this_week: i32,
    pub patch: CounterPatch,
}

/// Decides whether a rate-limited action may proceed for a campaign right now.
pub fn check(now: DateTime<Utc>, counters: CampaignCounters, config: RateLimitConfig) -> RateLimitDecision {
    let mut patch = CounterPatch::default();
    let mut day_count = counters.requests_sent_this_day;
    let mut week_count = counters.requests_sent_this_week;

    if is_new_day(now, counters.last_daily_requests_reset) {
        patch.reset_day = Some(0);
        patch.reset_day_at = Some(now);
        day_count = 0;
    }
    if is_new_iso_week(now, counters.last_weekly_requests_reset) {
        patch.reset_week = Some(0);
        patch.reset_week_at = Some(now);
        week_count = 0;
    }

    if day_count >= config.daily_limit || week_count >= config.weekly_limit {
        let until_day = (next_day_reset(now) - now).num_milliseconds();
        let until_week = (next_week_reset(now) - now).num_milliseconds();
        // The wait is the max of applicable resets; the applicable reset is
        // whichever limit is actually at cap.
        let wait_until_ms = match (day_count >= config.daily_limit, week_count >= config.weekly_limit) {
            (true, true) => until_day.max(until_week),
            (true, false) => until_day,
            (false, true) => until_week,
            (false, false) => unreachable!(),
        };
        return RateLimitDecision {
            can_proceed: false,
            wait_until_ms: Some(wait_until_ms),
            requests_sent_this_day: day_count,
            requests_sent_this_week: week_count,
            patch,
        };
    }

    RateLimitDecision {
        can_proceed: true,
        wait_until_ms: None,
        requests_sent_this_day: day_count,
        requests_sent_this_week: week_count,
        patch,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn counters(day: i32, week: i32, reset_at: DateTime<Utc>) -> CampaignCounters {
        CampaignCounters {
            requests_sent_this_day: day,
            requests_sent_this_week: week,
            last_daily_requests_reset: reset_at,
            last_weekly_requests_reset: reset_at,
        }
    }

    #[test]
    fn proceeds_under_limit() {
        let now = Utc.with_ymd_and_hms(2026, 7, 28, 9, 0, 0).unwrap();
        let decision = check(now, counters(5, 20, now), RateLimitConfig::default());
        assert!(decision.can_proceed);
        assert!(decision.patch.is_empty());
    }

    #[test]
    fn defers_at_daily_cap() {
        let now = Utc.with_ymd_and_hms(2026, 7, 28, 9, 0, 0).unwrap();
        let decision = check(
            now,
            counters(1, 0, now),
            RateLimitConfig {
                daily_limit: 1,
                weekly_limit: 200,
            },
        );
        assert!(!decision.can_proceed);
        let reset_at = Utc.with_ymd_and_hms(2026, 7, 29, 0, 0, 0).unwrap();
        let expected = (reset_at - now).num_milliseconds();
        assert_eq!(decision.wait_until_ms, Some(expected));
    }

    #[test]
    fn detects_day_boundary_and_resets_before_checking_cap() {
        let last_reset = Utc.with_ymd_and_hms(2026, 7, 27, 9, 0, 0).unwrap();
        let now = Utc.with_ymd_and_hms(2026, 7, 28, 9, 0, 0).unwrap();
        let decision = check(
            now,
            counters(60, 0, last_reset),
            RateLimitConfig {
                daily_limit: 60,
                weekly_limit: 200,
            },
        );
        assert!(decision.can_proceed);
        assert_eq!(decision.patch.reset_day, Some(0));
        assert_eq!(decision.requests_sent_this_day, 0);
    }

    #[test]
    fn merge_increment_combines_with_reset_in_one_patch() {
        let last_reset = Utc.with_ymd_and_hms(2026, 7, 27, 9, 0, 0).unwrap();
        let now = Utc.with_ymd_and_hms(2026, 7, 28, 9, 0, 0).unwrap();
        let decision = check(now, counters(30, 100, last_reset), RateLimitConfig::default());
        let patch = decision.patch.merge_increment(1, 1);
        assert_eq!(patch.resulting_day_count(decision.requests_sent_this_day), 1);
        assert_eq!(patch.resulting_week_count(decision.requests_sent_this_week), 101);
    }
}
