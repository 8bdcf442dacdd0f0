//! Clock & Delay Arithmetic.
//!
//! Pure conversions between the workflow JSON's `{amount, unit}` delay shape
//! and milliseconds, plus the day/ISO-week boundary math the Rate-Limit
//! Controller needs. Nothing in this module touches a clock source directly
//! except through the `now: DateTime<Utc>` arguments callers pass in, so the
//! whole module is unit-testable without freezing real time.

use chrono::{DateTime, Datelike, Duration, NaiveDate, NaiveTime, TimeZone, Utc};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DelayUnit {
    S,
    M,
    H,
    D,
    W,
}

impl DelayUnit {
    fn millis_per_unit(self) -> i64 {
        match self {
            DelayUnit::S => 1_000,
            DelayUnit::M => 60_000,
            DelayUnit::H => 3_600_000,
            DelayUnit::D => 86_400_000,
            DelayUnit::W => 7 * 86_400_000,
        }
    }
}

impl std::str::FromStr for DelayUnit {
    type Err = ();

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "s" => Ok(DelayUnit::S),
            "m" => Ok(DelayUnit::M),
            "h" => Ok(DelayUnit::H),
            "d" => Ok(DelayUnit::D),
            "w" => Ok(DelayUnit::W),
            _ => Err(()),
        }
    }
}

/// Converts `{amount, unit}` to milliseconds. Returns `0` for a malformed
/// amount or an unknown unit rather than erroring — callers (the Graph
/// Navigator) treat a malformed delay as "no delay".
pub fn delay_to_millis(amount: &str, unit: &str) -> i64 {
    let amount: i64 = match amount.parse() {
        Ok(v) if v >= 0 => v,
        _ => return 0,
    };
    let unit: DelayUnit = match unit.parse() {
        Ok(u) => u,
        Err(_) => return 0,
    };
    amount * unit.millis_per_unit()
}

/// Local-date boundary check used by the day counter reset: true once the
/// calendar date has advanced since the last reset. "Local" is treated as
/// UTC-calendar-date, since the engine has no per-campaign timezone in the
/// data model; this is recorded as an explicit decision in DESIGN.md.
pub fn is_new_day(now: DateTime<Utc>, last_reset: DateTime<Utc>) -> bool {
    now.date_naive() > last_reset.date_naive()
}

/// ISO week (Mon-starting, UTC) boundary check: true once the year has
/// advanced or the week number has increased since the last reset.
pub fn is_new_iso_week(now: DateTime<Utc>, last_reset: DateTime<Utc>) -> bool {
    let now_iso = now.iso_week();
    let last_iso = last_reset.iso_week();
    (now_iso.year(), now_iso.week()) > (last_iso.year(), last_iso.week())
}

/// Next local midnight strictly after `now`.
pub fn next_day_reset(now: DateTime<Utc>) -> DateTime<Utc> {
    let next_date = now.date_naive() + Duration::days(1);
    Utc.from_utc_datetime(&next_date.and_time(NaiveTime::MIN))
}

/// Next Monday 00:00 UTC strictly after `now`.
pub fn next_week_reset(now: DateTime<Utc>) -> DateTime<Utc> {
    let today = now.date_naive();
    let days_until_next_monday = match today.weekday().num_days_from_monday() {
        0 => 7,
        n => 7 - n,
    };
    let next_monday = today + Duration::days(days_until_next_monday as i64);
    Utc.from_utc_datetime(&next_monday.and_time(NaiveTime::MIN))
}

/// Convenience used throughout the executor: `execute_after` is stored as
/// Unix seconds, while most other timestamps are `DateTime<Utc>`.
pub fn to_unix_seconds(dt: DateTime<Utc>) -> i64 {
    dt.timestamp()
}

pub fn millis_to_unix_seconds(millis: i64) -> i64 {
    millis.div_euclid(1000)
}

/// Helper used in a couple of places to build a `NaiveDate`-keyed string for
/// logging/debugging without leaking chrono internals further than needed.
pub fn date_string(dt: DateTime<Utc>) -> String {
    dt.date_naive().to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn delay_conversion_covers_all_units() {
        assert_eq!(delay_to_millis("5", "s"), 5_000);
        assert_eq!(delay_to_millis("2", "m"), 120_000);
        assert_eq!(delay_to_millis("1", "h"), 3_600_000);
        assert_eq!(delay_to_millis("2", "d"), 172_800_000);
        assert_eq!(delay_to_millis("1", "w"), 604_800_000);
    }

    #[test]
    fn delay_conversion_defaults_to_zero_on_malformed_input() {
        assert_eq!(delay_to_millis("not-a-number", "d"), 0);
        assert_eq!(delay_to_millis("3", "fortnights"), 0);
        assert_eq!(delay_to_millis("-1", "d"), 0);
    }

    #[test]
    fn day_boundary_detects_calendar_change_only() {
        let d1 = Utc.with_ymd_and_hms(2026, 7, 28, 23, 59, 0).unwrap();
        let d2 = Utc.with_ymd_and_hms(2026, 7, 28, 23, 0, 0).unwrap();
        assert!(!is_new_day(d1, d2));

        let d3 = Utc.with_ymd_and_hms(2026, 7, 29, 0, 0, 1).unwrap();
        assert!(is_new_day(d3, d2));
    }

    #[test]
    fn iso_week_boundary_crosses_monday() {
        // 2026-07-28 is a Tuesday; the following Monday is 2026-08-03.
        let before = Utc.with_ymd_and_hms(2026, 7, 28, 10, 0, 0).unwrap();
        let after_monday = Utc.with_ymd_and_hms(2026, 8, 3, 0, 0, 1).unwrap();
        assert!(!is_new_iso_week(before, before));
        assert!(is_new_iso_week(after_monday, before));
    }

    #[test]
    fn iso_week_boundary_handles_year_rollover() {
        let dec_2025 = Utc.with_ymd_and_hms(2025, 12, 29, 12, 0, 0).unwrap();
        let jan_2026 = Utc.with_ymd_and_hms(2026, 1, 5, 12, 0, 0).unwrap();
        assert!(is_new_iso_week(jan_2026, dec_2025));
    }

    #[test]
    fn next_day_reset_is_midnight_strictly_after_now() {
        let now = Utc.with_ymd_and_hms(2026, 7, 28, 15, 30, 0).unwrap();
        let reset = next_day_reset(now);
        assert_eq!(reset, Utc.with_ymd_and_hms(2026, 7, 29, 0, 0, 0).unwrap());
    }

    #[test]
    fn next_week_reset_lands_on_monday() {
        let tuesday = Utc.with_ymd_and_hms(2026, 7, 28, 15, 30, 0).unwrap();
        let reset = next_week_reset(tuesday);
        assert_eq!(reset, Utc.with_ymd_and_hms(2026, 8, 3, 0, 0, 0).unwrap());

        let monday = Utc.with_ymd_and_hms(2026, 8, 3, 0, 0, 0).unwrap();
        let reset2 = next_week_reset(monday);
        assert_eq!(reset2, Utc.with_ymd_and_hms(2026, 8, 10, 0, 0, 0).unwrap());
    }
}
