//! Weekly login allowance.
//!
//! A user may authenticate at most `weekly_limit` times per Monday-anchored
//! week. The lower bound of "this week" is controlled by [`WeekAnchor`]:
//!
//! - [`WeekAnchor::CurrentTimeOfDay`] walks back to Monday from `now` and keeps
//!   the time-of-day of `now`. A check run Wednesday 14:30 therefore ignores
//!   Monday-morning logins. This is how deployed stores have always been
//!   evaluated and remains the default.
//! - [`WeekAnchor::Midnight`] floors the bound to Monday 00:00.

use super::store::UserRecord;
use chrono::{Datelike, Duration, NaiveDate, NaiveDateTime, NaiveTime};
use serde::Deserialize;

/// Stored timestamp layout (local wall-clock, no offset, microseconds).
const TIMESTAMP_FORMAT: &str = "%Y-%m-%dT%H:%M:%S%.6f";

/// Default number of logins per week.
pub const DEFAULT_WEEKLY_LIMIT: u32 = 3;

/// How the start of the current week is computed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum WeekAnchor {
    /// Monday, at the same time-of-day as `now`.
    #[default]
    CurrentTimeOfDay,
    /// Monday 00:00.
    Midnight,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LoginPolicy {
    weekly_limit: u32,
    anchor: WeekAnchor,
}

impl Default for LoginPolicy {
    fn default() -> Self {
        Self::new(DEFAULT_WEEKLY_LIMIT, WeekAnchor::default())
    }
}

impl LoginPolicy {
    pub fn new(weekly_limit: u32, anchor: WeekAnchor) -> Self {
        Self {
            weekly_limit,
            anchor,
        }
    }

    pub fn weekly_limit(&self) -> u32 {
        self.weekly_limit
    }

    pub fn anchor(&self) -> WeekAnchor {
        self.anchor
    }

    /// Inclusive lower bound of the week containing `now`.
    pub fn week_start(&self, now: NaiveDateTime) -> NaiveDateTime {
        let days_since_monday = i64::from(now.weekday().num_days_from_monday());
        let start = now - Duration::days(days_since_monday);
        match self.anchor {
            WeekAnchor::CurrentTimeOfDay => start,
            WeekAnchor::Midnight => start.date().and_time(NaiveTime::MIN),
        }
    }

    /// Number of recorded logins at or after [`Self::week_start`].
    /// Entries that fail to parse are skipped.
    pub fn logins_this_week(&self, record: &UserRecord, now: NaiveDateTime) -> usize {
        let week_start = self.week_start(now);
        record
            .logins
            .iter()
            .filter_map(|raw| {
                let parsed = parse_timestamp(raw);
                if parsed.is_none() {
                    tracing::warn!(timestamp = %raw, "Ignoring malformed login timestamp");
                }
                parsed
            })
            .filter(|ts| *ts >= week_start)
            .count()
    }

    pub fn can_login(&self, record: &UserRecord, now: NaiveDateTime) -> bool {
        self.allows(self.logins_this_week(record, now))
    }

    /// Logins left before the weekly cap is hit.
    pub fn remaining(&self, record: &UserRecord, now: NaiveDateTime) -> u32 {
        self.remaining_after(self.logins_this_week(record, now))
    }

    /// Whether another login fits after `used` logins this week.
    pub fn allows(&self, used: usize) -> bool {
        used < self.weekly_limit as usize
    }

    pub fn remaining_after(&self, used: usize) -> u32 {
        let used = u32::try_from(used).unwrap_or(u32::MAX);
        self.weekly_limit.saturating_sub(used)
    }
}

/// [`LoginPolicy::can_login`] with the default three-per-week policy.
pub fn can_login(record: &UserRecord, now: NaiveDateTime) -> bool {
    LoginPolicy::default().can_login(record, now)
}

pub fn format_timestamp(ts: NaiveDateTime) -> String {
    ts.format(TIMESTAMP_FORMAT).to_string()
}

/// Parse an ISO-8601 date-time without offset. A bare date means midnight.
pub fn parse_timestamp(raw: &str) -> Option<NaiveDateTime> {
    let raw = raw.trim();
    raw.parse::<NaiveDateTime>().ok().or_else(|| {
        raw.parse::<NaiveDate>()
            .ok()
            .map(|date| date.and_time(NaiveTime::MIN))
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn at(y: i32, m: u32, d: u32, h: u32, min: u32) -> NaiveDateTime {
        NaiveDate::from_ymd_opt(y, m, d)
            .unwrap()
            .and_hms_opt(h, min, 0)
            .unwrap()
    }

    fn record_with(logins: &[NaiveDateTime]) -> UserRecord {
        UserRecord {
            password: "pw".into(),
            logins: logins.iter().copied().map(format_timestamp).collect(),
        }
    }

    // 2024-01-01 is a Monday.
    fn wednesday_afternoon() -> NaiveDateTime {
        at(2024, 1, 3, 14, 30)
    }

    #[test]
    fn week_start_keeps_time_of_day_by_default() {
        let policy = LoginPolicy::default();
        assert_eq!(
            policy.week_start(wednesday_afternoon()),
            at(2024, 1, 1, 14, 30)
        );
    }

    #[test]
    fn week_start_midnight_anchor_floors_to_monday() {
        let policy = LoginPolicy::new(3, WeekAnchor::Midnight);
        assert_eq!(policy.week_start(wednesday_afternoon()), at(2024, 1, 1, 0, 0));
    }

    #[test]
    fn week_start_on_sunday_goes_back_six_days() {
        let policy = LoginPolicy::new(3, WeekAnchor::Midnight);
        assert_eq!(policy.week_start(at(2024, 1, 7, 23, 59)), at(2024, 1, 1, 0, 0));
    }

    #[test]
    fn week_start_on_monday_is_now_with_default_anchor() {
        let now = at(2024, 1, 1, 10, 0);
        assert_eq!(LoginPolicy::default().week_start(now), now);
    }

    #[test]
    fn user_without_logins_always_passes() {
        let record = record_with(&[]);
        assert!(can_login(&record, wednesday_afternoon()));
        assert_eq!(
            LoginPolicy::default().remaining(&record, wednesday_afternoon()),
            3
        );
    }

    #[test]
    fn fewer_than_three_logins_this_week_pass() {
        let record = record_with(&[at(2024, 1, 2, 9, 0), at(2024, 1, 3, 8, 0)]);
        assert!(can_login(&record, wednesday_afternoon()));
        assert_eq!(
            LoginPolicy::default().remaining(&record, wednesday_afternoon()),
            1
        );
    }

    #[test]
    fn three_or_more_logins_this_week_are_rejected() {
        let three = record_with(&[
            at(2024, 1, 2, 9, 0),
            at(2024, 1, 2, 18, 0),
            at(2024, 1, 3, 8, 0),
        ]);
        assert!(!can_login(&three, wednesday_afternoon()));
        assert_eq!(
            LoginPolicy::default().remaining(&three, wednesday_afternoon()),
            0
        );

        let mut four = three.clone();
        four.logins.push(format_timestamp(at(2024, 1, 3, 12, 0)));
        assert!(!can_login(&four, wednesday_afternoon()));
    }

    #[test]
    fn login_at_week_start_counts_as_this_week() {
        let now = wednesday_afternoon();
        let start = LoginPolicy::default().week_start(now);
        let record = record_with(&[start, at(2024, 1, 2, 9, 0), at(2024, 1, 3, 8, 0)]);
        assert!(!can_login(&record, now));

        let just_before = start - Duration::microseconds(1);
        let record = record_with(&[just_before, at(2024, 1, 2, 9, 0), at(2024, 1, 3, 8, 0)]);
        assert!(can_login(&record, now));
    }

    #[test]
    fn previous_week_logins_are_ignored() {
        let record = record_with(&[
            at(2023, 12, 29, 9, 0),
            at(2023, 12, 30, 9, 0),
            at(2023, 12, 31, 23, 59),
        ]);
        assert!(can_login(&record, wednesday_afternoon()));
    }

    #[test]
    fn anchors_disagree_on_monday_morning_logins() {
        let record = record_with(&[
            at(2024, 1, 1, 8, 0),
            at(2024, 1, 1, 9, 0),
            at(2024, 1, 1, 10, 0),
        ]);
        let now = wednesday_afternoon();

        assert!(LoginPolicy::new(3, WeekAnchor::CurrentTimeOfDay).can_login(&record, now));
        assert!(!LoginPolicy::new(3, WeekAnchor::Midnight).can_login(&record, now));
    }

    #[test]
    fn custom_weekly_limit_is_honoured() {
        let record = record_with(&[at(2024, 1, 2, 9, 0)]);
        let policy = LoginPolicy::new(1, WeekAnchor::Midnight);
        assert!(!policy.can_login(&record, wednesday_afternoon()));
    }

    #[test]
    fn malformed_timestamps_are_skipped() {
        let mut record = record_with(&[at(2024, 1, 2, 9, 0), at(2024, 1, 2, 10, 0)]);
        record.logins.push("yesterday-ish".into());
        assert!(can_login(&record, wednesday_afternoon()));
    }

    #[test]
    fn allowance_from_a_precomputed_count() {
        let policy = LoginPolicy::default();
        assert!(policy.allows(2));
        assert!(!policy.allows(3));
        assert_eq!(policy.remaining_after(1), 2);
        assert_eq!(policy.remaining_after(7), 0);
    }

    #[test]
    fn timestamps_round_trip_through_iso_format() {
        let ts = NaiveDate::from_ymd_opt(2024, 1, 3)
            .unwrap()
            .and_hms_micro_opt(14, 30, 5, 123_456)
            .unwrap();
        let raw = format_timestamp(ts);
        assert_eq!(raw, "2024-01-03T14:30:05.123456");
        assert_eq!(parse_timestamp(&raw), Some(ts));
    }

    #[test]
    fn parse_accepts_seconds_precision_and_bare_dates() {
        assert_eq!(
            parse_timestamp("2024-01-03T14:30:00"),
            Some(at(2024, 1, 3, 14, 30))
        );
        assert_eq!(parse_timestamp("2024-01-03"), Some(at(2024, 1, 3, 0, 0)));
        assert_eq!(parse_timestamp("not a date"), None);
    }
}
