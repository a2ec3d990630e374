//! crates/journal_core/src/weeks.rs
//!
//! Sunday-to-Saturday calendar weeks in an explicitly injected timezone.

use chrono::{
    DateTime, Datelike, Duration, FixedOffset, NaiveDate, NaiveDateTime, NaiveTime, Offset,
    TimeZone, Utc,
};
use chrono_tz::Tz;
use tracing::warn;

use crate::domain::WeekBoundaries;

pub const JAKARTA: &str = "Asia/Jakarta";

/// UTC+7, used when the tz database cannot resolve the configured zone.
const WIB_OFFSET_SECS: i32 = 7 * 60 * 60;

/// The zone weeks are anchored in.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WeekZone {
    Named(Tz),
    Fixed(FixedOffset),
}

impl WeekZone {
    pub fn jakarta() -> Self {
        Self::from_name(JAKARTA)
    }

    /// Resolves an IANA zone name, falling back to a fixed UTC+7 offset.
    pub fn from_name(name: &str) -> Self {
        match name.parse::<Tz>() {
            Ok(tz) => Self::Named(tz),
            Err(_) => {
                warn!(zone = name, "Unknown timezone, falling back to fixed UTC+7");
                Self::Fixed(wib_offset())
            }
        }
    }

    fn localize(&self, now: DateTime<Utc>) -> NaiveDateTime {
        match self {
            Self::Named(tz) => now.with_timezone(tz).naive_local(),
            Self::Fixed(offset) => now.with_timezone(offset).naive_local(),
        }
    }

    /// Pins a local wall-clock time to an instant. Times skipped by a DST jump
    /// are read as UTC wall-clock time.
    fn anchor(&self, local: NaiveDateTime) -> DateTime<FixedOffset> {
        match self {
            Self::Named(tz) => to_fixed(
                tz.from_local_datetime(&local)
                    .earliest()
                    .unwrap_or_else(|| tz.from_utc_datetime(&local)),
            ),
            Self::Fixed(offset) => to_fixed(
                offset
                    .from_local_datetime(&local)
                    .earliest()
                    .unwrap_or_else(|| offset.from_utc_datetime(&local)),
            ),
        }
    }
}

fn wib_offset() -> FixedOffset {
    FixedOffset::east_opt(WIB_OFFSET_SECS).unwrap_or_else(|| Utc.fix())
}

fn to_fixed<Z: TimeZone>(dt: DateTime<Z>) -> DateTime<FixedOffset> {
    let offset = dt.offset().fix();
    dt.with_timezone(&offset)
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WeekWindower {
    zone: WeekZone,
}

impl Default for WeekWindower {
    fn default() -> Self {
        Self::new(WeekZone::jakarta())
    }
}

impl WeekWindower {
    pub fn new(zone: WeekZone) -> Self {
        Self { zone }
    }

    pub fn zone(&self) -> WeekZone {
        self.zone
    }

    /// The local calendar date `now` falls on.
    pub fn local_date(&self, now: DateTime<Utc>) -> NaiveDate {
        self.zone.localize(now).date()
    }

    /// The week containing `now`, which may still be in progress.
    pub fn current_week(&self, now: DateTime<Utc>) -> WeekBoundaries {
        let today = self.local_date(now);
        let since_sunday = i64::from(today.weekday().num_days_from_sunday());
        self.week_starting(today - Duration::days(since_sunday))
    }

    /// The latest week whose Saturday has fully elapsed in local time.
    pub fn last_completed_week(&self, now: DateTime<Utc>) -> WeekBoundaries {
        let today = self.local_date(now);
        let weekday = i64::from(today.weekday().num_days_from_sunday());
        // A Saturday that is still running does not close its week.
        let days_back = if weekday == 6 { 7 } else { weekday + 1 };
        let saturday = today - Duration::days(days_back);
        self.week_starting(saturday - Duration::days(6))
    }

    fn week_starting(&self, sunday: NaiveDate) -> WeekBoundaries {
        let opening = sunday.and_time(NaiveTime::MIN);
        let closing = opening + Duration::days(7) - Duration::seconds(1);
        WeekBoundaries {
            start: self.zone.anchor(opening),
            end: self.zone.anchor(closing),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Weekday;

    fn jakarta(y: i32, m: u32, d: u32, h: u32, min: u32) -> DateTime<Utc> {
        chrono_tz::Asia::Jakarta
            .with_ymd_and_hms(y, m, d, h, min, 0)
            .unwrap()
            .with_timezone(&Utc)
    }

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    #[test]
    fn test_saturday_morning_uses_previous_week() {
        let windower = WeekWindower::default();
        // 2025-03-08 is a Saturday.
        let week = windower.last_completed_week(jakarta(2025, 3, 8, 10, 0));
        assert_eq!(week.start_date(), date(2025, 2, 23));
        assert_eq!(week.end_date(), date(2025, 3, 1));
    }

    #[test]
    fn test_each_weekday_maps_to_last_saturday() {
        let windower = WeekWindower::default();
        // Sunday 2025-03-09 through Friday 2025-03-14 all close on 2025-03-08.
        for d in 9..=14 {
            let week = windower.last_completed_week(jakarta(2025, 3, d, 12, 0));
            assert_eq!(week.end_date(), date(2025, 3, 8), "day {d}");
            assert_eq!(week.start_date(), date(2025, 3, 2), "day {d}");
        }
    }

    #[test]
    fn test_local_midnight_wins_over_utc_date() {
        let windower = WeekWindower::default();
        // 18:00 UTC on Saturday is already 01:00 Sunday in Jakarta.
        let now = Utc.with_ymd_and_hms(2025, 3, 8, 18, 0, 0).unwrap();
        assert_eq!(windower.local_date(now).weekday(), Weekday::Sun);
        let week = windower.last_completed_week(now);
        assert_eq!(week.end_date(), date(2025, 3, 8));
    }

    #[test]
    fn test_boundaries_are_anchored_in_local_time() {
        let windower = WeekWindower::default();
        let week = windower.last_completed_week(jakarta(2025, 3, 12, 9, 0));
        assert_eq!(week.start.to_rfc3339(), "2025-03-02T00:00:00+07:00");
        assert_eq!(week.end.to_rfc3339(), "2025-03-08T23:59:59+07:00");
    }

    #[test]
    fn test_current_week_contains_now() {
        let windower = WeekWindower::default();
        let now = jakarta(2025, 3, 5, 12, 0);
        let week = windower.current_week(now);
        assert_eq!(week.start_date(), date(2025, 3, 2));
        assert_eq!(week.end_date(), date(2025, 3, 8));
        assert!(week.contains(now));
        assert_eq!(windower.last_completed_week(now), week.previous());
    }

    #[test]
    fn test_completed_week_always_ended_before_now() {
        let windower = WeekWindower::default();
        let span = Duration::days(6) + Duration::hours(23) + Duration::minutes(59)
            + Duration::seconds(59);
        let mut now = Utc.with_ymd_and_hms(2024, 12, 25, 0, 30, 0).unwrap();
        for _ in 0..(24 * 21) {
            let week = windower.last_completed_week(now);
            assert!(
                week.end.with_timezone(&Utc) < now,
                "week ending {} not before {}",
                week.end,
                now
            );
            assert_eq!(week.end - week.start, span);
            assert_eq!(week.start_date().weekday(), Weekday::Sun);
            assert!(!week.contains(now));
            now += Duration::hours(1);
        }
    }

    #[test]
    fn test_unknown_zone_falls_back_to_utc_plus_seven() {
        let zone = WeekZone::from_name("Nowhere/Atlantis");
        assert_eq!(zone, WeekZone::Fixed(FixedOffset::east_opt(7 * 3600).unwrap()));

        let fixed = WeekWindower::new(zone);
        let named = WeekWindower::default();
        let now = jakarta(2025, 3, 12, 9, 0);
        assert_eq!(fixed.last_completed_week(now), named.last_completed_week(now));
    }
}
