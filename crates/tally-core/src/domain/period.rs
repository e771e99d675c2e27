//! Reporting periods and their time windows.

use chrono::{DateTime, Datelike, Days, Duration, FixedOffset, NaiveDate, NaiveTime, TimeZone, Utc};
use serde::{Deserialize, Serialize};

use crate::error::{Result, TallyError};

/// Reset-able reporting period key.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Period {
    Day,
    Week,
    Month,
    Ytd,
    Custom,
}

impl Period {
    pub fn as_str(&self) -> &'static str {
        match self {
            Period::Day => "day",
            Period::Week => "week",
            Period::Month => "month",
            Period::Ytd => "ytd",
            Period::Custom => "custom",
        }
    }
}

impl std::fmt::Display for Period {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for Period {
    type Err = TallyError;

    /// Accepts the canonical keys plus `today` and `year`.
    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "day" | "today" => Ok(Period::Day),
            "week" => Ok(Period::Week),
            "month" => Ok(Period::Month),
            "ytd" | "year" => Ok(Period::Ytd),
            "custom" => Ok(Period::Custom),
            other => Err(TallyError::InvalidPeriod(format!(
                "unknown period '{other}' (expected day, week, month, ytd or custom)"
            ))),
        }
    }
}

/// Caller-supplied half-open range `[start, end)`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct DateRange {
    start: DateTime<Utc>,
    end: DateTime<Utc>,
}

impl DateRange {
    pub fn new(start: DateTime<Utc>, end: DateTime<Utc>) -> Result<Self> {
        if start >= end {
            return Err(TallyError::InvalidPeriod(format!(
                "custom range start {start} must be before end {end}"
            )));
        }
        Ok(Self { start, end })
    }

    pub fn start(&self) -> DateTime<Utc> {
        self.start
    }

    pub fn end(&self) -> DateTime<Utc> {
        self.end
    }
}

/// A period as requested for a report. Only `Custom` carries a range.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReportPeriod {
    Day,
    Week,
    Month,
    Ytd,
    Custom(DateRange),
}

impl ReportPeriod {
    /// Combine a parsed key with an optional range.
    ///
    /// `custom` without a range, or a range on any other period, is rejected.
    pub fn new(period: Period, range: Option<DateRange>) -> Result<Self> {
        match (period, range) {
            (Period::Custom, Some(range)) => Ok(ReportPeriod::Custom(range)),
            (Period::Custom, None) => Err(TallyError::InvalidPeriod(
                "custom period requires a start and end".to_string(),
            )),
            (other, Some(_)) => Err(TallyError::InvalidPeriod(format!(
                "period '{other}' does not take a range"
            ))),
            (Period::Day, None) => Ok(ReportPeriod::Day),
            (Period::Week, None) => Ok(ReportPeriod::Week),
            (Period::Month, None) => Ok(ReportPeriod::Month),
            (Period::Ytd, None) => Ok(ReportPeriod::Ytd),
        }
    }

    pub fn period(&self) -> Period {
        match self {
            ReportPeriod::Day => Period::Day,
            ReportPeriod::Week => Period::Week,
            ReportPeriod::Month => Period::Month,
            ReportPeriod::Ytd => Period::Ytd,
            ReportPeriod::Custom(_) => Period::Custom,
        }
    }
}

/// Resolved time window a report counts activity in.
///
/// Calendar windows close at `end` inclusively so activity stamped "now" is
/// counted; custom windows are half-open. A start taken from a reset marker
/// is exclusive: activity stamped at the reset instant no longer counts.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PeriodWindow {
    pub period: Period,
    pub start: DateTime<Utc>,
    pub end: DateTime<Utc>,
    #[serde(default)]
    start_exclusive: bool,
    #[serde(default)]
    end_inclusive: bool,
}

impl PeriodWindow {
    /// Resolve calendar boundaries for `period` at `now` in the local `offset`.
    pub fn resolve(period: &ReportPeriod, now: DateTime<Utc>, offset: FixedOffset) -> Self {
        let today = now.with_timezone(&offset).date_naive();
        let (start, end, end_inclusive) = match period {
            ReportPeriod::Day => (
                local_midnight(today, offset),
                local_midnight(today + Days::new(1), offset),
                false,
            ),
            ReportPeriod::Week => (now - Duration::days(7), now, true),
            ReportPeriod::Month => (
                local_midnight(today - Days::new(u64::from(today.day0())), offset),
                now,
                true,
            ),
            ReportPeriod::Ytd => (
                local_midnight(today - Days::new(u64::from(today.ordinal0())), offset),
                now,
                true,
            ),
            ReportPeriod::Custom(range) => (range.start, range.end, false),
        };
        Self {
            period: period.period(),
            start,
            end,
            start_exclusive: false,
            end_inclusive,
        }
    }

    /// Move the start forward to a reset marker, if the marker is not earlier.
    pub fn clamp_start(mut self, marker: Option<DateTime<Utc>>) -> Self {
        if let Some(marker) = marker {
            if marker >= self.start {
                self.start = marker;
                self.start_exclusive = true;
            }
        }
        self
    }

    pub fn start_exclusive(&self) -> bool {
        self.start_exclusive
    }

    pub fn end_inclusive(&self) -> bool {
        self.end_inclusive
    }

    pub fn contains(&self, ts: DateTime<Utc>) -> bool {
        let after_start = if self.start_exclusive {
            ts > self.start
        } else {
            ts >= self.start
        };
        if !after_start {
            return false;
        }
        if self.end_inclusive {
            ts <= self.end
        } else {
            ts < self.end
        }
    }
}

fn local_midnight(date: NaiveDate, offset: FixedOffset) -> DateTime<Utc> {
    let local = date.and_time(NaiveTime::MIN);
    let utc = local - Duration::seconds(i64::from(offset.local_minus_utc()));
    Utc.from_utc_datetime(&utc)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn at(y: i32, m: u32, d: u32, h: u32, min: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(y, m, d, h, min, 0).unwrap()
    }

    fn utc() -> FixedOffset {
        FixedOffset::east_opt(0).unwrap()
    }

    #[test]
    fn parses_aliases() {
        assert_eq!("today".parse::<Period>().unwrap(), Period::Day);
        assert_eq!("YEAR".parse::<Period>().unwrap(), Period::Ytd);
        assert_eq!(" month ".parse::<Period>().unwrap(), Period::Month);
    }

    #[test]
    fn unknown_period_is_invalid() {
        let err = "fortnight".parse::<Period>().unwrap_err();
        assert!(matches!(err, TallyError::InvalidPeriod(_)));
    }

    #[test]
    fn custom_requires_ordered_range() {
        let now = at(2026, 10, 18, 12, 0);
        assert!(DateRange::new(now, now).is_err());
        assert!(ReportPeriod::new(Period::Custom, None).is_err());

        let range = DateRange::new(now - Duration::days(1), now).unwrap();
        assert!(ReportPeriod::new(Period::Day, Some(range)).is_err());
        assert_eq!(
            ReportPeriod::new(Period::Custom, Some(range)).unwrap(),
            ReportPeriod::Custom(range)
        );
    }

    #[test]
    fn day_window_is_local_calendar_day() {
        let now = at(2026, 10, 18, 15, 30);
        let w = PeriodWindow::resolve(&ReportPeriod::Day, now, utc());
        assert_eq!(w.start, at(2026, 10, 18, 0, 0));
        assert_eq!(w.end, at(2026, 10, 19, 0, 0));
        assert!(w.contains(now));
        assert!(!w.contains(at(2026, 10, 19, 0, 0)));
    }

    #[test]
    fn day_window_honours_offset() {
        // 02:00 UTC is still the previous evening at UTC-5.
        let now = at(2026, 10, 18, 2, 0);
        let offset = FixedOffset::west_opt(5 * 3600).unwrap();
        let w = PeriodWindow::resolve(&ReportPeriod::Day, now, offset);
        assert_eq!(w.start, at(2026, 10, 17, 5, 0));
        assert_eq!(w.end, at(2026, 10, 18, 5, 0));
    }

    #[test]
    fn month_and_ytd_start_on_first_day() {
        let now = at(2026, 10, 18, 15, 30);
        let month = PeriodWindow::resolve(&ReportPeriod::Month, now, utc());
        assert_eq!(month.start, at(2026, 10, 1, 0, 0));
        assert!(month.contains(now));

        let ytd = PeriodWindow::resolve(&ReportPeriod::Ytd, now, utc());
        assert_eq!(ytd.start, at(2026, 1, 1, 0, 0));
        assert_eq!(ytd.end, now);
    }

    #[test]
    fn week_is_rolling_seven_days() {
        let now = at(2026, 10, 18, 15, 30);
        let w = PeriodWindow::resolve(&ReportPeriod::Week, now, utc());
        assert_eq!(w.start, at(2026, 10, 11, 15, 30));
        assert!(w.contains(at(2026, 10, 11, 15, 30)));
        assert!(!w.contains(at(2026, 10, 11, 15, 29)));
    }

    #[test]
    fn marker_only_moves_start_forward() {
        let now = at(2026, 10, 18, 15, 30);
        let month = PeriodWindow::resolve(&ReportPeriod::Month, now, utc());

        let later = month.clamp_start(Some(at(2026, 10, 10, 0, 0)));
        assert_eq!(later.start, at(2026, 10, 10, 0, 0));

        let earlier = month.clamp_start(Some(at(2026, 9, 10, 0, 0)));
        assert_eq!(earlier.start, at(2026, 10, 1, 0, 0));
        assert!(earlier.contains(at(2026, 10, 1, 0, 0)));
    }

    #[test]
    fn marker_instant_is_excluded() {
        let now = at(2026, 10, 18, 15, 30);
        let marker = at(2026, 10, 18, 9, 0);
        let day = PeriodWindow::resolve(&ReportPeriod::Day, now, utc()).clamp_start(Some(marker));
        assert!(day.start_exclusive());
        assert!(!day.contains(marker));
        assert!(day.contains(marker + Duration::nanoseconds(1)));
    }

    #[test]
    fn window_bounds_survive_json() {
        let now = at(2026, 10, 18, 15, 30);
        let week = PeriodWindow::resolve(&ReportPeriod::Week, now, utc())
            .clamp_start(Some(at(2026, 10, 15, 0, 0)));
        let json = serde_json::to_value(week).unwrap();
        assert_eq!(json["startExclusive"], true);
        assert_eq!(json["endInclusive"], true);

        let back: PeriodWindow = serde_json::from_value(json).unwrap();
        assert_eq!(back, week);
    }
}
