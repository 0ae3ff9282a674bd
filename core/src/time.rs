//! Report windows and dense day-bucketed series.
//!
//! A report covers calendar dates `[start, end)` in the caller's timezone.
//! [`ReportWindow`] turns that into UTC instants at local midnight for store
//! queries and maps event timestamps back to local calendar days.

use chrono::{DateTime, Datelike, Duration, LocalResult, NaiveDate, NaiveTime, TimeZone, Utc};
use chrono_tz::Tz;
use serde::Serialize;
use std::collections::BTreeMap;
use thiserror::Error;

/// Invalid report windows.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum RangeError {
    /// `end` is not after `start`.
    #[error("endDate {end} must be after startDate {start}")]
    Empty {
        /// First day.
        start: NaiveDate,
        /// Exclusive last day.
        end: NaiveDate,
    },

    /// The range covers more days than allowed.
    #[error("date range spans {days} days, maximum is {max}")]
    TooLong {
        /// Requested span.
        days: i64,
        /// Configured maximum.
        max: i64,
    },

    /// Unrecognised IANA timezone name.
    #[error("unknown timezone: {0}")]
    UnknownTimezone(String),
}

/// Calendar dates `[start, end)`.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct DateRange {
    start: NaiveDate,
    end: NaiveDate,
}

impl DateRange {
    /// Build a range, rejecting empty ranges and spans above `max_days`.
    ///
    /// # Errors
    ///
    /// Returns [`RangeError::Empty`] when `end <= start` and
    /// [`RangeError::TooLong`] when the span exceeds `max_days`.
    pub fn new(start: NaiveDate, end: NaiveDate, max_days: i64) -> Result<Self, RangeError> {
        if end <= start {
            return Err(RangeError::Empty { start, end });
        }
        let days = (end - start).num_days();
        if days > max_days {
            return Err(RangeError::TooLong {
                days,
                max: max_days,
            });
        }
        Ok(Self { start, end })
    }

    /// First day.
    #[must_use]
    pub const fn start(&self) -> NaiveDate {
        self.start
    }

    /// Exclusive last day.
    #[must_use]
    pub const fn end(&self) -> NaiveDate {
        self.end
    }

    /// Number of days covered.
    #[must_use]
    pub fn num_days(&self) -> i64 {
        (self.end - self.start).num_days()
    }

    /// Every day in the range, ascending.
    pub fn days(&self) -> impl Iterator<Item = NaiveDate> + '_ {
        self.start.iter_days().take_while(move |day| *day < self.end)
    }
}

/// A [`DateRange`] anchored in a timezone.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct ReportWindow {
    range: DateRange,
    tz: Tz,
}

impl ReportWindow {
    /// Anchor `range` in `tz`.
    #[must_use]
    pub const fn new(range: DateRange, tz: Tz) -> Self {
        Self { range, tz }
    }

    /// A window over `[start, end)` in UTC, without span limits. Handy in tests.
    ///
    /// # Errors
    ///
    /// Returns [`RangeError::Empty`] when `end <= start`.
    pub fn utc(start: NaiveDate, end: NaiveDate) -> Result<Self, RangeError> {
        DateRange::new(start, end, i64::MAX).map(|range| Self::new(range, Tz::UTC))
    }

    /// The calendar range.
    #[must_use]
    pub const fn range(&self) -> DateRange {
        self.range
    }

    /// The timezone buckets are computed in.
    #[must_use]
    pub const fn tz(&self) -> Tz {
        self.tz
    }

    /// Inclusive lower bound: local midnight of the first day.
    #[must_use]
    pub fn from_utc(&self) -> DateTime<Utc> {
        self.local_midnight(self.range.start)
    }

    /// Exclusive upper bound: local midnight of the end day.
    #[must_use]
    pub fn to_utc(&self) -> DateTime<Utc> {
        self.local_midnight(self.range.end)
    }

    /// Whether `ts` falls in `[from_utc, to_utc)`.
    #[must_use]
    pub fn contains(&self, ts: DateTime<Utc>) -> bool {
        ts >= self.from_utc() && ts < self.to_utc()
    }

    /// The local calendar day of `ts`.
    #[must_use]
    pub fn local_day(&self, ts: DateTime<Utc>) -> NaiveDate {
        ts.with_timezone(&self.tz).date_naive()
    }

    /// A dense series over this window's days.
    #[must_use]
    pub fn series<T: Default>(&self) -> DailySeries<T> {
        DailySeries::new(&self.range)
    }

    fn local_midnight(&self, day: NaiveDate) -> DateTime<Utc> {
        let naive = day.and_time(NaiveTime::MIN);
        match self.tz.from_local_datetime(&naive) {
            LocalResult::Single(local) | LocalResult::Ambiguous(local, _) => {
                local.with_timezone(&Utc)
            }
            // Midnight skipped by a DST jump: the day starts at the first valid instant.
            LocalResult::None => self
                .tz
                .from_local_datetime(&(naive + Duration::hours(1)))
                .earliest()
                .map_or_else(|| Utc.from_utc_datetime(&naive), |local| local.with_timezone(&Utc)),
        }
    }
}

/// Monday of the ISO week containing `day`.
#[must_use]
pub fn week_start(day: NaiveDate) -> NaiveDate {
    day - Duration::days(i64::from(day.weekday().num_days_from_monday()))
}

/// One bucket per calendar day, pre-populated with `T::default()`.
///
/// Days without activity stay in the series with zero values; iteration is in
/// ascending date order.
#[derive(Clone, Debug, PartialEq)]
pub struct DailySeries<T> {
    buckets: BTreeMap<NaiveDate, T>,
}

impl<T: Default> DailySeries<T> {
    /// A zeroed bucket for every day in `range`.
    #[must_use]
    pub fn new(range: &DateRange) -> Self {
        Self {
            buckets: range.days().map(|day| (day, T::default())).collect(),
        }
    }

    /// The bucket for `day`, or `None` if the day is outside the range.
    pub fn bucket_mut(&mut self, day: NaiveDate) -> Option<&mut T> {
        self.buckets.get_mut(&day)
    }

    /// The bucket for `day`.
    #[must_use]
    pub fn get(&self, day: NaiveDate) -> Option<&T> {
        self.buckets.get(&day)
    }

    /// Number of days.
    #[must_use]
    pub fn len(&self) -> usize {
        self.buckets.len()
    }

    /// Whether the series has no days.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.buckets.is_empty()
    }

    /// Days and buckets, ascending.
    pub fn iter(&self) -> impl Iterator<Item = (NaiveDate, &T)> {
        self.buckets.iter().map(|(day, bucket)| (*day, bucket))
    }

    /// Convert every bucket into a dated report point.
    pub fn into_points<P>(self, mut point: impl FnMut(String, T) -> P) -> Vec<P> {
        self.buckets
            .into_iter()
            .map(|(day, bucket)| point(day.format("%Y-%m-%d").to_string(), bucket))
            .collect()
    }
}

/// A dated value in a serialized series.
#[derive(Clone, Debug, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DatedCount {
    /// `YYYY-MM-DD`.
    pub date: String,
    /// Events on that day.
    pub count: u64,
}

/// Parse an IANA timezone name.
///
/// # Errors
///
/// Returns [`RangeError::UnknownTimezone`] for names `chrono-tz` does not know.
pub fn parse_timezone(name: &str) -> Result<Tz, RangeError> {
    name.trim()
        .parse::<Tz>()
        .map_err(|_| RangeError::UnknownTimezone(name.to_string()))
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    #[test]
    fn empty_and_oversized_ranges_are_rejected() {
        assert!(matches!(
            DateRange::new(date(2024, 3, 2), date(2024, 3, 2), 31),
            Err(RangeError::Empty { .. })
        ));
        assert!(matches!(
            DateRange::new(date(2024, 1, 1), date(2024, 6, 1), 31),
            Err(RangeError::TooLong { max: 31, .. })
        ));
    }

    #[test]
    fn window_bounds_are_local_midnight() {
        let range = DateRange::new(date(2024, 3, 1), date(2024, 3, 3), 31).unwrap();
        let window = ReportWindow::new(range, chrono_tz::Asia::Ho_Chi_Minh);

        assert_eq!(window.from_utc().to_rfc3339(), "2024-02-29T17:00:00+00:00");
        assert_eq!(window.to_utc().to_rfc3339(), "2024-03-02T17:00:00+00:00");

        let late_evening_utc = Utc.with_ymd_and_hms(2024, 3, 1, 18, 30, 0).unwrap();
        assert_eq!(window.local_day(late_evening_utc), date(2024, 3, 2));
        assert!(window.contains(late_evening_utc));
        assert!(!window.contains(window.to_utc()));
    }

    #[test]
    fn week_start_is_monday() {
        assert_eq!(week_start(date(2024, 3, 6)), date(2024, 3, 4));
        assert_eq!(week_start(date(2024, 3, 4)), date(2024, 3, 4));
        assert_eq!(week_start(date(2024, 3, 10)), date(2024, 3, 4));
    }

    #[test]
    fn unknown_timezone_is_rejected() {
        assert!(parse_timezone("Asia/Ho_Chi_Minh").is_ok());
        assert_eq!(
            parse_timezone("Mars/Olympus"),
            Err(RangeError::UnknownTimezone("Mars/Olympus".to_string()))
        );
    }

    #[test]
    fn series_keeps_empty_days() {
        let window = ReportWindow::utc(date(2024, 3, 1), date(2024, 3, 4)).unwrap();
        let mut series: DailySeries<u64> = window.series();
        *series.bucket_mut(date(2024, 3, 2)).unwrap() += 5;

        let points = series.into_points(|date, count| DatedCount { date, count });
        assert_eq!(
            points,
            vec![
                DatedCount { date: "2024-03-01".into(), count: 0 },
                DatedCount { date: "2024-03-02".into(), count: 5 },
                DatedCount { date: "2024-03-03".into(), count: 0 },
            ]
        );
    }

    proptest! {
        #[test]
        fn series_has_one_ascending_bucket_per_day(offset in 0i64..20_000, span in 1i64..400) {
            let start = date(1990, 1, 1) + Duration::days(offset);
            let range = DateRange::new(start, start + Duration::days(span), 400).unwrap();
            let series: DailySeries<u32> = DailySeries::new(&range);

            prop_assert_eq!(series.len() as i64, span);
            let days: Vec<NaiveDate> = series.iter().map(|(day, _)| day).collect();
            prop_assert!(days.windows(2).all(|pair| pair[1] - pair[0] == Duration::days(1)));
            prop_assert_eq!(days[0], start);
        }
    }
}
