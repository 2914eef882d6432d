// Recurrence date generation
//
// Dates are produced by walking forward from the start date. The walk is
// always bounded: by the occurrence cap, by the end date when there is one,
// and by a hard iteration limit.

use chrono::{DateTime, Datelike, Duration, NaiveDate, NaiveTime, Utc};

use crate::error::{DomainError, DomainResult};
use crate::recurring::{Frequency, RecurringBooking};

/// Occurrence cap used when the caller does not give one
pub const DEFAULT_MAX_OCCURRENCES: u32 = 52;

/// Largest occurrence cap a caller may request
pub const MAX_OCCURRENCES_CEILING: u32 = 365;

/// Bookings materialized per generation step
pub const BATCH_SIZE: usize = 4;

const MAX_ITERATIONS: u32 = 10_000;

/// A validated recurrence rule
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RecurrenceRule {
    pub frequency: Frequency,
    pub interval: u32,
    pub start_date: NaiveDate,
    pub end_date: Option<NaiveDate>,
    pub max_occurrences: u32,
    /// Sorted, deduplicated, 0 = Sunday
    pub days_of_week: Vec<u32>,
    pub day_of_month: Option<u32>,
    pub time_of_day: NaiveTime,
}

/// Occurrence cap for a requested value
///
/// `None` falls back to the default; zero, negative or above-ceiling requests
/// are rejected.
pub fn resolve_occurrences(requested: Option<i32>) -> DomainResult<u32> {
    match requested {
        None => Ok(DEFAULT_MAX_OCCURRENCES),
        Some(n) if n < 1 => Err(DomainError::Validation(
            "Occurrences must be at least 1".to_string(),
        )),
        Some(n) if n as u32 > MAX_OCCURRENCES_CEILING => Err(DomainError::Validation(format!(
            "At most {} occurrences can be requested, got {}",
            MAX_OCCURRENCES_CEILING, n
        ))),
        Some(n) => Ok(n as u32),
    }
}

fn days_in_month(year: i32, month: u32) -> Option<u32> {
    let (next_year, next_month) = if month == 12 { (year + 1, 1) } else { (year, month + 1) };
    NaiveDate::from_ymd_opt(next_year, next_month, 1)?
        .pred_opt()
        .map(|last| last.day())
}

/// `day` of the given month, clamped to the month's last day
fn clamped_date(year: i32, month: u32, day: u32) -> Option<NaiveDate> {
    let last = days_in_month(year, month)?;
    NaiveDate::from_ymd_opt(year, month, day.min(last))
}

impl RecurrenceRule {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        frequency: Frequency,
        interval: i32,
        start_date: NaiveDate,
        end_date: Option<NaiveDate>,
        occurrences: Option<i32>,
        days_of_week: &[i32],
        day_of_month: Option<i32>,
        time_of_day: NaiveTime,
    ) -> DomainResult<Self> {
        if interval < 1 {
            return Err(DomainError::Validation("Interval must be at least 1".to_string()));
        }
        if let Some(end) = end_date {
            if end < start_date {
                return Err(DomainError::Validation("End date must not be before the start date".to_string()));
            }
        }
        if days_of_week.iter().any(|d| !(0..=6).contains(d)) {
            return Err(DomainError::Validation(
                "Days of week must be between 0 (Sunday) and 6 (Saturday)".to_string(),
            ));
        }
        if let Some(day) = day_of_month {
            if !(1..=31).contains(&day) {
                return Err(DomainError::Validation("Day of month must be between 1 and 31".to_string()));
            }
        }

        let mut days: Vec<u32> = days_of_week.iter().map(|d| *d as u32).collect();
        days.sort_unstable();
        days.dedup();

        Ok(Self {
            frequency,
            interval: interval as u32,
            start_date,
            end_date,
            max_occurrences: resolve_occurrences(occurrences)?,
            days_of_week: days,
            day_of_month: day_of_month.map(|d| d as u32),
            time_of_day,
        })
    }

    pub fn from_series(series: &RecurringBooking) -> DomainResult<Self> {
        Self::new(
            series.frequency,
            series.interval,
            series.start_date,
            series.end_date,
            Some(series.occurrences),
            &series.days_of_week,
            series.day_of_month,
            series.time_of_day,
        )
    }

    /// Every occurrence date, strictly increasing
    pub fn dates(&self) -> Vec<NaiveDate> {
        match self.frequency {
            Frequency::Daily => self.daily(),
            Frequency::Weekly => self.weekly(self.interval),
            Frequency::Biweekly => self.weekly(self.interval + 1),
            Frequency::Monthly => self.monthly(),
        }
    }

    /// Every occurrence with the configured time of day
    pub fn instants(&self) -> Vec<DateTime<Utc>> {
        self.dates()
            .into_iter()
            .map(|date| date.and_time(self.time_of_day).and_utc())
            .collect()
    }

    /// Up to `limit` occurrences strictly after `after`
    pub fn instants_after(&self, after: DateTime<Utc>, limit: usize) -> Vec<DateTime<Utc>> {
        self.instants().into_iter().filter(|i| *i > after).take(limit).collect()
    }

    fn within_end(&self, date: NaiveDate) -> bool {
        self.end_date.map_or(true, |end| date <= end)
    }

    fn is_full(&self, dates: &[NaiveDate]) -> bool {
        dates.len() >= self.max_occurrences as usize
    }

    fn daily(&self) -> Vec<NaiveDate> {
        let mut dates = Vec::new();
        let step = Duration::days(i64::from(self.interval));
        let mut date = self.start_date;

        for _ in 0..MAX_ITERATIONS {
            if !self.within_end(date) || self.is_full(&dates) {
                break;
            }
            dates.push(date);
            date = match date.checked_add_signed(step) {
                Some(next) => next,
                None => break,
            };
        }
        dates
    }

    /// Walk Sunday-aligned weeks, `step_weeks` at a time
    fn weekly(&self, step_weeks: u32) -> Vec<NaiveDate> {
        let days = if self.days_of_week.is_empty() {
            vec![self.start_date.weekday().num_days_from_sunday()]
        } else {
            self.days_of_week.clone()
        };

        let mut dates = Vec::new();
        let mut week_start =
            self.start_date - Duration::days(i64::from(self.start_date.weekday().num_days_from_sunday()));

        for _ in 0..MAX_ITERATIONS {
            for day in &days {
                let date = week_start + Duration::days(i64::from(*day));
                if date < self.start_date {
                    continue;
                }
                if !self.within_end(date) {
                    return dates;
                }
                dates.push(date);
                if self.is_full(&dates) {
                    return dates;
                }
            }
            week_start = match week_start.checked_add_signed(Duration::weeks(i64::from(step_weeks))) {
                Some(next) => next,
                None => break,
            };
        }
        dates
    }

    /// Jump `interval` months at a time, pinned to the day of month
    fn monthly(&self) -> Vec<NaiveDate> {
        let day = self.day_of_month.unwrap_or_else(|| self.start_date.day());
        let first_month = self.start_date.year() * 12 + self.start_date.month0() as i32;

        let mut dates = Vec::new();
        for step in 0..MAX_ITERATIONS {
            let month_index = first_month + (step * self.interval) as i32;
            let Some(date) = clamped_date(month_index.div_euclid(12), month_index.rem_euclid(12) as u32 + 1, day)
            else {
                break;
            };
            if date < self.start_date {
                continue;
            }
            if !self.within_end(date) {
                break;
            }
            dates.push(date);
            if self.is_full(&dates) {
                break;
            }
        }
        dates
    }
}


#[cfg(test)]
mod property_tests {
    use super::*;
    use proptest::prelude::*;

    fn frequency_strategy() -> impl Strategy<Value = Frequency> {
        prop_oneof![
            Just(Frequency::Daily),
            Just(Frequency::Weekly),
            Just(Frequency::Biweekly),
            Just(Frequency::Monthly),
        ]
    }

    proptest! {
        /// Dates are strictly increasing, inside the bounds and under the cap
        #[test]
        fn prop_dates_respect_bounds(
            frequency in frequency_strategy(),
            interval in 1i32..=4,
            start_offset in 0i64..=730,
            span in proptest::option::of(0i64..=400),
            occurrences in proptest::option::of(1i32..=60),
            days in proptest::collection::vec(0i32..=6, 0..4),
            day_of_month in proptest::option::of(1i32..=31),
        ) {
            let start = NaiveDate::from_ymd_opt(2024, 1, 1).unwrap() + Duration::days(start_offset);
            let end = span.map(|s| start + Duration::days(s));
            let rule = RecurrenceRule::new(
                frequency, interval, start, end, occurrences, &days, day_of_month,
                NaiveTime::from_hms_opt(10, 0, 0).unwrap(),
            ).unwrap();

            let dates = rule.dates();
            prop_assert!(dates.len() <= rule.max_occurrences as usize);
            prop_assert!(dates.windows(2).all(|w| w[0] < w[1]));
            prop_assert!(dates.iter().all(|d| *d >= start));
            if let Some(end) = end {
                prop_assert!(dates.iter().all(|d| *d <= end));
            }
        }
    }
}
