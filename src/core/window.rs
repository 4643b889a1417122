//! Closed report windows over UTC time.

use super::error::ValidationError;
use chrono::{DateTime, Datelike, Months, NaiveDate, NaiveTime, TimeDelta, Utc};
use serde::Serialize;
use std::fmt::Display;

const DATE_FORMAT: &str = "%Y-%m-%d";

/// A closed interval `[from, to]`. `from <= to` always holds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct Window {
    from: DateTime<Utc>,
    to: DateTime<Utc>,
}

impl Window {
    pub fn new(from: DateTime<Utc>, to: DateTime<Utc>) -> Result<Self, ValidationError> {
        if from > to {
            return Err(ValidationError::InvertedWindow {
                from: from.to_rfc3339(),
                to: to.to_rfc3339(),
            });
        }
        Ok(Self { from, to })
    }

    /// Whole days from the start of `first` to the end of `last`.
    pub fn days(first: NaiveDate, last: NaiveDate) -> Result<Self, ValidationError> {
        Self::new(start_of_day(first), end_of_day(last))
    }

    /// The calendar month containing `instant`.
    pub fn month_of(instant: DateTime<Utc>) -> Self {
        let first = instant
            .date_naive()
            .with_day(1)
            .unwrap_or_else(|| instant.date_naive());
        let last = first
            .checked_add_months(Months::new(1))
            .and_then(|next| next.pred_opt())
            .unwrap_or(first);
        Self {
            from: start_of_day(first),
            to: end_of_day(last),
        }
    }

    /// Parses a pair of `YYYY-MM-DD` dates into a whole-day window.
    pub fn parse(first: &str, last: &str) -> Result<Self, ValidationError> {
        Self::days(parse_date(first)?, parse_date(last)?)
    }

    pub fn from(&self) -> DateTime<Utc> {
        self.from
    }

    pub fn to(&self) -> DateTime<Utc> {
        self.to
    }

    pub fn contains(&self, instant: DateTime<Utc>) -> bool {
        self.from <= instant && instant <= self.to
    }

    /// Number of calendar days touched by the window.
    pub fn day_count(&self) -> usize {
        ((self.to.date_naive() - self.from.date_naive()).num_days() + 1) as usize
    }

    /// Per calendar day sub-windows, clipped to this window, in chronological order.
    pub fn split_days(&self) -> Vec<(NaiveDate, Window)> {
        self.from
            .date_naive()
            .iter_days()
            .take(self.day_count())
            .map(|date| {
                let window = Window {
                    from: start_of_day(date).max(self.from),
                    to: end_of_day(date).min(self.to),
                };
                (date, window)
            })
            .collect()
    }

    /// Human title like "for March 2024" or "for March 2024 - May 2024".
    pub fn title(&self) -> String {
        let start = self.from.date_naive();
        let end = self.to.date_naive();
        if start.year() == end.year() && start.month() == end.month() {
            format!("for {}", start.format("%B %Y"))
        } else {
            format!("for {} - {}", start.format("%B %Y"), end.format("%B %Y"))
        }
    }
}

impl Display for Window {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "[{}, {}]", self.from.to_rfc3339(), self.to.to_rfc3339())
    }
}

pub fn parse_date(value: &str) -> Result<NaiveDate, ValidationError> {
    NaiveDate::parse_from_str(value, DATE_FORMAT)
        .map_err(|_| ValidationError::InvalidDate(value.to_string()))
}

fn start_of_day(date: NaiveDate) -> DateTime<Utc> {
    date.and_time(NaiveTime::MIN).and_utc()
}

fn end_of_day(date: NaiveDate) -> DateTime<Utc> {
    start_of_day(date) + TimeDelta::days(1) - TimeDelta::nanoseconds(1)
}
