//! Market-hours gating: resolve exchange hours for a canonical (and its
//! underlying, when it has one) and skip processing if either is closed
//! on the processing date.
//!
//! Modeled as an injectable trait with a reference implementation, not a
//! full exchange-calendar library: this crate treats the real calendar as
//! an external collaborator.

use chrono::{Datelike, NaiveDate, Weekday};
use std::collections::BTreeSet;

/// Whether a given market is open for trading on a given date.
pub trait MarketHours: Send + Sync {
    /// True if `market` trades on `date`.
    fn is_open(&self, market: &str, date: NaiveDate) -> bool;
}

/// Reference implementation: closed on weekends and on a fixed holiday
/// set, open otherwise.
#[derive(Debug, Clone, Default)]
pub struct WeekendHolidayCalendar {
    holidays: BTreeSet<NaiveDate>,
}

impl WeekendHolidayCalendar {
    /// Build a calendar with an explicit holiday set (same calendar for
    /// every market; per-market calendars are out of scope here).
    #[must_use]
    pub fn new(holidays: impl IntoIterator<Item = NaiveDate>) -> Self {
        Self {
            holidays: holidays.into_iter().collect(),
        }
    }
}

impl MarketHours for WeekendHolidayCalendar {
    fn is_open(&self, _market: &str, date: NaiveDate) -> bool {
        !matches!(date.weekday(), Weekday::Sat | Weekday::Sun) && !self.holidays.contains(&date)
    }
}
