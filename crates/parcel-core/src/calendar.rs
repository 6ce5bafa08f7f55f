//! Clock abstraction and the business-date rule.
//!
//! Exchange rates are published on weekdays only, so rate cache keys use a
//! *business date*: today's calendar date, except that Saturday and Sunday
//! map back to the preceding Friday.

use chrono::{DateTime, Datelike, Days, NaiveDate, NaiveTime, Utc, Weekday};

/// Source of the current time.
///
/// Injected into the resolver and the calculation job so that tests can pin
/// "today" to a known weekday.
pub trait Clock: Send + Sync {
    /// The current instant in UTC.
    fn now(&self) -> DateTime<Utc>;

    /// The current UTC calendar date.
    fn today(&self) -> NaiveDate {
        self.now().date_naive()
    }
}

/// Wall-clock time.
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> DateTime<Utc> {
        Utc::now()
    }
}

const NOON: NaiveTime = match NaiveTime::from_hms_opt(12, 0, 0) {
    Some(noon) => noon,
    None => NaiveTime::MIN,
};

/// A clock frozen at a fixed instant.
#[derive(Debug, Clone, Copy)]
pub struct FixedClock {
    instant: DateTime<Utc>,
}

impl FixedClock {
    /// Freeze the clock at `instant`.
    pub const fn new(instant: DateTime<Utc>) -> Self {
        Self { instant }
    }

    /// Freeze the clock at noon UTC on `date`.
    pub fn at_noon(date: NaiveDate) -> Self {
        Self {
            instant: date.and_time(NOON).and_utc(),
        }
    }
}

impl Clock for FixedClock {
    fn now(&self) -> DateTime<Utc> {
        self.instant
    }
}

/// Map a calendar date to its business date.
///
/// Weekdays map to themselves; Saturday and Sunday map to the immediately
/// preceding Friday.
pub fn business_date(today: NaiveDate) -> NaiveDate {
    let back = match today.weekday() {
        Weekday::Sat => 1,
        Weekday::Sun => 2,
        _ => 0,
    };
    today.checked_sub_days(Days::new(back)).unwrap_or(today)
}

/// Build the rate cache key for a business date and currency code.
///
/// The key is the ISO date immediately followed by the code, e.g.
/// `2024-05-03USD`.
pub fn rate_cache_key(date_code: NaiveDate, currency: &str) -> String {
    format!("{}{currency}", date_code.format("%Y-%m-%d"))
}
