//! Date bucket categorization and clock abstraction.
//!
//! # Responsibility
//! - Map an item date to exactly one `Bucket` relative to today.
//! - Provide the date predicates used by migration and display logic.
//! - Abstract "now" so callers can simulate other days.
//!
//! # Invariants
//! - Every date maps to exactly one bucket.
//! - Dates on or before today always land in `Bucket::Today`, so overdue
//!   items stay visible until migrated or re-dated.
//! - Buckets are computed on read and never persisted.

use chrono::{DateTime, Days, Local, NaiveDate, NaiveTime, TimeDelta, TimeZone, Utc};
use serde::{Deserialize, Serialize};
use std::fmt::{Display, Formatter};
use std::sync::Mutex;

/// Date-derived grouping an item currently belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Bucket {
    Today,
    Tomorrow,
    Future,
}

impl Bucket {
    /// All buckets in display order.
    pub const ALL: [Bucket; 3] = [Bucket::Today, Bucket::Tomorrow, Bucket::Future];

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Today => "today",
            Self::Tomorrow => "tomorrow",
            Self::Future => "future",
        }
    }
}

impl Display for Bucket {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Classifies `date` relative to `today`.
///
/// Precedence: on/before today, then exactly tomorrow, then everything else.
pub fn bucket_for(date: NaiveDate, today: NaiveDate) -> Bucket {
    if is_today(date, today) || is_past(date, today) {
        Bucket::Today
    } else if is_tomorrow(date, today) {
        Bucket::Tomorrow
    } else {
        Bucket::Future
    }
}

pub fn is_today(date: NaiveDate, today: NaiveDate) -> bool {
    date == today
}

pub fn is_tomorrow(date: NaiveDate, today: NaiveDate) -> bool {
    today.succ_opt() == Some(date)
}

/// Strictly earlier than the start of today.
pub fn is_past(date: NaiveDate, today: NaiveDate) -> bool {
    date < today
}

/// Strictly later than tomorrow.
pub fn is_future(date: NaiveDate, today: NaiveDate) -> bool {
    today.succ_opt().is_some_and(|tomorrow| date > tomorrow)
}

/// Returns whether an epoch-ms timestamp falls on `today` in local time.
///
/// Out-of-range timestamps are never "today".
pub fn created_on(created_at_ms: i64, today: NaiveDate) -> bool {
    local_date_of(created_at_ms) == Some(today)
}

/// Local calendar day of an epoch-ms timestamp.
pub fn local_date_of(epoch_ms: i64) -> Option<NaiveDate> {
    Local
        .timestamp_millis_opt(epoch_ms)
        .single()
        .map(|value| value.date_naive())
}

/// Target date assigned when an item is dropped onto a bucket column.
///
/// `Future` resolves to the first day that is neither today nor tomorrow.
pub fn date_for_bucket(bucket: Bucket, today: NaiveDate) -> NaiveDate {
    match bucket {
        Bucket::Today => today,
        Bucket::Tomorrow => add_days(today, 1),
        Bucket::Future => add_days(today, 2),
    }
}

/// Short human label: `Today`, `Tomorrow`, or e.g. `Jan 5`.
pub fn display_label(date: NaiveDate, today: NaiveDate) -> String {
    if is_today(date, today) {
        "Today".to_string()
    } else if is_tomorrow(date, today) {
        "Tomorrow".to_string()
    } else {
        date.format("%b %-d").to_string()
    }
}

fn add_days(date: NaiveDate, days: u64) -> NaiveDate {
    date.checked_add_days(Days::new(days))
        .unwrap_or(NaiveDate::MAX)
}

/// Source of "now" for the store.
pub trait Clock: Send + Sync {
    fn now(&self) -> DateTime<Local>;

    /// Local calendar day of `now()`.
    fn today(&self) -> NaiveDate {
        self.now().date_naive()
    }

    fn now_epoch_ms(&self) -> i64 {
        self.now().timestamp_millis()
    }
}

/// Wall clock in the process-local timezone.
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> DateTime<Local> {
        Local::now()
    }
}

/// Settable clock for simulations and tests.
#[derive(Debug)]
pub struct FixedClock {
    now: Mutex<DateTime<Local>>,
}

impl FixedClock {
    pub fn new(now: DateTime<Local>) -> Self {
        Self {
            now: Mutex::new(now),
        }
    }

    /// Clock pinned to local noon of `date`.
    pub fn on(date: NaiveDate) -> Self {
        Self::new(local_noon(date))
    }

    pub fn set(&self, now: DateTime<Local>) {
        match self.now.lock() {
            Ok(mut guard) => *guard = now,
            Err(poisoned) => *poisoned.into_inner() = now,
        }
    }

    /// Moves the clock to local noon of `date`.
    pub fn set_today(&self, date: NaiveDate) {
        self.set(local_noon(date));
    }

    pub fn advance(&self, delta: TimeDelta) {
        let next = self.now() + delta;
        self.set(next);
    }
}

impl Clock for FixedClock {
    fn now(&self) -> DateTime<Local> {
        match self.now.lock() {
            Ok(guard) => *guard,
            Err(poisoned) => *poisoned.into_inner(),
        }
    }
}

fn local_noon(date: NaiveDate) -> DateTime<Local> {
    let naive = date.and_time(NaiveTime::MIN) + TimeDelta::hours(12);
    Local
        .from_local_datetime(&naive)
        .earliest()
        .unwrap_or_else(|| Utc.from_utc_datetime(&naive).with_timezone(&Local))
}
