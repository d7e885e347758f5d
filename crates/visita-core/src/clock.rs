//! Source of "now" for audit stamps and slot activity windows.

use chrono::{DateTime, Local, NaiveDate, Utc};

pub trait Clock: Send + Sync {
  fn now(&self) -> DateTime<Utc>;

  /// The calendar date used for "is this slot active today" decisions.
  fn today(&self) -> NaiveDate;
}

/// Wall-clock time; `today` follows the host's local calendar.
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
  fn now(&self) -> DateTime<Utc> { Utc::now() }

  fn today(&self) -> NaiveDate { Local::now().date_naive() }
}

/// A clock frozen at a single instant.
#[derive(Debug, Clone, Copy)]
pub struct FixedClock {
  pub now:   DateTime<Utc>,
  pub today: NaiveDate,
}

impl FixedClock {
  pub fn at(now: DateTime<Utc>) -> Self { Self { now, today: now.date_naive() } }
}

impl Clock for FixedClock {
  fn now(&self) -> DateTime<Utc> { self.now }

  fn today(&self) -> NaiveDate { self.today }
}
