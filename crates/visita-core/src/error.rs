//! Error types for `visita-core`.

use std::fmt;

use chrono::{NaiveDate, NaiveTime};
use thiserror::Error;

use crate::{
  codes::{CompletionCode, DayCode, VisitStatus},
  slot::LegacyTimeSlotKey,
};

/// A batch of caller-facing validation messages.
///
/// Lookups are folded into one of these before anything is written, so a
/// caller always sees the full report rather than the first failure.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ValidationErrors {
  messages: Vec<String>,
}

impl ValidationErrors {
  pub fn new() -> Self { Self::default() }

  pub fn single(message: impl Into<String>) -> Self {
    Self { messages: vec![message.into()] }
  }

  pub fn push(&mut self, message: impl Into<String>) {
    self.messages.push(message.into());
  }

  pub fn extend(&mut self, other: ValidationErrors) {
    self.messages.extend(other.messages);
  }

  pub fn is_empty(&self) -> bool { self.messages.is_empty() }

  pub fn messages(&self) -> &[String] { &self.messages }

  /// `Ok(())` when nothing was collected, otherwise the whole batch.
  pub fn into_result(self) -> Result<()> {
    if self.is_empty() {
      Ok(())
    } else {
      Err(Error::Validation(self))
    }
  }
}

impl fmt::Display for ValidationErrors {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    f.write_str(&self.messages.join("; "))
  }
}

#[derive(Debug, Error)]
pub enum Error {
  #[error("{0}")]
  Validation(ValidationErrors),

  #[error("Only scheduled or expired visits can be completed.")]
  NotCompletable { visit_id: i64, status: VisitStatus },

  #[error("Only scheduled or expired visits can be cancelled.")]
  NotCancellable { visit_id: i64, status: VisitStatus },

  #[error("Visitors can only be added to scheduled visits.")]
  VisitorsClosed { visit_id: i64, status: VisitStatus },

  #[error("{0} is not a cancellation code")]
  NotACancellationCode(CompletionCode),

  #[error("{0} is a cancellation code and cannot complete a visit")]
  CancellationCodeOnCompletion(CompletionCode),

  #[error("start time {start} must be before end time {end}")]
  InvalidTimeRange { start: NaiveTime, end: NaiveTime },

  #[error("expiry date {expiry} is before effective date {effective}")]
  InvalidDateRange { effective: NaiveDate, expiry: NaiveDate },

  #[error(
    "Time slot {start}-{end} overlaps existing time slot {existing_id} \
     ({existing_start}-{existing_end}) for {prison_code} on {day}"
  )]
  TimeSlotOverlap {
    prison_code:    String,
    day:            DayCode,
    start:          NaiveTime,
    end:            NaiveTime,
    existing_id:    i64,
    existing_start: NaiveTime,
    existing_end:   NaiveTime,
  },

  #[error(
    "Visit {start}-{end} on {date} overlaps official visit {existing_id} in visit slot {visit_slot_id}"
  )]
  VisitOverlap {
    visit_slot_id: i64,
    date:          NaiveDate,
    start:         NaiveTime,
    end:           NaiveTime,
    existing_id:   i64,
  },

  #[error("official visit not found: {0}")]
  VisitNotFound(i64),

  #[error("visitor {visitor_id} is not on official visit {visit_id}")]
  VisitorNotOnVisit { visit_id: i64, visitor_id: i64 },

  #[error("prison time slot not found: {0}")]
  TimeSlotNotFound(i64),

  #[error("prison visit slot not found: {0}")]
  VisitSlotNotFound(i64),

  #[error("no prison visit slot was migrated with legacy id {0}")]
  LegacyVisitSlotNotFound(i64),

  #[error("no prison time slot was migrated with legacy key {0}")]
  LegacyTimeSlotNotFound(LegacyTimeSlotKey),

  #[error("{element} with legacy id {legacy_id} has already been migrated")]
  DuplicateLegacyId { element: &'static str, legacy_id: String },

  #[error("unknown {kind} code: {code:?}")]
  UnknownCode { kind: &'static str, code: String },

  #[error("serialization error: {0}")]
  Serialization(#[from] serde_json::Error),
}

pub type Result<T, E = Error> = std::result::Result<T, E>;
