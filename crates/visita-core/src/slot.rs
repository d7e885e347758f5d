//! Recurring prison time slots and the visit slots that instantiate them at a
//! physical location.

use chrono::{NaiveDate, NaiveTime};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::{
  Error, Result,
  codes::DayCode,
  overlap::{self, TimeRange},
  visit::Audit,
};

/// The legacy system identifies a time slot by prison, day and a per-day
/// sequence number rather than a single id.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LegacyTimeSlotKey {
  pub prison_code: String,
  pub day_code:    DayCode,
  pub sequence:    i64,
}

impl std::fmt::Display for LegacyTimeSlotKey {
  fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
    write!(f, "{}/{}/{}", self.prison_code, self.day_code, self.sequence)
  }
}

// ─── Time slot ───────────────────────────────────────────────────────────────

/// A recurring weekly window during which visits may take place at a prison.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PrisonTimeSlot {
  pub prison_time_slot_id: i64,
  pub prison_code:         String,
  pub day_code:            DayCode,
  pub start_time:          NaiveTime,
  pub end_time:            NaiveTime,
  pub effective_date:      NaiveDate,
  /// `None` means open-ended.
  pub expiry_date:         Option<NaiveDate>,
  pub legacy:              Option<LegacyTimeSlotKey>,
  pub audit:               Audit,
}

impl PrisonTimeSlot {
  pub fn range(&self) -> Result<TimeRange> { TimeRange::new(self.start_time, self.end_time) }

  pub fn is_active_on(&self, date: NaiveDate) -> bool {
    overlap::is_active(self.effective_date, self.expiry_date, date)
  }
}

/// The caller-controlled shape of a time slot, used for both creation and
/// update.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TimeSlotDefinition {
  pub prison_code:    String,
  pub day_code:       DayCode,
  pub start_time:     NaiveTime,
  pub end_time:       NaiveTime,
  pub effective_date: NaiveDate,
  #[serde(default)]
  pub expiry_date:    Option<NaiveDate>,
}

impl TimeSlotDefinition {
  /// Checks the shape on its own; overlap needs the other slots and is
  /// checked by the store inside its transaction.
  pub fn validate(&self) -> Result<TimeRange> {
    let range = TimeRange::new(self.start_time, self.end_time)?;
    if let Some(expiry) = self.expiry_date
      && expiry < self.effective_date
    {
      return Err(Error::InvalidDateRange {
        effective: self.effective_date,
        expiry,
      });
    }
    Ok(range)
  }
}

// ─── Visit slot ──────────────────────────────────────────────────────────────

/// One physical-location instantiation of a time slot, with capacity limits.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PrisonVisitSlot {
  pub prison_visit_slot_id: i64,
  pub prison_time_slot_id:  i64,
  pub dps_location_id:      Uuid,
  pub max_adults:           Option<u32>,
  pub max_groups:           Option<u32>,
  pub max_video_sessions:   Option<u32>,
  pub legacy_visit_slot_id: Option<i64>,
  pub audit:                Audit,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VisitSlotDefinition {
  pub dps_location_id:    Uuid,
  #[serde(default)]
  pub max_adults:         Option<u32>,
  #[serde(default)]
  pub max_groups:         Option<u32>,
  #[serde(default)]
  pub max_video_sessions: Option<u32>,
}
