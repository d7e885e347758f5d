//! Closed code sets used across visits, visitors and slots.
//!
//! Every code is stored and serialised as its SCREAMING_SNAKE_CASE name. The
//! `strum` derives give the string round-trip used by the store; the serde
//! derives give the JSON form. Both must agree.

use serde::{Deserialize, Serialize};
use strum::{AsRefStr, Display, EnumIter, EnumString};

// ─── Visit ───────────────────────────────────────────────────────────────────

/// How the visit takes place.
#[derive(
  Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize,
  AsRefStr, Display, EnumString, EnumIter,
)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
#[strum(serialize_all = "SCREAMING_SNAKE_CASE")]
pub enum VisitType {
  InPerson,
  Telephone,
  Video,
  Unknown,
}

impl VisitType {
  pub fn description(self) -> &'static str {
    match self {
      Self::InPerson => "In person",
      Self::Telephone => "Telephone",
      Self::Video => "Video",
      Self::Unknown => "Unknown",
    }
  }
}

/// Where a visit sits in its lifecycle.
///
/// ```text
/// SCHEDULED ──complete()──▶ COMPLETED
///     │  └────cancel()────▶ CANCELLED
///     ▼ (expiry sweep)
///  EXPIRED ──complete()──▶ COMPLETED
///        └────cancel()────▶ CANCELLED
/// ```
#[derive(
  Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize,
  AsRefStr, Display, EnumString, EnumIter,
)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
#[strum(serialize_all = "SCREAMING_SNAKE_CASE")]
pub enum VisitStatus {
  Scheduled,
  Completed,
  Cancelled,
  Expired,
}

impl VisitStatus {
  /// `complete` and `cancel` are only legal from these states.
  pub fn is_open(self) -> bool { matches!(self, Self::Scheduled | Self::Expired) }

  pub fn description(self) -> &'static str {
    match self {
      Self::Scheduled => "Scheduled",
      Self::Completed => "Completed",
      Self::Cancelled => "Cancelled",
      Self::Expired => "Expired",
    }
  }
}

/// Why a visit ended. Each code is either a cancellation or a completion
/// outcome, never both.
#[derive(
  Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize,
  AsRefStr, Display, EnumString, EnumIter,
)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
#[strum(serialize_all = "SCREAMING_SNAKE_CASE")]
pub enum CompletionCode {
  Normal,
  PrisonerEarly,
  PrisonerRefused,
  StaffEarly,
  VisitorDenied,
  VisitorEarly,
  VisitorNoShow,
  PrisonerCancelled,
  StaffCancelled,
  VisitorCancelled,
  AdministrativeCancellation,
}

impl CompletionCode {
  pub fn is_cancellation(self) -> bool {
    match self {
      Self::PrisonerCancelled
      | Self::StaffCancelled
      | Self::VisitorCancelled
      | Self::AdministrativeCancellation => true,
      Self::Normal
      | Self::PrisonerEarly
      | Self::PrisonerRefused
      | Self::StaffEarly
      | Self::VisitorDenied
      | Self::VisitorEarly
      | Self::VisitorNoShow => false,
    }
  }

  pub fn description(self) -> &'static str {
    match self {
      Self::Normal => "Normal completion",
      Self::PrisonerEarly => "Prisoner completed early",
      Self::PrisonerRefused => "Prisoner refused to attend",
      Self::StaffEarly => "Staff completed early",
      Self::VisitorDenied => "Visitor denied entry",
      Self::VisitorEarly => "Visitor completed early",
      Self::VisitorNoShow => "Visitor did not arrive",
      Self::PrisonerCancelled => "Prisoner cancelled",
      Self::StaffCancelled => "Staff cancelled",
      Self::VisitorCancelled => "Visitor cancelled",
      Self::AdministrativeCancellation => "Administrative cancellation",
    }
  }
}

/// The level of search a prisoner received before the visit.
#[derive(
  Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize,
  AsRefStr, Display, EnumString, EnumIter,
)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
#[strum(serialize_all = "SCREAMING_SNAKE_CASE")]
pub enum SearchLevel {
  Pat,
  RubA,
  RubB,
  Full,
}

impl SearchLevel {
  pub fn description(self) -> &'static str {
    match self {
      Self::Pat => "Pat down search",
      Self::RubA => "Rub down search level A",
      Self::RubB => "Rub down search level B",
      Self::Full => "Full search",
    }
  }
}

// ─── Visitor ─────────────────────────────────────────────────────────────────

/// Who the visitor is. The variant decides which provenance fields are
/// meaningful (`contact_id` for contacts, none for official prison visitors).
#[derive(
  Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize,
  AsRefStr, Display, EnumString, EnumIter,
)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
#[strum(serialize_all = "SCREAMING_SNAKE_CASE")]
pub enum VisitorType {
  Contact,
  Opv,
  Prisoner,
}

impl VisitorType {
  /// Contact visitors are checked against the prisoner's approved contacts.
  pub fn is_contact(self) -> bool { matches!(self, Self::Contact) }

  pub fn description(self) -> &'static str {
    match self {
      Self::Contact => "Contact",
      Self::Opv => "Official prison visitor",
      Self::Prisoner => "Prisoner",
    }
  }
}

#[derive(
  Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize,
  AsRefStr, Display, EnumString, EnumIter,
)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
#[strum(serialize_all = "SCREAMING_SNAKE_CASE")]
pub enum RelationshipType {
  Social,
  Official,
}

impl RelationshipType {
  pub fn description(self) -> &'static str {
    match self {
      Self::Social => "Social",
      Self::Official => "Official",
    }
  }
}

#[derive(
  Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize,
  AsRefStr, Display, EnumString, EnumIter,
)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
#[strum(serialize_all = "SCREAMING_SNAKE_CASE")]
pub enum AttendanceCode {
  Attended,
  Absent,
}

impl AttendanceCode {
  pub fn description(self) -> &'static str {
    match self {
      Self::Attended => "Attended",
      Self::Absent => "Absent",
    }
  }
}

// ─── Slots ───────────────────────────────────────────────────────────────────

/// Day of the week a recurring time slot falls on.
#[derive(
  Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize,
  AsRefStr, Display, EnumString, EnumIter,
)]
#[serde(rename_all = "UPPERCASE")]
#[strum(serialize_all = "UPPERCASE")]
pub enum DayCode {
  Mon,
  Tue,
  Wed,
  Thu,
  Fri,
  Sat,
  Sun,
}

impl DayCode {
  pub fn description(self) -> &'static str {
    match self {
      Self::Mon => "Monday",
      Self::Tue => "Tuesday",
      Self::Wed => "Wednesday",
      Self::Thu => "Thursday",
      Self::Fri => "Friday",
      Self::Sat => "Saturday",
      Self::Sun => "Sunday",
    }
  }
}

impl From<chrono::Weekday> for DayCode {
  fn from(day: chrono::Weekday) -> Self {
    match day {
      chrono::Weekday::Mon => Self::Mon,
      chrono::Weekday::Tue => Self::Tue,
      chrono::Weekday::Wed => Self::Wed,
      chrono::Weekday::Thu => Self::Thu,
      chrono::Weekday::Fri => Self::Fri,
      chrono::Weekday::Sat => Self::Sat,
      chrono::Weekday::Sun => Self::Sun,
    }
  }
}
