//! Migration and sync payloads, and the [`IdPair`] correlation records they
//! produce.
//!
//! A migration submits records exactly as the legacy system holds them,
//! including their audit history and final states. The response pairs every
//! submitted legacy identifier with the identifier minted here, in the order
//! submitted.

use chrono::{NaiveDate, NaiveTime};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::{
  Result, ValidationErrors,
  codes::{
    AttendanceCode, CompletionCode, RelationshipType, SearchLevel, VisitStatus,
    VisitType, VisitorType,
  },
  overlap::TimeRange,
  slot::{LegacyTimeSlotKey, TimeSlotDefinition},
  visit::{Audit, check_completion_invariant},
};

// ─── IdPair ──────────────────────────────────────────────────────────────────

/// The kind of record an [`IdPair`] was minted for.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ElementType {
  PrisonTimeSlot,
  PrisonVisitSlot,
  OfficialVisit,
  OfficialVisitor,
}

impl ElementType {
  pub fn as_str(self) -> &'static str {
    match self {
      Self::PrisonTimeSlot => "PRISON_TIME_SLOT",
      Self::PrisonVisitSlot => "PRISON_VISIT_SLOT",
      Self::OfficialVisit => "OFFICIAL_VISIT",
      Self::OfficialVisitor => "OFFICIAL_VISITOR",
    }
  }
}

/// A legacy identifier: a plain id for most records, the composite key for
/// time slots.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum LegacyId {
  Id(i64),
  TimeSlot(LegacyTimeSlotKey),
}

impl std::fmt::Display for LegacyId {
  fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
    match self {
      Self::Id(id) => write!(f, "{id}"),
      Self::TimeSlot(key) => write!(f, "{key}"),
    }
  }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct IdPair {
  pub element_type: ElementType,
  pub legacy_id:    LegacyId,
  pub dps_id:       i64,
}

impl IdPair {
  pub fn new(element_type: ElementType, legacy_id: LegacyId, dps_id: i64) -> Self {
    Self { element_type, legacy_id, dps_id }
  }
}

// ─── Time slot migration ─────────────────────────────────────────────────────

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MigrateVisitSlot {
  pub legacy_visit_slot_id: i64,
  pub dps_location_id:      Uuid,
  #[serde(default)]
  pub max_adults:           Option<u32>,
  #[serde(default)]
  pub max_groups:           Option<u32>,
  #[serde(default)]
  pub max_video_sessions:   Option<u32>,
  #[serde(flatten)]
  pub audit:                Audit,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MigrateTimeSlotRequest {
  pub legacy:         LegacyTimeSlotKey,
  pub start_time:     NaiveTime,
  pub end_time:       NaiveTime,
  pub effective_date: NaiveDate,
  #[serde(default)]
  pub expiry_date:    Option<NaiveDate>,
  #[serde(flatten)]
  pub audit:          Audit,
  #[serde(default)]
  pub visit_slots:    Vec<MigrateVisitSlot>,
}

impl MigrateTimeSlotRequest {
  /// The slot shape implied by the legacy key and times.
  pub fn definition(&self) -> TimeSlotDefinition {
    TimeSlotDefinition {
      prison_code:    self.legacy.prison_code.clone(),
      day_code:       self.legacy.day_code,
      start_time:     self.start_time,
      end_time:       self.end_time,
      effective_date: self.effective_date,
      expiry_date:    self.expiry_date,
    }
  }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MigrateTimeSlotResponse {
  pub time_slot:   IdPair,
  pub visit_slots: Vec<IdPair>,
}

// ─── Visit migration ─────────────────────────────────────────────────────────

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MigrateVisitor {
  pub legacy_person_id:    i64,
  pub visitor_type:        VisitorType,
  #[serde(default)]
  pub contact_id:          Option<i64>,
  #[serde(default)]
  pub prisoner_contact_id: Option<i64>,
  #[serde(default)]
  pub first_name:          Option<String>,
  #[serde(default)]
  pub last_name:           Option<String>,
  #[serde(default)]
  pub relationship_type:   Option<RelationshipType>,
  #[serde(default)]
  pub relationship_code:   Option<String>,
  #[serde(default)]
  pub lead_visitor:        bool,
  #[serde(default)]
  pub assisted_visit:      bool,
  #[serde(default)]
  pub attendance:          Option<AttendanceCode>,
  #[serde(default)]
  pub notes:               Option<String>,
  #[serde(flatten)]
  pub audit:               Audit,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MigrateVisitRequest {
  pub legacy_visit_id:      i64,
  /// Resolved to the visit slot previously migrated with this legacy id.
  pub legacy_visit_slot_id: i64,
  pub prison_code:          String,
  pub prisoner_number:      String,
  pub visit_date:           NaiveDate,
  pub start_time:           NaiveTime,
  pub end_time:             NaiveTime,
  pub visit_type:           VisitType,
  pub status:               VisitStatus,
  #[serde(default)]
  pub completion_code:      Option<CompletionCode>,
  #[serde(default)]
  pub search_type:          Option<SearchLevel>,
  #[serde(default)]
  pub notes:                Option<String>,
  #[serde(flatten)]
  pub audit:                Audit,
  #[serde(default)]
  pub visitors:             Vec<MigrateVisitor>,
}

impl MigrateVisitRequest {
  /// The checks a legacy visit must pass before anything is inserted.
  pub fn validate(&self) -> Result<TimeRange> {
    let range = TimeRange::new(self.start_time, self.end_time)?;
    check_completion_invariant(self.status, self.completion_code)?;

    if self.status != VisitStatus::Completed {
      let with_attendance: Vec<String> = self
        .visitors
        .iter()
        .filter(|v| v.attendance.is_some())
        .map(|v| v.legacy_person_id.to_string())
        .collect();
      if !with_attendance.is_empty() {
        return Err(crate::Error::Validation(ValidationErrors::single(format!(
          "Attendance can only be recorded for completed visits [{}]",
          with_attendance.join(", ")
        ))));
      }
    }
    Ok(range)
  }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MigrateVisitResponse {
  pub visit:    IdPair,
  pub visitors: Vec<IdPair>,
}

// ─── Sync ────────────────────────────────────────────────────────────────────

/// A single time slot created or changed in the legacy system.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SyncTimeSlotRequest {
  pub legacy:         LegacyTimeSlotKey,
  pub start_time:     NaiveTime,
  pub end_time:       NaiveTime,
  pub effective_date: NaiveDate,
  #[serde(default)]
  pub expiry_date:    Option<NaiveDate>,
  /// The legacy user who made the change.
  pub changed_by:     String,
}

impl SyncTimeSlotRequest {
  pub fn definition(&self) -> TimeSlotDefinition {
    TimeSlotDefinition {
      prison_code:    self.legacy.prison_code.clone(),
      day_code:       self.legacy.day_code,
      start_time:     self.start_time,
      end_time:       self.end_time,
      effective_date: self.effective_date,
      expiry_date:    self.expiry_date,
    }
  }
}

#[cfg(test)]
mod tests {
  use chrono::{TimeZone, Utc};

  use super::*;
  use crate::codes::DayCode;

  fn request(status: VisitStatus, code: Option<CompletionCode>) -> MigrateVisitRequest {
    MigrateVisitRequest {
      legacy_visit_id:      501,
      legacy_visit_slot_id: 77,
      prison_code:          "MDI".into(),
      prisoner_number:      "A1234BC".into(),
      visit_date:           NaiveDate::from_ymd_opt(2024, 5, 6).unwrap(),
      start_time:           NaiveTime::from_hms_opt(9, 0, 0).unwrap(),
      end_time:             NaiveTime::from_hms_opt(10, 0, 0).unwrap(),
      visit_type:           VisitType::InPerson,
      status,
      completion_code:      code,
      search_type:          None,
      notes:                None,
      audit:                Audit::created("NOMIS_USER", Utc.timestamp_opt(0, 0).unwrap()),
      visitors:             vec![MigrateVisitor {
        legacy_person_id:    9001,
        visitor_type:        VisitorType::Contact,
        contact_id:          Some(9001),
        prisoner_contact_id: None,
        first_name:          None,
        last_name:           None,
        relationship_type:   None,
        relationship_code:   None,
        lead_visitor:        true,
        assisted_visit:      false,
        attendance:          Some(AttendanceCode::Attended),
        notes:               None,
        audit:               Audit::created("NOMIS_USER", Utc.timestamp_opt(0, 0).unwrap()),
      }],
    }
  }

  #[test]
  fn completed_legacy_visit_with_attendance_is_valid() {
    assert!(
      request(VisitStatus::Completed, Some(CompletionCode::Normal))
        .validate()
        .is_ok()
    );
  }

  #[test]
  fn attendance_on_cancelled_visit_is_rejected() {
    let err = request(VisitStatus::Cancelled, Some(CompletionCode::StaffCancelled))
      .validate()
      .unwrap_err();
    assert_eq!(
      err.to_string(),
      "Attendance can only be recorded for completed visits [9001]"
    );
  }

  #[test]
  fn legacy_ids_serialise_untagged() {
    let plain = serde_json::to_value(LegacyId::Id(12)).unwrap();
    assert_eq!(plain, serde_json::json!(12));

    let composite = serde_json::to_value(LegacyId::TimeSlot(LegacyTimeSlotKey {
      prison_code: "MDI".into(),
      day_code:    DayCode::Mon,
      sequence:    1,
    }))
    .unwrap();
    assert_eq!(
      composite,
      serde_json::json!({ "prisonCode": "MDI", "dayCode": "MON", "sequence": 1 })
    );
  }
}
