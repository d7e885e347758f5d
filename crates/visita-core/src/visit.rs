//! Official visits, their visitors, and the transitions between visit states.
//!
//! The transition rules live on [`Visit`] itself as pure mutations so every
//! store applies them identically inside its own unit of work. Each
//! transition validates everything first and only then mutates, so a failed
//! call leaves the visit untouched.

use std::collections::BTreeMap;

use chrono::{DateTime, Datelike as _, NaiveDate, NaiveTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::{
  Error, Result, ValidationErrors,
  codes::{
    AttendanceCode, CompletionCode, DayCode, RelationshipType, SearchLevel,
    VisitStatus, VisitType, VisitorType,
  },
  overlap::TimeRange,
  slot::{PrisonTimeSlot, PrisonVisitSlot},
};

// ─── Audit ───────────────────────────────────────────────────────────────────

/// Who created and last changed a record, and when.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Audit {
  pub created_by:   String,
  pub created_time: DateTime<Utc>,
  pub updated_by:   Option<String>,
  pub updated_time: Option<DateTime<Utc>>,
}

impl Audit {
  pub fn created(by: impl Into<String>, at: DateTime<Utc>) -> Self {
    Self {
      created_by:   by.into(),
      created_time: at,
      updated_by:   None,
      updated_time: None,
    }
  }

  pub fn touch(&mut self, by: impl Into<String>, at: DateTime<Utc>) {
    self.updated_by = Some(by.into());
    self.updated_time = Some(at);
  }
}

// ─── Visitor ─────────────────────────────────────────────────────────────────

/// A person attending an official visit. Owned by exactly one [`Visit`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Visitor {
  pub official_visitor_id: i64,
  pub visitor_type:        VisitorType,
  pub contact_id:          Option<i64>,
  pub prisoner_contact_id: Option<i64>,
  pub first_name:          Option<String>,
  pub last_name:           Option<String>,
  pub relationship_type:   Option<RelationshipType>,
  /// Free-form, e.g. `SOL` (solicitor); described through reference data.
  pub relationship_code:   Option<String>,
  pub lead_visitor:        bool,
  pub assisted_visit:      bool,
  /// `None` until the visit is completed, and possibly after.
  pub attendance:          Option<AttendanceCode>,
  pub notes:               Option<String>,
  pub legacy_person_id:    Option<i64>,
  pub audit:               Audit,
}

/// Input to the visit's "add visitor" operation.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NewVisitor {
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
  pub notes:               Option<String>,
}

impl NewVisitor {
  /// Convenience constructor with every optional field empty.
  pub fn new(visitor_type: VisitorType) -> Self {
    Self {
      visitor_type,
      contact_id: None,
      prisoner_contact_id: None,
      first_name: None,
      last_name: None,
      relationship_type: None,
      relationship_code: None,
      lead_visitor: false,
      assisted_visit: false,
      notes: None,
    }
  }
}

// ─── Visit ───────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Visit {
  pub official_visit_id:    i64,
  pub prison_visit_slot_id: i64,
  pub prison_code:          String,
  pub prisoner_number:      String,
  pub visit_date:           NaiveDate,
  pub start_time:           NaiveTime,
  pub end_time:             NaiveTime,
  pub visit_type:           VisitType,
  pub dps_location_id:      Uuid,
  pub status:               VisitStatus,
  pub completion_code:      Option<CompletionCode>,
  pub search_type:          Option<SearchLevel>,
  pub notes:                Option<String>,
  pub legacy_visit_id:      Option<i64>,
  pub audit:                Audit,
  /// Insertion order is preserved by every store.
  pub visitors:             Vec<Visitor>,
}

/// Input to [`crate::store::VisitStore::create_visit`].
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NewVisit {
  pub prisoner_number:      String,
  pub prison_code:          String,
  pub prison_visit_slot_id: i64,
  pub visit_date:           NaiveDate,
  pub start_time:           NaiveTime,
  pub end_time:             NaiveTime,
  pub visit_type:           VisitType,
  #[serde(default)]
  pub visitors:             Vec<NewVisitor>,
}

impl NewVisit {
  pub fn range(&self) -> Result<TimeRange> { TimeRange::new(self.start_time, self.end_time) }

  /// Check the visit against the slot it books: same prison, the time
  /// slot's weekday, a date the time slot is in force, and a range inside
  /// the time slot's window. Overlap with other bookings is checked
  /// separately, inside the store's transaction.
  pub fn check_fits(
    &self,
    time_slot: &PrisonTimeSlot,
    visit_slot: &PrisonVisitSlot,
  ) -> Result<TimeRange> {
    let range = self.range()?;
    let mut errors = ValidationErrors::new();

    if visit_slot.prison_time_slot_id != time_slot.prison_time_slot_id {
      return Err(Error::TimeSlotNotFound(visit_slot.prison_time_slot_id));
    }
    if time_slot.prison_code != self.prison_code {
      errors.push(format!(
        "Visit slot {} is not at prison code {}",
        visit_slot.prison_visit_slot_id, self.prison_code
      ));
    }
    let day = DayCode::from(self.visit_date.weekday());
    if day != time_slot.day_code {
      errors.push(format!(
        "Visit date {} is a {} but visit slot {} runs on {}",
        self.visit_date,
        day.description(),
        visit_slot.prison_visit_slot_id,
        time_slot.day_code.description(),
      ));
    }
    if !time_slot.is_active_on(self.visit_date) {
      errors.push(format!(
        "Visit slot {} is not in effect on {}",
        visit_slot.prison_visit_slot_id, self.visit_date
      ));
    }
    let window = time_slot.range()?;
    if !window.contains(&range) {
      errors.push(format!(
        "Visit time {}-{} is outside the time slot {}-{}",
        range.start().format("%H:%M"),
        range.end().format("%H:%M"),
        window.start().format("%H:%M"),
        window.end().format("%H:%M"),
      ));
    }

    errors.into_result().map(|()| range)
  }
}

/// Everything `complete` needs, stamped with the acting user.
#[derive(Debug, Clone)]
pub struct Completion {
  pub code:         CompletionCode,
  pub search_type:  Option<SearchLevel>,
  /// Visitors absent from the map keep a `None` attendance.
  pub attendance:   BTreeMap<i64, AttendanceCode>,
  pub completed_by: String,
  pub completed_at: DateTime<Utc>,
}

#[derive(Debug, Clone)]
pub struct Cancellation {
  pub code:         CompletionCode,
  pub notes:        Option<String>,
  pub cancelled_by: String,
  pub cancelled_at: DateTime<Utc>,
}

impl Visit {
  pub fn range(&self) -> Result<TimeRange> { TimeRange::new(self.start_time, self.end_time) }

  pub fn visitor(&self, official_visitor_id: i64) -> Option<&Visitor> {
    self
      .visitors
      .iter()
      .find(|v| v.official_visitor_id == official_visitor_id)
  }

  /// Only a scheduled visit may gain visitors.
  pub fn ensure_accepts_visitors(&self) -> Result<()> {
    if self.status == VisitStatus::Scheduled {
      Ok(())
    } else {
      Err(Error::VisitorsClosed {
        visit_id: self.official_visit_id,
        status:   self.status,
      })
    }
  }

  /// SCHEDULED | EXPIRED → COMPLETED.
  pub fn complete(&mut self, completion: &Completion) -> Result<()> {
    if !self.status.is_open() {
      return Err(Error::NotCompletable {
        visit_id: self.official_visit_id,
        status:   self.status,
      });
    }
    if completion.code.is_cancellation() {
      return Err(Error::CancellationCodeOnCompletion(completion.code));
    }
    if let Some(&visitor_id) = completion
      .attendance
      .keys()
      .find(|id| self.visitor(**id).is_none())
    {
      return Err(Error::VisitorNotOnVisit {
        visit_id: self.official_visit_id,
        visitor_id,
      });
    }

    self.status = VisitStatus::Completed;
    self.completion_code = Some(completion.code);
    self.search_type = completion.search_type;
    for visitor in &mut self.visitors {
      if let Some(code) = completion.attendance.get(&visitor.official_visitor_id) {
        visitor.attendance = Some(*code);
        visitor
          .audit
          .touch(&completion.completed_by, completion.completed_at);
      }
    }
    self
      .audit
      .touch(&completion.completed_by, completion.completed_at);
    Ok(())
  }

  /// SCHEDULED | EXPIRED → CANCELLED. Visitor attendance is left alone.
  pub fn cancel(&mut self, cancellation: &Cancellation) -> Result<()> {
    if !self.status.is_open() {
      return Err(Error::NotCancellable {
        visit_id: self.official_visit_id,
        status:   self.status,
      });
    }
    if !cancellation.code.is_cancellation() {
      return Err(Error::NotACancellationCode(cancellation.code));
    }

    self.status = VisitStatus::Cancelled;
    self.completion_code = Some(cancellation.code);
    self.notes = cancellation.notes.clone();
    self
      .audit
      .touch(&cancellation.cancelled_by, cancellation.cancelled_at);
    Ok(())
  }
}

/// The status/completion-code pairing every stored visit must satisfy.
///
/// Migrated visits arrive already in their final state, so this is checked
/// explicitly rather than being guaranteed by the transitions above.
pub fn check_completion_invariant(
  status: VisitStatus,
  code: Option<CompletionCode>,
) -> Result<()> {
  let ok = match (status, code) {
    (VisitStatus::Scheduled | VisitStatus::Expired, None) => true,
    (VisitStatus::Completed, Some(c)) => !c.is_cancellation(),
    (VisitStatus::Cancelled, Some(c)) => c.is_cancellation(),
    _ => false,
  };
  if ok {
    Ok(())
  } else {
    Err(Error::Validation(ValidationErrors::single(format!(
      "Completion code {} is not valid for a visit with status {status}",
      code.map_or_else(|| "(none)".to_owned(), |c| c.to_string()),
    ))))
  }
}

#[cfg(test)]
mod tests {
  use chrono::TimeZone;

  use super::*;

  fn at(secs: i64) -> DateTime<Utc> { Utc.timestamp_opt(secs, 0).unwrap() }

  fn visitor(id: i64) -> Visitor {
    Visitor {
      official_visitor_id: id,
      visitor_type:        VisitorType::Contact,
      contact_id:          Some(100 + id),
      prisoner_contact_id: None,
      first_name:          Some("Jo".into()),
      last_name:           Some("Bloggs".into()),
      relationship_type:   Some(RelationshipType::Official),
      relationship_code:   Some("SOL".into()),
      lead_visitor:        id == 1,
      assisted_visit:      false,
      attendance:          None,
      notes:               None,
      legacy_person_id:    None,
      audit:               Audit::created("creator", at(0)),
    }
  }

  fn visit(status: VisitStatus) -> Visit {
    Visit {
      official_visit_id:    9,
      prison_visit_slot_id: 3,
      prison_code:          "MDI".into(),
      prisoner_number:      "A1234BC".into(),
      visit_date:           NaiveDate::from_ymd_opt(2026, 3, 2).unwrap(),
      start_time:           NaiveTime::from_hms_opt(9, 0, 0).unwrap(),
      end_time:             NaiveTime::from_hms_opt(10, 0, 0).unwrap(),
      visit_type:           VisitType::InPerson,
      dps_location_id:      Uuid::nil(),
      status,
      completion_code:      None,
      search_type:          None,
      notes:                None,
      legacy_visit_id:      None,
      audit:                Audit::created("creator", at(0)),
      visitors:             vec![visitor(1), visitor(2)],
    }
  }

  fn completion(attendance: BTreeMap<i64, AttendanceCode>) -> Completion {
    Completion {
      code: CompletionCode::Normal,
      search_type: Some(SearchLevel::RubA),
      attendance,
      completed_by: "officer".into(),
      completed_at: at(60),
    }
  }

  fn cancellation(code: CompletionCode) -> Cancellation {
    Cancellation {
      code,
      notes: Some("solicitor unavailable".into()),
      cancelled_by: "officer".into(),
      cancelled_at: at(60),
    }
  }

  #[test]
  fn complete_sets_only_named_attendance() {
    let mut v = visit(VisitStatus::Scheduled);
    v.complete(&completion(BTreeMap::from([(1, AttendanceCode::Attended)])))
      .unwrap();

    assert_eq!(v.status, VisitStatus::Completed);
    assert_eq!(v.completion_code, Some(CompletionCode::Normal));
    assert_eq!(v.search_type, Some(SearchLevel::RubA));
    assert_eq!(v.visitors[0].attendance, Some(AttendanceCode::Attended));
    assert_eq!(v.visitors[1].attendance, None);
    assert_eq!(v.audit.updated_by.as_deref(), Some("officer"));
    assert_eq!(v.audit.updated_time, Some(at(60)));
  }

  #[test]
  fn expired_visits_can_be_completed() {
    let mut v = visit(VisitStatus::Expired);
    assert!(v.complete(&completion(BTreeMap::new())).is_ok());
    assert_eq!(v.status, VisitStatus::Completed);
  }

  #[test]
  fn terminal_visits_cannot_be_completed_and_stay_unchanged() {
    for status in [VisitStatus::Completed, VisitStatus::Cancelled] {
      let mut v = visit(status);
      let before = v.clone();
      let err = v
        .complete(&completion(BTreeMap::from([(1, AttendanceCode::Attended)])))
        .unwrap_err();
      assert_eq!(err.to_string(), "Only scheduled or expired visits can be completed.");
      assert_eq!(v, before);
    }
  }

  #[test]
  fn unknown_visitor_in_attendance_rejects_whole_completion() {
    let mut v = visit(VisitStatus::Scheduled);
    let before = v.clone();
    let err = v
      .complete(&completion(BTreeMap::from([
        (1, AttendanceCode::Attended),
        (99, AttendanceCode::Absent),
      ])))
      .unwrap_err();
    assert!(matches!(err, Error::VisitorNotOnVisit { visitor_id: 99, .. }));
    assert_eq!(v, before);
  }

  #[test]
  fn cancellation_codes_cannot_complete() {
    let mut v = visit(VisitStatus::Scheduled);
    let mut c = completion(BTreeMap::new());
    c.code = CompletionCode::StaffCancelled;
    assert!(matches!(
      v.complete(&c),
      Err(Error::CancellationCodeOnCompletion(CompletionCode::StaffCancelled))
    ));
  }

  #[test]
  fn cancel_records_code_and_notes_without_attendance() {
    let mut v = visit(VisitStatus::Scheduled);
    v.cancel(&cancellation(CompletionCode::VisitorCancelled)).unwrap();

    assert_eq!(v.status, VisitStatus::Cancelled);
    assert_eq!(v.completion_code, Some(CompletionCode::VisitorCancelled));
    assert_eq!(v.notes.as_deref(), Some("solicitor unavailable"));
    assert!(v.visitors.iter().all(|visitor| visitor.attendance.is_none()));
  }

  #[test]
  fn cancel_rejects_non_cancellation_code() {
    let mut v = visit(VisitStatus::Scheduled);
    assert!(matches!(
      v.cancel(&cancellation(CompletionCode::Normal)),
      Err(Error::NotACancellationCode(CompletionCode::Normal))
    ));
    assert_eq!(v.status, VisitStatus::Scheduled);
  }

  #[test]
  fn second_cancel_fails() {
    let mut v = visit(VisitStatus::Scheduled);
    v.cancel(&cancellation(CompletionCode::StaffCancelled)).unwrap();
    assert!(matches!(
      v.cancel(&cancellation(CompletionCode::StaffCancelled)),
      Err(Error::NotCancellable { status: VisitStatus::Cancelled, .. })
    ));
  }

  #[test]
  fn visitors_only_join_scheduled_visits() {
    assert!(visit(VisitStatus::Scheduled).ensure_accepts_visitors().is_ok());
    let err = visit(VisitStatus::Expired).ensure_accepts_visitors().unwrap_err();
    assert_eq!(err.to_string(), "Visitors can only be added to scheduled visits.");
  }

  fn slots() -> (PrisonTimeSlot, PrisonVisitSlot) {
    let time_slot = PrisonTimeSlot {
      prison_time_slot_id: 4,
      prison_code:         "MDI".into(),
      day_code:            DayCode::Mon,
      start_time:          NaiveTime::from_hms_opt(9, 0, 0).unwrap(),
      end_time:            NaiveTime::from_hms_opt(12, 0, 0).unwrap(),
      effective_date:      NaiveDate::from_ymd_opt(2026, 1, 1).unwrap(),
      expiry_date:         None,
      legacy:              None,
      audit:               Audit::created("creator", at(0)),
    };
    let visit_slot = PrisonVisitSlot {
      prison_visit_slot_id: 3,
      prison_time_slot_id:  4,
      dps_location_id:      Uuid::nil(),
      max_adults:           Some(4),
      max_groups:           Some(1),
      max_video_sessions:   None,
      legacy_visit_slot_id: None,
      audit:                Audit::created("creator", at(0)),
    };
    (time_slot, visit_slot)
  }

  fn new_visit(date: NaiveDate, start: u32, end: u32) -> NewVisit {
    NewVisit {
      prisoner_number:      "A1234BC".into(),
      prison_code:          "MDI".into(),
      prison_visit_slot_id: 3,
      visit_date:           date,
      start_time:           NaiveTime::from_hms_opt(start, 0, 0).unwrap(),
      end_time:             NaiveTime::from_hms_opt(end, 0, 0).unwrap(),
      visit_type:           VisitType::InPerson,
      visitors:             vec![],
    }
  }

  #[test]
  fn visit_inside_a_monday_window_fits() {
    let (ts, vs) = slots();
    let monday = NaiveDate::from_ymd_opt(2026, 3, 2).unwrap();
    assert!(new_visit(monday, 10, 11).check_fits(&ts, &vs).is_ok());
  }

  #[test]
  fn wrong_day_and_outside_window_are_reported_together() {
    let (ts, vs) = slots();
    let tuesday = NaiveDate::from_ymd_opt(2026, 3, 3).unwrap();
    let err = new_visit(tuesday, 11, 13).check_fits(&ts, &vs).unwrap_err();
    let Error::Validation(errors) = err else { panic!("expected validation error") };
    assert_eq!(errors.messages().len(), 2);
    assert!(errors.messages()[0].contains("is a Tuesday"));
    assert_eq!(
      errors.messages()[1],
      "Visit time 11:00-13:00 is outside the time slot 09:00-12:00"
    );
  }

  #[test]
  fn visit_before_slot_takes_effect_does_not_fit() {
    let (ts, vs) = slots();
    let early_monday = NaiveDate::from_ymd_opt(2025, 12, 29).unwrap();
    assert!(new_visit(early_monday, 9, 10).check_fits(&ts, &vs).is_err());
  }

  #[test]
  fn completion_invariant_pairs_status_with_code_kind() {
    assert!(check_completion_invariant(VisitStatus::Scheduled, None).is_ok());
    assert!(
      check_completion_invariant(VisitStatus::Completed, Some(CompletionCode::Normal)).is_ok()
    );
    assert!(
      check_completion_invariant(VisitStatus::Cancelled, Some(CompletionCode::Normal)).is_err()
    );
    assert!(check_completion_invariant(VisitStatus::Completed, None).is_err());
    assert!(
      check_completion_invariant(VisitStatus::Scheduled, Some(CompletionCode::Normal)).is_err()
    );
  }
}
