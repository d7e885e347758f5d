//! Encoding and decoding helpers between Rust domain types and the plain-text
//! representations stored in SQLite columns.
//!
//! Dates are `YYYY-MM-DD` and times `HH:MM:SS`, so lexical order in SQL
//! matches chronological order. Audit instants are RFC 3339 strings. Closed
//! codes are stored as their SCREAMING_SNAKE_CASE names. UUIDs are stored as
//! hyphenated lowercase strings.

use std::str::FromStr;

use chrono::{DateTime, NaiveDate, NaiveTime, Utc};
use uuid::Uuid;
use visita_core::{
  codes::{DayCode, VisitType},
  slot::{LegacyTimeSlotKey, PrisonTimeSlot, PrisonVisitSlot},
  visit::{Audit, Visit, Visitor},
};

use crate::{Error, Result};

const DATE_FORMAT: &str = "%Y-%m-%d";
const TIME_FORMAT: &str = "%H:%M:%S";

// ─── Uuid ────────────────────────────────────────────────────────────────────

pub fn encode_uuid(id: Uuid) -> String { id.hyphenated().to_string() }

pub fn decode_uuid(s: &str) -> Result<Uuid> { Ok(Uuid::parse_str(s)?) }

// ─── Dates and times ─────────────────────────────────────────────────────────

pub fn encode_date(d: NaiveDate) -> String { d.format(DATE_FORMAT).to_string() }

pub fn decode_date(s: &str) -> Result<NaiveDate> {
  NaiveDate::parse_from_str(s, DATE_FORMAT).map_err(|e| Error::DateParse(format!("{s:?}: {e}")))
}

pub fn encode_time(t: NaiveTime) -> String { t.format(TIME_FORMAT).to_string() }

pub fn decode_time(s: &str) -> Result<NaiveTime> {
  NaiveTime::parse_from_str(s, TIME_FORMAT).map_err(|e| Error::DateParse(format!("{s:?}: {e}")))
}

pub fn encode_dt(dt: DateTime<Utc>) -> String { dt.to_rfc3339() }

pub fn decode_dt(s: &str) -> Result<DateTime<Utc>> {
  DateTime::parse_from_rfc3339(s)
    .map(|dt| dt.with_timezone(&Utc))
    .map_err(|e| Error::DateParse(e.to_string()))
}

// ─── Codes ───────────────────────────────────────────────────────────────────

pub fn encode_code<T: AsRef<str>>(code: T) -> String { code.as_ref().to_owned() }

pub fn decode_code<T: FromStr>(kind: &'static str, s: &str) -> Result<T> {
  T::from_str(s).map_err(|_| {
    Error::Core(visita_core::Error::UnknownCode {
      kind,
      code: s.to_owned(),
    })
  })
}

fn decode_opt_code<T: FromStr>(kind: &'static str, s: Option<String>) -> Result<Option<T>> {
  s.as_deref().map(|s| decode_code(kind, s)).transpose()
}

// ─── Audit ───────────────────────────────────────────────────────────────────

/// The four audit columns every table carries, in column order.
pub struct RawAudit {
  pub created_by:   String,
  pub created_time: String,
  pub updated_by:   Option<String>,
  pub updated_time: Option<String>,
}

impl RawAudit {
  /// Read the audit columns starting at column `first`.
  pub fn from_row(row: &rusqlite::Row<'_>, first: usize) -> rusqlite::Result<Self> {
    Ok(Self {
      created_by:   row.get(first)?,
      created_time: row.get(first + 1)?,
      updated_by:   row.get(first + 2)?,
      updated_time: row.get(first + 3)?,
    })
  }

  pub fn into_audit(self) -> Result<Audit> {
    Ok(Audit {
      created_by:   self.created_by,
      created_time: decode_dt(&self.created_time)?,
      updated_by:   self.updated_by,
      updated_time: self.updated_time.as_deref().map(decode_dt).transpose()?,
    })
  }
}

/// Audit values ready to bind: `(created_by, created_time, updated_by, updated_time)`.
pub fn encode_audit(audit: &Audit) -> (String, String, Option<String>, Option<String>) {
  (
    audit.created_by.clone(),
    encode_dt(audit.created_time),
    audit.updated_by.clone(),
    audit.updated_time.map(encode_dt),
  )
}

// ─── Row types ───────────────────────────────────────────────────────────────

pub const TIME_SLOT_COLUMNS: &str = "prison_time_slot_id, prison_code, day_code, start_time, \
  end_time, effective_date, expiry_date, legacy_prison_code, legacy_day_code, legacy_sequence, \
  created_by, created_time, updated_by, updated_time";

/// Raw strings read directly from a `prison_time_slots` row.
pub struct RawTimeSlot {
  pub prison_time_slot_id: i64,
  pub prison_code:         String,
  pub day_code:            String,
  pub start_time:          String,
  pub end_time:            String,
  pub effective_date:      String,
  pub expiry_date:         Option<String>,
  pub legacy_prison_code:  Option<String>,
  pub legacy_day_code:     Option<String>,
  pub legacy_sequence:     Option<i64>,
  pub audit:               RawAudit,
}

impl RawTimeSlot {
  pub fn from_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<Self> {
    Ok(Self {
      prison_time_slot_id: row.get(0)?,
      prison_code:         row.get(1)?,
      day_code:            row.get(2)?,
      start_time:          row.get(3)?,
      end_time:            row.get(4)?,
      effective_date:      row.get(5)?,
      expiry_date:         row.get(6)?,
      legacy_prison_code:  row.get(7)?,
      legacy_day_code:     row.get(8)?,
      legacy_sequence:     row.get(9)?,
      audit:               RawAudit::from_row(row, 10)?,
    })
  }

  pub fn into_time_slot(self) -> Result<PrisonTimeSlot> {
    let legacy = match (self.legacy_prison_code, self.legacy_day_code, self.legacy_sequence) {
      (Some(prison_code), Some(day), Some(sequence)) => Some(LegacyTimeSlotKey {
        prison_code,
        day_code: decode_code::<DayCode>("day", &day)?,
        sequence,
      }),
      _ => None,
    };
    Ok(PrisonTimeSlot {
      prison_time_slot_id: self.prison_time_slot_id,
      prison_code: self.prison_code,
      day_code: decode_code("day", &self.day_code)?,
      start_time: decode_time(&self.start_time)?,
      end_time: decode_time(&self.end_time)?,
      effective_date: decode_date(&self.effective_date)?,
      expiry_date: self.expiry_date.as_deref().map(decode_date).transpose()?,
      legacy,
      audit: self.audit.into_audit()?,
    })
  }
}

pub const VISIT_SLOT_COLUMNS: &str = "prison_visit_slot_id, prison_time_slot_id, \
  dps_location_id, max_adults, max_groups, max_video_sessions, legacy_visit_slot_id, \
  created_by, created_time, updated_by, updated_time";

pub struct RawVisitSlot {
  pub prison_visit_slot_id: i64,
  pub prison_time_slot_id:  i64,
  pub dps_location_id:      String,
  pub max_adults:           Option<u32>,
  pub max_groups:           Option<u32>,
  pub max_video_sessions:   Option<u32>,
  pub legacy_visit_slot_id: Option<i64>,
  pub audit:                RawAudit,
}

impl RawVisitSlot {
  pub fn from_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<Self> {
    Ok(Self {
      prison_visit_slot_id: row.get(0)?,
      prison_time_slot_id:  row.get(1)?,
      dps_location_id:      row.get(2)?,
      max_adults:           row.get(3)?,
      max_groups:           row.get(4)?,
      max_video_sessions:   row.get(5)?,
      legacy_visit_slot_id: row.get(6)?,
      audit:                RawAudit::from_row(row, 7)?,
    })
  }

  pub fn into_visit_slot(self) -> Result<PrisonVisitSlot> {
    Ok(PrisonVisitSlot {
      prison_visit_slot_id: self.prison_visit_slot_id,
      prison_time_slot_id:  self.prison_time_slot_id,
      dps_location_id:      decode_uuid(&self.dps_location_id)?,
      max_adults:           self.max_adults,
      max_groups:           self.max_groups,
      max_video_sessions:   self.max_video_sessions,
      legacy_visit_slot_id: self.legacy_visit_slot_id,
      audit:                self.audit.into_audit()?,
    })
  }
}

pub const VISIT_COLUMNS: &str = "official_visit_id, prison_visit_slot_id, prison_code, \
  prisoner_number, visit_date, start_time, end_time, visit_type, dps_location_id, status, \
  completion_code, search_type, notes, legacy_visit_id, \
  created_by, created_time, updated_by, updated_time";

/// An `official_visits` row; visitors are loaded separately.
pub struct RawVisit {
  pub official_visit_id:    i64,
  pub prison_visit_slot_id: i64,
  pub prison_code:          String,
  pub prisoner_number:      String,
  pub visit_date:           String,
  pub start_time:           String,
  pub end_time:             String,
  pub visit_type:           String,
  pub dps_location_id:      String,
  pub status:               String,
  pub completion_code:      Option<String>,
  pub search_type:          Option<String>,
  pub notes:                Option<String>,
  pub legacy_visit_id:      Option<i64>,
  pub audit:                RawAudit,
}

impl RawVisit {
  pub fn from_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<Self> {
    Ok(Self {
      official_visit_id:    row.get(0)?,
      prison_visit_slot_id: row.get(1)?,
      prison_code:          row.get(2)?,
      prisoner_number:      row.get(3)?,
      visit_date:           row.get(4)?,
      start_time:           row.get(5)?,
      end_time:             row.get(6)?,
      visit_type:           row.get(7)?,
      dps_location_id:      row.get(8)?,
      status:               row.get(9)?,
      completion_code:      row.get(10)?,
      search_type:          row.get(11)?,
      notes:                row.get(12)?,
      legacy_visit_id:      row.get(13)?,
      audit:                RawAudit::from_row(row, 14)?,
    })
  }

  pub fn into_visit(self, visitors: Vec<Visitor>) -> Result<Visit> {
    Ok(Visit {
      official_visit_id: self.official_visit_id,
      prison_visit_slot_id: self.prison_visit_slot_id,
      prison_code: self.prison_code,
      prisoner_number: self.prisoner_number,
      visit_date: decode_date(&self.visit_date)?,
      start_time: decode_time(&self.start_time)?,
      end_time: decode_time(&self.end_time)?,
      visit_type: decode_code::<VisitType>("visit type", &self.visit_type)?,
      dps_location_id: decode_uuid(&self.dps_location_id)?,
      status: decode_code("visit status", &self.status)?,
      completion_code: decode_opt_code("completion", self.completion_code)?,
      search_type: decode_opt_code("search level", self.search_type)?,
      notes: self.notes,
      legacy_visit_id: self.legacy_visit_id,
      audit: self.audit.into_audit()?,
      visitors,
    })
  }
}

pub const VISITOR_COLUMNS: &str = "official_visitor_id, visitor_type, contact_id, \
  prisoner_contact_id, first_name, last_name, relationship_type, relationship_code, \
  lead_visitor, assisted_visit, attendance, notes, legacy_person_id, \
  created_by, created_time, updated_by, updated_time";

pub struct RawVisitor {
  pub official_visitor_id: i64,
  pub visitor_type:        String,
  pub contact_id:          Option<i64>,
  pub prisoner_contact_id: Option<i64>,
  pub first_name:          Option<String>,
  pub last_name:           Option<String>,
  pub relationship_type:   Option<String>,
  pub relationship_code:   Option<String>,
  pub lead_visitor:        bool,
  pub assisted_visit:      bool,
  pub attendance:          Option<String>,
  pub notes:               Option<String>,
  pub legacy_person_id:    Option<i64>,
  pub audit:               RawAudit,
}

impl RawVisitor {
  pub fn from_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<Self> {
    Ok(Self {
      official_visitor_id: row.get(0)?,
      visitor_type:        row.get(1)?,
      contact_id:          row.get(2)?,
      prisoner_contact_id: row.get(3)?,
      first_name:          row.get(4)?,
      last_name:           row.get(5)?,
      relationship_type:   row.get(6)?,
      relationship_code:   row.get(7)?,
      lead_visitor:        row.get(8)?,
      assisted_visit:      row.get(9)?,
      attendance:          row.get(10)?,
      notes:               row.get(11)?,
      legacy_person_id:    row.get(12)?,
      audit:               RawAudit::from_row(row, 13)?,
    })
  }

  pub fn into_visitor(self) -> Result<Visitor> {
    Ok(Visitor {
      official_visitor_id: self.official_visitor_id,
      visitor_type:        decode_code("visitor type", &self.visitor_type)?,
      contact_id:          self.contact_id,
      prisoner_contact_id: self.prisoner_contact_id,
      first_name:          self.first_name,
      last_name:           self.last_name,
      relationship_type:   decode_opt_code("relationship type", self.relationship_type)?,
      relationship_code:   self.relationship_code,
      lead_visitor:        self.lead_visitor,
      assisted_visit:      self.assisted_visit,
      attendance:          decode_opt_code("attendance", self.attendance)?,
      notes:               self.notes,
      legacy_person_id:    self.legacy_person_id,
      audit:               self.audit.into_audit()?,
    })
  }
}
