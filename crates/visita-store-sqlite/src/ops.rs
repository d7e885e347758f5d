//! Synchronous units of work, run on the connection thread.
//!
//! Every mutating function opens an `IMMEDIATE` transaction, re-reads the
//! rows its rules depend on, and writes. Returning early with an error drops
//! the transaction, which rolls back everything written so far.

use std::collections::HashSet;

use chrono::{DateTime, NaiveDate, Utc};
use rusqlite::{Connection, OptionalExtension as _, TransactionBehavior, params};
use visita_core::{
  Error as DomainError,
  codes::VisitStatus,
  overlap::{SlotCandidate, TimeRange, check_time_slot_overlap, check_visit_overlap},
  reconcile::{
    ElementType, IdPair, LegacyId, MigrateTimeSlotRequest, MigrateTimeSlotResponse,
    MigrateVisitRequest, MigrateVisitResponse,
  },
  reference::ReferenceCode,
  slot::{
    LegacyTimeSlotKey, PrisonTimeSlot, PrisonVisitSlot, TimeSlotDefinition,
    VisitSlotDefinition,
  },
  visit::{Audit, Cancellation, Completion, NewVisit, NewVisitor, Visit, Visitor},
};

use crate::{
  Result,
  encode::{
    RawTimeSlot, RawVisit, RawVisitSlot, RawVisitor, TIME_SLOT_COLUMNS, VISIT_COLUMNS,
    VISIT_SLOT_COLUMNS, VISITOR_COLUMNS, decode_code, decode_time, encode_audit, encode_code,
    encode_date, encode_dt, encode_time, encode_uuid,
  },
};

// ─── Reads ───────────────────────────────────────────────────────────────────

fn time_slots_where(
  conn: &Connection,
  filter: &str,
  params: impl rusqlite::Params,
) -> Result<Vec<PrisonTimeSlot>> {
  let mut stmt = conn.prepare(&format!(
    "SELECT {TIME_SLOT_COLUMNS} FROM prison_time_slots WHERE {filter} \
     ORDER BY prison_time_slot_id"
  ))?;
  let raws = stmt
    .query_map(params, RawTimeSlot::from_row)?
    .collect::<rusqlite::Result<Vec<_>>>()?;
  raws.into_iter().map(RawTimeSlot::into_time_slot).collect()
}

pub fn time_slot_by_id(conn: &Connection, id: i64) -> Result<Option<PrisonTimeSlot>> {
  Ok(time_slots_where(conn, "prison_time_slot_id = ?1", params![id])?.pop())
}

pub fn time_slot_by_legacy(
  conn: &Connection,
  key: &LegacyTimeSlotKey,
) -> Result<Option<PrisonTimeSlot>> {
  Ok(
    time_slots_where(
      conn,
      "legacy_prison_code = ?1 AND legacy_day_code = ?2 AND legacy_sequence = ?3",
      params![key.prison_code, encode_code(key.day_code), key.sequence],
    )?
    .pop(),
  )
}

pub fn list_time_slots(
  conn: &Connection,
  prison_code: &str,
  active_on: Option<NaiveDate>,
) -> Result<Vec<PrisonTimeSlot>> {
  match active_on {
    None => time_slots_where(conn, "prison_code = ?1", params![prison_code]),
    Some(date) => time_slots_where(
      conn,
      "prison_code = ?1 AND effective_date <= ?2 \
       AND (expiry_date IS NULL OR expiry_date >= ?2)",
      params![prison_code, encode_date(date)],
    ),
  }
}

fn visit_slots_where(
  conn: &Connection,
  filter: &str,
  params: impl rusqlite::Params,
) -> Result<Vec<PrisonVisitSlot>> {
  let mut stmt = conn.prepare(&format!(
    "SELECT {VISIT_SLOT_COLUMNS} FROM prison_visit_slots WHERE {filter} \
     ORDER BY prison_visit_slot_id"
  ))?;
  let raws = stmt
    .query_map(params, RawVisitSlot::from_row)?
    .collect::<rusqlite::Result<Vec<_>>>()?;
  raws.into_iter().map(RawVisitSlot::into_visit_slot).collect()
}

pub fn visit_slot_by_id(conn: &Connection, id: i64) -> Result<Option<PrisonVisitSlot>> {
  Ok(visit_slots_where(conn, "prison_visit_slot_id = ?1", params![id])?.pop())
}

pub fn list_visit_slots(conn: &Connection, time_slot_id: i64) -> Result<Vec<PrisonVisitSlot>> {
  visit_slots_where(conn, "prison_time_slot_id = ?1", params![time_slot_id])
}

fn visitors_for(conn: &Connection, visit_id: i64) -> Result<Vec<Visitor>> {
  let mut stmt = conn.prepare(&format!(
    "SELECT {VISITOR_COLUMNS} FROM official_visitors WHERE official_visit_id = ?1 \
     ORDER BY official_visitor_id"
  ))?;
  let raws = stmt
    .query_map(params![visit_id], RawVisitor::from_row)?
    .collect::<rusqlite::Result<Vec<_>>>()?;
  raws.into_iter().map(RawVisitor::into_visitor).collect()
}

fn visits_where(
  conn: &Connection,
  filter: &str,
  params: impl rusqlite::Params,
) -> Result<Vec<Visit>> {
  let mut stmt = conn.prepare(&format!(
    "SELECT {VISIT_COLUMNS} FROM official_visits WHERE {filter} \
     ORDER BY visit_date, start_time, official_visit_id"
  ))?;
  let raws = stmt
    .query_map(params, RawVisit::from_row)?
    .collect::<rusqlite::Result<Vec<_>>>()?;
  raws
    .into_iter()
    .map(|raw| -> Result<Visit> {
      let visitors = visitors_for(conn, raw.official_visit_id)?;
      raw.into_visit(visitors)
    })
    .collect()
}

pub fn visit_by_id(conn: &Connection, id: i64) -> Result<Option<Visit>> {
  Ok(visits_where(conn, "official_visit_id = ?1", params![id])?.pop())
}

pub fn find_visits(
  conn: &Connection,
  prison_code: &str,
  from: NaiveDate,
  to: NaiveDate,
) -> Result<Vec<Visit>> {
  visits_where(
    conn,
    "prison_code = ?1 AND visit_date >= ?2 AND visit_date <= ?3",
    params![prison_code, encode_date(from), encode_date(to)],
  )
}

/// `(official_visit_id, range)` for every non-cancelled visit already in the
/// slot on `date`.
fn booked_ranges(
  conn: &Connection,
  visit_slot_id: i64,
  date: NaiveDate,
) -> Result<Vec<(i64, TimeRange)>> {
  let mut stmt = conn.prepare(
    "SELECT official_visit_id, start_time, end_time FROM official_visits \
     WHERE prison_visit_slot_id = ?1 AND visit_date = ?2 AND status <> 'CANCELLED'",
  )?;
  let rows = stmt
    .query_map(params![visit_slot_id, encode_date(date)], |row| {
      Ok((row.get::<_, i64>(0)?, row.get::<_, String>(1)?, row.get::<_, String>(2)?))
    })?
    .collect::<rusqlite::Result<Vec<_>>>()?;
  rows
    .into_iter()
    .map(|(id, start, end)| -> Result<(i64, TimeRange)> {
      Ok((id, TimeRange::new(decode_time(&start)?, decode_time(&end)?)?))
    })
    .collect()
}

pub fn reference_codes(conn: &Connection) -> Result<Vec<ReferenceCode>> {
  let mut stmt = conn.prepare(
    "SELECT group_code, code, description FROM reference_codes ORDER BY group_code, code",
  )?;
  let rows = stmt
    .query_map([], |row| {
      Ok((row.get::<_, String>(0)?, row.get::<_, String>(1)?, row.get::<_, String>(2)?))
    })?
    .collect::<rusqlite::Result<Vec<_>>>()?;
  rows
    .into_iter()
    .map(|(group, code, description)| -> Result<ReferenceCode> {
      Ok(ReferenceCode {
        group: decode_code("reference group", &group)?,
        code,
        description,
      })
    })
    .collect()
}

// ─── Inserts ─────────────────────────────────────────────────────────────────

fn insert_time_slot(conn: &Connection, slot: &mut PrisonTimeSlot) -> Result<()> {
  let (created_by, created_time, updated_by, updated_time) = encode_audit(&slot.audit);
  let legacy = slot.legacy.as_ref();
  conn.execute(
    "INSERT INTO prison_time_slots
       (prison_code, day_code, start_time, end_time, effective_date, expiry_date,
        legacy_prison_code, legacy_day_code, legacy_sequence,
        created_by, created_time, updated_by, updated_time)
     VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13)",
    params![
      slot.prison_code,
      encode_code(slot.day_code),
      encode_time(slot.start_time),
      encode_time(slot.end_time),
      encode_date(slot.effective_date),
      slot.expiry_date.map(encode_date),
      legacy.map(|k| k.prison_code.clone()),
      legacy.map(|k| encode_code(k.day_code)),
      legacy.map(|k| k.sequence),
      created_by,
      created_time,
      updated_by,
      updated_time,
    ],
  )?;
  slot.prison_time_slot_id = conn.last_insert_rowid();
  Ok(())
}

fn insert_visit_slot(conn: &Connection, slot: &mut PrisonVisitSlot) -> Result<()> {
  let (created_by, created_time, updated_by, updated_time) = encode_audit(&slot.audit);
  conn.execute(
    "INSERT INTO prison_visit_slots
       (prison_time_slot_id, dps_location_id, max_adults, max_groups, max_video_sessions,
        legacy_visit_slot_id, created_by, created_time, updated_by, updated_time)
     VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10)",
    params![
      slot.prison_time_slot_id,
      encode_uuid(slot.dps_location_id),
      slot.max_adults,
      slot.max_groups,
      slot.max_video_sessions,
      slot.legacy_visit_slot_id,
      created_by,
      created_time,
      updated_by,
      updated_time,
    ],
  )?;
  slot.prison_visit_slot_id = conn.last_insert_rowid();
  Ok(())
}

fn insert_visit(conn: &Connection, visit: &mut Visit) -> Result<()> {
  let (created_by, created_time, updated_by, updated_time) = encode_audit(&visit.audit);
  conn.execute(
    "INSERT INTO official_visits
       (prison_visit_slot_id, prison_code, prisoner_number, visit_date, start_time, end_time,
        visit_type, dps_location_id, status, completion_code, search_type, notes,
        legacy_visit_id, created_by, created_time, updated_by, updated_time)
     VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13, ?14, ?15, ?16, ?17)",
    params![
      visit.prison_visit_slot_id,
      visit.prison_code,
      visit.prisoner_number,
      encode_date(visit.visit_date),
      encode_time(visit.start_time),
      encode_time(visit.end_time),
      encode_code(visit.visit_type),
      encode_uuid(visit.dps_location_id),
      encode_code(visit.status),
      visit.completion_code.map(encode_code),
      visit.search_type.map(encode_code),
      visit.notes,
      visit.legacy_visit_id,
      created_by,
      created_time,
      updated_by,
      updated_time,
    ],
  )?;
  visit.official_visit_id = conn.last_insert_rowid();
  Ok(())
}

fn insert_visitor(conn: &Connection, visit_id: i64, visitor: &mut Visitor) -> Result<()> {
  let (created_by, created_time, updated_by, updated_time) = encode_audit(&visitor.audit);
  conn.execute(
    "INSERT INTO official_visitors
       (official_visit_id, visitor_type, contact_id, prisoner_contact_id, first_name,
        last_name, relationship_type, relationship_code, lead_visitor, assisted_visit,
        attendance, notes, legacy_person_id, created_by, created_time, updated_by,
        updated_time)
     VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13, ?14, ?15, ?16, ?17)",
    params![
      visit_id,
      encode_code(visitor.visitor_type),
      visitor.contact_id,
      visitor.prisoner_contact_id,
      visitor.first_name,
      visitor.last_name,
      visitor.relationship_type.map(encode_code),
      visitor.relationship_code,
      visitor.lead_visitor,
      visitor.assisted_visit,
      visitor.attendance.map(encode_code),
      visitor.notes,
      visitor.legacy_person_id,
      created_by,
      created_time,
      updated_by,
      updated_time,
    ],
  )?;
  visitor.official_visitor_id = conn.last_insert_rowid();
  Ok(())
}

fn new_visitor(visitor: NewVisitor, audit: Audit) -> Visitor {
  Visitor {
    official_visitor_id: 0,
    visitor_type: visitor.visitor_type,
    contact_id: visitor.contact_id,
    prisoner_contact_id: visitor.prisoner_contact_id,
    first_name: visitor.first_name,
    last_name: visitor.last_name,
    relationship_type: visitor.relationship_type,
    relationship_code: visitor.relationship_code,
    lead_visitor: visitor.lead_visitor,
    assisted_visit: visitor.assisted_visit,
    attendance: None,
    notes: visitor.notes,
    legacy_person_id: None,
    audit,
  }
}

// ─── Rule checks ─────────────────────────────────────────────────────────────

fn ensure_no_slot_overlap(
  conn: &Connection,
  definition: &TimeSlotDefinition,
  range: TimeRange,
  exclude_id: Option<i64>,
  today: NaiveDate,
) -> Result<()> {
  let existing = time_slots_where(
    conn,
    "prison_code = ?1 AND day_code = ?2",
    params![definition.prison_code, encode_code(definition.day_code)],
  )?;
  let candidate = SlotCandidate {
    prison_code: &definition.prison_code,
    day: definition.day_code,
    range,
    effective: definition.effective_date,
    expiry: definition.expiry_date,
    exclude_id,
  };
  Ok(check_time_slot_overlap(&candidate, &existing, today)?)
}

fn ensure_legacy_time_slot_unused(conn: &Connection, key: &LegacyTimeSlotKey) -> Result<()> {
  if time_slot_by_legacy(conn, key)?.is_some() {
    return Err(duplicate(ElementType::PrisonTimeSlot, key.to_string()));
  }
  Ok(())
}

fn duplicate(element: ElementType, legacy_id: String) -> crate::Error {
  DomainError::DuplicateLegacyId {
    element: element.as_str(),
    legacy_id,
  }
  .into()
}

// ─── Time slots ──────────────────────────────────────────────────────────────

pub fn create_time_slot(
  conn: &mut Connection,
  definition: TimeSlotDefinition,
  legacy: Option<LegacyTimeSlotKey>,
  audit: Audit,
  today: NaiveDate,
) -> Result<PrisonTimeSlot> {
  let range = definition.validate()?;
  let tx = conn.transaction_with_behavior(TransactionBehavior::Immediate)?;

  if let Some(key) = &legacy {
    ensure_legacy_time_slot_unused(&tx, key)?;
  }
  ensure_no_slot_overlap(&tx, &definition, range, None, today)?;

  let mut slot = PrisonTimeSlot {
    prison_time_slot_id: 0,
    prison_code: definition.prison_code,
    day_code: definition.day_code,
    start_time: definition.start_time,
    end_time: definition.end_time,
    effective_date: definition.effective_date,
    expiry_date: definition.expiry_date,
    legacy,
    audit,
  };
  insert_time_slot(&tx, &mut slot)?;
  tx.commit()?;
  Ok(slot)
}

pub fn update_time_slot(
  conn: &mut Connection,
  id: i64,
  definition: TimeSlotDefinition,
  updated_by: String,
  updated_at: DateTime<Utc>,
  today: NaiveDate,
) -> Result<PrisonTimeSlot> {
  let range = definition.validate()?;
  let tx = conn.transaction_with_behavior(TransactionBehavior::Immediate)?;

  let mut slot = time_slot_by_id(&tx, id)?.ok_or(DomainError::TimeSlotNotFound(id))?;
  ensure_no_slot_overlap(&tx, &definition, range, Some(id), today)?;

  slot.prison_code = definition.prison_code;
  slot.day_code = definition.day_code;
  slot.start_time = definition.start_time;
  slot.end_time = definition.end_time;
  slot.effective_date = definition.effective_date;
  slot.expiry_date = definition.expiry_date;
  slot.audit.touch(updated_by, updated_at);

  tx.execute(
    "UPDATE prison_time_slots
        SET prison_code = ?2, day_code = ?3, start_time = ?4, end_time = ?5,
            effective_date = ?6, expiry_date = ?7, updated_by = ?8, updated_time = ?9
      WHERE prison_time_slot_id = ?1",
    params![
      id,
      slot.prison_code,
      encode_code(slot.day_code),
      encode_time(slot.start_time),
      encode_time(slot.end_time),
      encode_date(slot.effective_date),
      slot.expiry_date.map(encode_date),
      slot.audit.updated_by,
      slot.audit.updated_time.map(encode_dt),
    ],
  )?;
  tx.commit()?;
  Ok(slot)
}

// ─── Visit slots ─────────────────────────────────────────────────────────────

pub fn create_visit_slot(
  conn: &mut Connection,
  time_slot_id: i64,
  definition: VisitSlotDefinition,
  audit: Audit,
) -> Result<PrisonVisitSlot> {
  let tx = conn.transaction_with_behavior(TransactionBehavior::Immediate)?;
  if time_slot_by_id(&tx, time_slot_id)?.is_none() {
    return Err(DomainError::TimeSlotNotFound(time_slot_id).into());
  }

  let mut slot = PrisonVisitSlot {
    prison_visit_slot_id: 0,
    prison_time_slot_id:  time_slot_id,
    dps_location_id:      definition.dps_location_id,
    max_adults:           definition.max_adults,
    max_groups:           definition.max_groups,
    max_video_sessions:   definition.max_video_sessions,
    legacy_visit_slot_id: None,
    audit,
  };
  insert_visit_slot(&tx, &mut slot)?;
  tx.commit()?;
  Ok(slot)
}

// ─── Visits ──────────────────────────────────────────────────────────────────

pub fn create_visit(conn: &mut Connection, new: NewVisit, audit: Audit) -> Result<Visit> {
  let tx = conn.transaction_with_behavior(TransactionBehavior::Immediate)?;

  let slot_id = new.prison_visit_slot_id;
  let visit_slot =
    visit_slot_by_id(&tx, slot_id)?.ok_or(DomainError::VisitSlotNotFound(slot_id))?;
  let time_slot = time_slot_by_id(&tx, visit_slot.prison_time_slot_id)?
    .ok_or(DomainError::TimeSlotNotFound(visit_slot.prison_time_slot_id))?;
  let range = new.check_fits(&time_slot, &visit_slot)?;
  let booked = booked_ranges(&tx, slot_id, new.visit_date)?;
  check_visit_overlap(slot_id, new.visit_date, range, &booked)?;

  let mut visit = Visit {
    official_visit_id:    0,
    prison_visit_slot_id: slot_id,
    prison_code:          new.prison_code,
    prisoner_number:      new.prisoner_number,
    visit_date:           new.visit_date,
    start_time:           new.start_time,
    end_time:             new.end_time,
    visit_type:           new.visit_type,
    dps_location_id:      visit_slot.dps_location_id,
    status:               VisitStatus::Scheduled,
    completion_code:      None,
    search_type:          None,
    notes:                None,
    legacy_visit_id:      None,
    audit:                audit.clone(),
    visitors:             Vec::with_capacity(new.visitors.len()),
  };
  insert_visit(&tx, &mut visit)?;
  for input in new.visitors {
    let mut visitor = new_visitor(input, audit.clone());
    insert_visitor(&tx, visit.official_visit_id, &mut visitor)?;
    visit.visitors.push(visitor);
  }

  tx.commit()?;
  Ok(visit)
}

pub fn add_visitor(
  conn: &mut Connection,
  visit_id: i64,
  input: NewVisitor,
  audit: Audit,
) -> Result<Visitor> {
  let tx = conn.transaction_with_behavior(TransactionBehavior::Immediate)?;
  let visit = visit_by_id(&tx, visit_id)?.ok_or(DomainError::VisitNotFound(visit_id))?;
  visit.ensure_accepts_visitors()?;

  let mut visitor = new_visitor(input, audit);
  insert_visitor(&tx, visit_id, &mut visitor)?;
  tx.commit()?;
  Ok(visitor)
}

fn write_visit_state(conn: &Connection, visit: &Visit) -> Result<()> {
  conn.execute(
    "UPDATE official_visits
        SET status = ?2, completion_code = ?3, search_type = ?4, notes = ?5,
            updated_by = ?6, updated_time = ?7
      WHERE official_visit_id = ?1",
    params![
      visit.official_visit_id,
      encode_code(visit.status),
      visit.completion_code.map(encode_code),
      visit.search_type.map(encode_code),
      visit.notes,
      visit.audit.updated_by,
      visit.audit.updated_time.map(encode_dt),
    ],
  )?;
  Ok(())
}

pub fn complete_visit(
  conn: &mut Connection,
  visit_id: i64,
  completion: Completion,
) -> Result<Visit> {
  let tx = conn.transaction_with_behavior(TransactionBehavior::Immediate)?;
  let mut visit = visit_by_id(&tx, visit_id)?.ok_or(DomainError::VisitNotFound(visit_id))?;
  visit.complete(&completion)?;

  write_visit_state(&tx, &visit)?;
  for visitor in &visit.visitors {
    if completion.attendance.contains_key(&visitor.official_visitor_id) {
      tx.execute(
        "UPDATE official_visitors SET attendance = ?2, updated_by = ?3, updated_time = ?4
          WHERE official_visitor_id = ?1",
        params![
          visitor.official_visitor_id,
          visitor.attendance.map(encode_code),
          visitor.audit.updated_by,
          visitor.audit.updated_time.map(encode_dt),
        ],
      )?;
    }
  }
  tx.commit()?;
  Ok(visit)
}

pub fn cancel_visit(
  conn: &mut Connection,
  visit_id: i64,
  cancellation: Cancellation,
) -> Result<Visit> {
  let tx = conn.transaction_with_behavior(TransactionBehavior::Immediate)?;
  let mut visit = visit_by_id(&tx, visit_id)?.ok_or(DomainError::VisitNotFound(visit_id))?;
  visit.cancel(&cancellation)?;

  write_visit_state(&tx, &visit)?;
  tx.commit()?;
  Ok(visit)
}

pub fn expire_visits(
  conn: &mut Connection,
  before: NaiveDate,
  by: String,
  at: DateTime<Utc>,
) -> Result<Vec<i64>> {
  let tx = conn.transaction_with_behavior(TransactionBehavior::Immediate)?;
  let before = encode_date(before);

  let ids = {
    let mut stmt = tx.prepare(
      "SELECT official_visit_id FROM official_visits
        WHERE status = 'SCHEDULED' AND visit_date < ?1
        ORDER BY official_visit_id",
    )?;
    stmt
      .query_map(params![before], |row| row.get::<_, i64>(0))?
      .collect::<rusqlite::Result<Vec<_>>>()?
  };
  tx.execute(
    "UPDATE official_visits SET status = 'EXPIRED', updated_by = ?2, updated_time = ?3
      WHERE status = 'SCHEDULED' AND visit_date < ?1",
    params![before, by, encode_dt(at)],
  )?;
  tx.commit()?;
  Ok(ids)
}

// ─── Migration ───────────────────────────────────────────────────────────────

pub fn migrate_time_slot(
  conn: &mut Connection,
  request: MigrateTimeSlotRequest,
  today: NaiveDate,
) -> Result<MigrateTimeSlotResponse> {
  let definition = request.definition();
  let range = definition.validate()?;
  let tx = conn.transaction_with_behavior(TransactionBehavior::Immediate)?;

  ensure_legacy_time_slot_unused(&tx, &request.legacy)?;
  ensure_no_slot_overlap(&tx, &definition, range, None, today)?;

  let mut time_slot = PrisonTimeSlot {
    prison_time_slot_id: 0,
    prison_code: definition.prison_code,
    day_code: definition.day_code,
    start_time: definition.start_time,
    end_time: definition.end_time,
    effective_date: definition.effective_date,
    expiry_date: definition.expiry_date,
    legacy: Some(request.legacy.clone()),
    audit: request.audit,
  };
  insert_time_slot(&tx, &mut time_slot)?;

  let mut seen = HashSet::new();
  let mut visit_slots = Vec::with_capacity(request.visit_slots.len());
  for input in request.visit_slots {
    let legacy_id = input.legacy_visit_slot_id;
    if !seen.insert(legacy_id)
      || !visit_slots_where(&tx, "legacy_visit_slot_id = ?1", params![legacy_id])?.is_empty()
    {
      return Err(duplicate(ElementType::PrisonVisitSlot, legacy_id.to_string()));
    }

    let mut slot = PrisonVisitSlot {
      prison_visit_slot_id: 0,
      prison_time_slot_id:  time_slot.prison_time_slot_id,
      dps_location_id:      input.dps_location_id,
      max_adults:           input.max_adults,
      max_groups:           input.max_groups,
      max_video_sessions:   input.max_video_sessions,
      legacy_visit_slot_id: Some(legacy_id),
      audit:                input.audit,
    };
    insert_visit_slot(&tx, &mut slot)?;
    visit_slots.push(IdPair::new(
      ElementType::PrisonVisitSlot,
      LegacyId::Id(legacy_id),
      slot.prison_visit_slot_id,
    ));
  }

  tx.commit()?;
  Ok(MigrateTimeSlotResponse {
    time_slot: IdPair::new(
      ElementType::PrisonTimeSlot,
      LegacyId::TimeSlot(request.legacy),
      time_slot.prison_time_slot_id,
    ),
    visit_slots,
  })
}

pub fn migrate_visit(
  conn: &mut Connection,
  request: MigrateVisitRequest,
) -> Result<MigrateVisitResponse> {
  let range = request.validate()?;
  let tx = conn.transaction_with_behavior(TransactionBehavior::Immediate)?;

  let already_migrated = tx
    .query_row(
      "SELECT 1 FROM official_visits WHERE legacy_visit_id = ?1",
      params![request.legacy_visit_id],
      |_| Ok(()),
    )
    .optional()?
    .is_some();
  if already_migrated {
    return Err(duplicate(ElementType::OfficialVisit, request.legacy_visit_id.to_string()));
  }

  let visit_slot = visit_slots_where(
    &tx,
    "legacy_visit_slot_id = ?1",
    params![request.legacy_visit_slot_id],
  )?
  .pop()
  .ok_or(DomainError::LegacyVisitSlotNotFound(request.legacy_visit_slot_id))?;

  if request.status != VisitStatus::Cancelled {
    let booked = booked_ranges(&tx, visit_slot.prison_visit_slot_id, request.visit_date)?;
    check_visit_overlap(visit_slot.prison_visit_slot_id, request.visit_date, range, &booked)?;
  }

  let mut visit = Visit {
    official_visit_id:    0,
    prison_visit_slot_id: visit_slot.prison_visit_slot_id,
    prison_code:          request.prison_code,
    prisoner_number:      request.prisoner_number,
    visit_date:           request.visit_date,
    start_time:           request.start_time,
    end_time:             request.end_time,
    visit_type:           request.visit_type,
    dps_location_id:      visit_slot.dps_location_id,
    status:               request.status,
    completion_code:      request.completion_code,
    search_type:          request.search_type,
    notes:                request.notes,
    legacy_visit_id:      Some(request.legacy_visit_id),
    audit:                request.audit,
    visitors:             Vec::new(),
  };
  insert_visit(&tx, &mut visit)?;

  let mut seen = HashSet::new();
  let mut visitors = Vec::with_capacity(request.visitors.len());
  for input in request.visitors {
    let legacy_id = input.legacy_person_id;
    if !seen.insert(legacy_id) {
      return Err(duplicate(ElementType::OfficialVisitor, legacy_id.to_string()));
    }
    let mut visitor = Visitor {
      official_visitor_id: 0,
      visitor_type:        input.visitor_type,
      contact_id:          input.contact_id,
      prisoner_contact_id: input.prisoner_contact_id,
      first_name:          input.first_name,
      last_name:           input.last_name,
      relationship_type:   input.relationship_type,
      relationship_code:   input.relationship_code,
      lead_visitor:        input.lead_visitor,
      assisted_visit:      input.assisted_visit,
      attendance:          input.attendance,
      notes:               input.notes,
      legacy_person_id:    Some(legacy_id),
      audit:               input.audit,
    };
    insert_visitor(&tx, visit.official_visit_id, &mut visitor)?;
    visitors.push(IdPair::new(
      ElementType::OfficialVisitor,
      LegacyId::Id(legacy_id),
      visitor.official_visitor_id,
    ));
  }

  tx.commit()?;
  Ok(MigrateVisitResponse {
    visit: IdPair::new(
      ElementType::OfficialVisit,
      LegacyId::Id(request.legacy_visit_id),
      visit.official_visit_id,
    ),
    visitors,
  })
}
