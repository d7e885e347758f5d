//! Migration and sync from the legacy system.
//!
//! Migration is a bulk load: each request is one batch that commits whole or
//! not at all, and announces nothing. Sync mirrors single changes made in the
//! legacy system and announces them with [`Source::Nomis`].

use visita_core::{
  event::{OutboundEvent, Source},
  reconcile::{
    ElementType, IdPair, LegacyId, MigrateTimeSlotRequest, MigrateTimeSlotResponse,
    MigrateVisitRequest, MigrateVisitResponse, SyncTimeSlotRequest,
  },
  slot::PrisonTimeSlot,
  store::VisitStore as _,
  visit::Audit,
};

use crate::{Backend, Engine, Error, Result, time_slots::time_slot_event};

impl<B: Backend> Engine<B> {
  #[tracing::instrument(parent = &self.span, skip_all, fields(legacy = %request.legacy))]
  pub async fn migrate_time_slot(
    &self,
    request: MigrateTimeSlotRequest,
  ) -> Result<MigrateTimeSlotResponse> {
    let response = self
      .store
      .migrate_time_slot(request, self.clock.today())
      .await
      .map_err(Error::store)?;
    tracing::info!(
      prison_time_slot_id = response.time_slot.dps_id,
      visit_slots = response.visit_slots.len(),
      "time slot migrated"
    );
    Ok(response)
  }

  #[tracing::instrument(parent = &self.span, skip_all, fields(legacy = request.legacy_visit_id))]
  pub async fn migrate_visit(&self, request: MigrateVisitRequest) -> Result<MigrateVisitResponse> {
    let response = self
      .store
      .migrate_visit(request)
      .await
      .map_err(Error::store)?;
    tracing::info!(
      official_visit_id = response.visit.dps_id,
      visitors = response.visitors.len(),
      "visit migrated"
    );
    Ok(response)
  }

  /// Mirror a time slot created in the legacy system.
  #[tracing::instrument(parent = &self.span, skip_all, fields(legacy = %request.legacy))]
  pub async fn sync_create_time_slot(&self, request: SyncTimeSlotRequest) -> Result<IdPair> {
    let legacy = request.legacy.clone();
    let slot = self
      .store
      .create_time_slot(
        request.definition(),
        Some(legacy.clone()),
        Audit::created(request.changed_by, self.clock.now()),
        self.clock.today(),
      )
      .await
      .map_err(Error::store)?;

    self.announce_sync(OutboundEvent::TimeSlotCreated, &slot).await;
    Ok(IdPair::new(
      ElementType::PrisonTimeSlot,
      LegacyId::TimeSlot(legacy),
      slot.prison_time_slot_id,
    ))
  }

  /// Mirror a change to a time slot previously migrated or synced.
  #[tracing::instrument(parent = &self.span, skip_all, fields(legacy = %request.legacy))]
  pub async fn sync_update_time_slot(&self, request: SyncTimeSlotRequest) -> Result<PrisonTimeSlot> {
    let existing = self
      .store
      .find_time_slot_by_legacy(request.legacy.clone())
      .await
      .map_err(Error::store)?
      .ok_or_else(|| visita_core::Error::LegacyTimeSlotNotFound(request.legacy.clone()))?;

    let slot = self
      .store
      .update_time_slot(
        existing.prison_time_slot_id,
        request.definition(),
        request.changed_by,
        self.clock.now(),
        self.clock.today(),
      )
      .await
      .map_err(Error::store)?;

    self.announce_sync(OutboundEvent::TimeSlotUpdated, &slot).await;
    Ok(slot)
  }

  async fn announce_sync(&self, event: OutboundEvent, slot: &PrisonTimeSlot) {
    self
      .events
      .emit(event, time_slot_event(slot, Source::Nomis))
      .await;
  }
}

#[cfg(test)]
mod tests {
  use chrono::{NaiveDate, NaiveTime};
  use uuid::Uuid;
  use visita_core::{
    codes::{CompletionCode, DayCode, VisitStatus, VisitType, VisitorType},
    reconcile::{MigrateVisitSlot, MigrateVisitor},
    slot::LegacyTimeSlotKey,
  };

  use super::*;
  use crate::testing::*;

  fn key(sequence: i64) -> LegacyTimeSlotKey {
    LegacyTimeSlotKey { prison_code: PRISON.into(), day_code: DayCode::Mon, sequence }
  }

  fn legacy_audit() -> Audit { Audit::created("NOMIS_USER", now()) }

  fn legacy_slot(legacy_visit_slot_id: i64) -> MigrateVisitSlot {
    MigrateVisitSlot {
      legacy_visit_slot_id,
      dps_location_id: Uuid::from_u128(0xB0 + legacy_visit_slot_id as u128),
      max_adults: Some(3),
      max_groups: None,
      max_video_sessions: None,
      audit: legacy_audit(),
    }
  }

  fn legacy_time_slot(sequence: i64, visit_slots: Vec<MigrateVisitSlot>) -> MigrateTimeSlotRequest {
    MigrateTimeSlotRequest {
      legacy: key(sequence),
      start_time: time(9, 0),
      end_time: time(12, 0),
      effective_date: NaiveDate::from_ymd_opt(2020, 1, 1).unwrap(),
      expiry_date: None,
      audit: legacy_audit(),
      visit_slots,
    }
  }

  fn legacy_visitor(legacy_person_id: i64) -> MigrateVisitor {
    MigrateVisitor {
      legacy_person_id,
      visitor_type: VisitorType::Contact,
      contact_id: Some(legacy_person_id),
      prisoner_contact_id: None,
      first_name: None,
      last_name: None,
      relationship_type: None,
      relationship_code: Some("POL".into()),
      lead_visitor: false,
      assisted_visit: false,
      attendance: None,
      notes: None,
      audit: legacy_audit(),
    }
  }

  fn sync(sequence: i64, start: NaiveTime, end: NaiveTime) -> SyncTimeSlotRequest {
    SyncTimeSlotRequest {
      legacy: key(sequence),
      start_time: start,
      end_time: end,
      effective_date: NaiveDate::from_ymd_opt(2026, 1, 1).unwrap(),
      expiry_date: None,
      changed_by: "NOMIS_USER".into(),
    }
  }

  #[tokio::test]
  async fn migration_pairs_every_record_and_announces_nothing() {
    let mut h = Harness::new().await;
    let response = h
      .engine
      .migrate_time_slot(legacy_time_slot(1, vec![legacy_slot(71), legacy_slot(72)]))
      .await
      .unwrap();
    assert_eq!(response.time_slot.element_type, ElementType::PrisonTimeSlot);
    assert_eq!(response.time_slot.legacy_id, LegacyId::TimeSlot(key(1)));
    let legacy: Vec<_> = response.visit_slots.iter().map(|p| p.legacy_id.clone()).collect();
    assert_eq!(legacy, [LegacyId::Id(71), LegacyId::Id(72)]);

    let visit = h
      .engine
      .migrate_visit(MigrateVisitRequest {
        legacy_visit_id: 501,
        legacy_visit_slot_id: 72,
        prison_code: PRISON.into(),
        prisoner_number: PRISONER.into(),
        visit_date: NaiveDate::from_ymd_opt(2024, 5, 6).unwrap(),
        start_time: time(9, 0),
        end_time: time(10, 0),
        visit_type: VisitType::Video,
        status: VisitStatus::Cancelled,
        completion_code: Some(CompletionCode::PrisonerCancelled),
        search_type: None,
        notes: None,
        audit: legacy_audit(),
        visitors: vec![legacy_visitor(9001), legacy_visitor(9002)],
      })
      .await
      .unwrap();
    assert_eq!(visit.visit.element_type, ElementType::OfficialVisit);
    assert!(visit.visitors.iter().all(|p| p.element_type == ElementType::OfficialVisitor));

    let stored = h.engine.get_visit(visit.visit.dps_id).await.unwrap();
    assert_eq!(stored.status, VisitStatus::Cancelled);
    assert_eq!(stored.legacy_visit_id, Some(501));
    assert_eq!(stored.prison_visit_slot_id, response.visit_slots[1].dps_id);
    assert!(h.published().is_empty());
  }

  #[tokio::test]
  async fn repeated_migration_is_rejected() {
    let h = Harness::new().await;
    h.engine
      .migrate_time_slot(legacy_time_slot(1, vec![]))
      .await
      .unwrap();
    let err = h
      .engine
      .migrate_time_slot(legacy_time_slot(1, vec![]))
      .await
      .unwrap_err();
    assert!(matches!(err, Error::Domain(visita_core::Error::DuplicateLegacyId { .. })));
  }

  #[tokio::test]
  async fn synced_slot_is_announced_as_legacy() {
    let mut h = Harness::new().await;
    let pair = h
      .engine
      .sync_create_time_slot(sync(3, time(13, 0), time(15, 0)))
      .await
      .unwrap();
    assert_eq!(pair.legacy_id, LegacyId::TimeSlot(key(3)));

    let events = h.published();
    assert_eq!(events.len(), 1);
    assert_eq!(events[0].event_type, "official-visits-api.time-slot.created");
    assert_eq!(events[0].additional_information.source, Source::Nomis);
    assert_eq!(events[0].additional_information.identifier, pair.dps_id);

    let slot = h.engine.get_time_slot(pair.dps_id).await.unwrap();
    assert_eq!(slot.audit.created_by, "NOMIS_USER");
    assert_eq!(slot.legacy, Some(key(3)));
  }

  #[tokio::test]
  async fn sync_update_finds_the_slot_by_legacy_key() {
    let mut h = Harness::new().await;
    let pair = h
      .engine
      .sync_create_time_slot(sync(3, time(13, 0), time(15, 0)))
      .await
      .unwrap();
    h.published();

    let updated = h
      .engine
      .sync_update_time_slot(sync(3, time(13, 30), time(15, 0)))
      .await
      .unwrap();
    assert_eq!(updated.prison_time_slot_id, pair.dps_id);
    assert_eq!(updated.start_time, time(13, 30));
    assert_eq!(updated.audit.updated_by.as_deref(), Some("NOMIS_USER"));
    let events = h.published();
    assert_eq!(events[0].event_type, "official-visits-api.time-slot.updated");
    assert_eq!(events[0].additional_information.source, Source::Nomis);

    let err = h
      .engine
      .sync_update_time_slot(sync(4, time(13, 0), time(14, 0)))
      .await
      .unwrap_err();
    assert_eq!(err.to_string(), "no prison time slot was migrated with legacy key MDI/MON/4");
    assert!(h.published().is_empty());
  }

  #[tokio::test]
  async fn sync_respects_native_slots() {
    let mut h = Harness::new().await;
    h.bookable().await;
    let err = h
      .engine
      .sync_create_time_slot(sync(5, time(11, 0), time(13, 0)))
      .await
      .unwrap_err();
    assert!(matches!(err, Error::Domain(visita_core::Error::TimeSlotOverlap { .. })));
    assert!(h.published().is_empty());
  }
}
