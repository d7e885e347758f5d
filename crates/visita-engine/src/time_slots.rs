//! Native time slot and visit slot management.

use visita_core::{
  event::{AdditionalInformation, OutboundEvent, Source},
  slot::{PrisonTimeSlot, PrisonVisitSlot, TimeSlotDefinition, VisitSlotDefinition},
  store::VisitStore as _,
  visit::Audit,
};

use crate::{Backend, Engine, Error, Result};

pub(crate) fn time_slot_event(slot: &PrisonTimeSlot, source: Source) -> AdditionalInformation {
  AdditionalInformation {
    identifier: slot.prison_time_slot_id,
    second_identifier: None,
    prison_code: slot.prison_code.clone(),
    noms: None,
    contact_id: None,
    source,
  }
}

impl<B: Backend> Engine<B> {
  /// Create a slot; it must not overlap any slot for the same prison and day
  /// that is active today.
  #[tracing::instrument(
    parent = &self.span,
    skip_all,
    fields(prison = %definition.prison_code, day = %definition.day_code)
  )]
  pub async fn create_time_slot(
    &self,
    definition: TimeSlotDefinition,
    actor: &str,
  ) -> Result<PrisonTimeSlot> {
    definition.validate()?;
    let slot = self
      .store
      .create_time_slot(
        definition,
        None,
        Audit::created(actor, self.clock.now()),
        self.clock.today(),
      )
      .await
      .map_err(Error::store)?;
    tracing::info!(prison_time_slot_id = slot.prison_time_slot_id, "time slot created");

    self
      .events
      .emit(OutboundEvent::TimeSlotCreated, time_slot_event(&slot, Source::Dps))
      .await;
    Ok(slot)
  }

  #[tracing::instrument(parent = &self.span, skip(self, definition, actor))]
  pub async fn update_time_slot(
    &self,
    prison_time_slot_id: i64,
    definition: TimeSlotDefinition,
    actor: &str,
  ) -> Result<PrisonTimeSlot> {
    definition.validate()?;
    let slot = self
      .store
      .update_time_slot(
        prison_time_slot_id,
        definition,
        actor.to_owned(),
        self.clock.now(),
        self.clock.today(),
      )
      .await
      .map_err(Error::store)?;

    self
      .events
      .emit(OutboundEvent::TimeSlotUpdated, time_slot_event(&slot, Source::Dps))
      .await;
    Ok(slot)
  }

  pub async fn get_time_slot(&self, prison_time_slot_id: i64) -> Result<PrisonTimeSlot> {
    self
      .store
      .get_time_slot(prison_time_slot_id)
      .await
      .map_err(Error::store)?
      .ok_or_else(|| visita_core::Error::TimeSlotNotFound(prison_time_slot_id).into())
  }

  /// Every slot at the prison, or only those in force today.
  pub async fn list_time_slots(
    &self,
    prison_code: &str,
    active_only: bool,
  ) -> Result<Vec<PrisonTimeSlot>> {
    let active_on = active_only.then(|| self.clock.today());
    self
      .store
      .list_time_slots(prison_code.to_owned(), active_on)
      .await
      .map_err(Error::store)
  }

  /// Add a bookable location to a time slot. The location must be active
  /// and at the time slot's prison.
  #[tracing::instrument(parent = &self.span, skip(self, definition, actor))]
  pub async fn create_visit_slot(
    &self,
    prison_time_slot_id: i64,
    definition: VisitSlotDefinition,
    actor: &str,
  ) -> Result<PrisonVisitSlot> {
    let time_slot = self.get_time_slot(prison_time_slot_id).await?;
    self
      .validation
      .validate_prison_location_id(&time_slot.prison_code, definition.dps_location_id)
      .await?;

    let slot = self
      .store
      .create_visit_slot(
        prison_time_slot_id,
        definition,
        Audit::created(actor, self.clock.now()),
      )
      .await
      .map_err(Error::store)?;

    self
      .events
      .emit(OutboundEvent::VisitSlotCreated, AdditionalInformation {
        identifier: slot.prison_visit_slot_id,
        second_identifier: Some(prison_time_slot_id),
        ..time_slot_event(&time_slot, Source::Dps)
      })
      .await;
    Ok(slot)
  }

  pub async fn list_visit_slots(&self, prison_time_slot_id: i64) -> Result<Vec<PrisonVisitSlot>> {
    self.get_time_slot(prison_time_slot_id).await?;
    self
      .store
      .list_visit_slots(prison_time_slot_id)
      .await
      .map_err(Error::store)
  }
}

#[cfg(test)]
mod tests {
  use chrono::NaiveDate;
  use uuid::Uuid;
  use visita_clients::InMemoryQueries;
  use visita_core::ports::Location;

  use super::*;
  use crate::{outbound::EventConfig, testing::*};

  fn room_at(prison: &str, active: bool) -> Location {
    Location {
      id: Uuid::new_v4(),
      key: format!("{prison}-ROOM"),
      prison_id: prison.into(),
      active,
      local_name: None,
    }
  }

  fn in_room(location: &Location) -> VisitSlotDefinition {
    VisitSlotDefinition {
      dps_location_id:    location.id,
      max_adults:         None,
      max_groups:         None,
      max_video_sessions: None,
    }
  }

  #[tokio::test]
  async fn created_slot_is_announced_once() {
    let mut h = Harness::new().await;
    let slot = h
      .engine
      .create_time_slot(monday(time(9, 0), time(12, 0)), OFFICER)
      .await
      .unwrap();

    let events = h.published();
    assert_eq!(events.len(), 1);
    assert_eq!(events[0].event_type, "official-visits-api.time-slot.created");
    assert_eq!(events[0].additional_information.identifier, slot.prison_time_slot_id);
    assert_eq!(events[0].additional_information.source, Source::Dps);
    assert!(events[0].person_reference.is_none());
  }

  #[tokio::test]
  async fn overlapping_slot_is_rejected_and_not_announced() {
    let mut h = Harness::new().await;
    h.engine
      .create_time_slot(monday(time(9, 0), time(12, 0)), OFFICER)
      .await
      .unwrap();
    h.published();

    let err = h
      .engine
      .create_time_slot(monday(time(11, 0), time(13, 0)), OFFICER)
      .await
      .unwrap_err();
    assert!(matches!(err, Error::Domain(visita_core::Error::TimeSlotOverlap { .. })));
    assert!(h.published().is_empty());

    h.engine
      .create_time_slot(monday(time(12, 0), time(13, 0)), OFFICER)
      .await
      .unwrap();
  }

  #[tokio::test]
  async fn concurrent_overlapping_slots_commit_once() {
    let mut h = Harness::new().await;
    let (a, b) = tokio::join!(
      h.engine.create_time_slot(monday(time(9, 0), time(12, 0)), OFFICER),
      h.engine.create_time_slot(monday(time(11, 0), time(13, 0)), OFFICER),
    );
    let outcomes = [a, b];
    assert_eq!(outcomes.iter().filter(|r| r.is_ok()).count(), 1);
    assert!(outcomes.iter().any(|r| matches!(
      r,
      Err(Error::Domain(visita_core::Error::TimeSlotOverlap { .. }))
    )));
    assert_eq!(h.published().len(), 1);
  }

  #[tokio::test]
  async fn future_slot_blocks_an_open_ended_one() {
    let h = Harness::new().await;
    let mut future = monday(time(9, 0), time(12, 0));
    future.effective_date = NaiveDate::from_ymd_opt(2026, 6, 1).unwrap();
    h.engine.create_time_slot(future, OFFICER).await.unwrap();

    let err = h
      .engine
      .create_time_slot(monday(time(10, 0), time(11, 0)), OFFICER)
      .await
      .unwrap_err();
    assert!(matches!(err, Error::Domain(visita_core::Error::TimeSlotOverlap { .. })));

    let mut until_then = monday(time(10, 0), time(11, 0));
    until_then.expiry_date = NaiveDate::from_ymd_opt(2026, 5, 31);
    h.engine.create_time_slot(until_then, OFFICER).await.unwrap();
  }

  #[tokio::test]
  async fn reversed_times_are_rejected_before_the_store() {
    let h = Harness::new().await;
    let err = h
      .engine
      .create_time_slot(monday(time(12, 0), time(9, 0)), OFFICER)
      .await
      .unwrap_err();
    assert!(matches!(err, Error::Domain(visita_core::Error::InvalidTimeRange { .. })));
  }

  #[tokio::test]
  async fn update_moves_the_slot_and_is_announced() {
    let mut h = Harness::new().await;
    let slot = h
      .engine
      .create_time_slot(monday(time(9, 0), time(12, 0)), OFFICER)
      .await
      .unwrap();
    h.published();

    let updated = h
      .engine
      .update_time_slot(slot.prison_time_slot_id, monday(time(10, 0), time(12, 30)), OFFICER)
      .await
      .unwrap();
    assert_eq!(updated.start_time, time(10, 0));
    assert_eq!(updated.audit.updated_by.as_deref(), Some(OFFICER));
    assert_eq!(h.published()[0].event_type, "official-visits-api.time-slot.updated");
  }

  #[tokio::test]
  async fn visit_slot_location_must_be_active_at_the_slot_prison() {
    let elsewhere = room_at("WWI", true);
    let closed = room_at("MDI", false);
    let queries = InMemoryQueries::new()
      .with_location(room())
      .with_location(elsewhere.clone())
      .with_location(closed.clone());
    let mut h = Harness::with(queries, EventConfig::default()).await;
    let time_slot = h
      .engine
      .create_time_slot(monday(time(9, 0), time(12, 0)), OFFICER)
      .await
      .unwrap();
    h.published();

    let err = h
      .engine
      .create_visit_slot(time_slot.prison_time_slot_id, in_room(&elsewhere), OFFICER)
      .await
      .unwrap_err();
    assert_eq!(
      err.to_string(),
      format!("The following location is not at prison code MDI [{}]", elsewhere.id)
    );
    let err = h
      .engine
      .create_visit_slot(time_slot.prison_time_slot_id, in_room(&closed), OFFICER)
      .await
      .unwrap_err();
    assert_eq!(
      err.to_string(),
      format!("The following location is not active at prison code MDI [{}]", closed.id)
    );
    assert!(h.published().is_empty());

    let slot = h
      .engine
      .create_visit_slot(time_slot.prison_time_slot_id, in_room(&room()), OFFICER)
      .await
      .unwrap();
    let events = h.published();
    assert_eq!(events[0].event_type, "official-visits-api.visit-slot.created");
    assert_eq!(events[0].additional_information.identifier, slot.prison_visit_slot_id);
    assert_eq!(
      events[0].additional_information.second_identifier,
      Some(time_slot.prison_time_slot_id)
    );
    let listed = h.engine.list_visit_slots(time_slot.prison_time_slot_id).await.unwrap();
    assert_eq!(listed, [slot]);
  }

  #[tokio::test]
  async fn active_listing_hides_expired_slots() {
    let h = Harness::new().await;
    let mut old = monday(time(9, 0), time(10, 0));
    old.expiry_date = NaiveDate::from_ymd_opt(2026, 2, 1);
    let old = h.engine.create_time_slot(old, OFFICER).await.unwrap();
    // The lapsed slot does not block its replacement.
    let current = h
      .engine
      .create_time_slot(monday(time(9, 0), time(10, 0)), OFFICER)
      .await
      .unwrap();

    let all = h.engine.list_time_slots(PRISON, false).await.unwrap();
    assert_eq!(all.len(), 2);
    let active = h.engine.list_time_slots(PRISON, true).await.unwrap();
    assert_eq!(active, [current]);
    assert_ne!(active[0].prison_time_slot_id, old.prison_time_slot_id);
  }

  #[tokio::test]
  async fn visit_slots_of_unknown_time_slot_are_not_found() {
    let h = Harness::new().await;
    let err = h.engine.list_visit_slots(99).await.unwrap_err();
    assert!(matches!(err, Error::Domain(visita_core::Error::TimeSlotNotFound(99))));
  }
}
