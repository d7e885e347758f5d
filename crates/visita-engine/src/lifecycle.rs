//! The visit lifecycle: creation, visitors, completion and cancellation.
//!
//! ```text
//! create ──▶ SCHEDULED ──complete──▶ COMPLETED
//!                │    └───cancel───▶ CANCELLED
//!                ▼ expiry sweep
//!             EXPIRED ──complete / cancel──▶ …
//! ```

use std::collections::BTreeMap;

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use visita_core::{
  ValidationErrors,
  codes::{AttendanceCode, CompletionCode, SearchLevel},
  event::{AdditionalInformation, OutboundEvent, Source},
  ports::UserDetails,
  reference::{ReferenceCode, ReferenceDataResolver, ReferenceGroup},
  store::VisitStore as _,
  visit::{Audit, Cancellation, Completion, NewVisit, NewVisitor, Visit, Visitor},
};

use crate::{Backend, Engine, Error, Result};

// ─── Requests ────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VisitorAttendance {
  pub official_visitor_id: i64,
  pub attendance:          AttendanceCode,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CompleteVisitRequest {
  pub completion_code: CompletionCode,
  #[serde(default)]
  pub search_type:     Option<SearchLevel>,
  /// Visitors not listed keep no attendance.
  #[serde(default)]
  pub attendance:      Vec<VisitorAttendance>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CancelVisitRequest {
  pub cancellation_code: CompletionCode,
  #[serde(default)]
  pub notes:             Option<String>,
}

// ─── Details ─────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct VisitorDescriptions {
  pub official_visitor_id: i64,
  pub visitor_type:        String,
  pub relationship_type:   Option<String>,
  pub relationship:        Option<String>,
  pub attendance:          Option<String>,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct VisitDescriptions {
  pub visit_type:      String,
  pub status:          String,
  pub completion_code: Option<String>,
  pub search_type:     Option<String>,
  pub visitors:        Vec<VisitorDescriptions>,
}

/// A visit with every code resolved through reference data.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct VisitDetails {
  #[serde(flatten)]
  pub visit:        Visit,
  pub descriptions: VisitDescriptions,
}

fn describe(visit: &Visit, resolver: &ReferenceDataResolver) -> VisitDescriptions {
  VisitDescriptions {
    visit_type:      resolver.describe(ReferenceGroup::VisitType, visit.visit_type.as_ref()),
    status:          resolver.describe(ReferenceGroup::VisitStatus, visit.status.as_ref()),
    completion_code: resolver.describe_opt(
      ReferenceGroup::CompletionCode,
      visit.completion_code.as_ref().map(AsRef::as_ref),
    ),
    search_type:     resolver.describe_opt(
      ReferenceGroup::SearchLevel,
      visit.search_type.as_ref().map(AsRef::as_ref),
    ),
    visitors:        visit
      .visitors
      .iter()
      .map(|v| VisitorDescriptions {
        official_visitor_id: v.official_visitor_id,
        visitor_type:        resolver.describe(ReferenceGroup::VisitorType, v.visitor_type.as_ref()),
        relationship_type:   resolver.describe_opt(
          ReferenceGroup::RelationshipType,
          v.relationship_type.as_ref().map(AsRef::as_ref),
        ),
        relationship:        resolver
          .describe_opt(ReferenceGroup::Relationship, v.relationship_code.as_deref()),
        attendance:          resolver.describe_opt(
          ReferenceGroup::Attendance,
          v.attendance.as_ref().map(AsRef::as_ref),
        ),
      })
      .collect(),
  }
}

fn visit_event(visit: &Visit) -> AdditionalInformation {
  AdditionalInformation {
    identifier:        visit.official_visit_id,
    second_identifier: None,
    prison_code:       visit.prison_code.clone(),
    noms:              Some(visit.prisoner_number.clone()),
    contact_id:        None,
    source:            Source::Dps,
  }
}

// ─── Operations ──────────────────────────────────────────────────────────────

impl<B: Backend> Engine<B> {
  /// The user a request acts as. Unknown users are rejected.
  pub async fn resolve_actor(&self, username: &str) -> Result<UserDetails> {
    self.validation.resolve_user(username).await
  }

  pub async fn get_visit(&self, official_visit_id: i64) -> Result<Visit> {
    self
      .store
      .get_visit(official_visit_id)
      .await
      .map_err(Error::store)?
      .ok_or_else(|| visita_core::Error::VisitNotFound(official_visit_id).into())
  }

  pub async fn visit_details(&self, official_visit_id: i64) -> Result<VisitDetails> {
    let visit = self.get_visit(official_visit_id).await?;
    let resolver = ReferenceDataResolver::new(
      self.store.reference_codes().await.map_err(Error::store)?,
    );
    let descriptions = describe(&visit, &resolver);
    Ok(VisitDetails { visit, descriptions })
  }

  /// Every code in `group` with its description.
  pub async fn reference_codes(&self, group: ReferenceGroup) -> Result<Vec<ReferenceCode>> {
    let stored = self.store.reference_codes().await.map_err(Error::store)?;
    Ok(ReferenceDataResolver::new(stored).codes(group))
  }

  /// Visits at `prison_code` dated within `from..=to`.
  pub async fn find_visits(
    &self,
    prison_code: &str,
    from: NaiveDate,
    to: NaiveDate,
  ) -> Result<Vec<Visit>> {
    if from > to {
      return Err(
        visita_core::Error::Validation(ValidationErrors::single(format!(
          "From date {from} is after to date {to}"
        )))
        .into(),
      );
    }
    self
      .store
      .find_visits(prison_code.to_owned(), from, to)
      .await
      .map_err(Error::store)
  }

  /// Book a visit. The prisoner, the slot's location and every contact
  /// visitor are checked together; the slot fit and overlap checks run in
  /// the store's transaction.
  #[tracing::instrument(
    parent = &self.span,
    skip_all,
    fields(prisoner = %visit.prisoner_number, slot = visit.prison_visit_slot_id)
  )]
  pub async fn create_visit(&self, visit: NewVisit, actor: &str) -> Result<Visit> {
    visit.range()?;
    let slot = self
      .store
      .get_visit_slot(visit.prison_visit_slot_id)
      .await
      .map_err(Error::store)?
      .ok_or(visita_core::Error::VisitSlotNotFound(visit.prison_visit_slot_id))?;

    let contact_ids: Vec<i64> = visit
      .visitors
      .iter()
      .filter(|v| v.visitor_type.is_contact())
      .filter_map(|v| v.contact_id)
      .collect();
    self
      .validation
      .validate_visit(
        &visit.prisoner_number,
        &visit.prison_code,
        slot.dps_location_id,
        &contact_ids,
      )
      .await?;

    let created = self
      .store
      .create_visit(visit, Audit::created(actor, self.clock.now()))
      .await
      .map_err(Error::store)?;
    tracing::info!(official_visit_id = created.official_visit_id, "visit created");

    self
      .events
      .emit(OutboundEvent::VisitCreated, visit_event(&created))
      .await;
    Ok(created)
  }

  #[tracing::instrument(parent = &self.span, skip(self, visitor, actor))]
  pub async fn add_visitor(
    &self,
    official_visit_id: i64,
    visitor: NewVisitor,
    actor: &str,
  ) -> Result<Visitor> {
    let visit = self.get_visit(official_visit_id).await?;
    visit.ensure_accepts_visitors()?;
    if visitor.visitor_type.is_contact()
      && let Some(contact_id) = visitor.contact_id
    {
      self
        .validation
        .validate_approved_contacts(&visit.prisoner_number, &[contact_id])
        .await?;
    }

    let added = self
      .store
      .add_visitor(official_visit_id, visitor, Audit::created(actor, self.clock.now()))
      .await
      .map_err(Error::store)?;

    self
      .events
      .emit(OutboundEvent::VisitorCreated, AdditionalInformation {
        identifier:        added.official_visitor_id,
        second_identifier: Some(official_visit_id),
        contact_id:        added.contact_id,
        ..visit_event(&visit)
      })
      .await;
    Ok(added)
  }

  #[tracing::instrument(parent = &self.span, skip(self, request, actor))]
  pub async fn complete_visit(
    &self,
    official_visit_id: i64,
    request: CompleteVisitRequest,
    actor: &str,
  ) -> Result<Visit> {
    let attendance: BTreeMap<i64, AttendanceCode> = request
      .attendance
      .into_iter()
      .map(|a| (a.official_visitor_id, a.attendance))
      .collect();
    let completion = Completion {
      code: request.completion_code,
      search_type: request.search_type,
      attendance,
      completed_by: actor.to_owned(),
      completed_at: self.clock.now(),
    };

    let visit = self
      .store
      .complete_visit(official_visit_id, completion)
      .await
      .map_err(Error::store)?;
    tracing::info!(code = %request.completion_code, "visit completed");

    self
      .events
      .emit(OutboundEvent::VisitCompleted, visit_event(&visit))
      .await;
    Ok(visit)
  }

  #[tracing::instrument(parent = &self.span, skip(self, request, actor))]
  pub async fn cancel_visit(
    &self,
    official_visit_id: i64,
    request: CancelVisitRequest,
    actor: &str,
  ) -> Result<Visit> {
    let code = request.cancellation_code;
    let cancellation = Cancellation {
      code,
      notes: request.notes,
      cancelled_by: actor.to_owned(),
      cancelled_at: self.clock.now(),
    };

    let visit = self
      .store
      .cancel_visit(official_visit_id, cancellation)
      .await
      .map_err(Error::store)?;
    tracing::info!(%code, "visit cancelled");

    self
      .events
      .emit(OutboundEvent::VisitCancelled, visit_event(&visit))
      .await;
    Ok(visit)
  }

  /// Move SCHEDULED visits dated before today to EXPIRED. Administrative;
  /// publishes nothing.
  pub async fn expire_visits(&self, actor: &str) -> Result<Vec<i64>> {
    let expired = self
      .store
      .expire_visits(self.clock.today(), actor.to_owned(), self.clock.now())
      .await
      .map_err(Error::store)?;
    if !expired.is_empty() {
      tracing::info!(parent: &self.span, count = expired.len(), "expired overdue visits");
    }
    Ok(expired)
  }
}
