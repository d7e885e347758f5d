//! The `VisitStore` trait.
//!
//! Implemented by storage backends (e.g. `visita-store-sqlite`). The engine
//! depends on this abstraction, not on any concrete backend.
//!
//! Every mutating method is one unit of work: the backend re-checks the rules
//! that depend on other rows (overlaps, current visit status, legacy id
//! uniqueness) and writes, all inside a single transaction that is
//! serialized against other writers. Either everything a method describes
//! is committed or nothing is.

use std::future::Future;

use chrono::{DateTime, NaiveDate, Utc};

use crate::{
  reconcile::{
    MigrateTimeSlotRequest, MigrateTimeSlotResponse, MigrateVisitRequest,
    MigrateVisitResponse,
  },
  reference::ReferenceCode,
  slot::{
    LegacyTimeSlotKey, PrisonTimeSlot, PrisonVisitSlot, TimeSlotDefinition,
    VisitSlotDefinition,
  },
  visit::{Audit, Cancellation, Completion, NewVisit, NewVisitor, Visit, Visitor},
};

/// Store failures that encode a domain rule rather than an infrastructure
/// fault.
pub trait StoreError: std::error::Error + Send + Sync + Sized + 'static {
  /// Recover the domain error, or hand back `self` if this is a genuine
  /// storage failure.
  fn into_domain(self) -> Result<crate::Error, Self>;
}

pub trait VisitStore: Send + Sync {
  type Error: StoreError;

  // ── Time slots ────────────────────────────────────────────────────────

  /// Insert a time slot, rejecting it if it overlaps another slot for the
  /// same prison and day that is active on `today`.
  fn create_time_slot(
    &self,
    definition: TimeSlotDefinition,
    legacy: Option<LegacyTimeSlotKey>,
    audit: Audit,
    today: NaiveDate,
  ) -> impl Future<Output = Result<PrisonTimeSlot, Self::Error>> + Send + '_;

  /// Replace a time slot's shape, with the same overlap rule as creation
  /// (the slot itself excluded).
  fn update_time_slot(
    &self,
    prison_time_slot_id: i64,
    definition: TimeSlotDefinition,
    updated_by: String,
    updated_at: DateTime<Utc>,
    today: NaiveDate,
  ) -> impl Future<Output = Result<PrisonTimeSlot, Self::Error>> + Send + '_;

  fn get_time_slot(
    &self,
    prison_time_slot_id: i64,
  ) -> impl Future<Output = Result<Option<PrisonTimeSlot>, Self::Error>> + Send + '_;

  fn find_time_slot_by_legacy(
    &self,
    key: LegacyTimeSlotKey,
  ) -> impl Future<Output = Result<Option<PrisonTimeSlot>, Self::Error>> + Send + '_;

  /// All time slots at a prison; when `active_on` is set, only those in
  /// force on that date.
  fn list_time_slots(
    &self,
    prison_code: String,
    active_on: Option<NaiveDate>,
  ) -> impl Future<Output = Result<Vec<PrisonTimeSlot>, Self::Error>> + Send + '_;

  // ── Visit slots ───────────────────────────────────────────────────────

  fn create_visit_slot(
    &self,
    prison_time_slot_id: i64,
    definition: VisitSlotDefinition,
    audit: Audit,
  ) -> impl Future<Output = Result<PrisonVisitSlot, Self::Error>> + Send + '_;

  fn get_visit_slot(
    &self,
    prison_visit_slot_id: i64,
  ) -> impl Future<Output = Result<Option<PrisonVisitSlot>, Self::Error>> + Send + '_;

  fn list_visit_slots(
    &self,
    prison_time_slot_id: i64,
  ) -> impl Future<Output = Result<Vec<PrisonVisitSlot>, Self::Error>> + Send + '_;

  // ── Visits ────────────────────────────────────────────────────────────

  /// Insert a SCHEDULED visit and its visitors. Fails without writing if the
  /// visit does not fit its slot or overlaps a non-cancelled visit in the
  /// same slot on the same date.
  fn create_visit(
    &self,
    visit: NewVisit,
    audit: Audit,
  ) -> impl Future<Output = Result<Visit, Self::Error>> + Send + '_;

  fn get_visit(
    &self,
    official_visit_id: i64,
  ) -> impl Future<Output = Result<Option<Visit>, Self::Error>> + Send + '_;

  /// Visits at a prison with a visit date in `from..=to`, ordered by date
  /// then start time.
  fn find_visits(
    &self,
    prison_code: String,
    from: NaiveDate,
    to: NaiveDate,
  ) -> impl Future<Output = Result<Vec<Visit>, Self::Error>> + Send + '_;

  /// Append a visitor to a SCHEDULED visit.
  fn add_visitor(
    &self,
    official_visit_id: i64,
    visitor: NewVisitor,
    audit: Audit,
  ) -> impl Future<Output = Result<Visitor, Self::Error>> + Send + '_;

  /// Apply [`Visit::complete`] to the stored visit and persist the result.
  fn complete_visit(
    &self,
    official_visit_id: i64,
    completion: Completion,
  ) -> impl Future<Output = Result<Visit, Self::Error>> + Send + '_;

  /// Apply [`Visit::cancel`] to the stored visit and persist the result.
  fn cancel_visit(
    &self,
    official_visit_id: i64,
    cancellation: Cancellation,
  ) -> impl Future<Output = Result<Visit, Self::Error>> + Send + '_;

  /// Move every SCHEDULED visit dated before `before` to EXPIRED and return
  /// their ids. Not part of the lifecycle write path; used by the
  /// administrative expiry sweep.
  fn expire_visits(
    &self,
    before: NaiveDate,
    by: String,
    at: DateTime<Utc>,
  ) -> impl Future<Output = Result<Vec<i64>, Self::Error>> + Send + '_;

  // ── Migration ─────────────────────────────────────────────────────────

  /// Insert a legacy time slot and all its visit slots as one batch.
  fn migrate_time_slot(
    &self,
    request: MigrateTimeSlotRequest,
    today: NaiveDate,
  ) -> impl Future<Output = Result<MigrateTimeSlotResponse, Self::Error>> + Send + '_;

  /// Insert a legacy visit and all its visitors as one batch.
  fn migrate_visit(
    &self,
    request: MigrateVisitRequest,
  ) -> impl Future<Output = Result<MigrateVisitResponse, Self::Error>> + Send + '_;

  // ── Reference data ────────────────────────────────────────────────────

  fn reference_codes(
    &self,
  ) -> impl Future<Output = Result<Vec<ReferenceCode>, Self::Error>> + Send + '_;
}
