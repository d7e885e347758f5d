//! [`SqliteStore`], the SQLite implementation of [`VisitStore`].

use std::path::Path;

use chrono::{DateTime, NaiveDate, Utc};
use visita_core::{
  reconcile::{
    MigrateTimeSlotRequest, MigrateTimeSlotResponse, MigrateVisitRequest,
    MigrateVisitResponse,
  },
  reference::ReferenceCode,
  slot::{
    LegacyTimeSlotKey, PrisonTimeSlot, PrisonVisitSlot, TimeSlotDefinition,
    VisitSlotDefinition,
  },
  store::VisitStore,
  visit::{Audit, Cancellation, Completion, NewVisit, NewVisitor, Visit, Visitor},
};

use crate::{Error, Result, ops, schema::SCHEMA};

// ─── Store ───────────────────────────────────────────────────────────────────

/// An official visits store backed by a single SQLite file.
///
/// Cloning is cheap; the inner connection handle is shared.
#[derive(Clone)]
pub struct SqliteStore {
  conn: tokio_rusqlite::Connection,
}

impl SqliteStore {
  /// Open (or create) a store at `path` and run schema initialisation.
  pub async fn open(path: impl AsRef<Path>) -> Result<Self> {
    let conn = tokio_rusqlite::Connection::open(path).await?;
    let store = Self { conn };
    store.init_schema().await?;
    Ok(store)
  }

  /// Open an in-memory store, used by tests and offline runs.
  pub async fn open_in_memory() -> Result<Self> {
    let conn = tokio_rusqlite::Connection::open_in_memory().await?;
    let store = Self { conn };
    store.init_schema().await?;
    Ok(store)
  }

  async fn init_schema(&self) -> Result<()> {
    self
      .conn
      .call(|conn| {
        conn.execute_batch(SCHEMA)?;
        Ok(())
      })
      .await?;
    Ok(())
  }

  /// Run `f` on the connection thread. Domain errors raised inside `f` come
  /// back as [`Error::Core`] rather than being flattened into a database
  /// error.
  async fn run<T, F>(&self, f: F) -> Result<T>
  where
    F: FnOnce(&mut rusqlite::Connection) -> Result<T> + Send + 'static,
    T: Send + 'static,
  {
    self.conn.call(move |conn| Ok(f(conn))).await?
  }
}

impl VisitStore for SqliteStore {
  type Error = Error;

  // ── Time slots ────────────────────────────────────────────────────────────

  async fn create_time_slot(
    &self,
    definition: TimeSlotDefinition,
    legacy: Option<LegacyTimeSlotKey>,
    audit: Audit,
    today: NaiveDate,
  ) -> Result<PrisonTimeSlot> {
    self
      .run(move |conn| ops::create_time_slot(conn, definition, legacy, audit, today))
      .await
  }

  async fn update_time_slot(
    &self,
    prison_time_slot_id: i64,
    definition: TimeSlotDefinition,
    updated_by: String,
    updated_at: DateTime<Utc>,
    today: NaiveDate,
  ) -> Result<PrisonTimeSlot> {
    self
      .run(move |conn| {
        ops::update_time_slot(conn, prison_time_slot_id, definition, updated_by, updated_at, today)
      })
      .await
  }

  async fn get_time_slot(&self, prison_time_slot_id: i64) -> Result<Option<PrisonTimeSlot>> {
    self
      .run(move |conn| ops::time_slot_by_id(conn, prison_time_slot_id))
      .await
  }

  async fn find_time_slot_by_legacy(
    &self,
    key: LegacyTimeSlotKey,
  ) -> Result<Option<PrisonTimeSlot>> {
    self
      .run(move |conn| ops::time_slot_by_legacy(conn, &key))
      .await
  }

  async fn list_time_slots(
    &self,
    prison_code: String,
    active_on: Option<NaiveDate>,
  ) -> Result<Vec<PrisonTimeSlot>> {
    self
      .run(move |conn| ops::list_time_slots(conn, &prison_code, active_on))
      .await
  }

  // ── Visit slots ───────────────────────────────────────────────────────────

  async fn create_visit_slot(
    &self,
    prison_time_slot_id: i64,
    definition: VisitSlotDefinition,
    audit: Audit,
  ) -> Result<PrisonVisitSlot> {
    self
      .run(move |conn| ops::create_visit_slot(conn, prison_time_slot_id, definition, audit))
      .await
  }

  async fn get_visit_slot(&self, prison_visit_slot_id: i64) -> Result<Option<PrisonVisitSlot>> {
    self
      .run(move |conn| ops::visit_slot_by_id(conn, prison_visit_slot_id))
      .await
  }

  async fn list_visit_slots(&self, prison_time_slot_id: i64) -> Result<Vec<PrisonVisitSlot>> {
    self
      .run(move |conn| ops::list_visit_slots(conn, prison_time_slot_id))
      .await
  }

  // ── Visits ────────────────────────────────────────────────────────────────

  async fn create_visit(&self, visit: NewVisit, audit: Audit) -> Result<Visit> {
    self
      .run(move |conn| ops::create_visit(conn, visit, audit))
      .await
  }

  async fn get_visit(&self, official_visit_id: i64) -> Result<Option<Visit>> {
    self
      .run(move |conn| ops::visit_by_id(conn, official_visit_id))
      .await
  }

  async fn find_visits(
    &self,
    prison_code: String,
    from: NaiveDate,
    to: NaiveDate,
  ) -> Result<Vec<Visit>> {
    self
      .run(move |conn| ops::find_visits(conn, &prison_code, from, to))
      .await
  }

  async fn add_visitor(
    &self,
    official_visit_id: i64,
    visitor: NewVisitor,
    audit: Audit,
  ) -> Result<Visitor> {
    self
      .run(move |conn| ops::add_visitor(conn, official_visit_id, visitor, audit))
      .await
  }

  async fn complete_visit(&self, official_visit_id: i64, completion: Completion) -> Result<Visit> {
    self
      .run(move |conn| ops::complete_visit(conn, official_visit_id, completion))
      .await
  }

  async fn cancel_visit(
    &self,
    official_visit_id: i64,
    cancellation: Cancellation,
  ) -> Result<Visit> {
    self
      .run(move |conn| ops::cancel_visit(conn, official_visit_id, cancellation))
      .await
  }

  async fn expire_visits(
    &self,
    before: NaiveDate,
    by: String,
    at: DateTime<Utc>,
  ) -> Result<Vec<i64>> {
    self
      .run(move |conn| ops::expire_visits(conn, before, by, at))
      .await
  }

  // ── Migration ─────────────────────────────────────────────────────────────

  async fn migrate_time_slot(
    &self,
    request: MigrateTimeSlotRequest,
    today: NaiveDate,
  ) -> Result<MigrateTimeSlotResponse> {
    self
      .run(move |conn| ops::migrate_time_slot(conn, request, today))
      .await
  }

  async fn migrate_visit(&self, request: MigrateVisitRequest) -> Result<MigrateVisitResponse> {
    self
      .run(move |conn| ops::migrate_visit(conn, request))
      .await
  }

  // ── Reference data ────────────────────────────────────────────────────────

  async fn reference_codes(&self) -> Result<Vec<ReferenceCode>> {
    self.run(|conn| ops::reference_codes(conn)).await
  }
}
