//! JSON HTTP API for official visits.
//!
//! Mount the router returned by [`api_router`] in an axum application:
//!
//! ```text
//! POST   /official-visits                    create a visit
//! GET    /official-visits                    ?prisonCode=&fromDate=&toDate=
//! GET    /official-visits/{id}               visit with code descriptions
//! POST   /official-visits/{id}/visitors      add a visitor
//! POST   /official-visits/{id}/complete      complete with attendance
//! POST   /official-visits/{id}/cancel        cancel with a cancellation code
//! POST   /time-slots                         create a time slot
//! GET    /time-slots                         ?prisonCode=[&activeOnly=true]
//! GET    /time-slots/{id}                    one time slot
//! PUT    /time-slots/{id}                    replace a time slot's definition
//! POST   /time-slots/{id}/visit-slots        create a visit slot
//! GET    /time-slots/{id}/visit-slots        list visit slots
//! POST   /migrate/time-slot                  migrate a legacy time slot tree
//! POST   /migrate/visit                      migrate a legacy visit
//! POST   /sync/time-slot                     legacy-originated create
//! PUT    /sync/time-slot                     legacy-originated update
//! POST   /events/inbound                     one inbound event envelope
//! GET    /reference-data/{group}             codes and descriptions
//! ```
//!
//! Native mutations name the acting user in the `x-username` header.

pub mod error;
pub mod legacy;
pub mod slots;
pub mod visits;

use std::sync::Arc;

use axum::{
  Router,
  http::HeaderMap,
  routing::{get, post},
};
use visita_engine::{Backend, Engine};

pub use error::ApiError;

pub const USERNAME_HEADER: &str = "x-username";

/// Build the API router. The caller adds middleware and serves it.
pub fn api_router<B: Backend>(engine: Arc<Engine<B>>) -> Router<()> {
  Router::new()
    .route(
      "/official-visits",
      post(visits::create::<B>).get(visits::find::<B>),
    )
    .route("/official-visits/{id}", get(visits::get_one::<B>))
    .route("/official-visits/{id}/visitors", post(visits::add_visitor::<B>))
    .route("/official-visits/{id}/complete", post(visits::complete::<B>))
    .route("/official-visits/{id}/cancel", post(visits::cancel::<B>))
    .route("/time-slots", post(slots::create::<B>).get(slots::list::<B>))
    .route(
      "/time-slots/{id}",
      get(slots::get_one::<B>).put(slots::update::<B>),
    )
    .route(
      "/time-slots/{id}/visit-slots",
      post(slots::create_visit_slot::<B>).get(slots::list_visit_slots::<B>),
    )
    .route("/migrate/time-slot", post(legacy::migrate_time_slot::<B>))
    .route("/migrate/visit", post(legacy::migrate_visit::<B>))
    .route(
      "/sync/time-slot",
      post(legacy::sync_create_time_slot::<B>).put(legacy::sync_update_time_slot::<B>),
    )
    .route("/events/inbound", post(legacy::inbound::<B>))
    .route("/reference-data/{group}", get(legacy::reference_data::<B>))
    .with_state(engine)
}

/// The acting user's username, checked against the user directory.
pub(crate) async fn actor<B: Backend>(
  engine: &Engine<B>,
  headers: &HeaderMap,
) -> Result<String, ApiError> {
  let username = headers
    .get(USERNAME_HEADER)
    .and_then(|v| v.to_str().ok())
    .map(str::trim)
    .filter(|s| !s.is_empty())
    .ok_or(ApiError::MissingUser)?;
  Ok(engine.resolve_actor(username).await?.username)
}
