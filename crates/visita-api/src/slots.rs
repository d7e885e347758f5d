//! Handlers for `/time-slots` endpoints.
//!
//! | Method | Path | Notes |
//! |--------|------|-------|
//! | `POST` | `/time-slots` | Body: [`TimeSlotDefinition`]; 201 |
//! | `GET`  | `/time-slots` | `?prisonCode=<p>[&activeOnly=true]` |
//! | `GET`  | `/time-slots/{id}` | 404 if not found |
//! | `PUT`  | `/time-slots/{id}` | Body: [`TimeSlotDefinition`] |
//! | `POST` | `/time-slots/{id}/visit-slots` | Body: [`VisitSlotDefinition`]; 201 |
//! | `GET`  | `/time-slots/{id}/visit-slots` | |

use std::sync::Arc;

use axum::{
  Json,
  extract::{Path, Query, State},
  http::{HeaderMap, StatusCode},
  response::IntoResponse,
};
use serde::Deserialize;
use visita_core::slot::{PrisonTimeSlot, PrisonVisitSlot, TimeSlotDefinition, VisitSlotDefinition};
use visita_engine::{Backend, Engine};

use crate::{actor, error::ApiError};

// ─── Time slots ──────────────────────────────────────────────────────────────

/// `POST /time-slots`
pub async fn create<B: Backend>(
  State(engine): State<Arc<Engine<B>>>,
  headers: HeaderMap,
  Json(body): Json<TimeSlotDefinition>,
) -> Result<impl IntoResponse, ApiError> {
  let actor = actor(&engine, &headers).await?;
  let slot = engine.create_time_slot(body, &actor).await?;
  Ok((StatusCode::CREATED, Json(slot)))
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ListParams {
  pub prison_code: String,
  #[serde(default)]
  pub active_only: bool,
}

/// `GET /time-slots?prisonCode=<p>[&activeOnly=true]`
pub async fn list<B: Backend>(
  State(engine): State<Arc<Engine<B>>>,
  Query(params): Query<ListParams>,
) -> Result<Json<Vec<PrisonTimeSlot>>, ApiError> {
  let slots = engine
    .list_time_slots(&params.prison_code, params.active_only)
    .await?;
  Ok(Json(slots))
}

/// `GET /time-slots/{id}`
pub async fn get_one<B: Backend>(
  State(engine): State<Arc<Engine<B>>>,
  Path(id): Path<i64>,
) -> Result<Json<PrisonTimeSlot>, ApiError> {
  Ok(Json(engine.get_time_slot(id).await?))
}

/// `PUT /time-slots/{id}`
pub async fn update<B: Backend>(
  State(engine): State<Arc<Engine<B>>>,
  Path(id): Path<i64>,
  headers: HeaderMap,
  Json(body): Json<TimeSlotDefinition>,
) -> Result<Json<PrisonTimeSlot>, ApiError> {
  let actor = actor(&engine, &headers).await?;
  Ok(Json(engine.update_time_slot(id, body, &actor).await?))
}

// ─── Visit slots ─────────────────────────────────────────────────────────────

/// `POST /time-slots/{id}/visit-slots`
pub async fn create_visit_slot<B: Backend>(
  State(engine): State<Arc<Engine<B>>>,
  Path(id): Path<i64>,
  headers: HeaderMap,
  Json(body): Json<VisitSlotDefinition>,
) -> Result<impl IntoResponse, ApiError> {
  let actor = actor(&engine, &headers).await?;
  let slot = engine.create_visit_slot(id, body, &actor).await?;
  Ok((StatusCode::CREATED, Json(slot)))
}

/// `GET /time-slots/{id}/visit-slots`
pub async fn list_visit_slots<B: Backend>(
  State(engine): State<Arc<Engine<B>>>,
  Path(id): Path<i64>,
) -> Result<Json<Vec<PrisonVisitSlot>>, ApiError> {
  Ok(Json(engine.list_visit_slots(id).await?))
}
