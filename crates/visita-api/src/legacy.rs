//! Migration, sync, inbound events and reference data.
//!
//! Legacy requests carry their own audit fields, so none of these handlers
//! resolve an acting user.

use std::sync::Arc;

use axum::{
  Json,
  body::Bytes,
  extract::{Path, State},
  http::StatusCode,
  response::IntoResponse,
};
use serde_json::json;
use visita_core::{
  reconcile::{
    MigrateTimeSlotRequest, MigrateTimeSlotResponse, MigrateVisitRequest, MigrateVisitResponse,
    SyncTimeSlotRequest,
  },
  reference::{ReferenceCode, ReferenceGroup},
  slot::PrisonTimeSlot,
};
use visita_engine::{Backend, Engine, inbound::Dispatched};

use crate::error::ApiError;

// ─── Migration ───────────────────────────────────────────────────────────────

/// `POST /migrate/time-slot`
pub async fn migrate_time_slot<B: Backend>(
  State(engine): State<Arc<Engine<B>>>,
  Json(body): Json<MigrateTimeSlotRequest>,
) -> Result<(StatusCode, Json<MigrateTimeSlotResponse>), ApiError> {
  let response = engine.migrate_time_slot(body).await?;
  Ok((StatusCode::CREATED, Json(response)))
}

/// `POST /migrate/visit`
pub async fn migrate_visit<B: Backend>(
  State(engine): State<Arc<Engine<B>>>,
  Json(body): Json<MigrateVisitRequest>,
) -> Result<(StatusCode, Json<MigrateVisitResponse>), ApiError> {
  let response = engine.migrate_visit(body).await?;
  Ok((StatusCode::CREATED, Json(response)))
}

// ─── Sync ────────────────────────────────────────────────────────────────────

/// `POST /sync/time-slot`
pub async fn sync_create_time_slot<B: Backend>(
  State(engine): State<Arc<Engine<B>>>,
  Json(body): Json<SyncTimeSlotRequest>,
) -> Result<impl IntoResponse, ApiError> {
  let pair = engine.sync_create_time_slot(body).await?;
  Ok((StatusCode::CREATED, Json(pair)))
}

/// `PUT /sync/time-slot`
pub async fn sync_update_time_slot<B: Backend>(
  State(engine): State<Arc<Engine<B>>>,
  Json(body): Json<SyncTimeSlotRequest>,
) -> Result<Json<PrisonTimeSlot>, ApiError> {
  Ok(Json(engine.sync_update_time_slot(body).await?))
}

// ─── Inbound events ──────────────────────────────────────────────────────────

/// `POST /events/inbound` — one raw event envelope.
///
/// Any failure is an error response so the delivering side redelivers.
pub async fn inbound<B: Backend>(
  State(engine): State<Arc<Engine<B>>>,
  body: Bytes,
) -> Result<impl IntoResponse, ApiError> {
  let outcome = match engine.inbound().dispatch_json(&body).await? {
    Dispatched::Handled => "handled",
    Dispatched::Ignored => "ignored",
  };
  Ok((StatusCode::ACCEPTED, Json(json!({ "outcome": outcome }))))
}

// ─── Reference data ──────────────────────────────────────────────────────────

/// `GET /reference-data/{group}`, e.g. `/reference-data/COMPLETION_CODE`
pub async fn reference_data<B: Backend>(
  State(engine): State<Arc<Engine<B>>>,
  Path(group): Path<ReferenceGroup>,
) -> Result<Json<Vec<ReferenceCode>>, ApiError> {
  Ok(Json(engine.reference_codes(group).await?))
}
