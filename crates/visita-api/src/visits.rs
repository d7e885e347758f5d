//! Handlers for `/official-visits` endpoints.
//!
//! | Method | Path | Notes |
//! |--------|------|-------|
//! | `POST` | `/official-visits` | Body: [`NewVisit`]; 201 |
//! | `GET`  | `/official-visits` | `?prisonCode=&fromDate=&toDate=` |
//! | `GET`  | `/official-visits/{id}` | With code descriptions; 404 if not found |
//! | `POST` | `/official-visits/{id}/visitors` | Body: [`NewVisitor`]; 201 |
//! | `POST` | `/official-visits/{id}/complete` | Body: [`CompleteVisitRequest`] |
//! | `POST` | `/official-visits/{id}/cancel` | Body: [`CancelVisitRequest`] |

use std::sync::Arc;

use axum::{
  Json,
  extract::{Path, Query, State},
  http::{HeaderMap, StatusCode},
  response::IntoResponse,
};
use chrono::NaiveDate;
use serde::Deserialize;
use visita_core::visit::{NewVisit, NewVisitor, Visit};
use visita_engine::{
  Backend, Engine,
  lifecycle::{CancelVisitRequest, CompleteVisitRequest, VisitDetails},
};

use crate::{actor, error::ApiError};

// ─── Create ──────────────────────────────────────────────────────────────────

/// `POST /official-visits`
pub async fn create<B: Backend>(
  State(engine): State<Arc<Engine<B>>>,
  headers: HeaderMap,
  Json(body): Json<NewVisit>,
) -> Result<impl IntoResponse, ApiError> {
  let actor = actor(&engine, &headers).await?;
  let visit = engine.create_visit(body, &actor).await?;
  Ok((StatusCode::CREATED, Json(visit)))
}

// ─── Read ────────────────────────────────────────────────────────────────────

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FindParams {
  pub prison_code: String,
  pub from_date:   NaiveDate,
  pub to_date:     NaiveDate,
}

/// `GET /official-visits?prisonCode=<p>&fromDate=<d>&toDate=<d>`
pub async fn find<B: Backend>(
  State(engine): State<Arc<Engine<B>>>,
  Query(params): Query<FindParams>,
) -> Result<Json<Vec<Visit>>, ApiError> {
  let visits = engine
    .find_visits(&params.prison_code, params.from_date, params.to_date)
    .await?;
  Ok(Json(visits))
}

/// `GET /official-visits/{id}`
pub async fn get_one<B: Backend>(
  State(engine): State<Arc<Engine<B>>>,
  Path(id): Path<i64>,
) -> Result<Json<VisitDetails>, ApiError> {
  Ok(Json(engine.visit_details(id).await?))
}

// ─── Mutations ───────────────────────────────────────────────────────────────

/// `POST /official-visits/{id}/visitors`
pub async fn add_visitor<B: Backend>(
  State(engine): State<Arc<Engine<B>>>,
  Path(id): Path<i64>,
  headers: HeaderMap,
  Json(body): Json<NewVisitor>,
) -> Result<impl IntoResponse, ApiError> {
  let actor = actor(&engine, &headers).await?;
  let visitor = engine.add_visitor(id, body, &actor).await?;
  Ok((StatusCode::CREATED, Json(visitor)))
}

/// `POST /official-visits/{id}/complete`
pub async fn complete<B: Backend>(
  State(engine): State<Arc<Engine<B>>>,
  Path(id): Path<i64>,
  headers: HeaderMap,
  Json(body): Json<CompleteVisitRequest>,
) -> Result<Json<Visit>, ApiError> {
  let actor = actor(&engine, &headers).await?;
  Ok(Json(engine.complete_visit(id, body, &actor).await?))
}

/// `POST /official-visits/{id}/cancel`
pub async fn cancel<B: Backend>(
  State(engine): State<Arc<Engine<B>>>,
  Path(id): Path<i64>,
  headers: HeaderMap,
  Json(body): Json<CancelVisitRequest>,
) -> Result<Json<Visit>, ApiError> {
  let actor = actor(&engine, &headers).await?;
  Ok(Json(engine.cancel_visit(id, body, &actor).await?))
}
