//! Wiring for the official visits server binary.
//!
//! Holds the runtime configuration, the two concrete backends (live HTTP
//! lookups, or a fixed directory for offline runs), the HTTP application
//! with its trace layer, and the background expiry sweep.

use std::{path::PathBuf, sync::Arc, time::Duration};

use axum::Router;
use serde::Deserialize;
use tower_http::trace::TraceLayer;
use visita_clients::{Directory, HttpQueries, InMemoryQueries, LookupConfig};
use visita_core::clock::SystemClock;
use visita_engine::{
  Backend, Engine, EngineParts,
  inbound::LoggingPrisonerEventHandler,
  outbound::{EventConfig, LoggingPublisher},
};
use visita_store_sqlite::SqliteStore;

/// The user recorded against administrative changes.
pub const SYSTEM_USER: &str = "SYSTEM";

// ─── Configuration ───────────────────────────────────────────────────────────

fn default_host() -> String { "127.0.0.1".into() }

fn default_port() -> u16 { 8080 }

fn default_sweep_secs() -> u64 { 3600 }

/// Runtime server configuration, deserialised from `config.toml` and
/// `VISITA_*` environment variables.
#[derive(Debug, Deserialize, Clone)]
pub struct ServerConfig {
  #[serde(default = "default_host")]
  pub host:              String,
  #[serde(default = "default_port")]
  pub port:              u16,
  pub store_path:        PathBuf,
  #[serde(default)]
  pub lookups:           LookupsConfig,
  #[serde(default)]
  pub events:            EventConfig,
  /// Seconds between expiry sweeps; `0` disables the sweep.
  #[serde(default = "default_sweep_secs")]
  pub expiry_sweep_secs: u64,
}

/// Where prisoner, location, contact and user data comes from. With `http`
/// set the services are called; otherwise `directory` answers every query.
#[derive(Debug, Deserialize, Clone, Default)]
pub struct LookupsConfig {
  #[serde(default)]
  pub http:      Option<LookupConfig>,
  #[serde(default)]
  pub directory: Directory,
}

impl ServerConfig {
  pub fn expiry_sweep(&self) -> Option<Duration> {
    (self.expiry_sweep_secs > 0).then(|| Duration::from_secs(self.expiry_sweep_secs))
  }
}

// ─── Backends ────────────────────────────────────────────────────────────────

/// SQLite storage with the live lookup services.
pub struct HttpBackend;

impl Backend for HttpBackend {
  type Store = SqliteStore;
  type Queries = HttpQueries;
  type Publisher = LoggingPublisher;
  type Handler = LoggingPrisonerEventHandler;
}

/// SQLite storage with lookups answered from configuration.
pub struct DirectoryBackend;

impl Backend for DirectoryBackend {
  type Store = SqliteStore;
  type Queries = InMemoryQueries;
  type Publisher = LoggingPublisher;
  type Handler = LoggingPrisonerEventHandler;
}

/// An engine on the system clock, logging under the `visita` span.
pub fn engine<B>(store: Arc<SqliteStore>, queries: B::Queries, events: EventConfig) -> Engine<B>
where
  B: Backend<
      Store = SqliteStore,
      Publisher = LoggingPublisher,
      Handler = LoggingPrisonerEventHandler,
    >,
{
  Engine::new(
    EngineParts {
      store,
      queries: Arc::new(queries),
      publisher: LoggingPublisher,
      handler: LoggingPrisonerEventHandler,
      clock: Arc::new(SystemClock),
    },
    events,
    tracing::info_span!("visita"),
  )
}

// ─── Application ─────────────────────────────────────────────────────────────

/// The API router with request tracing.
pub fn app<B: Backend>(engine: Arc<Engine<B>>) -> Router {
  visita_api::api_router(engine).layer(TraceLayer::new_for_http())
}

/// Run one expiry pass and retry any parked events. Failures are logged and
/// retried on the next tick.
pub async fn sweep_once<B: Backend>(engine: &Engine<B>) -> usize {
  engine.redeliver_events().await;
  match engine.expire_visits(SYSTEM_USER).await {
    Ok(expired) => expired.len(),
    Err(e) => {
      tracing::error!(error = %e, "expiry sweep failed");
      0
    }
  }
}

/// Sweep every `period` until the task is dropped. The first pass runs
/// immediately.
pub async fn expiry_sweep<B: Backend>(engine: Arc<Engine<B>>, period: Duration) {
  let mut ticker = tokio::time::interval(period);
  ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
  loop {
    ticker.tick().await;
    sweep_once(&engine).await;
  }
}

/// Serve `engine` on `listener`, with the expiry sweep running alongside
/// when `sweep` is set.
pub async fn serve<B: Backend>(
  engine: Arc<Engine<B>>,
  listener: tokio::net::TcpListener,
  sweep: Option<Duration>,
) -> std::io::Result<()> {
  let sweeper = sweep.map(|period| tokio::spawn(expiry_sweep(engine.clone(), period)));
  let result = axum::serve(listener, app(engine)).await;
  if let Some(handle) = sweeper {
    handle.abort();
  }
  result
}

#[cfg(test)]
mod tests {
  use axum::{
    body::Body,
    http::{Request, StatusCode},
  };
  use chrono::{NaiveDate, NaiveTime, TimeZone as _, Utc};
  use tower::ServiceExt as _;
  use uuid::Uuid;
  use visita_core::{
    clock::FixedClock,
    codes::{DayCode, VisitStatus, VisitType},
    ports::{Location, Prisoner, UserDetails},
    slot::{TimeSlotDefinition, VisitSlotDefinition},
    visit::NewVisit,
  };

  use super::*;

  const CONFIG: &str = r#"
    store_path = "~/visita.db"
    port = 9090

    [events]
    suppressed = ["VISIT_CANCELLED"]

    [[lookups.directory.users]]
    username = "OFFICER1"
    name = "Pat Officer"
  "#;

  #[test]
  fn config_layers_defaults_under_the_file() {
    let cfg: ServerConfig = config::Config::builder()
      .add_source(config::File::from_str(CONFIG, config::FileFormat::Toml))
      .build()
      .unwrap()
      .try_deserialize()
      .unwrap();

    assert_eq!(cfg.host, "127.0.0.1");
    assert_eq!(cfg.port, 9090);
    assert!(cfg.lookups.http.is_none());
    assert_eq!(cfg.lookups.directory.users[0].username, "OFFICER1");
    assert_eq!(cfg.events.suppressed.len(), 1);
    assert!(cfg.events.enabled);
    assert_eq!(cfg.expiry_sweep(), Some(Duration::from_secs(3600)));
  }

  #[test]
  fn zero_disables_the_sweep() {
    let cfg: ServerConfig = config::Config::builder()
      .add_source(config::File::from_str(
        "store_path = \"x.db\"\nexpiry_sweep_secs = 0",
        config::FileFormat::Toml,
      ))
      .build()
      .unwrap()
      .try_deserialize()
      .unwrap();
    assert_eq!(cfg.expiry_sweep(), None);
  }

  async fn fixed_engine() -> Engine<DirectoryBackend> {
    let room = Location {
      id:         Uuid::from_u128(1),
      key:        "MDI-VISITS-1".into(),
      prison_id:  "MDI".into(),
      active:     true,
      local_name: None,
    };
    let queries = InMemoryQueries::new()
      .with_prisoner(Prisoner {
        prisoner_number: "A1234BC".into(),
        prison_id:       Some("MDI".into()),
        first_name:      "Sam".into(),
        last_name:       "Smith".into(),
      })
      .with_location(room)
      .with_user(UserDetails {
        username:            "OFFICER1".into(),
        name:                "Pat Officer".into(),
        active_case_load_id: None,
      });
    Engine::new(
      EngineParts {
        store:     Arc::new(SqliteStore::open_in_memory().await.unwrap()),
        queries:   Arc::new(queries),
        publisher: LoggingPublisher,
        handler:   LoggingPrisonerEventHandler,
        clock:     Arc::new(FixedClock {
          now:   Utc.with_ymd_and_hms(2026, 3, 2, 12, 0, 0).unwrap(),
          today: NaiveDate::from_ymd_opt(2026, 3, 2).unwrap(),
        }),
      },
      EventConfig::default(),
      tracing::Span::none(),
    )
  }

  #[tokio::test]
  async fn sweep_expires_overdue_visits_once() {
    let engine = fixed_engine().await;
    let nine = NaiveTime::from_hms_opt(9, 0, 0).unwrap();
    let ten = NaiveTime::from_hms_opt(10, 0, 0).unwrap();
    let time_slot = engine
      .create_time_slot(
        TimeSlotDefinition {
          prison_code:    "MDI".into(),
          day_code:       DayCode::Mon,
          start_time:     nine,
          end_time:       ten,
          effective_date: NaiveDate::from_ymd_opt(2026, 1, 1).unwrap(),
          expiry_date:    None,
        },
        "OFFICER1",
      )
      .await
      .unwrap();
    let visit_slot = engine
      .create_visit_slot(
        time_slot.prison_time_slot_id,
        VisitSlotDefinition {
          dps_location_id:    Uuid::from_u128(1),
          max_adults:         None,
          max_groups:         None,
          max_video_sessions: None,
        },
        "OFFICER1",
      )
      .await
      .unwrap();
    let visit = engine
      .create_visit(
        NewVisit {
          prisoner_number:      "A1234BC".into(),
          prison_code:          "MDI".into(),
          prison_visit_slot_id: visit_slot.prison_visit_slot_id,
          visit_date:           NaiveDate::from_ymd_opt(2026, 2, 23).unwrap(),
          start_time:           nine,
          end_time:             ten,
          visit_type:           VisitType::InPerson,
          visitors:             vec![],
        },
        "OFFICER1",
      )
      .await
      .unwrap();

    assert_eq!(sweep_once(&engine).await, 1);
    assert_eq!(sweep_once(&engine).await, 0);
    let visit = engine.get_visit(visit.official_visit_id).await.unwrap();
    assert_eq!(visit.status, VisitStatus::Expired);
    assert_eq!(visit.audit.updated_by.as_deref(), Some(SYSTEM_USER));
  }

  #[tokio::test]
  async fn app_serves_the_api() {
    let app = app(Arc::new(fixed_engine().await));
    let resp = app
      .oneshot(
        Request::builder()
          .uri("/reference-data/VISIT_TYPE")
          .body(Body::empty())
          .unwrap(),
      )
      .await
      .unwrap();
    assert_eq!(resp.status(), StatusCode::OK);
  }
}
