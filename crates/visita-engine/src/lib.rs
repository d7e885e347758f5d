//! The official visits engine.
//!
//! [`Engine`] ties a [`VisitStore`] to the external query ports, the outbound
//! event emitter and the inbound dispatcher. Every mutating operation follows
//! the same order: validate against external systems, commit through one
//! store call, then emit.
//!
//! The operations live in topic modules as further `impl` blocks:
//! [`lifecycle`] for visits and visitors, [`time_slots`] for native slot
//! management, [`reconciliation`] for migration and sync from the legacy
//! system.

pub mod error;
pub mod inbound;
pub mod lifecycle;
pub mod outbound;
pub mod reconciliation;
pub mod time_slots;
pub mod validation;

use std::sync::Arc;

pub use error::{BoxError, Error, Result};
use inbound::{InboundEventDispatcher, PrisonerEventHandler};
use outbound::{EventConfig, EventPublisher, OutboundEventEmitter};
use validation::ExternalValidation;
use visita_core::{clock::Clock, ports::ExternalQueries, store::VisitStore};

/// The concrete collaborators an [`Engine`] runs against.
pub trait Backend: Send + Sync + 'static {
  type Store: VisitStore + 'static;
  type Queries: ExternalQueries + 'static;
  type Publisher: EventPublisher + 'static;
  type Handler: PrisonerEventHandler + 'static;
}

pub struct EngineParts<B: Backend> {
  pub store:     Arc<B::Store>,
  pub queries:   Arc<B::Queries>,
  pub publisher: B::Publisher,
  pub handler:   B::Handler,
  pub clock:     Arc<dyn Clock>,
}

pub struct Engine<B: Backend> {
  store:      Arc<B::Store>,
  validation: ExternalValidation<B::Queries>,
  events:     OutboundEventEmitter<B::Publisher>,
  inbound:    InboundEventDispatcher<B::Handler>,
  clock:      Arc<dyn Clock>,
  span:       tracing::Span,
}

impl<B: Backend> Engine<B> {
  /// Every component logs under `span`.
  pub fn new(parts: EngineParts<B>, events: EventConfig, span: tracing::Span) -> Self {
    let EngineParts { store, queries, publisher, handler, clock } = parts;
    Self {
      store,
      validation: ExternalValidation::new(queries, span.clone()),
      events: OutboundEventEmitter::new(publisher, events, clock.clone(), span.clone()),
      inbound: InboundEventDispatcher::new(handler, span.clone()),
      clock,
      span,
    }
  }

  pub fn inbound(&self) -> &InboundEventDispatcher<B::Handler> { &self.inbound }

  /// Retry events whose publish failed after their change committed.
  pub async fn redeliver_events(&self) -> usize { self.events.redeliver_pending().await }
}
