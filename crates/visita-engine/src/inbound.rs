//! Inbound prisoner-event dispatch.
//!
//! Delivery is at-least-once. A handler that fails must surface the failure
//! so the transport redelivers; [`InboundEventDispatcher::dispatch`] never
//! absorbs one.

use std::future::Future;

use thiserror::Error;
use visita_core::event::{
  InboundEnvelope, InboundEvent, PrisonerMerged, PrisonerReceived, PrisonerReleased,
};

use crate::error::BoxError;

/// Reactions to prisoner-state changes observed elsewhere.
pub trait PrisonerEventHandler: Send + Sync {
  type Error: std::error::Error + Send + Sync + 'static;

  fn on_released<'a>(
    &'a self,
    event: &'a PrisonerReleased,
  ) -> impl Future<Output = Result<(), Self::Error>> + Send + 'a;

  fn on_received<'a>(
    &'a self,
    event: &'a PrisonerReceived,
  ) -> impl Future<Output = Result<(), Self::Error>> + Send + 'a;

  fn on_merged<'a>(
    &'a self,
    event: &'a PrisonerMerged,
  ) -> impl Future<Output = Result<(), Self::Error>> + Send + 'a;
}

/// Observes every event and changes nothing.
#[derive(Debug, Clone, Copy, Default)]
pub struct LoggingPrisonerEventHandler;

impl PrisonerEventHandler for LoggingPrisonerEventHandler {
  type Error = std::convert::Infallible;

  async fn on_released<'a>(&'a self, event: &'a PrisonerReleased) -> Result<(), Self::Error> {
    tracing::info!(
      noms_number = %event.noms_number,
      prison_id = %event.prison_id,
      reason = event.reason.as_deref(),
      "prisoner released"
    );
    Ok(())
  }

  async fn on_received<'a>(&'a self, event: &'a PrisonerReceived) -> Result<(), Self::Error> {
    tracing::info!(
      noms_number = %event.noms_number,
      prison_id = %event.prison_id,
      reason = event.reason.as_deref(),
      "prisoner received"
    );
    Ok(())
  }

  async fn on_merged<'a>(&'a self, event: &'a PrisonerMerged) -> Result<(), Self::Error> {
    tracing::info!(
      noms_number = %event.noms_number,
      removed_noms_number = %event.removed_noms_number,
      "prisoner merged"
    );
    Ok(())
  }
}

#[derive(Debug, Error)]
pub enum InboundError {
  #[error("malformed inbound event: {0}")]
  Malformed(#[source] BoxError),

  #[error("inbound event handler failed: {0}")]
  Handler(#[source] BoxError),
}

impl From<serde_json::Error> for InboundError {
  fn from(err: serde_json::Error) -> Self { Self::Malformed(Box::new(err)) }
}

impl From<visita_core::Error> for InboundError {
  fn from(err: visita_core::Error) -> Self { Self::Malformed(Box::new(err)) }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Dispatched {
  Handled,
  /// Not an event type this system subscribes to.
  Ignored,
}

pub struct InboundEventDispatcher<H> {
  handler: H,
  span:    tracing::Span,
}

impl<H: PrisonerEventHandler> InboundEventDispatcher<H> {
  pub fn new(handler: H, span: tracing::Span) -> Self { Self { handler, span } }

  /// Decode a raw message body and dispatch it.
  pub async fn dispatch_json(&self, body: &[u8]) -> Result<Dispatched, InboundError> {
    let envelope: InboundEnvelope = serde_json::from_slice(body)?;
    self.dispatch(envelope).await
  }

  #[tracing::instrument(parent = &self.span, skip_all, fields(event_type = %envelope.event_type))]
  pub async fn dispatch(&self, envelope: InboundEnvelope) -> Result<Dispatched, InboundError> {
    let Some(event) = envelope.decode()? else {
      tracing::debug!("ignoring unsubscribed event type");
      return Ok(Dispatched::Ignored);
    };

    let handled = match &event {
      InboundEvent::Released(e) => self.handler.on_released(e).await,
      InboundEvent::Received(e) => self.handler.on_received(e).await,
      InboundEvent::Merged(e) => self.handler.on_merged(e).await,
    };
    handled.map_err(|e| {
      tracing::warn!(noms_number = event.noms_number(), error = %e, "inbound handler failed");
      InboundError::Handler(Box::new(e))
    })?;
    Ok(Dispatched::Handled)
  }
}
