//! Outbound event emission.
//!
//! The engine calls [`OutboundEventEmitter::emit`] only after the store has
//! committed. Delivery is attempted up to `max_attempts` times; a publish that
//! still fails is parked in a bounded in-memory queue for
//! [`OutboundEventEmitter::redeliver_pending`], so a committed change is never
//! reported to the caller as a failure. Parked events do not survive a
//! restart.

use std::{
  collections::VecDeque,
  future::Future,
  sync::{Arc, Mutex},
};

use serde::Deserialize;
use tokio::sync::mpsc;
use visita_core::{
  clock::Clock,
  event::{AdditionalInformation, DomainEvent, OutboundEvent},
};

// ─── Publisher ───────────────────────────────────────────────────────────────

/// Transport for committed-change notifications.
pub trait EventPublisher: Send + Sync {
  type Error: std::error::Error + Send + Sync + 'static;

  fn publish<'a>(
    &'a self,
    event: &'a DomainEvent,
  ) -> impl Future<Output = Result<(), Self::Error>> + Send + 'a;
}

/// Writes every event to the log as JSON.
#[derive(Debug, Clone, Copy, Default)]
pub struct LoggingPublisher;

impl EventPublisher for LoggingPublisher {
  type Error = serde_json::Error;

  async fn publish<'a>(&'a self, event: &'a DomainEvent) -> Result<(), Self::Error> {
    let payload = serde_json::to_string(event)?;
    tracing::info!(
      event_type = %event.event_type,
      identifier = event.additional_information.identifier,
      %payload,
      "domain event"
    );
    Ok(())
  }
}

#[derive(Debug, thiserror::Error)]
#[error("event channel closed")]
pub struct ChannelClosed;

/// Forwards events to an in-process receiver.
#[derive(Debug, Clone)]
pub struct ChannelPublisher {
  tx: mpsc::UnboundedSender<DomainEvent>,
}

impl ChannelPublisher {
  pub fn new() -> (Self, mpsc::UnboundedReceiver<DomainEvent>) {
    let (tx, rx) = mpsc::unbounded_channel();
    (Self { tx }, rx)
  }
}

impl EventPublisher for ChannelPublisher {
  type Error = ChannelClosed;

  async fn publish<'a>(&'a self, event: &'a DomainEvent) -> Result<(), Self::Error> {
    self.tx.send(event.clone()).map_err(|_| ChannelClosed)
  }
}

// ─── Emitter ─────────────────────────────────────────────────────────────────

fn default_enabled() -> bool { true }

fn default_max_attempts() -> u32 { 3 }

fn default_max_pending() -> usize { 1000 }

#[derive(Debug, Clone, Deserialize)]
pub struct EventConfig {
  /// Master switch; when off nothing is published.
  #[serde(default = "default_enabled")]
  pub enabled:      bool,
  /// Event kinds that are never published.
  #[serde(default)]
  pub suppressed:   Vec<OutboundEvent>,
  #[serde(default = "default_max_attempts")]
  pub max_attempts: u32,
  /// Undelivered events kept for redelivery; the oldest is dropped beyond
  /// this.
  #[serde(default = "default_max_pending")]
  pub max_pending:  usize,
}

impl Default for EventConfig {
  fn default() -> Self {
    Self {
      enabled:      default_enabled(),
      suppressed:   Vec::new(),
      max_attempts: default_max_attempts(),
      max_pending:  default_max_pending(),
    }
  }
}

pub struct OutboundEventEmitter<P> {
  publisher: P,
  config:    EventConfig,
  clock:     Arc<dyn Clock>,
  pending:   Mutex<VecDeque<DomainEvent>>,
  span:      tracing::Span,
}

impl<P: EventPublisher> OutboundEventEmitter<P> {
  pub fn new(publisher: P, config: EventConfig, clock: Arc<dyn Clock>, span: tracing::Span) -> Self {
    Self { publisher, config, clock, pending: Mutex::default(), span }
  }

  /// Number of events waiting for redelivery.
  pub fn pending(&self) -> usize { self.lock_pending().len() }

  fn lock_pending(&self) -> std::sync::MutexGuard<'_, VecDeque<DomainEvent>> {
    self.pending.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
  }

  fn park(&self, payload: DomainEvent) {
    let mut pending = self.lock_pending();
    if self.config.max_pending == 0 {
      tracing::error!(
        parent: &self.span,
        event_type = %payload.event_type,
        identifier = payload.additional_information.identifier,
        "event dropped after retries"
      );
      return;
    }
    if pending.len() >= self.config.max_pending
      && let Some(oldest) = pending.pop_front()
    {
      tracing::error!(
        parent: &self.span,
        event_type = %oldest.event_type,
        identifier = oldest.additional_information.identifier,
        "pending queue full; oldest event dropped"
      );
    }
    pending.push_back(payload);
  }

  /// Try every parked event once, in order. Events that still fail stay
  /// parked. Returns how many were delivered.
  pub async fn redeliver_pending(&self) -> usize {
    let batch: Vec<DomainEvent> = self.lock_pending().drain(..).collect();
    let mut delivered = 0;
    let mut failed = Vec::new();
    for payload in batch {
      match self.publisher.publish(&payload).await {
        Ok(()) => delivered += 1,
        Err(e) => {
          tracing::warn!(
            parent: &self.span,
            event_type = %payload.event_type,
            error = %e,
            "event redelivery failed"
          );
          failed.push(payload);
        }
      }
    }
    if !failed.is_empty() {
      // Keep failures ahead of anything parked while the batch ran.
      let mut pending = self.lock_pending();
      for payload in failed.into_iter().rev() {
        pending.push_front(payload);
      }
      while pending.len() > self.config.max_pending {
        pending.pop_front();
      }
    }
    if delivered > 0 {
      tracing::info!(parent: &self.span, delivered, "parked events redelivered");
    }
    delivered
  }

  pub fn is_enabled(&self, event: OutboundEvent) -> bool {
    self.config.enabled && !self.config.suppressed.contains(&event)
  }

  /// Publish one event for a committed change. Returns whether it was
  /// delivered; failures are logged here and never propagated.
  pub async fn emit(&self, event: OutboundEvent, info: AdditionalInformation) -> bool {
    if !self.is_enabled(event) {
      tracing::debug!(parent: &self.span, event_type = event.event_type(), "event suppressed");
      return false;
    }

    let payload = DomainEvent::new(event, info, self.clock.now());
    let attempts = self.config.max_attempts.max(1);
    for attempt in 1..=attempts {
      match self.publisher.publish(&payload).await {
        Ok(()) => {
          tracing::debug!(
            parent: &self.span,
            event_type = %payload.event_type,
            identifier = payload.additional_information.identifier,
            attempt,
            "event published"
          );
          return true;
        }
        Err(e) => tracing::warn!(
          parent: &self.span,
          event_type = %payload.event_type,
          attempt,
          error = %e,
          "event publish failed"
        ),
      }
    }
    tracing::error!(
      parent: &self.span,
      event_type = %payload.event_type,
      identifier = payload.additional_information.identifier,
      attempts,
      "event parked after retries"
    );
    self.park(payload);
    false
  }
}

#[cfg(test)]
mod tests {
  use std::sync::atomic::{AtomicU32, Ordering};

  use chrono::{TimeZone as _, Utc};
  use visita_core::{clock::FixedClock, event::Source};

  use super::*;

  fn info() -> AdditionalInformation {
    AdditionalInformation {
      identifier:        5,
      second_identifier: None,
      prison_code:       "MDI".into(),
      noms:              Some("A1234BC".into()),
      contact_id:        None,
      source:            Source::Dps,
    }
  }

  fn clock() -> Arc<dyn Clock> { Arc::new(FixedClock::at(Utc.timestamp_opt(1_000, 0).unwrap())) }

  #[derive(Debug, thiserror::Error)]
  #[error("broker unavailable")]
  struct Unavailable;

  /// Fails the first `failures` publishes.
  struct Flaky {
    failures: u32,
    calls:    AtomicU32,
  }

  impl EventPublisher for Flaky {
    type Error = Unavailable;

    async fn publish<'a>(&'a self, _event: &'a DomainEvent) -> Result<(), Self::Error> {
      let call = self.calls.fetch_add(1, Ordering::SeqCst);
      if call < self.failures { Err(Unavailable) } else { Ok(()) }
    }
  }

  #[tokio::test]
  async fn emits_stamped_payload() {
    let (publisher, mut rx) = ChannelPublisher::new();
    let emitter =
      OutboundEventEmitter::new(publisher, EventConfig::default(), clock(), tracing::Span::none());

    assert!(emitter.emit(OutboundEvent::VisitCancelled, info()).await);
    let event = rx.try_recv().unwrap();
    assert_eq!(event.event_type, "official-visits-api.visit.cancelled");
    assert_eq!(event.occurred_at, Utc.timestamp_opt(1_000, 0).unwrap());
    assert!(rx.try_recv().is_err());
  }

  #[tokio::test]
  async fn suppressed_and_disabled_events_are_not_published() {
    let (publisher, mut rx) = ChannelPublisher::new();
    let config = EventConfig {
      suppressed: vec![OutboundEvent::VisitCreated],
      ..EventConfig::default()
    };
    let emitter = OutboundEventEmitter::new(publisher.clone(), config, clock(), tracing::Span::none());
    assert!(!emitter.emit(OutboundEvent::VisitCreated, info()).await);
    assert!(emitter.emit(OutboundEvent::VisitCompleted, info()).await);
    assert_eq!(rx.try_recv().unwrap().event_type, "official-visits-api.visit.completed");

    let off = OutboundEventEmitter::new(
      publisher,
      EventConfig { enabled: false, ..EventConfig::default() },
      clock(),
      tracing::Span::none(),
    );
    assert!(!off.emit(OutboundEvent::VisitCompleted, info()).await);
    assert!(rx.try_recv().is_err());
  }

  #[tokio::test]
  async fn transient_failures_are_retried() {
    let emitter = OutboundEventEmitter::new(
      Flaky { failures: 2, calls: AtomicU32::new(0) },
      EventConfig::default(),
      clock(),
      tracing::Span::none(),
    );
    assert!(emitter.emit(OutboundEvent::TimeSlotCreated, info()).await);
    assert_eq!(emitter.publisher.calls.load(Ordering::SeqCst), 3);
  }

  #[tokio::test]
  async fn exhausted_retries_are_parked_not_raised() {
    let emitter = OutboundEventEmitter::new(
      Flaky { failures: u32::MAX, calls: AtomicU32::new(0) },
      EventConfig { max_attempts: 2, ..EventConfig::default() },
      clock(),
      tracing::Span::none(),
    );
    assert!(!emitter.emit(OutboundEvent::TimeSlotCreated, info()).await);
    assert_eq!(emitter.publisher.calls.load(Ordering::SeqCst), 2);
    assert_eq!(emitter.pending(), 1);
  }

  #[tokio::test]
  async fn parked_events_are_redelivered_once_the_broker_recovers() {
    let emitter = OutboundEventEmitter::new(
      Flaky { failures: 3, calls: AtomicU32::new(0) },
      EventConfig { max_attempts: 2, ..EventConfig::default() },
      clock(),
      tracing::Span::none(),
    );
    assert!(!emitter.emit(OutboundEvent::VisitCreated, info()).await);
    assert_eq!(emitter.pending(), 1);

    // Third call still fails; the event stays parked.
    assert_eq!(emitter.redeliver_pending().await, 0);
    assert_eq!(emitter.pending(), 1);

    assert_eq!(emitter.redeliver_pending().await, 1);
    assert_eq!(emitter.pending(), 0);
    assert_eq!(emitter.publisher.calls.load(Ordering::SeqCst), 4);
  }

  #[tokio::test]
  async fn pending_queue_keeps_the_newest_events() {
    let emitter = OutboundEventEmitter::new(
      Flaky { failures: u32::MAX, calls: AtomicU32::new(0) },
      EventConfig { max_attempts: 1, max_pending: 2, ..EventConfig::default() },
      clock(),
      tracing::Span::none(),
    );
    for event in [OutboundEvent::VisitCreated, OutboundEvent::VisitCancelled, OutboundEvent::VisitCompleted] {
      emitter.emit(event, info()).await;
    }
    let pending: Vec<_> = emitter.lock_pending().iter().map(|e| e.event_type.clone()).collect();
    assert_eq!(pending, ["official-visits-api.visit.cancelled", "official-visits-api.visit.completed"]);
  }
}
