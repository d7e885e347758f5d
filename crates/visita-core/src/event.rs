//! Event payload contracts.
//!
//! Outbound events announce committed state changes; inbound events report
//! prisoner movements observed by other systems. Only the payloads live here;
//! delivery belongs to the engine and its transports.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

// ─── Outbound ────────────────────────────────────────────────────────────────

/// Every externally interesting state change this system announces.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum OutboundEvent {
  TimeSlotCreated,
  TimeSlotUpdated,
  VisitSlotCreated,
  VisitCreated,
  VisitCompleted,
  VisitCancelled,
  VisitorCreated,
}

impl OutboundEvent {
  pub fn event_type(self) -> &'static str {
    match self {
      Self::TimeSlotCreated => "official-visits-api.time-slot.created",
      Self::TimeSlotUpdated => "official-visits-api.time-slot.updated",
      Self::VisitSlotCreated => "official-visits-api.visit-slot.created",
      Self::VisitCreated => "official-visits-api.visit.created",
      Self::VisitCompleted => "official-visits-api.visit.completed",
      Self::VisitCancelled => "official-visits-api.visit.cancelled",
      Self::VisitorCreated => "official-visits-api.visitor.created",
    }
  }

  pub fn description(self) -> &'static str {
    match self {
      Self::TimeSlotCreated => "A prison time slot has been created",
      Self::TimeSlotUpdated => "A prison time slot has been updated",
      Self::VisitSlotCreated => "A prison visit slot has been created",
      Self::VisitCreated => "An official visit has been created",
      Self::VisitCompleted => "An official visit has been completed",
      Self::VisitCancelled => "An official visit has been cancelled",
      Self::VisitorCreated => "An official visitor has been added to a visit",
    }
  }
}

/// Where the change originated.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Source {
  /// Made natively in this system.
  Dps,
  /// Synchronised from the legacy system.
  Nomis,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AdditionalInformation {
  pub identifier:        i64,
  #[serde(skip_serializing_if = "Option::is_none")]
  pub second_identifier: Option<i64>,
  pub prison_code:       String,
  #[serde(skip_serializing_if = "Option::is_none")]
  pub noms:              Option<String>,
  #[serde(skip_serializing_if = "Option::is_none")]
  pub contact_id:        Option<i64>,
  pub source:            Source,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PersonIdentifier {
  #[serde(rename = "type")]
  pub kind:  String,
  pub value: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PersonReference {
  pub identifiers: Vec<PersonIdentifier>,
}

impl PersonReference {
  pub fn noms(prisoner_number: impl Into<String>) -> Self {
    Self {
      identifiers: vec![PersonIdentifier {
        kind:  "NOMS".to_owned(),
        value: prisoner_number.into(),
      }],
    }
  }
}

/// The published payload.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DomainEvent {
  pub event_type:             String,
  pub additional_information: AdditionalInformation,
  #[serde(skip_serializing_if = "Option::is_none")]
  pub person_reference:       Option<PersonReference>,
  pub occurred_at:            DateTime<Utc>,
  pub description:            String,
  pub version:                u8,
}

impl DomainEvent {
  pub fn new(
    event: OutboundEvent,
    additional_information: AdditionalInformation,
    occurred_at: DateTime<Utc>,
  ) -> Self {
    let person_reference = additional_information
      .noms
      .as_deref()
      .map(PersonReference::noms);
    Self {
      event_type: event.event_type().to_owned(),
      additional_information,
      person_reference,
      occurred_at,
      description: event.description().to_owned(),
      version: 1,
    }
  }
}

// ─── Inbound ─────────────────────────────────────────────────────────────────

pub const PRISONER_RELEASED: &str = "prisoner-offender-search.prisoner.released";
pub const PRISONER_RECEIVED: &str = "prisoner-offender-search.prisoner.received";
pub const PRISONER_MERGED: &str = "prison-offender-events.prisoner.merged";

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PrisonerReleased {
  pub noms_number: String,
  pub prison_id:   String,
  #[serde(default)]
  pub reason:      Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PrisonerReceived {
  pub noms_number: String,
  pub prison_id:   String,
  #[serde(default)]
  pub reason:      Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PrisonerMerged {
  /// The surviving prisoner number.
  pub noms_number:         String,
  pub removed_noms_number: String,
  #[serde(default)]
  pub reason:              Option<String>,
}

/// A prisoner-state change reported by another system.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum InboundEvent {
  Released(PrisonerReleased),
  Received(PrisonerReceived),
  Merged(PrisonerMerged),
}

impl InboundEvent {
  pub fn noms_number(&self) -> &str {
    match self {
      Self::Released(e) => &e.noms_number,
      Self::Received(e) => &e.noms_number,
      Self::Merged(e) => &e.noms_number,
    }
  }
}

/// The envelope every inbound message arrives in.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct InboundEnvelope {
  pub event_type:             String,
  #[serde(default)]
  pub additional_information: serde_json::Value,
  #[serde(default)]
  pub occurred_at:            Option<DateTime<Utc>>,
}

impl InboundEnvelope {
  /// Decode the typed event. `Ok(None)` for event types this system does not
  /// subscribe to.
  pub fn decode(self) -> crate::Result<Option<InboundEvent>> {
    let info = self.additional_information;
    let event = match self.event_type.as_str() {
      PRISONER_RELEASED => InboundEvent::Released(serde_json::from_value(info)?),
      PRISONER_RECEIVED => InboundEvent::Received(serde_json::from_value(info)?),
      PRISONER_MERGED => InboundEvent::Merged(serde_json::from_value(info)?),
      _ => return Ok(None),
    };
    Ok(Some(event))
  }
}

#[cfg(test)]
mod tests {
  use chrono::TimeZone;

  use super::*;

  #[test]
  fn visit_event_carries_noms_person_reference() {
    let event = DomainEvent::new(
      OutboundEvent::VisitCreated,
      AdditionalInformation {
        identifier:        42,
        second_identifier: None,
        prison_code:       "MDI".into(),
        noms:              Some("A1234BC".into()),
        contact_id:        None,
        source:            Source::Dps,
      },
      Utc.timestamp_opt(0, 0).unwrap(),
    );

    let json = serde_json::to_value(&event).unwrap();
    assert_eq!(json["eventType"], "official-visits-api.visit.created");
    assert_eq!(json["additionalInformation"]["identifier"], 42);
    assert_eq!(json["additionalInformation"]["source"], "DPS");
    assert!(json["additionalInformation"].get("secondIdentifier").is_none());
    assert_eq!(json["personReference"]["identifiers"][0]["type"], "NOMS");
    assert_eq!(json["personReference"]["identifiers"][0]["value"], "A1234BC");
  }

  #[test]
  fn time_slot_event_has_no_person_reference() {
    let event = DomainEvent::new(
      OutboundEvent::TimeSlotCreated,
      AdditionalInformation {
        identifier:        1,
        second_identifier: None,
        prison_code:       "MDI".into(),
        noms:              None,
        contact_id:        None,
        source:            Source::Nomis,
      },
      Utc.timestamp_opt(0, 0).unwrap(),
    );
    assert!(event.person_reference.is_none());
    let json = serde_json::to_value(&event).unwrap();
    assert!(json.get("personReference").is_none());
  }

  #[test]
  fn merged_envelope_decodes_removed_number() {
    let envelope: InboundEnvelope = serde_json::from_value(serde_json::json!({
      "eventType": PRISONER_MERGED,
      "additionalInformation": {
        "nomsNumber": "A1111AA",
        "removedNomsNumber": "B2222BB",
        "reason": "MERGE"
      }
    }))
    .unwrap();

    let event = envelope.decode().unwrap().unwrap();
    assert_eq!(
      event,
      InboundEvent::Merged(PrisonerMerged {
        noms_number:         "A1111AA".into(),
        removed_noms_number: "B2222BB".into(),
        reason:              Some("MERGE".into()),
      })
    );
  }

  #[test]
  fn unsubscribed_event_types_decode_to_none() {
    let envelope: InboundEnvelope = serde_json::from_value(serde_json::json!({
      "eventType": "prisoner-offender-search.prisoner.alerts-updated",
      "additionalInformation": {}
    }))
    .unwrap();
    assert!(envelope.decode().unwrap().is_none());
  }

  #[test]
  fn released_event_missing_prison_is_an_error() {
    let envelope: InboundEnvelope = serde_json::from_value(serde_json::json!({
      "eventType": PRISONER_RELEASED,
      "additionalInformation": { "nomsNumber": "A1111AA" }
    }))
    .unwrap();
    assert!(envelope.decode().is_err());
  }
}
