//! Checks against the external systems of record.
//!
//! Each check has two layers: an inner one that returns the collected
//! messages (so several checks can run concurrently and be folded into one
//! report) and a public one that turns a non-empty report into
//! [`visita_core::Error::Validation`]. Lookup failures are never folded;
//! they abort with [`Error::Lookup`].

use std::{collections::HashSet, sync::Arc};

use tracing::Instrument as _;
use uuid::Uuid;
use visita_core::{
  ValidationErrors,
  ports::{
    ContactsLookup, ExternalQueries, Location, LocationsLookup, Prisoner, PrisonerSearch,
    UserDetails, UserLookup,
  },
};

use crate::{Error, Result};

/// Renders one category as a single message, or nothing when it is empty.
fn category(singular: &str, plural: &str, items: &[String]) -> Option<String> {
  match items {
    [] => None,
    [only] => Some(format!("{singular} [{only}]")),
    many => Some(format!("{plural} [{}]", many.join(", "))),
  }
}

/// Sort `requested` into the three location categories, keeping the order
/// they were requested in. `found` pairs each requested label with the
/// location it resolved to, if any.
fn location_report<'a>(
  prison_code: &str,
  found: impl IntoIterator<Item = (String, Option<&'a Location>)>,
) -> ValidationErrors {
  let mut missing = Vec::new();
  let mut elsewhere = Vec::new();
  let mut inactive = Vec::new();
  for (label, location) in found {
    match location {
      None => missing.push(label),
      Some(l) if l.prison_id != prison_code => elsewhere.push(label),
      Some(l) if !l.active => inactive.push(label),
      Some(_) => {}
    }
  }

  let mut errors = ValidationErrors::new();
  let messages = [
    category(
      "The following location was not found",
      "The following locations were not found",
      &missing,
    ),
    category(
      &format!("The following location is not at prison code {prison_code}"),
      &format!("The following locations are not at prison code {prison_code}"),
      &elsewhere,
    ),
    category(
      &format!("The following location is not active at prison code {prison_code}"),
      &format!("The following locations are not active at prison code {prison_code}"),
      &inactive,
    ),
  ];
  for message in messages.into_iter().flatten() {
    errors.push(message);
  }
  errors
}

fn not_found(label: &str) -> Error {
  visita_core::Error::Validation(ValidationErrors::single(format!(
    "The following location was not found [{label}]"
  )))
  .into()
}

/// The validation port over an [`ExternalQueries`] implementation.
pub struct ExternalValidation<Q> {
  queries: Arc<Q>,
  span:    tracing::Span,
}

impl<Q: ExternalQueries> ExternalValidation<Q> {
  pub fn new(queries: Arc<Q>, span: tracing::Span) -> Self { Self { queries, span } }

  // ── Prisoner ──────────────────────────────────────────────────────────────

  async fn prisoner_report(
    &self,
    prisoner_number: &str,
    prison_code: &str,
  ) -> Result<(Option<Prisoner>, ValidationErrors)> {
    let prisoner = self
      .queries
      .get_prisoner(prisoner_number)
      .await
      .map_err(Error::lookup)?
      .filter(|p| p.prison_id.as_deref() == Some(prison_code));

    let mut errors = ValidationErrors::new();
    if prisoner.is_none() {
      errors.push(format!(
        "Prisoner {prisoner_number} not found at prison {prison_code}"
      ));
    }
    Ok((prisoner, errors))
  }

  /// The prisoner, provided they are currently held at `prison_code`.
  pub async fn validate_prisoner_at_prison(
    &self,
    prisoner_number: &str,
    prison_code: &str,
  ) -> Result<Prisoner> {
    let (prisoner, errors) = self
      .prisoner_report(prisoner_number, prison_code)
      .instrument(tracing::debug_span!(
        parent: &self.span,
        "validate_prisoner",
        prisoner_number
      ))
      .await?;
    match prisoner {
      Some(p) => Ok(p),
      None => Err(Error::Domain(visita_core::Error::Validation(errors))),
    }
  }

  // ── Locations ─────────────────────────────────────────────────────────────

  async fn locations_report(
    &self,
    prison_code: &str,
    keys: &[String],
  ) -> Result<(Vec<Location>, ValidationErrors)> {
    // First occurrence wins so each key is looked up and reported once.
    let mut seen = HashSet::new();
    let keys: Vec<String> = keys.iter().filter(|key| seen.insert(*key)).cloned().collect();
    let found = self
      .queries
      .get_locations_by_keys(&keys)
      .await
      .map_err(Error::lookup)?;

    let errors = location_report(
      prison_code,
      keys
        .iter()
        .map(|key| (key.clone(), found.iter().find(|l| &l.key == key))),
    );
    let resolved = keys
      .iter()
      .filter_map(|key| found.iter().find(|l| &l.key == key).cloned())
      .collect();
    Ok((resolved, errors))
  }

  /// Every location in `keys`, each at `prison_code` and active. All
  /// problems are reported together.
  pub async fn validate_prison_locations(
    &self,
    prison_code: &str,
    keys: &[String],
  ) -> Result<Vec<Location>> {
    let (locations, errors) = self
      .locations_report(prison_code, keys)
      .instrument(tracing::debug_span!(
        parent: &self.span,
        "validate_locations",
        count = keys.len()
      ))
      .await?;
    errors.into_result()?;
    Ok(locations)
  }

  pub async fn validate_prison_location(&self, prison_code: &str, key: &str) -> Result<Location> {
    let mut locations = self
      .validate_prison_locations(prison_code, &[key.to_owned()])
      .await?;
    locations.pop().ok_or_else(|| not_found(key))
  }

  async fn location_id_report(
    &self,
    prison_code: &str,
    id: Uuid,
  ) -> Result<(Option<Location>, ValidationErrors)> {
    let location = self
      .queries
      .get_location_by_id(id)
      .await
      .map_err(Error::lookup)?;
    let errors = location_report(prison_code, [(id.to_string(), location.as_ref())]);
    Ok((location, errors))
  }

  /// The same three categories as [`Self::validate_prison_locations`], for a
  /// single location id.
  pub async fn validate_prison_location_id(
    &self,
    prison_code: &str,
    id: Uuid,
  ) -> Result<Location> {
    let (location, errors) = self
      .location_id_report(prison_code, id)
      .instrument(tracing::debug_span!(parent: &self.span, "validate_location_id", %id))
      .await?;
    errors.into_result()?;
    location.ok_or_else(|| not_found(&id.to_string()))
  }

  // ── Contacts ──────────────────────────────────────────────────────────────

  async fn contacts_report(
    &self,
    prisoner_number: &str,
    contact_ids: &[i64],
  ) -> Result<ValidationErrors> {
    if contact_ids.is_empty() {
      return Ok(ValidationErrors::new());
    }
    let approved = self
      .queries
      .get_approved_contacts(prisoner_number, None)
      .await
      .map_err(Error::lookup)?;

    let unapproved: Vec<String> = contact_ids
      .iter()
      .filter(|id| !approved.iter().any(|c| c.approved && c.contact_id == **id))
      .map(i64::to_string)
      .collect();

    let mut errors = ValidationErrors::new();
    if let Some(message) = category(
      &format!("The following contact is not approved for prisoner {prisoner_number}"),
      &format!("The following contacts are not approved for prisoner {prisoner_number}"),
      &unapproved,
    ) {
      errors.push(message);
    }
    Ok(errors)
  }

  pub async fn validate_approved_contacts(
    &self,
    prisoner_number: &str,
    contact_ids: &[i64],
  ) -> Result<()> {
    self
      .contacts_report(prisoner_number, contact_ids)
      .instrument(tracing::debug_span!(
        parent: &self.span,
        "validate_contacts",
        prisoner_number
      ))
      .await?
      .into_result()?;
    Ok(())
  }

  // ── Combined ──────────────────────────────────────────────────────────────

  /// Everything a new visit depends on outside this system, asked
  /// concurrently and reported as one batch.
  pub async fn validate_visit(
    &self,
    prisoner_number: &str,
    prison_code: &str,
    location_id: Uuid,
    contact_ids: &[i64],
  ) -> Result<()> {
    let (prisoner, location, contacts) = tokio::join!(
      self.prisoner_report(prisoner_number, prison_code),
      self.location_id_report(prison_code, location_id),
      self.contacts_report(prisoner_number, contact_ids),
    );

    let mut errors = prisoner?.1;
    errors.extend(location?.1);
    errors.extend(contacts?);
    if !errors.is_empty() {
      tracing::info!(parent: &self.span, %errors, "visit request failed validation");
    }
    errors.into_result()?;
    Ok(())
  }

  // ── Users ─────────────────────────────────────────────────────────────────

  pub async fn resolve_user(&self, username: &str) -> Result<UserDetails> {
    self
      .queries
      .get_user_details(username)
      .await
      .map_err(Error::lookup)?
      .ok_or_else(|| Error::UserNotFound(username.to_owned()))
  }
}

#[cfg(test)]
mod tests {
  use visita_clients::InMemoryQueries;
  use visita_core::{codes::RelationshipType, ports::ContactSummary};

  use super::*;

  fn location(key: &str, prison_id: &str, active: bool) -> Location {
    Location {
      id: Uuid::new_v4(),
      key: key.into(),
      prison_id: prison_id.into(),
      active,
      local_name: None,
    }
  }

  fn validation(queries: InMemoryQueries) -> ExternalValidation<InMemoryQueries> {
    ExternalValidation::new(Arc::new(queries), tracing::Span::none())
  }

  fn messages(err: Error) -> Vec<String> {
    match err {
      Error::Domain(visita_core::Error::Validation(errors)) => errors.messages().to_vec(),
      other => panic!("expected validation error, got {other:?}"),
    }
  }

  #[tokio::test]
  async fn location_at_another_prison_is_reported_alone() {
    let v = validation(
      InMemoryQueries::new()
        .with_location(location("MDI-A", "MDI", true))
        .with_location(location("WWI-B", "WWI", true)),
    );

    let err = v
      .validate_prison_locations("MDI", &["MDI-A".into(), "WWI-B".into()])
      .await
      .unwrap_err();
    assert_eq!(
      messages(err),
      ["The following location is not at prison code MDI [WWI-B]"]
    );
  }

  #[tokio::test]
  async fn unknown_keys_are_listed_in_supplied_order() {
    let v = validation(InMemoryQueries::new());
    let err = v
      .validate_prison_locations("MDI", &["ZZZ".into(), "AAA".into()])
      .await
      .unwrap_err();
    assert_eq!(messages(err), ["The following locations were not found [ZZZ, AAA]"]);
  }

  #[tokio::test]
  async fn repeated_keys_are_reported_and_returned_once() {
    let v = validation(InMemoryQueries::new().with_location(location("MDI-1", "MDI", true)));
    let err = v
      .validate_prison_locations("MDI", &["X".into(), "MDI-1".into(), "X".into()])
      .await
      .unwrap_err();
    assert_eq!(messages(err), ["The following location was not found [X]"]);

    let found = v
      .validate_prison_locations("MDI", &["MDI-1".into(), "MDI-1".into()])
      .await
      .unwrap();
    assert_eq!(found.len(), 1);
  }

  #[tokio::test]
  async fn all_three_categories_are_reported_without_failing_fast() {
    let v = validation(
      InMemoryQueries::new()
        .with_location(location("MDI-OLD", "MDI", false))
        .with_location(location("BMI-1", "BMI", true))
        .with_location(location("MDI-OK", "MDI", true)),
    );

    let err = v
      .validate_prison_locations(
        "MDI",
        &["MDI-OLD".into(), "NOPE".into(), "BMI-1".into(), "MDI-OK".into()],
      )
      .await
      .unwrap_err();
    assert_eq!(
      messages(err),
      [
        "The following location was not found [NOPE]",
        "The following location is not at prison code MDI [BMI-1]",
        "The following location is not active at prison code MDI [MDI-OLD]",
      ]
    );
  }

  #[tokio::test]
  async fn valid_locations_come_back_in_request_order() {
    let v = validation(
      InMemoryQueries::new()
        .with_location(location("MDI-1", "MDI", true))
        .with_location(location("MDI-2", "MDI", true)),
    );
    let found = v
      .validate_prison_locations("MDI", &["MDI-2".into(), "MDI-1".into()])
      .await
      .unwrap();
    let keys: Vec<_> = found.into_iter().map(|l| l.key).collect();
    assert_eq!(keys, ["MDI-2", "MDI-1"]);

    let single = v.validate_prison_location("MDI", "MDI-1").await.unwrap();
    assert_eq!(single.key, "MDI-1");
  }

  #[tokio::test]
  async fn prisoner_held_elsewhere_is_not_found() {
    let v = validation(InMemoryQueries::new().with_prisoner(Prisoner {
      prisoner_number: "123456".into(),
      prison_id:       Some("WWI".into()),
      first_name:      "Sam".into(),
      last_name:       "Smith".into(),
    }));

    let err = v.validate_prisoner_at_prison("123456", "BMI").await.unwrap_err();
    assert_eq!(messages(err), ["Prisoner 123456 not found at prison BMI"]);
    assert!(v.validate_prisoner_at_prison("123456", "WWI").await.is_ok());
  }

  #[tokio::test]
  async fn unapproved_contacts_are_aggregated() {
    let v = validation(InMemoryQueries::new().with_contact(
      "A1234BC",
      ContactSummary {
        contact_id:          10,
        prisoner_contact_id: 100,
        first_name:          "Jo".into(),
        last_name:           "Bloggs".into(),
        relationship_type:   RelationshipType::Official,
        relationship_code:   "SOL".into(),
        approved:            true,
      },
    ));

    assert!(v.validate_approved_contacts("A1234BC", &[10]).await.is_ok());
    let err = v
      .validate_approved_contacts("A1234BC", &[11, 10, 12])
      .await
      .unwrap_err();
    assert_eq!(
      messages(err),
      ["The following contacts are not approved for prisoner A1234BC [11, 12]"]
    );
  }

  #[tokio::test]
  async fn combined_visit_check_reports_every_problem() {
    let inactive = location("MDI-VR", "MDI", false);
    let id = inactive.id;
    let v = validation(InMemoryQueries::new().with_location(inactive));

    let err = v.validate_visit("A1234BC", "MDI", id, &[99]).await.unwrap_err();
    assert_eq!(
      messages(err),
      [
        "Prisoner A1234BC not found at prison MDI".to_owned(),
        format!("The following location is not active at prison code MDI [{id}]"),
        "The following contact is not approved for prisoner A1234BC [99]".to_owned(),
      ]
    );
  }

  #[tokio::test]
  async fn lookup_failure_is_not_a_validation_error() {
    let v = validation(InMemoryQueries::new().failing());
    let err = v.validate_prisoner_at_prison("A1234BC", "MDI").await.unwrap_err();
    assert!(matches!(err, Error::Lookup(_)));
  }

  #[tokio::test]
  async fn unknown_user_is_rejected_by_name() {
    let v = validation(InMemoryQueries::new());
    let err = v.resolve_user("NOBODY").await.unwrap_err();
    assert_eq!(err.to_string(), "User NOBODY not found");
  }
}
