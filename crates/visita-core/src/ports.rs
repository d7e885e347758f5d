//! Read-only query ports onto the external systems of record.
//!
//! Every lookup distinguishes "not found" (`Ok(None)` / an empty list) from a
//! failure to ask (`Err`). Callers must never treat an error as not found.

use std::future::Future;

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::codes::RelationshipType;

// ─── Records ─────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Prisoner {
  pub prisoner_number: String,
  /// Where the prisoner is currently held; `None` when released.
  pub prison_id:       Option<String>,
  pub first_name:      String,
  pub last_name:       String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Location {
  pub id:         Uuid,
  /// Hierarchical key such as `MDI-1-1-001`.
  pub key:        String,
  pub prison_id:  String,
  pub active:     bool,
  #[serde(default)]
  pub local_name: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ContactSummary {
  pub contact_id:          i64,
  pub prisoner_contact_id: i64,
  pub first_name:          String,
  pub last_name:           String,
  pub relationship_type:   RelationshipType,
  pub relationship_code:   String,
  pub approved:            bool,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UserDetails {
  pub username:            String,
  pub name:                String,
  #[serde(default)]
  pub active_case_load_id: Option<String>,
}

// ─── Ports ───────────────────────────────────────────────────────────────────

pub trait PrisonerSearch: Send + Sync {
  type Error: std::error::Error + Send + Sync + 'static;

  fn get_prisoner<'a>(
    &'a self,
    prisoner_number: &'a str,
  ) -> impl Future<Output = Result<Option<Prisoner>, Self::Error>> + Send + 'a;
}

pub trait LocationsLookup: Send + Sync {
  type Error: std::error::Error + Send + Sync + 'static;

  fn get_location_by_id(
    &self,
    id: Uuid,
  ) -> impl Future<Output = Result<Option<Location>, Self::Error>> + Send + '_;

  fn get_location_by_key<'a>(
    &'a self,
    key: &'a str,
  ) -> impl Future<Output = Result<Option<Location>, Self::Error>> + Send + 'a;

  /// Fetch every location matching `keys` in one call. Unknown keys are
  /// simply absent from the result; order is not significant.
  fn get_locations_by_keys<'a>(
    &'a self,
    keys: &'a [String],
  ) -> impl Future<Output = Result<Vec<Location>, Self::Error>> + Send + 'a;
}

pub trait ContactsLookup: Send + Sync {
  type Error: std::error::Error + Send + Sync + 'static;

  fn get_approved_contacts<'a>(
    &'a self,
    prisoner_number: &'a str,
    relationship_type: Option<RelationshipType>,
  ) -> impl Future<Output = Result<Vec<ContactSummary>, Self::Error>> + Send + 'a;
}

pub trait UserLookup: Send + Sync {
  type Error: std::error::Error + Send + Sync + 'static;

  fn get_user_details<'a>(
    &'a self,
    username: &'a str,
  ) -> impl Future<Output = Result<Option<UserDetails>, Self::Error>> + Send + 'a;
}

/// Every port the engine consults, implemented by one value.
pub trait ExternalQueries:
  PrisonerSearch + LocationsLookup + ContactsLookup + UserLookup
{
}

impl<T> ExternalQueries for T where
  T: PrisonerSearch + LocationsLookup + ContactsLookup + UserLookup
{
}
