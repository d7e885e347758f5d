//! A fixed, in-process directory answering every query port.

use std::collections::HashMap;

use serde::Deserialize;
use uuid::Uuid;
use visita_core::{
  codes::RelationshipType,
  ports::{
    ContactSummary, ContactsLookup, Location, LocationsLookup, Prisoner, PrisonerSearch,
    UserDetails, UserLookup,
  },
};

use crate::{ClientError, Result};

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DirectoryContact {
  pub prisoner_number: String,
  #[serde(flatten)]
  pub contact:         ContactSummary,
}

/// Seed data for [`InMemoryQueries`], usually read from configuration.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct Directory {
  pub prisoners: Vec<Prisoner>,
  pub locations: Vec<Location>,
  pub contacts:  Vec<DirectoryContact>,
  pub users:     Vec<UserDetails>,
}

#[derive(Debug, Clone, Default)]
pub struct InMemoryQueries {
  prisoners: HashMap<String, Prisoner>,
  locations: Vec<Location>,
  contacts:  HashMap<String, Vec<ContactSummary>>,
  users:     HashMap<String, UserDetails>,
  failing:   bool,
}

impl InMemoryQueries {
  pub fn new() -> Self { Self::default() }

  pub fn from_directory(directory: Directory) -> Self {
    let mut queries = Self::new();
    for prisoner in directory.prisoners {
      queries = queries.with_prisoner(prisoner);
    }
    for location in directory.locations {
      queries = queries.with_location(location);
    }
    for entry in directory.contacts {
      queries = queries.with_contact(&entry.prisoner_number, entry.contact);
    }
    for user in directory.users {
      queries = queries.with_user(user);
    }
    queries
  }

  pub fn with_prisoner(mut self, prisoner: Prisoner) -> Self {
    self.prisoners.insert(prisoner.prisoner_number.clone(), prisoner);
    self
  }

  pub fn with_location(mut self, location: Location) -> Self {
    self.locations.push(location);
    self
  }

  pub fn with_contact(mut self, prisoner_number: &str, contact: ContactSummary) -> Self {
    self
      .contacts
      .entry(prisoner_number.to_owned())
      .or_default()
      .push(contact);
    self
  }

  pub fn with_user(mut self, user: UserDetails) -> Self {
    self.users.insert(user.username.clone(), user);
    self
  }

  /// Every lookup fails as if the service were down.
  pub fn failing(mut self) -> Self {
    self.failing = true;
    self
  }

  fn check(&self, service: &'static str) -> Result<()> {
    if self.failing { Err(ClientError::Unavailable(service)) } else { Ok(()) }
  }
}

impl PrisonerSearch for InMemoryQueries {
  type Error = ClientError;

  async fn get_prisoner<'a>(&'a self, prisoner_number: &'a str) -> Result<Option<Prisoner>> {
    self.check("prisoner search")?;
    Ok(self.prisoners.get(prisoner_number).cloned())
  }
}

impl LocationsLookup for InMemoryQueries {
  type Error = ClientError;

  async fn get_location_by_id(&self, id: Uuid) -> Result<Option<Location>> {
    self.check("locations")?;
    Ok(self.locations.iter().find(|l| l.id == id).cloned())
  }

  async fn get_location_by_key<'a>(&'a self, key: &'a str) -> Result<Option<Location>> {
    self.check("locations")?;
    Ok(self.locations.iter().find(|l| l.key == key).cloned())
  }

  async fn get_locations_by_keys<'a>(&'a self, keys: &'a [String]) -> Result<Vec<Location>> {
    self.check("locations")?;
    Ok(
      self
        .locations
        .iter()
        .filter(|l| keys.contains(&l.key))
        .cloned()
        .collect(),
    )
  }
}

impl ContactsLookup for InMemoryQueries {
  type Error = ClientError;

  async fn get_approved_contacts<'a>(
    &'a self,
    prisoner_number: &'a str,
    relationship_type: Option<RelationshipType>,
  ) -> Result<Vec<ContactSummary>> {
    self.check("contacts")?;
    Ok(
      self
        .contacts
        .get(prisoner_number)
        .into_iter()
        .flatten()
        .filter(|c| c.approved)
        .filter(|c| relationship_type.is_none_or(|kind| c.relationship_type == kind))
        .cloned()
        .collect(),
    )
  }
}

impl UserLookup for InMemoryQueries {
  type Error = ClientError;

  async fn get_user_details<'a>(&'a self, username: &'a str) -> Result<Option<UserDetails>> {
    self.check("users")?;
    Ok(self.users.get(username).cloned())
  }
}
