//! `reqwest` clients for the prisoner search, locations, contacts and users
//! services.

use std::time::Duration;

use reqwest::{Client, RequestBuilder, StatusCode, Url};
use serde::{Deserialize, de::DeserializeOwned};
use uuid::Uuid;
use visita_core::{
  codes::RelationshipType,
  ports::{
    ContactSummary, ContactsLookup, Location, LocationsLookup, Prisoner, PrisonerSearch,
    UserDetails, UserLookup,
  },
};

use crate::{ClientError, Result};

fn default_timeout_secs() -> u64 { 10 }

/// Base URLs of the systems of record.
#[derive(Debug, Clone, Deserialize)]
pub struct LookupConfig {
  pub prisoner_search_url: String,
  pub locations_url:       String,
  pub contacts_url:        String,
  pub users_url:           String,
  /// Applies to every request; a call that outlives it is a lookup failure.
  #[serde(default = "default_timeout_secs")]
  pub timeout_secs:        u64,
}

/// One value implementing every query port.
///
/// Cheap to clone; the inner [`reqwest::Client`] is `Arc`-based.
#[derive(Clone)]
pub struct HttpQueries {
  client:          Client,
  prisoner_search: Url,
  locations:       Url,
  contacts:        Url,
  users:           Url,
}

fn base_url(raw: &str, endpoint: &'static str) -> Result<Url> {
  Url::parse(raw)
    .ok()
    .filter(|url| !url.cannot_be_a_base())
    .ok_or_else(|| ClientError::BaseUrl { endpoint, url: raw.to_owned() })
}

/// `base` with `segments` appended, each percent-encoded as one segment.
fn url(base: &Url, segments: &[&str]) -> Url {
  let mut url = base.clone();
  if let Ok(mut path) = url.path_segments_mut() {
    path.pop_if_empty().extend(segments);
  }
  url
}

impl HttpQueries {
  pub fn new(config: LookupConfig) -> Result<Self> {
    let client = Client::builder()
      .timeout(Duration::from_secs(config.timeout_secs))
      .build()
      .map_err(ClientError::Build)?;
    Ok(Self {
      client,
      prisoner_search: base_url(&config.prisoner_search_url, "prisoner search")?,
      locations: base_url(&config.locations_url, "locations")?,
      contacts: base_url(&config.contacts_url, "contacts")?,
      users: base_url(&config.users_url, "users")?,
    })
  }

  async fn send(&self, request: RequestBuilder, endpoint: &str) -> Result<reqwest::Response> {
    request.send().await.map_err(|source| ClientError::Http {
      endpoint: endpoint.to_owned(),
      source,
    })
  }

  async fn decode<T: DeserializeOwned>(resp: reqwest::Response, endpoint: &str) -> Result<T> {
    let status = resp.status();
    if !status.is_success() {
      tracing::warn!(endpoint, %status, "lookup failed");
      return Err(ClientError::Status {
        endpoint: endpoint.to_owned(),
        status:   status.as_u16(),
      });
    }
    resp.json().await.map_err(|source| ClientError::Deserialization {
      endpoint: endpoint.to_owned(),
      source,
    })
  }

  /// `GET` a single record; `404` means it does not exist.
  async fn get_optional<T: DeserializeOwned>(&self, url: Url, endpoint: &str) -> Result<Option<T>> {
    let resp = self.send(self.client.get(url.clone()), endpoint).await?;
    if resp.status() == StatusCode::NOT_FOUND {
      tracing::debug!(endpoint, path = url.path(), "not found");
      return Ok(None);
    }
    Self::decode(resp, endpoint).await.map(Some)
  }
}

// ─── Ports ───────────────────────────────────────────────────────────────────

impl PrisonerSearch for HttpQueries {
  type Error = ClientError;

  /// `GET /prisoner/{prisoner_number}`
  async fn get_prisoner<'a>(&'a self, prisoner_number: &'a str) -> Result<Option<Prisoner>> {
    self
      .get_optional(url(&self.prisoner_search, &["prisoner", prisoner_number]), "prisoner search")
      .await
  }
}

impl LocationsLookup for HttpQueries {
  type Error = ClientError;

  /// `GET /locations/{id}`
  async fn get_location_by_id(&self, id: Uuid) -> Result<Option<Location>> {
    let id = id.to_string();
    self
      .get_optional(url(&self.locations, &["locations", &id]), "locations")
      .await
  }

  /// `GET /locations/key/{key}`
  async fn get_location_by_key<'a>(&'a self, key: &'a str) -> Result<Option<Location>> {
    self
      .get_optional(url(&self.locations, &["locations", "key", key]), "locations")
      .await
  }

  /// `POST /locations/keys` with the keys as a JSON array.
  async fn get_locations_by_keys<'a>(&'a self, keys: &'a [String]) -> Result<Vec<Location>> {
    let request = self
      .client
      .post(url(&self.locations, &["locations", "keys"]))
      .json(keys);
    let resp = self.send(request, "locations").await?;
    Self::decode(resp, "locations").await
  }
}

impl ContactsLookup for HttpQueries {
  type Error = ClientError;

  /// `GET /prisoner/{prisoner_number}/contact?approved=true[&relationshipType=..]`
  async fn get_approved_contacts<'a>(
    &'a self,
    prisoner_number: &'a str,
    relationship_type: Option<RelationshipType>,
  ) -> Result<Vec<ContactSummary>> {
    let mut query = vec![("approved", "true")];
    if let Some(kind) = &relationship_type {
      query.push(("relationshipType", kind.as_ref()));
    }
    let request = self
      .client
      .get(url(&self.contacts, &["prisoner", prisoner_number, "contact"]))
      .query(&query);
    let resp = self.send(request, "contacts").await?;
    if resp.status() == StatusCode::NOT_FOUND {
      return Ok(Vec::new());
    }
    Self::decode(resp, "contacts").await
  }
}

impl UserLookup for HttpQueries {
  type Error = ClientError;

  /// `GET /users/{username}`
  async fn get_user_details<'a>(&'a self, username: &'a str) -> Result<Option<UserDetails>> {
    self
      .get_optional(url(&self.users, &["users", username]), "users")
      .await
  }
}
