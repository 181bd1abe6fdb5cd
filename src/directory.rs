// Directory Lookup Adapter - resolves a typed-in name to a canonical character
//
// Two calls, always in sequence: name -> id, then id -> profile.
// "Not found" is a normal answer (Ok(None)); anything else that goes wrong is
// a DirectoryError.

use async_trait::async_trait;
use reqwest::{Client, StatusCode};
use serde::Deserialize;
use std::time::Duration;
use thiserror::Error;
use tracing::warn;

use crate::character::CharacterId;

#[derive(Debug, Error)]
pub enum DirectoryError {
    #[error("lookup timed out")]
    Timeout,

    #[error("transport error: {0}")]
    Transport(String),

    #[error("unexpected status {0}")]
    Status(u16),

    #[error("unparseable response: {0}")]
    Malformed(String),
}

impl From<reqwest::Error> for DirectoryError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_timeout() {
            DirectoryError::Timeout
        } else if err.is_decode() {
            DirectoryError::Malformed(err.to_string())
        } else {
            DirectoryError::Transport(err.to_string())
        }
    }
}

/// Canonical attributes of a resolved character
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DirectoryProfile {
    pub name: String,
    pub race: String,
    pub bloodline: String,
}

#[async_trait]
pub trait Directory: Send + Sync {
    async fn resolve_id_by_name(&self, name: &str) -> Result<Option<CharacterId>, DirectoryError>;

    async fn resolve_attributes_by_id(
        &self,
        character_id: CharacterId,
    ) -> Result<Option<DirectoryProfile>, DirectoryError>;
}

// ============================================================================
// STATIC TABLES
// ============================================================================

pub const UNKNOWN_ATTRIBUTE: &str = "Unknown";

pub fn race_name(race_id: i64) -> Option<&'static str> {
    match race_id {
        1 => Some("Caldari"),
        2 => Some("Minmatar"),
        4 => Some("Amarr"),
        8 => Some("Gallente"),
        _ => None,
    }
}

pub fn bloodline_name(bloodline_id: i64) -> Option<&'static str> {
    match bloodline_id {
        1 => Some("Deteis"),
        2 => Some("Civire"),
        3 => Some("Sebiestor"),
        4 => Some("Brutor"),
        5 => Some("Amarr"),
        6 => Some("Ni-Kunni"),
        7 => Some("Gallente"),
        8 => Some("Intaki"),
        11 => Some("Achura"),
        12 => Some("Jin-Mei"),
        13 => Some("Khanid"),
        14 => Some("Vherokior"),
        _ => None,
    }
}

// ============================================================================
// WIRE FORMAT
// ============================================================================

#[derive(Debug, Deserialize)]
struct NamedId {
    id: CharacterId,
    name: String,
}

#[derive(Debug, Deserialize)]
struct IdsResponse {
    #[serde(default)]
    characters: Vec<NamedId>,
}

impl IdsResponse {
    /// Prefer the entry whose name matches exactly, ignoring case
    fn character_id_for(&self, name: &str) -> Option<CharacterId> {
        self.characters
            .iter()
            .find(|c| c.name.eq_ignore_ascii_case(name))
            .or_else(|| self.characters.first())
            .map(|c| c.id)
    }
}

#[derive(Debug, Deserialize)]
struct CharacterInfo {
    name: String,
    race_id: i64,
    bloodline_id: i64,
}

impl CharacterInfo {
    /// Ids missing from the static tables are stored as `UNKNOWN_ATTRIBUTE`
    fn into_profile(self) -> DirectoryProfile {
        let race = race_name(self.race_id).unwrap_or_else(|| {
            warn!(race_id = self.race_id, name = %self.name, "unmapped race id");
            UNKNOWN_ATTRIBUTE
        });
        let bloodline = bloodline_name(self.bloodline_id).unwrap_or_else(|| {
            warn!(bloodline_id = self.bloodline_id, name = %self.name, "unmapped bloodline id");
            UNKNOWN_ATTRIBUTE
        });

        DirectoryProfile {
            name: self.name,
            race: race.to_string(),
            bloodline: bloodline.to_string(),
        }
    }
}

// ============================================================================
// HTTP DIRECTORY
// ============================================================================

/// Directory backed by the EVE Swagger Interface
pub struct HttpDirectory {
    client: Client,
    base_url: String,
}

impl HttpDirectory {
    pub fn new(base_url: &str, timeout: Duration) -> Result<Self, DirectoryError> {
        let client = Client::builder()
            .timeout(timeout)
            .user_agent(format!("character-ranking/{}", crate::VERSION))
            .build()?;

        Ok(Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
        })
    }
}

#[async_trait]
impl Directory for HttpDirectory {
    async fn resolve_id_by_name(&self, name: &str) -> Result<Option<CharacterId>, DirectoryError> {
        let response = self
            .client
            .post(format!("{}/universe/ids/", self.base_url))
            .json(&[name])
            .send()
            .await?;

        match response.status() {
            StatusCode::NOT_FOUND => return Ok(None),
            status if !status.is_success() => return Err(DirectoryError::Status(status.as_u16())),
            _ => {}
        }

        let ids: IdsResponse = response.json().await?;
        Ok(ids.character_id_for(name))
    }

    async fn resolve_attributes_by_id(
        &self,
        character_id: CharacterId,
    ) -> Result<Option<DirectoryProfile>, DirectoryError> {
        let response = self
            .client
            .get(format!("{}/characters/{}/", self.base_url, character_id))
            .send()
            .await?;

        match response.status() {
            StatusCode::NOT_FOUND => return Ok(None),
            status if !status.is_success() => return Err(DirectoryError::Status(status.as_u16())),
            _ => {}
        }

        let info: CharacterInfo = response.json().await?;
        Ok(Some(info.into_profile()))
    }
}
