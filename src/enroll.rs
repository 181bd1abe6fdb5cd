// Entity Creation - resolve a name through the directory and insert it
//
// Nothing is written until both directory calls have succeeded, so a timeout
// or transport failure never leaves a half-created character behind.

use chrono::Utc;
use std::future::Future;
use std::time::Duration;
use tracing::{info, warn};

use crate::character::{random_sampling_key, Character, Gender};
use crate::directory::{Directory, DirectoryError};
use crate::error::{RankingError, RankingResult};
use crate::store::Store;

#[derive(Debug, Clone, Default, PartialEq, Eq, serde::Deserialize)]
pub struct CreateRequest {
    pub name: Option<String>,
    pub gender: Option<String>,
}

impl CreateRequest {
    pub fn validate(&self) -> RankingResult<(String, Gender)> {
        let name = self
            .name
            .as_deref()
            .map(str::trim)
            .filter(|name| !name.is_empty())
            .ok_or_else(|| RankingError::InvalidInput("A character name is required.".to_string()))?;

        let gender = self
            .gender
            .as_deref()
            .ok_or_else(|| RankingError::InvalidInput("A gender is required.".to_string()))?
            .parse()?;

        Ok((name.to_string(), gender))
    }
}

fn not_a_citizen(name: &str) -> RankingError {
    RankingError::NotFound(format!("{} is not a registered citizen of New Eden.", name))
}

/// Await one directory call, bounded by `limit`
async fn bounded<T, F>(limit: Duration, call: F) -> Result<T, DirectoryError>
where
    F: Future<Output = Result<T, DirectoryError>>,
{
    tokio::time::timeout(limit, call)
        .await
        .unwrap_or(Err(DirectoryError::Timeout))
}

pub async fn create_character(
    store: &Store,
    directory: &dyn Directory,
    lookup_timeout: Duration,
    request: &CreateRequest,
) -> RankingResult<Character> {
    let (name, gender) = request.validate()?;

    let character_id = bounded(lookup_timeout, directory.resolve_id_by_name(&name))
        .await
        .map_err(|e| {
            warn!(%name, error = %e, "name lookup failed");
            RankingError::from(e)
        })?
        .ok_or_else(|| not_a_citizen(&name))?;

    if let Some(existing) = store.get(character_id).await? {
        return Err(RankingError::Conflict(format!(
            "{} is already in the database.",
            existing.name
        )));
    }

    let profile = bounded(lookup_timeout, directory.resolve_attributes_by_id(character_id))
        .await
        .map_err(|e| {
            warn!(character_id, error = %e, "profile lookup failed");
            RankingError::from(e)
        })?
        .ok_or_else(|| not_a_citizen(&name))?;

    let character = Character {
        character_id,
        name: profile.name,
        race: profile.race,
        bloodline: profile.bloodline,
        gender,
        wins: 0,
        losses: 0,
        reports: 0,
        voted: false,
        sampling_key: random_sampling_key(),
        created_at: Utc::now(),
    };

    if !store.insert(character.clone()).await? {
        // Someone else created the same character between our check and insert
        return Err(RankingError::Conflict(format!(
            "{} is already in the database.",
            character.name
        )));
    }

    info!(character_id, name = %character.name, "character added");
    Ok(character)
}
