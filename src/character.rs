// Character Entity - the candidate record subject to pairwise voting
//
// Identity: character_id (assigned by the directory, never changes)
// Classification: race, bloodline, gender (set once at creation)
// Tallies: wins, losses, reports (only ever grow until the record is deleted)

use chrono::{DateTime, Utc};
use rusqlite::types::{FromSql, FromSqlError, FromSqlResult, ToSql, ToSqlOutput, ValueRef};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::error::RankingError;

/// Externally assigned character identifier
pub type CharacterId = i64;

/// A character is deleted once its report count goes above this
pub const REPORT_THRESHOLD: u32 = 4;

/// Store-level cap for every leaderboard query
pub const LEADERBOARD_LIMIT: usize = 100;

/// Races always present in the stats view, even with a zero count
pub const KNOWN_RACES: [&str; 4] = ["Amarr", "Caldari", "Gallente", "Minmatar"];

// ============================================================================
// GENDER
// ============================================================================

/// Pairing category. Two characters are only ever shown against each other
/// when they share a gender.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum Gender {
    Female,
    Male,
}

impl Gender {
    pub const ALL: [Gender; 2] = [Gender::Female, Gender::Male];

    pub fn as_str(&self) -> &'static str {
        match self {
            Gender::Female => "Female",
            Gender::Male => "Male",
        }
    }

    pub fn opposite(&self) -> Gender {
        match self {
            Gender::Female => Gender::Male,
            Gender::Male => Gender::Female,
        }
    }
}

impl fmt::Display for Gender {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Gender {
    type Err = RankingError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "female" => Ok(Gender::Female),
            "male" => Ok(Gender::Male),
            other => Err(RankingError::InvalidInput(format!(
                "Unknown gender '{}', expected Female or Male.",
                other
            ))),
        }
    }
}

impl ToSql for Gender {
    fn to_sql(&self) -> rusqlite::Result<ToSqlOutput<'_>> {
        Ok(ToSqlOutput::from(self.as_str()))
    }
}

impl FromSql for Gender {
    fn column_result(value: ValueRef<'_>) -> FromSqlResult<Self> {
        value
            .as_str()?
            .parse()
            .map_err(|_| FromSqlError::InvalidType)
    }
}

// ============================================================================
// CHARACTER ENTITY
// ============================================================================

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Character {
    pub character_id: CharacterId,
    pub name: String,
    pub race: String,
    pub bloodline: String,
    pub gender: Gender,

    pub wins: u32,
    pub losses: u32,
    pub reports: u32,

    /// Already shown in a vote during the current epoch
    pub voted: bool,

    /// Random ordering key, re-drawn after each vote
    #[serde(skip)]
    pub sampling_key: f64,

    pub created_at: DateTime<Utc>,
}

impl Character {
    /// Win ratio used for the top leaderboard. A character with no games
    /// ranks as 0.
    pub fn win_ratio(&self) -> f64 {
        let games = self.wins as f64 + self.losses as f64;
        if games == 0.0 {
            0.0
        } else {
            self.wins as f64 / games
        }
    }
}

/// Fresh sampling key in [0, 1)
pub fn random_sampling_key() -> f64 {
    rand::random::<f64>()
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;

    pub(crate) fn sample_character(id: CharacterId, wins: u32, losses: u32) -> Character {
        Character {
            character_id: id,
            name: format!("Pilot {}", id),
            race: "Caldari".to_string(),
            bloodline: "Deteis".to_string(),
            gender: Gender::Female,
            wins,
            losses,
            reports: 0,
            voted: false,
            sampling_key: 0.5,
            created_at: Utc::now(),
        }
    }

    #[test]
    fn test_gender_parse_is_case_insensitive() {
        assert_eq!("female".parse::<Gender>().unwrap(), Gender::Female);
        assert_eq!(" MALE ".parse::<Gender>().unwrap(), Gender::Male);
        assert!(matches!(
            "other".parse::<Gender>(),
            Err(RankingError::InvalidInput(_))
        ));
    }

    #[test]
    fn test_gender_opposite() {
        assert_eq!(Gender::Female.opposite(), Gender::Male);
        assert_eq!(Gender::Male.opposite(), Gender::Female);
    }

    #[test]
    fn test_win_ratio() {
        assert_eq!(sample_character(1, 9, 1).win_ratio(), 0.9);
        assert_eq!(sample_character(2, 2, 0).win_ratio(), 1.0);
        assert_eq!(sample_character(3, 0, 0).win_ratio(), 0.0);
        assert_eq!(sample_character(4, 0, 5).win_ratio(), 0.0);
    }

    #[test]
    fn test_sampling_key_is_never_serialized() {
        let character = sample_character(7, 1, 1);
        let json = serde_json::to_value(&character).unwrap();

        assert!(json.get("sampling_key").is_none());
        assert_eq!(json["gender"], "Female");
        assert_eq!(json["character_id"], 7);
    }
}
