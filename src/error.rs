// Error taxonomy shared by every ranking operation

use thiserror::Error;

use crate::directory::DirectoryError;

#[derive(Debug, Error)]
pub enum RankingError {
    /// Malformed, missing or contradictory request fields
    #[error("{0}")]
    InvalidInput(String),

    /// Referenced character or external identity is absent
    #[error("{0}")]
    NotFound(String),

    /// Duplicate character creation
    #[error("{0}")]
    Conflict(String),

    /// Directory lookup unreachable, timed out or returned unparseable data
    #[error("Directory lookup failed: {0}")]
    Upstream(String),

    /// Persistence layer error. Never shown verbatim to clients.
    #[error("Store failure: {0}")]
    Store(String),
}

impl RankingError {
    pub fn character_not_found() -> Self {
        RankingError::NotFound("Character not found.".to_string())
    }
}

impl From<rusqlite::Error> for RankingError {
    fn from(err: rusqlite::Error) -> Self {
        RankingError::Store(err.to_string())
    }
}

impl From<DirectoryError> for RankingError {
    fn from(err: DirectoryError) -> Self {
        RankingError::Upstream(err.to_string())
    }
}

pub type RankingResult<T> = Result<T, RankingError>;
