// Vote Processor - applies the outcome of one pairwise comparison
//
// A vote either lands on both characters or on neither. Votes that arrive
// after either character was already resolved this epoch are accepted and
// ignored, which is what keeps racing duplicate submissions from counting
// twice.

use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::character::{random_sampling_key, CharacterId};
use crate::error::{RankingError, RankingResult};
use crate::store::Store;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
pub struct VoteRequest {
    pub winner: Option<CharacterId>,
    pub loser: Option<CharacterId>,
}

/// Result of the conditional store update
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum VoteApplication {
    Applied,
    /// At least one side was no longer unvoted; nothing was written
    Skipped,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum VoteOutcome {
    Applied,
    AlreadyResolved,
}

impl VoteRequest {
    /// Both ids present and different
    pub fn validate(&self) -> RankingResult<(CharacterId, CharacterId)> {
        let (winner, loser) = match (self.winner, self.loser) {
            (Some(winner), Some(loser)) => (winner, loser),
            _ => {
                return Err(RankingError::InvalidInput(
                    "Voting requires two characters.".to_string(),
                ))
            }
        };

        if winner == loser {
            return Err(RankingError::InvalidInput(
                "Cannot vote for and against the same character.".to_string(),
            ));
        }

        Ok((winner, loser))
    }
}

pub async fn submit_vote(store: &Store, request: VoteRequest) -> RankingResult<VoteOutcome> {
    let (winner_id, loser_id) = request.validate()?;

    let (winner, loser) = tokio::try_join!(store.get(winner_id), store.get(loser_id))?;

    let (winner, loser) = match (winner, loser) {
        (Some(winner), Some(loser)) => (winner, loser),
        _ => {
            return Err(RankingError::NotFound(
                "One of the characters no longer exists.".to_string(),
            ))
        }
    };

    if winner.voted || loser.voted {
        debug!(winner = winner_id, loser = loser_id, "vote ignored, pair already resolved");
        return Ok(VoteOutcome::AlreadyResolved);
    }

    let application = store
        .apply_vote(winner_id, loser_id, random_sampling_key(), random_sampling_key())
        .await?;

    match application {
        VoteApplication::Applied => {
            info!(winner = winner_id, loser = loser_id, "vote recorded");
            Ok(VoteOutcome::Applied)
        }
        VoteApplication::Skipped => {
            debug!(winner = winner_id, loser = loser_id, "vote lost a race, nothing applied");
            Ok(VoteOutcome::AlreadyResolved)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::character::tests::sample_character;

    async fn seeded(ids: &[CharacterId]) -> Store {
        let store = Store::open_in_memory().unwrap();
        for &id in ids {
            store.insert(sample_character(id, 0, 0)).await.unwrap();
        }
        store
    }

    fn vote(winner: CharacterId, loser: CharacterId) -> VoteRequest {
        VoteRequest {
            winner: Some(winner),
            loser: Some(loser),
        }
    }

    #[test]
    fn test_validate_rejects_missing_and_equal_ids() {
        let missing = VoteRequest {
            winner: Some(1),
            loser: None,
        };
        assert!(matches!(missing.validate(), Err(RankingError::InvalidInput(_))));
        assert!(matches!(VoteRequest::default().validate(), Err(RankingError::InvalidInput(_))));
        assert!(matches!(vote(3, 3).validate(), Err(RankingError::InvalidInput(_))));
        assert_eq!(vote(1, 2).validate().unwrap(), (1, 2));
    }

    #[tokio::test]
    async fn test_vote_changes_only_the_pair() {
        let store = seeded(&[1, 2, 3]).await;

        let outcome = submit_vote(&store, vote(1, 2)).await.unwrap();
        assert_eq!(outcome, VoteOutcome::Applied);

        let winner = store.get(1).await.unwrap().unwrap();
        let loser = store.get(2).await.unwrap().unwrap();
        let other = store.get(3).await.unwrap().unwrap();

        assert_eq!((winner.wins, winner.losses), (1, 0));
        assert_eq!((loser.wins, loser.losses), (0, 1));
        assert!(winner.voted && loser.voted);
        assert_eq!(other, sample_with_stored_time(&other));
    }

    fn sample_with_stored_time(stored: &crate::character::Character) -> crate::character::Character {
        let mut expected = sample_character(stored.character_id, 0, 0);
        expected.created_at = stored.created_at;
        expected
    }

    #[tokio::test]
    async fn test_duplicate_vote_counts_once() {
        let store = seeded(&[1, 2]).await;

        assert_eq!(submit_vote(&store, vote(1, 2)).await.unwrap(), VoteOutcome::Applied);
        assert_eq!(
            submit_vote(&store, vote(1, 2)).await.unwrap(),
            VoteOutcome::AlreadyResolved
        );

        assert_eq!(store.get(1).await.unwrap().unwrap().wins, 1);
        assert_eq!(store.get(2).await.unwrap().unwrap().losses, 1);
    }

    #[tokio::test]
    async fn test_concurrent_duplicate_votes_count_once() {
        let store = seeded(&[1, 2]).await;

        let (first, second) = tokio::join!(
            submit_vote(&store, vote(1, 2)),
            submit_vote(&store, vote(1, 2))
        );
        let outcomes = [first.unwrap(), second.unwrap()];
        assert_eq!(
            outcomes.iter().filter(|o| **o == VoteOutcome::Applied).count(),
            1
        );

        assert_eq!(store.get(1).await.unwrap().unwrap().wins, 1);
        assert_eq!(store.get(2).await.unwrap().unwrap().losses, 1);
    }

    #[tokio::test]
    async fn test_vote_for_missing_character_is_not_found() {
        let store = seeded(&[1]).await;

        assert!(matches!(
            submit_vote(&store, vote(1, 404)).await,
            Err(RankingError::NotFound(_))
        ));
        let untouched = store.get(1).await.unwrap().unwrap();
        assert_eq!(untouched.wins, 0);
        assert!(!untouched.voted);
    }

    #[tokio::test]
    async fn test_reversed_vote_is_ignored_in_same_epoch() {
        let store = seeded(&[1, 2]).await;

        submit_vote(&store, vote(1, 2)).await.unwrap();
        assert_eq!(
            submit_vote(&store, vote(2, 1)).await.unwrap(),
            VoteOutcome::AlreadyResolved
        );

        store.reset_epoch().await.unwrap();
        assert_eq!(submit_vote(&store, vote(2, 1)).await.unwrap(), VoteOutcome::Applied);

        let first = store.get(1).await.unwrap().unwrap();
        assert_eq!((first.wins, first.losses), (1, 1));
    }
}
