// Ranking Service - every boundary operation behind one handle
//
// Owns the store, the directory and the lookup timeout. Cheap to clone; all
// clones share the same store.

use std::sync::Arc;
use std::time::Duration;

use crate::character::{Character, CharacterId, Gender};
use crate::db::Event;
use crate::directory::Directory;
use crate::enroll::{self, CreateRequest};
use crate::error::{RankingError, RankingResult};
use crate::leaderboard::{self, Stats, TopFilter};
use crate::moderation::{self, ReportOutcome};
use crate::pairing::{self, Pair};
use crate::store::Store;
use crate::voting::{self, VoteOutcome, VoteRequest};

#[derive(Clone)]
pub struct RankingService {
    store: Store,
    directory: Arc<dyn Directory>,
    lookup_timeout: Duration,
}

impl RankingService {
    pub fn new(store: Store, directory: Arc<dyn Directory>, lookup_timeout: Duration) -> Self {
        Self {
            store,
            directory,
            lookup_timeout,
        }
    }

    pub async fn get_pair(&self, hint: Option<Gender>) -> RankingResult<Pair> {
        pairing::select_pair(&self.store, hint).await
    }

    pub async fn submit_vote(&self, request: VoteRequest) -> RankingResult<VoteOutcome> {
        voting::submit_vote(&self.store, request).await
    }

    pub async fn bottom(&self) -> RankingResult<Vec<Character>> {
        leaderboard::bottom(&self.store).await
    }

    pub async fn top(&self, filter: TopFilter) -> RankingResult<Vec<Character>> {
        leaderboard::top(&self.store, filter).await
    }

    pub async fn count(&self) -> RankingResult<i64> {
        self.store.count().await
    }

    pub async fn search_by_name(&self, name: &str) -> RankingResult<Character> {
        let name = name.trim();
        if name.is_empty() {
            return Err(RankingError::InvalidInput("A name to search for is required.".to_string()));
        }

        self.store
            .find_by_name(name)
            .await?
            .ok_or_else(RankingError::character_not_found)
    }

    pub async fn get_by_id(&self, character_id: CharacterId) -> RankingResult<Character> {
        self.store
            .get(character_id)
            .await?
            .ok_or_else(RankingError::character_not_found)
    }

    pub async fn create(&self, request: &CreateRequest) -> RankingResult<Character> {
        enroll::create_character(&self.store, self.directory.as_ref(), self.lookup_timeout, request).await
    }

    pub async fn stats(&self) -> RankingResult<Stats> {
        leaderboard::stats(&self.store).await
    }

    pub async fn report(&self, character_id: CharacterId) -> RankingResult<ReportOutcome> {
        moderation::report_character(&self.store, character_id).await
    }

    pub async fn history(&self, character_id: CharacterId) -> RankingResult<Vec<Event>> {
        self.store.history(character_id).await
    }
}
