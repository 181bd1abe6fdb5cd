// Async handle over the SQLite entity store
//
// The connection lives behind a std Mutex. Every call hops onto the blocking
// pool and takes the lock there, so no lock is ever held across an await.

use rusqlite::Connection;
use std::path::Path;
use std::sync::{Arc, Mutex};

use crate::character::{Character, CharacterId, Gender};
use crate::db::{self, Event, GroupColumn};
use crate::error::{RankingError, RankingResult};
use crate::leaderboard::TopFilter;
use crate::moderation::ReportOutcome;
use crate::voting::VoteApplication;

#[derive(Clone)]
pub struct Store {
    db: Arc<Mutex<Connection>>,
}

impl Store {
    pub fn open(path: &Path) -> RankingResult<Self> {
        let conn = Connection::open(path)?;
        Self::from_connection(conn)
    }

    pub fn open_in_memory() -> RankingResult<Self> {
        Self::from_connection(Connection::open_in_memory()?)
    }

    fn from_connection(conn: Connection) -> RankingResult<Self> {
        db::setup_database(&conn)?;
        Ok(Self {
            db: Arc::new(Mutex::new(conn)),
        })
    }

    async fn run<T, F>(&self, f: F) -> RankingResult<T>
    where
        F: FnOnce(&mut Connection) -> rusqlite::Result<T> + Send + 'static,
        T: Send + 'static,
    {
        let db = Arc::clone(&self.db);

        tokio::task::spawn_blocking(move || {
            let mut conn = db
                .lock()
                .map_err(|_| RankingError::Store("connection lock poisoned".to_string()))?;
            f(&mut *conn).map_err(RankingError::from)
        })
        .await
        .map_err(|e| RankingError::Store(format!("store task failed: {}", e)))?
    }

    pub async fn get(&self, character_id: CharacterId) -> RankingResult<Option<Character>> {
        self.run(move |conn| db::get_character(conn, character_id)).await
    }

    pub async fn find_by_name(&self, name: &str) -> RankingResult<Option<Character>> {
        let name = name.to_string();
        self.run(move |conn| db::find_character_by_name(conn, &name)).await
    }

    pub async fn count(&self) -> RankingResult<i64> {
        self.run(|conn| db::count_characters(conn)).await
    }

    /// Returns false when the id is already present
    pub async fn insert(&self, character: Character) -> RankingResult<bool> {
        self.run(move |conn| db::insert_character(conn, &character)).await
    }

    pub async fn sample_eligible(
        &self,
        gender: Gender,
        pivot: f64,
        limit: usize,
    ) -> RankingResult<Vec<Character>> {
        self.run(move |conn| db::sample_eligible(conn, gender, pivot, limit)).await
    }

    pub async fn reset_epoch(&self) -> RankingResult<usize> {
        self.run(|conn| db::reset_epoch(conn)).await
    }

    pub async fn apply_vote(
        &self,
        winner: CharacterId,
        loser: CharacterId,
        winner_key: f64,
        loser_key: f64,
    ) -> RankingResult<VoteApplication> {
        self.run(move |conn| db::apply_vote(conn, winner, loser, winner_key, loser_key))
            .await
    }

    pub async fn record_report(
        &self,
        character_id: CharacterId,
        threshold: u32,
    ) -> RankingResult<Option<ReportOutcome>> {
        self.run(move |conn| db::record_report(conn, character_id, threshold))
            .await
    }

    pub async fn by_losses(&self, limit: usize) -> RankingResult<Vec<Character>> {
        self.run(move |conn| db::characters_by_losses(conn, limit)).await
    }

    pub async fn by_wins(&self, filter: TopFilter, limit: usize) -> RankingResult<Vec<Character>> {
        self.run(move |conn| db::characters_by_wins(conn, &filter, limit)).await
    }

    pub async fn count_grouped_by(&self, column: GroupColumn) -> RankingResult<Vec<(String, i64)>> {
        self.run(move |conn| db::count_grouped_by(conn, column)).await
    }

    pub async fn total_votes(&self) -> RankingResult<i64> {
        self.run(|conn| db::total_votes(conn)).await
    }

    pub async fn history(&self, character_id: CharacterId) -> RankingResult<Vec<Event>> {
        self.run(move |conn| db::get_events_for_character(conn, character_id))
            .await
    }
}
