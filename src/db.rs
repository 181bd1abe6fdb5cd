// Entity Store - SQLite persistence for characters and their audit trail
//
// Every multi-row mutation (vote, report, reset, insert) runs inside a single
// SQLite transaction together with its audit event, so a failure part way
// through leaves nothing behind.

use chrono::{DateTime, Utc};
use rusqlite::types::Type;
use rusqlite::{params, params_from_iter, Connection, OptionalExtension, Row};
use serde::{Deserialize, Serialize};

use crate::character::{Character, CharacterId, Gender};
use crate::leaderboard::TopFilter;
use crate::moderation::ReportOutcome;
use crate::voting::VoteApplication;

/// Event for the audit trail. One row per applied mutation.
#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct Event {
    pub event_id: String,
    pub timestamp: DateTime<Utc>,
    pub event_type: String,
    pub character_id: Option<CharacterId>,
    pub data: serde_json::Value,
}

impl Event {
    pub fn new(event_type: &str, character_id: Option<CharacterId>, data: serde_json::Value) -> Self {
        Self {
            event_id: uuid::Uuid::new_v4().to_string(),
            timestamp: Utc::now(),
            event_type: event_type.to_string(),
            character_id,
            data,
        }
    }
}

pub fn setup_database(conn: &Connection) -> rusqlite::Result<()> {
    // Enable WAL mode for crash recovery
    conn.pragma_update(None, "journal_mode", "WAL")?;

    // ==========================================================================
    // Characters Table
    // ==========================================================================
    conn.execute(
        "CREATE TABLE IF NOT EXISTS characters (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            character_id INTEGER UNIQUE NOT NULL,
            name TEXT NOT NULL,
            race TEXT NOT NULL,
            bloodline TEXT NOT NULL,
            gender TEXT NOT NULL CHECK (gender IN ('Female', 'Male')),
            wins INTEGER NOT NULL DEFAULT 0 CHECK (wins >= 0),
            losses INTEGER NOT NULL DEFAULT 0 CHECK (losses >= 0),
            reports INTEGER NOT NULL DEFAULT 0 CHECK (reports >= 0),
            voted INTEGER NOT NULL DEFAULT 0,
            sampling_key REAL NOT NULL,
            created_at TEXT NOT NULL
        )",
        [],
    )?;

    // ==========================================================================
    // Events Table (audit trail, outlives deleted characters)
    // ==========================================================================
    conn.execute(
        "CREATE TABLE IF NOT EXISTS events (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            event_id TEXT UNIQUE NOT NULL,
            timestamp TEXT NOT NULL,
            event_type TEXT NOT NULL,
            character_id INTEGER,
            data TEXT NOT NULL
        )",
        [],
    )?;

    // ==========================================================================
    // Indexes
    // ==========================================================================
    conn.execute(
        "CREATE INDEX IF NOT EXISTS idx_characters_pairing
         ON characters(gender, voted, sampling_key)",
        [],
    )?;

    conn.execute(
        "CREATE INDEX IF NOT EXISTS idx_characters_wins ON characters(wins)",
        [],
    )?;

    conn.execute(
        "CREATE INDEX IF NOT EXISTS idx_characters_losses ON characters(losses)",
        [],
    )?;

    conn.execute(
        "CREATE INDEX IF NOT EXISTS idx_events_character ON events(character_id)",
        [],
    )?;

    Ok(())
}

const CHARACTER_COLUMNS: &str = "character_id, name, race, bloodline, gender,
    wins, losses, reports, voted, sampling_key, created_at";

fn character_from_row(row: &Row<'_>) -> rusqlite::Result<Character> {
    let created_at: String = row.get(10)?;
    let created_at = DateTime::parse_from_rfc3339(&created_at)
        .map_err(|e| rusqlite::Error::FromSqlConversionFailure(10, Type::Text, Box::new(e)))?
        .with_timezone(&Utc);

    Ok(Character {
        character_id: row.get(0)?,
        name: row.get(1)?,
        race: row.get(2)?,
        bloodline: row.get(3)?,
        gender: row.get(4)?,
        wins: row.get(5)?,
        losses: row.get(6)?,
        reports: row.get(7)?,
        voted: row.get(8)?,
        sampling_key: row.get(9)?,
        created_at,
    })
}

/// Insert a character and its `character_added` event.
/// Returns false when the character id is already taken.
pub fn insert_character(conn: &mut Connection, character: &Character) -> rusqlite::Result<bool> {
    let tx = conn.transaction()?;

    let result = tx.execute(
        "INSERT INTO characters (
            character_id, name, race, bloodline, gender,
            wins, losses, reports, voted, sampling_key, created_at
        ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11)",
        params![
            character.character_id,
            character.name,
            character.race,
            character.bloodline,
            character.gender,
            character.wins,
            character.losses,
            character.reports,
            character.voted,
            character.sampling_key,
            character.created_at.to_rfc3339(),
        ],
    );

    match result {
        Ok(_) => {}
        Err(rusqlite::Error::SqliteFailure(err, _))
            if err.extended_code == rusqlite::ffi::SQLITE_CONSTRAINT_UNIQUE =>
        {
            return Ok(false);
        }
        Err(e) => return Err(e),
    }

    let event = Event::new(
        "character_added",
        Some(character.character_id),
        serde_json::json!({
            "name": character.name,
            "race": character.race,
            "bloodline": character.bloodline,
            "gender": character.gender,
        }),
    );
    insert_event(&tx, &event)?;

    tx.commit()?;
    Ok(true)
}

pub fn get_character(conn: &Connection, character_id: CharacterId) -> rusqlite::Result<Option<Character>> {
    conn.query_row(
        &format!("SELECT {} FROM characters WHERE character_id = ?1", CHARACTER_COLUMNS),
        [character_id],
        character_from_row,
    )
    .optional()
}

fn escape_like(pattern: &str) -> String {
    let mut escaped = String::with_capacity(pattern.len());
    for c in pattern.chars() {
        if matches!(c, '%' | '_' | '\\') {
            escaped.push('\\');
        }
        escaped.push(c);
    }
    escaped
}

/// Case-insensitive substring search on name. An exact match wins over a
/// partial one, otherwise the oldest record is returned.
pub fn find_character_by_name(conn: &Connection, name: &str) -> rusqlite::Result<Option<Character>> {
    let pattern = format!("%{}%", escape_like(name));

    conn.query_row(
        &format!(
            "SELECT {} FROM characters
             WHERE name LIKE ?1 ESCAPE '\\'
             ORDER BY (name = ?2 COLLATE NOCASE) DESC, id ASC
             LIMIT 1",
            CHARACTER_COLUMNS
        ),
        params![pattern, name],
        character_from_row,
    )
    .optional()
}

pub fn count_characters(conn: &Connection) -> rusqlite::Result<i64> {
    conn.query_row("SELECT COUNT(*) FROM characters", [], |row| row.get(0))
}

/// Up to `limit` unvoted characters of one gender, closest to `pivot` by
/// sampling key.
pub fn sample_eligible(
    conn: &Connection,
    gender: Gender,
    pivot: f64,
    limit: usize,
) -> rusqlite::Result<Vec<Character>> {
    let mut stmt = conn.prepare(&format!(
        "SELECT {} FROM characters
         WHERE voted = 0 AND gender = ?1
         ORDER BY ABS(sampling_key - ?2) ASC
         LIMIT ?3",
        CHARACTER_COLUMNS
    ))?;

    let characters = stmt
        .query_map(params![gender, pivot, limit as i64], character_from_row)?
        .collect::<Result<Vec<_>, _>>()?;

    Ok(characters)
}

/// Clear every voted flag. Returns how many characters became eligible again.
pub fn reset_epoch(conn: &mut Connection) -> rusqlite::Result<usize> {
    let tx = conn.transaction()?;

    let cleared = tx.execute("UPDATE characters SET voted = 0 WHERE voted = 1", [])?;

    // Empty pair polls reset too; only audit resets that changed something
    if cleared > 0 {
        let event = Event::new("epoch_reset", None, serde_json::json!({ "cleared": cleared }));
        insert_event(&tx, &event)?;
    }

    tx.commit()?;
    Ok(cleared)
}

/// Apply both sides of a vote in one transaction. Each side only updates
/// while still unvoted; if either side misses, nothing is written.
pub fn apply_vote(
    conn: &mut Connection,
    winner: CharacterId,
    loser: CharacterId,
    winner_key: f64,
    loser_key: f64,
) -> rusqlite::Result<VoteApplication> {
    let tx = conn.transaction()?;

    let winner_rows = tx.execute(
        "UPDATE characters
         SET wins = wins + 1, voted = 1, sampling_key = ?2
         WHERE character_id = ?1 AND voted = 0",
        params![winner, winner_key],
    )?;

    let loser_rows = tx.execute(
        "UPDATE characters
         SET losses = losses + 1, voted = 1, sampling_key = ?2
         WHERE character_id = ?1 AND voted = 0",
        params![loser, loser_key],
    )?;

    if winner_rows != 1 || loser_rows != 1 {
        // Dropping the transaction rolls back whichever side did apply
        return Ok(VoteApplication::Skipped);
    }

    let data = serde_json::json!({ "winner": winner, "loser": loser });
    for side in [winner, loser] {
        insert_event(&tx, &Event::new("vote_recorded", Some(side), data.clone()))?;
    }

    tx.commit()?;
    Ok(VoteApplication::Applied)
}

/// Increment the report counter and delete the character once it exceeds
/// `threshold`. Returns None when the character does not exist.
pub fn record_report(
    conn: &mut Connection,
    character_id: CharacterId,
    threshold: u32,
) -> rusqlite::Result<Option<ReportOutcome>> {
    let tx = conn.transaction()?;

    let updated = tx.execute(
        "UPDATE characters SET reports = reports + 1 WHERE character_id = ?1",
        [character_id],
    )?;
    if updated == 0 {
        return Ok(None);
    }

    let (name, reports): (String, u32) = tx.query_row(
        "SELECT name, reports FROM characters WHERE character_id = ?1",
        [character_id],
        |row| Ok((row.get(0)?, row.get(1)?)),
    )?;

    let outcome = if reports > threshold {
        tx.execute("DELETE FROM characters WHERE character_id = ?1", [character_id])?;
        insert_event(
            &tx,
            &Event::new(
                "character_deleted",
                Some(character_id),
                serde_json::json!({ "name": name, "reports": reports }),
            ),
        )?;
        ReportOutcome::Deleted { name }
    } else {
        insert_event(
            &tx,
            &Event::new(
                "character_reported",
                Some(character_id),
                serde_json::json!({ "reports": reports }),
            ),
        )?;
        ReportOutcome::Reported { name, reports }
    };

    tx.commit()?;
    Ok(Some(outcome))
}

pub fn characters_by_losses(conn: &Connection, limit: usize) -> rusqlite::Result<Vec<Character>> {
    let mut stmt = conn.prepare(&format!(
        "SELECT {} FROM characters ORDER BY losses DESC, id ASC LIMIT ?1",
        CHARACTER_COLUMNS
    ))?;

    let characters = stmt
        .query_map([limit as i64], character_from_row)?
        .collect::<Result<Vec<_>, _>>()?;

    Ok(characters)
}

/// Characters matching `filter`, by raw win count, capped at `limit`
pub fn characters_by_wins(
    conn: &Connection,
    filter: &TopFilter,
    limit: usize,
) -> rusqlite::Result<Vec<Character>> {
    let conditions = filter.conditions();

    let mut sql = format!("SELECT {} FROM characters", CHARACTER_COLUMNS);
    let mut values: Vec<String> = Vec::with_capacity(conditions.len() + 1);

    if !conditions.is_empty() {
        let clauses: Vec<String> = conditions
            .iter()
            .enumerate()
            .map(|(i, (column, _))| format!("{} = ?{} COLLATE NOCASE", column, i + 1))
            .collect();
        sql.push_str(" WHERE ");
        sql.push_str(&clauses.join(" AND "));
    }

    values.extend(conditions.iter().map(|(_, value)| value.to_string()));
    sql.push_str(&format!(" ORDER BY wins DESC, id ASC LIMIT {}", limit));

    let mut stmt = conn.prepare(&sql)?;
    let characters = stmt
        .query_map(params_from_iter(values.iter()), character_from_row)?
        .collect::<Result<Vec<_>, _>>()?;

    Ok(characters)
}

/// Row counts grouped by a classification column
pub fn count_grouped_by(conn: &Connection, column: GroupColumn) -> rusqlite::Result<Vec<(String, i64)>> {
    let mut stmt = conn.prepare(&format!(
        "SELECT {col}, COUNT(*) FROM characters GROUP BY {col} ORDER BY {col}",
        col = column.as_str()
    ))?;

    let counts = stmt
        .query_map([], |row| Ok((row.get(0)?, row.get(1)?)))?
        .collect::<Result<Vec<_>, _>>()?;

    Ok(counts)
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GroupColumn {
    Race,
    Gender,
}

impl GroupColumn {
    fn as_str(&self) -> &'static str {
        match self {
            GroupColumn::Race => "race",
            GroupColumn::Gender => "gender",
        }
    }
}

/// Every vote adds exactly one win, so this is the number of votes cast
pub fn total_votes(conn: &Connection) -> rusqlite::Result<i64> {
    conn.query_row("SELECT COALESCE(SUM(wins), 0) FROM characters", [], |row| row.get(0))
}

/// Insert event into audit trail
pub fn insert_event(conn: &Connection, event: &Event) -> rusqlite::Result<()> {
    let data_json = event.data.to_string();

    conn.execute(
        "INSERT INTO events (event_id, timestamp, event_type, character_id, data)
         VALUES (?1, ?2, ?3, ?4, ?5)",
        params![
            event.event_id,
            event.timestamp.to_rfc3339(),
            event.event_type,
            event.character_id,
            data_json,
        ],
    )?;

    Ok(())
}

/// Events for one character, newest first
pub fn get_events_for_character(
    conn: &Connection,
    character_id: CharacterId,
) -> rusqlite::Result<Vec<Event>> {
    let mut stmt = conn.prepare(
        "SELECT event_id, timestamp, event_type, character_id, data
         FROM events
         WHERE character_id = ?1
         ORDER BY id DESC",
    )?;

    let events = stmt
        .query_map([character_id], |row| {
            let timestamp_str: String = row.get(1)?;
            let data_json: String = row.get(4)?;

            Ok(Event {
                event_id: row.get(0)?,
                timestamp: DateTime::parse_from_rfc3339(&timestamp_str)
                    .map_err(|e| rusqlite::Error::FromSqlConversionFailure(1, Type::Text, Box::new(e)))?
                    .with_timezone(&Utc),
                event_type: row.get(2)?,
                character_id: row.get(3)?,
                data: serde_json::from_str(&data_json)
                    .map_err(|e| rusqlite::Error::FromSqlConversionFailure(4, Type::Text, Box::new(e)))?,
            })
        })?
        .collect::<Result<Vec<_>, _>>()?;

    Ok(events)
}
