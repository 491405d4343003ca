//! Storage layer for recorded build sessions.
//!
//! Holds games, their message logs and post-game questionnaires using
//! `rusqlite`.
//!
//! # Thread Safety
//!
//! The [`Database`] type wraps a `rusqlite::Connection`, which is `Send` but not `Sync`.
//! Batch analysis therefore loads every session up front and hands plain
//! records to worker threads.
//!
//! # Schema
//!
//! ## Timestamp Format
//!
//! Timestamps are stored as TEXT in RFC 3339 format with millisecond
//! precision (e.g., `2020-06-01T12:00:00.250Z`), always UTC.
//!
//! ## Log Ordering
//!
//! `game_logs.id` is the occurrence order of a game's messages. Several
//! messages may share a timestamp, so logs are always read by ID.

use std::path::Path;

use chrono::{DateTime, SecondsFormat, Utc};
use hlo_core::RawLogEntry;
use hlo_core::aggregate::Answer;
use rusqlite::{Connection, OptionalExtension, params};
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Database errors.
#[derive(Debug, Error)]
pub enum DbError {
    /// An error from the underlying database.
    #[error("sqlite error: {0}")]
    Sqlite(#[from] rusqlite::Error),
    /// Failed to parse a log timestamp.
    #[error("invalid timestamp for log row {log_id}: {timestamp}")]
    TimestampParse {
        log_id: i64,
        timestamp: String,
        #[source]
        source: chrono::ParseError,
    },
}

/// Database connection wrapper.
///
/// See the [module documentation](self) for thread safety considerations.
pub struct Database {
    conn: Connection,
}

/// One recorded game.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GameRecord {
    pub id: i64,
    pub scenario: String,
    #[serde(default)]
    pub architect_info: Option<String>,
    #[serde(default)]
    pub player_name: Option<String>,
    #[serde(default)]
    pub client_ip: Option<String>,
}

/// One logged message of a game.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LogRecord {
    pub id: i64,
    #[serde(alias = "gameid")]
    pub game_id: i64,
    pub timestamp: DateTime<Utc>,
    pub direction: String,
    pub message_type: String,
    pub message: String,
}

impl RawLogEntry for LogRecord {
    fn seq(&self) -> i64 {
        self.id
    }

    fn timestamp(&self) -> DateTime<Utc> {
        self.timestamp
    }

    fn direction(&self) -> &str {
        &self.direction
    }

    fn message_type(&self) -> &str {
        &self.message_type
    }

    fn message(&self) -> &str {
        &self.message
    }
}

/// One questionnaire answer of a game.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AnswerRecord {
    pub id: i64,
    #[serde(alias = "gameid")]
    pub game_id: i64,
    pub question: String,
    pub answer: String,
}

impl From<AnswerRecord> for Answer {
    fn from(record: AnswerRecord) -> Self {
        Self {
            question: record.question,
            answer: record.answer,
        }
    }
}

impl Database {
    /// Opens a database at the given path, creating it if necessary.
    ///
    /// The database schema is automatically initialized on first open.
    pub fn open(path: &Path) -> Result<Self, DbError> {
        let conn = Connection::open(path)?;
        let db = Self { conn };
        db.init()?;
        tracing::debug!(path = %path.display(), "opened database");
        Ok(db)
    }

    /// Opens an in-memory database.
    ///
    /// Useful for testing. The database is destroyed when the connection closes.
    pub fn open_in_memory() -> Result<Self, DbError> {
        let conn = Connection::open_in_memory()?;
        let db = Self { conn };
        db.init()?;
        Ok(db)
    }

    /// Initializes the database schema.
    ///
    /// This is idempotent - safe to call on an already-initialized database.
    fn init(&self) -> Result<(), DbError> {
        self.conn.execute_batch("PRAGMA foreign_keys = ON;")?;
        self.conn.execute_batch(
            "
            CREATE TABLE IF NOT EXISTS games (
                id INTEGER PRIMARY KEY,
                scenario TEXT NOT NULL,
                architect_info TEXT,
                player_name TEXT,
                client_ip TEXT
            );

            -- One row per message exchanged during a game.
            -- timestamp: RFC 3339, UTC
            -- message: JSON body, shape depends on message_type
            CREATE TABLE IF NOT EXISTS game_logs (
                id INTEGER PRIMARY KEY,
                gameid INTEGER NOT NULL,
                timestamp TEXT NOT NULL,
                direction TEXT NOT NULL,
                message_type TEXT NOT NULL,
                message TEXT NOT NULL,
                FOREIGN KEY (gameid) REFERENCES games(id) ON DELETE CASCADE
            );

            CREATE INDEX IF NOT EXISTS idx_game_logs_gameid ON game_logs(gameid);
            CREATE INDEX IF NOT EXISTS idx_game_logs_message_type ON game_logs(message_type);

            CREATE TABLE IF NOT EXISTS questionnaires (
                id INTEGER PRIMARY KEY,
                gameid INTEGER NOT NULL,
                question TEXT NOT NULL,
                answer TEXT NOT NULL,
                FOREIGN KEY (gameid) REFERENCES games(id) ON DELETE CASCADE
            );
            ",
        )?;
        Ok(())
    }

    /// Inserts a batch of games, ignoring duplicates by ID.
    pub fn insert_games(&mut self, games: &[GameRecord]) -> Result<usize, DbError> {
        if games.is_empty() {
            return Ok(0);
        }
        let tx = self.conn.transaction()?;
        let mut inserted = 0;
        {
            let mut stmt = tx.prepare(
                "
                INSERT OR IGNORE INTO games (id, scenario, architect_info, player_name, client_ip)
                VALUES (?, ?, ?, ?, ?)
                ",
            )?;
            for game in games {
                inserted += stmt.execute(params![
                    game.id,
                    game.scenario,
                    game.architect_info,
                    game.player_name,
                    game.client_ip,
                ])?;
            }
        }
        tx.commit()?;
        Ok(inserted)
    }

    /// Inserts a batch of log rows, ignoring duplicates by ID.
    ///
    /// Fails if a row references an unknown game.
    pub fn insert_logs(&mut self, logs: &[LogRecord]) -> Result<usize, DbError> {
        if logs.is_empty() {
            return Ok(0);
        }
        let tx = self.conn.transaction()?;
        let mut inserted = 0;
        {
            let mut stmt = tx.prepare(
                "
                INSERT OR IGNORE INTO game_logs (id, gameid, timestamp, direction, message_type, message)
                VALUES (?, ?, ?, ?, ?, ?)
                ",
            )?;
            for log in logs {
                inserted += stmt.execute(params![
                    log.id,
                    log.game_id,
                    format_timestamp(log.timestamp),
                    log.direction,
                    log.message_type,
                    log.message,
                ])?;
            }
        }
        tx.commit()?;
        Ok(inserted)
    }

    /// Inserts a batch of questionnaire answers, ignoring duplicates by ID.
    pub fn insert_answers(&mut self, answers: &[AnswerRecord]) -> Result<usize, DbError> {
        if answers.is_empty() {
            return Ok(0);
        }
        let tx = self.conn.transaction()?;
        let mut inserted = 0;
        {
            let mut stmt = tx.prepare(
                "INSERT OR IGNORE INTO questionnaires (id, gameid, question, answer) VALUES (?, ?, ?, ?)",
            )?;
            for answer in answers {
                inserted += stmt.execute(params![
                    answer.id,
                    answer.game_id,
                    answer.question,
                    answer.answer,
                ])?;
            }
        }
        tx.commit()?;
        Ok(inserted)
    }

    /// Lists all games ordered by ID.
    pub fn list_games(&self) -> Result<Vec<GameRecord>, DbError> {
        let mut stmt = self.conn.prepare(
            "SELECT id, scenario, architect_info, player_name, client_ip FROM games ORDER BY id ASC",
        )?;
        let rows = stmt.query_map([], game_from_row)?;
        let mut games = Vec::new();
        for row in rows {
            games.push(row?);
        }
        Ok(games)
    }

    pub fn get_game(&self, id: i64) -> Result<Option<GameRecord>, DbError> {
        let game = self
            .conn
            .query_row(
                "SELECT id, scenario, architect_info, player_name, client_ip FROM games WHERE id = ?",
                [id],
                game_from_row,
            )
            .optional()?;
        Ok(game)
    }

    /// Returns a game's log in occurrence order.
    pub fn game_logs(&self, game_id: i64) -> Result<Vec<LogRecord>, DbError> {
        let mut stmt = self.conn.prepare(
            "
            SELECT id, gameid, timestamp, direction, message_type, message
            FROM game_logs
            WHERE gameid = ?
            ORDER BY id ASC
            ",
        )?;
        let rows = stmt.query_map([game_id], |row| {
            Ok((
                row.get::<_, i64>(0)?,
                row.get::<_, i64>(1)?,
                row.get::<_, String>(2)?,
                row.get::<_, String>(3)?,
                row.get::<_, String>(4)?,
                row.get::<_, String>(5)?,
            ))
        })?;
        let mut logs = Vec::new();
        for row in rows {
            let (id, game_id, timestamp, direction, message_type, message) = row?;
            logs.push(LogRecord {
                id,
                game_id,
                timestamp: parse_timestamp(&timestamp, id)?,
                direction,
                message_type,
                message,
            });
        }
        Ok(logs)
    }

    /// Returns a game's questionnaire answers in the order they were given.
    pub fn answers(&self, game_id: i64) -> Result<Vec<AnswerRecord>, DbError> {
        let mut stmt = self.conn.prepare(
            "SELECT id, gameid, question, answer FROM questionnaires WHERE gameid = ? ORDER BY id ASC",
        )?;
        let rows = stmt.query_map([game_id], |row| {
            Ok(AnswerRecord {
                id: row.get(0)?,
                game_id: row.get(1)?,
                question: row.get(2)?,
                answer: row.get(3)?,
            })
        })?;
        let mut answers = Vec::new();
        for row in rows {
            answers.push(row?);
        }
        Ok(answers)
    }

    pub fn distinct_scenarios(&self) -> Result<Vec<String>, DbError> {
        self.distinct_column("SELECT DISTINCT scenario FROM games ORDER BY scenario ASC")
    }

    /// Architects that played at least one game; games without one are skipped.
    pub fn distinct_architects(&self) -> Result<Vec<String>, DbError> {
        self.distinct_column(
            "
            SELECT DISTINCT architect_info FROM games
            WHERE architect_info IS NOT NULL
            ORDER BY architect_info ASC
            ",
        )
    }

    fn distinct_column(&self, sql: &str) -> Result<Vec<String>, DbError> {
        let mut stmt = self.conn.prepare(sql)?;
        let rows = stmt.query_map([], |row| row.get::<_, String>(0))?;
        let mut values = Vec::new();
        for row in rows {
            values.push(row?);
        }
        Ok(values)
    }
}

fn game_from_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<GameRecord> {
    Ok(GameRecord {
        id: row.get(0)?,
        scenario: row.get(1)?,
        architect_info: row.get(2)?,
        player_name: row.get(3)?,
        client_ip: row.get(4)?,
    })
}

fn parse_timestamp(timestamp: &str, log_id: i64) -> Result<DateTime<Utc>, DbError> {
    DateTime::parse_from_rfc3339(timestamp)
        .map(|parsed| parsed.with_timezone(&Utc))
        .map_err(|source| DbError::TimestampParse {
            log_id,
            timestamp: timestamp.to_string(),
            source,
        })
}

fn format_timestamp(timestamp: DateTime<Utc>) -> String {
    timestamp.to_rfc3339_opts(SecondsFormat::Millis, true)
}
