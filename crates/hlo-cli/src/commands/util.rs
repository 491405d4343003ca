//! Shared utilities for CLI commands.

use anyhow::{Context, Result};
use chrono::{DateTime, NaiveDateTime, Utc};
use hlo_core::{Answer, GameLog, GameOverview, MistakePolicy};
use hlo_db::{Database, GameRecord};

/// A game with everything needed to analyze it.
#[derive(Debug, Clone)]
pub struct LoadedGame {
    pub record: GameRecord,
    pub log: GameLog,
    pub answers: Vec<Answer>,
}

impl LoadedGame {
    pub fn overview(&self, policy: MistakePolicy) -> GameOverview {
        GameOverview::new(self.record.id, &self.log, policy, self.answers.clone())
    }

    pub fn architect(&self) -> Option<&str> {
        self.record.architect_info.as_deref()
    }
}

/// Loads one game, failing if it does not exist.
pub fn load_game(db: &Database, id: i64) -> Result<LoadedGame> {
    let record = db
        .get_game(id)
        .with_context(|| format!("failed to read game {id}"))?
        .with_context(|| format!("game {id} not found"))?;
    load_record(db, record)
}

/// Loads every game in ID order.
pub fn load_games(db: &Database) -> Result<Vec<LoadedGame>> {
    let records = db.list_games().context("failed to list games")?;
    records
        .into_iter()
        .map(|record| load_record(db, record))
        .collect()
}

fn load_record(db: &Database, record: GameRecord) -> Result<LoadedGame> {
    let logs = db
        .game_logs(record.id)
        .with_context(|| format!("failed to read log of game {}", record.id))?;
    let answers = db
        .answers(record.id)
        .with_context(|| format!("failed to read answers of game {}", record.id))?;
    Ok(LoadedGame {
        log: GameLog::from_entries(&logs),
        answers: answers.into_iter().map(Answer::from).collect(),
        record,
    })
}

/// Parse a datetime string as RFC 3339, or as a naive `YYYY-MM-DDTHH:MM:SS`
/// taken to be UTC.
pub fn parse_datetime(s: &str) -> Result<DateTime<Utc>> {
    if let Ok(dt) = DateTime::parse_from_rfc3339(s) {
        return Ok(dt.with_timezone(&Utc));
    }
    for format in ["%Y-%m-%dT%H:%M:%S%.f", "%Y-%m-%d %H:%M:%S%.f"] {
        if let Ok(naive) = NaiveDateTime::parse_from_str(s, format) {
            return Ok(naive.and_utc());
        }
    }
    anyhow::bail!("Invalid datetime: {s}. Use RFC 3339 (e.g., 2020-06-01T12:00:00Z)")
}

/// Renders a missing value the way reports and CSV expect.
pub fn or_na<T: ToString>(value: Option<T>) -> String {
    value.map_or_else(|| "NA".to_string(), |v| v.to_string())
}
