//! Import command for loading recorded sessions into the local `SQLite` store.
//!
//! Input is JSONL on stdin, one record per line, tagged by `record`:
//!
//! ```text
//! {"record":"game","id":4,"scenario":"bridge","architect_info":"SimpleArchitect"}
//! {"record":"log","id":1,"gameid":4,"timestamp":"2020-06-01T12:00:00Z","direction":"PassToClient","message_type":"TextMessage","message":"{...}"}
//! {"record":"answer","id":1,"gameid":4,"question":"How clear were the instructions?","answer":"4"}
//! ```

use std::io::{self, BufRead};

use anyhow::{Context, Result};
use serde::Deserialize;

use hlo_db::{AnswerRecord, Database, GameRecord, LogRecord};

/// Rows read from one import.
#[derive(Debug, Default)]
struct ImportBatch {
    games: Vec<GameRecord>,
    logs: Vec<LogRecord>,
    answers: Vec<AnswerRecord>,
}

/// Counts of newly inserted rows.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ImportSummary {
    pub games: usize,
    pub logs: usize,
    pub answers: usize,
}

#[derive(Debug, Deserialize)]
#[serde(tag = "record", rename_all = "snake_case")]
enum ImportRecord {
    Game(GameRecord),
    Log(LogRecord),
    Answer(AnswerRecord),
}

pub fn run(db: &mut Database) -> Result<ImportSummary> {
    let stdin = io::stdin();
    let batch = parse_records(stdin.lock())?;
    insert_batch(db, &batch)
}

fn insert_batch(db: &mut Database, batch: &ImportBatch) -> Result<ImportSummary> {
    // Games first: logs and answers reference them.
    let games = db.insert_games(&batch.games).context("failed to insert games")?;
    let logs = db.insert_logs(&batch.logs).context("failed to insert logs")?;
    let answers = db
        .insert_answers(&batch.answers)
        .context("failed to insert answers")?;
    tracing::debug!(games, logs, answers, "import complete");
    Ok(ImportSummary {
        games,
        logs,
        answers,
    })
}

fn parse_records<R: BufRead>(reader: R) -> Result<ImportBatch> {
    let mut batch = ImportBatch::default();
    for (idx, line) in reader.lines().enumerate() {
        let line = line.with_context(|| format!("failed to read line {}", idx + 1))?;
        let trimmed = line.trim();
        if trimmed.is_empty() {
            continue;
        }
        let record: ImportRecord = serde_json::from_str(trimmed)
            .with_context(|| format!("invalid record on line {}", idx + 1))?;
        match record {
            ImportRecord::Game(game) => {
                if game.scenario.trim().is_empty() {
                    anyhow::bail!("missing scenario on line {}", idx + 1);
                }
                batch.games.push(game);
            }
            ImportRecord::Log(log) => batch.logs.push(log),
            ImportRecord::Answer(answer) => batch.answers.push(answer),
        }
    }
    Ok(batch)
}
