//! Game command: analysis of a single session.
//!
//! Renders the per-game markdown report (also written by `hlo analyze`) or a
//! JSON summary.

use std::fmt::Write;

use anyhow::Result;
use hlo_core::{
    AnalysisError, HloReport, InstructionDuration, MistakePolicy, ScenarioCatalog,
};
use hlo_db::Database;
use serde::Serialize;

use super::util::{LoadedGame, load_game};
use crate::Config;

/// HLO outcome for a game: a report, a failure, or not attempted.
pub type HloOutcome<'a> = Option<&'a Result<HloReport, AnalysisError>>;

/// JSON summary of a game.
#[derive(Debug, Serialize)]
pub struct GameSummary<'a> {
    pub game_id: i64,
    pub scenario: &'a str,
    pub architect: Option<&'a str>,
    pub successful: bool,
    pub instruction_level: &'static str,
    pub time_to_success_secs: Option<i64>,
    pub total_time_secs: Option<i64>,
    pub blocks_placed: usize,
    pub blocks_destroyed: usize,
    pub mistakes: usize,
    pub hlo: Option<&'a HloReport>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub hlo_error: Option<String>,
    pub instructions: Vec<InstructionDuration>,
}

impl<'a> GameSummary<'a> {
    pub fn new(game: &'a LoadedGame, policy: MistakePolicy, hlo: HloOutcome<'a>) -> Self {
        let log = &game.log;
        let (hlo, hlo_error) = match hlo {
            Some(Ok(report)) => (Some(report), None),
            Some(Err(e)) => (None, Some(e.to_string())),
            None => (None, None),
        };
        Self {
            game_id: game.record.id,
            scenario: &game.record.scenario,
            architect: game.architect(),
            successful: log.was_successful(),
            instruction_level: log.instruction_level().as_str(),
            time_to_success_secs: log.time_to_success_secs(),
            total_time_secs: log.total_time_secs(),
            blocks_placed: log.blocks_placed(),
            blocks_destroyed: log.blocks_destroyed(),
            mistakes: log.mistakes(policy),
            hlo,
            hlo_error,
            instructions: log.instruction_durations(),
        }
    }
}

/// Computes the HLO report of a successful game; unsuccessful games get none.
pub fn hlo_outcome(game: &LoadedGame, catalog: &ScenarioCatalog) -> Option<Result<HloReport, AnalysisError>> {
    if !game.log.was_successful() {
        return None;
    }
    Some(
        catalog
            .get(&game.record.scenario)
            .map_err(AnalysisError::from)
            .and_then(|scenario| game.log.hlo_report(scenario)),
    )
}

/// Formats the per-game markdown report.
pub fn format_game(game: &LoadedGame, policy: MistakePolicy, hlo: HloOutcome<'_>) -> String {
    let mut output = String::new();
    let log = &game.log;
    let record = &game.record;
    let successful = log.was_successful();
    let unknown = |v: Option<&str>| v.unwrap_or("unknown").to_string();
    let not_applicable = |v: Option<String>| v.unwrap_or_else(|| "not applicable".to_string());

    writeln!(output, "# Overview").unwrap();
    writeln!(output, " - Connection from: {}", unknown(record.client_ip.as_deref())).unwrap();
    writeln!(output, " - Player name: {}", unknown(record.player_name.as_deref())).unwrap();
    writeln!(output, " - Scenario: {}", record.scenario).unwrap();
    writeln!(output, " - Architect: {}", unknown(game.architect())).unwrap();
    writeln!(output, " - Successful: {successful}").unwrap();
    writeln!(output, " - Instruction level: {}", log.instruction_level().as_str()).unwrap();

    writeln!(output).unwrap();
    writeln!(output, "## Times").unwrap();
    writeln!(output, " - Start Time: {}", not_applicable(log.start_time().map(|t| t.to_rfc3339()))).unwrap();
    writeln!(output, " - Success Time: {}", not_applicable(log.success_time().map(|t| t.to_rfc3339()))).unwrap();
    writeln!(output, " - End Time: {}", not_applicable(log.end_time().map(|t| t.to_rfc3339()))).unwrap();
    writeln!(
        output,
        " - Experiment Duration: {}",
        not_applicable(log.time_to_success_secs().map(|s| format!("{s} seconds")))
    )
    .unwrap();
    writeln!(
        output,
        " - Total time logged in: {}",
        not_applicable(log.total_time_secs().map(|s| format!("{s} seconds")))
    )
    .unwrap();

    writeln!(output).unwrap();
    writeln!(output, "## Blocks").unwrap();
    writeln!(output, " - Number of blocks placed: {}", log.blocks_placed()).unwrap();
    writeln!(output, " - Number of blocks destroyed: {}", log.blocks_destroyed()).unwrap();
    writeln!(output, " - Number of mistakes: {}", log.mistakes(policy)).unwrap();

    writeln!(output).unwrap();
    writeln!(output, "# Duration per block").unwrap();
    for duration in log.block_placed_durations() {
        writeln!(output, " - {duration}ms").unwrap();
    }

    if successful {
        writeln!(output).unwrap();
        writeln!(output, "# Durations per High-level object").unwrap();
        match hlo {
            Some(Ok(report)) => {
                for entry in &report.entries {
                    writeln!(
                        output,
                        " - {} : {}ms ({} mistakes)",
                        entry.label, entry.duration_ms, entry.mistakes
                    )
                    .unwrap();
                }
                if report.was_reconciled() {
                    writeln!(output, " - reconciled: destroy events were ignored").unwrap();
                }
            }
            Some(Err(e)) => writeln!(output, " - analysis failed: {e}").unwrap(),
            None => writeln!(output, " - not analyzed").unwrap(),
        }

        writeln!(output).unwrap();
        writeln!(output, "# Durations per Instruction").unwrap();
        for instruction in log.instruction_durations() {
            writeln!(output, " - {} : {}ms", instruction.tree, instruction.duration_ms).unwrap();
        }
    }

    output
}

pub fn run(db: &Database, config: &Config, id: i64, json: bool) -> Result<()> {
    let game = load_game(db, id)?;
    let catalog = config.load_catalog(std::slice::from_ref(&game.record.scenario));
    let hlo = hlo_outcome(&game, &catalog);
    let policy = config.mistake_policy();

    if json {
        let summary = GameSummary::new(&game, policy, hlo.as_ref());
        println!("{}", serde_json::to_string_pretty(&summary)?);
    } else {
        print!("{}", format_game(&game, policy, hlo.as_ref()));
    }
    Ok(())
}
