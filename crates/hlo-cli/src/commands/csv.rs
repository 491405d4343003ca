//! CSV command: one line per game for statistical analysis.
//!
//! Columns are the game's fixed figures, then `HLO0..` durations (ms) and
//! `HLOmistakes0..` counts, then numeric questionnaire answers sorted by
//! question. Unavailable values are written as `NA`. Question texts are
//! listed as `# QuestionN:` comment lines above the header.

use std::collections::HashMap;
use std::fmt::Write;

use anyhow::Result;
use hlo_core::{AnalysisError, HloDuration, HloReport, MistakePolicy};
use hlo_db::Database;

use super::analyze::hlo_reports;
use super::util::{LoadedGame, load_games, or_na};
use crate::Config;

/// CSV layout shared by the header and every line.
#[derive(Debug, Clone)]
pub struct CsvLayout<'a> {
    pub separator: &'a str,
    pub hlo_columns: usize,
    /// Numeric questions, sorted.
    pub questions: Vec<String>,
}

impl<'a> CsvLayout<'a> {
    /// Collects the numeric questions asked in any game.
    pub fn new(separator: &'a str, hlo_columns: usize, games: &[LoadedGame]) -> Self {
        let mut questions: Vec<String> = games
            .iter()
            .flat_map(|g| &g.answers)
            .filter(|a| a.is_numeric())
            .map(|a| a.question.clone())
            .collect();
        questions.sort();
        questions.dedup();
        Self {
            separator,
            hlo_columns,
            questions,
        }
    }

    pub fn header(&self) -> String {
        let mut output = String::new();
        for (idx, question) in self.questions.iter().enumerate() {
            writeln!(output, "# Question{idx}: {question}").unwrap();
        }
        let mut columns: Vec<String> = [
            "gameid",
            "scenario",
            "architect",
            "wasSuccessful",
            "timeToSuccess",
            "numBlocksPlaced",
            "numBlocksDestroyed",
            "numMistakes",
        ]
        .map(String::from)
        .to_vec();
        columns.extend((0..self.hlo_columns).map(|i| format!("HLO{i}")));
        columns.extend((0..self.hlo_columns).map(|i| format!("HLOmistakes{i}")));
        columns.extend((0..self.questions.len()).map(|i| format!("Question{i}")));
        writeln!(output, "{}", columns.join(self.separator)).unwrap();
        output
    }

    pub fn line(
        &self,
        game: &LoadedGame,
        policy: MistakePolicy,
        hlo: Option<&Result<HloReport, AnalysisError>>,
    ) -> String {
        let log = &game.log;
        let mut fields = vec![
            game.record.id.to_string(),
            game.record.scenario.clone(),
            or_na(game.architect()),
            log.was_successful().to_string(),
            or_na(log.time_to_success_secs()),
            log.blocks_placed().to_string(),
            log.blocks_destroyed().to_string(),
            log.mistakes(policy).to_string(),
        ];

        let entries: &[HloDuration] = match hlo {
            Some(Ok(report)) => report.entries.as_slice(),
            _ => &[],
        };
        fields.extend((0..self.hlo_columns).map(|i| or_na(entries.get(i).map(|e| e.duration_ms))));
        fields.extend((0..self.hlo_columns).map(|i| or_na(entries.get(i).map(|e| e.mistakes))));

        let answers: HashMap<&str, i64> = game
            .answers
            .iter()
            .filter_map(|a| Some((a.question.as_str(), a.numeric_value()?)))
            .collect();
        fields.extend(
            self.questions
                .iter()
                .map(|q| or_na(answers.get(q.as_str()))),
        );

        let mut output = fields.join(self.separator);
        output.push('\n');
        output
    }
}

/// Formats the whole CSV document.
pub fn format_csv(
    games: &[LoadedGame],
    reports: &HashMap<i64, Result<HloReport, AnalysisError>>,
    separator: &str,
    hlo_columns: usize,
    policy: MistakePolicy,
) -> String {
    let layout = CsvLayout::new(separator, hlo_columns, games);
    let mut output = layout.header();
    for game in games {
        output.push_str(&layout.line(game, policy, reports.get(&game.record.id)));
    }
    output
}

pub fn run(db: &Database, config: &Config, separator: &str) -> Result<()> {
    let games = load_games(db)?;
    let reports = hlo_reports(&games, config);
    print!(
        "{}",
        format_csv(
            &games,
            &reports,
            separator,
            config.hlo_columns,
            config.mistake_policy()
        )
    );
    Ok(())
}
