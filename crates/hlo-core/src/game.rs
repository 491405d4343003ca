//! Per-game statistics over one decoded session log.

use chrono::{DateTime, Utc};
use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::attribution::{AttributionError, HloReport, attribute};
use crate::block::Block;
use crate::event::{Correction, EventKind, LogEvent, RawLogEntry, decode_log};
use crate::plan::PlanError;
use crate::scenario::{Scenario, ScenarioCatalog};
use crate::segment::{SegmentError, segment};

/// Errors from analyzing a single game.
#[derive(Debug, Error)]
pub enum AnalysisError {
    #[error("game was not successfully finished")]
    NotSuccessful,
    #[error(transparent)]
    Scenario(#[from] PlanError),
    #[error("segmentation failed: {0}")]
    Segment(#[from] SegmentError),
    #[error("attribution failed: {0}")]
    Attribution(#[from] AttributionError),
}

/// Which corrections count as mistakes.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MistakePolicy {
    /// Misplaced and missing block corrections.
    #[default]
    All,
    /// Only misplaced block corrections.
    MisplacedOnly,
}

impl MistakePolicy {
    pub const fn from_count_missing(count_missing: bool) -> Self {
        if count_missing {
            Self::All
        } else {
            Self::MisplacedOnly
        }
    }

    const fn counts(self, correction: Correction) -> bool {
        match (self, correction) {
            (Self::All, _) | (Self::MisplacedOnly, Correction::Misplaced) => true,
            (Self::MisplacedOnly, Correction::Missing) => false,
        }
    }
}

/// How the architect phrased its instructions in a game.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum InstructionLevel {
    Block,
    Teaching,
    HighLevel,
}

impl InstructionLevel {
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Block => "block",
            Self::Teaching => "teaching",
            Self::HighLevel => "highlevel",
        }
    }
}

/// Time from one new instruction to the next.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct InstructionDuration {
    /// Derivation tree of the instruction.
    pub tree: String,
    pub duration_ms: i64,
}

/// Block activity before a point in time.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct BlocksUntil {
    pub placed: Vec<Block>,
    pub destroyed: Vec<Block>,
    /// Placed blocks not destroyed again, in placement order.
    pub present: Vec<Block>,
}

/// One session's decoded log.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GameLog {
    events: Vec<LogEvent>,
    success_index: Option<usize>,
}

impl GameLog {
    /// Wraps events already sorted in occurrence order.
    pub fn new(events: Vec<LogEvent>) -> Self {
        let success_index = events.iter().position(LogEvent::is_game_finished);
        Self {
            events,
            success_index,
        }
    }

    pub fn from_entries<E: RawLogEntry>(entries: &[E]) -> Self {
        Self::new(decode_log(entries))
    }

    pub fn events(&self) -> &[LogEvent] {
        &self.events
    }

    pub const fn success_index(&self) -> Option<usize> {
        self.success_index
    }

    pub const fn was_successful(&self) -> bool {
        self.success_index.is_some()
    }

    pub fn start_time(&self) -> Option<DateTime<Utc>> {
        self.events.first().map(|e| e.timestamp)
    }

    pub fn end_time(&self) -> Option<DateTime<Utc>> {
        self.events.last().map(|e| e.timestamp)
    }

    pub fn success_time(&self) -> Option<DateTime<Utc>> {
        self.success_index.map(|i| self.events[i].timestamp)
    }

    /// Whole seconds from the first event to success.
    pub fn time_to_success_secs(&self) -> Option<i64> {
        Some((self.success_time()? - self.start_time()?).num_seconds())
    }

    /// Whole seconds from the first to the last event.
    pub fn total_time_secs(&self) -> Option<i64> {
        Some((self.end_time()? - self.start_time()?).num_seconds())
    }

    /// Events up to and including the success event, or all of them.
    fn until_success(&self) -> &[LogEvent] {
        match self.success_index {
            Some(i) => &self.events[..=i],
            None => &self.events,
        }
    }

    pub fn blocks_placed(&self) -> usize {
        self.until_success()
            .iter()
            .filter(|e| matches!(e.kind, EventKind::BlockPlaced { .. }))
            .count()
    }

    pub fn blocks_destroyed(&self) -> usize {
        self.until_success()
            .iter()
            .filter(|e| matches!(e.kind, EventKind::BlockDestroyed { .. }))
            .count()
    }

    pub fn mistakes(&self, policy: MistakePolicy) -> usize {
        self.until_success()
            .iter()
            .filter_map(|e| e.text()?.correction)
            .filter(|c| policy.counts(*c))
            .count()
    }

    /// Milliseconds from the start to the first placement, then between
    /// consecutive placements.
    pub fn block_placed_durations(&self) -> Vec<i64> {
        let Some(start) = self.start_time() else {
            return Vec::new();
        };
        let mut previous = start;
        self.events
            .iter()
            .filter(|e| matches!(e.kind, EventKind::BlockPlaced { .. }))
            .map(|e| {
                let duration = (e.timestamp - previous).num_milliseconds();
                previous = e.timestamp;
                duration
            })
            .collect()
    }

    /// Time spent on each new instruction sent to the player.
    ///
    /// Repeated and corrective instructions are skipped. The last open
    /// instruction is closed by the success event; unsuccessful games leave
    /// it out.
    pub fn instruction_durations(&self) -> Vec<InstructionDuration> {
        let mut durations = Vec::new();
        let mut open: Option<(&str, DateTime<Utc>)> = None;
        for event in &self.events {
            if event.is_game_finished() {
                if let Some((tree, since)) = open {
                    durations.push(InstructionDuration {
                        tree: tree.to_string(),
                        duration_ms: (event.timestamp - since).num_milliseconds(),
                    });
                }
                break;
            }
            if !event.to_client {
                continue;
            }
            let Some(instruction) = event.text().and_then(|t| t.instruction.as_ref()) else {
                continue;
            };
            if !instruction.is_new {
                continue;
            }
            if let Some((tree, since)) = open {
                durations.push(InstructionDuration {
                    tree: tree.to_string(),
                    duration_ms: (event.timestamp - since).num_milliseconds(),
                });
            }
            open = Some((&instruction.tree, event.timestamp));
        }
        durations
    }

    pub fn instruction_level(&self) -> InstructionLevel {
        let texts = || self.events.iter().filter_map(LogEvent::text);
        if texts().any(|t| t.text.contains("teach you")) {
            InstructionLevel::Teaching
        } else if texts().any(|t| t.text.contains("a wall") || t.text.contains("a floor")) {
            InstructionLevel::HighLevel
        } else {
            InstructionLevel::Block
        }
    }

    /// Block activity strictly before `until`.
    ///
    /// A destroy removes the earliest matching entry from `present`.
    pub fn blocks_until(&self, until: DateTime<Utc>) -> BlocksUntil {
        let mut result = BlocksUntil::default();
        for event in self.events.iter().take_while(|e| e.timestamp < until) {
            match event.kind {
                EventKind::BlockPlaced { block } => {
                    result.placed.push(block);
                    result.present.push(block);
                }
                EventKind::BlockDestroyed { block } => {
                    result.destroyed.push(block);
                    if let Some(pos) = result.present.iter().position(|b| *b == block) {
                        result.present.remove(pos);
                    }
                }
                _ => {}
            }
        }
        result
    }

    /// Segments the log against the scenario's plan and attributes time and
    /// mistakes to each HLO.
    pub fn hlo_report(&self, scenario: &Scenario) -> Result<HloReport, AnalysisError> {
        if !self.was_successful() {
            return Err(AnalysisError::NotSuccessful);
        }
        let segmentation = segment(&self.events, scenario.plan())?;
        Ok(attribute(&segmentation, scenario.labels())?)
    }
}

/// A game ready for batch analysis.
#[derive(Debug, Clone)]
pub struct Session {
    pub game_id: i64,
    pub scenario: String,
    pub log: GameLog,
}

/// Outcome of analyzing one session in a batch.
#[derive(Debug)]
pub struct SessionOutcome {
    pub game_id: i64,
    pub report: Result<HloReport, AnalysisError>,
}

/// Computes HLO reports for many sessions in parallel.
///
/// Failures are logged and returned per session; they never stop the batch.
/// Output order matches input order.
pub fn analyze_sessions(sessions: &[Session], catalog: &ScenarioCatalog) -> Vec<SessionOutcome> {
    sessions
        .par_iter()
        .map(|session| {
            let report = catalog
                .get(&session.scenario)
                .map_err(AnalysisError::from)
                .and_then(|scenario| session.log.hlo_report(scenario));
            match &report {
                Err(AnalysisError::Segment(e)) if e.is_inconsistent_success() => {
                    tracing::error!(
                        game_id = session.game_id,
                        error = %e,
                        "log contradicts its success state, skipping HLO analysis"
                    );
                }
                Err(e) => {
                    tracing::warn!(game_id = session.game_id, error = %e, "skipping HLO analysis");
                }
                Ok(_) => {}
            }
            SessionOutcome {
                game_id: session.game_id,
                report,
            }
        })
        .collect()
}
