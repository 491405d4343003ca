//! Core domain logic for build-session HLO analysis.
//!
//! This crate contains the fundamental types and logic for:
//! - Plans: goals (block sets) per high-level object, in build order
//! - Segmentation: replaying a session log to find when each goal completed
//! - Attribution: time and mistakes spent per high-level object
//! - Game statistics and cross-game aggregation

pub mod aggregate;
mod attribution;
mod block;
pub mod event;
pub mod game;
pub mod plan;
pub mod scenario;
mod segment;
mod world;

pub use aggregate::{Aggregate, Answer, AnswerStats, GameOverview};
pub use attribution::{AttributionError, HloDuration, HloReport, attribute};
pub use block::{Axis, Block, MalformedPayload};
pub use event::{EventKind, LogEvent, RawLogEntry, decode_log};
pub use game::{
    AnalysisError, BlocksUntil, GameLog, InstructionDuration, InstructionLevel, MistakePolicy,
    Session, SessionOutcome, analyze_sessions,
};
pub use plan::{Goal, Plan, PlanError, PlanFormat};
pub use scenario::{Scenario, ScenarioCatalog, ScenarioConfig};
pub use segment::{GoalCompletion, SegmentError, Segmentation, TrackingMode, segment};
pub use world::WorldState;
