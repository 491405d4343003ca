//! HLO segmentation.
//!
//! Replays a game log against a [`Plan`] and records when each goal is first
//! complete, together with the number of mistakes made up to that point.
//!
//! # Algorithm Summary
//!
//! 1. Start from the plan's initial world with zero mistakes
//! 2. Apply each event: placements add, destroys remove, corrections count as
//!    mistakes, the first instruction starts the clock
//! 3. After every event, complete each pending goal whose blocks are all present
//! 4. If a goal is still pending at the end, replay once more ignoring destroy
//!    events (see [`TrackingMode`]); if that also fails, report the unresolved goals

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::event::{EventKind, LogEvent};
use crate::plan::Plan;
use crate::world::WorldState;

/// How destroy events are applied during a pass.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TrackingMode {
    /// Destroy events remove blocks.
    Normal,
    /// Destroy events are discarded.
    ///
    /// Some logs record a place/destroy/place sequence as place/place/destroy,
    /// so the world we replay ends up without a block that was present
    /// during the game. Ignoring destroys recovers the final occupancy at the
    /// cost of never seeing a block actually go away.
    IgnoreDestroy,
}

impl TrackingMode {
    /// The mode to retry with after an incomplete pass, if any.
    pub const fn fallback(self) -> Option<Self> {
        match self {
            Self::Normal => Some(Self::IgnoreDestroy),
            Self::IgnoreDestroy => None,
        }
    }
}

/// When a goal was first complete.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct GoalCompletion {
    pub timestamp: DateTime<Utc>,
    /// Mistakes made in the session up to this completion.
    pub mistakes: u32,
}

/// A fully resolved segmentation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Segmentation {
    /// One completion per goal, in plan order.
    pub completions: Vec<GoalCompletion>,
    /// Timestamp of the first instruction with a derivation tree.
    pub first_instruction: DateTime<Utc>,
    /// The mode of the pass that resolved every goal.
    pub mode: TrackingMode,
}

/// Segmentation failures.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SegmentError {
    /// Goals stayed incomplete even with destroy events ignored.
    ///
    /// `finished` is set when the log claims the game was successfully
    /// finished, which points at log corruption rather than an abandoned game.
    #[error("{}", describe_unresolved(.unresolved, *.finished))]
    Unresolved { unresolved: Vec<usize>, finished: bool },
    /// Every goal completed but no instruction was ever given.
    #[error("no instruction with a derivation tree found in the log")]
    MissingFirstInstruction,
}

impl SegmentError {
    /// True for a log marked successful whose goals cannot all be resolved.
    pub const fn is_inconsistent_success(&self) -> bool {
        matches!(self, Self::Unresolved { finished: true, .. })
    }
}

fn describe_unresolved(unresolved: &[usize], finished: bool) -> String {
    let goals = unresolved
        .iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join(", ");
    if finished {
        format!("game is marked successful but goals [{goals}] were never completed")
    } else {
        format!("goals [{goals}] were never completed")
    }
}

/// State of one replay of the log.
#[derive(Debug)]
struct Pass<'a> {
    plan: &'a Plan,
    mode: TrackingMode,
    world: WorldState,
    mistakes: u32,
    first_instruction: Option<DateTime<Utc>>,
    completions: Vec<Option<GoalCompletion>>,
    finished: bool,
}

impl<'a> Pass<'a> {
    fn new(plan: &'a Plan, mode: TrackingMode) -> Self {
        Self {
            plan,
            mode,
            world: WorldState::from_snapshot(plan.initial_world()),
            mistakes: 0,
            first_instruction: None,
            completions: vec![None; plan.goals().len()],
            finished: false,
        }
    }

    fn apply(&mut self, event: &LogEvent) {
        match &event.kind {
            EventKind::BlockPlaced { block } => self.world.add(*block),
            EventKind::BlockDestroyed { block } => match self.mode {
                TrackingMode::Normal => self.world.remove(*block),
                TrackingMode::IgnoreDestroy => {}
            },
            EventKind::Text(text) => {
                if self.first_instruction.is_none() && text.instruction.is_some() {
                    self.first_instruction = Some(event.timestamp);
                }
                if text.correction.is_some() {
                    self.mistakes += 1;
                }
            }
            EventKind::GameFinished => {
                self.finished = true;
                // The game only finishes once the structure is complete.
                if let Some(last @ None) = self.completions.last_mut() {
                    *last = Some(GoalCompletion {
                        timestamp: event.timestamp,
                        mistakes: self.mistakes,
                    });
                }
            }
            EventKind::Other => {}
        }

        for (index, goal) in self.plan.goals().iter().enumerate() {
            if self.completions[index].is_none() && self.world.contains_all(goal) {
                tracing::debug!(
                    goal = index,
                    timestamp = %event.timestamp,
                    mistakes = self.mistakes,
                    "goal completed"
                );
                self.completions[index] = Some(GoalCompletion {
                    timestamp: event.timestamp,
                    mistakes: self.mistakes,
                });
            }
        }
    }

    fn unresolved(&self) -> Vec<usize> {
        self.completions
            .iter()
            .enumerate()
            .filter_map(|(index, c)| c.is_none().then_some(index))
            .collect()
    }

    fn into_segmentation(self) -> Result<Segmentation, SegmentError> {
        let completions: Vec<GoalCompletion> = self.completions.into_iter().flatten().collect();
        let first_instruction = self
            .first_instruction
            .ok_or(SegmentError::MissingFirstInstruction)?;
        Ok(Segmentation {
            completions,
            first_instruction,
            mode: self.mode,
        })
    }
}

/// Replays `events` against `plan` once in the given mode.
///
/// Returns the pass state so callers can inspect unresolved goals.
fn replay<'a>(events: &[LogEvent], plan: &'a Plan, mode: TrackingMode) -> Pass<'a> {
    let mut pass = Pass::new(plan, mode);
    for event in events {
        pass.apply(event);
    }
    pass
}

/// Segments a game log into goal completions.
///
/// Events must be sorted by occurrence. At most two passes are made: a
/// [`TrackingMode::Normal`] pass and, only if it leaves a goal incomplete,
/// a [`TrackingMode::IgnoreDestroy`] pass.
pub fn segment(events: &[LogEvent], plan: &Plan) -> Result<Segmentation, SegmentError> {
    let mut mode = TrackingMode::Normal;
    loop {
        let pass = replay(events, plan, mode);
        let unresolved = pass.unresolved();
        if unresolved.is_empty() {
            return pass.into_segmentation();
        }

        let Some(next) = mode.fallback() else {
            tracing::error!(
                ?unresolved,
                finished = pass.finished,
                "segmentation failed after ignoring destroy events"
            );
            return Err(SegmentError::Unresolved {
                unresolved,
                finished: pass.finished,
            });
        };
        tracing::warn!(
            ?unresolved,
            "goals incomplete, replaying log with destroy events ignored"
        );
        mode = next;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::block::Block;
    use crate::event::tests::ts;
    use crate::event::{Correction, Instruction, TextMessage};
    use crate::plan::Goal;

    fn event(seconds: i64, kind: EventKind) -> LogEvent {
        LogEvent {
            seq: seconds,
            timestamp: ts(seconds),
            to_client: true,
            kind,
        }
    }

    fn place(seconds: i64, x: i32, y: i32, z: i32) -> LogEvent {
        event(
            seconds,
            EventKind::BlockPlaced {
                block: Block::new(x, y, z),
            },
        )
    }

    fn destroy(seconds: i64, x: i32, y: i32, z: i32) -> LogEvent {
        event(
            seconds,
            EventKind::BlockDestroyed {
                block: Block::new(x, y, z),
            },
        )
    }

    fn instruction(seconds: i64) -> LogEvent {
        event(
            seconds,
            EventKind::Text(TextMessage {
                text: "{}".to_string(),
                instruction: Some(Instruction {
                    tree: "(t)".to_string(),
                    is_new: true,
                }),
                correction: None,
            }),
        )
    }

    fn correction(seconds: i64) -> LogEvent {
        event(
            seconds,
            EventKind::Text(TextMessage {
                text: crate::event::MISPLACED_BLOCK_TEXT.to_string(),
                instruction: None,
                correction: Some(Correction::Misplaced),
            }),
        )
    }

    fn finished(seconds: i64) -> LogEvent {
        event(seconds, EventKind::GameFinished)
    }

    fn two_goal_plan() -> Plan {
        Plan::new(
            "test",
            vec![
                Goal::new([Block::new(0, 0, 0), Block::new(1, 0, 0)]),
                Goal::new([Block::new(0, 0, 1)]),
            ],
            [],
        )
        .unwrap()
    }

    #[test]
    fn test_goals_complete_in_order() {
        let events = vec![
            instruction(0),
            place(1, 0, 0, 0),
            place(2, 1, 0, 0),
            place(3, 0, 0, 1),
            finished(4),
        ];

        let seg = segment(&events, &two_goal_plan()).unwrap();

        assert_eq!(seg.mode, TrackingMode::Normal);
        assert_eq!(seg.first_instruction, ts(0));
        assert_eq!(seg.completions[0].timestamp, ts(2));
        assert_eq!(seg.completions[1].timestamp, ts(3));
    }

    #[test]
    fn test_mistakes_are_recorded_at_completion() {
        let events = vec![
            instruction(0),
            place(1, 5, 5, 5),
            correction(2),
            destroy(3, 5, 5, 5),
            place(4, 0, 0, 0),
            place(5, 1, 0, 0),
            correction(6),
            place(7, 0, 0, 1),
        ];

        let seg = segment(&events, &two_goal_plan()).unwrap();

        assert_eq!(seg.completions[0].mistakes, 1);
        assert_eq!(seg.completions[1].mistakes, 2);
    }

    #[test]
    fn test_out_of_order_destroy_is_tolerated_by_counting() {
        // place, place, destroy for the same block: still present.
        let events = vec![
            instruction(0),
            place(1, 0, 0, 0),
            place(2, 0, 0, 0),
            destroy(3, 0, 0, 0),
            place(4, 1, 0, 0),
            place(5, 0, 0, 1),
        ];

        let seg = segment(&events, &two_goal_plan()).unwrap();

        assert_eq!(seg.mode, TrackingMode::Normal);
        assert_eq!(seg.completions[0].timestamp, ts(4));
    }

    #[test]
    fn test_spurious_destroy_triggers_single_retry() {
        // The block at (0,0,0) is destroyed before the goal is checked and never
        // placed again: only the ignore-destroy pass can resolve goal 0.
        let events = vec![
            instruction(0),
            place(1, 0, 0, 0),
            destroy(2, 0, 0, 0),
            place(3, 1, 0, 0),
            place(4, 0, 0, 1),
        ];

        let seg = segment(&events, &two_goal_plan()).unwrap();

        assert_eq!(seg.mode, TrackingMode::IgnoreDestroy);
        assert_eq!(seg.completions[0].timestamp, ts(3));
        assert_eq!(seg.completions[1].timestamp, ts(4));
    }

    #[test]
    fn test_game_finished_forces_last_goal() {
        let events = vec![
            instruction(0),
            place(1, 0, 0, 0),
            place(2, 1, 0, 0),
            correction(3),
            finished(4),
        ];

        let seg = segment(&events, &two_goal_plan()).unwrap();

        assert_eq!(
            seg.completions[1],
            GoalCompletion {
                timestamp: ts(4),
                mistakes: 1
            }
        );
    }

    #[test]
    fn test_unplaced_block_fails_with_goal_index() {
        let events = vec![instruction(0), place(1, 0, 0, 1)];

        let err = segment(&events, &two_goal_plan()).unwrap_err();

        assert_eq!(
            err,
            SegmentError::Unresolved {
                unresolved: vec![0],
                finished: false
            }
        );
        assert_eq!(err.to_string(), "goals [0] were never completed");
        assert!(!err.is_inconsistent_success());
    }

    #[test]
    fn test_finished_game_with_unresolved_goal_is_inconsistent() {
        let events = vec![instruction(0), place(1, 0, 0, 0), finished(2)];

        let err = segment(&events, &two_goal_plan()).unwrap_err();

        assert!(err.is_inconsistent_success());
        assert_eq!(
            err.to_string(),
            "game is marked successful but goals [0] were never completed"
        );
    }

    #[test]
    fn test_missing_instruction_is_reported() {
        let events = vec![place(1, 0, 0, 0), place(2, 1, 0, 0), place(3, 0, 0, 1)];

        let err = segment(&events, &two_goal_plan()).unwrap_err();

        assert_eq!(err, SegmentError::MissingFirstInstruction);
    }

    #[test]
    fn test_initial_world_counts_towards_goals() {
        let plan = Plan::new(
            "test",
            vec![Goal::new([Block::new(0, 0, 0), Block::new(9, 9, 9)])],
            [Block::new(9, 9, 9)],
        )
        .unwrap();
        let events = vec![instruction(0), place(1, 0, 0, 0)];

        let seg = segment(&events, &plan).unwrap();

        assert_eq!(seg.completions[0].timestamp, ts(1));
    }

    #[test]
    fn test_completions_are_monotonic() {
        let events = vec![
            instruction(0),
            place(1, 0, 0, 0),
            correction(2),
            place(3, 1, 0, 0),
            correction(4),
            place(5, 0, 0, 1),
        ];

        let seg = segment(&events, &two_goal_plan()).unwrap();

        for pair in seg.completions.windows(2) {
            assert!(pair[0].timestamp <= pair[1].timestamp);
            assert!(pair[0].mistakes <= pair[1].mistakes);
        }
        assert_eq!(seg.completions.last().unwrap().mistakes, 2);
    }

    #[test]
    fn test_segmentation_is_deterministic() {
        let events = vec![
            instruction(0),
            place(1, 0, 0, 0),
            destroy(2, 0, 0, 0),
            place(3, 1, 0, 0),
            place(4, 0, 0, 1),
        ];
        let plan = two_goal_plan();

        assert_eq!(segment(&events, &plan), segment(&events, &plan));
    }
}
