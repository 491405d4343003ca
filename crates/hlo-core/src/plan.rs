//! Build plans: ordered goals plus the initial world.
//!
//! Two plan formats exist. Block plans list primitive placements grouped by
//! `-starting`/`-finished` markers; high-level plans list `!build-*` steps,
//! each expanding to hidden block placements. Both normalize to the same
//! [`Plan`] so the segmenter never sees the difference.

use std::collections::BTreeSet;
use std::path::PathBuf;
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::block::Block;

/// Errors raised while loading plans and scenarios.
#[derive(Debug, Clone, Error)]
pub enum PlanError {
    /// A plan or world file could not be read.
    #[error("failed to read {}", .path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: Arc<std::io::Error>,
    },
    /// A plan or world line could not be parsed.
    #[error("{source_name}:{line}: {message}")]
    Parse {
        source_name: String,
        line: usize,
        message: String,
    },
    /// A plan without any goal.
    #[error("plan {0} has no goals")]
    EmptyPlan(String),
    /// No scenario with this name is configured.
    #[error("unknown scenario: {0}")]
    UnknownScenario(String),
    /// The label mapping does not cover the plan's goals one-to-one.
    #[error("scenario {scenario} has {goals} goals but {labels} labels")]
    LabelMismatch {
        scenario: String,
        goals: usize,
        labels: usize,
    },
}

/// The exact set of blocks that completes one HLO.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Goal {
    blocks: BTreeSet<Block>,
}

impl Goal {
    pub fn new(blocks: impl IntoIterator<Item = Block>) -> Self {
        Self {
            blocks: blocks.into_iter().collect(),
        }
    }

    pub fn blocks(&self) -> impl Iterator<Item = &Block> {
        self.blocks.iter()
    }

    pub fn contains(&self, block: &Block) -> bool {
        self.blocks.contains(block)
    }

    pub fn len(&self) -> usize {
        self.blocks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.blocks.is_empty()
    }
}

/// Ordered goals for one scenario plus the blocks present before the session.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Plan {
    goals: Vec<Goal>,
    initial_world: BTreeSet<Block>,
}

impl Plan {
    pub fn new(
        name: &str,
        goals: Vec<Goal>,
        initial_world: impl IntoIterator<Item = Block>,
    ) -> Result<Self, PlanError> {
        if goals.is_empty() {
            return Err(PlanError::EmptyPlan(name.to_string()));
        }
        Ok(Self {
            goals,
            initial_world: initial_world.into_iter().collect(),
        })
    }

    /// Goals in build order.
    pub fn goals(&self) -> &[Goal] {
        &self.goals
    }

    pub fn initial_world(&self) -> &BTreeSet<Block> {
        &self.initial_world
    }
}

/// On-disk plan representation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PlanFormat {
    /// Primitive `!place-block` steps grouped by `-starting`/`-finished`.
    Block,
    /// `!build-*` steps expanding to `!place-block-hidden` steps.
    Highlevel,
}

impl PlanFormat {
    /// Parses plan text into goals.
    pub fn parse(self, text: &str, source_name: &str) -> Result<Vec<Goal>, PlanError> {
        match self {
            Self::Block => parse_block_plan(text, source_name),
            Self::Highlevel => parse_highlevel_plan(text, source_name),
        }
    }
}

/// Parses a block-level plan.
pub fn parse_block_plan(text: &str, source_name: &str) -> Result<Vec<Goal>, PlanError> {
    let mut goals = Vec::new();
    let mut current = Vec::new();
    for (idx, step) in text.lines().enumerate() {
        if step.contains("-starting") {
            current = Vec::new();
        } else if step.contains("!place-block") {
            current.push(parse_step_block(step, source_name, idx + 1)?);
        } else if step.contains("-finished") {
            goals.push(Goal::new(current.iter().copied()));
        }
    }
    Ok(goals)
}

/// Parses a high-level plan.
pub fn parse_highlevel_plan(text: &str, source_name: &str) -> Result<Vec<Goal>, PlanError> {
    let mut goals = Vec::new();
    let mut current: Vec<Block> = Vec::new();
    for (idx, step) in text.lines().enumerate() {
        if step.contains("!build-") {
            if !current.is_empty() {
                goals.push(Goal::new(current.drain(..)));
            }
        } else if step.contains("!place-block-hidden") {
            current.push(parse_step_block(step, source_name, idx + 1)?);
        }
    }
    goals.push(Goal::new(current));
    Ok(goals)
}

/// Parses the initial world CSV (`x,y,z[,...]`, `#` comments).
pub fn parse_initial_world(text: &str, source_name: &str) -> Result<BTreeSet<Block>, PlanError> {
    let mut blocks = BTreeSet::new();
    for (idx, line) in text.lines().enumerate() {
        let line = line.trim();
        if line.is_empty() || line.starts_with('#') {
            continue;
        }
        let mut fields = line.split(',').map(str::trim);
        let mut coord = |axis: &str| -> Result<i32, PlanError> {
            let field = fields.next().ok_or_else(|| PlanError::Parse {
                source_name: source_name.to_string(),
                line: idx + 1,
                message: format!("missing {axis} coordinate"),
            })?;
            field.parse().map_err(|_| PlanError::Parse {
                source_name: source_name.to_string(),
                line: idx + 1,
                message: format!("invalid {axis} coordinate: {field}"),
            })
        };
        let x = coord("x")?;
        let y = coord("y")?;
        let z = coord("z")?;
        blocks.insert(Block::new(x, y, z));
    }
    Ok(blocks)
}

/// Reads the coordinates of a placement step, e.g. `(!place-block stone 3.0 64.0 2.0)`.
#[allow(clippy::cast_possible_truncation)]
fn parse_step_block(step: &str, source_name: &str, line: usize) -> Result<Block, PlanError> {
    let tokens: Vec<&str> = step.split_whitespace().collect();
    let coord = |pos: usize| -> Result<i32, PlanError> {
        let token = tokens
            .get(pos)
            .map(|t| t.trim_end_matches(')'))
            .ok_or_else(|| PlanError::Parse {
                source_name: source_name.to_string(),
                line,
                message: format!("expected coordinate at token {pos}: {step}"),
            })?;
        token
            .parse::<f64>()
            .map(|v| v as i32)
            .map_err(|_| PlanError::Parse {
                source_name: source_name.to_string(),
                line,
                message: format!("invalid coordinate {token:?}"),
            })
    };
    Ok(Block::new(coord(2)?, coord(3)?, coord(4)?))
}
