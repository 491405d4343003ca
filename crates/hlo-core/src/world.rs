//! Block occupancy tracking.

use std::collections::HashMap;

use crate::block::Block;
use crate::plan::Goal;

/// Occupancy count per block.
///
/// Presence is a count rather than a flag: some logs record a
/// place/destroy/place sequence for one position as place/place/destroy.
/// Counting keeps that block present (1 + 1 - 1 = 1) while ordinary
/// place/destroy pairs still cancel. Removing an absent block is a no-op,
/// so counts never go negative.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct WorldState {
    counts: HashMap<Block, u32>,
}

impl WorldState {
    pub fn new() -> Self {
        Self::default()
    }

    /// Builds a world with every snapshot block present once.
    pub fn from_snapshot<'a>(blocks: impl IntoIterator<Item = &'a Block>) -> Self {
        let mut world = Self::new();
        for block in blocks {
            world.add(*block);
        }
        world
    }

    pub fn add(&mut self, block: Block) {
        *self.counts.entry(block).or_insert(0) += 1;
    }

    pub fn remove(&mut self, block: Block) {
        if let Some(count) = self.counts.get_mut(&block) {
            *count = count.saturating_sub(1);
            if *count == 0 {
                self.counts.remove(&block);
            }
        }
    }

    pub fn count(&self, block: Block) -> u32 {
        self.counts.get(&block).copied().unwrap_or(0)
    }

    pub fn contains(&self, block: Block) -> bool {
        self.count(block) > 0
    }

    /// True iff every block of the goal is present.
    pub fn contains_all(&self, goal: &Goal) -> bool {
        goal.blocks().all(|block| self.contains(*block))
    }
}
