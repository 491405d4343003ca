//! Per-HLO duration and mistake attribution.
//!
//! Turns a [`Segmentation`] into one entry per goal: time and mistakes spent
//! since the previous goal completed (or since the first instruction, for
//! the first goal).

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::segment::{Segmentation, TrackingMode};

/// Attribution failures. Values are never clamped.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum AttributionError {
    #[error("{goals} goals but {labels} labels")]
    LabelMismatch { goals: usize, labels: usize },
    #[error("HLO {index} ({label}) has negative duration {duration_ms} ms")]
    NegativeDuration {
        index: usize,
        label: String,
        duration_ms: i64,
    },
    #[error("HLO {index} ({label}) has negative mistake delta {delta}")]
    NegativeMistakeDelta {
        index: usize,
        label: String,
        delta: i64,
    },
}

/// Time and mistakes attributed to one HLO.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HloDuration {
    pub label: String,
    pub duration_ms: i64,
    pub mistakes: u32,
}

/// Attribution of a whole session.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HloReport {
    pub entries: Vec<HloDuration>,
    /// Last completion minus first instruction.
    pub total_duration_ms: i64,
    /// Mistakes up to the last completion.
    pub total_mistakes: u32,
    /// The replay mode that resolved every goal.
    pub mode: TrackingMode,
}

impl HloReport {
    /// True if destroy events had to be ignored to resolve the goals.
    pub fn was_reconciled(&self) -> bool {
        self.mode == TrackingMode::IgnoreDestroy
    }
}

/// Attributes durations and mistakes to each labelled goal.
pub fn attribute(
    segmentation: &Segmentation,
    labels: &[String],
) -> Result<HloReport, AttributionError> {
    let completions = &segmentation.completions;
    if completions.len() != labels.len() {
        return Err(AttributionError::LabelMismatch {
            goals: completions.len(),
            labels: labels.len(),
        });
    }

    let mut entries = Vec::with_capacity(labels.len());
    let mut previous_time = segmentation.first_instruction;
    let mut previous_mistakes = 0;
    for (index, (completion, label)) in completions.iter().zip(labels).enumerate() {
        let duration_ms = (completion.timestamp - previous_time).num_milliseconds();
        if duration_ms < 0 {
            return Err(AttributionError::NegativeDuration {
                index,
                label: label.clone(),
                duration_ms,
            });
        }
        let delta = i64::from(completion.mistakes) - i64::from(previous_mistakes);
        let Ok(mistakes) = u32::try_from(delta) else {
            return Err(AttributionError::NegativeMistakeDelta {
                index,
                label: label.clone(),
                delta,
            });
        };

        entries.push(HloDuration {
            label: label.clone(),
            duration_ms,
            mistakes,
        });
        previous_time = completion.timestamp;
        previous_mistakes = completion.mistakes;
    }

    let (total_duration_ms, total_mistakes) = completions.last().map_or((0, 0), |last| {
        (
            (last.timestamp - segmentation.first_instruction).num_milliseconds(),
            last.mistakes,
        )
    });

    Ok(HloReport {
        entries,
        total_duration_ms,
        total_mistakes,
        mode: segmentation.mode,
    })
}
