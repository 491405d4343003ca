//! Block coordinates and block-event payload decoding.

use std::fmt;

use serde::{Deserialize, Serialize};
use serde_json::Value;
use thiserror::Error;

/// A block position in the world.
///
/// Blocks are compared, hashed and ordered by value. Two events for the
/// same coordinates refer to the same block regardless of block type.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct Block {
    pub x: i32,
    pub y: i32,
    pub z: i32,
}

impl Block {
    pub const fn new(x: i32, y: i32, z: i32) -> Self {
        Self { x, y, z }
    }

    /// Decodes a block from a `BlockPlacedMessage`/`BlockDestroyedMessage` payload.
    ///
    /// Payloads are JSON objects with integer `x`, `y` and `z` fields. Old logs
    /// sometimes lack a coordinate; the missing axes default to zero and are
    /// reported through [`MalformedPayload`], which still carries the
    /// recovered block.
    pub fn from_payload(payload: &str) -> Result<Self, MalformedPayload> {
        let json: Value = serde_json::from_str(payload).unwrap_or(Value::Null);
        let mut missing = Vec::new();
        let mut axis = |axis: Axis| {
            json.get(axis.as_str())
                .and_then(Value::as_i64)
                .and_then(|v| i32::try_from(v).ok())
                .unwrap_or_else(|| {
                    missing.push(axis);
                    0
                })
        };
        let block = Self::new(axis(Axis::X), axis(Axis::Y), axis(Axis::Z));

        if missing.is_empty() {
            Ok(block)
        } else {
            Err(MalformedPayload {
                recovered: block,
                missing,
            })
        }
    }
}

impl fmt::Display for Block {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "({}, {}, {})", self.x, self.y, self.z)
    }
}

/// A coordinate axis.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Axis {
    X,
    Y,
    Z,
}

impl Axis {
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::X => "x",
            Self::Y => "y",
            Self::Z => "z",
        }
    }
}

/// A block payload with one or more missing coordinates.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("block payload is missing {}", missing_axes(.missing))]
pub struct MalformedPayload {
    /// The block with missing axes set to zero.
    pub recovered: Block,
    /// Which axes were absent or not integers.
    pub missing: Vec<Axis>,
}

fn missing_axes(axes: &[Axis]) -> String {
    axes.iter().map(|a| a.as_str()).collect::<Vec<_>>().join(", ")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_decodes_complete_payload() {
        let block = Block::from_payload(r#"{"x": 3, "y": 64, "z": -2, "type": "STONE"}"#).unwrap();
        assert_eq!(block, Block::new(3, 64, -2));
    }

    #[test]
    fn test_missing_axis_defaults_to_zero() {
        let err = Block::from_payload(r#"{"x": 3, "z": 7}"#).unwrap_err();
        assert_eq!(err.recovered, Block::new(3, 0, 7));
        assert_eq!(err.missing, vec![Axis::Y]);
        assert_eq!(err.to_string(), "block payload is missing y");
    }

    #[test]
    fn test_unparseable_payload_recovers_origin() {
        let err = Block::from_payload("not json").unwrap_err();
        assert_eq!(err.recovered, Block::new(0, 0, 0));
        assert_eq!(err.missing, vec![Axis::X, Axis::Y, Axis::Z]);
    }

    #[test]
    fn test_display_formats_coordinates() {
        assert_eq!(Block::new(1, -2, 3).to_string(), "(1, -2, 3)");
    }
}
