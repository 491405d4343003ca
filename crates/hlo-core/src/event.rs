//! Game log events and their decoding from raw log rows.

use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::block::Block;

/// Text the architect sends when a block was placed where it does not belong.
pub const MISPLACED_BLOCK_TEXT: &str = "Not there! please remove that block again";

/// Text the architect sends when a required block was removed.
pub const MISSING_BLOCK_TEXT: &str = "Please add this block again.";

/// Game state reported once the structure is complete.
const SUCCESS_STATE: &str = "SuccessfullyFinished";

/// Direction of messages forwarded from the architect to the player.
const TO_CLIENT_DIRECTION: &str = "PassToClient";

/// A raw row from a game log store.
///
/// This trait lets decoding work with different row representations
/// (e.g. `LogRecord` from hlo-db, or test fixtures).
pub trait RawLogEntry {
    /// Position of the row in the log (ascending in occurrence order).
    fn seq(&self) -> i64;

    fn timestamp(&self) -> DateTime<Utc>;

    /// Who sent the message (e.g. "`PassToClient`").
    fn direction(&self) -> &str;

    /// The message type (e.g. "`BlockPlacedMessage`", "`TextMessage`").
    fn message_type(&self) -> &str;

    /// The JSON message body.
    fn message(&self) -> &str;
}

/// Known message types of the game log.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum MessageType {
    BlockPlaced,
    BlockDestroyed,
    Text,
    SuccessfullyFinished,
}

impl MessageType {
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::BlockPlaced => "BlockPlacedMessage",
            Self::BlockDestroyed => "BlockDestroyedMessage",
            Self::Text => "TextMessage",
            Self::SuccessfullyFinished => SUCCESS_STATE,
        }
    }
}

impl fmt::Display for MessageType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for MessageType {
    type Err = UnknownMessageType;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "BlockPlacedMessage" => Ok(Self::BlockPlaced),
            "BlockDestroyedMessage" => Ok(Self::BlockDestroyed),
            "TextMessage" => Ok(Self::Text),
            SUCCESS_STATE => Ok(Self::SuccessfullyFinished),
            _ => Err(UnknownMessageType(s.to_string())),
        }
    }
}

/// Error type for unknown message type strings.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("unknown message type: {0}")]
pub struct UnknownMessageType(String);

/// A correction sent by the architect; each one counts as a mistake.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Correction {
    /// A block was placed where it does not belong.
    Misplaced,
    /// A required block was removed.
    Missing,
}

/// An instruction carrying a derivation tree.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Instruction {
    /// The derivation tree of the generated sentence.
    pub tree: String,
    /// False for repetitions and corrections of an earlier instruction.
    pub is_new: bool,
}

/// A decoded text message.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TextMessage {
    /// The message text, or the raw message when it has no `text` field.
    pub text: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub instruction: Option<Instruction>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub correction: Option<Correction>,
}

impl TextMessage {
    /// Classifies a `TextMessage` body.
    ///
    /// Messages are JSON objects whose `text` is either plain prose (welcome
    /// and status messages, corrections) or itself a JSON object with the
    /// derivation `tree` of a generated instruction.
    pub fn decode(message: &str) -> Self {
        let text = serde_json::from_str::<Value>(message)
            .ok()
            .and_then(|json| json.get("text").and_then(Value::as_str).map(String::from))
            .unwrap_or_else(|| message.to_string());

        let instruction = text
            .trim_start()
            .starts_with('{')
            .then(|| serde_json::from_str::<Value>(&text).ok())
            .flatten()
            .and_then(|json| {
                let tree = json.get("tree")?.as_str()?.to_string();
                let is_new = json.get("new").and_then(Value::as_bool).unwrap_or(false);
                Some(Instruction { tree, is_new })
            });

        let correction = if text.contains(MISPLACED_BLOCK_TEXT) {
            Some(Correction::Misplaced)
        } else if text.contains(MISSING_BLOCK_TEXT) {
            Some(Correction::Missing)
        } else {
            None
        };

        Self {
            text,
            instruction,
            correction,
        }
    }
}

/// What happened in a log event.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum EventKind {
    BlockPlaced { block: Block },
    BlockDestroyed { block: Block },
    Text(TextMessage),
    /// The game state changed to successfully finished.
    GameFinished,
    /// Any other message; ignored by the analysis.
    Other,
}

/// One decoded, chronologically ordered log event.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LogEvent {
    pub seq: i64,
    pub timestamp: DateTime<Utc>,
    /// True for messages forwarded to the player.
    pub to_client: bool,
    pub kind: EventKind,
}

impl LogEvent {
    /// Decodes one raw row.
    ///
    /// Block payloads with missing coordinates are recovered with zeroes and
    /// reported, never dropped.
    pub fn decode<E: RawLogEntry>(entry: &E) -> Self {
        let message = entry.message();
        let kind = if is_success_message(entry.message_type(), message) {
            EventKind::GameFinished
        } else {
            match entry.message_type().parse::<MessageType>() {
                Ok(MessageType::BlockPlaced) => EventKind::BlockPlaced {
                    block: decode_block(entry),
                },
                Ok(MessageType::BlockDestroyed) => EventKind::BlockDestroyed {
                    block: decode_block(entry),
                },
                Ok(MessageType::Text) => EventKind::Text(TextMessage::decode(message)),
                Ok(MessageType::SuccessfullyFinished) => EventKind::GameFinished,
                Err(_) => EventKind::Other,
            }
        };

        Self {
            seq: entry.seq(),
            timestamp: entry.timestamp(),
            to_client: entry.direction() == TO_CLIENT_DIRECTION,
            kind,
        }
    }

    pub const fn is_game_finished(&self) -> bool {
        matches!(self.kind, EventKind::GameFinished)
    }

    pub fn text(&self) -> Option<&TextMessage> {
        match &self.kind {
            EventKind::Text(text) => Some(text),
            _ => None,
        }
    }
}

/// Decodes a whole log. Rows must already be in occurrence order.
pub fn decode_log<E: RawLogEntry>(entries: &[E]) -> Vec<LogEvent> {
    entries.iter().map(LogEvent::decode).collect()
}

fn decode_block<E: RawLogEntry>(entry: &E) -> Block {
    Block::from_payload(entry.message()).unwrap_or_else(|err| {
        tracing::error!(
            seq = entry.seq(),
            timestamp = %entry.timestamp(),
            payload = entry.message(),
            error = %err,
            "malformed block payload, missing coordinates default to 0"
        );
        err.recovered
    })
}

fn is_success_message(message_type: &str, message: &str) -> bool {
    if message_type == SUCCESS_STATE {
        return true;
    }
    // Skip parsing rows that cannot match.
    if !message.contains(SUCCESS_STATE) {
        return false;
    }
    serde_json::from_str::<Value>(message)
        .ok()
        .and_then(|json| json.get("newGameState").and_then(Value::as_str).map(|s| s == SUCCESS_STATE))
        .unwrap_or(false)
}
