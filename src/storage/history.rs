//! Capped, append-only snapshot history stored as one JSON array.

use serde::Serialize;
use serde_json::Value;
use thiserror::Error;

/// Number of snapshots kept per item unless configured otherwise.
pub const DEFAULT_MAX_POINTS: usize = 500;

/// Why a stored document could not be used as a history.
#[derive(Debug, Error)]
pub enum HistoryDecodeError {
    #[error("document is not valid JSON: {0}")]
    Json(#[from] serde_json::Error),

    #[error("document holds a JSON {0}, expected an array")]
    NotAnArray(&'static str),
}

/// Ordered snapshots, oldest first, never longer than `max_points` after an append.
///
/// Entries are kept as raw JSON values so records written by older versions
/// survive a rewrite unchanged.
#[derive(Debug, Clone, PartialEq)]
pub struct History {
    entries: Vec<Value>,
    max_points: usize,
}

impl History {
    /// Creates an empty history.
    pub fn new(max_points: usize) -> Self {
        Self { entries: Vec::new(), max_points: max_points.max(1) }
    }

    /// Parses a stored document.
    ///
    /// A single JSON object is the legacy one-record format and becomes a
    /// one-element history.
    pub fn from_json(body: &[u8], max_points: usize) -> Result<Self, HistoryDecodeError> {
        let entries = match serde_json::from_slice::<Value>(body)? {
            Value::Array(entries) => entries,
            object @ Value::Object(_) => vec![object],
            Value::Null => return Err(HistoryDecodeError::NotAnArray("null")),
            Value::Bool(_) => return Err(HistoryDecodeError::NotAnArray("boolean")),
            Value::Number(_) => return Err(HistoryDecodeError::NotAnArray("number")),
            Value::String(_) => return Err(HistoryDecodeError::NotAnArray("string")),
        };

        Ok(Self { entries, max_points: max_points.max(1) })
    }

    /// Appends a snapshot and drops the oldest entries beyond the cap.
    ///
    /// Returns how many entries were dropped.
    pub fn push<T: Serialize>(&mut self, snapshot: &T) -> Result<usize, serde_json::Error> {
        self.entries.push(serde_json::to_value(snapshot)?);

        let overflow = self.entries.len().saturating_sub(self.max_points);
        if overflow > 0 {
            self.entries.drain(..overflow);
        }
        Ok(overflow)
    }

    /// Serializes the whole history as a compact JSON array.
    pub fn to_json(&self) -> Result<Vec<u8>, serde_json::Error> {
        serde_json::to_vec(&self.entries)
    }

    pub fn entries(&self) -> &[Value] {
        &self.entries
    }

    pub fn last(&self) -> Option<&Value> {
        self.entries.last()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn max_points(&self) -> usize {
        self.max_points
    }
}
