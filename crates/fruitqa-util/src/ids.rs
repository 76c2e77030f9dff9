//! Row identifier generation.
//!
//! Every row of a row collection carries a stable `_id` assigned once when
//! the row is created. Identifiers are random v4 UUID strings in normal use;
//! [`SequentialRowIds`] gives reproducible ids for tests and the CLI.

use uuid::Uuid;

/// A source of fresh row identifiers.
pub trait RowIdSource {
    fn next_id(&mut self) -> String;
}

/// Random v4 UUIDs.
#[derive(Debug, Default, Clone, Copy)]
pub struct RandomRowIds;

impl RowIdSource for RandomRowIds {
    fn next_id(&mut self) -> String {
        Uuid::new_v4().to_string()
    }
}

/// Deterministic ids `"<prefix>-1"`, `"<prefix>-2"`, ...
#[derive(Debug, Clone)]
pub struct SequentialRowIds {
    prefix: String,
    next: u64,
}

impl SequentialRowIds {
    pub fn new(prefix: impl Into<String>) -> Self {
        Self {
            prefix: prefix.into(),
            next: 1,
        }
    }
}

impl Default for SequentialRowIds {
    fn default() -> Self {
        Self::new("row")
    }
}

impl RowIdSource for SequentialRowIds {
    fn next_id(&mut self) -> String {
        let id = format!("{}-{}", self.prefix, self.next);
        self.next += 1;
        id
    }
}
