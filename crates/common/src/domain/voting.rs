//! Kaizen vote arithmetic

use crate::errors::{AppError, Result};
use serde::{Deserialize, Serialize};

/// A single vote: +1 or -1
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "i16", into = "i16")]
pub struct VoteValue(i16);

impl VoteValue {
    pub const UP: VoteValue = VoteValue(1);
    pub const DOWN: VoteValue = VoteValue(-1);

    pub fn get(self) -> i16 {
        self.0
    }

    pub fn direction(self) -> &'static str {
        if self.0 > 0 { "up" } else { "down" }
    }
}

impl TryFrom<i16> for VoteValue {
    type Error = AppError;

    fn try_from(value: i16) -> Result<Self> {
        match value {
            1 => Ok(VoteValue::UP),
            -1 => Ok(VoteValue::DOWN),
            other => Err(AppError::invalid_field(
                "value",
                format!("vote must be 1 or -1, got {}", other),
            )),
        }
    }
}

impl From<VoteValue> for i16 {
    fn from(value: VoteValue) -> Self {
        value.0
    }
}

/// Counts of up and down votes for one suggestion
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct VoteTally {
    pub upvotes: u64,
    pub downvotes: u64,
}

impl VoteTally {
    pub fn net(&self) -> i64 {
        self.upvotes as i64 - self.downvotes as i64
    }

    pub fn add(&mut self, value: i16) {
        match value {
            1 => self.upvotes += 1,
            -1 => self.downvotes += 1,
            // rows outside ±1 cannot be written through VoteValue
            _ => {}
        }
    }
}

/// Tally raw vote rows
pub fn tally<I: IntoIterator<Item = i16>>(values: I) -> VoteTally {
    let mut tally = VoteTally::default();
    for value in values {
        tally.add(value);
    }
    tally
}
