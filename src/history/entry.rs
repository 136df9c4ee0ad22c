//! A single history record and its identifier.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::service::models::GenerationResult;

/// Stable key of a history entry: milliseconds since the Unix epoch, bumped
/// forward when two entries land in the same millisecond.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct EntryId(pub i64);

impl EntryId {
    /// 9999-12-31T23:59:59.999Z. Anything past it can't have come from the
    /// clock, and leaves the generator no room to move forward.
    pub const MAX: EntryId = EntryId(253_402_300_799_999);

    /// Whether a stored id could have been issued by [`IdGenerator`].
    pub fn is_plausible(self) -> bool {
        (0..=Self::MAX.0).contains(&self.0)
    }
}

impl fmt::Display for EntryId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl FromStr for EntryId {
    type Err = std::num::ParseIntError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        s.trim().parse().map(EntryId)
    }
}

/// One submitted prompt paired with what the service returned for it.
/// Never mutated after creation.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct HistoryEntry {
    pub id: EntryId,
    /// Creation time, RFC 3339 in UTC.
    pub timestamp: String,
    pub prompt: String,
    pub result: GenerationResult,
}

/// Hands out strictly increasing ids derived from the wall clock.
#[derive(Debug, Clone, Default)]
pub struct IdGenerator {
    last: Option<i64>,
}

impl IdGenerator {
    /// Continue after `last`, typically the largest id already stored.
    pub fn after(last: Option<EntryId>) -> Self {
        Self {
            last: last.map(|id| id.0),
        }
    }

    /// Next id for an entry created at `now_ms`.
    ///
    /// Seeds are expected to pass [`EntryId::is_plausible`]; from there the
    /// saturating step is never reached in practice.
    pub fn next_at(&mut self, now_ms: i64) -> EntryId {
        let id = match self.last {
            Some(last) if now_ms <= last => last.saturating_add(1),
            _ => now_ms,
        };
        self.last = Some(id);
        EntryId(id)
    }
}
