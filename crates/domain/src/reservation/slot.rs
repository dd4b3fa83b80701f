use chrono::{Duration, NaiveTime};
use serde::{Deserialize, Serialize};

use crate::error::DomainError;

/// A half-open `[start, end)` time interval within one day.
///
/// Deserialization goes through [`TimeSlot::new`], so an empty or inverted
/// interval never reaches a reservation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "RawSlot")]
pub struct TimeSlot {
    start: NaiveTime,
    end: NaiveTime,
}

/// Unchecked wire form of [`TimeSlot`].
#[derive(Deserialize)]
struct RawSlot {
    start: NaiveTime,
    end: NaiveTime,
}

impl TryFrom<RawSlot> for TimeSlot {
    type Error = DomainError;

    fn try_from(raw: RawSlot) -> Result<Self, Self::Error> {
        TimeSlot::new(raw.start, raw.end)
    }
}

impl TimeSlot {
    /// Creates a slot; `start` must be strictly before `end`.
    pub fn new(start: NaiveTime, end: NaiveTime) -> Result<Self, DomainError> {
        if start >= end {
            return Err(DomainError::InvalidSlot { start, end });
        }
        Ok(Self { start, end })
    }

    /// Creates a slot of `length` starting at `start`.
    ///
    /// Fails if the slot would run past midnight.
    pub fn starting_at(start: NaiveTime, length: Duration) -> Result<Self, DomainError> {
        let (end, wrapped) = start.overflowing_add_signed(length);
        if wrapped != 0 {
            return Err(DomainError::InvalidSlot { start, end });
        }
        Self::new(start, end)
    }

    pub fn start(&self) -> NaiveTime {
        self.start
    }

    pub fn end(&self) -> NaiveTime {
        self.end
    }

    pub fn length(&self) -> Duration {
        self.end - self.start
    }

    /// Returns true if the two slots share any instant.
    ///
    /// Touching boundaries (`a.end == b.start`) do not overlap.
    pub fn overlaps(&self, other: &TimeSlot) -> bool {
        self.start < other.end && self.end > other.start
    }
}

impl std::fmt::Display for TimeSlot {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "{}-{}",
            self.start.format("%H:%M"),
            self.end.format("%H:%M")
        )
    }
}
