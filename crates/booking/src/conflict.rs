//! Slot conflict detection.

use chrono::{NaiveDate, NaiveTime};
use domain::{Reservation, TimeSlot};
use store::BookingStore;

use crate::error::{BookingError, Result, log_failure};

/// Returns the reservations in `existing` that block `slot` on `date`.
///
/// Cancelled reservations never block; touching slots do not overlap.
pub fn overlapping<'a>(
    existing: &'a [Reservation],
    date: NaiveDate,
    slot: &'a TimeSlot,
) -> impl Iterator<Item = &'a Reservation> + 'a {
    existing.iter().filter(move |r| r.blocks(date, slot))
}

/// Read-only check of a candidate slot against stored reservations.
///
/// The answer is advisory: the store re-checks overlap inside the insert's
/// commit, so a slot taken between check and insert is still rejected.
#[derive(Clone)]
pub struct ConflictDetector<S> {
    store: S,
}

impl<S: BookingStore> ConflictDetector<S> {
    pub fn new(store: S) -> Self {
        Self { store }
    }

    /// Returns true if `[start, end)` on `date` overlaps an active reservation.
    #[tracing::instrument(skip(self))]
    pub async fn has_conflict(
        &self,
        date: NaiveDate,
        start: NaiveTime,
        end: NaiveTime,
    ) -> Result<bool> {
        Ok(!self.conflicts(date, start, end).await?.is_empty())
    }

    /// Returns the active reservations overlapping `[start, end)` on `date`.
    #[tracing::instrument(skip(self))]
    pub async fn conflicts(
        &self,
        date: NaiveDate,
        start: NaiveTime,
        end: NaiveTime,
    ) -> Result<Vec<Reservation>> {
        let slot = TimeSlot::new(start, end)
            .map_err(BookingError::from)
            .inspect_err(log_failure)?;
        self.conflicts_with(date, &slot).await
    }

    pub(crate) async fn conflicts_with(
        &self,
        date: NaiveDate,
        slot: &TimeSlot,
    ) -> Result<Vec<Reservation>> {
        let on_date = self.store.reservations_on(date).await?;
        Ok(overlapping(&on_date, date, slot).cloned().collect())
    }
}
