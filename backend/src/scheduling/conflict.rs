use time::OffsetDateTime;
use uuid::Uuid;

use super::error::{Result, SchedulingError};
use crate::store::BookingStore;

/// Half-open time range `[start, end)`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Interval {
    pub start: OffsetDateTime,
    pub end: OffsetDateTime,
}

impl Interval {
    pub fn new(start: OffsetDateTime, end: OffsetDateTime) -> Result<Self> {
        if start >= end {
            return Err(SchedulingError::InvalidTimeInput(
                "end time must be after start time".into(),
            ));
        }
        Ok(Self { start, end })
    }

    /// Touching endpoints do not overlap: `[9,10)` and `[10,11)` coexist.
    pub fn overlaps(&self, other: &Interval) -> bool {
        self.start < other.end && other.start < self.end
    }
}

/// Fails with `CapacityExceeded` when `resource_id` already has
/// `max_concurrent_sessions` bookings overlapping `window`.
///
/// Must run in the same transaction as the write it guards. The resource
/// lock taken here is held until that transaction ends.
pub async fn check_capacity<S: BookingStore>(
    store: &S,
    tx: &mut S::Tx,
    resource_id: Uuid,
    window: Interval,
    exclude: Option<Uuid>,
) -> Result<()> {
    store.lock_timeline(tx, resource_id).await?;
    let limit = store.get_capacity(tx, resource_id).await?;
    let overlapping = store
        .find_overlapping(tx, resource_id, window, exclude)
        .await?
        .into_iter()
        .filter(|b| Some(b.id) != exclude && b.interval().overlaps(&window))
        .count();

    if overlapping >= usize::try_from(limit).unwrap_or(0) {
        tracing::info!(
            %resource_id,
            overlapping,
            limit,
            "Capacity exceeded for requested window"
        );
        return Err(SchedulingError::CapacityExceeded {
            resource_id,
            start: window.start,
            end: window.end,
            limit,
        });
    }
    Ok(())
}

/// Takes the timeline locks for every key in ascending order, so writers
/// whose key sets overlap queue instead of deadlocking.
pub async fn lock_timelines<S: BookingStore>(
    store: &S,
    tx: &mut S::Tx,
    keys: &[Uuid],
) -> Result<()> {
    let mut keys = keys.to_vec();
    keys.sort_unstable();
    keys.dedup();
    for key in keys {
        store.lock_timeline(tx, key).await?;
    }
    Ok(())
}
