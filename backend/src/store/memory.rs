//! In-process `BookingStore`. A transaction holds the single table lock for
//! its whole lifetime and works on a private copy that replaces the shared
//! tables on commit, so transactions are fully serialized.

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use time::OffsetDateTime;
use tokio::sync::{Mutex, OwnedMutexGuard};
use uuid::Uuid;

use super::{BookingPatch, BookingStore, MatchKey};
use crate::collaborators::ProfileProvider;
use crate::models::actor::OwnerScope;
use crate::models::attachment::Attachment;
use crate::models::booking::{Booking, DEFAULT_MAX_CONCURRENT_SESSIONS};
use crate::scheduling::{Interval, Result, SchedulingError};

#[derive(Debug, Clone, Default)]
struct Tables {
    bookings: HashMap<Uuid, Booking>,
    /// booking id -> bound user ids, in insertion order
    participants: HashMap<Uuid, Vec<Uuid>>,
    attachments: Vec<Attachment>,
}

impl Tables {
    fn bound(&self, booking_id: Uuid) -> &[Uuid] {
        self.participants
            .get(&booking_id)
            .map(Vec::as_slice)
            .unwrap_or(&[])
    }
}

pub struct MemoryTx {
    guard: OwnedMutexGuard<Tables>,
    working: Tables,
}

pub struct MemoryBookingStore {
    tables: Arc<Mutex<Tables>>,
    profiles: Arc<dyn ProfileProvider>,
}

impl MemoryBookingStore {
    pub fn new(profiles: Arc<dyn ProfileProvider>) -> Self {
        Self {
            tables: Arc::new(Mutex::new(Tables::default())),
            profiles,
        }
    }
}

#[async_trait]
impl BookingStore for MemoryBookingStore {
    type Tx = MemoryTx;

    async fn begin(&self) -> Result<MemoryTx> {
        let guard = Arc::clone(&self.tables).lock_owned().await;
        let working = Tables::clone(&guard);
        Ok(MemoryTx {
            guard,
            working,
        })
    }

    async fn commit(&self, tx: MemoryTx) -> Result<()> {
        let MemoryTx { mut guard, working } = tx;
        *guard = working;
        Ok(())
    }

    async fn rollback(&self, tx: MemoryTx) -> Result<()> {
        drop(tx);
        Ok(())
    }

    async fn lock_timeline(&self, _tx: &mut MemoryTx, _key: Uuid) -> Result<()> {
        // The transaction already holds the table lock.
        Ok(())
    }

    async fn get(&self, tx: &mut MemoryTx, id: Uuid) -> Result<Option<Booking>> {
        Ok(tx.working.bookings.get(&id).cloned())
    }

    async fn find_matching(&self, tx: &mut MemoryTx, key: &MatchKey) -> Result<Option<Booking>> {
        Ok(tx
            .working
            .bookings
            .values()
            .filter(|b| key.matches(b))
            .min_by_key(|b| (b.created_at, b.id))
            .cloned())
    }

    async fn insert(&self, tx: &mut MemoryTx, booking: &Booking) -> Result<()> {
        if tx.working.bookings.contains_key(&booking.id) {
            return Err(SchedulingError::Unavailable(anyhow::anyhow!(
                "duplicate booking id {}",
                booking.id
            )));
        }
        tx.working.bookings.insert(booking.id, booking.clone());
        Ok(())
    }

    async fn update(
        &self,
        tx: &mut MemoryTx,
        id: Uuid,
        patch: &BookingPatch,
        updated_by: Uuid,
    ) -> Result<Booking> {
        let booking = tx
            .working
            .bookings
            .get_mut(&id)
            .ok_or_else(|| SchedulingError::NotFound(format!("Booking {} not found", id)))?;
        patch.apply(booking);
        booking.updated_by = updated_by;
        booking.updated_at = OffsetDateTime::now_utc();
        Ok(booking.clone())
    }

    async fn delete(&self, tx: &mut MemoryTx, id: Uuid) -> Result<bool> {
        tx.working.attachments.retain(|a| a.booking_id != id);
        tx.working.participants.remove(&id);
        Ok(tx.working.bookings.remove(&id).is_some())
    }

    async fn participants(&self, tx: &mut MemoryTx, booking_id: Uuid) -> Result<Vec<Uuid>> {
        Ok(tx.working.bound(booking_id).to_vec())
    }

    async fn upsert_participants(
        &self,
        tx: &mut MemoryTx,
        booking_id: Uuid,
        user_ids: &[Uuid],
    ) -> Result<()> {
        if !tx.working.bookings.contains_key(&booking_id) {
            return Err(SchedulingError::Unavailable(anyhow::anyhow!(
                "participant binding references missing booking {}",
                booking_id
            )));
        }
        let bound = tx.working.participants.entry(booking_id).or_default();
        for user_id in user_ids {
            if !bound.contains(user_id) {
                bound.push(*user_id);
            }
        }
        Ok(())
    }

    async fn clear_participants(&self, tx: &mut MemoryTx, booking_id: Uuid) -> Result<()> {
        tx.working.participants.remove(&booking_id);
        Ok(())
    }

    async fn find_overlapping(
        &self,
        tx: &mut MemoryTx,
        resource_id: Uuid,
        window: Interval,
        exclude: Option<Uuid>,
    ) -> Result<Vec<Booking>> {
        let tables = &tx.working;
        let mut found: Vec<Booking> = tables
            .bookings
            .values()
            .filter(|b| Some(b.id) != exclude)
            .filter(|b| tables.bound(b.id).contains(&resource_id))
            .filter(|b| b.interval().overlaps(&window))
            .cloned()
            .collect();
        found.sort_by_key(|b| (b.start_at, b.id));
        Ok(found)
    }

    async fn find_in_range(
        &self,
        tx: &mut MemoryTx,
        scope: &OwnerScope,
        window: Interval,
    ) -> Result<Vec<Booking>> {
        let tables = &tx.working;
        let mut found: Vec<Booking> = tables
            .bookings
            .values()
            .filter(|b| b.interval().overlaps(&window))
            .filter(|b| scope.covers(b, tables.bound(b.id)))
            .cloned()
            .collect();
        found.sort_by_key(|b| (b.start_at, b.id));
        Ok(found)
    }

    async fn is_resource(&self, _tx: &mut MemoryTx, user_id: Uuid) -> Result<bool> {
        self.profiles
            .is_resource(user_id)
            .await
            .map_err(SchedulingError::Unavailable)
    }

    async fn get_capacity(&self, _tx: &mut MemoryTx, resource_id: Uuid) -> Result<i32> {
        let configured = self
            .profiles
            .capacity(resource_id)
            .await
            .map_err(SchedulingError::Unavailable)?;
        Ok(configured.unwrap_or(DEFAULT_MAX_CONCURRENT_SESSIONS))
    }

    async fn attachments(&self, tx: &mut MemoryTx, booking_id: Uuid) -> Result<Vec<Attachment>> {
        Ok(tx
            .working
            .attachments
            .iter()
            .filter(|a| a.booking_id == booking_id)
            .cloned()
            .collect())
    }

    async fn insert_attachments(&self, tx: &mut MemoryTx, attachments: &[Attachment]) -> Result<()> {
        if let Some(orphan) = attachments
            .iter()
            .find(|a| !tx.working.bookings.contains_key(&a.booking_id))
        {
            return Err(SchedulingError::Unavailable(anyhow::anyhow!(
                "attachment references missing booking {}",
                orphan.booking_id
            )));
        }
        tx.working.attachments.extend_from_slice(attachments);
        Ok(())
    }

    async fn delete_attachment(
        &self,
        tx: &mut MemoryTx,
        booking_id: Uuid,
        attachment_id: Uuid,
    ) -> Result<bool> {
        let before = tx.working.attachments.len();
        tx.working
            .attachments
            .retain(|a| !(a.booking_id == booking_id && a.id == attachment_id));
        Ok(tx.working.attachments.len() != before)
    }
}
