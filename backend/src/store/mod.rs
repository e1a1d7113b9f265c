//! Persistence gateway for bookings, participant bindings and attachments.
//!
//! Every operation runs inside a caller-supplied transaction handle
//! (`BookingStore::Tx`); nothing here commits on its own.

pub mod memory;
pub mod postgres;

use async_trait::async_trait;
use time::OffsetDateTime;
use uuid::Uuid;

use crate::models::actor::OwnerScope;
use crate::models::attachment::Attachment;
use crate::models::booking::{
    AgendaKind, Booking, LocationKind, OwnerKind, Slot, UpdateBookingRequest,
};
use crate::scheduling::{Interval, Result};

pub use memory::MemoryBookingStore;
pub use postgres::PgBookingStore;

/// Identity tuple used to collapse retried identical create requests.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MatchKey {
    pub owner_kind: OwnerKind,
    pub owner_id: Uuid,
    pub start_at: OffsetDateTime,
    pub end_at: OffsetDateTime,
    pub agenda_kind: AgendaKind,
}

impl MatchKey {
    pub fn matches(&self, booking: &Booking) -> bool {
        booking.owner_kind == self.owner_kind
            && booking.owner_id == self.owner_id
            && booking.start_at == self.start_at
            && booking.end_at == self.end_at
            && booking.agenda_kind == self.agenda_kind
    }
}

/// Field-level patch for an existing booking. `None` keeps the stored value;
/// `Some(None)` clears a nullable column.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct BookingPatch {
    pub schedule: Option<Slot>,
    pub agenda: Option<String>,
    pub agenda_kind: Option<AgendaKind>,
    pub location_kind: Option<LocationKind>,
    pub custom_location: Option<Option<String>>,
    pub description: Option<Option<String>>,
    pub notification_offset_minutes: Option<i32>,
}

impl BookingPatch {
    /// Descriptive fields from an update request; the schedule is set separately
    /// once the first date entry has been normalized.
    pub fn from_request(req: &UpdateBookingRequest) -> Self {
        Self {
            schedule: None,
            agenda: req.agenda.clone(),
            agenda_kind: req.agenda_kind,
            location_kind: req.location_kind,
            custom_location: req.custom_location.clone(),
            description: req.description.clone(),
            notification_offset_minutes: req.notification_offset_minutes,
        }
    }

    pub fn is_empty(&self) -> bool {
        *self == Self::default()
    }

    pub fn apply(&self, booking: &mut Booking) {
        if let Some(slot) = &self.schedule {
            booking.start_at = slot.start_at;
            booking.end_at = slot.end_at;
            booking.timezone = slot.timezone.clone();
        }
        if let Some(agenda) = &self.agenda {
            booking.agenda = agenda.clone();
        }
        if let Some(kind) = self.agenda_kind {
            booking.agenda_kind = kind;
        }
        if let Some(kind) = self.location_kind {
            booking.location_kind = kind;
        }
        if let Some(location) = &self.custom_location {
            booking.custom_location = location.clone();
        }
        if let Some(description) = &self.description {
            booking.description = description.clone();
        }
        if let Some(offset) = self.notification_offset_minutes {
            booking.notification_offset_minutes = Some(offset);
        }
    }
}

#[async_trait]
pub trait BookingStore: Send + Sync + 'static {
    /// Transaction handle. Dropping it without `commit` discards its writes.
    type Tx: Send;

    async fn begin(&self) -> Result<Self::Tx>;
    async fn commit(&self, tx: Self::Tx) -> Result<()>;
    async fn rollback(&self, tx: Self::Tx) -> Result<()>;

    /// Serializes check-then-write sequences keyed on a resource or booking
    /// owner until the transaction ends. Re-locking a held key is a no-op.
    async fn lock_timeline(&self, tx: &mut Self::Tx, key: Uuid) -> Result<()>;

    async fn get(&self, tx: &mut Self::Tx, id: Uuid) -> Result<Option<Booking>>;
    async fn find_matching(&self, tx: &mut Self::Tx, key: &MatchKey) -> Result<Option<Booking>>;
    async fn insert(&self, tx: &mut Self::Tx, booking: &Booking) -> Result<()>;
    /// Applies `patch` and stamps `updated_by`/`updated_at`. `NotFound` if absent.
    async fn update(
        &self,
        tx: &mut Self::Tx,
        id: Uuid,
        patch: &BookingPatch,
        updated_by: Uuid,
    ) -> Result<Booking>;
    /// Removes attachments and bindings, then the booking. `false` if absent.
    async fn delete(&self, tx: &mut Self::Tx, id: Uuid) -> Result<bool>;

    async fn participants(&self, tx: &mut Self::Tx, booking_id: Uuid) -> Result<Vec<Uuid>>;
    /// Conflict-tolerant insert: an existing (booking, user) pair is left as-is.
    async fn upsert_participants(
        &self,
        tx: &mut Self::Tx,
        booking_id: Uuid,
        user_ids: &[Uuid],
    ) -> Result<()>;
    async fn clear_participants(&self, tx: &mut Self::Tx, booking_id: Uuid) -> Result<()>;

    /// Bookings bound to `resource_id` whose interval overlaps `window`.
    async fn find_overlapping(
        &self,
        tx: &mut Self::Tx,
        resource_id: Uuid,
        window: Interval,
        exclude: Option<Uuid>,
    ) -> Result<Vec<Booking>>;

    /// Bookings visible to `scope` overlapping `window`, ordered by start.
    async fn find_in_range(
        &self,
        tx: &mut Self::Tx,
        scope: &OwnerScope,
        window: Interval,
    ) -> Result<Vec<Booking>>;

    /// Whether bookings binding `user_id` are subject to a capacity rule.
    async fn is_resource(&self, tx: &mut Self::Tx, user_id: Uuid) -> Result<bool>;

    /// `max_concurrent_sessions` for the resource, defaulting to 2.
    async fn get_capacity(&self, tx: &mut Self::Tx, resource_id: Uuid) -> Result<i32>;

    async fn attachments(&self, tx: &mut Self::Tx, booking_id: Uuid) -> Result<Vec<Attachment>>;
    async fn insert_attachments(&self, tx: &mut Self::Tx, attachments: &[Attachment])
        -> Result<()>;
    async fn delete_attachment(
        &self,
        tx: &mut Self::Tx,
        booking_id: Uuid,
        attachment_id: Uuid,
    ) -> Result<bool>;
}
