use serde::{Deserialize, Serialize};
use time::OffsetDateTime;
use uuid::Uuid;
use validator::Validate;

use crate::models::attachment::Attachment;
use crate::models::common::nullable;
use crate::scheduling::conflict::Interval;

/// Capacity applied when a resource has no `max_concurrent_sessions` configured.
pub const DEFAULT_MAX_CONCURRENT_SESSIONS: i32 = 2;

/// Hard cap on date entries in one create/update call.
pub const MAX_DATES: usize = 2;

/// Hard cap on counterparties (clients) bound to one booking.
pub const MAX_COUNTERPARTIES: usize = 2;

/// Whose calendar a booking lives on.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash, sqlx::Type)]
#[sqlx(type_name = "booking_owner_kind", rename_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum OwnerKind {
    Organization,
    Resource,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash, sqlx::Type)]
#[sqlx(type_name = "agenda_kind", rename_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum AgendaKind {
    Counseling,
    Class,
    Seminar,
    Other,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash, sqlx::Type)]
#[sqlx(type_name = "location_kind", rename_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum LocationKind {
    Online,
    Offline,
    Custom,
}

/// A single time-boxed agenda item as stored in the database.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, sqlx::FromRow)]
pub struct Booking {
    pub id: Uuid,
    #[serde(with = "time::serde::rfc3339")]
    pub start_at: OffsetDateTime,
    #[serde(with = "time::serde::rfc3339")]
    pub end_at: OffsetDateTime,
    /// IANA zone the caller expressed the local time in.
    pub timezone: String,
    pub owner_kind: OwnerKind,
    pub owner_id: Uuid,
    pub resource_id: Option<Uuid>,
    pub agenda: String,
    pub agenda_kind: AgendaKind,
    pub location_kind: LocationKind,
    pub custom_location: Option<String>,
    pub description: Option<String>,
    pub notification_offset_minutes: Option<i32>,
    pub created_by: Uuid,
    pub updated_by: Uuid,
    #[serde(with = "time::serde::rfc3339")]
    pub created_at: OffsetDateTime,
    #[serde(with = "time::serde::rfc3339")]
    pub updated_at: OffsetDateTime,
}

impl Booking {
    pub fn interval(&self) -> Interval {
        Interval {
            start: self.start_at,
            end: self.end_at,
        }
    }

    /// Online counseling sessions get a provisioned meeting link.
    pub fn needs_meeting_link(&self) -> bool {
        self.agenda_kind == AgendaKind::Counseling && self.location_kind == LocationKind::Online
    }
}

/// A normalized date entry: absolute instants plus the zone they came from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Slot {
    pub start_at: OffsetDateTime,
    pub end_at: OffsetDateTime,
    pub timezone: String,
}

impl Slot {
    pub fn interval(&self) -> Interval {
        Interval {
            start: self.start_at,
            end: self.end_at,
        }
    }
}

/// One (date, start, end, zone) entry as supplied by the client.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct DateEntry {
    /// `YYYY-MM-DD`
    pub date: String,
    /// `HH:MM` or `HH:MM:SS`
    pub start_time: String,
    pub end_time: String,
    /// Falls back to the actor's zone when absent.
    pub timezone: Option<String>,
}

#[derive(Debug, Clone, Deserialize, Validate)]
pub struct CreateBookingsRequest {
    #[validate(length(min = 1, max = 255, message = "agenda must be 1-255 characters"))]
    pub agenda: String,
    pub agenda_kind: AgendaKind,
    pub location_kind: LocationKind,
    pub custom_location: Option<String>,
    pub description: Option<String>,
    #[validate(range(min = 0, max = 10080, message = "notification offset must be within one week"))]
    pub notification_offset_minutes: Option<i32>,
    /// Calendar to place the booking on; derived from the actor's role when absent.
    pub owner_kind: Option<OwnerKind>,
    pub resource_id: Option<Uuid>,
    /// Counterparties (clients), at most two.
    #[serde(default)]
    #[validate(length(max = 2, message = "at most 2 participants"))]
    pub participants: Vec<Uuid>,
    pub dates: Vec<DateEntry>,
}

/// Partial update. Every `None` leaves the stored value untouched; an
/// explicit `null` clears `custom_location` or `description`.
#[derive(Debug, Clone, Default, Deserialize, Validate)]
pub struct UpdateBookingRequest {
    #[validate(length(min = 1, max = 255, message = "agenda must be 1-255 characters"))]
    pub agenda: Option<String>,
    pub agenda_kind: Option<AgendaKind>,
    pub location_kind: Option<LocationKind>,
    #[serde(default, deserialize_with = "nullable")]
    pub custom_location: Option<Option<String>>,
    #[serde(default, deserialize_with = "nullable")]
    pub description: Option<Option<String>>,
    #[validate(range(min = 0, max = 10080, message = "notification offset must be within one week"))]
    pub notification_offset_minutes: Option<i32>,
    /// Replaces the full counterparty set when present.
    #[validate(length(max = 2, message = "at most 2 participants"))]
    pub participants: Option<Vec<Uuid>>,
    #[serde(default)]
    pub dates: Vec<DateEntry>,
}

/// Result row for create/update calls.
#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct BookingSummary {
    pub id: Uuid,
    #[serde(with = "time::serde::rfc3339")]
    pub start_at: OffsetDateTime,
    #[serde(with = "time::serde::rfc3339")]
    pub end_at: OffsetDateTime,
    pub agenda_kind: AgendaKind,
    pub location_kind: LocationKind,
    pub is_new: bool,
}

#[derive(Debug, Clone, Serialize)]
pub struct BookingsResponse {
    pub bookings: Vec<BookingSummary>,
}

/// Calendar row for range listings, with times rendered in the viewer's zone.
#[derive(Debug, Clone, Serialize)]
pub struct BookingListItem {
    pub id: Uuid,
    pub agenda: String,
    #[serde(rename = "type")]
    pub agenda_kind: AgendaKind,
    #[serde(with = "time::serde::rfc3339")]
    pub start_at: OffsetDateTime,
    #[serde(with = "time::serde::rfc3339")]
    pub end_at: OffsetDateTime,
    pub display_start: String,
    pub display_end: String,
    pub location_kind: LocationKind,
    pub custom_location: Option<String>,
}

/// Full booking with its participant bindings and attachments.
#[derive(Debug, Clone, Serialize)]
pub struct BookingDetail {
    #[serde(flatten)]
    pub booking: Booking,
    pub display_start: String,
    pub display_end: String,
    pub participants: Vec<Uuid>,
    pub attachments: Vec<Attachment>,
}
