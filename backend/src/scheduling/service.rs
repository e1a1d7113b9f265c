use std::sync::Arc;

use chrono_tz::Tz;
use uuid::Uuid;

use super::conflict::Interval;
use super::error::{Result, SchedulingError};
use super::timeline::{self, DISPLAY_LAYOUT};
use super::tx::with_transaction;
use super::writer::{BookingWriter, WrittenBooking};
use crate::collaborators::{Collaborators, Notification, NotificationCategory, SideEffect};
use crate::models::actor::Actor;
use crate::models::attachment::{Attachment, FileMetadata};
use crate::models::booking::{
    Booking, BookingDetail, BookingListItem, BookingsResponse, CreateBookingsRequest,
    UpdateBookingRequest,
};
use crate::models::common::MAX_RANGE_DAYS;
use crate::store::BookingStore;

/// Request-level entry point. Each operation runs in exactly one store
/// transaction; collaborator side effects are dispatched only after commit.
pub struct SchedulingService<S: BookingStore> {
    store: Arc<S>,
    collaborators: Collaborators,
    default_timezone: String,
}

impl<S: BookingStore> Clone for SchedulingService<S> {
    fn clone(&self) -> Self {
        Self {
            store: Arc::clone(&self.store),
            collaborators: self.collaborators.clone(),
            default_timezone: self.default_timezone.clone(),
        }
    }
}

impl<S: BookingStore> SchedulingService<S> {
    pub fn new(store: Arc<S>, collaborators: Collaborators, default_timezone: String) -> Self {
        Self {
            store,
            collaborators,
            default_timezone,
        }
    }

    pub fn store(&self) -> &Arc<S> {
        &self.store
    }

    pub async fn create_bookings(
        &self,
        actor: &Actor,
        req: CreateBookingsRequest,
    ) -> Result<BookingsResponse> {
        let who = actor.clone();
        let zone = self.default_timezone.clone();
        let written = with_transaction(self.store.as_ref(), move |store, tx| {
            Box::pin(async move { BookingWriter::new(store, &who, &zone).create(tx, &req).await })
        })
        .await?;

        let mut effects = Vec::new();
        for w in written.iter().filter(|w| w.is_new) {
            effects.extend(self.created_effects(actor, w));
        }
        self.collaborators.dispatch(effects);

        tracing::info!(
            actor = %actor.id,
            created = written.iter().filter(|w| w.is_new).count(),
            reused = written.iter().filter(|w| !w.is_new).count(),
            "Bookings written"
        );
        Ok(BookingsResponse {
            bookings: written.iter().map(WrittenBooking::summary).collect(),
        })
    }

    /// Bookings visible to the actor whose interval intersects the calendar
    /// days `from..=to` in the actor's zone.
    pub async fn list_bookings_in_range(
        &self,
        actor: &Actor,
        from: &str,
        to: &str,
    ) -> Result<Vec<BookingListItem>> {
        let tz = self.viewer_zone(actor)?;
        let (start, end) = timeline::range_to_instants(from, to, tz)?;
        let window = Interval::new(start, end)?;
        if (end - start).whole_days() > MAX_RANGE_DAYS {
            return Err(SchedulingError::Invalid(format!(
                "date range may span at most {} days",
                MAX_RANGE_DAYS
            )));
        }

        let scope = actor.scope();
        let bookings = with_transaction(self.store.as_ref(), move |store, tx| {
            Box::pin(async move { store.find_in_range(tx, &scope, window).await })
        })
        .await?;

        Ok(bookings
            .into_iter()
            .map(|b| BookingListItem {
                id: b.id,
                display_start: timeline::to_local_display(b.start_at, tz, DISPLAY_LAYOUT),
                display_end: timeline::to_local_display(b.end_at, tz, DISPLAY_LAYOUT),
                agenda: b.agenda,
                agenda_kind: b.agenda_kind,
                start_at: b.start_at,
                end_at: b.end_at,
                location_kind: b.location_kind,
                custom_location: b.custom_location,
            })
            .collect())
    }

    pub async fn get_booking(&self, actor: &Actor, id: Uuid) -> Result<BookingDetail> {
        let tz = self.viewer_zone(actor)?;
        let who = actor.clone();
        let (booking, participants, attachments) =
            with_transaction(self.store.as_ref(), move |store, tx| {
                Box::pin(async move {
                    let booking = store
                        .get(tx, id)
                        .await?
                        .ok_or_else(|| SchedulingError::NotFound(format!("Booking {} not found", id)))?;
                    let participants = store.participants(tx, id).await?;
                    if !who.can_view(&booking, &participants) {
                        return Err(SchedulingError::Forbidden);
                    }
                    let attachments = store.attachments(tx, id).await?;
                    Ok((booking, participants, attachments))
                })
            })
            .await?;

        Ok(BookingDetail {
            display_start: timeline::to_local_display(booking.start_at, tz, DISPLAY_LAYOUT),
            display_end: timeline::to_local_display(booking.end_at, tz, DISPLAY_LAYOUT),
            booking,
            participants,
            attachments,
        })
    }

    pub async fn update_booking(
        &self,
        actor: &Actor,
        id: Uuid,
        req: UpdateBookingRequest,
    ) -> Result<BookingsResponse> {
        let who = actor.clone();
        let zone = self.default_timezone.clone();
        let written = with_transaction(self.store.as_ref(), move |store, tx| {
            Box::pin(async move { BookingWriter::new(store, &who, &zone).update(tx, id, &req).await })
        })
        .await?;

        let mut effects = Vec::new();
        for w in &written {
            if w.is_new {
                effects.extend(self.created_effects(actor, w));
            } else {
                effects.push(SideEffect::Notify(Notification {
                    recipients: recipients(actor, &w.participants),
                    title: format!("Booking updated: {}", w.booking.agenda),
                    body: describe(&w.booking),
                    category: NotificationCategory::BookingUpdated,
                }));
            }
        }
        self.collaborators.dispatch(effects);

        tracing::info!(actor = %actor.id, booking_id = %id, siblings = written.len() - 1, "Booking updated");
        Ok(BookingsResponse {
            bookings: written.iter().map(WrittenBooking::summary).collect(),
        })
    }

    pub async fn delete_booking(&self, actor: &Actor, id: Uuid) -> Result<()> {
        let who = actor.clone();
        let zone = self.default_timezone.clone();
        let removed = with_transaction(self.store.as_ref(), move |store, tx| {
            Box::pin(async move { BookingWriter::new(store, &who, &zone).delete(tx, id).await })
        })
        .await?;

        self.collaborators
            .dispatch(vec![SideEffect::Notify(Notification {
                recipients: recipients(actor, &removed.participants),
                title: format!("Booking cancelled: {}", removed.booking.agenda),
                body: describe(&removed.booking),
                category: NotificationCategory::BookingCancelled,
            })]);

        tracing::info!(actor = %actor.id, booking_id = %id, "Booking deleted");
        Ok(())
    }

    /// Hands file metadata to the attachment store and records what it accepted.
    pub async fn attach_files(
        &self,
        actor: &Actor,
        id: Uuid,
        files: Vec<FileMetadata>,
    ) -> Result<Vec<Attachment>> {
        let who = actor.clone();
        let zone = self.default_timezone.clone();
        let attachment_store = Arc::clone(&self.collaborators.attachments);
        let attachments = with_transaction(self.store.as_ref(), move |store, tx| {
            Box::pin(async move {
                let writer = BookingWriter::new(store, &who, &zone);
                writer.owned(tx, id).await?;
                let stored = attachment_store
                    .store(id, &files)
                    .await
                    .map_err(SchedulingError::Unavailable)?;
                writer.attach(tx, id, stored).await
            })
        })
        .await?;

        tracing::info!(booking_id = %id, count = attachments.len(), "Attachments recorded");
        Ok(attachments)
    }

    pub async fn remove_attachment(&self, actor: &Actor, id: Uuid, attachment_id: Uuid) -> Result<()> {
        let who = actor.clone();
        let zone = self.default_timezone.clone();
        with_transaction(self.store.as_ref(), move |store, tx| {
            Box::pin(async move {
                BookingWriter::new(store, &who, &zone)
                    .detach(tx, id, attachment_id)
                    .await
            })
        })
        .await
    }

    fn viewer_zone(&self, actor: &Actor) -> Result<Tz> {
        timeline::parse_zone(&actor.timezone).or_else(|_| timeline::parse_zone(&self.default_timezone))
    }

    fn created_effects(&self, actor: &Actor, w: &WrittenBooking) -> Vec<SideEffect> {
        let mut effects = vec![SideEffect::Notify(Notification {
            recipients: recipients(actor, &w.participants),
            title: format!("New booking: {}", w.booking.agenda),
            body: describe(&w.booking),
            category: NotificationCategory::BookingCreated,
        })];
        if w.booking.needs_meeting_link() {
            effects.push(SideEffect::ProvisionMeetingLink {
                booking_id: w.booking.id,
                start_at: w.booking.start_at,
            });
        }
        effects
    }
}

fn recipients(actor: &Actor, participants: &[Uuid]) -> Vec<Uuid> {
    participants
        .iter()
        .copied()
        .filter(|id| *id != actor.id)
        .collect()
}

/// One-line description in the zone the booking was made in.
fn describe(booking: &Booking) -> String {
    let tz = timeline::parse_zone(&booking.timezone).unwrap_or(Tz::UTC);
    format!(
        "{} to {} ({})",
        timeline::to_local_display(booking.start_at, tz, DISPLAY_LAYOUT),
        timeline::to_local_display(booking.end_at, tz, "%H:%M"),
        tz.name()
    )
}
