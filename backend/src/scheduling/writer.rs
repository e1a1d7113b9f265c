//! Transactional create/update/delete of bookings and their participant
//! bindings. Every method expects to run inside one store transaction and
//! leaves commit/rollback to the caller.

use time::OffsetDateTime;
use uuid::Uuid;

use super::conflict::{check_capacity, lock_timelines, Interval};
use super::error::{Result, SchedulingError};
use super::timeline;
use crate::models::actor::{Actor, Role};
use crate::models::attachment::{Attachment, StoredFile};
use crate::models::booking::{
    AgendaKind, Booking, BookingSummary, CreateBookingsRequest, DateEntry, OwnerKind, Slot,
    UpdateBookingRequest, MAX_COUNTERPARTIES, MAX_DATES,
};
use crate::store::{BookingPatch, BookingStore, MatchKey};

/// A booking as left by a write, with its full participant set.
#[derive(Debug, Clone, PartialEq)]
pub struct WrittenBooking {
    pub booking: Booking,
    pub participants: Vec<Uuid>,
    /// `false` when an identical existing record was reused or edited in place.
    pub is_new: bool,
}

impl WrittenBooking {
    pub fn summary(&self) -> BookingSummary {
        BookingSummary {
            id: self.booking.id,
            start_at: self.booking.start_at,
            end_at: self.booking.end_at,
            agenda_kind: self.booking.agenda_kind,
            location_kind: self.booking.location_kind,
            is_new: self.is_new,
        }
    }
}

pub struct BookingWriter<'a, S: BookingStore> {
    store: &'a S,
    actor: &'a Actor,
    default_zone: &'a str,
}

impl<'a, S: BookingStore> BookingWriter<'a, S> {
    pub fn new(store: &'a S, actor: &'a Actor, default_zone: &'a str) -> Self {
        Self {
            store,
            actor,
            default_zone,
        }
    }

    /// Normalizes a date entry into absolute instants. The entry's own zone
    /// wins, then the actor's, then the service default.
    pub fn normalize(&self, entry: &DateEntry) -> Result<Slot> {
        let zone = [entry.timezone.as_deref(), Some(self.actor.timezone.as_str())]
            .into_iter()
            .flatten()
            .map(str::trim)
            .find(|z| !z.is_empty())
            .unwrap_or(self.default_zone);
        let tz = timeline::parse_zone(zone)?;
        let start_at = timeline::to_instant(&entry.date, &entry.start_time, zone)?;
        let end_at = timeline::to_instant(&entry.date, &entry.end_time, zone)?;
        Interval::new(start_at, end_at)?;
        Ok(Slot {
            start_at,
            end_at,
            timezone: tz.name().to_string(),
        })
    }

    /// Creates (or idempotently reuses) one booking per date entry, in order.
    pub async fn create(
        &self,
        tx: &mut S::Tx,
        req: &CreateBookingsRequest,
    ) -> Result<Vec<WrittenBooking>> {
        match req.dates.len() {
            0 => return Err(SchedulingError::Invalid("at least one date is required".into())),
            n if n > MAX_DATES => return Err(SchedulingError::TooManyDates(n)),
            _ => {}
        }

        let (owner_kind, owner_id) = self.resolve_owner(req)?;
        let resource_id = req
            .resource_id
            .or_else(|| self.actor.is_resource().then_some(self.actor.id));
        let participants = participant_set(&self.counterparties(&req.participants)?, resource_id);
        if req.agenda_kind == AgendaKind::Counseling && participants.is_empty() {
            return Err(SchedulingError::MissingParticipant);
        }

        // The owner lock covers the identical-request lookup below.
        let constrained = self.constrained(tx, &participants, resource_id).await?;
        let mut keys = constrained.clone();
        keys.push(owner_id);
        lock_timelines(self.store, tx, &keys).await?;

        let mut written = Vec::with_capacity(req.dates.len());
        for entry in &req.dates {
            let slot = self.normalize(entry)?;
            let key = MatchKey {
                owner_kind,
                owner_id,
                start_at: slot.start_at,
                end_at: slot.end_at,
                agenda_kind: req.agenda_kind,
            };
            let existing = self.store.find_matching(tx, &key).await?;

            // A matched record is the same logical booking; it must not count against itself.
            let exclude = existing.as_ref().map(|b| b.id);
            for resource_id in &constrained {
                check_capacity(self.store, tx, *resource_id, slot.interval(), exclude).await?;
            }

            let (booking, is_new) = match existing {
                Some(booking) => {
                    let bound = self.store.participants(tx, booking.id).await?;
                    let merged = merge(&bound, &participants);
                    let counted = merged
                        .iter()
                        .filter(|id| Some(**id) != booking.resource_id)
                        .count();
                    if counted > MAX_COUNTERPARTIES {
                        return Err(too_many_participants());
                    }
                    tracing::debug!(booking_id = %booking.id, "Reusing identical booking");
                    (booking, false)
                }
                None => {
                    let now = OffsetDateTime::now_utc();
                    let booking = Booking {
                        id: Uuid::new_v4(),
                        start_at: slot.start_at,
                        end_at: slot.end_at,
                        timezone: slot.timezone,
                        owner_kind,
                        owner_id,
                        resource_id,
                        agenda: req.agenda.clone(),
                        agenda_kind: req.agenda_kind,
                        location_kind: req.location_kind,
                        custom_location: req.custom_location.clone(),
                        description: req.description.clone(),
                        notification_offset_minutes: req.notification_offset_minutes,
                        created_by: self.actor.id,
                        updated_by: self.actor.id,
                        created_at: now,
                        updated_at: now,
                    };
                    self.store.insert(tx, &booking).await?;
                    (booking, true)
                }
            };

            self.store.upsert_participants(tx, booking.id, &participants).await?;
            let bound = self.store.participants(tx, booking.id).await?;
            written.push(WrittenBooking {
                booking,
                participants: bound,
                is_new,
            });
        }
        Ok(written)
    }

    /// Edits the primary record in place (first date) and optionally creates
    /// a sibling from the second date carrying the same content and participants.
    pub async fn update(
        &self,
        tx: &mut S::Tx,
        id: Uuid,
        req: &UpdateBookingRequest,
    ) -> Result<Vec<WrittenBooking>> {
        if req.dates.len() > MAX_DATES {
            return Err(SchedulingError::TooManyDates(req.dates.len()));
        }
        let current = self.owned(tx, id).await?;

        let replacement = match &req.participants {
            Some(requested) => Some(participant_set(
                &self.counterparties(requested)?,
                current.resource_id,
            )),
            None => None,
        };
        let bound = match &replacement {
            Some(set) => set.clone(),
            None => self.store.participants(tx, id).await?,
        };
        let constrained = self.constrained(tx, &bound, current.resource_id).await?;
        lock_timelines(self.store, tx, &constrained).await?;

        let mut patch = BookingPatch::from_request(req);
        let mut entries = req.dates.iter();
        if let Some(entry) = entries.next() {
            patch.schedule = Some(self.normalize(entry)?);
        }
        if patch.schedule.is_some() || replacement.is_some() {
            let window = patch
                .schedule
                .as_ref()
                .map_or(current.interval(), Slot::interval);
            for resource_id in &constrained {
                check_capacity(self.store, tx, *resource_id, window, Some(current.id)).await?;
            }
        }

        let primary = if patch.is_empty() {
            current
        } else {
            self.store.update(tx, id, &patch, self.actor.id).await?
        };

        let participants = match replacement {
            Some(set) => {
                self.store.clear_participants(tx, id).await?;
                self.store.upsert_participants(tx, id, &set).await?;
                set
            }
            None => bound,
        };
        if primary.agenda_kind == AgendaKind::Counseling && participants.is_empty() {
            return Err(SchedulingError::MissingParticipant);
        }

        let mut written = vec![WrittenBooking {
            booking: primary,
            participants,
            is_new: false,
        }];

        if let Some(entry) = entries.next() {
            let slot = self.normalize(entry)?;
            let sibling = self.sibling_of(&written[0].booking, slot);
            for resource_id in &constrained {
                check_capacity(self.store, tx, *resource_id, sibling.interval(), None).await?;
            }
            self.store.insert(tx, &sibling).await?;
            let participants = written[0].participants.clone();
            self.store
                .upsert_participants(tx, sibling.id, &participants)
                .await?;
            tracing::debug!(primary = %id, sibling = %sibling.id, "Created sibling booking");
            written.push(WrittenBooking {
                booking: sibling,
                participants,
                is_new: true,
            });
        }

        Ok(written)
    }

    /// Deletes the booking with its bindings and attachments. Returns the
    /// removed record and the participants it was bound to.
    pub async fn delete(&self, tx: &mut S::Tx, id: Uuid) -> Result<WrittenBooking> {
        let booking = self.owned(tx, id).await?;
        let participants = self.store.participants(tx, id).await?;
        if !self.store.delete(tx, id).await? {
            return Err(not_found(id));
        }
        Ok(WrittenBooking {
            booking,
            participants,
            is_new: false,
        })
    }

    /// Persists attachment records returned by the attachment store.
    pub async fn attach(
        &self,
        tx: &mut S::Tx,
        booking_id: Uuid,
        files: Vec<StoredFile>,
    ) -> Result<Vec<Attachment>> {
        let now = OffsetDateTime::now_utc();
        let attachments: Vec<Attachment> = files
            .into_iter()
            .map(|f| Attachment {
                id: Uuid::new_v4(),
                booking_id,
                file_name: f.file_name,
                content_type: f.content_type,
                size_bytes: f.size_bytes,
                storage_key: f.storage_key,
                uploaded_by: self.actor.id,
                created_at: now,
            })
            .collect();
        self.store.insert_attachments(tx, &attachments).await?;
        Ok(attachments)
    }

    pub async fn detach(&self, tx: &mut S::Tx, booking_id: Uuid, attachment_id: Uuid) -> Result<()> {
        self.owned(tx, booking_id).await?;
        if !self
            .store
            .delete_attachment(tx, booking_id, attachment_id)
            .await?
        {
            return Err(SchedulingError::NotFound(format!(
                "Attachment {} not found",
                attachment_id
            )));
        }
        Ok(())
    }

    /// Loads a booking the actor is allowed to mutate.
    pub async fn owned(&self, tx: &mut S::Tx, id: Uuid) -> Result<Booking> {
        let booking = self.store.get(tx, id).await?.ok_or_else(|| not_found(id))?;
        if !self.actor.owns(&booking) {
            tracing::warn!(booking_id = %id, actor = %self.actor.id, "Mutation denied");
            return Err(SchedulingError::Forbidden);
        }
        Ok(booking)
    }

    fn resolve_owner(&self, req: &CreateBookingsRequest) -> Result<(OwnerKind, Uuid)> {
        let actor = self.actor;
        let kind = req.owner_kind.unwrap_or(match actor.role {
            Role::OrgAdmin => OwnerKind::Organization,
            Role::Resource | Role::Client => OwnerKind::Resource,
        });
        match kind {
            OwnerKind::Organization => {
                let org_id = actor.org_id.ok_or(SchedulingError::Forbidden)?;
                if actor.role == Role::Client {
                    return Err(SchedulingError::Forbidden);
                }
                Ok((OwnerKind::Organization, org_id))
            }
            OwnerKind::Resource if actor.role == Role::Resource => {
                Ok((OwnerKind::Resource, req.resource_id.unwrap_or(actor.id)))
            }
            OwnerKind::Resource => req
                .resource_id
                .map(|id| (OwnerKind::Resource, id))
                .ok_or_else(|| {
                    SchedulingError::Invalid("resource_id is required to book a resource".into())
                }),
        }
    }

    /// Deduplicated counterparties. Clients are always among their own bookings'.
    fn counterparties(&self, requested: &[Uuid]) -> Result<Vec<Uuid>> {
        let mut out: Vec<Uuid> = Vec::with_capacity(requested.len() + 1);
        if self.actor.role == Role::Client {
            out.push(self.actor.id);
        }
        for id in requested {
            if !out.contains(id) {
                out.push(*id);
            }
        }
        if out.len() > MAX_COUNTERPARTIES {
            return Err(too_many_participants());
        }
        Ok(out)
    }

    /// Bound ids whose timelines carry a capacity rule: the booking's
    /// resource plus any participant with a resource profile.
    async fn constrained(
        &self,
        tx: &mut S::Tx,
        participants: &[Uuid],
        resource_id: Option<Uuid>,
    ) -> Result<Vec<Uuid>> {
        let mut out: Vec<Uuid> = resource_id.into_iter().collect();
        for id in participants {
            if !out.contains(id) && self.store.is_resource(tx, *id).await? {
                out.push(*id);
            }
        }
        Ok(out)
    }

    fn sibling_of(&self, primary: &Booking, slot: Slot) -> Booking {
        let now = OffsetDateTime::now_utc();
        Booking {
            id: Uuid::new_v4(),
            start_at: slot.start_at,
            end_at: slot.end_at,
            timezone: slot.timezone,
            created_by: self.actor.id,
            updated_by: self.actor.id,
            created_at: now,
            updated_at: now,
            ..primary.clone()
        }
    }
}

/// Counterparties plus the capacity-constrained resource, without duplicates.
fn participant_set(counterparties: &[Uuid], resource_id: Option<Uuid>) -> Vec<Uuid> {
    let mut set = counterparties.to_vec();
    if let Some(resource_id) = resource_id {
        if !set.contains(&resource_id) {
            set.push(resource_id);
        }
    }
    set
}

fn merge(bound: &[Uuid], incoming: &[Uuid]) -> Vec<Uuid> {
    let mut merged = bound.to_vec();
    for id in incoming {
        if !merged.contains(id) {
            merged.push(*id);
        }
    }
    merged
}

fn too_many_participants() -> SchedulingError {
    SchedulingError::Invalid(format!(
        "at most {} participants per booking",
        MAX_COUNTERPARTIES
    ))
}

fn not_found(id: Uuid) -> SchedulingError {
    SchedulingError::NotFound(format!("Booking {} not found", id))
}
