use std::sync::Arc;

use async_trait::async_trait;
use sqlx::{PgPool, Postgres, Transaction};
use uuid::Uuid;

use super::{BookingPatch, BookingStore, MatchKey};
use crate::collaborators::ProfileProvider;
use crate::models::actor::OwnerScope;
use crate::models::attachment::Attachment;
use crate::models::booking::{Booking, DEFAULT_MAX_CONCURRENT_SESSIONS};
use crate::scheduling::{Interval, Result, SchedulingError};

macro_rules! select_bookings {
    ($($tail:literal),*) => {
        concat!(
            "SELECT b.id, b.start_at, b.end_at, b.timezone, b.owner_kind, b.owner_id, ",
            "b.resource_id, b.agenda, b.agenda_kind, b.location_kind, b.custom_location, ",
            "b.description, b.notification_offset_minutes, b.created_by, b.updated_by, ",
            "b.created_at, b.updated_at FROM bookings b ",
            $($tail),*
        )
    };
}

pub struct PgBookingStore {
    pool: PgPool,
    profiles: Arc<dyn ProfileProvider>,
}

impl PgBookingStore {
    pub fn new(pool: PgPool, profiles: Arc<dyn ProfileProvider>) -> Self {
        Self { pool, profiles }
    }
}

#[async_trait]
impl BookingStore for PgBookingStore {
    type Tx = Transaction<'static, Postgres>;

    async fn begin(&self) -> Result<Self::Tx> {
        Ok(self.pool.begin().await?)
    }

    async fn commit(&self, tx: Self::Tx) -> Result<()> {
        Ok(tx.commit().await?)
    }

    async fn rollback(&self, tx: Self::Tx) -> Result<()> {
        Ok(tx.rollback().await?)
    }

    async fn lock_timeline(&self, tx: &mut Self::Tx, key: Uuid) -> Result<()> {
        // Released automatically at COMMIT/ROLLBACK.
        sqlx::query("SELECT pg_advisory_xact_lock(hashtextextended($1::text, 0))")
            .bind(key)
            .execute(&mut **tx)
            .await?;
        Ok(())
    }

    async fn get(&self, tx: &mut Self::Tx, id: Uuid) -> Result<Option<Booking>> {
        let booking =
            sqlx::query_as::<_, Booking>(select_bookings!("WHERE b.id = $1 FOR NO KEY UPDATE"))
                .bind(id)
                .fetch_optional(&mut **tx)
                .await?;
        Ok(booking)
    }

    async fn find_matching(&self, tx: &mut Self::Tx, key: &MatchKey) -> Result<Option<Booking>> {
        let booking = sqlx::query_as::<_, Booking>(select_bookings!(
            "WHERE b.owner_kind = $1 AND b.owner_id = $2 ",
            "AND b.start_at = $3 AND b.end_at = $4 AND b.agenda_kind = $5 ",
            "ORDER BY b.created_at, b.id LIMIT 1"
        ))
        .bind(key.owner_kind)
        .bind(key.owner_id)
        .bind(key.start_at)
        .bind(key.end_at)
        .bind(key.agenda_kind)
        .fetch_optional(&mut **tx)
        .await?;
        Ok(booking)
    }

    async fn insert(&self, tx: &mut Self::Tx, b: &Booking) -> Result<()> {
        sqlx::query(
            r#"
            INSERT INTO bookings
                (id, start_at, end_at, timezone, owner_kind, owner_id, resource_id,
                 agenda, agenda_kind, location_kind, custom_location, description,
                 notification_offset_minutes, created_by, updated_by, created_at, updated_at)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13, $14, $15, $16, $17)
            "#,
        )
        .bind(b.id)
        .bind(b.start_at)
        .bind(b.end_at)
        .bind(&b.timezone)
        .bind(b.owner_kind)
        .bind(b.owner_id)
        .bind(b.resource_id)
        .bind(&b.agenda)
        .bind(b.agenda_kind)
        .bind(b.location_kind)
        .bind(&b.custom_location)
        .bind(&b.description)
        .bind(b.notification_offset_minutes)
        .bind(b.created_by)
        .bind(b.updated_by)
        .bind(b.created_at)
        .bind(b.updated_at)
        .execute(&mut **tx)
        .await?;
        Ok(())
    }

    async fn update(
        &self,
        tx: &mut Self::Tx,
        id: Uuid,
        patch: &BookingPatch,
        updated_by: Uuid,
    ) -> Result<Booking> {
        let schedule = patch.schedule.as_ref();
        let rows = sqlx::query(
            r#"
            UPDATE bookings
            SET start_at                    = COALESCE($2, start_at),
                end_at                      = COALESCE($3, end_at),
                timezone                    = COALESCE($4, timezone),
                agenda                      = COALESCE($5, agenda),
                agenda_kind                 = COALESCE($6, agenda_kind),
                location_kind               = COALESCE($7, location_kind),
                custom_location             = CASE WHEN $8 THEN $9 ELSE custom_location END,
                description                 = CASE WHEN $10 THEN $11 ELSE description END,
                notification_offset_minutes = COALESCE($12, notification_offset_minutes),
                updated_by                  = $13,
                updated_at                  = NOW()
            WHERE id = $1
            "#,
        )
        .bind(id)
        .bind(schedule.map(|s| s.start_at))
        .bind(schedule.map(|s| s.end_at))
        .bind(schedule.map(|s| s.timezone.clone()))
        .bind(&patch.agenda)
        .bind(patch.agenda_kind)
        .bind(patch.location_kind)
        .bind(patch.custom_location.is_some())
        .bind(patch.custom_location.clone().flatten())
        .bind(patch.description.is_some())
        .bind(patch.description.clone().flatten())
        .bind(patch.notification_offset_minutes)
        .bind(updated_by)
        .execute(&mut **tx)
        .await?
        .rows_affected();

        if rows == 0 {
            return Err(SchedulingError::NotFound(format!("Booking {} not found", id)));
        }

        self.get(tx, id)
            .await?
            .ok_or_else(|| SchedulingError::NotFound(format!("Booking {} not found", id)))
    }

    async fn delete(&self, tx: &mut Self::Tx, id: Uuid) -> Result<bool> {
        // Children first; the FK cascade is a backstop, not the mechanism.
        sqlx::query("DELETE FROM booking_attachments WHERE booking_id = $1")
            .bind(id)
            .execute(&mut **tx)
            .await?;
        sqlx::query("DELETE FROM booking_participants WHERE booking_id = $1")
            .bind(id)
            .execute(&mut **tx)
            .await?;
        let rows = sqlx::query("DELETE FROM bookings WHERE id = $1")
            .bind(id)
            .execute(&mut **tx)
            .await?
            .rows_affected();
        Ok(rows > 0)
    }

    async fn participants(&self, tx: &mut Self::Tx, booking_id: Uuid) -> Result<Vec<Uuid>> {
        let ids: Vec<Uuid> = sqlx::query_scalar(
            "SELECT user_id FROM booking_participants WHERE booking_id = $1 ORDER BY created_at, user_id",
        )
        .bind(booking_id)
        .fetch_all(&mut **tx)
        .await?;
        Ok(ids)
    }

    async fn upsert_participants(
        &self,
        tx: &mut Self::Tx,
        booking_id: Uuid,
        user_ids: &[Uuid],
    ) -> Result<()> {
        if user_ids.is_empty() {
            return Ok(());
        }
        sqlx::query(
            r#"
            INSERT INTO booking_participants (booking_id, user_id)
            SELECT $1, u FROM UNNEST($2::uuid[]) AS u
            ON CONFLICT (booking_id, user_id) DO NOTHING
            "#,
        )
        .bind(booking_id)
        .bind(user_ids.to_vec())
        .execute(&mut **tx)
        .await?;
        Ok(())
    }

    async fn clear_participants(&self, tx: &mut Self::Tx, booking_id: Uuid) -> Result<()> {
        sqlx::query("DELETE FROM booking_participants WHERE booking_id = $1")
            .bind(booking_id)
            .execute(&mut **tx)
            .await?;
        Ok(())
    }

    async fn find_overlapping(
        &self,
        tx: &mut Self::Tx,
        resource_id: Uuid,
        window: Interval,
        exclude: Option<Uuid>,
    ) -> Result<Vec<Booking>> {
        let rows = sqlx::query_as::<_, Booking>(select_bookings!(
            "JOIN booking_participants p ON p.booking_id = b.id ",
            "WHERE p.user_id = $1 AND b.start_at < $3 AND $2 < b.end_at ",
            "AND ($4::uuid IS NULL OR b.id <> $4) ",
            "ORDER BY b.start_at, b.id"
        ))
        .bind(resource_id)
        .bind(window.start)
        .bind(window.end)
        .bind(exclude)
        .fetch_all(&mut **tx)
        .await?;
        Ok(rows)
    }

    async fn find_in_range(
        &self,
        tx: &mut Self::Tx,
        scope: &OwnerScope,
        window: Interval,
    ) -> Result<Vec<Booking>> {
        let rows = sqlx::query_as::<_, Booking>(select_bookings!(
            "WHERE b.start_at < $3 AND $2 < b.end_at ",
            "AND ((b.owner_kind = 'resource' AND b.owner_id = $1) ",
            "  OR b.resource_id = $1 ",
            "  OR ($4::uuid IS NOT NULL AND b.owner_kind = 'organization' AND b.owner_id = $4) ",
            "  OR EXISTS (SELECT 1 FROM booking_participants p ",
            "             WHERE p.booking_id = b.id AND p.user_id = $1)) ",
            "ORDER BY b.start_at, b.id"
        ))
        .bind(scope.user_id)
        .bind(window.start)
        .bind(window.end)
        .bind(scope.org_id)
        .fetch_all(&mut **tx)
        .await?;
        Ok(rows)
    }

    async fn is_resource(&self, _tx: &mut Self::Tx, user_id: Uuid) -> Result<bool> {
        self.profiles
            .is_resource(user_id)
            .await
            .map_err(SchedulingError::Unavailable)
    }

    async fn get_capacity(&self, _tx: &mut Self::Tx, resource_id: Uuid) -> Result<i32> {
        let configured = self
            .profiles
            .capacity(resource_id)
            .await
            .map_err(SchedulingError::Unavailable)?;
        Ok(configured.unwrap_or(DEFAULT_MAX_CONCURRENT_SESSIONS))
    }

    async fn attachments(&self, tx: &mut Self::Tx, booking_id: Uuid) -> Result<Vec<Attachment>> {
        let rows = sqlx::query_as::<_, Attachment>(
            r#"
            SELECT id, booking_id, file_name, content_type, size_bytes, storage_key,
                   uploaded_by, created_at
            FROM booking_attachments
            WHERE booking_id = $1
            ORDER BY created_at, id
            "#,
        )
        .bind(booking_id)
        .fetch_all(&mut **tx)
        .await?;
        Ok(rows)
    }

    async fn insert_attachments(&self, tx: &mut Self::Tx, attachments: &[Attachment]) -> Result<()> {
        for a in attachments {
            sqlx::query(
                r#"
                INSERT INTO booking_attachments
                    (id, booking_id, file_name, content_type, size_bytes, storage_key, uploaded_by, created_at)
                VALUES ($1, $2, $3, $4, $5, $6, $7, $8)
                "#,
            )
            .bind(a.id)
            .bind(a.booking_id)
            .bind(&a.file_name)
            .bind(&a.content_type)
            .bind(a.size_bytes)
            .bind(&a.storage_key)
            .bind(a.uploaded_by)
            .bind(a.created_at)
            .execute(&mut **tx)
            .await?;
        }
        Ok(())
    }

    async fn delete_attachment(
        &self,
        tx: &mut Self::Tx,
        booking_id: Uuid,
        attachment_id: Uuid,
    ) -> Result<bool> {
        let rows = sqlx::query("DELETE FROM booking_attachments WHERE id = $1 AND booking_id = $2")
            .bind(attachment_id)
            .bind(booking_id)
            .execute(&mut **tx)
            .await?
            .rows_affected();
        Ok(rows > 0)
    }
}
