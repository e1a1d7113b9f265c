#![allow(dead_code)]
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use time::OffsetDateTime;
use tokio::sync::mpsc::{unbounded_channel, UnboundedReceiver, UnboundedSender};
use uuid::Uuid;

use agenda_backend::{
    api,
    auth::{create_token, AuthConfig},
    collaborators::{
        Collaborators, MeetingLinkProvisioner, MetadataOnlyAttachments, Notification,
        NotificationDispatcher, StaticProfiles,
    },
    models::{
        actor::{Actor, Role},
        booking::{AgendaKind, CreateBookingsRequest, DateEntry, LocationKind},
    },
    scheduling::SchedulingService,
    store::MemoryBookingStore,
    AppState,
};

pub const JWT_SECRET: &str = "test-secret-that-is-at-least-32-chars-long!!";
pub const DEFAULT_TZ: &str = "UTC";

struct ChannelNotifier(UnboundedSender<Notification>);

#[async_trait]
impl NotificationDispatcher for ChannelNotifier {
    async fn notify(&self, notification: &Notification) -> anyhow::Result<()> {
        let _ = self.0.send(notification.clone());
        Ok(())
    }
}

struct ChannelMeetingLinks(UnboundedSender<(Uuid, OffsetDateTime)>);

#[async_trait]
impl MeetingLinkProvisioner for ChannelMeetingLinks {
    async fn provision(&self, booking_id: Uuid, start_at: OffsetDateTime) -> anyhow::Result<()> {
        let _ = self.0.send((booking_id, start_at));
        Ok(())
    }
}

/// A notifier whose every delivery fails.
pub struct BrokenNotifier;

#[async_trait]
impl NotificationDispatcher for BrokenNotifier {
    async fn notify(&self, _notification: &Notification) -> anyhow::Result<()> {
        anyhow::bail!("queue is down")
    }
}

/// Scheduling service on the in-memory store, with side effects captured
/// on channels instead of delivered.
pub struct Harness {
    pub service: SchedulingService<MemoryBookingStore>,
    pub profiles: Arc<StaticProfiles>,
    pub notifications: UnboundedReceiver<Notification>,
    pub meeting_links: UnboundedReceiver<(Uuid, OffsetDateTime)>,
}

pub fn harness() -> Harness {
    let profiles = Arc::new(StaticProfiles::new());
    let store = Arc::new(MemoryBookingStore::new(profiles.clone()));
    let (notify_tx, notifications) = unbounded_channel();
    let (meet_tx, meeting_links) = unbounded_channel();
    let collaborators = Collaborators {
        notifier: Arc::new(ChannelNotifier(notify_tx)),
        meetings: Arc::new(ChannelMeetingLinks(meet_tx)),
        attachments: Arc::new(MetadataOnlyAttachments),
    };
    Harness {
        service: SchedulingService::new(store, collaborators, DEFAULT_TZ.to_string()),
        profiles,
        notifications,
        meeting_links,
    }
}

/// Waits briefly for the next dispatched notification.
pub async fn next_notification(h: &mut Harness) -> Option<Notification> {
    tokio::time::timeout(Duration::from_secs(1), h.notifications.recv())
        .await
        .ok()
        .flatten()
}

pub async fn next_meeting_link(h: &mut Harness) -> Option<(Uuid, OffsetDateTime)> {
    tokio::time::timeout(Duration::from_secs(1), h.meeting_links.recv())
        .await
        .ok()
        .flatten()
}

pub fn actor(role: Role, org_id: Option<Uuid>, timezone: &str) -> Actor {
    Actor {
        id: Uuid::new_v4(),
        role,
        org_id,
        timezone: timezone.to_string(),
    }
}

pub fn resource() -> Actor {
    actor(Role::Resource, None, "UTC")
}

pub fn client() -> Actor {
    actor(Role::Client, None, "UTC")
}

pub fn org_admin() -> Actor {
    actor(Role::OrgAdmin, Some(Uuid::new_v4()), "UTC")
}

pub fn entry(date: &str, start: &str, end: &str) -> DateEntry {
    DateEntry {
        date: date.to_string(),
        start_time: start.to_string(),
        end_time: end.to_string(),
        timezone: None,
    }
}

pub fn entry_in(date: &str, start: &str, end: &str, tz: &str) -> DateEntry {
    DateEntry {
        timezone: Some(tz.to_string()),
        ..entry(date, start, end)
    }
}

/// Online counseling request with the given counterparties.
pub fn counseling(dates: Vec<DateEntry>, participants: Vec<Uuid>) -> CreateBookingsRequest {
    CreateBookingsRequest {
        agenda: "Weekly check-in".to_string(),
        agenda_kind: AgendaKind::Counseling,
        location_kind: LocationKind::Online,
        custom_location: None,
        description: Some("Progress review".to_string()),
        notification_offset_minutes: Some(30),
        owner_kind: None,
        resource_id: None,
        participants,
        dates,
    }
}

/// Spin up a real Axum server on a random port over a fresh in-memory harness.
pub async fn setup_test_app() -> (SocketAddr, Harness) {
    let h = harness();
    let state = AppState {
        scheduling: h.service.clone(),
        auth: AuthConfig {
            jwt_secret: JWT_SECRET.to_string(),
            profiles: h.profiles.clone(),
            default_timezone: DEFAULT_TZ.to_string(),
        },
    };
    let app = api::router(state);

    let listener = tokio::net::TcpListener::bind("127.0.0.1:0")
        .await
        .expect("Failed to bind to random port");
    let addr = listener.local_addr().unwrap();

    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });

    (addr, h)
}

pub fn token_for(actor: &Actor) -> String {
    create_token(actor.id, actor.org_id, actor.role, JWT_SECRET, 1).expect("Failed to create token")
}

/// Create a JWT token that is already expired (exp in the past).
pub fn create_expired_token(user_id: Uuid) -> String {
    use agenda_backend::auth::Claims;
    use jsonwebtoken::{encode, EncodingKey, Header};

    let now = time::OffsetDateTime::now_utc();
    let claims = Claims {
        sub: user_id,
        org_id: None,
        role: Role::Resource,
        exp: (now - time::Duration::hours(1)).unix_timestamp(),
        iat: (now - time::Duration::hours(2)).unix_timestamp(),
    };

    encode(
        &Header::default(),
        &claims,
        &EncodingKey::from_secret(JWT_SECRET.as_bytes()),
    )
    .expect("Failed to create expired token")
}

pub fn http_client() -> reqwest::Client {
    reqwest::Client::new()
}
