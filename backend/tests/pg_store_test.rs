//! Runs the scheduler against a real Postgres. Requires TEST_DATABASE_URL:
//! `cargo test --test pg_store_test -- --ignored`
mod common;

use std::sync::Arc;

use agenda_backend::{
    collaborators::{Collaborators, StaticProfiles},
    models::booking::UpdateBookingRequest,
    scheduling::{with_transaction, SchedulingError, SchedulingService},
    store::{BookingStore, PgBookingStore},
};
use sqlx::postgres::PgPoolOptions;
use time::macros::datetime;

use common::{counseling, entry};

fn database_url() -> String {
    std::env::var("TEST_DATABASE_URL")
        .expect("TEST_DATABASE_URL must be set; tests write and delete data")
}

async fn pg_service() -> (SchedulingService<PgBookingStore>, Arc<StaticProfiles>) {
    let pool = PgPoolOptions::new()
        .max_connections(5)
        .connect(&database_url())
        .await
        .expect("Failed to connect to test database");

    sqlx::migrate!("./migrations")
        .run(&pool)
        .await
        .expect("Failed to run migrations");

    let profiles = Arc::new(StaticProfiles::new());
    let store = Arc::new(PgBookingStore::new(pool, profiles.clone()));
    (
        SchedulingService::new(store, Collaborators::local(), "UTC".to_string()),
        profiles,
    )
}

#[tokio::test]
#[ignore]
async fn pg_capacity_scenario() {
    let (service, _) = pg_service().await;
    let r = common::resource();
    let c = common::client();

    let first = service
        .create_bookings(&r, counseling(vec![entry("2031-03-03", "09:00", "10:00")], vec![c.id]))
        .await
        .unwrap();
    let replay = service
        .create_bookings(&r, counseling(vec![entry("2031-03-03", "09:00", "10:00")], vec![c.id]))
        .await
        .unwrap();
    assert_eq!(first.bookings[0].id, replay.bookings[0].id);
    assert!(!replay.bookings[0].is_new);

    service
        .create_bookings(&r, counseling(vec![entry("2031-03-03", "09:30", "10:30")], vec![c.id]))
        .await
        .unwrap();
    let err = service
        .create_bookings(&r, counseling(vec![entry("2031-03-03", "09:45", "10:15")], vec![c.id]))
        .await
        .unwrap_err();
    assert!(matches!(err, SchedulingError::CapacityExceeded { limit: 2, .. }));

    let detail = service.get_booking(&r, first.bookings[0].id).await.unwrap();
    assert_eq!(detail.participants.len(), 2);
    assert_eq!(detail.booking.start_at, datetime!(2031-03-03 09:00 UTC));
}

#[tokio::test]
#[ignore]
async fn pg_concurrent_requests_respect_capacity() {
    let (service, profiles) = pg_service().await;
    let r = common::resource();
    profiles.set_capacity(r.id, 1).await;

    let mut handles = Vec::new();
    for i in 0..4 {
        let service = service.clone();
        let r = r.clone();
        handles.push(tokio::spawn(async move {
            let start = format!("09:{:02}", i * 5);
            service
                .create_bookings(
                    &r,
                    counseling(vec![entry("2031-04-01", &start, "10:30")], vec![uuid::Uuid::new_v4()]),
                )
                .await
        }));
    }

    let mut ok = 0;
    for handle in handles {
        match handle.await.unwrap() {
            Ok(_) => ok += 1,
            Err(SchedulingError::CapacityExceeded { .. }) => {}
            Err(other) => panic!("unexpected error {:?}", other),
        }
    }
    assert_eq!(ok, 1, "the advisory lock admits exactly one overlapping booking");

    // Concurrent identical retries collapse onto one record.
    let owner = common::resource();
    let client = uuid::Uuid::new_v4();
    let mut handles = Vec::new();
    for _ in 0..4 {
        let service = service.clone();
        let owner = owner.clone();
        handles.push(tokio::spawn(async move {
            service
                .create_bookings(
                    &owner,
                    counseling(vec![entry("2031-04-02", "09:00", "10:00")], vec![client]),
                )
                .await
        }));
    }

    let mut summaries = Vec::new();
    for handle in handles {
        summaries.push(handle.await.unwrap().unwrap().bookings[0].clone());
    }
    assert!(summaries.iter().all(|b| b.id == summaries[0].id));
    assert_eq!(summaries.iter().filter(|b| b.is_new).count(), 1);
}

#[tokio::test]
#[ignore]
async fn pg_delete_leaves_no_orphans() {
    let (service, _) = pg_service().await;
    let r = common::resource();
    let c = common::client();

    let resp = service
        .create_bookings(&r, counseling(vec![entry("2031-05-05", "09:00", "10:00")], vec![c.id]))
        .await
        .unwrap();
    let id = resp.bookings[0].id;
    service
        .update_booking(
            &r,
            id,
            UpdateBookingRequest {
                description: Some(Some("with notes".into())),
                ..Default::default()
            },
        )
        .await
        .unwrap();
    service.delete_booking(&r, id).await.unwrap();

    let store = service.store().clone();
    let (participants, attachments) = with_transaction(store.as_ref(), move |s, tx| {
        Box::pin(async move { Ok((s.participants(tx, id).await?, s.attachments(tx, id).await?)) })
    })
    .await
    .unwrap();
    assert!(participants.is_empty());
    assert!(attachments.is_empty());
}
