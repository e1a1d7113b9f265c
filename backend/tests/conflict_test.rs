mod common;

use agenda_backend::models::booking::AgendaKind;
use agenda_backend::scheduling::{check_capacity, with_transaction, Interval, SchedulingError};
use time::macros::datetime;
use time::OffsetDateTime;

fn iv(start: OffsetDateTime, end: OffsetDateTime) -> Interval {
    Interval::new(start, end).unwrap()
}

#[test]
fn overlap_is_symmetric() {
    let cases = [
        (
            iv(datetime!(2025-03-03 09:00 UTC), datetime!(2025-03-03 10:00 UTC)),
            iv(datetime!(2025-03-03 09:30 UTC), datetime!(2025-03-03 10:30 UTC)),
            true,
        ),
        (
            iv(datetime!(2025-03-03 09:00 UTC), datetime!(2025-03-03 12:00 UTC)),
            iv(datetime!(2025-03-03 10:00 UTC), datetime!(2025-03-03 11:00 UTC)),
            true,
        ),
        (
            iv(datetime!(2025-03-03 09:00 UTC), datetime!(2025-03-03 10:00 UTC)),
            iv(datetime!(2025-03-03 11:00 UTC), datetime!(2025-03-03 12:00 UTC)),
            false,
        ),
    ];
    for (a, b, expected) in cases {
        assert_eq!(a.overlaps(&b), expected, "{:?} vs {:?}", a, b);
        assert_eq!(b.overlaps(&a), expected, "{:?} vs {:?}", b, a);
    }
}

#[test]
fn touching_endpoints_do_not_overlap() {
    let morning = iv(datetime!(2025-03-03 09:00 UTC), datetime!(2025-03-03 10:00 UTC));
    let next = iv(datetime!(2025-03-03 10:00 UTC), datetime!(2025-03-03 11:00 UTC));
    assert!(!morning.overlaps(&next));
    assert!(!next.overlaps(&morning));
}

#[test]
fn empty_or_inverted_interval_is_rejected() {
    let at = datetime!(2025-03-03 09:00 UTC);
    assert!(matches!(
        Interval::new(at, at),
        Err(SchedulingError::InvalidTimeInput(_))
    ));
    assert!(matches!(
        Interval::new(at, at - time::Duration::minutes(1)),
        Err(SchedulingError::InvalidTimeInput(_))
    ));
}

#[tokio::test]
async fn capacity_counts_only_overlapping_bookings_of_the_resource() {
    let h = common::harness();
    let r = common::resource();
    let c = common::client();

    let first = h
        .service
        .create_bookings(
            &r,
            common::counseling(vec![common::entry("2025-03-03", "09:00", "10:00")], vec![c.id]),
        )
        .await
        .unwrap();
    h.service
        .create_bookings(
            &r,
            common::counseling(vec![common::entry("2025-03-03", "09:30", "10:30")], vec![c.id]),
        )
        .await
        .unwrap();
    let first_id = first.bookings[0].id;

    let store = h.service.store().clone();
    let resource_id = r.id;
    let (full, excluded, elsewhere, other_resource) = with_transaction(store.as_ref(), move |s, tx| {
        Box::pin(async move {
            let window = Interval::new(
                datetime!(2025-03-03 09:45 UTC),
                datetime!(2025-03-03 10:15 UTC),
            )?;
            let later = Interval::new(
                datetime!(2025-03-03 10:30 UTC),
                datetime!(2025-03-03 11:00 UTC),
            )?;
            Ok((
                check_capacity(s, tx, resource_id, window, None).await,
                check_capacity(s, tx, resource_id, window, Some(first_id)).await,
                check_capacity(s, tx, resource_id, later, None).await,
                check_capacity(s, tx, uuid::Uuid::new_v4(), window, None).await,
            ))
        })
    })
    .await
    .unwrap();

    match full {
        Err(SchedulingError::CapacityExceeded { resource_id: rid, limit, .. }) => {
            assert_eq!(rid, r.id);
            assert_eq!(limit, 2);
        }
        other => panic!("expected CapacityExceeded, got {:?}", other),
    }
    assert!(excluded.is_ok(), "excluding a booking frees its slot");
    assert!(elsewhere.is_ok(), "touching the end of the window is not an overlap");
    assert!(other_resource.is_ok(), "bookings of another resource do not count");
}

#[tokio::test]
async fn configured_capacity_overrides_default() {
    let h = common::harness();
    let r = common::resource();
    let c = common::client();
    h.profiles.set_capacity(r.id, 3).await;

    // Distinct kinds so identical windows are not collapsed into one booking.
    for kind in [AgendaKind::Counseling, AgendaKind::Class, AgendaKind::Seminar] {
        let mut req = common::counseling(vec![common::entry("2025-03-03", "09:00", "10:00")], vec![c.id]);
        req.agenda_kind = kind;
        h.service.create_bookings(&r, req).await.unwrap();
    }

    let mut fourth = common::counseling(vec![common::entry("2025-03-03", "09:15", "09:45")], vec![c.id]);
    fourth.agenda_kind = AgendaKind::Other;
    let err = h.service.create_bookings(&r, fourth).await.unwrap_err();
    assert!(matches!(err, SchedulingError::CapacityExceeded { limit: 3, .. }));
}
