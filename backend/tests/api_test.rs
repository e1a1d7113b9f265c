mod common;

use serde_json::json;
use uuid::Uuid;

fn booking_payload(date: &str, start: &str, end: &str, participants: &[Uuid]) -> serde_json::Value {
    json!({
        "agenda": "Intake session",
        "agenda_kind": "counseling",
        "location_kind": "online",
        "participants": participants,
        "dates": [{ "date": date, "start_time": start, "end_time": end }],
    })
}

#[tokio::test]
async fn requests_without_valid_token_are_rejected() {
    let (addr, _h) = common::setup_test_app().await;
    let client = common::http_client();

    let resp = client
        .get(format!("http://{}/api/bookings?from=2025-03-03&to=2025-03-04", addr))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), 401);

    let expired = common::create_expired_token(Uuid::new_v4());
    let resp = client
        .get(format!("http://{}/api/auth/me", addr))
        .header("Authorization", format!("Bearer {}", expired))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), 401);

    let resp = client
        .get(format!("http://{}/api/auth/me", addr))
        .header("Authorization", "Bearer not-a-jwt")
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), 401);
}

#[tokio::test]
async fn me_uses_profile_timezone_with_default_fallback() {
    let (addr, h) = common::setup_test_app().await;
    let client = common::http_client();
    let r = common::resource();
    let c = common::client();
    h.profiles.set_timezone(r.id, "Asia/Jakarta").await;

    let body: serde_json::Value = client
        .get(format!("http://{}/api/auth/me", addr))
        .header("Authorization", format!("Bearer {}", common::token_for(&r)))
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(body["id"], json!(r.id));
    assert_eq!(body["role"], "resource");
    assert_eq!(body["timezone"], "Asia/Jakarta");

    let body: serde_json::Value = client
        .get(format!("http://{}/api/auth/me", addr))
        .header("Authorization", format!("Bearer {}", common::token_for(&c)))
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(body["timezone"], common::DEFAULT_TZ);
}

#[tokio::test]
async fn booking_lifecycle_over_http() {
    let (addr, _h) = common::setup_test_app().await;
    let client = common::http_client();
    let r = common::resource();
    let c = common::client();
    let token = common::token_for(&r);

    let resp = client
        .post(format!("http://{}/api/bookings", addr))
        .header("Authorization", format!("Bearer {}", token))
        .json(&booking_payload("2025-03-03", "09:00", "10:00", &[c.id]))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), 200);
    let body: serde_json::Value = resp.json().await.unwrap();
    let created = &body["bookings"][0];
    assert_eq!(created["is_new"], true);
    assert_eq!(created["start_at"], "2025-03-03T09:00:00Z");
    let id = created["id"].as_str().unwrap().to_string();

    let resp = client
        .get(format!("http://{}/api/bookings?from=2025-03-03&to=2025-03-03", addr))
        .header("Authorization", format!("Bearer {}", token))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), 200);
    let items: Vec<serde_json::Value> = resp.json().await.unwrap();
    assert_eq!(items.len(), 1);
    assert_eq!(items[0]["type"], "counseling");
    assert_eq!(items[0]["display_start"], "2025-03-03 09:00");

    let resp = client
        .put(format!("http://{}/api/bookings/{}", addr, id))
        .header("Authorization", format!("Bearer {}", token))
        .json(&json!({ "agenda": "Follow-up", "dates": [{ "date": "2025-03-03", "start_time": "11:00", "end_time": "12:00" }] }))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), 200);
    let body: serde_json::Value = resp.json().await.unwrap();
    assert_eq!(body["bookings"][0]["id"], id.as_str());
    assert_eq!(body["bookings"][0]["is_new"], false);

    let resp = client
        .post(format!("http://{}/api/bookings/{}/attachments", addr, id))
        .header("Authorization", format!("Bearer {}", token))
        .json(&json!({ "files": [{
            "file_name": "consent.pdf",
            "content_type": "application/pdf",
            "size_bytes": 1024,
            "upload_ref": "u-1",
        }] }))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), 200);
    let attachments: Vec<serde_json::Value> = resp.json().await.unwrap();
    let attachment_id = attachments[0]["id"].as_str().unwrap().to_string();

    let detail: serde_json::Value = client
        .get(format!("http://{}/api/bookings/{}", addr, id))
        .header("Authorization", format!("Bearer {}", token))
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(detail["agenda"], "Follow-up");
    assert_eq!(detail["participants"], json!([c.id, r.id]));
    assert_eq!(detail["attachments"][0]["file_name"], "consent.pdf");

    let resp = client
        .delete(format!("http://{}/api/bookings/{}/attachments/{}", addr, id, attachment_id))
        .header("Authorization", format!("Bearer {}", token))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), 200);

    let resp = client
        .delete(format!("http://{}/api/bookings/{}", addr, id))
        .header("Authorization", format!("Bearer {}", token))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), 200);

    let resp = client
        .get(format!("http://{}/api/bookings/{}", addr, id))
        .header("Authorization", format!("Bearer {}", token))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), 404);
}

#[tokio::test]
async fn capacity_conflict_maps_to_409_with_window() {
    let (addr, h) = common::setup_test_app().await;
    let client = common::http_client();
    let r = common::resource();
    let c = common::client();
    h.profiles.set_capacity(r.id, 1).await;
    let token = common::token_for(&r);

    let resp = client
        .post(format!("http://{}/api/bookings", addr))
        .header("Authorization", format!("Bearer {}", token))
        .json(&booking_payload("2025-03-03", "09:00", "10:00", &[c.id]))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), 200);

    let resp = client
        .post(format!("http://{}/api/bookings", addr))
        .header("Authorization", format!("Bearer {}", token))
        .json(&booking_payload("2025-03-03", "09:30", "10:30", &[c.id]))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), 409);
    let body: serde_json::Value = resp.json().await.unwrap();
    assert_eq!(body["limit"], 1);
    assert_eq!(body["start"], "2025-03-03T09:30:00Z");
    assert_eq!(body["end"], "2025-03-03T10:30:00Z");
    assert!(body["error"].is_string());
}

#[tokio::test]
async fn bad_input_maps_to_400() {
    let (addr, _h) = common::setup_test_app().await;
    let client = common::http_client();
    let r = common::resource();
    let token = common::token_for(&r);

    let cases = [
        booking_payload("2025-03-03", "10:00", "09:00", &[]),
        booking_payload("2025-03-03", "9 o'clock", "10:00", &[]),
        json!({
            "agenda": "",
            "agenda_kind": "class",
            "location_kind": "offline",
            "dates": [{ "date": "2025-03-03", "start_time": "09:00", "end_time": "10:00" }],
        }),
        json!({
            "agenda": "Too many",
            "agenda_kind": "class",
            "location_kind": "offline",
            "participants": [Uuid::new_v4(), Uuid::new_v4(), Uuid::new_v4()],
            "dates": [{ "date": "2025-03-03", "start_time": "09:00", "end_time": "10:00" }],
        }),
    ];
    for payload in cases {
        let resp = client
            .post(format!("http://{}/api/bookings", addr))
            .header("Authorization", format!("Bearer {}", token))
            .json(&payload)
            .send()
            .await
            .unwrap();
        assert_eq!(resp.status(), 400, "payload {} should be rejected", payload);
    }

    let resp = client
        .get(format!("http://{}/api/bookings?from=2025-01-01&to=2025-12-31", addr))
        .header("Authorization", format!("Bearer {}", token))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), 400);
}

#[tokio::test]
async fn non_owner_mutation_is_forbidden() {
    let (addr, _h) = common::setup_test_app().await;
    let client = common::http_client();
    let r = common::resource();
    let c = common::client();

    let body: serde_json::Value = client
        .post(format!("http://{}/api/bookings", addr))
        .header("Authorization", format!("Bearer {}", common::token_for(&r)))
        .json(&booking_payload("2025-03-03", "09:00", "10:00", &[c.id]))
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    let id = body["bookings"][0]["id"].as_str().unwrap().to_string();

    let resp = client
        .delete(format!("http://{}/api/bookings/{}", addr, id))
        .header("Authorization", format!("Bearer {}", common::token_for(&c)))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), 403);

    let resp = client
        .get(format!("http://{}/api/bookings/{}", addr, id))
        .header("Authorization", format!("Bearer {}", common::token_for(&c)))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), 200, "participants may read");
}
