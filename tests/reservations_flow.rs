mod common;

use anyhow::Result;
use axum::http::StatusCode;
use chrono::{NaiveDate, NaiveTime};
use common::{acquire_db_lock, days_from_now, expect_json, ErrorBody, ReservationBody, TestApp};
use rand::rngs::OsRng;
use reservations::booking::{self, BookingRequest};
use reservations::codes::is_valid_code;
use reservations::error::ServiceError;
use reservations::models::ReservationStatus;
use serde_json::json;

fn booking_request(table_id: i64, date: NaiveDate, time: NaiveTime, party_size: i32) -> BookingRequest {
    BookingRequest {
        client_name: "Juan Perez".to_string(),
        client_email: "juan.perez@example.com".to_string(),
        client_phone: "56912345678".to_string(),
        table_id,
        reservation_date: date,
        reservation_time: time,
        party_size,
        observations: None,
    }
}

fn hm(hour: u32, minute: u32) -> NaiveTime {
    NaiveTime::from_hms_opt(hour, minute, 0).unwrap()
}

fn booking_payload(table_id: i64, date: NaiveDate, time: &str, party_size: i32) -> serde_json::Value {
    json!({
        "client_name": "Ana Martinez",
        "client_email": "ana.martinez@example.com",
        "client_phone": "56922222222",
        "table_id": table_id,
        "reservation_date": date,
        "reservation_time": time,
        "party_size": party_size,
        "observations": "Window seat if possible",
    })
}

#[tokio::test]
async fn booking_a_slot_on_opening_night() -> Result<()> {
    let _lock = acquire_db_lock().await;
    let Some(app) = TestApp::new().await? else {
        return Ok(());
    };

    let table = app.create_table(1, 2, 4).await?;
    let date = NaiveDate::from_ymd_opt(2025, 6, 1).unwrap();
    let table_id = table.id;

    let (first, repeat, too_many, stale, count) = app
        .with_conn(move |conn| {
            let first = booking::create_reservation(
                conn,
                booking_request(table_id, date, hm(19, 0), 3),
                &mut OsRng,
                date,
            );
            let repeat = booking::create_reservation(
                conn,
                booking_request(table_id, date, hm(19, 0), 3),
                &mut OsRng,
                date,
            );
            let too_many = booking::create_reservation(
                conn,
                booking_request(table_id, date, hm(20, 0), 6),
                &mut OsRng,
                date,
            );
            let stale = booking::create_reservation(
                conn,
                booking_request(table_id, date, hm(21, 0), 2),
                &mut OsRng,
                date.succ_opt().unwrap(),
            );
            let count = booking::list_all(conn)?.len();
            Ok((first, repeat, too_many, stale, count))
        })
        .await?;

    let first = first?;
    assert_eq!(first.status, ReservationStatus::Pending);
    assert_eq!(first.table_id, table_id);
    assert!(is_valid_code(&first.code), "bad code {}", first.code);
    assert!(first.modified_at.is_none());

    assert!(matches!(repeat, Err(ServiceError::Conflict(_))));
    assert!(matches!(too_many, Err(ServiceError::InvalidArgument(_))));
    assert!(matches!(stale, Err(ServiceError::InvalidArgument(_))));
    assert_eq!(count, 1);

    Ok(())
}

#[tokio::test]
async fn concurrent_bookings_for_one_slot_admit_one() -> Result<()> {
    let _lock = acquire_db_lock().await;
    let Some(app) = TestApp::new().await? else {
        return Ok(());
    };

    let table = app.create_table(1, 2, 4).await?;
    let date = days_from_now(3);
    let table_id = table.id;
    let today = days_from_now(0);

    let left = app.with_conn(move |conn| {
        Ok(booking::create_reservation(
            conn,
            booking_request(table_id, date, hm(19, 0), 2),
            &mut OsRng,
            today,
        ))
    });
    let right = app.with_conn(move |conn| {
        Ok(booking::create_reservation(
            conn,
            booking_request(table_id, date, hm(19, 0), 4),
            &mut OsRng,
            today,
        ))
    });
    let (left, right) = tokio::join!(left, right);
    let outcomes = [left?, right?];

    let created = outcomes.iter().filter(|outcome| outcome.is_ok()).count();
    let conflicts = outcomes
        .iter()
        .filter(|outcome| matches!(outcome, Err(ServiceError::Conflict(_))))
        .count();
    assert_eq!((created, conflicts), (1, 1));

    let stored = app.with_conn(move |conn| Ok(booking::list_for_date(conn, date)?)).await?;
    assert_eq!(stored.len(), 1);
    Ok(())
}

#[tokio::test]
async fn reservation_lifecycle_over_http() -> Result<()> {
    let _lock = acquire_db_lock().await;
    let Some(app) = TestApp::new().await? else {
        return Ok(());
    };

    let table = app.create_table(1, 2, 4).await?;
    let date = days_from_now(5);

    let created = app
        .post_json("/api/reservations", &booking_payload(table.id, date, "19:00", 3))
        .await?;
    let created: ReservationBody = expect_json(created, StatusCode::CREATED).await?;
    assert_eq!(created.status, "PENDING");
    assert_eq!(created.reservation_time, "19:00:00");
    assert_eq!(created.reservation_date, date);
    assert!(is_valid_code(&created.code));

    let again = app
        .post_json("/api/reservations", &booking_payload(table.id, date, "19:00:00", 2))
        .await?;
    let error: ErrorBody = expect_json(again, StatusCode::CONFLICT).await?;
    assert!(error.error.contains("already booked"));

    let by_code: ReservationBody = expect_json(
        app.get(&format!("/api/reservations/code/{}", created.code)).await?,
        StatusCode::OK,
    )
    .await?;
    assert_eq!(by_code.id, created.id);

    let malformed = app.get("/api/reservations/code/ABC").await?;
    assert_eq!(malformed.status(), StatusCode::BAD_REQUEST);
    let unknown = app.get("/api/reservations/code/RSV-ZZZZ9999").await?;
    assert_eq!(unknown.status(), StatusCode::NOT_FOUND);

    let upcoming: Vec<ReservationBody> = expect_json(
        app.get("/api/reservations/upcoming/ana.martinez@example.com").await?,
        StatusCode::OK,
    )
    .await?;
    assert_eq!(upcoming.len(), 1);

    let unknown_status = app
        .patch_json(
            &format!("/api/reservations/{}/status", created.id),
            &json!({ "status": "BOOKED" }),
        )
        .await?;
    let error: ErrorBody = expect_json(unknown_status, StatusCode::BAD_REQUEST).await?;
    assert!(error.error.contains("BOOKED"), "unexpected error {}", error.error);

    let empty_body = app
        .patch_json(&format!("/api/reservations/{}/status", created.id), &json!({}))
        .await?;
    let error: ErrorBody = expect_json(empty_body, StatusCode::BAD_REQUEST).await?;
    assert!(error.error.contains("status"), "unexpected error {}", error.error);

    let confirmed: ReservationBody = expect_json(
        app.patch_json(
            &format!("/api/reservations/{}/status", created.id),
            &json!({ "status": "confirmed" }),
        )
        .await?,
        StatusCode::OK,
    )
    .await?;
    assert_eq!(confirmed.status, "CONFIRMED");
    assert!(confirmed.modified_at.is_some());

    let confirmed_again: ReservationBody = expect_json(
        app.patch(&format!("/api/reservations/{}/confirm", created.id)).await?,
        StatusCode::OK,
    )
    .await?;
    assert_eq!(confirmed_again.status, "CONFIRMED");

    let back_to_pending = app
        .patch_json(
            &format!("/api/reservations/{}/status", created.id),
            &json!({ "status": "PENDING" }),
        )
        .await?;
    assert_eq!(back_to_pending.status(), StatusCode::CONFLICT);

    let completed: ReservationBody = expect_json(
        app.patch(&format!("/api/reservations/{}/complete", created.id)).await?,
        StatusCode::OK,
    )
    .await?;
    assert_eq!(completed.status, "COMPLETED");

    let cancel_completed = app
        .patch(&format!("/api/reservations/{}/cancel", created.id))
        .await?;
    assert_eq!(cancel_completed.status(), StatusCode::CONFLICT);

    // A completed booking no longer holds its slot.
    let rebooked = app
        .post_json("/api/reservations", &booking_payload(table.id, date, "19:00", 2))
        .await?;
    let rebooked: ReservationBody = expect_json(rebooked, StatusCode::CREATED).await?;

    let cancelled: ReservationBody = expect_json(
        app.patch(&format!("/api/reservations/{}/cancel", rebooked.id)).await?,
        StatusCode::OK,
    )
    .await?;
    assert_eq!(cancelled.status, "CANCELLED");
    let cancel_again: ReservationBody = expect_json(
        app.patch(&format!("/api/reservations/{}/cancel", rebooked.id)).await?,
        StatusCode::OK,
    )
    .await?;
    assert_eq!(cancel_again.status, "CANCELLED");

    let cancelled_list: Vec<ReservationBody> = expect_json(
        app.get("/api/reservations/status/cancelled").await?,
        StatusCode::OK,
    )
    .await?;
    assert_eq!(cancelled_list.len(), 1);

    let removed = app.delete(&format!("/api/reservations/{}", rebooked.id)).await?;
    assert_eq!(removed.status(), StatusCode::NO_CONTENT);
    let gone = app.get(&format!("/api/reservations/{}", rebooked.id)).await?;
    assert_eq!(gone.status(), StatusCode::NOT_FOUND);

    let history: Vec<ReservationBody> = expect_json(
        app.get(&format!("/api/tables/{}/reservations", table.id)).await?,
        StatusCode::OK,
    )
    .await?;
    assert_eq!(history.len(), 1);
    assert_eq!(history[0].id, created.id);

    Ok(())
}

#[tokio::test]
async fn updates_keep_slots_and_capacity_consistent() -> Result<()> {
    let _lock = acquire_db_lock().await;
    let Some(app) = TestApp::new().await? else {
        return Ok(());
    };

    let small = app.create_table(1, 2, 4).await?;
    let large = app.create_table(2, 6, 10).await?;
    let date = days_from_now(4);

    let early: ReservationBody = expect_json(
        app.post_json("/api/reservations", &booking_payload(small.id, date, "19:00", 3))
            .await?,
        StatusCode::CREATED,
    )
    .await?;
    let late: ReservationBody = expect_json(
        app.post_json("/api/reservations", &booking_payload(small.id, date, "20:00", 2))
            .await?,
        StatusCode::CREATED,
    )
    .await?;

    let onto_early = app
        .patch_json(
            &format!("/api/reservations/{}", late.id),
            &json!({ "reservation_time": "19:00" }),
        )
        .await?;
    assert_eq!(onto_early.status(), StatusCode::CONFLICT);

    // Restating its own slot is not a conflict.
    let same_slot: ReservationBody = expect_json(
        app.patch_json(
            &format!("/api/reservations/{}", early.id),
            &json!({ "reservation_time": "19:00", "observations": "Anniversary", "client_phone": null }),
        )
        .await?,
        StatusCode::OK,
    )
    .await?;
    assert_eq!(same_slot.observations.as_deref(), Some("Anniversary"));
    assert!(same_slot.modified_at.is_some());

    let too_big = app
        .patch_json(
            &format!("/api/reservations/{}", late.id),
            &json!({ "party_size": 5 }),
        )
        .await?;
    assert_eq!(too_big.status(), StatusCode::BAD_REQUEST);

    let wrong_table = app
        .patch_json(
            &format!("/api/reservations/{}", late.id),
            &json!({ "table_id": large.id }),
        )
        .await?;
    assert_eq!(wrong_table.status(), StatusCode::BAD_REQUEST);

    let moved: ReservationBody = expect_json(
        app.patch_json(
            &format!("/api/reservations/{}", late.id),
            &json!({ "table_id": large.id, "party_size": 7, "reservation_time": "19:00" }),
        )
        .await?,
        StatusCode::OK,
    )
    .await?;
    assert_eq!((moved.table_id, moved.party_size), (large.id, 7));

    let missing_table = app
        .patch_json(
            &format!("/api/reservations/{}", late.id),
            &json!({ "table_id": 999 }),
        )
        .await?;
    assert_eq!(missing_table.status(), StatusCode::NOT_FOUND);

    let bad_email = app
        .patch_json(
            &format!("/api/reservations/{}", late.id),
            &json!({ "client_email": "not-an-email" }),
        )
        .await?;
    assert_eq!(bad_email.status(), StatusCode::BAD_REQUEST);

    let for_day: Vec<ReservationBody> = expect_json(
        app.get(&format!("/api/reservations/date/{date}")).await?,
        StatusCode::OK,
    )
    .await?;
    assert_eq!(for_day.len(), 2);
    assert!(for_day.iter().all(|r| r.reservation_time == "19:00:00"));

    Ok(())
}

#[tokio::test]
async fn rejects_invalid_booking_requests() -> Result<()> {
    let _lock = acquire_db_lock().await;
    let Some(app) = TestApp::new().await? else {
        return Ok(());
    };

    let table = app.create_table(1, 2, 4).await?;
    let date = days_from_now(2);

    let mut payload = booking_payload(table.id, date, "19:00", 3);
    payload["client_phone"] = json!("+56922222222");
    let response = app.post_json("/api/reservations", &payload).await?;
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);

    let mut payload = booking_payload(table.id, date, "19:00", 0);
    payload["client_name"] = json!("Ana");
    let response = app.post_json("/api/reservations", &payload).await?;
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);

    let payload = booking_payload(table.id, days_from_now(0).pred_opt().unwrap(), "19:00", 3);
    let response = app.post_json("/api/reservations", &payload).await?;
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);

    let payload = booking_payload(999, date, "19:00", 3);
    let response = app.post_json("/api/reservations", &payload).await?;
    assert_eq!(response.status(), StatusCode::NOT_FOUND);

    let payload = booking_payload(table.id, date, "19:00", 6);
    let response = app.post_json("/api/reservations", &payload).await?;
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);

    let mut payload = booking_payload(table.id, date, "19:00", 3);
    if let Some(fields) = payload.as_object_mut() {
        fields.remove("client_phone");
    }
    let response = app.post_json("/api/reservations", &payload).await?;
    let error: ErrorBody = expect_json(response, StatusCode::BAD_REQUEST).await?;
    assert!(error.error.contains("client_phone"), "unexpected error {}", error.error);

    let payload = booking_payload(table.id, date, "7pm", 3);
    let response = app.post_json("/api/reservations", &payload).await?;
    let _: ErrorBody = expect_json(response, StatusCode::BAD_REQUEST).await?;

    let response = app.post_json("/api/reservations", &json!(["not", "an", "object"])).await?;
    let _: ErrorBody = expect_json(response, StatusCode::BAD_REQUEST).await?;

    let all: Vec<ReservationBody> =
        expect_json(app.get("/api/reservations").await?, StatusCode::OK).await?;
    assert!(all.is_empty());

    Ok(())
}

#[tokio::test]
async fn daily_views_and_stats() -> Result<()> {
    let _lock = acquire_db_lock().await;
    let Some(app) = TestApp::new().await? else {
        return Ok(());
    };

    let first = app.create_table(1, 2, 4).await?;
    let second = app.create_table(2, 2, 6).await?;
    let today = days_from_now(0);

    let dinner: ReservationBody = expect_json(
        app.post_json("/api/reservations", &booking_payload(first.id, today, "23:30", 3))
            .await?,
        StatusCode::CREATED,
    )
    .await?;
    let dropped: ReservationBody = expect_json(
        app.post_json("/api/reservations", &booking_payload(second.id, today, "23:30", 5))
            .await?,
        StatusCode::CREATED,
    )
    .await?;
    app.patch(&format!("/api/reservations/{}/cancel", dropped.id))
        .await?;
    let ahead: ReservationBody = expect_json(
        app.post_json(
            "/api/reservations",
            &booking_payload(first.id, days_from_now(1), "13:00", 2),
        )
        .await?,
        StatusCode::CREATED,
    )
    .await?;

    let todays: Vec<ReservationBody> =
        expect_json(app.get("/api/reservations/today").await?, StatusCode::OK).await?;
    assert_eq!(todays.len(), 2);

    let pending: Vec<ReservationBody> =
        expect_json(app.get("/api/reservations/pending").await?, StatusCode::OK).await?;
    assert_eq!(
        pending.iter().map(|r| r.id).collect::<Vec<_>>(),
        vec![dinner.id, ahead.id]
    );

    let stats: serde_json::Value =
        expect_json(app.get("/api/stats").await?, StatusCode::OK).await?;
    assert_eq!(stats["reservations"]["pending"], 2);
    assert_eq!(stats["reservations"]["cancelled"], 1);
    assert_eq!(stats["reservations"]["confirmed"], 0);
    assert_eq!(stats["reservations_today"], 2);
    assert_eq!(stats["guests_today"], 3);
    assert_eq!(stats["tables"]["active"], 2);
    assert_eq!(stats["tables"]["available"], 2);

    Ok(())
}
