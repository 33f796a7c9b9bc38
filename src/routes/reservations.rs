use axum::{
    extract::{Path, State},
    http::StatusCode,
    response::IntoResponse,
    Json,
};
use chrono::{NaiveDate, NaiveTime};
use rand::rngs::OsRng;
use serde::{Deserialize, Serialize};

use crate::booking::{self, BookingRequest, ReservationChanges};
use crate::error::AppResult;
use crate::routes::extract::JsonBody;
use crate::models::{Reservation, ReservationStatus};
use crate::routes::{parse_param, to_iso, today};
use crate::state::AppState;
use crate::utils::time::{deserialize_clock, deserialize_optional_clock, serialize_clock};

#[derive(Deserialize)]
pub struct CreateReservationRequest {
    pub client_name: String,
    pub client_email: String,
    pub client_phone: String,
    pub table_id: i64,
    pub reservation_date: NaiveDate,
    #[serde(deserialize_with = "deserialize_clock")]
    pub reservation_time: NaiveTime,
    pub party_size: i32,
    pub observations: Option<String>,
}

/// Absent and `null` fields both leave the stored value untouched.
#[derive(Deserialize)]
pub struct UpdateReservationRequest {
    pub client_name: Option<String>,
    pub client_email: Option<String>,
    pub client_phone: Option<String>,
    pub table_id: Option<i64>,
    pub reservation_date: Option<NaiveDate>,
    #[serde(default, deserialize_with = "deserialize_optional_clock")]
    pub reservation_time: Option<NaiveTime>,
    pub party_size: Option<i32>,
    pub status: Option<ReservationStatus>,
    pub observations: Option<String>,
}

#[derive(Deserialize)]
pub struct ChangeStatusRequest {
    pub status: ReservationStatus,
}

#[derive(Serialize)]
pub struct ReservationResponse {
    pub id: i64,
    pub code: String,
    pub client_name: String,
    pub client_email: String,
    pub client_phone: String,
    pub table_id: i64,
    pub reservation_date: NaiveDate,
    #[serde(serialize_with = "serialize_clock")]
    pub reservation_time: NaiveTime,
    pub party_size: i32,
    pub status: ReservationStatus,
    pub observations: Option<String>,
    pub created_at: String,
    pub modified_at: Option<String>,
}

impl From<Reservation> for ReservationResponse {
    fn from(reservation: Reservation) -> Self {
        Self {
            id: reservation.id,
            code: reservation.code,
            client_name: reservation.client_name,
            client_email: reservation.client_email,
            client_phone: reservation.client_phone,
            table_id: reservation.table_id,
            reservation_date: reservation.reservation_date,
            reservation_time: reservation.reservation_time,
            party_size: reservation.party_size,
            status: reservation.status,
            observations: reservation.observations,
            created_at: to_iso(reservation.created_at),
            modified_at: reservation.modified_at.map(to_iso),
        }
    }
}

fn reservation_list(reservations: Vec<Reservation>) -> Json<Vec<ReservationResponse>> {
    Json(
        reservations
            .into_iter()
            .map(ReservationResponse::from)
            .collect(),
    )
}

pub async fn list_reservations(
    State(state): State<AppState>,
) -> AppResult<Json<Vec<ReservationResponse>>> {
    let mut conn = state.db()?;
    Ok(reservation_list(booking::list_all(&mut conn)?))
}

pub async fn create_reservation(
    State(state): State<AppState>,
    JsonBody(payload): JsonBody<CreateReservationRequest>,
) -> AppResult<impl IntoResponse> {
    let mut conn = state.db()?;
    let request = BookingRequest {
        client_name: payload.client_name,
        client_email: payload.client_email,
        client_phone: payload.client_phone,
        table_id: payload.table_id,
        reservation_date: payload.reservation_date,
        reservation_time: payload.reservation_time,
        party_size: payload.party_size,
        observations: payload.observations,
    };
    let reservation = booking::create_reservation(&mut conn, request, &mut OsRng, today())?;
    Ok((StatusCode::CREATED, Json(ReservationResponse::from(reservation))))
}

pub async fn get_reservation(
    State(state): State<AppState>,
    Path(reservation_id): Path<i64>,
) -> AppResult<Json<ReservationResponse>> {
    let mut conn = state.db()?;
    Ok(Json(booking::get_reservation(&mut conn, reservation_id)?.into()))
}

pub async fn update_reservation(
    State(state): State<AppState>,
    Path(reservation_id): Path<i64>,
    JsonBody(payload): JsonBody<UpdateReservationRequest>,
) -> AppResult<Json<ReservationResponse>> {
    let mut conn = state.db()?;
    let changes = ReservationChanges {
        client_name: payload.client_name,
        client_email: payload.client_email,
        client_phone: payload.client_phone,
        table_id: payload.table_id,
        reservation_date: payload.reservation_date,
        reservation_time: payload.reservation_time,
        party_size: payload.party_size,
        status: payload.status,
        observations: payload.observations,
    };
    let reservation = booking::update_reservation(&mut conn, reservation_id, changes, today())?;
    Ok(Json(reservation.into()))
}

pub async fn delete_reservation(
    State(state): State<AppState>,
    Path(reservation_id): Path<i64>,
) -> AppResult<StatusCode> {
    let mut conn = state.db()?;
    booking::delete_reservation(&mut conn, reservation_id)?;
    Ok(StatusCode::NO_CONTENT)
}

pub async fn change_status(
    State(state): State<AppState>,
    Path(reservation_id): Path<i64>,
    JsonBody(payload): JsonBody<ChangeStatusRequest>,
) -> AppResult<Json<ReservationResponse>> {
    let mut conn = state.db()?;
    Ok(Json(
        booking::change_status(&mut conn, reservation_id, payload.status)?.into(),
    ))
}

pub async fn confirm_reservation(
    State(state): State<AppState>,
    Path(reservation_id): Path<i64>,
) -> AppResult<Json<ReservationResponse>> {
    let mut conn = state.db()?;
    Ok(Json(booking::confirm(&mut conn, reservation_id)?.into()))
}

pub async fn cancel_reservation(
    State(state): State<AppState>,
    Path(reservation_id): Path<i64>,
) -> AppResult<Json<ReservationResponse>> {
    let mut conn = state.db()?;
    Ok(Json(booking::cancel(&mut conn, reservation_id)?.into()))
}

pub async fn complete_reservation(
    State(state): State<AppState>,
    Path(reservation_id): Path<i64>,
) -> AppResult<Json<ReservationResponse>> {
    let mut conn = state.db()?;
    Ok(Json(booking::complete(&mut conn, reservation_id)?.into()))
}

pub async fn get_reservation_by_code(
    State(state): State<AppState>,
    Path(code): Path<String>,
) -> AppResult<Json<ReservationResponse>> {
    let mut conn = state.db()?;
    Ok(Json(booking::find_by_code(&mut conn, &code)?.into()))
}

pub async fn list_by_email(
    State(state): State<AppState>,
    Path(email): Path<String>,
) -> AppResult<Json<Vec<ReservationResponse>>> {
    let mut conn = state.db()?;
    Ok(reservation_list(booking::list_by_email(&mut conn, &email)?))
}

pub async fn list_upcoming_by_email(
    State(state): State<AppState>,
    Path(email): Path<String>,
) -> AppResult<Json<Vec<ReservationResponse>>> {
    let mut conn = state.db()?;
    Ok(reservation_list(booking::upcoming_by_email(
        &mut conn,
        &email,
        today(),
    )?))
}

pub async fn list_by_date(
    State(state): State<AppState>,
    Path(date): Path<NaiveDate>,
) -> AppResult<Json<Vec<ReservationResponse>>> {
    let mut conn = state.db()?;
    Ok(reservation_list(booking::list_for_date(&mut conn, date)?))
}

pub async fn list_today(
    State(state): State<AppState>,
) -> AppResult<Json<Vec<ReservationResponse>>> {
    let mut conn = state.db()?;
    Ok(reservation_list(booking::list_for_date(&mut conn, today())?))
}

pub async fn list_by_status(
    State(state): State<AppState>,
    Path(raw_status): Path<String>,
) -> AppResult<Json<Vec<ReservationResponse>>> {
    let status: ReservationStatus = parse_param(&raw_status)?;
    let mut conn = state.db()?;
    Ok(reservation_list(booking::list_by_status(&mut conn, status)?))
}

pub async fn list_pending(
    State(state): State<AppState>,
) -> AppResult<Json<Vec<ReservationResponse>>> {
    let mut conn = state.db()?;
    Ok(reservation_list(booking::pending_upcoming(&mut conn, today())?))
}
