use axum::{
    extract::State,
    Json,
};
use chrono::{NaiveDate, NaiveTime};
use serde::{Deserialize, Serialize};

use crate::error::{AppError, AppResult};
use crate::routes::extract::QueryParams;
use crate::routes::tables::{table_list, TableResponse};
use crate::state::AppState;
use crate::utils::time::{deserialize_clock, format_clock, serialize_clock};
use crate::{availability, booking, validation};

#[derive(Deserialize)]
pub struct SlotQuery {
    pub date: NaiveDate,
    #[serde(deserialize_with = "deserialize_clock")]
    pub time: NaiveTime,
    pub party_size: i32,
}

#[derive(Deserialize)]
pub struct DayQuery {
    pub date: NaiveDate,
    pub party_size: i32,
}

#[derive(Deserialize)]
pub struct TableSlotQuery {
    pub table_id: i64,
    pub date: NaiveDate,
    #[serde(deserialize_with = "deserialize_clock")]
    pub time: NaiveTime,
}

#[derive(Serialize)]
pub struct SlotsResponse {
    pub date: NaiveDate,
    pub party_size: i32,
    pub slots: Vec<String>,
}

#[derive(Serialize)]
pub struct CheckResponse {
    pub table_id: i64,
    pub date: NaiveDate,
    #[serde(serialize_with = "serialize_clock")]
    pub time: NaiveTime,
    pub free: bool,
}

#[derive(Serialize)]
pub struct CountResponse {
    pub date: NaiveDate,
    #[serde(serialize_with = "serialize_clock")]
    pub time: NaiveTime,
    pub party_size: i32,
    pub count: usize,
}

pub async fn free_tables(
    State(state): State<AppState>,
    QueryParams(query): QueryParams<SlotQuery>,
) -> AppResult<Json<Vec<TableResponse>>> {
    validation::party_size(query.party_size)?;
    let mut conn = state.db()?;
    let tables =
        availability::eligible_free_tables(&mut conn, query.date, query.time, query.party_size)?;
    Ok(table_list(tables))
}

pub async fn time_slots(
    State(state): State<AppState>,
    QueryParams(query): QueryParams<DayQuery>,
) -> AppResult<Json<SlotsResponse>> {
    validation::party_size(query.party_size)?;
    let mut conn = state.db()?;
    let slots = availability::available_time_slots(
        &mut conn,
        &state.config.service_hours,
        query.date,
        query.party_size,
    )?;
    Ok(Json(SlotsResponse {
        date: query.date,
        party_size: query.party_size,
        slots: slots.into_iter().map(format_clock).collect(),
    }))
}

pub async fn check_table(
    State(state): State<AppState>,
    QueryParams(query): QueryParams<TableSlotQuery>,
) -> AppResult<Json<CheckResponse>> {
    let mut conn = state.db()?;
    let free = availability::is_table_free(&mut conn, query.table_id, query.date, query.time)?;
    Ok(Json(CheckResponse {
        table_id: query.table_id,
        date: query.date,
        time: query.time,
        free,
    }))
}

pub async fn count_tables(
    State(state): State<AppState>,
    QueryParams(query): QueryParams<SlotQuery>,
) -> AppResult<Json<CountResponse>> {
    validation::party_size(query.party_size)?;
    let mut conn = state.db()?;
    let count =
        availability::count_free_tables(&mut conn, query.date, query.time, query.party_size)?;
    Ok(Json(CountResponse {
        date: query.date,
        time: query.time,
        party_size: query.party_size,
        count,
    }))
}

pub async fn assign_table(
    State(state): State<AppState>,
    QueryParams(query): QueryParams<SlotQuery>,
) -> AppResult<Json<TableResponse>> {
    let mut conn = state.db()?;
    match booking::auto_assign_table(&mut conn, query.date, query.time, query.party_size)? {
        Some(table) => Ok(Json(table.into())),
        None => Err(AppError::not_found(format!(
            "no free table for {} guests on {} at {}",
            query.party_size,
            query.date,
            query.time.format("%H:%M")
        ))),
    }
}
