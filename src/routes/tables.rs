use axum::{
    extract::{Path, State},
    http::StatusCode,
    response::IntoResponse,
    Json,
};
use serde::{Deserialize, Serialize};

use crate::error::AppResult;
use crate::routes::extract::JsonBody;
use crate::models::{DiningTable, TableState, TableType};
use crate::routes::{parse_param, reservations::ReservationResponse, to_iso};
use crate::state::AppState;
use crate::{booking, tables};

#[derive(Deserialize)]
pub struct CreateTableRequest {
    pub number: i32,
    pub capacity_min: i32,
    pub capacity_max: i32,
    pub table_type: TableType,
    pub state: Option<TableState>,
    pub description: Option<String>,
    pub active: Option<bool>,
}

#[derive(Deserialize)]
pub struct UpdateTableRequest {
    pub number: Option<i32>,
    pub capacity_min: Option<i32>,
    pub capacity_max: Option<i32>,
    pub table_type: Option<TableType>,
    pub state: Option<TableState>,
    pub description: Option<String>,
}

#[derive(Deserialize)]
pub struct SetStateRequest {
    pub state: TableState,
}

#[derive(Serialize)]
pub struct TableResponse {
    pub id: i64,
    pub number: i32,
    pub capacity_min: i32,
    pub capacity_max: i32,
    pub table_type: TableType,
    pub state: TableState,
    pub description: Option<String>,
    pub active: bool,
    pub created_at: String,
    pub updated_at: String,
}

impl From<DiningTable> for TableResponse {
    fn from(table: DiningTable) -> Self {
        Self {
            id: table.id,
            number: table.number,
            capacity_min: table.capacity_min,
            capacity_max: table.capacity_max,
            table_type: table.table_type,
            state: table.state,
            description: table.description,
            active: table.active,
            created_at: to_iso(table.created_at),
            updated_at: to_iso(table.updated_at),
        }
    }
}

pub(crate) fn table_list(tables: Vec<DiningTable>) -> Json<Vec<TableResponse>> {
    Json(tables.into_iter().map(TableResponse::from).collect())
}

pub async fn list_tables(State(state): State<AppState>) -> AppResult<Json<Vec<TableResponse>>> {
    let mut conn = state.db()?;
    Ok(table_list(tables::list_active(&mut conn)?))
}

pub async fn create_table(
    State(state): State<AppState>,
    JsonBody(payload): JsonBody<CreateTableRequest>,
) -> AppResult<impl IntoResponse> {
    let mut conn = state.db()?;
    let table = tables::create_table(
        &mut conn,
        tables::TableDraft {
            number: payload.number,
            capacity_min: payload.capacity_min,
            capacity_max: payload.capacity_max,
            table_type: payload.table_type,
            state: payload.state,
            description: payload.description,
            active: payload.active,
        },
    )?;
    Ok((StatusCode::CREATED, Json(TableResponse::from(table))))
}

pub async fn get_table(
    State(state): State<AppState>,
    Path(table_id): Path<i64>,
) -> AppResult<Json<TableResponse>> {
    let mut conn = state.db()?;
    Ok(Json(tables::get_table(&mut conn, table_id)?.into()))
}

pub async fn update_table(
    State(state): State<AppState>,
    Path(table_id): Path<i64>,
    JsonBody(payload): JsonBody<UpdateTableRequest>,
) -> AppResult<Json<TableResponse>> {
    let mut conn = state.db()?;
    let table = tables::update_table(
        &mut conn,
        table_id,
        tables::TableChanges {
            number: payload.number,
            capacity_min: payload.capacity_min,
            capacity_max: payload.capacity_max,
            table_type: payload.table_type,
            state: payload.state,
            description: payload.description,
        },
    )?;
    Ok(Json(table.into()))
}

pub async fn deactivate_table(
    State(state): State<AppState>,
    Path(table_id): Path<i64>,
) -> AppResult<StatusCode> {
    let mut conn = state.db()?;
    tables::deactivate(&mut conn, table_id)?;
    Ok(StatusCode::NO_CONTENT)
}

pub async fn set_table_state(
    State(state): State<AppState>,
    Path(table_id): Path<i64>,
    JsonBody(payload): JsonBody<SetStateRequest>,
) -> AppResult<Json<TableResponse>> {
    let mut conn = state.db()?;
    Ok(Json(tables::set_state(&mut conn, table_id, payload.state)?.into()))
}

pub async fn get_table_by_number(
    State(state): State<AppState>,
    Path(number): Path<i32>,
) -> AppResult<Json<TableResponse>> {
    let mut conn = state.db()?;
    Ok(Json(tables::find_by_number(&mut conn, number)?.into()))
}

pub async fn list_tables_by_state(
    State(state): State<AppState>,
    Path(raw_state): Path<String>,
) -> AppResult<Json<Vec<TableResponse>>> {
    let table_state: TableState = parse_param(&raw_state)?;
    let mut conn = state.db()?;
    Ok(table_list(tables::list_by_state(&mut conn, table_state)?))
}

pub async fn list_tables_by_type(
    State(state): State<AppState>,
    Path(raw_type): Path<String>,
) -> AppResult<Json<Vec<TableResponse>>> {
    let table_type: TableType = parse_param(&raw_type)?;
    let mut conn = state.db()?;
    Ok(table_list(tables::list_by_type(&mut conn, table_type)?))
}

pub async fn list_tables_by_capacity(
    State(state): State<AppState>,
    Path(party_size): Path<i32>,
) -> AppResult<Json<Vec<TableResponse>>> {
    let mut conn = state.db()?;
    Ok(table_list(tables::list_fitting(&mut conn, party_size)?))
}

pub async fn list_table_reservations(
    State(state): State<AppState>,
    Path(table_id): Path<i64>,
) -> AppResult<Json<Vec<ReservationResponse>>> {
    let mut conn = state.db()?;
    let reservations = booking::list_for_table(&mut conn, table_id)?;
    Ok(Json(
        reservations
            .into_iter()
            .map(ReservationResponse::from)
            .collect(),
    ))
}
