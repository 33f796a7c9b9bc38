//! Slot-level availability over the table registry.
//!
//! A slot is an exact `(table, date, time)` triple. It is taken while a
//! PENDING or CONFIRMED reservation holds it; there is no duration or buffer
//! around a booking.

use chrono::{NaiveDate, NaiveTime};
use diesel::{dsl::exists, prelude::*, PgConnection};
use tracing::debug;

use crate::{
    error::ServiceResult,
    models::{DiningTable, ReservationStatus, TableState},
    schedule::ServiceHours,
    schema::{dining_tables, reservations},
};

/// Ids of tables holding a live reservation at the slot, skipping `exclude`.
pub(crate) fn busy_table_ids(
    conn: &mut PgConnection,
    date: NaiveDate,
    time: NaiveTime,
    exclude: Option<i64>,
) -> ServiceResult<Vec<i64>> {
    let mut query = reservations::table
        .filter(reservations::reservation_date.eq(date))
        .filter(reservations::reservation_time.eq(time))
        .filter(reservations::status.eq_any(ReservationStatus::SLOT_HOLDING))
        .select(reservations::table_id)
        .into_boxed();
    if let Some(reservation_id) = exclude {
        query = query.filter(reservations::id.ne(reservation_id));
    }
    Ok(query.load(conn)?)
}

/// Active, AVAILABLE tables that fit the party and are unbooked at the slot.
pub fn eligible_free_tables(
    conn: &mut PgConnection,
    date: NaiveDate,
    time: NaiveTime,
    party_size: i32,
) -> ServiceResult<Vec<DiningTable>> {
    let busy = busy_table_ids(conn, date, time, None)?;

    let tables = dining_tables::table
        .filter(dining_tables::active.eq(true))
        .filter(dining_tables::state.eq(TableState::Available))
        .filter(dining_tables::capacity_min.le(party_size))
        .filter(dining_tables::capacity_max.ge(party_size))
        .filter(dining_tables::id.ne_all(busy))
        .order(dining_tables::id.asc())
        .load::<DiningTable>(conn)?;

    debug!(%date, %time, party_size, free = tables.len(), "resolved free tables");
    Ok(tables)
}

/// Only looks at reservations; the table's floor state and active flag are
/// not consulted.
pub fn is_table_free(
    conn: &mut PgConnection,
    table_id: i64,
    date: NaiveDate,
    time: NaiveTime,
) -> ServiceResult<bool> {
    is_table_free_except(conn, table_id, date, time, None)
}

pub(crate) fn is_table_free_except(
    conn: &mut PgConnection,
    table_id: i64,
    date: NaiveDate,
    time: NaiveTime,
    exclude: Option<i64>,
) -> ServiceResult<bool> {
    let base = reservations::table
        .filter(reservations::table_id.eq(table_id))
        .filter(reservations::reservation_date.eq(date))
        .filter(reservations::reservation_time.eq(time))
        .filter(reservations::status.eq_any(ReservationStatus::SLOT_HOLDING));

    let taken: bool = match exclude {
        Some(reservation_id) => diesel::select(exists(
            base.filter(reservations::id.ne(reservation_id)),
        ))
        .get_result(conn)?,
        None => diesel::select(exists(base)).get_result(conn)?,
    };
    Ok(!taken)
}

/// Candidate times from the service grid with at least one eligible table.
pub fn available_time_slots(
    conn: &mut PgConnection,
    hours: &ServiceHours,
    date: NaiveDate,
    party_size: i32,
) -> ServiceResult<Vec<NaiveTime>> {
    let mut slots = Vec::new();
    for time in hours.candidate_slots() {
        if !eligible_free_tables(conn, date, time, party_size)?.is_empty() {
            slots.push(time);
        }
    }
    Ok(slots)
}

pub fn count_free_tables(
    conn: &mut PgConnection,
    date: NaiveDate,
    time: NaiveTime,
    party_size: i32,
) -> ServiceResult<usize> {
    Ok(eligible_free_tables(conn, date, time, party_size)?.len())
}
