use chrono::NaiveDate;
use diesel::{
    dsl::{count_star, sum},
    prelude::*,
    PgConnection,
};
use serde::Serialize;

use crate::{
    error::ServiceResult,
    models::{ReservationStatus, TableState},
    schema::reservations,
    tables,
};

#[derive(Debug, Clone, Serialize)]
pub struct ReservationCounts {
    pub pending: i64,
    pub confirmed: i64,
    pub cancelled: i64,
    pub completed: i64,
}

#[derive(Debug, Clone, Serialize)]
pub struct TableCounts {
    pub active: i64,
    pub available: i64,
    pub occupied: i64,
    pub reserved: i64,
}

/// Dashboard snapshot for a single day.
#[derive(Debug, Clone, Serialize)]
pub struct Stats {
    pub date: NaiveDate,
    pub reservations: ReservationCounts,
    pub reservations_today: i64,
    pub guests_today: i64,
    pub tables: TableCounts,
}

pub fn collect_stats(conn: &mut PgConnection, today: NaiveDate) -> ServiceResult<Stats> {
    let reservations = ReservationCounts {
        pending: count_with_status(conn, ReservationStatus::Pending)?,
        confirmed: count_with_status(conn, ReservationStatus::Confirmed)?,
        cancelled: count_with_status(conn, ReservationStatus::Cancelled)?,
        completed: count_with_status(conn, ReservationStatus::Completed)?,
    };

    let reservations_today = reservations::table
        .filter(reservations::reservation_date.eq(today))
        .select(count_star())
        .first::<i64>(conn)?;

    // Cancelled parties are not expected to show up.
    let guests_today = reservations::table
        .filter(reservations::reservation_date.eq(today))
        .filter(reservations::status.ne(ReservationStatus::Cancelled))
        .select(sum(reservations::party_size))
        .first::<Option<i64>>(conn)?
        .unwrap_or(0);

    let tables = TableCounts {
        active: tables::count_active(conn)?,
        available: tables::count_by_state(conn, TableState::Available)?,
        occupied: tables::count_by_state(conn, TableState::Occupied)?,
        reserved: tables::count_by_state(conn, TableState::Reserved)?,
    };

    Ok(Stats {
        date: today,
        reservations,
        reservations_today,
        guests_today,
        tables,
    })
}

fn count_with_status(conn: &mut PgConnection, status: ReservationStatus) -> ServiceResult<i64> {
    Ok(reservations::table
        .filter(reservations::status.eq(status))
        .select(count_star())
        .first(conn)?)
}
