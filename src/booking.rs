//! Reservation lifecycle: booking, edits, status changes and lookups.
//!
//! Every mutation runs in a transaction and locks the rows it depends on.
//! The partial unique index `reservations_active_slot_idx` backs the
//! one-live-booking-per-slot rule when two writers race past the checks.

use chrono::{NaiveDate, NaiveTime, Utc};
use diesel::{
    prelude::*,
    result::{DatabaseErrorKind, Error as DieselError},
    PgConnection,
};
use rand::{CryptoRng, Rng};
use tracing::{info, warn};

use crate::{
    availability,
    codes,
    error::{ServiceError, ServiceResult},
    models::{DiningTable, NewReservation, Reservation, ReservationStatus},
    schema::reservations,
    tables,
    validation::{self, MAX_OBSERVATIONS_LEN},
};

const SLOT_INDEX: &str = "reservations_active_slot_idx";
const CODE_CONSTRAINT: &str = "reservations_code_key";
const CODE_ATTEMPTS: usize = 3;

#[derive(Debug, Clone)]
pub struct BookingRequest {
    pub client_name: String,
    pub client_email: String,
    pub client_phone: String,
    pub table_id: i64,
    pub reservation_date: NaiveDate,
    pub reservation_time: NaiveTime,
    pub party_size: i32,
    pub observations: Option<String>,
}

/// Partial edit of a reservation. `None` keeps the stored value.
#[derive(Debug, Clone, Default)]
pub struct ReservationChanges {
    pub client_name: Option<String>,
    pub client_email: Option<String>,
    pub client_phone: Option<String>,
    pub table_id: Option<i64>,
    pub reservation_date: Option<NaiveDate>,
    pub reservation_time: Option<NaiveTime>,
    pub party_size: Option<i32>,
    pub status: Option<ReservationStatus>,
    pub observations: Option<String>,
}

#[derive(AsChangeset, Default)]
#[diesel(table_name = reservations)]
struct ReservationChangeset {
    client_name: Option<String>,
    client_email: Option<String>,
    client_phone: Option<String>,
    table_id: Option<i64>,
    reservation_date: Option<NaiveDate>,
    reservation_time: Option<NaiveTime>,
    party_size: Option<i32>,
    status: Option<ReservationStatus>,
    observations: Option<String>,
}

pub fn create_reservation<R: Rng + CryptoRng + ?Sized>(
    conn: &mut PgConnection,
    request: BookingRequest,
    rng: &mut R,
    today: NaiveDate,
) -> ServiceResult<Reservation> {
    let client_name = validation::client_name(&request.client_name)?;
    let client_email = validation::client_email(&request.client_email)?;
    let client_phone = validation::client_phone(&request.client_phone)?;
    let party_size = validation::party_size(request.party_size)?;
    let date = validation::booking_date(request.reservation_date, today)?;
    let time = request.reservation_time;
    let observations =
        validation::optional_text(request.observations, MAX_OBSERVATIONS_LEN, "observations")?;

    conn.transaction::<_, ServiceError, _>(|conn| {
        let table = tables::lock_table(conn, request.table_id)?;

        if !availability::is_table_free(conn, table.id, date, time)? {
            return Err(slot_taken(&table, date, time));
        }
        if !table.fits_party(party_size) {
            return Err(party_does_not_fit(&table, party_size));
        }

        for attempt in 1..=CODE_ATTEMPTS {
            let new_reservation = NewReservation {
                client_name: client_name.clone(),
                client_email: client_email.clone(),
                client_phone: client_phone.clone(),
                table_id: table.id,
                reservation_date: date,
                reservation_time: time,
                party_size,
                status: ReservationStatus::Pending,
                observations: observations.clone(),
                code: code_for_attempt(rng, attempt, date),
            };

            // Savepoint, so a code collision does not abort the outer transaction.
            let inserted = conn.transaction(|conn| {
                diesel::insert_into(reservations::table)
                    .values(&new_reservation)
                    .get_result::<Reservation>(conn)
            });

            match inserted {
                Ok(reservation) => {
                    info!(
                        reservation_id = reservation.id,
                        table_id = table.id,
                        %date,
                        %time,
                        party_size,
                        code = %reservation.code,
                        "reservation created"
                    );
                    return Ok(reservation);
                }
                Err(DieselError::DatabaseError(DatabaseErrorKind::UniqueViolation, details))
                    if details.constraint_name() == Some(CODE_CONSTRAINT) =>
                {
                    warn!(attempt, "reservation code collision, retrying");
                }
                Err(err) => return Err(map_slot_violation(err, &table, date, time)),
            }
        }

        Err(ServiceError::conflict(
            "could not allocate a unique reservation code",
        ))
    })
}

pub fn update_reservation(
    conn: &mut PgConnection,
    reservation_id: i64,
    changes: ReservationChanges,
    today: NaiveDate,
) -> ServiceResult<Reservation> {
    info!(reservation_id, "updating reservation");

    conn.transaction::<_, ServiceError, _>(|conn| {
        let current = lock_reservation(conn, reservation_id)?;

        let mut changeset = ReservationChangeset {
            client_name: changes
                .client_name
                .as_deref()
                .map(validation::client_name)
                .transpose()?,
            client_email: changes
                .client_email
                .as_deref()
                .map(validation::client_email)
                .transpose()?,
            client_phone: changes
                .client_phone
                .as_deref()
                .map(validation::client_phone)
                .transpose()?,
            party_size: changes.party_size.map(validation::party_size).transpose()?,
            observations: validation::optional_text(
                changes.observations,
                MAX_OBSERVATIONS_LEN,
                "observations",
            )?,
            ..ReservationChangeset::default()
        };

        let table_id = changes.table_id.unwrap_or(current.table_id);
        let date = changes.reservation_date.unwrap_or(current.reservation_date);
        let time = changes.reservation_time.unwrap_or(current.reservation_time);
        let party_size = changeset.party_size.unwrap_or(current.party_size);

        if date != current.reservation_date {
            validation::booking_date(date, today)?;
        }

        let table_changed = table_id != current.table_id;
        let table = tables::get_table(conn, table_id)?;
        if (table_changed || party_size != current.party_size) && !table.fits_party(party_size) {
            return Err(party_does_not_fit(&table, party_size));
        }

        let slot_moved =
            table_changed || date != current.reservation_date || time != current.reservation_time;
        if slot_moved
            && !availability::is_table_free_except(conn, table_id, date, time, Some(current.id))?
        {
            return Err(slot_taken(&table, date, time));
        }

        if let Some(next) = changes.status {
            ensure_transition(current.status, next)?;
        }

        changeset.table_id = changes.table_id;
        changeset.reservation_date = changes.reservation_date;
        changeset.reservation_time = changes.reservation_time;
        changeset.status = changes.status;

        let now = Utc::now().naive_utc();
        diesel::update(reservations::table.find(reservation_id))
            .set((&changeset, reservations::modified_at.eq(Some(now))))
            .get_result::<Reservation>(conn)
            .map_err(|err| map_slot_violation(err, &table, date, time))
    })
}

/// Applies a lifecycle transition. Re-applying the current status is a no-op.
pub fn change_status(
    conn: &mut PgConnection,
    reservation_id: i64,
    next: ReservationStatus,
) -> ServiceResult<Reservation> {
    conn.transaction::<_, ServiceError, _>(|conn| {
        let current = lock_reservation(conn, reservation_id)?;
        if current.status == next {
            return Ok(current);
        }
        ensure_transition(current.status, next)?;

        info!(reservation_id, from = %current.status, to = %next, "changing reservation status");

        let now = Utc::now().naive_utc();
        Ok(diesel::update(reservations::table.find(reservation_id))
            .set((
                reservations::status.eq(next),
                reservations::modified_at.eq(Some(now)),
            ))
            .get_result::<Reservation>(conn)?)
    })
}

pub fn confirm(conn: &mut PgConnection, reservation_id: i64) -> ServiceResult<Reservation> {
    change_status(conn, reservation_id, ReservationStatus::Confirmed)
}

pub fn cancel(conn: &mut PgConnection, reservation_id: i64) -> ServiceResult<Reservation> {
    change_status(conn, reservation_id, ReservationStatus::Cancelled)
}

pub fn complete(conn: &mut PgConnection, reservation_id: i64) -> ServiceResult<Reservation> {
    change_status(conn, reservation_id, ReservationStatus::Completed)
}

/// First fitting active table, in id order, with nothing booked at the slot.
///
/// Floor state is not considered here, unlike `eligible_free_tables`.
pub fn auto_assign_table(
    conn: &mut PgConnection,
    date: NaiveDate,
    time: NaiveTime,
    party_size: i32,
) -> ServiceResult<Option<DiningTable>> {
    validation::party_size(party_size)?;
    for table in tables::list_fitting(conn, party_size)? {
        if availability::is_table_free(conn, table.id, date, time)? {
            info!(table_number = table.number, %date, %time, party_size, "table assigned");
            return Ok(Some(table));
        }
    }
    warn!(%date, %time, party_size, "no free table to assign");
    Ok(None)
}

pub fn delete_reservation(conn: &mut PgConnection, reservation_id: i64) -> ServiceResult<()> {
    let deleted = diesel::delete(reservations::table.find(reservation_id)).execute(conn)?;
    if deleted == 0 {
        return Err(reservation_not_found(reservation_id));
    }
    info!(reservation_id, "reservation deleted");
    Ok(())
}

/// Hard-deletes cancelled reservations dated strictly before `cutoff`.
pub fn purge_cancelled_before(conn: &mut PgConnection, cutoff: NaiveDate) -> ServiceResult<usize> {
    let purged = diesel::delete(
        reservations::table
            .filter(reservations::status.eq(ReservationStatus::Cancelled))
            .filter(reservations::reservation_date.lt(cutoff)),
    )
    .execute(conn)?;
    Ok(purged)
}

pub fn get_reservation(conn: &mut PgConnection, reservation_id: i64) -> ServiceResult<Reservation> {
    reservations::table
        .find(reservation_id)
        .first::<Reservation>(conn)
        .optional()?
        .ok_or_else(|| reservation_not_found(reservation_id))
}

pub fn find_by_code(conn: &mut PgConnection, code: &str) -> ServiceResult<Reservation> {
    let code = code.trim();
    if !codes::is_valid_code(code) {
        return Err(ServiceError::invalid(format!(
            "'{code}' is not a valid reservation code"
        )));
    }
    reservations::table
        .filter(reservations::code.eq(code))
        .first::<Reservation>(conn)
        .optional()?
        .ok_or_else(|| ServiceError::not_found(format!("no reservation with code {code}")))
}

pub fn list_all(conn: &mut PgConnection) -> ServiceResult<Vec<Reservation>> {
    Ok(reservations::table
        .order(reservations::id.asc())
        .load(conn)?)
}

pub fn list_by_email(conn: &mut PgConnection, email: &str) -> ServiceResult<Vec<Reservation>> {
    Ok(reservations::table
        .filter(reservations::client_email.eq(email.trim()))
        .order((
            reservations::reservation_date.asc(),
            reservations::reservation_time.asc(),
        ))
        .load(conn)?)
}

/// Live reservations for the client from `today` onwards.
pub fn upcoming_by_email(
    conn: &mut PgConnection,
    email: &str,
    today: NaiveDate,
) -> ServiceResult<Vec<Reservation>> {
    Ok(reservations::table
        .filter(reservations::client_email.eq(email.trim()))
        .filter(reservations::reservation_date.ge(today))
        .filter(reservations::status.eq_any(ReservationStatus::SLOT_HOLDING))
        .order((
            reservations::reservation_date.asc(),
            reservations::reservation_time.asc(),
        ))
        .load(conn)?)
}

pub fn list_for_date(conn: &mut PgConnection, date: NaiveDate) -> ServiceResult<Vec<Reservation>> {
    Ok(reservations::table
        .filter(reservations::reservation_date.eq(date))
        .order((reservations::reservation_time.asc(), reservations::id.asc()))
        .load(conn)?)
}

pub fn list_by_status(
    conn: &mut PgConnection,
    status: ReservationStatus,
) -> ServiceResult<Vec<Reservation>> {
    Ok(reservations::table
        .filter(reservations::status.eq(status))
        .order((
            reservations::reservation_date.asc(),
            reservations::reservation_time.asc(),
        ))
        .load(conn)?)
}

pub fn pending_upcoming(conn: &mut PgConnection, today: NaiveDate) -> ServiceResult<Vec<Reservation>> {
    Ok(reservations::table
        .filter(reservations::status.eq(ReservationStatus::Pending))
        .filter(reservations::reservation_date.ge(today))
        .order((
            reservations::reservation_date.asc(),
            reservations::reservation_time.asc(),
        ))
        .load(conn)?)
}

pub fn list_for_table(conn: &mut PgConnection, table_id: i64) -> ServiceResult<Vec<Reservation>> {
    let table = tables::get_table(conn, table_id)?;
    Ok(Reservation::belonging_to(&table)
        .order((
            reservations::reservation_date.asc(),
            reservations::reservation_time.asc(),
        ))
        .load(conn)?)
}

fn lock_reservation(conn: &mut PgConnection, reservation_id: i64) -> ServiceResult<Reservation> {
    reservations::table
        .find(reservation_id)
        .for_update()
        .first::<Reservation>(conn)
        .optional()?
        .ok_or_else(|| reservation_not_found(reservation_id))
}

fn ensure_transition(current: ReservationStatus, next: ReservationStatus) -> ServiceResult<()> {
    if current.can_transition_to(next) {
        Ok(())
    } else if current.is_terminal() {
        Err(ServiceError::conflict(format!(
            "reservation is already {current} and cannot become {next}"
        )))
    } else {
        Err(ServiceError::conflict(format!(
            "cannot change reservation status from {current} to {next}"
        )))
    }
}

/// The last attempt draws from the date-stamped namespace instead.
fn code_for_attempt<R: Rng + CryptoRng + ?Sized>(
    rng: &mut R,
    attempt: usize,
    date: NaiveDate,
) -> String {
    if attempt < CODE_ATTEMPTS {
        codes::generate_code(rng)
    } else {
        codes::generate_dated_code(rng, date)
    }
}

fn reservation_not_found(reservation_id: i64) -> ServiceError {
    ServiceError::not_found(format!("reservation {reservation_id} not found"))
}

fn slot_taken(table: &DiningTable, date: NaiveDate, time: NaiveTime) -> ServiceError {
    ServiceError::conflict(format!(
        "table {} is already booked on {date} at {}",
        table.number,
        time.format("%H:%M")
    ))
}

fn party_does_not_fit(table: &DiningTable, party_size: i32) -> ServiceError {
    ServiceError::invalid(format!(
        "table {} seats {} to {} guests, party size is {party_size}",
        table.number, table.capacity_min, table.capacity_max
    ))
}

fn map_slot_violation(
    err: DieselError,
    table: &DiningTable,
    date: NaiveDate,
    time: NaiveTime,
) -> ServiceError {
    match err {
        DieselError::DatabaseError(DatabaseErrorKind::UniqueViolation, ref details)
            if details.constraint_name() == Some(SLOT_INDEX) =>
        {
            slot_taken(table, date, time)
        }
        other => ServiceError::from(other),
    }
}
