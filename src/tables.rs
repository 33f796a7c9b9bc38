//! Table registry: creation, edits, floor state and soft deletion of dining
//! tables. Listings only ever return active tables; lookups by id or number
//! still resolve deactivated ones.

use chrono::Utc;
use diesel::{
    dsl::{count_star, exists},
    prelude::*,
    result::{DatabaseErrorKind, Error as DieselError},
    PgConnection,
};
use tracing::info;

use crate::{
    error::{ServiceError, ServiceResult},
    models::{DiningTable, NewDiningTable, TableState, TableType},
    schema::dining_tables,
    validation::{self, MAX_DESCRIPTION_LEN},
};

#[derive(Debug, Clone)]
pub struct TableDraft {
    pub number: i32,
    pub capacity_min: i32,
    pub capacity_max: i32,
    pub table_type: TableType,
    pub state: Option<TableState>,
    pub description: Option<String>,
    pub active: Option<bool>,
}

/// Partial edit; `None` leaves the stored value untouched.
#[derive(Debug, Clone, Default)]
pub struct TableChanges {
    pub number: Option<i32>,
    pub capacity_min: Option<i32>,
    pub capacity_max: Option<i32>,
    pub table_type: Option<TableType>,
    pub state: Option<TableState>,
    pub description: Option<String>,
}

#[derive(AsChangeset, Default)]
#[diesel(table_name = dining_tables)]
struct TableChangeset {
    number: Option<i32>,
    capacity_min: Option<i32>,
    capacity_max: Option<i32>,
    table_type: Option<TableType>,
    state: Option<TableState>,
    description: Option<String>,
}

pub fn create_table(conn: &mut PgConnection, draft: TableDraft) -> ServiceResult<DiningTable> {
    validate_number(draft.number)?;
    validate_capacity(draft.capacity_min, draft.capacity_max)?;
    let description =
        validation::optional_text(draft.description, MAX_DESCRIPTION_LEN, "description")?;

    info!(number = draft.number, "creating table");

    conn.transaction::<_, ServiceError, _>(|conn| {
        if number_taken(conn, draft.number, None)? {
            return Err(duplicate_number(draft.number));
        }

        let new_table = NewDiningTable {
            number: draft.number,
            capacity_min: draft.capacity_min,
            capacity_max: draft.capacity_max,
            table_type: draft.table_type,
            state: draft.state.unwrap_or(TableState::Available),
            description,
            active: draft.active.unwrap_or(true),
        };

        diesel::insert_into(dining_tables::table)
            .values(&new_table)
            .get_result::<DiningTable>(conn)
            .map_err(|err| map_number_violation(err, draft.number))
    })
}

pub fn update_table(
    conn: &mut PgConnection,
    table_id: i64,
    changes: TableChanges,
) -> ServiceResult<DiningTable> {
    info!(table_id, "updating table");

    conn.transaction::<_, ServiceError, _>(|conn| {
        let existing = lock_table(conn, table_id)?;
        let mut changeset = TableChangeset {
            table_type: changes.table_type,
            state: changes.state,
            ..TableChangeset::default()
        };

        if let Some(number) = changes.number {
            validate_number(number)?;
            if number != existing.number {
                if number_taken(conn, number, Some(table_id))? {
                    return Err(duplicate_number(number));
                }
                changeset.number = Some(number);
            }
        }

        let capacity_min = changes.capacity_min.unwrap_or(existing.capacity_min);
        let capacity_max = changes.capacity_max.unwrap_or(existing.capacity_max);
        validate_capacity(capacity_min, capacity_max)?;
        changeset.capacity_min = changes.capacity_min;
        changeset.capacity_max = changes.capacity_max;

        changeset.description =
            validation::optional_text(changes.description, MAX_DESCRIPTION_LEN, "description")?;

        let now = Utc::now().naive_utc();
        diesel::update(dining_tables::table.find(table_id))
            .set((&changeset, dining_tables::updated_at.eq(now)))
            .get_result::<DiningTable>(conn)
            .map_err(|err| map_number_violation(err, changeset.number.unwrap_or(existing.number)))
    })
}

/// Overwrites the floor state without any transition check.
pub fn set_state(
    conn: &mut PgConnection,
    table_id: i64,
    state: TableState,
) -> ServiceResult<DiningTable> {
    info!(table_id, state = %state, "changing table state");

    let now = Utc::now().naive_utc();
    diesel::update(dining_tables::table.find(table_id))
        .set((
            dining_tables::state.eq(state),
            dining_tables::updated_at.eq(now),
        ))
        .get_result::<DiningTable>(conn)
        .optional()?
        .ok_or_else(|| table_not_found(table_id))
}

/// Soft delete. Reservations that reference the table are left as they are.
pub fn deactivate(conn: &mut PgConnection, table_id: i64) -> ServiceResult<()> {
    info!(table_id, "deactivating table");

    let now = Utc::now().naive_utc();
    let updated = diesel::update(dining_tables::table.find(table_id))
        .set((
            dining_tables::active.eq(false),
            dining_tables::updated_at.eq(now),
        ))
        .execute(conn)?;
    if updated == 0 {
        return Err(table_not_found(table_id));
    }
    Ok(())
}

pub fn get_table(conn: &mut PgConnection, table_id: i64) -> ServiceResult<DiningTable> {
    dining_tables::table
        .find(table_id)
        .first::<DiningTable>(conn)
        .optional()?
        .ok_or_else(|| table_not_found(table_id))
}

pub fn find_by_number(conn: &mut PgConnection, number: i32) -> ServiceResult<DiningTable> {
    dining_tables::table
        .filter(dining_tables::number.eq(number))
        .first::<DiningTable>(conn)
        .optional()?
        .ok_or_else(|| ServiceError::not_found(format!("no table with number {number}")))
}

pub fn list_active(conn: &mut PgConnection) -> ServiceResult<Vec<DiningTable>> {
    Ok(dining_tables::table
        .filter(dining_tables::active.eq(true))
        .order(dining_tables::id.asc())
        .load(conn)?)
}

pub fn list_by_state(conn: &mut PgConnection, state: TableState) -> ServiceResult<Vec<DiningTable>> {
    Ok(dining_tables::table
        .filter(dining_tables::active.eq(true))
        .filter(dining_tables::state.eq(state))
        .order(dining_tables::id.asc())
        .load(conn)?)
}

pub fn list_by_type(conn: &mut PgConnection, table_type: TableType) -> ServiceResult<Vec<DiningTable>> {
    Ok(dining_tables::table
        .filter(dining_tables::active.eq(true))
        .filter(dining_tables::table_type.eq(table_type))
        .order(dining_tables::id.asc())
        .load(conn)?)
}

/// Active tables whose capacity bracket contains `party_size`, in id order.
pub fn list_fitting(conn: &mut PgConnection, party_size: i32) -> ServiceResult<Vec<DiningTable>> {
    Ok(dining_tables::table
        .filter(dining_tables::active.eq(true))
        .filter(dining_tables::capacity_min.le(party_size))
        .filter(dining_tables::capacity_max.ge(party_size))
        .order(dining_tables::id.asc())
        .load(conn)?)
}

pub fn count_active(conn: &mut PgConnection) -> ServiceResult<i64> {
    Ok(dining_tables::table
        .filter(dining_tables::active.eq(true))
        .select(count_star())
        .first(conn)?)
}

pub fn count_by_state(conn: &mut PgConnection, state: TableState) -> ServiceResult<i64> {
    Ok(dining_tables::table
        .filter(dining_tables::active.eq(true))
        .filter(dining_tables::state.eq(state))
        .select(count_star())
        .first(conn)?)
}

pub(crate) fn lock_table(conn: &mut PgConnection, table_id: i64) -> ServiceResult<DiningTable> {
    dining_tables::table
        .find(table_id)
        .for_update()
        .first::<DiningTable>(conn)
        .optional()?
        .ok_or_else(|| table_not_found(table_id))
}

pub(crate) fn table_not_found(table_id: i64) -> ServiceError {
    ServiceError::not_found(format!("table {table_id} not found"))
}

fn number_taken(conn: &mut PgConnection, number: i32, except: Option<i64>) -> ServiceResult<bool> {
    let with_number = dining_tables::table.filter(dining_tables::number.eq(number));
    let taken = match except {
        Some(table_id) => diesel::select(exists(
            with_number.filter(dining_tables::id.ne(table_id)),
        ))
        .get_result(conn)?,
        None => diesel::select(exists(with_number)).get_result(conn)?,
    };
    Ok(taken)
}

fn validate_number(number: i32) -> ServiceResult<()> {
    if number <= 0 {
        return Err(ServiceError::invalid("table number must be positive"));
    }
    Ok(())
}

fn validate_capacity(capacity_min: i32, capacity_max: i32) -> ServiceResult<()> {
    if capacity_min < 1 {
        return Err(ServiceError::invalid("minimum capacity must be at least 1"));
    }
    if capacity_min > capacity_max {
        return Err(ServiceError::invalid(
            "minimum capacity cannot exceed maximum capacity",
        ));
    }
    Ok(())
}

fn duplicate_number(number: i32) -> ServiceError {
    ServiceError::invalid(format!("a table with number {number} already exists"))
}

fn map_number_violation(err: DieselError, number: i32) -> ServiceError {
    match err {
        DieselError::DatabaseError(DatabaseErrorKind::UniqueViolation, _) => {
            duplicate_number(number)
        }
        other => ServiceError::from(other),
    }
}
