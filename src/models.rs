use std::fmt;
use std::io::Write;
use std::str::FromStr;

use chrono::{NaiveDate, NaiveDateTime, NaiveTime};
use diesel::deserialize::{self, FromSql, FromSqlRow};
use diesel::expression::AsExpression;
use diesel::pg::{Pg, PgValue};
use diesel::prelude::*;
use diesel::serialize::{self, IsNull, Output, ToSql};
use diesel::sql_types::Text;
use serde::{de, Deserialize, Deserializer, Serialize};
use thiserror::Error;

use crate::schema::*;

#[derive(Debug, Error)]
#[error("unknown {kind} '{value}', expected one of {expected}")]
pub struct UnknownVariant {
    kind: &'static str,
    value: String,
    expected: String,
}

/// Declares a closed set of values persisted as upper-case VARCHAR.
/// Parsing, from text or JSON, ignores case and surrounding whitespace.
macro_rules! text_enum {
    ($(#[$meta:meta])* $name:ident, $kind:literal { $($variant:ident => $text:literal),+ $(,)? }) => {
        $(#[$meta])*
        #[derive(
            Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, AsExpression, FromSqlRow,
        )]
        #[diesel(sql_type = Text)]
        pub enum $name {
            $(
                #[serde(rename = $text)]
                $variant,
            )+
        }

        impl $name {
            pub const ALL: &'static [$name] = &[$($name::$variant),+];

            pub fn as_str(self) -> &'static str {
                match self {
                    $($name::$variant => $text,)+
                }
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str(self.as_str())
            }
        }

        impl FromStr for $name {
            type Err = UnknownVariant;

            fn from_str(value: &str) -> Result<Self, Self::Err> {
                match value.trim().to_ascii_uppercase().as_str() {
                    $($text => Ok($name::$variant),)+
                    _ => Err(UnknownVariant {
                        kind: $kind,
                        value: value.to_string(),
                        expected: $name::ALL
                            .iter()
                            .map(|variant| variant.as_str())
                            .collect::<Vec<_>>()
                            .join(", "),
                    }),
                }
            }
        }

        impl<'de> Deserialize<'de> for $name {
            fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
                let raw = String::deserialize(deserializer)?;
                raw.parse().map_err(de::Error::custom)
            }
        }

        impl ToSql<Text, Pg> for $name {
            fn to_sql<'b>(&'b self, out: &mut Output<'b, '_, Pg>) -> serialize::Result {
                out.write_all(self.as_str().as_bytes())?;
                Ok(IsNull::No)
            }
        }

        impl FromSql<Text, Pg> for $name {
            fn from_sql(bytes: PgValue<'_>) -> deserialize::Result<Self> {
                let raw = <String as FromSql<Text, Pg>>::from_sql(bytes)?;
                Ok(raw.parse()?)
            }
        }
    };
}

text_enum!(
    /// Seating style of a table.
    TableType, "table type" {
        Interior => "INTERIOR",
        Terrace => "TERRACE",
        Vip => "VIP",
        Bar => "BAR",
        Outdoor => "OUTDOOR",
    }
);

text_enum!(
    /// Floor state of a table. Independent from whether a slot is booked.
    TableState, "table state" {
        Available => "AVAILABLE",
        Occupied => "OCCUPIED",
        Reserved => "RESERVED",
        OutOfService => "OUT_OF_SERVICE",
    }
);

text_enum!(
    ReservationStatus, "reservation status" {
        Pending => "PENDING",
        Confirmed => "CONFIRMED",
        Cancelled => "CANCELLED",
        Completed => "COMPLETED",
    }
);

impl ReservationStatus {
    /// Statuses that occupy their (table, date, time) slot.
    pub const SLOT_HOLDING: [ReservationStatus; 2] =
        [ReservationStatus::Pending, ReservationStatus::Confirmed];

    pub fn is_terminal(self) -> bool {
        matches!(self, ReservationStatus::Cancelled | ReservationStatus::Completed)
    }

    /// PENDING -> CONFIRMED -> COMPLETED, and PENDING/CONFIRMED -> CANCELLED.
    /// Re-applying the current status is accepted as a no-op.
    pub fn can_transition_to(self, next: ReservationStatus) -> bool {
        use ReservationStatus::*;

        self == next
            || matches!(
                (self, next),
                (Pending, Confirmed) | (Pending, Cancelled) | (Confirmed, Completed) | (Confirmed, Cancelled)
            )
    }
}

#[derive(Debug, Clone, Queryable, Identifiable)]
#[diesel(table_name = dining_tables)]
pub struct DiningTable {
    pub id: i64,
    pub number: i32,
    pub capacity_min: i32,
    pub capacity_max: i32,
    pub table_type: TableType,
    pub state: TableState,
    pub description: Option<String>,
    pub active: bool,
    pub created_at: NaiveDateTime,
    pub updated_at: NaiveDateTime,
}

impl DiningTable {
    pub fn fits_party(&self, party_size: i32) -> bool {
        self.capacity_min <= party_size && party_size <= self.capacity_max
    }
}

#[derive(Debug, Insertable)]
#[diesel(table_name = dining_tables)]
pub struct NewDiningTable {
    pub number: i32,
    pub capacity_min: i32,
    pub capacity_max: i32,
    pub table_type: TableType,
    pub state: TableState,
    pub description: Option<String>,
    pub active: bool,
}

#[derive(Debug, Clone, Queryable, Identifiable, Associations)]
#[diesel(table_name = reservations)]
#[diesel(belongs_to(DiningTable, foreign_key = table_id))]
pub struct Reservation {
    pub id: i64,
    pub client_name: String,
    pub client_email: String,
    pub client_phone: String,
    pub table_id: i64,
    pub reservation_date: NaiveDate,
    pub reservation_time: NaiveTime,
    pub party_size: i32,
    pub status: ReservationStatus,
    pub observations: Option<String>,
    pub code: String,
    pub created_at: NaiveDateTime,
    pub modified_at: Option<NaiveDateTime>,
}

#[derive(Debug, Insertable)]
#[diesel(table_name = reservations)]
pub struct NewReservation {
    pub client_name: String,
    pub client_email: String,
    pub client_phone: String,
    pub table_id: i64,
    pub reservation_date: NaiveDate,
    pub reservation_time: NaiveTime,
    pub party_size: i32,
    pub status: ReservationStatus,
    pub observations: Option<String>,
    pub code: String,
}
