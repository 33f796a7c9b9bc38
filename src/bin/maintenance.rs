use std::env;

use anyhow::{Context, Result};
use chrono::{Days, Local, NaiveDate, NaiveTime};
use diesel::{dsl::count_star, prelude::*, PgConnection};
use rand::rngs::OsRng;
use tracing_subscriber::EnvFilter;

use reservations::{
    booking::{self, BookingRequest},
    config::AppConfig,
    db,
    models::{ReservationStatus, TableType},
    schema::dining_tables,
    tables::{self, TableDraft},
};

const USAGE: &str = "Usage: maintenance <seed|purge-cancelled>";

struct SampleTable {
    number: i32,
    table_type: TableType,
    capacity: (i32, i32),
    description: &'static str,
}

struct SampleBooking {
    table_number: i32,
    client: (&'static str, &'static str, &'static str),
    days_ahead: u64,
    time: (u32, u32),
    party_size: i32,
    observations: &'static str,
    status: ReservationStatus,
}

const SAMPLE_TABLES: &[SampleTable] = &[
    SampleTable {
        number: 1,
        table_type: TableType::Interior,
        capacity: (2, 4),
        description: "By the window",
    },
    SampleTable {
        number: 2,
        table_type: TableType::Terrace,
        capacity: (4, 6),
        description: "Terrace with a view",
    },
    SampleTable {
        number: 3,
        table_type: TableType::Vip,
        capacity: (2, 8),
        description: "Private VIP room",
    },
    SampleTable {
        number: 4,
        table_type: TableType::Bar,
        capacity: (1, 2),
        description: "Bar seating",
    },
    SampleTable {
        number: 5,
        table_type: TableType::Outdoor,
        capacity: (4, 6),
        description: "Garden table",
    },
    SampleTable {
        number: 6,
        table_type: TableType::Interior,
        capacity: (6, 10),
        description: "Large table for groups",
    },
];

const SAMPLE_BOOKINGS: &[SampleBooking] = &[
    SampleBooking {
        table_number: 1,
        client: ("Juan Perez", "juan.perez@example.com", "56912345678"),
        days_ahead: 1,
        time: (19, 0),
        party_size: 3,
        observations: "Birthday, needs decoration",
        status: ReservationStatus::Pending,
    },
    SampleBooking {
        table_number: 2,
        client: ("Maria Gonzalez", "maria.gonzalez@example.com", "56987654321"),
        days_ahead: 1,
        time: (20, 30),
        party_size: 5,
        observations: "Prefers the terrace",
        status: ReservationStatus::Confirmed,
    },
    SampleBooking {
        table_number: 3,
        client: ("Carlos Rodriguez", "carlos.rodriguez@example.com", "56911111111"),
        days_ahead: 2,
        time: (21, 0),
        party_size: 6,
        observations: "Business dinner",
        status: ReservationStatus::Pending,
    },
    SampleBooking {
        table_number: 5,
        client: ("Ana Martinez", "ana.martinez@example.com", "56922222222"),
        days_ahead: 0,
        time: (13, 0),
        party_size: 4,
        observations: "Working lunch",
        status: ReservationStatus::Confirmed,
    },
    SampleBooking {
        table_number: 6,
        client: ("Pedro Sanchez", "pedro.sanchez@example.com", "56933333333"),
        days_ahead: 2,
        time: (19, 30),
        party_size: 8,
        observations: "Family gathering",
        status: ReservationStatus::Pending,
    },
];

#[tokio::main]
async fn main() -> Result<()> {
    dotenv::dotenv().ok();
    init_tracing();

    let mut args = env::args().skip(1);
    match args.next().as_deref() {
        Some("seed") => seed()?,
        Some("purge-cancelled") => purge_cancelled()?,
        Some(cmd) => {
            eprintln!("Unknown command: {cmd}\n{USAGE}");
            std::process::exit(1);
        }
        None => {
            eprintln!("{USAGE}");
            std::process::exit(1);
        }
    }

    Ok(())
}

fn connect() -> Result<db::PgPool> {
    let config = AppConfig::from_env()?;
    tracing::info!(
        component = "maintenance",
        database_url = %config.redacted_database_url(),
        "loaded configuration"
    );
    let pool = db::init_pool_with_size(&config.database_url, 1)?;
    db::run_migrations(&pool)?;
    Ok(pool)
}

fn seed() -> Result<()> {
    let pool = connect()?;
    let mut conn = pool.get().context("failed to get database connection")?;

    let existing: i64 = dining_tables::table
        .select(count_star())
        .first(&mut conn)
        .context("failed to count tables")?;
    if existing > 0 {
        println!("Database already holds {existing} tables, skipping seed.");
        return Ok(());
    }

    seed_into(&mut conn, Local::now().date_naive())?;
    Ok(())
}

fn seed_into(conn: &mut PgConnection, today: NaiveDate) -> Result<()> {
    for sample in SAMPLE_TABLES {
        tables::create_table(
            conn,
            TableDraft {
                number: sample.number,
                capacity_min: sample.capacity.0,
                capacity_max: sample.capacity.1,
                table_type: sample.table_type,
                state: None,
                description: Some(sample.description.to_string()),
                active: None,
            },
        )
        .with_context(|| format!("failed to create table {}", sample.number))?;
    }
    println!("Created {} tables.", SAMPLE_TABLES.len());

    for sample in SAMPLE_BOOKINGS {
        let table = tables::find_by_number(conn, sample.table_number)?;
        let date = today
            .checked_add_days(Days::new(sample.days_ahead))
            .context("sample date out of range")?;
        let time = NaiveTime::from_hms_opt(sample.time.0, sample.time.1, 0)
            .context("invalid sample time")?;
        let (name, email, phone) = sample.client;

        let reservation = booking::create_reservation(
            conn,
            BookingRequest {
                client_name: name.to_string(),
                client_email: email.to_string(),
                client_phone: phone.to_string(),
                table_id: table.id,
                reservation_date: date,
                reservation_time: time,
                party_size: sample.party_size,
                observations: Some(sample.observations.to_string()),
            },
            &mut OsRng,
            today,
        )
        .with_context(|| format!("failed to book table {} for {name}", sample.table_number))?;

        if sample.status != reservation.status {
            booking::change_status(conn, reservation.id, sample.status)?;
        }
        println!("Booked {} for {name} ({}).", reservation.code, sample.status);
    }

    Ok(())
}

fn purge_cancelled() -> Result<()> {
    let pool = connect()?;
    let mut conn = pool.get().context("failed to get database connection")?;

    let cutoff = Local::now().date_naive();
    let purged = booking::purge_cancelled_before(&mut conn, cutoff)
        .context("failed to purge cancelled reservations")?;

    tracing::info!(purged, %cutoff, "purged cancelled reservations");
    println!("Removed {purged} cancelled reservations dated before {cutoff}.");
    Ok(())
}

fn init_tracing() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .compact()
        .init();
}
