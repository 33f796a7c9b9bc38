use std::fmt::Display;
use std::str::FromStr;

use axum::http::HeaderValue;
use axum::{
    routing::{get, patch},
    Router,
};
use chrono::{DateTime, Local, NaiveDate, NaiveDateTime, Utc};
use tower_http::cors::{AllowOrigin, CorsLayer};
use tower_http::trace::TraceLayer;
use tracing::warn;

use crate::{
    error::{AppError, AppResult},
    state::AppState,
};

pub mod availability;
pub mod extract;
pub mod health;
pub mod reservations;
pub mod stats;
pub mod tables;

pub fn create_router(state: AppState) -> Router<()> {
    let cors = if let Some(origins) = state.config.cors_allowed_origin.as_ref() {
        let headers: Vec<HeaderValue> = origins
            .split(',')
            .filter_map(|value| {
                let trimmed = value.trim();
                if trimmed.is_empty() {
                    return None;
                }
                match trimmed.parse::<HeaderValue>() {
                    Ok(header) => Some(header),
                    Err(err) => {
                        warn!(origin = %trimmed, error = %err, "ignoring invalid CORS origin");
                        None
                    }
                }
            })
            .collect();

        CorsLayer::new()
            .allow_origin(AllowOrigin::list(headers))
            .allow_methods(tower_http::cors::AllowMethods::mirror_request())
            .allow_headers(tower_http::cors::AllowHeaders::mirror_request())
            .allow_credentials(true)
    } else {
        CorsLayer::new()
            .allow_origin(AllowOrigin::mirror_request())
            .allow_methods(tower_http::cors::AllowMethods::mirror_request())
            .allow_headers(tower_http::cors::AllowHeaders::mirror_request())
            .allow_credentials(true)
    };

    let tables_routes = Router::new()
        .route("/", get(tables::list_tables).post(tables::create_table))
        .route(
            "/:id",
            get(tables::get_table)
                .patch(tables::update_table)
                .delete(tables::deactivate_table),
        )
        .route("/:id/state", patch(tables::set_table_state))
        .route("/:id/reservations", get(tables::list_table_reservations))
        .route("/number/:number", get(tables::get_table_by_number))
        .route("/state/:state", get(tables::list_tables_by_state))
        .route("/type/:table_type", get(tables::list_tables_by_type))
        .route("/capacity/:party_size", get(tables::list_tables_by_capacity));

    let reservations_routes = Router::new()
        .route(
            "/",
            get(reservations::list_reservations).post(reservations::create_reservation),
        )
        .route("/today", get(reservations::list_today))
        .route("/pending", get(reservations::list_pending))
        .route("/code/:code", get(reservations::get_reservation_by_code))
        .route("/email/:email", get(reservations::list_by_email))
        .route("/upcoming/:email", get(reservations::list_upcoming_by_email))
        .route("/date/:date", get(reservations::list_by_date))
        .route("/status/:status", get(reservations::list_by_status))
        .route(
            "/:id",
            get(reservations::get_reservation)
                .patch(reservations::update_reservation)
                .delete(reservations::delete_reservation),
        )
        .route("/:id/status", patch(reservations::change_status))
        .route("/:id/confirm", patch(reservations::confirm_reservation))
        .route("/:id/cancel", patch(reservations::cancel_reservation))
        .route("/:id/complete", patch(reservations::complete_reservation));

    let availability_routes = Router::new()
        .route("/tables", get(availability::free_tables))
        .route("/slots", get(availability::time_slots))
        .route("/check", get(availability::check_table))
        .route("/count", get(availability::count_tables))
        .route("/assign", get(availability::assign_table));

    Router::new()
        .nest("/api/tables", tables_routes)
        .nest("/api/reservations", reservations_routes)
        .nest("/api/availability", availability_routes)
        .route("/api/stats", get(stats::get_stats))
        .route("/api/health", get(health::health_check))
        .with_state(state)
        .layer(cors)
        .layer(TraceLayer::new_for_http())
}

pub(crate) fn to_iso(dt: NaiveDateTime) -> String {
    DateTime::<Utc>::from_naive_utc_and_offset(dt, Utc).to_rfc3339()
}

/// The restaurant's calendar day, taken from the server's local clock.
pub(crate) fn today() -> NaiveDate {
    Local::now().date_naive()
}

/// Parses an enum-like path segment, reporting bad values as 400.
pub(crate) fn parse_param<T>(raw: &str) -> AppResult<T>
where
    T: FromStr,
    T::Err: Display,
{
    raw.parse::<T>()
        .map_err(|err| AppError::bad_request(err.to_string()))
}
