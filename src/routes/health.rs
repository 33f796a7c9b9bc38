use axum::{extract::State, http::StatusCode, response::Json};
use diesel::{connection::SimpleConnection, PgConnection};
use serde_json::json;
use tracing::warn;

use crate::state::AppState;

pub async fn health_check(State(state): State<AppState>) -> (StatusCode, Json<serde_json::Value>) {
    match ping(&state) {
        Ok(()) => (
            StatusCode::OK,
            Json(json!({ "status": "ok", "database": "ok" })),
        ),
        Err(err) => {
            warn!(error = %err, "health check could not reach the database");
            (
                StatusCode::SERVICE_UNAVAILABLE,
                Json(json!({ "status": "degraded", "database": "unreachable" })),
            )
        }
    }
}

fn ping(state: &AppState) -> anyhow::Result<()> {
    let mut conn = state.pool.get()?;
    let conn: &mut PgConnection = &mut conn;
    conn.batch_execute("SELECT 1")?;
    Ok(())
}
