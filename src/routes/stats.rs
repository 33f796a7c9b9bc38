use axum::{extract::State, Json};

use crate::error::AppResult;
use crate::routes::today;
use crate::state::AppState;
use crate::stats::{self, Stats};

pub async fn get_stats(State(state): State<AppState>) -> AppResult<Json<Stats>> {
    let mut conn = state.db()?;
    Ok(Json(stats::collect_stats(&mut conn, today())?))
}
