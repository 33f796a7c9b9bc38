use std::env;

use anyhow::{anyhow, Context, Result};
use axum::body::Body;
use axum::http::{Method, Request, StatusCode};
use axum::Router;
use chrono::{Days, Local, NaiveDate};
use diesel::connection::SimpleConnection;
use diesel::PgConnection;
use diesel_migrations::MigrationHarness;
use http_body_util::BodyExt;
use once_cell::sync::Lazy;
use reservations::config::AppConfig;
use reservations::db::{self, PgPool};
use reservations::routes;
use reservations::schedule::ServiceHours;
use reservations::state::AppState;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::json;
use tokio::sync::Mutex;
use tower::util::ServiceExt;

static DB_LOCK: Lazy<Mutex<()>> = Lazy::new(|| Mutex::new(()));

#[allow(dead_code)]
#[derive(Debug, Deserialize)]
pub struct TableBody {
    pub id: i64,
    pub number: i32,
    pub capacity_min: i32,
    pub capacity_max: i32,
    pub table_type: String,
    pub state: String,
    pub description: Option<String>,
    pub active: bool,
}

#[allow(dead_code)]
#[derive(Debug, Deserialize)]
pub struct ReservationBody {
    pub id: i64,
    pub code: String,
    pub client_name: String,
    pub client_email: String,
    pub table_id: i64,
    pub reservation_date: NaiveDate,
    pub reservation_time: String,
    pub party_size: i32,
    pub status: String,
    pub observations: Option<String>,
    pub modified_at: Option<String>,
}

#[allow(dead_code)]
#[derive(Debug, Deserialize)]
pub struct ErrorBody {
    pub error: String,
}

pub struct TestApp {
    pub state: AppState,
    router: Router,
}

impl TestApp {
    /// Returns `None` when `TEST_DATABASE_URL` is not set so database-backed
    /// flows are skipped on machines without Postgres.
    pub async fn new() -> Result<Option<Self>> {
        let Ok(database_url) = env::var("TEST_DATABASE_URL") else {
            eprintln!("TEST_DATABASE_URL not set, skipping database flow");
            return Ok(None);
        };

        let config = AppConfig {
            database_url,
            database_max_pool_size: 4,
            server_host: "127.0.0.1".to_string(),
            server_port: 0,
            cors_allowed_origin: None,
            service_hours: ServiceHours::default(),
        };

        let pool = db::init_pool_with_size(&config.database_url, config.database_max_pool_size)?;
        prepare_database(&pool).await?;

        let state = AppState::new(pool, config);
        let router = routes::create_router(state.clone());

        Ok(Some(Self { state, router }))
    }

    #[allow(dead_code)]
    pub async fn create_table(&self, number: i32, capacity_min: i32, capacity_max: i32) -> Result<TableBody> {
        let response = self
            .post_json(
                "/api/tables",
                &json!({
                    "number": number,
                    "capacity_min": capacity_min,
                    "capacity_max": capacity_max,
                    "table_type": "INTERIOR",
                }),
            )
            .await?;
        expect_json(response, StatusCode::CREATED).await
    }

    pub async fn post_json<T: Serialize + ?Sized>(
        &self,
        path: &str,
        payload: &T,
    ) -> Result<hyper::Response<Body>> {
        self.send_json(Method::POST, path, payload).await
    }

    #[allow(dead_code)]
    pub async fn patch_json<T: Serialize + ?Sized>(
        &self,
        path: &str,
        payload: &T,
    ) -> Result<hyper::Response<Body>> {
        self.send_json(Method::PATCH, path, payload).await
    }

    #[allow(dead_code)]
    pub async fn patch(&self, path: &str) -> Result<hyper::Response<Body>> {
        self.send_empty(Method::PATCH, path).await
    }

    #[allow(dead_code)]
    pub async fn get(&self, path: &str) -> Result<hyper::Response<Body>> {
        self.send_empty(Method::GET, path).await
    }

    #[allow(dead_code)]
    pub async fn delete(&self, path: &str) -> Result<hyper::Response<Body>> {
        self.send_empty(Method::DELETE, path).await
    }

    /// Runs blocking diesel work on a pooled connection.
    #[allow(dead_code)]
    pub async fn with_conn<F, T>(&self, f: F) -> Result<T>
    where
        F: FnOnce(&mut PgConnection) -> Result<T> + Send + 'static,
        T: Send + 'static,
    {
        let pool = self.state.pool.clone();
        tokio::task::spawn_blocking(move || {
            let mut conn = pool
                .get()
                .map_err(|err| anyhow!("failed to get database connection: {err}"))?;
            f(&mut conn)
        })
        .await
        .context("connection task panicked")?
    }

    async fn send_json<T: Serialize + ?Sized>(
        &self,
        method: Method,
        path: &str,
        payload: &T,
    ) -> Result<hyper::Response<Body>> {
        let body = serde_json::to_vec(payload)?;
        let request = Request::builder()
            .method(method)
            .uri(path)
            .header("content-type", "application/json")
            .body(Body::from(body))?;
        Ok(self
            .router
            .clone()
            .oneshot(request)
            .await
            .expect("infallible response"))
    }

    async fn send_empty(&self, method: Method, path: &str) -> Result<hyper::Response<Body>> {
        let request = Request::builder().method(method).uri(path).body(Body::empty())?;
        Ok(self
            .router
            .clone()
            .oneshot(request)
            .await
            .expect("infallible response"))
    }
}

pub async fn acquire_db_lock() -> tokio::sync::MutexGuard<'static, ()> {
    DB_LOCK.lock().await
}

pub async fn body_to_vec(body: Body) -> Result<Vec<u8>> {
    let collected = body
        .collect()
        .await
        .map_err(|err| anyhow!("failed to read response body: {err}"))?;
    Ok(collected.to_bytes().to_vec())
}

/// Asserts the status and decodes the JSON body.
#[allow(dead_code)]
pub async fn expect_json<T: DeserializeOwned>(
    response: hyper::Response<Body>,
    expected: StatusCode,
) -> Result<T> {
    let status = response.status();
    let body = body_to_vec(response.into_body()).await?;
    assert_eq!(
        status,
        expected,
        "unexpected status, body: {}",
        String::from_utf8_lossy(&body)
    );
    serde_json::from_slice(&body).context("failed to decode response body")
}

/// A date safely in the future, so bookings pass the not-in-the-past check.
#[allow(dead_code)]
pub fn days_from_now(days: u64) -> NaiveDate {
    Local::now()
        .date_naive()
        .checked_add_days(Days::new(days))
        .expect("date in range")
}

async fn prepare_database(pool: &PgPool) -> Result<()> {
    let pool = pool.clone();
    tokio::task::spawn_blocking(move || -> Result<()> {
        let mut conn = pool
            .get()
            .map_err(|err| anyhow!("failed to acquire connection: {err}"))?;
        conn.run_pending_migrations(db::MIGRATIONS)
            .map_err(|err| anyhow!("failed to run migrations: {err}"))?;
        truncate_all(&mut conn)?;
        Ok(())
    })
    .await
    .context("migration task panicked")?
}

fn truncate_all(conn: &mut PgConnection) -> Result<()> {
    conn.batch_execute("TRUNCATE TABLE reservations, dining_tables RESTART IDENTITY CASCADE;")
        .context("failed to truncate tables")?;
    Ok(())
}
