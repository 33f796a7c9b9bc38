use std::env;

use anyhow::{Context, Result};
use chrono::NaiveTime;
use url::Url;

use crate::db::DEFAULT_MAX_POOL_SIZE;
use crate::schedule::ServiceHours;

#[derive(Clone, Debug)]
pub struct AppConfig {
    pub database_url: String,
    pub database_max_pool_size: u32,
    pub server_host: String,
    pub server_port: u16,
    pub cors_allowed_origin: Option<String>,
    pub service_hours: ServiceHours,
}

impl AppConfig {
    pub fn from_env() -> Result<Self> {
        let database_url = env::var("DATABASE_URL").context("DATABASE_URL must be set")?;
        let database_max_pool_size = pool_size_var()?;
        let server_host = env::var("SERVER_HOST").unwrap_or_else(|_| "127.0.0.1".to_string());
        let server_port = env::var("SERVER_PORT")
            .unwrap_or_else(|_| "3000".to_string())
            .parse()
            .context("SERVER_PORT must be a valid u16")?;
        let cors_allowed_origin = env::var("CORS_ALLOWED_ORIGIN").ok();
        let service_hours = service_hours_from_env()?;

        Ok(Self {
            database_url,
            database_max_pool_size,
            server_host,
            server_port,
            cors_allowed_origin,
            service_hours,
        })
    }

    pub fn redacted_database_url(&self) -> String {
        redact_database_url(&self.database_url)
    }
}

fn service_hours_from_env() -> Result<ServiceHours> {
    let defaults = ServiceHours::default();
    let hours = ServiceHours {
        lunch_start: time_var("LUNCH_OPEN_START", defaults.lunch_start)?,
        lunch_end: time_var("LUNCH_OPEN_END", defaults.lunch_end)?,
        dinner_start: time_var("DINNER_OPEN_START", defaults.dinner_start)?,
        dinner_end: time_var("DINNER_OPEN_END", defaults.dinner_end)?,
        slot_increment_minutes: match env::var("SLOT_INCREMENT_MINUTES") {
            Ok(raw) => raw
                .trim()
                .parse()
                .context("SLOT_INCREMENT_MINUTES must be a positive integer")?,
            Err(_) => defaults.slot_increment_minutes,
        },
    };
    hours.validate().context("invalid service hours")?;
    Ok(hours)
}

fn pool_size_var() -> Result<u32> {
    match env::var("DATABASE_MAX_POOL_SIZE") {
        Ok(raw) => parse_pool_size(&raw),
        Err(_) => Ok(DEFAULT_MAX_POOL_SIZE),
    }
}

fn parse_pool_size(raw: &str) -> Result<u32> {
    let size: u32 = raw
        .trim()
        .parse()
        .context("DATABASE_MAX_POOL_SIZE must be a positive integer")?;
    anyhow::ensure!(size > 0, "DATABASE_MAX_POOL_SIZE must be a positive integer");
    Ok(size)
}

fn time_var(name: &str, default: NaiveTime) -> Result<NaiveTime> {
    match env::var(name) {
        Ok(raw) => parse_clock_time(&raw).with_context(|| format!("{name} must be formatted as HH:MM")),
        Err(_) => Ok(default),
    }
}

fn parse_clock_time(raw: &str) -> Result<NaiveTime> {
    Ok(NaiveTime::parse_from_str(raw.trim(), "%H:%M")?)
}

fn redact_database_url(raw: &str) -> String {
    match Url::parse(raw) {
        Ok(mut parsed) => {
            let _ = parsed.set_password(Some("*****"));
            parsed.to_string()
        }
        Err(_) => "***".to_string(),
    }
}
