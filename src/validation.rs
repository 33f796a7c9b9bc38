use chrono::NaiveDate;
use once_cell::sync::Lazy;
use regex::Regex;

use crate::error::{ServiceError, ServiceResult};

pub const MAX_PARTY_SIZE: i32 = 20;
pub const MAX_OBSERVATIONS_LEN: usize = 500;
pub const MAX_DESCRIPTION_LEN: usize = 200;

static EMAIL: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^[^@\s]+@[^@\s.]+(\.[^@\s.]+)+$").expect("valid email pattern")
});
static PHONE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^[0-9]{9,15}$").expect("valid phone pattern"));

pub fn client_name(raw: &str) -> ServiceResult<String> {
    let trimmed = raw.trim();
    let len = trimmed.chars().count();
    if !(2..=100).contains(&len) {
        return Err(ServiceError::invalid(
            "client name must be between 2 and 100 characters",
        ));
    }
    Ok(trimmed.to_string())
}

pub fn client_email(raw: &str) -> ServiceResult<String> {
    let trimmed = raw.trim();
    if trimmed.len() > 100 || !EMAIL.is_match(trimmed) {
        return Err(ServiceError::invalid("client email is not valid"));
    }
    Ok(trimmed.to_string())
}

pub fn client_phone(raw: &str) -> ServiceResult<String> {
    let trimmed = raw.trim();
    if !PHONE.is_match(trimmed) {
        return Err(ServiceError::invalid("client phone must be 9 to 15 digits"));
    }
    Ok(trimmed.to_string())
}

pub fn party_size(value: i32) -> ServiceResult<i32> {
    if !(1..=MAX_PARTY_SIZE).contains(&value) {
        return Err(ServiceError::invalid(format!(
            "party size must be between 1 and {MAX_PARTY_SIZE}"
        )));
    }
    Ok(value)
}

pub fn booking_date(date: NaiveDate, today: NaiveDate) -> ServiceResult<NaiveDate> {
    if date < today {
        return Err(ServiceError::invalid("reservation date cannot be in the past"));
    }
    Ok(date)
}

/// Blank text is treated as absent.
pub fn optional_text(raw: Option<String>, max_len: usize, field: &str) -> ServiceResult<Option<String>> {
    let Some(value) = raw else {
        return Ok(None);
    };
    let trimmed = value.trim();
    if trimmed.is_empty() {
        return Ok(None);
    }
    if trimmed.chars().count() > max_len {
        return Err(ServiceError::invalid(format!(
            "{field} must be at most {max_len} characters"
        )));
    }
    Ok(Some(trimmed.to_string()))
}
