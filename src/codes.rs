//! Public-facing reservation codes.
//!
//! Codes are `RSV-` followed by eight characters from `[A-Z0-9]`, or the
//! date-stamped form `RSV-YYYYMMDD-` followed by four. Generation takes the
//! entropy source as an argument; the service passes the OS CSPRNG.

use chrono::NaiveDate;
use once_cell::sync::Lazy;
use rand::{CryptoRng, Rng};
use regex::Regex;

const CODE_PREFIX: &str = "RSV-";
const CODE_ALPHABET: &[u8] = b"ABCDEFGHIJKLMNOPQRSTUVWXYZ0123456789";
const CODE_LENGTH: usize = 8;
const DATED_CODE_LENGTH: usize = 4;

static PLAIN_CODE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^RSV-[A-Z0-9]{8}$").expect("valid reservation code pattern"));
static DATED_CODE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^RSV-\d{8}-[A-Z0-9]{4}$").expect("valid dated code pattern"));

pub fn generate_code<R: Rng + CryptoRng + ?Sized>(rng: &mut R) -> String {
    format!("{CODE_PREFIX}{}", random_chars(rng, CODE_LENGTH))
}

pub fn generate_dated_code<R: Rng + CryptoRng + ?Sized>(rng: &mut R, date: NaiveDate) -> String {
    format!(
        "{CODE_PREFIX}{}-{}",
        date.format("%Y%m%d"),
        random_chars(rng, DATED_CODE_LENGTH)
    )
}

pub fn is_valid_code(code: &str) -> bool {
    PLAIN_CODE.is_match(code) || DATED_CODE.is_match(code)
}

fn random_chars<R: Rng + ?Sized>(rng: &mut R, len: usize) -> String {
    (0..len)
        .map(|_| CODE_ALPHABET[rng.gen_range(0..CODE_ALPHABET.len())] as char)
        .collect()
}
