pub mod availability;
pub mod booking;
pub mod codes;
pub mod config;
pub mod db;
pub mod error;
pub mod models;
pub mod routes;
pub mod schedule;
pub mod schema;
pub mod state;
pub mod stats;
pub mod tables;
pub mod utils;
pub mod validation;
