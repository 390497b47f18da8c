// Agency Tracker Library

pub mod api;
pub mod commissions;
pub mod config;
pub mod db;
pub mod errors;
pub mod hierarchy;
pub mod observability;

pub use config::Config;
pub use errors::{AppError, Result};
