pub mod admin;
pub mod auth;
pub mod availability;
pub mod bookings;
pub mod extract;
pub mod health;
pub mod payments;

use chrono::{DateTime, NaiveDate};

use crate::errors::{AppError, AppResult};
use crate::models::BookingStatus;

/// Accepts `YYYY-MM-DD` or a full RFC 3339 timestamp; only the calendar day is kept.
pub fn parse_date(s: &str) -> AppResult<NaiveDate> {
    let s = s.trim();
    NaiveDate::parse_from_str(s, "%Y-%m-%d")
        .or_else(|_| DateTime::parse_from_rfc3339(s).map(|dt| dt.date_naive()))
        .map_err(|_| AppError::Validation(format!("Invalid date: {s}")))
}

pub fn parse_status(s: &str) -> AppResult<BookingStatus> {
    BookingStatus::parse(s).ok_or_else(|| AppError::Validation(format!("Invalid status: {s}")))
}
