pub mod auth;
pub mod availability;
pub mod bookings;
pub mod dashboard;
pub mod payments;
pub mod reconciliation;

#[cfg(test)]
pub(crate) mod testing;

use chrono::{NaiveDateTime, Timelike, Utc};

/// Current UTC time at the precision the store keeps.
pub fn now() -> NaiveDateTime {
    let now = Utc::now().naive_utc();
    now.with_nanosecond(0).unwrap_or(now)
}
