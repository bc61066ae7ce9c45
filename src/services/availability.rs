use chrono::{Duration, NaiveDate};
use rusqlite::Connection;
use serde::Serialize;

use crate::db::queries;
use crate::errors::{AppError, AppResult};
use crate::models::{AvailabilityRecord, DayAvailability};

pub const MAX_RANGE_DAYS: i64 = 366;

/// Loads the record for `date`, creating an open one on first touch.
pub fn load_or_open(conn: &Connection, date: &NaiveDate) -> anyhow::Result<AvailabilityRecord> {
    if let Some(record) = queries::get_availability(conn, date)? {
        return Ok(record);
    }
    let record = AvailabilityRecord::open(*date);
    queries::save_availability(conn, &record)?;
    Ok(record)
}

pub fn get_availability(
    conn: &mut Connection,
    start: NaiveDate,
    end: NaiveDate,
) -> AppResult<Vec<DayAvailability>> {
    if end < start {
        return Err(AppError::Validation(
            "End date must not be before start date".to_string(),
        ));
    }
    if (end - start).num_days() >= MAX_RANGE_DAYS {
        return Err(AppError::Validation(format!(
            "Date range must not exceed {MAX_RANGE_DAYS} days"
        )));
    }

    let tx = conn.transaction()?;
    let mut days = Vec::new();
    let mut date = start;
    while date <= end {
        days.push(load_or_open(&tx, &date)?.view());
        date += Duration::days(1);
    }
    tx.commit()?;
    Ok(days)
}

pub fn get_date_availability(conn: &Connection, date: NaiveDate) -> AppResult<DayAvailability> {
    Ok(load_or_open(conn, &date)?.view())
}

pub fn block_date(
    conn: &mut Connection,
    date: NaiveDate,
    reason: Option<String>,
) -> AppResult<AvailabilityRecord> {
    let tx = conn.transaction()?;
    let mut record = load_or_open(&tx, &date)?;
    record.block(reason);
    queries::save_availability(&tx, &record)?;
    tx.commit()?;

    tracing::info!(%date, reason = ?record.block_reason, "date blocked");
    Ok(record)
}

/// A date without a record is already open, so this succeeds without writing.
pub fn unblock_date(conn: &Connection, date: NaiveDate) -> AppResult<()> {
    if release_date(conn, &date)? {
        tracing::info!(%date, "date unblocked");
    }
    Ok(())
}

/// Clears any block and booking links on `date`. Returns whether a record existed.
pub fn release_date(conn: &Connection, date: &NaiveDate) -> anyhow::Result<bool> {
    match queries::get_availability(conn, date)? {
        Some(mut record) => {
            record.release();
            queries::save_availability(conn, &record)?;
            Ok(true)
        }
        None => Ok(false),
    }
}

/// Marks the whole day as taken by `booking_id`.
pub fn occupy_date(conn: &Connection, date: &NaiveDate, booking_id: &str) -> anyhow::Result<()> {
    let mut record = load_or_open(conn, date)?;
    record.occupy(booking_id);
    queries::save_availability(conn, &record)
}

#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct SlotCheck {
    pub available: bool,
    pub reason: &'static str,
}

pub fn check_time_slot(
    conn: &Connection,
    date: NaiveDate,
    start_time: &str,
    end_time: &str,
) -> AppResult<SlotCheck> {
    let record = load_or_open(conn, &date)?;

    if record.is_blocked {
        return Ok(SlotCheck {
            available: false,
            reason: "Date is blocked by admin",
        });
    }

    let (Some(start), Some(end)) = (record.slot(start_time), record.slot(end_time)) else {
        return Ok(SlotCheck {
            available: false,
            reason: "Invalid time slots",
        });
    };

    if start.available && end.available {
        Ok(SlotCheck {
            available: true,
            reason: "Available for booking",
        })
    } else {
        Ok(SlotCheck {
            available: false,
            reason: "Time slots are already booked",
        })
    }
}

pub fn list_blocked(conn: &Connection) -> AppResult<Vec<AvailabilityRecord>> {
    Ok(queries::list_blocked_dates(conn)?)
}
