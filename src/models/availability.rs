use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

const FIRST_SLOT_HOUR: u32 = 6;
const LAST_SLOT_HOUR: u32 = 22;

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct TimeSlot {
    pub time: String,
    pub available: bool,
    pub booking_id: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct AvailabilityRecord {
    pub date: NaiveDate,
    pub is_blocked: bool,
    pub block_reason: Option<String>,
    pub slots: Vec<TimeSlot>,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "kebab-case")]
pub enum DayStatus {
    Available,
    PartiallyBooked,
    FullyBooked,
    Blocked,
}

/// Derived view of one date, as served to the calendar.
#[derive(Debug, Clone, Serialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct DayAvailability {
    pub date: NaiveDate,
    pub status: DayStatus,
    pub total_slots: usize,
    pub booked_slots: usize,
    pub available_slots: usize,
    pub is_blocked: bool,
    pub block_reason: Option<String>,
    pub slots: Vec<TimeSlot>,
}

pub fn default_slots() -> Vec<TimeSlot> {
    (FIRST_SLOT_HOUR..=LAST_SLOT_HOUR)
        .map(|hour| TimeSlot {
            time: format!("{hour:02}:00"),
            available: true,
            booking_id: None,
        })
        .collect()
}

impl AvailabilityRecord {
    pub fn open(date: NaiveDate) -> Self {
        Self {
            date,
            is_blocked: false,
            block_reason: None,
            slots: default_slots(),
        }
    }

    pub fn slot(&self, time: &str) -> Option<&TimeSlot> {
        self.slots.iter().find(|s| s.time == time)
    }

    pub fn booked_slots(&self) -> usize {
        self.slots.iter().filter(|s| !s.available).count()
    }

    pub fn day_status(&self) -> DayStatus {
        let booked = self.booked_slots();
        if self.is_blocked {
            DayStatus::Blocked
        } else if booked == self.slots.len() {
            DayStatus::FullyBooked
        } else if booked > 0 {
            DayStatus::PartiallyBooked
        } else {
            DayStatus::Available
        }
    }

    pub fn block(&mut self, reason: Option<String>) {
        self.is_blocked = true;
        self.block_reason = reason;
        for slot in &mut self.slots {
            slot.available = false;
        }
    }

    /// Clears the admin block and every booking link.
    pub fn release(&mut self) {
        self.is_blocked = false;
        self.block_reason = None;
        for slot in &mut self.slots {
            slot.available = true;
            slot.booking_id = None;
        }
    }

    /// Bookings hold the whole day.
    pub fn occupy(&mut self, booking_id: &str) {
        for slot in &mut self.slots {
            slot.available = false;
            slot.booking_id = Some(booking_id.to_string());
        }
    }

    pub fn view(&self) -> DayAvailability {
        let booked = self.booked_slots();
        DayAvailability {
            date: self.date,
            status: self.day_status(),
            total_slots: self.slots.len(),
            booked_slots: booked,
            available_slots: self.slots.len() - booked,
            is_blocked: self.is_blocked,
            block_reason: self.block_reason.clone(),
            slots: self.slots.clone(),
        }
    }
}

/// Accepts `HH:MM` in 24-hour form.
pub fn parse_time(s: &str) -> anyhow::Result<()> {
    let parts: Vec<&str> = s.split(':').collect();
    if parts.len() != 2 {
        return Err(anyhow::anyhow!("invalid time format: {s}"));
    }
    let hour: u32 = parts[0]
        .parse()
        .map_err(|_| anyhow::anyhow!("invalid hour in: {s}"))?;
    let minute: u32 = parts[1]
        .parse()
        .map_err(|_| anyhow::anyhow!("invalid minute in: {s}"))?;
    if hour > 23 || minute > 59 {
        return Err(anyhow::anyhow!("time out of range: {s}"));
    }
    Ok(())
}
