use chrono::{NaiveDate, NaiveDateTime};
use rusqlite::Connection;

use crate::config::BookingPolicy;
use crate::db::{self, queries};
use crate::models::{Booking, Role, User};
use crate::services::bookings::{self, NewBooking};

pub fn setup_db() -> Connection {
    db::init_db(":memory:").unwrap()
}

pub fn at(s: &str) -> NaiveDateTime {
    NaiveDateTime::parse_from_str(s, queries::TS_FORMAT).unwrap()
}

pub fn future_day() -> NaiveDate {
    NaiveDate::from_ymd_opt(2030, 6, 15).unwrap()
}

pub fn seed_user(conn: &Connection, id: &str) -> User {
    let user = User {
        id: id.to_string(),
        name: format!("User {id}"),
        email: format!("{id}@example.com"),
        phone: None,
        password_hash: String::new(),
        role: Role::Customer,
        created_at: at("2025-01-01 00:00:00"),
    };
    queries::create_user(conn, &user).unwrap();
    user
}

pub fn pending_booking(conn: &mut Connection, user_id: &str, date: NaiveDate) -> Booking {
    let req = NewBooking {
        date,
        start_time: "10:00".to_string(),
        end_time: "18:00".to_string(),
        event_type: "Reception".to_string(),
        guest_count: 150,
        special_requirements: None,
        advance_amount: None,
    };
    bookings::create_booking(conn, user_id, req, &BookingPolicy::default(), at("2025-01-01 09:00:00"))
        .unwrap()
        .booking
}
