use std::collections::HashSet;

use chrono::{NaiveDate, NaiveDateTime};
use rusqlite::Connection;
use uuid::Uuid;

use crate::config::BookingPolicy;
use crate::db::{self, queries};
use crate::errors::{AppError, AppResult};
use crate::models::availability::parse_time;
use crate::models::{
    Booking, BookingStatus, LedgerStatus, Payment, PaymentMethod, PaymentStatus, PaymentType,
};
use crate::services::availability;

#[derive(Debug, Clone)]
pub struct NewBooking {
    pub date: NaiveDate,
    pub start_time: String,
    pub end_time: String,
    pub event_type: String,
    pub guest_count: i64,
    pub special_requirements: Option<String>,
    pub advance_amount: Option<i64>,
}

#[derive(Debug, Clone)]
pub struct BookingCreated {
    pub booking: Booking,
    pub remaining_amount: i64,
}

fn validate(req: &NewBooking, policy: &BookingPolicy, today: NaiveDate) -> AppResult<()> {
    if req.event_type.trim().is_empty() {
        return Err(AppError::Validation("Event type is required".to_string()));
    }
    for (label, value) in [("start time", &req.start_time), ("end time", &req.end_time)] {
        parse_time(value)
            .map_err(|e| AppError::Validation(format!("Invalid {label}: {e}")))?;
    }
    if req.guest_count <= 0 {
        return Err(AppError::Validation(
            "Guest count must be at least 1".to_string(),
        ));
    }
    if req.date < today {
        return Err(AppError::Validation("Cannot book a past date".to_string()));
    }
    let advance = req.advance_amount.unwrap_or(0);
    if !(0..=policy.package_amount).contains(&advance) {
        return Err(AppError::InvalidAmount(format!(
            "Advance amount must be between 0 and {}",
            policy.package_amount
        )));
    }
    Ok(())
}

/// Creates a pending booking for `user_id`. Any confirmed booking on the same
/// calendar day rejects the request, whatever the requested hours.
pub fn create_booking(
    conn: &mut Connection,
    user_id: &str,
    req: NewBooking,
    policy: &BookingPolicy,
    now: NaiveDateTime,
) -> AppResult<BookingCreated> {
    validate(&req, policy, now.date())?;

    let tx = conn.transaction()?;

    if queries::get_availability(&tx, &req.date)?.is_some_and(|r| r.is_blocked) {
        return Err(AppError::DateUnavailable(
            "This date is blocked by the venue".to_string(),
        ));
    }
    if queries::confirmed_booking_on(&tx, &req.date)?.is_some() {
        return Err(AppError::DateUnavailable(
            "This date is already booked. Please choose another date.".to_string(),
        ));
    }

    let advance_paid = req.advance_amount.unwrap_or(0);
    let booking = Booking {
        id: Uuid::new_v4().to_string(),
        user_id: user_id.to_string(),
        date: req.date,
        start_time: req.start_time,
        end_time: req.end_time,
        event_type: req.event_type.trim().to_string(),
        guest_count: req.guest_count,
        total_amount: policy.package_amount,
        advance_paid,
        status: BookingStatus::Pending,
        payment_status: PaymentStatus::Pending,
        special_requirements: req.special_requirements.filter(|s| !s.trim().is_empty()),
        created_at: now,
        updated_at: now,
    };
    queries::insert_booking(&tx, &booking)?;

    // The ledger must always sum to advance_paid.
    if advance_paid > 0 {
        queries::insert_payment(
            &tx,
            &Payment {
                id: Uuid::new_v4().to_string(),
                booking_id: booking.id.clone(),
                user_id: user_id.to_string(),
                amount: advance_paid,
                payment_type: PaymentType::Advance,
                payment_method: PaymentMethod::Cash,
                transaction_id: format!("cash_{}", Uuid::new_v4()),
                status: LedgerStatus::Completed,
                provider_intent_id: None,
                created_at: now,
            },
        )?;
    }

    tx.commit()?;

    tracing::info!(
        booking_id = %booking.id,
        user_id,
        date = %booking.date,
        advance_paid,
        "booking created"
    );

    let remaining_amount = booking.remaining_amount();
    Ok(BookingCreated {
        booking,
        remaining_amount,
    })
}

pub fn get_booking(conn: &Connection, id: &str) -> AppResult<Booking> {
    queries::get_booking(conn, id)?.ok_or_else(|| AppError::NotFound("Booking not found".to_string()))
}

pub fn my_bookings(conn: &Connection, user_id: &str) -> AppResult<Vec<Booking>> {
    Ok(queries::get_bookings_for_user(conn, user_id)?)
}

pub struct BookingPage {
    pub bookings: Vec<Booking>,
    pub total: i64,
}

pub fn list_bookings(conn: &Connection, filter: &queries::BookingFilter) -> AppResult<BookingPage> {
    let bookings = queries::get_bookings(conn, filter)?;
    let total = queries::count_bookings(conn, filter)?;
    Ok(BookingPage { bookings, total })
}

pub fn booked_dates(conn: &Connection) -> AppResult<Vec<NaiveDate>> {
    Ok(queries::get_booked_dates(conn)?)
}

/// Applies a validated status change inside the caller's transaction.
pub(crate) fn transition(
    tx: &Connection,
    booking: &Booking,
    next: BookingStatus,
    policy: &BookingPolicy,
    now: &NaiveDateTime,
) -> AppResult<()> {
    if !booking.status.can_transition_to(next) {
        return Err(AppError::InvalidTransition {
            from: booking.status,
            to: next,
        });
    }

    match next {
        BookingStatus::Cancelled => {
            // advance_paid stays on record for refund bookkeeping.
            queries::update_booking_status(tx, &booking.id, next, PaymentStatus::Pending, now)?;
            if booking.status == BookingStatus::Confirmed {
                availability::release_date(tx, &booking.date)?;
            }
        }
        BookingStatus::Confirmed => {
            if booking.advance_paid < policy.min_advance {
                return Err(AppError::Validation(format!(
                    "An advance of at least {} is required to confirm a booking",
                    policy.min_advance
                )));
            }
            if let Some(other) = queries::confirmed_booking_on(tx, &booking.date)? {
                if other != booking.id {
                    return Err(AppError::DateUnavailable(format!(
                        "Another booking is already confirmed on {}",
                        booking.date
                    )));
                }
            }
            let payment_status = if booking.advance_paid == booking.total_amount {
                PaymentStatus::FullyPaid
            } else {
                PaymentStatus::AdvancePaid
            };
            queries::update_booking_status(tx, &booking.id, next, payment_status, now)
                .map_err(confirm_conflict)?;
            availability::occupy_date(tx, &booking.date, &booking.id)?;
        }
        BookingStatus::Completed | BookingStatus::Pending => {
            queries::update_booking_status(tx, &booking.id, next, booking.payment_status, now)?;
        }
    }

    tracing::info!(
        booking_id = %booking.id,
        from = %booking.status,
        to = %next,
        "booking status changed"
    );
    Ok(())
}

/// Maps a hit on the one-confirmed-booking-per-day index to a conflict.
pub(crate) fn confirm_conflict(err: anyhow::Error) -> AppError {
    if db::is_constraint_violation(&err) {
        AppError::Conflict("Another booking is already confirmed on this date".to_string())
    } else {
        AppError::Internal(err)
    }
}

pub fn update_status(
    conn: &mut Connection,
    id: &str,
    next: BookingStatus,
    policy: &BookingPolicy,
    now: NaiveDateTime,
) -> AppResult<Booking> {
    let tx = conn.transaction()?;
    let booking = get_booking(&tx, id)?;
    transition(&tx, &booking, next, policy, &now)?;
    let updated = get_booking(&tx, id)?;
    tx.commit()?;
    Ok(updated)
}

pub fn cancel_booking(
    conn: &mut Connection,
    id: &str,
    policy: &BookingPolicy,
    now: NaiveDateTime,
) -> AppResult<Booking> {
    update_status(conn, id, BookingStatus::Cancelled, policy, now)
}

/// All-or-nothing: one failing id rolls back the whole batch. Repeated ids
/// are applied and counted once.
pub fn bulk_update_status(
    conn: &mut Connection,
    ids: &[String],
    next: BookingStatus,
    policy: &BookingPolicy,
    now: NaiveDateTime,
) -> AppResult<usize> {
    if ids.is_empty() {
        return Err(AppError::Validation(
            "Booking IDs and status are required".to_string(),
        ));
    }

    let mut seen = HashSet::new();
    let unique: Vec<&String> = ids.iter().filter(|id| seen.insert(id.as_str())).collect();

    let tx = conn.transaction()?;
    for id in &unique {
        let booking = get_booking(&tx, id.as_str())?;
        transition(&tx, &booking, next, policy, &now)?;
    }
    tx.commit()?;
    Ok(unique.len())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::services::testing::{at, future_day, seed_user, setup_db};

    fn request(date: NaiveDate) -> NewBooking {
        NewBooking {
            date,
            start_time: "10:00".to_string(),
            end_time: "18:00".to_string(),
            event_type: "Wedding".to_string(),
            guest_count: 250,
            special_requirements: Some("Stage decoration".to_string()),
            advance_amount: None,
        }
    }

    fn confirmed(conn: &mut Connection, user: &str, date: NaiveDate) -> Booking {
        let policy = BookingPolicy::default();
        let mut req = request(date);
        req.advance_amount = Some(policy.min_advance);
        let created = create_booking(conn, user, req, &policy, at("2025-01-01 09:00:00")).unwrap();
        update_status(
            conn,
            &created.booking.id,
            BookingStatus::Confirmed,
            &policy,
            at("2025-01-01 09:05:00"),
        )
        .unwrap()
    }

    #[test]
    fn test_create_booking_defaults() {
        let mut conn = setup_db();
        seed_user(&conn, "u1");
        let created = create_booking(
            &mut conn,
            "u1",
            request(future_day()),
            &BookingPolicy::default(),
            at("2025-01-01 09:00:00"),
        )
        .unwrap();

        let b = &created.booking;
        assert_eq!(b.status, BookingStatus::Pending);
        assert_eq!(b.payment_status, PaymentStatus::Pending);
        assert_eq!(b.total_amount, 20_000);
        assert_eq!(b.advance_paid, 0);
        assert_eq!(created.remaining_amount, 20_000);
        assert!(queries::get_payments_for_booking(&conn, &b.id).unwrap().is_empty());
    }

    #[test]
    fn test_initial_advance_is_recorded_in_ledger() {
        let mut conn = setup_db();
        seed_user(&conn, "u1");
        let mut req = request(future_day());
        req.advance_amount = Some(5_000);
        let created = create_booking(
            &mut conn,
            "u1",
            req,
            &BookingPolicy::default(),
            at("2025-01-01 09:00:00"),
        )
        .unwrap();

        assert_eq!(created.booking.advance_paid, 5_000);
        assert_eq!(created.booking.status, BookingStatus::Pending);
        assert_eq!(created.remaining_amount, 15_000);
        assert_eq!(
            queries::sum_completed_for_booking(&conn, &created.booking.id).unwrap(),
            5_000
        );
    }

    #[test]
    fn test_validation_errors() {
        let mut conn = setup_db();
        seed_user(&conn, "u1");
        let policy = BookingPolicy::default();
        let now = at("2025-01-01 09:00:00");

        let mut bad = request(future_day());
        bad.guest_count = 0;
        assert!(matches!(
            create_booking(&mut conn, "u1", bad, &policy, now),
            Err(AppError::Validation(_))
        ));

        let mut bad = request(future_day());
        bad.event_type = "  ".to_string();
        assert!(matches!(
            create_booking(&mut conn, "u1", bad, &policy, now),
            Err(AppError::Validation(_))
        ));

        let mut bad = request(future_day());
        bad.start_time = "25:00".to_string();
        assert!(matches!(
            create_booking(&mut conn, "u1", bad, &policy, now),
            Err(AppError::Validation(_))
        ));

        let past = NaiveDate::from_ymd_opt(2024, 12, 31).unwrap();
        assert!(matches!(
            create_booking(&mut conn, "u1", request(past), &policy, now),
            Err(AppError::Validation(_))
        ));

        let mut bad = request(future_day());
        bad.advance_amount = Some(20_001);
        assert!(matches!(
            create_booking(&mut conn, "u1", bad, &policy, now),
            Err(AppError::InvalidAmount(_))
        ));
    }

    #[test]
    fn test_same_day_conflict_ignores_times() {
        let mut conn = setup_db();
        seed_user(&conn, "u1");
        seed_user(&conn, "u2");
        let date = future_day();
        confirmed(&mut conn, "u1", date);

        let mut req = request(date);
        req.start_time = "06:00".to_string();
        req.end_time = "07:00".to_string();
        let result = create_booking(
            &mut conn,
            "u2",
            req,
            &BookingPolicy::default(),
            at("2025-01-02 09:00:00"),
        );
        assert!(matches!(result, Err(AppError::DateUnavailable(_))));
    }

    #[test]
    fn test_pending_bookings_do_not_block_the_day() {
        let mut conn = setup_db();
        seed_user(&conn, "u1");
        seed_user(&conn, "u2");
        let date = future_day();
        let policy = BookingPolicy::default();
        create_booking(&mut conn, "u1", request(date), &policy, at("2025-01-01 09:00:00")).unwrap();
        assert!(create_booking(&mut conn, "u2", request(date), &policy, at("2025-01-01 09:01:00")).is_ok());
    }

    #[test]
    fn test_blocked_date_rejected() {
        let mut conn = setup_db();
        seed_user(&conn, "u1");
        let date = future_day();
        availability::block_date(&mut conn, date, Some("private event".to_string())).unwrap();
        let result = create_booking(
            &mut conn,
            "u1",
            request(date),
            &BookingPolicy::default(),
            at("2025-01-01 09:00:00"),
        );
        assert!(matches!(result, Err(AppError::DateUnavailable(_))));
    }

    #[test]
    fn test_cancel_releases_date_and_keeps_advance() {
        let mut conn = setup_db();
        seed_user(&conn, "u1");
        let date = future_day();
        let booking = confirmed(&mut conn, "u1", date);
        assert_eq!(booked_dates(&conn).unwrap(), vec![date]);

        let cancelled = cancel_booking(
            &mut conn,
            &booking.id,
            &BookingPolicy::default(),
            at("2025-01-03 09:00:00"),
        )
        .unwrap();
        assert_eq!(cancelled.status, BookingStatus::Cancelled);
        assert_eq!(cancelled.payment_status, PaymentStatus::Pending);
        assert_eq!(cancelled.advance_paid, 1_000);
        assert!(booked_dates(&conn).unwrap().is_empty());

        let record = queries::get_availability(&conn, &date).unwrap().unwrap();
        assert!(record.slots.iter().all(|s| s.available && s.booking_id.is_none()));
    }

    #[test]
    fn test_illegal_transitions_rejected() {
        let mut conn = setup_db();
        seed_user(&conn, "u1");
        let policy = BookingPolicy::default();
        let booking = confirmed(&mut conn, "u1", future_day());
        update_status(&mut conn, &booking.id, BookingStatus::Completed, &policy, at("2025-02-01 00:00:00")).unwrap();

        let result = update_status(&mut conn, &booking.id, BookingStatus::Pending, &policy, at("2025-02-01 00:01:00"));
        assert!(matches!(
            result,
            Err(AppError::InvalidTransition {
                from: BookingStatus::Completed,
                to: BookingStatus::Pending
            })
        ));

        let result = cancel_booking(&mut conn, &booking.id, &policy, at("2025-02-01 00:02:00"));
        assert!(matches!(result, Err(AppError::InvalidTransition { .. })));
    }

    #[test]
    fn test_confirm_requires_minimum_advance() {
        let mut conn = setup_db();
        seed_user(&conn, "u1");
        let policy = BookingPolicy::default();
        let created = create_booking(&mut conn, "u1", request(future_day()), &policy, at("2025-01-01 09:00:00")).unwrap();

        let result = update_status(&mut conn, &created.booking.id, BookingStatus::Confirmed, &policy, at("2025-01-01 10:00:00"));
        assert!(matches!(result, Err(AppError::Validation(_))));
        let unchanged = get_booking(&conn, &created.booking.id).unwrap();
        assert_eq!(unchanged.status, BookingStatus::Pending);
    }

    #[test]
    fn test_admin_cannot_double_confirm_a_day() {
        let mut conn = setup_db();
        seed_user(&conn, "u1");
        seed_user(&conn, "u2");
        let policy = BookingPolicy::default();
        let date = future_day();

        let mut req = request(date);
        req.advance_amount = Some(2_000);
        let second = create_booking(&mut conn, "u2", req, &policy, at("2025-01-01 08:00:00")).unwrap();
        confirmed(&mut conn, "u1", date);

        let result = update_status(&mut conn, &second.booking.id, BookingStatus::Confirmed, &policy, at("2025-01-01 10:00:00"));
        assert!(matches!(result, Err(AppError::DateUnavailable(_))));
    }

    #[test]
    fn test_bulk_update_is_all_or_nothing() {
        let mut conn = setup_db();
        seed_user(&conn, "u1");
        let policy = BookingPolicy::default();
        let now = at("2025-01-01 09:00:00");
        let a = create_booking(&mut conn, "u1", request(future_day()), &policy, now).unwrap();
        let b = create_booking(&mut conn, "u1", request(future_day()), &policy, now).unwrap();

        let ids = vec![a.booking.id.clone(), "missing".to_string()];
        let result = bulk_update_status(&mut conn, &ids, BookingStatus::Cancelled, &policy, now);
        assert!(matches!(result, Err(AppError::NotFound(_))));
        assert_eq!(get_booking(&conn, &a.booking.id).unwrap().status, BookingStatus::Pending);

        let ids = vec![a.booking.id.clone(), b.booking.id.clone()];
        let count = bulk_update_status(&mut conn, &ids, BookingStatus::Cancelled, &policy, now).unwrap();
        assert_eq!(count, 2);
        assert_eq!(get_booking(&conn, &b.booking.id).unwrap().status, BookingStatus::Cancelled);
    }

    #[test]
    fn test_bulk_update_counts_repeated_ids_once() {
        let mut conn = setup_db();
        seed_user(&conn, "u1");
        let policy = BookingPolicy::default();
        let now = at("2025-01-01 09:00:00");
        let a = create_booking(&mut conn, "u1", request(future_day()), &policy, now).unwrap();

        let ids = vec![a.booking.id.clone(), a.booking.id.clone()];
        let count = bulk_update_status(&mut conn, &ids, BookingStatus::Cancelled, &policy, now).unwrap();
        assert_eq!(count, 1);
        assert_eq!(get_booking(&conn, &a.booking.id).unwrap().status, BookingStatus::Cancelled);
    }

    #[test]
    fn test_list_bookings_filters() {
        let mut conn = setup_db();
        seed_user(&conn, "u1");
        seed_user(&conn, "u2");
        let policy = BookingPolicy::default();
        let date = future_day();
        create_booking(&mut conn, "u1", request(date), &policy, at("2025-01-01 09:00:00")).unwrap();
        create_booking(&mut conn, "u2", request(date), &policy, at("2025-01-01 10:00:00")).unwrap();
        confirmed(&mut conn, "u1", date + chrono::Duration::days(1));

        assert_eq!(my_bookings(&conn, "u1").unwrap().len(), 2);

        let page = list_bookings(
            &conn,
            &queries::BookingFilter {
                status: Some(BookingStatus::Pending),
                date: Some(date),
                limit: Some(1),
                offset: 0,
            },
        )
        .unwrap();
        assert_eq!(page.total, 2);
        assert_eq!(page.bookings.len(), 1);
        assert_eq!(page.bookings[0].user_id, "u2");
    }
}
