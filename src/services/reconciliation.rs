use chrono::NaiveDateTime;
use rusqlite::Connection;
use uuid::Uuid;

use crate::config::BookingPolicy;
use crate::db::{self, queries};
use crate::errors::{AppError, AppResult};
use crate::models::{
    Booking, BookingStatus, LedgerStatus, Payment, PaymentMethod, PaymentStatus, PaymentType,
};
use crate::services::availability;
use crate::services::bookings::{confirm_conflict, get_booking};

/// Booking state after a payment is applied.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Derived {
    pub advance_paid: i64,
    pub status: BookingStatus,
    pub payment_status: PaymentStatus,
}

/// Computes the post-payment state without touching storage.
///
/// `day_taken` is true when another booking already holds the date; the money
/// is still accepted but the booking stays pending.
pub fn derive(
    booking: &Booking,
    amount: i64,
    policy: &BookingPolicy,
    day_taken: bool,
) -> AppResult<Derived> {
    if amount <= 0 {
        return Err(AppError::InvalidAmount(
            "Payment amount must be greater than zero".to_string(),
        ));
    }
    if booking.status.is_terminal() {
        return Err(AppError::Validation(format!(
            "Cannot accept payment for a {} booking",
            booking.status
        )));
    }

    let advance_paid = booking.advance_paid + amount;
    if advance_paid > booking.total_amount {
        return Err(AppError::InvalidAmount(format!(
            "Payment of {amount} exceeds the remaining balance of {}",
            booking.remaining_amount()
        )));
    }

    let status = if booking.status == BookingStatus::Pending
        && advance_paid >= policy.min_advance
        && !day_taken
    {
        BookingStatus::Confirmed
    } else {
        booking.status
    };

    let payment_status = if advance_paid == booking.total_amount {
        PaymentStatus::FullyPaid
    } else if advance_paid >= policy.min_advance {
        PaymentStatus::AdvancePaid
    } else {
        PaymentStatus::Pending
    };

    Ok(Derived {
        advance_paid,
        status,
        payment_status,
    })
}

#[derive(Debug, Clone)]
pub struct PaymentApplication {
    pub booking_id: String,
    pub amount: i64,
    pub payment_type: PaymentType,
    pub method: PaymentMethod,
    pub transaction_id: String,
    pub provider_intent_id: Option<String>,
}

#[derive(Debug, Clone)]
pub struct Reconciled {
    pub booking: Booking,
    pub payment: Payment,
    /// False when the transaction id was already on the ledger.
    pub applied: bool,
}

/// Applies a payment at most once per transaction id. The balance increment,
/// status derivation and ledger append commit together or not at all.
pub fn apply_payment(
    conn: &mut Connection,
    app: PaymentApplication,
    policy: &BookingPolicy,
    now: NaiveDateTime,
) -> AppResult<Reconciled> {
    let tx = conn.transaction()?;
    let booking = get_booking(&tx, &app.booking_id)?;

    if let Some(existing) = queries::get_payment_by_transaction(&tx, &app.transaction_id)? {
        if existing.booking_id != booking.id {
            return Err(AppError::Conflict(
                "Transaction already applied to a different booking".to_string(),
            ));
        }
        tracing::info!(
            booking_id = %booking.id,
            transaction_id = %app.transaction_id,
            "payment already applied"
        );
        return Ok(Reconciled {
            booking,
            payment: existing,
            applied: false,
        });
    }

    let day_taken = queries::confirmed_booking_on(&tx, &booking.date)?
        .is_some_and(|other| other != booking.id);
    let derived = derive(&booking, app.amount, policy, day_taken)?;

    if !queries::increment_advance_paid(&tx, &booking.id, app.amount, &now)? {
        return Err(AppError::InvalidAmount(
            "Payment exceeds the remaining balance".to_string(),
        ));
    }
    queries::update_booking_status(&tx, &booking.id, derived.status, derived.payment_status, &now)
        .map_err(confirm_conflict)?;

    if derived.status == BookingStatus::Confirmed && booking.status == BookingStatus::Pending {
        availability::occupy_date(&tx, &booking.date, &booking.id)?;
    }
    if day_taken && derived.advance_paid >= policy.min_advance {
        tracing::warn!(
            booking_id = %booking.id,
            date = %booking.date,
            "payment accepted but date already confirmed for another booking"
        );
    }

    let payment = Payment {
        id: Uuid::new_v4().to_string(),
        booking_id: booking.id.clone(),
        user_id: booking.user_id.clone(),
        amount: app.amount,
        payment_type: app.payment_type,
        payment_method: app.method,
        transaction_id: app.transaction_id,
        status: LedgerStatus::Completed,
        provider_intent_id: app.provider_intent_id,
        created_at: now,
    };
    queries::insert_payment(&tx, &payment).map_err(|e| {
        if db::is_constraint_violation(&e) {
            AppError::Conflict("Transaction already recorded".to_string())
        } else {
            AppError::Internal(e)
        }
    })?;

    let updated = get_booking(&tx, &booking.id)?;
    tx.commit()?;

    tracing::info!(
        booking_id = %updated.id,
        transaction_id = %payment.transaction_id,
        amount = payment.amount,
        advance_paid = updated.advance_paid,
        status = %updated.status,
        payment_status = updated.payment_status.as_str(),
        "payment applied"
    );

    Ok(Reconciled {
        booking: updated,
        payment,
        applied: true,
    })
}

/// Records the outstanding balance as a cash payment.
pub fn mark_fully_paid(
    conn: &mut Connection,
    booking_id: &str,
    policy: &BookingPolicy,
    now: NaiveDateTime,
) -> AppResult<Reconciled> {
    let booking = get_booking(conn, booking_id)?;
    let remaining = booking.remaining_amount();
    if remaining == 0 {
        return Err(AppError::Validation(
            "Booking is already fully paid".to_string(),
        ));
    }

    let payment_type = if booking.advance_paid == 0 {
        PaymentType::Full
    } else {
        PaymentType::Remaining
    };

    apply_payment(
        conn,
        PaymentApplication {
            booking_id: booking.id,
            amount: remaining,
            payment_type,
            method: PaymentMethod::Cash,
            transaction_id: format!("cash_{}", Uuid::new_v4()),
            provider_intent_id: None,
        },
        policy,
        now,
    )
}
