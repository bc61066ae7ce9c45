pub mod stripe;
pub mod webhook;

use std::collections::HashMap;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::config::BookingPolicy;
use crate::db::queries;
use crate::errors::{AppError, AppResult};
use crate::models::{Booking, BookingStatus, PaymentMethod, PaymentType};
use crate::services::auth::Claims;
use crate::services::bookings::get_booking;
use crate::services::reconciliation::{self, PaymentApplication, Reconciled};
use crate::state::AppState;

/// Provider statuses other than this one never touch a booking.
pub const SUCCEEDED: &str = "succeeded";

#[derive(Debug, Clone)]
pub struct IntentRequest {
    /// Amount in currency minor units.
    pub amount: i64,
    pub currency: String,
    pub metadata: HashMap<String, String>,
    /// Sent on every attempt so a retried creation is deduplicated upstream.
    pub idempotency_key: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct PaymentIntent {
    pub id: String,
    pub amount: i64,
    pub currency: String,
    pub status: String,
    pub client_secret: Option<String>,
    #[serde(default)]
    pub metadata: HashMap<String, String>,
}

#[async_trait]
pub trait PaymentGateway: Send + Sync {
    async fn create_intent(&self, req: &IntentRequest) -> anyhow::Result<PaymentIntent>;
    async fn retrieve_intent(&self, id: &str) -> anyhow::Result<PaymentIntent>;
}

fn upstream(err: anyhow::Error) -> AppError {
    AppError::Upstream(format!("{err:#}"))
}

fn ensure_access(claims: &Claims, booking: &Booking) -> AppResult<()> {
    if claims.is_admin() || claims.sub == booking.user_id {
        Ok(())
    } else {
        Err(AppError::Forbidden(
            "You do not have access to this booking".to_string(),
        ))
    }
}

/// Checks a requested charge against the booking before any provider call.
pub fn validate_intent(
    booking: &Booking,
    amount: i64,
    payment_type: PaymentType,
    policy: &BookingPolicy,
    day_taken: bool,
) -> AppResult<()> {
    if booking.status.is_terminal() {
        return Err(AppError::Validation(format!(
            "Cannot pay for a {} booking",
            booking.status
        )));
    }
    if amount <= 0 {
        return Err(AppError::InvalidAmount(
            "Payment amount must be greater than zero".to_string(),
        ));
    }
    if amount > booking.remaining_amount() {
        return Err(AppError::InvalidAmount(format!(
            "Payment amount exceeds the remaining balance of {}",
            booking.remaining_amount()
        )));
    }
    if booking.status == BookingStatus::Pending {
        if payment_type == PaymentType::Advance
            && booking.advance_paid + amount < policy.min_advance
        {
            return Err(AppError::InvalidAmount(format!(
                "Minimum advance payment is {}",
                policy.min_advance
            )));
        }
        if day_taken {
            return Err(AppError::DateUnavailable(
                "This date has already been booked by another customer".to_string(),
            ));
        }
    }
    Ok(())
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateIntent {
    pub booking_id: String,
    pub amount: i64,
    #[serde(default = "default_payment_type")]
    pub payment_type: PaymentType,
}

fn default_payment_type() -> PaymentType {
    PaymentType::Advance
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct IntentCreated {
    pub client_secret: String,
    pub payment_intent_id: String,
}

pub async fn create_payment_intent(
    state: &AppState,
    claims: &Claims,
    req: CreateIntent,
) -> AppResult<IntentCreated> {
    let booking = {
        let conn = state.conn()?;
        let booking = get_booking(&conn, &req.booking_id)?;
        ensure_access(claims, &booking)?;
        let day_taken = queries::confirmed_booking_on(&conn, &booking.date)?
            .is_some_and(|other| other != booking.id);
        validate_intent(&booking, req.amount, req.payment_type, &state.config.policy, day_taken)?;
        booking
    };

    let metadata = HashMap::from([
        ("bookingId".to_string(), booking.id.clone()),
        ("userId".to_string(), booking.user_id.clone()),
        ("paymentType".to_string(), req.payment_type.as_str().to_string()),
    ]);
    let intent_req = IntentRequest {
        amount: req.amount * 100,
        currency: state.config.currency.clone(),
        metadata,
        idempotency_key: Uuid::new_v4().to_string(),
    };

    let intent = state
        .gateway
        .create_intent(&intent_req)
        .await
        .map_err(upstream)?;
    let client_secret = intent
        .client_secret
        .ok_or_else(|| AppError::Upstream("payment intent has no client secret".to_string()))?;

    tracing::info!(
        booking_id = %booking.id,
        payment_intent_id = %intent.id,
        amount = req.amount,
        payment_type = req.payment_type.as_str(),
        "payment intent created"
    );

    Ok(IntentCreated {
        client_secret,
        payment_intent_id: intent.id,
    })
}

/// Applies a succeeded provider intent to the booking named in its metadata.
pub(crate) fn reconcile_intent(state: &AppState, intent: &PaymentIntent) -> AppResult<Reconciled> {
    let booking_id = intent.metadata.get("bookingId").ok_or_else(|| {
        AppError::Validation("Payment intent is not linked to a booking".to_string())
    })?;
    let payment_type = intent
        .metadata
        .get("paymentType")
        .and_then(|t| PaymentType::parse(t))
        .unwrap_or(PaymentType::Advance);

    let mut conn = state.conn()?;
    reconciliation::apply_payment(
        &mut conn,
        PaymentApplication {
            booking_id: booking_id.clone(),
            amount: intent.amount / 100,
            payment_type,
            method: PaymentMethod::Stripe,
            transaction_id: intent.id.clone(),
            provider_intent_id: Some(intent.id.clone()),
        },
        &state.config.policy,
        crate::services::now(),
    )
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ConfirmPayment {
    pub payment_intent_id: String,
    pub booking_id: String,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PaymentConfirmed {
    pub booking: Booking,
    pub amount_paid: i64,
    pub remaining_amount: i64,
}

pub async fn confirm_payment(
    state: &AppState,
    claims: &Claims,
    req: ConfirmPayment,
) -> AppResult<PaymentConfirmed> {
    {
        let conn = state.conn()?;
        let booking = get_booking(&conn, &req.booking_id)?;
        ensure_access(claims, &booking)?;
    }

    let intent = state
        .gateway
        .retrieve_intent(&req.payment_intent_id)
        .await
        .map_err(upstream)?;

    if intent.status != SUCCEEDED {
        tracing::warn!(
            payment_intent_id = %intent.id,
            status = %intent.status,
            "confirmation attempted for unfinished payment"
        );
        return Err(AppError::PaymentNotCompleted {
            status: intent.status,
        });
    }
    if intent.metadata.get("bookingId") != Some(&req.booking_id) {
        return Err(AppError::Validation(
            "Payment intent does not belong to this booking".to_string(),
        ));
    }

    let reconciled = reconcile_intent(state, &intent)?;
    let remaining_amount = reconciled.booking.remaining_amount();

    Ok(PaymentConfirmed {
        booking: reconciled.booking,
        amount_paid: reconciled.payment.amount,
        remaining_amount,
    })
}
