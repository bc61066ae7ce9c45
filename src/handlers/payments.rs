use std::sync::Arc;

use axum::body::Bytes;
use axum::extract::State;
use axum::http::HeaderMap;
use axum::Json;
use serde_json::{json, Value};

use super::auth::CurrentUser;
use super::extract::ApiJson;
use crate::errors::AppResult;
use crate::services::payments::{
    self, webhook, ConfirmPayment, CreateIntent, IntentCreated, PaymentConfirmed,
};
use crate::state::AppState;

// POST /api/payments/create-payment-intent
pub async fn create_payment_intent(
    State(state): State<Arc<AppState>>,
    CurrentUser(claims): CurrentUser,
    ApiJson(req): ApiJson<CreateIntent>,
) -> AppResult<Json<IntentCreated>> {
    let created = payments::create_payment_intent(&state, &claims, req).await?;
    Ok(Json(created))
}

// POST /api/payments/confirm-payment
pub async fn confirm_payment(
    State(state): State<Arc<AppState>>,
    CurrentUser(claims): CurrentUser,
    ApiJson(req): ApiJson<ConfirmPayment>,
) -> AppResult<Json<PaymentConfirmed>> {
    let confirmed = payments::confirm_payment(&state, &claims, req).await?;
    Ok(Json(confirmed))
}

// POST /api/payments/webhook
pub async fn webhook(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    body: Bytes,
) -> AppResult<Json<Value>> {
    let signature = headers
        .get("stripe-signature")
        .and_then(|v| v.to_str().ok());

    webhook::handle_webhook(&state, &body, signature).await?;
    Ok(Json(json!({ "received": true })))
}
