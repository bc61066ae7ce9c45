use hmac::{Hmac, Mac};
use serde::Deserialize;
use sha2::Sha256;

use super::{reconcile_intent, upstream, SUCCEEDED};
use crate::errors::{AppError, AppResult};
use crate::state::AppState;

/// Maximum age of a signed event, in seconds.
pub const TOLERANCE_SECS: i64 = 300;

/// Verifies a `Stripe-Signature` header of the form `t=<unix>,v1=<hex>[,v1=<hex>…]`.
pub fn verify_signature(payload: &[u8], header: &str, secret: &str, now: i64) -> bool {
    let mut timestamp = None;
    let mut signatures = vec![];
    for part in header.split(',') {
        match part.trim().split_once('=') {
            Some(("t", v)) => timestamp = v.parse::<i64>().ok(),
            Some(("v1", v)) => signatures.push(v),
            _ => {}
        }
    }

    let Some(timestamp) = timestamp else {
        return false;
    };
    if (now - timestamp).abs() > TOLERANCE_SECS {
        return false;
    }

    signatures.into_iter().any(|sig| {
        let Ok(expected) = hex::decode(sig) else {
            return false;
        };
        let Ok(mut mac) = Hmac::<Sha256>::new_from_slice(secret.as_bytes()) else {
            return false;
        };
        mac.update(timestamp.to_string().as_bytes());
        mac.update(b".");
        mac.update(payload);
        mac.verify_slice(&expected).is_ok()
    })
}

#[derive(Debug, Deserialize)]
struct Event {
    id: String,
    #[serde(rename = "type")]
    kind: String,
    data: EventData,
}

#[derive(Debug, Deserialize)]
struct EventData {
    object: EventObject,
}

#[derive(Debug, Deserialize)]
struct EventObject {
    id: String,
}

/// Handles a provider event. Signature checks are skipped when no webhook
/// secret is configured; the intent is always re-read from the provider
/// before any booking is touched.
pub async fn handle_webhook(
    state: &AppState,
    payload: &[u8],
    signature: Option<&str>,
) -> AppResult<()> {
    let secret = &state.config.stripe_webhook_secret;
    if !secret.is_empty() {
        let signature = signature.ok_or_else(|| {
            tracing::warn!("missing Stripe-Signature header");
            AppError::Forbidden("Missing signature".to_string())
        })?;
        if !verify_signature(payload, signature, secret, chrono::Utc::now().timestamp()) {
            tracing::warn!("invalid Stripe signature");
            return Err(AppError::Forbidden("Invalid signature".to_string()));
        }
    }

    let event: Event = serde_json::from_slice(payload)
        .map_err(|e| AppError::Validation(format!("Invalid webhook payload: {e}")))?;

    if event.kind != "payment_intent.succeeded" {
        tracing::debug!(event_id = %event.id, kind = %event.kind, "ignoring webhook event");
        return Ok(());
    }

    let intent = state
        .gateway
        .retrieve_intent(&event.data.object.id)
        .await
        .map_err(upstream)?;
    if intent.status != SUCCEEDED {
        tracing::warn!(
            event_id = %event.id,
            payment_intent_id = %intent.id,
            status = %intent.status,
            "webhook intent not succeeded on retrieval"
        );
        return Ok(());
    }

    match reconcile_intent(state, &intent) {
        Ok(reconciled) => {
            tracing::info!(
                event_id = %event.id,
                booking_id = %reconciled.booking.id,
                applied = reconciled.applied,
                "webhook payment reconciled"
            );
            Ok(())
        }
        // A rejected payment will be rejected again on redelivery.
        Err(e) if e.status_code().is_client_error() => {
            tracing::warn!(
                event_id = %event.id,
                payment_intent_id = %intent.id,
                error = %e,
                "webhook payment not applied"
            );
            Ok(())
        }
        Err(e) => Err(e),
    }
}
