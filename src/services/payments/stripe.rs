use std::time::Duration;

use anyhow::Context;
use async_trait::async_trait;
use serde::Deserialize;

use super::{IntentRequest, PaymentGateway, PaymentIntent};

pub struct StripeGateway {
    secret_key: String,
    api_base: String,
    client: reqwest::Client,
}

impl StripeGateway {
    pub fn new(secret_key: String, api_base: String, timeout: Duration) -> anyhow::Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .context("failed to build HTTP client")?;

        Ok(Self {
            secret_key,
            api_base: api_base.trim_end_matches('/').to_string(),
            client,
        })
    }

    /// Sends the request built by `build`, retrying once on a timeout or
    /// connection failure. Any response from the provider is final.
    async fn send<F>(&self, what: &str, build: F) -> anyhow::Result<PaymentIntent>
    where
        F: Fn() -> reqwest::RequestBuilder,
    {
        let response = match build().send().await {
            Ok(resp) => resp,
            Err(e) if e.is_timeout() || e.is_connect() => {
                tracing::warn!(error = %e, "{what} failed, retrying once");
                build()
                    .send()
                    .await
                    .with_context(|| format!("failed to {what}"))?
            }
            Err(e) => return Err(e).with_context(|| format!("failed to {what}")),
        };

        let status = response.status();
        if !status.is_success() {
            let message = response
                .json::<ErrorBody>()
                .await
                .map(|body| body.error.message)
                .unwrap_or_else(|_| "no error message".to_string());
            anyhow::bail!("Stripe API returned {status} on {what}: {message}");
        }

        response
            .json::<PaymentIntent>()
            .await
            .with_context(|| format!("failed to parse Stripe response to {what}"))
    }
}

#[derive(Deserialize)]
struct ErrorBody {
    error: ErrorDetail,
}

#[derive(Deserialize)]
struct ErrorDetail {
    #[serde(default)]
    message: String,
}

fn intent_form(req: &IntentRequest) -> Vec<(String, String)> {
    let mut form = vec![
        ("amount".to_string(), req.amount.to_string()),
        ("currency".to_string(), req.currency.clone()),
        (
            "automatic_payment_methods[enabled]".to_string(),
            "true".to_string(),
        ),
    ];
    for (key, value) in &req.metadata {
        form.push((format!("metadata[{key}]"), value.clone()));
    }
    form
}

#[async_trait]
impl PaymentGateway for StripeGateway {
    async fn create_intent(&self, req: &IntentRequest) -> anyhow::Result<PaymentIntent> {
        let url = format!("{}/v1/payment_intents", self.api_base);
        let form = intent_form(req);

        self.send("create payment intent", || {
            self.client
                .post(&url)
                .basic_auth(&self.secret_key, None::<&str>)
                .header("Idempotency-Key", &req.idempotency_key)
                .form(&form)
        })
        .await
    }

    async fn retrieve_intent(&self, id: &str) -> anyhow::Result<PaymentIntent> {
        let url = format!("{}/v1/payment_intents/{id}", self.api_base);

        self.send("retrieve payment intent", || {
            self.client.get(&url).basic_auth(&self.secret_key, None::<&str>)
        })
        .await
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;

    use super::*;

    #[test]
    fn test_intent_form_encodes_metadata() {
        let req = IntentRequest {
            amount: 150_000,
            currency: "inr".to_string(),
            metadata: HashMap::from([("bookingId".to_string(), "b-1".to_string())]),
            idempotency_key: "key-1".to_string(),
        };
        let form = intent_form(&req);
        assert!(form.contains(&("amount".to_string(), "150000".to_string())));
        assert!(form.contains(&("metadata[bookingId]".to_string(), "b-1".to_string())));
    }

    #[test]
    fn test_new_trims_trailing_slash() {
        let gateway = StripeGateway::new(
            "sk_test".to_string(),
            "http://localhost:12111/".to_string(),
            Duration::from_secs(5),
        )
        .unwrap();
        assert_eq!(gateway.api_base, "http://localhost:12111");
    }
}
