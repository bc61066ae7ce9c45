use std::env;

/// Pricing rules applied to every booking.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct BookingPolicy {
    /// Fixed package price, in currency major units.
    pub package_amount: i64,
    /// Accumulated payment needed before a pending booking is confirmed.
    pub min_advance: i64,
}

impl Default for BookingPolicy {
    fn default() -> Self {
        Self {
            package_amount: 20_000,
            min_advance: 1_000,
        }
    }
}

#[derive(Clone, Debug)]
pub struct AppConfig {
    pub port: u16,
    pub database_url: String,
    pub jwt_secret: String,
    pub jwt_expiration_hours: i64,
    pub admin_email: String,
    pub admin_password: String,
    pub stripe_secret_key: String,
    pub stripe_webhook_secret: String,
    pub stripe_api_base: String,
    pub currency: String,
    pub payment_timeout_secs: u64,
    pub policy: BookingPolicy,
}

impl AppConfig {
    pub fn from_env() -> Self {
        let defaults = BookingPolicy::default();
        Self {
            port: env::var("PORT")
                .ok()
                .and_then(|v| v.parse().ok())
                .unwrap_or(5000),
            database_url: env::var("DATABASE_URL").unwrap_or_else(|_| "mandabam.db".to_string()),
            jwt_secret: env::var("JWT_SECRET").unwrap_or_else(|_| "changeme".to_string()),
            jwt_expiration_hours: env::var("JWT_EXPIRATION_HOURS")
                .ok()
                .and_then(|v| v.parse().ok())
                .unwrap_or(24 * 7),
            admin_email: env::var("ADMIN_EMAIL")
                .unwrap_or_else(|_| "admin@mandabam.com".to_string()),
            admin_password: env::var("ADMIN_PASSWORD").unwrap_or_default(),
            stripe_secret_key: env::var("STRIPE_SECRET_KEY").unwrap_or_default(),
            stripe_webhook_secret: env::var("STRIPE_WEBHOOK_SECRET").unwrap_or_default(),
            stripe_api_base: env::var("STRIPE_API_BASE")
                .unwrap_or_else(|_| "https://api.stripe.com".to_string()),
            currency: env::var("PAYMENT_CURRENCY").unwrap_or_else(|_| "inr".to_string()),
            payment_timeout_secs: env::var("PAYMENT_TIMEOUT_SECS")
                .ok()
                .and_then(|v| v.parse().ok())
                .unwrap_or(10),
            policy: BookingPolicy {
                package_amount: env::var("PACKAGE_AMOUNT")
                    .ok()
                    .and_then(|v| v.parse().ok())
                    .unwrap_or(defaults.package_amount),
                min_advance: env::var("MIN_ADVANCE")
                    .ok()
                    .and_then(|v| v.parse().ok())
                    .unwrap_or(defaults.min_advance),
            },
        }
    }
}
