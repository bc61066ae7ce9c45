use std::sync::{Arc, Mutex};
use std::time::Duration;

use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;
use tracing_subscriber::EnvFilter;

use mandabam::config::AppConfig;
use mandabam::db;
use mandabam::routes::create_router;
use mandabam::services::{self, auth};
use mandabam::services::payments::stripe::StripeGateway;
use mandabam::state::AppState;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let _ = dotenvy::dotenv();

    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| "info".into()))
        .init();

    let config = AppConfig::from_env();

    if config.stripe_secret_key.is_empty() {
        tracing::warn!("STRIPE_SECRET_KEY not set, payment calls will be rejected by the provider");
    }
    if config.stripe_webhook_secret.is_empty() {
        tracing::warn!("STRIPE_WEBHOOK_SECRET not set, webhook signatures will not be checked");
    }

    let conn = db::init_db(&config.database_url)?;
    auth::seed_admin(&conn, &config.admin_email, &config.admin_password, services::now())?;

    let gateway = StripeGateway::new(
        config.stripe_secret_key.clone(),
        config.stripe_api_base.clone(),
        Duration::from_secs(config.payment_timeout_secs),
    )?;

    tracing::info!(
        package_amount = config.policy.package_amount,
        min_advance = config.policy.min_advance,
        currency = %config.currency,
        "booking policy loaded"
    );

    let state = Arc::new(AppState {
        db: Arc::new(Mutex::new(conn)),
        config: config.clone(),
        gateway: Box::new(gateway),
    });

    let app = create_router(state)
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive());

    let addr = format!("0.0.0.0:{}", config.port);
    tracing::info!("starting server on {addr}");

    let listener = tokio::net::TcpListener::bind(&addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}
