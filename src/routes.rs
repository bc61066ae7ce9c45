use std::sync::Arc;

use axum::routing::{get, post, put};
use axum::Router;

use crate::handlers::{admin, auth, availability, bookings, health, payments};
use crate::state::AppState;

pub fn create_router(state: Arc<AppState>) -> Router {
    let auth_routes = Router::new()
        .route("/register", post(auth::register))
        .route("/login", post(auth::login));

    let booking_routes = Router::new()
        .route(
            "/",
            post(bookings::create_booking).get(bookings::list_bookings),
        )
        .route("/my-bookings", get(bookings::my_bookings))
        .route("/booked-dates", get(bookings::booked_dates))
        .route("/:id/status", put(bookings::update_status))
        .route("/:id/cancel", put(bookings::cancel_booking));

    let availability_routes = Router::new()
        .route("/", get(availability::get_range))
        .route("/check-slot", post(availability::check_slot))
        .route("/block", post(availability::block))
        .route("/unblock", post(availability::unblock))
        .route("/:date", get(availability::get_date));

    let payment_routes = Router::new()
        .route(
            "/create-payment-intent",
            post(payments::create_payment_intent),
        )
        .route("/confirm-payment", post(payments::confirm_payment))
        .route("/webhook", post(payments::webhook));

    // Role checks happen in the AdminUser extractor.
    let admin_routes = Router::new()
        .route("/login", post(auth::admin_login))
        .route("/dashboard", get(admin::get_dashboard))
        .route("/bookings", get(admin::get_bookings))
        .route("/bookings/bulk-status", put(admin::bulk_status))
        .route("/bookings/:id", get(admin::get_booking))
        .route("/bookings/:id/mark-paid", put(admin::mark_paid))
        .route("/payments", get(admin::get_payments))
        .route("/revenue", get(admin::get_revenue))
        .route("/blocked-dates", get(admin::get_blocked_dates));

    Router::new()
        .route("/health", get(health::health))
        .nest("/api/auth", auth_routes)
        .nest("/api/bookings", booking_routes)
        .nest("/api/availability", availability_routes)
        .nest("/api/payments", payment_routes)
        .nest("/api/admin", admin_routes)
        .with_state(state)
}
