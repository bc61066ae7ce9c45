use std::sync::Arc;

use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::Json;
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use super::auth::{AdminUser, CurrentUser};
use super::{parse_date, parse_status};
use super::extract::{ApiJson, ApiQuery};
use crate::db::queries::BookingFilter;
use crate::errors::AppResult;
use crate::models::{Booking, BookingStatus};
use crate::services::{self, bookings};
use crate::state::AppState;

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateBookingRequest {
    pub date: String,
    pub start_time: String,
    pub end_time: String,
    pub event_type: String,
    pub guest_count: i64,
    pub special_requirements: Option<String>,
    pub advance_amount: Option<i64>,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
pub struct BookingCreatedResponse {
    booking: Booking,
    remaining_amount: i64,
}

#[derive(Serialize)]
pub struct BookingResponse {
    booking: Booking,
}

#[derive(Serialize)]
pub struct BookingsResponse {
    bookings: Vec<Booking>,
}

// POST /api/bookings
pub async fn create_booking(
    State(state): State<Arc<AppState>>,
    CurrentUser(claims): CurrentUser,
    ApiJson(req): ApiJson<CreateBookingRequest>,
) -> AppResult<(StatusCode, Json<BookingCreatedResponse>)> {
    let new_booking = bookings::NewBooking {
        date: parse_date(&req.date)?,
        start_time: req.start_time,
        end_time: req.end_time,
        event_type: req.event_type,
        guest_count: req.guest_count,
        special_requirements: req.special_requirements,
        advance_amount: req.advance_amount,
    };

    let created = {
        let mut conn = state.conn()?;
        bookings::create_booking(
            &mut conn,
            &claims.sub,
            new_booking,
            &state.config.policy,
            services::now(),
        )?
    };

    Ok((
        StatusCode::CREATED,
        Json(BookingCreatedResponse {
            booking: created.booking,
            remaining_amount: created.remaining_amount,
        }),
    ))
}

// GET /api/bookings/my-bookings
pub async fn my_bookings(
    State(state): State<Arc<AppState>>,
    CurrentUser(claims): CurrentUser,
) -> AppResult<Json<BookingsResponse>> {
    let conn = state.conn()?;
    let bookings = bookings::my_bookings(&conn, &claims.sub)?;
    Ok(Json(BookingsResponse { bookings }))
}

#[derive(Deserialize)]
pub struct ListQuery {
    pub status: Option<String>,
    pub date: Option<String>,
}

// GET /api/bookings
pub async fn list_bookings(
    State(state): State<Arc<AppState>>,
    _admin: AdminUser,
    ApiQuery(query): ApiQuery<ListQuery>,
) -> AppResult<Json<BookingsResponse>> {
    let filter = BookingFilter {
        status: query.status.as_deref().map(parse_status).transpose()?,
        date: query.date.as_deref().map(parse_date).transpose()?,
        ..Default::default()
    };

    let conn = state.conn()?;
    let page = bookings::list_bookings(&conn, &filter)?;
    Ok(Json(BookingsResponse {
        bookings: page.bookings,
    }))
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
pub struct BookedDatesResponse {
    booked_dates: Vec<NaiveDate>,
}

// GET /api/bookings/booked-dates
pub async fn booked_dates(
    State(state): State<Arc<AppState>>,
) -> AppResult<Json<BookedDatesResponse>> {
    let conn = state.conn()?;
    let booked_dates = bookings::booked_dates(&conn)?;
    Ok(Json(BookedDatesResponse { booked_dates }))
}

#[derive(Deserialize)]
pub struct StatusRequest {
    pub status: String,
}

// PUT /api/bookings/:id/status
pub async fn update_status(
    State(state): State<Arc<AppState>>,
    AdminUser(claims): AdminUser,
    Path(id): Path<String>,
    ApiJson(req): ApiJson<StatusRequest>,
) -> AppResult<Json<BookingResponse>> {
    let next: BookingStatus = parse_status(&req.status)?;

    let booking = {
        let mut conn = state.conn()?;
        bookings::update_status(&mut conn, &id, next, &state.config.policy, services::now())?
    };

    tracing::info!(admin_id = %claims.sub, booking_id = %id, status = %next, "admin status update");
    Ok(Json(BookingResponse { booking }))
}

// PUT /api/bookings/:id/cancel
pub async fn cancel_booking(
    State(state): State<Arc<AppState>>,
    AdminUser(claims): AdminUser,
    Path(id): Path<String>,
) -> AppResult<Json<BookingResponse>> {
    let booking = {
        let mut conn = state.conn()?;
        bookings::cancel_booking(&mut conn, &id, &state.config.policy, services::now())?
    };

    tracing::info!(admin_id = %claims.sub, booking_id = %id, "booking cancelled");
    Ok(Json(BookingResponse { booking }))
}
