use std::sync::Arc;

use axum::extract::{Path, State};
use axum::Json;
use chrono::Datelike;
use serde::{Deserialize, Serialize};

use super::auth::AdminUser;
use super::{parse_date, parse_status};
use super::extract::{ApiJson, ApiQuery};
use crate::db::queries::{self, BookingFilter};
use crate::errors::{AppError, AppResult};
use crate::models::{AvailabilityRecord, Booking, Payment};
use crate::services::dashboard::{self, Dashboard, RevenuePeriod, RevenueReport};
use crate::services::{self, availability, bookings, reconciliation};
use crate::state::AppState;

const DEFAULT_PAGE_SIZE: i64 = 20;
const MAX_PAGE_SIZE: i64 = 100;

// GET /api/admin/dashboard
pub async fn get_dashboard(
    State(state): State<Arc<AppState>>,
    _admin: AdminUser,
) -> AppResult<Json<Dashboard>> {
    let conn = state.conn()?;
    let dash = dashboard::dashboard(&conn, services::now())?;
    Ok(Json(dash))
}

// GET /api/admin/bookings
#[derive(Deserialize)]
pub struct BookingsQuery {
    pub status: Option<String>,
    pub date: Option<String>,
    pub page: Option<i64>,
    pub limit: Option<i64>,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Pagination {
    page: i64,
    limit: i64,
    total: i64,
    total_pages: i64,
}

#[derive(Serialize)]
pub struct PagedBookingsResponse {
    bookings: Vec<Booking>,
    pagination: Pagination,
}

pub async fn get_bookings(
    State(state): State<Arc<AppState>>,
    _admin: AdminUser,
    ApiQuery(query): ApiQuery<BookingsQuery>,
) -> AppResult<Json<PagedBookingsResponse>> {
    let page = query.page.unwrap_or(1).max(1);
    let limit = query.limit.unwrap_or(DEFAULT_PAGE_SIZE).clamp(1, MAX_PAGE_SIZE);
    let offset = (page - 1)
        .checked_mul(limit)
        .ok_or_else(|| AppError::Validation(format!("Invalid page: {page}")))?;

    let filter = BookingFilter {
        status: query.status.as_deref().map(parse_status).transpose()?,
        date: query.date.as_deref().map(parse_date).transpose()?,
        limit: Some(limit),
        offset,
    };

    let result = {
        let conn = state.conn()?;
        bookings::list_bookings(&conn, &filter)?
    };

    Ok(Json(PagedBookingsResponse {
        bookings: result.bookings,
        pagination: Pagination {
            page,
            limit,
            total: result.total,
            total_pages: (result.total + limit - 1) / limit,
        },
    }))
}

// GET /api/admin/bookings/:id
#[derive(Serialize)]
pub struct BookingDetailResponse {
    booking: Booking,
    payments: Vec<Payment>,
}

pub async fn get_booking(
    State(state): State<Arc<AppState>>,
    _admin: AdminUser,
    Path(id): Path<String>,
) -> AppResult<Json<BookingDetailResponse>> {
    let conn = state.conn()?;
    let booking = bookings::get_booking(&conn, &id)?;
    let payments = queries::get_payments_for_booking(&conn, &id)?;
    Ok(Json(BookingDetailResponse { booking, payments }))
}

// PUT /api/admin/bookings/:id/mark-paid
#[derive(Serialize)]
pub struct BookingResponse {
    booking: Booking,
}

pub async fn mark_paid(
    State(state): State<Arc<AppState>>,
    AdminUser(claims): AdminUser,
    Path(id): Path<String>,
) -> AppResult<Json<BookingResponse>> {
    let reconciled = {
        let mut conn = state.conn()?;
        reconciliation::mark_fully_paid(&mut conn, &id, &state.config.policy, services::now())?
    };

    tracing::info!(
        admin_id = %claims.sub,
        booking_id = %id,
        amount = reconciled.payment.amount,
        "booking marked fully paid"
    );
    Ok(Json(BookingResponse {
        booking: reconciled.booking,
    }))
}

// PUT /api/admin/bookings/bulk-status
#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BulkStatusRequest {
    pub booking_ids: Vec<String>,
    pub status: String,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
pub struct BulkStatusResponse {
    modified_count: usize,
}

pub async fn bulk_status(
    State(state): State<Arc<AppState>>,
    AdminUser(claims): AdminUser,
    ApiJson(req): ApiJson<BulkStatusRequest>,
) -> AppResult<Json<BulkStatusResponse>> {
    let next = parse_status(&req.status)?;

    let modified_count = {
        let mut conn = state.conn()?;
        bookings::bulk_update_status(
            &mut conn,
            &req.booking_ids,
            next,
            &state.config.policy,
            services::now(),
        )?
    };

    tracing::info!(admin_id = %claims.sub, modified_count, status = %next, "bulk status update");
    Ok(Json(BulkStatusResponse { modified_count }))
}

// GET /api/admin/payments
#[derive(Deserialize)]
pub struct PaymentsQuery {
    pub limit: Option<i64>,
}

#[derive(Serialize)]
pub struct PaymentsResponse {
    payments: Vec<Payment>,
}

pub async fn get_payments(
    State(state): State<Arc<AppState>>,
    _admin: AdminUser,
    ApiQuery(query): ApiQuery<PaymentsQuery>,
) -> AppResult<Json<PaymentsResponse>> {
    let conn = state.conn()?;
    let payments = queries::get_payments(&conn, query.limit)?;
    Ok(Json(PaymentsResponse { payments }))
}

// GET /api/admin/revenue
#[derive(Deserialize)]
pub struct RevenueQuery {
    pub period: Option<String>,
    pub year: Option<i32>,
}

pub async fn get_revenue(
    State(state): State<Arc<AppState>>,
    _admin: AdminUser,
    ApiQuery(query): ApiQuery<RevenueQuery>,
) -> AppResult<Json<RevenueReport>> {
    let period = match query.period.as_deref() {
        None => RevenuePeriod::default(),
        Some(p) => RevenuePeriod::parse(p)
            .ok_or_else(|| AppError::Validation(format!("Invalid period: {p}")))?,
    };
    let year = query.year.unwrap_or_else(|| services::now().year());

    let conn = state.conn()?;
    let report = dashboard::revenue_report(&conn, period, year)?;
    Ok(Json(report))
}

// GET /api/admin/blocked-dates
#[derive(Serialize)]
pub struct BlockedDatesResponse {
    blocked: Vec<AvailabilityRecord>,
}

pub async fn get_blocked_dates(
    State(state): State<Arc<AppState>>,
    _admin: AdminUser,
) -> AppResult<Json<BlockedDatesResponse>> {
    let conn = state.conn()?;
    let blocked = availability::list_blocked(&conn)?;
    Ok(Json(BlockedDatesResponse { blocked }))
}
