use std::sync::Arc;

use axum::extract::{Path, State};
use axum::Json;
use serde::{Deserialize, Serialize};

use super::auth::AdminUser;
use super::parse_date;
use super::extract::{ApiJson, ApiQuery};
use crate::errors::{AppError, AppResult};
use crate::models::DayAvailability;
use crate::services::availability::{self, SlotCheck};
use crate::state::AppState;

#[derive(Serialize)]
pub struct DataResponse<T> {
    data: T,
}

#[derive(Serialize)]
pub struct MessageResponse {
    message: String,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RangeQuery {
    pub start_date: Option<String>,
    pub end_date: Option<String>,
}

// GET /api/availability?startDate=..&endDate=..
pub async fn get_range(
    State(state): State<Arc<AppState>>,
    ApiQuery(query): ApiQuery<RangeQuery>,
) -> AppResult<Json<DataResponse<Vec<DayAvailability>>>> {
    let (Some(start), Some(end)) = (query.start_date, query.end_date) else {
        return Err(AppError::Validation(
            "Start date and end date are required".to_string(),
        ));
    };
    let (start, end) = (parse_date(&start)?, parse_date(&end)?);

    let mut conn = state.conn()?;
    let data = availability::get_availability(&mut conn, start, end)?;
    Ok(Json(DataResponse { data }))
}

// GET /api/availability/:date
pub async fn get_date(
    State(state): State<Arc<AppState>>,
    Path(date): Path<String>,
) -> AppResult<Json<DataResponse<DayAvailability>>> {
    let date = parse_date(&date)?;
    let conn = state.conn()?;
    let data = availability::get_date_availability(&conn, date)?;
    Ok(Json(DataResponse { data }))
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CheckSlotRequest {
    pub date: String,
    pub start_time: String,
    pub end_time: String,
}

// POST /api/availability/check-slot
pub async fn check_slot(
    State(state): State<Arc<AppState>>,
    ApiJson(req): ApiJson<CheckSlotRequest>,
) -> AppResult<Json<SlotCheck>> {
    let date = parse_date(&req.date)?;
    let conn = state.conn()?;
    let check = availability::check_time_slot(&conn, date, &req.start_time, &req.end_time)?;
    Ok(Json(check))
}

#[derive(Deserialize)]
pub struct BlockRequest {
    pub date: String,
    pub reason: Option<String>,
}

// POST /api/availability/block
pub async fn block(
    State(state): State<Arc<AppState>>,
    AdminUser(claims): AdminUser,
    ApiJson(req): ApiJson<BlockRequest>,
) -> AppResult<Json<MessageResponse>> {
    let date = parse_date(&req.date)?;
    let reason = req.reason.filter(|r| !r.trim().is_empty());
    {
        let mut conn = state.conn()?;
        availability::block_date(&mut conn, date, reason)?;
    }

    tracing::info!(admin_id = %claims.sub, %date, "admin blocked date");
    Ok(Json(MessageResponse {
        message: "Date blocked successfully".to_string(),
    }))
}

#[derive(Deserialize)]
pub struct UnblockRequest {
    pub date: String,
}

// POST /api/availability/unblock
pub async fn unblock(
    State(state): State<Arc<AppState>>,
    AdminUser(claims): AdminUser,
    ApiJson(req): ApiJson<UnblockRequest>,
) -> AppResult<Json<MessageResponse>> {
    let date = parse_date(&req.date)?;
    {
        let conn = state.conn()?;
        availability::unblock_date(&conn, date)?;
    }

    tracing::info!(admin_id = %claims.sub, %date, "admin unblocked date");
    Ok(Json(MessageResponse {
        message: "Date unblocked successfully".to_string(),
    }))
}
