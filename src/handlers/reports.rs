use axum::{
    extract::{Path, Query, State},
    Json,
};
use chrono::Utc;
use serde::Deserialize;
use tracing::info;
use utoipa::IntoParams;

use crate::{
    common::DateRangeParams,
    services::reports::{
        PartsConsumptionRow, ProfitabilityRow, RepeatRepairRow, Report, TimelinePoint,
        UtilizationRow, WipAgingRow,
    },
    ApiResponse, ApiResult, AppState,
};

#[derive(Debug, Default, Deserialize, IntoParams)]
#[into_params(parameter_in = Query)]
pub struct ProfitabilityQuery {
    pub customer: Option<String>,
}

#[derive(Debug, Default, Deserialize, IntoParams)]
#[into_params(parameter_in = Query)]
pub struct UtilizationQuery {
    pub from_date: Option<String>,
    pub to_date: Option<String>,
    pub employee: Option<String>,
}

#[derive(Debug, Default, Deserialize, IntoParams)]
#[into_params(parameter_in = Query)]
pub struct RepeatRepairsQuery {
    /// Look-back window in days; defaults to the configured window
    pub days: Option<u32>,
}

/// Revenue against cost per repair order
#[utoipa::path(
    get,
    path = "/api/v1/reports/job-profitability",
    params(ProfitabilityQuery),
    responses((status = 200, description = "Job profitability report")),
    tag = "reports"
)]
pub async fn job_profitability(
    State(state): State<AppState>,
    Query(query): Query<ProfitabilityQuery>,
) -> ApiResult<Report<ProfitabilityRow>> {
    let report = state
        .services
        .reports
        .job_profitability(query.customer.as_deref())
        .await?;
    info!(rows = report.rows.len(), "job profitability report generated");
    Ok(Json(ApiResponse::success(report)))
}

#[utoipa::path(
    get,
    path = "/api/v1/reports/parts-consumption",
    params(DateRangeParams),
    responses(
        (status = 200, description = "Parts issued to repair orders"),
        (status = 400, description = "Bad date", body = crate::errors::ErrorResponse)
    ),
    tag = "reports"
)]
pub async fn parts_consumption(
    State(state): State<AppState>,
    Query(range): Query<DateRangeParams>,
) -> ApiResult<Report<PartsConsumptionRow>> {
    let report = state.services.reports.parts_consumption(&range).await?;
    Ok(Json(ApiResponse::success(report)))
}

pub async fn technician_utilization(
    State(state): State<AppState>,
    Query(query): Query<UtilizationQuery>,
) -> ApiResult<Report<UtilizationRow>> {
    let range = DateRangeParams::new(query.from_date.as_deref(), query.to_date.as_deref());
    let report = state
        .services
        .reports
        .technician_utilization(&range, query.employee.as_deref())
        .await?;
    Ok(Json(ApiResponse::success(report)))
}

pub async fn wip_aging(State(state): State<AppState>) -> ApiResult<Report<WipAgingRow>> {
    let report = state.services.reports.wip_aging(Utc::now()).await?;
    Ok(Json(ApiResponse::success(report)))
}

pub async fn repeat_repairs(
    State(state): State<AppState>,
    Query(query): Query<RepeatRepairsQuery>,
) -> ApiResult<Report<RepeatRepairRow>> {
    let days = query
        .days
        .unwrap_or(state.config.repeat_repair_window_days);
    let report = state
        .services
        .reports
        .repeat_repairs(days, Utc::now())
        .await?;
    Ok(Json(ApiResponse::success(report)))
}

/// Repair orders per day for one vehicle over the last year
pub async fn vehicle_timeline(
    State(state): State<AppState>,
    Path(vehicle): Path<String>,
) -> ApiResult<Vec<TimelinePoint>> {
    let points = state
        .services
        .reports
        .vehicle_timeline(&vehicle, Utc::now())
        .await?;
    Ok(Json(ApiResponse::success(points)))
}
