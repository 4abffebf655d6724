use axum::{extract::State, Json};
use tracing::info;

use crate::{services::costing::RefreshSummary, ApiResponse, ApiResult, AppState};

/// Rebuild every Job Costing snapshot now
#[utoipa::path(
    post,
    path = "/api/v1/admin/job-costing/refresh",
    responses((status = 200, description = "Refresh finished", body = RefreshSummary)),
    tag = "admin"
)]
pub async fn refresh_job_costing(State(state): State<AppState>) -> ApiResult<RefreshSummary> {
    let summary = state.services.costing.refresh_all_job_costings().await?;
    info!(
        refreshed = summary.refreshed,
        failed = summary.failed,
        "manual job costing refresh"
    );
    Ok(Json(ApiResponse::success(summary)))
}
