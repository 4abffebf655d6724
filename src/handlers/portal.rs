use axum::{
    extract::{Path, State},
    Json,
};

use crate::{services::repair_orders::RepairStatusPage, ApiResponse, ApiResult, AppState};

/// Public repair status by repair order name
#[utoipa::path(
    get,
    path = "/api/v1/portal/repair-status/{name}",
    params(("name" = String, Path, description = "Repair order name, e.g. RO-1a2b3c4d")),
    responses(
        (status = 200, description = "Repair status", body = RepairStatusPage),
        (status = 404, description = "Unknown repair order", body = crate::errors::ErrorResponse)
    ),
    tag = "portal"
)]
pub async fn repair_status(
    State(state): State<AppState>,
    Path(name): Path<String>,
) -> ApiResult<RepairStatusPage> {
    let page = state.services.repair_orders.repair_status(&name).await?;
    Ok(Json(ApiResponse::success(page)))
}
