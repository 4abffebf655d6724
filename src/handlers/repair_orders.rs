use axum::{
    extract::{Path, Query, State},
    Json,
};
use uuid::Uuid;

use super::common::{created, paginate, Created};
use crate::{
    entities::{customer_update, job_costing, repair_order},
    services::{
        documents::{MaterialRequestWithItems, QuotationWithItems},
        repair_orders::{
            ApplyTemplateRequest, CustomerUpdateRequest, ListRepairOrdersQuery,
            RepairOrderDetail, RepairOrderRequest, SetStatusRequest, UpdateAfterSubmitRequest,
        },
    },
    ApiResponse, ApiResult, AppState, PaginatedResponse,
};

/// Create a draft repair order
#[utoipa::path(
    post,
    path = "/api/v1/repair-orders",
    request_body = RepairOrderRequest,
    responses(
        (status = 201, description = "Draft created", body = RepairOrderDetail),
        (status = 400, description = "Validation failed", body = crate::errors::ErrorResponse)
    ),
    tag = "repair-orders"
)]
pub async fn create_repair_order(
    State(state): State<AppState>,
    Json(payload): Json<RepairOrderRequest>,
) -> Created<RepairOrderDetail> {
    let detail = state
        .services
        .repair_orders
        .create_repair_order(payload)
        .await?;
    Ok(created(detail))
}

/// List repair orders
#[utoipa::path(
    get,
    path = "/api/v1/repair-orders",
    params(ListRepairOrdersQuery),
    responses((status = 200, description = "One page of repair orders")),
    tag = "repair-orders"
)]
pub async fn list_repair_orders(
    State(state): State<AppState>,
    Query(query): Query<ListRepairOrdersQuery>,
) -> ApiResult<PaginatedResponse<repair_order::Model>> {
    let (items, total) = state
        .services
        .repair_orders
        .list_repair_orders(&query)
        .await?;
    let page = query.page.unwrap_or(1).max(1);
    let limit = query.limit.unwrap_or(20).clamp(1, 200);
    Ok(Json(ApiResponse::success(paginate(items, total, page, limit))))
}

/// Get a repair order with its operations, parts plan and checklist
#[utoipa::path(
    get,
    path = "/api/v1/repair-orders/{id}",
    params(("id" = Uuid, Path, description = "Repair order id")),
    responses(
        (status = 200, description = "Repair order", body = RepairOrderDetail),
        (status = 404, description = "Not found", body = crate::errors::ErrorResponse)
    ),
    tag = "repair-orders"
)]
pub async fn get_repair_order(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> ApiResult<RepairOrderDetail> {
    let detail = state.services.repair_orders.get_repair_order(id).await?;
    Ok(Json(ApiResponse::success(detail)))
}

/// Replace a draft repair order
pub async fn update_repair_order(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    Json(payload): Json<RepairOrderRequest>,
) -> ApiResult<RepairOrderDetail> {
    let detail = state
        .services
        .repair_orders
        .update_repair_order(id, payload)
        .await?;
    Ok(Json(ApiResponse::success(detail)))
}

/// Edit a submitted repair order
#[utoipa::path(
    patch,
    path = "/api/v1/repair-orders/{id}",
    params(("id" = Uuid, Path, description = "Repair order id")),
    request_body = UpdateAfterSubmitRequest,
    responses(
        (status = 200, description = "Updated", body = RepairOrderDetail),
        (status = 400, description = "Guard or validation failure", body = crate::errors::ErrorResponse)
    ),
    tag = "repair-orders"
)]
pub async fn update_after_submit(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    Json(payload): Json<UpdateAfterSubmitRequest>,
) -> ApiResult<RepairOrderDetail> {
    let detail = state
        .services
        .repair_orders
        .update_after_submit(id, payload)
        .await?;
    Ok(Json(ApiResponse::success(detail)))
}

/// Submit a draft repair order
#[utoipa::path(
    post,
    path = "/api/v1/repair-orders/{id}/submit",
    params(("id" = Uuid, Path, description = "Repair order id")),
    responses(
        (status = 200, description = "Submitted", body = RepairOrderDetail),
        (status = 400, description = "Not a draft", body = crate::errors::ErrorResponse)
    ),
    tag = "repair-orders"
)]
pub async fn submit_repair_order(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> ApiResult<RepairOrderDetail> {
    let detail = state.services.repair_orders.submit_repair_order(id).await?;
    Ok(Json(ApiResponse::success(detail)))
}

pub async fn cancel_repair_order(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> ApiResult<RepairOrderDetail> {
    let detail = state.services.repair_orders.cancel_repair_order(id).await?;
    Ok(Json(ApiResponse::success(detail)))
}

/// Manually set Scheduled, On Hold or Cancelled
#[utoipa::path(
    post,
    path = "/api/v1/repair-orders/{id}/status",
    params(("id" = Uuid, Path, description = "Repair order id")),
    request_body = SetStatusRequest,
    responses(
        (status = 200, description = "Status changed", body = RepairOrderDetail),
        (status = 400, description = "Status not allowed", body = crate::errors::ErrorResponse)
    ),
    tag = "repair-orders"
)]
pub async fn set_status(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    Json(payload): Json<SetStatusRequest>,
) -> ApiResult<RepairOrderDetail> {
    let detail = state
        .services
        .repair_orders
        .set_status(id, &payload.status)
        .await?;
    Ok(Json(ApiResponse::success(detail)))
}

pub async fn apply_template(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    Json(payload): Json<ApplyTemplateRequest>,
) -> ApiResult<RepairOrderDetail> {
    let detail = state
        .services
        .repair_orders
        .apply_service_template(id, payload.template_id)
        .await?;
    Ok(Json(ApiResponse::success(detail)))
}

/// Draft a quotation from the repair order
pub async fn make_quotation(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Created<QuotationWithItems> {
    let quotation = state.services.mapping.make_quotation(id).await?;
    Ok(created(quotation))
}

/// Draft a Material Issue request for the billable parts
pub async fn make_material_request(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Created<MaterialRequestWithItems> {
    let request = state.services.mapping.make_material_request(id).await?;
    Ok(created(request))
}

pub async fn add_customer_update(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    Json(payload): Json<CustomerUpdateRequest>,
) -> Created<customer_update::Model> {
    let update = state
        .services
        .repair_orders
        .add_customer_update(id, payload)
        .await?;
    Ok(created(update))
}

pub async fn get_job_costing(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> ApiResult<job_costing::Model> {
    let snapshot = state.services.costing.get_job_costing(id).await?;
    Ok(Json(ApiResponse::success(snapshot)))
}
