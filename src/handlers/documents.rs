use axum::{
    extract::{Path, State},
    Json,
};
use uuid::Uuid;

use super::common::{created, Created};
use crate::{
    entities::{
        material_request, purchase_invoice, quotation, sales_invoice, sales_order, stock_entry,
        task, timesheet,
    },
    services::documents::{
        PaymentRequest, PurchaseInvoiceRequest, QuotationRequest, QuotationWithItems,
        SalesInvoiceRequest, SalesInvoiceWithItems, SalesOrderRequest, SalesOrderWithItems,
        StockEntryRequest, StockEntryWithItems, TaskStatusRequest, TimesheetRequest,
        TimesheetWithLogs,
    },
    ApiResponse, ApiResult, AppState,
};

// Timesheets

/// Record time logged against a repair order
#[utoipa::path(
    post,
    path = "/api/v1/timesheets",
    request_body = TimesheetRequest,
    responses(
        (status = 201, description = "Draft timesheet", body = TimesheetWithLogs),
        (status = 400, description = "Validation failed", body = crate::errors::ErrorResponse)
    ),
    tag = "documents"
)]
pub async fn create_timesheet(
    State(state): State<AppState>,
    Json(payload): Json<TimesheetRequest>,
) -> Created<TimesheetWithLogs> {
    let sheet = state.services.documents.create_timesheet(payload).await?;
    Ok(created(sheet))
}

pub async fn submit_timesheet(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> ApiResult<timesheet::Model> {
    let sheet = state.services.documents.submit_timesheet(id).await?;
    Ok(Json(ApiResponse::success(sheet)))
}

pub async fn cancel_timesheet(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> ApiResult<timesheet::Model> {
    let sheet = state.services.documents.cancel_timesheet(id).await?;
    Ok(Json(ApiResponse::success(sheet)))
}

// Purchase invoices

pub async fn create_purchase_invoice(
    State(state): State<AppState>,
    Json(payload): Json<PurchaseInvoiceRequest>,
) -> Created<purchase_invoice::Model> {
    let invoice = state
        .services
        .documents
        .create_purchase_invoice(payload)
        .await?;
    Ok(created(invoice))
}

pub async fn submit_purchase_invoice(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> ApiResult<purchase_invoice::Model> {
    let invoice = state.services.documents.submit_purchase_invoice(id).await?;
    Ok(Json(ApiResponse::success(invoice)))
}

pub async fn cancel_purchase_invoice(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> ApiResult<purchase_invoice::Model> {
    let invoice = state.services.documents.cancel_purchase_invoice(id).await?;
    Ok(Json(ApiResponse::success(invoice)))
}

// Quotations

pub async fn create_quotation(
    State(state): State<AppState>,
    Json(payload): Json<QuotationRequest>,
) -> Created<QuotationWithItems> {
    let doc = state.services.documents.create_quotation(payload).await?;
    Ok(created(doc))
}

pub async fn get_quotation(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> ApiResult<QuotationWithItems> {
    let doc = state.services.documents.get_quotation(id).await?;
    Ok(Json(ApiResponse::success(doc)))
}

pub async fn submit_quotation(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> ApiResult<quotation::Model> {
    let doc = state.services.documents.submit_quotation(id).await?;
    Ok(Json(ApiResponse::success(doc)))
}

pub async fn cancel_quotation(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> ApiResult<quotation::Model> {
    let doc = state.services.documents.cancel_quotation(id).await?;
    Ok(Json(ApiResponse::success(doc)))
}

/// Draft a sales order from a submitted quotation
pub async fn make_sales_order(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Created<SalesOrderWithItems> {
    let doc = state.services.mapping.make_sales_order(id).await?;
    Ok(created(doc))
}

// Sales orders

pub async fn create_sales_order(
    State(state): State<AppState>,
    Json(payload): Json<SalesOrderRequest>,
) -> Created<SalesOrderWithItems> {
    let doc = state.services.documents.create_sales_order(payload).await?;
    Ok(created(doc))
}

pub async fn submit_sales_order(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> ApiResult<sales_order::Model> {
    let doc = state.services.documents.submit_sales_order(id).await?;
    Ok(Json(ApiResponse::success(doc)))
}

pub async fn cancel_sales_order(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> ApiResult<sales_order::Model> {
    let doc = state.services.documents.cancel_sales_order(id).await?;
    Ok(Json(ApiResponse::success(doc)))
}

/// Draft a sales invoice from a submitted sales order
pub async fn make_sales_invoice(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Created<SalesInvoiceWithItems> {
    let doc = state.services.mapping.make_sales_invoice(id).await?;
    Ok(created(doc))
}

// Sales invoices

pub async fn create_sales_invoice(
    State(state): State<AppState>,
    Json(payload): Json<SalesInvoiceRequest>,
) -> Created<SalesInvoiceWithItems> {
    let doc = state.services.documents.create_sales_invoice(payload).await?;
    Ok(created(doc))
}

pub async fn get_sales_invoice(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> ApiResult<SalesInvoiceWithItems> {
    let doc = state.services.documents.get_sales_invoice(id).await?;
    Ok(Json(ApiResponse::success(doc)))
}

/// Submit a sales invoice; a linked repair order moves to Invoiced
#[utoipa::path(
    post,
    path = "/api/v1/sales-invoices/{id}/submit",
    params(("id" = Uuid, Path, description = "Sales invoice id")),
    responses(
        (status = 200, description = "Submitted", body = sales_invoice::Model),
        (status = 400, description = "Not a draft", body = crate::errors::ErrorResponse)
    ),
    tag = "documents"
)]
pub async fn submit_sales_invoice(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> ApiResult<sales_invoice::Model> {
    let doc = state.services.documents.submit_sales_invoice(id).await?;
    Ok(Json(ApiResponse::success(doc)))
}

pub async fn cancel_sales_invoice(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> ApiResult<sales_invoice::Model> {
    let doc = state.services.documents.cancel_sales_invoice(id).await?;
    Ok(Json(ApiResponse::success(doc)))
}

pub async fn record_payment(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    Json(payload): Json<PaymentRequest>,
) -> ApiResult<sales_invoice::Model> {
    let doc = state
        .services
        .documents
        .record_payment(id, payload.amount)
        .await?;
    Ok(Json(ApiResponse::success(doc)))
}

// Stock entries

pub async fn create_stock_entry(
    State(state): State<AppState>,
    Json(payload): Json<StockEntryRequest>,
) -> Created<StockEntryWithItems> {
    let entry = state.services.documents.create_stock_entry(payload).await?;
    Ok(created(entry))
}

pub async fn submit_stock_entry(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> ApiResult<stock_entry::Model> {
    let entry = state.services.documents.submit_stock_entry(id).await?;
    Ok(Json(ApiResponse::success(entry)))
}

pub async fn cancel_stock_entry(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> ApiResult<stock_entry::Model> {
    let entry = state.services.documents.cancel_stock_entry(id).await?;
    Ok(Json(ApiResponse::success(entry)))
}

pub async fn submit_material_request(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> ApiResult<material_request::Model> {
    let request = state.services.documents.submit_material_request(id).await?;
    Ok(Json(ApiResponse::success(request)))
}

// Tasks

pub async fn get_task(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> ApiResult<task::Model> {
    let task = state.services.documents.get_task(id).await?;
    Ok(Json(ApiResponse::success(task)))
}

/// Change a task's status
#[utoipa::path(
    put,
    path = "/api/v1/tasks/{id}/status",
    params(("id" = Uuid, Path, description = "Task id")),
    request_body = TaskStatusRequest,
    responses(
        (status = 200, description = "Task updated", body = task::Model),
        (status = 404, description = "Not found", body = crate::errors::ErrorResponse)
    ),
    tag = "documents"
)]
pub async fn set_task_status(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    Json(payload): Json<TaskStatusRequest>,
) -> ApiResult<task::Model> {
    let task = state
        .services
        .documents
        .set_task_status(id, payload.status)
        .await?;
    Ok(Json(ApiResponse::success(task)))
}
