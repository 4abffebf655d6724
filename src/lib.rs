//! Repair shop API library
//!
//! Repair orders, their linked commercial documents, cost tracking, Job Costing
//! snapshots and the workshop reports.
#![forbid(unsafe_code)]
#![deny(rust_2018_idioms)]
#![allow(elided_lifetimes_in_paths)]
#![warn(clippy::all, clippy::perf, clippy::dbg_macro)]

pub mod common;
pub mod config;
pub mod db;
pub mod entities;
pub mod errors;
pub mod events;
pub mod handlers;
pub mod middleware_helpers;
pub mod migrator;
pub mod openapi;
pub mod services;
pub mod tracing;

use axum::{
    extract::State,
    middleware,
    response::Json,
    routing::{get, post, put},
    Router,
};
use chrono::Utc;
use sea_orm::DatabaseConnection;
use serde::Serialize;
use serde_json::{json, Value};
use std::sync::Arc;
use utoipa::{OpenApi, ToSchema};

// App state definition
#[derive(Clone)]
pub struct AppState {
    pub db: Arc<DatabaseConnection>,
    pub config: config::AppConfig,
    pub event_sender: events::EventSender,
    pub services: handlers::AppServices,
}

impl AppState {
    pub fn new(
        db: Arc<DatabaseConnection>,
        config: config::AppConfig,
        event_sender: events::EventSender,
    ) -> Self {
        let services = handlers::AppServices::new(db.clone(), event_sender.clone(), &config);
        Self {
            db,
            config,
            event_sender,
            services,
        }
    }
}

// Common response wrappers
#[derive(Serialize, ToSchema)]
pub struct ApiResponse<T> {
    pub success: bool,
    pub data: Option<T>,
    pub message: Option<String>,
    pub errors: Option<Vec<String>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub meta: Option<ResponseMeta>,
}

#[derive(Serialize, ToSchema)]
pub struct ResponseMeta {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub request_id: Option<String>,
    pub timestamp: String,
}

impl ResponseMeta {
    fn capture() -> Self {
        Self {
            request_id: crate::tracing::current_request_id().map(|rid| rid.as_str().to_string()),
            timestamp: Utc::now().to_rfc3339(),
        }
    }
}

#[derive(Serialize, ToSchema)]
pub struct PaginatedResponse<T> {
    pub items: Vec<T>,
    pub total: u64,
    pub page: u64,
    pub limit: u64,
    pub total_pages: u64,
}

impl<T> ApiResponse<T> {
    pub fn success(data: T) -> Self {
        Self {
            success: true,
            data: Some(data),
            message: None,
            errors: None,
            meta: Some(ResponseMeta::capture()),
        }
    }

    pub fn error(message: String) -> Self {
        Self {
            success: false,
            data: None,
            message: Some(message),
            errors: None,
            meta: Some(ResponseMeta::capture()),
        }
    }
}

#[cfg(test)]
mod response_tests {
    use super::*;
    use chrono::DateTime;

    #[tokio::test]
    async fn success_response_includes_request_metadata() {
        let response =
            crate::tracing::scope_request_id(crate::tracing::RequestId::new("meta-123"), async {
                ApiResponse::success("ok")
            })
            .await;

        let meta = response.meta.expect("metadata expected");
        assert_eq!(meta.request_id.as_deref(), Some("meta-123"));
        DateTime::parse_from_rfc3339(&meta.timestamp).expect("timestamp should parse");
    }

    #[tokio::test]
    async fn error_response_outside_a_request_has_no_request_id() {
        let response = ApiResponse::<()>::error("oops".into());

        assert!(!response.success);
        let meta = response.meta.expect("metadata expected");
        assert!(meta.request_id.is_none());
        assert!(!meta.timestamp.is_empty());
    }
}

/// Standard API result type for JSON responses
pub type ApiResult<T> = Result<Json<ApiResponse<T>>, errors::ServiceError>;

pub fn api_v1_routes() -> Router<AppState> {
    use handlers::{admin, documents, masters, portal, repair_orders, reports};

    let repair_order_routes = Router::new()
        .route(
            "/repair-orders",
            post(repair_orders::create_repair_order).get(repair_orders::list_repair_orders),
        )
        .route(
            "/repair-orders/:id",
            get(repair_orders::get_repair_order)
                .put(repair_orders::update_repair_order)
                .patch(repair_orders::update_after_submit),
        )
        .route(
            "/repair-orders/:id/submit",
            post(repair_orders::submit_repair_order),
        )
        .route(
            "/repair-orders/:id/cancel",
            post(repair_orders::cancel_repair_order),
        )
        .route("/repair-orders/:id/status", post(repair_orders::set_status))
        .route(
            "/repair-orders/:id/apply-template",
            post(repair_orders::apply_template),
        )
        .route(
            "/repair-orders/:id/quotation",
            post(repair_orders::make_quotation),
        )
        .route(
            "/repair-orders/:id/material-request",
            post(repair_orders::make_material_request),
        )
        .route(
            "/repair-orders/:id/updates",
            post(repair_orders::add_customer_update),
        )
        .route(
            "/repair-orders/:id/job-costing",
            get(repair_orders::get_job_costing),
        );

    let document_routes = Router::new()
        .route("/timesheets", post(documents::create_timesheet))
        .route("/timesheets/:id/submit", post(documents::submit_timesheet))
        .route("/timesheets/:id/cancel", post(documents::cancel_timesheet))
        .route("/purchase-invoices", post(documents::create_purchase_invoice))
        .route(
            "/purchase-invoices/:id/submit",
            post(documents::submit_purchase_invoice),
        )
        .route(
            "/purchase-invoices/:id/cancel",
            post(documents::cancel_purchase_invoice),
        )
        .route("/quotations", post(documents::create_quotation))
        .route("/quotations/:id", get(documents::get_quotation))
        .route("/quotations/:id/submit", post(documents::submit_quotation))
        .route("/quotations/:id/cancel", post(documents::cancel_quotation))
        .route(
            "/quotations/:id/sales-order",
            post(documents::make_sales_order),
        )
        .route("/sales-orders", post(documents::create_sales_order))
        .route("/sales-orders/:id/submit", post(documents::submit_sales_order))
        .route("/sales-orders/:id/cancel", post(documents::cancel_sales_order))
        .route(
            "/sales-orders/:id/sales-invoice",
            post(documents::make_sales_invoice),
        )
        .route("/sales-invoices", post(documents::create_sales_invoice))
        .route("/sales-invoices/:id", get(documents::get_sales_invoice))
        .route(
            "/sales-invoices/:id/submit",
            post(documents::submit_sales_invoice),
        )
        .route(
            "/sales-invoices/:id/cancel",
            post(documents::cancel_sales_invoice),
        )
        .route(
            "/sales-invoices/:id/payments",
            post(documents::record_payment),
        )
        .route("/stock-entries", post(documents::create_stock_entry))
        .route("/stock-entries/:id/submit", post(documents::submit_stock_entry))
        .route("/stock-entries/:id/cancel", post(documents::cancel_stock_entry))
        .route(
            "/material-requests/:id/submit",
            post(documents::submit_material_request),
        )
        .route("/tasks/:id", get(documents::get_task))
        .route("/tasks/:id/status", put(documents::set_task_status));

    let master_routes = Router::new()
        .route(
            "/items",
            post(masters::create_item).get(masters::list_items),
        )
        .route("/items/:item_code", get(masters::get_item))
        .route(
            "/service-templates",
            post(masters::create_service_template).get(masters::list_service_templates),
        );

    let report_routes = Router::new()
        .route("/reports/job-profitability", get(reports::job_profitability))
        .route("/reports/parts-consumption", get(reports::parts_consumption))
        .route(
            "/reports/technician-utilization",
            get(reports::technician_utilization),
        )
        .route("/reports/wip-aging", get(reports::wip_aging))
        .route("/reports/repeat-repairs", get(reports::repeat_repairs))
        .route("/vehicles/:vehicle/timeline", get(reports::vehicle_timeline));

    Router::new()
        // Status and health endpoints
        .route("/status", get(api_status))
        .route("/health", get(health_check))
        .merge(repair_order_routes)
        .merge(document_routes)
        .merge(master_routes)
        .merge(report_routes)
        .route(
            "/admin/job-costing/refresh",
            post(admin::refresh_job_costing),
        )
        // Public, read-only
        .route("/portal/repair-status/:name", get(portal::repair_status))
}

/// Full application router: versioned API, OpenAPI document, request ids and tracing.
pub fn build_router(state: AppState) -> Router {
    Router::new()
        .nest("/api/v1", api_v1_routes())
        .route("/api-docs/openapi.json", get(openapi_json))
        .layer(crate::tracing::configure_http_tracing())
        .layer(middleware::from_fn(
            middleware_helpers::request_id::request_id_middleware,
        ))
        .with_state(state)
}

async fn openapi_json() -> Json<utoipa::openapi::OpenApi> {
    Json(openapi::ApiDocV1::openapi())
}

async fn api_status(State(state): State<AppState>) -> ApiResult<Value> {
    let status_data = json!({
        "status": "ok",
        "version": env!("CARGO_PKG_VERSION"),
        "service": "repairshop-api",
        "environment": state.config.environment,
        "timestamp": Utc::now().to_rfc3339(),
    });

    Ok(Json(ApiResponse::success(status_data)))
}

async fn health_check(State(state): State<AppState>) -> ApiResult<Value> {
    let db_status = match state.db.ping().await {
        Ok(_) => "healthy",
        Err(e) => {
            ::tracing::warn!(error = %e, "database ping failed");
            "unhealthy"
        }
    };

    let health_data = json!({
        "status": db_status,
        "checks": {
            "database": db_status,
        },
        "timestamp": Utc::now().to_rfc3339(),
    });

    Ok(Json(ApiResponse::success(health_data)))
}
