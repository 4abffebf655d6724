use utoipa::OpenApi;

#[derive(OpenApi)]
#[openapi(
    info(
        title = "Repair Shop API",
        version = "0.1.0",
        description = r#"
# Repair Shop API

Backend for car-repair workshops.

- **Repair Orders**: intake, service templates, submit, status transitions and guards
- **Documents**: timesheets, purchase invoices, stock entries, quotations, sales orders and invoices
- **Job Costing**: costs recomputed from linked documents, snapshots refreshed nightly
- **Reports**: job profitability, parts consumption, technician utilization, WIP aging, repeat repairs
- **Portal**: read-only repair status for customers

Every JSON response is wrapped as `{ "success", "data", "message", "errors", "meta" }`.
Failures return `{ "error", "message", "details", "request_id", "timestamp" }`.
"#
    ),
    servers(
        (url = "http://localhost:8080", description = "Local development")
    ),
    tags(
        (name = "repair-orders", description = "Repair order lifecycle"),
        (name = "documents", description = "Linked commercial and stock documents"),
        (name = "reports", description = "Workshop reports"),
        (name = "portal", description = "Customer-facing status"),
        (name = "admin", description = "Administrative endpoints")
    ),
    paths(
        crate::handlers::repair_orders::create_repair_order,
        crate::handlers::repair_orders::list_repair_orders,
        crate::handlers::repair_orders::get_repair_order,
        crate::handlers::repair_orders::update_after_submit,
        crate::handlers::repair_orders::submit_repair_order,
        crate::handlers::repair_orders::set_status,
        crate::handlers::documents::create_timesheet,
        crate::handlers::documents::submit_sales_invoice,
        crate::handlers::documents::set_task_status,
        crate::handlers::reports::job_profitability,
        crate::handlers::reports::parts_consumption,
        crate::handlers::portal::repair_status,
        crate::handlers::admin::refresh_job_costing,
    ),
    components(
        schemas(
            crate::services::repair_orders::RepairOrderRequest,
            crate::services::repair_orders::UpdateAfterSubmitRequest,
            crate::services::repair_orders::SetStatusRequest,
            crate::services::repair_orders::RepairOrderDetail,
            crate::services::repair_orders::RepairStatusPage,
            crate::services::documents::TimesheetRequest,
            crate::services::documents::TaskStatusRequest,
            crate::services::costing::RefreshSummary,
            crate::services::reports::ProfitabilityRow,
            crate::services::reports::PartsConsumptionRow,
            crate::services::reports::UtilizationRow,
            crate::services::reports::WipAgingRow,
            crate::services::reports::RepeatRepairRow,
            crate::services::reports::TimelinePoint,
            crate::entities::RepairOrderStatus,
            crate::entities::TaskStatus,
            crate::errors::ErrorResponse
        )
    )
)]
pub struct ApiDocV1;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn document_lists_repair_order_paths() {
        let openapi = ApiDocV1::openapi();
        let json = serde_json::to_string_pretty(&openapi).unwrap();
        assert!(json.contains("Repair Shop API"));
        assert!(json.contains("/api/v1/repair-orders/{id}/status"));
        assert!(json.contains("/api/v1/portal/repair-status/{name}"));
    }
}
