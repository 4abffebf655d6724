mod common;

use axum::http::{Method, StatusCode};
use common::{decimal_field, response_json, TestApp};
use rust_decimal_macros::dec;
use serde_json::json;

#[tokio::test]
async fn status_and_health_report_ok() {
    let app = TestApp::new().await;

    let response = app.request(Method::GET, "/api/v1/status", None).await;
    assert_eq!(response.status(), StatusCode::OK);
    let body = response_json(response).await;
    assert_eq!(body["success"], true);
    assert_eq!(body["data"]["service"], "repairshop-api");
    assert_eq!(body["data"]["environment"], "test");

    let response = app.request(Method::GET, "/api/v1/health", None).await;
    let body = response_json(response).await;
    assert_eq!(body["data"]["checks"]["database"], "healthy");
}

#[tokio::test]
async fn repair_order_flow_over_http() {
    let app = TestApp::new().await;
    app.seed_item("OIL-5W30", dec!(8), dec!(12)).await;

    let response = app
        .request(
            Method::POST,
            "/api/v1/repair-orders",
            Some(json!({
                "customer": "Jane Doe",
                "vehicle": "KA-01-1234",
                "priority": "High",
                "operations": [
                    {"operation_name": "Oil change", "planned_minutes": 30},
                    {"operation_name": "Road test", "planned_minutes": 15, "is_qc": true}
                ],
                "parts": [
                    {"item_code": "OIL-5W30", "qty_planned": "4", "is_billable": true}
                ]
            })),
        )
        .await;
    assert_eq!(response.status(), StatusCode::CREATED);
    let body = response_json(response).await;
    let id = body["data"]["id"].as_str().expect("id").to_string();
    let name = body["data"]["name"].as_str().expect("name").to_string();
    assert_eq!(body["data"]["status"], "Scheduled");
    assert_eq!(decimal_field(&body["data"]["parts_cost"]), dec!(32));
    assert_eq!(body["data"]["operations"].as_array().map(Vec::len), Some(2));

    let response = app
        .request(Method::POST, &format!("/api/v1/repair-orders/{id}/submit"), None)
        .await;
    assert_eq!(response.status(), StatusCode::OK);
    let body = response_json(response).await;
    let task_id = body["data"]["operations"][0]["task_id"]
        .as_str()
        .expect("task linked")
        .to_string();

    let response = app
        .request(
            Method::PUT,
            &format!("/api/v1/tasks/{task_id}/status"),
            Some(json!({"status": "Working"})),
        )
        .await;
    assert_eq!(response.status(), StatusCode::OK);

    let response = app
        .request(Method::GET, &format!("/api/v1/repair-orders/{id}"), None)
        .await;
    let body = response_json(response).await;
    assert_eq!(body["data"]["status"], "In Progress");

    let response = app
        .request(
            Method::GET,
            &format!("/api/v1/repair-orders/{id}/job-costing"),
            None,
        )
        .await;
    assert_eq!(response.status(), StatusCode::OK);
    let body = response_json(response).await;
    assert_eq!(decimal_field(&body["data"]["total_job_cost"]), dec!(32));

    let response = app
        .request(
            Method::GET,
            &format!("/api/v1/portal/repair-status/{name}"),
            None,
        )
        .await;
    assert_eq!(response.status(), StatusCode::OK);
    let body = response_json(response).await;
    assert_eq!(body["data"]["status"], "In Progress");
    assert_eq!(body["data"]["tasks"].as_array().map(Vec::len), Some(2));
}

#[tokio::test]
async fn set_status_outside_the_buttons_is_a_bad_request() {
    let app = TestApp::new().await;
    let response = app
        .request(
            Method::POST,
            "/api/v1/repair-orders",
            Some(json!({"customer": "Jane Doe", "vehicle": "KA-01-1234"})),
        )
        .await;
    let body = response_json(response).await;
    let id = body["data"]["id"].as_str().expect("id").to_string();

    let response = app
        .request(
            Method::POST,
            &format!("/api/v1/repair-orders/{id}/status"),
            Some(json!({"status": "Delivered"})),
        )
        .await;
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    let body = response_json(response).await;
    assert_eq!(body["error"], "Bad Request");
    assert!(body["message"]
        .as_str()
        .unwrap_or_default()
        .contains("Use buttons for: Scheduled, On Hold, Cancelled"));
}

#[tokio::test]
async fn missing_customer_is_rejected() {
    let app = TestApp::new().await;
    let response = app
        .request(
            Method::POST,
            "/api/v1/repair-orders",
            Some(json!({"customer": "", "vehicle": "KA-01-1234"})),
        )
        .await;
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn unknown_repair_order_is_a_json_404_with_request_id() {
    let app = TestApp::new().await;
    let response = app
        .request_with_headers(
            Method::GET,
            "/api/v1/repair-orders/00000000-0000-0000-0000-000000000000",
            None,
            &[("x-request-id", "req-test-42")],
        )
        .await;

    assert_eq!(response.status(), StatusCode::NOT_FOUND);
    assert_eq!(
        response
            .headers()
            .get("x-request-id")
            .and_then(|v| v.to_str().ok()),
        Some("req-test-42")
    );
    let body = response_json(response).await;
    assert_eq!(body["error"], "Not Found");
    assert_eq!(body["request_id"], "req-test-42");
}

#[tokio::test]
async fn listing_pages_through_repair_orders() {
    let app = TestApp::new().await;
    for vehicle in ["V-1", "V-2", "V-3"] {
        app.create_draft(common::ro_request("Fleet Co", vehicle)).await;
    }

    let response = app
        .request(Method::GET, "/api/v1/repair-orders?limit=2&page=2", None)
        .await;
    assert_eq!(response.status(), StatusCode::OK);
    let body = response_json(response).await;
    assert_eq!(body["data"]["total"], 3);
    assert_eq!(body["data"]["total_pages"], 2);
    assert_eq!(body["data"]["items"].as_array().map(Vec::len), Some(1));
}

#[tokio::test]
async fn reports_are_served_as_columns_and_rows() {
    let app = TestApp::new().await;
    app.create_submitted(common::ro_request("Jane Doe", "KA-01-1234"))
        .await;

    let response = app
        .request(Method::GET, "/api/v1/reports/wip-aging", None)
        .await;
    assert_eq!(response.status(), StatusCode::OK);
    let body = response_json(response).await;
    assert_eq!(body["data"]["columns"][0]["label"], "RO ID");
    assert_eq!(body["data"]["rows"].as_array().map(Vec::len), Some(1));

    let response = app
        .request(
            Method::GET,
            "/api/v1/reports/parts-consumption?from_date=2024-03-10&to_date=2024-03-01",
            None,
        )
        .await;
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn admin_refresh_returns_a_summary() {
    let app = TestApp::new().await;
    app.create_submitted(common::ro_request("Jane Doe", "KA-01-1234"))
        .await;

    let response = app
        .request(Method::POST, "/api/v1/admin/job-costing/refresh", None)
        .await;
    assert_eq!(response.status(), StatusCode::OK);
    let body = response_json(response).await;
    assert_eq!(body["data"]["refreshed"], 1);
    assert_eq!(body["data"]["failed"], 0);
}

#[tokio::test]
async fn openapi_document_is_served() {
    let app = TestApp::new().await;
    let response = app
        .request(Method::GET, "/api-docs/openapi.json", None)
        .await;
    assert_eq!(response.status(), StatusCode::OK);
    let body = response_json(response).await;
    assert_eq!(body["info"]["title"], "Repair Shop API");
    assert!(body["paths"]["/api/v1/repair-orders"].is_object());
}
