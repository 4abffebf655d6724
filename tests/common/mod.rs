#![allow(dead_code)]

use std::sync::Arc;

use axum::{
    body::{self, Body},
    http::{Method, Request},
    response::Response,
    Router,
};
use repairshop_api::{
    config::AppConfig,
    db::{self, DbConfig},
    entities::{item, repair_order, task},
    events::{self, EventSender},
    handlers::AppServices,
    services::{
        masters::ItemRequest,
        repair_orders::{
            CheckInput, OperationInput, PartInput, RepairOrderDetail, RepairOrderRequest,
        },
    },
    AppState,
};
use rust_decimal::Decimal;
use sea_orm::{EntityTrait, QueryOrder};
use serde_json::Value;
use tokio::sync::mpsc;
use tower::ServiceExt;
use uuid::Uuid;

/// Application state and router over a fresh in-memory SQLite database.
pub struct TestApp {
    router: Router,
    pub state: AppState,
    _event_task: tokio::task::JoinHandle<()>,
}

impl TestApp {
    pub async fn new() -> Self {
        let pool = db::establish_connection_with_config(&DbConfig::in_memory())
            .await
            .expect("failed to create test database");
        db::run_migrations(&pool)
            .await
            .expect("failed to run migrations in tests");

        let mut cfg = AppConfig::new(
            "sqlite::memory:".to_string(),
            "127.0.0.1".to_string(),
            18_080,
            "test".to_string(),
        );
        cfg.scheduler_enabled = false;

        let (event_tx, event_rx) = mpsc::channel(256);
        let event_task = tokio::spawn(events::process_events(event_rx));

        let state = AppState::new(Arc::new(pool), cfg, EventSender::new(event_tx));
        let router = repairshop_api::build_router(state.clone());

        Self {
            router,
            state,
            _event_task: event_task,
        }
    }

    pub fn services(&self) -> &AppServices {
        &self.state.services
    }

    pub async fn request(&self, method: Method, uri: &str, body: Option<Value>) -> Response {
        self.request_with_headers(method, uri, body, &[]).await
    }

    pub async fn request_with_headers(
        &self,
        method: Method,
        uri: &str,
        body: Option<Value>,
        headers: &[(&str, &str)],
    ) -> Response {
        let mut builder = Request::builder().method(method).uri(uri);
        for (name, value) in headers {
            builder = builder.header(*name, *value);
        }

        let body = if let Some(json) = body {
            builder = builder.header("content-type", "application/json");
            Body::from(serde_json::to_vec(&json).expect("failed to serialize json request body"))
        } else {
            Body::empty()
        };

        let request = builder.body(body).expect("failed to build request");
        self.router
            .clone()
            .oneshot(request)
            .await
            .expect("router error during test request")
    }

    pub async fn seed_item(
        &self,
        code: &str,
        valuation_rate: Decimal,
        standard_rate: Decimal,
    ) -> item::Model {
        self.services()
            .masters
            .create_item(ItemRequest {
                item_code: code.to_string(),
                item_name: format!("{} item", code),
                stock_uom: "Nos".to_string(),
                valuation_rate,
                standard_rate,
                is_stock_item: true,
            })
            .await
            .expect("seed item")
    }

    pub async fn create_draft(&self, request: RepairOrderRequest) -> RepairOrderDetail {
        self.services()
            .repair_orders
            .create_repair_order(request)
            .await
            .expect("create draft repair order")
    }

    pub async fn create_submitted(&self, request: RepairOrderRequest) -> RepairOrderDetail {
        let draft = self.create_draft(request).await;
        self.services()
            .repair_orders
            .submit_repair_order(draft.repair_order.id)
            .await
            .expect("submit repair order")
    }

    pub async fn reload(&self, id: Uuid) -> repair_order::Model {
        self.services()
            .repair_orders
            .get_repair_order(id)
            .await
            .expect("reload repair order")
            .repair_order
    }

    /// Tasks of a repair order in operation order.
    pub async fn tasks_of(&self, detail: &RepairOrderDetail) -> Vec<task::Model> {
        let mut tasks = Vec::new();
        for op in &detail.operations {
            let id = op.task_id.expect("operation has a task");
            tasks.push(
                task::Entity::find_by_id(id)
                    .one(&*self.state.db)
                    .await
                    .expect("query task")
                    .expect("task exists"),
            );
        }
        tasks
    }

    pub async fn all_repair_orders(&self) -> Vec<repair_order::Model> {
        repair_order::Entity::find()
            .order_by_asc(repair_order::Column::CreatedAt)
            .all(&*self.state.db)
            .await
            .expect("list repair orders")
    }
}

impl Drop for TestApp {
    fn drop(&mut self) {
        self._event_task.abort();
    }
}

pub async fn response_json(response: Response) -> Value {
    let bytes = body::to_bytes(response.into_body(), usize::MAX)
        .await
        .expect("response body bytes");
    serde_json::from_slice(&bytes).expect("json response")
}

/// Reads a decimal that the API serialised as a string or a number.
pub fn decimal_field(value: &Value) -> Decimal {
    match value {
        Value::String(raw) => raw.parse().expect("decimal string"),
        Value::Number(n) => n.to_string().parse().expect("decimal number"),
        other => panic!("expected a decimal, got {other}"),
    }
}

pub fn ro_request(customer: &str, vehicle: &str) -> RepairOrderRequest {
    RepairOrderRequest {
        customer: customer.to_string(),
        vehicle: vehicle.to_string(),
        advisor: None,
        priority: None,
        service_template_id: None,
        sla_response_by: None,
        sla_delivery_by: None,
        notes: None,
        operations: Vec::new(),
        parts: Vec::new(),
        checklist: Vec::new(),
    }
}

pub fn operation(name: &str, minutes: i32, is_qc: bool) -> OperationInput {
    OperationInput {
        operation_name: Some(name.to_string()),
        planned_minutes: minutes,
        workstation: None,
        is_qc,
    }
}

pub fn part(item_code: &str, qty: Decimal, is_billable: bool, is_foc: bool) -> PartInput {
    PartInput {
        item_code: item_code.to_string(),
        item_name: None,
        uom: None,
        qty_planned: qty,
        is_billable,
        is_foc,
        notes: None,
    }
}

pub fn check(item: &str) -> CheckInput {
    CheckInput {
        check_item: item.to_string(),
        check_type: None,
        is_checked: false,
    }
}
