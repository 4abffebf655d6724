//! Draft, submit and cancel for the documents that feed repair order costs.
//!
//! Each state change commits together with its repair order side effects
//! (see [`crate::services::linked_documents`]).

use chrono::{DateTime, Utc};
use metrics::counter;
use rust_decimal::Decimal;
use sea_orm::{
    sea_query::Expr, ActiveModelTrait, ActiveValue::Set, ColumnTrait, ConnectionTrait,
    DatabaseConnection, EntityTrait, QueryFilter, QueryOrder, TransactionTrait,
};
use serde::{Deserialize, Serialize};
use std::{collections::HashMap, sync::Arc};
use tracing::{info, instrument};
use utoipa::ToSchema;
use uuid::Uuid;
use validator::Validate;

use crate::{
    common::document_name,
    entities::{
        item, material_request, material_request_item, purchase_invoice, quotation,
        quotation_item, sales_invoice, sales_invoice_item, sales_order, sales_order_item,
        stock_entry, stock_entry_detail, task, timesheet, timesheet_detail, DocStatus,
        SalesInvoiceStatus, TaskStatus,
    },
    errors::ServiceError,
    events::{Event, EventSender, LinkedDocumentKind},
    services::linked_documents,
};

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct TimeLogInput {
    pub task_id: Option<Uuid>,
    pub project_id: Option<Uuid>,
    pub activity_type: Option<String>,
    pub hours: Decimal,
    #[serde(default)]
    pub billing_rate: Decimal,
    pub from_time: Option<DateTime<Utc>>,
    pub to_time: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, Serialize, Deserialize, Validate, ToSchema)]
pub struct TimesheetRequest {
    #[validate(length(min = 1, message = "Employee is required"))]
    pub employee: String,
    pub repair_order_id: Option<Uuid>,
    #[serde(default)]
    pub time_logs: Vec<TimeLogInput>,
}

#[derive(Debug, Clone, Serialize, Deserialize, Validate, ToSchema)]
pub struct PurchaseInvoiceRequest {
    #[validate(length(min = 1, message = "Supplier is required"))]
    pub supplier: String,
    pub repair_order_id: Option<Uuid>,
    pub grand_total: Decimal,
}

/// A selling line shared by quotations, sales orders and sales invoices.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct LineInput {
    pub item_code: Option<String>,
    pub item_name: String,
    pub description: Option<String>,
    pub qty: Decimal,
    pub uom: String,
    #[serde(default)]
    pub rate: Decimal,
    pub repair_order_id: Option<Uuid>,
    pub vehicle: Option<String>,
}

fn default_quotation_to() -> String {
    "Customer".to_string()
}

fn default_order_type() -> String {
    "Maintenance".to_string()
}

#[derive(Debug, Clone, Serialize, Deserialize, Validate, ToSchema)]
pub struct QuotationRequest {
    #[serde(default = "default_quotation_to")]
    pub quotation_to: String,
    #[validate(length(min = 1, message = "Party name is required"))]
    pub party_name: String,
    #[serde(default = "default_order_type")]
    pub order_type: String,
    pub repair_order_id: Option<Uuid>,
    #[serde(default)]
    pub items: Vec<LineInput>,
}

#[derive(Debug, Clone, Serialize, Deserialize, Validate, ToSchema)]
pub struct SalesOrderRequest {
    #[validate(length(min = 1, message = "Customer is required"))]
    pub customer: String,
    #[serde(default = "default_order_type")]
    pub order_type: String,
    pub quotation_id: Option<Uuid>,
    pub repair_order_id: Option<Uuid>,
    pub project_id: Option<Uuid>,
    #[serde(default)]
    pub items: Vec<LineInput>,
}

#[derive(Debug, Clone, Serialize, Deserialize, Validate, ToSchema)]
pub struct SalesInvoiceRequest {
    #[validate(length(min = 1, message = "Customer is required"))]
    pub customer: String,
    pub repair_order_id: Option<Uuid>,
    pub sales_order_id: Option<Uuid>,
    pub project_id: Option<Uuid>,
    #[serde(default)]
    pub items: Vec<LineInput>,
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct StockLineInput {
    pub item_code: String,
    pub qty: Decimal,
    /// Falls back to the item's valuation rate.
    pub valuation_rate: Option<Decimal>,
}

fn default_purpose() -> String {
    stock_entry::PURPOSE_MATERIAL_ISSUE.to_string()
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct StockEntryRequest {
    #[serde(default = "default_purpose")]
    pub purpose: String,
    pub repair_order_id: Option<Uuid>,
    pub posting_date: Option<DateTime<Utc>>,
    #[serde(default)]
    pub items: Vec<StockLineInput>,
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct MaterialLineInput {
    pub item_code: String,
    pub qty: Decimal,
    pub uom: String,
    pub schedule_date: DateTime<Utc>,
    pub warehouse: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct MaterialRequestRequest {
    pub material_request_type: String,
    pub company: String,
    pub repair_order_id: Option<Uuid>,
    pub items: Vec<MaterialLineInput>,
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct TaskStatusRequest {
    pub status: TaskStatus,
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct PaymentRequest {
    pub amount: Decimal,
}

#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct TimesheetWithLogs {
    #[serde(flatten)]
    pub timesheet: timesheet::Model,
    pub time_logs: Vec<timesheet_detail::Model>,
}

#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct QuotationWithItems {
    #[serde(flatten)]
    pub quotation: quotation::Model,
    pub items: Vec<quotation_item::Model>,
}

#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct SalesOrderWithItems {
    #[serde(flatten)]
    pub sales_order: sales_order::Model,
    pub items: Vec<sales_order_item::Model>,
}

#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct SalesInvoiceWithItems {
    #[serde(flatten)]
    pub sales_invoice: sales_invoice::Model,
    pub items: Vec<sales_invoice_item::Model>,
}

#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct StockEntryWithItems {
    #[serde(flatten)]
    pub stock_entry: stock_entry::Model,
    pub items: Vec<stock_entry_detail::Model>,
}

#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct MaterialRequestWithItems {
    #[serde(flatten)]
    pub material_request: material_request::Model,
    pub items: Vec<material_request_item::Model>,
}

pub fn ensure_draft(kind: &str, name: &str, docstatus: DocStatus) -> Result<(), ServiceError> {
    if docstatus != DocStatus::Draft {
        return Err(ServiceError::InvalidOperation(format!(
            "{} {} is {} and cannot be submitted",
            kind, name, docstatus
        )));
    }
    Ok(())
}

pub fn ensure_submitted(kind: &str, name: &str, docstatus: DocStatus) -> Result<(), ServiceError> {
    if !docstatus.is_submitted() {
        return Err(ServiceError::InvalidOperation(format!(
            "{} {} is {}; only submitted documents can be cancelled",
            kind, name, docstatus
        )));
    }
    Ok(())
}

fn check_line(idx: i32, line: &LineInput) -> Result<Decimal, ServiceError> {
    if line.item_name.trim().is_empty() {
        return Err(ServiceError::ValidationError(format!(
            "Row {}: item name is required",
            idx
        )));
    }
    if line.qty.is_sign_negative() || line.rate.is_sign_negative() {
        return Err(ServiceError::ValidationError(format!(
            "Row {}: quantity and rate cannot be negative",
            idx
        )));
    }
    Ok(line.qty * line.rate)
}

fn not_found(kind: &str, id: Uuid) -> ServiceError {
    ServiceError::NotFound(format!("{} {} not found", kind, id))
}

pub async fn insert_quotation<C: ConnectionTrait>(
    conn: &C,
    request: QuotationRequest,
) -> Result<QuotationWithItems, ServiceError> {
    request.validate()?;
    let id = Uuid::new_v4();
    let mut rows = Vec::with_capacity(request.items.len());
    let mut grand_total = Decimal::ZERO;
    for (i, line) in request.items.into_iter().enumerate() {
        let idx = i as i32 + 1;
        let amount = check_line(idx, &line)?;
        grand_total += amount;
        rows.push(quotation_item::ActiveModel {
            id: Set(Uuid::new_v4()),
            quotation_id: Set(id),
            idx: Set(idx),
            item_code: Set(line.item_code),
            item_name: Set(line.item_name),
            description: Set(line.description),
            qty: Set(line.qty),
            uom: Set(line.uom),
            rate: Set(line.rate),
            amount: Set(amount),
            repair_order_id: Set(line.repair_order_id),
            vehicle: Set(line.vehicle),
        });
    }

    let header = quotation::ActiveModel {
        id: Set(id),
        name: Set(document_name("QTN", id)),
        quotation_to: Set(request.quotation_to),
        party_name: Set(request.party_name),
        order_type: Set(request.order_type),
        repair_order_id: Set(request.repair_order_id),
        grand_total: Set(grand_total),
        docstatus: Set(DocStatus::Draft),
        ..Default::default()
    }
    .insert(conn)
    .await?;

    let mut items = Vec::with_capacity(rows.len());
    for row in rows {
        items.push(row.insert(conn).await?);
    }
    Ok(QuotationWithItems {
        quotation: header,
        items,
    })
}

pub async fn insert_sales_order<C: ConnectionTrait>(
    conn: &C,
    request: SalesOrderRequest,
) -> Result<SalesOrderWithItems, ServiceError> {
    request.validate()?;
    if let Some(quotation_id) = request.quotation_id {
        let quotation = quotation::Entity::find_by_id(quotation_id)
            .one(conn)
            .await?
            .ok_or_else(|| not_found("Quotation", quotation_id))?;
        if !quotation.docstatus.is_submitted() {
            return Err(ServiceError::InvalidOperation(format!(
                "Quotation {} is {}; Sales Orders need a submitted Quotation",
                quotation.name, quotation.docstatus
            )));
        }
    }
    let id = Uuid::new_v4();
    let mut rows = Vec::with_capacity(request.items.len());
    let mut grand_total = Decimal::ZERO;
    for (i, line) in request.items.into_iter().enumerate() {
        let idx = i as i32 + 1;
        let amount = check_line(idx, &line)?;
        grand_total += amount;
        rows.push(sales_order_item::ActiveModel {
            id: Set(Uuid::new_v4()),
            sales_order_id: Set(id),
            idx: Set(idx),
            item_code: Set(line.item_code),
            item_name: Set(line.item_name),
            qty: Set(line.qty),
            uom: Set(line.uom),
            rate: Set(line.rate),
            amount: Set(amount),
            repair_order_id: Set(line.repair_order_id),
            vehicle: Set(line.vehicle),
        });
    }

    let header = sales_order::ActiveModel {
        id: Set(id),
        name: Set(document_name("SO", id)),
        customer: Set(request.customer),
        order_type: Set(request.order_type),
        quotation_id: Set(request.quotation_id),
        repair_order_id: Set(request.repair_order_id),
        project_id: Set(request.project_id),
        grand_total: Set(grand_total),
        docstatus: Set(DocStatus::Draft),
        ..Default::default()
    }
    .insert(conn)
    .await?;

    let mut items = Vec::with_capacity(rows.len());
    for row in rows {
        items.push(row.insert(conn).await?);
    }
    Ok(SalesOrderWithItems {
        sales_order: header,
        items,
    })
}

pub async fn insert_sales_invoice<C: ConnectionTrait>(
    conn: &C,
    request: SalesInvoiceRequest,
) -> Result<SalesInvoiceWithItems, ServiceError> {
    request.validate()?;
    let id = Uuid::new_v4();
    let mut rows = Vec::with_capacity(request.items.len());
    let mut grand_total = Decimal::ZERO;
    for (i, line) in request.items.into_iter().enumerate() {
        let idx = i as i32 + 1;
        let net_amount = check_line(idx, &line)?;
        grand_total += net_amount;
        rows.push(sales_invoice_item::ActiveModel {
            id: Set(Uuid::new_v4()),
            sales_invoice_id: Set(id),
            idx: Set(idx),
            item_code: Set(line.item_code),
            item_name: Set(line.item_name),
            qty: Set(line.qty),
            uom: Set(line.uom),
            rate: Set(line.rate),
            net_amount: Set(net_amount),
            repair_order_id: Set(line.repair_order_id),
            vehicle: Set(line.vehicle),
        });
    }

    let header = sales_invoice::ActiveModel {
        id: Set(id),
        name: Set(document_name("SINV", id)),
        customer: Set(request.customer),
        repair_order_id: Set(request.repair_order_id),
        sales_order_id: Set(request.sales_order_id),
        project_id: Set(request.project_id),
        grand_total: Set(grand_total),
        paid_amount: Set(Decimal::ZERO),
        status: Set(SalesInvoiceStatus::Draft),
        docstatus: Set(DocStatus::Draft),
        ..Default::default()
    }
    .insert(conn)
    .await?;

    let mut items = Vec::with_capacity(rows.len());
    for row in rows {
        items.push(row.insert(conn).await?);
    }
    Ok(SalesInvoiceWithItems {
        sales_invoice: header,
        items,
    })
}

pub async fn insert_material_request<C: ConnectionTrait>(
    conn: &C,
    request: MaterialRequestRequest,
) -> Result<MaterialRequestWithItems, ServiceError> {
    let id = Uuid::new_v4();
    let header = material_request::ActiveModel {
        id: Set(id),
        name: Set(document_name("MR", id)),
        material_request_type: Set(request.material_request_type),
        company: Set(request.company),
        repair_order_id: Set(request.repair_order_id),
        docstatus: Set(DocStatus::Draft),
        ..Default::default()
    }
    .insert(conn)
    .await?;

    let mut items = Vec::with_capacity(request.items.len());
    for (i, line) in request.items.into_iter().enumerate() {
        let row = material_request_item::ActiveModel {
            id: Set(Uuid::new_v4()),
            material_request_id: Set(id),
            idx: Set(i as i32 + 1),
            item_code: Set(line.item_code),
            qty: Set(line.qty),
            uom: Set(line.uom),
            schedule_date: Set(line.schedule_date),
            warehouse: Set(line.warehouse),
        }
        .insert(conn)
        .await?;
        items.push(row);
    }
    Ok(MaterialRequestWithItems {
        material_request: header,
        items,
    })
}

pub async fn load_quotation<C: ConnectionTrait>(
    conn: &C,
    id: Uuid,
) -> Result<QuotationWithItems, ServiceError> {
    let quotation = quotation::Entity::find_by_id(id)
        .one(conn)
        .await?
        .ok_or_else(|| not_found("Quotation", id))?;
    let items = quotation_item::Entity::find()
        .filter(quotation_item::Column::QuotationId.eq(id))
        .order_by_asc(quotation_item::Column::Idx)
        .all(conn)
        .await?;
    Ok(QuotationWithItems { quotation, items })
}

pub async fn load_sales_order<C: ConnectionTrait>(
    conn: &C,
    id: Uuid,
) -> Result<SalesOrderWithItems, ServiceError> {
    let sales_order = sales_order::Entity::find_by_id(id)
        .one(conn)
        .await?
        .ok_or_else(|| not_found("Sales Order", id))?;
    let items = sales_order_item::Entity::find()
        .filter(sales_order_item::Column::SalesOrderId.eq(id))
        .order_by_asc(sales_order_item::Column::Idx)
        .all(conn)
        .await?;
    Ok(SalesOrderWithItems { sales_order, items })
}

async fn load_sales_invoice<C: ConnectionTrait>(
    conn: &C,
    id: Uuid,
) -> Result<SalesInvoiceWithItems, ServiceError> {
    let sales_invoice = sales_invoice::Entity::find_by_id(id)
        .one(conn)
        .await?
        .ok_or_else(|| not_found("Sales Invoice", id))?;
    let items = sales_invoice_item::Entity::find()
        .filter(sales_invoice_item::Column::SalesInvoiceId.eq(id))
        .order_by_asc(sales_invoice_item::Column::Idx)
        .all(conn)
        .await?;
    Ok(SalesInvoiceWithItems {
        sales_invoice,
        items,
    })
}

/// Lifecycle of timesheets, invoices, selling documents, stock entries and tasks.
#[derive(Clone)]
pub struct DocumentService {
    db: Arc<DatabaseConnection>,
    event_sender: EventSender,
}

impl DocumentService {
    pub fn new(db: Arc<DatabaseConnection>, event_sender: EventSender) -> Self {
        Self { db, event_sender }
    }

    async fn publish(&self, events: Vec<Event>) {
        for event in events {
            self.event_sender.send_or_log(event).await;
        }
    }

    fn state_change(
        kind: LinkedDocumentKind,
        document_id: Uuid,
        repair_order_id: Option<Uuid>,
        submitted: bool,
    ) -> Event {
        counter!("repairshop.documents.state_changes", 1, "kind" => kind.to_string());
        if submitted {
            Event::LinkedDocumentSubmitted {
                kind,
                document_id,
                repair_order_id,
            }
        } else {
            Event::LinkedDocumentCancelled {
                kind,
                document_id,
                repair_order_id,
            }
        }
    }

    // Timesheets

    #[instrument(skip(self, request), fields(employee = %request.employee))]
    pub async fn create_timesheet(
        &self,
        request: TimesheetRequest,
    ) -> Result<TimesheetWithLogs, ServiceError> {
        request.validate()?;
        for (i, log) in request.time_logs.iter().enumerate() {
            if log.hours.is_sign_negative() || log.billing_rate.is_sign_negative() {
                return Err(ServiceError::ValidationError(format!(
                    "Time log row {}: hours and billing rate cannot be negative",
                    i + 1
                )));
            }
        }

        let txn = self.db.begin().await?;
        let id = Uuid::new_v4();
        let sheet = timesheet::ActiveModel {
            id: Set(id),
            name: Set(document_name("TS", id)),
            employee: Set(request.employee),
            repair_order_id: Set(request.repair_order_id),
            docstatus: Set(DocStatus::Draft),
            ..Default::default()
        }
        .insert(&txn)
        .await?;

        let mut time_logs = Vec::with_capacity(request.time_logs.len());
        for log in request.time_logs {
            let row = timesheet_detail::ActiveModel {
                id: Set(Uuid::new_v4()),
                timesheet_id: Set(id),
                task_id: Set(log.task_id),
                project_id: Set(log.project_id),
                activity_type: Set(log.activity_type),
                hours: Set(log.hours),
                billing_rate: Set(log.billing_rate),
                from_time: Set(log.from_time),
                to_time: Set(log.to_time),
            }
            .insert(&txn)
            .await?;
            time_logs.push(row);
        }
        txn.commit().await?;

        Ok(TimesheetWithLogs {
            timesheet: sheet,
            time_logs,
        })
    }

    #[instrument(skip(self))]
    pub async fn submit_timesheet(&self, id: Uuid) -> Result<timesheet::Model, ServiceError> {
        self.change_timesheet(id, true).await
    }

    #[instrument(skip(self))]
    pub async fn cancel_timesheet(&self, id: Uuid) -> Result<timesheet::Model, ServiceError> {
        self.change_timesheet(id, false).await
    }

    async fn change_timesheet(
        &self,
        id: Uuid,
        submit: bool,
    ) -> Result<timesheet::Model, ServiceError> {
        let txn = self.db.begin().await?;
        let sheet = timesheet::Entity::find_by_id(id)
            .one(&txn)
            .await?
            .ok_or_else(|| not_found("Timesheet", id))?;
        let next = if submit {
            ensure_draft("Timesheet", &sheet.name, sheet.docstatus)?;
            DocStatus::Submitted
        } else {
            ensure_submitted("Timesheet", &sheet.name, sheet.docstatus)?;
            DocStatus::Cancelled
        };

        let mut active: timesheet::ActiveModel = sheet.into();
        active.docstatus = Set(next);
        let sheet = active.update(&txn).await?;

        let mut events = Vec::new();
        let ro_id = linked_documents::on_timesheet_changed(&txn, &sheet, &mut events).await?;
        txn.commit().await?;

        events.push(Self::state_change(
            LinkedDocumentKind::Timesheet,
            id,
            ro_id,
            submit,
        ));
        self.publish(events).await;
        Ok(sheet)
    }

    // Purchase invoices

    #[instrument(skip(self, request))]
    pub async fn create_purchase_invoice(
        &self,
        request: PurchaseInvoiceRequest,
    ) -> Result<purchase_invoice::Model, ServiceError> {
        request.validate()?;
        if request.grand_total.is_sign_negative() {
            return Err(ServiceError::ValidationError(
                "Grand total cannot be negative".to_string(),
            ));
        }
        let id = Uuid::new_v4();
        let invoice = purchase_invoice::ActiveModel {
            id: Set(id),
            name: Set(document_name("PINV", id)),
            supplier: Set(request.supplier),
            repair_order_id: Set(request.repair_order_id),
            grand_total: Set(request.grand_total),
            docstatus: Set(DocStatus::Draft),
            ..Default::default()
        }
        .insert(&*self.db)
        .await?;
        Ok(invoice)
    }

    #[instrument(skip(self))]
    pub async fn submit_purchase_invoice(
        &self,
        id: Uuid,
    ) -> Result<purchase_invoice::Model, ServiceError> {
        self.change_purchase_invoice(id, true).await
    }

    #[instrument(skip(self))]
    pub async fn cancel_purchase_invoice(
        &self,
        id: Uuid,
    ) -> Result<purchase_invoice::Model, ServiceError> {
        self.change_purchase_invoice(id, false).await
    }

    async fn change_purchase_invoice(
        &self,
        id: Uuid,
        submit: bool,
    ) -> Result<purchase_invoice::Model, ServiceError> {
        let txn = self.db.begin().await?;
        let invoice = purchase_invoice::Entity::find_by_id(id)
            .one(&txn)
            .await?
            .ok_or_else(|| not_found("Purchase Invoice", id))?;
        let next = if submit {
            ensure_draft("Purchase Invoice", &invoice.name, invoice.docstatus)?;
            DocStatus::Submitted
        } else {
            ensure_submitted("Purchase Invoice", &invoice.name, invoice.docstatus)?;
            DocStatus::Cancelled
        };

        let mut active: purchase_invoice::ActiveModel = invoice.into();
        active.docstatus = Set(next);
        let invoice = active.update(&txn).await?;

        let mut events = Vec::new();
        let ro_id =
            linked_documents::on_purchase_invoice_changed(&txn, &invoice, &mut events).await?;
        txn.commit().await?;

        events.push(Self::state_change(
            LinkedDocumentKind::PurchaseInvoice,
            id,
            ro_id,
            submit,
        ));
        self.publish(events).await;
        Ok(invoice)
    }

    // Quotations

    #[instrument(skip(self, request))]
    pub async fn create_quotation(
        &self,
        request: QuotationRequest,
    ) -> Result<QuotationWithItems, ServiceError> {
        let txn = self.db.begin().await?;
        let created = insert_quotation(&txn, request).await?;
        txn.commit().await?;
        Ok(created)
    }

    #[instrument(skip(self))]
    pub async fn get_quotation(&self, id: Uuid) -> Result<QuotationWithItems, ServiceError> {
        load_quotation(&*self.db, id).await
    }

    #[instrument(skip(self))]
    pub async fn submit_quotation(&self, id: Uuid) -> Result<quotation::Model, ServiceError> {
        self.change_quotation(id, true).await
    }

    #[instrument(skip(self))]
    pub async fn cancel_quotation(&self, id: Uuid) -> Result<quotation::Model, ServiceError> {
        self.change_quotation(id, false).await
    }

    async fn change_quotation(
        &self,
        id: Uuid,
        submit: bool,
    ) -> Result<quotation::Model, ServiceError> {
        let txn = self.db.begin().await?;
        let doc = quotation::Entity::find_by_id(id)
            .one(&txn)
            .await?
            .ok_or_else(|| not_found("Quotation", id))?;
        let next = if submit {
            ensure_draft("Quotation", &doc.name, doc.docstatus)?;
            DocStatus::Submitted
        } else {
            ensure_submitted("Quotation", &doc.name, doc.docstatus)?;
            DocStatus::Cancelled
        };

        let mut active: quotation::ActiveModel = doc.into();
        active.docstatus = Set(next);
        let doc = active.update(&txn).await?;

        let mut events = Vec::new();
        let ro_id = linked_documents::on_quotation_changed(&txn, &doc, &mut events).await?;
        txn.commit().await?;

        events.push(Self::state_change(
            LinkedDocumentKind::Quotation,
            id,
            ro_id,
            submit,
        ));
        self.publish(events).await;
        Ok(doc)
    }

    // Sales orders

    #[instrument(skip(self, request))]
    pub async fn create_sales_order(
        &self,
        request: SalesOrderRequest,
    ) -> Result<SalesOrderWithItems, ServiceError> {
        let txn = self.db.begin().await?;
        let created = insert_sales_order(&txn, request).await?;
        txn.commit().await?;
        Ok(created)
    }

    #[instrument(skip(self))]
    pub async fn submit_sales_order(&self, id: Uuid) -> Result<sales_order::Model, ServiceError> {
        self.change_sales_order(id, true).await
    }

    #[instrument(skip(self))]
    pub async fn cancel_sales_order(&self, id: Uuid) -> Result<sales_order::Model, ServiceError> {
        self.change_sales_order(id, false).await
    }

    async fn change_sales_order(
        &self,
        id: Uuid,
        submit: bool,
    ) -> Result<sales_order::Model, ServiceError> {
        let txn = self.db.begin().await?;
        let doc = sales_order::Entity::find_by_id(id)
            .one(&txn)
            .await?
            .ok_or_else(|| not_found("Sales Order", id))?;
        let next = if submit {
            ensure_draft("Sales Order", &doc.name, doc.docstatus)?;
            DocStatus::Submitted
        } else {
            ensure_submitted("Sales Order", &doc.name, doc.docstatus)?;
            DocStatus::Cancelled
        };

        let mut active: sales_order::ActiveModel = doc.into();
        active.docstatus = Set(next);
        let doc = active.update(&txn).await?;

        let mut events = Vec::new();
        let ro_id = linked_documents::on_sales_order_changed(&txn, &doc, &mut events).await?;
        txn.commit().await?;

        events.push(Self::state_change(
            LinkedDocumentKind::SalesOrder,
            id,
            ro_id,
            submit,
        ));
        self.publish(events).await;
        Ok(doc)
    }

    // Sales invoices

    #[instrument(skip(self, request))]
    pub async fn create_sales_invoice(
        &self,
        request: SalesInvoiceRequest,
    ) -> Result<SalesInvoiceWithItems, ServiceError> {
        let txn = self.db.begin().await?;
        let created = insert_sales_invoice(&txn, request).await?;
        txn.commit().await?;
        Ok(created)
    }

    #[instrument(skip(self))]
    pub async fn get_sales_invoice(&self, id: Uuid) -> Result<SalesInvoiceWithItems, ServiceError> {
        load_sales_invoice(&*self.db, id).await
    }

    #[instrument(skip(self))]
    pub async fn submit_sales_invoice(
        &self,
        id: Uuid,
    ) -> Result<sales_invoice::Model, ServiceError> {
        self.change_sales_invoice(id, true).await
    }

    #[instrument(skip(self))]
    pub async fn cancel_sales_invoice(
        &self,
        id: Uuid,
    ) -> Result<sales_invoice::Model, ServiceError> {
        self.change_sales_invoice(id, false).await
    }

    async fn change_sales_invoice(
        &self,
        id: Uuid,
        submit: bool,
    ) -> Result<sales_invoice::Model, ServiceError> {
        let txn = self.db.begin().await?;
        let doc = sales_invoice::Entity::find_by_id(id)
            .one(&txn)
            .await?
            .ok_or_else(|| not_found("Sales Invoice", id))?;
        let (docstatus, status) = if submit {
            ensure_draft("Sales Invoice", &doc.name, doc.docstatus)?;
            (
                DocStatus::Submitted,
                SalesInvoiceStatus::from_payment(doc.paid_amount, doc.grand_total),
            )
        } else {
            ensure_submitted("Sales Invoice", &doc.name, doc.docstatus)?;
            (DocStatus::Cancelled, SalesInvoiceStatus::Cancelled)
        };

        let mut active: sales_invoice::ActiveModel = doc.into();
        active.docstatus = Set(docstatus);
        active.status = Set(status);
        let doc = active.update(&txn).await?;

        let mut events = Vec::new();
        let ro_id = linked_documents::on_sales_invoice_changed(&txn, &doc, &mut events).await?;
        txn.commit().await?;

        events.push(Self::state_change(
            LinkedDocumentKind::SalesInvoice,
            id,
            ro_id,
            submit,
        ));
        self.publish(events).await;
        Ok(doc)
    }

    /// Records money received against a submitted invoice.
    #[instrument(skip(self))]
    pub async fn record_payment(
        &self,
        id: Uuid,
        amount: Decimal,
    ) -> Result<sales_invoice::Model, ServiceError> {
        if amount <= Decimal::ZERO {
            return Err(ServiceError::ValidationError(
                "Payment amount must be positive".to_string(),
            ));
        }

        let txn = self.db.begin().await?;
        let doc = sales_invoice::Entity::find_by_id(id)
            .one(&txn)
            .await?
            .ok_or_else(|| not_found("Sales Invoice", id))?;
        if !doc.docstatus.is_submitted() {
            return Err(ServiceError::InvalidOperation(format!(
                "Sales Invoice {} is {}; payments need a submitted invoice",
                doc.name, doc.docstatus
            )));
        }

        // paid_amount only ever grows in SQL
        sales_invoice::Entity::update_many()
            .col_expr(
                sales_invoice::Column::PaidAmount,
                Expr::col(sales_invoice::Column::PaidAmount).add(amount),
            )
            .filter(sales_invoice::Column::Id.eq(id))
            .exec(&txn)
            .await?;
        let doc = sales_invoice::Entity::find_by_id(id)
            .one(&txn)
            .await?
            .ok_or_else(|| not_found("Sales Invoice", id))?;
        let paid_amount = doc.paid_amount;
        let status = SalesInvoiceStatus::from_payment(paid_amount, doc.grand_total);
        let mut active: sales_invoice::ActiveModel = doc.into();
        active.status = Set(status);
        let doc = active.update(&txn).await?;

        let mut events = Vec::new();
        linked_documents::on_payment_recorded(&txn, &doc, &mut events).await?;
        txn.commit().await?;

        info!(invoice = %doc.name, %paid_amount, status = %status, "payment recorded");
        self.publish(events).await;
        Ok(doc)
    }

    // Stock entries

    #[instrument(skip(self, request))]
    pub async fn create_stock_entry(
        &self,
        request: StockEntryRequest,
    ) -> Result<StockEntryWithItems, ServiceError> {
        let txn = self.db.begin().await?;

        let codes: Vec<String> = request.items.iter().map(|l| l.item_code.clone()).collect();
        let rates: HashMap<String, Decimal> = item::Entity::find()
            .filter(item::Column::ItemCode.is_in(codes))
            .all(&txn)
            .await?
            .into_iter()
            .map(|i| (i.item_code, i.valuation_rate))
            .collect();

        let id = Uuid::new_v4();
        let entry = stock_entry::ActiveModel {
            id: Set(id),
            name: Set(document_name("STE", id)),
            purpose: Set(request.purpose),
            repair_order_id: Set(request.repair_order_id),
            posting_date: Set(request.posting_date.unwrap_or_else(Utc::now)),
            docstatus: Set(DocStatus::Draft),
        }
        .insert(&txn)
        .await?;

        let mut items = Vec::with_capacity(request.items.len());
        for (i, line) in request.items.into_iter().enumerate() {
            let idx = i as i32 + 1;
            if line.qty <= Decimal::ZERO {
                return Err(ServiceError::ValidationError(format!(
                    "Stock row {}: quantity must be positive",
                    idx
                )));
            }
            let valuation_rate = match line.valuation_rate {
                Some(rate) => rate,
                None => *rates.get(&line.item_code).ok_or_else(|| {
                    ServiceError::ValidationError(format!(
                        "Stock row {}: Item {} does not exist",
                        idx, line.item_code
                    ))
                })?,
            };
            let row = stock_entry_detail::ActiveModel {
                id: Set(Uuid::new_v4()),
                stock_entry_id: Set(id),
                idx: Set(idx),
                item_code: Set(line.item_code),
                qty: Set(line.qty),
                valuation_rate: Set(valuation_rate),
            }
            .insert(&txn)
            .await?;
            items.push(row);
        }
        txn.commit().await?;

        Ok(StockEntryWithItems {
            stock_entry: entry,
            items,
        })
    }

    #[instrument(skip(self))]
    pub async fn submit_stock_entry(&self, id: Uuid) -> Result<stock_entry::Model, ServiceError> {
        self.change_stock_entry(id, true).await
    }

    #[instrument(skip(self))]
    pub async fn cancel_stock_entry(&self, id: Uuid) -> Result<stock_entry::Model, ServiceError> {
        self.change_stock_entry(id, false).await
    }

    async fn change_stock_entry(
        &self,
        id: Uuid,
        submit: bool,
    ) -> Result<stock_entry::Model, ServiceError> {
        let txn = self.db.begin().await?;
        let entry = stock_entry::Entity::find_by_id(id)
            .one(&txn)
            .await?
            .ok_or_else(|| not_found("Stock Entry", id))?;
        let next = if submit {
            ensure_draft("Stock Entry", &entry.name, entry.docstatus)?;
            DocStatus::Submitted
        } else {
            ensure_submitted("Stock Entry", &entry.name, entry.docstatus)?;
            DocStatus::Cancelled
        };

        let mut active: stock_entry::ActiveModel = entry.into();
        active.docstatus = Set(next);
        let entry = active.update(&txn).await?;

        let mut events = Vec::new();
        let ro_id = linked_documents::on_stock_entry_changed(&txn, &entry, &mut events).await?;
        txn.commit().await?;

        events.push(Self::state_change(
            LinkedDocumentKind::StockEntry,
            id,
            ro_id,
            submit,
        ));
        self.publish(events).await;
        Ok(entry)
    }

    // Material requests

    #[instrument(skip(self))]
    pub async fn submit_material_request(
        &self,
        id: Uuid,
    ) -> Result<material_request::Model, ServiceError> {
        let request = material_request::Entity::find_by_id(id)
            .one(&*self.db)
            .await?
            .ok_or_else(|| not_found("Material Request", id))?;
        ensure_draft("Material Request", &request.name, request.docstatus)?;

        let mut active: material_request::ActiveModel = request.into();
        active.docstatus = Set(DocStatus::Submitted);
        Ok(active.update(&*self.db).await?)
    }

    // Tasks

    #[instrument(skip(self))]
    pub async fn get_task(&self, id: Uuid) -> Result<task::Model, ServiceError> {
        task::Entity::find_by_id(id)
            .one(&*self.db)
            .await?
            .ok_or_else(|| not_found("Task", id))
    }

    /// Updates a task's status and lets the owning repair order react.
    #[instrument(skip(self))]
    pub async fn set_task_status(
        &self,
        id: Uuid,
        status: TaskStatus,
    ) -> Result<task::Model, ServiceError> {
        let txn = self.db.begin().await?;
        let existing = task::Entity::find_by_id(id)
            .one(&txn)
            .await?
            .ok_or_else(|| not_found("Task", id))?;

        let mut active: task::ActiveModel = existing.into();
        active.status = Set(status);
        let updated = active.update(&txn).await?;

        let mut events = Vec::new();
        let moved = linked_documents::on_task_status_changed(&txn, &updated, &mut events).await?;
        txn.commit().await?;

        if let Some(ro) = moved {
            info!(task = %updated.name, repair_order = %ro.name, status = %ro.status, "task update moved repair order");
        }
        events.push(Self::state_change(
            LinkedDocumentKind::Task,
            id,
            updated.repair_order_id,
            true,
        ));
        self.publish(events).await;
        Ok(updated)
    }
}
