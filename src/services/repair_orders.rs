use chrono::{DateTime, NaiveDate, Utc};
use metrics::counter;
use rust_decimal::Decimal;
use sea_orm::{
    ActiveModelTrait,
    ActiveValue::{self, Set},
    ColumnTrait, Condition, ConnectionTrait, DatabaseConnection, EntityTrait, PaginatorTrait,
    QueryFilter, QueryOrder, QuerySelect, TransactionTrait,
};
use serde::{Deserialize, Deserializer, Serialize};
use std::{collections::HashMap, sync::Arc};
use tracing::{info, instrument};
use utoipa::{IntoParams, ToSchema};
use uuid::Uuid;
use validator::Validate;

use crate::{
    common::document_name,
    entities::{
        customer_update, handover_check, item, project, repair_operation, repair_order,
        repair_part, sales_invoice, service_template, task, DocStatus, Priority,
        RepairOrderStatus, TaskStatus,
    },
    errors::ServiceError,
    events::{Event, EventSender},
    services::costing::recompute_and_save,
};

#[derive(Debug, Clone, Default, Serialize, Deserialize, ToSchema)]
pub struct OperationInput {
    pub operation_name: Option<String>,
    #[serde(default)]
    pub planned_minutes: i32,
    pub workstation: Option<String>,
    #[serde(default)]
    pub is_qc: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct PartInput {
    pub item_code: String,
    pub item_name: Option<String>,
    pub uom: Option<String>,
    #[serde(default)]
    pub qty_planned: Decimal,
    #[serde(default)]
    pub is_billable: bool,
    #[serde(default)]
    pub is_foc: bool,
    pub notes: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct CheckInput {
    pub check_item: String,
    pub check_type: Option<String>,
    #[serde(default)]
    pub is_checked: bool,
}

/// Body for creating a draft repair order or replacing one.
#[derive(Debug, Clone, Serialize, Deserialize, Validate, ToSchema)]
pub struct RepairOrderRequest {
    #[validate(length(min = 1, message = "Customer is required"))]
    pub customer: String,
    #[validate(length(min = 1, message = "Vehicle is required"))]
    pub vehicle: String,
    pub advisor: Option<String>,
    pub priority: Option<Priority>,
    pub service_template_id: Option<Uuid>,
    pub sla_response_by: Option<DateTime<Utc>>,
    pub sla_delivery_by: Option<DateTime<Utc>>,
    pub notes: Option<String>,
    #[serde(default)]
    pub operations: Vec<OperationInput>,
    #[serde(default)]
    pub parts: Vec<PartInput>,
    #[serde(default)]
    pub checklist: Vec<CheckInput>,
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct CheckMark {
    pub check_id: Uuid,
    pub is_checked: bool,
}

/// Fields that may still change once an order has been submitted.
/// Absent fields are left untouched.
#[derive(Debug, Clone, Default, Serialize, Deserialize, ToSchema)]
pub struct UpdateAfterSubmitRequest {
    pub status: Option<RepairOrderStatus>,
    pub advisor: Option<String>,
    pub sla_response_by: Option<DateTime<Utc>>,
    pub sla_delivery_by: Option<DateTime<Utc>>,
    pub notes: Option<String>,
    /// A value pins other charges by hand; an explicit `null` hands them back
    /// to the purchase invoice total.
    #[serde(default, deserialize_with = "present_or_null")]
    #[schema(value_type = Option<String>)]
    pub other_charges: Option<Option<Decimal>>,
    #[serde(default)]
    pub checks: Vec<CheckMark>,
}

fn present_or_null<'de, D, T>(deserializer: D) -> Result<Option<Option<T>>, D::Error>
where
    D: Deserializer<'de>,
    T: Deserialize<'de>,
{
    Option::<T>::deserialize(deserializer).map(Some)
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct SetStatusRequest {
    pub status: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct ApplyTemplateRequest {
    pub template_id: Uuid,
}

#[derive(Debug, Clone, Serialize, Deserialize, Validate, ToSchema)]
pub struct CustomerUpdateRequest {
    #[validate(length(min = 1, message = "Message is required"))]
    pub message: String,
    #[serde(default)]
    pub visible_on_portal: bool,
}

#[derive(Debug, Clone, Default, Deserialize, IntoParams, ToSchema)]
#[into_params(parameter_in = Query)]
pub struct ListRepairOrdersQuery {
    pub status: Option<String>,
    pub customer: Option<String>,
    pub vehicle: Option<String>,
    pub page: Option<u64>,
    pub limit: Option<u64>,
}

/// A repair order with its child rows.
#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct RepairOrderDetail {
    #[serde(flatten)]
    pub repair_order: repair_order::Model,
    pub operations: Vec<repair_operation::Model>,
    pub parts: Vec<repair_part::Model>,
    pub checklist: Vec<handover_check::Model>,
}

#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct PortalTask {
    pub name: String,
    pub subject: String,
    pub status: TaskStatus,
    pub exp_start_date: Option<NaiveDate>,
    pub exp_end_date: Option<NaiveDate>,
}

#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct PortalUpdate {
    pub message: String,
    pub created_at: DateTime<Utc>,
}

/// What a customer sees about their repair.
#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct RepairStatusPage {
    pub name: String,
    pub status: RepairOrderStatus,
    pub vehicle: String,
    pub customer: String,
    pub tasks: Vec<PortalTask>,
    pub updates: Vec<PortalUpdate>,
}

/// Rejects a parts-plan row flagged both billable and free of charge.
pub fn check_part_flags(idx: i32, is_billable: bool, is_foc: bool) -> Result<(), ServiceError> {
    if is_billable && is_foc {
        return Err(ServiceError::ValidationError(format!(
            "Parts Plan row {} cannot be both Billable and FoC",
            idx
        )));
    }
    Ok(())
}

pub fn check_sla_order(
    response_by: Option<DateTime<Utc>>,
    delivery_by: Option<DateTime<Utc>>,
) -> Result<(), ServiceError> {
    if let (Some(response_by), Some(delivery_by)) = (response_by, delivery_by) {
        if delivery_by < response_by {
            return Err(ServiceError::ValidationError(
                "SLA Delivery By cannot be before SLA Response By".to_string(),
            ));
        }
    }
    Ok(())
}

fn check_header(request: &RepairOrderRequest) -> Result<(), ServiceError> {
    request.validate()?;
    if request.customer.trim().is_empty() || request.vehicle.trim().is_empty() {
        return Err(ServiceError::ValidationError(
            "Customer and Vehicle are required".to_string(),
        ));
    }
    check_sla_order(request.sla_response_by, request.sla_delivery_by)
}

async fn next_idx<C, E, F>(conn: &C, filter: F) -> Result<i32, ServiceError>
where
    C: ConnectionTrait,
    E: EntityTrait,
    E::Model: Sync,
    F: sea_orm::sea_query::IntoCondition,
{
    Ok(E::find().filter(filter).count(conn).await? as i32 + 1)
}

async fn insert_operations<C: ConnectionTrait>(
    conn: &C,
    repair_order_id: Uuid,
    first_idx: i32,
    operations: Vec<OperationInput>,
) -> Result<(), ServiceError> {
    for (offset, op) in operations.into_iter().enumerate() {
        let idx = first_idx + offset as i32;
        if op.planned_minutes < 0 {
            return Err(ServiceError::ValidationError(format!(
                "Operation row {} cannot have negative planned minutes",
                idx
            )));
        }
        repair_operation::ActiveModel {
            id: Set(Uuid::new_v4()),
            repair_order_id: Set(repair_order_id),
            idx: Set(idx),
            operation_name: Set(op.operation_name),
            planned_minutes: Set(op.planned_minutes),
            workstation: Set(op.workstation),
            is_qc: Set(op.is_qc),
            task_id: Set(None),
        }
        .insert(conn)
        .await?;
    }
    Ok(())
}

/// Validates and stores parts-plan rows, filling missing item names from the item master.
async fn insert_parts<C: ConnectionTrait>(
    conn: &C,
    repair_order_id: Uuid,
    first_idx: i32,
    parts: Vec<PartInput>,
) -> Result<(), ServiceError> {
    if parts.is_empty() {
        return Ok(());
    }

    let codes: Vec<String> = parts.iter().map(|p| p.item_code.clone()).collect();
    let items: HashMap<String, item::Model> = item::Entity::find()
        .filter(item::Column::ItemCode.is_in(codes))
        .all(conn)
        .await?
        .into_iter()
        .map(|i| (i.item_code.clone(), i))
        .collect();

    for (offset, part) in parts.into_iter().enumerate() {
        let idx = first_idx + offset as i32;
        check_part_flags(idx, part.is_billable, part.is_foc)?;
        if part.qty_planned.is_sign_negative() {
            return Err(ServiceError::ValidationError(format!(
                "Parts Plan row {} cannot have a negative quantity",
                idx
            )));
        }
        let master = items.get(&part.item_code).ok_or_else(|| {
            ServiceError::ValidationError(format!(
                "Parts Plan row {}: Item {} does not exist",
                idx, part.item_code
            ))
        })?;

        let item_name = part
            .item_name
            .filter(|name| !name.trim().is_empty())
            .unwrap_or_else(|| master.item_name.clone());

        repair_part::ActiveModel {
            id: Set(Uuid::new_v4()),
            repair_order_id: Set(repair_order_id),
            idx: Set(idx),
            item_code: Set(part.item_code),
            item_name: Set(Some(item_name)),
            uom: Set(part.uom),
            qty_planned: Set(part.qty_planned),
            is_billable: Set(part.is_billable),
            is_foc: Set(part.is_foc),
            notes: Set(part.notes),
        }
        .insert(conn)
        .await?;
    }
    Ok(())
}

async fn insert_checks<C: ConnectionTrait>(
    conn: &C,
    repair_order_id: Uuid,
    first_idx: i32,
    checks: Vec<CheckInput>,
) -> Result<(), ServiceError> {
    for (offset, check) in checks.into_iter().enumerate() {
        handover_check::ActiveModel {
            id: Set(Uuid::new_v4()),
            repair_order_id: Set(repair_order_id),
            idx: Set(first_idx + offset as i32),
            check_item: Set(check.check_item),
            check_type: Set(check.check_type),
            is_checked: Set(check.is_checked),
        }
        .insert(conn)
        .await?;
    }
    Ok(())
}

/// Appends a template's rows after the order's existing rows and marks it applied.
pub async fn apply_template_rows<C: ConnectionTrait>(
    conn: &C,
    ro: repair_order::Model,
    template: &service_template::Model,
) -> Result<repair_order::Model, ServiceError> {
    let operations = template
        .operations()?
        .into_iter()
        .map(|op| OperationInput {
            operation_name: op.operation_name,
            planned_minutes: op.planned_minutes,
            workstation: op.workstation,
            is_qc: op.is_qc,
        })
        .collect();
    let parts = template
        .parts()?
        .into_iter()
        .map(|p| PartInput {
            item_code: p.item_code,
            item_name: None,
            uom: p.uom,
            qty_planned: p.qty_planned,
            is_billable: p.is_billable,
            is_foc: p.is_foc,
            notes: None,
        })
        .collect();
    let checks = template
        .checklist()?
        .into_iter()
        .map(|c| CheckInput {
            check_item: c.check_item,
            check_type: c.check_type,
            is_checked: false,
        })
        .collect();

    let op_idx = next_idx::<_, repair_operation::Entity, _>(
        conn,
        repair_operation::Column::RepairOrderId.eq(ro.id),
    )
    .await?;
    let part_idx =
        next_idx::<_, repair_part::Entity, _>(conn, repair_part::Column::RepairOrderId.eq(ro.id))
            .await?;
    let check_idx = next_idx::<_, handover_check::Entity, _>(
        conn,
        handover_check::Column::RepairOrderId.eq(ro.id),
    )
    .await?;

    insert_operations(conn, ro.id, op_idx, operations).await?;
    insert_parts(conn, ro.id, part_idx, parts).await?;
    insert_checks(conn, ro.id, check_idx, checks).await?;

    let mut active: repair_order::ActiveModel = ro.into();
    active.service_template_id = Set(Some(template.id));
    active.template_applied = Set(true);
    save_repair_order(conn, active).await
}

/// Blocks moves into Ready for Handover or Closed until their preconditions hold.
pub async fn check_status_guards<C: ConnectionTrait>(
    conn: &C,
    ro: &repair_order::Model,
    target: RepairOrderStatus,
) -> Result<(), ServiceError> {
    match target {
        RepairOrderStatus::ReadyForHandover => {
            let qc_ops = repair_operation::Entity::find()
                .filter(repair_operation::Column::RepairOrderId.eq(ro.id))
                .filter(repair_operation::Column::IsQc.eq(true))
                .order_by_asc(repair_operation::Column::Idx)
                .all(conn)
                .await?;
            let task_ids: Vec<Uuid> = qc_ops.iter().filter_map(|op| op.task_id).collect();
            let tasks: HashMap<Uuid, task::Model> = if task_ids.is_empty() {
                HashMap::new()
            } else {
                task::Entity::find()
                    .filter(task::Column::Id.is_in(task_ids))
                    .all(conn)
                    .await?
                    .into_iter()
                    .map(|t| (t.id, t))
                    .collect()
            };

            let incomplete: Vec<String> = qc_ops
                .iter()
                .filter_map(|op| {
                    let linked = op.task_id.and_then(|id| tasks.get(&id));
                    if matches!(linked, Some(t) if t.status == TaskStatus::Closed) {
                        return None;
                    }
                    let named = op
                        .operation_name
                        .as_deref()
                        .map(str::trim)
                        .filter(|n| !n.is_empty())
                        .map(str::to_string);
                    Some(
                        named
                            .or_else(|| linked.map(|t| t.name.clone()))
                            .unwrap_or_else(|| op.task_subject()),
                    )
                })
                .collect();

            if !incomplete.is_empty() {
                return Err(ServiceError::ValidationError(format!(
                    "Cannot set Ready for Handover. QC tasks incomplete: {}",
                    incomplete.join(", ")
                )));
            }
        }
        RepairOrderStatus::Closed => {
            if let Some(invoice_id) = ro.sales_invoice_id {
                let paid_enough = sales_invoice::Entity::find_by_id(invoice_id)
                    .one(conn)
                    .await?
                    .map_or(false, |si| si.status.allows_closing());
                if !paid_enough {
                    return Err(ServiceError::ValidationError(
                        "Cannot Close. Linked Sales Invoice not fully paid.".to_string(),
                    ));
                }
            }
        }
        _ => {}
    }
    Ok(())
}

/// Moves `ro` to `target`: guards, timestamps, cost recompute and snapshot.
/// The status change event is queued on `events` for the caller to publish.
pub async fn transition_status<C: ConnectionTrait>(
    conn: &C,
    ro: repair_order::Model,
    target: RepairOrderStatus,
    events: &mut Vec<Event>,
) -> Result<repair_order::Model, ServiceError> {
    let from = ro.status;
    if from == target {
        return recompute_and_save(conn, ro).await;
    }

    check_status_guards(conn, &ro, target).await?;

    let mut active: repair_order::ActiveModel = ro.into();
    active.status = Set(target);
    active.status_changed_at = Set(Utc::now());
    let updated = save_repair_order(conn, active).await?;
    let saved = recompute_and_save(conn, updated).await?;

    events.push(Event::RepairOrderStatusChanged {
        repair_order_id: saved.id,
        old_status: from,
        new_status: target,
    });
    Ok(saved)
}

pub async fn load_detail<C: ConnectionTrait>(
    conn: &C,
    ro: repair_order::Model,
) -> Result<RepairOrderDetail, ServiceError> {
    let operations = repair_operation::Entity::find()
        .filter(repair_operation::Column::RepairOrderId.eq(ro.id))
        .order_by_asc(repair_operation::Column::Idx)
        .all(conn)
        .await?;
    let parts = repair_part::Entity::find()
        .filter(repair_part::Column::RepairOrderId.eq(ro.id))
        .order_by_asc(repair_part::Column::Idx)
        .all(conn)
        .await?;
    let checklist = handover_check::Entity::find()
        .filter(handover_check::Column::RepairOrderId.eq(ro.id))
        .order_by_asc(handover_check::Column::Idx)
        .all(conn)
        .await?;

    Ok(RepairOrderDetail {
        repair_order: ro,
        operations,
        parts,
        checklist,
    })
}

pub async fn find_repair_order<C: ConnectionTrait>(
    conn: &C,
    id: Uuid,
) -> Result<repair_order::Model, ServiceError> {
    repair_order::Entity::find_by_id(id)
        .one(conn)
        .await?
        .ok_or_else(|| ServiceError::NotFound(format!("Repair Order {} not found", id)))
}

/// Writes the changed columns of `active` when the stored version still
/// matches the one it was read at, bumping the version.
pub async fn save_repair_order<C: ConnectionTrait>(
    conn: &C,
    mut active: repair_order::ActiveModel,
) -> Result<repair_order::Model, ServiceError> {
    let (id, version) = match (&active.id, &active.version) {
        (
            ActiveValue::Set(id) | ActiveValue::Unchanged(id),
            ActiveValue::Set(version) | ActiveValue::Unchanged(version),
        ) => (*id, *version),
        _ => {
            return Err(ServiceError::InternalError(
                "Repair Order save needs a loaded id and version".to_string(),
            ))
        }
    };

    active.version = Set(version + 1);
    active.updated_at = Set(Utc::now());
    let result = repair_order::Entity::update_many()
        .set(active)
        .filter(repair_order::Column::Id.eq(id))
        .filter(repair_order::Column::Version.eq(version))
        .exec(conn)
        .await?;
    if result.rows_affected == 0 {
        return Err(ServiceError::Conflict(format!(
            "Repair Order {} was changed by another request; reload and try again",
            id
        )));
    }
    find_repair_order(conn, id).await
}

/// Repair order lifecycle: drafting, submission, status changes and customer-facing updates.
#[derive(Clone)]
pub struct RepairOrderService {
    db: Arc<DatabaseConnection>,
    event_sender: EventSender,
}

impl RepairOrderService {
    pub fn new(db: Arc<DatabaseConnection>, event_sender: EventSender) -> Self {
        Self { db, event_sender }
    }

    async fn publish(&self, events: Vec<Event>) {
        for event in events {
            self.event_sender.send_or_log(event).await;
        }
    }

    /// Creates a draft repair order with its operations, parts plan and checklist.
    #[instrument(skip(self, request), fields(customer = %request.customer, vehicle = %request.vehicle))]
    pub async fn create_repair_order(
        &self,
        request: RepairOrderRequest,
    ) -> Result<RepairOrderDetail, ServiceError> {
        check_header(&request)?;

        let txn = self.db.begin().await?;
        let id = Uuid::new_v4();
        let ro = repair_order::ActiveModel {
            id: Set(id),
            name: Set(document_name("RO", id)),
            customer: Set(request.customer.trim().to_string()),
            vehicle: Set(request.vehicle.trim().to_string()),
            advisor: Set(request.advisor),
            priority: Set(request.priority.unwrap_or_default()),
            status: Set(RepairOrderStatus::Scheduled),
            docstatus: Set(DocStatus::Draft),
            service_template_id: Set(request.service_template_id),
            template_applied: Set(false),
            project_id: Set(None),
            quotation_id: Set(None),
            sales_order_id: Set(None),
            sales_invoice_id: Set(None),
            sla_response_by: Set(request.sla_response_by),
            sla_delivery_by: Set(request.sla_delivery_by),
            parts_cost: Set(Decimal::ZERO),
            labor_cost: Set(Decimal::ZERO),
            other_charges: Set(Decimal::ZERO),
            other_charges_manual: Set(false),
            total_job_cost: Set(Decimal::ZERO),
            quoted_amount: Set(Decimal::ZERO),
            invoiced_amount: Set(Decimal::ZERO),
            gross_margin: Set(Decimal::ZERO),
            notes: Set(request.notes),
            ..Default::default()
        }
        .insert(&txn)
        .await?;

        insert_operations(&txn, id, 1, request.operations).await?;
        insert_parts(&txn, id, 1, request.parts).await?;
        insert_checks(&txn, id, 1, request.checklist).await?;

        let saved = recompute_and_save(&txn, ro).await?;
        let detail = load_detail(&txn, saved).await?;
        txn.commit().await?;

        counter!("repairshop.repair_orders.created", 1);
        info!(repair_order = %detail.repair_order.name, "repair order created");
        self.publish(vec![Event::RepairOrderCreated {
            repair_order_id: id,
            name: detail.repair_order.name.clone(),
        }])
        .await;

        Ok(detail)
    }

    /// Replaces the header and child rows of a draft.
    #[instrument(skip(self, request))]
    pub async fn update_repair_order(
        &self,
        id: Uuid,
        request: RepairOrderRequest,
    ) -> Result<RepairOrderDetail, ServiceError> {
        check_header(&request)?;

        let txn = self.db.begin().await?;
        let ro = find_repair_order(&txn, id).await?;
        if ro.docstatus != DocStatus::Draft {
            return Err(ServiceError::InvalidOperation(format!(
                "Repair Order {} is {} and can no longer be edited",
                ro.name, ro.docstatus
            )));
        }

        let template_changed = ro.service_template_id != request.service_template_id;
        let mut active: repair_order::ActiveModel = ro.into();
        active.customer = Set(request.customer.trim().to_string());
        active.vehicle = Set(request.vehicle.trim().to_string());
        active.advisor = Set(request.advisor);
        active.priority = Set(request.priority.unwrap_or_default());
        active.service_template_id = Set(request.service_template_id);
        if template_changed {
            active.template_applied = Set(false);
        }
        active.sla_response_by = Set(request.sla_response_by);
        active.sla_delivery_by = Set(request.sla_delivery_by);
        active.notes = Set(request.notes);
        let updated = save_repair_order(&txn, active).await?;

        repair_operation::Entity::delete_many()
            .filter(repair_operation::Column::RepairOrderId.eq(id))
            .exec(&txn)
            .await?;
        repair_part::Entity::delete_many()
            .filter(repair_part::Column::RepairOrderId.eq(id))
            .exec(&txn)
            .await?;
        handover_check::Entity::delete_many()
            .filter(handover_check::Column::RepairOrderId.eq(id))
            .exec(&txn)
            .await?;

        insert_operations(&txn, id, 1, request.operations).await?;
        insert_parts(&txn, id, 1, request.parts).await?;
        insert_checks(&txn, id, 1, request.checklist).await?;

        let saved = recompute_and_save(&txn, updated).await?;
        let detail = load_detail(&txn, saved).await?;
        txn.commit().await?;
        Ok(detail)
    }

    #[instrument(skip(self))]
    pub async fn apply_service_template(
        &self,
        id: Uuid,
        template_id: Uuid,
    ) -> Result<RepairOrderDetail, ServiceError> {
        let txn = self.db.begin().await?;
        let ro = find_repair_order(&txn, id).await?;
        if ro.docstatus != DocStatus::Draft {
            return Err(ServiceError::InvalidOperation(
                "Cannot apply template to submitted Repair Order".to_string(),
            ));
        }
        let template = service_template::Entity::find_by_id(template_id)
            .one(&txn)
            .await?
            .ok_or_else(|| {
                ServiceError::NotFound(format!("Service Template {} not found", template_id))
            })?;

        let updated = apply_template_rows(&txn, ro, &template).await?;
        let saved = recompute_and_save(&txn, updated).await?;
        let detail = load_detail(&txn, saved).await?;
        txn.commit().await?;

        info!(
            repair_order = %detail.repair_order.name,
            template = %template.template_name,
            "service template applied"
        );
        Ok(detail)
    }

    /// Submits a draft: applies a pending template, opens the project with
    /// one task per operation, recomputes costs and snapshots them.
    #[instrument(skip(self))]
    pub async fn submit_repair_order(&self, id: Uuid) -> Result<RepairOrderDetail, ServiceError> {
        let txn = self.db.begin().await?;
        let mut ro = find_repair_order(&txn, id).await?;
        if ro.docstatus != DocStatus::Draft {
            return Err(ServiceError::InvalidOperation(format!(
                "Repair Order {} is already {}",
                ro.name, ro.docstatus
            )));
        }

        if let (Some(template_id), false) = (ro.service_template_id, ro.template_applied) {
            let template = service_template::Entity::find_by_id(template_id)
                .one(&txn)
                .await?
                .ok_or_else(|| {
                    ServiceError::NotFound(format!("Service Template {} not found", template_id))
                })?;
            ro = apply_template_rows(&txn, ro, &template).await?;
        }

        let mut active: repair_order::ActiveModel = ro.into();
        active.docstatus = Set(DocStatus::Submitted);
        let mut ro = save_repair_order(&txn, active).await?;

        let mut tasks_created = 0;
        if ro.project_id.is_none() {
            let (project_id, created) = create_project_and_tasks(&txn, &ro).await?;
            tasks_created = created;
            let mut active: repair_order::ActiveModel = ro.into();
            active.project_id = Set(Some(project_id));
            ro = save_repair_order(&txn, active).await?;
        }

        let saved = recompute_and_save(&txn, ro).await?;
        let detail = load_detail(&txn, saved).await?;
        txn.commit().await?;

        counter!("repairshop.repair_orders.submitted", 1);
        info!(
            repair_order = %detail.repair_order.name,
            tasks_created,
            "repair order submitted"
        );
        self.publish(vec![Event::RepairOrderSubmitted {
            repair_order_id: id,
            project_id: detail.repair_order.project_id,
            tasks_created,
        }])
        .await;

        Ok(detail)
    }

    /// Edits a submitted order. Status moves here are limited to the
    /// workshop progress statuses and pass the handover and closing guards.
    #[instrument(skip(self, request))]
    pub async fn update_after_submit(
        &self,
        id: Uuid,
        request: UpdateAfterSubmitRequest,
    ) -> Result<RepairOrderDetail, ServiceError> {
        let txn = self.db.begin().await?;
        let ro = find_repair_order(&txn, id).await?;
        if !ro.docstatus.is_submitted() {
            return Err(ServiceError::InvalidOperation(format!(
                "Repair Order {} is {}; only submitted orders can be updated this way",
                ro.name, ro.docstatus
            )));
        }

        let target = request.status.filter(|status| *status != ro.status);
        if let Some(target) = target {
            if ro.status.is_terminal() {
                return Err(ServiceError::InvalidOperation(format!(
                    "Repair Order {} is {} and its status can no longer change",
                    ro.name, ro.status
                )));
            }
            if !target.is_progress_target() {
                return Err(ServiceError::ValidationError(format!(
                    "Status {} cannot be set by editing a submitted Repair Order",
                    target
                )));
            }
        }

        let sla_response_by = request.sla_response_by.or(ro.sla_response_by);
        let sla_delivery_by = request.sla_delivery_by.or(ro.sla_delivery_by);
        check_sla_order(sla_response_by, sla_delivery_by)?;

        for mark in &request.checks {
            let check = handover_check::Entity::find_by_id(mark.check_id)
                .filter(handover_check::Column::RepairOrderId.eq(id))
                .one(&txn)
                .await?
                .ok_or_else(|| {
                    ServiceError::NotFound(format!("Handover check {} not found", mark.check_id))
                })?;
            let mut active: handover_check::ActiveModel = check.into();
            active.is_checked = Set(mark.is_checked);
            active.update(&txn).await?;
        }

        let mut active: repair_order::ActiveModel = ro.into();
        if let Some(advisor) = request.advisor {
            active.advisor = Set(Some(advisor));
        }
        if let Some(notes) = request.notes {
            active.notes = Set(Some(notes));
        }
        active.sla_response_by = Set(sla_response_by);
        active.sla_delivery_by = Set(sla_delivery_by);
        match request.other_charges {
            Some(Some(amount)) if amount < Decimal::ZERO => {
                return Err(ServiceError::ValidationError(format!(
                    "Other Charges cannot be negative: {}",
                    amount
                )));
            }
            Some(Some(amount)) => {
                active.other_charges = Set(amount);
                active.other_charges_manual = Set(true);
            }
            Some(None) => active.other_charges_manual = Set(false),
            None => {}
        }
        let updated = save_repair_order(&txn, active).await?;

        let mut events = Vec::new();
        let saved = match target {
            Some(target) => transition_status(&txn, updated, target, &mut events).await?,
            None => recompute_and_save(&txn, updated).await?,
        };
        let detail = load_detail(&txn, saved).await?;
        txn.commit().await?;

        self.publish(events).await;
        Ok(detail)
    }

    /// Manual status button: only Scheduled, On Hold and Cancelled.
    #[instrument(skip(self))]
    pub async fn set_status(&self, id: Uuid, status: &str) -> Result<RepairOrderDetail, ServiceError> {
        let target = status
            .parse::<RepairOrderStatus>()
            .ok()
            .filter(|s| s.is_manual_target())
            .ok_or_else(|| {
                ServiceError::ValidationError(format!(
                    "Cannot manually set status to {}. Use buttons for: Scheduled, On Hold, Cancelled",
                    status
                ))
            })?;

        let txn = self.db.begin().await?;
        let ro = find_repair_order(&txn, id).await?;
        if ro.status.is_terminal() {
            return Err(ServiceError::InvalidOperation(format!(
                "Repair Order {} is already {}",
                ro.name, ro.status
            )));
        }

        let mut events = Vec::new();
        let saved = transition_status(&txn, ro, target, &mut events).await?;
        let detail = load_detail(&txn, saved).await?;
        txn.commit().await?;

        counter!("repairshop.status.manual_changes", 1);
        self.publish(events).await;
        Ok(detail)
    }

    #[instrument(skip(self))]
    pub async fn cancel_repair_order(&self, id: Uuid) -> Result<RepairOrderDetail, ServiceError> {
        let txn = self.db.begin().await?;
        let ro = find_repair_order(&txn, id).await?;
        if !ro.docstatus.is_submitted() {
            return Err(ServiceError::InvalidOperation(format!(
                "Repair Order {} is {} and cannot be cancelled",
                ro.name, ro.docstatus
            )));
        }

        let from = ro.status;
        let mut active: repair_order::ActiveModel = ro.into();
        active.docstatus = Set(DocStatus::Cancelled);
        active.status = Set(RepairOrderStatus::Cancelled);
        active.status_changed_at = Set(Utc::now());
        let updated = save_repair_order(&txn, active).await?;
        let saved = recompute_and_save(&txn, updated).await?;
        let detail = load_detail(&txn, saved).await?;
        txn.commit().await?;

        let mut events = vec![Event::RepairOrderCancelled(id)];
        if from != RepairOrderStatus::Cancelled {
            events.push(Event::RepairOrderStatusChanged {
                repair_order_id: id,
                old_status: from,
                new_status: RepairOrderStatus::Cancelled,
            });
        }
        self.publish(events).await;
        Ok(detail)
    }

    #[instrument(skip(self))]
    pub async fn get_repair_order(&self, id: Uuid) -> Result<RepairOrderDetail, ServiceError> {
        let ro = find_repair_order(&*self.db, id).await?;
        load_detail(&*self.db, ro).await
    }

    #[instrument(skip(self))]
    pub async fn list_repair_orders(
        &self,
        query: &ListRepairOrdersQuery,
    ) -> Result<(Vec<repair_order::Model>, u64), ServiceError> {
        let mut filter = Condition::all();
        if let Some(raw) = query.status.as_deref() {
            let status = raw
                .parse::<RepairOrderStatus>()
                .map_err(ServiceError::ValidationError)?;
            filter = filter.add(repair_order::Column::Status.eq(status));
        }
        if let Some(customer) = query.customer.as_deref() {
            filter = filter.add(repair_order::Column::Customer.eq(customer));
        }
        if let Some(vehicle) = query.vehicle.as_deref() {
            filter = filter.add(repair_order::Column::Vehicle.eq(vehicle));
        }

        let page = query.page.unwrap_or(1).max(1);
        let limit = query.limit.unwrap_or(20).clamp(1, 200);

        let total = repair_order::Entity::find()
            .filter(filter.clone())
            .count(&*self.db)
            .await?;
        let rows = repair_order::Entity::find()
            .filter(filter)
            .order_by_desc(repair_order::Column::CreatedAt)
            .offset(page.saturating_sub(1).saturating_mul(limit))
            .limit(limit)
            .all(&*self.db)
            .await?;

        Ok((rows, total))
    }

    #[instrument(skip(self, request))]
    pub async fn add_customer_update(
        &self,
        id: Uuid,
        request: CustomerUpdateRequest,
    ) -> Result<customer_update::Model, ServiceError> {
        request.validate()?;
        let ro = find_repair_order(&*self.db, id).await?;

        let update = customer_update::ActiveModel {
            id: Set(Uuid::new_v4()),
            repair_order_id: Set(ro.id),
            message: Set(request.message),
            visible_on_portal: Set(request.visible_on_portal),
            ..Default::default()
        }
        .insert(&*self.db)
        .await?;
        Ok(update)
    }

    /// Public status page data, looked up by document name.
    #[instrument(skip(self))]
    pub async fn repair_status(&self, name: &str) -> Result<RepairStatusPage, ServiceError> {
        let db = &*self.db;
        let ro = repair_order::Entity::find()
            .filter(repair_order::Column::Name.eq(name))
            .one(db)
            .await?
            .ok_or_else(|| ServiceError::NotFound(format!("Repair Order {} not found", name)))?;

        let tasks = match ro.project_id {
            Some(project_id) => task::Entity::find()
                .filter(task::Column::ProjectId.eq(project_id))
                .order_by_asc(task::Column::CreatedAt)
                .order_by_asc(task::Column::Name)
                .all(db)
                .await?
                .into_iter()
                .map(|t| PortalTask {
                    name: t.name,
                    subject: t.subject,
                    status: t.status,
                    exp_start_date: t.exp_start_date,
                    exp_end_date: t.exp_end_date,
                })
                .collect(),
            None => Vec::new(),
        };

        let updates = customer_update::Entity::find()
            .filter(customer_update::Column::RepairOrderId.eq(ro.id))
            .filter(customer_update::Column::VisibleOnPortal.eq(true))
            .order_by_desc(customer_update::Column::CreatedAt)
            .all(db)
            .await?
            .into_iter()
            .map(|u| PortalUpdate {
                message: u.message,
                created_at: u.created_at,
            })
            .collect();

        Ok(RepairStatusPage {
            name: ro.name,
            status: ro.status,
            vehicle: ro.vehicle,
            customer: ro.customer,
            tasks,
            updates,
        })
    }
}

/// Opens the project of a newly submitted order and one task per operation.
/// Returns the project id and the number of tasks created.
async fn create_project_and_tasks<C: ConnectionTrait>(
    conn: &C,
    ro: &repair_order::Model,
) -> Result<(Uuid, usize), ServiceError> {
    let project_id = Uuid::new_v4();
    project::ActiveModel {
        id: Set(project_id),
        name: Set(document_name("PROJ", project_id)),
        project_name: Set(format!("RO {} - {}", ro.name, ro.customer)),
        customer: Set(Some(ro.customer.clone())),
        repair_order_id: Set(Some(ro.id)),
        ..Default::default()
    }
    .insert(conn)
    .await?;

    let operations = repair_operation::Entity::find()
        .filter(repair_operation::Column::RepairOrderId.eq(ro.id))
        .order_by_asc(repair_operation::Column::Idx)
        .all(conn)
        .await?;

    let today = Utc::now().date_naive();
    let created = operations.len();
    for op in operations {
        let task_id = Uuid::new_v4();
        task::ActiveModel {
            id: Set(task_id),
            name: Set(document_name("TASK", task_id)),
            subject: Set(op.task_subject()),
            project_id: Set(Some(project_id)),
            repair_order_id: Set(Some(ro.id)),
            status: Set(TaskStatus::Open),
            exp_start_date: Set(Some(today)),
            exp_end_date: Set(None),
            ..Default::default()
        }
        .insert(conn)
        .await?;

        let mut active: repair_operation::ActiveModel = op.into();
        active.task_id = Set(Some(task_id));
        active.update(conn).await?;
    }

    Ok((project_id, created))
}

#[cfg(test)]
mod tests {
    use super::*;
    use assert_matches::assert_matches;
    use chrono::TimeZone;
    use rstest::rstest;

    #[rstest]
    #[case(true, false)]
    #[case(false, true)]
    #[case(false, false)]
    fn single_flag_parts_are_fine(#[case] billable: bool, #[case] foc: bool) {
        assert!(check_part_flags(1, billable, foc).is_ok());
    }

    #[test]
    fn billable_and_foc_together_is_rejected() {
        let err = check_part_flags(3, true, true).unwrap_err();
        assert_matches!(err, ServiceError::ValidationError(ref msg)
            if msg == "Parts Plan row 3 cannot be both Billable and FoC");
    }

    #[test]
    fn delivery_before_response_is_rejected() {
        let response = Utc.with_ymd_and_hms(2024, 5, 2, 9, 0, 0).unwrap();
        let delivery = Utc.with_ymd_and_hms(2024, 5, 1, 17, 0, 0).unwrap();

        assert_matches!(
            check_sla_order(Some(response), Some(delivery)),
            Err(ServiceError::ValidationError(ref msg))
                if msg == "SLA Delivery By cannot be before SLA Response By"
        );
        assert!(check_sla_order(Some(delivery), Some(response)).is_ok());
        assert!(check_sla_order(None, Some(delivery)).is_ok());
    }

    #[test]
    fn other_charges_distinguishes_null_from_absent() {
        let absent: UpdateAfterSubmitRequest = serde_json::from_str("{}").unwrap();
        assert_eq!(absent.other_charges, None);

        let cleared: UpdateAfterSubmitRequest =
            serde_json::from_str(r#"{"other_charges": null}"#).unwrap();
        assert_eq!(cleared.other_charges, Some(None));

        let pinned: UpdateAfterSubmitRequest =
            serde_json::from_str(r#"{"other_charges": "45.50"}"#).unwrap();
        assert_eq!(pinned.other_charges, Some(Some(Decimal::new(4550, 2))));
    }

    #[test]
    fn blank_customer_fails_validation() {
        let request = RepairOrderRequest {
            customer: "  ".into(),
            vehicle: "KA-01-1234".into(),
            advisor: None,
            priority: None,
            service_template_id: None,
            sla_response_by: None,
            sla_delivery_by: None,
            notes: None,
            operations: vec![],
            parts: vec![],
            checklist: vec![],
        };
        assert_matches!(check_header(&request), Err(ServiceError::ValidationError(_)));
    }
}
