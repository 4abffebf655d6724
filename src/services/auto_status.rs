//! Status moves that happen on their own when linked tasks or invoices change.
//!
//! Transitions only ever advance along Scheduled → In Progress → Completed →
//! Invoiced, and never fire once an order is parked or finished.

use metrics::counter;
use sea_orm::{ColumnTrait, ConnectionTrait, EntityTrait, QueryFilter};
use tracing::{debug, info};
use uuid::Uuid;

use crate::{
    entities::{project, repair_operation, repair_order, sales_invoice, task, RepairOrderStatus},
    errors::ServiceError,
    events::Event,
    services::repair_orders::transition_status,
};

/// Finds the repair order a task works for, falling back to its project's order.
pub async fn repair_order_of_task<C: ConnectionTrait>(
    conn: &C,
    task: &task::Model,
) -> Result<Option<Uuid>, ServiceError> {
    if task.repair_order_id.is_some() {
        return Ok(task.repair_order_id);
    }
    let Some(project_id) = task.project_id else {
        return Ok(None);
    };
    Ok(project::Entity::find_by_id(project_id)
        .one(conn)
        .await?
        .and_then(|p| p.repair_order_id))
}

/// Reacts to a task status change.
pub async fn on_task_status_changed<C: ConnectionTrait>(
    conn: &C,
    task: &task::Model,
    events: &mut Vec<Event>,
) -> Result<Option<repair_order::Model>, ServiceError> {
    let Some(ro_id) = repair_order_of_task(conn, task).await? else {
        return Ok(None);
    };
    let Some(ro) = repair_order::Entity::find_by_id(ro_id).one(conn).await? else {
        return Ok(None);
    };

    if !ro.docstatus.is_submitted() || ro.status.blocks_task_automation() {
        debug!(repair_order = %ro.name, status = %ro.status, "task automation skipped");
        return Ok(None);
    }

    if task.status.signals_start() && ro.status == RepairOrderStatus::Scheduled {
        let saved = auto_transition(conn, ro, RepairOrderStatus::InProgress, events).await?;
        return Ok(Some(saved));
    }

    if task.status.signals_done() {
        return check_and_complete(conn, ro, events).await;
    }

    Ok(None)
}

/// Completes an in-progress order once every operation task is finished.
/// Orders whose operations have no tasks are left alone.
pub async fn check_and_complete<C: ConnectionTrait>(
    conn: &C,
    ro: repair_order::Model,
    events: &mut Vec<Event>,
) -> Result<Option<repair_order::Model>, ServiceError> {
    if ro.status != RepairOrderStatus::InProgress {
        return Ok(None);
    }

    let task_ids: Vec<Uuid> = repair_operation::Entity::find()
        .filter(repair_operation::Column::RepairOrderId.eq(ro.id))
        .all(conn)
        .await?
        .into_iter()
        .filter_map(|op| op.task_id)
        .collect();
    if task_ids.is_empty() {
        return Ok(None);
    }

    let open = task::Entity::find()
        .filter(task::Column::Id.is_in(task_ids))
        .all(conn)
        .await?
        .into_iter()
        .filter(|t| !t.status.is_finished())
        .count();
    if open > 0 {
        debug!(repair_order = %ro.name, open, "tasks still open");
        return Ok(None);
    }

    let saved = auto_transition(conn, ro, RepairOrderStatus::Completed, events).await?;
    Ok(Some(saved))
}

/// Reacts to a submitted sales invoice: a completed order becomes Invoiced.
pub async fn on_sales_invoice_submitted<C: ConnectionTrait>(
    conn: &C,
    invoice: &sales_invoice::Model,
    repair_order_id: Uuid,
    events: &mut Vec<Event>,
) -> Result<Option<repair_order::Model>, ServiceError> {
    if !invoice.docstatus.is_submitted() {
        return Ok(None);
    }
    let Some(ro) = repair_order::Entity::find_by_id(repair_order_id)
        .one(conn)
        .await?
    else {
        return Ok(None);
    };

    if ro.status.blocks_invoice_automation() || ro.status != RepairOrderStatus::Completed {
        return Ok(None);
    }

    let saved = auto_transition(conn, ro, RepairOrderStatus::Invoiced, events).await?;
    Ok(Some(saved))
}

async fn auto_transition<C: ConnectionTrait>(
    conn: &C,
    ro: repair_order::Model,
    target: RepairOrderStatus,
    events: &mut Vec<Event>,
) -> Result<repair_order::Model, ServiceError> {
    let from = ro.status;
    let saved = transition_status(conn, ro, target, events).await?;
    counter!("repairshop.status.auto_transitions", 1, "to" => target.to_string());
    info!(repair_order = %saved.name, from = %from, to = %target, "status advanced automatically");
    Ok(saved)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::entities::TaskStatus;
    use rstest::rstest;

    #[rstest]
    #[case(TaskStatus::Open, true)]
    #[case(TaskStatus::Working, true)]
    #[case(TaskStatus::PendingReview, false)]
    #[case(TaskStatus::Completed, false)]
    fn only_open_and_working_start_work(#[case] status: TaskStatus, #[case] expected: bool) {
        assert_eq!(status.signals_start(), expected);
    }

    #[rstest]
    #[case(RepairOrderStatus::OnHold, true, false)]
    #[case(RepairOrderStatus::Delivered, true, true)]
    #[case(RepairOrderStatus::Closed, true, true)]
    #[case(RepairOrderStatus::Cancelled, true, true)]
    #[case(RepairOrderStatus::Completed, false, false)]
    #[case(RepairOrderStatus::Scheduled, false, false)]
    fn parked_and_final_orders_block_automation(
        #[case] status: RepairOrderStatus,
        #[case] blocks_tasks: bool,
        #[case] blocks_invoices: bool,
    ) {
        assert_eq!(status.blocks_task_automation(), blocks_tasks);
        assert_eq!(status.blocks_invoice_automation(), blocks_invoices);
    }
}
