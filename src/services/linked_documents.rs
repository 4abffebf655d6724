//! Repair order side effects of commercial and stock documents.
//!
//! Every hook runs inside the caller's transaction and queues its events on
//! the caller's buffer, so a failing hook rolls the document change back.

use sea_orm::{
    ActiveValue::Set, ColumnTrait, ConnectionTrait, EntityTrait, QueryFilter, QueryOrder,
};
use tracing::debug;
use uuid::Uuid;

use crate::{
    entities::{
        project, purchase_invoice, quotation, quotation_item, repair_order, sales_invoice,
        sales_invoice_item, sales_order, sales_order_item, stock_entry, task, timesheet,
        timesheet_detail,
    },
    errors::ServiceError,
    events::Event,
    services::{auto_status, costing::recompute_and_save, repair_orders::save_repair_order},
};

/// Recomputes and stores the costs of a repair order, queuing `CostsRecomputed`.
/// Unknown ids are ignored.
pub async fn resave<C: ConnectionTrait>(
    conn: &C,
    repair_order_id: Uuid,
    events: &mut Vec<Event>,
) -> Result<Option<repair_order::Model>, ServiceError> {
    let Some(ro) = repair_order::Entity::find_by_id(repair_order_id)
        .one(conn)
        .await?
    else {
        debug!(%repair_order_id, "linked repair order no longer exists");
        return Ok(None);
    };
    let saved = recompute_and_save(conn, ro).await?;
    events.push(Event::CostsRecomputed {
        repair_order_id: saved.id,
        total_job_cost: saved.total_job_cost,
        gross_margin: saved.gross_margin,
    });
    Ok(Some(saved))
}

/// The order a timesheet books against: its own link, else the first detail
/// row whose task or project belongs to an order.
pub async fn timesheet_repair_order<C: ConnectionTrait>(
    conn: &C,
    sheet: &timesheet::Model,
) -> Result<Option<Uuid>, ServiceError> {
    if sheet.repair_order_id.is_some() {
        return Ok(sheet.repair_order_id);
    }

    let details = timesheet_detail::Entity::find()
        .filter(timesheet_detail::Column::TimesheetId.eq(sheet.id))
        .all(conn)
        .await?;

    for detail in details {
        if let Some(task_id) = detail.task_id {
            let via_task = task::Entity::find_by_id(task_id)
                .one(conn)
                .await?
                .and_then(|t| t.repair_order_id);
            if via_task.is_some() {
                return Ok(via_task);
            }
        }
        if let Some(project_id) = detail.project_id {
            let via_project = project::Entity::find_by_id(project_id)
                .one(conn)
                .await?
                .and_then(|p| p.repair_order_id);
            if via_project.is_some() {
                return Ok(via_project);
            }
        }
    }
    Ok(None)
}

pub async fn quotation_repair_order<C: ConnectionTrait>(
    conn: &C,
    doc: &quotation::Model,
) -> Result<Option<Uuid>, ServiceError> {
    if doc.repair_order_id.is_some() {
        return Ok(doc.repair_order_id);
    }
    Ok(quotation_item::Entity::find()
        .filter(quotation_item::Column::QuotationId.eq(doc.id))
        .filter(quotation_item::Column::RepairOrderId.is_not_null())
        .order_by_asc(quotation_item::Column::Idx)
        .one(conn)
        .await?
        .and_then(|row| row.repair_order_id))
}

pub async fn sales_order_repair_order<C: ConnectionTrait>(
    conn: &C,
    doc: &sales_order::Model,
) -> Result<Option<Uuid>, ServiceError> {
    if doc.repair_order_id.is_some() {
        return Ok(doc.repair_order_id);
    }
    Ok(sales_order_item::Entity::find()
        .filter(sales_order_item::Column::SalesOrderId.eq(doc.id))
        .filter(sales_order_item::Column::RepairOrderId.is_not_null())
        .order_by_asc(sales_order_item::Column::Idx)
        .one(conn)
        .await?
        .and_then(|row| row.repair_order_id))
}

pub async fn sales_invoice_repair_order<C: ConnectionTrait>(
    conn: &C,
    doc: &sales_invoice::Model,
) -> Result<Option<Uuid>, ServiceError> {
    if doc.repair_order_id.is_some() {
        return Ok(doc.repair_order_id);
    }
    Ok(sales_invoice_item::Entity::find()
        .filter(sales_invoice_item::Column::SalesInvoiceId.eq(doc.id))
        .filter(sales_invoice_item::Column::RepairOrderId.is_not_null())
        .order_by_asc(sales_invoice_item::Column::Idx)
        .one(conn)
        .await?
        .and_then(|row| row.repair_order_id))
}

/// Timesheet submitted or cancelled: labour cost changes.
pub async fn on_timesheet_changed<C: ConnectionTrait>(
    conn: &C,
    sheet: &timesheet::Model,
    events: &mut Vec<Event>,
) -> Result<Option<Uuid>, ServiceError> {
    let ro_id = timesheet_repair_order(conn, sheet).await?;
    if let Some(id) = ro_id {
        resave(conn, id, events).await?;
    }
    Ok(ro_id)
}

/// Purchase invoice submitted or cancelled: other charges change.
pub async fn on_purchase_invoice_changed<C: ConnectionTrait>(
    conn: &C,
    invoice: &purchase_invoice::Model,
    events: &mut Vec<Event>,
) -> Result<Option<Uuid>, ServiceError> {
    if let Some(id) = invoice.repair_order_id {
        resave(conn, id, events).await?;
    }
    Ok(invoice.repair_order_id)
}

pub async fn on_stock_entry_changed<C: ConnectionTrait>(
    conn: &C,
    entry: &stock_entry::Model,
    events: &mut Vec<Event>,
) -> Result<Option<Uuid>, ServiceError> {
    if let Some(id) = entry.repair_order_id {
        resave(conn, id, events).await?;
    }
    Ok(entry.repair_order_id)
}

/// Quotation submitted: becomes the order's quotation when it has none yet.
/// Cancelled: unlinked when it was the linked one.
pub async fn on_quotation_changed<C: ConnectionTrait>(
    conn: &C,
    doc: &quotation::Model,
    events: &mut Vec<Event>,
) -> Result<Option<Uuid>, ServiceError> {
    let Some(ro_id) = quotation_repair_order(conn, doc).await? else {
        return Ok(None);
    };
    if let Some(ro) = repair_order::Entity::find_by_id(ro_id).one(conn).await? {
        let link = relink(ro.quotation_id, doc.id, doc.docstatus.is_submitted());
        if link != ro.quotation_id {
            let mut active: repair_order::ActiveModel = ro.into();
            active.quotation_id = Set(link);
            save_repair_order(conn, active).await?;
        }
    }
    resave(conn, ro_id, events).await?;
    Ok(Some(ro_id))
}

/// Sales order submitted or cancelled: same linking rule as quotations.
pub async fn on_sales_order_changed<C: ConnectionTrait>(
    conn: &C,
    doc: &sales_order::Model,
    events: &mut Vec<Event>,
) -> Result<Option<Uuid>, ServiceError> {
    let Some(ro_id) = sales_order_repair_order(conn, doc).await? else {
        return Ok(None);
    };
    if let Some(ro) = repair_order::Entity::find_by_id(ro_id).one(conn).await? {
        let link = relink(ro.sales_order_id, doc.id, doc.docstatus.is_submitted());
        if link != ro.sales_order_id {
            let mut active: repair_order::ActiveModel = ro.into();
            active.sales_order_id = Set(link);
            save_repair_order(conn, active).await?;
        }
    }
    resave(conn, ro_id, events).await?;
    Ok(Some(ro_id))
}

/// Sales invoice submitted or cancelled. A submitted invoice also drives the
/// order from Completed to Invoiced once costs are current.
pub async fn on_sales_invoice_changed<C: ConnectionTrait>(
    conn: &C,
    doc: &sales_invoice::Model,
    events: &mut Vec<Event>,
) -> Result<Option<Uuid>, ServiceError> {
    let Some(ro_id) = sales_invoice_repair_order(conn, doc).await? else {
        return Ok(None);
    };
    if let Some(ro) = repair_order::Entity::find_by_id(ro_id).one(conn).await? {
        let link = relink(ro.sales_invoice_id, doc.id, doc.docstatus.is_submitted());
        if link != ro.sales_invoice_id {
            let mut active: repair_order::ActiveModel = ro.into();
            active.sales_invoice_id = Set(link);
            save_repair_order(conn, active).await?;
        }
    }
    resave(conn, ro_id, events).await?;

    if doc.docstatus.is_submitted() {
        auto_status::on_sales_invoice_submitted(conn, doc, ro_id, events).await?;
    }
    Ok(Some(ro_id))
}

/// A payment moved the invoice's paid amount; the order is saved again so
/// closing guards and snapshots see it.
pub async fn on_payment_recorded<C: ConnectionTrait>(
    conn: &C,
    doc: &sales_invoice::Model,
    events: &mut Vec<Event>,
) -> Result<Option<Uuid>, ServiceError> {
    let ro_id = sales_invoice_repair_order(conn, doc).await?;
    if let Some(id) = ro_id {
        resave(conn, id, events).await?;
    }
    Ok(ro_id)
}

pub async fn on_task_status_changed<C: ConnectionTrait>(
    conn: &C,
    changed: &task::Model,
    events: &mut Vec<Event>,
) -> Result<Option<repair_order::Model>, ServiceError> {
    auto_status::on_task_status_changed(conn, changed, events).await
}

/// First-wins link: a submitted document fills an empty slot; cancelling the
/// linked document empties it again.
fn relink(current: Option<Uuid>, document: Uuid, submitted: bool) -> Option<Uuid> {
    match (current, submitted) {
        (None, true) => Some(document),
        (Some(linked), false) if linked == document => None,
        _ => current,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn first_submitted_document_wins_the_link() {
        let first = Uuid::new_v4();
        let second = Uuid::new_v4();

        let linked = relink(None, first, true);
        assert_eq!(linked, Some(first));
        assert_eq!(relink(linked, second, true), Some(first));
    }

    #[test]
    fn cancelling_only_unlinks_the_linked_document() {
        let linked = Uuid::new_v4();
        let other = Uuid::new_v4();

        assert_eq!(relink(Some(linked), other, false), Some(linked));
        assert_eq!(relink(Some(linked), linked, false), None);
        assert_eq!(relink(None, other, false), None);
    }
}
