use chrono::Utc;
use metrics::{counter, gauge};
use rust_decimal::Decimal;
use sea_orm::{
    ActiveModelTrait, ActiveValue::Set, ColumnTrait, Condition, ConnectionTrait,
    DatabaseConnection, EntityTrait, QueryFilter, QuerySelect, RelationTrait, TransactionTrait,
};
use serde::Serialize;
use std::{collections::HashMap, sync::Arc};
use tracing::{error, info, instrument};
use utoipa::ToSchema;
use uuid::Uuid;

use crate::{
    entities::{
        item, job_costing, purchase_invoice, quotation, repair_operation, repair_order,
        repair_part, sales_invoice, timesheet, timesheet_detail, DocStatus,
    },
    errors::ServiceError,
    events::{Event, EventSender},
    services::repair_orders::save_repair_order,
};

/// Cost and revenue figures derived for one repair order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, ToSchema)]
pub struct CostBreakdown {
    pub parts_cost: Decimal,
    pub labor_cost: Decimal,
    pub other_charges: Decimal,
    pub total_job_cost: Decimal,
    pub quoted_amount: Decimal,
    pub invoiced_amount: Decimal,
    pub gross_margin: Decimal,
}

impl CostBreakdown {
    pub fn new(
        parts_cost: Decimal,
        labor_cost: Decimal,
        other_charges: Decimal,
        quoted_amount: Decimal,
        invoiced_amount: Decimal,
    ) -> Self {
        let total_job_cost = parts_cost + labor_cost + other_charges;
        Self {
            parts_cost,
            labor_cost,
            other_charges,
            total_job_cost,
            quoted_amount,
            invoiced_amount,
            gross_margin: invoiced_amount - total_job_cost,
        }
    }

    pub fn apply(&self, active: &mut repair_order::ActiveModel) {
        active.parts_cost = Set(self.parts_cost);
        active.labor_cost = Set(self.labor_cost);
        active.other_charges = Set(self.other_charges);
        active.total_job_cost = Set(self.total_job_cost);
        active.quoted_amount = Set(self.quoted_amount);
        active.invoiced_amount = Set(self.invoiced_amount);
        active.gross_margin = Set(self.gross_margin);
    }
}

/// Σ qty_planned × valuation rate over the parts plan. Unknown items cost nothing.
pub async fn parts_cost<C: ConnectionTrait>(
    conn: &C,
    repair_order_id: Uuid,
) -> Result<Decimal, ServiceError> {
    let parts = repair_part::Entity::find()
        .filter(repair_part::Column::RepairOrderId.eq(repair_order_id))
        .all(conn)
        .await?;
    if parts.is_empty() {
        return Ok(Decimal::ZERO);
    }

    let codes: Vec<String> = parts.iter().map(|p| p.item_code.clone()).collect();
    let rates: HashMap<String, Decimal> = item::Entity::find()
        .filter(item::Column::ItemCode.is_in(codes))
        .all(conn)
        .await?
        .into_iter()
        .map(|i| (i.item_code, i.valuation_rate))
        .collect();

    Ok(parts
        .iter()
        .map(|p| p.qty_planned * rates.get(&p.item_code).copied().unwrap_or_default())
        .sum())
}

/// Labour from submitted timesheets. A detail row counts when its timesheet
/// names the order, its project is the order's project, or its task is one
/// of the order's operation tasks; matching on several links still counts once.
pub async fn labor_cost<C: ConnectionTrait>(
    conn: &C,
    ro: &repair_order::Model,
) -> Result<Decimal, ServiceError> {
    let task_ids: Vec<Uuid> = repair_operation::Entity::find()
        .filter(repair_operation::Column::RepairOrderId.eq(ro.id))
        .all(conn)
        .await?
        .into_iter()
        .filter_map(|op| op.task_id)
        .collect();

    let links = Condition::any()
        .add(timesheet::Column::RepairOrderId.eq(ro.id))
        .add_option(
            ro.project_id
                .map(|project_id| timesheet_detail::Column::ProjectId.eq(project_id)),
        )
        .add_option(
            (!task_ids.is_empty()).then(|| timesheet_detail::Column::TaskId.is_in(task_ids)),
        );

    let rows = timesheet_detail::Entity::find()
        .join(
            sea_orm::JoinType::InnerJoin,
            timesheet_detail::Relation::Timesheet.def(),
        )
        .filter(timesheet::Column::Docstatus.eq(DocStatus::Submitted))
        .filter(links)
        .all(conn)
        .await?;

    Ok(rows.iter().map(timesheet_detail::Model::cost).sum())
}

/// Σ grand_total of submitted purchase invoices booked against the order.
pub async fn purchase_charges<C: ConnectionTrait>(
    conn: &C,
    repair_order_id: Uuid,
) -> Result<Decimal, ServiceError> {
    Ok(purchase_invoice::Entity::find()
        .filter(purchase_invoice::Column::RepairOrderId.eq(repair_order_id))
        .filter(purchase_invoice::Column::Docstatus.eq(DocStatus::Submitted))
        .all(conn)
        .await?
        .iter()
        .map(|pi| pi.grand_total)
        .sum())
}

async fn quoted_amount<C: ConnectionTrait>(
    conn: &C,
    ro: &repair_order::Model,
) -> Result<Decimal, ServiceError> {
    if let Some(quotation_id) = ro.quotation_id {
        if let Some(linked) = quotation::Entity::find_by_id(quotation_id).one(conn).await? {
            if linked.docstatus.is_submitted() {
                return Ok(linked.grand_total);
            }
        }
    }

    Ok(quotation::Entity::find()
        .filter(quotation::Column::RepairOrderId.eq(ro.id))
        .filter(quotation::Column::Docstatus.eq(DocStatus::Submitted))
        .all(conn)
        .await?
        .iter()
        .map(|q| q.grand_total)
        .sum())
}

async fn invoiced_amount<C: ConnectionTrait>(
    conn: &C,
    ro: &repair_order::Model,
) -> Result<Decimal, ServiceError> {
    if let Some(invoice_id) = ro.sales_invoice_id {
        if let Some(linked) = sales_invoice::Entity::find_by_id(invoice_id).one(conn).await? {
            if linked.docstatus.is_submitted() {
                return Ok(linked.grand_total);
            }
        }
    }

    Ok(sales_invoice::Entity::find()
        .filter(sales_invoice::Column::RepairOrderId.eq(ro.id))
        .filter(sales_invoice::Column::Docstatus.eq(DocStatus::Submitted))
        .all(conn)
        .await?
        .iter()
        .map(|si| si.grand_total)
        .sum())
}

/// Derives every cost field of `ro` from its children and linked documents.
pub async fn compute_costs<C: ConnectionTrait>(
    conn: &C,
    ro: &repair_order::Model,
) -> Result<CostBreakdown, ServiceError> {
    let parts = parts_cost(conn, ro.id).await?;
    let labor = labor_cost(conn, ro).await?;
    let other = if ro.other_charges_manual {
        ro.other_charges
    } else {
        purchase_charges(conn, ro.id).await?
    };
    let quoted = quoted_amount(conn, ro).await?;
    let invoiced = invoiced_amount(conn, ro).await?;

    Ok(CostBreakdown::new(parts, labor, other, quoted, invoiced))
}

/// Recomputes the cost fields, persists them and refreshes the snapshot of a
/// submitted order. Pending header changes must already be saved.
pub async fn recompute_and_save<C: ConnectionTrait>(
    conn: &C,
    ro: repair_order::Model,
) -> Result<repair_order::Model, ServiceError> {
    let costs = compute_costs(conn, &ro).await?;
    let mut active: repair_order::ActiveModel = ro.into();
    costs.apply(&mut active);
    let saved = save_repair_order(conn, active).await?;

    upsert_job_costing(conn, &saved).await?;
    counter!("repairshop.costs.recomputed", 1);

    Ok(saved)
}

/// Creates or refreshes the single Job Costing row of `ro`. Draft orders have none.
pub async fn upsert_job_costing<C: ConnectionTrait>(
    conn: &C,
    ro: &repair_order::Model,
) -> Result<Option<job_costing::Model>, ServiceError> {
    if ro.docstatus == DocStatus::Draft {
        return Ok(None);
    }

    let existing = job_costing::Entity::find()
        .filter(job_costing::Column::RepairOrderId.eq(ro.id))
        .one(conn)
        .await?;

    let (mut active, is_new) = match existing {
        Some(row) => (job_costing::ActiveModel::from(row), false),
        None => (
            job_costing::ActiveModel {
                id: Set(Uuid::new_v4()),
                repair_order_id: Set(ro.id),
                ..Default::default()
            },
            true,
        ),
    };

    active.project_id = Set(ro.project_id);
    active.vehicle = Set(ro.vehicle.clone());
    active.parts_cost = Set(ro.parts_cost);
    active.labor_cost = Set(ro.labor_cost);
    active.other_charges = Set(ro.other_charges);
    active.total_job_cost = Set(ro.parts_cost + ro.labor_cost + ro.other_charges);
    active.margin_snapshot = Set(ro.gross_margin);

    let saved = if is_new {
        active.insert(conn).await?
    } else {
        active.update(conn).await?
    };
    Ok(Some(saved))
}

/// Outcome of a full snapshot refresh.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, ToSchema)]
pub struct RefreshSummary {
    pub refreshed: usize,
    pub failed: usize,
}

#[derive(Clone)]
pub struct CostingService {
    db: Arc<DatabaseConnection>,
    event_sender: EventSender,
}

impl CostingService {
    pub fn new(db: Arc<DatabaseConnection>, event_sender: EventSender) -> Self {
        Self { db, event_sender }
    }

    /// Recomputes one repair order on demand.
    #[instrument(skip(self))]
    pub async fn recompute(
        &self,
        repair_order_id: Uuid,
    ) -> Result<repair_order::Model, ServiceError> {
        let txn = self.db.begin().await?;
        let ro = repair_order::Entity::find_by_id(repair_order_id)
            .one(&txn)
            .await?
            .ok_or_else(|| {
                ServiceError::NotFound(format!("Repair Order {} not found", repair_order_id))
            })?;

        let saved = recompute_and_save(&txn, ro).await?;
        txn.commit().await?;

        self.event_sender
            .send_or_log(Event::CostsRecomputed {
                repair_order_id: saved.id,
                total_job_cost: saved.total_job_cost,
                gross_margin: saved.gross_margin,
            })
            .await;

        Ok(saved)
    }

    #[instrument(skip(self))]
    pub async fn get_job_costing(
        &self,
        repair_order_id: Uuid,
    ) -> Result<job_costing::Model, ServiceError> {
        job_costing::Entity::find()
            .filter(job_costing::Column::RepairOrderId.eq(repair_order_id))
            .one(&*self.db)
            .await?
            .ok_or_else(|| {
                ServiceError::NotFound(format!(
                    "Job Costing for Repair Order {} not found",
                    repair_order_id
                ))
            })
    }

    /// Copies the stored cost fields of every submitted repair order into its
    /// snapshot. Each order is written in its own transaction; failures are
    /// logged and counted without stopping the run.
    #[instrument(skip(self))]
    pub async fn refresh_all_job_costings(&self) -> Result<RefreshSummary, ServiceError> {
        let orders = repair_order::Entity::find()
            .filter(repair_order::Column::Docstatus.eq(DocStatus::Submitted))
            .all(&*self.db)
            .await?;

        let mut summary = RefreshSummary::default();
        for ro in orders {
            match self.refresh_one(&ro).await {
                Ok(()) => summary.refreshed += 1,
                Err(e) => {
                    summary.failed += 1;
                    error!(repair_order = %ro.name, error = %e, "job costing refresh failed");
                }
            }
        }

        gauge!("repairshop.job_costing.refreshed", summary.refreshed as f64);
        if summary.failed > 0 {
            counter!("repairshop.job_costing.refresh_failures", summary.failed as u64);
        }
        info!(
            refreshed = summary.refreshed,
            failed = summary.failed,
            "job costing snapshots refreshed"
        );

        self.event_sender
            .send_or_log(Event::JobCostingRefreshed {
                refreshed: summary.refreshed,
                failed: summary.failed,
                at: Utc::now(),
            })
            .await;

        Ok(summary)
    }

    async fn refresh_one(&self, ro: &repair_order::Model) -> Result<(), ServiceError> {
        let txn = self.db.begin().await?;
        upsert_job_costing(&txn, ro).await?;
        txn.commit().await?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;
    use rust_decimal_macros::dec;

    #[test]
    fn total_and_margin_follow_components() {
        let costs = CostBreakdown::new(dec!(120), dec!(90), dec!(15), dec!(300), dec!(250));
        assert_eq!(costs.total_job_cost, dec!(225));
        assert_eq!(costs.gross_margin, dec!(25));
    }

    #[test]
    fn margin_goes_negative_when_uninvoiced() {
        let costs = CostBreakdown::new(dec!(40), dec!(0), dec!(10), dec!(0), dec!(0));
        assert_eq!(costs.gross_margin, dec!(-50));
    }

    proptest! {
        #[test]
        fn total_is_always_the_sum_of_components(
            parts in 0i64..10_000_000,
            labor in 0i64..10_000_000,
            other in 0i64..10_000_000,
            invoiced in 0i64..10_000_000,
        ) {
            let parts = Decimal::new(parts, 2);
            let labor = Decimal::new(labor, 2);
            let other = Decimal::new(other, 2);
            let invoiced = Decimal::new(invoiced, 2);
            let costs = CostBreakdown::new(parts, labor, other, Decimal::ZERO, invoiced);

            prop_assert_eq!(costs.total_job_cost, parts + labor + other);
            prop_assert_eq!(costs.gross_margin + costs.total_job_cost, invoiced);
        }
    }

    #[tokio::test]
    async fn parts_cost_prices_plan_rows_at_valuation_rate() {
        use sea_orm::{DatabaseBackend, MockDatabase};

        let ro_id = Uuid::new_v4();
        let db = MockDatabase::new(DatabaseBackend::Sqlite)
            .append_query_results([vec![
                repair_part::Model {
                    id: Uuid::new_v4(),
                    repair_order_id: ro_id,
                    idx: 1,
                    item_code: "OIL-5W30".into(),
                    item_name: None,
                    uom: None,
                    qty_planned: dec!(4),
                    is_billable: true,
                    is_foc: false,
                    notes: None,
                },
                repair_part::Model {
                    id: Uuid::new_v4(),
                    repair_order_id: ro_id,
                    idx: 2,
                    item_code: "UNKNOWN".into(),
                    item_name: None,
                    uom: None,
                    qty_planned: dec!(3),
                    is_billable: false,
                    is_foc: true,
                    notes: None,
                },
            ]])
            .append_query_results([vec![item::Model {
                item_code: "OIL-5W30".into(),
                item_name: "Engine oil 5W-30".into(),
                stock_uom: "L".into(),
                valuation_rate: dec!(7.5),
                standard_rate: dec!(12),
                is_stock_item: true,
            }]])
            .into_connection();

        assert_eq!(parts_cost(&db, ro_id).await.unwrap(), dec!(30));
    }
}
