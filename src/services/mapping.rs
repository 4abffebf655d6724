//! Builds draft selling and stock documents from a repair order and carries
//! the order link down the quotation → sales order → sales invoice chain.

use chrono::Utc;
use rust_decimal::Decimal;
use sea_orm::{ColumnTrait, DatabaseConnection, EntityTrait, QueryFilter, TransactionTrait};
use std::{collections::HashMap, sync::Arc};
use tracing::{info, instrument};
use uuid::Uuid;

use crate::{
    entities::{item, repair_operation, repair_order, repair_part},
    errors::ServiceError,
    services::{
        documents::{
            insert_material_request, insert_quotation, insert_sales_invoice, insert_sales_order,
            load_quotation, load_sales_order, LineInput, MaterialLineInput,
            MaterialRequestRequest, MaterialRequestWithItems, QuotationRequest,
            QuotationWithItems, SalesInvoiceRequest, SalesInvoiceWithItems, SalesOrderRequest,
            SalesOrderWithItems,
        },
        repair_orders::{find_repair_order, load_detail},
    },
};

pub const MATERIAL_ISSUE: &str = "Material Issue";
const SERVICE_OPERATION: &str = "Service Operation";
const OPERATION_UOM: &str = "Nos";

/// Quotation lines for a repair order: every operation at zero rate, then
/// each billable part at the item's standard rate.
pub fn quotation_lines(
    ro: &repair_order::Model,
    operations: &[repair_operation::Model],
    parts: &[repair_part::Model],
    items: &HashMap<String, item::Model>,
) -> Vec<LineInput> {
    let mut lines = Vec::with_capacity(operations.len() + parts.len());

    for op in operations {
        let name = op
            .operation_name
            .clone()
            .filter(|n| !n.trim().is_empty())
            .unwrap_or_else(|| SERVICE_OPERATION.to_string());
        lines.push(LineInput {
            item_code: None,
            item_name: name.clone(),
            description: Some(name),
            qty: Decimal::ONE,
            uom: OPERATION_UOM.to_string(),
            rate: Decimal::ZERO,
            repair_order_id: Some(ro.id),
            vehicle: Some(ro.vehicle.clone()),
        });
    }

    for part in parts.iter().filter(|p| p.is_billable) {
        let master = items.get(&part.item_code);
        let item_name = part
            .item_name
            .clone()
            .or_else(|| master.map(|i| i.item_name.clone()))
            .unwrap_or_else(|| part.item_code.clone());
        lines.push(LineInput {
            item_code: Some(part.item_code.clone()),
            item_name: item_name.clone(),
            description: Some(item_name),
            qty: part.qty_planned,
            uom: part_uom(part, master),
            rate: master.map(|i| i.standard_rate).unwrap_or_default(),
            repair_order_id: Some(ro.id),
            vehicle: Some(ro.vehicle.clone()),
        });
    }

    lines
}

fn part_uom(part: &repair_part::Model, master: Option<&item::Model>) -> String {
    part.uom
        .clone()
        .filter(|u| !u.trim().is_empty())
        .or_else(|| master.map(|i| i.stock_uom.clone()))
        .unwrap_or_else(|| OPERATION_UOM.to_string())
}

#[derive(Clone)]
pub struct MappingService {
    db: Arc<DatabaseConnection>,
    company: String,
    default_warehouse: String,
}

impl MappingService {
    pub fn new(db: Arc<DatabaseConnection>, company: String, default_warehouse: String) -> Self {
        Self {
            db,
            company,
            default_warehouse,
        }
    }

    async fn items_for(
        &self,
        parts: &[repair_part::Model],
    ) -> Result<HashMap<String, item::Model>, ServiceError> {
        let codes: Vec<String> = parts.iter().map(|p| p.item_code.clone()).collect();
        if codes.is_empty() {
            return Ok(HashMap::new());
        }
        Ok(item::Entity::find()
            .filter(item::Column::ItemCode.is_in(codes))
            .all(&*self.db)
            .await?
            .into_iter()
            .map(|i| (i.item_code.clone(), i))
            .collect())
    }

    /// Drafts a Maintenance quotation addressed to the order's customer.
    #[instrument(skip(self))]
    pub async fn make_quotation(
        &self,
        repair_order_id: Uuid,
    ) -> Result<QuotationWithItems, ServiceError> {
        let ro = find_repair_order(&*self.db, repair_order_id).await?;
        let detail = load_detail(&*self.db, ro).await?;
        let items = self.items_for(&detail.parts).await?;

        let lines = quotation_lines(
            &detail.repair_order,
            &detail.operations,
            &detail.parts,
            &items,
        );
        if lines.is_empty() {
            return Err(ServiceError::ValidationError(format!(
                "Repair Order {} has no operations or billable parts to quote",
                detail.repair_order.name
            )));
        }

        let txn = self.db.begin().await?;
        let quotation = insert_quotation(
            &txn,
            QuotationRequest {
                quotation_to: "Customer".to_string(),
                party_name: detail.repair_order.customer.clone(),
                order_type: "Maintenance".to_string(),
                repair_order_id: Some(detail.repair_order.id),
                items: lines,
            },
        )
        .await?;
        txn.commit().await?;

        info!(
            repair_order = %detail.repair_order.name,
            quotation = %quotation.quotation.name,
            "quotation drafted"
        );
        Ok(quotation)
    }

    /// Drafts a Material Issue request for the billable parts.
    #[instrument(skip(self))]
    pub async fn make_material_request(
        &self,
        repair_order_id: Uuid,
    ) -> Result<MaterialRequestWithItems, ServiceError> {
        let ro = find_repair_order(&*self.db, repair_order_id).await?;
        let detail = load_detail(&*self.db, ro).await?;
        let billable: Vec<repair_part::Model> =
            detail.parts.into_iter().filter(|p| p.is_billable).collect();
        if billable.is_empty() {
            return Err(ServiceError::ValidationError(format!(
                "Repair Order {} has no billable parts to request",
                detail.repair_order.name
            )));
        }
        let items = self.items_for(&billable).await?;

        let now = Utc::now();
        let lines = billable
            .iter()
            .map(|part| MaterialLineInput {
                item_code: part.item_code.clone(),
                qty: part.qty_planned,
                uom: part_uom(part, items.get(&part.item_code)),
                schedule_date: now,
                warehouse: self.default_warehouse.clone(),
            })
            .collect();

        let txn = self.db.begin().await?;
        let request = insert_material_request(
            &txn,
            MaterialRequestRequest {
                material_request_type: MATERIAL_ISSUE.to_string(),
                company: self.company.clone(),
                repair_order_id: Some(detail.repair_order.id),
                items: lines,
            },
        )
        .await?;
        txn.commit().await?;
        Ok(request)
    }

    /// Drafts a sales order from a submitted quotation, carrying the repair
    /// order, its project and its vehicle.
    #[instrument(skip(self))]
    pub async fn make_sales_order(
        &self,
        quotation_id: Uuid,
    ) -> Result<SalesOrderWithItems, ServiceError> {
        let source = load_quotation(&*self.db, quotation_id).await?;
        if !source.quotation.docstatus.is_submitted() {
            return Err(ServiceError::InvalidOperation(format!(
                "Quotation {} must be submitted before ordering",
                source.quotation.name
            )));
        }

        let ro = match source.quotation.repair_order_id {
            Some(id) => Some(find_repair_order(&*self.db, id).await?),
            None => None,
        };

        let items = source
            .items
            .into_iter()
            .map(|row| LineInput {
                item_code: row.item_code,
                item_name: row.item_name,
                description: row.description,
                qty: row.qty,
                uom: row.uom,
                rate: row.rate,
                repair_order_id: ro.as_ref().map(|r| r.id).or(row.repair_order_id),
                vehicle: ro.as_ref().map(|r| r.vehicle.clone()).or(row.vehicle),
            })
            .collect();

        let txn = self.db.begin().await?;
        let order = insert_sales_order(
            &txn,
            SalesOrderRequest {
                customer: source.quotation.party_name,
                order_type: source.quotation.order_type,
                quotation_id: Some(quotation_id),
                repair_order_id: ro.as_ref().map(|r| r.id),
                project_id: ro.as_ref().and_then(|r| r.project_id),
                items,
            },
        )
        .await?;
        txn.commit().await?;
        Ok(order)
    }

    /// Drafts a sales invoice from a submitted sales order.
    #[instrument(skip(self))]
    pub async fn make_sales_invoice(
        &self,
        sales_order_id: Uuid,
    ) -> Result<SalesInvoiceWithItems, ServiceError> {
        let source = load_sales_order(&*self.db, sales_order_id).await?;
        if !source.sales_order.docstatus.is_submitted() {
            return Err(ServiceError::InvalidOperation(format!(
                "Sales Order {} must be submitted before invoicing",
                source.sales_order.name
            )));
        }

        let ro = match source.sales_order.repair_order_id {
            Some(id) => Some(find_repair_order(&*self.db, id).await?),
            None => None,
        };

        let items = source
            .items
            .into_iter()
            .map(|row| LineInput {
                item_code: row.item_code,
                item_name: row.item_name,
                description: None,
                qty: row.qty,
                uom: row.uom,
                rate: row.rate,
                repair_order_id: ro.as_ref().map(|r| r.id).or(row.repair_order_id),
                vehicle: ro.as_ref().map(|r| r.vehicle.clone()).or(row.vehicle),
            })
            .collect();

        let txn = self.db.begin().await?;
        let invoice = insert_sales_invoice(
            &txn,
            SalesInvoiceRequest {
                customer: source.sales_order.customer,
                repair_order_id: ro.as_ref().map(|r| r.id),
                sales_order_id: Some(sales_order_id),
                project_id: source
                    .sales_order
                    .project_id
                    .or_else(|| ro.as_ref().and_then(|r| r.project_id)),
                items,
            },
        )
        .await?;
        txn.commit().await?;
        Ok(invoice)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::entities::{DocStatus, Priority, RepairOrderStatus};
    use rust_decimal_macros::dec;

    fn order() -> repair_order::Model {
        let now = Utc::now();
        repair_order::Model {
            id: Uuid::new_v4(),
            name: "RO-00000001".into(),
            customer: "Asha Rao".into(),
            vehicle: "KA-01-AB-1234".into(),
            advisor: None,
            priority: Priority::Medium,
            status: RepairOrderStatus::Scheduled,
            docstatus: DocStatus::Submitted,
            service_template_id: None,
            template_applied: false,
            project_id: None,
            quotation_id: None,
            sales_order_id: None,
            sales_invoice_id: None,
            sla_response_by: None,
            sla_delivery_by: None,
            parts_cost: Decimal::ZERO,
            labor_cost: Decimal::ZERO,
            other_charges: Decimal::ZERO,
            other_charges_manual: false,
            total_job_cost: Decimal::ZERO,
            quoted_amount: Decimal::ZERO,
            invoiced_amount: Decimal::ZERO,
            gross_margin: Decimal::ZERO,
            notes: None,
            version: 1,
            status_changed_at: now,
            created_at: now,
            updated_at: now,
        }
    }

    fn part(ro: Uuid, code: &str, billable: bool, uom: Option<&str>) -> repair_part::Model {
        repair_part::Model {
            id: Uuid::new_v4(),
            repair_order_id: ro,
            idx: 1,
            item_code: code.into(),
            item_name: None,
            uom: uom.map(str::to_string),
            qty_planned: dec!(2),
            is_billable: billable,
            is_foc: !billable,
            notes: None,
        }
    }

    #[test]
    fn quotation_quotes_operations_free_and_billable_parts_at_standard_rate() {
        let ro = order();
        let operations = vec![repair_operation::Model {
            id: Uuid::new_v4(),
            repair_order_id: ro.id,
            idx: 1,
            operation_name: None,
            planned_minutes: 45,
            workstation: None,
            is_qc: false,
            task_id: None,
        }];
        let parts = vec![
            part(ro.id, "FLT-OIL", true, None),
            part(ro.id, "WASHER", false, Some("Nos")),
        ];
        let items = HashMap::from([(
            "FLT-OIL".to_string(),
            item::Model {
                item_code: "FLT-OIL".into(),
                item_name: "Oil filter".into(),
                stock_uom: "Unit".into(),
                valuation_rate: dec!(6),
                standard_rate: dec!(9.5),
                is_stock_item: true,
            },
        )]);

        let lines = quotation_lines(&ro, &operations, &parts, &items);

        assert_eq!(lines.len(), 2);
        assert_eq!(lines[0].item_name, "Service Operation");
        assert_eq!(lines[0].uom, "Nos");
        assert_eq!(lines[0].rate, Decimal::ZERO);
        assert_eq!(lines[1].item_name, "Oil filter");
        assert_eq!(lines[1].uom, "Unit");
        assert_eq!(lines[1].rate, dec!(9.5));
        assert!(lines
            .iter()
            .all(|l| l.repair_order_id == Some(ro.id) && l.vehicle.as_deref() == Some("KA-01-AB-1234")));
    }
}
