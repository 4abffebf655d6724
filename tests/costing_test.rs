mod common;

use assert_matches::assert_matches;
use common::{operation, part, ro_request, TestApp};
use repairshop_api::{
    entities::{job_costing, DocStatus, SalesInvoiceStatus},
    errors::ServiceError,
    services::{
        documents::{
            PurchaseInvoiceRequest, SalesOrderRequest, StockEntryRequest, StockLineInput,
            TimeLogInput, TimesheetRequest,
        },
        repair_orders::UpdateAfterSubmitRequest,
    },
};
use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use sea_orm::{ActiveModelTrait, ActiveValue::Set, ColumnTrait, EntityTrait, QueryFilter};
use uuid::Uuid;

fn time_log(task_id: Option<Uuid>, hours: Decimal, rate: Decimal) -> TimeLogInput {
    TimeLogInput {
        task_id,
        project_id: None,
        activity_type: Some("Repair".to_string()),
        hours,
        billing_rate: rate,
        from_time: None,
        to_time: None,
    }
}

#[tokio::test]
async fn labour_comes_from_submitted_timesheets_only() {
    let app = TestApp::new().await;
    let mut request = ro_request("Jane Doe", "KA-01-1234");
    request.operations = vec![operation("Brake service", 60, false)];
    let submitted = app.create_submitted(request).await;
    let ro_id = submitted.repair_order.id;
    let task = &app.tasks_of(&submitted).await[0];
    let documents = &app.services().documents;

    // Linked through the operation's task only
    let by_task = documents
        .create_timesheet(TimesheetRequest {
            employee: "Ravi".to_string(),
            repair_order_id: None,
            time_logs: vec![time_log(Some(task.id), dec!(2), dec!(40))],
        })
        .await
        .unwrap();
    assert_eq!(app.reload(ro_id).await.labor_cost, Decimal::ZERO);

    documents.submit_timesheet(by_task.timesheet.id).await.unwrap();
    assert_eq!(app.reload(ro_id).await.labor_cost, dec!(80));

    // Header link and task link on the same row still count once
    let both = documents
        .create_timesheet(TimesheetRequest {
            employee: "Meena".to_string(),
            repair_order_id: Some(ro_id),
            time_logs: vec![time_log(Some(task.id), dec!(1.5), dec!(20))],
        })
        .await
        .unwrap();
    documents.submit_timesheet(both.timesheet.id).await.unwrap();

    let ro = app.reload(ro_id).await;
    assert_eq!(ro.labor_cost, dec!(110));
    assert_eq!(ro.total_job_cost, dec!(110));
    assert_eq!(ro.gross_margin, dec!(-110));

    documents.cancel_timesheet(by_task.timesheet.id).await.unwrap();
    assert_eq!(app.reload(ro_id).await.labor_cost, dec!(30));

    let snapshot = app.services().costing.get_job_costing(ro_id).await.unwrap();
    assert_eq!(snapshot.labor_cost, dec!(30));
    assert_eq!(snapshot.total_job_cost, dec!(30));
}

#[tokio::test]
async fn purchase_invoices_feed_other_charges_until_pinned() {
    let app = TestApp::new().await;
    let submitted = app.create_submitted(ro_request("Jane Doe", "KA-01-1234")).await;
    let ro_id = submitted.repair_order.id;
    let documents = &app.services().documents;

    let towing = documents
        .create_purchase_invoice(PurchaseInvoiceRequest {
            supplier: "City Towing".to_string(),
            repair_order_id: Some(ro_id),
            grand_total: dec!(75),
        })
        .await
        .unwrap();
    documents.submit_purchase_invoice(towing.id).await.unwrap();
    assert_eq!(app.reload(ro_id).await.other_charges, dec!(75));

    let service = &app.services().repair_orders;
    let pinned = service
        .update_after_submit(
            ro_id,
            UpdateAfterSubmitRequest {
                other_charges: Some(Some(dec!(50))),
                ..Default::default()
            },
        )
        .await
        .unwrap();
    assert!(pinned.repair_order.other_charges_manual);
    assert_eq!(pinned.repair_order.other_charges, dec!(50));

    // A pinned amount survives new invoices
    let sublet = documents
        .create_purchase_invoice(PurchaseInvoiceRequest {
            supplier: "Glass Works".to_string(),
            repair_order_id: Some(ro_id),
            grand_total: dec!(25),
        })
        .await
        .unwrap();
    documents.submit_purchase_invoice(sublet.id).await.unwrap();
    assert_eq!(app.reload(ro_id).await.other_charges, dec!(50));

    let released = service
        .update_after_submit(
            ro_id,
            UpdateAfterSubmitRequest {
                other_charges: Some(None),
                ..Default::default()
            },
        )
        .await
        .unwrap();
    assert!(!released.repair_order.other_charges_manual);
    assert_eq!(released.repair_order.other_charges, dec!(100));
}

#[test]
fn explicit_null_releases_pinned_other_charges() {
    let cleared: UpdateAfterSubmitRequest =
        serde_json::from_str(r#"{"other_charges": null}"#).unwrap();
    assert_eq!(cleared.other_charges, Some(None));

    let untouched: UpdateAfterSubmitRequest = serde_json::from_str(r#"{}"#).unwrap();
    assert_eq!(untouched.other_charges, None);
}

#[tokio::test]
async fn negative_purchase_invoice_is_rejected() {
    let app = TestApp::new().await;
    let result = app
        .services()
        .documents
        .create_purchase_invoice(PurchaseInvoiceRequest {
            supplier: "Refunds Inc".to_string(),
            repair_order_id: None,
            grand_total: dec!(-5),
        })
        .await;
    assert_matches!(result, Err(ServiceError::ValidationError(_)));
}

#[tokio::test]
async fn stock_lines_default_to_item_valuation_rate() {
    let app = TestApp::new().await;
    app.seed_item("BULB-H4", dec!(3), dec!(6)).await;
    let submitted = app.create_submitted(ro_request("Jane Doe", "KA-01-1234")).await;

    let entry = app
        .services()
        .documents
        .create_stock_entry(StockEntryRequest {
            purpose: "Material Issue".to_string(),
            repair_order_id: Some(submitted.repair_order.id),
            posting_date: None,
            items: vec![
                StockLineInput {
                    item_code: "BULB-H4".to_string(),
                    qty: dec!(2),
                    valuation_rate: None,
                },
                StockLineInput {
                    item_code: "BULB-H4".to_string(),
                    qty: dec!(1),
                    valuation_rate: Some(dec!(4)),
                },
            ],
        })
        .await
        .unwrap();

    let rates: Vec<Decimal> = entry.items.iter().map(|row| row.valuation_rate).collect();
    assert_eq!(rates, vec![dec!(3), dec!(4)]);

    let posted = app
        .services()
        .documents
        .submit_stock_entry(entry.stock_entry.id)
        .await
        .unwrap();
    assert_eq!(posted.docstatus, DocStatus::Submitted);
}

#[tokio::test]
async fn quotation_chain_links_documents_and_amounts() {
    let app = TestApp::new().await;
    app.seed_item("PAD-F", dec!(20), dec!(35)).await;
    app.seed_item("CLIP", dec!(1), dec!(2)).await;

    let mut request = ro_request("Jane Doe", "KA-01-1234");
    request.operations = vec![operation("Replace pads", 45, false)];
    request.parts = vec![
        part("PAD-F", dec!(2), true, false),
        part("CLIP", dec!(4), false, true),
    ];
    let submitted = app.create_submitted(request).await;
    let ro_id = submitted.repair_order.id;
    let mapping = &app.services().mapping;
    let documents = &app.services().documents;

    let quotation = mapping.make_quotation(ro_id).await.unwrap();
    assert_eq!(quotation.quotation.party_name, "Jane Doe");
    assert_eq!(quotation.quotation.order_type, "Maintenance");
    let lines: Vec<(String, Decimal, Decimal)> = quotation
        .items
        .iter()
        .map(|row| (row.item_name.clone(), row.qty, row.rate))
        .collect();
    assert_eq!(
        lines,
        vec![
            ("Replace pads".to_string(), dec!(1), dec!(0)),
            ("PAD-F item".to_string(), dec!(2), dec!(35)),
        ]
    );
    assert_eq!(quotation.quotation.grand_total, dec!(70));

    documents
        .submit_quotation(quotation.quotation.id)
        .await
        .unwrap();
    let ro = app.reload(ro_id).await;
    assert_eq!(ro.quotation_id, Some(quotation.quotation.id));
    assert_eq!(ro.quoted_amount, dec!(70));

    let order = mapping
        .make_sales_order(quotation.quotation.id)
        .await
        .unwrap();
    assert_eq!(order.sales_order.repair_order_id, Some(ro_id));
    assert_eq!(order.sales_order.project_id, ro.project_id);
    documents
        .submit_sales_order(order.sales_order.id)
        .await
        .unwrap();
    assert_eq!(
        app.reload(ro_id).await.sales_order_id,
        Some(order.sales_order.id)
    );

    let invoice = mapping
        .make_sales_invoice(order.sales_order.id)
        .await
        .unwrap();
    assert_eq!(invoice.sales_invoice.grand_total, dec!(70));
    let posted = documents
        .submit_sales_invoice(invoice.sales_invoice.id)
        .await
        .unwrap();
    assert_eq!(posted.status, SalesInvoiceStatus::Submitted);

    let ro = app.reload(ro_id).await;
    assert_eq!(ro.sales_invoice_id, Some(invoice.sales_invoice.id));
    assert_eq!(ro.invoiced_amount, dec!(70));
    assert_eq!(ro.parts_cost, dec!(44));
    assert_eq!(ro.gross_margin, dec!(26));

    // Cancelling the linked invoice frees the slot again
    documents
        .cancel_sales_invoice(invoice.sales_invoice.id)
        .await
        .unwrap();
    let ro = app.reload(ro_id).await;
    assert_eq!(ro.sales_invoice_id, None);
    assert_eq!(ro.invoiced_amount, Decimal::ZERO);
}

#[tokio::test]
async fn ordering_needs_a_submitted_quotation() {
    let app = TestApp::new().await;
    let mut request = ro_request("Jane Doe", "KA-01-1234");
    request.operations = vec![operation("Inspection", 20, false)];
    let submitted = app.create_submitted(request).await;

    let quotation = app
        .services()
        .mapping
        .make_quotation(submitted.repair_order.id)
        .await
        .unwrap();
    assert_matches!(
        app.services()
            .mapping
            .make_sales_order(quotation.quotation.id)
            .await,
        Err(ServiceError::InvalidOperation(_))
    );
}

#[tokio::test]
async fn sales_order_rejects_unusable_quotations() {
    let app = TestApp::new().await;
    let mut request = ro_request("Jane Doe", "KA-01-1234");
    request.operations = vec![operation("Inspection", 20, false)];
    let submitted = app.create_submitted(request).await;
    let documents = &app.services().documents;

    let order_for = |quotation_id: Uuid| SalesOrderRequest {
        customer: "Jane Doe".to_string(),
        order_type: "Maintenance".to_string(),
        quotation_id: Some(quotation_id),
        repair_order_id: Some(submitted.repair_order.id),
        project_id: None,
        items: Vec::new(),
    };

    assert_matches!(
        documents.create_sales_order(order_for(Uuid::new_v4())).await,
        Err(ServiceError::NotFound(_))
    );

    let quotation = app
        .services()
        .mapping
        .make_quotation(submitted.repair_order.id)
        .await
        .unwrap();
    let quotation_id = quotation.quotation.id;
    assert_matches!(
        documents.create_sales_order(order_for(quotation_id)).await,
        Err(ServiceError::InvalidOperation(_))
    );

    documents.submit_quotation(quotation_id).await.unwrap();
    let order = documents
        .create_sales_order(order_for(quotation_id))
        .await
        .unwrap();
    assert_eq!(order.sales_order.quotation_id, Some(quotation_id));

    documents.cancel_quotation(quotation_id).await.unwrap();
    assert_matches!(
        documents.create_sales_order(order_for(quotation_id)).await,
        Err(ServiceError::InvalidOperation(_))
    );
}

#[tokio::test]
async fn material_request_lists_billable_parts() {
    let app = TestApp::new().await;
    app.seed_item("PAD-F", dec!(20), dec!(35)).await;
    app.seed_item("CLIP", dec!(1), dec!(2)).await;

    let mut request = ro_request("Jane Doe", "KA-01-1234");
    request.parts = vec![
        part("PAD-F", dec!(2), true, false),
        part("CLIP", dec!(4), false, false),
    ];
    let draft = app.create_draft(request).await;

    let material = app
        .services()
        .mapping
        .make_material_request(draft.repair_order.id)
        .await
        .unwrap();
    assert_eq!(material.material_request.material_request_type, "Material Issue");
    assert_eq!(material.material_request.repair_order_id, Some(draft.repair_order.id));
    assert_eq!(material.items.len(), 1);
    assert_eq!(material.items[0].item_code, "PAD-F");
    assert_eq!(material.items[0].uom, "Nos");

    let without_billable = app.create_draft(ro_request("John Roe", "MH-12-9999")).await;
    assert_matches!(
        app.services()
            .mapping
            .make_material_request(without_billable.repair_order.id)
            .await,
        Err(ServiceError::ValidationError(_))
    );
}

#[tokio::test]
async fn refresh_rebuilds_missing_and_stale_snapshots() {
    let app = TestApp::new().await;
    app.seed_item("OIL-5W30", dec!(8), dec!(12)).await;
    let mut request = ro_request("Jane Doe", "KA-01-1234");
    request.parts = vec![part("OIL-5W30", dec!(5), true, false)];
    let first = app.create_submitted(request).await;
    let second = app.create_submitted(ro_request("John Roe", "MH-12-9999")).await;
    app.create_draft(ro_request("Draft Only", "DL-1")).await;

    let db = &*app.state.db;
    job_costing::Entity::delete_many()
        .filter(job_costing::Column::RepairOrderId.eq(second.repair_order.id))
        .exec(db)
        .await
        .unwrap();
    let stale = job_costing::Entity::find()
        .filter(job_costing::Column::RepairOrderId.eq(first.repair_order.id))
        .one(db)
        .await
        .unwrap()
        .unwrap();
    let mut active: job_costing::ActiveModel = stale.into();
    active.parts_cost = Set(dec!(1));
    active.total_job_cost = Set(dec!(1));
    active.update(db).await.unwrap();

    let summary = app
        .services()
        .costing
        .refresh_all_job_costings()
        .await
        .unwrap();
    assert_eq!(summary.refreshed, 2);
    assert_eq!(summary.failed, 0);

    let costing = &app.services().costing;
    let first_snapshot = costing.get_job_costing(first.repair_order.id).await.unwrap();
    assert_eq!(first_snapshot.parts_cost, dec!(40));
    assert_eq!(first_snapshot.total_job_cost, dec!(40));
    assert_eq!(first_snapshot.margin_snapshot, dec!(-40));
    assert!(costing.get_job_costing(second.repair_order.id).await.is_ok());
}
