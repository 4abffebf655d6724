mod common;

use assert_matches::assert_matches;
use chrono::{Duration, TimeZone, Utc};
use common::{operation, part, ro_request, TestApp};
use repairshop_api::{
    common::DateRangeParams,
    entities::RepairOrderStatus,
    errors::ServiceError,
    services::documents::{
        LineInput, SalesInvoiceRequest, StockEntryRequest, StockLineInput, TimeLogInput,
        TimesheetRequest,
    },
};
use rust_decimal::Decimal;
use rust_decimal_macros::dec;

#[tokio::test]
async fn job_profitability_uses_submitted_invoice_lines() {
    let app = TestApp::new().await;
    app.seed_item("OIL-5W30", dec!(8), dec!(12)).await;
    let mut request = ro_request("Jane Doe", "KA-01-1234");
    request.parts = vec![part("OIL-5W30", dec!(5), true, false)];
    let jane = app.create_submitted(request).await;
    app.create_submitted(ro_request("John Roe", "MH-12-9999")).await;

    let invoice = app
        .services()
        .documents
        .create_sales_invoice(SalesInvoiceRequest {
            customer: "Jane Doe".to_string(),
            repair_order_id: None,
            sales_order_id: None,
            project_id: None,
            items: vec![LineInput {
                item_code: Some("OIL-5W30".to_string()),
                item_name: "Engine oil".to_string(),
                description: None,
                qty: dec!(5),
                uom: "Litre".to_string(),
                rate: dec!(12),
                repair_order_id: Some(jane.repair_order.id),
                vehicle: Some("KA-01-1234".to_string()),
            }],
        })
        .await
        .unwrap();

    let reports = &app.services().reports;
    let before = reports.job_profitability(Some("Jane Doe")).await.unwrap();
    assert_eq!(before.rows.len(), 1);
    assert_eq!(before.rows[0].invoiced, Decimal::ZERO);

    app.services()
        .documents
        .submit_sales_invoice(invoice.sales_invoice.id)
        .await
        .unwrap();

    let report = reports.job_profitability(Some("Jane Doe")).await.unwrap();
    let row = &report.rows[0];
    assert_eq!(row.repair_order, jane.repair_order.name);
    assert_eq!(row.invoiced, dec!(60));
    assert_eq!(row.actual, dec!(40));
    assert_eq!(row.profit, dec!(20));

    let everyone = reports.job_profitability(None).await.unwrap();
    assert_eq!(everyone.rows.len(), 2);
}

#[tokio::test]
async fn parts_consumption_reads_issued_stock_in_the_window() {
    let app = TestApp::new().await;
    app.seed_item("PAD-F", dec!(20), dec!(35)).await;
    app.seed_item("CLIP", dec!(1), dec!(2)).await;
    let mut request = ro_request("Jane Doe", "KA-01-1234");
    request.parts = vec![
        part("PAD-F", dec!(2), true, false),
        part("CLIP", dec!(4), false, true),
    ];
    let submitted = app.create_submitted(request).await;
    let documents = &app.services().documents;

    let issue = |day: u32, lines: Vec<StockLineInput>| StockEntryRequest {
        purpose: "Material Issue".to_string(),
        repair_order_id: Some(submitted.repair_order.id),
        posting_date: Some(Utc.with_ymd_and_hms(2024, 3, day, 9, 0, 0).unwrap()),
        items: lines,
    };
    let line = |code: &str, qty: Decimal| StockLineInput {
        item_code: code.to_string(),
        qty,
        valuation_rate: None,
    };

    let in_window = documents
        .create_stock_entry(issue(5, vec![line("PAD-F", dec!(2)), line("CLIP", dec!(4))]))
        .await
        .unwrap();
    documents
        .submit_stock_entry(in_window.stock_entry.id)
        .await
        .unwrap();
    let outside = documents
        .create_stock_entry(issue(20, vec![line("PAD-F", dec!(1))]))
        .await
        .unwrap();
    documents
        .submit_stock_entry(outside.stock_entry.id)
        .await
        .unwrap();
    // Drafts never count
    documents
        .create_stock_entry(issue(6, vec![line("PAD-F", dec!(9))]))
        .await
        .unwrap();

    let report = app
        .services()
        .reports
        .parts_consumption(&DateRangeParams::new(Some("2024-03-01"), Some("2024-03-10")))
        .await
        .unwrap();

    assert_eq!(report.rows.len(), 2);
    let clip = &report.rows[0];
    assert_eq!(clip.item_code, "CLIP");
    assert_eq!(clip.billable, "FoC");
    assert_eq!(clip.extended_cost, dec!(4));
    let pad = &report.rows[1];
    assert_eq!(pad.qty, dec!(2));
    assert_eq!(pad.extended_cost, dec!(40));
    assert_eq!(pad.billable, "Billable");
}

#[tokio::test]
async fn parts_consumption_rejects_inverted_window() {
    let app = TestApp::new().await;
    let result = app
        .services()
        .reports
        .parts_consumption(&DateRangeParams::new(Some("2024-03-10"), Some("2024-03-01")))
        .await;
    assert_matches!(result, Err(ServiceError::ValidationError(_)));
}

#[tokio::test]
async fn utilization_counts_logged_and_standard_hours() {
    let app = TestApp::new().await;
    let mut request = ro_request("Jane Doe", "KA-01-1234");
    request.operations = vec![operation("Gearbox rebuild", 240, false)];
    let submitted = app.create_submitted(request).await;
    let task = &app.tasks_of(&submitted).await[0];

    let sheet = app
        .services()
        .documents
        .create_timesheet(TimesheetRequest {
            employee: "Ravi".to_string(),
            repair_order_id: None,
            time_logs: vec![TimeLogInput {
                task_id: Some(task.id),
                project_id: None,
                activity_type: None,
                hours: dec!(5),
                billing_rate: dec!(30),
                from_time: Some(Utc.with_ymd_and_hms(2024, 3, 4, 8, 0, 0).unwrap()),
                to_time: Some(Utc.with_ymd_and_hms(2024, 3, 4, 13, 0, 0).unwrap()),
            }],
        })
        .await
        .unwrap();
    app.services()
        .documents
        .submit_timesheet(sheet.timesheet.id)
        .await
        .unwrap();

    let report = app
        .services()
        .reports
        .technician_utilization(
            &DateRangeParams::new(Some("2024-03-04"), Some("2024-03-08")),
            None,
        )
        .await
        .unwrap();

    assert_eq!(report.rows.len(), 1);
    let row = &report.rows[0];
    assert_eq!(row.employee, "Ravi");
    assert_eq!(row.logged_hours, dec!(5));
    assert_eq!(row.capacity_hours, dec!(40));
    assert_eq!(row.standard_hours, dec!(4));
    assert_eq!(row.utilization, dec!(12.5));
    assert_eq!(row.efficiency, dec!(80));

    let nobody = app
        .services()
        .reports
        .technician_utilization(&DateRangeParams::default(), Some("Meena"))
        .await
        .unwrap();
    assert!(nobody.rows.is_empty());
}

#[tokio::test]
async fn wip_aging_lists_only_open_orders() {
    let app = TestApp::new().await;
    let open = app.create_submitted(ro_request("Jane Doe", "KA-01-1234")).await;
    let cancelled = app.create_submitted(ro_request("John Roe", "MH-12-9999")).await;
    app.services()
        .repair_orders
        .set_status(cancelled.repair_order.id, "Cancelled")
        .await
        .unwrap();

    let report = app.services().reports.wip_aging(Utc::now()).await.unwrap();

    assert_eq!(report.rows.len(), 1);
    let row = &report.rows[0];
    assert_eq!(row.repair_order, open.repair_order.name);
    assert_eq!(row.status, RepairOrderStatus::Scheduled);
    assert_eq!(row.bucket, "<=1d");
}

#[tokio::test]
async fn repeat_repairs_and_timeline_group_by_vehicle() {
    let app = TestApp::new().await;
    app.create_submitted(ro_request("Jane Doe", "KA-01-1234")).await;
    app.create_submitted(ro_request("Jane Doe", "KA-01-1234")).await;
    app.create_submitted(ro_request("John Roe", "MH-12-9999")).await;
    let dropped = app.create_submitted(ro_request("Jane Doe", "KA-01-1234")).await;
    app.services()
        .repair_orders
        .cancel_repair_order(dropped.repair_order.id)
        .await
        .unwrap();

    let reports = &app.services().reports;
    let repeats = reports.repeat_repairs(30, Utc::now()).await.unwrap();
    // Three visits of one vehicle make two returns; the single visit makes none
    assert_eq!(repeats.rows.len(), 2);
    assert!(repeats.rows.iter().all(|r| r.vehicle == "KA-01-1234"));
    assert!(repeats.rows.iter().all(|r| r.first_ro != r.return_ro));

    let timeline = reports
        .vehicle_timeline("KA-01-1234", Utc::now())
        .await
        .unwrap();
    let total: u64 = timeline.iter().map(|p| p.repair_orders).sum();
    assert_eq!(total, 2);
}

#[tokio::test]
async fn parts_issued_in_the_last_second_of_the_window_count() {
    let app = TestApp::new().await;
    app.seed_item("PAD-F", dec!(20), dec!(35)).await;
    let mut request = ro_request("Jane Doe", "KA-01-1234");
    request.parts = vec![part("PAD-F", dec!(1), true, false)];
    let submitted = app.create_submitted(request).await;
    let documents = &app.services().documents;

    let late = Utc.with_ymd_and_hms(2024, 3, 10, 23, 59, 59).unwrap() + Duration::milliseconds(500);
    let entry = documents
        .create_stock_entry(StockEntryRequest {
            purpose: "Material Issue".to_string(),
            repair_order_id: Some(submitted.repair_order.id),
            posting_date: Some(late),
            items: vec![StockLineInput {
                item_code: "PAD-F".to_string(),
                qty: dec!(1),
                valuation_rate: None,
            }],
        })
        .await
        .unwrap();
    documents.submit_stock_entry(entry.stock_entry.id).await.unwrap();

    let report = app
        .services()
        .reports
        .parts_consumption(&DateRangeParams::new(Some("2024-03-01"), Some("2024-03-10")))
        .await
        .unwrap();
    assert_eq!(report.rows.len(), 1);
    assert_eq!(report.rows[0].qty, dec!(1));

    let next_day = app
        .services()
        .reports
        .parts_consumption(&DateRangeParams::new(Some("2024-03-11"), Some("2024-03-11")))
        .await
        .unwrap();
    assert!(next_day.rows.is_empty());
}
