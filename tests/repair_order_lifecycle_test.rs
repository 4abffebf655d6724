//! Repair order drafting, templates, submission and status rules against a
//! real (in-memory) database.

mod common;

use assert_matches::assert_matches;
use common::{check, operation, part, ro_request, TestApp};
use repairshop_api::{
    entities::{
        project, repair_order,
        service_template::{TemplateCheck, TemplateOperation, TemplatePart},
        DocStatus, RepairOrderStatus, TaskStatus,
    },
    errors::ServiceError,
    services::{
        masters::ServiceTemplateRequest,
        repair_orders::{
            save_repair_order, CheckMark, CustomerUpdateRequest, ListRepairOrdersQuery,
            UpdateAfterSubmitRequest,
        },
    },
};
use rust_decimal_macros::dec;
use sea_orm::{ActiveValue::Set, EntityTrait};

#[tokio::test]
async fn draft_keeps_rows_in_order_and_prices_the_parts_plan() {
    let app = TestApp::new().await;
    app.seed_item("OIL-5W30", dec!(8), dec!(12)).await;
    app.seed_item("FILTER-OIL", dec!(5), dec!(9)).await;

    let mut request = ro_request("Jane Doe", "KA-01-1234");
    request.operations = vec![operation("Oil change", 30, false), operation("Road test", 15, true)];
    request.parts = vec![
        part("OIL-5W30", dec!(4), true, false),
        part("FILTER-OIL", dec!(1), false, true),
    ];
    request.checklist = vec![check("Wipers"), check("Tyre pressure")];

    let draft = app.create_draft(request).await;

    let ro = &draft.repair_order;
    assert!(ro.name.starts_with("RO-"));
    assert_eq!(ro.status, RepairOrderStatus::Scheduled);
    assert_eq!(ro.docstatus, DocStatus::Draft);
    assert_eq!(ro.parts_cost, dec!(37));
    assert_eq!(ro.total_job_cost, dec!(37));
    assert_eq!(ro.gross_margin, dec!(-37));

    let idx: Vec<i32> = draft.operations.iter().map(|op| op.idx).collect();
    assert_eq!(idx, vec![1, 2]);
    assert_eq!(draft.parts[0].item_name.as_deref(), Some("OIL-5W30 item"));
    assert_eq!(draft.checklist.len(), 2);

    // Drafts have no snapshot yet
    assert_matches!(
        app.services().costing.get_job_costing(ro.id).await,
        Err(ServiceError::NotFound(_))
    );
}

#[tokio::test]
async fn billable_and_foc_part_is_rejected() {
    let app = TestApp::new().await;
    app.seed_item("PAD-F", dec!(20), dec!(35)).await;

    let mut request = ro_request("Jane Doe", "KA-01-1234");
    request.parts = vec![part("PAD-F", dec!(1), true, true)];

    let result = app.services().repair_orders.create_repair_order(request).await;
    assert_matches!(result, Err(ServiceError::ValidationError(ref msg))
        if msg == "Parts Plan row 1 cannot be both Billable and FoC");
    assert!(app.all_repair_orders().await.is_empty());
}

#[tokio::test]
async fn unknown_item_in_parts_plan_is_rejected() {
    let app = TestApp::new().await;
    let mut request = ro_request("Jane Doe", "KA-01-1234");
    request.parts = vec![part("NOPE", dec!(1), true, false)];

    assert_matches!(
        app.services().repair_orders.create_repair_order(request).await,
        Err(ServiceError::ValidationError(_))
    );
}

#[tokio::test]
async fn submit_opens_project_with_one_task_per_operation() {
    let app = TestApp::new().await;
    let mut request = ro_request("Jane Doe", "KA-01-1234");
    request.operations = vec![
        operation("Brake service", 60, false),
        operation("", 10, false),
        operation("Final QC", 15, true),
    ];

    let submitted = app.create_submitted(request).await;
    let ro = &submitted.repair_order;

    assert_eq!(ro.docstatus, DocStatus::Submitted);
    assert_eq!(ro.status, RepairOrderStatus::Scheduled);
    let project_id = ro.project_id.expect("project created");

    let project = project::Entity::find_by_id(project_id)
        .one(&*app.state.db)
        .await
        .unwrap()
        .unwrap();
    assert_eq!(project.project_name, format!("RO {} - Jane Doe", ro.name));
    assert_eq!(project.repair_order_id, Some(ro.id));

    let tasks = app.tasks_of(&submitted).await;
    let subjects: Vec<&str> = tasks.iter().map(|t| t.subject.as_str()).collect();
    assert_eq!(subjects, vec!["Brake service", "Operation 2", "Final QC"]);
    assert!(tasks.iter().all(|t| t.status == TaskStatus::Open));
    assert!(tasks.iter().all(|t| t.project_id == Some(project_id)));

    // Task creation alone does not start the job
    assert_eq!(app.reload(ro.id).await.status, RepairOrderStatus::Scheduled);

    let snapshot = app.services().costing.get_job_costing(ro.id).await.unwrap();
    assert_eq!(snapshot.project_id, Some(project_id));
    assert_eq!(snapshot.vehicle, "KA-01-1234");
}

#[tokio::test]
async fn submitting_twice_is_rejected() {
    let app = TestApp::new().await;
    let submitted = app.create_submitted(ro_request("Jane Doe", "KA-01-1234")).await;

    assert_matches!(
        app.services()
            .repair_orders
            .submit_repair_order(submitted.repair_order.id)
            .await,
        Err(ServiceError::InvalidOperation(_))
    );
}

#[tokio::test]
async fn pending_template_is_applied_on_submit_once() {
    let app = TestApp::new().await;
    app.seed_item("COOLANT", dec!(6), dec!(10)).await;
    let template = app
        .services()
        .masters
        .create_service_template(ServiceTemplateRequest {
            template_name: "Cooling system flush".to_string(),
            description: None,
            operations: vec![TemplateOperation {
                operation_name: Some("Flush radiator".to_string()),
                planned_minutes: 45,
                workstation: Some("Bay 2".to_string()),
                is_qc: false,
            }],
            parts: vec![TemplatePart {
                item_code: "COOLANT".to_string(),
                uom: None,
                qty_planned: dec!(5),
                is_billable: true,
                is_foc: false,
            }],
            checklist: vec![TemplateCheck {
                check_item: "No leaks".to_string(),
                check_type: None,
            }],
        })
        .await
        .unwrap();

    let mut request = ro_request("Jane Doe", "KA-01-1234");
    request.service_template_id = Some(template.id);
    request.operations = vec![operation("Inspection", 20, false)];
    let submitted = app.create_submitted(request).await;

    let names: Vec<_> = submitted
        .operations
        .iter()
        .map(|op| (op.idx, op.operation_name.clone().unwrap_or_default()))
        .collect();
    assert_eq!(
        names,
        vec![(1, "Inspection".to_string()), (2, "Flush radiator".to_string())]
    );
    assert_eq!(submitted.parts.len(), 1);
    assert_eq!(submitted.checklist.len(), 1);
    assert!(submitted.repair_order.template_applied);
    assert_eq!(submitted.repair_order.parts_cost, dec!(30));
    assert_eq!(app.tasks_of(&submitted).await.len(), 2);
}

#[tokio::test]
async fn explicit_template_application_appends_each_time() {
    let app = TestApp::new().await;
    let template = app
        .services()
        .masters
        .create_service_template(ServiceTemplateRequest {
            template_name: "Wheel alignment".to_string(),
            description: None,
            operations: vec![TemplateOperation {
                operation_name: Some("Align".to_string()),
                planned_minutes: 40,
                workstation: None,
                is_qc: false,
            }],
            parts: Vec::new(),
            checklist: Vec::new(),
        })
        .await
        .unwrap();

    let draft = app.create_draft(ro_request("Jane Doe", "KA-01-1234")).await;
    let service = &app.services().repair_orders;
    service
        .apply_service_template(draft.repair_order.id, template.id)
        .await
        .unwrap();
    let twice = service
        .apply_service_template(draft.repair_order.id, template.id)
        .await
        .unwrap();

    let idx: Vec<i32> = twice.operations.iter().map(|op| op.idx).collect();
    assert_eq!(idx, vec![1, 2]);

    let submitted = service.submit_repair_order(draft.repair_order.id).await.unwrap();
    assert_eq!(submitted.operations.len(), 2);

    assert_matches!(
        service
            .apply_service_template(draft.repair_order.id, template.id)
            .await,
        Err(ServiceError::InvalidOperation(ref msg))
            if msg == "Cannot apply template to submitted Repair Order"
    );
}

#[tokio::test]
async fn set_status_only_accepts_the_manual_buttons() {
    let app = TestApp::new().await;
    let submitted = app.create_submitted(ro_request("Jane Doe", "KA-01-1234")).await;
    let id = submitted.repair_order.id;
    let service = &app.services().repair_orders;

    assert_matches!(
        service.set_status(id, "Completed").await,
        Err(ServiceError::ValidationError(ref msg))
            if msg == "Cannot manually set status to Completed. Use buttons for: Scheduled, On Hold, Cancelled"
    );

    let held = service.set_status(id, "On Hold").await.unwrap();
    assert_eq!(held.repair_order.status, RepairOrderStatus::OnHold);

    let back = service.set_status(id, "Scheduled").await.unwrap();
    assert_eq!(back.repair_order.status, RepairOrderStatus::Scheduled);
    assert!(back.repair_order.status_changed_at >= held.repair_order.status_changed_at);

    let cancelled = service.set_status(id, "Cancelled").await.unwrap();
    assert_eq!(cancelled.repair_order.status, RepairOrderStatus::Cancelled);

    assert_matches!(
        service.set_status(id, "Scheduled").await,
        Err(ServiceError::InvalidOperation(_))
    );
}

#[tokio::test]
async fn same_status_is_a_recompute_only_no_op() {
    let app = TestApp::new().await;
    let submitted = app.create_submitted(ro_request("Jane Doe", "KA-01-1234")).await;
    let before = submitted.repair_order.status_changed_at;

    let again = app
        .services()
        .repair_orders
        .set_status(submitted.repair_order.id, "Scheduled")
        .await
        .unwrap();

    assert_eq!(again.repair_order.status, RepairOrderStatus::Scheduled);
    assert_eq!(again.repair_order.status_changed_at, before);
}

#[tokio::test]
async fn ready_for_handover_waits_for_closed_qc_tasks() {
    let app = TestApp::new().await;
    let mut request = ro_request("Jane Doe", "KA-01-1234");
    request.operations = vec![operation("Repair", 30, false), operation("Final QC", 10, true)];
    let submitted = app.create_submitted(request).await;
    let id = submitted.repair_order.id;
    let tasks = app.tasks_of(&submitted).await;

    let to_handover = || UpdateAfterSubmitRequest {
        status: Some(RepairOrderStatus::ReadyForHandover),
        ..Default::default()
    };

    let service = &app.services().repair_orders;
    assert_matches!(
        service.update_after_submit(id, to_handover()).await,
        Err(ServiceError::ValidationError(ref msg))
            if msg == "Cannot set Ready for Handover. QC tasks incomplete: Final QC"
    );

    // Completed is not enough; the QC task must be closed
    app.services()
        .documents
        .set_task_status(tasks[1].id, TaskStatus::Completed)
        .await
        .unwrap();
    assert_matches!(
        service.update_after_submit(id, to_handover()).await,
        Err(ServiceError::ValidationError(_))
    );

    app.services()
        .documents
        .set_task_status(tasks[1].id, TaskStatus::Closed)
        .await
        .unwrap();
    let ready = service.update_after_submit(id, to_handover()).await.unwrap();
    assert_eq!(ready.repair_order.status, RepairOrderStatus::ReadyForHandover);
}

#[tokio::test]
async fn update_after_submit_rejects_non_progress_statuses() {
    let app = TestApp::new().await;
    let submitted = app.create_submitted(ro_request("Jane Doe", "KA-01-1234")).await;

    let result = app
        .services()
        .repair_orders
        .update_after_submit(
            submitted.repair_order.id,
            UpdateAfterSubmitRequest {
                status: Some(RepairOrderStatus::Invoiced),
                ..Default::default()
            },
        )
        .await;
    assert_matches!(result, Err(ServiceError::ValidationError(_)));
}

#[tokio::test]
async fn update_after_submit_marks_checks_and_notes() {
    let app = TestApp::new().await;
    let mut request = ro_request("Jane Doe", "KA-01-1234");
    request.checklist = vec![check("Wipers")];
    let submitted = app.create_submitted(request).await;

    let updated = app
        .services()
        .repair_orders
        .update_after_submit(
            submitted.repair_order.id,
            UpdateAfterSubmitRequest {
                advisor: Some("Sam".to_string()),
                notes: Some("Customer waiting".to_string()),
                checks: vec![CheckMark {
                    check_id: submitted.checklist[0].id,
                    is_checked: true,
                }],
                ..Default::default()
            },
        )
        .await
        .unwrap();

    assert_eq!(updated.repair_order.advisor.as_deref(), Some("Sam"));
    assert_eq!(updated.repair_order.notes.as_deref(), Some("Customer waiting"));
    assert!(updated.checklist[0].is_checked);
}

#[tokio::test]
async fn drafts_can_be_replaced_but_submitted_orders_cannot() {
    let app = TestApp::new().await;
    let draft = app.create_draft(ro_request("Jane Doe", "KA-01-1234")).await;
    let service = &app.services().repair_orders;

    let mut replacement = ro_request("John Roe", "MH-12-9999");
    replacement.operations = vec![operation("Diagnostics", 25, false)];
    let replaced = service
        .update_repair_order(draft.repair_order.id, replacement.clone())
        .await
        .unwrap();
    assert_eq!(replaced.repair_order.customer, "John Roe");
    assert_eq!(replaced.operations.len(), 1);

    service.submit_repair_order(draft.repair_order.id).await.unwrap();
    assert_matches!(
        service
            .update_repair_order(draft.repair_order.id, replacement)
            .await,
        Err(ServiceError::InvalidOperation(_))
    );
}

#[tokio::test]
async fn cancelling_sets_both_statuses() {
    let app = TestApp::new().await;
    let submitted = app.create_submitted(ro_request("Jane Doe", "KA-01-1234")).await;

    let cancelled = app
        .services()
        .repair_orders
        .cancel_repair_order(submitted.repair_order.id)
        .await
        .unwrap();
    assert_eq!(cancelled.repair_order.docstatus, DocStatus::Cancelled);
    assert_eq!(cancelled.repair_order.status, RepairOrderStatus::Cancelled);
}

#[tokio::test]
async fn listing_filters_by_status_and_customer() {
    let app = TestApp::new().await;
    let first = app.create_submitted(ro_request("Jane Doe", "KA-01-1234")).await;
    app.create_draft(ro_request("John Roe", "MH-12-9999")).await;
    app.services()
        .repair_orders
        .set_status(first.repair_order.id, "On Hold")
        .await
        .unwrap();

    let (held, total) = app
        .services()
        .repair_orders
        .list_repair_orders(&ListRepairOrdersQuery {
            status: Some("On Hold".to_string()),
            ..Default::default()
        })
        .await
        .unwrap();
    assert_eq!(total, 1);
    assert_eq!(held[0].id, first.repair_order.id);

    let (johns, _) = app
        .services()
        .repair_orders
        .list_repair_orders(&ListRepairOrdersQuery {
            customer: Some("John Roe".to_string()),
            ..Default::default()
        })
        .await
        .unwrap();
    assert_eq!(johns.len(), 1);
    assert_eq!(johns[0].vehicle, "MH-12-9999");
}

#[tokio::test]
async fn portal_shows_tasks_and_only_visible_updates() {
    let app = TestApp::new().await;
    let mut request = ro_request("Jane Doe", "KA-01-1234");
    request.operations = vec![operation("Repair", 30, false)];
    let submitted = app.create_submitted(request).await;
    let service = &app.services().repair_orders;

    service
        .add_customer_update(
            submitted.repair_order.id,
            CustomerUpdateRequest {
                message: "Parts ordered".to_string(),
                visible_on_portal: true,
            },
        )
        .await
        .unwrap();
    service
        .add_customer_update(
            submitted.repair_order.id,
            CustomerUpdateRequest {
                message: "Internal: supplier late".to_string(),
                visible_on_portal: false,
            },
        )
        .await
        .unwrap();

    let page = service
        .repair_status(&submitted.repair_order.name)
        .await
        .unwrap();
    assert_eq!(page.status, RepairOrderStatus::Scheduled);
    assert_eq!(page.tasks.len(), 1);
    assert_eq!(page.tasks[0].subject, "Repair");
    let messages: Vec<&str> = page.updates.iter().map(|u| u.message.as_str()).collect();
    assert_eq!(messages, vec!["Parts ordered"]);

    assert_matches!(
        service.repair_status("RO-missing").await,
        Err(ServiceError::NotFound(_))
    );
}

#[tokio::test]
async fn far_away_pages_are_empty_not_a_crash() {
    let app = TestApp::new().await;
    app.create_draft(ro_request("Jane Doe", "KA-01-1234")).await;

    let (rows, total) = app
        .services()
        .repair_orders
        .list_repair_orders(&ListRepairOrdersQuery {
            page: Some(u64::MAX / 100),
            limit: Some(200),
            ..Default::default()
        })
        .await
        .unwrap();
    assert_eq!(total, 1);
    assert!(rows.is_empty());
}

#[tokio::test]
async fn status_labels_must_match_exactly() {
    let app = TestApp::new().await;
    let submitted = app.create_submitted(ro_request("Jane Doe", "KA-01-1234")).await;

    assert_matches!(
        app.services()
            .repair_orders
            .set_status(submitted.repair_order.id, "on hold")
            .await,
        Err(ServiceError::ValidationError(_))
    );
    assert_eq!(
        app.reload(submitted.repair_order.id).await.status,
        RepairOrderStatus::Scheduled
    );
}

#[tokio::test]
async fn negative_other_charges_are_rejected() {
    let app = TestApp::new().await;
    let submitted = app.create_submitted(ro_request("Jane Doe", "KA-01-1234")).await;

    let result = app
        .services()
        .repair_orders
        .update_after_submit(
            submitted.repair_order.id,
            UpdateAfterSubmitRequest {
                other_charges: Some(Some(dec!(-25))),
                ..Default::default()
            },
        )
        .await;
    assert_matches!(result, Err(ServiceError::ValidationError(_)));

    let ro = app.reload(submitted.repair_order.id).await;
    assert!(!ro.other_charges_manual);
    assert_eq!(ro.other_charges, dec!(0));
}

#[tokio::test]
async fn stale_writes_are_refused() {
    let app = TestApp::new().await;
    let submitted = app.create_submitted(ro_request("Jane Doe", "KA-01-1234")).await;
    let id = submitted.repair_order.id;

    let stale = app.reload(id).await;
    let held = app
        .services()
        .repair_orders
        .set_status(id, "On Hold")
        .await
        .unwrap();
    assert!(held.repair_order.version > stale.version);

    let mut late: repair_order::ActiveModel = stale.into();
    late.notes = Set(Some("edited from an old screen".to_string()));
    assert_matches!(
        save_repair_order(&*app.state.db, late).await,
        Err(ServiceError::Conflict(_))
    );

    let ro = app.reload(id).await;
    assert_eq!(ro.status, RepairOrderStatus::OnHold);
    assert_eq!(ro.notes, None);
}
