use sea_orm_migration::prelude::*;

pub struct Migrator;

#[async_trait::async_trait]
impl MigratorTrait for Migrator {
    fn migrations() -> Vec<Box<dyn MigrationTrait>> {
        vec![
            Box::new(m20240101_000001_create_master_tables::Migration),
            Box::new(m20240101_000002_create_repair_order_tables::Migration),
            Box::new(m20240101_000003_create_commercial_tables::Migration),
            Box::new(m20240101_000004_create_stock_tables::Migration),
        ]
    }
}

mod m20240101_000001_create_master_tables {
    use sea_orm_migration::prelude::*;

    pub struct Migration;

    impl MigrationName for Migration {
        fn name(&self) -> &str {
            "m20240101_000001_create_master_tables"
        }
    }

    #[async_trait::async_trait]
    impl MigrationTrait for Migration {
        async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
            manager
                .create_table(
                    Table::create()
                        .table(Items::Table)
                        .if_not_exists()
                        .col(
                            ColumnDef::new(Items::ItemCode)
                                .string()
                                .not_null()
                                .primary_key(),
                        )
                        .col(ColumnDef::new(Items::ItemName).string().not_null())
                        .col(ColumnDef::new(Items::StockUom).string().not_null())
                        .col(
                            ColumnDef::new(Items::ValuationRate)
                                .decimal()
                                .not_null()
                                .default(0),
                        )
                        .col(
                            ColumnDef::new(Items::StandardRate)
                                .decimal()
                                .not_null()
                                .default(0),
                        )
                        .col(
                            ColumnDef::new(Items::IsStockItem)
                                .boolean()
                                .not_null()
                                .default(true),
                        )
                        .to_owned(),
                )
                .await?;

            manager
                .create_table(
                    Table::create()
                        .table(ServiceTemplates::Table)
                        .if_not_exists()
                        .col(
                            ColumnDef::new(ServiceTemplates::Id)
                                .uuid()
                                .not_null()
                                .primary_key(),
                        )
                        .col(
                            ColumnDef::new(ServiceTemplates::TemplateName)
                                .string()
                                .not_null()
                                .unique_key(),
                        )
                        .col(ColumnDef::new(ServiceTemplates::Description).string().null())
                        .col(
                            ColumnDef::new(ServiceTemplates::DefaultOperations)
                                .json()
                                .not_null(),
                        )
                        .col(ColumnDef::new(ServiceTemplates::DefaultParts).json().not_null())
                        .col(
                            ColumnDef::new(ServiceTemplates::DefaultChecklist)
                                .json()
                                .not_null(),
                        )
                        .to_owned(),
                )
                .await?;

            manager
                .create_table(
                    Table::create()
                        .table(Projects::Table)
                        .if_not_exists()
                        .col(ColumnDef::new(Projects::Id).uuid().not_null().primary_key())
                        .col(ColumnDef::new(Projects::Name).string().not_null().unique_key())
                        .col(ColumnDef::new(Projects::ProjectName).string().not_null())
                        .col(ColumnDef::new(Projects::Customer).string().null())
                        .col(ColumnDef::new(Projects::RepairOrderId).uuid().null())
                        .col(
                            ColumnDef::new(Projects::CreatedAt)
                                .timestamp_with_time_zone()
                                .not_null(),
                        )
                        .to_owned(),
                )
                .await?;

            manager
                .create_table(
                    Table::create()
                        .table(Tasks::Table)
                        .if_not_exists()
                        .col(ColumnDef::new(Tasks::Id).uuid().not_null().primary_key())
                        .col(ColumnDef::new(Tasks::Name).string().not_null().unique_key())
                        .col(ColumnDef::new(Tasks::Subject).string().not_null())
                        .col(ColumnDef::new(Tasks::ProjectId).uuid().null())
                        .col(ColumnDef::new(Tasks::RepairOrderId).uuid().null())
                        .col(ColumnDef::new(Tasks::Status).string_len(32).not_null())
                        .col(ColumnDef::new(Tasks::ExpStartDate).date().null())
                        .col(ColumnDef::new(Tasks::ExpEndDate).date().null())
                        .col(
                            ColumnDef::new(Tasks::CreatedAt)
                                .timestamp_with_time_zone()
                                .not_null(),
                        )
                        .col(
                            ColumnDef::new(Tasks::UpdatedAt)
                                .timestamp_with_time_zone()
                                .not_null(),
                        )
                        .foreign_key(
                            ForeignKey::create()
                                .name("fk_tasks_project")
                                .from(Tasks::Table, Tasks::ProjectId)
                                .to(Projects::Table, Projects::Id)
                                .on_delete(ForeignKeyAction::SetNull),
                        )
                        .to_owned(),
                )
                .await?;

            manager
                .create_index(
                    Index::create()
                        .name("idx_tasks_repair_order")
                        .table(Tasks::Table)
                        .col(Tasks::RepairOrderId)
                        .if_not_exists()
                        .to_owned(),
                )
                .await
        }

        async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
            manager
                .drop_table(Table::drop().table(Tasks::Table).to_owned())
                .await?;
            manager
                .drop_table(Table::drop().table(Projects::Table).to_owned())
                .await?;
            manager
                .drop_table(Table::drop().table(ServiceTemplates::Table).to_owned())
                .await?;
            manager
                .drop_table(Table::drop().table(Items::Table).to_owned())
                .await
        }
    }

    #[derive(DeriveIden)]
    enum Items {
        Table,
        ItemCode,
        ItemName,
        StockUom,
        ValuationRate,
        StandardRate,
        IsStockItem,
    }

    #[derive(DeriveIden)]
    enum ServiceTemplates {
        Table,
        Id,
        TemplateName,
        Description,
        DefaultOperations,
        DefaultParts,
        DefaultChecklist,
    }

    #[derive(DeriveIden)]
    enum Projects {
        Table,
        Id,
        Name,
        ProjectName,
        Customer,
        RepairOrderId,
        CreatedAt,
    }

    #[derive(DeriveIden)]
    enum Tasks {
        Table,
        Id,
        Name,
        Subject,
        ProjectId,
        RepairOrderId,
        Status,
        ExpStartDate,
        ExpEndDate,
        CreatedAt,
        UpdatedAt,
    }
}

mod m20240101_000002_create_repair_order_tables {
    use sea_orm_migration::prelude::*;

    pub struct Migration;

    impl MigrationName for Migration {
        fn name(&self) -> &str {
            "m20240101_000002_create_repair_order_tables"
        }
    }

    fn money(col: RepairOrders) -> ColumnDef {
        ColumnDef::new(col).decimal().not_null().default(0).to_owned()
    }

    #[async_trait::async_trait]
    impl MigrationTrait for Migration {
        async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
            manager
                .create_table(
                    Table::create()
                        .table(RepairOrders::Table)
                        .if_not_exists()
                        .col(
                            ColumnDef::new(RepairOrders::Id)
                                .uuid()
                                .not_null()
                                .primary_key(),
                        )
                        .col(
                            ColumnDef::new(RepairOrders::Name)
                                .string()
                                .not_null()
                                .unique_key(),
                        )
                        .col(ColumnDef::new(RepairOrders::Customer).string().not_null())
                        .col(ColumnDef::new(RepairOrders::Vehicle).string().not_null())
                        .col(ColumnDef::new(RepairOrders::Advisor).string().null())
                        .col(
                            ColumnDef::new(RepairOrders::Priority)
                                .string_len(16)
                                .not_null(),
                        )
                        .col(ColumnDef::new(RepairOrders::Status).string_len(32).not_null())
                        .col(
                            ColumnDef::new(RepairOrders::Docstatus)
                                .string_len(16)
                                .not_null(),
                        )
                        .col(ColumnDef::new(RepairOrders::ServiceTemplateId).uuid().null())
                        .col(
                            ColumnDef::new(RepairOrders::TemplateApplied)
                                .boolean()
                                .not_null()
                                .default(false),
                        )
                        .col(ColumnDef::new(RepairOrders::ProjectId).uuid().null())
                        .col(ColumnDef::new(RepairOrders::QuotationId).uuid().null())
                        .col(ColumnDef::new(RepairOrders::SalesOrderId).uuid().null())
                        .col(ColumnDef::new(RepairOrders::SalesInvoiceId).uuid().null())
                        .col(
                            ColumnDef::new(RepairOrders::SlaResponseBy)
                                .timestamp_with_time_zone()
                                .null(),
                        )
                        .col(
                            ColumnDef::new(RepairOrders::SlaDeliveryBy)
                                .timestamp_with_time_zone()
                                .null(),
                        )
                        .col(money(RepairOrders::PartsCost))
                        .col(money(RepairOrders::LaborCost))
                        .col(money(RepairOrders::OtherCharges))
                        .col(
                            ColumnDef::new(RepairOrders::OtherChargesManual)
                                .boolean()
                                .not_null()
                                .default(false),
                        )
                        .col(money(RepairOrders::TotalJobCost))
                        .col(money(RepairOrders::QuotedAmount))
                        .col(money(RepairOrders::InvoicedAmount))
                        .col(money(RepairOrders::GrossMargin))
                        .col(ColumnDef::new(RepairOrders::Notes).text().null())
                        .col(
                            ColumnDef::new(RepairOrders::Version)
                                .integer()
                                .not_null()
                                .default(1),
                        )
                        .col(
                            ColumnDef::new(RepairOrders::StatusChangedAt)
                                .timestamp_with_time_zone()
                                .not_null(),
                        )
                        .col(
                            ColumnDef::new(RepairOrders::CreatedAt)
                                .timestamp_with_time_zone()
                                .not_null(),
                        )
                        .col(
                            ColumnDef::new(RepairOrders::UpdatedAt)
                                .timestamp_with_time_zone()
                                .not_null(),
                        )
                        .to_owned(),
                )
                .await?;

            manager
                .create_index(
                    Index::create()
                        .name("idx_repair_orders_vehicle")
                        .table(RepairOrders::Table)
                        .col(RepairOrders::Vehicle)
                        .if_not_exists()
                        .to_owned(),
                )
                .await?;

            manager
                .create_table(
                    Table::create()
                        .table(RepairOperations::Table)
                        .if_not_exists()
                        .col(
                            ColumnDef::new(RepairOperations::Id)
                                .uuid()
                                .not_null()
                                .primary_key(),
                        )
                        .col(
                            ColumnDef::new(RepairOperations::RepairOrderId)
                                .uuid()
                                .not_null(),
                        )
                        .col(ColumnDef::new(RepairOperations::Idx).integer().not_null())
                        .col(ColumnDef::new(RepairOperations::OperationName).string().null())
                        .col(
                            ColumnDef::new(RepairOperations::PlannedMinutes)
                                .integer()
                                .not_null()
                                .default(0),
                        )
                        .col(ColumnDef::new(RepairOperations::Workstation).string().null())
                        .col(
                            ColumnDef::new(RepairOperations::IsQc)
                                .boolean()
                                .not_null()
                                .default(false),
                        )
                        .col(ColumnDef::new(RepairOperations::TaskId).uuid().null())
                        .foreign_key(
                            ForeignKey::create()
                                .name("fk_repair_operations_repair_order")
                                .from(RepairOperations::Table, RepairOperations::RepairOrderId)
                                .to(RepairOrders::Table, RepairOrders::Id)
                                .on_delete(ForeignKeyAction::Cascade),
                        )
                        .to_owned(),
                )
                .await?;

            manager
                .create_table(
                    Table::create()
                        .table(RepairParts::Table)
                        .if_not_exists()
                        .col(ColumnDef::new(RepairParts::Id).uuid().not_null().primary_key())
                        .col(ColumnDef::new(RepairParts::RepairOrderId).uuid().not_null())
                        .col(ColumnDef::new(RepairParts::Idx).integer().not_null())
                        .col(ColumnDef::new(RepairParts::ItemCode).string().not_null())
                        .col(ColumnDef::new(RepairParts::ItemName).string().null())
                        .col(ColumnDef::new(RepairParts::Uom).string().null())
                        .col(
                            ColumnDef::new(RepairParts::QtyPlanned)
                                .decimal()
                                .not_null()
                                .default(0),
                        )
                        .col(
                            ColumnDef::new(RepairParts::IsBillable)
                                .boolean()
                                .not_null()
                                .default(false),
                        )
                        .col(
                            ColumnDef::new(RepairParts::IsFoc)
                                .boolean()
                                .not_null()
                                .default(false),
                        )
                        .col(ColumnDef::new(RepairParts::Notes).string().null())
                        .foreign_key(
                            ForeignKey::create()
                                .name("fk_repair_parts_repair_order")
                                .from(RepairParts::Table, RepairParts::RepairOrderId)
                                .to(RepairOrders::Table, RepairOrders::Id)
                                .on_delete(ForeignKeyAction::Cascade),
                        )
                        .to_owned(),
                )
                .await?;

            manager
                .create_table(
                    Table::create()
                        .table(HandoverChecks::Table)
                        .if_not_exists()
                        .col(
                            ColumnDef::new(HandoverChecks::Id)
                                .uuid()
                                .not_null()
                                .primary_key(),
                        )
                        .col(ColumnDef::new(HandoverChecks::RepairOrderId).uuid().not_null())
                        .col(ColumnDef::new(HandoverChecks::Idx).integer().not_null())
                        .col(ColumnDef::new(HandoverChecks::CheckItem).string().not_null())
                        .col(ColumnDef::new(HandoverChecks::CheckType).string().null())
                        .col(
                            ColumnDef::new(HandoverChecks::IsChecked)
                                .boolean()
                                .not_null()
                                .default(false),
                        )
                        .foreign_key(
                            ForeignKey::create()
                                .name("fk_handover_checks_repair_order")
                                .from(HandoverChecks::Table, HandoverChecks::RepairOrderId)
                                .to(RepairOrders::Table, RepairOrders::Id)
                                .on_delete(ForeignKeyAction::Cascade),
                        )
                        .to_owned(),
                )
                .await?;

            manager
                .create_table(
                    Table::create()
                        .table(CustomerUpdates::Table)
                        .if_not_exists()
                        .col(
                            ColumnDef::new(CustomerUpdates::Id)
                                .uuid()
                                .not_null()
                                .primary_key(),
                        )
                        .col(ColumnDef::new(CustomerUpdates::RepairOrderId).uuid().not_null())
                        .col(ColumnDef::new(CustomerUpdates::Message).text().not_null())
                        .col(
                            ColumnDef::new(CustomerUpdates::VisibleOnPortal)
                                .boolean()
                                .not_null()
                                .default(false),
                        )
                        .col(
                            ColumnDef::new(CustomerUpdates::CreatedAt)
                                .timestamp_with_time_zone()
                                .not_null(),
                        )
                        .foreign_key(
                            ForeignKey::create()
                                .name("fk_customer_updates_repair_order")
                                .from(CustomerUpdates::Table, CustomerUpdates::RepairOrderId)
                                .to(RepairOrders::Table, RepairOrders::Id)
                                .on_delete(ForeignKeyAction::Cascade),
                        )
                        .to_owned(),
                )
                .await?;

            manager
                .create_table(
                    Table::create()
                        .table(JobCostings::Table)
                        .if_not_exists()
                        .col(ColumnDef::new(JobCostings::Id).uuid().not_null().primary_key())
                        .col(
                            ColumnDef::new(JobCostings::RepairOrderId)
                                .uuid()
                                .not_null()
                                .unique_key(),
                        )
                        .col(ColumnDef::new(JobCostings::ProjectId).uuid().null())
                        .col(ColumnDef::new(JobCostings::Vehicle).string().not_null())
                        .col(ColumnDef::new(JobCostings::PartsCost).decimal().not_null())
                        .col(ColumnDef::new(JobCostings::LaborCost).decimal().not_null())
                        .col(ColumnDef::new(JobCostings::OtherCharges).decimal().not_null())
                        .col(ColumnDef::new(JobCostings::TotalJobCost).decimal().not_null())
                        .col(
                            ColumnDef::new(JobCostings::MarginSnapshot)
                                .decimal()
                                .not_null(),
                        )
                        .col(
                            ColumnDef::new(JobCostings::UpdatedAt)
                                .timestamp_with_time_zone()
                                .not_null(),
                        )
                        .foreign_key(
                            ForeignKey::create()
                                .name("fk_job_costings_repair_order")
                                .from(JobCostings::Table, JobCostings::RepairOrderId)
                                .to(RepairOrders::Table, RepairOrders::Id)
                                .on_delete(ForeignKeyAction::Cascade),
                        )
                        .to_owned(),
                )
                .await
        }

        async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
            manager
                .drop_table(Table::drop().table(JobCostings::Table).to_owned())
                .await?;
            manager
                .drop_table(Table::drop().table(CustomerUpdates::Table).to_owned())
                .await?;
            manager
                .drop_table(Table::drop().table(HandoverChecks::Table).to_owned())
                .await?;
            manager
                .drop_table(Table::drop().table(RepairParts::Table).to_owned())
                .await?;
            manager
                .drop_table(Table::drop().table(RepairOperations::Table).to_owned())
                .await?;
            manager
                .drop_table(Table::drop().table(RepairOrders::Table).to_owned())
                .await
        }
    }

    #[derive(DeriveIden, Clone, Copy)]
    enum RepairOrders {
        Table,
        Id,
        Name,
        Customer,
        Vehicle,
        Advisor,
        Priority,
        Status,
        Docstatus,
        ServiceTemplateId,
        TemplateApplied,
        ProjectId,
        QuotationId,
        SalesOrderId,
        SalesInvoiceId,
        SlaResponseBy,
        SlaDeliveryBy,
        PartsCost,
        LaborCost,
        OtherCharges,
        OtherChargesManual,
        TotalJobCost,
        QuotedAmount,
        InvoicedAmount,
        GrossMargin,
        Notes,
        Version,
        StatusChangedAt,
        CreatedAt,
        UpdatedAt,
    }

    #[derive(DeriveIden)]
    enum RepairOperations {
        Table,
        Id,
        RepairOrderId,
        Idx,
        OperationName,
        PlannedMinutes,
        Workstation,
        IsQc,
        TaskId,
    }

    #[derive(DeriveIden)]
    enum RepairParts {
        Table,
        Id,
        RepairOrderId,
        Idx,
        ItemCode,
        ItemName,
        Uom,
        QtyPlanned,
        IsBillable,
        IsFoc,
        Notes,
    }

    #[derive(DeriveIden)]
    enum HandoverChecks {
        Table,
        Id,
        RepairOrderId,
        Idx,
        CheckItem,
        CheckType,
        IsChecked,
    }

    #[derive(DeriveIden)]
    enum CustomerUpdates {
        Table,
        Id,
        RepairOrderId,
        Message,
        VisibleOnPortal,
        CreatedAt,
    }

    #[derive(DeriveIden)]
    enum JobCostings {
        Table,
        Id,
        RepairOrderId,
        ProjectId,
        Vehicle,
        PartsCost,
        LaborCost,
        OtherCharges,
        TotalJobCost,
        MarginSnapshot,
        UpdatedAt,
    }
}

mod m20240101_000003_create_commercial_tables {
    use sea_orm_migration::prelude::*;

    pub struct Migration;

    impl MigrationName for Migration {
        fn name(&self) -> &str {
            "m20240101_000003_create_commercial_tables"
        }
    }

    fn amount<T: IntoIden + 'static>(col: T) -> ColumnDef {
        ColumnDef::new(col).decimal().not_null().default(0).to_owned()
    }

    fn docstatus<T: IntoIden + 'static>(col: T) -> ColumnDef {
        ColumnDef::new(col).string_len(16).not_null().to_owned()
    }

    fn created_at<T: IntoIden + 'static>(col: T) -> ColumnDef {
        ColumnDef::new(col)
            .timestamp_with_time_zone()
            .not_null()
            .to_owned()
    }

    #[async_trait::async_trait]
    impl MigrationTrait for Migration {
        async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
            manager
                .create_table(
                    Table::create()
                        .table(Timesheets::Table)
                        .if_not_exists()
                        .col(ColumnDef::new(Timesheets::Id).uuid().not_null().primary_key())
                        .col(ColumnDef::new(Timesheets::Name).string().not_null().unique_key())
                        .col(ColumnDef::new(Timesheets::Employee).string().not_null())
                        .col(ColumnDef::new(Timesheets::RepairOrderId).uuid().null())
                        .col(docstatus(Timesheets::Docstatus))
                        .col(created_at(Timesheets::CreatedAt))
                        .to_owned(),
                )
                .await?;

            manager
                .create_table(
                    Table::create()
                        .table(TimesheetDetails::Table)
                        .if_not_exists()
                        .col(
                            ColumnDef::new(TimesheetDetails::Id)
                                .uuid()
                                .not_null()
                                .primary_key(),
                        )
                        .col(ColumnDef::new(TimesheetDetails::TimesheetId).uuid().not_null())
                        .col(ColumnDef::new(TimesheetDetails::TaskId).uuid().null())
                        .col(ColumnDef::new(TimesheetDetails::ProjectId).uuid().null())
                        .col(ColumnDef::new(TimesheetDetails::ActivityType).string().null())
                        .col(amount(TimesheetDetails::Hours))
                        .col(amount(TimesheetDetails::BillingRate))
                        .col(
                            ColumnDef::new(TimesheetDetails::FromTime)
                                .timestamp_with_time_zone()
                                .null(),
                        )
                        .col(
                            ColumnDef::new(TimesheetDetails::ToTime)
                                .timestamp_with_time_zone()
                                .null(),
                        )
                        .foreign_key(
                            ForeignKey::create()
                                .name("fk_timesheet_details_timesheet")
                                .from(TimesheetDetails::Table, TimesheetDetails::TimesheetId)
                                .to(Timesheets::Table, Timesheets::Id)
                                .on_delete(ForeignKeyAction::Cascade),
                        )
                        .to_owned(),
                )
                .await?;

            manager
                .create_table(
                    Table::create()
                        .table(PurchaseInvoices::Table)
                        .if_not_exists()
                        .col(
                            ColumnDef::new(PurchaseInvoices::Id)
                                .uuid()
                                .not_null()
                                .primary_key(),
                        )
                        .col(
                            ColumnDef::new(PurchaseInvoices::Name)
                                .string()
                                .not_null()
                                .unique_key(),
                        )
                        .col(ColumnDef::new(PurchaseInvoices::Supplier).string().not_null())
                        .col(ColumnDef::new(PurchaseInvoices::RepairOrderId).uuid().null())
                        .col(amount(PurchaseInvoices::GrandTotal))
                        .col(docstatus(PurchaseInvoices::Docstatus))
                        .col(created_at(PurchaseInvoices::CreatedAt))
                        .to_owned(),
                )
                .await?;

            manager
                .create_table(
                    Table::create()
                        .table(Quotations::Table)
                        .if_not_exists()
                        .col(ColumnDef::new(Quotations::Id).uuid().not_null().primary_key())
                        .col(ColumnDef::new(Quotations::Name).string().not_null().unique_key())
                        .col(ColumnDef::new(Quotations::QuotationTo).string().not_null())
                        .col(ColumnDef::new(Quotations::PartyName).string().not_null())
                        .col(ColumnDef::new(Quotations::OrderType).string().not_null())
                        .col(ColumnDef::new(Quotations::RepairOrderId).uuid().null())
                        .col(amount(Quotations::GrandTotal))
                        .col(docstatus(Quotations::Docstatus))
                        .col(created_at(Quotations::CreatedAt))
                        .to_owned(),
                )
                .await?;

            manager
                .create_table(
                    Table::create()
                        .table(QuotationItems::Table)
                        .if_not_exists()
                        .col(
                            ColumnDef::new(QuotationItems::Id)
                                .uuid()
                                .not_null()
                                .primary_key(),
                        )
                        .col(ColumnDef::new(QuotationItems::QuotationId).uuid().not_null())
                        .col(ColumnDef::new(QuotationItems::Idx).integer().not_null())
                        .col(ColumnDef::new(QuotationItems::ItemCode).string().null())
                        .col(ColumnDef::new(QuotationItems::ItemName).string().not_null())
                        .col(ColumnDef::new(QuotationItems::Description).text().null())
                        .col(amount(QuotationItems::Qty))
                        .col(ColumnDef::new(QuotationItems::Uom).string().not_null())
                        .col(amount(QuotationItems::Rate))
                        .col(amount(QuotationItems::Amount))
                        .col(ColumnDef::new(QuotationItems::RepairOrderId).uuid().null())
                        .col(ColumnDef::new(QuotationItems::Vehicle).string().null())
                        .foreign_key(
                            ForeignKey::create()
                                .name("fk_quotation_items_quotation")
                                .from(QuotationItems::Table, QuotationItems::QuotationId)
                                .to(Quotations::Table, Quotations::Id)
                                .on_delete(ForeignKeyAction::Cascade),
                        )
                        .to_owned(),
                )
                .await?;

            manager
                .create_table(
                    Table::create()
                        .table(SalesOrders::Table)
                        .if_not_exists()
                        .col(ColumnDef::new(SalesOrders::Id).uuid().not_null().primary_key())
                        .col(ColumnDef::new(SalesOrders::Name).string().not_null().unique_key())
                        .col(ColumnDef::new(SalesOrders::Customer).string().not_null())
                        .col(ColumnDef::new(SalesOrders::OrderType).string().not_null())
                        .col(ColumnDef::new(SalesOrders::QuotationId).uuid().null())
                        .col(ColumnDef::new(SalesOrders::RepairOrderId).uuid().null())
                        .col(ColumnDef::new(SalesOrders::ProjectId).uuid().null())
                        .col(amount(SalesOrders::GrandTotal))
                        .col(docstatus(SalesOrders::Docstatus))
                        .col(created_at(SalesOrders::CreatedAt))
                        .to_owned(),
                )
                .await?;

            manager
                .create_table(
                    Table::create()
                        .table(SalesOrderItems::Table)
                        .if_not_exists()
                        .col(
                            ColumnDef::new(SalesOrderItems::Id)
                                .uuid()
                                .not_null()
                                .primary_key(),
                        )
                        .col(ColumnDef::new(SalesOrderItems::SalesOrderId).uuid().not_null())
                        .col(ColumnDef::new(SalesOrderItems::Idx).integer().not_null())
                        .col(ColumnDef::new(SalesOrderItems::ItemCode).string().null())
                        .col(ColumnDef::new(SalesOrderItems::ItemName).string().not_null())
                        .col(amount(SalesOrderItems::Qty))
                        .col(ColumnDef::new(SalesOrderItems::Uom).string().not_null())
                        .col(amount(SalesOrderItems::Rate))
                        .col(amount(SalesOrderItems::Amount))
                        .col(ColumnDef::new(SalesOrderItems::RepairOrderId).uuid().null())
                        .col(ColumnDef::new(SalesOrderItems::Vehicle).string().null())
                        .foreign_key(
                            ForeignKey::create()
                                .name("fk_sales_order_items_sales_order")
                                .from(SalesOrderItems::Table, SalesOrderItems::SalesOrderId)
                                .to(SalesOrders::Table, SalesOrders::Id)
                                .on_delete(ForeignKeyAction::Cascade),
                        )
                        .to_owned(),
                )
                .await?;

            manager
                .create_table(
                    Table::create()
                        .table(SalesInvoices::Table)
                        .if_not_exists()
                        .col(ColumnDef::new(SalesInvoices::Id).uuid().not_null().primary_key())
                        .col(
                            ColumnDef::new(SalesInvoices::Name)
                                .string()
                                .not_null()
                                .unique_key(),
                        )
                        .col(ColumnDef::new(SalesInvoices::Customer).string().not_null())
                        .col(ColumnDef::new(SalesInvoices::RepairOrderId).uuid().null())
                        .col(ColumnDef::new(SalesInvoices::SalesOrderId).uuid().null())
                        .col(ColumnDef::new(SalesInvoices::ProjectId).uuid().null())
                        .col(amount(SalesInvoices::GrandTotal))
                        .col(amount(SalesInvoices::PaidAmount))
                        .col(ColumnDef::new(SalesInvoices::Status).string_len(32).not_null())
                        .col(docstatus(SalesInvoices::Docstatus))
                        .col(created_at(SalesInvoices::CreatedAt))
                        .to_owned(),
                )
                .await?;

            manager
                .create_table(
                    Table::create()
                        .table(SalesInvoiceItems::Table)
                        .if_not_exists()
                        .col(
                            ColumnDef::new(SalesInvoiceItems::Id)
                                .uuid()
                                .not_null()
                                .primary_key(),
                        )
                        .col(
                            ColumnDef::new(SalesInvoiceItems::SalesInvoiceId)
                                .uuid()
                                .not_null(),
                        )
                        .col(ColumnDef::new(SalesInvoiceItems::Idx).integer().not_null())
                        .col(ColumnDef::new(SalesInvoiceItems::ItemCode).string().null())
                        .col(ColumnDef::new(SalesInvoiceItems::ItemName).string().not_null())
                        .col(amount(SalesInvoiceItems::Qty))
                        .col(ColumnDef::new(SalesInvoiceItems::Uom).string().not_null())
                        .col(amount(SalesInvoiceItems::Rate))
                        .col(amount(SalesInvoiceItems::NetAmount))
                        .col(ColumnDef::new(SalesInvoiceItems::RepairOrderId).uuid().null())
                        .col(ColumnDef::new(SalesInvoiceItems::Vehicle).string().null())
                        .foreign_key(
                            ForeignKey::create()
                                .name("fk_sales_invoice_items_sales_invoice")
                                .from(SalesInvoiceItems::Table, SalesInvoiceItems::SalesInvoiceId)
                                .to(SalesInvoices::Table, SalesInvoices::Id)
                                .on_delete(ForeignKeyAction::Cascade),
                        )
                        .to_owned(),
                )
                .await
        }

        async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
            manager
                .drop_table(Table::drop().table(SalesInvoiceItems::Table).to_owned())
                .await?;
            manager
                .drop_table(Table::drop().table(SalesInvoices::Table).to_owned())
                .await?;
            manager
                .drop_table(Table::drop().table(SalesOrderItems::Table).to_owned())
                .await?;
            manager
                .drop_table(Table::drop().table(SalesOrders::Table).to_owned())
                .await?;
            manager
                .drop_table(Table::drop().table(QuotationItems::Table).to_owned())
                .await?;
            manager
                .drop_table(Table::drop().table(Quotations::Table).to_owned())
                .await?;
            manager
                .drop_table(Table::drop().table(PurchaseInvoices::Table).to_owned())
                .await?;
            manager
                .drop_table(Table::drop().table(TimesheetDetails::Table).to_owned())
                .await?;
            manager
                .drop_table(Table::drop().table(Timesheets::Table).to_owned())
                .await
        }
    }

    #[derive(DeriveIden)]
    enum Timesheets {
        Table,
        Id,
        Name,
        Employee,
        RepairOrderId,
        Docstatus,
        CreatedAt,
    }

    #[derive(DeriveIden)]
    enum TimesheetDetails {
        Table,
        Id,
        TimesheetId,
        TaskId,
        ProjectId,
        ActivityType,
        Hours,
        BillingRate,
        FromTime,
        ToTime,
    }

    #[derive(DeriveIden)]
    enum PurchaseInvoices {
        Table,
        Id,
        Name,
        Supplier,
        RepairOrderId,
        GrandTotal,
        Docstatus,
        CreatedAt,
    }

    #[derive(DeriveIden)]
    enum Quotations {
        Table,
        Id,
        Name,
        QuotationTo,
        PartyName,
        OrderType,
        RepairOrderId,
        GrandTotal,
        Docstatus,
        CreatedAt,
    }

    #[derive(DeriveIden)]
    enum QuotationItems {
        Table,
        Id,
        QuotationId,
        Idx,
        ItemCode,
        ItemName,
        Description,
        Qty,
        Uom,
        Rate,
        Amount,
        RepairOrderId,
        Vehicle,
    }

    #[derive(DeriveIden)]
    enum SalesOrders {
        Table,
        Id,
        Name,
        Customer,
        OrderType,
        QuotationId,
        RepairOrderId,
        ProjectId,
        GrandTotal,
        Docstatus,
        CreatedAt,
    }

    #[derive(DeriveIden)]
    enum SalesOrderItems {
        Table,
        Id,
        SalesOrderId,
        Idx,
        ItemCode,
        ItemName,
        Qty,
        Uom,
        Rate,
        Amount,
        RepairOrderId,
        Vehicle,
    }

    #[derive(DeriveIden)]
    enum SalesInvoices {
        Table,
        Id,
        Name,
        Customer,
        RepairOrderId,
        SalesOrderId,
        ProjectId,
        GrandTotal,
        PaidAmount,
        Status,
        Docstatus,
        CreatedAt,
    }

    #[derive(DeriveIden)]
    enum SalesInvoiceItems {
        Table,
        Id,
        SalesInvoiceId,
        Idx,
        ItemCode,
        ItemName,
        Qty,
        Uom,
        Rate,
        NetAmount,
        RepairOrderId,
        Vehicle,
    }
}

mod m20240101_000004_create_stock_tables {
    use sea_orm_migration::prelude::*;

    pub struct Migration;

    impl MigrationName for Migration {
        fn name(&self) -> &str {
            "m20240101_000004_create_stock_tables"
        }
    }

    #[async_trait::async_trait]
    impl MigrationTrait for Migration {
        async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
            manager
                .create_table(
                    Table::create()
                        .table(MaterialRequests::Table)
                        .if_not_exists()
                        .col(
                            ColumnDef::new(MaterialRequests::Id)
                                .uuid()
                                .not_null()
                                .primary_key(),
                        )
                        .col(
                            ColumnDef::new(MaterialRequests::Name)
                                .string()
                                .not_null()
                                .unique_key(),
                        )
                        .col(
                            ColumnDef::new(MaterialRequests::MaterialRequestType)
                                .string()
                                .not_null(),
                        )
                        .col(ColumnDef::new(MaterialRequests::Company).string().not_null())
                        .col(ColumnDef::new(MaterialRequests::RepairOrderId).uuid().null())
                        .col(
                            ColumnDef::new(MaterialRequests::Docstatus)
                                .string_len(16)
                                .not_null(),
                        )
                        .col(
                            ColumnDef::new(MaterialRequests::CreatedAt)
                                .timestamp_with_time_zone()
                                .not_null(),
                        )
                        .to_owned(),
                )
                .await?;

            manager
                .create_table(
                    Table::create()
                        .table(MaterialRequestItems::Table)
                        .if_not_exists()
                        .col(
                            ColumnDef::new(MaterialRequestItems::Id)
                                .uuid()
                                .not_null()
                                .primary_key(),
                        )
                        .col(
                            ColumnDef::new(MaterialRequestItems::MaterialRequestId)
                                .uuid()
                                .not_null(),
                        )
                        .col(ColumnDef::new(MaterialRequestItems::Idx).integer().not_null())
                        .col(ColumnDef::new(MaterialRequestItems::ItemCode).string().not_null())
                        .col(ColumnDef::new(MaterialRequestItems::Qty).decimal().not_null())
                        .col(ColumnDef::new(MaterialRequestItems::Uom).string().not_null())
                        .col(
                            ColumnDef::new(MaterialRequestItems::ScheduleDate)
                                .timestamp_with_time_zone()
                                .not_null(),
                        )
                        .col(ColumnDef::new(MaterialRequestItems::Warehouse).string().not_null())
                        .foreign_key(
                            ForeignKey::create()
                                .name("fk_material_request_items_material_request")
                                .from(
                                    MaterialRequestItems::Table,
                                    MaterialRequestItems::MaterialRequestId,
                                )
                                .to(MaterialRequests::Table, MaterialRequests::Id)
                                .on_delete(ForeignKeyAction::Cascade),
                        )
                        .to_owned(),
                )
                .await?;

            manager
                .create_table(
                    Table::create()
                        .table(StockEntries::Table)
                        .if_not_exists()
                        .col(ColumnDef::new(StockEntries::Id).uuid().not_null().primary_key())
                        .col(
                            ColumnDef::new(StockEntries::Name)
                                .string()
                                .not_null()
                                .unique_key(),
                        )
                        .col(ColumnDef::new(StockEntries::Purpose).string().not_null())
                        .col(ColumnDef::new(StockEntries::RepairOrderId).uuid().null())
                        .col(
                            ColumnDef::new(StockEntries::PostingDate)
                                .timestamp_with_time_zone()
                                .not_null(),
                        )
                        .col(ColumnDef::new(StockEntries::Docstatus).string_len(16).not_null())
                        .to_owned(),
                )
                .await?;

            manager
                .create_table(
                    Table::create()
                        .table(StockEntryDetails::Table)
                        .if_not_exists()
                        .col(
                            ColumnDef::new(StockEntryDetails::Id)
                                .uuid()
                                .not_null()
                                .primary_key(),
                        )
                        .col(
                            ColumnDef::new(StockEntryDetails::StockEntryId)
                                .uuid()
                                .not_null(),
                        )
                        .col(ColumnDef::new(StockEntryDetails::Idx).integer().not_null())
                        .col(ColumnDef::new(StockEntryDetails::ItemCode).string().not_null())
                        .col(ColumnDef::new(StockEntryDetails::Qty).decimal().not_null())
                        .col(
                            ColumnDef::new(StockEntryDetails::ValuationRate)
                                .decimal()
                                .not_null()
                                .default(0),
                        )
                        .foreign_key(
                            ForeignKey::create()
                                .name("fk_stock_entry_details_stock_entry")
                                .from(StockEntryDetails::Table, StockEntryDetails::StockEntryId)
                                .to(StockEntries::Table, StockEntries::Id)
                                .on_delete(ForeignKeyAction::Cascade),
                        )
                        .to_owned(),
                )
                .await
        }

        async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
            manager
                .drop_table(Table::drop().table(StockEntryDetails::Table).to_owned())
                .await?;
            manager
                .drop_table(Table::drop().table(StockEntries::Table).to_owned())
                .await?;
            manager
                .drop_table(Table::drop().table(MaterialRequestItems::Table).to_owned())
                .await?;
            manager
                .drop_table(Table::drop().table(MaterialRequests::Table).to_owned())
                .await
        }
    }

    #[derive(DeriveIden)]
    enum MaterialRequests {
        Table,
        Id,
        Name,
        MaterialRequestType,
        Company,
        RepairOrderId,
        Docstatus,
        CreatedAt,
    }

    #[derive(DeriveIden)]
    enum MaterialRequestItems {
        Table,
        Id,
        MaterialRequestId,
        Idx,
        ItemCode,
        Qty,
        Uom,
        ScheduleDate,
        Warehouse,
    }

    #[derive(DeriveIden)]
    enum StockEntries {
        Table,
        Id,
        Name,
        Purpose,
        RepairOrderId,
        PostingDate,
        Docstatus,
    }

    #[derive(DeriveIden)]
    enum StockEntryDetails {
        Table,
        Id,
        StockEntryId,
        Idx,
        ItemCode,
        Qty,
        ValuationRate,
    }
}
