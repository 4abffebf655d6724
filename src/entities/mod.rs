//! sea-orm entities. Repair orders and their child rows are owned here; the
//! commercial and stock documents they aggregate over live alongside them.

pub mod customer_update;
pub mod doc_status;
pub mod handover_check;
pub mod item;
pub mod job_costing;
pub mod material_request;
pub mod material_request_item;
pub mod project;
pub mod purchase_invoice;
pub mod quotation;
pub mod quotation_item;
pub mod repair_operation;
pub mod repair_order;
pub mod repair_part;
pub mod sales_invoice;
pub mod sales_invoice_item;
pub mod sales_order;
pub mod sales_order_item;
pub mod service_template;
pub mod stock_entry;
pub mod stock_entry_detail;
pub mod task;
pub mod timesheet;
pub mod timesheet_detail;

pub use doc_status::DocStatus;
pub use repair_order::{Priority, RepairOrderStatus};
pub use sales_invoice::SalesInvoiceStatus;
pub use task::TaskStatus;
