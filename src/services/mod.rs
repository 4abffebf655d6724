// Repair order lifecycle
pub mod auto_status;
pub mod repair_orders;

// Costing and snapshots
pub mod costing;
pub mod scheduler;

// Linked documents
pub mod documents;
pub mod linked_documents;
pub mod mapping;

// Master data
pub mod masters;

// Reporting
pub mod reports;
