use async_trait::async_trait;
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use sea_orm::{entity::prelude::*, ActiveValue::Set};
use serde::{Deserialize, Serialize};
use std::str::FromStr;
use utoipa::ToSchema;

use super::doc_status::DocStatus;

/// Where a repair job stands on the workshop floor.
#[derive(
    Clone,
    Copy,
    Debug,
    PartialEq,
    Eq,
    Hash,
    EnumIter,
    DeriveActiveEnum,
    Serialize,
    Deserialize,
    ToSchema,
    strum::Display,
)]
#[sea_orm(rs_type = "String", db_type = "String(StringLen::N(32))")]
pub enum RepairOrderStatus {
    #[sea_orm(string_value = "Scheduled")]
    Scheduled,
    #[sea_orm(string_value = "In Progress")]
    #[serde(rename = "In Progress")]
    #[strum(serialize = "In Progress")]
    InProgress,
    #[sea_orm(string_value = "Awaiting Parts")]
    #[serde(rename = "Awaiting Parts")]
    #[strum(serialize = "Awaiting Parts")]
    AwaitingParts,
    #[sea_orm(string_value = "Ready for Handover")]
    #[serde(rename = "Ready for Handover")]
    #[strum(serialize = "Ready for Handover")]
    ReadyForHandover,
    #[sea_orm(string_value = "Delivered")]
    Delivered,
    #[sea_orm(string_value = "Closed")]
    Closed,
    #[sea_orm(string_value = "On Hold")]
    #[serde(rename = "On Hold")]
    #[strum(serialize = "On Hold")]
    OnHold,
    #[sea_orm(string_value = "Cancelled")]
    Cancelled,
    #[sea_orm(string_value = "Invoiced")]
    Invoiced,
    #[sea_orm(string_value = "Completed")]
    Completed,
}

impl RepairOrderStatus {
    /// Targets accepted by the manual status setter.
    pub const MANUAL_TARGETS: [RepairOrderStatus; 3] = [
        RepairOrderStatus::Scheduled,
        RepairOrderStatus::OnHold,
        RepairOrderStatus::Cancelled,
    ];

    /// Targets accepted when a submitted order is edited.
    pub const PROGRESS_TARGETS: [RepairOrderStatus; 5] = [
        RepairOrderStatus::InProgress,
        RepairOrderStatus::AwaitingParts,
        RepairOrderStatus::ReadyForHandover,
        RepairOrderStatus::Delivered,
        RepairOrderStatus::Closed,
    ];

    pub fn is_manual_target(self) -> bool {
        Self::MANUAL_TARGETS.contains(&self)
    }

    pub fn is_progress_target(self) -> bool {
        Self::PROGRESS_TARGETS.contains(&self)
    }

    /// Statuses that freeze task-driven transitions.
    pub fn blocks_task_automation(self) -> bool {
        matches!(
            self,
            RepairOrderStatus::OnHold
                | RepairOrderStatus::Delivered
                | RepairOrderStatus::Closed
                | RepairOrderStatus::Cancelled
        )
    }

    /// Statuses that freeze invoice-driven transitions.
    pub fn blocks_invoice_automation(self) -> bool {
        matches!(
            self,
            RepairOrderStatus::Delivered | RepairOrderStatus::Closed | RepairOrderStatus::Cancelled
        )
    }

    pub fn is_terminal(self) -> bool {
        matches!(self, RepairOrderStatus::Closed | RepairOrderStatus::Cancelled)
    }

    /// Still occupying a bay: anything not closed or cancelled.
    pub fn is_open(self) -> bool {
        !self.is_terminal()
    }
}

impl FromStr for RepairOrderStatus {
    type Err = String;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        use sea_orm::Iterable;
        RepairOrderStatus::iter()
            .find(|status| status.to_string() == value)
            .ok_or_else(|| format!("Unknown repair order status: {}", value))
    }
}

#[derive(
    Clone,
    Copy,
    Debug,
    PartialEq,
    Eq,
    EnumIter,
    DeriveActiveEnum,
    Serialize,
    Deserialize,
    ToSchema,
    strum::Display,
    Default,
)]
#[sea_orm(rs_type = "String", db_type = "String(StringLen::N(16))")]
pub enum Priority {
    #[sea_orm(string_value = "Low")]
    Low,
    #[default]
    #[sea_orm(string_value = "Medium")]
    Medium,
    #[sea_orm(string_value = "High")]
    High,
    #[sea_orm(string_value = "Urgent")]
    Urgent,
}

#[derive(Clone, Debug, PartialEq, DeriveEntityModel, Serialize, Deserialize, ToSchema)]
#[schema(as = RepairOrder)]
#[sea_orm(table_name = "repair_orders")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub id: Uuid,
    #[sea_orm(unique)]
    pub name: String,
    pub customer: String,
    pub vehicle: String,
    pub advisor: Option<String>,
    pub priority: Priority,
    pub status: RepairOrderStatus,
    pub docstatus: DocStatus,
    pub service_template_id: Option<Uuid>,
    pub template_applied: bool,
    pub project_id: Option<Uuid>,
    pub quotation_id: Option<Uuid>,
    pub sales_order_id: Option<Uuid>,
    pub sales_invoice_id: Option<Uuid>,
    pub sla_response_by: Option<DateTime<Utc>>,
    pub sla_delivery_by: Option<DateTime<Utc>>,
    pub parts_cost: Decimal,
    pub labor_cost: Decimal,
    pub other_charges: Decimal,
    /// Set when `other_charges` was entered by hand and must survive recomputes.
    pub other_charges_manual: bool,
    pub total_job_cost: Decimal,
    pub quoted_amount: Decimal,
    pub invoiced_amount: Decimal,
    pub gross_margin: Decimal,
    pub notes: Option<String>,
    /// Bumped on every save; a write against a stale version is refused.
    pub version: i32,
    pub status_changed_at: DateTime<Utc>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(has_many = "super::repair_operation::Entity")]
    Operations,
    #[sea_orm(has_many = "super::repair_part::Entity")]
    Parts,
    #[sea_orm(has_many = "super::handover_check::Entity")]
    HandoverChecks,
    #[sea_orm(has_many = "super::customer_update::Entity")]
    CustomerUpdates,
    #[sea_orm(has_one = "super::job_costing::Entity")]
    JobCosting,
}

impl Related<super::repair_operation::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Operations.def()
    }
}

impl Related<super::repair_part::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Parts.def()
    }
}

impl Related<super::handover_check::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::HandoverChecks.def()
    }
}

impl Related<super::customer_update::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::CustomerUpdates.def()
    }
}

impl Related<super::job_costing::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::JobCosting.def()
    }
}

#[async_trait]
impl ActiveModelBehavior for ActiveModel {
    async fn before_save<C>(self, _db: &C, insert: bool) -> Result<Self, DbErr>
    where
        C: ConnectionTrait,
    {
        let mut active_model = self;
        let now = Utc::now();

        if insert && active_model.created_at.is_not_set() {
            active_model.created_at = Set(now);
        }
        if insert && active_model.version.is_not_set() {
            active_model.version = Set(1);
        }
        if insert && active_model.status_changed_at.is_not_set() {
            active_model.status_changed_at = Set(now);
        }
        active_model.updated_at = Set(now);

        Ok(active_model)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    #[rstest]
    #[case("Scheduled", RepairOrderStatus::Scheduled)]
    #[case("In Progress", RepairOrderStatus::InProgress)]
    #[case("Ready for Handover", RepairOrderStatus::ReadyForHandover)]
    #[case("On Hold", RepairOrderStatus::OnHold)]
    fn parses_display_names(#[case] raw: &str, #[case] expected: RepairOrderStatus) {
        assert_eq!(raw.parse::<RepairOrderStatus>().unwrap(), expected);
    }

    #[rstest]
    #[case("Teleported")]
    #[case("on hold")]
    #[case(" On Hold ")]
    fn only_exact_labels_parse(#[case] raw: &str) {
        assert!(raw.parse::<RepairOrderStatus>().is_err());
    }

    #[test]
    fn display_matches_stored_value() {
        assert_eq!(RepairOrderStatus::AwaitingParts.to_string(), "Awaiting Parts");
        assert_eq!(
            serde_json::to_value(RepairOrderStatus::ReadyForHandover).unwrap(),
            serde_json::json!("Ready for Handover")
        );
    }

    #[test]
    fn automation_freezes() {
        assert!(RepairOrderStatus::OnHold.blocks_task_automation());
        assert!(!RepairOrderStatus::OnHold.blocks_invoice_automation());
        assert!(RepairOrderStatus::Delivered.blocks_invoice_automation());
        assert!(!RepairOrderStatus::InProgress.blocks_task_automation());
    }

    #[test]
    fn manual_targets_are_exactly_three() {
        use sea_orm::Iterable;
        let manual: Vec<_> = RepairOrderStatus::iter()
            .filter(|s| s.is_manual_target())
            .collect();
        assert_eq!(
            manual,
            vec![
                RepairOrderStatus::Scheduled,
                RepairOrderStatus::OnHold,
                RepairOrderStatus::Cancelled
            ]
        );
    }
}
