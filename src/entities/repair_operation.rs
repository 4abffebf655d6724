use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

/// One planned labour operation on a repair order. Submitting the order
/// creates a task per operation and stores its id in `task_id`.
#[derive(Clone, Debug, PartialEq, DeriveEntityModel, Serialize, Deserialize, ToSchema)]
#[schema(as = RepairOperation)]
#[sea_orm(table_name = "repair_operations")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub id: Uuid,
    pub repair_order_id: Uuid,
    pub idx: i32,
    pub operation_name: Option<String>,
    pub planned_minutes: i32,
    pub workstation: Option<String>,
    pub is_qc: bool,
    pub task_id: Option<Uuid>,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(
        belongs_to = "super::repair_order::Entity",
        from = "Column::RepairOrderId",
        to = "super::repair_order::Column::Id",
        on_delete = "Cascade"
    )]
    RepairOrder,
}

impl Related<super::repair_order::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::RepairOrder.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}

impl Model {
    /// Task subject for this operation.
    pub fn task_subject(&self) -> String {
        match self.operation_name.as_deref().map(str::trim) {
            Some(name) if !name.is_empty() => name.to_string(),
            _ => format!("Operation {}", self.idx),
        }
    }
}
