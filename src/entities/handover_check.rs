use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

#[derive(Clone, Debug, PartialEq, DeriveEntityModel, Serialize, Deserialize, ToSchema)]
#[schema(as = HandoverCheck)]
#[sea_orm(table_name = "handover_checks")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub id: Uuid,
    pub repair_order_id: Uuid,
    pub idx: i32,
    pub check_item: String,
    pub check_type: Option<String>,
    pub is_checked: bool,
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
