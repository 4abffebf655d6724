use rust_decimal::Decimal;
use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

/// Parts plan row. A row is either billable, free of charge, or neither; never both.
#[derive(Clone, Debug, PartialEq, DeriveEntityModel, Serialize, Deserialize, ToSchema)]
#[schema(as = RepairPart)]
#[sea_orm(table_name = "repair_parts")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub id: Uuid,
    pub repair_order_id: Uuid,
    pub idx: i32,
    pub item_code: String,
    pub item_name: Option<String>,
    pub uom: Option<String>,
    pub qty_planned: Decimal,
    pub is_billable: bool,
    pub is_foc: bool,
    pub notes: Option<String>,
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
    #[sea_orm(
        belongs_to = "super::item::Entity",
        from = "Column::ItemCode",
        to = "super::item::Column::ItemCode"
    )]
    Item,
}

impl Related<super::repair_order::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::RepairOrder.def()
    }
}

impl Related<super::item::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Item.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}
