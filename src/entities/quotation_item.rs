use rust_decimal::Decimal;
use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

#[derive(Clone, Debug, PartialEq, DeriveEntityModel, Serialize, Deserialize, ToSchema)]
#[schema(as = QuotationItem)]
#[sea_orm(table_name = "quotation_items")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub id: Uuid,
    pub quotation_id: Uuid,
    pub idx: i32,
    pub item_code: Option<String>,
    pub item_name: String,
    pub description: Option<String>,
    pub qty: Decimal,
    pub uom: String,
    pub rate: Decimal,
    pub amount: Decimal,
    pub repair_order_id: Option<Uuid>,
    pub vehicle: Option<String>,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(
        belongs_to = "super::quotation::Entity",
        from = "Column::QuotationId",
        to = "super::quotation::Column::Id",
        on_delete = "Cascade"
    )]
    Quotation,
}

impl Related<super::quotation::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Quotation.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}
