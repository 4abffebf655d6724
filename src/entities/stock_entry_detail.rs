use rust_decimal::Decimal;
use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

#[derive(Clone, Debug, PartialEq, DeriveEntityModel, Serialize, Deserialize, ToSchema)]
#[schema(as = StockEntryDetail)]
#[sea_orm(table_name = "stock_entry_details")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub id: Uuid,
    pub stock_entry_id: Uuid,
    pub idx: i32,
    pub item_code: String,
    pub qty: Decimal,
    pub valuation_rate: Decimal,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(
        belongs_to = "super::stock_entry::Entity",
        from = "Column::StockEntryId",
        to = "super::stock_entry::Column::Id",
        on_delete = "Cascade"
    )]
    StockEntry,
}

impl Related<super::stock_entry::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::StockEntry.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}
