use rust_decimal::Decimal;
use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

#[derive(Clone, Debug, PartialEq, DeriveEntityModel, Serialize, Deserialize, ToSchema)]
#[schema(as = SalesInvoiceItem)]
#[sea_orm(table_name = "sales_invoice_items")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub id: Uuid,
    pub sales_invoice_id: Uuid,
    pub idx: i32,
    pub item_code: Option<String>,
    pub item_name: String,
    pub qty: Decimal,
    pub uom: String,
    pub rate: Decimal,
    pub net_amount: Decimal,
    pub repair_order_id: Option<Uuid>,
    pub vehicle: Option<String>,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(
        belongs_to = "super::sales_invoice::Entity",
        from = "Column::SalesInvoiceId",
        to = "super::sales_invoice::Column::Id",
        on_delete = "Cascade"
    )]
    SalesInvoice,
}

impl Related<super::sales_invoice::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::SalesInvoice.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}
