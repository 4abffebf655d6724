use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

#[derive(Clone, Debug, PartialEq, DeriveEntityModel, Serialize, Deserialize, ToSchema)]
#[schema(as = MaterialRequestItem)]
#[sea_orm(table_name = "material_request_items")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub id: Uuid,
    pub material_request_id: Uuid,
    pub idx: i32,
    pub item_code: String,
    pub qty: Decimal,
    pub uom: String,
    pub schedule_date: DateTime<Utc>,
    pub warehouse: String,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(
        belongs_to = "super::material_request::Entity",
        from = "Column::MaterialRequestId",
        to = "super::material_request::Column::Id",
        on_delete = "Cascade"
    )]
    MaterialRequest,
}

impl Related<super::material_request::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::MaterialRequest.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}
