use chrono::{DateTime, Utc};
use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

use super::doc_status::DocStatus;
use utoipa::ToSchema;

pub const PURPOSE_MATERIAL_ISSUE: &str = "Material Issue";

/// Stock movement; `Material Issue` entries against a repair order record parts consumed on the job.
#[derive(Clone, Debug, PartialEq, DeriveEntityModel, Serialize, Deserialize, ToSchema)]
#[schema(as = StockEntry)]
#[sea_orm(table_name = "stock_entries")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub id: Uuid,
    #[sea_orm(unique)]
    pub name: String,
    pub purpose: String,
    pub repair_order_id: Option<Uuid>,
    pub posting_date: DateTime<Utc>,
    pub docstatus: DocStatus,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(has_many = "super::stock_entry_detail::Entity")]
    Details,
}

impl Related<super::stock_entry_detail::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Details.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}
