use async_trait::async_trait;
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use sea_orm::{entity::prelude::*, ActiveValue::Set};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

/// Denormalized cost snapshot, one row per submitted repair order.
#[derive(Clone, Debug, PartialEq, DeriveEntityModel, Serialize, Deserialize, ToSchema)]
#[schema(as = JobCosting)]
#[sea_orm(table_name = "job_costings")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub id: Uuid,
    #[sea_orm(unique)]
    pub repair_order_id: Uuid,
    pub project_id: Option<Uuid>,
    pub vehicle: String,
    pub parts_cost: Decimal,
    pub labor_cost: Decimal,
    pub other_charges: Decimal,
    pub total_job_cost: Decimal,
    pub margin_snapshot: Decimal,
    pub updated_at: DateTime<Utc>,
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

#[async_trait]
impl ActiveModelBehavior for ActiveModel {
    async fn before_save<C>(self, _db: &C, _insert: bool) -> Result<Self, DbErr>
    where
        C: ConnectionTrait,
    {
        let mut active_model = self;
        active_model.updated_at = Set(Utc::now());
        Ok(active_model)
    }
}
