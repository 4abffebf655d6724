use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sea_orm::{entity::prelude::*, ActiveValue::Set};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

/// Progress note for the customer; only rows with `visible_on_portal` reach the status page.
#[derive(Clone, Debug, PartialEq, DeriveEntityModel, Serialize, Deserialize, ToSchema)]
#[schema(as = CustomerUpdate)]
#[sea_orm(table_name = "customer_updates")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub id: Uuid,
    pub repair_order_id: Uuid,
    pub message: String,
    pub visible_on_portal: bool,
    pub created_at: DateTime<Utc>,
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
    async fn before_save<C>(self, _db: &C, insert: bool) -> Result<Self, DbErr>
    where
        C: ConnectionTrait,
    {
        let mut active_model = self;
        if insert && active_model.created_at.is_not_set() {
            active_model.created_at = Set(Utc::now());
        }
        Ok(active_model)
    }
}
