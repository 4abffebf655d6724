use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

/// A time log row. Labour cost of the row is `hours * billing_rate`.
#[derive(Clone, Debug, PartialEq, DeriveEntityModel, Serialize, Deserialize, ToSchema)]
#[schema(as = TimesheetDetail)]
#[sea_orm(table_name = "timesheet_details")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub id: Uuid,
    pub timesheet_id: Uuid,
    pub task_id: Option<Uuid>,
    pub project_id: Option<Uuid>,
    pub activity_type: Option<String>,
    pub hours: Decimal,
    pub billing_rate: Decimal,
    pub from_time: Option<DateTime<Utc>>,
    pub to_time: Option<DateTime<Utc>>,
}

impl Model {
    pub fn cost(&self) -> Decimal {
        self.hours * self.billing_rate
    }
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(
        belongs_to = "super::timesheet::Entity",
        from = "Column::TimesheetId",
        to = "super::timesheet::Column::Id",
        on_delete = "Cascade"
    )]
    Timesheet,
}

impl Related<super::timesheet::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Timesheet.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}
