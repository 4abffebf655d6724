use async_trait::async_trait;
use chrono::{DateTime, NaiveDate, Utc};
use sea_orm::{entity::prelude::*, ActiveValue::Set};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

#[derive(
    Clone,
    Copy,
    Debug,
    PartialEq,
    Eq,
    EnumIter,
    DeriveActiveEnum,
    Serialize,
    Deserialize,
    ToSchema,
    strum::Display,
)]
#[sea_orm(rs_type = "String", db_type = "String(StringLen::N(32))")]
pub enum TaskStatus {
    #[sea_orm(string_value = "Open")]
    Open,
    #[sea_orm(string_value = "Working")]
    Working,
    #[sea_orm(string_value = "Pending Review")]
    #[serde(rename = "Pending Review")]
    #[strum(serialize = "Pending Review")]
    PendingReview,
    #[sea_orm(string_value = "Overdue")]
    Overdue,
    #[sea_orm(string_value = "Completed")]
    Completed,
    #[sea_orm(string_value = "Closed")]
    Closed,
    #[sea_orm(string_value = "Cancelled")]
    Cancelled,
}

impl TaskStatus {
    /// Work on the task has been picked up (or is about to be).
    pub fn signals_start(self) -> bool {
        matches!(self, TaskStatus::Open | TaskStatus::Working)
    }

    /// The task reports its work as done.
    pub fn signals_done(self) -> bool {
        matches!(self, TaskStatus::Completed | TaskStatus::Closed)
    }

    /// No further work expected, including cancelled tasks.
    pub fn is_finished(self) -> bool {
        matches!(
            self,
            TaskStatus::Completed | TaskStatus::Closed | TaskStatus::Cancelled
        )
    }
}

#[derive(Clone, Debug, PartialEq, DeriveEntityModel, Serialize, Deserialize, ToSchema)]
#[schema(as = Task)]
#[sea_orm(table_name = "tasks")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub id: Uuid,
    #[sea_orm(unique)]
    pub name: String,
    pub subject: String,
    pub project_id: Option<Uuid>,
    pub repair_order_id: Option<Uuid>,
    pub status: TaskStatus,
    pub exp_start_date: Option<NaiveDate>,
    pub exp_end_date: Option<NaiveDate>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(
        belongs_to = "super::project::Entity",
        from = "Column::ProjectId",
        to = "super::project::Column::Id"
    )]
    Project,
}

impl Related<super::project::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Project.def()
    }
}

#[async_trait]
impl ActiveModelBehavior for ActiveModel {
    async fn before_save<C>(self, _db: &C, insert: bool) -> Result<Self, DbErr>
    where
        C: ConnectionTrait,
    {
        let mut active_model = self;
        let now = Utc::now();
        if insert && active_model.created_at.is_not_set() {
            active_model.created_at = Set(now);
        }
        active_model.updated_at = Set(now);
        Ok(active_model)
    }
}
