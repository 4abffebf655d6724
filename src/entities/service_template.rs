use rust_decimal::Decimal;
use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

/// Reusable package of operations, parts and checklist rows. The child rows
/// are stored as JSON arrays of the `Template*` structs below.
#[derive(Clone, Debug, PartialEq, DeriveEntityModel, Serialize, Deserialize, ToSchema)]
#[schema(as = ServiceTemplate)]
#[sea_orm(table_name = "service_templates")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub id: Uuid,
    #[sea_orm(unique)]
    pub template_name: String,
    pub description: Option<String>,
    #[schema(value_type = Object)]
    pub default_operations: Json,
    #[schema(value_type = Object)]
    pub default_parts: Json,
    #[schema(value_type = Object)]
    pub default_checklist: Json,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize, ToSchema)]
pub struct TemplateOperation {
    pub operation_name: Option<String>,
    #[serde(default)]
    pub planned_minutes: i32,
    pub workstation: Option<String>,
    #[serde(default)]
    pub is_qc: bool,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize, ToSchema)]
pub struct TemplatePart {
    pub item_code: String,
    pub uom: Option<String>,
    pub qty_planned: Decimal,
    #[serde(default)]
    pub is_billable: bool,
    #[serde(default)]
    pub is_foc: bool,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize, ToSchema)]
pub struct TemplateCheck {
    pub check_item: String,
    pub check_type: Option<String>,
}

impl Model {
    pub fn operations(&self) -> Result<Vec<TemplateOperation>, serde_json::Error> {
        serde_json::from_value(self.default_operations.clone())
    }

    pub fn parts(&self) -> Result<Vec<TemplatePart>, serde_json::Error> {
        serde_json::from_value(self.default_parts.clone())
    }

    pub fn checklist(&self) -> Result<Vec<TemplateCheck>, serde_json::Error> {
        serde_json::from_value(self.default_checklist.clone())
    }
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {}

impl ActiveModelBehavior for ActiveModel {}
