use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

/// Lifecycle of a submittable document. Only `Submitted` documents feed cost
/// aggregation and reports.
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
#[sea_orm(rs_type = "String", db_type = "String(StringLen::N(16))")]
pub enum DocStatus {
    #[sea_orm(string_value = "Draft")]
    Draft,
    #[sea_orm(string_value = "Submitted")]
    Submitted,
    #[sea_orm(string_value = "Cancelled")]
    Cancelled,
}

impl DocStatus {
    pub fn is_submitted(self) -> bool {
        self == DocStatus::Submitted
    }
}
