use async_trait::async_trait;
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use sea_orm::{entity::prelude::*, ActiveValue::Set};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

use super::doc_status::DocStatus;

/// Payment state of a customer invoice.
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
pub enum SalesInvoiceStatus {
    #[sea_orm(string_value = "Draft")]
    Draft,
    #[sea_orm(string_value = "Submitted")]
    Submitted,
    #[sea_orm(string_value = "Partly Paid")]
    #[serde(rename = "Partly Paid")]
    #[strum(serialize = "Partly Paid")]
    PartlyPaid,
    #[sea_orm(string_value = "Paid")]
    Paid,
    #[sea_orm(string_value = "Cancelled")]
    Cancelled,
}

impl SalesInvoiceStatus {
    /// Statuses under which a linked repair order may be closed.
    pub fn allows_closing(self) -> bool {
        matches!(self, SalesInvoiceStatus::Paid | SalesInvoiceStatus::Submitted)
    }

    /// Status after `paid_amount` of `grand_total` has been received.
    pub fn from_payment(paid_amount: Decimal, grand_total: Decimal) -> Self {
        if paid_amount >= grand_total {
            SalesInvoiceStatus::Paid
        } else if paid_amount > Decimal::ZERO {
            SalesInvoiceStatus::PartlyPaid
        } else {
            SalesInvoiceStatus::Submitted
        }
    }
}

#[derive(Clone, Debug, PartialEq, DeriveEntityModel, Serialize, Deserialize, ToSchema)]
#[schema(as = SalesInvoice)]
#[sea_orm(table_name = "sales_invoices")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub id: Uuid,
    #[sea_orm(unique)]
    pub name: String,
    pub customer: String,
    pub repair_order_id: Option<Uuid>,
    pub sales_order_id: Option<Uuid>,
    pub project_id: Option<Uuid>,
    pub grand_total: Decimal,
    pub paid_amount: Decimal,
    pub status: SalesInvoiceStatus,
    pub docstatus: DocStatus,
    pub created_at: DateTime<Utc>,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(has_many = "super::sales_invoice_item::Entity")]
    Items,
}

impl Related<super::sales_invoice_item::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Items.def()
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

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    #[test]
    fn payment_moves_status() {
        assert_eq!(
            SalesInvoiceStatus::from_payment(dec!(0), dec!(250)),
            SalesInvoiceStatus::Submitted
        );
        assert_eq!(
            SalesInvoiceStatus::from_payment(dec!(100), dec!(250)),
            SalesInvoiceStatus::PartlyPaid
        );
        assert_eq!(
            SalesInvoiceStatus::from_payment(dec!(250), dec!(250)),
            SalesInvoiceStatus::Paid
        );
    }

    #[test]
    fn only_paid_or_submitted_allow_closing() {
        assert!(SalesInvoiceStatus::Paid.allows_closing());
        assert!(SalesInvoiceStatus::Submitted.allows_closing());
        assert!(!SalesInvoiceStatus::PartlyPaid.allows_closing());
        assert!(!SalesInvoiceStatus::Draft.allows_closing());
    }
}
