use rust_decimal::Decimal;
use sea_orm::{
    ActiveModelTrait, ActiveValue::Set, ColumnTrait, DatabaseConnection, EntityTrait,
    PaginatorTrait, QueryFilter, QueryOrder,
};
use serde::{Deserialize, Serialize};
use std::{collections::HashSet, sync::Arc};
use tracing::{info, instrument};
use utoipa::ToSchema;
use uuid::Uuid;
use validator::Validate;

use crate::{
    entities::{
        item,
        service_template::{self, TemplateCheck, TemplateOperation, TemplatePart},
    },
    errors::ServiceError,
};

#[derive(Debug, Clone, Serialize, Deserialize, Validate, ToSchema)]
pub struct ItemRequest {
    #[validate(length(min = 1, max = 140, message = "Item code is required"))]
    pub item_code: String,
    #[validate(length(min = 1, message = "Item name is required"))]
    pub item_name: String,
    #[validate(length(min = 1, message = "Stock UOM is required"))]
    pub stock_uom: String,
    #[serde(default)]
    pub valuation_rate: Decimal,
    #[serde(default)]
    pub standard_rate: Decimal,
    #[serde(default = "default_true")]
    pub is_stock_item: bool,
}

fn default_true() -> bool {
    true
}

#[derive(Debug, Clone, Serialize, Deserialize, Validate, ToSchema)]
pub struct ServiceTemplateRequest {
    #[validate(length(min = 1, message = "Template name is required"))]
    pub template_name: String,
    pub description: Option<String>,
    #[serde(default)]
    pub operations: Vec<TemplateOperation>,
    #[serde(default)]
    pub parts: Vec<TemplatePart>,
    #[serde(default)]
    pub checklist: Vec<TemplateCheck>,
}

/// Item master and service templates.
#[derive(Clone)]
pub struct MasterDataService {
    db: Arc<DatabaseConnection>,
}

impl MasterDataService {
    pub fn new(db: Arc<DatabaseConnection>) -> Self {
        Self { db }
    }

    #[instrument(skip(self, request), fields(item_code = %request.item_code))]
    pub async fn create_item(&self, request: ItemRequest) -> Result<item::Model, ServiceError> {
        request.validate()?;
        if request.valuation_rate.is_sign_negative() || request.standard_rate.is_sign_negative() {
            return Err(ServiceError::ValidationError(
                "Item rates cannot be negative".to_string(),
            ));
        }

        let db = &*self.db;
        let exists = item::Entity::find_by_id(request.item_code.clone())
            .count(db)
            .await?
            > 0;
        if exists {
            return Err(ServiceError::Conflict(format!(
                "Item {} already exists",
                request.item_code
            )));
        }

        let created = item::ActiveModel {
            item_code: Set(request.item_code),
            item_name: Set(request.item_name),
            stock_uom: Set(request.stock_uom),
            valuation_rate: Set(request.valuation_rate),
            standard_rate: Set(request.standard_rate),
            is_stock_item: Set(request.is_stock_item),
        }
        .insert(db)
        .await?;

        info!(item_code = %created.item_code, "item created");
        Ok(created)
    }

    #[instrument(skip(self))]
    pub async fn get_item(&self, item_code: &str) -> Result<item::Model, ServiceError> {
        item::Entity::find_by_id(item_code.to_string())
            .one(&*self.db)
            .await?
            .ok_or_else(|| ServiceError::NotFound(format!("Item {} not found", item_code)))
    }

    #[instrument(skip(self))]
    pub async fn list_items(&self) -> Result<Vec<item::Model>, ServiceError> {
        Ok(item::Entity::find()
            .order_by_asc(item::Column::ItemCode)
            .all(&*self.db)
            .await?)
    }

    /// Stores a template after checking its parts reference known items.
    #[instrument(skip(self, request), fields(template = %request.template_name))]
    pub async fn create_service_template(
        &self,
        request: ServiceTemplateRequest,
    ) -> Result<service_template::Model, ServiceError> {
        request.validate()?;
        let db = &*self.db;

        let taken = service_template::Entity::find()
            .filter(service_template::Column::TemplateName.eq(request.template_name.as_str()))
            .count(db)
            .await?
            > 0;
        if taken {
            return Err(ServiceError::Conflict(format!(
                "Service Template {} already exists",
                request.template_name
            )));
        }

        for (i, part) in request.parts.iter().enumerate() {
            crate::services::repair_orders::check_part_flags(
                i as i32 + 1,
                part.is_billable,
                part.is_foc,
            )?;
        }
        let wanted: HashSet<&str> = request.parts.iter().map(|p| p.item_code.as_str()).collect();
        if !wanted.is_empty() {
            let known: HashSet<String> = item::Entity::find()
                .filter(item::Column::ItemCode.is_in(wanted.iter().copied()))
                .all(db)
                .await?
                .into_iter()
                .map(|i| i.item_code)
                .collect();
            if let Some(missing) = wanted.iter().find(|code| !known.contains(**code)) {
                return Err(ServiceError::ValidationError(format!(
                    "Item {} does not exist",
                    missing
                )));
            }
        }

        let created = service_template::ActiveModel {
            id: Set(Uuid::new_v4()),
            template_name: Set(request.template_name),
            description: Set(request.description),
            default_operations: Set(serde_json::to_value(&request.operations)?),
            default_parts: Set(serde_json::to_value(&request.parts)?),
            default_checklist: Set(serde_json::to_value(&request.checklist)?),
        }
        .insert(db)
        .await?;

        info!(template = %created.template_name, "service template created");
        Ok(created)
    }

    #[instrument(skip(self))]
    pub async fn list_service_templates(
        &self,
    ) -> Result<Vec<service_template::Model>, ServiceError> {
        Ok(service_template::Entity::find()
            .order_by_asc(service_template::Column::TemplateName)
            .all(&*self.db)
            .await?)
    }

    #[instrument(skip(self))]
    pub async fn get_service_template(
        &self,
        id: Uuid,
    ) -> Result<service_template::Model, ServiceError> {
        service_template::Entity::find_by_id(id)
            .one(&*self.db)
            .await?
            .ok_or_else(|| ServiceError::NotFound(format!("Service Template {} not found", id)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use assert_matches::assert_matches;
    use sea_orm::{DatabaseBackend, MockDatabase};

    #[test]
    fn item_requests_default_to_stock_items() {
        let request: ItemRequest = serde_json::from_str(
            r#"{"item_code": "BRK-PAD-F", "item_name": "Front brake pads", "stock_uom": "Set"}"#,
        )
        .unwrap();
        assert!(request.is_stock_item);
        assert_eq!(request.valuation_rate, Decimal::ZERO);
    }

    #[tokio::test]
    async fn unknown_item_is_not_found() {
        let db = MockDatabase::new(DatabaseBackend::Sqlite)
            .append_query_results([Vec::<item::Model>::new()])
            .into_connection();
        let service = MasterDataService::new(Arc::new(db));

        assert_matches!(
            service.get_item("NOPE").await,
            Err(ServiceError::NotFound(ref msg)) if msg == "Item NOPE not found"
        );
    }
}
