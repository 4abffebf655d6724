use axum::{
    extract::{Path, State},
    Json,
};

use super::common::{created, Created};
use crate::{
    entities::{item, service_template},
    services::masters::{ItemRequest, ServiceTemplateRequest},
    ApiResponse, ApiResult, AppState,
};

pub async fn create_item(
    State(state): State<AppState>,
    Json(payload): Json<ItemRequest>,
) -> Created<item::Model> {
    let item = state.services.masters.create_item(payload).await?;
    Ok(created(item))
}

pub async fn list_items(State(state): State<AppState>) -> ApiResult<Vec<item::Model>> {
    let items = state.services.masters.list_items().await?;
    Ok(Json(ApiResponse::success(items)))
}

pub async fn get_item(
    State(state): State<AppState>,
    Path(item_code): Path<String>,
) -> ApiResult<item::Model> {
    let item = state.services.masters.get_item(&item_code).await?;
    Ok(Json(ApiResponse::success(item)))
}

pub async fn create_service_template(
    State(state): State<AppState>,
    Json(payload): Json<ServiceTemplateRequest>,
) -> Created<service_template::Model> {
    let template = state
        .services
        .masters
        .create_service_template(payload)
        .await?;
    Ok(created(template))
}

pub async fn list_service_templates(
    State(state): State<AppState>,
) -> ApiResult<Vec<service_template::Model>> {
    let templates = state.services.masters.list_service_templates().await?;
    Ok(Json(ApiResponse::success(templates)))
}
