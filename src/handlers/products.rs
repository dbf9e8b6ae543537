// handlers/products.rs - /v1/products

use axum::{
    extract::{rejection::JsonRejection, Path, State},
    Json,
};
use serde::Deserialize;

use super::{apply, read_id, read_json};
use crate::database::models::product::{validate_product, Product};
use crate::middleware::{ApiResponse, ApiResult};
use crate::routes::AppState;
use crate::validator::Validator;

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ProductInput {
    pub name: String,
    pub about: String,
}

#[derive(Debug, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ProductUpdate {
    pub name: Option<String>,
    pub about: Option<String>,
    pub stars: Option<i16>,
}

pub async fn create_product(
    State(state): State<AppState>,
    payload: Result<Json<ProductInput>, JsonRejection>,
) -> ApiResult<Product> {
    let input = read_json(payload)?;
    let mut product = Product {
        name: input.name,
        about: input.about,
        ..Default::default()
    };

    let mut v = Validator::new();
    validate_product(&mut v, &product);
    v.finish()?;

    state.models.products.insert(&mut product).await?;
    Ok(ApiResponse::created("product", product))
}

pub async fn show_product(State(state): State<AppState>, Path(id): Path<String>) -> ApiResult<Product> {
    let product = state.models.products.get(read_id(&id)?).await?;
    Ok(ApiResponse::success("product", product))
}

pub async fn update_product(
    State(state): State<AppState>,
    Path(id): Path<String>,
    payload: Result<Json<ProductUpdate>, JsonRejection>,
) -> ApiResult<Product> {
    let id = read_id(&id)?;
    let update = read_json(payload)?;

    let mut product = state.models.products.get(id).await?;
    apply(&mut product.name, update.name);
    apply(&mut product.about, update.about);
    apply(&mut product.stars, update.stars);

    let mut v = Validator::new();
    validate_product(&mut v, &product);
    v.finish()?;

    state.models.products.update(&mut product).await?;
    Ok(ApiResponse::success("product", product))
}

pub async fn delete_product(State(state): State<AppState>, Path(id): Path<String>) -> ApiResult<&'static str> {
    state.models.products.delete(read_id(&id)?).await?;
    Ok(ApiResponse::success("message", "product successfully deleted"))
}
