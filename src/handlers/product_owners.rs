// handlers/product_owners.rs - product owner accounts
//
// POST  /v1/users/product_owners       register (public)
// GET   /v1/users/product_owners/:id   show
// PATCH /v1/users/product_owners/:id   update (self or admin)

use axum::{
    extract::{rejection::JsonRejection, Path, State},
    Json,
};
use tracing::info;

use super::users::{apply_account_update, new_account, require_self_or_admin, send_welcome, ProfileInput, ProfileUpdate};
use super::{apply, read_id, read_json};
use crate::auth::{AccountType, Identity};
use crate::database::models::product_owner::{validate_product_owner, ProductOwnerAccount};
use crate::middleware::{ApiResponse, ApiResult};
use crate::routes::AppState;
use crate::validator::Validator;

pub async fn register_product_owner(
    State(state): State<AppState>,
    payload: Result<Json<ProfileInput>, JsonRejection>,
) -> ApiResult<ProductOwnerAccount> {
    let (account, display_name, about) = read_json(payload)?.into_parts();
    let mut owner = ProductOwnerAccount {
        account: new_account(account, AccountType::ProductOwner)?,
        display_name,
        about,
        sales_generated: 0,
    };

    let mut v = Validator::new();
    validate_product_owner(&mut v, &owner);
    v.finish()?;

    state.models.product_owners.insert(&mut owner).await?;
    send_welcome(&state, &owner.account).await?;

    info!("Registered product owner {}", owner.account.user_id);
    Ok(ApiResponse::accepted("user", owner))
}

pub async fn show_product_owner(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> ApiResult<ProductOwnerAccount> {
    let owner = state.models.product_owners.get_by_id(read_id(&id)?).await?;
    Ok(ApiResponse::success("user", owner))
}

pub async fn update_product_owner(
    State(state): State<AppState>,
    identity: Identity,
    Path(id): Path<String>,
    payload: Result<Json<ProfileUpdate>, JsonRejection>,
) -> ApiResult<ProductOwnerAccount> {
    let id = read_id(&id)?;
    require_self_or_admin(&identity, id)?;
    let (account, display_name, about) = read_json(payload)?.into_parts();

    let mut owner = state.models.product_owners.get_by_id(id).await?;
    apply_account_update(&mut owner.account, account)?;
    apply(&mut owner.display_name, display_name);
    apply(&mut owner.about, about);

    let mut v = Validator::new();
    validate_product_owner(&mut v, &owner);
    v.finish()?;

    state.models.product_owners.update(&mut owner).await?;
    Ok(ApiResponse::success("user", owner))
}
