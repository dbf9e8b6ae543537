// handlers/marketiers.rs - marketier accounts
//
// POST  /v1/users/marketiers       register (public)
// GET   /v1/users/marketiers/:id   show
// PATCH /v1/users/marketiers/:id   update (self or admin)

use axum::{
    extract::{rejection::JsonRejection, Path, State},
    Json,
};
use tracing::info;

use super::users::{apply_account_update, new_account, require_self_or_admin, send_welcome, ProfileInput, ProfileUpdate};
use super::{apply, read_id, read_json};
use crate::auth::{AccountType, Identity};
use crate::database::models::marketier::{validate_marketier, MarketierAccount};
use crate::middleware::{ApiResponse, ApiResult};
use crate::routes::AppState;
use crate::validator::Validator;

pub async fn register_marketier(
    State(state): State<AppState>,
    payload: Result<Json<ProfileInput>, JsonRejection>,
) -> ApiResult<MarketierAccount> {
    let (account, display_name, about) = read_json(payload)?.into_parts();
    let mut marketier = MarketierAccount {
        account: new_account(account, AccountType::Marketier)?,
        display_name,
        about,
        sales_generated: 0,
        tier: 0,
    };

    let mut v = Validator::new();
    validate_marketier(&mut v, &marketier);
    v.finish()?;

    state.models.marketiers.insert(&mut marketier).await?;
    send_welcome(&state, &marketier.account).await?;

    info!("Registered marketier {}", marketier.account.user_id);
    Ok(ApiResponse::accepted("user", marketier))
}

pub async fn show_marketier(State(state): State<AppState>, Path(id): Path<String>) -> ApiResult<MarketierAccount> {
    let marketier = state.models.marketiers.get_by_id(read_id(&id)?).await?;
    Ok(ApiResponse::success("user", marketier))
}

pub async fn update_marketier(
    State(state): State<AppState>,
    identity: Identity,
    Path(id): Path<String>,
    payload: Result<Json<ProfileUpdate>, JsonRejection>,
) -> ApiResult<MarketierAccount> {
    let id = read_id(&id)?;
    require_self_or_admin(&identity, id)?;
    let (account, display_name, about) = read_json(payload)?.into_parts();

    let mut marketier = state.models.marketiers.get_by_id(id).await?;
    apply_account_update(&mut marketier.account, account)?;
    apply(&mut marketier.display_name, display_name);
    apply(&mut marketier.about, about);

    let mut v = Validator::new();
    validate_marketier(&mut v, &marketier);
    v.finish()?;

    state.models.marketiers.update(&mut marketier).await?;
    Ok(ApiResponse::success("user", marketier))
}
