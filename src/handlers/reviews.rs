// handlers/reviews.rs - /v1/reviews
//
// Reviews belong to the account that wrote them; edits and deletes are
// limited to the author or an admin.

use axum::{
    extract::{rejection::JsonRejection, Path, State},
    Json,
};
use serde::Deserialize;

use super::users::require_self_or_admin;
use super::{apply, read_id, read_json};
use crate::auth::Identity;
use crate::database::models::review::{validate_review, Review};
use crate::middleware::{ApiResponse, ApiResult};
use crate::routes::AppState;
use crate::validator::Validator;

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ReviewInput {
    pub title: String,
    pub about: String,
}

#[derive(Debug, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ReviewUpdate {
    pub title: Option<String>,
    pub about: Option<String>,
}

pub async fn create_review(
    State(state): State<AppState>,
    identity: Identity,
    payload: Result<Json<ReviewInput>, JsonRejection>,
) -> ApiResult<Review> {
    let author = identity.require_account()?.user_id;
    let input = read_json(payload)?;
    let mut review = Review {
        user_id: author,
        title: input.title,
        about: input.about,
        ..Default::default()
    };

    let mut v = Validator::new();
    validate_review(&mut v, &review);
    v.finish()?;

    state.models.reviews.insert(&mut review).await?;
    Ok(ApiResponse::created("review", review))
}

pub async fn show_review(State(state): State<AppState>, Path(id): Path<String>) -> ApiResult<Review> {
    let review = state.models.reviews.get(read_id(&id)?).await?;
    Ok(ApiResponse::success("review", review))
}

pub async fn update_review(
    State(state): State<AppState>,
    identity: Identity,
    Path(id): Path<String>,
    payload: Result<Json<ReviewUpdate>, JsonRejection>,
) -> ApiResult<Review> {
    let id = read_id(&id)?;
    let update = read_json(payload)?;

    let mut review = state.models.reviews.get(id).await?;
    require_self_or_admin(&identity, review.user_id)?;
    apply(&mut review.title, update.title);
    apply(&mut review.about, update.about);

    let mut v = Validator::new();
    validate_review(&mut v, &review);
    v.finish()?;

    state.models.reviews.update(&mut review).await?;
    Ok(ApiResponse::success("review", review))
}

pub async fn delete_review(
    State(state): State<AppState>,
    identity: Identity,
    Path(id): Path<String>,
) -> ApiResult<&'static str> {
    let id = read_id(&id)?;
    let review = state.models.reviews.get(id).await?;
    require_self_or_admin(&identity, review.user_id)?;

    state.models.reviews.delete(id).await?;
    Ok(ApiResponse::success("message", "review successfully deleted"))
}
