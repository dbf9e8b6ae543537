// handlers/proposals.rs - /v1/proposals

use axum::{
    extract::{rejection::JsonRejection, Path, State},
    Json,
};
use serde::Deserialize;

use super::{apply, read_id, read_json};
use crate::database::models::proposal::{validate_proposal, Proposal};
use crate::middleware::{ApiResponse, ApiResult};
use crate::routes::AppState;
use crate::validator::Validator;

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ProposalInput {
    pub title: String,
    pub about: String,
}

#[derive(Debug, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ProposalUpdate {
    pub title: Option<String>,
    pub about: Option<String>,
}

pub async fn create_proposal(
    State(state): State<AppState>,
    payload: Result<Json<ProposalInput>, JsonRejection>,
) -> ApiResult<Proposal> {
    let input = read_json(payload)?;
    let mut proposal = Proposal {
        title: input.title,
        about: input.about,
        ..Default::default()
    };

    let mut v = Validator::new();
    validate_proposal(&mut v, &proposal);
    v.finish()?;

    state.models.proposals.insert(&mut proposal).await?;
    Ok(ApiResponse::created("proposal", proposal))
}

pub async fn show_proposal(State(state): State<AppState>, Path(id): Path<String>) -> ApiResult<Proposal> {
    let proposal = state.models.proposals.get(read_id(&id)?).await?;
    Ok(ApiResponse::success("proposal", proposal))
}

pub async fn update_proposal(
    State(state): State<AppState>,
    Path(id): Path<String>,
    payload: Result<Json<ProposalUpdate>, JsonRejection>,
) -> ApiResult<Proposal> {
    let id = read_id(&id)?;
    let update = read_json(payload)?;

    let mut proposal = state.models.proposals.get(id).await?;
    apply(&mut proposal.title, update.title);
    apply(&mut proposal.about, update.about);

    let mut v = Validator::new();
    validate_proposal(&mut v, &proposal);
    v.finish()?;

    state.models.proposals.update(&mut proposal).await?;
    Ok(ApiResponse::success("proposal", proposal))
}

pub async fn delete_proposal(State(state): State<AppState>, Path(id): Path<String>) -> ApiResult<&'static str> {
    state.models.proposals.delete(read_id(&id)?).await?;
    Ok(ApiResponse::success("message", "proposal successfully deleted"))
}
