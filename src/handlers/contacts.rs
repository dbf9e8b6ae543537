// handlers/contacts.rs - /v1/contacts
//
// Any signed-in account may submit; only admins read, edit or delete.

use axum::{
    extract::{rejection::JsonRejection, Path, State},
    Json,
};
use serde::Deserialize;

use super::{apply, read_id, read_json};
use crate::database::models::contact::{validate_contact, Contact};
use crate::middleware::{ApiResponse, ApiResult};
use crate::routes::AppState;
use crate::validator::Validator;

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ContactInput {
    pub subject: String,
    pub about: String,
}

#[derive(Debug, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ContactUpdate {
    pub subject: Option<String>,
    pub about: Option<String>,
}

pub async fn create_contact(
    State(state): State<AppState>,
    payload: Result<Json<ContactInput>, JsonRejection>,
) -> ApiResult<Contact> {
    let input = read_json(payload)?;
    let mut contact = Contact {
        subject: input.subject,
        about: input.about,
        ..Default::default()
    };

    let mut v = Validator::new();
    validate_contact(&mut v, &contact);
    v.finish()?;

    state.models.contacts.insert(&mut contact).await?;
    Ok(ApiResponse::created("contact", contact))
}

pub async fn show_contact(State(state): State<AppState>, Path(id): Path<String>) -> ApiResult<Contact> {
    let contact = state.models.contacts.get(read_id(&id)?).await?;
    Ok(ApiResponse::success("contact", contact))
}

pub async fn update_contact(
    State(state): State<AppState>,
    Path(id): Path<String>,
    payload: Result<Json<ContactUpdate>, JsonRejection>,
) -> ApiResult<Contact> {
    let id = read_id(&id)?;
    let update = read_json(payload)?;

    let mut contact = state.models.contacts.get(id).await?;
    apply(&mut contact.subject, update.subject);
    apply(&mut contact.about, update.about);

    let mut v = Validator::new();
    validate_contact(&mut v, &contact);
    v.finish()?;

    state.models.contacts.update(&mut contact).await?;
    Ok(ApiResponse::success("contact", contact))
}

pub async fn delete_contact(State(state): State<AppState>, Path(id): Path<String>) -> ApiResult<&'static str> {
    state.models.contacts.delete(read_id(&id)?).await?;
    Ok(ApiResponse::success("message", "contact successfully deleted"))
}
