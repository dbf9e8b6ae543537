// handlers/tokens.rs - token issuance
//
// POST /v1/tokens/authentication   email + password -> bearer token
// POST /v1/tokens/activation       re-send activation instructions
// POST /v1/tokens/password-reset   send password reset instructions

use axum::{
    extract::{rejection::JsonRejection, State},
    Json,
};
use serde::Deserialize;
use tracing::info;

use super::{read_json, send_in_background};
use crate::auth::tokens::{Scope, Token};
use crate::database::models::user::UserAccount;
use crate::database::DatabaseError;
use crate::error::ApiError;
use crate::mailer::Email;
use crate::middleware::{ApiResponse, ApiResult};
use crate::routes::AppState;
use crate::validator::{validate_email, validate_password_plaintext, Validator};

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct CredentialsInput {
    pub email: String,
    pub password: String,
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct EmailInput {
    pub email: String,
}

pub async fn create_authentication_token(
    State(state): State<AppState>,
    payload: Result<Json<CredentialsInput>, JsonRejection>,
) -> ApiResult<Token> {
    let input = read_json(payload)?;

    let mut v = Validator::new();
    validate_email(&mut v, &input.email);
    validate_password_plaintext(&mut v, &input.password);
    v.finish()?;

    // Unknown email and wrong password are indistinguishable
    let user = match state.models.users.get_by_email(&input.email).await {
        Ok(user) => user,
        Err(DatabaseError::NotFound) => return Err(ApiError::invalid_credentials()),
        Err(e) => return Err(e.into()),
    };
    if !user.password.matches(&input.password)? {
        return Err(ApiError::invalid_credentials());
    }

    let token = state
        .models
        .tokens
        .new_token(user.user_id, state.config.tokens.authentication_ttl(), Scope::Authentication)
        .await?;

    info!("Issued authentication token for user {}", user.user_id);
    Ok(ApiResponse::created("authentication_token", token))
}

async fn user_for_email(state: &AppState, email: &str) -> Result<UserAccount, ApiError> {
    let mut v = Validator::new();
    validate_email(&mut v, email);
    v.finish()?;

    match state.models.users.get_by_email(email).await {
        Ok(user) => Ok(user),
        Err(DatabaseError::NotFound) => Err(ApiError::invalid_field("email", "no matching email address found")),
        Err(e) => Err(e.into()),
    }
}

pub async fn create_activation_token(
    State(state): State<AppState>,
    payload: Result<Json<EmailInput>, JsonRejection>,
) -> ApiResult<&'static str> {
    let input = read_json(payload)?;
    let user = user_for_email(&state, &input.email).await?;

    if user.is_activated() {
        return Err(ApiError::invalid_field("email", "user has already been activated"));
    }

    let token = state
        .models
        .tokens
        .new_token(user.user_id, state.config.tokens.activation_ttl(), Scope::Activation)
        .await?;
    send_in_background(&state, Email::activation(&user.email, &token.plaintext, token.expiry));

    Ok(ApiResponse::accepted(
        "message",
        "an email will be sent to you containing activation instructions",
    ))
}

pub async fn create_password_reset_token(
    State(state): State<AppState>,
    payload: Result<Json<EmailInput>, JsonRejection>,
) -> ApiResult<&'static str> {
    let input = read_json(payload)?;
    let user = user_for_email(&state, &input.email).await?;

    if !user.is_activated() {
        return Err(ApiError::invalid_field("email", "user account must be activated"));
    }

    let token = state
        .models
        .tokens
        .new_token(user.user_id, state.config.tokens.password_reset_ttl(), Scope::PasswordReset)
        .await?;
    send_in_background(&state, Email::password_reset(&user.email, &token.plaintext, token.expiry));

    Ok(ApiResponse::accepted(
        "message",
        "an email will be sent to you containing password reset instructions",
    ))
}
