// handlers/users.rs - shopper accounts, activation and password reset
//
// POST   /v1/users/shoppers       register (public)
// GET    /v1/users/shoppers/:id   show
// PATCH  /v1/users/shoppers/:id   update (self or admin)
// DELETE /v1/users/shoppers/:id   delete (self or admin)
// PUT    /v1/users/activated      spend an activation token
// PUT    /v1/users/password       spend a password-reset token

use axum::{
    extract::{rejection::JsonRejection, Path, State},
    Json,
};
use chrono::NaiveDate;
use serde::Deserialize;
use tracing::info;

use super::{apply, read_id, read_json, send_in_background};
use crate::auth::tokens::{validate_token_plaintext, Scope};
use crate::auth::{AccountType, Identity};
use crate::database::models::user::{validate_user, NewAccount, UserAccount, STATUS_ACTIVATED};
use crate::database::DatabaseError;
use crate::error::ApiError;
use crate::mailer::Email;
use crate::middleware::{ApiResponse, ApiResult};
use crate::routes::AppState;
use crate::validator::{validate_password_plaintext, Validator};

/// Registration fields shared by every role
#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct AccountInput {
    pub first_name: String,
    pub last_name: String,
    pub email: String,
    pub date_of_birth: NaiveDate,
    pub gender: String,
    pub address: String,
    pub password: String,
}

/// Editable base fields; absent means unchanged.
#[derive(Debug, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct AccountUpdate {
    pub first_name: Option<String>,
    pub last_name: Option<String>,
    pub email: Option<String>,
    pub address: Option<String>,
    pub password: Option<String>,
}

/// Registration body for marketiers and product owners.
#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ProfileInput {
    pub first_name: String,
    pub last_name: String,
    pub email: String,
    pub date_of_birth: NaiveDate,
    pub gender: String,
    pub address: String,
    pub password: String,
    pub display_name: String,
    pub about: String,
}

impl ProfileInput {
    /// Base account fields, display name, about.
    pub(crate) fn into_parts(self) -> (AccountInput, String, String) {
        let account = AccountInput {
            first_name: self.first_name,
            last_name: self.last_name,
            email: self.email,
            date_of_birth: self.date_of_birth,
            gender: self.gender,
            address: self.address,
            password: self.password,
        };
        (account, self.display_name, self.about)
    }
}

#[derive(Debug, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ProfileUpdate {
    pub first_name: Option<String>,
    pub last_name: Option<String>,
    pub email: Option<String>,
    pub address: Option<String>,
    pub password: Option<String>,
    pub display_name: Option<String>,
    pub about: Option<String>,
}

impl ProfileUpdate {
    pub(crate) fn into_parts(self) -> (AccountUpdate, Option<String>, Option<String>) {
        let account = AccountUpdate {
            first_name: self.first_name,
            last_name: self.last_name,
            email: self.email,
            address: self.address,
            password: self.password,
        };
        (account, self.display_name, self.about)
    }
}

/// Unsaved account with its password hashed.
pub(crate) fn new_account(input: AccountInput, account_type: AccountType) -> Result<UserAccount, ApiError> {
    let fields = NewAccount {
        first_name: input.first_name,
        last_name: input.last_name,
        email: input.email,
        date_of_birth: input.date_of_birth,
        gender: input.gender,
        address: input.address,
    };
    let mut account = UserAccount::new(fields, account_type);
    account.password.set(&input.password)?;
    Ok(account)
}

pub(crate) fn apply_account_update(account: &mut UserAccount, update: AccountUpdate) -> Result<(), ApiError> {
    apply(&mut account.first_name, update.first_name);
    apply(&mut account.last_name, update.last_name);
    apply(&mut account.email, update.email);
    apply(&mut account.address, update.address);
    if let Some(password) = update.password {
        account.password.set(&password)?;
    }
    Ok(())
}

/// Issue an activation token for a new account and queue the welcome email.
pub(crate) async fn send_welcome(state: &AppState, account: &UserAccount) -> Result<(), ApiError> {
    let token = state
        .models
        .tokens
        .new_token(account.user_id, state.config.tokens.activation_ttl(), Scope::Activation)
        .await?;

    send_in_background(
        state,
        Email::welcome(&account.email, account.user_id, &token.plaintext, token.expiry),
    );
    Ok(())
}

/// Caller may change `user_id`'s account.
pub(crate) fn require_self_or_admin(identity: &Identity, user_id: i64) -> Result<(), ApiError> {
    if identity.can_act_for(user_id) {
        Ok(())
    } else {
        Err(ApiError::not_permitted())
    }
}

pub async fn register_shopper(
    State(state): State<AppState>,
    payload: Result<Json<AccountInput>, JsonRejection>,
) -> ApiResult<UserAccount> {
    let input = read_json(payload)?;
    let mut user = new_account(input, AccountType::Shopper)?;

    let mut v = Validator::new();
    validate_user(&mut v, &user);
    v.finish()?;

    state.models.users.insert(&mut user).await?;
    send_welcome(&state, &user).await?;

    info!("Registered shopper {}", user.user_id);
    Ok(ApiResponse::accepted("user", user))
}

async fn load_shopper(state: &AppState, id: i64) -> Result<UserAccount, ApiError> {
    let user = state.models.users.get_by_id(id).await?;
    if user.account_type != AccountType::Shopper {
        return Err(ApiError::not_found());
    }
    Ok(user)
}

pub async fn show_shopper(State(state): State<AppState>, Path(id): Path<String>) -> ApiResult<UserAccount> {
    let user = load_shopper(&state, read_id(&id)?).await?;
    Ok(ApiResponse::success("user", user))
}

pub async fn update_shopper(
    State(state): State<AppState>,
    identity: Identity,
    Path(id): Path<String>,
    payload: Result<Json<AccountUpdate>, JsonRejection>,
) -> ApiResult<UserAccount> {
    let id = read_id(&id)?;
    require_self_or_admin(&identity, id)?;
    let update = read_json(payload)?;

    let mut user = load_shopper(&state, id).await?;
    apply_account_update(&mut user, update)?;

    let mut v = Validator::new();
    validate_user(&mut v, &user);
    v.finish()?;

    state.models.users.update(&mut user).await?;
    Ok(ApiResponse::success("user", user))
}

pub async fn delete_shopper(
    State(state): State<AppState>,
    identity: Identity,
    Path(id): Path<String>,
) -> ApiResult<&'static str> {
    let id = read_id(&id)?;
    require_self_or_admin(&identity, id)?;

    load_shopper(&state, id).await?;
    state.models.users.delete(id).await?;
    Ok(ApiResponse::success("message", "user successfully deleted"))
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ActivationInput {
    pub token: String,
}

pub async fn activate_user(
    State(state): State<AppState>,
    payload: Result<Json<ActivationInput>, JsonRejection>,
) -> ApiResult<UserAccount> {
    let input = read_json(payload)?;

    let mut v = Validator::new();
    validate_token_plaintext(&mut v, &input.token);
    v.finish()?;

    let mut user = match state.models.tokens.get_for_scope(Scope::Activation, &input.token).await {
        Ok(user) => user,
        Err(DatabaseError::NotFound) => {
            return Err(ApiError::invalid_field("token", "invalid or expired activation token"))
        }
        Err(e) => return Err(e.into()),
    };

    user.account_status = STATUS_ACTIVATED.to_string();
    state.models.users.update(&mut user).await?;
    state
        .models
        .tokens
        .delete_all_for_user(Scope::Activation, user.user_id)
        .await?;

    info!("Activated user {}", user.user_id);
    Ok(ApiResponse::success("user", user))
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct PasswordResetInput {
    pub password: String,
    pub token: String,
}

pub async fn update_password(
    State(state): State<AppState>,
    payload: Result<Json<PasswordResetInput>, JsonRejection>,
) -> ApiResult<&'static str> {
    let input = read_json(payload)?;

    let mut v = Validator::new();
    validate_password_plaintext(&mut v, &input.password);
    validate_token_plaintext(&mut v, &input.token);
    v.finish()?;

    let mut user = match state.models.tokens.get_for_scope(Scope::PasswordReset, &input.token).await {
        Ok(user) => user,
        Err(DatabaseError::NotFound) => {
            return Err(ApiError::invalid_field("token", "invalid or expired password reset token"))
        }
        Err(e) => return Err(e.into()),
    };

    user.password.set(&input.password)?;
    state.models.users.update(&mut user).await?;
    state
        .models
        .tokens
        .delete_all_for_user(Scope::PasswordReset, user.user_id)
        .await?;

    Ok(ApiResponse::success("message", "your password was successfully reset"))
}
