// handlers/mod.rs - request handlers, one module per resource
//
// Permission allow-lists live in routes.rs; handlers only apply
// ownership rules (self / author) on top of them.

pub mod contacts;
pub mod health;
pub mod marketiers;
pub mod product_owners;
pub mod products;
pub mod proposals;
pub mod reviews;
pub mod tokens;
pub mod users;

use axum::{extract::rejection::JsonRejection, Json};
use std::sync::Arc;

use crate::error::ApiError;
use crate::mailer::Email;
use crate::routes::AppState;

/// Positive integer id from the path; anything else is treated as missing.
pub(crate) fn read_id(raw: &str) -> Result<i64, ApiError> {
    match raw.parse::<i64>() {
        Ok(id) if id >= 1 => Ok(id),
        _ => Err(ApiError::not_found()),
    }
}

/// Unwrap a JSON body, mapping axum's rejection to a 400 with our error shape.
pub(crate) fn read_json<T>(payload: Result<Json<T>, JsonRejection>) -> Result<T, ApiError> {
    let Json(value) = payload?;
    Ok(value)
}

/// Queue `email` on the background coordinator.
pub(crate) fn send_in_background(state: &AppState, email: Email) {
    let mailer = Arc::clone(&state.mailer);
    state
        .background
        .spawn("send email", async move { mailer.send(&email).await });
}

pub(crate) fn apply<T>(target: &mut T, update: Option<T>) {
    if let Some(value) = update {
        *target = value;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ids_must_be_positive_integers() {
        assert_eq!(read_id("42").unwrap(), 42);
        for raw in ["0", "-3", "abc", "4.2", ""] {
            assert_eq!(read_id(raw).unwrap_err().status_code(), 404, "{}", raw);
        }
    }

    #[test]
    fn apply_keeps_missing_fields() {
        let mut name = "old".to_string();
        apply(&mut name, None);
        assert_eq!(name, "old");
        apply(&mut name, Some("new".to_string()));
        assert_eq!(name, "new");
    }
}
