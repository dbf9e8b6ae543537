use axum::{
    extract::{Request, State},
    http::{header, HeaderMap, HeaderValue},
    middleware::Next,
    response::{IntoResponse, Response},
};
use std::sync::Arc;
use tracing::debug;

use crate::auth::tokens::{is_well_formed, Scope, TokenStore};
use crate::auth::Identity;
use crate::database::DatabaseError;
use crate::error::ApiError;

/// Resolve the caller from the `Authorization` header.
///
/// No header is anonymous. Malformed headers, badly shaped tokens and unknown
/// or expired tokens all fail with the same 401.
pub async fn identify(headers: &HeaderMap, tokens: &dyn TokenStore) -> Result<Identity, ApiError> {
    let Some(value) = headers.get(header::AUTHORIZATION) else {
        return Ok(Identity::Anonymous);
    };

    let value = value.to_str().map_err(|_| ApiError::invalid_credentials())?;
    let parts: Vec<&str> = value.split(' ').collect();
    let [scheme, token] = parts.as_slice() else {
        return Err(ApiError::invalid_credentials());
    };
    if *scheme != "Bearer" || !is_well_formed(token) {
        return Err(ApiError::invalid_credentials());
    }

    match tokens.get_for_scope(Scope::Authentication, token).await {
        Ok(account) => Ok(Identity::user(account)),
        Err(DatabaseError::NotFound) => {
            debug!("Rejected unknown or expired authentication token");
            Err(ApiError::invalid_credentials())
        }
        Err(e) => Err(e.into()),
    }
}

/// Attach an `Identity` to every request; always varies on `Authorization`.
pub async fn authenticate(
    State(tokens): State<Arc<dyn TokenStore>>,
    mut request: Request,
    next: Next,
) -> Response {
    let identity = identify(request.headers(), tokens.as_ref()).await;
    let mut response = match identity {
        Ok(identity) => {
            request.extensions_mut().insert(identity);
            next.run(request).await
        }
        Err(err) => err.into_response(),
    };

    response
        .headers_mut()
        .append(header::VARY, HeaderValue::from_static("Authorization"));
    response
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::auth::AccountType;
    use crate::error::INVALID_CREDENTIALS;
    use crate::testing::{sample_account, MemoryTokenStore};
    use axum::{body::Body, http::StatusCode, middleware::from_fn_with_state, routing::get, Router};
    use chrono::Duration;
    use tower::ServiceExt;

    fn headers(value: &str) -> HeaderMap {
        let mut headers = HeaderMap::new();
        headers.insert(header::AUTHORIZATION, HeaderValue::from_str(value).unwrap());
        headers
    }

    async fn store_with_login() -> (MemoryTokenStore, String) {
        let store = MemoryTokenStore::with_accounts([sample_account(12, AccountType::Marketier)]);
        let token = store
            .new_token(12, Duration::hours(1), Scope::Authentication)
            .await
            .unwrap();
        (store, token.plaintext)
    }

    #[tokio::test]
    async fn no_header_is_anonymous() {
        let store = MemoryTokenStore::default();
        let identity = identify(&HeaderMap::new(), &store).await.unwrap();
        assert!(identity.is_anonymous());
    }

    #[tokio::test]
    async fn every_failure_looks_the_same() {
        let (store, plaintext) = store_with_login().await;
        let unknown = "ab".repeat(16);
        let cases = [
            "Bearer bad".to_string(),
            format!("Basic {}", plaintext),
            format!("Bearer  {}", plaintext),
            plaintext.clone(),
            format!("Bearer {}", unknown),
        ];

        for value in cases {
            let err = identify(&headers(&value), &store).await.unwrap_err();
            assert_eq!(err.status_code(), 401, "{}", value);
            assert_eq!(err.message(), INVALID_CREDENTIALS, "{}", value);
        }
    }

    #[tokio::test]
    async fn valid_token_resolves_owner() {
        let (store, plaintext) = store_with_login().await;
        let identity = identify(&headers(&format!("Bearer {}", plaintext)), &store)
            .await
            .unwrap();
        assert_eq!(identity.account().map(|a| a.user_id), Some(12));
        assert_eq!(identity.account_type(), Some(AccountType::Marketier));
    }

    #[tokio::test]
    async fn activation_token_does_not_authenticate() {
        let store = MemoryTokenStore::with_accounts([sample_account(12, AccountType::Shopper)]);
        let token = store.new_token(12, Duration::hours(1), Scope::Activation).await.unwrap();
        let err = identify(&headers(&format!("Bearer {}", token.plaintext)), &store)
            .await
            .unwrap_err();
        assert_eq!(err.status_code(), 401);
    }

    fn app(store: MemoryTokenStore) -> Router {
        let tokens: Arc<dyn TokenStore> = Arc::new(store);
        Router::new()
            .route(
                "/",
                get(|identity: Identity| async move {
                    match identity.account() {
                        Some(account) => account.user_id.to_string(),
                        None => "anonymous".to_string(),
                    }
                }),
            )
            .layer(from_fn_with_state(tokens, authenticate))
    }

    #[tokio::test]
    async fn middleware_sets_vary_on_success_and_failure() {
        let (store, plaintext) = store_with_login().await;
        let app = app(store);

        let ok = app
            .clone()
            .oneshot(
                Request::builder()
                    .uri("/")
                    .header(header::AUTHORIZATION, format!("Bearer {}", plaintext))
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(ok.status(), StatusCode::OK);
        assert_eq!(ok.headers()[header::VARY], "Authorization");

        let denied = app
            .oneshot(
                Request::builder()
                    .uri("/")
                    .header(header::AUTHORIZATION, "Bearer bad")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(denied.status(), StatusCode::UNAUTHORIZED);
        assert_eq!(denied.headers()[header::VARY], "Authorization");
        assert_eq!(denied.headers()[header::WWW_AUTHENTICATE], "Bearer");
    }
}
