use axum::{
    extract::{Request, State},
    middleware::{from_fn_with_state, Next},
    response::Response,
    routing::MethodRouter,
};
use tracing::debug;

use crate::auth::{AccountType, Identity};
use crate::error::ApiError;

/// Account types allowed through a route
#[derive(Clone, Copy, Debug)]
pub struct Permission(pub &'static [AccountType]);

impl Permission {
    pub const ANY_ACCOUNT: Permission = Permission(&[
        AccountType::Shopper,
        AccountType::Marketier,
        AccountType::ProductOwner,
        AccountType::Admin,
    ]);

    pub fn allows(&self, account_type: AccountType) -> bool {
        self.0.contains(&account_type)
    }
}

/// Gate a route on the caller's account type. Runs after `authenticate`.
pub async fn require_permission(
    State(permission): State<Permission>,
    request: Request,
    next: Next,
) -> Result<Response, ApiError> {
    let identity = Identity::from_extensions(request.extensions(), "permission check")?;

    match identity.account_type() {
        Some(account_type) if permission.allows(account_type) => Ok(next.run(request).await),
        Some(account_type) => {
            debug!("Account type {:?} not permitted on {}", account_type, request.uri().path());
            Err(ApiError::not_permitted())
        }
        None => Err(ApiError::not_permitted()),
    }
}

/// Wrap every handler of `router` with the allow-list.
pub fn permitted<S>(allowed: &'static [AccountType], router: MethodRouter<S>) -> MethodRouter<S>
where
    S: Clone + Send + Sync + 'static,
{
    router.route_layer(from_fn_with_state(Permission(allowed), require_permission))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::sample_account;
    use axum::{body::Body, http::StatusCode, routing::get, Router};
    use tower::ServiceExt;

    fn app(allowed: &'static [AccountType], identity: Option<Identity>) -> Router {
        let mut router = Router::new().route("/", permitted(allowed, get(|| async { "handled" })));
        if let Some(identity) = identity {
            router = router.layer(axum::Extension(identity));
        }
        router
    }

    async fn status(app: Router) -> StatusCode {
        let request = Request::builder().uri("/").body(Body::empty()).unwrap();
        app.oneshot(request).await.unwrap().status()
    }

    #[tokio::test]
    async fn shopper_is_forbidden_from_other_roles_routes() {
        let shopper = Identity::user(sample_account(1, AccountType::Shopper));
        let allowed = &[AccountType::Marketier, AccountType::ProductOwner];
        assert_eq!(status(app(allowed, Some(shopper))).await, StatusCode::FORBIDDEN);
    }

    #[tokio::test]
    async fn listed_account_type_reaches_handler() {
        let shopper = Identity::user(sample_account(1, AccountType::Shopper));
        assert_eq!(status(app(&[AccountType::Shopper], Some(shopper))).await, StatusCode::OK);
    }

    #[tokio::test]
    async fn anonymous_is_forbidden() {
        let status = status(app(Permission::ANY_ACCOUNT.0, Some(Identity::Anonymous))).await;
        assert_eq!(status, StatusCode::FORBIDDEN);
    }

    #[tokio::test]
    async fn missing_identity_is_a_server_error() {
        assert_eq!(
            status(app(&[AccountType::Admin], None)).await,
            StatusCode::INTERNAL_SERVER_ERROR
        );
    }
}
