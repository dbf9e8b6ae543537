// routes.rs - shared application state and the /v1 routing table
//
// Request pipeline: trace -> panic recovery -> cors -> rate limit
// -> authenticate -> json 405 -> route -> permission -> handler.

use axum::{
    extract::{DefaultBodyLimit, Request},
    http::{header, HeaderValue, Method, StatusCode},
    middleware::{from_fn, from_fn_with_state, Next},
    response::{IntoResponse, Response},
    routing::{get, patch, post, put},
    Router,
};
use std::any::Any;
use std::sync::Arc;
use tower_http::{
    catch_panic::CatchPanicLayer,
    cors::{Any as AnyOrigin, CorsLayer},
    trace::TraceLayer,
};

use crate::auth::AccountType::{self, Admin, Marketier, ProductOwner, Shopper};
use crate::background::{panic_message, BackgroundTasks};
use crate::config::{AppConfig, SecurityConfig};
use crate::database::{models::Models, Database};
use crate::error::ApiError;
use crate::handlers::{contacts, health, marketiers, product_owners, products, proposals, reviews, tokens, users};
use crate::mailer::Mailer;
use crate::middleware::{authenticate, permitted, rate_limit, Permission, RateLimiter};

const ANY_ACCOUNT: &[AccountType] = Permission::ANY_ACCOUNT.0;
const ADMINS: &[AccountType] = &[Admin];
const SHOPPERS: &[AccountType] = &[Shopper, Admin];
const MARKETIERS: &[AccountType] = &[Marketier, Admin];
const PRODUCT_OWNERS: &[AccountType] = &[ProductOwner, Admin];

/// Everything a handler can reach
#[derive(Clone)]
pub struct AppState {
    pub config: Arc<AppConfig>,
    pub db: Database,
    pub models: Models,
    pub limiter: Arc<RateLimiter>,
    pub background: BackgroundTasks,
    pub mailer: Arc<dyn Mailer>,
}

impl AppState {
    pub fn new(config: AppConfig, db: Database, mailer: Arc<dyn Mailer>) -> Self {
        let models = Models::new(db.clone());
        let limiter = Arc::new(RateLimiter::new(&config.limiter));
        Self {
            config: Arc::new(config),
            db,
            models,
            limiter,
            background: BackgroundTasks::new(),
            mailer,
        }
    }
}

pub fn app(state: AppState) -> Router {
    let mut router = Router::new()
        .merge(user_routes())
        .merge(token_routes())
        .merge(resource_routes())
        .route("/v1/healthcheck", get(health::healthcheck))
        .fallback(|| async { ApiError::not_found() })
        .layer(from_fn(json_method_not_allowed))
        .layer(from_fn_with_state(state.models.tokens.clone(), authenticate))
        .layer(DefaultBodyLimit::max(state.config.server.max_request_size_bytes));

    if state.config.limiter.enabled {
        router = router.layer(from_fn_with_state(state.limiter.clone(), rate_limit));
    }
    if state.config.security.enable_cors {
        router = router.layer(cors_layer(&state.config.security));
    }

    router
        .layer(CatchPanicLayer::custom(recover_panic))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

/// Replace axum's empty 405 body with the JSON error shape, keeping `Allow`.
async fn json_method_not_allowed(request: Request, next: Next) -> Response {
    let method = request.method().clone();
    let response = next.run(request).await;
    if response.status() != StatusCode::METHOD_NOT_ALLOWED {
        return response;
    }

    let allow = response.headers().get(header::ALLOW).cloned();
    let mut response = ApiError::method_not_allowed(&method).into_response();
    if let Some(allow) = allow {
        response.headers_mut().insert(header::ALLOW, allow);
    }
    response
}

/// A panicking handler becomes a logged 500 and the connection is closed.
fn recover_panic(panic: Box<dyn Any + Send + 'static>) -> Response {
    let mut response =
        ApiError::internal(format!("request handler panicked: {}", panic_message(&*panic))).into_response();
    response
        .headers_mut()
        .insert(header::CONNECTION, HeaderValue::from_static("close"));
    response
}

fn user_routes() -> Router<AppState> {
    Router::new()
        .route("/v1/users/shoppers", post(users::register_shopper))
        .route(
            "/v1/users/shoppers/:id",
            permitted(PRODUCT_OWNERS, get(users::show_shopper))
                .merge(permitted(SHOPPERS, patch(users::update_shopper).delete(users::delete_shopper))),
        )
        .route("/v1/users/marketiers", post(marketiers::register_marketier))
        .route(
            "/v1/users/marketiers/:id",
            permitted(ANY_ACCOUNT, get(marketiers::show_marketier))
                .merge(permitted(MARKETIERS, patch(marketiers::update_marketier))),
        )
        .route("/v1/users/product_owners", post(product_owners::register_product_owner))
        .route(
            "/v1/users/product_owners/:id",
            permitted(ANY_ACCOUNT, get(product_owners::show_product_owner))
                .merge(permitted(PRODUCT_OWNERS, patch(product_owners::update_product_owner))),
        )
        .route("/v1/users/activated", put(users::activate_user))
        .route("/v1/users/password", put(users::update_password))
}

fn token_routes() -> Router<AppState> {
    Router::new()
        .route("/v1/tokens/authentication", post(tokens::create_authentication_token))
        .route("/v1/tokens/activation", post(tokens::create_activation_token))
        .route("/v1/tokens/password-reset", post(tokens::create_password_reset_token))
}

fn resource_routes() -> Router<AppState> {
    Router::new()
        .route("/v1/products", permitted(PRODUCT_OWNERS, post(products::create_product)))
        .route(
            "/v1/products/:id",
            permitted(ANY_ACCOUNT, get(products::show_product)).merge(permitted(
                PRODUCT_OWNERS,
                patch(products::update_product).delete(products::delete_product),
            )),
        )
        .route("/v1/proposals", permitted(MARKETIERS, post(proposals::create_proposal)))
        .route(
            "/v1/proposals/:id",
            permitted(ANY_ACCOUNT, get(proposals::show_proposal)).merge(permitted(
                MARKETIERS,
                patch(proposals::update_proposal).delete(proposals::delete_proposal),
            )),
        )
        .route("/v1/reviews", permitted(SHOPPERS, post(reviews::create_review)))
        .route(
            "/v1/reviews/:id",
            permitted(ANY_ACCOUNT, get(reviews::show_review)).merge(permitted(
                SHOPPERS,
                patch(reviews::update_review).delete(reviews::delete_review),
            )),
        )
        .route("/v1/contacts", permitted(ANY_ACCOUNT, post(contacts::create_contact)))
        .route(
            "/v1/contacts/:id",
            permitted(
                ADMINS,
                get(contacts::show_contact)
                    .patch(contacts::update_contact)
                    .delete(contacts::delete_contact),
            ),
        )
}

/// Listed origins only; no list means any origin.
fn cors_layer(security: &SecurityConfig) -> CorsLayer {
    let origins: Vec<HeaderValue> = security
        .cors_origins
        .iter()
        .filter(|origin| origin.as_str() != "*")
        .filter_map(|origin| origin.parse().ok())
        .collect();

    let layer = CorsLayer::new()
        .allow_methods([Method::GET, Method::POST, Method::PUT, Method::PATCH, Method::DELETE])
        .allow_headers([header::AUTHORIZATION, header::CONTENT_TYPE]);

    if origins.is_empty() {
        layer.allow_origin(AnyOrigin)
    } else {
        layer.allow_origin(origins)
    }
}
