//! API handlers for the Libris REST endpoints

pub mod auth;
pub mod books;
pub mod health;
pub mod libraries;
pub mod openapi;
pub mod requests;

use axum::{
    async_trait,
    extract::FromRequestParts,
    http::{header::AUTHORIZATION, request::Parts},
    routing::{get, post, put},
    Router,
};
use tower_http::{
    cors::{Any, CorsLayer},
    trace::TraceLayer,
};

use crate::{
    error::AppError,
    models::{user::UserClaims, Caller},
    AppState,
};

/// Extractor for authenticated user from JWT token
pub struct AuthenticatedUser(pub UserClaims);

impl AuthenticatedUser {
    pub fn caller(&self) -> Caller {
        self.0.caller()
    }
}

#[async_trait]
impl FromRequestParts<AppState> for AuthenticatedUser {
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, state: &AppState) -> Result<Self, Self::Rejection> {
        let auth_header = parts
            .headers
            .get(AUTHORIZATION)
            .and_then(|value| value.to_str().ok())
            .ok_or_else(|| AppError::Authentication("Missing authorization header".to_string()))?;

        let token = auth_header
            .strip_prefix("Bearer ")
            .ok_or_else(|| AppError::Authentication("Invalid authorization header format".to_string()))?;

        let claims = UserClaims::from_token(token, &state.config.auth.jwt_secret)
            .map_err(|e| AppError::Authentication(e.to_string()))?;

        Ok(AuthenticatedUser(claims))
    }
}

/// Create the application router with all routes
pub fn create_router(state: AppState) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    let api_v1 = Router::new()
        // Health check
        .route("/health", get(health::health_check))
        .route("/ready", get(health::readiness_check))
        // Accounts
        .route("/auth/register", post(auth::register))
        .route("/auth/login", post(auth::login))
        .route("/auth/me", get(auth::me))
        .route("/users/admins", post(auth::create_admin))
        .route("/users/readers", post(auth::create_reader))
        // Libraries and inventory
        .route(
            "/libraries",
            get(libraries::list_libraries).post(libraries::create_library),
        )
        .route("/libraries/:library_id/books", post(books::add_book))
        .route(
            "/libraries/:library_id/books/:isbn",
            get(books::get_book)
                .put(books::update_book)
                .delete(books::remove_book),
        )
        .route("/books", get(books::search_books))
        // Lending
        .route("/requests", get(requests::list_pending))
        .route("/requests/mine", get(requests::list_mine))
        .route("/requests/issue", post(requests::submit_issue))
        .route("/requests/return", post(requests::submit_return))
        .route("/requests/:id/approve", put(requests::approve))
        .route(
            "/requests/:id/disapprove",
            axum::routing::delete(requests::disapprove),
        )
        .with_state(state);

    Router::new()
        .nest("/api/v1", api_v1)
        .merge(openapi::create_openapi_router())
        .layer(TraceLayer::new_for_http())
        .layer(cors)
}
