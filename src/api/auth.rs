//! Account endpoints: registration, login and user creation

use axum::{extract::State, http::StatusCode, Json};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

use crate::{
    error::AppResult,
    models::{
        user::{RegisterAccount, RegisterMember, UserWithLibraries},
        User,
    },
    AppState,
};

use super::AuthenticatedUser;

/// Login request
#[derive(Deserialize, ToSchema)]
pub struct LoginRequest {
    pub email: String,
    pub password: String,
}

/// Login response
#[derive(Serialize, ToSchema)]
pub struct LoginResponse {
    /// JWT access token
    pub token: String,
    /// Always `Bearer`
    pub token_type: String,
    pub user: User,
}

/// Register an owner account
#[utoipa::path(
    post,
    path = "/auth/register",
    tag = "auth",
    request_body = RegisterAccount,
    responses(
        (status = 201, description = "Owner registered", body = User),
        (status = 400, description = "Invalid input", body = crate::error::ErrorResponse),
        (status = 409, description = "Email already registered", body = crate::error::ErrorResponse)
    )
)]
pub async fn register(
    State(state): State<AppState>,
    Json(account): Json<RegisterAccount>,
) -> AppResult<(StatusCode, Json<User>)> {
    let user = state.services.users.register_owner(account).await?;
    Ok((StatusCode::CREATED, Json(user)))
}

/// Authenticate with email and password
#[utoipa::path(
    post,
    path = "/auth/login",
    tag = "auth",
    request_body = LoginRequest,
    responses(
        (status = 200, description = "Login successful", body = LoginResponse),
        (status = 401, description = "Invalid credentials", body = crate::error::ErrorResponse)
    )
)]
pub async fn login(
    State(state): State<AppState>,
    Json(request): Json<LoginRequest>,
) -> AppResult<Json<LoginResponse>> {
    let (token, user) = state
        .services
        .users
        .login(&request.email, &request.password)
        .await?;

    Ok(Json(LoginResponse {
        token,
        token_type: "Bearer".to_string(),
        user,
    }))
}

/// Current user and their libraries
#[utoipa::path(
    get,
    path = "/auth/me",
    tag = "auth",
    security(("bearer_auth" = [])),
    responses(
        (status = 200, description = "Current user", body = UserWithLibraries),
        (status = 401, description = "Not authenticated", body = crate::error::ErrorResponse)
    )
)]
pub async fn me(
    State(state): State<AppState>,
    user: AuthenticatedUser,
) -> AppResult<Json<UserWithLibraries>> {
    let profile = state.services.users.me(&user.caller()).await?;
    Ok(Json(profile))
}

/// Owner creates an admin
#[utoipa::path(
    post,
    path = "/users/admins",
    tag = "users",
    security(("bearer_auth" = [])),
    request_body = RegisterMember,
    responses(
        (status = 201, description = "Admin created", body = UserWithLibraries),
        (status = 400, description = "Invalid input", body = crate::error::ErrorResponse),
        (status = 403, description = "Only an owner can create an admin", body = crate::error::ErrorResponse),
        (status = 404, description = "Library not found", body = crate::error::ErrorResponse),
        (status = 409, description = "Email already registered", body = crate::error::ErrorResponse)
    )
)]
pub async fn create_admin(
    State(state): State<AppState>,
    user: AuthenticatedUser,
    Json(member): Json<RegisterMember>,
) -> AppResult<(StatusCode, Json<UserWithLibraries>)> {
    let created = state
        .services
        .users
        .register_admin(&user.caller(), member)
        .await?;
    Ok((StatusCode::CREATED, Json(created)))
}

/// Admin creates a reader
#[utoipa::path(
    post,
    path = "/users/readers",
    tag = "users",
    security(("bearer_auth" = [])),
    request_body = RegisterMember,
    responses(
        (status = 201, description = "Reader created", body = UserWithLibraries),
        (status = 400, description = "Invalid input", body = crate::error::ErrorResponse),
        (status = 403, description = "Only admins can create users", body = crate::error::ErrorResponse),
        (status = 409, description = "Email already registered", body = crate::error::ErrorResponse)
    )
)]
pub async fn create_reader(
    State(state): State<AppState>,
    user: AuthenticatedUser,
    Json(member): Json<RegisterMember>,
) -> AppResult<(StatusCode, Json<UserWithLibraries>)> {
    let created = state
        .services
        .users
        .register_reader(&user.caller(), member)
        .await?;
    Ok((StatusCode::CREATED, Json(created)))
}
