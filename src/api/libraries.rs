//! Library endpoints

use axum::{extract::State, http::StatusCode, Json};

use crate::{
    error::AppResult,
    models::{library::CreateLibrary, Library},
    AppState,
};

use super::AuthenticatedUser;

/// List libraries
#[utoipa::path(
    get,
    path = "/libraries",
    tag = "libraries",
    security(("bearer_auth" = [])),
    responses(
        (status = 200, description = "All libraries", body = Vec<Library>),
        (status = 401, description = "Not authenticated", body = crate::error::ErrorResponse)
    )
)]
pub async fn list_libraries(
    State(state): State<AppState>,
    user: AuthenticatedUser,
) -> AppResult<Json<Vec<Library>>> {
    let libraries = state.services.libraries.list(&user.caller()).await?;
    Ok(Json(libraries))
}

/// Create a library
#[utoipa::path(
    post,
    path = "/libraries",
    tag = "libraries",
    security(("bearer_auth" = [])),
    request_body = CreateLibrary,
    responses(
        (status = 201, description = "Library created", body = Library),
        (status = 400, description = "Invalid input", body = crate::error::ErrorResponse),
        (status = 403, description = "Only an owner can create a library", body = crate::error::ErrorResponse)
    )
)]
pub async fn create_library(
    State(state): State<AppState>,
    user: AuthenticatedUser,
    Json(library): Json<CreateLibrary>,
) -> AppResult<(StatusCode, Json<Library>)> {
    let created = state
        .services
        .libraries
        .create(&user.caller(), library)
        .await?;
    Ok((StatusCode::CREATED, Json(created)))
}
