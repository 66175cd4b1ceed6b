//! OpenAPI documentation

use axum::Router;
use utoipa::{
    openapi::security::{HttpAuthScheme, HttpBuilder, SecurityScheme},
    Modify, OpenApi,
};
use utoipa_swagger_ui::SwaggerUi;

use crate::api::{auth, books, health, libraries, requests};

/// Registers the bearer JWT scheme referenced by `bearer_auth`
struct SecurityAddon;

impl Modify for SecurityAddon {
    fn modify(&self, openapi: &mut utoipa::openapi::OpenApi) {
        if let Some(components) = openapi.components.as_mut() {
            components.add_security_scheme(
                "bearer_auth",
                SecurityScheme::Http(
                    HttpBuilder::new()
                        .scheme(HttpAuthScheme::Bearer)
                        .bearer_format("JWT")
                        .build(),
                ),
            );
        }
    }
}

#[derive(OpenApi)]
#[openapi(
    info(
        title = "Libris API",
        version = "0.3.0",
        description = "Multi-library book lending REST API"
    ),
    servers(
        (url = "/api/v1", description = "API v1")
    ),
    paths(
        // Health
        health::health_check,
        health::readiness_check,
        // Accounts
        auth::register,
        auth::login,
        auth::me,
        auth::create_admin,
        auth::create_reader,
        // Libraries
        libraries::list_libraries,
        libraries::create_library,
        // Books
        books::search_books,
        books::add_book,
        books::get_book,
        books::update_book,
        books::remove_book,
        // Requests
        requests::list_pending,
        requests::list_mine,
        requests::submit_issue,
        requests::submit_return,
        requests::approve,
        requests::disapprove,
    ),
    components(
        schemas(
            // Accounts
            auth::LoginRequest,
            auth::LoginResponse,
            crate::models::user::Role,
            crate::models::user::User,
            crate::models::user::RegisterAccount,
            crate::models::user::RegisterMember,
            crate::models::user::UserWithLibraries,
            // Libraries
            crate::models::library::Library,
            crate::models::library::CreateLibrary,
            // Books
            crate::models::book::Book,
            crate::models::book::CreateBook,
            crate::models::book::UpdateBook,
            // Requests
            crate::models::request::RequestType,
            crate::models::request::RequestState,
            crate::models::request::RequestEvent,
            crate::models::request::IssueRequest,
            crate::models::request::ReturnRequest,
            // Health
            health::HealthResponse,
            // Errors
            crate::error::ErrorResponse,
        )
    ),
    modifiers(&SecurityAddon),
    tags(
        (name = "health", description = "Health check endpoints"),
        (name = "auth", description = "Registration and authentication"),
        (name = "users", description = "Admin and reader accounts"),
        (name = "libraries", description = "Library management"),
        (name = "books", description = "Book inventory"),
        (name = "requests", description = "Issue and return requests")
    )
)]
pub struct ApiDoc;

/// Create the OpenAPI documentation router
pub fn create_openapi_router() -> Router {
    Router::new()
        .merge(SwaggerUi::new("/swagger-ui").url("/api-docs/openapi.json", ApiDoc::openapi()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_lending_paths_documented() {
        let doc = ApiDoc::openapi();
        for path in [
            "/requests/issue",
            "/requests/return",
            "/requests/{id}/approve",
            "/requests/{id}/disapprove",
            "/libraries/{library_id}/books/{isbn}",
        ] {
            assert!(doc.paths.paths.contains_key(path), "missing {}", path);
        }
    }
}
