//! Book inventory endpoints

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    Json,
};

use crate::{
    error::AppResult,
    models::{
        book::{BookQuery, CreateBook, UpdateBook},
        Book,
    },
    AppState,
};

use super::AuthenticatedUser;

/// Search books across the caller's libraries
#[utoipa::path(
    get,
    path = "/books",
    tag = "books",
    security(("bearer_auth" = [])),
    params(BookQuery),
    responses(
        (status = 200, description = "Matching books", body = Vec<Book>),
        (status = 403, description = "Not a member of the requested library", body = crate::error::ErrorResponse)
    )
)]
pub async fn search_books(
    State(state): State<AppState>,
    user: AuthenticatedUser,
    Query(query): Query<BookQuery>,
) -> AppResult<Json<Vec<Book>>> {
    let books = state
        .services
        .inventory
        .search_books(&user.caller(), &query)
        .await?;
    Ok(Json(books))
}

/// Add a book to a library
#[utoipa::path(
    post,
    path = "/libraries/{library_id}/books",
    tag = "books",
    security(("bearer_auth" = [])),
    params(("library_id" = i32, Path, description = "Library ID")),
    request_body = CreateBook,
    responses(
        (status = 201, description = "Book added", body = Book),
        (status = 400, description = "Invalid input", body = crate::error::ErrorResponse),
        (status = 403, description = "Not an admin of this library", body = crate::error::ErrorResponse),
        (status = 409, description = "ISBN already in this library", body = crate::error::ErrorResponse)
    )
)]
pub async fn add_book(
    State(state): State<AppState>,
    user: AuthenticatedUser,
    Path(library_id): Path<i32>,
    Json(book): Json<CreateBook>,
) -> AppResult<(StatusCode, Json<Book>)> {
    let created = state
        .services
        .inventory
        .add_book(&user.caller(), library_id, book)
        .await?;
    Ok((StatusCode::CREATED, Json(created)))
}

/// Get a book
#[utoipa::path(
    get,
    path = "/libraries/{library_id}/books/{isbn}",
    tag = "books",
    security(("bearer_auth" = [])),
    params(
        ("library_id" = i32, Path, description = "Library ID"),
        ("isbn" = String, Path, description = "ISBN")
    ),
    responses(
        (status = 200, description = "Book", body = Book),
        (status = 403, description = "Not a member of this library", body = crate::error::ErrorResponse),
        (status = 404, description = "Book not found", body = crate::error::ErrorResponse)
    )
)]
pub async fn get_book(
    State(state): State<AppState>,
    user: AuthenticatedUser,
    Path((library_id, isbn)): Path<(i32, String)>,
) -> AppResult<Json<Book>> {
    let book = state
        .services
        .inventory
        .get_book(&user.caller(), library_id, &isbn)
        .await?;
    Ok(Json(book))
}

/// Update a book; a new total keeps copies on loan on loan
#[utoipa::path(
    put,
    path = "/libraries/{library_id}/books/{isbn}",
    tag = "books",
    security(("bearer_auth" = [])),
    params(
        ("library_id" = i32, Path, description = "Library ID"),
        ("isbn" = String, Path, description = "ISBN")
    ),
    request_body = UpdateBook,
    responses(
        (status = 200, description = "Book updated", body = Book),
        (status = 400, description = "Total below copies on loan", body = crate::error::ErrorResponse),
        (status = 403, description = "Not an admin of this library", body = crate::error::ErrorResponse),
        (status = 404, description = "Book not found", body = crate::error::ErrorResponse)
    )
)]
pub async fn update_book(
    State(state): State<AppState>,
    user: AuthenticatedUser,
    Path((library_id, isbn)): Path<(i32, String)>,
    Json(update): Json<UpdateBook>,
) -> AppResult<Json<Book>> {
    let book = state
        .services
        .inventory
        .update_book(&user.caller(), library_id, &isbn, update)
        .await?;
    Ok(Json(book))
}

/// Remove a book
#[utoipa::path(
    delete,
    path = "/libraries/{library_id}/books/{isbn}",
    tag = "books",
    security(("bearer_auth" = [])),
    params(
        ("library_id" = i32, Path, description = "Library ID"),
        ("isbn" = String, Path, description = "ISBN")
    ),
    responses(
        (status = 204, description = "Book removed"),
        (status = 403, description = "Not an admin of this library", body = crate::error::ErrorResponse),
        (status = 404, description = "Book not found", body = crate::error::ErrorResponse),
        (status = 409, description = "Copies still on loan", body = crate::error::ErrorResponse)
    )
)]
pub async fn remove_book(
    State(state): State<AppState>,
    user: AuthenticatedUser,
    Path((library_id, isbn)): Path<(i32, String)>,
) -> AppResult<StatusCode> {
    state
        .services
        .inventory
        .remove_book(&user.caller(), library_id, &isbn)
        .await?;
    Ok(StatusCode::NO_CONTENT)
}
