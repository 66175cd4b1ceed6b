//! Issue and return request endpoints

use axum::{
    extract::{Path, State},
    http::StatusCode,
    Json,
};

use crate::{
    error::AppResult,
    models::{
        request::{IssueRequest, ReturnRequest},
        RequestEvent, ReturnTarget,
    },
    AppState,
};

use super::AuthenticatedUser;

/// Pending requests of the caller's libraries, oldest first
#[utoipa::path(
    get,
    path = "/requests",
    tag = "requests",
    security(("bearer_auth" = [])),
    responses(
        (status = 200, description = "Pending requests", body = Vec<RequestEvent>),
        (status = 403, description = "Only admins can review requests", body = crate::error::ErrorResponse)
    )
)]
pub async fn list_pending(
    State(state): State<AppState>,
    user: AuthenticatedUser,
) -> AppResult<Json<Vec<RequestEvent>>> {
    let pending = state
        .services
        .lending
        .list_pending_requests(&user.caller())
        .await?;
    Ok(Json(pending))
}

/// The caller's own requests
#[utoipa::path(
    get,
    path = "/requests/mine",
    tag = "requests",
    security(("bearer_auth" = [])),
    responses(
        (status = 200, description = "Requests, newest first", body = Vec<RequestEvent>)
    )
)]
pub async fn list_mine(
    State(state): State<AppState>,
    user: AuthenticatedUser,
) -> AppResult<Json<Vec<RequestEvent>>> {
    let requests = state
        .services
        .lending
        .list_my_requests(&user.caller())
        .await?;
    Ok(Json(requests))
}

/// Ask to borrow a book
#[utoipa::path(
    post,
    path = "/requests/issue",
    tag = "requests",
    security(("bearer_auth" = [])),
    request_body = IssueRequest,
    responses(
        (status = 201, description = "Request created", body = RequestEvent),
        (status = 403, description = "Not a reader of this library", body = crate::error::ErrorResponse),
        (status = 404, description = "Book not found", body = crate::error::ErrorResponse),
        (status = 409, description = "No copies available, or already requested", body = crate::error::ErrorResponse)
    )
)]
pub async fn submit_issue(
    State(state): State<AppState>,
    user: AuthenticatedUser,
    Json(request): Json<IssueRequest>,
) -> AppResult<(StatusCode, Json<RequestEvent>)> {
    let event = state
        .services
        .lending
        .submit_issue_request(&user.caller(), request)
        .await?;
    Ok((StatusCode::CREATED, Json(event)))
}

/// Return a borrowed book
#[utoipa::path(
    post,
    path = "/requests/return",
    tag = "requests",
    security(("bearer_auth" = [])),
    request_body = ReturnRequest,
    responses(
        (status = 201, description = "Return recorded", body = RequestEvent),
        (status = 400, description = "Invalid return target", body = crate::error::ErrorResponse),
        (status = 403, description = "Not allowed to return this loan", body = crate::error::ErrorResponse),
        (status = 409, description = "No outstanding loan, or already requested", body = crate::error::ErrorResponse)
    )
)]
pub async fn submit_return(
    State(state): State<AppState>,
    user: AuthenticatedUser,
    Json(body): Json<ReturnRequest>,
) -> AppResult<(StatusCode, Json<RequestEvent>)> {
    let target = ReturnTarget::try_from(body)?;
    let event = state
        .services
        .lending
        .submit_return(&user.caller(), target)
        .await?;
    Ok((StatusCode::CREATED, Json(event)))
}

/// Approve a pending request
#[utoipa::path(
    put,
    path = "/requests/{id}/approve",
    tag = "requests",
    security(("bearer_auth" = [])),
    params(("id" = i32, Path, description = "Request ID")),
    responses(
        (status = 200, description = "Request approved", body = RequestEvent),
        (status = 403, description = "Not an admin of this library", body = crate::error::ErrorResponse),
        (status = 404, description = "Request not found", body = crate::error::ErrorResponse),
        (status = 409, description = "Already approved, or no copies available", body = crate::error::ErrorResponse)
    )
)]
pub async fn approve(
    State(state): State<AppState>,
    user: AuthenticatedUser,
    Path(id): Path<i32>,
) -> AppResult<Json<RequestEvent>> {
    let event = state
        .services
        .lending
        .approve_request(&user.caller(), id)
        .await?;
    Ok(Json(event))
}

/// Disapprove a pending request
#[utoipa::path(
    delete,
    path = "/requests/{id}/disapprove",
    tag = "requests",
    security(("bearer_auth" = [])),
    params(("id" = i32, Path, description = "Request ID")),
    responses(
        (status = 204, description = "Request removed"),
        (status = 403, description = "Not an admin of this library", body = crate::error::ErrorResponse),
        (status = 404, description = "Request not found", body = crate::error::ErrorResponse),
        (status = 409, description = "Request already approved", body = crate::error::ErrorResponse)
    )
)]
pub async fn disapprove(
    State(state): State<AppState>,
    user: AuthenticatedUser,
    Path(id): Path<i32>,
) -> AppResult<StatusCode> {
    state
        .services
        .lending
        .disapprove_request(&user.caller(), id)
        .await?;
    Ok(StatusCode::NO_CONTENT)
}
