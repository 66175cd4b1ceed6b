//! Lending workflow: issue requests, approvals and returns

use validator::Validate;

use crate::{
    error::{AppError, AppResult, Conflict},
    models::{
        book::normalize_isbn, request::IssueRequest, Action, Caller, RequestEvent, RequestType,
        ReturnTarget, Role,
    },
    repository::Repository,
    services::membership::MembershipService,
};

#[derive(Clone)]
pub struct LendingService {
    repository: Repository,
    membership: MembershipService,
}

/// Log rejected capacity checks before handing the error back
fn note_capacity(err: AppError, isbn: &str, library_id: i32) -> AppError {
    if let AppError::Conflict(Conflict::NoCopiesAvailable { .. } | Conflict::OverCapacity { .. }) =
        &err
    {
        tracing::warn!(isbn = %isbn, library_id, "Capacity check failed: {}", err);
    }
    err
}

impl LendingService {
    pub fn new(repository: Repository, membership: MembershipService) -> Self {
        Self {
            repository,
            membership,
        }
    }

    /// Ask to borrow a book; availability is only checked, not reserved
    pub async fn submit_issue_request(
        &self,
        caller: &Caller,
        request: IssueRequest,
    ) -> AppResult<RequestEvent> {
        caller.require(Action::BorrowBooks)?;
        request.validate()?;
        // membership first, so non-members learn nothing about the catalog
        self.membership
            .require_member(caller, request.library_id)
            .await?;
        let isbn = normalize_isbn(&request.isbn)?;

        let event = self
            .repository
            .create_issue_request(caller.user_id, &isbn, request.library_id)
            .await
            .map_err(|e| note_capacity(e, &isbn, request.library_id))?;

        tracing::info!(
            request_id = event.id,
            isbn = %event.isbn,
            library_id = event.library_id,
            reader_id = event.reader_id,
            "Issue request submitted"
        );
        Ok(event)
    }

    /// Approve a pending request and move the copy in the same unit
    pub async fn approve_request(&self, caller: &Caller, request_id: i32) -> AppResult<RequestEvent> {
        caller.require(Action::ReviewRequests)?;
        let current = self.repository.get_request(request_id).await?;
        self.membership
            .require_manager(caller, current.library_id)
            .await?;

        let event = self
            .repository
            .approve_request(request_id, caller.user_id)
            .await
            .map_err(|e| note_capacity(e, &current.isbn, current.library_id))?;

        tracing::info!(
            request_id = event.id,
            request_type = %event.request_type,
            isbn = %event.isbn,
            library_id = event.library_id,
            reader_id = event.reader_id,
            approver_id = caller.user_id,
            "Request approved"
        );
        Ok(event)
    }

    /// Drop a pending request; inventory is untouched
    pub async fn disapprove_request(&self, caller: &Caller, request_id: i32) -> AppResult<()> {
        caller.require(Action::ReviewRequests)?;
        let current = self.repository.get_request(request_id).await?;
        self.membership
            .require_manager(caller, current.library_id)
            .await?;

        let removed = self.repository.disapprove_request(request_id).await?;

        tracing::info!(
            request_id = removed.id,
            request_type = %removed.request_type,
            isbn = %removed.isbn,
            library_id = removed.library_id,
            reader_id = removed.reader_id,
            approver_id = caller.user_id,
            "Request disapproved"
        );
        Ok(())
    }

    /// Return a borrowed copy.
    ///
    /// A reader's return waits for approval. An admin returning on behalf of
    /// a reader, by issue request id, is approved on the spot.
    pub async fn submit_return(
        &self,
        caller: &Caller,
        target: ReturnTarget,
    ) -> AppResult<RequestEvent> {
        caller.require(Action::ReturnBooks)?;

        let (reader_id, isbn, library_id, approver_id) = match target {
            ReturnTarget::Request(id) => {
                let issued = self.repository.get_request(id).await?;
                if issued.request_type != RequestType::Issue || issued.is_pending() {
                    return Err(AppError::Validation(format!(
                        "Request {} is not an approved issue request",
                        id
                    )));
                }

                if caller.role == Role::Admin {
                    self.membership
                        .require_manager(caller, issued.library_id)
                        .await?;
                    (issued.reader_id, issued.isbn, issued.library_id, Some(caller.user_id))
                } else {
                    if issued.reader_id != caller.user_id {
                        return Err(AppError::Authorization(
                            "Readers can only return their own loans".to_string(),
                        ));
                    }
                    self.membership
                        .require_member(caller, issued.library_id)
                        .await?;
                    (caller.user_id, issued.isbn, issued.library_id, None)
                }
            }
            ReturnTarget::Book { isbn, library_id } => {
                if caller.role != Role::Reader {
                    return Err(AppError::Validation(
                        "Returns on behalf of a reader need the issue request id".to_string(),
                    ));
                }
                self.membership.require_member(caller, library_id).await?;
                (caller.user_id, normalize_isbn(&isbn)?, library_id, None)
            }
        };

        let event = self
            .repository
            .create_return_request(reader_id, &isbn, library_id, approver_id)
            .await
            .map_err(|e| note_capacity(e, &isbn, library_id))?;

        tracing::info!(
            request_id = event.id,
            isbn = %event.isbn,
            library_id = event.library_id,
            reader_id = event.reader_id,
            approver_id = ?approver_id,
            pending = event.is_pending(),
            "Return submitted"
        );
        Ok(event)
    }

    /// Pending requests of every library the caller administers, oldest first
    pub async fn list_pending_requests(&self, caller: &Caller) -> AppResult<Vec<RequestEvent>> {
        caller.require(Action::ReviewRequests)?;
        let library_ids = self.membership.libraries_of(caller.user_id).await?;
        if library_ids.is_empty() {
            return Ok(Vec::new());
        }
        self.repository.list_pending(&library_ids).await
    }

    /// The caller's own requests, newest first
    pub async fn list_my_requests(&self, caller: &Caller) -> AppResult<Vec<RequestEvent>> {
        self.repository.list_for_reader(caller.user_id).await
    }
}
