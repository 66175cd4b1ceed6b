//! Request ledger repository for database operations

use async_trait::async_trait;
use chrono::Utc;
use sqlx::PgConnection;

use super::{
    books::{book_not_found, lock_book, store_copies},
    is_unique_violation, PgStore,
};
use crate::{
    error::{AppError, AppResult, Conflict},
    models::{request::RequestEventRow, RequestEvent, RequestType},
    repository::RequestLedger,
};

const REQUEST_COLUMNS: &str = "id, book_id, library_id, reader_id, request_type, \
                               request_date, approval_date, approver_id";

fn request_not_found(id: i32) -> AppError {
    AppError::NotFound(format!("Request with id {} not found", id))
}

fn into_events(rows: Vec<RequestEventRow>) -> AppResult<Vec<RequestEvent>> {
    rows.into_iter().map(RequestEvent::try_from).collect()
}

async fn fetch_request(
    conn: &mut PgConnection,
    id: i32,
    for_update: bool,
) -> AppResult<Option<RequestEvent>> {
    let lock = if for_update { " FOR UPDATE" } else { "" };
    let row = sqlx::query_as::<_, RequestEventRow>(&format!(
        "SELECT {} FROM request_events WHERE id = $1 AND deleted_at IS NULL{}",
        REQUEST_COLUMNS, lock
    ))
    .bind(id)
    .fetch_optional(&mut *conn)
    .await?;

    row.map(RequestEvent::try_from).transpose()
}

async fn pending_exists(
    conn: &mut PgConnection,
    reader_id: i32,
    isbn: &str,
    library_id: i32,
    request_type: RequestType,
) -> AppResult<bool> {
    let exists: bool = sqlx::query_scalar(
        r#"
        SELECT EXISTS(
            SELECT 1 FROM request_events
            WHERE reader_id = $1 AND book_id = $2 AND library_id = $3
              AND request_type = $4
              AND approval_date IS NULL AND deleted_at IS NULL
        )
        "#,
    )
    .bind(reader_id)
    .bind(isbn)
    .bind(library_id)
    .bind(request_type.as_str())
    .fetch_one(&mut *conn)
    .await?;

    Ok(exists)
}

/// Approved issues minus approved returns for one reader and book
async fn outstanding_loans(
    conn: &mut PgConnection,
    reader_id: i32,
    isbn: &str,
    library_id: i32,
) -> AppResult<i64> {
    let count: i64 = sqlx::query_scalar(
        r#"
        SELECT COUNT(*) FILTER (WHERE request_type = 'issue')
             - COUNT(*) FILTER (WHERE request_type = 'return')
        FROM request_events
        WHERE reader_id = $1 AND book_id = $2 AND library_id = $3
          AND approval_date IS NOT NULL AND deleted_at IS NULL
        "#,
    )
    .bind(reader_id)
    .bind(isbn)
    .bind(library_id)
    .fetch_one(&mut *conn)
    .await?;

    Ok(count)
}

async fn insert_request(
    conn: &mut PgConnection,
    reader_id: i32,
    isbn: &str,
    library_id: i32,
    request_type: RequestType,
    approver_id: Option<i32>,
) -> AppResult<RequestEvent> {
    let now = Utc::now();
    let approval_date = approver_id.map(|_| now);

    let row = sqlx::query_as::<_, RequestEventRow>(&format!(
        "INSERT INTO request_events \
         (book_id, reader_id, library_id, request_type, request_date, approval_date, approver_id) \
         VALUES ($1, $2, $3, $4, $5, $6, $7) \
         RETURNING {}",
        REQUEST_COLUMNS
    ))
    .bind(isbn)
    .bind(reader_id)
    .bind(library_id)
    .bind(request_type.as_str())
    .bind(now)
    .bind(approval_date)
    .bind(approver_id)
    .fetch_one(&mut *conn)
    .await
    .map_err(|e| {
        if is_unique_violation(&e) {
            Conflict::DuplicatePending {
                isbn: isbn.to_string(),
                request_type: request_type.to_string(),
            }
            .into()
        } else {
            AppError::from(e)
        }
    })?;

    RequestEvent::try_from(row)
}

#[async_trait]
impl RequestLedger for PgStore {
    async fn get_request(&self, id: i32) -> AppResult<RequestEvent> {
        let mut conn = self.pool.acquire().await?;
        fetch_request(&mut conn, id, false)
            .await?
            .ok_or_else(|| request_not_found(id))
    }

    async fn list_pending(&self, library_ids: &[i32]) -> AppResult<Vec<RequestEvent>> {
        let rows = sqlx::query_as::<_, RequestEventRow>(&format!(
            "SELECT {} FROM request_events \
             WHERE library_id = ANY($1) AND approval_date IS NULL AND deleted_at IS NULL \
             ORDER BY request_date, id",
            REQUEST_COLUMNS
        ))
        .bind(library_ids)
        .fetch_all(&self.pool)
        .await?;

        into_events(rows)
    }

    async fn list_for_reader(&self, reader_id: i32) -> AppResult<Vec<RequestEvent>> {
        let rows = sqlx::query_as::<_, RequestEventRow>(&format!(
            "SELECT {} FROM request_events \
             WHERE reader_id = $1 AND deleted_at IS NULL \
             ORDER BY request_date DESC, id DESC",
            REQUEST_COLUMNS
        ))
        .bind(reader_id)
        .fetch_all(&self.pool)
        .await?;

        into_events(rows)
    }

    async fn create_issue_request(
        &self,
        reader_id: i32,
        isbn: &str,
        library_id: i32,
    ) -> AppResult<RequestEvent> {
        let mut tx = self.pool.begin().await?;

        let book = lock_book(&mut tx, isbn, library_id)
            .await?
            .ok_or_else(|| book_not_found(isbn, library_id))?;

        if book.available_copies <= 0 {
            return Err(Conflict::NoCopiesAvailable {
                isbn: isbn.to_string(),
            }
            .into());
        }

        if pending_exists(&mut tx, reader_id, isbn, library_id, RequestType::Issue).await? {
            return Err(Conflict::DuplicatePending {
                isbn: isbn.to_string(),
                request_type: RequestType::Issue.to_string(),
            }
            .into());
        }

        let request =
            insert_request(&mut tx, reader_id, isbn, library_id, RequestType::Issue, None).await?;

        tx.commit().await?;
        Ok(request)
    }

    async fn create_return_request(
        &self,
        reader_id: i32,
        isbn: &str,
        library_id: i32,
        approver_id: Option<i32>,
    ) -> AppResult<RequestEvent> {
        let mut tx = self.pool.begin().await?;

        let mut book = lock_book(&mut tx, isbn, library_id)
            .await?
            .ok_or_else(|| book_not_found(isbn, library_id))?;

        if outstanding_loans(&mut tx, reader_id, isbn, library_id).await? <= 0 {
            return Err(Conflict::NoOutstandingLoan {
                isbn: isbn.to_string(),
            }
            .into());
        }

        if pending_exists(&mut tx, reader_id, isbn, library_id, RequestType::Return).await? {
            return Err(Conflict::DuplicatePending {
                isbn: isbn.to_string(),
                request_type: RequestType::Return.to_string(),
            }
            .into());
        }

        if approver_id.is_some() {
            book.check_in()?;
            store_copies(&mut tx, &book).await?;
        }

        let request = insert_request(
            &mut tx,
            reader_id,
            isbn,
            library_id,
            RequestType::Return,
            approver_id,
        )
        .await?;

        tx.commit().await?;
        Ok(request)
    }

    async fn approve_request(&self, id: i32, approver_id: i32) -> AppResult<RequestEvent> {
        let mut tx = self.pool.begin().await?;

        // Book row first, then the request row
        let current = fetch_request(&mut tx, id, false)
            .await?
            .ok_or_else(|| request_not_found(id))?;

        let mut book = lock_book(&mut tx, &current.isbn, current.library_id)
            .await?
            .ok_or_else(|| book_not_found(&current.isbn, current.library_id))?;

        let mut request = fetch_request(&mut tx, id, true)
            .await?
            .ok_or_else(|| request_not_found(id))?;

        request.ensure_pending()?;
        match request.request_type {
            RequestType::Issue => book.check_out()?,
            RequestType::Return => book.check_in()?,
        }
        let approved_at = Utc::now();
        request.approve(approver_id, approved_at)?;

        store_copies(&mut tx, &book).await?;

        sqlx::query("UPDATE request_events SET approval_date = $1, approver_id = $2 WHERE id = $3")
            .bind(approved_at)
            .bind(approver_id)
            .bind(id)
            .execute(&mut *tx)
            .await?;

        tx.commit().await?;
        Ok(request)
    }

    async fn disapprove_request(&self, id: i32) -> AppResult<RequestEvent> {
        let mut tx = self.pool.begin().await?;

        let current = fetch_request(&mut tx, id, false)
            .await?
            .ok_or_else(|| request_not_found(id))?;

        // Keep the lock order even though no copies move
        lock_book(&mut tx, &current.isbn, current.library_id).await?;

        let request = fetch_request(&mut tx, id, true)
            .await?
            .ok_or_else(|| request_not_found(id))?;

        request.ensure_pending()?;

        sqlx::query("DELETE FROM request_events WHERE id = $1")
            .bind(id)
            .execute(&mut *tx)
            .await?;

        tx.commit().await?;
        Ok(request)
    }
}
