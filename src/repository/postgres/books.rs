//! Books repository for database operations

use async_trait::async_trait;
use chrono::Utc;
use sqlx::PgConnection;

use super::{is_unique_violation, PgStore};
use crate::{
    error::{AppError, AppResult, Conflict},
    models::{
        book::{BookQuery, CreateBook, UpdateBook},
        Book,
    },
    repository::InventoryStore,
};

const BOOK_COLUMNS: &str = "isbn, library_id, title, authors, publisher, version, \
                            total_copies, available_copies, created_at, updated_at";

pub(super) fn book_not_found(isbn: &str, library_id: i32) -> AppError {
    AppError::NotFound(format!(
        "Book with ISBN {} not found in library {}",
        isbn, library_id
    ))
}

/// Lock the live row of a book for the rest of the transaction
pub(super) async fn lock_book(
    conn: &mut PgConnection,
    isbn: &str,
    library_id: i32,
) -> AppResult<Option<Book>> {
    let book = sqlx::query_as::<_, Book>(&format!(
        "SELECT {} FROM books \
         WHERE isbn = $1 AND library_id = $2 AND deleted_at IS NULL \
         FOR UPDATE",
        BOOK_COLUMNS
    ))
    .bind(isbn)
    .bind(library_id)
    .fetch_optional(&mut *conn)
    .await?;

    Ok(book)
}

/// Persist the copy counts of a locked book
pub(super) async fn store_copies(conn: &mut PgConnection, book: &Book) -> AppResult<()> {
    sqlx::query(
        r#"
        UPDATE books
        SET total_copies = $1, available_copies = $2, updated_at = $3
        WHERE isbn = $4 AND library_id = $5 AND deleted_at IS NULL
        "#,
    )
    .bind(book.total_copies)
    .bind(book.available_copies)
    .bind(Utc::now())
    .bind(&book.isbn)
    .bind(book.library_id)
    .execute(&mut *conn)
    .await?;

    Ok(())
}

#[async_trait]
impl InventoryStore for PgStore {
    async fn create_book(&self, library_id: i32, book: &CreateBook) -> AppResult<Book> {
        let duplicate = || Conflict::DuplicateIsbn {
            isbn: book.isbn.clone(),
            library_id,
        };

        let exists: bool = sqlx::query_scalar(
            r#"
            SELECT EXISTS(
                SELECT 1 FROM books
                WHERE isbn = $1 AND library_id = $2 AND deleted_at IS NULL
            )
            "#,
        )
        .bind(&book.isbn)
        .bind(library_id)
        .fetch_one(&self.pool)
        .await?;

        if exists {
            return Err(duplicate().into());
        }

        sqlx::query_as::<_, Book>(&format!(
            "INSERT INTO books \
             (isbn, library_id, title, authors, publisher, version, total_copies, available_copies) \
             VALUES ($1, $2, $3, $4, $5, $6, $7, $7) \
             RETURNING {}",
            BOOK_COLUMNS
        ))
        .bind(&book.isbn)
        .bind(library_id)
        .bind(&book.title)
        .bind(&book.authors)
        .bind(&book.publisher)
        .bind(&book.version)
        .bind(book.total_copies)
        .fetch_one(&self.pool)
        .await
        .map_err(|e| {
            // lost a race with a concurrent insert of the same ISBN
            if is_unique_violation(&e) {
                duplicate().into()
            } else {
                AppError::from(e)
            }
        })
    }

    async fn get_book(&self, isbn: &str, library_id: i32) -> AppResult<Book> {
        sqlx::query_as::<_, Book>(&format!(
            "SELECT {} FROM books WHERE isbn = $1 AND library_id = $2 AND deleted_at IS NULL",
            BOOK_COLUMNS
        ))
        .bind(isbn)
        .bind(library_id)
        .fetch_optional(&self.pool)
        .await?
        .ok_or_else(|| book_not_found(isbn, library_id))
    }

    async fn search_books(&self, library_ids: &[i32], query: &BookQuery) -> AppResult<Vec<Book>> {
        let books = sqlx::query_as::<_, Book>(&format!(
            "SELECT {} FROM books \
             WHERE library_id = ANY($1) AND deleted_at IS NULL \
               AND ($2::int IS NULL OR library_id = $2) \
               AND ($3::text IS NULL OR title ILIKE '%' || $3 || '%') \
               AND ($4::text IS NULL OR authors ILIKE '%' || $4 || '%') \
               AND ($5::text IS NULL OR publisher ILIKE '%' || $5 || '%') \
             ORDER BY title, isbn",
            BOOK_COLUMNS
        ))
        .bind(library_ids)
        .bind(query.library_id)
        .bind(&query.title)
        .bind(&query.author)
        .bind(&query.publisher)
        .fetch_all(&self.pool)
        .await?;

        Ok(books)
    }

    async fn update_book(
        &self,
        isbn: &str,
        library_id: i32,
        update: &UpdateBook,
    ) -> AppResult<Book> {
        let mut tx = self.pool.begin().await?;

        let mut book = lock_book(&mut tx, isbn, library_id)
            .await?
            .ok_or_else(|| book_not_found(isbn, library_id))?;

        book.apply_update(update)?;
        book.updated_at = Utc::now();

        sqlx::query(
            r#"
            UPDATE books
            SET title = $1, authors = $2, publisher = $3, version = $4,
                total_copies = $5, available_copies = $6, updated_at = $7
            WHERE isbn = $8 AND library_id = $9 AND deleted_at IS NULL
            "#,
        )
        .bind(&book.title)
        .bind(&book.authors)
        .bind(&book.publisher)
        .bind(&book.version)
        .bind(book.total_copies)
        .bind(book.available_copies)
        .bind(book.updated_at)
        .bind(isbn)
        .bind(library_id)
        .execute(&mut *tx)
        .await?;

        tx.commit().await?;
        Ok(book)
    }

    async fn delete_book(&self, isbn: &str, library_id: i32) -> AppResult<u64> {
        let mut tx = self.pool.begin().await?;

        let book = lock_book(&mut tx, isbn, library_id)
            .await?
            .ok_or_else(|| book_not_found(isbn, library_id))?;

        book.ensure_removable()?;

        sqlx::query(
            r#"
            UPDATE books SET deleted_at = $1
            WHERE isbn = $2 AND library_id = $3 AND deleted_at IS NULL
            "#,
        )
        .bind(Utc::now())
        .bind(isbn)
        .bind(library_id)
        .execute(&mut *tx)
        .await?;

        let withdrawn = sqlx::query(
            r#"
            DELETE FROM request_events
            WHERE book_id = $1 AND library_id = $2
              AND approval_date IS NULL AND deleted_at IS NULL
            "#,
        )
        .bind(isbn)
        .bind(library_id)
        .execute(&mut *tx)
        .await?
        .rows_affected();

        tx.commit().await?;
        Ok(withdrawn)
    }
}
