//! Book inventory service

use validator::Validate;

use crate::{
    error::{AppError, AppResult},
    models::{
        book::{normalize_isbn, BookQuery, CreateBook, UpdateBook},
        Action, Book, Caller,
    },
    repository::Repository,
    services::membership::MembershipService,
};

#[derive(Clone)]
pub struct InventoryService {
    repository: Repository,
    membership: MembershipService,
}

impl InventoryService {
    pub fn new(repository: Repository, membership: MembershipService) -> Self {
        Self {
            repository,
            membership,
        }
    }

    /// Add a book to a library the caller administers
    pub async fn add_book(
        &self,
        caller: &Caller,
        library_id: i32,
        mut book: CreateBook,
    ) -> AppResult<Book> {
        caller.require(Action::ManageBooks)?;
        self.membership.require_manager(caller, library_id).await?;
        book.validate()?;
        book.isbn = normalize_isbn(&book.isbn)?;

        let created = self.repository.create_book(library_id, &book).await?;
        tracing::info!(
            isbn = %created.isbn,
            library_id,
            total_copies = created.total_copies,
            "Book added"
        );
        Ok(created)
    }

    pub async fn update_book(
        &self,
        caller: &Caller,
        library_id: i32,
        isbn: &str,
        update: UpdateBook,
    ) -> AppResult<Book> {
        caller.require(Action::ManageBooks)?;
        self.membership.require_manager(caller, library_id).await?;
        update.validate()?;
        let isbn = normalize_isbn(isbn)?;

        let book = self.repository.update_book(&isbn, library_id, &update).await?;
        tracing::info!(
            isbn = %book.isbn,
            library_id,
            total_copies = book.total_copies,
            available_copies = book.available_copies,
            "Book updated"
        );
        Ok(book)
    }

    /// Soft-delete a book once every copy is back, withdrawing its pending requests
    pub async fn remove_book(&self, caller: &Caller, library_id: i32, isbn: &str) -> AppResult<()> {
        caller.require(Action::ManageBooks)?;
        self.membership.require_manager(caller, library_id).await?;
        let isbn = normalize_isbn(isbn)?;

        let withdrawn = self.repository.delete_book(&isbn, library_id).await?;
        tracing::info!(isbn = %isbn, library_id, withdrawn, "Book removed");
        Ok(())
    }

    pub async fn get_book(&self, caller: &Caller, library_id: i32, isbn: &str) -> AppResult<Book> {
        caller.require(Action::SearchBooks)?;
        self.membership.require_member(caller, library_id).await?;
        let isbn = normalize_isbn(isbn)?;
        self.repository.get_book(&isbn, library_id).await
    }

    /// Search the libraries the caller belongs to
    pub async fn search_books(&self, caller: &Caller, query: &BookQuery) -> AppResult<Vec<Book>> {
        caller.require(Action::SearchBooks)?;
        let library_ids = self.membership.libraries_of(caller.user_id).await?;

        if let Some(library_id) = query.library_id {
            if !library_ids.contains(&library_id) {
                return Err(AppError::Authorization(format!(
                    "Not a member of library {}",
                    library_id
                )));
            }
        }
        if library_ids.is_empty() {
            return Ok(Vec::new());
        }

        self.repository.search_books(&library_ids, query).await
    }
}
