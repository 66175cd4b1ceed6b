//! Repository layer: the store interfaces behind the lending core.
//!
//! Every method is one unit of work. Methods that move copies or change a
//! request's state run as a single transaction (PostgreSQL) or a single
//! critical section (in-memory), and take the book lock before the request
//! lock.

pub mod memory;
pub mod postgres;

use std::sync::Arc;

use async_trait::async_trait;

use crate::{
    error::AppResult,
    models::{
        book::{BookQuery, CreateBook, UpdateBook},
        library::{CreateLibrary, Library, Membership},
        user::{NewUser, User},
        Book, RequestEvent,
    },
};

pub use memory::MemoryStore;
pub use postgres::PgStore;

#[async_trait]
pub trait UserStore: Send + Sync {
    async fn create_user(&self, user: &NewUser) -> AppResult<User>;

    async fn get_user(&self, id: i32) -> AppResult<User>;

    async fn find_user_by_email(&self, email: &str) -> AppResult<Option<User>>;
}

/// Libraries and the membership registry
#[async_trait]
pub trait LibraryStore: Send + Sync {
    /// Create a library and enroll its creator
    async fn create_library(&self, library: &CreateLibrary, owner_id: i32) -> AppResult<Library>;

    async fn get_library(&self, id: i32) -> AppResult<Library>;

    async fn list_libraries(&self) -> AppResult<Vec<Library>>;

    async fn add_membership(&self, user_id: i32, library_id: i32) -> AppResult<Membership>;

    async fn is_member(&self, user_id: i32, library_id: i32) -> AppResult<bool>;

    /// Library ids of a user, ascending
    async fn library_ids_of(&self, user_id: i32) -> AppResult<Vec<i32>>;
}

#[async_trait]
pub trait InventoryStore: Send + Sync {
    async fn create_book(&self, library_id: i32, book: &CreateBook) -> AppResult<Book>;

    async fn get_book(&self, isbn: &str, library_id: i32) -> AppResult<Book>;

    /// Live books of the given libraries, ordered by title then ISBN
    async fn search_books(&self, library_ids: &[i32], query: &BookQuery) -> AppResult<Vec<Book>>;

    async fn update_book(&self, isbn: &str, library_id: i32, update: &UpdateBook)
        -> AppResult<Book>;

    /// Soft delete; refused while copies are on loan. Pending requests for the
    /// book are removed in the same unit and their count returned.
    async fn delete_book(&self, isbn: &str, library_id: i32) -> AppResult<u64>;
}

#[async_trait]
pub trait RequestLedger: Send + Sync {
    async fn get_request(&self, id: i32) -> AppResult<RequestEvent>;

    /// Pending requests of the given libraries, oldest first
    async fn list_pending(&self, library_ids: &[i32]) -> AppResult<Vec<RequestEvent>>;

    /// Requests made by a reader, newest first
    async fn list_for_reader(&self, reader_id: i32) -> AppResult<Vec<RequestEvent>>;

    /// Record a pending issue request if the book has a copy on the shelf
    async fn create_issue_request(
        &self,
        reader_id: i32,
        isbn: &str,
        library_id: i32,
    ) -> AppResult<RequestEvent>;

    /// Record a return of one of the reader's loans. With an approver the
    /// return is approved and the copy checked in at once.
    async fn create_return_request(
        &self,
        reader_id: i32,
        isbn: &str,
        library_id: i32,
        approver_id: Option<i32>,
    ) -> AppResult<RequestEvent>;

    /// Approve a pending request and move the copy it concerns
    async fn approve_request(&self, id: i32, approver_id: i32) -> AppResult<RequestEvent>;

    /// Delete a pending request, returning what was removed
    async fn disapprove_request(&self, id: i32) -> AppResult<RequestEvent>;
}

/// Everything the services need from persistence
pub trait Store: UserStore + LibraryStore + InventoryStore + RequestLedger {}

impl<T> Store for T where T: UserStore + LibraryStore + InventoryStore + RequestLedger {}

/// Shared handle to the configured store
pub type Repository = Arc<dyn Store>;
