//! In-memory store.
//!
//! All state sits behind one async mutex held for the whole of each method,
//! so every transition is serialized. Each method works on copies and writes
//! them back only once all of its checks have passed.

use std::collections::BTreeMap;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use tokio::sync::Mutex;

use crate::{
    error::{AppError, AppResult, Conflict},
    models::{
        book::{BookQuery, CreateBook, UpdateBook},
        library::{CreateLibrary, Library, Membership},
        user::{NewUser, User},
        Book, RequestEvent, RequestState, RequestType,
    },
    repository::{InventoryStore, LibraryStore, RequestLedger, UserStore},
};

#[derive(Debug, Clone)]
struct BookRecord {
    book: Book,
    deleted_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Default)]
struct State {
    last_id: i32,
    users: BTreeMap<i32, User>,
    libraries: BTreeMap<i32, Library>,
    memberships: Vec<Membership>,
    books: Vec<BookRecord>,
    requests: BTreeMap<i32, RequestEvent>,
}

impl State {
    fn next_id(&mut self) -> i32 {
        self.last_id += 1;
        self.last_id
    }

    fn live_book(&self, isbn: &str, library_id: i32) -> AppResult<&Book> {
        self.books
            .iter()
            .find(|r| r.deleted_at.is_none() && r.book.isbn == isbn && r.book.library_id == library_id)
            .map(|r| &r.book)
            .ok_or_else(|| {
                AppError::NotFound(format!(
                    "Book with ISBN {} not found in library {}",
                    isbn, library_id
                ))
            })
    }

    fn live_record_mut(&mut self, isbn: &str, library_id: i32) -> Option<&mut BookRecord> {
        self.books
            .iter_mut()
            .find(|r| r.deleted_at.is_none() && r.book.isbn == isbn && r.book.library_id == library_id)
    }

    fn put_book(&mut self, mut book: Book) {
        book.updated_at = Utc::now();
        if let Some(record) = self.live_record_mut(&book.isbn, book.library_id) {
            record.book = book;
        }
    }

    fn request(&self, id: i32) -> AppResult<&RequestEvent> {
        self.requests
            .get(&id)
            .ok_or_else(|| AppError::NotFound(format!("Request with id {} not found", id)))
    }

    fn pending_exists(
        &self,
        reader_id: i32,
        isbn: &str,
        library_id: i32,
        request_type: RequestType,
    ) -> bool {
        self.requests.values().any(|r| {
            r.is_pending() && r.request_type == request_type && r.concerns(reader_id, isbn, library_id)
        })
    }

    fn outstanding_loans(&self, reader_id: i32, isbn: &str, library_id: i32) -> i64 {
        self.requests
            .values()
            .filter(|r| !r.is_pending() && r.concerns(reader_id, isbn, library_id))
            .map(|r| match r.request_type {
                RequestType::Issue => 1,
                RequestType::Return => -1,
            })
            .sum()
    }

    fn insert_request(
        &mut self,
        reader_id: i32,
        isbn: &str,
        library_id: i32,
        request_type: RequestType,
        approver_id: Option<i32>,
    ) -> RequestEvent {
        let now = Utc::now();
        let request = RequestEvent {
            id: self.next_id(),
            isbn: isbn.to_string(),
            library_id,
            reader_id,
            request_type,
            request_date: now,
            state: match approver_id {
                Some(approver_id) => RequestState::Approved {
                    approver_id,
                    approved_at: now,
                },
                None => RequestState::Pending,
            },
        };
        self.requests.insert(request.id, request.clone());
        request
    }
}

/// Process-local store, used for development and tests
#[derive(Debug, Default)]
pub struct MemoryStore {
    state: Mutex<State>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl UserStore for MemoryStore {
    async fn create_user(&self, user: &NewUser) -> AppResult<User> {
        let mut state = self.state.lock().await;

        let taken = state
            .users
            .values()
            .any(|u| u.email.eq_ignore_ascii_case(&user.email));
        if taken {
            return Err(Conflict::DuplicateEmail(user.email.clone()).into());
        }

        let created = User {
            id: state.next_id(),
            name: user.name.clone(),
            email: user.email.clone(),
            password: user.password_hash.clone(),
            role: user.role,
            created_at: Utc::now(),
        };
        state.users.insert(created.id, created.clone());
        Ok(created)
    }

    async fn get_user(&self, id: i32) -> AppResult<User> {
        let state = self.state.lock().await;
        state
            .users
            .get(&id)
            .cloned()
            .ok_or_else(|| AppError::NotFound(format!("User with id {} not found", id)))
    }

    async fn find_user_by_email(&self, email: &str) -> AppResult<Option<User>> {
        let state = self.state.lock().await;
        Ok(state
            .users
            .values()
            .find(|u| u.email.eq_ignore_ascii_case(email))
            .cloned())
    }
}

#[async_trait]
impl LibraryStore for MemoryStore {
    async fn create_library(&self, library: &CreateLibrary, owner_id: i32) -> AppResult<Library> {
        let mut state = self.state.lock().await;

        let created = Library {
            id: state.next_id(),
            name: library.name.clone(),
            location: library.location.clone(),
            created_at: Utc::now(),
        };
        let membership = Membership {
            id: state.next_id(),
            user_id: owner_id,
            library_id: created.id,
        };
        state.libraries.insert(created.id, created.clone());
        state.memberships.push(membership);
        Ok(created)
    }

    async fn get_library(&self, id: i32) -> AppResult<Library> {
        let state = self.state.lock().await;
        state
            .libraries
            .get(&id)
            .cloned()
            .ok_or_else(|| AppError::NotFound(format!("Library with id {} not found", id)))
    }

    async fn list_libraries(&self) -> AppResult<Vec<Library>> {
        let state = self.state.lock().await;
        Ok(state.libraries.values().cloned().collect())
    }

    async fn add_membership(&self, user_id: i32, library_id: i32) -> AppResult<Membership> {
        let mut state = self.state.lock().await;

        if state
            .memberships
            .iter()
            .any(|m| m.user_id == user_id && m.library_id == library_id)
        {
            return Err(Conflict::AlreadyMember { user_id, library_id }.into());
        }

        let membership = Membership {
            id: state.next_id(),
            user_id,
            library_id,
        };
        state.memberships.push(membership.clone());
        Ok(membership)
    }

    async fn is_member(&self, user_id: i32, library_id: i32) -> AppResult<bool> {
        let state = self.state.lock().await;
        Ok(state
            .memberships
            .iter()
            .any(|m| m.user_id == user_id && m.library_id == library_id))
    }

    async fn library_ids_of(&self, user_id: i32) -> AppResult<Vec<i32>> {
        let state = self.state.lock().await;
        let mut ids: Vec<i32> = state
            .memberships
            .iter()
            .filter(|m| m.user_id == user_id)
            .map(|m| m.library_id)
            .collect();
        ids.sort_unstable();
        Ok(ids)
    }
}

#[async_trait]
impl InventoryStore for MemoryStore {
    async fn create_book(&self, library_id: i32, book: &CreateBook) -> AppResult<Book> {
        let mut state = self.state.lock().await;

        if state.live_book(&book.isbn, library_id).is_ok() {
            return Err(Conflict::DuplicateIsbn {
                isbn: book.isbn.clone(),
                library_id,
            }
            .into());
        }

        let now = Utc::now();
        let created = Book {
            isbn: book.isbn.clone(),
            library_id,
            title: book.title.clone(),
            authors: book.authors.clone(),
            publisher: book.publisher.clone(),
            version: book.version.clone(),
            total_copies: book.total_copies,
            available_copies: book.total_copies,
            created_at: now,
            updated_at: now,
        };
        state.books.push(BookRecord {
            book: created.clone(),
            deleted_at: None,
        });
        Ok(created)
    }

    async fn get_book(&self, isbn: &str, library_id: i32) -> AppResult<Book> {
        let state = self.state.lock().await;
        state.live_book(isbn, library_id).cloned()
    }

    async fn search_books(&self, library_ids: &[i32], query: &BookQuery) -> AppResult<Vec<Book>> {
        let state = self.state.lock().await;
        let mut books: Vec<Book> = state
            .books
            .iter()
            .filter(|r| r.deleted_at.is_none() && library_ids.contains(&r.book.library_id))
            .map(|r| &r.book)
            .filter(|b| query.matches(b))
            .cloned()
            .collect();
        books.sort_by(|a, b| a.title.cmp(&b.title).then_with(|| a.isbn.cmp(&b.isbn)));
        Ok(books)
    }

    async fn update_book(
        &self,
        isbn: &str,
        library_id: i32,
        update: &UpdateBook,
    ) -> AppResult<Book> {
        let mut state = self.state.lock().await;

        let mut book = state.live_book(isbn, library_id)?.clone();
        book.apply_update(update)?;
        state.put_book(book);
        state.live_book(isbn, library_id).cloned()
    }

    async fn delete_book(&self, isbn: &str, library_id: i32) -> AppResult<u64> {
        let mut state = self.state.lock().await;

        state.live_book(isbn, library_id)?.ensure_removable()?;
        if let Some(record) = state.live_record_mut(isbn, library_id) {
            record.deleted_at = Some(Utc::now());
        }

        let before = state.requests.len();
        state
            .requests
            .retain(|_, r| !(r.is_pending() && r.isbn == isbn && r.library_id == library_id));
        Ok((before - state.requests.len()) as u64)
    }
}

#[async_trait]
impl RequestLedger for MemoryStore {
    async fn get_request(&self, id: i32) -> AppResult<RequestEvent> {
        let state = self.state.lock().await;
        state.request(id).cloned()
    }

    async fn list_pending(&self, library_ids: &[i32]) -> AppResult<Vec<RequestEvent>> {
        let state = self.state.lock().await;
        let mut pending: Vec<RequestEvent> = state
            .requests
            .values()
            .filter(|r| r.is_pending() && library_ids.contains(&r.library_id))
            .cloned()
            .collect();
        pending.sort_by_key(|r| (r.request_date, r.id));
        Ok(pending)
    }

    async fn list_for_reader(&self, reader_id: i32) -> AppResult<Vec<RequestEvent>> {
        let state = self.state.lock().await;
        let mut requests: Vec<RequestEvent> = state
            .requests
            .values()
            .filter(|r| r.reader_id == reader_id)
            .cloned()
            .collect();
        requests.sort_by_key(|r| std::cmp::Reverse((r.request_date, r.id)));
        Ok(requests)
    }

    async fn create_issue_request(
        &self,
        reader_id: i32,
        isbn: &str,
        library_id: i32,
    ) -> AppResult<RequestEvent> {
        let mut state = self.state.lock().await;

        let book = state.live_book(isbn, library_id)?;
        if book.available_copies <= 0 {
            return Err(Conflict::NoCopiesAvailable {
                isbn: isbn.to_string(),
            }
            .into());
        }

        if state.pending_exists(reader_id, isbn, library_id, RequestType::Issue) {
            return Err(Conflict::DuplicatePending {
                isbn: isbn.to_string(),
                request_type: RequestType::Issue.to_string(),
            }
            .into());
        }

        Ok(state.insert_request(reader_id, isbn, library_id, RequestType::Issue, None))
    }

    async fn create_return_request(
        &self,
        reader_id: i32,
        isbn: &str,
        library_id: i32,
        approver_id: Option<i32>,
    ) -> AppResult<RequestEvent> {
        let mut state = self.state.lock().await;

        let mut book = state.live_book(isbn, library_id)?.clone();

        if state.outstanding_loans(reader_id, isbn, library_id) <= 0 {
            return Err(Conflict::NoOutstandingLoan {
                isbn: isbn.to_string(),
            }
            .into());
        }

        if state.pending_exists(reader_id, isbn, library_id, RequestType::Return) {
            return Err(Conflict::DuplicatePending {
                isbn: isbn.to_string(),
                request_type: RequestType::Return.to_string(),
            }
            .into());
        }

        if approver_id.is_some() {
            book.check_in()?;
            state.put_book(book);
        }

        Ok(state.insert_request(reader_id, isbn, library_id, RequestType::Return, approver_id))
    }

    async fn approve_request(&self, id: i32, approver_id: i32) -> AppResult<RequestEvent> {
        let mut state = self.state.lock().await;

        let mut request = state.request(id)?.clone();
        let mut book = state.live_book(&request.isbn, request.library_id)?.clone();

        request.ensure_pending()?;
        match request.request_type {
            RequestType::Issue => book.check_out()?,
            RequestType::Return => book.check_in()?,
        }
        request.approve(approver_id, Utc::now())?;

        state.put_book(book);
        state.requests.insert(id, request.clone());
        Ok(request)
    }

    async fn disapprove_request(&self, id: i32) -> AppResult<RequestEvent> {
        let mut state = self.state.lock().await;

        state.request(id)?.ensure_pending()?;
        state.requests.remove(&id).ok_or_else(|| {
            AppError::NotFound(format!("Request with id {} not found", id))
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn create_book(isbn: &str, total_copies: i32) -> CreateBook {
        CreateBook {
            isbn: isbn.to_string(),
            title: "Test Book".to_string(),
            authors: None,
            publisher: None,
            version: None,
            total_copies,
        }
    }

    #[tokio::test]
    async fn test_same_isbn_in_two_libraries() {
        let store = MemoryStore::new();
        store.create_book(1, &create_book("123", 1)).await.unwrap();
        store.create_book(2, &create_book("123", 4)).await.unwrap();

        let err = store.create_book(1, &create_book("123", 2)).await.unwrap_err();
        assert!(matches!(err, AppError::Conflict(Conflict::DuplicateIsbn { .. })));
        assert_eq!(store.get_book("123", 2).await.unwrap().available_copies, 4);
    }

    #[tokio::test]
    async fn test_isbn_can_be_added_again_after_delete() {
        let store = MemoryStore::new();
        store.create_book(1, &create_book("123", 1)).await.unwrap();
        store.delete_book("123", 1).await.unwrap();
        assert!(matches!(
            store.get_book("123", 1).await,
            Err(AppError::NotFound(_))
        ));

        let again = store.create_book(1, &create_book("123", 2)).await.unwrap();
        assert_eq!(again.total_copies, 2);
        assert_eq!(store.get_book("123", 1).await.unwrap().total_copies, 2);
    }

    #[tokio::test]
    async fn test_delete_withdraws_pending_requests_of_that_book_only() {
        let store = MemoryStore::new();
        store.create_book(1, &create_book("123", 2)).await.unwrap();
        store.create_book(2, &create_book("123", 2)).await.unwrap();
        let here = store.create_issue_request(5, "123", 1).await.unwrap();
        let elsewhere = store.create_issue_request(5, "123", 2).await.unwrap();

        assert_eq!(store.delete_book("123", 1).await.unwrap(), 1);
        assert!(matches!(
            store.get_request(here.id).await,
            Err(AppError::NotFound(_))
        ));
        assert!(store.get_request(elsewhere.id).await.unwrap().is_pending());
        assert_eq!(store.list_pending(&[1, 2]).await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_disapprove_removes_request() {
        let store = MemoryStore::new();
        store.create_book(1, &create_book("123", 1)).await.unwrap();
        let request = store.create_issue_request(5, "123", 1).await.unwrap();

        let removed = store.disapprove_request(request.id).await.unwrap();
        assert_eq!(removed.id, request.id);
        assert!(matches!(
            store.get_request(request.id).await,
            Err(AppError::NotFound(_))
        ));
    }

    #[tokio::test]
    async fn test_outstanding_loans_gate_returns() {
        let store = MemoryStore::new();
        store.create_book(1, &create_book("123", 2)).await.unwrap();

        let err = store.create_return_request(5, "123", 1, None).await.unwrap_err();
        assert!(matches!(
            err,
            AppError::Conflict(Conflict::NoOutstandingLoan { .. })
        ));

        let issue = store.create_issue_request(5, "123", 1).await.unwrap();
        store.approve_request(issue.id, 9).await.unwrap();
        assert_eq!(store.get_book("123", 1).await.unwrap().available_copies, 1);

        let returned = store.create_return_request(5, "123", 1, Some(9)).await.unwrap();
        assert!(!returned.is_pending());
        assert_eq!(store.get_book("123", 1).await.unwrap().available_copies, 2);

        let err = store.create_return_request(5, "123", 1, None).await.unwrap_err();
        assert!(matches!(
            err,
            AppError::Conflict(Conflict::NoOutstandingLoan { .. })
        ));
    }
}
