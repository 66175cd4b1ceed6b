//! PgStore tests against a real database
//!
//! Point `DATABASE_URL` at a scratch database (migrations are applied), then:
//! `cargo test --test postgres_store -- --ignored`

use std::sync::{
    atomic::{AtomicU32, Ordering},
    Arc,
};

use libris_server::{
    error::{AppError, Conflict},
    models::{book::CreateBook, library::CreateLibrary, user::NewUser, RequestState, Role},
    repository::{PgStore, Repository},
};
use sqlx::postgres::PgPoolOptions;

const ISBN: &str = "9780000000001";

static SEQUENCE: AtomicU32 = AtomicU32::new(0);

fn unique(prefix: &str) -> String {
    format!(
        "{}-{}-{}",
        prefix,
        chrono::Utc::now().timestamp_nanos_opt().unwrap_or_default(),
        SEQUENCE.fetch_add(1, Ordering::Relaxed)
    )
}

async fn store() -> Repository {
    let url = std::env::var("DATABASE_URL").expect("DATABASE_URL must be set");
    let pool = PgPoolOptions::new()
        .max_connections(8)
        .connect(&url)
        .await
        .expect("Failed to connect to database");
    sqlx::migrate!("./migrations")
        .run(&pool)
        .await
        .expect("Failed to run migrations");
    Arc::new(PgStore::new(pool))
}

async fn user(repository: &Repository, role: Role) -> i32 {
    repository
        .create_user(&NewUser {
            name: "Test".to_string(),
            email: format!("{}@libris.test", unique("pg")),
            password_hash: "not-a-hash".to_string(),
            role,
        })
        .await
        .unwrap()
        .id
}

/// A fresh library so ISBNs never collide between runs
async fn library(repository: &Repository) -> i32 {
    let owner = user(repository, Role::Owner).await;
    repository
        .create_library(
            &CreateLibrary {
                name: unique("library"),
                location: "Test".to_string(),
            },
            owner,
        )
        .await
        .unwrap()
        .id
}

fn book(total_copies: i32) -> CreateBook {
    CreateBook {
        isbn: ISBN.to_string(),
        title: "Concurrency in Practice".to_string(),
        authors: None,
        publisher: None,
        version: None,
        total_copies,
    }
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
#[ignore] // Run with: cargo test -- --ignored
async fn test_concurrent_approvals_for_last_copy() {
    let repository = store().await;
    let library_id = library(&repository).await;
    let admin = user(&repository, Role::Admin).await;
    repository.create_book(library_id, &book(1)).await.unwrap();

    let mut ids = Vec::new();
    for _ in 0..2 {
        let reader = user(&repository, Role::Reader).await;
        let request = repository
            .create_issue_request(reader, ISBN, library_id)
            .await
            .unwrap();
        ids.push(request.id);
    }

    let handles: Vec<_> = ids
        .iter()
        .map(|&id| {
            let repository = repository.clone();
            tokio::spawn(async move { repository.approve_request(id, admin).await })
        })
        .collect();

    let mut approved = 0;
    let mut rejected = 0;
    for handle in handles {
        match handle.await.unwrap() {
            Ok(event) => {
                assert!(matches!(
                    event.state,
                    RequestState::Approved { approver_id, .. } if approver_id == admin
                ));
                approved += 1;
            }
            Err(AppError::Conflict(Conflict::NoCopiesAvailable { .. })) => rejected += 1,
            Err(e) => panic!("unexpected error: {:?}", e),
        }
    }
    assert_eq!((approved, rejected), (1, 1));

    let stock = repository.get_book(ISBN, library_id).await.unwrap();
    assert_eq!(stock.available_copies, 0);
    assert_eq!(repository.list_pending(&[library_id]).await.unwrap().len(), 1);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
#[ignore]
async fn test_duplicate_pending_issue() {
    let repository = store().await;
    let library_id = library(&repository).await;
    let reader = user(&repository, Role::Reader).await;
    repository.create_book(library_id, &book(3)).await.unwrap();

    let handles: Vec<_> = (0..2)
        .map(|_| {
            let repository = repository.clone();
            tokio::spawn(async move {
                repository
                    .create_issue_request(reader, ISBN, library_id)
                    .await
            })
        })
        .collect();

    let mut created = 0;
    for handle in handles {
        match handle.await.unwrap() {
            Ok(request) => {
                assert!(request.is_pending());
                created += 1;
            }
            Err(AppError::Conflict(Conflict::DuplicatePending { .. })) => {}
            Err(e) => panic!("unexpected error: {:?}", e),
        }
    }
    assert_eq!(created, 1);
    assert_eq!(repository.list_for_reader(reader).await.unwrap().len(), 1);
}

#[tokio::test]
#[ignore]
async fn test_duplicate_isbn_and_readd_after_delete() {
    let repository = store().await;
    let library_id = library(&repository).await;
    let reader = user(&repository, Role::Reader).await;
    repository.create_book(library_id, &book(2)).await.unwrap();

    let err = repository
        .create_book(library_id, &book(5))
        .await
        .unwrap_err();
    assert!(matches!(
        err,
        AppError::Conflict(Conflict::DuplicateIsbn { .. })
    ));

    // the same ISBN lives independently in another library
    let other = library(&repository).await;
    repository.create_book(other, &book(5)).await.unwrap();

    let stale = repository
        .create_issue_request(reader, ISBN, library_id)
        .await
        .unwrap();
    assert_eq!(repository.delete_book(ISBN, library_id).await.unwrap(), 1);
    assert!(matches!(
        repository.get_request(stale.id).await,
        Err(AppError::NotFound(_))
    ));

    let again = repository.create_book(library_id, &book(1)).await.unwrap();
    assert_eq!(again.available_copies, 1);
    repository
        .create_issue_request(reader, ISBN, library_id)
        .await
        .unwrap();
    assert_eq!(repository.get_book(ISBN, other).await.unwrap().total_copies, 5);
}

#[tokio::test]
#[ignore]
async fn test_loan_round_trip() {
    let repository = store().await;
    let library_id = library(&repository).await;
    let admin = user(&repository, Role::Admin).await;
    let reader = user(&repository, Role::Reader).await;
    repository.create_book(library_id, &book(2)).await.unwrap();

    let issue = repository
        .create_issue_request(reader, ISBN, library_id)
        .await
        .unwrap();
    repository.approve_request(issue.id, admin).await.unwrap();

    let stored = repository.get_request(issue.id).await.unwrap();
    assert!(matches!(
        stored.state,
        RequestState::Approved { approver_id, .. } if approver_id == admin
    ));
    assert!(matches!(
        repository.approve_request(issue.id, admin).await,
        Err(AppError::Conflict(Conflict::AlreadyApproved(_)))
    ));

    let err = repository.delete_book(ISBN, library_id).await.unwrap_err();
    assert!(matches!(
        err,
        AppError::Conflict(Conflict::OutstandingLoans { on_loan: 1, .. })
    ));

    let returned = repository
        .create_return_request(reader, ISBN, library_id, None)
        .await
        .unwrap();
    repository.approve_request(returned.id, admin).await.unwrap();
    assert_eq!(
        repository.get_book(ISBN, library_id).await.unwrap().available_copies,
        2
    );

    let err = repository
        .create_return_request(reader, ISBN, library_id, None)
        .await
        .unwrap_err();
    assert!(matches!(
        err,
        AppError::Conflict(Conflict::NoOutstandingLoan { .. })
    ));
}
