//! PostgreSQL store
//!
//! Copy movements lock the live `books` row with `SELECT ... FOR UPDATE`
//! before touching `request_events`, inside one transaction. A transaction
//! dropped on an early `?` rolls back.

mod books;
mod libraries;
mod requests;
mod users;

use sqlx::{Pool, Postgres};

#[derive(Clone)]
pub struct PgStore {
    pool: Pool<Postgres>,
}

impl PgStore {
    pub fn new(pool: Pool<Postgres>) -> Self {
        Self { pool }
    }
}

/// Whether a query failed on a unique index
fn is_unique_violation(err: &sqlx::Error) -> bool {
    match err {
        sqlx::Error::Database(db) => db.is_unique_violation(),
        _ => false,
    }
}
