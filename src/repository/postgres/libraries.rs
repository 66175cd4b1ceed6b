//! Libraries and memberships repository for database operations

use async_trait::async_trait;

use super::{is_unique_violation, PgStore};
use crate::{
    error::{AppError, AppResult, Conflict},
    models::library::{CreateLibrary, Library, Membership},
    repository::LibraryStore,
};

#[async_trait]
impl LibraryStore for PgStore {
    async fn create_library(&self, library: &CreateLibrary, owner_id: i32) -> AppResult<Library> {
        let mut tx = self.pool.begin().await?;

        let created = sqlx::query_as::<_, Library>(
            r#"
            INSERT INTO libraries (name, location)
            VALUES ($1, $2)
            RETURNING id, name, location, created_at
            "#,
        )
        .bind(&library.name)
        .bind(&library.location)
        .fetch_one(&mut *tx)
        .await?;

        sqlx::query("INSERT INTO user_libraries (user_id, library_id) VALUES ($1, $2)")
            .bind(owner_id)
            .bind(created.id)
            .execute(&mut *tx)
            .await?;

        tx.commit().await?;
        Ok(created)
    }

    async fn get_library(&self, id: i32) -> AppResult<Library> {
        sqlx::query_as::<_, Library>(
            "SELECT id, name, location, created_at FROM libraries WHERE id = $1",
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await?
        .ok_or_else(|| AppError::NotFound(format!("Library with id {} not found", id)))
    }

    async fn list_libraries(&self) -> AppResult<Vec<Library>> {
        let libraries = sqlx::query_as::<_, Library>(
            "SELECT id, name, location, created_at FROM libraries ORDER BY id",
        )
        .fetch_all(&self.pool)
        .await?;

        Ok(libraries)
    }

    async fn add_membership(&self, user_id: i32, library_id: i32) -> AppResult<Membership> {
        sqlx::query_as::<_, Membership>(
            r#"
            INSERT INTO user_libraries (user_id, library_id)
            VALUES ($1, $2)
            RETURNING id, user_id, library_id
            "#,
        )
        .bind(user_id)
        .bind(library_id)
        .fetch_one(&self.pool)
        .await
        .map_err(|e| {
            if is_unique_violation(&e) {
                Conflict::AlreadyMember { user_id, library_id }.into()
            } else {
                AppError::from(e)
            }
        })
    }

    async fn is_member(&self, user_id: i32, library_id: i32) -> AppResult<bool> {
        let member: bool = sqlx::query_scalar(
            "SELECT EXISTS(SELECT 1 FROM user_libraries WHERE user_id = $1 AND library_id = $2)",
        )
        .bind(user_id)
        .bind(library_id)
        .fetch_one(&self.pool)
        .await?;

        Ok(member)
    }

    async fn library_ids_of(&self, user_id: i32) -> AppResult<Vec<i32>> {
        let ids = sqlx::query_scalar::<_, i32>(
            "SELECT library_id FROM user_libraries WHERE user_id = $1 ORDER BY library_id",
        )
        .bind(user_id)
        .fetch_all(&self.pool)
        .await?;

        Ok(ids)
    }
}
