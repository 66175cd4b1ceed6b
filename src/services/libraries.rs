//! Library management service

use validator::Validate;

use crate::{
    error::AppResult,
    models::{library::CreateLibrary, Action, Caller, Library},
    repository::Repository,
};

#[derive(Clone)]
pub struct LibrariesService {
    repository: Repository,
}

impl LibrariesService {
    pub fn new(repository: Repository) -> Self {
        Self { repository }
    }

    /// Create a library; the owner becomes its first member
    pub async fn create(&self, caller: &Caller, library: CreateLibrary) -> AppResult<Library> {
        caller.require(Action::CreateLibrary)?;
        library.validate()?;

        let created = self
            .repository
            .create_library(&library, caller.user_id)
            .await?;
        tracing::info!(library_id = created.id, owner_id = caller.user_id, "Library created");
        Ok(created)
    }

    pub async fn list(&self, _caller: &Caller) -> AppResult<Vec<Library>> {
        self.repository.list_libraries().await
    }
}
