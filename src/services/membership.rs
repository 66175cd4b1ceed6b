//! Library membership and role checks

use crate::{
    error::{AppError, AppResult},
    models::{Caller, Role},
    repository::Repository,
};

#[derive(Clone)]
pub struct MembershipService {
    repository: Repository,
}

impl MembershipService {
    pub fn new(repository: Repository) -> Self {
        Self { repository }
    }

    pub async fn is_member(&self, user_id: i32, library_id: i32) -> AppResult<bool> {
        self.repository.is_member(user_id, library_id).await
    }

    /// Role as currently stored, not as carried by a token
    pub async fn role(&self, user_id: i32) -> AppResult<Role> {
        Ok(self.repository.get_user(user_id).await?.role)
    }

    /// Ids of the libraries a user belongs to, ascending
    pub async fn libraries_of(&self, user_id: i32) -> AppResult<Vec<i32>> {
        self.repository.library_ids_of(user_id).await
    }

    pub async fn require_member(&self, caller: &Caller, library_id: i32) -> AppResult<()> {
        if self.is_member(caller.user_id, library_id).await? {
            Ok(())
        } else {
            Err(AppError::Authorization(format!(
                "Not a member of library {}",
                library_id
            )))
        }
    }

    /// Admin of the given library
    pub async fn require_manager(&self, caller: &Caller, library_id: i32) -> AppResult<()> {
        if caller.role != Role::Admin {
            return Err(AppError::Authorization(format!(
                "Only admins can manage library {}",
                library_id
            )));
        }
        self.require_member(caller, library_id).await
    }
}
