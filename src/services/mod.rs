//! Business logic services

pub mod inventory;
pub mod lending;
pub mod libraries;
pub mod membership;
pub mod users;

use crate::{config::AuthConfig, repository::Repository};

/// Container for all services
#[derive(Clone)]
pub struct Services {
    pub membership: membership::MembershipService,
    pub inventory: inventory::InventoryService,
    pub lending: lending::LendingService,
    pub libraries: libraries::LibrariesService,
    pub users: users::UsersService,
}

impl Services {
    /// Create all services over the given store
    pub fn new(repository: Repository, auth_config: AuthConfig) -> Self {
        let membership = membership::MembershipService::new(repository.clone());
        Self {
            inventory: inventory::InventoryService::new(repository.clone(), membership.clone()),
            lending: lending::LendingService::new(repository.clone(), membership.clone()),
            libraries: libraries::LibrariesService::new(repository.clone()),
            users: users::UsersService::new(repository, membership.clone(), auth_config),
            membership,
        }
    }
}
