//! Accounts: registration, login and identity

use argon2::{
    password_hash::{rand_core::OsRng, PasswordHash, PasswordHasher, PasswordVerifier, SaltString},
    Argon2,
};
use chrono::Utc;
use validator::Validate;

use crate::{
    config::AuthConfig,
    error::{AppError, AppResult},
    models::{
        user::{NewUser, RegisterAccount, RegisterMember, UserClaims, UserWithLibraries},
        Action, Caller, Role, User,
    },
    repository::Repository,
    services::membership::MembershipService,
};

#[derive(Clone)]
pub struct UsersService {
    repository: Repository,
    membership: MembershipService,
    config: AuthConfig,
}

impl UsersService {
    pub fn new(repository: Repository, membership: MembershipService, config: AuthConfig) -> Self {
        Self {
            repository,
            membership,
            config,
        }
    }

    /// Open registration, for owners only
    pub async fn register_owner(&self, account: RegisterAccount) -> AppResult<User> {
        account.validate()?;
        if let Some(ref role) = account.role {
            if role.parse::<Role>() != Ok(Role::Owner) {
                return Err(AppError::Validation(
                    "Invalid role, must be 'owner'".to_string(),
                ));
            }
        }

        let user = self.create_account(&account, Role::Owner).await?;
        tracing::info!(user_id = user.id, "Owner registered");
        Ok(user)
    }

    /// Authenticate by email and return a JWT
    pub async fn login(&self, email: &str, password: &str) -> AppResult<(String, User)> {
        let user = self
            .repository
            .find_user_by_email(email)
            .await?
            .ok_or_else(|| AppError::Authentication("Invalid email or password".to_string()))?;

        if !self.verify_password(&user, password)? {
            return Err(AppError::Authentication(
                "Invalid email or password".to_string(),
            ));
        }

        let now = Utc::now().timestamp();
        let claims = UserClaims {
            sub: user.email.clone(),
            user_id: user.id,
            role: user.role,
            exp: now + (self.config.jwt_expiration_hours as i64 * 3600),
            iat: now,
        };
        let token = claims
            .create_token(&self.config.jwt_secret)
            .map_err(|e| AppError::Internal(format!("Failed to create token: {}", e)))?;

        Ok((token, user))
    }

    /// Owner creates an admin for libraries the owner belongs to
    pub async fn register_admin(
        &self,
        caller: &Caller,
        member: RegisterMember,
    ) -> AppResult<UserWithLibraries> {
        self.membership
            .role(caller.user_id)
            .await?
            .require(Action::RegisterAdmin)?;
        member.validate()?;

        let library_ids = dedup(member.library_ids);
        for &library_id in &library_ids {
            self.repository.get_library(library_id).await?;
            self.membership.require_member(caller, library_id).await?;
        }

        let user = self.create_account(&member.account, Role::Admin).await?;
        self.enroll(user, library_ids).await
    }

    /// Admin creates a reader for libraries the admin manages
    pub async fn register_reader(
        &self,
        caller: &Caller,
        member: RegisterMember,
    ) -> AppResult<UserWithLibraries> {
        self.membership
            .role(caller.user_id)
            .await?
            .require(Action::RegisterReader)?;
        member.validate()?;

        let library_ids = dedup(member.library_ids);
        for &library_id in &library_ids {
            self.membership.require_member(caller, library_id).await?;
        }

        let user = self.create_account(&member.account, Role::Reader).await?;
        self.enroll(user, library_ids).await
    }

    /// Current user with their libraries
    pub async fn me(&self, caller: &Caller) -> AppResult<UserWithLibraries> {
        let user = self.repository.get_user(caller.user_id).await?;
        let library_ids = self.membership.libraries_of(user.id).await?;
        Ok(UserWithLibraries { user, library_ids })
    }

    async fn create_account(&self, account: &RegisterAccount, role: Role) -> AppResult<User> {
        let password_hash = self.hash_password(&account.password)?;
        self.repository
            .create_user(&NewUser {
                name: account.name.clone(),
                email: account.email.trim().to_string(),
                password_hash,
                role,
            })
            .await
    }

    async fn enroll(&self, user: User, library_ids: Vec<i32>) -> AppResult<UserWithLibraries> {
        for &library_id in &library_ids {
            self.repository.add_membership(user.id, library_id).await?;
        }
        tracing::info!(user_id = user.id, role = %user.role, ?library_ids, "User registered");
        Ok(UserWithLibraries { user, library_ids })
    }

    fn verify_password(&self, user: &User, password: &str) -> AppResult<bool> {
        let parsed_hash = PasswordHash::new(&user.password)
            .map_err(|_| AppError::Internal("Invalid password hash".to_string()))?;
        Ok(Argon2::default()
            .verify_password(password.as_bytes(), &parsed_hash)
            .is_ok())
    }

    /// Hash a password using Argon2
    pub fn hash_password(&self, password: &str) -> AppResult<String> {
        let salt = SaltString::generate(&mut OsRng);
        let hash = Argon2::default()
            .hash_password(password.as_bytes(), &salt)
            .map_err(|e| AppError::Internal(format!("Failed to hash password: {}", e)))?;
        Ok(hash.to_string())
    }
}

fn dedup(mut ids: Vec<i32>) -> Vec<i32> {
    ids.sort_unstable();
    ids.dedup();
    ids
}
