//! User model, roles and caller identity

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::{Decode, Encode, FromRow, Postgres};
use utoipa::ToSchema;
use validator::Validate;

use crate::error::AppError;

/// Global role of a user
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    Owner,
    Admin,
    Reader,
}

/// Operations gated by role
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Action {
    CreateLibrary,
    RegisterAdmin,
    RegisterReader,
    ManageBooks,
    ReviewRequests,
    BorrowBooks,
    ReturnBooks,
    SearchBooks,
}

impl Action {
    fn describe(&self) -> &'static str {
        match self {
            Action::CreateLibrary => "Only an owner can create a library",
            Action::RegisterAdmin => "Only an owner can create an admin",
            Action::RegisterReader => "Only admins can create users",
            Action::ManageBooks => "Only admins can manage books",
            Action::ReviewRequests => "Only admins can review requests",
            Action::BorrowBooks => "Only readers can request books",
            Action::ReturnBooks => "Only readers and admins can return books",
            Action::SearchBooks => "Not allowed to search books",
        }
    }
}

impl Role {
    pub fn as_str(&self) -> &'static str {
        match self {
            Role::Owner => "owner",
            Role::Admin => "admin",
            Role::Reader => "reader",
        }
    }

    /// Whether this role may perform `action` at all; library scoping is checked separately
    pub fn can(&self, action: Action) -> bool {
        match action {
            Action::CreateLibrary | Action::RegisterAdmin => *self == Role::Owner,
            Action::RegisterReader | Action::ManageBooks | Action::ReviewRequests => {
                *self == Role::Admin
            }
            Action::BorrowBooks => *self == Role::Reader,
            Action::ReturnBooks => matches!(self, Role::Reader | Role::Admin),
            Action::SearchBooks => true,
        }
    }

    pub fn require(&self, action: Action) -> Result<(), AppError> {
        if self.can(action) {
            Ok(())
        } else {
            Err(AppError::Authorization(action.describe().to_string()))
        }
    }
}

impl std::fmt::Display for Role {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl std::str::FromStr for Role {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "owner" => Ok(Role::Owner),
            "admin" => Ok(Role::Admin),
            // "user" is the legacy spelling of a reader
            "reader" | "user" => Ok(Role::Reader),
            _ => Err(format!("Invalid role: {}", s)),
        }
    }
}

// SQLx conversion for Role
impl sqlx::Type<Postgres> for Role {
    fn type_info() -> sqlx::postgres::PgTypeInfo {
        <String as sqlx::Type<Postgres>>::type_info()
    }

    fn compatible(ty: &sqlx::postgres::PgTypeInfo) -> bool {
        <String as sqlx::Type<Postgres>>::compatible(ty)
    }
}

impl<'r> Decode<'r, Postgres> for Role {
    fn decode(value: sqlx::postgres::PgValueRef<'r>) -> Result<Self, sqlx::error::BoxDynError> {
        let s: String = Decode::<Postgres>::decode(value)?;
        s.parse().map_err(|e: String| e.into())
    }
}

impl Encode<'_, Postgres> for Role {
    fn encode_by_ref(&self, buf: &mut sqlx::postgres::PgArgumentBuffer) -> sqlx::encode::IsNull {
        <&str as Encode<Postgres>>::encode(self.as_str(), buf)
    }
}

/// User model from database
#[derive(Debug, Clone, Serialize, Deserialize, FromRow, ToSchema)]
pub struct User {
    pub id: i32,
    pub name: String,
    pub email: String,
    /// Hashed password (argon2)
    #[serde(skip_serializing, default)]
    pub password: String,
    pub role: Role,
    pub created_at: DateTime<Utc>,
}

/// Insert payload once the password is hashed
#[derive(Debug, Clone)]
pub struct NewUser {
    pub name: String,
    pub email: String,
    pub password_hash: String,
    pub role: Role,
}

/// Account registration request
#[derive(Debug, Clone, Deserialize, Validate, ToSchema)]
pub struct RegisterAccount {
    #[validate(length(min = 1, message = "Name is required"))]
    pub name: String,
    #[validate(email(message = "Invalid email format"))]
    pub email: String,
    #[validate(length(min = 6, message = "Password must be at least 6 characters"))]
    pub password: String,
    /// Only accepted on owner self-registration, where it must be `owner`
    pub role: Option<String>,
}

/// Admin or reader registration, with the libraries to enroll into
#[derive(Debug, Clone, Deserialize, Validate, ToSchema)]
pub struct RegisterMember {
    #[serde(flatten)]
    #[validate(nested)]
    pub account: RegisterAccount,
    #[validate(length(min = 1, message = "At least one library is required"))]
    pub library_ids: Vec<i32>,
}

/// A registered user along with the libraries they belong to
#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct UserWithLibraries {
    #[serde(flatten)]
    pub user: User,
    pub library_ids: Vec<i32>,
}

/// Authenticated identity handed to the lending core
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Caller {
    pub user_id: i32,
    pub role: Role,
}

impl Caller {
    pub fn new(user_id: i32, role: Role) -> Self {
        Self { user_id, role }
    }

    pub fn require(&self, action: Action) -> Result<(), AppError> {
        self.role.require(action)
    }
}

/// JWT Claims for authenticated users
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UserClaims {
    pub sub: String,
    pub user_id: i32,
    pub role: Role,
    pub exp: i64,
    pub iat: i64,
}

impl UserClaims {
    /// Create a new JWT token
    pub fn create_token(&self, secret: &str) -> Result<String, jsonwebtoken::errors::Error> {
        use jsonwebtoken::{encode, EncodingKey, Header};
        encode(
            &Header::default(),
            self,
            &EncodingKey::from_secret(secret.as_bytes()),
        )
    }

    /// Parse JWT token
    pub fn from_token(token: &str, secret: &str) -> Result<Self, jsonwebtoken::errors::Error> {
        use jsonwebtoken::{decode, DecodingKey, Validation};
        let token_data = decode::<Self>(
            token,
            &DecodingKey::from_secret(secret.as_bytes()),
            &Validation::default(),
        )?;
        Ok(token_data.claims)
    }

    pub fn caller(&self) -> Caller {
        Caller::new(self.user_id, self.role)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_role_parse() {
        assert_eq!("owner".parse::<Role>(), Ok(Role::Owner));
        assert_eq!("Admin".parse::<Role>(), Ok(Role::Admin));
        assert_eq!("reader".parse::<Role>(), Ok(Role::Reader));
        assert_eq!("user".parse::<Role>(), Ok(Role::Reader));
        assert!("librarian".parse::<Role>().is_err());
    }

    #[test]
    fn test_capabilities() {
        assert!(Role::Owner.can(Action::CreateLibrary));
        assert!(Role::Owner.can(Action::RegisterAdmin));
        assert!(!Role::Admin.can(Action::RegisterAdmin));
        assert!(Role::Admin.can(Action::RegisterReader));
        assert!(!Role::Owner.can(Action::RegisterReader));
        assert!(Role::Admin.can(Action::ReviewRequests));
        assert!(!Role::Reader.can(Action::ReviewRequests));
        assert!(Role::Reader.can(Action::BorrowBooks));
        assert!(!Role::Admin.can(Action::BorrowBooks));
        assert!(Role::Admin.can(Action::ReturnBooks));
        assert!(!Role::Owner.can(Action::ReturnBooks));
    }

    #[test]
    fn test_require_maps_to_authorization() {
        let err = Role::Admin.require(Action::RegisterAdmin).unwrap_err();
        match err {
            AppError::Authorization(msg) => assert_eq!(msg, "Only an owner can create an admin"),
            other => panic!("unexpected error: {:?}", other),
        }
    }

    #[test]
    fn test_token_round_trip() {
        let now = Utc::now().timestamp();
        let claims = UserClaims {
            sub: "ada@example.com".to_string(),
            user_id: 7,
            role: Role::Admin,
            exp: now + 3600,
            iat: now,
        };
        let token = claims.create_token("secret").unwrap();
        let parsed = UserClaims::from_token(&token, "secret").unwrap();
        assert_eq!(parsed.caller(), Caller::new(7, Role::Admin));
        assert!(UserClaims::from_token(&token, "other").is_err());
    }
}
