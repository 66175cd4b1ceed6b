//! Data models for Libris

pub mod book;
pub mod library;
pub mod request;
pub mod user;

// Re-export commonly used types
pub use book::Book;
pub use library::{Library, Membership};
pub use request::{RequestEvent, RequestState, RequestType, ReturnTarget};
pub use user::{Action, Caller, Role, User};
