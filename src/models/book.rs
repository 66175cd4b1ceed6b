//! Book inventory model and copy-count rules

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use utoipa::{IntoParams, ToSchema};
use validator::Validate;

use crate::error::{AppError, AppResult, Conflict};

/// A book held by one library, keyed by (isbn, library_id)
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, FromRow, ToSchema)]
pub struct Book {
    pub isbn: String,
    pub library_id: i32,
    pub title: String,
    pub authors: Option<String>,
    pub publisher: Option<String>,
    pub version: Option<String>,
    pub total_copies: i32,
    pub available_copies: i32,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Book {
    /// Copies currently lent out
    pub fn on_loan(&self) -> i32 {
        self.total_copies - self.available_copies
    }

    /// Lend one copy out
    pub fn check_out(&mut self) -> AppResult<()> {
        if self.available_copies <= 0 {
            return Err(Conflict::NoCopiesAvailable {
                isbn: self.isbn.clone(),
            }
            .into());
        }
        self.available_copies -= 1;
        Ok(())
    }

    /// Put one copy back on the shelf
    pub fn check_in(&mut self) -> AppResult<()> {
        if self.available_copies >= self.total_copies {
            return Err(Conflict::OverCapacity {
                isbn: self.isbn.clone(),
            }
            .into());
        }
        self.available_copies += 1;
        Ok(())
    }

    /// Availability after changing the total, keeping the loaned copies on loan
    pub fn available_for_total(&self, total_copies: i32) -> AppResult<i32> {
        if total_copies < 0 {
            return Err(AppError::Validation(
                "total_copies cannot be negative".to_string(),
            ));
        }
        let on_loan = self.on_loan();
        let available = total_copies - on_loan;
        if available < 0 {
            return Err(AppError::Validation(format!(
                "total_copies cannot be lower than the {} copies on loan",
                on_loan
            )));
        }
        Ok(available)
    }

    /// Apply an edit; nothing is changed when the edit is rejected
    pub fn apply_update(&mut self, update: &UpdateBook) -> AppResult<()> {
        let copies = match update.total_copies {
            Some(total) => Some((total, self.available_for_total(total)?)),
            None => None,
        };

        if let Some(ref title) = update.title {
            self.title = title.clone();
        }
        if update.authors.is_some() {
            self.authors = update.authors.clone();
        }
        if update.publisher.is_some() {
            self.publisher = update.publisher.clone();
        }
        if update.version.is_some() {
            self.version = update.version.clone();
        }
        if let Some((total, available)) = copies {
            self.total_copies = total;
            self.available_copies = available;
        }
        Ok(())
    }

    /// A book can only leave the inventory when every copy is back
    pub fn ensure_removable(&self) -> AppResult<()> {
        if self.available_copies != self.total_copies {
            return Err(Conflict::OutstandingLoans {
                isbn: self.isbn.clone(),
                on_loan: self.on_loan(),
            }
            .into());
        }
        Ok(())
    }
}

/// Create book request
#[derive(Debug, Clone, Deserialize, Validate, ToSchema)]
pub struct CreateBook {
    #[validate(length(min = 1, max = 32, message = "ISBN must be 1 to 32 characters"))]
    pub isbn: String,
    #[validate(length(min = 1, message = "Title is required"))]
    pub title: String,
    pub authors: Option<String>,
    pub publisher: Option<String>,
    pub version: Option<String>,
    #[validate(range(min = 0, message = "total_copies cannot be negative"))]
    pub total_copies: i32,
}

/// Update book request; absent fields are left unchanged
#[derive(Debug, Clone, Default, Deserialize, Validate, ToSchema)]
pub struct UpdateBook {
    #[validate(length(min = 1, message = "Title cannot be empty"))]
    pub title: Option<String>,
    pub authors: Option<String>,
    pub publisher: Option<String>,
    pub version: Option<String>,
    #[validate(range(min = 0, message = "total_copies cannot be negative"))]
    pub total_copies: Option<i32>,
}

/// Book search filters
#[derive(Debug, Clone, Default, Deserialize, IntoParams, ToSchema)]
#[into_params(parameter_in = Query)]
pub struct BookQuery {
    pub title: Option<String>,
    pub author: Option<String>,
    pub publisher: Option<String>,
    pub library_id: Option<i32>,
}

impl BookQuery {
    /// Case-insensitive substring match, used where SQL `ILIKE` is not available
    pub fn matches(&self, book: &Book) -> bool {
        fn contains(field: Option<&str>, needle: &Option<String>) -> bool {
            match needle {
                Some(needle) => field
                    .map(|f| f.to_lowercase().contains(&needle.to_lowercase()))
                    .unwrap_or(false),
                None => true,
            }
        }

        self.library_id.map_or(true, |id| id == book.library_id)
            && contains(Some(&book.title), &self.title)
            && contains(book.authors.as_deref(), &self.author)
            && contains(book.publisher.as_deref(), &self.publisher)
    }
}

/// Strip separators from an ISBN ("978-2-07 040850-4" -> "9782070408504")
pub fn normalize_isbn(isbn: &str) -> AppResult<String> {
    let normalized: String = isbn
        .chars()
        .filter(|c| !c.is_whitespace() && *c != '-')
        .collect();

    if normalized.is_empty() {
        return Err(AppError::Validation("ISBN is required".to_string()));
    }
    if !normalized.chars().all(|c| c.is_ascii_alphanumeric()) {
        return Err(AppError::Validation(format!("Invalid ISBN: {}", isbn)));
    }
    Ok(normalized.to_uppercase())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn book(total: i32, available: i32) -> Book {
        let now = Utc::now();
        Book {
            isbn: "123456789".to_string(),
            library_id: 1,
            title: "Test Book".to_string(),
            authors: Some("Test Author".to_string()),
            publisher: None,
            version: None,
            total_copies: total,
            available_copies: available,
            created_at: now,
            updated_at: now,
        }
    }

    #[test]
    fn test_check_out_until_exhausted() {
        let mut b = book(2, 2);
        b.check_out().unwrap();
        b.check_out().unwrap();
        assert_eq!(b.available_copies, 0);

        let err = b.check_out().unwrap_err();
        assert!(matches!(
            err,
            AppError::Conflict(Conflict::NoCopiesAvailable { .. })
        ));
        assert_eq!(b.available_copies, 0);
    }

    #[test]
    fn test_check_in_is_capped() {
        let mut b = book(2, 1);
        b.check_in().unwrap();
        assert_eq!(b.available_copies, 2);

        let err = b.check_in().unwrap_err();
        assert!(matches!(err, AppError::Conflict(Conflict::OverCapacity { .. })));
        assert_eq!(b.available_copies, 2);
    }

    #[test]
    fn test_reducing_total_keeps_loans() {
        // 5 total, 2 on loan
        let mut b = book(5, 3);
        b.apply_update(&UpdateBook {
            total_copies: Some(3),
            ..Default::default()
        })
        .unwrap();
        assert_eq!(b.total_copies, 3);
        assert_eq!(b.available_copies, 1);
    }

    #[test]
    fn test_total_below_loans_is_rejected() {
        let mut b = book(5, 3);
        let err = b
            .apply_update(&UpdateBook {
                title: Some("Renamed".to_string()),
                total_copies: Some(1),
                ..Default::default()
            })
            .unwrap_err();
        assert!(matches!(err, AppError::Validation(_)));
        // rejected edits leave the book untouched
        assert_eq!(b.title, "Test Book");
        assert_eq!(b.total_copies, 5);
        assert_eq!(b.available_copies, 3);
    }

    #[test]
    fn test_descriptive_update_keeps_counts() {
        let mut b = book(5, 5);
        b.apply_update(&UpdateBook {
            title: Some("Updated Title".to_string()),
            version: Some("2nd Edition".to_string()),
            ..Default::default()
        })
        .unwrap();
        assert_eq!(b.title, "Updated Title");
        assert_eq!(b.version.as_deref(), Some("2nd Edition"));
        assert_eq!(b.authors.as_deref(), Some("Test Author"));
        assert_eq!((b.total_copies, b.available_copies), (5, 5));
    }

    #[test]
    fn test_removable_only_when_all_copies_back() {
        assert!(book(1, 1).ensure_removable().is_ok());
        let err = book(3, 2).ensure_removable().unwrap_err();
        assert!(matches!(
            err,
            AppError::Conflict(Conflict::OutstandingLoans { on_loan: 1, .. })
        ));
    }

    #[test]
    fn test_normalize_isbn() {
        assert_eq!(normalize_isbn("978-2-07-040850-4").unwrap(), "9782070408504");
        assert_eq!(normalize_isbn("2 07 040850 x").unwrap(), "207040850X");
        assert_eq!(normalize_isbn("123456789").unwrap(), "123456789");
        assert!(normalize_isbn(" - ").is_err());
        assert!(normalize_isbn("12/34").is_err());
    }

    #[test]
    fn test_query_matches() {
        let b = book(1, 1);
        let query = BookQuery {
            title: Some("test".to_string()),
            author: Some("AUTHOR".to_string()),
            ..Default::default()
        };
        assert!(query.matches(&b));

        let query = BookQuery {
            publisher: Some("Penguin".to_string()),
            ..Default::default()
        };
        assert!(!query.matches(&b));

        let query = BookQuery {
            library_id: Some(2),
            ..Default::default()
        };
        assert!(!query.matches(&b));
    }
}
