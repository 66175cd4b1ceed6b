//! Issue/return request ledger model

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use utoipa::ToSchema;
use validator::Validate;

use crate::error::{AppError, AppResult, Conflict};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "lowercase")]
pub enum RequestType {
    Issue,
    Return,
}

impl RequestType {
    pub fn as_str(&self) -> &'static str {
        match self {
            RequestType::Issue => "issue",
            RequestType::Return => "return",
        }
    }
}

impl std::fmt::Display for RequestType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl std::str::FromStr for RequestType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "issue" => Ok(RequestType::Issue),
            "return" => Ok(RequestType::Return),
            _ => Err(format!("Invalid request type: {}", s)),
        }
    }
}

/// Approval state. Disapproved requests are deleted, so they have no state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(tag = "status", rename_all = "lowercase")]
pub enum RequestState {
    Pending,
    Approved {
        approver_id: i32,
        approved_at: DateTime<Utc>,
    },
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
pub struct RequestEvent {
    pub id: i32,
    pub isbn: String,
    pub library_id: i32,
    pub reader_id: i32,
    pub request_type: RequestType,
    pub request_date: DateTime<Utc>,
    #[serde(flatten)]
    pub state: RequestState,
}

impl RequestEvent {
    pub fn is_pending(&self) -> bool {
        self.state == RequestState::Pending
    }

    pub fn ensure_pending(&self) -> AppResult<()> {
        match self.state {
            RequestState::Pending => Ok(()),
            RequestState::Approved { .. } => Err(Conflict::AlreadyApproved(self.id).into()),
        }
    }

    /// Pending -> Approved
    pub fn approve(&mut self, approver_id: i32, approved_at: DateTime<Utc>) -> AppResult<()> {
        self.ensure_pending()?;
        self.state = RequestState::Approved {
            approver_id,
            approved_at,
        };
        Ok(())
    }

    /// Whether this request concerns the given (reader, book, library) tuple
    pub fn concerns(&self, reader_id: i32, isbn: &str, library_id: i32) -> bool {
        self.reader_id == reader_id && self.isbn == isbn && self.library_id == library_id
    }
}

/// Raw `request_events` row, approval encoded as nullable columns
#[derive(Debug, Clone, FromRow)]
pub struct RequestEventRow {
    pub id: i32,
    pub book_id: String,
    pub library_id: i32,
    pub reader_id: i32,
    pub request_type: String,
    pub request_date: DateTime<Utc>,
    pub approval_date: Option<DateTime<Utc>>,
    pub approver_id: Option<i32>,
}

impl TryFrom<RequestEventRow> for RequestEvent {
    type Error = AppError;

    fn try_from(row: RequestEventRow) -> Result<Self, Self::Error> {
        let state = match (row.approval_date, row.approver_id) {
            (None, None) => RequestState::Pending,
            (Some(approved_at), Some(approver_id)) => RequestState::Approved {
                approver_id,
                approved_at,
            },
            _ => {
                return Err(AppError::Internal(format!(
                    "Request {} has a partial approval",
                    row.id
                )))
            }
        };

        Ok(RequestEvent {
            id: row.id,
            isbn: row.book_id,
            library_id: row.library_id,
            reader_id: row.reader_id,
            request_type: row.request_type.parse().map_err(AppError::Internal)?,
            request_date: row.request_date,
            state,
        })
    }
}

/// Issue request body
#[derive(Debug, Clone, Deserialize, Validate, ToSchema)]
pub struct IssueRequest {
    #[validate(length(min = 1, message = "ISBN is required"))]
    pub isbn: String,
    #[serde(alias = "libraryid")]
    pub library_id: i32,
}

/// What a return refers to
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ReturnTarget {
    /// An approved issue request
    Request(i32),
    /// The caller's own loan of this book
    Book { isbn: String, library_id: i32 },
}

/// Return request body: either `request_id`, or `isbn` with `library_id`
#[derive(Debug, Clone, Deserialize, ToSchema)]
pub struct ReturnRequest {
    pub request_id: Option<i32>,
    pub isbn: Option<String>,
    #[serde(alias = "libraryid")]
    pub library_id: Option<i32>,
}

impl TryFrom<ReturnRequest> for ReturnTarget {
    type Error = AppError;

    fn try_from(body: ReturnRequest) -> Result<Self, Self::Error> {
        match body {
            ReturnRequest {
                request_id: Some(id),
                isbn: None,
                library_id: None,
            } => Ok(ReturnTarget::Request(id)),
            ReturnRequest {
                request_id: None,
                isbn: Some(isbn),
                library_id: Some(library_id),
            } => Ok(ReturnTarget::Book { isbn, library_id }),
            _ => Err(AppError::Validation(
                "Either request_id, or isbn and library_id, is required".to_string(),
            )),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn row(approval_date: Option<DateTime<Utc>>, approver_id: Option<i32>) -> RequestEventRow {
        RequestEventRow {
            id: 1,
            book_id: "123456789".to_string(),
            library_id: 1,
            reader_id: 2,
            request_type: "issue".to_string(),
            request_date: Utc::now(),
            approval_date,
            approver_id,
        }
    }

    #[test]
    fn test_row_to_state() {
        let pending = RequestEvent::try_from(row(None, None)).unwrap();
        assert!(pending.is_pending());
        assert_eq!(pending.isbn, "123456789");
        assert_eq!(pending.request_type, RequestType::Issue);

        let at = Utc::now();
        let approved = RequestEvent::try_from(row(Some(at), Some(5))).unwrap();
        assert_eq!(
            approved.state,
            RequestState::Approved {
                approver_id: 5,
                approved_at: at
            }
        );
    }

    #[test]
    fn test_partial_approval_is_corrupt() {
        assert!(matches!(
            RequestEvent::try_from(row(Some(Utc::now()), None)),
            Err(AppError::Internal(_))
        ));
        assert!(matches!(
            RequestEvent::try_from(row(None, Some(3))),
            Err(AppError::Internal(_))
        ));
    }

    #[test]
    fn test_approve_once() {
        let mut request = RequestEvent::try_from(row(None, None)).unwrap();
        request.approve(9, Utc::now()).unwrap();
        assert!(!request.is_pending());

        let err = request.approve(9, Utc::now()).unwrap_err();
        assert!(matches!(err, AppError::Conflict(Conflict::AlreadyApproved(1))));
    }

    #[test]
    fn test_state_serialization() {
        let request = RequestEvent::try_from(row(None, None)).unwrap();
        let json = serde_json::to_value(&request).unwrap();
        assert_eq!(json["status"], "pending");
        assert_eq!(json["request_type"], "issue");
        assert!(json.get("approver_id").is_none());

        let request = RequestEvent::try_from(row(Some(Utc::now()), Some(4))).unwrap();
        let json = serde_json::to_value(&request).unwrap();
        assert_eq!(json["status"], "approved");
        assert_eq!(json["approver_id"], 4);
    }

    #[test]
    fn test_return_target() {
        let target = ReturnTarget::try_from(ReturnRequest {
            request_id: Some(3),
            isbn: None,
            library_id: None,
        })
        .unwrap();
        assert_eq!(target, ReturnTarget::Request(3));

        let target = ReturnTarget::try_from(ReturnRequest {
            request_id: None,
            isbn: Some("123".to_string()),
            library_id: Some(1),
        })
        .unwrap();
        assert_eq!(
            target,
            ReturnTarget::Book {
                isbn: "123".to_string(),
                library_id: 1
            }
        );

        assert!(ReturnTarget::try_from(ReturnRequest {
            request_id: Some(3),
            isbn: Some("123".to_string()),
            library_id: None,
        })
        .is_err());
    }
}
