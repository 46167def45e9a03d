use crate::model::leave::{LeaveId, LeaveStatus, REASON_MAX_LEN};
use crate::store::StoreError;
use actix_web::{HttpResponse, ResponseError, http::StatusCode};
use chrono::NaiveDate;
use serde_json::json;
use strum_macros::IntoStaticStr;

/// Every way a leave operation can be refused.
///
/// None of these are transient, so callers never retry them.
#[derive(thiserror::Error, Debug, IntoStaticStr)]
#[strum(serialize_all = "snake_case")]
pub enum LeaveError {
    #[error("Invalid date {date}: it must be at least {today}")]
    InvalidDate { date: NaiveDate, today: NaiveDate },
    #[error("Reason must not be empty")]
    MissingReason,
    #[error("Reason must be at most {} characters", REASON_MAX_LEN)]
    ReasonTooLong,
    #[error("No approver is assigned to you")]
    NoApproverAssigned,
    #[error("Already applied for {date}")]
    DuplicateLeave { date: NaiveDate },
    #[error("Only the assigned approver may do this")]
    Unauthorized,
    #[error("Permission denied")]
    Forbidden,
    #[error("Rejection reason not mentioned")]
    MissingRejectionReason,
    #[error("Leave has already been {status}")]
    AlreadyResolved { status: LeaveStatus },
    #[error("Invalid username!")]
    UnknownUser { username: String },
    #[error("Leave {0} not found")]
    LeaveNotFound(LeaveId),
    #[error("Username already taken")]
    UsernameTaken,
    #[error("Username and password are required")]
    BlankCredentials,
    #[error("{0}")]
    InvalidApprover(&'static str),
    #[error(transparent)]
    Store(#[from] StoreError),
}

impl LeaveError {
    pub fn code(&self) -> &'static str {
        self.into()
    }
}

impl ResponseError for LeaveError {
    fn status_code(&self) -> StatusCode {
        match self {
            LeaveError::InvalidDate { .. }
            | LeaveError::MissingReason
            | LeaveError::ReasonTooLong
            | LeaveError::MissingRejectionReason
            | LeaveError::BlankCredentials
            | LeaveError::InvalidApprover(_) => StatusCode::BAD_REQUEST,
            LeaveError::NoApproverAssigned => StatusCode::UNPROCESSABLE_ENTITY,
            LeaveError::DuplicateLeave { .. }
            | LeaveError::AlreadyResolved { .. }
            | LeaveError::UsernameTaken => StatusCode::CONFLICT,
            LeaveError::Unauthorized | LeaveError::Forbidden => StatusCode::FORBIDDEN,
            LeaveError::UnknownUser { .. } | LeaveError::LeaveNotFound(_) => StatusCode::NOT_FOUND,
            LeaveError::Store(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    fn error_response(&self) -> HttpResponse {
        let message = match self {
            LeaveError::Store(e) => {
                tracing::error!(error = %e, "record store failure");
                "Internal Server Error".to_string()
            }
            other => other.to_string(),
        };

        HttpResponse::build(self.status_code()).json(json!({
            "error": message,
            "code": self.code(),
        }))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn codes_follow_variant_names() {
        assert_eq!(LeaveError::MissingRejectionReason.code(), "missing_rejection_reason");
        assert_eq!(
            LeaveError::AlreadyResolved { status: LeaveStatus::Approved }.to_string(),
            "Leave has already been APPROVED"
        );
    }

    #[test]
    fn store_failures_do_not_leak_details() {
        let err = LeaveError::Store(StoreError::Corrupt("bad status 'X'".into()));
        assert_eq!(err.status_code(), StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(err.error_response().status(), StatusCode::INTERNAL_SERVER_ERROR);
    }

    #[test]
    fn denials_are_hard_failures() {
        assert_eq!(LeaveError::Forbidden.status_code(), StatusCode::FORBIDDEN);
        assert_eq!(LeaveError::Unauthorized.status_code(), StatusCode::FORBIDDEN);
        assert_eq!(
            LeaveError::UnknownUser { username: "x".into() }.status_code(),
            StatusCode::NOT_FOUND
        );
    }
}
