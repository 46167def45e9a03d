use crate::model::user::UserId;
use chrono::{DateTime, NaiveDate, Utc};
use derive_more::{Display, From};
use serde::{Deserialize, Serialize};
use strum_macros::{AsRefStr, EnumString, IntoStaticStr};
use utoipa::ToSchema;

/// Upper bound on `reason` and `rejection_reason`.
pub const REASON_MAX_LEN: usize = 50;

#[derive(
    Debug, Copy, Clone, Eq, PartialEq, Hash, Ord, PartialOrd, Serialize, Deserialize, Display, From, ToSchema,
)]
#[serde(transparent)]
pub struct LeaveId(pub u64);

#[derive(
    Debug,
    Copy,
    Clone,
    Eq,
    PartialEq,
    Serialize,
    Deserialize,
    strum_macros::Display,
    EnumString,
    AsRefStr,
    IntoStaticStr,
    ToSchema,
)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
#[strum(serialize_all = "SCREAMING_SNAKE_CASE")]
pub enum LeaveStatus {
    Pending,
    Approved,
    Rejected,
}

impl LeaveStatus {
    /// APPROVED and REJECTED admit no further transition.
    pub fn is_terminal(&self) -> bool {
        !matches!(self, LeaveStatus::Pending)
    }
}

/// The outcome an approver may give a pending leave.
#[derive(Debug, Copy, Clone, Eq, PartialEq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Verdict {
    Approved,
    Rejected,
}

impl From<Verdict> for LeaveStatus {
    fn from(verdict: Verdict) -> Self {
        match verdict {
            Verdict::Approved => LeaveStatus::Approved,
            Verdict::Rejected => LeaveStatus::Rejected,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[schema(example = json!({
    "id": 1,
    "applier": 3,
    "approver": 2,
    "date": "2026-10-19",
    "date_applied": "2026-10-15T09:30:00Z",
    "reason": "vacation",
    "rejection_reason": null,
    "status": "PENDING"
}))]
pub struct Leave {
    #[schema(value_type = u64)]
    pub id: LeaveId,
    #[schema(value_type = u64)]
    pub applier: UserId,
    #[schema(value_type = u64)]
    pub approver: UserId,
    #[schema(example = "2026-10-19", format = "date", value_type = String)]
    pub date: NaiveDate,
    #[schema(example = "2026-10-15T09:30:00Z", format = "date-time", value_type = String)]
    pub date_applied: DateTime<Utc>,
    pub reason: String,
    #[schema(nullable = true)]
    pub rejection_reason: Option<String>,
    pub status: LeaveStatus,
}

/// A leave about to be inserted; the store assigns the id.
#[derive(Debug, Clone)]
pub struct NewLeave {
    pub applier: UserId,
    pub approver: UserId,
    pub date: NaiveDate,
    pub date_applied: DateTime<Utc>,
    pub reason: String,
}

impl NewLeave {
    pub fn into_leave(self, id: LeaveId) -> Leave {
        Leave {
            id,
            applier: self.applier,
            approver: self.approver,
            date: self.date,
            date_applied: self.date_applied,
            reason: self.reason,
            rejection_reason: None,
            status: LeaveStatus::Pending,
        }
    }
}

/// Leave fields exposed by the system-wide history view.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
pub struct LeaveHistoryEntry {
    pub status: LeaveStatus,
    #[schema(example = "2026-10-19", format = "date", value_type = String)]
    pub date: NaiveDate,
    pub reason: String,
    #[schema(nullable = true)]
    pub rejection_reason: Option<String>,
}

impl From<Leave> for LeaveHistoryEntry {
    fn from(leave: Leave) -> Self {
        LeaveHistoryEntry {
            status: leave.status,
            date: leave.date,
            reason: leave.reason,
            rejection_reason: leave.rejection_reason,
        }
    }
}
