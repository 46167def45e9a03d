//! Record store seam.
//!
//! The workflow and history services only talk to storage through these
//! traits. `mysql::MySqlStore` is the durable implementation;
//! `memory::MemoryStore` keeps everything in process for tests and local demos.

pub mod memory;
pub mod mysql;

use crate::model::applier_approver::ApplierApprover;
use crate::model::capability::Capability;
use crate::model::leave::{Leave, LeaveId, LeaveStatus, NewLeave};
use crate::model::page::PageRequest;
use crate::model::role::Role;
use crate::model::user::{NewUser, User, UserId};
use async_trait::async_trait;
use chrono::{DateTime, Utc};

#[derive(thiserror::Error, Debug)]
pub enum StoreError {
    /// A unique constraint rejected the write; carries the constraint name.
    #[error("unique constraint `{0}` violated")]
    UniqueViolation(&'static str),
    #[error("referenced record does not exist")]
    MissingReference,
    #[error(transparent)]
    Database(#[from] sqlx::Error),
    #[error(transparent)]
    Migrate(#[from] sqlx::migrate::MigrateError),
    #[error("corrupt record: {0}")]
    Corrupt(String),
    #[error("store lock poisoned")]
    Poisoned,
}

/// Constraint names reported through [`StoreError::UniqueViolation`].
pub const LEAVE_APPLIER_DATE: &str = "uq_leaves_applier_date";
pub const USER_USERNAME: &str = "uq_users_username_lower";

/// Conjunction of equality filters over leaves.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct LeaveFilter {
    pub applier: Option<UserId>,
    pub approver: Option<UserId>,
    pub status: Option<LeaveStatus>,
}

impl LeaveFilter {
    pub fn applier(applier: UserId) -> Self {
        LeaveFilter {
            applier: Some(applier),
            ..Default::default()
        }
    }

    pub fn pending_for(approver: UserId) -> Self {
        LeaveFilter {
            approver: Some(approver),
            status: Some(LeaveStatus::Pending),
            ..Default::default()
        }
    }

    pub fn matches(&self, leave: &Leave) -> bool {
        self.applier.is_none_or(|a| leave.applier == a)
            && self.approver.is_none_or(|a| leave.approver == a)
            && self.status.is_none_or(|s| leave.status == s)
    }
}

#[async_trait]
pub trait LeaveStore: Send + Sync {
    /// Inserts a PENDING leave. Fails with `UniqueViolation(LEAVE_APPLIER_DATE)`
    /// when the applier already holds a leave on that date.
    async fn insert_leave(&self, leave: NewLeave) -> Result<Leave, StoreError>;

    async fn get_leave(&self, id: LeaveId) -> Result<Option<Leave>, StoreError>;

    /// Writes `status` and `rejection_reason` only if the leave is still
    /// PENDING. Returns whether the write happened.
    async fn resolve_if_pending(
        &self,
        id: LeaveId,
        status: LeaveStatus,
        rejection_reason: Option<&str>,
    ) -> Result<bool, StoreError>;

    /// Matching leaves, newest `date_applied` first.
    async fn filter_leaves(
        &self,
        filter: &LeaveFilter,
        page: Option<PageRequest>,
    ) -> Result<Vec<Leave>, StoreError>;

    async fn count_leaves(&self, filter: &LeaveFilter) -> Result<u64, StoreError>;

    async fn applier_mapping(&self, applier: UserId) -> Result<Option<ApplierApprover>, StoreError>;

    /// Creates or replaces the mapping for `mapping.user`.
    async fn assign_approver(&self, mapping: ApplierApprover) -> Result<(), StoreError>;

    async fn is_applier_of(&self, approver: UserId, applier: UserId) -> Result<bool, StoreError>;

    /// Users whose approver is `approver`, ordered by username.
    async fn appliers_of(&self, approver: UserId) -> Result<Vec<User>, StoreError>;
}

#[async_trait]
pub trait UserStore: Send + Sync {
    /// Fails with `UniqueViolation(USER_USERNAME)` when the lower-cased
    /// username is taken.
    async fn insert_user(&self, user: NewUser) -> Result<User, StoreError>;

    async fn get_user(&self, id: UserId) -> Result<Option<User>, StoreError>;

    /// Case-insensitive lookup through the lower-cased username index.
    async fn find_user_by_username(&self, username: &str) -> Result<Option<User>, StoreError>;

    /// All users, ordered by username.
    async fn list_users(&self) -> Result<Vec<User>, StoreError>;

    /// Replaces the capability set recorded for `role`.
    async fn sync_role_grants(&self, role: Role, capabilities: &[Capability]) -> Result<(), StoreError>;

    async fn role_grants(&self) -> Result<Vec<(Role, Capability)>, StoreError>;

    async fn insert_refresh_token(
        &self,
        user: UserId,
        jti: &str,
        expires_at: DateTime<Utc>,
    ) -> Result<(), StoreError>;

    /// Marks a live token revoked. Returns the owner if this call revoked it,
    /// `None` if it was unknown or already revoked.
    async fn revoke_refresh_token(&self, jti: &str) -> Result<Option<UserId>, StoreError>;
}

pub trait RecordStore: LeaveStore + UserStore {}

impl<T: LeaveStore + UserStore> RecordStore for T {}
