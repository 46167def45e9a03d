//! Read-only views over leaves, scoped by who is asking.

use crate::auth::permissions::PermissionGate;
use crate::error::LeaveError;
use crate::model::capability::Capability;
use crate::model::leave::{Leave, LeaveHistoryEntry};
use crate::model::page::{Page, PageRequest};
use crate::model::user::{Caller, User};
use crate::store::{LeaveFilter, RecordStore};
use crate::utils::username_index::UsernameIndex;
use serde::Serialize;
use std::collections::BTreeSet;
use std::sync::Arc;

/// Which history endpoint a details lookup comes through.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HistoryScope {
    /// An approver looking at one of their appliers; full records.
    Appliers,
    /// System-wide history; records trimmed to status, date and reasons.
    All,
}

/// Serialized bare, as a plain JSON array.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(untagged)]
pub enum LeaveHistory {
    Full(Vec<Leave>),
    Summary(Vec<LeaveHistoryEntry>),
}

pub struct HistoryService {
    store: Arc<dyn RecordStore>,
    gate: Arc<PermissionGate>,
    usernames: Arc<UsernameIndex>,
    page_size: u64,
}

impl HistoryService {
    pub fn new(
        store: Arc<dyn RecordStore>,
        gate: Arc<PermissionGate>,
        usernames: Arc<UsernameIndex>,
        page_size: u64,
    ) -> Self {
        Self {
            store,
            gate,
            usernames,
            page_size,
        }
    }

    pub fn gate(&self) -> &PermissionGate {
        &self.gate
    }

    async fn page_of(&self, filter: LeaveFilter, page: Option<u64>) -> Result<Page<Leave>, LeaveError> {
        let request = PageRequest::new(page, self.page_size);
        let total = self.store.count_leaves(&filter).await?;
        let data = self.store.filter_leaves(&filter, Some(request)).await?;

        Ok(Page {
            data,
            page: request.page,
            per_page: request.per_page,
            total,
        })
    }

    /// Pending requests addressed to `approver`, newest first.
    pub async fn list_pending(&self, approver: &Caller, page: Option<u64>) -> Result<Page<Leave>, LeaveError> {
        self.gate.require(approver, Capability::ViewLeaveRequests)?;
        self.page_of(LeaveFilter::pending_for(approver.id), page).await
    }

    /// Everything `applier` has requested, newest first.
    pub async fn list_own(&self, applier: &Caller, page: Option<u64>) -> Result<Page<Leave>, LeaveError> {
        self.gate.require(applier, Capability::RequestLeave)?;
        self.page_of(LeaveFilter::applier(applier.id), page).await
    }

    /// Unpaginated own history, for the calendar view.
    pub async fn own_summary(&self, applier: &Caller) -> Result<Vec<Leave>, LeaveError> {
        self.gate.require(applier, Capability::RequestLeave)?;
        Ok(self
            .store
            .filter_leaves(&LeaveFilter::applier(applier.id), None)
            .await?)
    }

    /// Usernames whose history `caller` may browse.
    pub async fn list_scoped_users(&self, caller: &Caller) -> Result<BTreeSet<String>, LeaveError> {
        let users = if self.gate.has_permission(caller, Capability::ViewAllLeavesHistory) {
            self.store.list_users().await?
        } else if self
            .gate
            .has_permission(caller, Capability::ViewAppliersLeavesHistory)
        {
            self.store.appliers_of(caller.id).await?
        } else {
            tracing::warn!(user_id = %caller.id, "history listing denied");
            return Err(LeaveError::Forbidden);
        };

        Ok(users.into_iter().map(|u| u.username).collect())
    }

    async fn resolve(&self, username: &str) -> Result<User, LeaveError> {
        self.usernames
            .resolve(username)
            .await?
            .ok_or_else(|| LeaveError::UnknownUser {
                username: username.to_string(),
            })
    }

    /// Full leave history of `target_username` as seen through `scope`.
    ///
    /// Capability denial is checked before the lookup, so an unknown name
    /// never leaks to a caller who could not see it anyway.
    pub async fn details_for(
        &self,
        caller: &Caller,
        target_username: &str,
        scope: HistoryScope,
    ) -> Result<LeaveHistory, LeaveError> {
        let required = match scope {
            HistoryScope::Appliers => Capability::ViewAppliersLeavesHistory,
            HistoryScope::All => Capability::ViewAllLeavesHistory,
        };
        self.gate.require(caller, required)?;

        let target = self.resolve(target_username).await?;

        if scope == HistoryScope::Appliers
            && !self.gate.has_permission(caller, Capability::ViewAllLeavesHistory)
            && !self.store.is_applier_of(caller.id, target.id).await?
        {
            tracing::warn!(
                user_id = %caller.id,
                target = %target.id,
                "history details requested for a user outside the caller's appliers"
            );
            return Err(LeaveError::Forbidden);
        }

        let leaves = self
            .store
            .filter_leaves(&LeaveFilter::applier(target.id), None)
            .await?;

        Ok(match scope {
            HistoryScope::Appliers => LeaveHistory::Full(leaves),
            HistoryScope::All => LeaveHistory::Summary(leaves.into_iter().map(Into::into).collect()),
        })
    }
}
