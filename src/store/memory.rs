use super::{LEAVE_APPLIER_DATE, LeaveFilter, LeaveStore, StoreError, USER_USERNAME, UserStore};
use crate::model::applier_approver::ApplierApprover;
use crate::model::capability::Capability;
use crate::model::leave::{Leave, LeaveId, LeaveStatus, NewLeave};
use crate::model::page::PageRequest;
use crate::model::role::Role;
use crate::model::user::{NewUser, User, UserId, normalize_username};
use async_trait::async_trait;
use chrono::{DateTime, NaiveDate, Utc};
use std::collections::{BTreeMap, BTreeSet, HashMap, HashSet};
use std::sync::{Mutex, MutexGuard};

struct RefreshToken {
    user: UserId,
    revoked: bool,
}

#[derive(Default)]
struct State {
    users: BTreeMap<UserId, User>,
    /// lower-cased username -> id
    usernames: HashMap<String, UserId>,
    leaves: BTreeMap<LeaveId, Leave>,
    applier_dates: HashSet<(UserId, NaiveDate)>,
    mappings: HashMap<UserId, ApplierApprover>,
    grants: BTreeMap<Role, BTreeSet<Capability>>,
    refresh_tokens: HashMap<String, RefreshToken>,
    last_user_id: u64,
    last_leave_id: u64,
}

/// In-process record store. Every operation runs under one lock, which makes
/// the unique checks and the pending compare-and-set atomic.
#[derive(Default)]
pub struct MemoryStore {
    state: Mutex<State>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> Result<MutexGuard<'_, State>, StoreError> {
        self.state.lock().map_err(|_| StoreError::Poisoned)
    }
}

fn newest_first(a: &Leave, b: &Leave) -> std::cmp::Ordering {
    b.date_applied
        .cmp(&a.date_applied)
        .then_with(|| b.id.cmp(&a.id))
}

#[async_trait]
impl LeaveStore for MemoryStore {
    async fn insert_leave(&self, leave: NewLeave) -> Result<Leave, StoreError> {
        let mut state = self.lock()?;

        if !state.users.contains_key(&leave.applier) || !state.users.contains_key(&leave.approver) {
            return Err(StoreError::MissingReference);
        }
        if !state.applier_dates.insert((leave.applier, leave.date)) {
            return Err(StoreError::UniqueViolation(LEAVE_APPLIER_DATE));
        }

        state.last_leave_id += 1;
        let leave = leave.into_leave(LeaveId(state.last_leave_id));
        state.leaves.insert(leave.id, leave.clone());
        Ok(leave)
    }

    async fn get_leave(&self, id: LeaveId) -> Result<Option<Leave>, StoreError> {
        Ok(self.lock()?.leaves.get(&id).cloned())
    }

    async fn resolve_if_pending(
        &self,
        id: LeaveId,
        status: LeaveStatus,
        rejection_reason: Option<&str>,
    ) -> Result<bool, StoreError> {
        let mut state = self.lock()?;

        match state.leaves.get_mut(&id) {
            Some(leave) if leave.status == LeaveStatus::Pending => {
                leave.status = status;
                leave.rejection_reason = rejection_reason.map(str::to_string);
                Ok(true)
            }
            _ => Ok(false),
        }
    }

    async fn filter_leaves(
        &self,
        filter: &LeaveFilter,
        page: Option<PageRequest>,
    ) -> Result<Vec<Leave>, StoreError> {
        let state = self.lock()?;

        let mut leaves: Vec<Leave> = state
            .leaves
            .values()
            .filter(|l| filter.matches(l))
            .cloned()
            .collect();
        leaves.sort_by(newest_first);

        Ok(match page {
            Some(page) => leaves
                .into_iter()
                .skip(page.offset() as usize)
                .take(page.per_page as usize)
                .collect(),
            None => leaves,
        })
    }

    async fn count_leaves(&self, filter: &LeaveFilter) -> Result<u64, StoreError> {
        let state = self.lock()?;
        Ok(state.leaves.values().filter(|l| filter.matches(l)).count() as u64)
    }

    async fn applier_mapping(&self, applier: UserId) -> Result<Option<ApplierApprover>, StoreError> {
        Ok(self.lock()?.mappings.get(&applier).copied())
    }

    async fn assign_approver(&self, mapping: ApplierApprover) -> Result<(), StoreError> {
        let mut state = self.lock()?;

        let approver_known = mapping
            .approver
            .is_none_or(|a| state.users.contains_key(&a));
        if !state.users.contains_key(&mapping.user) || !approver_known {
            return Err(StoreError::MissingReference);
        }

        state.mappings.insert(mapping.user, mapping);
        Ok(())
    }

    async fn is_applier_of(&self, approver: UserId, applier: UserId) -> Result<bool, StoreError> {
        let state = self.lock()?;
        Ok(state
            .mappings
            .get(&applier)
            .is_some_and(|m| m.approver == Some(approver)))
    }

    async fn appliers_of(&self, approver: UserId) -> Result<Vec<User>, StoreError> {
        let state = self.lock()?;

        let mut appliers: Vec<User> = state
            .mappings
            .values()
            .filter(|m| m.approver == Some(approver))
            .filter_map(|m| state.users.get(&m.user).cloned())
            .collect();
        appliers.sort_by(|a, b| a.username.cmp(&b.username));
        Ok(appliers)
    }
}

#[async_trait]
impl UserStore for MemoryStore {
    async fn insert_user(&self, user: NewUser) -> Result<User, StoreError> {
        let mut state = self.lock()?;

        let key = normalize_username(&user.username);
        if state.usernames.contains_key(&key) {
            return Err(StoreError::UniqueViolation(USER_USERNAME));
        }

        state.last_user_id += 1;
        let user = User {
            id: UserId(state.last_user_id),
            username: user.username,
            password: user.password,
            role: user.role,
        };
        state.usernames.insert(key, user.id);
        state.users.insert(user.id, user.clone());
        Ok(user)
    }

    async fn get_user(&self, id: UserId) -> Result<Option<User>, StoreError> {
        Ok(self.lock()?.users.get(&id).cloned())
    }

    async fn find_user_by_username(&self, username: &str) -> Result<Option<User>, StoreError> {
        let state = self.lock()?;
        Ok(state
            .usernames
            .get(&normalize_username(username))
            .and_then(|id| state.users.get(id))
            .cloned())
    }

    async fn list_users(&self) -> Result<Vec<User>, StoreError> {
        let state = self.lock()?;
        let mut users: Vec<User> = state.users.values().cloned().collect();
        users.sort_by(|a, b| a.username.cmp(&b.username));
        Ok(users)
    }

    async fn sync_role_grants(&self, role: Role, capabilities: &[Capability]) -> Result<(), StoreError> {
        let mut state = self.lock()?;
        state
            .grants
            .insert(role, capabilities.iter().copied().collect());
        Ok(())
    }

    async fn role_grants(&self) -> Result<Vec<(Role, Capability)>, StoreError> {
        let state = self.lock()?;
        Ok(state
            .grants
            .iter()
            .flat_map(|(role, caps)| caps.iter().map(move |cap| (*role, *cap)))
            .collect())
    }

    async fn insert_refresh_token(
        &self,
        user: UserId,
        jti: &str,
        _expires_at: DateTime<Utc>,
    ) -> Result<(), StoreError> {
        let mut state = self.lock()?;
        if state.refresh_tokens.contains_key(jti) {
            return Err(StoreError::UniqueViolation("uq_refresh_tokens_jti"));
        }
        state
            .refresh_tokens
            .insert(jti.to_string(), RefreshToken { user, revoked: false });
        Ok(())
    }

    async fn revoke_refresh_token(&self, jti: &str) -> Result<Option<UserId>, StoreError> {
        let mut state = self.lock()?;
        match state.refresh_tokens.get_mut(jti) {
            Some(token) if !token.revoked => {
                token.revoked = true;
                Ok(Some(token.user))
            }
            _ => Ok(None),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    async fn user(store: &MemoryStore, name: &str, role: Role) -> User {
        store
            .insert_user(NewUser {
                username: name.to_string(),
                password: "x".to_string(),
                role,
            })
            .await
            .unwrap()
    }

    fn new_leave(applier: UserId, approver: UserId, date: NaiveDate, applied: DateTime<Utc>) -> NewLeave {
        NewLeave {
            applier,
            approver,
            date,
            date_applied: applied,
            reason: "vacation".to_string(),
        }
    }

    #[actix_web::test]
    async fn applier_date_pair_is_unique() {
        let store = MemoryStore::new();
        let a = user(&store, "alice", Role::Employee).await;
        let b = user(&store, "bob", Role::Approver).await;
        let date = NaiveDate::from_ymd_opt(2030, 1, 7).unwrap();

        store.insert_leave(new_leave(a.id, b.id, date, Utc::now())).await.unwrap();
        let err = store
            .insert_leave(new_leave(a.id, b.id, date, Utc::now()))
            .await
            .unwrap_err();
        assert!(matches!(err, StoreError::UniqueViolation(LEAVE_APPLIER_DATE)));

        // another applier may take the same date
        let c = user(&store, "carol", Role::Employee).await;
        store.insert_leave(new_leave(c.id, b.id, date, Utc::now())).await.unwrap();
    }

    #[actix_web::test]
    async fn resolve_is_compare_and_set() {
        let store = MemoryStore::new();
        let a = user(&store, "alice", Role::Employee).await;
        let b = user(&store, "bob", Role::Approver).await;
        let date = NaiveDate::from_ymd_opt(2030, 1, 7).unwrap();
        let leave = store.insert_leave(new_leave(a.id, b.id, date, Utc::now())).await.unwrap();

        assert!(store
            .resolve_if_pending(leave.id, LeaveStatus::Rejected, Some("busy week"))
            .await
            .unwrap());
        assert!(!store
            .resolve_if_pending(leave.id, LeaveStatus::Approved, None)
            .await
            .unwrap());

        let stored = store.get_leave(leave.id).await.unwrap().unwrap();
        assert_eq!(stored.status, LeaveStatus::Rejected);
        assert_eq!(stored.rejection_reason.as_deref(), Some("busy week"));
    }

    #[actix_web::test]
    async fn filter_orders_newest_first_and_pages() {
        let store = MemoryStore::new();
        let a = user(&store, "alice", Role::Employee).await;
        let b = user(&store, "bob", Role::Approver).await;
        let start = Utc::now();
        for day in 1..=5 {
            let date = NaiveDate::from_ymd_opt(2030, 1, day).unwrap();
            store
                .insert_leave(new_leave(a.id, b.id, date, start + Duration::minutes(day as i64)))
                .await
                .unwrap();
        }

        let filter = LeaveFilter::applier(a.id);
        let page = store
            .filter_leaves(&filter, Some(PageRequest::new(Some(2), 2)))
            .await
            .unwrap();
        let days: Vec<u32> = page.iter().map(|l| chrono::Datelike::day(&l.date)).collect();
        assert_eq!(days, vec![3, 2]);
        assert_eq!(store.count_leaves(&filter).await.unwrap(), 5);
    }

    #[actix_web::test]
    async fn usernames_are_case_insensitive() {
        let store = MemoryStore::new();
        let alice = user(&store, "Alice", Role::Employee).await;

        let found = store.find_user_by_username("ALICE").await.unwrap().unwrap();
        assert_eq!(found.id, alice.id);
        assert_eq!(found.username, "Alice");

        let err = store
            .insert_user(NewUser {
                username: "alice".into(),
                password: "x".into(),
                role: Role::Employee,
            })
            .await
            .unwrap_err();
        assert!(matches!(err, StoreError::UniqueViolation(USER_USERNAME)));
    }

    #[actix_web::test]
    async fn refresh_token_revokes_once() {
        let store = MemoryStore::new();
        let alice = user(&store, "alice", Role::Employee).await;
        store
            .insert_refresh_token(alice.id, "jti-1", Utc::now())
            .await
            .unwrap();

        assert_eq!(store.revoke_refresh_token("jti-1").await.unwrap(), Some(alice.id));
        assert_eq!(store.revoke_refresh_token("jti-1").await.unwrap(), None);
        assert_eq!(store.revoke_refresh_token("unknown").await.unwrap(), None);
    }
}
