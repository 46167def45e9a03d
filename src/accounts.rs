//! Account administration: enrolling users and mapping them to approvers.
//! Reserved for super users.

use crate::auth::permissions::PermissionGate;
use crate::error::LeaveError;
use crate::model::applier_approver::ApplierApprover;
use crate::model::capability::Capability;
use crate::model::role::Role;
use crate::model::user::{Caller, NewUser, User};
use crate::store::{RecordStore, StoreError, USER_USERNAME};
use crate::utils::username_index::UsernameIndex;
use std::sync::Arc;
use tracing::{info, warn};

pub struct Accounts {
    store: Arc<dyn RecordStore>,
    gate: Arc<PermissionGate>,
    usernames: Arc<UsernameIndex>,
}

pub fn require_super(acting: &Caller) -> Result<(), LeaveError> {
    if acting.role == Role::Super {
        return Ok(());
    }
    warn!(user_id = %acting.id, role = %acting.role, "account administration denied");
    Err(LeaveError::Forbidden)
}

impl Accounts {
    pub fn new(store: Arc<dyn RecordStore>, gate: Arc<PermissionGate>, usernames: Arc<UsernameIndex>) -> Self {
        Self {
            store,
            gate,
            usernames,
        }
    }

    async fn resolve(&self, username: &str) -> Result<User, LeaveError> {
        self.usernames
            .resolve(username)
            .await?
            .ok_or_else(|| LeaveError::UnknownUser {
                username: username.to_string(),
            })
    }

    fn check_approver(&self, applier: Option<&User>, approver: &User) -> Result<(), LeaveError> {
        if applier.is_some_and(|a| a.id == approver.id) {
            return Err(LeaveError::InvalidApprover("A user cannot be their own approver"));
        }
        if !self.gate.role_has(approver.role, Capability::ApproveRejectLeave) {
            return Err(LeaveError::InvalidApprover("Approver's role cannot approve leaves"));
        }
        Ok(())
    }

    /// Creates an account. `user.password` must already be hashed.
    ///
    /// The approver, when given, is validated before anything is written.
    pub async fn register(
        &self,
        acting: &Caller,
        mut user: NewUser,
        approver: Option<&str>,
    ) -> Result<User, LeaveError> {
        require_super(acting)?;

        user.username = user.username.trim().to_string();
        if user.username.is_empty() || user.password.is_empty() {
            return Err(LeaveError::BlankCredentials);
        }
        if !self.usernames.is_available(&user.username).await? {
            return Err(LeaveError::UsernameTaken);
        }

        let approver = match approver {
            Some(name) => {
                let approver = self.resolve(name).await?;
                self.check_approver(None, &approver)?;
                Some(approver)
            }
            None => None,
        };

        let created = match self.store.insert_user(user).await {
            Ok(u) => u,
            Err(StoreError::UniqueViolation(USER_USERNAME)) => return Err(LeaveError::UsernameTaken),
            Err(e) => return Err(e.into()),
        };
        self.usernames.record(&created).await;

        if let Some(approver) = &approver {
            self.store
                .assign_approver(ApplierApprover {
                    user: created.id,
                    approver: Some(approver.id),
                })
                .await?;
        }

        info!(
            user_id = %created.id,
            role = %created.role,
            approver = ?approver.as_ref().map(|a| a.id),
            "user registered"
        );
        Ok(created)
    }

    /// Points `applier_username` at a new approver. Leaves already filed keep
    /// the approver they were created with.
    pub async fn assign_approver(
        &self,
        acting: &Caller,
        applier_username: &str,
        approver_username: &str,
    ) -> Result<ApplierApprover, LeaveError> {
        require_super(acting)?;

        let applier = self.resolve(applier_username).await?;
        let approver = self.resolve(approver_username).await?;
        self.check_approver(Some(&applier), &approver)?;

        let mapping = ApplierApprover {
            user: applier.id,
            approver: Some(approver.id),
        };
        self.store.assign_approver(mapping).await?;

        info!(applier = %applier.id, approver = %approver.id, "approver assigned");
        Ok(mapping)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::{Fixture, in_days};

    fn new_user(username: &str, role: Role) -> NewUser {
        NewUser {
            username: username.into(),
            password: "$argon2id$placeholder".into(),
            role,
        }
    }

    #[actix_web::test]
    async fn super_registers_with_approver() {
        let fx = Fixture::new().await;

        let erin = fx
            .accounts
            .register(&fx.sam, new_user("  Erin ", Role::Employee), Some("BOB"))
            .await
            .unwrap();
        assert_eq!(erin.username, "Erin");

        let caller = Caller::from(&erin);
        let leave = fx.workflow.create(&caller, in_days(1), "moving").await.unwrap();
        assert_eq!(leave.approver, fx.bob.id);
    }

    #[actix_web::test]
    async fn usernames_are_unique_ignoring_case() {
        let fx = Fixture::new().await;

        let err = fx
            .accounts
            .register(&fx.sam, new_user("ALICE", Role::Employee), None)
            .await
            .unwrap_err();
        assert!(matches!(err, LeaveError::UsernameTaken));

        let err = fx
            .accounts
            .register(&fx.sam, new_user(" ", Role::Employee), None)
            .await
            .unwrap_err();
        assert!(matches!(err, LeaveError::BlankCredentials));
    }

    #[actix_web::test]
    async fn bad_approver_writes_nothing() {
        let fx = Fixture::new().await;

        let err = fx
            .accounts
            .register(&fx.sam, new_user("frank", Role::Employee), Some("carol"))
            .await
            .unwrap_err();
        assert!(matches!(err, LeaveError::InvalidApprover(_)));
        assert!(fx.usernames.resolve("frank").await.unwrap().is_none());
    }

    #[actix_web::test]
    async fn only_super_administers() {
        let fx = Fixture::new().await;

        let err = fx
            .accounts
            .register(&fx.bob, new_user("grace", Role::Employee), None)
            .await
            .unwrap_err();
        assert!(matches!(err, LeaveError::Forbidden));

        let err = fx
            .accounts
            .assign_approver(&fx.bob, "carol", "bob")
            .await
            .unwrap_err();
        assert!(matches!(err, LeaveError::Forbidden));
    }

    #[actix_web::test]
    async fn reassignment_applies_to_new_leaves_only() {
        let fx = Fixture::new().await;
        let before = fx.workflow.create(&fx.alice, in_days(1), "vacation").await.unwrap();

        fx.accounts.assign_approver(&fx.sam, "alice", "Dave").await.unwrap();
        let after = fx.workflow.create(&fx.alice, in_days(2), "vacation").await.unwrap();

        assert_eq!(after.approver, fx.dave.id);
        let kept = fx.workflow.get(&fx.alice, before.id).await.unwrap();
        assert_eq!(kept.approver, fx.bob.id);

        let err = fx
            .accounts
            .assign_approver(&fx.sam, "dave", "dave")
            .await
            .unwrap_err();
        assert!(matches!(err, LeaveError::InvalidApprover(_)));
        let err = fx
            .accounts
            .assign_approver(&fx.sam, "carol", "nobody")
            .await
            .unwrap_err();
        assert!(matches!(err, LeaveError::UnknownUser { .. }));
    }
}
