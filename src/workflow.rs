//! Leave approval workflow.
//!
//! A leave starts PENDING and is resolved exactly once, by the approver the
//! applier was mapped to when the leave was created:
//!
//! ```text
//! PENDING --respond(APPROVED)--------> APPROVED
//! PENDING --respond(REJECTED, reason)-> REJECTED
//! ```
//!
//! Both resolved states are terminal. The store's (applier, date) unique key
//! decides racing creates and the pending compare-and-set decides racing
//! responses.

use crate::auth::permissions::PermissionGate;
use crate::error::LeaveError;
use crate::model::capability::Capability;
use crate::model::leave::{Leave, LeaveId, LeaveStatus, NewLeave, REASON_MAX_LEN, Verdict};
use crate::model::user::{Caller, User};
use crate::store::{LEAVE_APPLIER_DATE, RecordStore, StoreError};
use chrono::{Local, NaiveDate, Utc};
use std::sync::Arc;
use tracing::{info, instrument, warn};

/// A leave may not start before `today`.
pub fn validate_leave_date(date: NaiveDate, today: NaiveDate) -> Result<NaiveDate, LeaveError> {
    if date < today {
        return Err(LeaveError::InvalidDate { date, today });
    }
    Ok(date)
}

fn validate_reason(reason: &str, missing: LeaveError) -> Result<&str, LeaveError> {
    let reason = reason.trim();
    if reason.is_empty() {
        return Err(missing);
    }
    if reason.chars().count() > REASON_MAX_LEN {
        return Err(LeaveError::ReasonTooLong);
    }
    Ok(reason)
}

pub struct LeaveWorkflow {
    store: Arc<dyn RecordStore>,
    gate: Arc<PermissionGate>,
}

impl LeaveWorkflow {
    pub fn new(store: Arc<dyn RecordStore>, gate: Arc<PermissionGate>) -> Self {
        Self { store, gate }
    }

    /// Files a PENDING leave for `applier` on `date`, addressed to the
    /// approver currently mapped to them.
    #[instrument(name = "leave_create", skip(self, applier, reason), fields(applier = %applier.id))]
    pub async fn create(&self, applier: &Caller, date: NaiveDate, reason: &str) -> Result<Leave, LeaveError> {
        self.gate.require(applier, Capability::RequestLeave)?;

        // a past date fails before anything else is looked at
        validate_leave_date(date, Local::now().date_naive())?;
        let reason = validate_reason(reason, LeaveError::MissingReason)?;

        let approver = self
            .store
            .applier_mapping(applier.id)
            .await?
            .and_then(|m| m.approver)
            .ok_or(LeaveError::NoApproverAssigned)?;

        let new_leave = NewLeave {
            applier: applier.id,
            approver,
            date,
            date_applied: Utc::now(),
            reason: reason.to_string(),
        };

        match self.store.insert_leave(new_leave).await {
            Ok(leave) => {
                info!(leave_id = %leave.id, approver = %approver, %date, "leave requested");
                Ok(leave)
            }
            Err(StoreError::UniqueViolation(LEAVE_APPLIER_DATE)) => {
                info!(%date, "duplicate leave request");
                Err(LeaveError::DuplicateLeave { date })
            }
            Err(e) => Err(e.into()),
        }
    }

    /// Resolves a pending leave. Only the leave's approver may call this,
    /// and only once.
    #[instrument(name = "leave_respond", skip(self, acting, rejection_reason), fields(user = %acting.id))]
    pub async fn respond(
        &self,
        leave_id: LeaveId,
        acting: &Caller,
        verdict: Verdict,
        rejection_reason: Option<&str>,
    ) -> Result<Leave, LeaveError> {
        self.gate.require(acting, Capability::ApproveRejectLeave)?;

        let leave = self
            .store
            .get_leave(leave_id)
            .await?
            .ok_or(LeaveError::LeaveNotFound(leave_id))?;

        if leave.approver != acting.id {
            warn!(approver = %leave.approver, "response from someone other than the approver");
            return Err(LeaveError::Unauthorized);
        }
        if leave.status.is_terminal() {
            return Err(LeaveError::AlreadyResolved { status: leave.status });
        }

        let rejection_reason = match verdict {
            Verdict::Rejected => Some(validate_reason(
                rejection_reason.unwrap_or_default(),
                LeaveError::MissingRejectionReason,
            )?),
            Verdict::Approved => None,
        };

        let status = LeaveStatus::from(verdict);
        if !self
            .store
            .resolve_if_pending(leave_id, status, rejection_reason)
            .await?
        {
            // someone else resolved it between our read and write
            let current = self
                .store
                .get_leave(leave_id)
                .await?
                .map(|l| l.status)
                .unwrap_or(status);
            return Err(LeaveError::AlreadyResolved { status: current });
        }

        info!(%status, "leave resolved");
        Ok(Leave {
            status,
            rejection_reason: rejection_reason.map(str::to_string),
            ..leave
        })
    }

    /// A single leave, visible to its applier, its approver and holders of
    /// `view_all_leaves_history`.
    pub async fn get(&self, caller: &Caller, leave_id: LeaveId) -> Result<Leave, LeaveError> {
        let leave = self
            .store
            .get_leave(leave_id)
            .await?
            .ok_or(LeaveError::LeaveNotFound(leave_id))?;

        let involved = leave.applier == caller.id || leave.approver == caller.id;
        if involved || self.gate.has_permission(caller, Capability::ViewAllLeavesHistory) {
            Ok(leave)
        } else {
            Err(LeaveError::Unauthorized)
        }
    }

    /// The approver new requests from `applier` would go to.
    pub async fn assigned_approver(&self, applier: &Caller) -> Result<User, LeaveError> {
        self.gate.require(applier, Capability::RequestLeave)?;

        let approver = self
            .store
            .applier_mapping(applier.id)
            .await?
            .and_then(|m| m.approver)
            .ok_or(LeaveError::NoApproverAssigned)?;

        self.store
            .get_user(approver)
            .await?
            .ok_or(LeaveError::NoApproverAssigned)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::{Fixture, in_days};
    use proptest::prelude::*;

    #[actix_web::test]
    async fn approve_then_duplicate_create() {
        let fx = Fixture::new().await;
        let monday = in_days(4);

        let leave = fx.workflow.create(&fx.alice, monday, "vacation").await.unwrap();
        assert_eq!(leave.status, LeaveStatus::Pending);
        assert_eq!(leave.approver, fx.bob.id);
        assert_eq!(leave.applier, fx.alice.id);

        let approved = fx
            .workflow
            .respond(leave.id, &fx.bob, Verdict::Approved, None)
            .await
            .unwrap();
        assert_eq!(approved.status, LeaveStatus::Approved);
        assert_eq!(approved.rejection_reason, None);

        let err = fx.workflow.create(&fx.alice, monday, "vacation").await.unwrap_err();
        assert!(matches!(err, LeaveError::DuplicateLeave { date } if date == monday));
    }

    #[actix_web::test]
    async fn past_date_is_invalid_regardless_of_other_fields() {
        let fx = Fixture::new().await;

        let err = fx.workflow.create(&fx.alice, in_days(-1), "").await.unwrap_err();
        assert!(matches!(err, LeaveError::InvalidDate { .. }));

        // carol has no approver, still the date is reported first
        let err = fx.workflow.create(&fx.carol, in_days(-30), "trip").await.unwrap_err();
        assert!(matches!(err, LeaveError::InvalidDate { .. }));
    }

    #[actix_web::test]
    async fn today_is_a_valid_date() {
        let fx = Fixture::new().await;
        let leave = fx.workflow.create(&fx.alice, in_days(0), "dentist").await.unwrap();
        assert_eq!(leave.status, LeaveStatus::Pending);
    }

    #[actix_web::test]
    async fn unmapped_employee_has_no_approver() {
        let fx = Fixture::new().await;

        let err = fx.workflow.create(&fx.carol, in_days(3), "vacation").await.unwrap_err();
        assert!(matches!(err, LeaveError::NoApproverAssigned));
        let err = fx.workflow.assigned_approver(&fx.carol).await.unwrap_err();
        assert!(matches!(err, LeaveError::NoApproverAssigned));

        let approver = fx.workflow.assigned_approver(&fx.alice).await.unwrap();
        assert_eq!(approver.id, fx.bob.id);
    }

    #[actix_web::test]
    async fn reason_is_required_and_bounded() {
        let fx = Fixture::new().await;

        let err = fx.workflow.create(&fx.alice, in_days(2), "   ").await.unwrap_err();
        assert!(matches!(err, LeaveError::MissingReason));

        let long = "x".repeat(REASON_MAX_LEN + 1);
        let err = fx.workflow.create(&fx.alice, in_days(2), &long).await.unwrap_err();
        assert!(matches!(err, LeaveError::ReasonTooLong));
    }

    #[actix_web::test]
    async fn super_cannot_request_leave() {
        let fx = Fixture::new().await;
        let err = fx.workflow.create(&fx.sam, in_days(2), "vacation").await.unwrap_err();
        assert!(matches!(err, LeaveError::Forbidden));
    }

    #[actix_web::test]
    async fn only_the_assigned_approver_may_respond() {
        let fx = Fixture::new().await;
        let leave = fx.workflow.create(&fx.alice, in_days(5), "vacation").await.unwrap();

        // dave is an approver, just not alice's
        let err = fx
            .workflow
            .respond(leave.id, &fx.dave, Verdict::Approved, None)
            .await
            .unwrap_err();
        assert!(matches!(err, LeaveError::Unauthorized));

        // an employee lacks the capability altogether
        let err = fx
            .workflow
            .respond(leave.id, &fx.alice, Verdict::Approved, None)
            .await
            .unwrap_err();
        assert!(matches!(err, LeaveError::Forbidden));

        let stored = fx.workflow.get(&fx.alice, leave.id).await.unwrap();
        assert_eq!(stored.status, LeaveStatus::Pending);
    }

    #[actix_web::test]
    async fn rejection_needs_a_reason() {
        let fx = Fixture::new().await;
        let leave = fx.workflow.create(&fx.alice, in_days(6), "vacation").await.unwrap();

        for blank in [None, Some(""), Some("  ")] {
            let err = fx
                .workflow
                .respond(leave.id, &fx.bob, Verdict::Rejected, blank)
                .await
                .unwrap_err();
            assert!(matches!(err, LeaveError::MissingRejectionReason));
        }
        let untouched = fx.workflow.get(&fx.bob, leave.id).await.unwrap();
        assert_eq!(untouched.status, LeaveStatus::Pending);
        assert_eq!(untouched.rejection_reason, None);

        let rejected = fx
            .workflow
            .respond(leave.id, &fx.bob, Verdict::Rejected, Some("out sick"))
            .await
            .unwrap();
        assert_eq!(rejected.status, LeaveStatus::Rejected);

        let stored = fx.workflow.get(&fx.alice, leave.id).await.unwrap();
        assert_eq!(stored.status, LeaveStatus::Rejected);
        assert_eq!(stored.rejection_reason.as_deref(), Some("out sick"));
    }

    #[actix_web::test]
    async fn resolved_leave_is_terminal() {
        let fx = Fixture::new().await;
        let leave = fx.workflow.create(&fx.alice, in_days(7), "vacation").await.unwrap();
        fx.workflow
            .respond(leave.id, &fx.bob, Verdict::Rejected, Some("team offsite"))
            .await
            .unwrap();

        let err = fx
            .workflow
            .respond(leave.id, &fx.bob, Verdict::Approved, None)
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            LeaveError::AlreadyResolved { status: LeaveStatus::Rejected }
        ));

        let err = fx
            .workflow
            .respond(leave.id, &fx.bob, Verdict::Rejected, Some("changed my mind"))
            .await
            .unwrap_err();
        assert!(matches!(err, LeaveError::AlreadyResolved { .. }));

        let stored = fx.workflow.get(&fx.bob, leave.id).await.unwrap();
        assert_eq!(stored.status, LeaveStatus::Rejected);
        assert_eq!(stored.rejection_reason.as_deref(), Some("team offsite"));
    }

    #[actix_web::test]
    async fn unknown_leave_is_not_found() {
        let fx = Fixture::new().await;
        let err = fx
            .workflow
            .respond(LeaveId(404), &fx.bob, Verdict::Approved, None)
            .await
            .unwrap_err();
        assert!(matches!(err, LeaveError::LeaveNotFound(LeaveId(404))));
    }

    #[actix_web::test]
    async fn leave_is_private_to_its_parties() {
        let fx = Fixture::new().await;
        let leave = fx.workflow.create(&fx.alice, in_days(8), "vacation").await.unwrap();

        assert!(fx.workflow.get(&fx.alice, leave.id).await.is_ok());
        assert!(fx.workflow.get(&fx.bob, leave.id).await.is_ok());
        assert!(fx.workflow.get(&fx.sam, leave.id).await.is_ok());
        let err = fx.workflow.get(&fx.dave, leave.id).await.unwrap_err();
        assert!(matches!(err, LeaveError::Unauthorized));
    }

    #[actix_web::test]
    async fn racing_creates_yield_one_leave() {
        let fx = Fixture::new().await;
        let date = in_days(9);

        let (a, b) = futures::join!(
            fx.workflow.create(&fx.alice, date, "vacation"),
            fx.workflow.create(&fx.alice, date, "vacation"),
        );
        let outcomes = [a, b];
        assert_eq!(outcomes.iter().filter(|r| r.is_ok()).count(), 1);
        assert!(outcomes
            .iter()
            .any(|r| matches!(r, Err(LeaveError::DuplicateLeave { .. }))));
    }

    #[actix_web::test]
    async fn racing_responses_resolve_once() {
        let fx = Fixture::new().await;
        let leave = fx.workflow.create(&fx.alice, in_days(10), "vacation").await.unwrap();

        let (a, b) = futures::join!(
            fx.workflow.respond(leave.id, &fx.bob, Verdict::Approved, None),
            fx.workflow.respond(leave.id, &fx.bob, Verdict::Rejected, Some("no cover")),
        );
        let outcomes = [a, b];
        assert_eq!(outcomes.iter().filter(|r| r.is_ok()).count(), 1);
        assert!(outcomes
            .iter()
            .any(|r| matches!(r, Err(LeaveError::AlreadyResolved { .. }))));
    }

    #[test]
    fn date_validation_boundary() {
        let today = NaiveDate::from_ymd_opt(2026, 10, 15).unwrap();
        assert!(validate_leave_date(today, today).is_ok());
        assert!(validate_leave_date(today.succ_opt().unwrap(), today).is_ok());
        assert!(matches!(
            validate_leave_date(today.pred_opt().unwrap(), today),
            Err(LeaveError::InvalidDate { .. })
        ));
    }

    proptest! {
        #![proptest_config(ProptestConfig::with_cases(32))]

        /// Any past date is refused, whatever the reason says.
        #[test]
        fn past_dates_always_invalid(days_ago in 1i64..2000, reason in ".{0,60}") {
            let outcome = actix_web::rt::System::new().block_on(async {
                let fx = Fixture::new().await;
                fx.workflow.create(&fx.alice, in_days(-days_ago), &reason).await
            });
            let refused = matches!(outcome, Err(LeaveError::InvalidDate { .. }));
            prop_assert!(refused, "got {:?}", outcome);
        }

        /// Each distinct future date books exactly once.
        #[test]
        fn each_date_books_once(offsets in prop::collection::vec(0i64..60, 1..12)) {
            let (successes, duplicates, distinct) = actix_web::rt::System::new().block_on(async {
                let fx = Fixture::new().await;
                let mut successes = 0usize;
                let mut duplicates = 0usize;
                for offset in &offsets {
                    match fx.workflow.create(&fx.alice, in_days(*offset), "vacation").await {
                        Ok(_) => successes += 1,
                        Err(LeaveError::DuplicateLeave { .. }) => duplicates += 1,
                        Err(e) => panic!("unexpected error: {e}"),
                    }
                }
                let distinct: std::collections::HashSet<_> = offsets.iter().collect();
                (successes, duplicates, distinct.len())
            });
            prop_assert_eq!(successes, distinct);
            prop_assert_eq!(duplicates, offsets.len() - distinct);
        }
    }
}
