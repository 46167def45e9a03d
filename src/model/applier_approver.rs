use crate::model::user::UserId;

/// One applier and the approver answering their leave requests.
///
/// `approver` is optional because a mapping row may exist before an approver
/// is chosen; such an applier cannot request leave yet.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ApplierApprover {
    pub user: UserId,
    pub approver: Option<UserId>,
}
