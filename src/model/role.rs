use crate::model::capability::Capability;
use serde::{Deserialize, Serialize};
use strum_macros::{AsRefStr, Display, EnumIter, EnumString};
use utoipa::ToSchema;

#[derive(
    Debug,
    Copy,
    Clone,
    Eq,
    PartialEq,
    Hash,
    Ord,
    PartialOrd,
    Serialize,
    Deserialize,
    Display,
    EnumString,
    EnumIter,
    AsRefStr,
    ToSchema,
)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
pub enum Role {
    Employee,
    Approver,
    Super,
}

impl Role {
    /// Capabilities granted to the role when the store holds no grants yet.
    pub fn default_capabilities(&self) -> &'static [Capability] {
        use Capability::*;

        match self {
            Role::Employee => &[RequestLeave],
            Role::Approver => &[
                ViewLeaveRequests,
                RequestLeave,
                ApproveRejectLeave,
                ViewAppliersLeavesHistory,
            ],
            Role::Super => &[
                ViewLeaveRequests,
                ApproveRejectLeave,
                ViewAppliersLeavesHistory,
                ViewAllLeavesHistory,
            ],
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::str::FromStr;

    #[test]
    fn role_round_trips_through_its_name() {
        assert_eq!(Role::from_str("approver").unwrap(), Role::Approver);
        assert_eq!(Role::Super.to_string(), "super");
        assert!(Role::from_str("admin").is_err());
    }

    #[test]
    fn super_cannot_request_leave() {
        assert!(!Role::Super
            .default_capabilities()
            .contains(&Capability::RequestLeave));
        assert!(Role::Approver
            .default_capabilities()
            .contains(&Capability::RequestLeave));
        assert_eq!(Role::Employee.default_capabilities(), &[Capability::RequestLeave]);
    }
}
