use serde::{Deserialize, Serialize};
use strum_macros::{AsRefStr, Display, EnumIter, EnumString};
use utoipa::ToSchema;

/// A named permission gating one operation.
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
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum Capability {
    ViewLeaveRequests,
    RequestLeave,
    ApproveRejectLeave,
    ViewAppliersLeavesHistory,
    ViewAllLeavesHistory,
}

impl Capability {
    pub fn description(&self) -> &'static str {
        match self {
            Capability::ViewLeaveRequests => "Can view appliers leave requests",
            Capability::RequestLeave => "Can request leave to its approver",
            Capability::ApproveRejectLeave => "Can approve its appliers leaves",
            Capability::ViewAppliersLeavesHistory => "Can view its appliers leaves history",
            Capability::ViewAllLeavesHistory => "Can view all leaves history",
        }
    }
}
