use crate::api::leave::{CreateLeave, LeaveListResponse, RespondLeave};
use crate::api::users::AssignApprover;
use crate::model::leave::{Leave, LeaveHistoryEntry, LeaveStatus, Verdict};
use crate::model::role::Role;
use crate::model::user::UserRef;
use crate::models::UserReq;
use utoipa::openapi::security::{HttpAuthScheme, HttpBuilder, SecurityScheme};
use utoipa::{Modify, OpenApi};

#[derive(OpenApi)]
#[openapi(
    info(
        title = "Leave Tracker API",
        version = "1.0.0",
        description = r#"
## Leave Tracker

Employees file leave requests with their assigned approver; approvers accept or
reject them once; higher roles browse leave history.

### 🔹 Key Features
- **Leave requests**
  - Apply for a date, see the assigned approver, list own requests
- **Approvals**
  - List pending requests, approve, or reject with a reason
- **History**
  - Browse appliers' history, or everyone's as a super user
- **Accounts**
  - Super users enrol users and assign approvers

### 🔐 Security
Endpoints under `/api` require a **JWT Bearer** access token from `/auth/login`.

---
Built with **Rust**, **Actix Web**, **SQLx**, and **Utoipa**.
"#,
    ),
    paths(
        crate::api::leave::create_leave,
        crate::api::leave::respond_leave,
        crate::api::leave::get_leave,
        crate::api::leave::assigned_approver,
        crate::api::leave::leave_requests,
        crate::api::leave::applied_leaves,
        crate::api::leave::leave_summary,
        crate::api::leave::landing,

        crate::api::history::history_users,
        crate::api::history::appliers_history,
        crate::api::history::all_history,

        crate::api::users::register,
        crate::api::users::assign_approver
    ),
    components(
        schemas(
            Leave,
            LeaveStatus,
            Verdict,
            LeaveHistoryEntry,
            LeaveListResponse,
            CreateLeave,
            RespondLeave,
            Role,
            UserRef,
            UserReq,
            AssignApprover
        )
    ),
    modifiers(&SecurityAddon),
    tags(
        (name = "Leave", description = "Leave requests and approvals"),
        (name = "History", description = "Leave history views"),
        (name = "Users", description = "Account administration"),
    )
)]
pub struct ApiDoc;

struct SecurityAddon;

impl Modify for SecurityAddon {
    fn modify(&self, openapi: &mut utoipa::openapi::OpenApi) {
        if let Some(components) = openapi.components.as_mut() {
            components.add_security_scheme(
                "bearer_auth",
                SecurityScheme::Http(
                    HttpBuilder::new()
                        .scheme(HttpAuthScheme::Bearer)
                        .bearer_format("JWT")
                        .build(),
                ),
            );
        }
    }
}
