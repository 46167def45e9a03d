use crate::api::PageQuery;
use crate::auth::auth::AuthUser;
use crate::error::LeaveError;
use crate::history::HistoryService;
use crate::model::capability::Capability;
use crate::model::leave::{Leave, LeaveId, Verdict};
use crate::model::page::Page;
use crate::model::user::UserRef;
use crate::workflow::LeaveWorkflow;
use actix_web::{HttpResponse, web};
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use serde_json::json;
use utoipa::ToSchema;

#[derive(Deserialize, ToSchema)]
pub struct CreateLeave {
    #[schema(example = "2026-10-19", format = "date", value_type = String)]
    pub date: NaiveDate,
    #[schema(example = "vacation", max_length = 50)]
    pub reason: String,
}

#[derive(Deserialize, ToSchema)]
pub struct RespondLeave {
    #[schema(example = "REJECTED")]
    pub status: Verdict,
    /// Required when rejecting
    #[schema(example = "team offsite", max_length = 50, nullable = true)]
    pub rejection_reason: Option<String>,
}

#[derive(Serialize, ToSchema)]
pub struct LeaveListResponse {
    pub data: Vec<Leave>,
    #[schema(example = 1)]
    pub page: u64,
    #[schema(example = 8)]
    pub per_page: u64,
    #[schema(example = 1)]
    pub total: u64,
}

impl From<Page<Leave>> for LeaveListResponse {
    fn from(page: Page<Leave>) -> Self {
        LeaveListResponse {
            data: page.data,
            page: page.page,
            per_page: page.per_page,
            total: page.total,
        }
    }
}

/* =========================
Create leave request
========================= */
#[utoipa::path(
    post,
    path = "/api/leave",
    request_body(content = CreateLeave, content_type = "application/json"),
    responses(
        (status = 201, description = "Leave request filed", body = Leave),
        (status = 400, description = "Past date or bad reason"),
        (status = 401, description = "Missing or invalid bearer token"),
        (status = 403, description = "Caller cannot request leave"),
        (status = 409, description = "Already applied for that date"),
        (status = 422, description = "No approver assigned")
    ),
    security(("bearer_auth" = [])),
    tag = "Leave"
)]
pub async fn create_leave(
    auth: AuthUser,
    workflow: web::Data<LeaveWorkflow>,
    payload: web::Json<CreateLeave>,
) -> Result<HttpResponse, LeaveError> {
    let leave = workflow.create(&auth, payload.date, &payload.reason).await?;
    Ok(HttpResponse::Created().json(leave))
}

/* =========================
Approve / reject
========================= */
#[utoipa::path(
    put,
    path = "/api/leave/{leave_id}/response",
    params(("leave_id" = u64, Path, description = "Leave to resolve")),
    request_body(content = RespondLeave, content_type = "application/json"),
    responses(
        (status = 200, description = "Leave resolved", body = Leave),
        (status = 400, description = "Rejection reason missing"),
        (status = 403, description = "Caller is not this leave's approver"),
        (status = 404, description = "Leave not found"),
        (status = 409, description = "Leave already resolved")
    ),
    security(("bearer_auth" = [])),
    tag = "Leave"
)]
pub async fn respond_leave(
    auth: AuthUser,
    workflow: web::Data<LeaveWorkflow>,
    path: web::Path<u64>,
    payload: web::Json<RespondLeave>,
) -> Result<HttpResponse, LeaveError> {
    let leave_id = LeaveId(path.into_inner());
    let leave = workflow
        .respond(leave_id, &auth, payload.status, payload.rejection_reason.as_deref())
        .await?;
    Ok(HttpResponse::Ok().json(leave))
}

#[utoipa::path(
    get,
    path = "/api/leave/{leave_id}",
    params(("leave_id" = u64, Path, description = "Leave to fetch")),
    responses(
        (status = 200, description = "Leave found", body = Leave),
        (status = 403, description = "Caller is neither applier nor approver"),
        (status = 404, description = "Leave not found")
    ),
    security(("bearer_auth" = [])),
    tag = "Leave"
)]
pub async fn get_leave(
    auth: AuthUser,
    workflow: web::Data<LeaveWorkflow>,
    path: web::Path<u64>,
) -> Result<HttpResponse, LeaveError> {
    let leave = workflow.get(&auth, LeaveId(path.into_inner())).await?;
    Ok(HttpResponse::Ok().json(leave))
}

#[utoipa::path(
    get,
    path = "/api/leave/approver",
    responses(
        (status = 200, description = "The approver new requests go to", body = UserRef),
        (status = 422, description = "No approver assigned")
    ),
    security(("bearer_auth" = [])),
    tag = "Leave"
)]
pub async fn assigned_approver(
    auth: AuthUser,
    workflow: web::Data<LeaveWorkflow>,
) -> Result<HttpResponse, LeaveError> {
    let approver = workflow.assigned_approver(&auth).await?;
    Ok(HttpResponse::Ok().json(UserRef::from(&approver)))
}

/// Pending requests waiting on the caller, newest first.
#[utoipa::path(
    get,
    path = "/api/leave/requests",
    params(PageQuery),
    responses(
        (status = 200, description = "Paginated pending requests", body = LeaveListResponse),
        (status = 403, description = "Caller cannot view leave requests")
    ),
    security(("bearer_auth" = [])),
    tag = "Leave"
)]
pub async fn leave_requests(
    auth: AuthUser,
    history: web::Data<HistoryService>,
    query: web::Query<PageQuery>,
) -> Result<HttpResponse, LeaveError> {
    let page = history.list_pending(&auth, query.page).await?;
    Ok(HttpResponse::Ok().json(LeaveListResponse::from(page)))
}

/// The caller's own requests, newest first.
#[utoipa::path(
    get,
    path = "/api/leave",
    params(PageQuery),
    responses(
        (status = 200, description = "Paginated own leaves", body = LeaveListResponse),
        (status = 403, description = "Caller cannot request leave")
    ),
    security(("bearer_auth" = [])),
    tag = "Leave"
)]
pub async fn applied_leaves(
    auth: AuthUser,
    history: web::Data<HistoryService>,
    query: web::Query<PageQuery>,
) -> Result<HttpResponse, LeaveError> {
    let page = history.list_own(&auth, query.page).await?;
    Ok(HttpResponse::Ok().json(LeaveListResponse::from(page)))
}

#[utoipa::path(
    get,
    path = "/api/leave/summary",
    responses(
        (status = 200, description = "Every leave the caller applied for", body = [Leave]),
        (status = 403, description = "Caller cannot request leave")
    ),
    security(("bearer_auth" = [])),
    tag = "Leave"
)]
pub async fn leave_summary(
    auth: AuthUser,
    history: web::Data<HistoryService>,
) -> Result<HttpResponse, LeaveError> {
    let leaves = history.own_summary(&auth).await?;
    Ok(HttpResponse::Ok().json(leaves))
}

/// Where a freshly logged-in user should be sent.
#[utoipa::path(
    get,
    path = "/api/landing",
    responses(
        (status = 200, description = "Landing view", body = Object, example = json!({"redirect": "applied-leaves"})),
        (status = 403, description = "Caller has no leave views")
    ),
    security(("bearer_auth" = [])),
    tag = "Leave"
)]
pub async fn landing(auth: AuthUser, history: web::Data<HistoryService>) -> Result<HttpResponse, LeaveError> {
    let gate = history.gate();
    let redirect = if gate.has_permission(&auth, Capability::RequestLeave) {
        "applied-leaves"
    } else if gate.has_permission(&auth, Capability::ViewLeaveRequests) {
        "leave-requests"
    } else {
        return Err(LeaveError::Forbidden);
    };

    Ok(HttpResponse::Ok().json(json!({ "redirect": redirect })))
}
