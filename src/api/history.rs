use crate::auth::auth::AuthUser;
use crate::error::LeaveError;
use crate::history::{HistoryScope, HistoryService};
use crate::model::capability::Capability;
use actix_web::{HttpResponse, web};
use serde_json::json;
use tracing::instrument;

/// Usernames whose history the caller may open.
#[utoipa::path(
    get,
    path = "/api/history/users",
    responses(
        (status = 200, description = "Sorted usernames", body = [String], example = json!(["alice", "carol"])),
        (status = 403, description = "Caller cannot view any history")
    ),
    security(("bearer_auth" = [])),
    tag = "History"
)]
pub async fn history_users(auth: AuthUser, history: web::Data<HistoryService>) -> Result<HttpResponse, LeaveError> {
    let users = history.list_scoped_users(&auth).await?;
    Ok(HttpResponse::Ok().json(users))
}

/// Full leave records of one of the caller's appliers.
#[utoipa::path(
    get,
    path = "/api/history/appliers/{username}",
    params(("username" = String, Path, description = "Applier username, any case")),
    responses(
        (status = 200, description = "Leave records, newest first", body = [crate::model::leave::Leave]),
        (status = 401, description = "Target is not one of the caller's appliers", body = Object,
         example = json!({"error": "Unauthorized to view!"})),
        (status = 403, description = "Caller cannot view appliers' history"),
        (status = 404, description = "Invalid username!")
    ),
    security(("bearer_auth" = [])),
    tag = "History"
)]
#[instrument(name = "history_appliers", skip(auth, history), fields(user_id = %auth.id))]
pub async fn appliers_history(
    auth: AuthUser,
    history: web::Data<HistoryService>,
    path: web::Path<String>,
) -> Result<HttpResponse, LeaveError> {
    history
        .gate()
        .require(&auth, Capability::ViewAppliersLeavesHistory)?;

    // with the capability in hand, a denial can only mean the target is not ours
    match history.details_for(&auth, &path, HistoryScope::Appliers).await {
        Ok(leaves) => Ok(HttpResponse::Ok().json(leaves)),
        Err(LeaveError::Forbidden) => {
            Ok(HttpResponse::Unauthorized().json(json!({ "error": "Unauthorized to view!" })))
        }
        Err(e) => Err(e),
    }
}

/// Trimmed leave records of any user.
#[utoipa::path(
    get,
    path = "/api/history/all/{username}",
    params(("username" = String, Path, description = "Username, any case")),
    responses(
        (status = 200, description = "Status, date and reasons, newest first", body = [crate::model::leave::LeaveHistoryEntry]),
        (status = 403, description = "Caller cannot view all history"),
        (status = 404, description = "Invalid username!")
    ),
    security(("bearer_auth" = [])),
    tag = "History"
)]
pub async fn all_history(
    auth: AuthUser,
    history: web::Data<HistoryService>,
    path: web::Path<String>,
) -> Result<HttpResponse, LeaveError> {
    let entries = history.details_for(&auth, &path, HistoryScope::All).await?;
    Ok(HttpResponse::Ok().json(entries))
}
