use crate::accounts::{Accounts, require_super};
use crate::auth::auth::AuthUser;
use crate::auth::password::hash_password;
use crate::error::LeaveError;
use crate::model::user::{NewUser, UserRef};
use crate::models::UserReq;
use actix_web::{HttpResponse, web};
use serde::Deserialize;
use serde_json::json;
use tracing::{error, instrument};
use utoipa::ToSchema;

#[derive(Deserialize, ToSchema)]
pub struct AssignApprover {
    #[schema(example = "bob")]
    pub approver: String,
}

/// Enrols a user, optionally with an approver. Super users only.
#[utoipa::path(
    post,
    path = "/api/users",
    request_body(content = UserReq, content_type = "application/json"),
    responses(
        (status = 201, description = "User created", body = UserRef),
        (status = 400, description = "Blank credentials or unusable approver"),
        (status = 403, description = "Caller is not a super user"),
        (status = 404, description = "Approver username unknown"),
        (status = 409, description = "Username already taken")
    ),
    security(("bearer_auth" = [])),
    tag = "Users"
)]
#[instrument(name = "users_register", skip(auth, accounts, payload), fields(username = %payload.username))]
pub async fn register(
    auth: AuthUser,
    accounts: web::Data<Accounts>,
    payload: web::Json<UserReq>,
) -> actix_web::Result<HttpResponse> {
    // refuse non-super callers before paying for a hash
    require_super(&auth)?;

    let payload = payload.into_inner();
    if payload.password.is_empty() {
        return Err(LeaveError::BlankCredentials.into());
    }

    let password = hash_password(&payload.password).map_err(|e| {
        error!(error = %e, "password hashing failed");
        actix_web::error::ErrorInternalServerError("Internal Server Error")
    })?;

    let new_user = NewUser {
        username: payload.username,
        password,
        role: payload.role,
    };
    let user = accounts
        .register(&auth, new_user, payload.approver.as_deref())
        .await?;

    Ok(HttpResponse::Created().json(UserRef::from(&user)))
}

#[utoipa::path(
    put,
    path = "/api/users/{username}/approver",
    params(("username" = String, Path, description = "Applier username, any case")),
    request_body(content = AssignApprover, content_type = "application/json"),
    responses(
        (status = 200, description = "Approver assigned", body = Object,
         example = json!({"applier": 3, "approver": 2})),
        (status = 400, description = "Approver cannot approve leaves"),
        (status = 403, description = "Caller is not a super user"),
        (status = 404, description = "Unknown username")
    ),
    security(("bearer_auth" = [])),
    tag = "Users"
)]
pub async fn assign_approver(
    auth: AuthUser,
    accounts: web::Data<Accounts>,
    path: web::Path<String>,
    payload: web::Json<AssignApprover>,
) -> Result<HttpResponse, LeaveError> {
    let mapping = accounts
        .assign_approver(&auth, &path, &payload.approver)
        .await?;

    Ok(HttpResponse::Ok().json(json!({
        "applier": mapping.user,
        "approver": mapping.approver,
    })))
}
