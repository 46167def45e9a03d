use crate::{
    auth::{
        jwt::{generate_access_token, generate_refresh_token, verify_token},
        password::verify_password,
    },
    config::Config,
    model::user::User,
    models::{Claims, LoginReqDto, TokenType},
    store::RecordStore,
    utils::username_index::UsernameIndex,
};
use actix_web::{HttpRequest, HttpResponse, Responder, http::header, web};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::{debug, error, info, instrument};
// auth end points

#[derive(Serialize, Deserialize)]
struct TokenPair {
    access_token: String,
    refresh_token: String,
}

fn bearer(req: &HttpRequest) -> Option<&str> {
    req.headers()
        .get(header::AUTHORIZATION)?
        .to_str()
        .ok()?
        .strip_prefix("Bearer ")
}

/// Signs a fresh access/refresh pair for `user` and records the refresh jti.
async fn issue_tokens(
    user: &User,
    store: &dyn RecordStore,
    config: &Config,
) -> Result<TokenPair, HttpResponse> {
    let access_token = generate_access_token(user, &config.jwt_secret, config.access_token_ttl).map_err(|e| {
        error!(error = %e, "Failed to sign access token");
        HttpResponse::InternalServerError().finish()
    })?;

    let (refresh_token, refresh_claims) =
        generate_refresh_token(user, &config.jwt_secret, config.refresh_token_ttl).map_err(|e| {
            error!(error = %e, "Failed to sign refresh token");
            HttpResponse::InternalServerError().finish()
        })?;

    debug!(user_id = %user.id, jti = %refresh_claims.jti, "Storing refresh token");
    let expires_at = DateTime::<Utc>::from_timestamp(refresh_claims.exp as i64, 0).unwrap_or_else(Utc::now);
    store
        .insert_refresh_token(user.id, &refresh_claims.jti, expires_at)
        .await
        .map_err(|e| {
            error!(error = %e, "Failed to store refresh token");
            HttpResponse::InternalServerError().finish()
        })?;

    Ok(TokenPair {
        access_token,
        refresh_token,
    })
}

/// Verifies that the bearer token is a refresh token.
fn refresh_claims(req: &HttpRequest, config: &Config) -> Option<Claims> {
    let claims = verify_token(bearer(req)?, &config.jwt_secret).ok()?;
    (claims.token_type == TokenType::Refresh).then_some(claims)
}

#[instrument(
    name = "auth_login",
    skip(payload, usernames, store, config),
    fields(username = %payload.username)
)]
pub async fn login(
    payload: web::Json<LoginReqDto>,
    usernames: web::Data<UsernameIndex>,
    store: web::Data<dyn RecordStore>,
    config: web::Data<Config>,
) -> impl Responder {
    info!("Login request received");

    // 1️⃣ Basic validation
    if payload.username.trim().is_empty() || payload.password.is_empty() {
        info!("Validation failed: empty username or password");
        return HttpResponse::BadRequest().body("Username or password required");
    }

    // 2️⃣ Fetch user, ignoring case
    let user = match usernames.resolve(&payload.username).await {
        Ok(Some(user)) => {
            debug!(user_id = %user.id, "User found");
            user
        }
        Ok(None) => {
            info!("Invalid credentials: user not found");
            return HttpResponse::Unauthorized().body("Invalid credentials");
        }
        Err(e) => {
            error!(error = %e, "Store error while fetching user");
            return HttpResponse::InternalServerError().finish();
        }
    };

    // 3️⃣ Verify password
    if let Err(e) = verify_password(&payload.password, &user.password) {
        info!(error = %e, "Invalid credentials: password mismatch");
        return HttpResponse::Unauthorized().body("Invalid credentials");
    }

    // 4️⃣ Tokens
    match issue_tokens(&user, store.get_ref(), &config).await {
        Ok(tokens) => {
            info!(user_id = %user.id, "Login successful");
            HttpResponse::Ok().json(tokens)
        }
        Err(resp) => resp,
    }
}

/// Rotates a refresh token: the presented one is revoked and a new pair is
/// issued. The role is re-read so a changed role takes effect here.
#[instrument(name = "auth_refresh", skip_all)]
pub async fn refresh_token(
    req: HttpRequest,
    store: web::Data<dyn RecordStore>,
    config: web::Data<Config>,
) -> impl Responder {
    let Some(claims) = refresh_claims(&req, &config) else {
        return HttpResponse::Unauthorized().finish();
    };

    // 🔥 revoke old refresh token; only one rotation can win
    let user_id = match store.revoke_refresh_token(&claims.jti).await {
        Ok(Some(user_id)) => user_id,
        Ok(None) => {
            info!(jti = %claims.jti, "Refresh token unknown or already used");
            return HttpResponse::Unauthorized().finish();
        }
        Err(e) => {
            error!(error = %e, "Failed to revoke refresh token");
            return HttpResponse::InternalServerError().finish();
        }
    };

    let user = match store.get_user(user_id).await {
        Ok(Some(user)) => user,
        Ok(None) => return HttpResponse::Unauthorized().finish(),
        Err(e) => {
            error!(error = %e, "Failed to load user for refresh");
            return HttpResponse::InternalServerError().finish();
        }
    };

    match issue_tokens(&user, store.get_ref(), &config).await {
        Ok(tokens) => HttpResponse::Ok().json(tokens),
        Err(resp) => resp,
    }
}

/// Revokes the presented refresh token. Always 204, whether or not there
/// was anything to revoke.
pub async fn logout(
    req: HttpRequest,
    store: web::Data<dyn RecordStore>,
    config: web::Data<Config>,
) -> impl Responder {
    if let Some(claims) = refresh_claims(&req, &config) {
        if let Err(e) = store.revoke_refresh_token(&claims.jti).await {
            error!(error = %e, "Failed to revoke refresh token on logout");
        }
    }

    HttpResponse::NoContent().finish()
}
