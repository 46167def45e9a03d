use crate::auth::jwt::verify_token;
use crate::config::Config;
use crate::model::user::{Caller, UserId};
use crate::models::TokenType;
use actix_web::{FromRequest, HttpMessage, HttpRequest, dev::Payload, error::ErrorUnauthorized, http::header, web::Data};
use futures::future::{Ready, ready};
use std::ops::Deref;

/// The caller behind a verified bearer access token.
#[derive(Debug, Clone)]
pub struct AuthUser(pub Caller);

impl Deref for AuthUser {
    type Target = Caller;

    fn deref(&self) -> &Caller {
        &self.0
    }
}

/// Why a request carries no usable identity.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AuthRejection {
    MissingHeader,
    BadEncoding,
    NotBearer,
    InvalidToken,
    NotAccessToken,
}

impl AuthRejection {
    pub fn message(&self) -> &'static str {
        match self {
            AuthRejection::MissingHeader => "Missing Authorization header",
            AuthRejection::BadEncoding => "Invalid Authorization header encoding",
            AuthRejection::NotBearer => "Authorization header must start with Bearer",
            AuthRejection::InvalidToken => "Invalid or expired token",
            AuthRejection::NotAccessToken => "Refresh tokens cannot be used for API access",
        }
    }
}

/// Verifies the bearer token in `req` and returns the caller it names.
pub fn authenticate(req: &HttpRequest, secret: &str) -> Result<AuthUser, AuthRejection> {
    let header_value = req
        .headers()
        .get(header::AUTHORIZATION)
        .ok_or(AuthRejection::MissingHeader)?
        .to_str()
        .map_err(|_| AuthRejection::BadEncoding)?;

    let token = header_value
        .strip_prefix("Bearer ")
        .ok_or(AuthRejection::NotBearer)?;

    let claims = verify_token(token, secret).map_err(|e| {
        tracing::debug!(error = %e, "token verification failed");
        AuthRejection::InvalidToken
    })?;

    if claims.token_type != TokenType::Access {
        return Err(AuthRejection::NotAccessToken);
    }

    Ok(AuthUser(Caller {
        id: UserId(claims.user_id),
        username: claims.sub,
        role: claims.role,
    }))
}

impl FromRequest for AuthUser {
    type Error = actix_web::Error;
    type Future = Ready<Result<Self, Self::Error>>;

    fn from_request(req: &HttpRequest, _: &mut Payload) -> Self::Future {
        // set by auth_middleware on protected scopes
        if let Some(user) = req.extensions().get::<AuthUser>() {
            return ready(Ok(user.clone()));
        }

        let config = match req.app_data::<Data<Config>>() {
            Some(c) => c,
            None => {
                return ready(Err(
                    actix_web::error::ErrorInternalServerError("Config missing"),
                ));
            }
        };

        ready(authenticate(req, &config.jwt_secret).map_err(|r| ErrorUnauthorized(r.message())))
    }
}
