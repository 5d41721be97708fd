use actix_web::{dev::Payload, Error, FromRequest, HttpRequest, HttpResponse};
use futures::future::{ready, Ready};
use serde::{Deserialize, Serialize};

use crate::utils::jwt;

/// Authenticated user extracted from the Authorization header.
/// Using it as a handler parameter makes the route protected.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AuthUser {
    pub user_id: i32,
    pub email: String,
    pub username: String,
}

/// Like `AuthUser`, but never rejects the request. Routes that work for both
/// anonymous and logged-in users (cart) take this and branch on `user`.
#[derive(Debug, Clone)]
pub struct MaybeAuthUser {
    pub user: Option<AuthUser>,
}

fn unauthorized(message: &str) -> Error {
    let response = HttpResponse::Unauthorized().json(serde_json::json!({
        "error": message
    }));
    actix_web::error::InternalError::from_response("", response).into()
}

/// Pull the bearer token out of the request and verify it. Only access
/// tokens are accepted here; refresh tokens go through /auth/token/refresh.
fn extract_user(req: &HttpRequest) -> Result<AuthUser, Error> {
    let auth_header = req
        .headers()
        .get("Authorization")
        .ok_or_else(|| unauthorized("Missing Authorization header"))?;

    let auth_str = auth_header
        .to_str()
        .map_err(|_| unauthorized("Invalid Authorization header"))?;

    let token = auth_str
        .strip_prefix("Bearer ")
        .ok_or_else(|| unauthorized("Invalid Authorization format (expected: Bearer <token>)"))?;

    let claims = jwt::verify_token(token).map_err(|e| unauthorized(&e))?;

    if claims.token_type != "access" {
        return Err(unauthorized("Refresh tokens cannot be used for API access"));
    }

    Ok(AuthUser {
        user_id: claims.sub,
        email: claims.email,
        username: claims.username,
    })
}

impl FromRequest for AuthUser {
    type Error = Error;
    type Future = Ready<Result<Self, Self::Error>>;

    fn from_request(req: &HttpRequest, _payload: &mut Payload) -> Self::Future {
        ready(extract_user(req))
    }
}

impl FromRequest for MaybeAuthUser {
    type Error = Error;
    type Future = Ready<Result<Self, Self::Error>>;

    fn from_request(req: &HttpRequest, _payload: &mut Payload) -> Self::Future {
        ready(Ok(MaybeAuthUser {
            user: extract_user(req).ok(),
        }))
    }
}
