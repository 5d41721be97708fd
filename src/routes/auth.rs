use actix_web::{web, HttpResponse};
use sea_orm::{DatabaseConnection, EntityTrait, QueryFilter, ColumnTrait, Set, ActiveModelTrait};
use serde::{Deserialize, Serialize};
use validator::Validate;
use chrono::Utc;
use std::env;

use crate::models::users::{Entity as Users, Column as UserColumn, ActiveModel as UserActiveModel};
use crate::models::profiles;
use crate::utils::{ids, jwt, password};
use crate::middleware::AuthUser;

#[derive(Deserialize, Validate)]
pub struct RegisterRequest {
    pub full_name: String,
    #[validate(email)]
    pub email: String,
    #[validate(length(min = 8, message = "Password must be at least 8 characters"))]
    pub password: String,
    #[validate(must_match(other = "password", message = "Passwords do not match"))]
    pub password2: String,
}

#[derive(Deserialize)]
pub struct LoginRequest {
    pub email: String,
    pub password: String,
}

#[derive(Deserialize)]
pub struct RefreshRequest {
    pub refresh: String,
}

#[derive(Deserialize)]
pub struct ChangePasswordRequest {
    pub old_password: String,
    pub new_password: String,
}

#[derive(Deserialize)]
pub struct PasswordResetConfirmRequest {
    pub otp: String,
    pub user_id: i32,
    pub password: String,
}

#[derive(Serialize)]
pub struct AuthResponse {
    pub access: String,
    pub refresh: String,
    pub user_id: i32,
    pub email: String,
    pub username: String,
    pub full_name: String,
}

/// Issue an access/refresh pair and persist the refresh token on the user.
async fn issue_tokens(
    db: &DatabaseConnection,
    user: crate::models::users::Model,
) -> Result<AuthResponse, String> {
    let access = jwt::generate_access_token(user.id, &user.email, &user.username)?;
    let refresh = jwt::generate_refresh_token(user.id, &user.email, &user.username)?;

    let user_id = user.id;
    let email = user.email.clone();
    let username = user.username.clone();
    let full_name = user.full_name.clone();

    let mut active: UserActiveModel = user.into();
    active.refresh_token = Set(Some(refresh.clone()));
    active
        .update(db)
        .await
        .map_err(|e| format!("Failed to store refresh token: {}", e))?;

    Ok(AuthResponse {
        access,
        refresh,
        user_id,
        email,
        username,
        full_name,
    })
}

/// POST /auth/register - Create an account (PUBLIC)
pub async fn register(
    body: web::Json<RegisterRequest>,
    db: web::Data<DatabaseConnection>,
) -> HttpResponse {
    if let Err(errors) = body.validate() {
        return HttpResponse::BadRequest().json(errors);
    }

    // 1. Reject duplicate emails
    match Users::find()
        .filter(UserColumn::Email.eq(&body.email))
        .one(db.get_ref())
        .await
    {
        Ok(Some(_)) => {
            return HttpResponse::Conflict().json(serde_json::json!({
                "error": "Email already registered"
            }));
        }
        Err(e) => {
            return HttpResponse::InternalServerError().json(serde_json::json!({
                "error": format!("Database error: {}", e)
            }));
        }
        _ => {}
    }

    // 2. Username defaults to the email prefix; pick a suffixed variant if taken
    let mut username = ids::username_from_email(&body.email);
    match Users::find()
        .filter(UserColumn::Username.eq(&username))
        .one(db.get_ref())
        .await
    {
        Ok(Some(_)) => {
            username = format!("{}-{}", username, ids::generate_public_id().to_lowercase());
        }
        Err(e) => {
            return HttpResponse::InternalServerError().json(serde_json::json!({
                "error": format!("Database error: {}", e)
            }));
        }
        _ => {}
    }

    // 3. Hash the password
    let password_hash = match password::hash_password(&body.password) {
        Ok(hash) => hash,
        Err(e) => {
            return HttpResponse::InternalServerError().json(serde_json::json!({
                "error": format!("Failed to hash password: {}", e)
            }));
        }
    };

    let full_name = if body.full_name.trim().is_empty() {
        username.clone()
    } else {
        body.full_name.trim().to_string()
    };

    // 4. Create the user
    let new_user = UserActiveModel {
        username: Set(username.clone()),
        email: Set(body.email.clone()),
        full_name: Set(full_name.clone()),
        password_hash: Set(password_hash),
        created_at: Set(Some(Utc::now().naive_utc())),
        ..Default::default()
    };

    let user = match new_user.insert(db.get_ref()).await {
        Ok(user) => user,
        Err(e) => {
            return HttpResponse::InternalServerError().json(serde_json::json!({
                "error": format!("Failed to create user: {}", e)
            }));
        }
    };

    // 5. Every user gets a profile row
    let profile = profiles::ActiveModel {
        user_id: Set(user.id),
        full_name: Set(full_name),
        created_at: Set(Some(Utc::now().naive_utc())),
        ..Default::default()
    };
    if let Err(e) = profile.insert(db.get_ref()).await {
        return HttpResponse::InternalServerError().json(serde_json::json!({
            "error": format!("Failed to create profile: {}", e)
        }));
    }

    tracing::info!(email = %user.email, "user registered");

    // 6. Hand back a token pair straight away
    match issue_tokens(db.get_ref(), user).await {
        Ok(response) => HttpResponse::Created().json(response),
        Err(e) => HttpResponse::InternalServerError().json(serde_json::json!({ "error": e })),
    }
}

/// POST /auth/login - Obtain a token pair (PUBLIC)
pub async fn login(
    body: web::Json<LoginRequest>,
    db: web::Data<DatabaseConnection>,
) -> HttpResponse {
    let user = match Users::find()
        .filter(UserColumn::Email.eq(&body.email))
        .one(db.get_ref())
        .await
    {
        Ok(Some(user)) => user,
        Ok(None) => {
            return HttpResponse::Unauthorized().json(serde_json::json!({
                "error": "Invalid email or password"
            }));
        }
        Err(e) => {
            return HttpResponse::InternalServerError().json(serde_json::json!({
                "error": format!("Database error: {}", e)
            }));
        }
    };

    let is_valid = match password::verify_password(&body.password, &user.password_hash) {
        Ok(valid) => valid,
        Err(e) => {
            return HttpResponse::InternalServerError().json(serde_json::json!({
                "error": format!("Password verification error: {}", e)
            }));
        }
    };

    if !is_valid {
        return HttpResponse::Unauthorized().json(serde_json::json!({
            "error": "Invalid email or password"
        }));
    }

    match issue_tokens(db.get_ref(), user).await {
        Ok(response) => HttpResponse::Ok().json(response),
        Err(e) => HttpResponse::InternalServerError().json(serde_json::json!({ "error": e })),
    }
}

/// POST /auth/token/refresh - Exchange a refresh token for a new access token (PUBLIC)
pub async fn refresh_token(
    body: web::Json<RefreshRequest>,
    db: web::Data<DatabaseConnection>,
) -> HttpResponse {
    let claims = match jwt::verify_token(&body.refresh) {
        Ok(claims) => claims,
        Err(e) => {
            return HttpResponse::Unauthorized().json(serde_json::json!({ "error": e }));
        }
    };

    if claims.token_type != "refresh" {
        return HttpResponse::Unauthorized().json(serde_json::json!({
            "error": "Not a refresh token"
        }));
    }

    // The token must still be the one stored on the user (logout/reset revokes it)
    let user = match Users::find_by_id(claims.sub).one(db.get_ref()).await {
        Ok(Some(user)) => user,
        Ok(None) => {
            return HttpResponse::Unauthorized().json(serde_json::json!({
                "error": "User not found"
            }));
        }
        Err(e) => {
            return HttpResponse::InternalServerError().json(serde_json::json!({
                "error": format!("Database error: {}", e)
            }));
        }
    };

    if user.refresh_token.as_deref() != Some(body.refresh.as_str()) {
        return HttpResponse::Unauthorized().json(serde_json::json!({
            "error": "Refresh token has been revoked"
        }));
    }

    match jwt::generate_access_token(user.id, &user.email, &user.username) {
        Ok(access) => HttpResponse::Ok().json(serde_json::json!({ "access": access })),
        Err(e) => HttpResponse::InternalServerError().json(serde_json::json!({ "error": e })),
    }
}

/// GET /auth/me - Echo the authenticated user (PROTECTED)
pub async fn me(auth_user: AuthUser) -> HttpResponse {
    HttpResponse::Ok().json(auth_user)
}

/// GET /auth/password-reset/{email} - Start an OTP password reset (PUBLIC)
///
/// Always answers 200 so the endpoint cannot be used to enumerate accounts.
/// The reset link is logged; delivery is left to the mail relay in front.
pub async fn password_reset_request(
    path: web::Path<String>,
    db: web::Data<DatabaseConnection>,
) -> HttpResponse {
    let email = path.into_inner();

    let user = match Users::find()
        .filter(UserColumn::Email.eq(&email))
        .one(db.get_ref())
        .await
    {
        Ok(user) => user,
        Err(e) => {
            return HttpResponse::InternalServerError().json(serde_json::json!({
                "error": format!("Database error: {}", e)
            }));
        }
    };

    if let Some(user) = user {
        let otp = ids::generate_otp();
        let reset_token = match jwt::generate_access_token(user.id, &user.email, &user.username) {
            Ok(token) => token,
            Err(e) => {
                return HttpResponse::InternalServerError().json(serde_json::json!({ "error": e }));
            }
        };

        let user_id = user.id;
        let user_email = user.email.clone();
        let mut active: UserActiveModel = user.into();
        active.otp = Set(Some(otp.clone()));
        active.refresh_token = Set(Some(reset_token.clone()));
        if let Err(e) = active.update(db.get_ref()).await {
            return HttpResponse::InternalServerError().json(serde_json::json!({
                "error": format!("Database error: {}", e)
            }));
        }

        let frontend = env::var("FRONTEND_SITE_URL")
            .unwrap_or_else(|_| "http://localhost:5173".to_string());
        let link = format!(
            "{}/create-new-password/?otp={}&user_id={}&refresh_token={}",
            frontend, otp, user_id, reset_token
        );
        tracing::info!(email = %user_email, link = %link, "password reset link generated");
    }

    HttpResponse::Ok().json(serde_json::json!({
        "message": "If the account exists, a reset email has been sent"
    }))
}

/// POST /auth/password-change - Finish an OTP password reset (PUBLIC)
pub async fn password_reset_confirm(
    body: web::Json<PasswordResetConfirmRequest>,
    db: web::Data<DatabaseConnection>,
) -> HttpResponse {
    if body.otp.is_empty() || body.password.is_empty() {
        return HttpResponse::BadRequest().json(serde_json::json!({
            "message": "Missing required fields"
        }));
    }

    let user = match Users::find_by_id(body.user_id).one(db.get_ref()).await {
        Ok(Some(user)) if user.otp.as_deref() == Some(body.otp.as_str()) => user,
        Ok(_) => {
            return HttpResponse::NotFound().json(serde_json::json!({
                "message": "Invalid OTP or user"
            }));
        }
        Err(e) => {
            return HttpResponse::InternalServerError().json(serde_json::json!({
                "error": format!("Database error: {}", e)
            }));
        }
    };

    let password_hash = match password::hash_password(&body.password) {
        Ok(hash) => hash,
        Err(e) => {
            return HttpResponse::InternalServerError().json(serde_json::json!({ "error": e }));
        }
    };

    let user_email = user.email.clone();
    let mut active: UserActiveModel = user.into();
    active.password_hash = Set(password_hash);
    // One-shot credentials: clear both once used
    active.otp = Set(None);
    active.refresh_token = Set(None);

    match active.update(db.get_ref()).await {
        Ok(_) => {
            tracing::info!(email = %user_email, "password reset completed");
            HttpResponse::Created().json(serde_json::json!({
                "message": "Password Changed Successfully"
            }))
        }
        Err(e) => HttpResponse::InternalServerError().json(serde_json::json!({
            "error": format!("Failed to update password: {}", e)
        })),
    }
}

/// POST /auth/change-password - Change password while logged in (PROTECTED)
pub async fn change_password(
    auth_user: AuthUser,
    body: web::Json<ChangePasswordRequest>,
    db: web::Data<DatabaseConnection>,
) -> HttpResponse {
    let user = match Users::find_by_id(auth_user.user_id).one(db.get_ref()).await {
        Ok(Some(user)) => user,
        Ok(None) => {
            return HttpResponse::NotFound().json(serde_json::json!({
                "error": "User not found"
            }));
        }
        Err(e) => {
            return HttpResponse::InternalServerError().json(serde_json::json!({
                "error": format!("Database error: {}", e)
            }));
        }
    };

    let is_valid = match password::verify_password(&body.old_password, &user.password_hash) {
        Ok(valid) => valid,
        Err(e) => {
            return HttpResponse::InternalServerError().json(serde_json::json!({
                "error": format!("Password verification error: {}", e)
            }));
        }
    };

    if !is_valid {
        return HttpResponse::BadRequest().json(serde_json::json!({
            "message": "Old password is incorrect"
        }));
    }

    let new_password_hash = match password::hash_password(&body.new_password) {
        Ok(hash) => hash,
        Err(e) => {
            return HttpResponse::InternalServerError().json(serde_json::json!({ "error": e }));
        }
    };

    let mut active: UserActiveModel = user.into();
    active.password_hash = Set(new_password_hash);

    match active.update(db.get_ref()).await {
        Ok(_) => HttpResponse::Ok().json(serde_json::json!({
            "message": "Password changed successfully"
        })),
        Err(e) => HttpResponse::InternalServerError().json(serde_json::json!({
            "error": format!("Failed to update password: {}", e)
        })),
    }
}

pub fn auth_routes(cfg: &mut web::ServiceConfig) {
    cfg.service(
        web::scope("/auth")
            .route("/register", web::post().to(register))
            .route("/login", web::post().to(login))
            .route("/token/refresh", web::post().to(refresh_token))
            .route("/me", web::get().to(me))
            .route("/password-reset/{email}", web::get().to(password_reset_request))
            .route("/password-change", web::post().to(password_reset_confirm))
            .route("/change-password", web::post().to(change_password)),
    );
}

/// Aliases kept for clients built against the /user paths, where /token is
/// the login endpoint. Same handlers, second scope.
pub fn user_compat_routes(cfg: &mut web::ServiceConfig) {
    cfg.service(
        web::scope("/user")
            .route("/register", web::post().to(register))
            .route("/token", web::post().to(login))
            .route("/token/refresh", web::post().to(refresh_token))
            .route("/password-reset/{email}", web::get().to(password_reset_request))
            .route("/password-change", web::post().to(password_reset_confirm))
            .route("/change-password", web::post().to(change_password)),
    );
}

#[cfg(test)]
mod tests {
    use super::*;
    use actix_web::http::StatusCode;
    use actix_web::{test, App};
    use sea_orm::{DatabaseBackend, MockDatabase};

    #[actix_web::test]
    async fn test_user_scope_aliases_are_routed() {
        let db = MockDatabase::new(DatabaseBackend::Postgres).into_connection();
        let app = test::init_service(
            App::new()
                .app_data(web::Data::new(db))
                .configure(auth_routes)
                .configure(user_compat_routes),
        )
        .await;

        // Protected alias: rejected by the extractor, not a 404.
        let req = test::TestRequest::post().uri("/user/change-password").to_request();
        let resp = test::call_service(&app, req).await;
        assert_eq!(resp.status(), StatusCode::UNAUTHORIZED);

        // /user/token is the login handler: a bad payload is a 400, not a 404.
        let req = test::TestRequest::post()
            .uri("/user/token")
            .insert_header(("content-type", "application/json"))
            .set_payload("{}")
            .to_request();
        let resp = test::call_service(&app, req).await;
        assert_eq!(resp.status(), StatusCode::BAD_REQUEST);

        // Primary scope still answers.
        let req = test::TestRequest::post().uri("/auth/change-password").to_request();
        let resp = test::call_service(&app, req).await;
        assert_eq!(resp.status(), StatusCode::UNAUTHORIZED);
    }
}
