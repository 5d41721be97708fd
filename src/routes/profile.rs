use actix_web::{get, put, web, HttpResponse};
use sea_orm::{DatabaseConnection, EntityTrait, QueryFilter, ColumnTrait, Set, ActiveModelTrait};
use serde::Deserialize;

use crate::models::profiles::{Entity as Profiles, Column as ProfileColumn, ActiveModel as ProfileActiveModel};
use crate::middleware::AuthUser;

#[derive(Deserialize)]
pub struct UpdateProfileRequest {
    pub full_name: Option<String>,
    pub country: Option<String>,
    pub about: Option<String>,
    pub image: Option<String>,
}

/// GET /profile - Own profile (PROTECTED)
#[get("")]
pub async fn get_profile(
    auth_user: AuthUser,
    db: web::Data<DatabaseConnection>,
) -> HttpResponse {
    match Profiles::find()
        .filter(ProfileColumn::UserId.eq(auth_user.user_id))
        .one(db.get_ref())
        .await
    {
        Ok(Some(profile)) => HttpResponse::Ok().json(profile),
        Ok(None) => HttpResponse::NotFound().json(serde_json::json!({
            "error": "Profile not found"
        })),
        Err(e) => HttpResponse::InternalServerError().json(serde_json::json!({
            "error": format!("Database error: {}", e)
        })),
    }
}

/// PUT /profile - Update own profile (PROTECTED)
#[put("")]
pub async fn update_profile(
    auth_user: AuthUser,
    body: web::Json<UpdateProfileRequest>,
    db: web::Data<DatabaseConnection>,
) -> HttpResponse {
    let profile = match Profiles::find()
        .filter(ProfileColumn::UserId.eq(auth_user.user_id))
        .one(db.get_ref())
        .await
    {
        Ok(Some(profile)) => profile,
        Ok(None) => {
            return HttpResponse::NotFound().json(serde_json::json!({
                "error": "Profile not found"
            }));
        }
        Err(e) => {
            return HttpResponse::InternalServerError().json(serde_json::json!({
                "error": format!("Database error: {}", e)
            }));
        }
    };

    let mut active: ProfileActiveModel = profile.into();
    if let Some(full_name) = &body.full_name {
        active.full_name = Set(full_name.clone());
    }
    if body.country.is_some() {
        active.country = Set(body.country.clone());
    }
    if body.about.is_some() {
        active.about = Set(body.about.clone());
    }
    if body.image.is_some() {
        active.image = Set(body.image.clone());
    }

    match active.update(db.get_ref()).await {
        Ok(profile) => HttpResponse::Ok().json(profile),
        Err(e) => HttpResponse::InternalServerError().json(serde_json::json!({
            "error": format!("Failed to update profile: {}", e)
        })),
    }
}

pub fn profile_routes(cfg: &mut web::ServiceConfig) {
    cfg.service(
        web::scope("/profile")
            .service(get_profile)
            .service(update_profile),
    );
}
