use actix_web::{get, post, web, HttpResponse};
use chrono::Utc;
use sea_orm::{
    ActiveModelTrait, ColumnTrait, DatabaseConnection, DbErr, EntityTrait, ModelTrait,
    PaginatorTrait, QueryFilter, QueryOrder, Set,
};

use crate::middleware::AuthUser;
use crate::models::courses::{self, Entity as Courses, Column as CourseColumn};
use crate::models::dto::CourseSummary;
use crate::models::wishlists::{self, Entity as Wishlists, Column as WishlistColumn};

async fn find_course(
    db: &DatabaseConnection,
    course_id: &str,
) -> Result<Option<courses::Model>, DbErr> {
    Courses::find()
        .filter(CourseColumn::CourseId.eq(course_id))
        .filter(CourseColumn::Status.eq("published"))
        .one(db)
        .await
}

/// GET /wishlist - Own wishlist with course summaries (PROTECTED)
#[get("/wishlist")]
pub async fn get_wishlist(auth_user: AuthUser, db: web::Data<DatabaseConnection>) -> HttpResponse {
    let rows = match Wishlists::find()
        .filter(WishlistColumn::UserId.eq(auth_user.user_id))
        .find_also_related(Courses)
        .order_by_desc(WishlistColumn::AddedAt)
        .all(db.get_ref())
        .await
    {
        Ok(rows) => rows,
        Err(e) => {
            return HttpResponse::InternalServerError().json(serde_json::json!({
                "error": format!("Database error: {}", e)
            }));
        }
    };

    let courses: Vec<CourseSummary> = rows
        .iter()
        .filter_map(|(_, course)| course.as_ref().map(CourseSummary::from))
        .collect();

    HttpResponse::Ok().json(courses)
}

/// POST /wishlist/toggle/{course_id} - Add or remove a course (PROTECTED)
#[post("/wishlist/toggle/{course_id}")]
pub async fn toggle_wishlist(
    auth_user: AuthUser,
    path: web::Path<String>,
    db: web::Data<DatabaseConnection>,
) -> HttpResponse {
    let course_id = path.into_inner();

    let course = match find_course(db.get_ref(), &course_id).await {
        Ok(Some(course)) => course,
        Ok(None) => {
            return HttpResponse::NotFound().json(serde_json::json!({
                "error": "Course not found"
            }));
        }
        Err(e) => {
            return HttpResponse::InternalServerError().json(serde_json::json!({
                "error": format!("Database error: {}", e)
            }));
        }
    };

    let existing = match Wishlists::find()
        .filter(WishlistColumn::UserId.eq(auth_user.user_id))
        .filter(WishlistColumn::CourseId.eq(course.id))
        .one(db.get_ref())
        .await
    {
        Ok(existing) => existing,
        Err(e) => {
            return HttpResponse::InternalServerError().json(serde_json::json!({
                "error": format!("Database error: {}", e)
            }));
        }
    };

    match existing {
        Some(entry) => match entry.delete(db.get_ref()).await {
            Ok(_) => HttpResponse::Ok().json(serde_json::json!({
                "message": "Removed from wishlist",
                "in_wishlist": false
            })),
            Err(e) => HttpResponse::InternalServerError().json(serde_json::json!({
                "error": format!("Failed to update wishlist: {}", e)
            })),
        },
        None => {
            let entry = wishlists::ActiveModel {
                user_id: Set(auth_user.user_id),
                course_id: Set(course.id),
                added_at: Set(Some(Utc::now().naive_utc())),
                ..Default::default()
            };
            match entry.insert(db.get_ref()).await {
                Ok(_) => HttpResponse::Created().json(serde_json::json!({
                    "message": "Added to wishlist",
                    "in_wishlist": true
                })),
                Err(e) => HttpResponse::InternalServerError().json(serde_json::json!({
                    "error": format!("Failed to update wishlist: {}", e)
                })),
            }
        }
    }
}

/// GET /wishlist/check/{course_id} - Membership check (PROTECTED)
#[get("/wishlist/check/{course_id}")]
pub async fn check_wishlist(
    auth_user: AuthUser,
    path: web::Path<String>,
    db: web::Data<DatabaseConnection>,
) -> HttpResponse {
    let course_id = path.into_inner();

    let course = match find_course(db.get_ref(), &course_id).await {
        Ok(Some(course)) => course,
        Ok(None) => {
            return HttpResponse::Ok().json(serde_json::json!({ "in_wishlist": false }));
        }
        Err(e) => {
            return HttpResponse::InternalServerError().json(serde_json::json!({
                "error": format!("Database error: {}", e)
            }));
        }
    };

    match Wishlists::find()
        .filter(WishlistColumn::UserId.eq(auth_user.user_id))
        .filter(WishlistColumn::CourseId.eq(course.id))
        .count(db.get_ref())
        .await
    {
        Ok(count) => HttpResponse::Ok().json(serde_json::json!({ "in_wishlist": count > 0 })),
        Err(e) => HttpResponse::InternalServerError().json(serde_json::json!({
            "error": format!("Database error: {}", e)
        })),
    }
}

pub fn wishlist_routes(cfg: &mut web::ServiceConfig) {
    cfg.service(get_wishlist)
        .service(toggle_wishlist)
        .service(check_wishlist);
}
