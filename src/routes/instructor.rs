use actix_web::{get, web, HttpResponse};
use sea_orm::{
    ColumnTrait, DatabaseConnection, EntityTrait, PaginatorTrait, QueryFilter, QueryOrder,
};
use serde::Serialize;
use rust_decimal::Decimal;

use crate::middleware::AuthUser;
use crate::models::coupons::{Entity as Coupons, Column as CouponColumn};
use crate::models::courses::{Entity as Courses, Column as CourseColumn};
use crate::models::dto::{CourseSummary, PageQuery, Paginated};
use crate::services::order_service::OrderService;

#[derive(Serialize)]
pub struct DashboardResponse {
    pub total_courses: u64,
    pub total_students: i64,
    pub total_reviews: i64,
    pub total_earnings: Decimal,
}

/// GET /instructor/dashboard - Aggregate stats for the instructor (PROTECTED)
#[get("/instructor/dashboard")]
pub async fn dashboard(auth_user: AuthUser, db: web::Data<DatabaseConnection>) -> HttpResponse {
    let courses = match Courses::find()
        .filter(CourseColumn::InstructorId.eq(auth_user.user_id))
        .all(db.get_ref())
        .await
    {
        Ok(courses) => courses,
        Err(e) => {
            return HttpResponse::InternalServerError().json(serde_json::json!({
                "error": format!("Database error: {}", e)
            }));
        }
    };

    let total_students: i64 = courses.iter().map(|c| c.total_students as i64).sum();
    let total_reviews: i64 = courses.iter().map(|c| c.total_reviews as i64).sum();

    let total_earnings = match OrderService::instructor_earnings(db.get_ref(), auth_user.user_id).await
    {
        Ok(earnings) => earnings,
        Err(e) => {
            return HttpResponse::InternalServerError().json(serde_json::json!({
                "error": format!("Database error: {}", e)
            }));
        }
    };

    HttpResponse::Ok().json(DashboardResponse {
        total_courses: courses.len() as u64,
        total_students,
        total_reviews,
        total_earnings,
    })
}

/// GET /instructor/courses - Own courses in every status (PROTECTED)
#[get("/instructor/courses")]
pub async fn instructor_courses(
    auth_user: AuthUser,
    query: web::Query<PageQuery>,
    db: web::Data<DatabaseConnection>,
) -> HttpResponse {
    let (page, page_size) = query.normalized();

    let paginator = Courses::find()
        .filter(CourseColumn::InstructorId.eq(auth_user.user_id))
        .order_by_desc(CourseColumn::CreatedAt)
        .paginate(db.get_ref(), page_size);

    let count = match paginator.num_items().await {
        Ok(count) => count,
        Err(e) => {
            return HttpResponse::InternalServerError().json(serde_json::json!({
                "error": format!("Database error: {}", e)
            }));
        }
    };

    match paginator.fetch_page(page).await {
        Ok(courses) => {
            let results: Vec<CourseSummary> = courses.iter().map(CourseSummary::from).collect();
            HttpResponse::Ok().json(Paginated {
                count,
                page: page + 1,
                page_size,
                results,
            })
        }
        Err(e) => HttpResponse::InternalServerError().json(serde_json::json!({
            "error": format!("Database error: {}", e)
        })),
    }
}

/// GET /instructor/coupons - Coupons owned by the instructor (PROTECTED)
#[get("/instructor/coupons")]
pub async fn instructor_coupons(
    auth_user: AuthUser,
    db: web::Data<DatabaseConnection>,
) -> HttpResponse {
    match Coupons::find()
        .filter(CouponColumn::InstructorId.eq(auth_user.user_id))
        .order_by_desc(CouponColumn::CreatedAt)
        .all(db.get_ref())
        .await
    {
        Ok(coupons) => HttpResponse::Ok().json(coupons),
        Err(e) => HttpResponse::InternalServerError().json(serde_json::json!({
            "error": format!("Database error: {}", e)
        })),
    }
}

pub fn instructor_routes(cfg: &mut web::ServiceConfig) {
    cfg.service(dashboard)
        .service(instructor_courses)
        .service(instructor_coupons);
}
