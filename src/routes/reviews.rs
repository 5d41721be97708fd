use actix_web::{get, post, web, HttpResponse};
use chrono::Utc;
use sea_orm::{
    ActiveModelTrait, ColumnTrait, DatabaseConnection, DbErr, EntityTrait, PaginatorTrait,
    QueryFilter, QueryOrder, Set,
};
use serde::{Deserialize, Serialize};
use validator::Validate;

use crate::middleware::AuthUser;
use crate::models::course_reviews::{self, Entity as Reviews, Column as ReviewColumn};
use crate::models::courses::{self, Entity as Courses, Column as CourseColumn};
use crate::models::dto::{PageQuery, Paginated};
use crate::models::enrollments::{Entity as Enrollments, Column as EnrollmentColumn};
use crate::models::users::Entity as Users;
use crate::services::enrollment_service::EnrollmentService;
use crate::utils::ids::generate_public_id;

#[derive(Deserialize, Validate)]
pub struct CreateReviewRequest {
    #[validate(range(min = 1, max = 5, message = "Rating must be between 1 and 5"))]
    pub rating: i32,
    #[validate(length(min = 1, message = "Review text is required"))]
    pub review_text: String,
}

#[derive(Serialize)]
pub struct ReviewResponse {
    pub review_id: String,
    pub rating: i32,
    pub review_text: String,
    pub helpful_count: i32,
    pub student: Option<String>,
    pub created_at: Option<chrono::NaiveDateTime>,
}

async fn find_published_course(
    db: &DatabaseConnection,
    slug: &str,
) -> Result<Option<courses::Model>, DbErr> {
    Courses::find()
        .filter(CourseColumn::Slug.eq(slug))
        .filter(CourseColumn::Status.eq("published"))
        .one(db)
        .await
}

/// GET /courses/{course_slug}/reviews - Approved reviews, newest first (PUBLIC)
#[get("/courses/{course_slug}/reviews")]
pub async fn list_reviews(
    path: web::Path<String>,
    query: web::Query<PageQuery>,
    db: web::Data<DatabaseConnection>,
) -> HttpResponse {
    let course_slug = path.into_inner();
    let (page, page_size) = query.normalized();

    let course = match find_published_course(db.get_ref(), &course_slug).await {
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

    let paginator = Reviews::find()
        .filter(ReviewColumn::CourseId.eq(course.id))
        .filter(ReviewColumn::IsApproved.eq(true))
        .find_also_related(Users)
        .order_by_desc(ReviewColumn::CreatedAt)
        .paginate(db.get_ref(), page_size);

    let count = match paginator.num_items().await {
        Ok(count) => count,
        Err(e) => {
            return HttpResponse::InternalServerError().json(serde_json::json!({
                "error": format!("Database error: {}", e)
            }));
        }
    };

    let rows = match paginator.fetch_page(page).await {
        Ok(rows) => rows,
        Err(e) => {
            return HttpResponse::InternalServerError().json(serde_json::json!({
                "error": format!("Database error: {}", e)
            }));
        }
    };

    let results = rows
        .into_iter()
        .map(|(review, student)| ReviewResponse {
            review_id: review.review_id,
            rating: review.rating,
            review_text: review.review_text,
            helpful_count: review.helpful_count,
            student: student.map(|s| s.username),
            created_at: review.created_at,
        })
        .collect();

    HttpResponse::Ok().json(Paginated {
        count,
        page: page + 1,
        page_size,
        results,
    })
}

/// POST /courses/{course_slug}/reviews/create - Post or update a review (PROTECTED)
///
/// Only enrolled students may review. A second post from the same student
/// updates their existing review instead of duplicating it.
#[post("/courses/{course_slug}/reviews/create")]
pub async fn create_review(
    auth_user: AuthUser,
    path: web::Path<String>,
    body: web::Json<CreateReviewRequest>,
    db: web::Data<DatabaseConnection>,
) -> HttpResponse {
    if let Err(errors) = body.validate() {
        return HttpResponse::BadRequest().json(serde_json::json!({ "errors": errors }));
    }

    let course_slug = path.into_inner();

    let course = match find_published_course(db.get_ref(), &course_slug).await {
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

    let enrolled = match Enrollments::find()
        .filter(EnrollmentColumn::StudentId.eq(auth_user.user_id))
        .filter(EnrollmentColumn::CourseId.eq(course.id))
        .count(db.get_ref())
        .await
    {
        Ok(count) => count > 0,
        Err(e) => {
            return HttpResponse::InternalServerError().json(serde_json::json!({
                "error": format!("Database error: {}", e)
            }));
        }
    };
    if !enrolled {
        return HttpResponse::Forbidden().json(serde_json::json!({
            "message": "Only enrolled students can review this course"
        }));
    }

    let existing = match Reviews::find()
        .filter(ReviewColumn::StudentId.eq(auth_user.user_id))
        .filter(ReviewColumn::CourseId.eq(course.id))
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

    let now = Utc::now().naive_utc();
    let (review, created) = match existing {
        Some(review) => {
            let mut active: course_reviews::ActiveModel = review.into();
            active.rating = Set(body.rating);
            active.review_text = Set(body.review_text.clone());
            active.updated_at = Set(Some(now));
            match active.update(db.get_ref()).await {
                Ok(review) => (review, false),
                Err(e) => {
                    return HttpResponse::InternalServerError().json(serde_json::json!({
                        "error": format!("Failed to update review: {}", e)
                    }));
                }
            }
        }
        None => {
            let active = course_reviews::ActiveModel {
                review_id: Set(generate_public_id()),
                student_id: Set(auth_user.user_id),
                course_id: Set(course.id),
                rating: Set(body.rating),
                review_text: Set(body.review_text.clone()),
                is_approved: Set(true),
                helpful_count: Set(0),
                created_at: Set(Some(now)),
                updated_at: Set(Some(now)),
                ..Default::default()
            };
            match active.insert(db.get_ref()).await {
                Ok(review) => (review, true),
                Err(e) => {
                    return HttpResponse::InternalServerError().json(serde_json::json!({
                        "error": format!("Failed to create review: {}", e)
                    }));
                }
            }
        }
    };

    if let Err(e) = EnrollmentService::recompute_course_rating(db.get_ref(), course.id).await {
        tracing::warn!("failed to recompute course rating: {}", e);
    }

    let body = serde_json::json!({
        "message": if created { "Review posted" } else { "Review updated" },
        "review_id": review.review_id
    });
    if created {
        HttpResponse::Created().json(body)
    } else {
        HttpResponse::Ok().json(body)
    }
}

pub fn review_routes(cfg: &mut web::ServiceConfig) {
    cfg.service(list_reviews).service(create_review);
}
