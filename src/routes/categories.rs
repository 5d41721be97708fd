use actix_web::{get, web, HttpResponse};
use sea_orm::{DatabaseConnection, EntityTrait, QueryFilter, QueryOrder, ColumnTrait, PaginatorTrait};
use serde::Serialize;

use crate::models::categories::{self, Entity as Categories, Column as CategoryColumn};
use crate::models::courses::{Entity as Courses, Column as CourseColumn};

#[derive(Serialize)]
pub struct CategoryResponse {
    pub name: String,
    pub slug: String,
    pub description: Option<String>,
    pub icon: Option<String>,
    pub image: Option<String>,
    pub course_count: u64,
}

async fn with_course_count(
    db: &DatabaseConnection,
    category: categories::Model,
) -> Result<CategoryResponse, sea_orm::DbErr> {
    let course_count = Courses::find()
        .filter(CourseColumn::CategoryId.eq(category.id))
        .filter(CourseColumn::Status.eq("published"))
        .count(db)
        .await?;

    Ok(CategoryResponse {
        name: category.name,
        slug: category.slug,
        description: category.description,
        icon: category.icon,
        image: category.image,
        course_count,
    })
}

/// GET /categories - Active categories with their published-course counts (PUBLIC)
#[get("/categories")]
pub async fn list_categories(db: web::Data<DatabaseConnection>) -> HttpResponse {
    let categories = match Categories::find()
        .filter(CategoryColumn::IsActive.eq(true))
        .order_by_asc(CategoryColumn::SortOrder)
        .order_by_asc(CategoryColumn::Name)
        .all(db.get_ref())
        .await
    {
        Ok(categories) => categories,
        Err(e) => {
            return HttpResponse::InternalServerError().json(serde_json::json!({
                "error": format!("Database error: {}", e)
            }));
        }
    };

    let mut response = Vec::with_capacity(categories.len());
    for category in categories {
        match with_course_count(db.get_ref(), category).await {
            Ok(item) => response.push(item),
            Err(e) => {
                return HttpResponse::InternalServerError().json(serde_json::json!({
                    "error": format!("Database error: {}", e)
                }));
            }
        }
    }

    HttpResponse::Ok().json(response)
}

/// GET /categories/{slug} - Category detail (PUBLIC)
#[get("/categories/{slug}")]
pub async fn get_category(
    path: web::Path<String>,
    db: web::Data<DatabaseConnection>,
) -> HttpResponse {
    let slug = path.into_inner();

    let category = match Categories::find()
        .filter(CategoryColumn::Slug.eq(&slug))
        .filter(CategoryColumn::IsActive.eq(true))
        .one(db.get_ref())
        .await
    {
        Ok(Some(category)) => category,
        Ok(None) => {
            return HttpResponse::NotFound().json(serde_json::json!({
                "error": "Category not found"
            }));
        }
        Err(e) => {
            return HttpResponse::InternalServerError().json(serde_json::json!({
                "error": format!("Database error: {}", e)
            }));
        }
    };

    match with_course_count(db.get_ref(), category).await {
        Ok(response) => HttpResponse::Ok().json(response),
        Err(e) => HttpResponse::InternalServerError().json(serde_json::json!({
            "error": format!("Database error: {}", e)
        })),
    }
}

pub fn category_routes(cfg: &mut web::ServiceConfig) {
    cfg.service(list_categories).service(get_category);
}
