use actix_web::{get, web, HttpResponse};
use sea_orm::{
    ColumnTrait, Condition, DatabaseConnection, DbErr, EntityTrait, PaginatorTrait, QueryFilter,
    QueryOrder, QuerySelect, Set, ActiveModelTrait,
};
use serde::{Deserialize, Serialize};
use rust_decimal::Decimal;
use chrono::Utc;

use crate::middleware::MaybeAuthUser;
use crate::models::categories::{Entity as Categories, Column as CategoryColumn};
use crate::models::courses::{self, Entity as Courses, Column as CourseColumn};
use crate::models::dto::{CourseSummary, CurriculumLesson, CurriculumSection, PageQuery, Paginated};
use crate::models::lesson_resources::{Entity as LessonResources, Column as ResourceColumn};
use crate::models::lessons::{Entity as Lessons, Column as LessonColumn};
use crate::models::sections::{Entity as Sections, Column as SectionColumn};
use crate::models::users::Entity as Users;
use crate::models::enrollments::{self, Entity as Enrollments, Column as EnrollmentColumn};

#[derive(Deserialize)]
pub struct CourseListQuery {
    pub page: Option<u64>,
    pub page_size: Option<u64>,
    pub category: Option<String>,
    pub level: Option<String>,
    pub language: Option<String>,
    pub is_free: Option<bool>,
    pub price_min: Option<Decimal>,
    pub price_max: Option<Decimal>,
    pub q: Option<String>,
    pub ordering: Option<String>,
}

#[derive(Deserialize)]
pub struct SearchQuery {
    pub page: Option<u64>,
    pub page_size: Option<u64>,
    pub q: Option<String>,
}

#[derive(Serialize)]
pub struct CourseDetailResponse {
    #[serde(flatten)]
    pub summary: CourseSummary,
    pub description: String,
    pub requirements: Option<String>,
    pub what_you_learn: Option<String>,
    pub target_audience: Option<String>,
    pub intro_video: Option<String>,
    pub tags: Option<String>,
    pub instructor: Option<serde_json::Value>,
    pub category: Option<serde_json::Value>,
    pub curriculum: Vec<CurriculumSection>,
}

#[derive(Serialize)]
pub struct LessonDetailResponse {
    pub lesson_id: String,
    pub title: String,
    pub description: Option<String>,
    pub lesson_type: String,
    pub duration: i32,
    pub sort_order: i32,
    pub is_free_preview: bool,
    pub video_url: Option<String>,
    pub content: Option<String>,
    pub resources: Vec<serde_json::Value>,
}

/// Sections and lessons for a course, ordered, with lesson content stripped
/// unless the caller may access it. Shared with the enrollment routes.
pub async fn load_curriculum(
    db: &DatabaseConnection,
    course_pk: i32,
    can_access_content: bool,
) -> Result<Vec<CurriculumSection>, DbErr> {
    let sections = Sections::find()
        .filter(SectionColumn::CourseId.eq(course_pk))
        .order_by_asc(SectionColumn::SortOrder)
        .all(db)
        .await?;

    let mut curriculum = Vec::with_capacity(sections.len());
    for section in &sections {
        let lessons = Lessons::find()
            .filter(LessonColumn::SectionId.eq(section.id))
            .filter(LessonColumn::IsPublished.eq(true))
            .order_by_asc(LessonColumn::SortOrder)
            .all(db)
            .await?;

        let lessons = lessons
            .iter()
            .map(|lesson| CurriculumLesson::from_model(lesson, can_access_content))
            .collect();

        curriculum.push(CurriculumSection::from_model(section, lessons));
    }

    Ok(curriculum)
}

fn apply_ordering(
    query: sea_orm::Select<Courses>,
    ordering: Option<&str>,
) -> sea_orm::Select<Courses> {
    // Whitelisted sort keys only; anything else falls back to newest-first.
    match ordering.unwrap_or("-created_at") {
        "created_at" => query.order_by_asc(CourseColumn::CreatedAt),
        "price" => query.order_by_asc(CourseColumn::Price),
        "-price" => query.order_by_desc(CourseColumn::Price),
        "average_rating" => query.order_by_asc(CourseColumn::AverageRating),
        "-average_rating" => query.order_by_desc(CourseColumn::AverageRating),
        "total_students" => query.order_by_asc(CourseColumn::TotalStudents),
        "-total_students" => query.order_by_desc(CourseColumn::TotalStudents),
        _ => query.order_by_desc(CourseColumn::CreatedAt),
    }
}

fn search_condition(q: &str) -> Condition {
    Condition::any()
        .add(CourseColumn::Title.contains(q))
        .add(CourseColumn::ShortDescription.contains(q))
        .add(CourseColumn::Tags.contains(q))
}

async fn paginate_courses(
    db: &DatabaseConnection,
    query: sea_orm::Select<Courses>,
    page: u64,
    page_size: u64,
) -> Result<Paginated<CourseSummary>, DbErr> {
    let paginator = query.paginate(db, page_size);
    let count = paginator.num_items().await?;
    let results = paginator
        .fetch_page(page)
        .await?
        .iter()
        .map(CourseSummary::from)
        .collect();

    Ok(Paginated {
        count,
        page: page + 1,
        page_size,
        results,
    })
}

/// GET /courses - Published courses with filters, ordering and pagination (PUBLIC)
#[get("/courses")]
pub async fn list_courses(
    query: web::Query<CourseListQuery>,
    db: web::Data<DatabaseConnection>,
) -> HttpResponse {
    let page_query = PageQuery { page: query.page, page_size: query.page_size };
    let (page, page_size) = page_query.normalized();

    let mut select = Courses::find().filter(CourseColumn::Status.eq("published"));

    if let Some(category_slug) = &query.category {
        let category = match Categories::find()
            .filter(CategoryColumn::Slug.eq(category_slug))
            .one(db.get_ref())
            .await
        {
            Ok(Some(category)) => category,
            Ok(None) => {
                return HttpResponse::Ok().json(Paginated::<CourseSummary> {
                    count: 0,
                    page: page + 1,
                    page_size,
                    results: vec![],
                });
            }
            Err(e) => {
                return HttpResponse::InternalServerError().json(serde_json::json!({
                    "error": format!("Database error: {}", e)
                }));
            }
        };
        select = select.filter(CourseColumn::CategoryId.eq(category.id));
    }

    if let Some(level) = &query.level {
        select = select.filter(CourseColumn::Level.eq(level));
    }
    if let Some(language) = &query.language {
        select = select.filter(CourseColumn::Language.eq(language));
    }
    if let Some(is_free) = query.is_free {
        select = select.filter(CourseColumn::IsFree.eq(is_free));
    }
    if let Some(price_min) = query.price_min {
        select = select.filter(CourseColumn::Price.gte(price_min));
    }
    if let Some(price_max) = query.price_max {
        select = select.filter(CourseColumn::Price.lte(price_max));
    }
    if let Some(q) = query.q.as_deref().filter(|q| !q.is_empty()) {
        select = select.filter(search_condition(q));
    }

    select = apply_ordering(select, query.ordering.as_deref());

    match paginate_courses(db.get_ref(), select, page, page_size).await {
        Ok(response) => HttpResponse::Ok().json(response),
        Err(e) => HttpResponse::InternalServerError().json(serde_json::json!({
            "error": format!("Database error: {}", e)
        })),
    }
}

/// GET /courses/featured - Up to 8 featured courses for the homepage (PUBLIC)
#[get("/courses/featured")]
pub async fn featured_courses(db: web::Data<DatabaseConnection>) -> HttpResponse {
    match Courses::find()
        .filter(CourseColumn::Status.eq("published"))
        .filter(CourseColumn::IsFeatured.eq(true))
        .order_by_desc(CourseColumn::CreatedAt)
        .limit(8)
        .all(db.get_ref())
        .await
    {
        Ok(courses) => {
            let response: Vec<CourseSummary> = courses.iter().map(CourseSummary::from).collect();
            HttpResponse::Ok().json(response)
        }
        Err(e) => HttpResponse::InternalServerError().json(serde_json::json!({
            "error": format!("Database error: {}", e)
        })),
    }
}

/// GET /courses/search?q= - Title/description/tag search (PUBLIC)
#[get("/courses/search")]
pub async fn search_courses(
    query: web::Query<SearchQuery>,
    db: web::Data<DatabaseConnection>,
) -> HttpResponse {
    let page_query = PageQuery { page: query.page, page_size: query.page_size };
    let (page, page_size) = page_query.normalized();

    let q = match query.q.as_deref().filter(|q| !q.is_empty()) {
        Some(q) => q,
        None => {
            return HttpResponse::Ok().json(Paginated::<CourseSummary> {
                count: 0,
                page: page + 1,
                page_size,
                results: vec![],
            });
        }
    };

    let select = Courses::find()
        .filter(CourseColumn::Status.eq("published"))
        .filter(
            search_condition(q).add(CourseColumn::Description.contains(q)),
        )
        .order_by_desc(CourseColumn::CreatedAt);

    match paginate_courses(db.get_ref(), select, page, page_size).await {
        Ok(response) => HttpResponse::Ok().json(response),
        Err(e) => HttpResponse::InternalServerError().json(serde_json::json!({
            "error": format!("Database error: {}", e)
        })),
    }
}

/// GET /courses/{slug} - Course detail with curriculum (PUBLIC)
///
/// Lesson video URLs and content stay hidden unless the requester is
/// enrolled; free-preview lessons are always visible.
#[get("/courses/{slug}")]
pub async fn course_detail(
    path: web::Path<String>,
    maybe_user: MaybeAuthUser,
    db: web::Data<DatabaseConnection>,
) -> HttpResponse {
    let slug = path.into_inner();

    let course = match Courses::find()
        .filter(CourseColumn::Slug.eq(&slug))
        .filter(CourseColumn::Status.eq("published"))
        .one(db.get_ref())
        .await
    {
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

    let enrolled = match &maybe_user.user {
        Some(user) => {
            match Enrollments::find()
                .filter(EnrollmentColumn::StudentId.eq(user.user_id))
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
            }
        }
        None => false,
    };

    match build_course_detail(db.get_ref(), &course, enrolled).await {
        Ok(response) => HttpResponse::Ok().json(response),
        Err(e) => HttpResponse::InternalServerError().json(serde_json::json!({
            "error": format!("Database error: {}", e)
        })),
    }
}

async fn build_course_detail(
    db: &DatabaseConnection,
    course: &courses::Model,
    can_access_content: bool,
) -> Result<CourseDetailResponse, DbErr> {
    let instructor = Users::find_by_id(course.instructor_id).one(db).await?.map(|u| {
        serde_json::json!({
            "username": u.username,
            "full_name": u.full_name,
        })
    });

    let category = match course.category_id {
        Some(category_id) => Categories::find_by_id(category_id).one(db).await?.map(|c| {
            serde_json::json!({
                "name": c.name,
                "slug": c.slug,
            })
        }),
        None => None,
    };

    let curriculum = load_curriculum(db, course.id, can_access_content).await?;

    Ok(CourseDetailResponse {
        summary: CourseSummary::from(course),
        description: course.description.clone(),
        requirements: course.requirements.clone(),
        what_you_learn: course.what_you_learn.clone(),
        target_audience: course.target_audience.clone(),
        intro_video: course.intro_video.clone(),
        tags: course.tags.clone(),
        instructor,
        category,
        curriculum,
    })
}

/// GET /courses/{course_slug}/lessons/{lesson_id} - Lesson content (PUBLIC + gate)
///
/// 403 unless the lesson is a free preview or the requester is enrolled.
#[get("/courses/{course_slug}/lessons/{lesson_id}")]
pub async fn lesson_detail(
    path: web::Path<(String, String)>,
    maybe_user: MaybeAuthUser,
    db: web::Data<DatabaseConnection>,
) -> HttpResponse {
    let (course_slug, lesson_id) = path.into_inner();

    let course = match Courses::find()
        .filter(CourseColumn::Slug.eq(&course_slug))
        .filter(CourseColumn::Status.eq("published"))
        .one(db.get_ref())
        .await
    {
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

    let lesson = match Lessons::find()
        .filter(LessonColumn::LessonId.eq(&lesson_id))
        .one(db.get_ref())
        .await
    {
        Ok(Some(lesson)) => lesson,
        Ok(None) => {
            return HttpResponse::NotFound().json(serde_json::json!({
                "error": "Lesson not found"
            }));
        }
        Err(e) => {
            return HttpResponse::InternalServerError().json(serde_json::json!({
                "error": format!("Database error: {}", e)
            }));
        }
    };

    // The lesson must belong to this course
    match Sections::find_by_id(lesson.section_id).one(db.get_ref()).await {
        Ok(Some(section)) if section.course_id == course.id => {}
        Ok(_) => {
            return HttpResponse::NotFound().json(serde_json::json!({
                "error": "Lesson not found"
            }));
        }
        Err(e) => {
            return HttpResponse::InternalServerError().json(serde_json::json!({
                "error": format!("Database error: {}", e)
            }));
        }
    }

    let mut can_access = lesson.is_free_preview;

    if let Some(user) = &maybe_user.user {
        let enrollment = match Enrollments::find()
            .filter(EnrollmentColumn::StudentId.eq(user.user_id))
            .filter(EnrollmentColumn::CourseId.eq(course.id))
            .one(db.get_ref())
            .await
        {
            Ok(enrollment) => enrollment,
            Err(e) => {
                return HttpResponse::InternalServerError().json(serde_json::json!({
                    "error": format!("Database error: {}", e)
                }));
            }
        };

        if let Some(enrollment) = enrollment {
            can_access = true;
            let mut active: enrollments::ActiveModel = enrollment.into();
            active.last_accessed = Set(Some(Utc::now().naive_utc()));
            if let Err(e) = active.update(db.get_ref()).await {
                tracing::warn!("failed to touch enrollment last_accessed: {}", e);
            }
        }
    }

    if !can_access {
        return HttpResponse::Forbidden().json(serde_json::json!({
            "message": "Enroll in this course to access this lesson"
        }));
    }

    let resources = match LessonResources::find()
        .filter(ResourceColumn::LessonId.eq(lesson.id))
        .all(db.get_ref())
        .await
    {
        Ok(resources) => resources
            .into_iter()
            .map(|r| {
                serde_json::json!({
                    "resource_id": r.resource_id,
                    "title": r.title,
                    "file": r.file,
                    "file_type": r.file_type,
                })
            })
            .collect(),
        Err(e) => {
            return HttpResponse::InternalServerError().json(serde_json::json!({
                "error": format!("Database error: {}", e)
            }));
        }
    };

    HttpResponse::Ok().json(LessonDetailResponse {
        lesson_id: lesson.lesson_id,
        title: lesson.title,
        description: lesson.description,
        lesson_type: lesson.lesson_type,
        duration: lesson.duration,
        sort_order: lesson.sort_order,
        is_free_preview: lesson.is_free_preview,
        video_url: lesson.video_url,
        content: lesson.content,
        resources,
    })
}

/// GET /instructors/{instructor_id}/courses - An instructor's published courses (PUBLIC)
#[get("/instructors/{instructor_id}/courses")]
pub async fn instructor_public_courses(
    path: web::Path<i32>,
    query: web::Query<PageQuery>,
    db: web::Data<DatabaseConnection>,
) -> HttpResponse {
    let instructor_id = path.into_inner();
    let (page, page_size) = query.normalized();

    let select = Courses::find()
        .filter(CourseColumn::InstructorId.eq(instructor_id))
        .filter(CourseColumn::Status.eq("published"))
        .order_by_desc(CourseColumn::CreatedAt);

    match paginate_courses(db.get_ref(), select, page, page_size).await {
        Ok(response) => HttpResponse::Ok().json(response),
        Err(e) => HttpResponse::InternalServerError().json(serde_json::json!({
            "error": format!("Database error: {}", e)
        })),
    }
}

pub fn course_routes(cfg: &mut web::ServiceConfig) {
    // Literal paths before "/courses/{slug}" so "featured" and "search"
    // are not swallowed by the slug matcher.
    cfg.service(list_courses)
        .service(featured_courses)
        .service(search_courses)
        .service(lesson_detail)
        .service(course_detail)
        .service(instructor_public_courses);
}
