use actix_web::{get, post, web, HttpResponse};
use chrono::Utc;
use sea_orm::{
    ActiveModelTrait, ColumnTrait, DatabaseConnection, DbErr, EntityTrait, PaginatorTrait,
    QueryFilter, QueryOrder, QuerySelect, Set,
};
use serde::{Deserialize, Serialize};

use crate::middleware::AuthUser;
use crate::models::courses::{self, Entity as Courses, Column as CourseColumn};
use crate::models::dto::{CourseSummary, CurriculumSection, PageQuery, Paginated};
use crate::models::enrollments::{self, Entity as Enrollments, Column as EnrollmentColumn};
use crate::models::lesson_progress::{self, Entity as LessonProgress, Column as ProgressColumn};
use crate::models::lessons::{Entity as Lessons, Column as LessonColumn};
use crate::models::sections::{Entity as Sections, Column as SectionColumn};
use crate::routes::courses::load_curriculum;
use crate::services::enrollment_service::EnrollmentService;

#[derive(Deserialize)]
pub struct ProgressRequest {
    pub lesson_id: String,
    pub is_completed: Option<bool>,
    pub time_spent: Option<i32>,
    pub last_position: Option<i32>,
}

#[derive(Serialize)]
pub struct EnrollmentSummary {
    pub enrollment_id: String,
    pub status: String,
    pub progress_percentage: i32,
    pub lessons_completed: i32,
    pub enrolled_at: Option<chrono::NaiveDateTime>,
    pub last_accessed: Option<chrono::NaiveDateTime>,
    pub completed_at: Option<chrono::NaiveDateTime>,
    pub course: CourseSummary,
}

#[derive(Serialize)]
pub struct EnrollmentDetail {
    pub enrollment_id: String,
    pub status: String,
    pub progress_percentage: i32,
    pub lessons_completed: i32,
    pub enrolled_at: Option<chrono::NaiveDateTime>,
    pub course: CourseSummary,
    pub curriculum: Vec<CurriculumSection>,
    pub lesson_progress: Vec<lesson_progress::Model>,
}

fn summary(enrollment: &enrollments::Model, course: &courses::Model) -> EnrollmentSummary {
    EnrollmentSummary {
        enrollment_id: enrollment.enrollment_id.clone(),
        status: enrollment.status.clone(),
        progress_percentage: enrollment.progress_percentage,
        lessons_completed: enrollment.lessons_completed,
        enrolled_at: enrollment.enrolled_at,
        last_accessed: enrollment.last_accessed,
        completed_at: enrollment.completed_at,
        course: CourseSummary::from(course),
    }
}

/// GET /student/enrollments - Own enrollments with course summaries (PROTECTED)
#[get("/student/enrollments")]
pub async fn list_enrollments(
    auth_user: AuthUser,
    query: web::Query<PageQuery>,
    db: web::Data<DatabaseConnection>,
) -> HttpResponse {
    let (page, page_size) = query.normalized();

    let paginator = Enrollments::find()
        .filter(EnrollmentColumn::StudentId.eq(auth_user.user_id))
        .find_also_related(Courses)
        .order_by_desc(EnrollmentColumn::EnrolledAt)
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
        .iter()
        .filter_map(|(enrollment, course)| {
            course.as_ref().map(|course| summary(enrollment, course))
        })
        .collect();

    HttpResponse::Ok().json(Paginated {
        count,
        page: page + 1,
        page_size,
        results,
    })
}

/// GET /student/enrollments/{enrollment_id} - Learning view (PROTECTED)
///
/// Full curriculum with content visible, plus per-lesson progress rows.
#[get("/student/enrollments/{enrollment_id}")]
pub async fn enrollment_detail(
    auth_user: AuthUser,
    path: web::Path<String>,
    db: web::Data<DatabaseConnection>,
) -> HttpResponse {
    let enrollment_id = path.into_inner();

    let enrollment = match Enrollments::find()
        .filter(EnrollmentColumn::EnrollmentId.eq(&enrollment_id))
        .filter(EnrollmentColumn::StudentId.eq(auth_user.user_id))
        .one(db.get_ref())
        .await
    {
        Ok(Some(enrollment)) => enrollment,
        Ok(None) => {
            return HttpResponse::NotFound().json(serde_json::json!({
                "error": "Enrollment not found"
            }));
        }
        Err(e) => {
            return HttpResponse::InternalServerError().json(serde_json::json!({
                "error": format!("Database error: {}", e)
            }));
        }
    };

    match build_enrollment_detail(db.get_ref(), enrollment).await {
        Ok(response) => HttpResponse::Ok().json(response),
        Err(e) => HttpResponse::InternalServerError().json(serde_json::json!({
            "error": format!("Database error: {}", e)
        })),
    }
}

async fn build_enrollment_detail(
    db: &DatabaseConnection,
    enrollment: enrollments::Model,
) -> Result<Option<EnrollmentDetail>, DbErr> {
    let course = match Courses::find_by_id(enrollment.course_id).one(db).await? {
        Some(course) => course,
        None => return Ok(None),
    };

    let curriculum = load_curriculum(db, course.id, true).await?;

    let progress = LessonProgress::find()
        .filter(ProgressColumn::EnrollmentId.eq(enrollment.id))
        .all(db)
        .await?;

    Ok(Some(EnrollmentDetail {
        enrollment_id: enrollment.enrollment_id,
        status: enrollment.status,
        progress_percentage: enrollment.progress_percentage,
        lessons_completed: enrollment.lessons_completed,
        enrolled_at: enrollment.enrolled_at,
        course: CourseSummary::from(&course),
        curriculum,
        lesson_progress: progress,
    }))
}

/// GET /student/course/{course_slug} - Enrollment lookup by course (PROTECTED)
#[get("/student/course/{course_slug}")]
pub async fn enrollment_by_course(
    auth_user: AuthUser,
    path: web::Path<String>,
    db: web::Data<DatabaseConnection>,
) -> HttpResponse {
    let course_slug = path.into_inner();

    let course = match Courses::find()
        .filter(CourseColumn::Slug.eq(&course_slug))
        .one(db.get_ref())
        .await
    {
        Ok(Some(course)) => course,
        Ok(None) => {
            return HttpResponse::NotFound().json(serde_json::json!({
                "enrolled": false
            }));
        }
        Err(e) => {
            return HttpResponse::InternalServerError().json(serde_json::json!({
                "error": format!("Database error: {}", e)
            }));
        }
    };

    let enrollment = match Enrollments::find()
        .filter(EnrollmentColumn::StudentId.eq(auth_user.user_id))
        .filter(EnrollmentColumn::CourseId.eq(course.id))
        .one(db.get_ref())
        .await
    {
        Ok(Some(enrollment)) => enrollment,
        Ok(None) => {
            return HttpResponse::NotFound().json(serde_json::json!({
                "enrolled": false
            }));
        }
        Err(e) => {
            return HttpResponse::InternalServerError().json(serde_json::json!({
                "error": format!("Database error: {}", e)
            }));
        }
    };

    let mut active: enrollments::ActiveModel = enrollment.clone().into();
    active.last_accessed = Set(Some(Utc::now().naive_utc()));
    if let Err(e) = active.update(db.get_ref()).await {
        tracing::warn!("failed to touch enrollment last_accessed: {}", e);
    }

    HttpResponse::Ok().json(serde_json::json!({
        "enrolled": true,
        "enrollment_id": enrollment.enrollment_id,
        "status": enrollment.status,
        "progress_percentage": enrollment.progress_percentage
    }))
}

/// POST /student/enroll-free/{course_id} - Direct enrollment for free courses (PROTECTED)
#[post("/student/enroll-free/{course_id}")]
pub async fn enroll_free(
    auth_user: AuthUser,
    path: web::Path<String>,
    db: web::Data<DatabaseConnection>,
) -> HttpResponse {
    let course_id = path.into_inner();

    let course = match Courses::find()
        .filter(CourseColumn::CourseId.eq(&course_id))
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

    if !course.is_free {
        return HttpResponse::BadRequest().json(serde_json::json!({
            "message": "This course is not free"
        }));
    }

    let (enrollment, created) =
        match EnrollmentService::enroll(db.get_ref(), auth_user.user_id, course.id).await {
            Ok(result) => result,
            Err(e) => {
                return HttpResponse::InternalServerError().json(serde_json::json!({
                    "error": format!("Failed to enroll: {}", e)
                }));
            }
        };

    if !created {
        return HttpResponse::BadRequest().json(serde_json::json!({
            "message": "Already enrolled"
        }));
    }

    let students = course.total_students;
    let mut active: courses::ActiveModel = course.into();
    active.total_students = Set(students + 1);
    if let Err(e) = active.update(db.get_ref()).await {
        tracing::warn!("failed to bump total_students: {}", e);
    }

    HttpResponse::Created().json(serde_json::json!({
        "message": "Enrolled successfully",
        "enrollment_id": enrollment.enrollment_id
    }))
}

/// POST /student/progress/{enrollment_id} - Record lesson progress (PROTECTED)
///
/// Completion is monotonic: a lesson never flips back to incomplete, and
/// the first completion bumps the enrollment counters. Hitting 100% marks
/// the enrollment completed.
#[post("/student/progress/{enrollment_id}")]
pub async fn record_progress(
    auth_user: AuthUser,
    path: web::Path<String>,
    body: web::Json<ProgressRequest>,
    db: web::Data<DatabaseConnection>,
) -> HttpResponse {
    let enrollment_id = path.into_inner();

    let enrollment = match Enrollments::find()
        .filter(EnrollmentColumn::EnrollmentId.eq(&enrollment_id))
        .filter(EnrollmentColumn::StudentId.eq(auth_user.user_id))
        .one(db.get_ref())
        .await
    {
        Ok(Some(enrollment)) => enrollment,
        Ok(None) => {
            return HttpResponse::NotFound().json(serde_json::json!({
                "error": "Enrollment not found"
            }));
        }
        Err(e) => {
            return HttpResponse::InternalServerError().json(serde_json::json!({
                "error": format!("Database error: {}", e)
            }));
        }
    };

    // The lesson must belong to the enrollment's course.
    let lesson = match Lessons::find()
        .filter(LessonColumn::LessonId.eq(&body.lesson_id))
        .inner_join(Sections)
        .filter(SectionColumn::CourseId.eq(enrollment.course_id))
        .one(db.get_ref())
        .await
    {
        Ok(Some(lesson)) => lesson,
        Ok(None) => {
            return HttpResponse::NotFound().json(serde_json::json!({
                "error": "Lesson not found in this course"
            }));
        }
        Err(e) => {
            return HttpResponse::InternalServerError().json(serde_json::json!({
                "error": format!("Database error: {}", e)
            }));
        }
    };

    let now = Utc::now().naive_utc();

    let existing = match LessonProgress::find()
        .filter(ProgressColumn::EnrollmentId.eq(enrollment.id))
        .filter(ProgressColumn::LessonId.eq(lesson.id))
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

    let mut newly_completed = false;

    let result = match existing {
        Some(progress) => {
            let was_completed = progress.is_completed;
            let time_spent = progress.time_spent;
            let mut active: lesson_progress::ActiveModel = progress.into();

            if body.is_completed == Some(true) && !was_completed {
                active.is_completed = Set(true);
                active.completed_at = Set(Some(now));
                newly_completed = true;
            }
            if let Some(spent) = body.time_spent {
                active.time_spent = Set(time_spent + spent.max(0));
            }
            if let Some(position) = body.last_position {
                active.last_position = Set(position.max(0));
            }
            active.last_accessed = Set(Some(now));
            active.update(db.get_ref()).await
        }
        None => {
            newly_completed = body.is_completed == Some(true);
            lesson_progress::ActiveModel {
                enrollment_id: Set(enrollment.id),
                lesson_id: Set(lesson.id),
                is_completed: Set(newly_completed),
                completed_at: Set(if newly_completed { Some(now) } else { None }),
                time_spent: Set(body.time_spent.unwrap_or(0).max(0)),
                last_position: Set(body.last_position.unwrap_or(0).max(0)),
                first_accessed: Set(Some(now)),
                last_accessed: Set(Some(now)),
                ..Default::default()
            }
            .insert(db.get_ref())
            .await
        }
    };

    if let Err(e) = result {
        return HttpResponse::InternalServerError().json(serde_json::json!({
            "error": format!("Failed to record progress: {}", e)
        }));
    }

    let mut lessons_completed = enrollment.lessons_completed;
    let mut progress_percentage = enrollment.progress_percentage;

    if newly_completed {
        lessons_completed += 1;

        let total_lessons = match Courses::find_by_id(enrollment.course_id).one(db.get_ref()).await {
            Ok(Some(course)) => course.total_lessons,
            Ok(None) => 0,
            Err(e) => {
                return HttpResponse::InternalServerError().json(serde_json::json!({
                    "error": format!("Database error: {}", e)
                }));
            }
        };

        let mut active: enrollments::ActiveModel = enrollment.into();
        active.lessons_completed = Set(lessons_completed);

        if let Some(pct) = EnrollmentService::compute_progress(lessons_completed, total_lessons) {
            progress_percentage = pct.max(progress_percentage);
            active.progress_percentage = Set(progress_percentage);
            if progress_percentage >= 100 {
                active.status = Set("completed".to_string());
                active.completed_at = Set(Some(now));
            }
        }

        if let Err(e) = active.update(db.get_ref()).await {
            return HttpResponse::InternalServerError().json(serde_json::json!({
                "error": format!("Failed to update enrollment: {}", e)
            }));
        }
    }

    HttpResponse::Ok().json(serde_json::json!({
        "message": "Progress recorded",
        "progress_percentage": progress_percentage,
        "lessons_completed": lessons_completed
    }))
}

pub fn enrollment_routes(cfg: &mut web::ServiceConfig) {
    cfg.service(list_enrollments)
        .service(enrollment_detail)
        .service(enrollment_by_course)
        .service(enroll_free)
        .service(record_progress);
}
