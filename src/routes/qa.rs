use actix_web::{get, post, web, HttpResponse};
use chrono::Utc;
use sea_orm::{
    ActiveModelTrait, ColumnTrait, DatabaseConnection, DbErr, EntityTrait, PaginatorTrait,
    QueryFilter, QueryOrder, Set,
};
use serde::{Deserialize, Serialize};

use crate::middleware::AuthUser;
use crate::models::answers::{self, Entity as Answers, Column as AnswerColumn};
use crate::models::courses::{Entity as Courses, Column as CourseColumn};
use crate::models::enrollments::{Entity as Enrollments, Column as EnrollmentColumn};
use crate::models::lessons::{Entity as Lessons, Column as LessonColumn};
use crate::models::questions::{self, Entity as Questions, Column as QuestionColumn};
use crate::models::users::Entity as Users;
use crate::utils::ids::generate_public_id;

#[derive(Deserialize)]
pub struct CreateQuestionRequest {
    pub title: String,
    pub content: String,
    pub lesson_id: Option<String>,
}

#[derive(Deserialize)]
pub struct CreateAnswerRequest {
    pub content: String,
}

#[derive(Serialize)]
pub struct AnswerResponse {
    pub answer_id: String,
    pub content: String,
    pub is_accepted: bool,
    pub user: Option<String>,
    pub created_at: Option<chrono::NaiveDateTime>,
}

#[derive(Serialize)]
pub struct QuestionResponse {
    pub question_id: String,
    pub title: String,
    pub content: String,
    pub is_resolved: bool,
    pub student: Option<String>,
    pub created_at: Option<chrono::NaiveDateTime>,
    pub answers: Vec<AnswerResponse>,
}

async fn username(db: &DatabaseConnection, user_id: i32) -> Result<Option<String>, DbErr> {
    Ok(Users::find_by_id(user_id).one(db).await?.map(|u| u.username))
}

async fn answers_for(
    db: &DatabaseConnection,
    question_pk: i32,
) -> Result<Vec<AnswerResponse>, DbErr> {
    // Accepted answers float to the top, then oldest first.
    let answers = Answers::find()
        .filter(AnswerColumn::QuestionId.eq(question_pk))
        .order_by_desc(AnswerColumn::IsAccepted)
        .order_by_asc(AnswerColumn::CreatedAt)
        .all(db)
        .await?;

    let mut responses = Vec::with_capacity(answers.len());
    for answer in answers {
        let user = username(db, answer.user_id).await?;
        responses.push(AnswerResponse {
            answer_id: answer.answer_id,
            content: answer.content,
            is_accepted: answer.is_accepted,
            user,
            created_at: answer.created_at,
        });
    }
    Ok(responses)
}

/// GET /courses/{course_slug}/qa - Questions with answers, newest first (PUBLIC)
#[get("/courses/{course_slug}/qa")]
pub async fn list_questions(
    path: web::Path<String>,
    db: web::Data<DatabaseConnection>,
) -> HttpResponse {
    let course_slug = path.into_inner();

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

    let questions = match Questions::find()
        .filter(QuestionColumn::CourseId.eq(course.id))
        .order_by_desc(QuestionColumn::CreatedAt)
        .all(db.get_ref())
        .await
    {
        Ok(questions) => questions,
        Err(e) => {
            return HttpResponse::InternalServerError().json(serde_json::json!({
                "error": format!("Database error: {}", e)
            }));
        }
    };

    let mut responses = Vec::with_capacity(questions.len());
    for question in questions {
        let student = match username(db.get_ref(), question.student_id).await {
            Ok(student) => student,
            Err(e) => {
                return HttpResponse::InternalServerError().json(serde_json::json!({
                    "error": format!("Database error: {}", e)
                }));
            }
        };
        let answers = match answers_for(db.get_ref(), question.id).await {
            Ok(answers) => answers,
            Err(e) => {
                return HttpResponse::InternalServerError().json(serde_json::json!({
                    "error": format!("Database error: {}", e)
                }));
            }
        };
        responses.push(QuestionResponse {
            question_id: question.question_id,
            title: question.title,
            content: question.content,
            is_resolved: question.is_resolved,
            student,
            created_at: question.created_at,
            answers,
        });
    }

    HttpResponse::Ok().json(responses)
}

/// POST /courses/{course_slug}/qa/create - Ask a question (PROTECTED)
///
/// Only enrolled students may post. An optional lesson_id pins the
/// question to a specific lesson.
#[post("/courses/{course_slug}/qa/create")]
pub async fn create_question(
    auth_user: AuthUser,
    path: web::Path<String>,
    body: web::Json<CreateQuestionRequest>,
    db: web::Data<DatabaseConnection>,
) -> HttpResponse {
    if body.title.trim().is_empty() || body.content.trim().is_empty() {
        return HttpResponse::BadRequest().json(serde_json::json!({
            "message": "Title and content are required"
        }));
    }

    let course_slug = path.into_inner();

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
            "message": "Only enrolled students can ask questions"
        }));
    }

    let lesson_pk = match &body.lesson_id {
        Some(lesson_id) => {
            match Lessons::find()
                .filter(LessonColumn::LessonId.eq(lesson_id))
                .one(db.get_ref())
                .await
            {
                Ok(Some(lesson)) => Some(lesson.id),
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
            }
        }
        None => None,
    };

    let now = Utc::now().naive_utc();
    let question = questions::ActiveModel {
        question_id: Set(generate_public_id()),
        course_id: Set(course.id),
        student_id: Set(auth_user.user_id),
        lesson_id: Set(lesson_pk),
        title: Set(body.title.clone()),
        content: Set(body.content.clone()),
        is_resolved: Set(false),
        created_at: Set(Some(now)),
        updated_at: Set(Some(now)),
        ..Default::default()
    };

    match question.insert(db.get_ref()).await {
        Ok(question) => HttpResponse::Created().json(serde_json::json!({
            "message": "Question posted",
            "question_id": question.question_id
        })),
        Err(e) => HttpResponse::InternalServerError().json(serde_json::json!({
            "error": format!("Failed to post question: {}", e)
        })),
    }
}

/// POST /qa/answer/{question_id} - Answer a question (PROTECTED)
#[post("/qa/answer/{question_id}")]
pub async fn create_answer(
    auth_user: AuthUser,
    path: web::Path<String>,
    body: web::Json<CreateAnswerRequest>,
    db: web::Data<DatabaseConnection>,
) -> HttpResponse {
    if body.content.trim().is_empty() {
        return HttpResponse::BadRequest().json(serde_json::json!({
            "message": "Content is required"
        }));
    }

    let question_id = path.into_inner();

    let question = match Questions::find()
        .filter(QuestionColumn::QuestionId.eq(&question_id))
        .one(db.get_ref())
        .await
    {
        Ok(Some(question)) => question,
        Ok(None) => {
            return HttpResponse::NotFound().json(serde_json::json!({
                "error": "Question not found"
            }));
        }
        Err(e) => {
            return HttpResponse::InternalServerError().json(serde_json::json!({
                "error": format!("Database error: {}", e)
            }));
        }
    };

    let now = Utc::now().naive_utc();
    let answer = answers::ActiveModel {
        answer_id: Set(generate_public_id()),
        question_id: Set(question.id),
        user_id: Set(auth_user.user_id),
        content: Set(body.content.clone()),
        is_accepted: Set(false),
        created_at: Set(Some(now)),
        updated_at: Set(Some(now)),
        ..Default::default()
    };

    match answer.insert(db.get_ref()).await {
        Ok(answer) => HttpResponse::Created().json(serde_json::json!({
            "message": "Answer posted",
            "answer_id": answer.answer_id
        })),
        Err(e) => HttpResponse::InternalServerError().json(serde_json::json!({
            "error": format!("Failed to post answer: {}", e)
        })),
    }
}

pub fn qa_routes(cfg: &mut web::ServiceConfig) {
    cfg.service(list_questions)
        .service(create_question)
        .service(create_answer);
}
