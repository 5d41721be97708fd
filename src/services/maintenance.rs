// Periodic maintenance, run in-process from main (no external job broker).

use sea_orm::*;
use rust_decimal::Decimal;
use chrono::{Duration, Utc};

use crate::models::{carts, courses, course_reviews, enrollments, lessons, sections};

const ABANDONED_CART_DAYS: i64 = 7;

pub struct MaintenanceService;

impl MaintenanceService {
    /// Delete anonymous carts idle for more than 7 days. User-linked carts
    /// are kept; they are the user's saved basket.
    pub async fn cleanup_expired_carts(db: &DatabaseConnection) -> Result<u64, DbErr> {
        let threshold = Utc::now().naive_utc() - Duration::days(ABANDONED_CART_DAYS);

        let result = carts::Entity::delete_many()
            .filter(carts::Column::UserId.is_null())
            .filter(carts::Column::UpdatedAt.lt(threshold))
            .exec(db)
            .await?;

        if result.rows_affected > 0 {
            tracing::info!(count = result.rows_affected, "cleaned up abandoned carts");
        }
        Ok(result.rows_affected)
    }

    /// Recompute a course's denormalized metrics from its source tables:
    /// section/lesson counts, duration, student count, review aggregates.
    pub async fn update_course_metrics(
        db: &DatabaseConnection,
        course_pk: i32,
    ) -> Result<(), DbErr> {
        let course = match courses::Entity::find_by_id(course_pk).one(db).await? {
            Some(course) => course,
            None => {
                tracing::warn!(course_pk, "metrics update for missing course");
                return Ok(());
            }
        };

        let course_sections = sections::Entity::find()
            .filter(sections::Column::CourseId.eq(course_pk))
            .all(db)
            .await?;

        let mut total_lessons = 0i32;
        let mut total_duration = 0i32;
        for section in &course_sections {
            let section_lessons = lessons::Entity::find()
                .filter(lessons::Column::SectionId.eq(section.id))
                .all(db)
                .await?;
            total_lessons += section_lessons.len() as i32;
            total_duration += section_lessons.iter().map(|l| l.duration).sum::<i32>();
        }

        let total_students = enrollments::Entity::find()
            .filter(enrollments::Column::CourseId.eq(course_pk))
            .filter(enrollments::Column::Status.is_in(["active", "completed"]))
            .count(db)
            .await? as i32;

        let reviews = course_reviews::Entity::find()
            .filter(course_reviews::Column::CourseId.eq(course_pk))
            .filter(course_reviews::Column::IsApproved.eq(true))
            .all(db)
            .await?;
        let total_reviews = reviews.len() as i32;
        let average_rating = if reviews.is_empty() {
            Decimal::ZERO
        } else {
            let sum: i32 = reviews.iter().map(|r| r.rating).sum();
            (Decimal::from(sum) / Decimal::from(total_reviews)).round_dp(2)
        };

        let total_sections = course_sections.len() as i32;
        let mut active: courses::ActiveModel = course.into();
        active.total_sections = Set(total_sections);
        active.total_lessons = Set(total_lessons);
        active.total_duration = Set(total_duration);
        active.total_students = Set(total_students);
        active.total_reviews = Set(total_reviews);
        active.average_rating = Set(average_rating);
        active.updated_at = Set(Some(Utc::now().naive_utc()));
        active.update(db).await?;

        tracing::info!(course_pk, "course metrics updated");
        Ok(())
    }

    /// Refresh the denormalized metrics for every course. Returns how many
    /// courses were touched.
    pub async fn refresh_all_course_metrics(db: &DatabaseConnection) -> Result<u64, DbErr> {
        let courses = courses::Entity::find().all(db).await?;
        let count = courses.len() as u64;
        for course in courses {
            Self::update_course_metrics(db, course.id).await?;
        }
        Ok(count)
    }
}
