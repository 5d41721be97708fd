use sea_orm::*;
use rust_decimal::Decimal;
use chrono::Utc;

use crate::models::{course_reviews, courses, enrollments};
use crate::utils::ids;

pub struct EnrollmentService;

impl EnrollmentService {
    /// Get-or-create the (student, course) enrollment. Returns the row and
    /// whether it was created. The unique index backs this up if two
    /// requests race; the second insert fails instead of duplicating.
    pub async fn enroll(
        db: &DatabaseConnection,
        student_id: i32,
        course_id: i32,
    ) -> Result<(enrollments::Model, bool), DbErr> {
        let existing = enrollments::Entity::find()
            .filter(enrollments::Column::StudentId.eq(student_id))
            .filter(enrollments::Column::CourseId.eq(course_id))
            .one(db)
            .await?;

        if let Some(enrollment) = existing {
            return Ok((enrollment, false));
        }

        let enrollment = enrollments::ActiveModel {
            enrollment_id: Set(ids::generate_public_id()),
            student_id: Set(student_id),
            course_id: Set(course_id),
            status: Set("active".to_string()),
            progress_percentage: Set(0),
            lessons_completed: Set(0),
            enrolled_at: Set(Some(Utc::now().naive_utc())),
            certificate_issued: Set(false),
            ..Default::default()
        };

        let enrollment = enrollment.insert(db).await?;
        tracing::info!(
            enrollment_id = %enrollment.enrollment_id,
            student_id,
            course_id,
            "enrollment created"
        );
        Ok((enrollment, true))
    }

    /// Completion percentage for an enrollment, integer-truncated and capped
    /// at 100. `None` when the course has no lessons counted yet, in which
    /// case the stored percentage is left untouched.
    pub fn compute_progress(lessons_completed: i32, total_lessons: i32) -> Option<i32> {
        if total_lessons <= 0 {
            return None;
        }
        let pct = (lessons_completed as i64 * 100) / total_lessons as i64;
        Some(pct.min(100) as i32)
    }

    /// Recompute a course's review aggregates from the approved reviews.
    /// Full aggregate query on every review write; fine at this scale.
    pub async fn recompute_course_rating(
        db: &DatabaseConnection,
        course_pk: i32,
    ) -> Result<(), DbErr> {
        let reviews = course_reviews::Entity::find()
            .filter(course_reviews::Column::CourseId.eq(course_pk))
            .filter(course_reviews::Column::IsApproved.eq(true))
            .all(db)
            .await?;

        let total_reviews = reviews.len() as i32;
        let average = if reviews.is_empty() {
            Decimal::ZERO
        } else {
            let sum: i32 = reviews.iter().map(|r| r.rating).sum();
            (Decimal::from(sum) / Decimal::from(total_reviews)).round_dp(2)
        };

        if let Some(course) = courses::Entity::find_by_id(course_pk).one(db).await? {
            let mut active: courses::ActiveModel = course.into();
            active.average_rating = Set(average);
            active.total_reviews = Set(total_reviews);
            active.update(db).await?;
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use sea_orm::{DatabaseBackend, MockDatabase};

    fn enrollment_row() -> enrollments::Model {
        enrollments::Model {
            id: 7,
            enrollment_id: "ENROLL1234".to_string(),
            student_id: 1,
            course_id: 2,
            status: "active".to_string(),
            progress_percentage: 0,
            lessons_completed: 0,
            enrolled_at: None,
            last_accessed: None,
            completed_at: None,
            certificate_issued: false,
            certificate_id: None,
        }
    }

    #[tokio::test]
    async fn test_enroll_returns_existing_row_without_insert() {
        let db = MockDatabase::new(DatabaseBackend::Postgres)
            .append_query_results([vec![enrollment_row()]])
            .into_connection();

        let (enrollment, created) = EnrollmentService::enroll(&db, 1, 2).await.unwrap();
        assert!(!created);
        assert_eq!(enrollment.id, 7);

        // One SELECT, nothing written
        let log = format!("{:?}", db.into_transaction_log());
        assert!(!log.contains("INSERT"));
    }

    #[tokio::test]
    async fn test_enroll_inserts_when_absent() {
        let db = MockDatabase::new(DatabaseBackend::Postgres)
            .append_query_results([Vec::<enrollments::Model>::new(), vec![enrollment_row()]])
            .into_connection();

        let (_, created) = EnrollmentService::enroll(&db, 1, 2).await.unwrap();
        assert!(created);

        let log = format!("{:?}", db.into_transaction_log());
        assert!(log.contains("INSERT"));
    }

    #[test]
    fn test_progress_truncates() {
        assert_eq!(EnrollmentService::compute_progress(1, 3), Some(33));
        assert_eq!(EnrollmentService::compute_progress(2, 3), Some(66));
        assert_eq!(EnrollmentService::compute_progress(3, 3), Some(100));
    }

    #[test]
    fn test_progress_caps_at_100() {
        // lessons_completed can exceed total_lessons if lessons were removed
        assert_eq!(EnrollmentService::compute_progress(5, 3), Some(100));
    }

    #[test]
    fn test_progress_skips_empty_course() {
        assert_eq!(EnrollmentService::compute_progress(0, 0), None);
        assert_eq!(EnrollmentService::compute_progress(2, -1), None);
    }

    #[test]
    fn test_progress_zero_completed() {
        assert_eq!(EnrollmentService::compute_progress(0, 10), Some(0));
    }
}
