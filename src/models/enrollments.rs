use serde::{Serialize, Deserialize};
use sea_orm::entity::prelude::*;

// status: active | completed | dropped | expired
// (student_id, course_id) is unique: one enrollment per student per course,
// whichever path created it (free enroll or completed order).
#[derive(Clone, Debug, PartialEq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "enrollments")]
pub struct Model {
    #[sea_orm(primary_key)]
    pub id: i32,
    #[sea_orm(unique)]
    pub enrollment_id: String,
    pub student_id: i32,
    pub course_id: i32,

    pub status: String,

    pub progress_percentage: i32, // 0..=100, monotonic non-decreasing
    pub lessons_completed: i32,

    pub enrolled_at: Option<DateTime>,
    pub last_accessed: Option<DateTime>,
    pub completed_at: Option<DateTime>,

    pub certificate_issued: bool,
    pub certificate_id: Option<String>,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(
        belongs_to = "super::users::Entity",
        from = "Column::StudentId",
        to = "super::users::Column::Id"
    )]
    Student,

    #[sea_orm(
        belongs_to = "super::courses::Entity",
        from = "Column::CourseId",
        to = "super::courses::Column::Id"
    )]
    Course,

    #[sea_orm(has_many = "super::lesson_progress::Entity")]
    LessonProgress,
}

impl Related<super::users::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Student.def()
    }
}

impl Related<super::courses::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Course.def()
    }
}

impl Related<super::lesson_progress::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::LessonProgress.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}
