use serde::{Serialize, Deserialize};
use sea_orm::entity::prelude::*;
use rust_decimal::prelude::ToPrimitive;

// status: draft | review | published | archived
// level: beginner | intermediate | advanced
#[derive(Clone, Debug, PartialEq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "courses")]
pub struct Model {
    #[sea_orm(primary_key)]
    pub id: i32,
    #[sea_orm(unique)]
    pub course_id: String, // public id, generated once
    pub title: String,
    #[sea_orm(unique)]
    pub slug: String, // generated from title once
    pub short_description: Option<String>,
    pub description: String,
    pub thumbnail: Option<String>,
    pub intro_video: Option<String>,

    pub category_id: Option<i32>,
    pub language: String,
    pub level: String,
    pub tags: Option<String>, // comma-separated

    pub instructor_id: i32,

    pub price: Decimal,
    pub original_price: Option<Decimal>,
    pub is_free: bool, // auto-set when price == 0

    pub requirements: Option<String>,
    pub what_you_learn: Option<String>,
    pub target_audience: Option<String>,

    pub status: String,
    pub is_featured: bool,
    pub published_at: Option<DateTime>,

    // Denormalized metrics, recomputed by the maintenance service
    pub total_sections: i32,
    pub total_lessons: i32,
    pub total_duration: i32, // minutes
    pub total_students: i32,
    pub total_reviews: i32,
    pub average_rating: Decimal,

    pub created_at: Option<DateTime>,
    pub updated_at: Option<DateTime>,
}

impl Model {
    /// Percentage off versus the original price, 0 when there is no markdown.
    pub fn discount_percentage(&self) -> i32 {
        match self.original_price {
            Some(original) if original > self.price && original > Decimal::ZERO => {
                let ratio = (original - self.price) / original * Decimal::from(100);
                ratio.trunc().to_i32().unwrap_or(0)
            }
            _ => 0,
        }
    }
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(
        belongs_to = "super::categories::Entity",
        from = "Column::CategoryId",
        to = "super::categories::Column::Id"
    )]
    Category,

    #[sea_orm(
        belongs_to = "super::users::Entity",
        from = "Column::InstructorId",
        to = "super::users::Column::Id"
    )]
    Instructor,

    #[sea_orm(has_many = "super::sections::Entity")]
    Section,

    #[sea_orm(has_many = "super::enrollments::Entity")]
    Enrollment,

    #[sea_orm(has_many = "super::course_reviews::Entity")]
    Review,

    #[sea_orm(has_many = "super::questions::Entity")]
    Question,
}

impl Related<super::categories::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Category.def()
    }
}

impl Related<super::users::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Instructor.def()
    }
}

impl Related<super::sections::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Section.def()
    }
}

impl Related<super::enrollments::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Enrollment.def()
    }
}

impl Related<super::course_reviews::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Review.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}

#[cfg(test)]
mod tests {
    use super::*;
    use std::str::FromStr;

    fn course_with_prices(price: &str, original: Option<&str>) -> Model {
        Model {
            id: 1,
            course_id: "ABCDEF1234".to_string(),
            title: "t".to_string(),
            slug: "t".to_string(),
            short_description: None,
            description: String::new(),
            thumbnail: None,
            intro_video: None,
            category_id: None,
            language: "en".to_string(),
            level: "beginner".to_string(),
            tags: None,
            instructor_id: 1,
            price: Decimal::from_str(price).unwrap(),
            original_price: original.map(|p| Decimal::from_str(p).unwrap()),
            is_free: false,
            requirements: None,
            what_you_learn: None,
            target_audience: None,
            status: "published".to_string(),
            is_featured: false,
            published_at: None,
            total_sections: 0,
            total_lessons: 0,
            total_duration: 0,
            total_students: 0,
            total_reviews: 0,
            average_rating: Decimal::ZERO,
            created_at: None,
            updated_at: None,
        }
    }

    #[test]
    fn test_discount_percentage() {
        assert_eq!(course_with_prices("50.00", Some("100.00")).discount_percentage(), 50);
        assert_eq!(course_with_prices("49.99", Some("99.99")).discount_percentage(), 50);
        assert_eq!(course_with_prices("100.00", Some("50.00")).discount_percentage(), 0);
        assert_eq!(course_with_prices("10.00", None).discount_percentage(), 0);
    }
}
