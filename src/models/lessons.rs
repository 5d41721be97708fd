use serde::{Serialize, Deserialize};
use sea_orm::entity::prelude::*;

// lesson_type: video | text | quiz | assignment | resource
#[derive(Clone, Debug, PartialEq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "lessons")]
pub struct Model {
    #[sea_orm(primary_key)]
    pub id: i32,
    #[sea_orm(unique)]
    pub lesson_id: String,
    pub section_id: i32,
    pub title: String,
    pub description: Option<String>,
    pub lesson_type: String,

    pub content: Option<String>,   // text lessons
    pub video_url: Option<String>, // video lessons, hidden unless enrolled or free preview
    pub video_file: Option<String>,
    pub duration: i32, // minutes

    pub sort_order: i32,
    pub is_free_preview: bool,
    pub is_published: bool,

    pub created_at: Option<DateTime>,
    pub updated_at: Option<DateTime>,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(
        belongs_to = "super::sections::Entity",
        from = "Column::SectionId",
        to = "super::sections::Column::Id"
    )]
    Section,

    #[sea_orm(has_many = "super::lesson_resources::Entity")]
    Resource,
}

impl Related<super::sections::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Section.def()
    }
}

impl Related<super::lesson_resources::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Resource.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}
