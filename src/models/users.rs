use serde::{Serialize, Deserialize};
use sea_orm::entity::prelude::*;

#[derive(Clone, Debug, PartialEq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "users")]
pub struct Model {
    #[sea_orm(primary_key)]
    pub id: i32,
    #[sea_orm(unique)]
    pub username: String,
    #[sea_orm(unique)]
    pub email: String, // login identifier
    pub full_name: String,
    #[serde(skip_serializing)]
    pub password_hash: String, // Format: pbkdf2:sha256:iterations$salt$hash
    #[serde(skip_serializing)]
    pub otp: Option<String>, // cleared after a successful password reset
    #[serde(skip_serializing)]
    pub refresh_token: Option<String>,
    pub created_at: Option<DateTime>,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(has_many = "super::profiles::Entity")]
    Profile,

    #[sea_orm(has_many = "super::courses::Entity")]
    Course,

    #[sea_orm(has_many = "super::enrollments::Entity")]
    Enrollment,

    #[sea_orm(has_many = "super::orders::Entity")]
    Order,

    #[sea_orm(has_many = "super::carts::Entity")]
    Cart,

    #[sea_orm(has_many = "super::notifications::Entity")]
    Notification,

    #[sea_orm(has_many = "super::wishlists::Entity")]
    Wishlist,
}

impl Related<super::profiles::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Profile.def()
    }
}

impl Related<super::courses::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Course.def()
    }
}

impl Related<super::enrollments::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Enrollment.def()
    }
}

impl Related<super::orders::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Order.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}
