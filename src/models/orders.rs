use serde::{Serialize, Deserialize};
use sea_orm::entity::prelude::*;

// status is monotonic: pending -> processing -> completed | failed | refunded.
// payment_method: stripe | paypal | free
#[derive(Clone, Debug, PartialEq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "orders")]
pub struct Model {
    #[sea_orm(primary_key)]
    pub id: i32,
    #[sea_orm(unique)]
    pub order_id: String, // public id used in checkout URLs
    pub student_id: i32,

    pub status: String,

    // total = subtotal - discount (tax carried for parity, always 0 today)
    pub subtotal: Decimal,
    pub tax: Decimal,
    pub discount: Decimal,
    pub total: Decimal,

    pub coupon_id: Option<i32>,

    pub payment_method: String,
    pub payment_id: Option<String>,
    pub stripe_payment_intent: Option<String>, // checkout session id while processing
    pub paypal_order_id: Option<String>,

    pub created_at: Option<DateTime>,
    pub updated_at: Option<DateTime>,
    pub completed_at: Option<DateTime>,
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
        belongs_to = "super::coupons::Entity",
        from = "Column::CouponId",
        to = "super::coupons::Column::Id"
    )]
    Coupon,

    #[sea_orm(has_many = "super::order_items::Entity")]
    Item,
}

impl Related<super::users::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Student.def()
    }
}

impl Related<super::coupons::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Coupon.def()
    }
}

impl Related<super::order_items::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Item.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}
