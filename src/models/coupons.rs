use serde::{Serialize, Deserialize};
use sea_orm::entity::prelude::*;
use chrono::Utc;

// discount_type: percentage | fixed
#[derive(Clone, Debug, PartialEq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "coupons")]
pub struct Model {
    #[sea_orm(primary_key)]
    pub id: i32,
    #[sea_orm(unique)]
    pub code: String, // matched case-insensitively
    pub discount_type: String,
    pub discount_value: Decimal,

    pub instructor_id: Option<i32>,
    pub min_purchase: Decimal,
    pub max_uses: i32, // 0 = unlimited
    pub times_used: i32,

    pub is_active: bool,
    pub valid_from: DateTime,
    pub valid_until: DateTime,

    pub created_at: Option<DateTime>,
}

impl Model {
    /// A coupon is valid when active, inside its window, and under its
    /// usage cap (max_uses == 0 means unlimited).
    pub fn is_valid(&self) -> bool {
        self.is_valid_at(Utc::now().naive_utc())
    }

    pub fn is_valid_at(&self, now: chrono::NaiveDateTime) -> bool {
        if !self.is_active {
            return false;
        }
        if self.valid_from > now || self.valid_until < now {
            return false;
        }
        if self.max_uses > 0 && self.times_used >= self.max_uses {
            return false;
        }
        true
    }
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(
        belongs_to = "super::users::Entity",
        from = "Column::InstructorId",
        to = "super::users::Column::Id"
    )]
    Instructor,

    #[sea_orm(has_many = "super::orders::Entity")]
    Order,
}

impl Related<super::users::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Instructor.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;

    fn coupon(is_active: bool, max_uses: i32, times_used: i32) -> Model {
        Model {
            id: 1,
            code: "SAVE20".to_string(),
            discount_type: "percentage".to_string(),
            discount_value: Decimal::from(20),
            instructor_id: None,
            min_purchase: Decimal::ZERO,
            max_uses,
            times_used,
            is_active,
            valid_from: NaiveDate::from_ymd_opt(2025, 1, 1).unwrap().and_hms_opt(0, 0, 0).unwrap(),
            valid_until: NaiveDate::from_ymd_opt(2025, 12, 31).unwrap().and_hms_opt(23, 59, 59).unwrap(),
            created_at: None,
        }
    }

    fn mid_2025() -> chrono::NaiveDateTime {
        NaiveDate::from_ymd_opt(2025, 6, 15).unwrap().and_hms_opt(12, 0, 0).unwrap()
    }

    #[test]
    fn test_valid_inside_window() {
        assert!(coupon(true, 0, 500).is_valid_at(mid_2025()));
    }

    #[test]
    fn test_inactive_rejected() {
        assert!(!coupon(false, 0, 0).is_valid_at(mid_2025()));
    }

    #[test]
    fn test_outside_window_rejected() {
        let c = coupon(true, 0, 0);
        let before = NaiveDate::from_ymd_opt(2024, 12, 31).unwrap().and_hms_opt(0, 0, 0).unwrap();
        let after = NaiveDate::from_ymd_opt(2026, 1, 1).unwrap().and_hms_opt(0, 0, 0).unwrap();
        assert!(!c.is_valid_at(before));
        assert!(!c.is_valid_at(after));
    }

    #[test]
    fn test_usage_cap() {
        assert!(coupon(true, 10, 9).is_valid_at(mid_2025()));
        assert!(!coupon(true, 10, 10).is_valid_at(mid_2025()));
        // 0 means unlimited
        assert!(coupon(true, 0, 1_000_000).is_valid_at(mid_2025()));
    }
}
