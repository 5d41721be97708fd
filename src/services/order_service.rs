use sea_orm::*;
use rust_decimal::Decimal;
use chrono::Utc;

use crate::models::{carts, cart_items, coupons, courses, notifications, orders, order_items};
use crate::services::enrollment_service::EnrollmentService;

pub struct OrderService;

impl OrderService {
    /// Sum of the snapshotted item prices in a cart.
    pub async fn cart_total(db: &DatabaseConnection, cart_pk: i32) -> Result<Decimal, DbErr> {
        let items = cart_items::Entity::find()
            .filter(cart_items::Column::CartId.eq(cart_pk))
            .all(db)
            .await?;

        Ok(items.iter().map(|i| i.price).sum())
    }

    /// Discount for a coupon against an order subtotal, rounded to cents.
    /// Never exceeds the subtotal.
    pub fn compute_discount(subtotal: Decimal, discount_type: &str, discount_value: Decimal) -> Decimal {
        let raw = if discount_type == "percentage" {
            subtotal * discount_value / Decimal::from(100)
        } else {
            discount_value
        };

        raw.round_dp(2).min(subtotal)
    }

    /// Mark an order completed and grant access: one enrollment per item
    /// (get-or-create, so repeated completion calls add nothing), bump
    /// course student counts, count the coupon use, clear the student's
    /// carts, and leave an order notification.
    ///
    /// Callers must have verified payment (or total == 0) first.
    pub async fn complete_order(
        db: &DatabaseConnection,
        order: orders::Model,
        payment_method: &str,
        payment_id: Option<String>,
    ) -> Result<orders::Model, DbErr> {
        let order_pk = order.id;
        let student_id = order.student_id;
        let public_id = order.order_id.clone();
        let coupon_id = order.coupon_id;

        let mut active: orders::ActiveModel = order.into();
        active.status = Set("completed".to_string());
        active.payment_method = Set(payment_method.to_string());
        active.payment_id = Set(payment_id);
        active.completed_at = Set(Some(Utc::now().naive_utc()));
        active.updated_at = Set(Some(Utc::now().naive_utc()));
        let order = active.update(db).await?;

        if let Some(coupon_id) = coupon_id {
            if let Some(coupon) = coupons::Entity::find_by_id(coupon_id).one(db).await? {
                let times_used = coupon.times_used;
                let mut active: coupons::ActiveModel = coupon.into();
                active.times_used = Set(times_used + 1);
                active.update(db).await?;
            }
        }

        let items = order_items::Entity::find()
            .filter(order_items::Column::OrderId.eq(order_pk))
            .all(db)
            .await?;

        for item in items {
            let (_, created) = EnrollmentService::enroll(db, student_id, item.course_id).await?;
            if created {
                if let Some(course) = courses::Entity::find_by_id(item.course_id).one(db).await? {
                    let students = course.total_students;
                    let mut active: courses::ActiveModel = course.into();
                    active.total_students = Set(students + 1);
                    active.update(db).await?;
                }
            }
        }

        // The purchase supersedes whatever was in the basket.
        let user_carts = carts::Entity::find()
            .filter(carts::Column::UserId.eq(student_id))
            .all(db)
            .await?;
        for cart in user_carts {
            cart.delete(db).await?;
        }

        let notification = notifications::ActiveModel {
            user_id: Set(student_id),
            notification_type: Set("order".to_string()),
            title: Set("Order Completed".to_string()),
            message: Set(format!(
                "Your order #{} has been completed. Enjoy your courses!",
                public_id
            )),
            is_read: Set(false),
            order_id: Set(Some(order_pk)),
            created_at: Set(Some(Utc::now().naive_utc())),
            ..Default::default()
        };
        notification.insert(db).await?;

        tracing::info!(order_id = %public_id, "order completed");
        Ok(order)
    }

    /// Earnings attributed to an instructor: completed-order item prices.
    pub async fn instructor_earnings(
        db: &DatabaseConnection,
        instructor_id: i32,
    ) -> Result<Decimal, DbErr> {
        let items = order_items::Entity::find()
            .filter(order_items::Column::InstructorId.eq(instructor_id))
            .find_also_related(orders::Entity)
            .all(db)
            .await?;

        Ok(items
            .iter()
            .filter(|(_, order)| matches!(order, Some(o) if o.status == "completed"))
            .map(|(item, _)| item.price)
            .sum())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::enrollments;
    use sea_orm::{DatabaseBackend, MockDatabase};
    use std::str::FromStr;

    fn dec(s: &str) -> Decimal {
        Decimal::from_str(s).unwrap()
    }

    fn order(status: &str) -> orders::Model {
        orders::Model {
            id: 1,
            order_id: "ORDER12345".to_string(),
            student_id: 1,
            status: status.to_string(),
            subtotal: dec("49.99"),
            tax: Decimal::ZERO,
            discount: Decimal::ZERO,
            total: dec("49.99"),
            coupon_id: None,
            payment_method: "stripe".to_string(),
            payment_id: Some("pi_abc".to_string()),
            stripe_payment_intent: Some("cs_test_1".to_string()),
            paypal_order_id: None,
            created_at: None,
            updated_at: None,
            completed_at: None,
        }
    }

    fn order_item() -> order_items::Model {
        order_items::Model {
            id: 1,
            order_id: 1,
            course_id: 2,
            instructor_id: Some(3),
            price: dec("49.99"),
            created_at: None,
        }
    }

    fn existing_enrollment() -> enrollments::Model {
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

    fn order_notification() -> notifications::Model {
        notifications::Model {
            id: 1,
            user_id: 1,
            notification_type: "order".to_string(),
            title: "Order Completed".to_string(),
            message: String::new(),
            is_read: false,
            course_id: None,
            order_id: Some(1),
            created_at: None,
        }
    }

    // Re-running completion against an already-enrolled student must not
    // create a second enrollment; the only insert is the notification.
    #[tokio::test]
    async fn test_complete_order_grants_no_duplicate_enrollment() {
        let db = MockDatabase::new(DatabaseBackend::Postgres)
            .append_query_results([vec![order("completed")]])
            .append_query_results([vec![order_item()]])
            .append_query_results([vec![existing_enrollment()]])
            .append_query_results([Vec::<carts::Model>::new()])
            .append_query_results([vec![order_notification()]])
            .into_connection();

        let completed =
            OrderService::complete_order(&db, order("processing"), "stripe", Some("pi_abc".to_string()))
                .await
                .unwrap();
        assert_eq!(completed.status, "completed");

        let log = format!("{:?}", db.into_transaction_log());
        assert_eq!(log.matches("INSERT").count(), 1);
    }

    #[test]
    fn test_percentage_discount_rounds_to_cents() {
        // $49.99 cart with a 20%-off coupon: 9.998 rounds to $10.00
        let discount = OrderService::compute_discount(dec("49.99"), "percentage", dec("20"));
        assert_eq!(discount, dec("10.00"));
        assert_eq!(dec("49.99") - discount, dec("39.99"));
    }

    #[test]
    fn test_fixed_discount() {
        let discount = OrderService::compute_discount(dec("100.00"), "fixed", dec("15.00"));
        assert_eq!(discount, dec("15.00"));
    }

    #[test]
    fn test_discount_capped_at_subtotal() {
        let discount = OrderService::compute_discount(dec("10.00"), "fixed", dec("50.00"));
        assert_eq!(discount, dec("10.00"));

        let discount = OrderService::compute_discount(dec("20.00"), "percentage", dec("500"));
        assert_eq!(discount, dec("20.00"));
    }

    #[test]
    fn test_zero_subtotal() {
        let discount = OrderService::compute_discount(Decimal::ZERO, "percentage", dec("20"));
        assert_eq!(discount, Decimal::ZERO);
    }
}
