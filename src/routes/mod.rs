pub mod health;
pub mod auth;
pub mod profile;
pub mod categories;
pub mod courses;
pub mod cart;
pub mod orders;
pub mod enrollments;
pub mod reviews;
pub mod qa;
pub mod wishlist;
pub mod notifications;
pub mod instructor;

use actix_web::web;

pub fn configure_routes(cfg: &mut web::ServiceConfig) {
    // Health endpoints stay unprefixed for load balancers.
    cfg.service(health::health_check)
        .service(health::readiness_check)
        .service(health::detailed_health)
        .service(
            web::scope("/api/v1")
                .configure(auth::auth_routes)
                .configure(auth::user_compat_routes)
                .configure(profile::profile_routes)
                .configure(categories::category_routes)
                .configure(reviews::review_routes)
                .configure(qa::qa_routes)
                .configure(courses::course_routes)
                .configure(cart::cart_routes)
                .configure(orders::order_routes)
                .configure(enrollments::enrollment_routes)
                .configure(wishlist::wishlist_routes)
                .configure(notifications::notification_routes)
                .configure(instructor::instructor_routes),
        );
}
