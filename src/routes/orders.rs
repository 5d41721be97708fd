use actix_web::{get, post, web, HttpResponse};
use chrono::Utc;
use sea_orm::sea_query::{Expr, Func};
use sea_orm::{
    ActiveModelTrait, ColumnTrait, DatabaseConnection, DbErr, EntityTrait, PaginatorTrait,
    QueryFilter, QueryOrder, Set,
};
use serde::{Deserialize, Serialize};
use rust_decimal::Decimal;

use crate::middleware::AuthUser;
use crate::models::cart_items::{Entity as CartItems, Column as CartItemColumn};
use crate::models::carts::{Entity as Carts, Column as CartColumn};
use crate::models::coupons::{self, Entity as Coupons};
use crate::models::courses::Entity as Courses;
use crate::models::dto::{PageQuery, Paginated};
use crate::models::enrollments::{Entity as Enrollments, Column as EnrollmentColumn};
use crate::models::order_items::{self, Entity as OrderItems, Column as OrderItemColumn};
use crate::models::orders::{self, Entity as Orders, Column as OrderColumn};
use crate::services::order_service::OrderService;
use crate::services::payments::{PayPalClient, PaymentGateway, StripeClient};
use crate::utils::ids::generate_public_id;

#[derive(Deserialize)]
pub struct CreateOrderRequest {
    pub cart_id: Option<String>,
}

#[derive(Deserialize)]
pub struct ApplyCouponRequest {
    pub order_oid: String,
    pub coupon_code: String,
}

#[derive(Deserialize)]
pub struct PaymentSuccessParams {
    pub session_id: Option<String>,
    pub paypal_order_id: Option<String>,
}

#[derive(Serialize)]
pub struct OrderItemResponse {
    pub course_id: String,
    pub title: String,
    pub thumbnail: Option<String>,
    pub price: Decimal,
}

#[derive(Serialize)]
pub struct OrderResponse {
    pub order_id: String,
    pub status: String,
    pub subtotal: Decimal,
    pub tax: Decimal,
    pub discount: Decimal,
    pub total: Decimal,
    pub payment_method: String,
    pub created_at: Option<chrono::NaiveDateTime>,
    pub completed_at: Option<chrono::NaiveDateTime>,
    pub items: Vec<OrderItemResponse>,
}

async fn build_order_response(
    db: &DatabaseConnection,
    order: &orders::Model,
) -> Result<OrderResponse, DbErr> {
    let items = OrderItems::find()
        .filter(OrderItemColumn::OrderId.eq(order.id))
        .find_also_related(Courses)
        .all(db)
        .await?;

    let items = items
        .into_iter()
        .filter_map(|(item, course)| {
            course.map(|course| OrderItemResponse {
                course_id: course.course_id,
                title: course.title,
                thumbnail: course.thumbnail,
                price: item.price,
            })
        })
        .collect();

    Ok(OrderResponse {
        order_id: order.order_id.clone(),
        status: order.status.clone(),
        subtotal: order.subtotal,
        tax: order.tax,
        discount: order.discount,
        total: order.total,
        payment_method: order.payment_method.clone(),
        created_at: order.created_at,
        completed_at: order.completed_at,
        items,
    })
}

/// A session id may only complete the order it was created for. Orders that
/// never started a Stripe checkout have no session and accept none.
fn stripe_session_matches(order: &orders::Model, session_id: &str) -> bool {
    order.stripe_payment_intent.as_deref() == Some(session_id)
}

async fn find_own_order(
    db: &DatabaseConnection,
    student_id: i32,
    order_oid: &str,
) -> Result<Option<orders::Model>, DbErr> {
    Orders::find()
        .filter(OrderColumn::OrderId.eq(order_oid))
        .filter(OrderColumn::StudentId.eq(student_id))
        .one(db)
        .await
}

/// POST /order/create - Turn the cart into a pending order (PROTECTED)
#[post("/order/create")]
pub async fn create_order(
    auth_user: AuthUser,
    body: web::Json<CreateOrderRequest>,
    db: web::Data<DatabaseConnection>,
) -> HttpResponse {
    // Explicit cart_id wins (anonymous cart carried through login),
    // otherwise the user's own cart.
    let cart = match &body.cart_id {
        Some(cart_id) => Carts::find()
            .filter(CartColumn::CartId.eq(cart_id))
            .one(db.get_ref())
            .await,
        None => Carts::find()
            .filter(CartColumn::UserId.eq(auth_user.user_id))
            .one(db.get_ref())
            .await,
    };

    let cart = match cart {
        Ok(Some(cart)) => cart,
        Ok(None) => {
            return HttpResponse::BadRequest().json(serde_json::json!({
                "message": "Cart is empty"
            }));
        }
        Err(e) => {
            return HttpResponse::InternalServerError().json(serde_json::json!({
                "error": format!("Database error: {}", e)
            }));
        }
    };

    let cart_items = match CartItems::find()
        .filter(CartItemColumn::CartId.eq(cart.id))
        .find_also_related(Courses)
        .all(db.get_ref())
        .await
    {
        Ok(items) => items,
        Err(e) => {
            return HttpResponse::InternalServerError().json(serde_json::json!({
                "error": format!("Database error: {}", e)
            }));
        }
    };

    if cart_items.is_empty() {
        return HttpResponse::BadRequest().json(serde_json::json!({
            "message": "Cart is empty"
        }));
    }

    for (item, course) in &cart_items {
        let enrolled = match Enrollments::find()
            .filter(EnrollmentColumn::StudentId.eq(auth_user.user_id))
            .filter(EnrollmentColumn::CourseId.eq(item.course_id))
            .count(db.get_ref())
            .await
        {
            Ok(count) => count > 0,
            Err(e) => {
                return HttpResponse::InternalServerError().json(serde_json::json!({
                    "error": format!("Database error: {}", e)
                }));
            }
        };
        if enrolled {
            let title = course
                .as_ref()
                .map(|c| c.title.clone())
                .unwrap_or_else(|| "a course".to_string());
            return HttpResponse::BadRequest().json(serde_json::json!({
                "message": format!("You are already enrolled in {}", title)
            }));
        }
    }

    let subtotal: Decimal = cart_items.iter().map(|(item, _)| item.price).sum();
    let now = Utc::now().naive_utc();

    let order = orders::ActiveModel {
        order_id: Set(generate_public_id()),
        student_id: Set(auth_user.user_id),
        status: Set("pending".to_string()),
        subtotal: Set(subtotal),
        tax: Set(Decimal::ZERO),
        discount: Set(Decimal::ZERO),
        total: Set(subtotal),
        coupon_id: Set(None),
        payment_method: Set("pending".to_string()),
        payment_id: Set(None),
        stripe_payment_intent: Set(None),
        paypal_order_id: Set(None),
        created_at: Set(Some(now)),
        updated_at: Set(Some(now)),
        completed_at: Set(None),
        ..Default::default()
    };

    let order = match order.insert(db.get_ref()).await {
        Ok(order) => order,
        Err(e) => {
            return HttpResponse::InternalServerError().json(serde_json::json!({
                "error": format!("Failed to create order: {}", e)
            }));
        }
    };

    for (item, course) in &cart_items {
        let order_item = order_items::ActiveModel {
            order_id: Set(order.id),
            course_id: Set(item.course_id),
            instructor_id: Set(course.as_ref().map(|c| c.instructor_id)),
            price: Set(item.price),
            created_at: Set(Some(now)),
            ..Default::default()
        };
        if let Err(e) = order_item.insert(db.get_ref()).await {
            return HttpResponse::InternalServerError().json(serde_json::json!({
                "error": format!("Failed to create order: {}", e)
            }));
        }
    }

    match build_order_response(db.get_ref(), &order).await {
        Ok(response) => HttpResponse::Created().json(response),
        Err(e) => HttpResponse::InternalServerError().json(serde_json::json!({
            "error": format!("Database error: {}", e)
        })),
    }
}

/// GET /order/list - Own orders, newest first (PROTECTED)
#[get("/order/list")]
pub async fn list_orders(
    auth_user: AuthUser,
    query: web::Query<PageQuery>,
    db: web::Data<DatabaseConnection>,
) -> HttpResponse {
    let (page, page_size) = query.normalized();

    let paginator = Orders::find()
        .filter(OrderColumn::StudentId.eq(auth_user.user_id))
        .order_by_desc(OrderColumn::CreatedAt)
        .paginate(db.get_ref(), page_size);

    let count = match paginator.num_items().await {
        Ok(count) => count,
        Err(e) => {
            return HttpResponse::InternalServerError().json(serde_json::json!({
                "error": format!("Database error: {}", e)
            }));
        }
    };

    let orders = match paginator.fetch_page(page).await {
        Ok(orders) => orders,
        Err(e) => {
            return HttpResponse::InternalServerError().json(serde_json::json!({
                "error": format!("Database error: {}", e)
            }));
        }
    };

    let mut results = Vec::with_capacity(orders.len());
    for order in &orders {
        match build_order_response(db.get_ref(), order).await {
            Ok(response) => results.push(response),
            Err(e) => {
                return HttpResponse::InternalServerError().json(serde_json::json!({
                    "error": format!("Database error: {}", e)
                }));
            }
        }
    }

    HttpResponse::Ok().json(Paginated {
        count,
        page: page + 1,
        page_size,
        results,
    })
}

/// GET /order/checkout/{order_oid} - Order detail for the checkout page (PROTECTED)
#[get("/order/checkout/{order_oid}")]
pub async fn checkout_detail(
    auth_user: AuthUser,
    path: web::Path<String>,
    db: web::Data<DatabaseConnection>,
) -> HttpResponse {
    let order_oid = path.into_inner();

    let order = match find_own_order(db.get_ref(), auth_user.user_id, &order_oid).await {
        Ok(Some(order)) => order,
        Ok(None) => {
            return HttpResponse::NotFound().json(serde_json::json!({
                "error": "Order not found"
            }));
        }
        Err(e) => {
            return HttpResponse::InternalServerError().json(serde_json::json!({
                "error": format!("Database error: {}", e)
            }));
        }
    };

    match build_order_response(db.get_ref(), &order).await {
        Ok(response) => HttpResponse::Ok().json(response),
        Err(e) => HttpResponse::InternalServerError().json(serde_json::json!({
            "error": format!("Database error: {}", e)
        })),
    }
}

/// POST /order/coupon - Apply a coupon to a pending order (PROTECTED)
#[post("/order/coupon")]
pub async fn apply_coupon(
    auth_user: AuthUser,
    body: web::Json<ApplyCouponRequest>,
    db: web::Data<DatabaseConnection>,
) -> HttpResponse {
    let order = match find_own_order(db.get_ref(), auth_user.user_id, &body.order_oid).await {
        Ok(Some(order)) => order,
        Ok(None) => {
            return HttpResponse::NotFound().json(serde_json::json!({
                "error": "Order not found"
            }));
        }
        Err(e) => {
            return HttpResponse::InternalServerError().json(serde_json::json!({
                "error": format!("Database error: {}", e)
            }));
        }
    };

    if order.status != "pending" {
        return HttpResponse::BadRequest().json(serde_json::json!({
            "message": "Coupons can only be applied to pending orders"
        }));
    }

    let coupon = match Coupons::find()
        .filter(
            Expr::expr(Func::lower(Expr::col(coupons::Column::Code)))
                .eq(body.coupon_code.to_lowercase()),
        )
        .one(db.get_ref())
        .await
    {
        Ok(Some(coupon)) => coupon,
        Ok(None) => {
            return HttpResponse::NotFound().json(serde_json::json!({
                "error": "Coupon not found"
            }));
        }
        Err(e) => {
            return HttpResponse::InternalServerError().json(serde_json::json!({
                "error": format!("Database error: {}", e)
            }));
        }
    };

    if !coupon.is_valid() {
        return HttpResponse::BadRequest().json(serde_json::json!({
            "message": "This coupon is expired or no longer valid"
        }));
    }

    if order.subtotal < coupon.min_purchase {
        return HttpResponse::BadRequest().json(serde_json::json!({
            "message": format!("This coupon requires a minimum purchase of {}", coupon.min_purchase)
        }));
    }

    let discount =
        OrderService::compute_discount(order.subtotal, &coupon.discount_type, coupon.discount_value);
    let total = order.subtotal - discount;

    let subtotal = order.subtotal;
    let mut active: orders::ActiveModel = order.into();
    active.coupon_id = Set(Some(coupon.id));
    active.discount = Set(discount);
    active.total = Set(total);
    active.updated_at = Set(Some(Utc::now().naive_utc()));

    match active.update(db.get_ref()).await {
        Ok(_) => HttpResponse::Ok().json(serde_json::json!({
            "message": "Coupon applied",
            "subtotal": subtotal,
            "discount": discount,
            "total": total
        })),
        Err(e) => HttpResponse::InternalServerError().json(serde_json::json!({
            "error": format!("Failed to apply coupon: {}", e)
        })),
    }
}

/// POST /order/stripe-checkout/{order_oid} - Start a Stripe Checkout session (PROTECTED)
///
/// Free orders skip the gateway and complete immediately.
#[post("/order/stripe-checkout/{order_oid}")]
pub async fn stripe_checkout(
    auth_user: AuthUser,
    path: web::Path<String>,
    db: web::Data<DatabaseConnection>,
) -> HttpResponse {
    let order_oid = path.into_inner();

    let order = match find_own_order(db.get_ref(), auth_user.user_id, &order_oid).await {
        Ok(Some(order)) => order,
        Ok(None) => {
            return HttpResponse::NotFound().json(serde_json::json!({
                "error": "Order not found"
            }));
        }
        Err(e) => {
            return HttpResponse::InternalServerError().json(serde_json::json!({
                "error": format!("Database error: {}", e)
            }));
        }
    };

    if order.status != "pending" {
        return HttpResponse::BadRequest().json(serde_json::json!({
            "message": "Order is not pending"
        }));
    }

    if order.total == Decimal::ZERO {
        return match OrderService::complete_order(db.get_ref(), order, "free", None).await {
            Ok(order) => HttpResponse::Ok().json(serde_json::json!({
                "message": "Order completed",
                "redirect_url": format!("/payment-success/?order_id={}", order.order_id)
            })),
            Err(e) => HttpResponse::InternalServerError().json(serde_json::json!({
                "error": format!("Failed to complete order: {}", e)
            })),
        };
    }

    let stripe = match StripeClient::from_env() {
        Ok(stripe) => stripe,
        Err(e) => {
            tracing::error!("stripe not configured: {}", e);
            return HttpResponse::InternalServerError().json(serde_json::json!({
                "error": "Payment gateway is not configured"
            }));
        }
    };

    let session = match stripe.create_checkout_session(&order, &auth_user.email).await {
        Ok(session) => session,
        Err(e) => {
            tracing::error!(order_id = %order.order_id, "stripe session failed: {}", e);
            return HttpResponse::InternalServerError().json(serde_json::json!({
                "error": "Failed to create checkout session"
            }));
        }
    };

    let checkout_url = session.url.clone();
    let mut active: orders::ActiveModel = order.into();
    active.stripe_payment_intent = Set(Some(session.id));
    active.status = Set("processing".to_string());
    active.updated_at = Set(Some(Utc::now().naive_utc()));

    match active.update(db.get_ref()).await {
        Ok(_) => HttpResponse::Ok().json(serde_json::json!({
            "checkout_url": checkout_url
        })),
        Err(e) => HttpResponse::InternalServerError().json(serde_json::json!({
            "error": format!("Database error: {}", e)
        })),
    }
}

/// Shared by GET and POST /order/payment-success/{order_oid}.
///
/// The client supplies a gateway reference (Stripe session id or PayPal
/// order id); payment state is always re-verified against the gateway.
async fn process_payment_success(
    auth_user: AuthUser,
    order_oid: String,
    params: PaymentSuccessParams,
    db: &DatabaseConnection,
) -> HttpResponse {
    let order = match find_own_order(db, auth_user.user_id, &order_oid).await {
        Ok(Some(order)) => order,
        Ok(None) => {
            return HttpResponse::NotFound().json(serde_json::json!({
                "error": "Order not found"
            }));
        }
        Err(e) => {
            return HttpResponse::InternalServerError().json(serde_json::json!({
                "error": format!("Database error: {}", e)
            }));
        }
    };

    if order.status == "completed" {
        return HttpResponse::Ok().json(serde_json::json!({
            "message": "Already Paid"
        }));
    }

    let session_id = params.session_id.filter(|s| !s.is_empty() && s != "null");
    let paypal_order_id = params.paypal_order_id.filter(|s| !s.is_empty() && s != "null");

    let (confirmation, method) = if let Some(session_id) = session_id {
        if !stripe_session_matches(&order, &session_id) {
            return HttpResponse::BadRequest().json(serde_json::json!({
                "message": "Payment session does not match this order"
            }));
        }
        let stripe = match StripeClient::from_env() {
            Ok(stripe) => stripe,
            Err(e) => {
                tracing::error!("stripe not configured: {}", e);
                return HttpResponse::InternalServerError().json(serde_json::json!({
                    "error": "Payment gateway is not configured"
                }));
            }
        };
        (stripe.verify_payment(&session_id).await, "stripe")
    } else if let Some(paypal_order_id) = paypal_order_id {
        let paypal = match PayPalClient::from_env() {
            Ok(paypal) => paypal,
            Err(e) => {
                tracing::error!("paypal not configured: {}", e);
                return HttpResponse::InternalServerError().json(serde_json::json!({
                    "error": "Payment gateway is not configured"
                }));
            }
        };
        (paypal.verify_payment(&paypal_order_id).await, "paypal")
    } else {
        return HttpResponse::BadRequest().json(serde_json::json!({
            "message": "No payment reference supplied"
        }));
    };

    let confirmation = match confirmation {
        Ok(confirmation) => confirmation,
        Err(e) => {
            tracing::error!(order_id = %order.order_id, "payment verification failed: {}", e);
            return verification_failed_response();
        }
    };

    if !confirmation.paid {
        return HttpResponse::BadRequest().json(serde_json::json!({
            "message": "Payment Failed"
        }));
    }

    match OrderService::complete_order(db, order, method, confirmation.payment_id).await {
        Ok(order) => match build_order_response(db, &order).await {
            Ok(response) => HttpResponse::Ok().json(serde_json::json!({
                "message": "Payment Successful",
                "order": response
            })),
            Err(e) => HttpResponse::InternalServerError().json(serde_json::json!({
                "error": format!("Database error: {}", e)
            })),
        },
        Err(e) => HttpResponse::InternalServerError().json(serde_json::json!({
            "error": format!("Failed to complete order: {}", e)
        })),
    }
}

pub async fn payment_success_post(
    auth_user: AuthUser,
    path: web::Path<String>,
    body: web::Json<PaymentSuccessParams>,
    db: web::Data<DatabaseConnection>,
) -> HttpResponse {
    process_payment_success(auth_user, path.into_inner(), body.into_inner(), db.get_ref()).await
}

pub async fn payment_success_get(
    auth_user: AuthUser,
    path: web::Path<String>,
    query: web::Query<PaymentSuccessParams>,
    db: web::Data<DatabaseConnection>,
) -> HttpResponse {
    process_payment_success(auth_user, path.into_inner(), query.into_inner(), db.get_ref()).await
}

fn verification_failed_response() -> HttpResponse {
    HttpResponse::InternalServerError().json(serde_json::json!({
        "error": "Payment verification failed"
    }))
}

pub fn order_routes(cfg: &mut web::ServiceConfig) {
    cfg.service(create_order)
        .service(list_orders)
        .service(checkout_detail)
        .service(apply_coupon)
        .service(stripe_checkout)
        .service(
            web::resource("/order/payment-success/{order_oid}")
                .route(web::get().to(payment_success_get))
                .route(web::post().to(payment_success_post)),
        );
}

#[cfg(test)]
mod tests {
    use super::*;
    use actix_web::http::StatusCode;
    use actix_web::test as actix_test;
    use actix_web::App;
    use sea_orm::{DatabaseBackend, MockDatabase};
    use std::str::FromStr;

    use crate::utils::jwt;

    fn order_fixture(status: &str, session: Option<&str>) -> orders::Model {
        orders::Model {
            id: 1,
            order_id: "ORDER12345".to_string(),
            student_id: 1,
            status: status.to_string(),
            subtotal: Decimal::from_str("49.99").unwrap(),
            tax: Decimal::ZERO,
            discount: Decimal::ZERO,
            total: Decimal::from_str("49.99").unwrap(),
            coupon_id: None,
            payment_method: "pending".to_string(),
            payment_id: None,
            stripe_payment_intent: session.map(|s| s.to_string()),
            paypal_order_id: None,
            created_at: None,
            updated_at: None,
            completed_at: None,
        }
    }

    #[test]
    fn test_stripe_session_must_match_order() {
        let order = order_fixture("processing", Some("cs_test_own"));
        assert!(stripe_session_matches(&order, "cs_test_own"));
        // A paid session from another order cannot complete this one
        assert!(!stripe_session_matches(&order, "cs_test_other"));
    }

    #[test]
    fn test_order_without_checkout_accepts_no_session() {
        let order = order_fixture("processing", None);
        assert!(!stripe_session_matches(&order, "cs_test_own"));
    }

    #[test]
    fn test_verification_failure_is_a_server_error() {
        let response = verification_failed_response();
        assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
    }

    #[actix_web::test]
    async fn test_completed_order_short_circuits_already_paid() {
        let db = MockDatabase::new(DatabaseBackend::Postgres)
            .append_query_results([vec![order_fixture("completed", Some("cs_test_1"))]])
            .into_connection();

        let app = actix_test::init_service(
            App::new()
                .app_data(web::Data::new(db))
                .configure(order_routes),
        )
        .await;

        let token = jwt::generate_access_token(1, "student@example.com", "student").unwrap();
        let req = actix_test::TestRequest::get()
            .uri("/order/payment-success/ORDER12345?session_id=cs_test_1")
            .insert_header(("Authorization", format!("Bearer {}", token)))
            .to_request();
        let resp = actix_test::call_service(&app, req).await;
        assert_eq!(resp.status(), StatusCode::OK);

        // No gateway call, no writes: the completed order answers directly.
        let body: serde_json::Value = actix_test::read_body_json(resp).await;
        assert_eq!(body["message"], "Already Paid");
    }

    #[actix_web::test]
    async fn test_mismatched_session_is_rejected_before_verification() {
        let db = MockDatabase::new(DatabaseBackend::Postgres)
            .append_query_results([vec![order_fixture("processing", Some("cs_test_own"))]])
            .into_connection();

        let app = actix_test::init_service(
            App::new()
                .app_data(web::Data::new(db))
                .configure(order_routes),
        )
        .await;

        let token = jwt::generate_access_token(1, "student@example.com", "student").unwrap();
        let req = actix_test::TestRequest::get()
            .uri("/order/payment-success/ORDER12345?session_id=cs_test_other")
            .insert_header(("Authorization", format!("Bearer {}", token)))
            .to_request();
        let resp = actix_test::call_service(&app, req).await;
        assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
    }
}
