use actix_web::{delete, get, post, web, HttpResponse};
use chrono::Utc;
use sea_orm::{
    ActiveModelTrait, ColumnTrait, DatabaseConnection, DbErr, EntityTrait, ModelTrait,
    PaginatorTrait, QueryFilter, Set,
};
use serde::{Deserialize, Serialize};
use rust_decimal::Decimal;
use uuid::Uuid;

use crate::middleware::{AuthUser, MaybeAuthUser};
use crate::models::cart_items::{self, Entity as CartItems, Column as CartItemColumn};
use crate::models::carts::{self, Entity as Carts, Column as CartColumn};
use crate::models::courses::{Entity as Courses, Column as CourseColumn};
use crate::models::enrollments::{Entity as Enrollments, Column as EnrollmentColumn};

#[derive(Deserialize)]
pub struct AddToCartRequest {
    pub course_id: String,
    pub cart_id: Option<String>,
}

#[derive(Serialize)]
pub struct CartItemResponse {
    pub course_id: String,
    pub title: String,
    pub slug: String,
    pub thumbnail: Option<String>,
    pub price: Decimal,
}

#[derive(Serialize)]
pub struct CartResponse {
    pub cart_id: Option<String>,
    pub items: Vec<CartItemResponse>,
    pub total: Decimal,
    pub item_count: usize,
}

async fn build_cart_response(
    db: &DatabaseConnection,
    cart: &carts::Model,
) -> Result<CartResponse, DbErr> {
    let items = CartItems::find()
        .filter(CartItemColumn::CartId.eq(cart.id))
        .find_also_related(Courses)
        .all(db)
        .await?;

    let mut total = Decimal::ZERO;
    let mut responses = Vec::with_capacity(items.len());
    for (item, course) in items {
        let course = match course {
            Some(course) => course,
            None => continue,
        };
        total += item.price;
        responses.push(CartItemResponse {
            course_id: course.course_id,
            title: course.title,
            slug: course.slug,
            thumbnail: course.thumbnail,
            price: item.price,
        });
    }

    let item_count = responses.len();
    Ok(CartResponse {
        cart_id: Some(cart.cart_id.clone()),
        items: responses,
        total,
        item_count,
    })
}

async fn get_or_create_user_cart(
    db: &DatabaseConnection,
    user_id: i32,
) -> Result<carts::Model, DbErr> {
    if let Some(cart) = Carts::find()
        .filter(CartColumn::UserId.eq(user_id))
        .one(db)
        .await?
    {
        return Ok(cart);
    }

    let now = Utc::now().naive_utc();
    carts::ActiveModel {
        cart_id: Set(Uuid::new_v4().simple().to_string()),
        user_id: Set(Some(user_id)),
        created_at: Set(Some(now)),
        updated_at: Set(Some(now)),
        ..Default::default()
    }
    .insert(db)
    .await
}

/// GET /cart - Current user's cart, or an empty cart for anonymous callers (PUBLIC)
#[get("/cart")]
pub async fn get_cart(maybe_user: MaybeAuthUser, db: web::Data<DatabaseConnection>) -> HttpResponse {
    let user = match &maybe_user.user {
        Some(user) => user,
        None => {
            return HttpResponse::Ok().json(CartResponse {
                cart_id: None,
                items: vec![],
                total: Decimal::ZERO,
                item_count: 0,
            });
        }
    };

    let cart = match get_or_create_user_cart(db.get_ref(), user.user_id).await {
        Ok(cart) => cart,
        Err(e) => {
            return HttpResponse::InternalServerError().json(serde_json::json!({
                "error": format!("Database error: {}", e)
            }));
        }
    };

    match build_cart_response(db.get_ref(), &cart).await {
        Ok(response) => HttpResponse::Ok().json(response),
        Err(e) => HttpResponse::InternalServerError().json(serde_json::json!({
            "error": format!("Database error: {}", e)
        })),
    }
}

/// GET /cart/stats - Item count and total for the user's cart (PROTECTED)
#[get("/cart/stats")]
pub async fn cart_stats(auth_user: AuthUser, db: web::Data<DatabaseConnection>) -> HttpResponse {
    let cart = match Carts::find()
        .filter(CartColumn::UserId.eq(auth_user.user_id))
        .one(db.get_ref())
        .await
    {
        Ok(Some(cart)) => cart,
        Ok(None) => {
            return HttpResponse::Ok().json(serde_json::json!({
                "count": 0,
                "total": Decimal::ZERO
            }));
        }
        Err(e) => {
            return HttpResponse::InternalServerError().json(serde_json::json!({
                "error": format!("Database error: {}", e)
            }));
        }
    };

    stats_for_cart(db.get_ref(), cart.id).await
}

/// GET /cart/stats/{cart_id} - Stats for a cart by public id (PUBLIC)
#[get("/cart/stats/{cart_id}")]
pub async fn cart_stats_by_id(
    path: web::Path<String>,
    db: web::Data<DatabaseConnection>,
) -> HttpResponse {
    let cart_id = path.into_inner();

    let cart = match find_cart(db.get_ref(), &cart_id).await {
        Ok(Some(cart)) => cart,
        Ok(None) => {
            return HttpResponse::Ok().json(serde_json::json!({
                "count": 0,
                "total": Decimal::ZERO
            }));
        }
        Err(e) => {
            return HttpResponse::InternalServerError().json(serde_json::json!({
                "error": format!("Database error: {}", e)
            }));
        }
    };

    stats_for_cart(db.get_ref(), cart.id).await
}

async fn stats_for_cart(db: &DatabaseConnection, cart_pk: i32) -> HttpResponse {
    let items = match CartItems::find()
        .filter(CartItemColumn::CartId.eq(cart_pk))
        .all(db)
        .await
    {
        Ok(items) => items,
        Err(e) => {
            return HttpResponse::InternalServerError().json(serde_json::json!({
                "error": format!("Database error: {}", e)
            }));
        }
    };

    let total: Decimal = items.iter().map(|i| i.price).sum();
    HttpResponse::Ok().json(serde_json::json!({
        "count": items.len(),
        "total": total
    }))
}

async fn find_cart(db: &DatabaseConnection, cart_id: &str) -> Result<Option<carts::Model>, DbErr> {
    Carts::find()
        .filter(CartColumn::CartId.eq(cart_id))
        .one(db)
        .await
}

/// GET /cart/{cart_id} - Cart contents by public id (PUBLIC)
#[get("/cart/{cart_id}")]
pub async fn get_cart_by_id(
    path: web::Path<String>,
    db: web::Data<DatabaseConnection>,
) -> HttpResponse {
    let cart_id = path.into_inner();

    let cart = match find_cart(db.get_ref(), &cart_id).await {
        Ok(Some(cart)) => cart,
        Ok(None) => {
            return HttpResponse::NotFound().json(serde_json::json!({
                "error": "Cart not found"
            }));
        }
        Err(e) => {
            return HttpResponse::InternalServerError().json(serde_json::json!({
                "error": format!("Database error: {}", e)
            }));
        }
    };

    match build_cart_response(db.get_ref(), &cart).await {
        Ok(response) => HttpResponse::Ok().json(response),
        Err(e) => HttpResponse::InternalServerError().json(serde_json::json!({
            "error": format!("Database error: {}", e)
        })),
    }
}

/// POST /cart/add - Add a course to a cart (PUBLIC)
///
/// Authenticated callers use their own cart; anonymous callers pass
/// (or receive) a cart_id. Enrolled and duplicate courses are rejected.
#[post("/cart/add")]
pub async fn add_to_cart(
    maybe_user: MaybeAuthUser,
    body: web::Json<AddToCartRequest>,
    db: web::Data<DatabaseConnection>,
) -> HttpResponse {
    let course = match Courses::find()
        .filter(CourseColumn::CourseId.eq(&body.course_id))
        .filter(CourseColumn::Status.eq("published"))
        .one(db.get_ref())
        .await
    {
        Ok(Some(course)) => course,
        Ok(None) => {
            return HttpResponse::NotFound().json(serde_json::json!({
                "error": "Course not found"
            }));
        }
        Err(e) => {
            return HttpResponse::InternalServerError().json(serde_json::json!({
                "error": format!("Database error: {}", e)
            }));
        }
    };

    if let Some(user) = &maybe_user.user {
        let enrolled = match Enrollments::find()
            .filter(EnrollmentColumn::StudentId.eq(user.user_id))
            .filter(EnrollmentColumn::CourseId.eq(course.id))
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
            return HttpResponse::BadRequest().json(serde_json::json!({
                "message": "You are already enrolled in this course"
            }));
        }
    }

    let cart = if let Some(user) = &maybe_user.user {
        get_or_create_user_cart(db.get_ref(), user.user_id).await
    } else {
        match &body.cart_id {
            Some(cart_id) => match find_cart(db.get_ref(), cart_id).await {
                Ok(Some(cart)) => Ok(cart),
                Ok(None) => new_anonymous_cart(db.get_ref(), Some(cart_id.clone())).await,
                Err(e) => Err(e),
            },
            None => new_anonymous_cart(db.get_ref(), None).await,
        }
    };

    let cart = match cart {
        Ok(cart) => cart,
        Err(e) => {
            return HttpResponse::InternalServerError().json(serde_json::json!({
                "error": format!("Database error: {}", e)
            }));
        }
    };

    let exists = match CartItems::find()
        .filter(CartItemColumn::CartId.eq(cart.id))
        .filter(CartItemColumn::CourseId.eq(course.id))
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
    if exists {
        return HttpResponse::BadRequest().json(serde_json::json!({
            "message": "Course already in cart"
        }));
    }

    let price = if course.is_free { Decimal::ZERO } else { course.price };
    let item = cart_items::ActiveModel {
        cart_id: Set(cart.id),
        course_id: Set(course.id),
        price: Set(price),
        added_at: Set(Some(Utc::now().naive_utc())),
        ..Default::default()
    };

    match item.insert(db.get_ref()).await {
        Ok(_) => HttpResponse::Created().json(serde_json::json!({
            "message": "Course added to cart",
            "cart_id": cart.cart_id
        })),
        Err(e) => HttpResponse::InternalServerError().json(serde_json::json!({
            "error": format!("Failed to add to cart: {}", e)
        })),
    }
}

async fn new_anonymous_cart(
    db: &DatabaseConnection,
    cart_id: Option<String>,
) -> Result<carts::Model, DbErr> {
    let now = Utc::now().naive_utc();
    carts::ActiveModel {
        cart_id: Set(cart_id.unwrap_or_else(|| Uuid::new_v4().simple().to_string())),
        user_id: Set(None),
        created_at: Set(Some(now)),
        updated_at: Set(Some(now)),
        ..Default::default()
    }
    .insert(db)
    .await
}

/// DELETE /cart/{cart_id}/remove/{course_id} - Drop one course from a cart (PUBLIC)
#[delete("/cart/{cart_id}/remove/{course_id}")]
pub async fn remove_from_cart(
    path: web::Path<(String, String)>,
    db: web::Data<DatabaseConnection>,
) -> HttpResponse {
    let (cart_id, course_id) = path.into_inner();

    let cart = match find_cart(db.get_ref(), &cart_id).await {
        Ok(Some(cart)) => cart,
        Ok(None) => {
            return HttpResponse::NotFound().json(serde_json::json!({
                "error": "Cart not found"
            }));
        }
        Err(e) => {
            return HttpResponse::InternalServerError().json(serde_json::json!({
                "error": format!("Database error: {}", e)
            }));
        }
    };

    let course = match Courses::find()
        .filter(CourseColumn::CourseId.eq(&course_id))
        .one(db.get_ref())
        .await
    {
        Ok(Some(course)) => course,
        Ok(None) => {
            return HttpResponse::NotFound().json(serde_json::json!({
                "error": "Course not found"
            }));
        }
        Err(e) => {
            return HttpResponse::InternalServerError().json(serde_json::json!({
                "error": format!("Database error: {}", e)
            }));
        }
    };

    let item = match CartItems::find()
        .filter(CartItemColumn::CartId.eq(cart.id))
        .filter(CartItemColumn::CourseId.eq(course.id))
        .one(db.get_ref())
        .await
    {
        Ok(Some(item)) => item,
        Ok(None) => {
            return HttpResponse::NotFound().json(serde_json::json!({
                "error": "Course not in cart"
            }));
        }
        Err(e) => {
            return HttpResponse::InternalServerError().json(serde_json::json!({
                "error": format!("Database error: {}", e)
            }));
        }
    };

    match item.delete(db.get_ref()).await {
        Ok(_) => HttpResponse::Ok().json(serde_json::json!({
            "message": "Course removed from cart"
        })),
        Err(e) => HttpResponse::InternalServerError().json(serde_json::json!({
            "error": format!("Failed to remove from cart: {}", e)
        })),
    }
}

/// DELETE /cart/{cart_id}/clear - Empty a cart (PUBLIC)
#[delete("/cart/{cart_id}/clear")]
pub async fn clear_cart(path: web::Path<String>, db: web::Data<DatabaseConnection>) -> HttpResponse {
    let cart_id = path.into_inner();

    let cart = match find_cart(db.get_ref(), &cart_id).await {
        Ok(Some(cart)) => cart,
        Ok(None) => {
            return HttpResponse::NotFound().json(serde_json::json!({
                "error": "Cart not found"
            }));
        }
        Err(e) => {
            return HttpResponse::InternalServerError().json(serde_json::json!({
                "error": format!("Database error: {}", e)
            }));
        }
    };

    match CartItems::delete_many()
        .filter(CartItemColumn::CartId.eq(cart.id))
        .exec(db.get_ref())
        .await
    {
        Ok(_) => HttpResponse::Ok().json(serde_json::json!({
            "message": "Cart cleared"
        })),
        Err(e) => HttpResponse::InternalServerError().json(serde_json::json!({
            "error": format!("Failed to clear cart: {}", e)
        })),
    }
}

pub fn cart_routes(cfg: &mut web::ServiceConfig) {
    // "/cart/stats" and "/cart/add" before "/cart/{cart_id}".
    cfg.service(get_cart)
        .service(cart_stats)
        .service(cart_stats_by_id)
        .service(add_to_cart)
        .service(get_cart_by_id)
        .service(remove_from_cart)
        .service(clear_cart);
}
