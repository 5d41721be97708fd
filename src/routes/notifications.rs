use actix_web::{get, post, web, HttpResponse};
use sea_orm::{
    ActiveModelTrait, ColumnTrait, DatabaseConnection, EntityTrait, QueryFilter, QueryOrder,
    QuerySelect, Set,
};
use sea_orm::sea_query::Expr;

use crate::middleware::AuthUser;
use crate::models::notifications::{self, Entity as Notifications, Column as NotificationColumn};

/// GET /notifications - Latest 50 of the user's notifications (PROTECTED)
#[get("/notifications")]
pub async fn list_notifications(
    auth_user: AuthUser,
    db: web::Data<DatabaseConnection>,
) -> HttpResponse {
    match Notifications::find()
        .filter(NotificationColumn::UserId.eq(auth_user.user_id))
        .order_by_desc(NotificationColumn::CreatedAt)
        .limit(50)
        .all(db.get_ref())
        .await
    {
        Ok(notifications) => HttpResponse::Ok().json(notifications),
        Err(e) => HttpResponse::InternalServerError().json(serde_json::json!({
            "error": format!("Database error: {}", e)
        })),
    }
}

/// POST /notifications/mark-read - Mark all of the user's notifications read (PROTECTED)
#[post("/notifications/mark-read")]
pub async fn mark_all_read(auth_user: AuthUser, db: web::Data<DatabaseConnection>) -> HttpResponse {
    match Notifications::update_many()
        .col_expr(NotificationColumn::IsRead, Expr::value(true))
        .filter(NotificationColumn::UserId.eq(auth_user.user_id))
        .filter(NotificationColumn::IsRead.eq(false))
        .exec(db.get_ref())
        .await
    {
        Ok(result) => HttpResponse::Ok().json(serde_json::json!({
            "message": "Notifications marked as read",
            "updated": result.rows_affected
        })),
        Err(e) => HttpResponse::InternalServerError().json(serde_json::json!({
            "error": format!("Database error: {}", e)
        })),
    }
}

/// POST /notifications/mark-read/{id} - Mark one notification read (PROTECTED)
#[post("/notifications/mark-read/{id}")]
pub async fn mark_one_read(
    auth_user: AuthUser,
    path: web::Path<i32>,
    db: web::Data<DatabaseConnection>,
) -> HttpResponse {
    let id = path.into_inner();

    let notification = match Notifications::find_by_id(id)
        .filter(NotificationColumn::UserId.eq(auth_user.user_id))
        .one(db.get_ref())
        .await
    {
        Ok(Some(notification)) => notification,
        Ok(None) => {
            return HttpResponse::NotFound().json(serde_json::json!({
                "error": "Notification not found"
            }));
        }
        Err(e) => {
            return HttpResponse::InternalServerError().json(serde_json::json!({
                "error": format!("Database error: {}", e)
            }));
        }
    };

    let mut active: notifications::ActiveModel = notification.into();
    active.is_read = Set(true);

    match active.update(db.get_ref()).await {
        Ok(_) => HttpResponse::Ok().json(serde_json::json!({
            "message": "Notification marked as read"
        })),
        Err(e) => HttpResponse::InternalServerError().json(serde_json::json!({
            "error": format!("Database error: {}", e)
        })),
    }
}

pub fn notification_routes(cfg: &mut web::ServiceConfig) {
    // "/notifications/mark-read" before the {id} variant.
    cfg.service(list_notifications)
        .service(mark_all_read)
        .service(mark_one_read);
}
