use axum::{
    Json, Router,
    extract::State,
    routing::{delete, get, post},
};

use crate::{
    model::{ResourceTyped, entity::Notification},
    web::{
        ApiResult, AppState, ErrorResponse, RequestContext, WebError,
        dto::{NotificationItem, NotificationsAck},
    },
};

/// Size of the notification dropdown.
const LATEST_LIMIT: i64 = 15;

pub fn routes<S>(state: AppState) -> Router<S> {
    Router::new()
        .route("/", get(notifications_list_handler))
        .route("/mark-read", post(notifications_mark_read_handler))
        .route("/clear", delete(notifications_clear_handler))
        .with_state(state)
}

#[utoipa::path(
    get,
    path = "/api/notifications",
    description = "Latest notifications of the current user, newest first. Guests get an empty list",
    responses(
        (status = 200, description = "Notifications", body = [NotificationItem]),
        (status = 500, description = "Internal server error", body = ErrorResponse),
    ),
    security(("cookie" = [])),
    tag = "notifications"
)]
pub(crate) async fn notifications_list_handler(
    ctx: RequestContext,
    State(state): State<AppState>,
) -> ApiResult<Json<Vec<NotificationItem>>> {
    let Some(user) = ctx.maybe_user() else {
        return Ok(Json(Vec::new()));
    };

    let items = Notification::latest_for_user(state.pool(), user, user.user_id(), LATEST_LIMIT)
        .await
        .map_err(|e| WebError::resource_fetch_error(Notification::get_resource_type(), e))?;
    Ok(Json(items.into_iter().map(NotificationItem::from).collect()))
}

#[utoipa::path(
    post,
    path = "/api/notifications/mark-read",
    description = "Marks every notification of the current user as read",
    responses(
        (status = 200, description = "Notifications marked", body = NotificationsAck),
        (status = 401, description = "Not signed in", body = ErrorResponse),
        (status = 500, description = "Internal server error", body = ErrorResponse),
    ),
    security(("cookie" = [])),
    tag = "notifications"
)]
pub(crate) async fn notifications_mark_read_handler(
    ctx: RequestContext,
    State(state): State<AppState>,
) -> ApiResult<Json<NotificationsAck>> {
    let user = ctx.user()?;
    let affected = Notification::mark_all_read(state.pool(), user, user.user_id())
        .await
        .map_err(|e| WebError::resource_fetch_error(Notification::get_resource_type(), e))?;
    Ok(Json(NotificationsAck {
        success: true,
        affected,
    }))
}

#[utoipa::path(
    delete,
    path = "/api/notifications/clear",
    description = "Deletes every notification of the current user",
    responses(
        (status = 200, description = "Notifications deleted", body = NotificationsAck),
        (status = 401, description = "Not signed in", body = ErrorResponse),
        (status = 500, description = "Internal server error", body = ErrorResponse),
    ),
    security(("cookie" = [])),
    tag = "notifications"
)]
pub(crate) async fn notifications_clear_handler(
    ctx: RequestContext,
    State(state): State<AppState>,
) -> ApiResult<Json<NotificationsAck>> {
    let user = ctx.user()?;
    let affected = Notification::clear_for_user(state.pool(), user, user.user_id())
        .await
        .map_err(|e| WebError::resource_fetch_error(Notification::get_resource_type(), e))?;
    tracing::debug!("cleared {affected} notifications for {}", user.username());
    Ok(Json(NotificationsAck {
        success: true,
        affected,
    }))
}
