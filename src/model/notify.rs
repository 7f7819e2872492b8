use uuid::Uuid;

use crate::{
    error::log_error,
    model::{
        ModelManager,
        entity::{Notification, NotificationCreate},
    },
    web::AuthenticatedUser,
};

/// Fire-and-forget notification: a failure is logged and swallowed so the
/// triggering request still succeeds.
pub async fn notify(mm: &ModelManager, user_id: Uuid, kind: &str, title: &str, message: &str) {
    let data = NotificationCreate {
        user_id,
        kind: kind.to_string(),
        title: title.to_string(),
        message: message.to_string(),
    };

    if let Err(e) = Notification::create(mm, &AuthenticatedUser::admin(), data).await {
        log_error(&e);
    }
}
