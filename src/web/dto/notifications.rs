use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::model::entity::Notification;

#[derive(Debug, Serialize, Deserialize, utoipa::ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct NotificationItem {
    pub id: Uuid,
    #[serde(rename = "type")]
    pub kind: String,
    pub title: String,
    pub message: String,
    pub is_read: bool,
    pub created_at: DateTime<Utc>,
}

impl From<Notification> for NotificationItem {
    fn from(value: Notification) -> Self {
        Self {
            id: value.id(),
            kind: value.kind().to_string(),
            title: value.title().to_string(),
            message: value.message().to_string(),
            is_read: value.is_read(),
            created_at: value.created_at(),
        }
    }
}

/// Result of a bulk notification action.
#[derive(Debug, Serialize, Deserialize, utoipa::ToSchema)]
pub struct NotificationsAck {
    pub success: bool,
    pub affected: u64,
}
