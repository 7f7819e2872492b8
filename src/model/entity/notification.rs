use crate::model::repo::ResourceTyped;
use crate::model::{ModelManager, error::DatabaseResult};
use crate::web::AuthenticatedUser;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::prelude::FromRow;
use uuid::Uuid;

pub const KIND_PROGRESS: &str = "progress";
pub const KIND_SECURITY: &str = "security";
pub const KIND_ACHIEVEMENT: &str = "achievement";
pub const KIND_SYSTEM: &str = "system";

#[derive(Debug, Clone, Serialize, Deserialize, FromRow, utoipa::ToSchema)]
pub struct Notification {
    id: Uuid,
    user_id: Uuid,
    kind: String,
    title: String,
    message: String,
    is_read: bool,
    created_at: DateTime<Utc>,
}

#[derive(Debug, Clone)]
pub struct NotificationCreate {
    pub user_id: Uuid,
    pub kind: String,
    pub title: String,
    pub message: String,
}

impl ResourceTyped for Notification {
    fn get_resource_type() -> crate::model::ResourceType {
        crate::model::ResourceType::Notification
    }
}

impl Notification {
    pub fn id(&self) -> Uuid {
        self.id
    }

    pub fn kind(&self) -> &str {
        &self.kind
    }

    pub fn title(&self) -> &str {
        &self.title
    }

    pub fn message(&self) -> &str {
        &self.message
    }

    pub fn is_read(&self) -> bool {
        self.is_read
    }

    pub fn created_at(&self) -> DateTime<Utc> {
        self.created_at
    }

    pub async fn create(
        mm: &ModelManager,
        _actor: &AuthenticatedUser,
        data: NotificationCreate,
    ) -> DatabaseResult<Self> {
        let id = Uuid::new_v4();
        let created_at = Utc::now();
        sqlx::query(
            "INSERT INTO notifications (id, user_id, kind, title, message, is_read, created_at) \
             VALUES ($1,$2,$3,$4,$5,FALSE,$6)",
        )
        .bind(id)
        .bind(data.user_id)
        .bind(&data.kind)
        .bind(&data.title)
        .bind(&data.message)
        .bind(created_at)
        .execute(mm.executor())
        .await?;

        Ok(Notification {
            id,
            user_id: data.user_id,
            kind: data.kind,
            title: data.title,
            message: data.message,
            is_read: false,
            created_at,
        })
    }

    /// Sends the same notification to every user in one transaction, returning the recipient count.
    pub async fn broadcast(
        mm: &ModelManager,
        _actor: &AuthenticatedUser,
        kind: &str,
        title: &str,
        message: &str,
    ) -> DatabaseResult<u64> {
        let mut tx = mm.executor().begin().await?;
        let user_ids: Vec<Uuid> = sqlx::query_scalar("SELECT id FROM users")
            .fetch_all(&mut *tx)
            .await?;

        let created_at = Utc::now();
        for user_id in &user_ids {
            sqlx::query(
                "INSERT INTO notifications (id, user_id, kind, title, message, is_read, created_at) \
                 VALUES ($1,$2,$3,$4,$5,FALSE,$6)",
            )
            .bind(Uuid::new_v4())
            .bind(user_id)
            .bind(kind)
            .bind(title)
            .bind(message)
            .bind(created_at)
            .execute(&mut *tx)
            .await?;
        }

        tx.commit().await?;
        Ok(user_ids.len() as u64)
    }

    /// Newest first.
    pub async fn latest_for_user(
        mm: &ModelManager,
        _actor: &AuthenticatedUser,
        user_id: Uuid,
        limit: i64,
    ) -> DatabaseResult<Vec<Self>> {
        let result = sqlx::query_as(
            "SELECT * FROM notifications WHERE user_id = $1 ORDER BY created_at DESC, rowid DESC LIMIT $2",
        )
        .bind(user_id)
        .bind(limit)
        .fetch_all(mm.executor())
        .await?;
        Ok(result)
    }

    pub async fn unread_count(
        mm: &ModelManager,
        _actor: &AuthenticatedUser,
        user_id: Uuid,
    ) -> DatabaseResult<i64> {
        let result = sqlx::query_scalar(
            "SELECT COUNT(*) FROM notifications WHERE user_id = $1 AND is_read = FALSE",
        )
        .bind(user_id)
        .fetch_one(mm.executor())
        .await?;
        Ok(result)
    }

    pub async fn mark_all_read(
        mm: &ModelManager,
        _actor: &AuthenticatedUser,
        user_id: Uuid,
    ) -> DatabaseResult<u64> {
        let result = sqlx::query("UPDATE notifications SET is_read = TRUE WHERE user_id = $1 AND is_read = FALSE")
            .bind(user_id)
            .execute(mm.executor())
            .await?;
        Ok(result.rows_affected())
    }

    pub async fn clear_for_user(
        mm: &ModelManager,
        _actor: &AuthenticatedUser,
        user_id: Uuid,
    ) -> DatabaseResult<u64> {
        let result = sqlx::query("DELETE FROM notifications WHERE user_id = $1")
            .bind(user_id)
            .execute(mm.executor())
            .await?;
        Ok(result.rows_affected())
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::model::CrudRepository;
    use crate::model::entity::{UserEntity, UserEntityCreateUpdate};
    use crate::model::test_support::test_mm;

    async fn user(mm: &ModelManager, name: &str) -> UserEntity {
        UserEntity::create(
            mm,
            &AuthenticatedUser::admin(),
            UserEntityCreateUpdate {
                username: name.to_string(),
                email: format!("{name}@orbit.test"),
                password_hash: String::from("x"),
                role: String::from("user"),
                is_verified: true,
            },
        )
        .await
        .unwrap()
    }

    #[tokio::test]
    async fn latest_is_capped_and_newest_first() {
        let mm = test_mm().await;
        let admin = AuthenticatedUser::admin();
        let nova = user(&mm, "nova").await;

        for i in 0..20 {
            Notification::create(
                &mm,
                &admin,
                NotificationCreate {
                    user_id: nova.id(),
                    kind: KIND_SYSTEM.to_string(),
                    title: format!("signal {i}"),
                    message: String::new(),
                },
            )
            .await
            .unwrap();
        }

        let latest = Notification::latest_for_user(&mm, &admin, nova.id(), 15).await.unwrap();
        assert_eq!(latest.len(), 15);
        assert_eq!(latest[0].title(), "signal 19");
        assert_eq!(Notification::unread_count(&mm, &admin, nova.id()).await.unwrap(), 20);

        assert_eq!(Notification::mark_all_read(&mm, &admin, nova.id()).await.unwrap(), 20);
        assert_eq!(Notification::unread_count(&mm, &admin, nova.id()).await.unwrap(), 0);

        assert_eq!(Notification::clear_for_user(&mm, &admin, nova.id()).await.unwrap(), 20);
    }

    #[tokio::test]
    async fn broadcast_reaches_everyone() {
        let mm = test_mm().await;
        let admin = AuthenticatedUser::admin();
        let a = user(&mm, "a").await;
        let b = user(&mm, "b").await;

        let sent = Notification::broadcast(&mm, &admin, "announcement", "Launch", "T-minus 10")
            .await
            .unwrap();
        assert_eq!(sent, 2);
        for id in [a.id(), b.id()] {
            let got = Notification::latest_for_user(&mm, &admin, id, 15).await.unwrap();
            assert_eq!(got[0].kind(), "announcement");
        }
    }
}
