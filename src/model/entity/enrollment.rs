use crate::model::repo::ResourceTyped;
use crate::model::{ModelManager, error::DatabaseResult};
use crate::web::AuthenticatedUser;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::prelude::FromRow;
use uuid::Uuid;

pub const STATUS_IN_PROGRESS: &str = "in-progress";
pub const STATUS_COMPLETED: &str = "completed";

#[derive(Debug, Clone, Serialize, Deserialize, FromRow, utoipa::ToSchema)]
pub struct Enrollment {
    id: Uuid,
    user_id: Uuid,
    course_id: Uuid,
    status: String,
    enrolled_at: DateTime<Utc>,
}

/// An enrolled course with module counters for progress bars.
#[derive(Debug, Clone, FromRow)]
pub struct EnrolledCourseRow {
    pub course_id: Uuid,
    pub title: String,
    pub subject: String,
    pub level: String,
    pub status: String,
    pub enrolled_at: DateTime<Utc>,
    pub total_modules: i64,
    pub completed_modules: i64,
}

impl EnrolledCourseRow {
    pub fn is_completed(&self) -> bool {
        self.status == STATUS_COMPLETED
    }

    pub fn progress_percent(&self) -> i64 {
        crate::gamification::percent(self.completed_modules, self.total_modules)
    }
}

/// A completed course shown as a badge on the public profile.
#[derive(Debug, Clone, FromRow)]
pub struct BadgeRow {
    pub course_id: Uuid,
    pub title: String,
    pub subject: String,
}

impl ResourceTyped for Enrollment {
    fn get_resource_type() -> crate::model::ResourceType {
        crate::model::ResourceType::Enrollment
    }
}

impl Enrollment {
    pub fn id(&self) -> Uuid {
        self.id
    }

    pub fn user_id(&self) -> Uuid {
        self.user_id
    }

    pub fn course_id(&self) -> Uuid {
        self.course_id
    }

    pub fn status(&self) -> &str {
        &self.status
    }

    pub fn is_completed(&self) -> bool {
        self.status == STATUS_COMPLETED
    }

    pub async fn create(
        mm: &ModelManager,
        _actor: &AuthenticatedUser,
        user_id: Uuid,
        course_id: Uuid,
    ) -> DatabaseResult<Self> {
        let id = Uuid::new_v4();
        let enrolled_at = Utc::now();
        sqlx::query(
            "INSERT INTO enrollments (id, user_id, course_id, status, enrolled_at) VALUES ($1,$2,$3,$4,$5)",
        )
        .bind(id)
        .bind(user_id)
        .bind(course_id)
        .bind(STATUS_IN_PROGRESS)
        .bind(enrolled_at)
        .execute(mm.executor())
        .await?;

        Ok(Enrollment {
            id,
            user_id,
            course_id,
            status: STATUS_IN_PROGRESS.to_string(),
            enrolled_at,
        })
    }

    pub async fn find(
        mm: &ModelManager,
        _actor: &AuthenticatedUser,
        user_id: Uuid,
        course_id: Uuid,
    ) -> DatabaseResult<Option<Self>> {
        let result = sqlx::query_as("SELECT * FROM enrollments WHERE user_id = $1 AND course_id = $2")
            .bind(user_id)
            .bind(course_id)
            .fetch_optional(mm.executor())
            .await?;
        Ok(result)
    }

    /// Flips an in-progress enrollment to completed. Returns false when it already was.
    pub async fn mark_completed(&mut self, mm: &ModelManager) -> DatabaseResult<bool> {
        let result = sqlx::query("UPDATE enrollments SET status = $1 WHERE id = $2 AND status != $1")
            .bind(STATUS_COMPLETED)
            .bind(self.id)
            .execute(mm.executor())
            .await?;

        self.status = STATUS_COMPLETED.to_string();
        Ok(result.rows_affected() > 0)
    }

    /// Enrolled courses of a user, newest enrollment first.
    pub async fn list_for_user(
        mm: &ModelManager,
        _actor: &AuthenticatedUser,
        user_id: Uuid,
    ) -> DatabaseResult<Vec<EnrolledCourseRow>> {
        let result = sqlx::query_as(
            r#"
            SELECT
                c.id AS course_id, c.title, c.subject, c.level,
                e.status, e.enrolled_at,
                (SELECT COUNT(*) FROM course_modules m WHERE m.course_id = c.id) AS total_modules,
                (SELECT COUNT(*) FROM completions cp
                    JOIN course_modules m ON m.id = cp.module_id
                    WHERE m.course_id = c.id AND cp.user_id = e.user_id) AS completed_modules
            FROM enrollments e
            JOIN courses c ON c.id = e.course_id
            WHERE e.user_id = $1
            ORDER BY e.enrolled_at DESC, e.rowid DESC
            "#,
        )
        .bind(user_id)
        .fetch_all(mm.executor())
        .await?;
        Ok(result)
    }

    pub async fn badges_for_user(
        mm: &ModelManager,
        _actor: &AuthenticatedUser,
        user_id: Uuid,
    ) -> DatabaseResult<Vec<BadgeRow>> {
        let result = sqlx::query_as(
            r#"
            SELECT c.id AS course_id, c.title, c.subject
            FROM enrollments e
            JOIN courses c ON c.id = e.course_id
            WHERE e.user_id = $1 AND e.status = $2
            ORDER BY c.title ASC
            "#,
        )
        .bind(user_id)
        .bind(STATUS_COMPLETED)
        .fetch_all(mm.executor())
        .await?;
        Ok(result)
    }

    pub async fn count(mm: &ModelManager, _actor: &AuthenticatedUser) -> DatabaseResult<i64> {
        let result = sqlx::query_scalar("SELECT COUNT(*) FROM enrollments")
            .fetch_one(mm.executor())
            .await?;
        Ok(result)
    }

    pub async fn count_for_user(
        mm: &ModelManager,
        _actor: &AuthenticatedUser,
        user_id: Uuid,
    ) -> DatabaseResult<i64> {
        let result = sqlx::query_scalar("SELECT COUNT(*) FROM enrollments WHERE user_id = $1")
            .bind(user_id)
            .fetch_one(mm.executor())
            .await?;
        Ok(result)
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::model::CrudRepository;
    use crate::model::entity::course::test::course_data;
    use crate::model::entity::{Course, UserEntity, UserEntityCreateUpdate};
    use crate::model::test_support::test_mm;

    #[tokio::test]
    async fn enrollment_is_unique_and_completes_once() {
        let mm = test_mm().await;
        let admin = AuthenticatedUser::admin();
        let user = UserEntity::create(
            &mm,
            &admin,
            UserEntityCreateUpdate {
                username: String::from("nova"),
                email: String::from("nova@orbit.test"),
                password_hash: String::from("x"),
                role: String::from("user"),
                is_verified: true,
            },
        )
        .await
        .unwrap();
        let course = Course::create(&mm, &admin, course_data("Optics", "Physics", "GLOBAL"))
            .await
            .unwrap();

        let mut enrollment = Enrollment::create(&mm, &admin, user.id(), course.id()).await.unwrap();
        let dup = Enrollment::create(&mm, &admin, user.id(), course.id()).await.unwrap_err();
        assert!(dup.is_unique_violation());

        let rows = Enrollment::list_for_user(&mm, &admin, user.id()).await.unwrap();
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].progress_percent(), 0);
        assert!(!rows[0].is_completed());

        assert!(enrollment.mark_completed(&mm).await.unwrap());
        assert!(!enrollment.mark_completed(&mm).await.unwrap());

        let badges = Enrollment::badges_for_user(&mm, &admin, user.id()).await.unwrap();
        assert_eq!(badges.len(), 1);
        assert_eq!(badges[0].title, "Optics");
    }
}
