use crate::model::repo::ResourceTyped;
use crate::model::{ModelManager, error::DatabaseResult};
use crate::web::AuthenticatedUser;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::prelude::FromRow;
use uuid::Uuid;

#[derive(Debug, Clone, Serialize, Deserialize, FromRow, utoipa::ToSchema)]
pub struct Completion {
    id: Uuid,
    user_id: Uuid,
    module_id: Uuid,
    score: Option<i64>,
    total: Option<i64>,
    time_spent_secs: Option<i64>,
    completed_at: DateTime<Utc>,
}

/// Quiz result attached to a completion.
#[derive(Debug, Clone, Copy)]
pub struct QuizAttempt {
    pub score: i64,
    pub total: i64,
    pub time_spent_secs: Option<i64>,
}

impl ResourceTyped for Completion {
    fn get_resource_type() -> crate::model::ResourceType {
        crate::model::ResourceType::Completion
    }
}

impl Completion {
    pub fn module_id(&self) -> Uuid {
        self.module_id
    }

    pub fn score(&self) -> Option<i64> {
        self.score
    }

    pub fn total(&self) -> Option<i64> {
        self.total
    }

    pub fn time_spent_secs(&self) -> Option<i64> {
        self.time_spent_secs
    }

    /// Records a completion. Returns true only the first time for `(user, module)`;
    /// later attempts keep the best score and the latest time spent.
    pub async fn record(
        mm: &ModelManager,
        _actor: &AuthenticatedUser,
        user_id: Uuid,
        module_id: Uuid,
        attempt: Option<QuizAttempt>,
    ) -> DatabaseResult<bool> {
        let inserted = sqlx::query(
            "INSERT INTO completions (id, user_id, module_id, score, total, time_spent_secs, completed_at) \
             VALUES ($1,$2,$3,$4,$5,$6,$7) ON CONFLICT (user_id, module_id) DO NOTHING",
        )
        .bind(Uuid::new_v4())
        .bind(user_id)
        .bind(module_id)
        .bind(attempt.map(|a| a.score))
        .bind(attempt.map(|a| a.total))
        .bind(attempt.and_then(|a| a.time_spent_secs))
        .bind(Utc::now())
        .execute(mm.executor())
        .await?
        .rows_affected()
            > 0;

        if !inserted {
            if let Some(attempt) = attempt {
                sqlx::query(
                    "UPDATE completions SET score = MAX(COALESCE(score, 0), $1), total = $2, \
                     time_spent_secs = COALESCE($3, time_spent_secs) WHERE user_id = $4 AND module_id = $5",
                )
                .bind(attempt.score)
                .bind(attempt.total)
                .bind(attempt.time_spent_secs)
                .bind(user_id)
                .bind(module_id)
                .execute(mm.executor())
                .await?;
            }
        }

        Ok(inserted)
    }

    pub async fn find(
        mm: &ModelManager,
        _actor: &AuthenticatedUser,
        user_id: Uuid,
        module_id: Uuid,
    ) -> DatabaseResult<Option<Self>> {
        let result = sqlx::query_as("SELECT * FROM completions WHERE user_id = $1 AND module_id = $2")
            .bind(user_id)
            .bind(module_id)
            .fetch_optional(mm.executor())
            .await?;
        Ok(result)
    }

    /// Ids of the modules of `course_id` the user has completed.
    pub async fn completed_module_ids(
        mm: &ModelManager,
        _actor: &AuthenticatedUser,
        user_id: Uuid,
        course_id: Uuid,
    ) -> DatabaseResult<Vec<Uuid>> {
        let result = sqlx::query_scalar(
            "SELECT cp.module_id FROM completions cp \
             JOIN course_modules m ON m.id = cp.module_id \
             WHERE cp.user_id = $1 AND m.course_id = $2",
        )
        .bind(user_id)
        .bind(course_id)
        .fetch_all(mm.executor())
        .await?;
        Ok(result)
    }

    pub async fn count(mm: &ModelManager, _actor: &AuthenticatedUser) -> DatabaseResult<i64> {
        let result = sqlx::query_scalar("SELECT COUNT(*) FROM completions")
            .fetch_one(mm.executor())
            .await?;
        Ok(result)
    }

    pub async fn count_for_user(
        mm: &ModelManager,
        _actor: &AuthenticatedUser,
        user_id: Uuid,
    ) -> DatabaseResult<i64> {
        let result = sqlx::query_scalar("SELECT COUNT(*) FROM completions WHERE user_id = $1")
            .bind(user_id)
            .fetch_one(mm.executor())
            .await?;
        Ok(result)
    }
}
