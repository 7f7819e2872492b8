use crate::model::repo::ResourceTyped;
use crate::model::{ModelManager, error::DatabaseResult};
use crate::web::AuthenticatedUser;
use chrono::{DateTime, Utc};
use serde::Serialize;
use sqlx::prelude::FromRow;

pub const DEFAULT_FACT: &str = "A day on Venus is longer than a year on Venus!";

/// The single fact shown on the explorer page.
#[derive(Debug, Clone, Serialize, FromRow)]
pub struct DailyBriefing {
    content: String,
    updated_at: DateTime<Utc>,
}

impl ResourceTyped for DailyBriefing {
    fn get_resource_type() -> crate::model::ResourceType {
        crate::model::ResourceType::DailyBriefing
    }
}

impl DailyBriefing {
    pub fn content(&self) -> &str {
        &self.content
    }

    pub fn updated_at(&self) -> DateTime<Utc> {
        self.updated_at
    }

    pub async fn current(mm: &ModelManager, _actor: &AuthenticatedUser) -> DatabaseResult<Self> {
        let found: Option<Self> =
            sqlx::query_as("SELECT content, updated_at FROM daily_briefing WHERE id = 1")
                .fetch_optional(mm.executor())
                .await?;

        Ok(found.unwrap_or_else(|| DailyBriefing {
            content: DEFAULT_FACT.to_string(),
            updated_at: Utc::now(),
        }))
    }

    pub async fn set(
        mm: &ModelManager,
        _actor: &AuthenticatedUser,
        content: &str,
    ) -> DatabaseResult<Self> {
        let updated_at = Utc::now();
        sqlx::query(
            "INSERT INTO daily_briefing (id, content, updated_at) VALUES (1, $1, $2) \
             ON CONFLICT (id) DO UPDATE SET content = excluded.content, updated_at = excluded.updated_at",
        )
        .bind(content)
        .bind(updated_at)
        .execute(mm.executor())
        .await?;

        Ok(DailyBriefing {
            content: content.to_string(),
            updated_at,
        })
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::model::test_support::test_mm;

    #[tokio::test]
    async fn seeded_then_replaced() {
        let mm = test_mm().await;
        let admin = AuthenticatedUser::admin();

        assert_eq!(DailyBriefing::current(&mm, &admin).await.unwrap().content(), DEFAULT_FACT);

        DailyBriefing::set(&mm, &admin, "Neutron stars spin fast.").await.unwrap();
        assert_eq!(
            DailyBriefing::current(&mm, &admin).await.unwrap().content(),
            "Neutron stars spin fast."
        );
    }
}
