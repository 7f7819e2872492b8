use std::collections::HashMap;

use crate::model::repo::ResourceTyped;
use crate::model::{ModelManager, error::DatabaseResult};
use crate::web::AuthenticatedUser;
use serde::{Deserialize, Serialize};
use sqlx::prelude::FromRow;
use uuid::Uuid;

/// Per-country override of a course's base price.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow, utoipa::ToSchema)]
pub struct CoursePrice {
    id: Uuid,
    course_id: Uuid,
    country: String,
    price_cents: i64,
    currency: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct CoursePriceUpsert {
    pub country: String,
    pub price_cents: i64,
    pub currency: String,
}

impl ResourceTyped for CoursePrice {
    fn get_resource_type() -> crate::model::ResourceType {
        crate::model::ResourceType::CoursePrice
    }
}

impl CoursePrice {
    pub fn course_id(&self) -> Uuid {
        self.course_id
    }

    pub fn country(&self) -> &str {
        &self.country
    }

    pub fn price_cents(&self) -> i64 {
        self.price_cents
    }

    pub fn currency(&self) -> &str {
        &self.currency
    }

    /// Inserts or replaces the override for `(course, country)`.
    pub async fn upsert(
        mm: &ModelManager,
        _actor: &AuthenticatedUser,
        course_id: Uuid,
        data: CoursePriceUpsert,
    ) -> DatabaseResult<Self> {
        let country = data.country.trim().to_uppercase();
        sqlx::query(
            "INSERT INTO course_prices (id, course_id, country, price_cents, currency) VALUES ($1,$2,$3,$4,$5) \
             ON CONFLICT (course_id, country) DO UPDATE SET price_cents = excluded.price_cents, currency = excluded.currency",
        )
        .bind(Uuid::new_v4())
        .bind(course_id)
        .bind(&country)
        .bind(data.price_cents)
        .bind(&data.currency)
        .execute(mm.executor())
        .await?;

        let stored = sqlx::query_as("SELECT * FROM course_prices WHERE course_id = $1 AND country = $2")
            .bind(course_id)
            .bind(&country)
            .fetch_one(mm.executor())
            .await?;
        Ok(stored)
    }

    pub async fn list_for_course(
        mm: &ModelManager,
        _actor: &AuthenticatedUser,
        course_id: Uuid,
    ) -> DatabaseResult<Vec<Self>> {
        let result = sqlx::query_as("SELECT * FROM course_prices WHERE course_id = $1 ORDER BY country")
            .bind(course_id)
            .fetch_all(mm.executor())
            .await?;
        Ok(result)
    }

    pub async fn find_for(
        mm: &ModelManager,
        _actor: &AuthenticatedUser,
        course_id: Uuid,
        country: &str,
    ) -> DatabaseResult<Option<Self>> {
        let result = sqlx::query_as("SELECT * FROM course_prices WHERE course_id = $1 AND country = $2")
            .bind(course_id)
            .bind(country.to_uppercase())
            .fetch_optional(mm.executor())
            .await?;
        Ok(result)
    }

    /// All overrides for one country keyed by course.
    pub async fn map_for_country(
        mm: &ModelManager,
        _actor: &AuthenticatedUser,
        country: &str,
    ) -> DatabaseResult<HashMap<Uuid, Self>> {
        let rows: Vec<Self> = sqlx::query_as("SELECT * FROM course_prices WHERE country = $1")
            .bind(country.to_uppercase())
            .fetch_all(mm.executor())
            .await?;
        Ok(rows.into_iter().map(|p| (p.course_id, p)).collect())
    }

    /// Returns whether an override was removed.
    pub async fn delete_for(
        mm: &ModelManager,
        _actor: &AuthenticatedUser,
        course_id: Uuid,
        country: &str,
    ) -> DatabaseResult<bool> {
        let result = sqlx::query("DELETE FROM course_prices WHERE course_id = $1 AND country = $2")
            .bind(course_id)
            .bind(country.to_uppercase())
            .execute(mm.executor())
            .await?;
        Ok(result.rows_affected() > 0)
    }
}
