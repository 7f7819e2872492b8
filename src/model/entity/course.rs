use crate::impl_paginatable_for;
use crate::model::repo::ResourceTyped;
use crate::model::{ModelManager, error::DatabaseResult, repo::CrudRepository};
use crate::web::AuthenticatedUser;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::{QueryBuilder, Sqlite, prelude::FromRow};
use uuid::Uuid;

/// Region value of courses visible everywhere.
pub const GLOBAL_REGION: &str = "GLOBAL";

#[derive(Debug, Clone, Serialize, Deserialize, FromRow, utoipa::ToSchema)]
pub struct Course {
    id: uuid::Uuid,
    title: String,
    description: String,
    subject: String,
    level: String,
    standard: String,
    region: String,
    price_cents: i64,
    currency: String,
    instructor_id: Option<Uuid>,
    created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Deserialize, Serialize, utoipa::ToSchema)]
pub struct CourseCreate {
    pub title: String,
    pub description: String,
    pub subject: String,
    pub level: String,
    pub standard: String,
    pub region: String,
    pub price_cents: i64,
    pub currency: String,
    pub instructor_id: Option<Uuid>,
}

/// Catalog filters. Empty strings are treated as absent.
#[derive(Debug, Clone, Default)]
pub struct CourseFilter {
    pub search: Option<String>,
    pub subject: Option<String>,
    pub level: Option<String>,
    pub standard: Option<String>,
    /// Restricts to `GLOBAL` plus this region when set.
    pub country: Option<String>,
}

#[derive(Debug, Clone, FromRow)]
pub struct CourseWithInstructorRow {
    pub id: Uuid,
    pub title: String,
    pub subject: String,
    pub level: String,
    pub region: String,
    pub price_cents: i64,
    pub currency: String,
    pub instructor_name: Option<String>,
    pub module_count: i64,
}

#[derive(Debug, Clone, FromRow)]
pub struct CourseStatsRow {
    pub id: Uuid,
    pub title: String,
    pub enrollments: i64,
    pub completed: i64,
}

impl ResourceTyped for Course {
    fn get_resource_type() -> crate::model::ResourceType {
        crate::model::ResourceType::Course
    }
}

impl Course {
    pub fn id(&self) -> uuid::Uuid {
        self.id
    }

    pub fn title(&self) -> &str {
        &self.title
    }

    pub fn description(&self) -> &str {
        &self.description
    }

    pub fn subject(&self) -> &str {
        &self.subject
    }

    pub fn level(&self) -> &str {
        &self.level
    }

    pub fn standard(&self) -> &str {
        &self.standard
    }

    pub fn region(&self) -> &str {
        &self.region
    }

    pub fn price_cents(&self) -> i64 {
        self.price_cents
    }

    pub fn currency(&self) -> &str {
        &self.currency
    }

    pub fn instructor_id(&self) -> Option<Uuid> {
        self.instructor_id
    }

    pub fn created_at(&self) -> DateTime<Utc> {
        self.created_at
    }
}

/// "Free" for zero, otherwise e.g. "EUR 19.99".
pub fn format_price(cents: i64, currency: &str) -> String {
    if cents <= 0 {
        return String::from("Free");
    }
    format!("{} {}.{:02}", currency, cents / 100, cents % 100)
}

#[async_trait]
impl CrudRepository<Course, CourseCreate, uuid::Uuid> for Course {
    async fn create(
        mm: &ModelManager,
        _actor: &AuthenticatedUser,
        data: CourseCreate,
    ) -> DatabaseResult<Self> {
        let id = Uuid::new_v4();
        let created_at = Utc::now();
        sqlx::query(
            "INSERT INTO courses (id, title, description, subject, level, standard, region, price_cents, currency, instructor_id, created_at) \
             VALUES ($1,$2,$3,$4,$5,$6,$7,$8,$9,$10,$11)",
        )
        .bind(id)
        .bind(&data.title)
        .bind(&data.description)
        .bind(&data.subject)
        .bind(&data.level)
        .bind(&data.standard)
        .bind(&data.region)
        .bind(data.price_cents)
        .bind(&data.currency)
        .bind(data.instructor_id)
        .bind(created_at)
        .execute(mm.executor())
        .await?;

        Ok(Course {
            id,
            title: data.title,
            description: data.description,
            subject: data.subject,
            level: data.level,
            standard: data.standard,
            region: data.region,
            price_cents: data.price_cents,
            currency: data.currency,
            instructor_id: data.instructor_id,
            created_at,
        })
    }

    /// Instructor is kept as it was.
    async fn update(
        mut self,
        mm: &ModelManager,
        _actor: &AuthenticatedUser,
        data: CourseCreate,
    ) -> DatabaseResult<Self> {
        sqlx::query(
            "UPDATE courses SET title = $1, description = $2, subject = $3, level = $4, standard = $5, \
             region = $6, price_cents = $7, currency = $8 WHERE id = $9",
        )
        .bind(&data.title)
        .bind(&data.description)
        .bind(&data.subject)
        .bind(&data.level)
        .bind(&data.standard)
        .bind(&data.region)
        .bind(data.price_cents)
        .bind(&data.currency)
        .bind(self.id)
        .execute(mm.executor())
        .await?;

        self.title = data.title;
        self.description = data.description;
        self.subject = data.subject;
        self.level = data.level;
        self.standard = data.standard;
        self.region = data.region;
        self.price_cents = data.price_cents;
        self.currency = data.currency;
        Ok(self)
    }

    async fn delete(self, mm: &ModelManager, _actor: &AuthenticatedUser) -> DatabaseResult<()> {
        sqlx::query("DELETE FROM courses WHERE id = $1")
            .bind(self.id)
            .execute(mm.executor())
            .await?;
        Ok(())
    }

    async fn find_by_id(
        mm: &ModelManager,
        _actor: &AuthenticatedUser,
        id: uuid::Uuid,
    ) -> DatabaseResult<Option<Self>> {
        let result = sqlx::query_as("SELECT * FROM courses WHERE id = $1")
            .bind(id)
            .fetch_optional(mm.executor())
            .await?;
        Ok(result)
    }

    async fn list(
        mm: &ModelManager,
        _actor: &AuthenticatedUser,
        limit: i64,
        offset: i64,
    ) -> DatabaseResult<Vec<Self>> {
        let result = sqlx::query_as(
            "SELECT * FROM courses ORDER BY created_at DESC, rowid DESC LIMIT $1 OFFSET $2",
        )
        .bind(limit)
        .bind(offset)
        .fetch_all(mm.executor())
        .await?;
        Ok(result)
    }

    async fn count(mm: &ModelManager, _actor: &AuthenticatedUser) -> DatabaseResult<i64> {
        let result: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM courses")
            .fetch_one(mm.executor())
            .await?;

        Ok(result)
    }
}

impl_paginatable_for!(Course, CourseCreate, Uuid);

fn non_empty(value: &Option<String>) -> Option<&str> {
    value.as_deref().map(str::trim).filter(|v| !v.is_empty())
}

impl Course {
    /// Catalog listing, newest first.
    pub async fn filtered(
        mm: &ModelManager,
        _actor: &AuthenticatedUser,
        filter: &CourseFilter,
    ) -> DatabaseResult<Vec<Self>> {
        let mut qb: QueryBuilder<Sqlite> = QueryBuilder::new("SELECT * FROM courses WHERE 1 = 1");

        if let Some(search) = non_empty(&filter.search) {
            let pattern = format!("%{search}%");
            qb.push(" AND (title LIKE ")
                .push_bind(pattern.clone())
                .push(" OR subject LIKE ")
                .push_bind(pattern)
                .push(")");
        }
        if let Some(subject) = non_empty(&filter.subject) {
            qb.push(" AND subject = ").push_bind(subject.to_string());
        }
        if let Some(level) = non_empty(&filter.level) {
            qb.push(" AND level = ").push_bind(level.to_string());
        }
        if let Some(standard) = non_empty(&filter.standard) {
            qb.push(" AND standard = ").push_bind(standard.to_string());
        }
        if let Some(country) = non_empty(&filter.country) {
            qb.push(" AND (region = ")
                .push_bind(GLOBAL_REGION)
                .push(" OR UPPER(region) = ")
                .push_bind(country.to_uppercase())
                .push(")");
        }
        qb.push(" ORDER BY created_at DESC, rowid DESC");

        let result = qb.build_query_as::<Self>().fetch_all(mm.executor()).await?;
        Ok(result)
    }

    /// Distinct non-empty values of a filterable column, for the catalog dropdowns.
    pub async fn distinct_subjects(
        mm: &ModelManager,
        _actor: &AuthenticatedUser,
    ) -> DatabaseResult<Vec<String>> {
        let result = sqlx::query_scalar(
            "SELECT DISTINCT subject FROM courses WHERE subject != '' ORDER BY subject",
        )
        .fetch_all(mm.executor())
        .await?;
        Ok(result)
    }

    pub async fn with_instructors(
        mm: &ModelManager,
        _actor: &AuthenticatedUser,
    ) -> DatabaseResult<Vec<CourseWithInstructorRow>> {
        let result = sqlx::query_as(
            r#"
            SELECT
                c.id, c.title, c.subject, c.level, c.region, c.price_cents, c.currency,
                u.username AS instructor_name,
                (SELECT COUNT(*) FROM course_modules m WHERE m.course_id = c.id) AS module_count
            FROM courses c
            LEFT JOIN users u ON u.id = c.instructor_id
            ORDER BY c.created_at DESC, c.rowid DESC
            "#,
        )
        .fetch_all(mm.executor())
        .await?;
        Ok(result)
    }

    pub async fn stats(
        mm: &ModelManager,
        _actor: &AuthenticatedUser,
    ) -> DatabaseResult<Vec<CourseStatsRow>> {
        let result = sqlx::query_as(
            r#"
            SELECT
                c.id, c.title,
                COUNT(e.id) AS enrollments,
                COALESCE(SUM(CASE WHEN e.status = 'completed' THEN 1 ELSE 0 END), 0) AS completed
            FROM courses c
            LEFT JOIN enrollments e ON e.course_id = c.id
            GROUP BY c.id, c.title
            ORDER BY enrollments DESC, c.title ASC
            "#,
        )
        .fetch_all(mm.executor())
        .await?;
        Ok(result)
    }
}
