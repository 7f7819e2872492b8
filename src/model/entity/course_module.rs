use crate::impl_paginatable_for;
use crate::model::repo::ResourceTyped;
use crate::model::{ModelManager, error::DatabaseResult, repo::CrudRepository};
use crate::web::AuthenticatedUser;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use sqlx::prelude::FromRow;
use uuid::Uuid;

#[derive(Debug, Clone, Serialize, Deserialize, FromRow, utoipa::ToSchema)]
pub struct CourseModule {
    id: uuid::Uuid,
    course_id: uuid::Uuid,
    module_title: String,
    module_content: String,
    video_url: Option<String>,
    module_order: i64,
}

#[derive(Debug, Clone, Deserialize, Serialize, utoipa::ToSchema)]
pub struct CourseModuleCreate {
    pub course_id: Uuid,
    pub module_title: String,
    pub module_content: String,
    pub video_url: Option<String>,
    pub module_order: i64,
}

/// Syllabus row: a module and its quiz, if any.
#[derive(Debug, Clone, FromRow)]
pub struct ModuleWithQuizRow {
    pub id: Uuid,
    pub module_title: String,
    pub module_order: i64,
    pub quiz_id: Option<Uuid>,
    pub quiz_title: Option<String>,
    pub question_count: i64,
}

impl ResourceTyped for CourseModule {
    fn get_resource_type() -> crate::model::ResourceType {
        crate::model::ResourceType::CourseModule
    }
}

impl CourseModule {
    pub fn id(&self) -> uuid::Uuid {
        self.id
    }

    pub fn course_id(&self) -> uuid::Uuid {
        self.course_id
    }

    pub fn title(&self) -> &str {
        &self.module_title
    }

    pub fn content(&self) -> &str {
        &self.module_content
    }

    pub fn video_url(&self) -> Option<&str> {
        self.video_url.as_deref()
    }

    pub fn order(&self) -> i64 {
        self.module_order
    }
}

#[async_trait]
impl CrudRepository<CourseModule, CourseModuleCreate, uuid::Uuid> for CourseModule {
    async fn create(
        mm: &ModelManager,
        _actor: &AuthenticatedUser,
        data: CourseModuleCreate,
    ) -> DatabaseResult<Self> {
        let id = Uuid::new_v4();
        sqlx::query(
            "INSERT INTO course_modules (id, course_id, module_title, module_content, video_url, module_order) \
             VALUES ($1,$2,$3,$4,$5,$6)",
        )
        .bind(id)
        .bind(data.course_id)
        .bind(&data.module_title)
        .bind(&data.module_content)
        .bind(&data.video_url)
        .bind(data.module_order)
        .execute(mm.executor())
        .await?;

        Ok(CourseModule {
            id,
            course_id: data.course_id,
            module_title: data.module_title,
            module_content: data.module_content,
            video_url: data.video_url,
            module_order: data.module_order,
        })
    }

    async fn update(
        mut self,
        mm: &ModelManager,
        _actor: &AuthenticatedUser,
        data: CourseModuleCreate,
    ) -> DatabaseResult<Self> {
        sqlx::query(
            "UPDATE course_modules SET module_title = $1, module_content = $2, video_url = $3, module_order = $4 WHERE id = $5",
        )
        .bind(&data.module_title)
        .bind(&data.module_content)
        .bind(&data.video_url)
        .bind(data.module_order)
        .bind(self.id)
        .execute(mm.executor())
        .await?;

        self.module_title = data.module_title;
        self.module_content = data.module_content;
        self.video_url = data.video_url;
        self.module_order = data.module_order;
        Ok(self)
    }

    async fn delete(self, mm: &ModelManager, _actor: &AuthenticatedUser) -> DatabaseResult<()> {
        sqlx::query("DELETE FROM course_modules WHERE id = $1")
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
        let result = sqlx::query_as("SELECT * FROM course_modules WHERE id = $1")
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
            "SELECT * FROM course_modules ORDER BY course_id, module_order LIMIT $1 OFFSET $2",
        )
        .bind(limit)
        .bind(offset)
        .fetch_all(mm.executor())
        .await?;
        Ok(result)
    }

    async fn count(mm: &ModelManager, _actor: &AuthenticatedUser) -> DatabaseResult<i64> {
        let result: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM course_modules")
            .fetch_one(mm.executor())
            .await?;

        Ok(result)
    }
}

impl_paginatable_for!(CourseModule, CourseModuleCreate, Uuid);

impl CourseModule {
    /// Modules of a course in syllabus order.
    pub async fn list_for_course(
        mm: &ModelManager,
        _actor: &AuthenticatedUser,
        course_id: Uuid,
    ) -> DatabaseResult<Vec<Self>> {
        let result = sqlx::query_as(
            "SELECT * FROM course_modules WHERE course_id = $1 ORDER BY module_order ASC, rowid ASC",
        )
        .bind(course_id)
        .fetch_all(mm.executor())
        .await?;
        Ok(result)
    }

    pub async fn list_with_quiz(
        mm: &ModelManager,
        _actor: &AuthenticatedUser,
        course_id: Uuid,
    ) -> DatabaseResult<Vec<ModuleWithQuizRow>> {
        let result = sqlx::query_as(
            r#"
            SELECT
                m.id, m.module_title, m.module_order,
                q.id AS quiz_id, q.quiz_title,
                (SELECT COUNT(*) FROM questions qq WHERE qq.quiz_id = q.id) AS question_count
            FROM course_modules m
            LEFT JOIN quizzes q ON q.module_id = m.id
            WHERE m.course_id = $1
            ORDER BY m.module_order ASC, m.rowid ASC
            "#,
        )
        .bind(course_id)
        .fetch_all(mm.executor())
        .await?;
        Ok(result)
    }

    pub async fn count_for_course(
        mm: &ModelManager,
        _actor: &AuthenticatedUser,
        course_id: Uuid,
    ) -> DatabaseResult<i64> {
        let result = sqlx::query_scalar("SELECT COUNT(*) FROM course_modules WHERE course_id = $1")
            .bind(course_id)
            .fetch_one(mm.executor())
            .await?;
        Ok(result)
    }

    pub async fn find_by_title(
        mm: &ModelManager,
        _actor: &AuthenticatedUser,
        title: &str,
    ) -> DatabaseResult<Option<Self>> {
        let result = sqlx::query_as("SELECT * FROM course_modules WHERE module_title = $1 LIMIT 1")
            .bind(title)
            .fetch_optional(mm.executor())
            .await?;
        Ok(result)
    }
}

/// Previous and next module ids around `current` in an ordered syllabus.
pub fn neighbours(modules: &[CourseModule], current: Uuid) -> (Option<Uuid>, Option<Uuid>) {
    let Some(pos) = modules.iter().position(|m| m.id == current) else {
        return (None, None);
    };
    let prev = pos.checked_sub(1).map(|i| modules[i].id);
    let next = modules.get(pos + 1).map(|m| m.id);
    (prev, next)
}
