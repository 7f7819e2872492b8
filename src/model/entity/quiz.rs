use crate::model::quiz_format::ParsedQuestion;
use crate::model::repo::ResourceTyped;
use crate::model::{ModelManager, error::DatabaseResult};
use crate::web::AuthenticatedUser;
use serde::{Deserialize, Serialize};
use sqlx::{Sqlite, Transaction, prelude::FromRow};
use uuid::Uuid;

/// At most one per module.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow, utoipa::ToSchema)]
pub struct Quiz {
    id: Uuid,
    module_id: Uuid,
    quiz_title: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, FromRow, utoipa::ToSchema)]
pub struct Question {
    id: Uuid,
    quiz_id: Uuid,
    question_text: String,
    options_json: String,
    correct_index: i64,
    position: i64,
}

#[derive(Debug, Clone)]
pub struct QuizCreate {
    pub module_id: Uuid,
    pub quiz_title: String,
    pub questions: Vec<ParsedQuestion>,
}

impl ResourceTyped for Quiz {
    fn get_resource_type() -> crate::model::ResourceType {
        crate::model::ResourceType::Quiz
    }
}

impl Question {
    pub fn id(&self) -> Uuid {
        self.id
    }

    pub fn text(&self) -> &str {
        &self.question_text
    }

    pub fn correct_index(&self) -> i64 {
        self.correct_index
    }

    pub fn options(&self) -> DatabaseResult<Vec<String>> {
        Ok(serde_json::from_str(&self.options_json)?)
    }
}

async fn insert_questions(
    tx: &mut Transaction<'_, Sqlite>,
    quiz_id: Uuid,
    questions: &[ParsedQuestion],
) -> DatabaseResult<()> {
    for (position, q) in questions.iter().enumerate() {
        sqlx::query(
            "INSERT INTO questions (id, quiz_id, question_text, options_json, correct_index, position) \
             VALUES ($1,$2,$3,$4,$5,$6)",
        )
        .bind(Uuid::new_v4())
        .bind(quiz_id)
        .bind(&q.text)
        .bind(serde_json::to_string(&q.options)?)
        .bind(q.correct_index as i64)
        .bind(position as i64)
        .execute(&mut **tx)
        .await?;
    }
    Ok(())
}

impl Quiz {
    pub fn id(&self) -> Uuid {
        self.id
    }

    pub fn module_id(&self) -> Uuid {
        self.module_id
    }

    pub fn title(&self) -> &str {
        &self.quiz_title
    }

    /// Creates the quiz and its questions atomically. A second quiz for the same
    /// module fails with a unique violation.
    pub async fn create(
        mm: &ModelManager,
        _actor: &AuthenticatedUser,
        data: QuizCreate,
    ) -> DatabaseResult<Self> {
        let id = Uuid::new_v4();
        let mut tx = mm.executor().begin().await?;

        sqlx::query("INSERT INTO quizzes (id, module_id, quiz_title) VALUES ($1,$2,$3)")
            .bind(id)
            .bind(data.module_id)
            .bind(&data.quiz_title)
            .execute(&mut *tx)
            .await?;
        insert_questions(&mut tx, id, &data.questions).await?;

        tx.commit().await?;
        Ok(Quiz {
            id,
            module_id: data.module_id,
            quiz_title: data.quiz_title,
        })
    }

    /// Replaces the title and every question.
    pub async fn replace(
        mut self,
        mm: &ModelManager,
        _actor: &AuthenticatedUser,
        title: String,
        questions: &[ParsedQuestion],
    ) -> DatabaseResult<Self> {
        let mut tx = mm.executor().begin().await?;

        sqlx::query("UPDATE quizzes SET quiz_title = $1 WHERE id = $2")
            .bind(&title)
            .bind(self.id)
            .execute(&mut *tx)
            .await?;
        sqlx::query("DELETE FROM questions WHERE quiz_id = $1")
            .bind(self.id)
            .execute(&mut *tx)
            .await?;
        insert_questions(&mut tx, self.id, questions).await?;

        tx.commit().await?;
        self.quiz_title = title;
        Ok(self)
    }

    pub async fn find_by_id(
        mm: &ModelManager,
        _actor: &AuthenticatedUser,
        id: Uuid,
    ) -> DatabaseResult<Option<Self>> {
        let result = sqlx::query_as("SELECT * FROM quizzes WHERE id = $1")
            .bind(id)
            .fetch_optional(mm.executor())
            .await?;
        Ok(result)
    }

    pub async fn find_for_module(
        mm: &ModelManager,
        _actor: &AuthenticatedUser,
        module_id: Uuid,
    ) -> DatabaseResult<Option<Self>> {
        let result = sqlx::query_as("SELECT * FROM quizzes WHERE module_id = $1")
            .bind(module_id)
            .fetch_optional(mm.executor())
            .await?;
        Ok(result)
    }

    /// Questions in authoring order.
    pub async fn questions(&self, mm: &ModelManager) -> DatabaseResult<Vec<Question>> {
        let result = sqlx::query_as("SELECT * FROM questions WHERE quiz_id = $1 ORDER BY position ASC")
            .bind(self.id)
            .fetch_all(mm.executor())
            .await?;
        Ok(result)
    }

    /// Questions converted back to the authoring form.
    pub async fn parsed_questions(&self, mm: &ModelManager) -> DatabaseResult<Vec<ParsedQuestion>> {
        let mut parsed = Vec::new();
        for q in self.questions(mm).await? {
            parsed.push(ParsedQuestion {
                options: q.options()?,
                text: q.question_text,
                correct_index: usize::try_from(q.correct_index).unwrap_or_default(),
            });
        }
        Ok(parsed)
    }
}
