// src/store/postgres.rs

use std::collections::HashMap;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::{PgPool, Postgres, QueryBuilder};

use super::{AccountStore, ExamCatalog, StoreError, SubmissionStore};
use crate::models::{
    ExamId, QuestionId, UserId,
    exam::{Exam, NewExam},
    question::{AnswerOption, Question},
    submission::{
        AttemptReceipt, NewSubmission, RecordFilter, SortOrder, SubmissionRecord, SubmissionView,
    },
    user::{Role, User},
};

/// PostgreSQL-backed implementation of every store trait.
#[derive(Clone)]
pub struct PgStore {
    pool: PgPool,
}

impl PgStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[derive(sqlx::FromRow)]
struct UserRow {
    id: i64,
    username: String,
    password: String,
    role: String,
    created_at: DateTime<Utc>,
}

impl TryFrom<UserRow> for User {
    type Error = StoreError;

    fn try_from(row: UserRow) -> Result<Self, Self::Error> {
        Ok(User {
            id: row.id,
            username: row.username,
            password: row.password,
            role: row.role.parse().map_err(StoreError::Invalid)?,
            created_at: row.created_at,
        })
    }
}

#[derive(sqlx::FromRow)]
struct ExamRow {
    id: i64,
    title: String,
    description: Option<String>,
    created_by: i64,
    created_at: DateTime<Utc>,
}

impl From<ExamRow> for Exam {
    fn from(row: ExamRow) -> Self {
        Exam {
            id: row.id,
            title: row.title,
            description: row.description,
            created_by: row.created_by,
            created_at: row.created_at,
        }
    }
}

#[derive(sqlx::FromRow)]
struct QuestionRow {
    id: i64,
    exam_id: i64,
    question_text: String,
    question_type: String,
}

#[derive(sqlx::FromRow)]
struct AnswerRow {
    id: i64,
    question_id: i64,
    answer_option: String,
    is_correct: bool,
}

#[derive(sqlx::FromRow)]
struct SubmissionRow {
    id: i64,
    user_id: i64,
    exam_id: i64,
    exam_question_id: i64,
    attempt: i32,
    submitted_answer: String,
    is_correct: bool,
    score: i32,
    status: String,
    submission_date: DateTime<Utc>,
}

impl TryFrom<SubmissionRow> for SubmissionRecord {
    type Error = StoreError;

    fn try_from(row: SubmissionRow) -> Result<Self, Self::Error> {
        Ok(SubmissionRecord {
            id: row.id,
            user_id: row.user_id,
            exam_id: row.exam_id,
            question_id: row.exam_question_id,
            attempt: row.attempt,
            submitted_answer: row.submitted_answer,
            is_correct: row.is_correct,
            score: row.score,
            status: row.status.parse().map_err(StoreError::Invalid)?,
            submitted_at: row.submission_date,
        })
    }
}

#[derive(sqlx::FromRow)]
struct SubmissionViewRow {
    id: i64,
    username: String,
    exam_id: i64,
    exam_question_id: i64,
    attempt: i32,
    score: i32,
    status: String,
    submission_date: DateTime<Utc>,
}

impl TryFrom<SubmissionViewRow> for SubmissionView {
    type Error = StoreError;

    fn try_from(row: SubmissionViewRow) -> Result<Self, Self::Error> {
        Ok(SubmissionView {
            id: row.id,
            username: row.username,
            exam_id: row.exam_id,
            question_id: row.exam_question_id,
            attempt: row.attempt,
            score: row.score,
            status: row.status.parse().map_err(StoreError::Invalid)?,
            submitted_at: row.submission_date,
        })
    }
}

/// Escapes `%`, `_` and `\` so user input matches literally inside ILIKE.
fn escape_like(input: &str) -> String {
    let mut out = String::with_capacity(input.len());
    for c in input.chars() {
        if matches!(c, '%' | '_' | '\\') {
            out.push('\\');
        }
        out.push(c);
    }
    out
}

#[async_trait]
impl ExamCatalog for PgStore {
    async fn create_exam(&self, exam: &NewExam, created_by: UserId) -> Result<Exam, StoreError> {
        let mut tx = self.pool.begin().await?;

        let row: ExamRow = sqlx::query_as(
            r#"
            INSERT INTO exams (title, description, created_by)
            VALUES ($1, $2, $3)
            RETURNING id, title, description, created_by, created_at
            "#,
        )
        .bind(&exam.title)
        .bind(&exam.description)
        .bind(created_by)
        .fetch_one(&mut *tx)
        .await?;

        for (position, question) in exam.questions.iter().enumerate() {
            let question_id: i64 = sqlx::query_scalar(
                r#"
                INSERT INTO exam_questions
                    (exam_id, question_text, question_type, position, created_by)
                VALUES ($1, $2, $3, $4, $5)
                RETURNING id
                "#,
            )
            .bind(row.id)
            .bind(&question.text)
            .bind(question.question_type.as_str())
            .bind(position as i32)
            .bind(created_by)
            .fetch_one(&mut *tx)
            .await?;

            if question.options.is_empty() {
                continue;
            }

            let mut builder = QueryBuilder::<Postgres>::new(
                "INSERT INTO exam_answers (question_id, answer_option, is_correct, position) ",
            );
            builder.push_values(
                question.options.iter().enumerate(),
                |mut b, (option_position, option)| {
                    b.push_bind(question_id)
                        .push_bind(&option.text)
                        .push_bind(option.is_correct)
                        .push_bind(option_position as i32);
                },
            );
            builder.build().execute(&mut *tx).await?;
        }

        tx.commit().await?;

        tracing::info!(
            "Exam {} created with {} questions",
            row.id,
            exam.questions.len()
        );
        Ok(row.into())
    }

    async fn list_exams(&self) -> Result<Vec<Exam>, StoreError> {
        let rows: Vec<ExamRow> = sqlx::query_as(
            r#"
            SELECT id, title, description, created_by, created_at
            FROM exams
            ORDER BY created_at DESC, id DESC
            "#,
        )
        .fetch_all(&self.pool)
        .await?;

        Ok(rows.into_iter().map(Exam::from).collect())
    }

    async fn questions_for_exam(&self, exam_id: ExamId) -> Result<Vec<Question>, StoreError> {
        let exists: Option<i64> = sqlx::query_scalar("SELECT id FROM exams WHERE id = $1")
            .bind(exam_id)
            .fetch_optional(&self.pool)
            .await?;

        if exists.is_none() {
            return Err(StoreError::NotFound {
                entity: "exam",
                id: exam_id.to_string(),
            });
        }

        let questions: Vec<QuestionRow> = sqlx::query_as(
            r#"
            SELECT id, exam_id, question_text, question_type
            FROM exam_questions
            WHERE exam_id = $1
            ORDER BY position, id
            "#,
        )
        .bind(exam_id)
        .fetch_all(&self.pool)
        .await?;

        let answers: Vec<AnswerRow> = sqlx::query_as(
            r#"
            SELECT a.id, a.question_id, a.answer_option, a.is_correct
            FROM exam_answers a
            JOIN exam_questions q ON q.id = a.question_id
            WHERE q.exam_id = $1
            ORDER BY a.position, a.id
            "#,
        )
        .bind(exam_id)
        .fetch_all(&self.pool)
        .await?;

        let mut options: HashMap<QuestionId, Vec<AnswerOption>> = HashMap::new();
        for a in answers {
            options.entry(a.question_id).or_default().push(AnswerOption {
                id: a.id,
                question_id: a.question_id,
                text: a.answer_option,
                is_correct: a.is_correct,
            });
        }

        questions
            .into_iter()
            .map(|q| -> Result<Question, StoreError> {
                Ok(Question {
                    id: q.id,
                    exam_id: q.exam_id,
                    text: q.question_text,
                    question_type: q.question_type.parse().map_err(StoreError::Invalid)?,
                    options: options.remove(&q.id).unwrap_or_default(),
                })
            })
            .collect()
    }
}

#[async_trait]
impl SubmissionStore for PgStore {
    async fn append_attempt(
        &self,
        user_id: UserId,
        exam_id: ExamId,
        records: Vec<NewSubmission>,
    ) -> Result<AttemptReceipt, StoreError> {
        let mut tx = self.pool.begin().await?;

        // Serializes attempt numbering for one user.
        let locked: Option<i64> =
            sqlx::query_scalar("SELECT id FROM users WHERE id = $1 FOR UPDATE")
                .bind(user_id)
                .fetch_optional(&mut *tx)
                .await?;
        if locked.is_none() {
            return Err(StoreError::NotFound {
                entity: "user",
                id: user_id.to_string(),
            });
        }

        let attempt: i32 = sqlx::query_scalar(
            r#"
            SELECT COALESCE(MAX(attempt), 0) + 1
            FROM submissions
            WHERE user_id = $1 AND exam_id = $2
            "#,
        )
        .bind(user_id)
        .bind(exam_id)
        .fetch_one(&mut *tx)
        .await?;

        if records.is_empty() {
            tx.commit().await?;
            return Ok(AttemptReceipt {
                attempt,
                written: 0,
            });
        }

        let mut builder = QueryBuilder::<Postgres>::new(
            "INSERT INTO submissions (user_id, exam_id, exam_question_id, attempt, \
             submitted_answer, is_correct, score, status) ",
        );
        builder.push_values(records.iter(), |mut b, r| {
            b.push_bind(user_id)
                .push_bind(exam_id)
                .push_bind(r.question_id)
                .push_bind(attempt)
                .push_bind(&r.submitted_answer)
                .push_bind(r.is_correct)
                .push_bind(r.score)
                .push_bind(r.status.as_str());
        });

        let written = builder.build().execute(&mut *tx).await?.rows_affected();
        tx.commit().await?;

        Ok(AttemptReceipt { attempt, written })
    }

    async fn submissions_for_user(
        &self,
        user_id: UserId,
    ) -> Result<Vec<SubmissionRecord>, StoreError> {
        let rows: Vec<SubmissionRow> = sqlx::query_as(
            r#"
            SELECT id, user_id, exam_id, exam_question_id, attempt,
                   submitted_answer, is_correct, score, status, submission_date
            FROM submissions
            WHERE user_id = $1
            ORDER BY submission_date DESC, id DESC
            "#,
        )
        .bind(user_id)
        .fetch_all(&self.pool)
        .await?;

        rows.into_iter().map(SubmissionRecord::try_from).collect()
    }

    async fn records(&self, filter: &RecordFilter) -> Result<Vec<SubmissionView>, StoreError> {
        let mut builder = QueryBuilder::<Postgres>::new(
            r#"
            SELECT s.id, u.username, s.exam_id, s.exam_question_id, s.attempt,
                   s.score, s.status, s.submission_date
            FROM submissions s
            JOIN users u ON u.id = s.user_id
            WHERE TRUE
            "#,
        );

        if let Some(status) = filter.status {
            builder.push(" AND s.status = ").push_bind(status.as_str());
        }
        if let Some(search) = filter.search.as_deref().filter(|s| !s.is_empty()) {
            builder
                .push(" AND u.username ILIKE ")
                .push_bind(format!("%{}%", escape_like(search)));
        }

        builder.push(match filter.order {
            SortOrder::Asc => " ORDER BY s.submission_date ASC, s.id ASC",
            SortOrder::Desc => " ORDER BY s.submission_date DESC, s.id DESC",
        });

        let rows: Vec<SubmissionViewRow> = builder.build_query_as().fetch_all(&self.pool).await?;

        rows.into_iter().map(SubmissionView::try_from).collect()
    }
}

#[async_trait]
impl AccountStore for PgStore {
    async fn create_user(
        &self,
        username: &str,
        password_hash: &str,
        role: Role,
    ) -> Result<User, StoreError> {
        let row: UserRow = sqlx::query_as(
            r#"
            INSERT INTO users (username, password, role)
            VALUES ($1, $2, $3)
            RETURNING id, username, password, role, created_at
            "#,
        )
        .bind(username)
        .bind(password_hash)
        .bind(role.as_str())
        .fetch_one(&self.pool)
        .await?;

        row.try_into()
    }

    async fn find_by_username(&self, username: &str) -> Result<Option<User>, StoreError> {
        let row: Option<UserRow> = sqlx::query_as(
            "SELECT id, username, password, role, created_at FROM users WHERE username = $1",
        )
        .bind(username)
        .fetch_optional(&self.pool)
        .await?;

        row.map(User::try_from).transpose()
    }

    async fn find_by_id(&self, id: UserId) -> Result<Option<User>, StoreError> {
        let row: Option<UserRow> = sqlx::query_as(
            "SELECT id, username, password, role, created_at FROM users WHERE id = $1",
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;

        row.map(User::try_from).transpose()
    }
}
