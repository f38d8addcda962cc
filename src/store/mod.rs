// src/store/mod.rs

//! Collaborator interfaces for persistence.
//!
//! Handlers and services only see these traits. [`postgres::PgStore`] backs
//! the running service and [`memory::MemoryStore`] backs tests and local
//! experiments. Both implement every trait, so one value can be shared as
//! catalog, submission log and account store.

pub mod memory;
pub mod postgres;

use std::sync::Arc;

use async_trait::async_trait;

use crate::models::{
    ExamId, UserId,
    exam::{Exam, NewExam},
    question::Question,
    submission::{AttemptReceipt, NewSubmission, RecordFilter, SubmissionRecord, SubmissionView},
    user::{Role, User},
};

/// All errors that can be returned by a store implementation.
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    /// The addressed row does not exist.
    #[error("{entity} {id} not found")]
    NotFound { entity: &'static str, id: String },

    /// A uniqueness constraint rejected the write.
    #[error("conflict: {0}")]
    Conflict(String),

    /// Stored data could not be decoded into a domain value.
    #[error("invalid stored data: {0}")]
    Invalid(String),

    /// A backend-specific error (connection, query, serialization).
    #[error("storage backend error: {0}")]
    Backend(String),
}

impl From<sqlx::Error> for StoreError {
    fn from(err: sqlx::Error) -> Self {
        match &err {
            sqlx::Error::Database(db) if db.is_unique_violation() => {
                StoreError::Conflict(db.message().to_string())
            }
            _ => StoreError::Backend(err.to_string()),
        }
    }
}

/// Read and write access to exams and their answer keys.
#[async_trait]
pub trait ExamCatalog: Send + Sync + 'static {
    /// Write an exam with all questions and options atomically.
    async fn create_exam(&self, exam: &NewExam, created_by: UserId) -> Result<Exam, StoreError>;

    /// All exams, newest first.
    async fn list_exams(&self) -> Result<Vec<Exam>, StoreError>;

    /// Questions of an exam in authoring order, each with its options.
    ///
    /// Returns `Err(StoreError::NotFound)` when the exam does not exist, never
    /// an empty success.
    async fn questions_for_exam(&self, exam_id: ExamId) -> Result<Vec<Question>, StoreError>;
}

/// Append-only log of graded answers.
#[async_trait]
pub trait SubmissionStore: Send + Sync + 'static {
    /// Append one grading pass for `(user_id, exam_id)`.
    ///
    /// The store assigns the next attempt number to every record of the
    /// batch. The write is all-or-nothing. An unknown `user_id` is
    /// `Err(StoreError::NotFound)` and writes nothing.
    async fn append_attempt(
        &self,
        user_id: UserId,
        exam_id: ExamId,
        records: Vec<NewSubmission>,
    ) -> Result<AttemptReceipt, StoreError>;

    /// A user's own records, newest first.
    async fn submissions_for_user(&self, user_id: UserId)
    -> Result<Vec<SubmissionRecord>, StoreError>;

    /// Every record joined with its username, filtered and ordered by time.
    async fn records(&self, filter: &RecordFilter) -> Result<Vec<SubmissionView>, StoreError>;
}

/// User accounts for sign-up, sign-in and identity resolution.
#[async_trait]
pub trait AccountStore: Send + Sync + 'static {
    /// Returns `Err(StoreError::Conflict)` if the username is taken.
    async fn create_user(
        &self,
        username: &str,
        password_hash: &str,
        role: Role,
    ) -> Result<User, StoreError>;

    async fn find_by_username(&self, username: &str) -> Result<Option<User>, StoreError>;

    async fn find_by_id(&self, id: UserId) -> Result<Option<User>, StoreError>;
}

pub type SharedCatalog = Arc<dyn ExamCatalog>;
pub type SharedSubmissions = Arc<dyn SubmissionStore>;
pub type SharedAccounts = Arc<dyn AccountStore>;
