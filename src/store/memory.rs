// src/store/memory.rs

use std::collections::HashMap;

use async_trait::async_trait;
use chrono::Utc;
use tokio::sync::Mutex;

use super::{AccountStore, ExamCatalog, StoreError, SubmissionStore};
use crate::models::{
    ExamId, UserId,
    exam::{Exam, NewExam},
    question::{AnswerOption, Question},
    submission::{
        AttemptReceipt, NewSubmission, RecordFilter, SortOrder, SubmissionRecord, SubmissionView,
    },
    user::{Role, User},
};

#[derive(Default)]
struct Tables {
    next_id: i64,
    users: Vec<User>,
    exams: Vec<Exam>,
    questions: Vec<Question>,
    submissions: Vec<SubmissionRecord>,
}

impl Tables {
    fn next_id(&mut self) -> i64 {
        self.next_id += 1;
        self.next_id
    }
}

/// Process-local store with the same contract as the PostgreSQL one.
#[derive(Default)]
pub struct MemoryStore {
    tables: Mutex<Tables>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of stored submission rows.
    pub async fn submission_count(&self) -> usize {
        self.tables.lock().await.submissions.len()
    }
}

#[async_trait]
impl ExamCatalog for MemoryStore {
    async fn create_exam(&self, exam: &NewExam, created_by: UserId) -> Result<Exam, StoreError> {
        let mut t = self.tables.lock().await;

        let exam_id = t.next_id();
        let row = Exam {
            id: exam_id,
            title: exam.title.clone(),
            description: exam.description.clone(),
            created_by,
            created_at: Utc::now(),
        };

        for q in &exam.questions {
            let question_id = t.next_id();
            let mut options = Vec::with_capacity(q.options.len());
            for o in &q.options {
                options.push(AnswerOption {
                    id: t.next_id(),
                    question_id,
                    text: o.text.clone(),
                    is_correct: o.is_correct,
                });
            }
            t.questions.push(Question {
                id: question_id,
                exam_id,
                text: q.text.clone(),
                question_type: q.question_type,
                options,
            });
        }

        t.exams.push(row.clone());
        Ok(row)
    }

    async fn list_exams(&self) -> Result<Vec<Exam>, StoreError> {
        let t = self.tables.lock().await;
        let mut exams = t.exams.clone();
        exams.sort_by(|a, b| b.created_at.cmp(&a.created_at).then(b.id.cmp(&a.id)));
        Ok(exams)
    }

    async fn questions_for_exam(&self, exam_id: ExamId) -> Result<Vec<Question>, StoreError> {
        let t = self.tables.lock().await;

        if !t.exams.iter().any(|e| e.id == exam_id) {
            return Err(StoreError::NotFound {
                entity: "exam",
                id: exam_id.to_string(),
            });
        }

        Ok(t.questions
            .iter()
            .filter(|q| q.exam_id == exam_id)
            .cloned()
            .collect())
    }
}

#[async_trait]
impl SubmissionStore for MemoryStore {
    async fn append_attempt(
        &self,
        user_id: UserId,
        exam_id: ExamId,
        records: Vec<NewSubmission>,
    ) -> Result<AttemptReceipt, StoreError> {
        let mut t = self.tables.lock().await;

        if !t.users.iter().any(|u| u.id == user_id) {
            return Err(StoreError::NotFound {
                entity: "user",
                id: user_id.to_string(),
            });
        }

        let attempt = t
            .submissions
            .iter()
            .filter(|s| s.user_id == user_id && s.exam_id == exam_id)
            .map(|s| s.attempt)
            .max()
            .unwrap_or(0)
            + 1;

        let now = Utc::now();
        let mut written = 0;
        for r in records {
            let id = t.next_id();
            t.submissions.push(SubmissionRecord {
                id,
                user_id,
                exam_id,
                question_id: r.question_id,
                attempt,
                submitted_answer: r.submitted_answer,
                is_correct: r.is_correct,
                score: r.score,
                status: r.status,
                submitted_at: now,
            });
            written += 1;
        }

        Ok(AttemptReceipt { attempt, written })
    }

    async fn submissions_for_user(
        &self,
        user_id: UserId,
    ) -> Result<Vec<SubmissionRecord>, StoreError> {
        let t = self.tables.lock().await;
        let mut rows: Vec<SubmissionRecord> = t
            .submissions
            .iter()
            .filter(|s| s.user_id == user_id)
            .cloned()
            .collect();
        rows.sort_by(|a, b| b.submitted_at.cmp(&a.submitted_at).then(b.id.cmp(&a.id)));
        Ok(rows)
    }

    async fn records(&self, filter: &RecordFilter) -> Result<Vec<SubmissionView>, StoreError> {
        let t = self.tables.lock().await;
        let usernames: HashMap<UserId, &str> = t
            .users
            .iter()
            .map(|u| (u.id, u.username.as_str()))
            .collect();

        let mut rows: Vec<SubmissionView> = t
            .submissions
            .iter()
            .filter_map(|s| {
                // Inner join semantics: rows of unknown users are skipped.
                usernames.get(&s.user_id).map(|name| SubmissionView {
                    id: s.id,
                    username: name.to_string(),
                    exam_id: s.exam_id,
                    question_id: s.question_id,
                    attempt: s.attempt,
                    score: s.score,
                    status: s.status,
                    submitted_at: s.submitted_at,
                })
            })
            .filter(|v| filter.matches(v))
            .collect();

        rows.sort_by(|a, b| a.submitted_at.cmp(&b.submitted_at).then(a.id.cmp(&b.id)));
        if filter.order == SortOrder::Desc {
            rows.reverse();
        }
        Ok(rows)
    }
}

#[async_trait]
impl AccountStore for MemoryStore {
    async fn create_user(
        &self,
        username: &str,
        password_hash: &str,
        role: Role,
    ) -> Result<User, StoreError> {
        let mut t = self.tables.lock().await;

        if t.users.iter().any(|u| u.username == username) {
            return Err(StoreError::Conflict(format!(
                "username '{username}' already exists"
            )));
        }

        let user = User {
            id: t.next_id(),
            username: username.to_string(),
            password: password_hash.to_string(),
            role,
            created_at: Utc::now(),
        };
        t.users.push(user.clone());
        Ok(user)
    }

    async fn find_by_username(&self, username: &str) -> Result<Option<User>, StoreError> {
        let t = self.tables.lock().await;
        Ok(t.users.iter().find(|u| u.username == username).cloned())
    }

    async fn find_by_id(&self, id: UserId) -> Result<Option<User>, StoreError> {
        let t = self.tables.lock().await;
        Ok(t.users.iter().find(|u| u.id == id).cloned())
    }
}
