// src/models/submission.rs

use std::{collections::HashMap, fmt, str::FromStr};

use serde::{Deserialize, Serialize};

use crate::models::{ExamId, QuestionId, UserId};

/// Per-question grading status, stored as `"pass"` / `"fail"`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SubmissionStatus {
    Pass,
    Fail,
}

impl SubmissionStatus {
    pub fn as_str(self) -> &'static str {
        match self {
            SubmissionStatus::Pass => "pass",
            SubmissionStatus::Fail => "fail",
        }
    }
}

impl fmt::Display for SubmissionStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for SubmissionStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "pass" => Ok(SubmissionStatus::Pass),
            "fail" => Ok(SubmissionStatus::Fail),
            other => Err(format!("unknown submission status '{other}'")),
        }
    }
}

/// Overall outcome of one grading pass.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Outcome {
    Passed,
    Failed,
}

/// Outcome of grading a single answered question.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GradedAnswer {
    pub question_id: QuestionId,
    pub submitted_answer: String,
    pub is_correct: bool,
    pub score: i32,
    pub status: SubmissionStatus,
}

/// A submission row before the store assigns its id, attempt and timestamp.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewSubmission {
    pub user_id: UserId,
    pub exam_id: ExamId,
    pub question_id: QuestionId,
    pub submitted_answer: String,
    pub is_correct: bool,
    pub score: i32,
    pub status: SubmissionStatus,
}

/// Represents the 'submissions' table in the database.
/// Rows are append-only.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SubmissionRecord {
    pub id: i64,
    pub user_id: UserId,
    pub exam_id: ExamId,
    pub question_id: QuestionId,
    pub attempt: i32,
    pub submitted_answer: String,
    pub is_correct: bool,
    pub score: i32,
    pub status: SubmissionStatus,
    pub submitted_at: chrono::DateTime<chrono::Utc>,
}

/// Result of one batch write.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AttemptReceipt {
    pub attempt: i32,
    pub written: u64,
}

/// Aggregated result of grading one submission. Never stored as a row.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExamResult {
    pub exam_id: ExamId,
    pub total_score: i64,
    pub pass_threshold: i64,
    pub outcome: Outcome,
    /// Attempt number assigned by the store, absent if nothing was written.
    pub attempt: Option<i32>,
    pub answers: Vec<GradedAnswer>,
}

/// DTO for submitting an exam attempt.
#[derive(Debug, Deserialize, Serialize)]
pub struct SubmitExamRequest {
    /// Key: Question ID, Value: the answer text (or chosen option text).
    pub answers: HashMap<QuestionId, String>,
}

/// Submission joined with the submitting user's name, for the records view.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SubmissionView {
    pub id: i64,
    pub username: String,
    pub exam_id: ExamId,
    pub question_id: QuestionId,
    pub attempt: i32,
    pub score: i32,
    pub status: SubmissionStatus,
    pub submitted_at: chrono::DateTime<chrono::Utc>,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SortOrder {
    Asc,
    #[default]
    Desc,
}

/// Query parameters of the records view.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct RecordFilter {
    pub status: Option<SubmissionStatus>,
    /// Case-insensitive substring of the username.
    pub search: Option<String>,
    #[serde(default)]
    pub order: SortOrder,
}

impl RecordFilter {
    pub fn matches(&self, view: &SubmissionView) -> bool {
        let status_ok = self.status.is_none_or(|s| s == view.status);
        let search_ok = self.search.as_deref().is_none_or(|needle| {
            view.username
                .to_lowercase()
                .contains(&needle.to_lowercase())
        });
        status_ok && search_ok
    }
}
