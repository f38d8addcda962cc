// src/models/exam.rs

use serde::{Deserialize, Serialize};
use validator::Validate;

use crate::models::{ExamId, UserId, question::CreateQuestionRequest};

/// Represents the 'exams' table in the database.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Exam {
    pub id: ExamId,
    pub title: String,
    pub description: Option<String>,
    pub created_by: UserId,
    pub created_at: chrono::DateTime<chrono::Utc>,
}

/// DTO for creating an exam with all of its questions at once.
#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
pub struct CreateExamRequest {
    #[validate(length(min = 1, max = 200))]
    pub title: String,
    #[validate(length(max = 2000))]
    pub description: Option<String>,
    #[validate(length(min = 1, max = 200), nested)]
    pub questions: Vec<CreateQuestionRequest>,
}

/// A fully resolved exam ready to be written by the catalog.
///
/// Built by the authoring service from a [`CreateExamRequest`]: text is
/// sanitized and every answer key is explicit.
#[derive(Debug, Clone)]
pub struct NewExam {
    pub title: String,
    pub description: Option<String>,
    pub questions: Vec<NewQuestion>,
}

#[derive(Debug, Clone)]
pub struct NewQuestion {
    pub text: String,
    pub question_type: crate::models::question::QuestionType,
    pub options: Vec<NewAnswerOption>,
}

#[derive(Debug, Clone)]
pub struct NewAnswerOption {
    pub text: String,
    pub is_correct: bool,
}

/// Response body for a newly created exam.
#[derive(Debug, Serialize, Deserialize)]
pub struct CreatedExam {
    #[serde(flatten)]
    pub exam: Exam,
    pub question_count: usize,
}
