// src/models/question.rs

use std::{fmt, str::FromStr};

use serde::{Deserialize, Serialize};
use validator::Validate;

use crate::models::{ExamId, QuestionId};

/// Kind of prompt a question presents.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum QuestionType {
    /// Pick one of the listed options.
    #[serde(rename = "multiple-choice")]
    MultipleChoice,
    /// Free-text answer compared against a single canonical answer.
    #[serde(rename = "identification")]
    Identification,
}

impl QuestionType {
    /// Representation used in the `exam_questions.question_type` column.
    pub fn as_str(self) -> &'static str {
        match self {
            QuestionType::MultipleChoice => "multiple-choice",
            QuestionType::Identification => "identification",
        }
    }
}

impl fmt::Display for QuestionType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for QuestionType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "multiple-choice" => Ok(QuestionType::MultipleChoice),
            "identification" => Ok(QuestionType::Identification),
            other => Err(format!("unknown question type '{other}'")),
        }
    }
}

/// One candidate answer for a question (`exam_answers` table).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AnswerOption {
    pub id: i64,
    pub question_id: QuestionId,
    pub text: String,
    pub is_correct: bool,
}

/// A question of an exam together with its options, in authoring order.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Question {
    pub id: QuestionId,
    pub exam_id: ExamId,
    pub text: String,
    pub question_type: QuestionType,
    pub options: Vec<AnswerOption>,
}

impl Question {
    /// The option used as the answer key.
    ///
    /// When several options are flagged correct the first one wins.
    pub fn correct_option(&self) -> Option<&AnswerOption> {
        self.options.iter().find(|o| o.is_correct)
    }
}

/// DTO for sending a question to an exam taker (no correctness flags).
#[derive(Debug, Serialize, Deserialize)]
pub struct PublicQuestion {
    pub id: QuestionId,
    pub text: String,
    pub question_type: QuestionType,
    pub options: Vec<PublicOption>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct PublicOption {
    pub id: i64,
    pub text: String,
}

impl From<Question> for PublicQuestion {
    fn from(q: Question) -> Self {
        // The only option of an identification question is its answer.
        let options = match q.question_type {
            QuestionType::MultipleChoice => q
                .options
                .into_iter()
                .map(|o| PublicOption {
                    id: o.id,
                    text: o.text,
                })
                .collect(),
            QuestionType::Identification => Vec::new(),
        };

        PublicQuestion {
            id: q.id,
            text: q.text,
            question_type: q.question_type,
            options,
        }
    }
}

/// DTO for authoring a question as part of a new exam.
#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
pub struct CreateQuestionRequest {
    #[validate(length(min = 1, max = 1000))]
    pub text: String,
    pub question_type: QuestionType,
    /// Options for a multiple-choice question. Ignored for identification.
    #[serde(default)]
    #[validate(custom(function = validate_options))]
    pub options: Vec<String>,
    /// Letter of the correct option (`a` is the first) for multiple choice,
    /// or the canonical answer text for identification.
    #[validate(length(min = 1, max = 500))]
    pub correct_answer: String,
}

fn validate_options(options: &[String]) -> Result<(), validator::ValidationError> {
    if options.len() > 26 {
        return Err(validator::ValidationError::new("too_many_options"));
    }
    for opt in options {
        if opt.is_empty() {
            return Err(validator::ValidationError::new("option_cannot_be_empty"));
        }
        if opt.len() > 500 {
            return Err(validator::ValidationError::new("option_too_long"));
        }
    }
    Ok(())
}
