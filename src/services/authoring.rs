// src/services/authoring.rs

//! Turns an exam authoring request into explicit answer keys.

use crate::{
    models::{
        exam::{CreateExamRequest, NewAnswerOption, NewExam, NewQuestion},
        question::{CreateQuestionRequest, QuestionType},
    },
    utils::html::clean_html,
};

#[derive(Debug, thiserror::Error)]
pub enum AuthoringError {
    #[error("exam title is empty after sanitizing")]
    EmptyTitle,

    #[error("question {index}: {reason}")]
    InvalidQuestion { index: usize, reason: String },
}

/// Maps an option letter to its index: `a` is 0, `B` is 1.
pub fn option_index(letter: &str) -> Option<usize> {
    let mut chars = letter.chars();
    let c = chars.next()?.to_ascii_lowercase();
    if chars.next().is_some() || !c.is_ascii_lowercase() {
        return None;
    }
    Some((c as u8 - b'a') as usize)
}

/// Validates answer keys and sanitizes display text.
///
/// Answer option text is kept verbatim because grading compares it.
pub fn build_exam(req: CreateExamRequest) -> Result<NewExam, AuthoringError> {
    let title = clean_html(&req.title);
    if title.trim().is_empty() {
        return Err(AuthoringError::EmptyTitle);
    }

    let description = req
        .description
        .map(|d| clean_html(&d))
        .filter(|d| !d.trim().is_empty());

    let questions = req
        .questions
        .into_iter()
        .enumerate()
        .map(|(index, q)| {
            build_question(q).map_err(|reason| AuthoringError::InvalidQuestion { index, reason })
        })
        .collect::<Result<Vec<_>, _>>()?;

    Ok(NewExam {
        title,
        description,
        questions,
    })
}

fn build_question(q: CreateQuestionRequest) -> Result<NewQuestion, String> {
    let text = clean_html(&q.text);
    if text.trim().is_empty() {
        return Err("question text is empty after sanitizing".to_string());
    }

    let options = match q.question_type {
        QuestionType::MultipleChoice => {
            if q.options.is_empty() {
                return Err("multiple-choice question needs at least one option".to_string());
            }
            let correct = option_index(&q.correct_answer)
                .filter(|i| *i < q.options.len())
                .ok_or_else(|| {
                    format!(
                        "correct answer '{}' does not name one of {} options",
                        q.correct_answer,
                        q.options.len()
                    )
                })?;

            q.options
                .into_iter()
                .enumerate()
                .map(|(i, text)| NewAnswerOption {
                    text,
                    is_correct: i == correct,
                })
                .collect()
        }
        QuestionType::Identification => vec![NewAnswerOption {
            text: q.correct_answer,
            is_correct: true,
        }],
    };

    Ok(NewQuestion {
        text,
        question_type: q.question_type,
        options,
    })
}
