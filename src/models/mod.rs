// src/models/mod.rs

pub mod exam;
pub mod question;
pub mod submission;
pub mod user;

/// Store-assigned identifier of an exam.
pub type ExamId = i64;

/// Store-assigned identifier of a user account.
pub type UserId = i64;

/// Store-assigned identifier of a question.
pub type QuestionId = i64;
