// src/handlers/exam.rs

use axum::{
    Extension, Json,
    extract::{Path, State},
    http::StatusCode,
    response::IntoResponse,
};
use validator::Validate;

use crate::{
    error::AppError,
    models::{
        ExamId,
        exam::{CreateExamRequest, CreatedExam},
        question::PublicQuestion,
    },
    services::{authoring::build_exam, identity::resolve_caller},
    store::{SharedAccounts, SharedCatalog},
    utils::jwt::Claims,
};

/// Lists all exams, newest first.
pub async fn list_exams(
    State(catalog): State<SharedCatalog>,
) -> Result<impl IntoResponse, AppError> {
    let exams = catalog.list_exams().await.map_err(|e| {
        tracing::error!("Failed to list exams: {:?}", e);
        AppError::from(e)
    })?;

    Ok(Json(exams))
}

/// Creates an exam with its questions and answer keys.
/// Teacher only.
pub async fn create_exam(
    State(catalog): State<SharedCatalog>,
    State(accounts): State<SharedAccounts>,
    Extension(claims): Extension<Claims>,
    Json(payload): Json<CreateExamRequest>,
) -> Result<impl IntoResponse, AppError> {
    payload.validate()?;

    let teacher_id = resolve_caller(accounts.as_ref(), &claims).await?;
    let exam = build_exam(payload)?;
    let question_count = exam.questions.len();

    let created = catalog.create_exam(&exam, teacher_id).await.map_err(|e| {
        tracing::error!("Failed to create exam: {:?}", e);
        AppError::from(e)
    })?;

    Ok((
        StatusCode::CREATED,
        Json(CreatedExam {
            exam: created,
            question_count,
        }),
    ))
}

/// Returns an exam's questions for taking it, without answer keys.
pub async fn exam_questions(
    State(catalog): State<SharedCatalog>,
    Path(exam_id): Path<ExamId>,
) -> Result<impl IntoResponse, AppError> {
    let questions = catalog.questions_for_exam(exam_id).await.map_err(|e| {
        tracing::warn!("Failed to load questions for exam {}: {:?}", exam_id, e);
        AppError::from(e)
    })?;

    let public: Vec<PublicQuestion> = questions.into_iter().map(PublicQuestion::from).collect();

    Ok(Json(public))
}
