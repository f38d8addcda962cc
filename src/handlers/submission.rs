// src/handlers/submission.rs

use std::sync::Arc;

use axum::{
    Extension, Json,
    extract::{Path, Query, State},
    response::IntoResponse,
};

use crate::{
    error::AppError,
    models::{
        ExamId,
        submission::{RecordFilter, SubmitExamRequest},
    },
    services::{grading::GradingService, identity::resolve_caller},
    store::{SharedAccounts, SharedSubmissions},
    utils::jwt::Claims,
};

/// Submits answers for an exam and returns the graded result.
///
/// * Resolves the caller's user id from the token.
/// * Scores each answer against the exam's answer key.
/// * Appends one attempt to the submission log.
///
/// If scoring succeeded but the write failed, responds 503 with the
/// computed result in the body.
pub async fn submit_exam(
    State(grading): State<Arc<GradingService>>,
    State(accounts): State<SharedAccounts>,
    Extension(claims): Extension<Claims>,
    Path(exam_id): Path<ExamId>,
    Json(req): Json<SubmitExamRequest>,
) -> Result<impl IntoResponse, AppError> {
    let user_id = resolve_caller(accounts.as_ref(), &claims).await?;

    let result = grading
        .grade_submission(exam_id, user_id, &req.answers)
        .await?;

    Ok(Json(result))
}

/// Lists the caller's own submission records, newest first.
pub async fn my_submissions(
    State(submissions): State<SharedSubmissions>,
    State(accounts): State<SharedAccounts>,
    Extension(claims): Extension<Claims>,
) -> Result<impl IntoResponse, AppError> {
    let user_id = resolve_caller(accounts.as_ref(), &claims).await?;

    let records = submissions
        .submissions_for_user(user_id)
        .await
        .map_err(|e| {
            tracing::error!("Failed to fetch submissions of user {}: {:?}", user_id, e);
            AppError::from(e)
        })?;

    Ok(Json(records))
}

/// Lists all submissions with usernames.
/// Teacher only. Supports `status`, `search` and `order` query parameters.
pub async fn list_records(
    State(submissions): State<SharedSubmissions>,
    Query(filter): Query<RecordFilter>,
) -> Result<impl IntoResponse, AppError> {
    let records = submissions.records(&filter).await.map_err(|e| {
        tracing::error!("Failed to fetch records: {:?}", e);
        AppError::from(e)
    })?;

    Ok(Json(records))
}
