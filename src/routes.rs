// src/routes.rs

use axum::{
    Router,
    http::Method,
    middleware,
    routing::{get, post},
};
use tower::ServiceBuilder;
use tower_http::{
    cors::{Any, CorsLayer},
    trace::TraceLayer,
};

use crate::{
    handlers::{auth, exam, submission},
    state::AppState,
    utils::jwt::{auth_middleware, teacher_middleware},
};

/// Assembles the main application router.
///
/// * Merges all sub-routers (auth, exams, submissions, records).
/// * Applies global middleware (Trace, CORS).
/// * Injects global state (stores, grading service, config).
pub fn create_router(state: AppState) -> Router {
    // Native mobile clients send no Origin; any origin may call the API.
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods([Method::GET, Method::POST])
        .allow_headers([
            axum::http::header::AUTHORIZATION,
            axum::http::header::CONTENT_TYPE,
        ]);

    let auth_routes = Router::new()
        .route("/register", post(auth::register))
        .route("/login", post(auth::login));

    let exam_routes = Router::new()
        .route("/", get(exam::list_exams))
        .route("/{id}/questions", get(exam::exam_questions))
        .route("/{id}/submit", post(submission::submit_exam))
        // Authoring is teacher only
        .merge(
            Router::new()
                .route("/", post(exam::create_exam))
                .layer(middleware::from_fn(teacher_middleware)),
        )
        .layer(middleware::from_fn_with_state(state.clone(), auth_middleware));

    let submission_routes = Router::new()
        .route("/me", get(submission::my_submissions))
        .layer(middleware::from_fn_with_state(state.clone(), auth_middleware));

    let record_routes = Router::new()
        .route("/", get(submission::list_records))
        // Double middleware protection: Auth first, then Teacher check
        .layer(middleware::from_fn(teacher_middleware))
        .layer(middleware::from_fn_with_state(state.clone(), auth_middleware));

    Router::new()
        .nest("/api/auth", auth_routes)
        .nest("/api/exams", exam_routes)
        .nest("/api/submissions", submission_routes)
        .nest("/api/records", record_routes)
        .layer(
            ServiceBuilder::new()
                .layer(TraceLayer::new_for_http())
                .layer(cors),
        )
        .with_state(state)
}
