// src/services/grading.rs

//! Exam grading: fetch the answer key, score each answer, aggregate the
//! outcome and append the graded answers to the submission log.

use std::{collections::HashMap, fmt, sync::Arc, time::Duration};

use tokio::time::timeout;

use crate::{
    models::{
        ExamId, QuestionId, UserId,
        question::Question,
        submission::{ExamResult, GradedAnswer, NewSubmission, Outcome, SubmissionStatus},
    },
    store::{SharedCatalog, SharedSubmissions, StoreError},
};

/// Errors returned by [`GradingService::grade_submission`].
#[derive(Debug, thiserror::Error)]
pub enum GradingError {
    /// The request itself is unusable (no answers, unknown exam).
    #[error("invalid submission: {0}")]
    Validation(String),

    /// The answer key could not be loaded.
    #[error("could not load exam: {0}")]
    Fetch(String),

    /// Scoring finished but the batch write failed. The computed result is
    /// still returned to the caller.
    #[error("could not submit: {reason}")]
    Persist {
        result: Box<ExamResult>,
        reason: String,
    },

    /// The caller could not be resolved to a user id.
    #[error("authentication failed: {0}")]
    Authentication(String),
}

/// Stage of one grading invocation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GradingStage {
    NotStarted,
    Fetching,
    Scoring,
    Persisting,
    Completed,
    Failed,
}

impl GradingStage {
    /// Whether `next` directly follows `self`. Any unfinished stage may fail.
    pub fn can_advance_to(self, next: GradingStage) -> bool {
        use GradingStage::*;
        match (self, next) {
            (Completed | Failed, _) => false,
            (_, Failed) => true,
            (NotStarted, Fetching)
            | (Fetching, Scoring)
            | (Scoring, Persisting)
            | (Persisting, Completed) => true,
            _ => false,
        }
    }
}

impl fmt::Display for GradingStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            GradingStage::NotStarted => "not_started",
            GradingStage::Fetching => "fetching",
            GradingStage::Scoring => "scoring",
            GradingStage::Persisting => "persisting",
            GradingStage::Completed => "completed",
            GradingStage::Failed => "failed",
        };
        f.write_str(name)
    }
}

/// Tracks the stage of a single invocation for logging.
struct GradingRun {
    exam_id: ExamId,
    user_id: UserId,
    stage: GradingStage,
}

impl GradingRun {
    fn new(exam_id: ExamId, user_id: UserId) -> Self {
        Self {
            exam_id,
            user_id,
            stage: GradingStage::NotStarted,
        }
    }

    fn advance(&mut self, next: GradingStage) {
        debug_assert!(
            self.stage.can_advance_to(next),
            "illegal grading transition {} -> {}",
            self.stage,
            next
        );
        tracing::debug!(
            exam_id = self.exam_id,
            user_id = self.user_id,
            "grading {} -> {}",
            self.stage,
            next
        );
        self.stage = next;
    }

    fn fail(&mut self, err: GradingError) -> GradingError {
        tracing::warn!(
            exam_id = self.exam_id,
            user_id = self.user_id,
            "grading failed while {}: {}",
            self.stage,
            err
        );
        self.stage = GradingStage::Failed;
        err
    }
}

/// Case-insensitive, otherwise exact comparison. No trimming.
pub fn answers_match(submitted: &str, correct: &str) -> bool {
    submitted.to_lowercase() == correct.to_lowercase()
}

/// Scores every submitted answer that belongs to one of `questions`.
///
/// Answers are returned in exam order. Ids that are not questions of the
/// exam are skipped. A question without a correct option scores 0.
pub fn score_answers(
    questions: &[Question],
    submitted: &HashMap<QuestionId, String>,
) -> Vec<GradedAnswer> {
    questions
        .iter()
        .filter_map(|question| {
            let answer = submitted.get(&question.id)?;

            let is_correct = match question.correct_option() {
                Some(key) => answers_match(answer, &key.text),
                None => {
                    tracing::warn!(
                        question_id = question.id,
                        "question has no correct option; scoring 0"
                    );
                    false
                }
            };

            Some(GradedAnswer {
                question_id: question.id,
                submitted_answer: answer.clone(),
                is_correct,
                score: i32::from(is_correct),
                status: if is_correct {
                    SubmissionStatus::Pass
                } else {
                    SubmissionStatus::Fail
                },
            })
        })
        .collect()
}

/// Sums scores and applies the pass threshold.
///
/// The threshold is an absolute count of correct answers and does not
/// depend on how many questions the exam has.
pub fn aggregate(exam_id: ExamId, answers: Vec<GradedAnswer>, pass_threshold: i64) -> ExamResult {
    let total_score: i64 = answers.iter().map(|a| i64::from(a.score)).sum();
    let outcome = if total_score >= pass_threshold {
        Outcome::Passed
    } else {
        Outcome::Failed
    };

    ExamResult {
        exam_id,
        total_score,
        pass_threshold,
        outcome,
        attempt: None,
        answers,
    }
}

/// Grades submissions against the exam catalog and records them.
pub struct GradingService {
    catalog: SharedCatalog,
    submissions: SharedSubmissions,
    pass_threshold: i64,
    call_timeout: Duration,
}

impl GradingService {
    pub fn new(
        catalog: SharedCatalog,
        submissions: SharedSubmissions,
        pass_threshold: i64,
        call_timeout: Duration,
    ) -> Self {
        Self {
            catalog,
            submissions,
            pass_threshold,
            call_timeout,
        }
    }

    pub fn pass_threshold(&self) -> i64 {
        self.pass_threshold
    }

    /// Grades one submission and appends it to the submission log.
    ///
    /// Fetching and scoring have no side effects. Once the write starts it
    /// runs on its own task, so dropping the returned future does not
    /// interrupt it. A write that exceeds the call timeout is dropped before
    /// it commits and reported as `Persist`. Every call appends a new attempt.
    pub async fn grade_submission(
        &self,
        exam_id: ExamId,
        user_id: UserId,
        submitted: &HashMap<QuestionId, String>,
    ) -> Result<ExamResult, GradingError> {
        let mut run = GradingRun::new(exam_id, user_id);

        if submitted.is_empty() {
            return Err(run.fail(GradingError::Validation(
                "No answers submitted".to_string(),
            )));
        }

        run.advance(GradingStage::Fetching);
        let fetch = self.catalog.questions_for_exam(exam_id);
        let questions = match timeout(self.call_timeout, fetch).await {
            Ok(Ok(questions)) => questions,
            Ok(Err(StoreError::NotFound { .. })) => {
                return Err(run.fail(GradingError::Validation(format!(
                    "Exam {exam_id} does not exist"
                ))));
            }
            Ok(Err(e)) => return Err(run.fail(GradingError::Fetch(e.to_string()))),
            Err(_) => {
                return Err(run.fail(GradingError::Fetch(format!(
                    "exam catalog did not answer within {:?}",
                    self.call_timeout
                ))));
            }
        };

        if questions.is_empty() {
            return Err(run.fail(GradingError::Fetch(format!(
                "exam {exam_id} has no questions"
            ))));
        }

        run.advance(GradingStage::Scoring);
        let graded = score_answers(&questions, submitted);
        if graded.len() < submitted.len() {
            tracing::debug!(
                exam_id,
                ignored = submitted.len() - graded.len(),
                "ignoring answers for questions outside the exam"
            );
        }
        let mut result = aggregate(exam_id, graded, self.pass_threshold);

        run.advance(GradingStage::Persisting);
        if result.answers.is_empty() {
            tracing::info!(exam_id, user_id, "no answer matched the exam; nothing to record");
            run.advance(GradingStage::Completed);
            return Ok(result);
        }

        let records: Vec<NewSubmission> = result
            .answers
            .iter()
            .map(|a| NewSubmission {
                user_id,
                exam_id,
                question_id: a.question_id,
                submitted_answer: a.submitted_answer.clone(),
                is_correct: a.is_correct,
                score: a.score,
                status: a.status,
            })
            .collect();
        let expected = records.len();

        // The timeout runs inside the task: on expiry the write future is
        // dropped uncommitted, and the handle itself is awaited to the end.
        let store = Arc::clone(&self.submissions);
        let call_timeout = self.call_timeout;
        let write = tokio::spawn(async move {
            timeout(call_timeout, store.append_attempt(user_id, exam_id, records)).await
        });

        let failure = match write.await {
            Ok(Ok(Ok(receipt))) if receipt.written > 0 => {
                result.attempt = Some(receipt.attempt);
                None
            }
            Ok(Ok(Ok(_))) => Some("submission store wrote no rows".to_string()),
            Ok(Ok(Err(e))) => Some(e.to_string()),
            Ok(Err(_)) => Some(format!(
                "submission store did not answer within {:?}",
                self.call_timeout
            )),
            Err(join_err) => Some(format!("submission write aborted: {join_err}")),
        };

        if let Some(reason) = failure {
            return Err(run.fail(GradingError::Persist {
                result: Box::new(result),
                reason,
            }));
        }

        run.advance(GradingStage::Completed);
        tracing::info!(
            exam_id,
            user_id,
            attempt = result.attempt,
            recorded = expected,
            total_score = result.total_score,
            "exam graded: {:?}",
            result.outcome
        );
        Ok(result)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        models::{
            exam::{NewAnswerOption, NewExam, NewQuestion},
            question::{AnswerOption, QuestionType},
            submission::{AttemptReceipt, RecordFilter, SubmissionRecord, SubmissionView},
            user::Role,
        },
        store::{AccountStore, ExamCatalog, SubmissionStore, memory::MemoryStore},
    };
    use async_trait::async_trait;

    const TIMEOUT: Duration = Duration::from_secs(3);
    /// The student account `seeded` creates first in a fresh store.
    const STUDENT: UserId = 1;

    fn identification(id: QuestionId, answer: &str) -> Question {
        Question {
            id,
            exam_id: 1,
            text: format!("Question {id}"),
            question_type: QuestionType::Identification,
            options: vec![AnswerOption {
                id: id * 100,
                question_id: id,
                text: answer.to_string(),
                is_correct: true,
            }],
        }
    }

    fn answers(pairs: &[(QuestionId, &str)]) -> HashMap<QuestionId, String> {
        pairs.iter().map(|(id, a)| (*id, a.to_string())).collect()
    }

    fn exam_of(answers: &[&str]) -> NewExam {
        NewExam {
            title: "Quiz".to_string(),
            description: None,
            questions: answers
                .iter()
                .enumerate()
                .map(|(i, a)| NewQuestion {
                    text: format!("Question {i}"),
                    question_type: QuestionType::Identification,
                    options: vec![NewAnswerOption {
                        text: a.to_string(),
                        is_correct: true,
                    }],
                })
                .collect(),
        }
    }

    async fn seeded(keys: &[&str]) -> (Arc<MemoryStore>, ExamId, Vec<QuestionId>) {
        let store = Arc::new(MemoryStore::new());
        let student = store
            .create_user("student", "hash", Role::Student)
            .await
            .unwrap();
        assert_eq!(student.id, STUDENT);
        let exam = store.create_exam(&exam_of(keys), 2).await.unwrap();
        let ids = store
            .questions_for_exam(exam.id)
            .await
            .unwrap()
            .iter()
            .map(|q| q.id)
            .collect();
        (store, exam.id, ids)
    }

    fn service(store: &Arc<MemoryStore>) -> GradingService {
        GradingService::new(store.clone(), store.clone(), 5, TIMEOUT)
    }

    #[test]
    fn comparison_ignores_case_only() {
        let questions = vec![identification(1, "paris")];

        let graded = score_answers(&questions, &answers(&[(1, "Paris")]));
        assert_eq!(graded[0].score, 1);
        assert_eq!(graded[0].status, SubmissionStatus::Pass);

        let graded = score_answers(&questions, &answers(&[(1, "Par is")]));
        assert_eq!(graded[0].score, 0);
        assert_eq!(graded[0].status, SubmissionStatus::Fail);

        let graded = score_answers(&questions, &answers(&[(1, " paris")]));
        assert!(!graded[0].is_correct);
    }

    #[test]
    fn unknown_question_ids_are_ignored() {
        let questions = vec![identification(1, "a")];
        let graded = score_answers(&questions, &answers(&[(1, "a"), (99, "a")]));
        assert_eq!(graded.len(), 1);
        assert_eq!(graded[0].question_id, 1);
    }

    #[test]
    fn question_without_key_scores_zero() {
        let mut q = identification(1, "a");
        q.options[0].is_correct = false;
        let graded = score_answers(&[q], &answers(&[(1, "a")]));
        assert_eq!(graded.len(), 1);
        assert_eq!(graded[0].score, 0);
        assert!(!graded[0].is_correct);
    }

    #[test]
    fn first_correct_option_is_the_key() {
        let mut q = identification(1, "first");
        q.options.push(AnswerOption {
            id: 2,
            question_id: 1,
            text: "second".to_string(),
            is_correct: true,
        });
        let graded = score_answers(&[q], &answers(&[(1, "second")]));
        assert_eq!(graded[0].score, 0);
    }

    #[test]
    fn scoring_is_deterministic() {
        let questions: Vec<Question> = (1..=4).map(|i| identification(i, "x")).collect();
        let submitted = answers(&[(1, "x"), (2, "y"), (3, "X"), (4, "z")]);
        assert_eq!(
            score_answers(&questions, &submitted),
            score_answers(&questions, &submitted)
        );
    }

    #[test]
    fn threshold_counts_correct_answers_not_ratio() {
        let long: Vec<Question> = (1..=20).map(|i| identification(i, "ok")).collect();
        let five: HashMap<_, _> = (1..=5).map(|i| (i, "ok".to_string())).collect();
        let result = aggregate(1, score_answers(&long, &five), 5);
        assert_eq!(result.total_score, 5);
        assert_eq!(result.outcome, Outcome::Passed);

        let short: Vec<Question> = (1..=4).map(|i| identification(i, "ok")).collect();
        let all: HashMap<_, _> = (1..=4).map(|i| (i, "ok".to_string())).collect();
        let result = aggregate(1, score_answers(&short, &all), 5);
        assert_eq!(result.total_score, 4);
        assert_eq!(result.outcome, Outcome::Failed);
    }

    #[test]
    fn stage_transitions() {
        use GradingStage::*;
        assert!(NotStarted.can_advance_to(Fetching));
        assert!(Scoring.can_advance_to(Persisting));
        assert!(Persisting.can_advance_to(Completed));
        assert!(Fetching.can_advance_to(Failed));
        assert!(!NotStarted.can_advance_to(Scoring));
        assert!(!Completed.can_advance_to(Failed));
        assert!(!Failed.can_advance_to(Fetching));
    }

    #[tokio::test]
    async fn all_six_correct_passes_and_records_six() {
        let keys = ["a", "b", "c", "d", "e", "f"];
        let (store, exam_id, ids) = seeded(&keys).await;
        let submitted: HashMap<_, _> = ids
            .iter()
            .zip(keys)
            .map(|(id, k)| (*id, k.to_uppercase()))
            .collect();

        let result = service(&store)
            .grade_submission(exam_id, STUDENT, &submitted)
            .await
            .unwrap();

        assert_eq!(result.total_score, 6);
        assert_eq!(result.outcome, Outcome::Passed);
        assert_eq!(result.attempt, Some(1));

        let records = store.submissions_for_user(STUDENT).await.unwrap();
        assert_eq!(records.len(), 6);
        assert!(records
            .iter()
            .all(|r| r.score == 1 && r.status == SubmissionStatus::Pass));
    }

    #[tokio::test]
    async fn three_of_six_fails() {
        let keys = ["a", "b", "c", "d", "e", "f"];
        let (store, exam_id, ids) = seeded(&keys).await;
        let submitted: HashMap<_, _> = ids
            .iter()
            .enumerate()
            .map(|(i, id)| {
                let answer = if i < 3 { keys[i] } else { "wrong" };
                (*id, answer.to_string())
            })
            .collect();

        let result = service(&store)
            .grade_submission(exam_id, STUDENT, &submitted)
            .await
            .unwrap();

        assert_eq!(result.total_score, 3);
        assert_eq!(result.outcome, Outcome::Failed);
        assert_eq!(store.submission_count().await, 6);
    }

    #[tokio::test]
    async fn regrading_appends_a_second_batch() {
        let (store, exam_id, ids) = seeded(&["a", "b"]).await;
        let submitted = answers(&[(ids[0], "a"), (ids[1], "x")]);
        let grading = service(&store);

        let first = grading.grade_submission(exam_id, STUDENT, &submitted).await.unwrap();
        let second = grading.grade_submission(exam_id, STUDENT, &submitted).await.unwrap();

        assert_eq!(first.answers, second.answers);
        assert_eq!(first.attempt, Some(1));
        assert_eq!(second.attempt, Some(2));
        assert_eq!(store.submission_count().await, 4);
    }

    #[tokio::test]
    async fn empty_submission_is_rejected() {
        let (store, exam_id, _) = seeded(&["a"]).await;
        let err = service(&store)
            .grade_submission(exam_id, STUDENT, &HashMap::new())
            .await
            .unwrap_err();
        assert!(matches!(err, GradingError::Validation(_)));
        assert_eq!(store.submission_count().await, 0);
    }

    #[tokio::test]
    async fn unknown_exam_is_a_validation_error() {
        let store = Arc::new(MemoryStore::new());
        let err = service(&store)
            .grade_submission(404, STUDENT, &answers(&[(1, "a")]))
            .await
            .unwrap_err();
        assert!(matches!(err, GradingError::Validation(_)));
    }

    #[tokio::test]
    async fn exam_without_questions_is_a_fetch_error() {
        let (store, exam_id, _) = seeded(&[]).await;
        let err = service(&store)
            .grade_submission(exam_id, STUDENT, &answers(&[(1, "a")]))
            .await
            .unwrap_err();
        assert!(matches!(err, GradingError::Fetch(_)));
    }

    #[tokio::test]
    async fn only_unknown_ids_records_nothing() {
        let (store, exam_id, _) = seeded(&["a"]).await;
        let result = service(&store)
            .grade_submission(exam_id, STUDENT, &answers(&[(9999, "a")]))
            .await
            .unwrap();
        assert_eq!(result.total_score, 0);
        assert_eq!(result.attempt, None);
        assert_eq!(store.submission_count().await, 0);
    }

    #[tokio::test]
    async fn unknown_user_is_not_recorded() {
        let (store, exam_id, ids) = seeded(&["a"]).await;
        let err = service(&store)
            .grade_submission(exam_id, 404, &answers(&[(ids[0], "a")]))
            .await
            .unwrap_err();

        match err {
            GradingError::Persist { result, .. } => {
                assert_eq!(result.total_score, 1);
                assert_eq!(result.attempt, None);
            }
            other => panic!("expected Persist, got {other:?}"),
        }
        assert_eq!(store.submission_count().await, 0);
    }

    /// Accepts nothing: every write fails or writes zero rows.
    struct BrokenLog {
        zero_rows: bool,
    }

    #[async_trait]
    impl SubmissionStore for BrokenLog {
        async fn append_attempt(
            &self,
            _user_id: UserId,
            _exam_id: ExamId,
            _records: Vec<NewSubmission>,
        ) -> Result<AttemptReceipt, StoreError> {
            if self.zero_rows {
                Ok(AttemptReceipt {
                    attempt: 1,
                    written: 0,
                })
            } else {
                Err(StoreError::Backend("connection reset".to_string()))
            }
        }

        async fn submissions_for_user(
            &self,
            _user_id: UserId,
        ) -> Result<Vec<SubmissionRecord>, StoreError> {
            Ok(Vec::new())
        }

        async fn records(&self, _filter: &RecordFilter) -> Result<Vec<SubmissionView>, StoreError> {
            Ok(Vec::new())
        }
    }

    #[tokio::test]
    async fn persist_failure_keeps_the_computed_result() {
        for zero_rows in [false, true] {
            let (store, exam_id, ids) = seeded(&["a", "b", "c", "d", "e"]).await;
            let submitted: HashMap<_, _> = ids
                .iter()
                .zip(["a", "b", "c", "d", "e"])
                .map(|(id, k)| (*id, k.to_string()))
                .collect();
            let grading =
                GradingService::new(store.clone(), Arc::new(BrokenLog { zero_rows }), 5, TIMEOUT);

            let err = grading
                .grade_submission(exam_id, STUDENT, &submitted)
                .await
                .unwrap_err();

            match err {
                GradingError::Persist { result, .. } => {
                    assert_eq!(result.total_score, 5);
                    assert_eq!(result.outcome, Outcome::Passed);
                    assert_eq!(result.attempt, None);
                }
                other => panic!("expected persist error, got {other:?}"),
            }
        }
    }

    /// A catalog that never answers in time.
    struct StalledCatalog;

    #[async_trait]
    impl ExamCatalog for StalledCatalog {
        async fn create_exam(
            &self,
            _exam: &NewExam,
            _created_by: UserId,
        ) -> Result<crate::models::exam::Exam, StoreError> {
            Err(StoreError::Backend("read only".to_string()))
        }

        async fn list_exams(&self) -> Result<Vec<crate::models::exam::Exam>, StoreError> {
            Ok(Vec::new())
        }

        async fn questions_for_exam(&self, _exam_id: ExamId) -> Result<Vec<Question>, StoreError> {
            tokio::time::sleep(Duration::from_secs(5)).await;
            Ok(Vec::new())
        }
    }

    #[tokio::test]
    async fn catalog_timeout_is_a_fetch_error() {
        let store = Arc::new(MemoryStore::new());
        let grading = GradingService::new(
            Arc::new(StalledCatalog),
            store.clone(),
            5,
            Duration::from_millis(20),
        );
        let err = grading
            .grade_submission(1, STUDENT, &answers(&[(1, "a")]))
            .await
            .unwrap_err();
        assert!(matches!(err, GradingError::Fetch(_)));
        assert_eq!(store.submission_count().await, 0);
    }

    /// Delegates to a memory store after a fixed delay.
    struct SlowLog {
        inner: Arc<MemoryStore>,
        delay: Duration,
    }

    #[async_trait]
    impl SubmissionStore for SlowLog {
        async fn append_attempt(
            &self,
            user_id: UserId,
            exam_id: ExamId,
            records: Vec<NewSubmission>,
        ) -> Result<AttemptReceipt, StoreError> {
            tokio::time::sleep(self.delay).await;
            self.inner.append_attempt(user_id, exam_id, records).await
        }

        async fn submissions_for_user(
            &self,
            user_id: UserId,
        ) -> Result<Vec<SubmissionRecord>, StoreError> {
            self.inner.submissions_for_user(user_id).await
        }

        async fn records(&self, filter: &RecordFilter) -> Result<Vec<SubmissionView>, StoreError> {
            self.inner.records(filter).await
        }
    }

    #[tokio::test]
    async fn persist_timeout_writes_nothing() {
        let (store, exam_id, ids) = seeded(&["a", "b"]).await;
        let slow = SlowLog {
            inner: store.clone(),
            delay: Duration::from_millis(100),
        };
        let grading =
            GradingService::new(store.clone(), Arc::new(slow), 5, Duration::from_millis(20));

        let err = grading
            .grade_submission(exam_id, STUDENT, &answers(&[(ids[0], "a"), (ids[1], "b")]))
            .await
            .unwrap_err();

        match err {
            GradingError::Persist { result, .. } => {
                assert_eq!(result.total_score, 2);
                assert_eq!(result.attempt, None);
            }
            other => panic!("expected persist error, got {other:?}"),
        }

        // Give a detached write time to land if one had been left running.
        tokio::time::sleep(Duration::from_millis(200)).await;
        assert_eq!(store.submission_count().await, 0);
    }

    #[tokio::test]
    async fn slow_write_within_timeout_is_recorded() {
        let (store, exam_id, ids) = seeded(&["a"]).await;
        let slow = SlowLog {
            inner: store.clone(),
            delay: Duration::from_millis(10),
        };
        let grading = GradingService::new(store.clone(), Arc::new(slow), 5, TIMEOUT);

        let result = grading
            .grade_submission(exam_id, STUDENT, &answers(&[(ids[0], "A")]))
            .await
            .unwrap();

        assert_eq!(result.attempt, Some(1));
        assert_eq!(store.submission_count().await, 1);
    }
}
