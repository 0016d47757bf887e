use axum::{
    extract::{Path, State},
    http::StatusCode,
    routing::{get, post},
    Json, Router,
};
use validator::Validate;

use crate::api::errors::ApiError;
use crate::core::state::AppState;
use crate::schemas::submission::{
    CreateSubmissionRequest, GradingResultResponse, RetrySubmissionsRequest, ReviseGradeRequest,
    SubmissionResponse,
};
use crate::services::intake::{QueueOverview, RetryReport};

pub(crate) fn router() -> Router<AppState> {
    Router::new()
        .route("/", post(create_submission))
        .route("/retry", post(retry_failed_submissions))
        .route("/status-counts", get(status_counts))
        .route("/:submission_id", get(get_submission))
        .route("/:submission_id/revise", post(revise_grade))
}

async fn create_submission(
    State(state): State<AppState>,
    Json(payload): Json<CreateSubmissionRequest>,
) -> Result<(StatusCode, Json<SubmissionResponse>), ApiError> {
    payload.validate().map_err(|e| ApiError::BadRequest(e.to_string()))?;

    let outcome = state
        .intake()
        .submit(&payload.question_id, &payload.student_id, &payload.essay_text)
        .await?;

    Ok((StatusCode::CREATED, Json(outcome.into())))
}

async fn get_submission(
    Path(submission_id): Path<String>,
    State(state): State<AppState>,
) -> Result<Json<SubmissionResponse>, ApiError> {
    let outcome = state.intake().find(&submission_id).await?;
    Ok(Json(outcome.into()))
}

async fn retry_failed_submissions(
    State(state): State<AppState>,
    Json(payload): Json<RetrySubmissionsRequest>,
) -> Result<Json<RetryReport>, ApiError> {
    payload.validate().map_err(|e| ApiError::BadRequest(e.to_string()))?;

    let report = state.intake().retry_failed_submissions(&payload.submission_ids).await?;
    Ok(Json(report))
}

async fn status_counts(State(state): State<AppState>) -> Result<Json<QueueOverview>, ApiError> {
    Ok(Json(state.intake().status_counts().await?))
}

async fn revise_grade(
    Path(submission_id): Path<String>,
    State(state): State<AppState>,
    Json(payload): Json<ReviseGradeRequest>,
) -> Result<Json<GradingResultResponse>, ApiError> {
    payload.validate().map_err(|e| ApiError::BadRequest(e.to_string()))?;

    let revised = state
        .intake()
        .revise_grade(&submission_id, &payload.teacher_id, payload.score, payload.feedback)
        .await?;

    Ok(Json(revised.into()))
}

#[cfg(test)]
mod tests {
    use axum::http::{Method, StatusCode};
    use serde_json::json;
    use tower::ServiceExt;

    use crate::db::types::GradingStatus;
    use crate::repositories::system_settings::GRADING_MODE_KEY;
    use crate::test_support::{
        json_request, read_json, setup_test_context, FakeProvider, SAMPLE_QUESTION_ID,
    };

    fn good_provider() -> FakeProvider {
        FakeProvider::replying(&json!({
            "aspects": [{"aspect": "Content", "score": 2}, {"aspect": "Language", "score": 2}],
            "feedback": "Clear causes, little on nationalism."
        }))
    }

    #[tokio::test]
    async fn create_submission_in_queued_mode() {
        let ctx = setup_test_context(good_provider()).await;

        let response = ctx
            .app
            .clone()
            .oneshot(json_request(
                Method::POST,
                "/api/v1/submissions",
                Some(json!({
                    "question_id": SAMPLE_QUESTION_ID,
                    "student_id": "student-7",
                    "essay_text": "The alliance system dragged every power in."
                })),
            ))
            .await
            .expect("response");

        assert_eq!(response.status(), StatusCode::CREATED);
        let body = read_json(response).await;
        assert_eq!(body["status"], "queued");
        assert!(body["result"].is_null());

        let job = ctx.receiver.lock().await.recv().await.expect("job");
        assert_eq!(body["id"], job.submission_id);
    }

    #[tokio::test]
    async fn create_submission_in_instant_mode_returns_grade() {
        let ctx = setup_test_context(good_provider()).await;
        ctx.store.set_setting(GRADING_MODE_KEY, "instant");

        let response = ctx
            .app
            .clone()
            .oneshot(json_request(
                Method::POST,
                "/api/v1/submissions",
                Some(json!({
                    "question_id": SAMPLE_QUESTION_ID,
                    "student_id": "student-7",
                    "essay_text": "The alliance system dragged every power in."
                })),
            ))
            .await
            .expect("response");

        assert_eq!(response.status(), StatusCode::CREATED);
        let body = read_json(response).await;
        assert_eq!(body["status"], "completed");
        assert_eq!(body["result"]["score"], 80.0);
        assert_eq!(body["result"]["aspect_scores"][0]["aspect"], "Content");
        assert!(body["graded_at"].is_string());
    }

    #[tokio::test]
    async fn create_submission_validates_payload_and_question() {
        let ctx = setup_test_context(good_provider()).await;

        let response = ctx
            .app
            .clone()
            .oneshot(json_request(
                Method::POST,
                "/api/v1/submissions",
                Some(json!({"question_id": SAMPLE_QUESTION_ID, "student_id": "s", "essay_text": ""})),
            ))
            .await
            .expect("response");
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);

        let response = ctx
            .app
            .clone()
            .oneshot(json_request(
                Method::POST,
                "/api/v1/submissions",
                Some(json!({
                    "question_id": SAMPLE_QUESTION_ID,
                    "student_id": "s".repeat(37),
                    "essay_text": "Essay"
                })),
            ))
            .await
            .expect("response");
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);

        let response = ctx
            .app
            .clone()
            .oneshot(json_request(
                Method::POST,
                "/api/v1/submissions",
                Some(json!({"question_id": "unknown", "student_id": "s", "essay_text": "Essay"})),
            ))
            .await
            .expect("response");
        assert_eq!(response.status(), StatusCode::NOT_FOUND);
        assert_eq!(read_json(response).await["detail"], "Question not found");
    }

    #[tokio::test]
    async fn get_missing_submission_returns_404() {
        let ctx = setup_test_context(good_provider()).await;

        let response = ctx
            .app
            .clone()
            .oneshot(json_request(Method::GET, "/api/v1/submissions/ghost", None))
            .await
            .expect("response");

        assert_eq!(response.status(), StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn retry_and_status_counts() {
        let ctx = setup_test_context(good_provider()).await;
        ctx.store.seed_submission("failed-1", GradingStatus::Failed);
        ctx.store.seed_submission("done-1", GradingStatus::Completed);

        let response = ctx
            .app
            .clone()
            .oneshot(json_request(
                Method::POST,
                "/api/v1/submissions/retry",
                Some(json!({"submission_ids": ["failed-1", "done-1"]})),
            ))
            .await
            .expect("response");

        assert_eq!(response.status(), StatusCode::OK);
        let report = read_json(response).await;
        assert_eq!(report["accepted"], 1);
        assert_eq!(report["skipped"], 1);

        let response = ctx
            .app
            .clone()
            .oneshot(json_request(Method::GET, "/api/v1/submissions/status-counts", None))
            .await
            .expect("response");

        assert_eq!(response.status(), StatusCode::OK);
        let counts = read_json(response).await;
        assert_eq!(counts["processing"], 1);
        assert_eq!(counts["completed"], 1);
        assert_eq!(counts["failed"], 0);
        assert_eq!(counts["queue_depth"], 1);
    }

    #[tokio::test]
    async fn revise_grade_overrides_effective_score() {
        let ctx = setup_test_context(good_provider()).await;
        ctx.store.set_setting(GRADING_MODE_KEY, "instant");

        let created = ctx
            .app
            .clone()
            .oneshot(json_request(
                Method::POST,
                "/api/v1/submissions",
                Some(json!({
                    "question_id": SAMPLE_QUESTION_ID,
                    "student_id": "student-7",
                    "essay_text": "Militarism and nationalism."
                })),
            ))
            .await
            .expect("response");
        let id = read_json(created).await["id"].as_str().expect("id").to_string();

        let response = ctx
            .app
            .clone()
            .oneshot(json_request(
                Method::POST,
                &format!("/api/v1/submissions/{id}/revise"),
                Some(json!({"teacher_id": "teacher-1", "score": 95.0, "feedback": "Better than it looks."})),
            ))
            .await
            .expect("response");

        assert_eq!(response.status(), StatusCode::OK);
        let body = read_json(response).await;
        assert_eq!(body["score"], 95.0);
        assert_eq!(body["ai_score"], 80.0);
        assert_eq!(body["revised_by"], "teacher-1");

        let response = ctx
            .app
            .clone()
            .oneshot(json_request(
                Method::POST,
                &format!("/api/v1/submissions/{id}/revise"),
                Some(json!({"teacher_id": "teacher-1", "score": 140.0})),
            ))
            .await
            .expect("response");
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    }
}
