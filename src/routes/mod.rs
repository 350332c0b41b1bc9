//! Router assembly: HTTP endpoints, static files, CORS, and HTTP tracing.

use std::sync::Arc;

use axum::{
    routing::{get, post},
    Router,
};
use tower_http::{
    cors::{Any, CorsLayer},
    services::{ServeDir, ServeFile},
    trace::{DefaultMakeSpan, DefaultOnRequest, DefaultOnResponse, TraceLayer},
};
use tracing::Level;

use crate::state::AppState;

pub mod http;

/// Build the application router with:
/// - JSON API under `/api/v1/...`, grouped by role
/// - Static frontend from `./static` with index fallback
/// - CORS (allow any origin/method/headers)
/// - HTTP trace layer (per-request spans w/ method, path, status, latency)
pub fn build_router(state: Arc<AppState>) -> Router {
    let static_service = ServeDir::new("./static")
        .append_index_html_on_directories(true)
        .not_found_service(ServeFile::new("./static/index.html"));

    Router::new()
        .route("/api/v1/health", get(http::http_health))
        .route("/api/v1/catalog", get(http::http_catalog))
        .route("/api/v1/session", post(http::http_open_session))
        // Teacher
        .route("/api/v1/teacher/score", post(http::http_update_score))
        .route("/api/v1/teacher/category", get(http::http_check_category))
        .route("/api/v1/teacher/performance", get(http::http_performance))
        // System admin
        .route("/api/v1/admin/scores", get(http::http_admin_scores))
        // Student
        .route("/api/v1/student/revise", post(http::http_revise))
        .route("/api/v1/student/summary", post(http::http_summary))
        .route("/api/v1/student/quiz", post(http::http_quiz))
        .route("/api/v1/student/quiz/answer", post(http::http_quiz_answer))
        .route("/api/v1/student/quiz/submit", post(http::http_quiz_submit))
        .route("/api/v1/student/flashcards", post(http::http_flashcards))
        .route("/api/v1/student/flashcards/flip", post(http::http_flip))
        .with_state(state)
        .layer(
            CorsLayer::new()
                .allow_origin(Any)
                .allow_methods(Any)
                .allow_headers(Any),
        )
        .layer(
            TraceLayer::new_for_http()
                .make_span_with(DefaultMakeSpan::new().level(Level::INFO))
                .on_request(DefaultOnRequest::new().level(Level::INFO))
                .on_response(DefaultOnResponse::new().level(Level::INFO)),
        )
        .fallback_service(static_service)
}

#[cfg(test)]
mod tests {
    use super::*;

    use axum::body::{to_bytes, Body};
    use axum::http::{Request, StatusCode};
    use serde_json::{json, Value};
    use tempfile::TempDir;
    use tower::ServiceExt;

    use crate::auth::BcryptVerifier;
    use crate::config::{AppConfig, AuthConfig, RosterFormat};
    use crate::llm::testing::MockGenerator;
    use crate::llm::TextGenerator;

    const QUIZ_REPLY: &str = "**Question 1:** What is Big-O?\n\
A) Metric\nB) Notation\nC) Algorithm\nD) Data\nAnswer: B\n\n\
**Question 2:** Which structure is LIFO?\n\
A) Queue\nB) Stack\nC) Heap\nD) Tree\nAnswer: B\n";

    const CARDS_REPLY: &str = "**Card 1:**\nFront: What is a class?\nBack: A blueprint for objects.\n\n\
**Card 2:**\nFront: What is inheritance?\nBack: Reusing behaviour from a parent class.\n";

    const ROSTER: &str = r#"{"students": [{"roll_no": "1", "score": 4.0}, {"roll_no": 2, "score": 6.5}, {"roll_no": "3", "score": 9.0}]}"#;

    struct Harness {
        app: Router,
        dir: TempDir,
        gen: Option<Arc<MockGenerator>>,
    }

    fn harness(reply: Option<&str>, auth: AuthConfig) -> Harness {
        harness_with(reply, auth, |_| {})
    }

    fn harness_with(reply: Option<&str>, auth: AuthConfig, tweak: impl FnOnce(&mut AppConfig)) -> Harness {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("student_scores.json");
        std::fs::write(&path, ROSTER).unwrap();

        let mut cfg = AppConfig::default();
        cfg.roster.path = path;
        cfg.roster.format = RosterFormat::Json;
        cfg.roster.thresholds = None;
        cfg.auth = auth.clone();
        tweak(&mut cfg);

        let gen = reply.map(|r| Arc::new(MockGenerator::replying(r)));
        let llm = gen.clone().map(|g| g as Arc<dyn TextGenerator>);
        let state = AppState::from_parts(cfg, llm, Arc::new(BcryptVerifier::new(auth)));
        Harness { app: build_router(Arc::new(state)), dir, gen }
    }

    async fn send(app: &Router, method: &str, uri: &str, body: Option<Value>) -> (StatusCode, Value) {
        let builder = Request::builder().method(method).uri(uri);
        let req = match body {
            Some(b) => builder
                .header("content-type", "application/json")
                .body(Body::from(b.to_string()))
                .unwrap(),
            None => builder.body(Body::empty()).unwrap(),
        };
        let res = app.clone().oneshot(req).await.unwrap();
        let status = res.status();
        let bytes = to_bytes(res.into_body(), usize::MAX).await.unwrap();
        let value = if bytes.is_empty() { Value::Null } else { serde_json::from_slice(&bytes).unwrap() };
        (status, value)
    }

    async fn open(app: &Router, role: &str, password: Option<&str>) -> String {
        let (status, body) = send(app, "POST", "/api/v1/session", Some(json!({ "role": role, "password": password }))).await;
        assert_eq!(status, StatusCode::OK, "{body}");
        body["sessionId"].as_str().unwrap().to_string()
    }

    async fn verified_student(app: &Router, roll_no: &str) -> String {
        let sid = open(app, "student", None).await;
        let (status, body) = send(app, "POST", "/api/v1/student/revise", Some(json!({ "sessionId": sid, "studentId": roll_no }))).await;
        assert_eq!(status, StatusCode::OK, "{body}");
        sid
    }

    #[tokio::test]
    async fn health_and_catalog() {
        let h = harness(None, AuthConfig::default());
        let (status, body) = send(&h.app, "GET", "/api/v1/health", None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["ok"], true);

        let (_, body) = send(&h.app, "GET", "/api/v1/catalog", None).await;
        assert_eq!(body["roles"], json!(["teacher", "system_admin", "student"]));
        assert_eq!(body["modes"], json!(["summary", "quiz", "flashcards"]));
        assert_eq!(body["topics"].as_array().unwrap().len(), 2);
    }

    #[tokio::test]
    async fn student_quiz_flow_freezes_after_submit() {
        let h = harness(Some(QUIZ_REPLY), AuthConfig::default());
        let sid = verified_student(&h.app, "1").await;

        let (status, quiz) = send(&h.app, "POST", "/api/v1/student/quiz", Some(json!({ "sessionId": sid, "topic": "Data Structures and Algorithms" }))).await;
        assert_eq!(status, StatusCode::OK, "{quiz}");
        assert_eq!(quiz["category"], "Weak");
        assert_eq!(quiz["status"], "complete");
        assert_eq!(quiz["questions"][0]["key"], "1. What is Big-O?");
        assert!(quiz["questions"][0].get("correct_answer").is_none());

        let answer = |q: &str, o: &str| Some(json!({ "sessionId": sid, "question": q, "option": o }));
        let (status, _) = send(&h.app, "POST", "/api/v1/student/quiz/answer", answer("1. What is Big-O?", "A")).await;
        assert_eq!(status, StatusCode::OK);
        let (_, quiz) = send(&h.app, "POST", "/api/v1/student/quiz/answer", answer("1. What is Big-O?", "B")).await;
        assert_eq!(quiz["questions"][0]["selected"], "B");

        // Asking again for the same topic serves the cached quiz with answers intact.
        let (_, again) = send(&h.app, "POST", "/api/v1/student/quiz", Some(json!({ "sessionId": sid, "topic": "Data Structures and Algorithms" }))).await;
        assert_eq!(again["questions"][0]["selected"], "B");
        assert_eq!(h.gen.as_ref().unwrap().call_count(), 1);

        let (status, done) = send(&h.app, "POST", "/api/v1/student/quiz/submit", Some(json!({ "sessionId": sid }))).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(done["message"], "Answers Submitted!");
        assert_eq!(done["phase"], "submitted");
        assert_eq!(done["questions"][0]["is_correct"], true);
        assert_eq!(done["questions"][1]["is_correct"], false);

        let (status, err) = send(&h.app, "POST", "/api/v1/student/quiz/answer", answer("2. Which structure is LIFO?", "B")).await;
        assert_eq!(status, StatusCode::CONFLICT);
        assert_eq!(err["message"], "Your answers have been submitted. You cannot change them now.");
    }

    #[tokio::test]
    async fn flashcards_flip_between_sides() {
        let h = harness(Some(CARDS_REPLY), AuthConfig::default());
        let sid = verified_student(&h.app, "3").await;

        let (status, deck) = send(&h.app, "POST", "/api/v1/student/flashcards", Some(json!({ "sessionId": sid, "topic": "Object-Oriented Programming" }))).await;
        assert_eq!(status, StatusCode::OK, "{deck}");
        assert_eq!(deck["category"], "Advanced");
        assert_eq!(deck["cards"][0]["text"], "Question: What is a class?");
        assert_eq!(deck["cards"][1]["label"], "Flip Flashcard 2");

        let flip = Some(json!({ "sessionId": sid, "index": 0 }));
        let (_, card) = send(&h.app, "POST", "/api/v1/student/flashcards/flip", flip.clone()).await;
        assert_eq!(card["text"], "Answer: A blueprint for objects.");
        let (_, card) = send(&h.app, "POST", "/api/v1/student/flashcards/flip", flip).await;
        assert_eq!(card["showing_front"], true);

        let (status, _) = send(&h.app, "POST", "/api/v1/student/flashcards/flip", Some(json!({ "sessionId": sid, "index": 7 }))).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn student_must_verify_and_pick_a_known_topic() {
        let h = harness(Some("irrelevant"), AuthConfig::default());
        let sid = open(&h.app, "student", None).await;

        let (status, _) = send(&h.app, "POST", "/api/v1/student/summary", Some(json!({ "sessionId": sid, "topic": "Data Structures and Algorithms" }))).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);

        let (status, err) = send(&h.app, "POST", "/api/v1/student/revise", Some(json!({ "sessionId": sid, "studentId": "11" }))).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(err["message"], "Invalid roll number. Please enter a roll number between 1 and 10.");

        let (status, _) = send(&h.app, "POST", "/api/v1/student/revise", Some(json!({ "sessionId": sid, "studentId": "7" }))).await;
        assert_eq!(status, StatusCode::NOT_FOUND);

        let sid = verified_student(&h.app, "2").await;
        let (status, _) = send(&h.app, "POST", "/api/v1/student/summary", Some(json!({ "sessionId": sid, "topic": "Chemistry" }))).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(h.gen.as_ref().unwrap().call_count(), 0);
    }

    #[tokio::test]
    async fn missing_backend_is_unavailable() {
        let h = harness(None, AuthConfig::default());
        let sid = verified_student(&h.app, "2").await;
        let (status, err) = send(&h.app, "POST", "/api/v1/student/summary", Some(json!({ "sessionId": sid, "topic": "Data Structures and Algorithms" }))).await;
        assert_eq!(status, StatusCode::SERVICE_UNAVAILABLE);
        assert_eq!(err["kind"], "unavailable");
    }

    #[tokio::test]
    async fn teacher_updates_scores_and_checks_categories() {
        let h = harness(None, AuthConfig::default());
        let sid = open(&h.app, "teacher", None).await;

        let update = |id: &str, score: f64| Some(json!({ "sessionId": sid, "studentId": id, "score": score }));
        let (status, err) = send(&h.app, "POST", "/api/v1/teacher/score", update("1", 12.0)).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(err["message"], "Enter a valid score (1-10).");

        let (status, out) = send(&h.app, "POST", "/api/v1/teacher/score", update("1", 8.0)).await;
        assert_eq!(status, StatusCode::OK, "{out}");
        assert_eq!(out["message"], "Test score for student 1 updated to 8.");

        let uri = format!("/api/v1/teacher/category?sessionId={sid}&studentId=1");
        let (_, cat) = send(&h.app, "GET", &uri, None).await;
        assert_eq!(cat["category"], "Advanced");

        let uri = format!("/api/v1/teacher/performance?sessionId={sid}");
        let (_, table) = send(&h.app, "GET", &uri, None).await;
        let ids: Vec<&str> = table["rows"].as_array().unwrap().iter().map(|r| r["id"].as_str().unwrap()).collect();
        assert_eq!(ids, vec!["1", "2", "3"]);

        let saved = std::fs::read_to_string(h.dir.path().join("student_scores.json")).unwrap();
        assert!(saved.contains("8.0"));
    }

    #[tokio::test]
    async fn roles_are_enforced() {
        let hash = bcrypt::hash("letmein", 4).unwrap();
        let auth = AuthConfig { teacher_password_hash: None, admin_password_hash: Some(hash) };
        let h = harness(None, auth);

        let (status, _) = send(&h.app, "POST", "/api/v1/session", Some(json!({ "role": "system_admin", "password": "nope" }))).await;
        assert_eq!(status, StatusCode::UNAUTHORIZED);
        let admin = open(&h.app, "system_admin", Some("letmein")).await;
        let (status, body) = send(&h.app, "GET", &format!("/api/v1/admin/scores?sessionId={admin}"), None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["rows"][1]["category"], "Average");

        let student = open(&h.app, "student", None).await;
        let (status, err) = send(&h.app, "GET", &format!("/api/v1/admin/scores?sessionId={student}"), None).await;
        assert_eq!(status, StatusCode::FORBIDDEN);
        assert_eq!(err["kind"], "forbidden");
    }

    #[tokio::test]
    async fn idle_session_is_forgotten() {
        let h = harness_with(None, AuthConfig::default(), |cfg| cfg.sessions.idle_ttl_secs = 0);
        let sid = open(&h.app, "student", None).await;
        let (status, err) = send(&h.app, "POST", "/api/v1/student/revise", Some(json!({ "sessionId": sid, "studentId": "1" }))).await;
        assert_eq!(status, StatusCode::NOT_FOUND);
        assert_eq!(err["kind"], "not_found");
    }

    #[tokio::test]
    async fn malformed_requests_get_the_error_shape() {
        let h = harness(None, AuthConfig::default());

        let req = Request::builder()
            .method("POST")
            .uri("/api/v1/session")
            .header("content-type", "application/json")
            .body(Body::from("{\"role\": "))
            .unwrap();
        let res = h.app.clone().oneshot(req).await.unwrap();
        assert_eq!(res.status(), StatusCode::BAD_REQUEST);
        let body: Value = serde_json::from_slice(&to_bytes(res.into_body(), usize::MAX).await.unwrap()).unwrap();
        assert_eq!(body["kind"], "validation");
        assert!(body["message"].as_str().unwrap().starts_with("Invalid request body"));

        let (status, err) = send(&h.app, "POST", "/api/v1/session", Some(json!({ "role": "janitor" }))).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(err["kind"], "validation");

        let (status, err) = send(&h.app, "GET", "/api/v1/admin/scores?sessionId=not-a-uuid", None).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert!(err["message"].as_str().unwrap().starts_with("Invalid query string"));
    }
}
