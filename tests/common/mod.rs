#![allow(dead_code)]

use std::{
    sync::{
        atomic::{AtomicBool, AtomicU64, AtomicUsize, Ordering},
        Arc, Mutex,
    },
    time::Duration,
};

use async_trait::async_trait;
use axum::{
    extract::{Path, State},
    http::StatusCode,
    routing::{get, post},
    Json, Router,
};
use quizdeck::{error::ApiError, models::*, QuizBackend};
use serde_json::{json, Value};
use tower::ServiceBuilder;
use tower_http::trace::TraceLayer;

// --- in-memory backend ---

#[derive(Debug, Clone, PartialEq)]
pub enum Call {
    GetQuiz(Id),
    CreateUser(String),
    FindUser(String),
    StartAttempt(Id),
    Answer(AnswerSubmission),
    Complete(Id),
    Other(&'static str),
}

pub struct FakeBackend {
    pub quiz: Option<Quiz>,
    pub calls: Mutex<Vec<Call>>,
    pub fail_answers: AtomicBool,
    pub answer_delay: Mutex<Duration>,
    pub start_status: Mutex<Option<StatusCode>>,
    /// How many upcoming completion calls answer 502.
    pub failing_completions: AtomicUsize,
    pub result: QuizResult,
}

impl FakeBackend {
    pub fn new(quiz: Quiz) -> Self {
        Self {
            quiz: Some(quiz),
            calls: Mutex::new(Vec::new()),
            fail_answers: AtomicBool::new(false),
            answer_delay: Mutex::new(Duration::ZERO),
            start_status: Mutex::new(None),
            failing_completions: AtomicUsize::new(0),
            result: QuizResult {
                score: 50.0,
                earned_points: 1,
                total_points: 2,
                total_time_taken: 42,
                attempt_number: Some(1),
                completed_at: None,
            },
        }
    }

    pub fn empty() -> Self {
        let mut me = Self::new(two_question_quiz());
        me.quiz = None;
        me
    }

    pub fn calls(&self) -> Vec<Call> {
        self.calls.lock().unwrap().clone()
    }

    pub fn completions(&self) -> usize {
        self.calls()
            .iter()
            .filter(|c| matches!(c, Call::Complete(_)))
            .count()
    }

    pub fn answers(&self) -> Vec<AnswerSubmission> {
        self.calls()
            .into_iter()
            .filter_map(|c| match c {
                Call::Answer(a) => Some(a),
                _ => None,
            })
            .collect()
    }

    fn record(&self, call: Call) {
        self.calls.lock().unwrap().push(call);
    }
}

fn status(code: StatusCode, message: &str) -> ApiError {
    ApiError::Status {
        status: code,
        message: message.into(),
    }
}

#[async_trait]
impl QuizBackend for FakeBackend {
    async fn list_quizzes(&self) -> Result<Vec<QuizSummary>, ApiError> {
        self.record(Call::Other("list_quizzes"));
        Ok(Vec::new())
    }

    async fn get_quiz(&self, id: Id) -> Result<Quiz, ApiError> {
        self.record(Call::GetQuiz(id));
        self.quiz
            .clone()
            .ok_or_else(|| status(StatusCode::NOT_FOUND, "Quiz not found"))
    }

    async fn list_categories(&self) -> Result<Vec<Category>, ApiError> {
        Ok(Vec::new())
    }

    async fn list_tags(&self) -> Result<Vec<Tag>, ApiError> {
        Ok(Vec::new())
    }

    async fn create_user(&self, user: &NewUser) -> Result<BackendUser, ApiError> {
        self.record(Call::CreateUser(user.firebase_uid.clone()));
        Ok(BackendUser {
            id: 7,
            firebase_uid: Some(user.firebase_uid.clone()),
            username: Some(user.username.clone()),
            email: Some(user.email.clone()),
            name: Some(user.name.clone()),
        })
    }

    async fn find_user(&self, external_uid: &str) -> Result<BackendUser, ApiError> {
        self.record(Call::FindUser(external_uid.into()));
        Err(status(StatusCode::NOT_FOUND, "User not found"))
    }

    async fn create_quiz(&self, _: &NewQuiz) -> Result<Created, ApiError> {
        self.record(Call::Other("create_quiz"));
        Ok(Created { id: 1 })
    }

    async fn create_question(&self, _: Id, _: &NewQuestion) -> Result<Created, ApiError> {
        self.record(Call::Other("create_question"));
        Ok(Created { id: 1 })
    }

    async fn delete_quiz(&self, _: Id) -> Result<(), ApiError> {
        self.record(Call::Other("delete_quiz"));
        Ok(())
    }

    async fn start_attempt(&self, req: &StartAttempt) -> Result<Attempt, ApiError> {
        self.record(Call::StartAttempt(req.quiz_id));
        if let Some(code) = *self.start_status.lock().unwrap() {
            return Err(status(code, "nope"));
        }
        Ok(Attempt {
            id: 900,
            quiz_id: req.quiz_id,
            user_id: req.user_id,
            attempt_number: Some(1),
            started_at: None,
        })
    }

    async fn submit_answer(&self, _: Id, answer: &AnswerSubmission) -> Result<(), ApiError> {
        self.record(Call::Answer(answer.clone()));
        let delay = *self.answer_delay.lock().unwrap();
        if !delay.is_zero() {
            tokio::time::sleep(delay).await;
        }
        if self.fail_answers.load(Ordering::SeqCst) {
            return Err(status(StatusCode::INTERNAL_SERVER_ERROR, "answer store down"));
        }
        Ok(())
    }

    async fn complete_attempt(&self, attempt_id: Id) -> Result<QuizResult, ApiError> {
        self.record(Call::Complete(attempt_id));
        let failing = self
            .failing_completions
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1));
        if failing.is_ok() {
            return Err(status(StatusCode::BAD_GATEWAY, "results unavailable"));
        }
        Ok(self.result.clone())
    }
}

/// Two timed multiple-choice questions: 30 s then 15 s.
pub fn two_question_quiz() -> Quiz {
    serde_json::from_value(json!({
        "id": 1,
        "title": "Space",
        "passing_score": 50,
        "show_score_immediately": true,
        "show_correct_answers": true,
        "questions": [
            {"id": 101, "question_text": "Red planet?", "question_type": "multiple_choice",
             "points": 1, "time_limit": 30, "order_index": 0,
             "options": [
                {"id": 1, "option_text": "Mars", "is_correct": true, "order_index": 0},
                {"id": 2, "option_text": "Venus", "is_correct": false, "order_index": 1}
             ]},
            {"id": 102, "question_text": "Largest planet?", "question_type": "multiple_choice",
             "points": 1, "time_limit": 15, "order_index": 1,
             "options": [
                {"id": 3, "option_text": "Saturn", "is_correct": false, "order_index": 0},
                {"id": 4, "option_text": "Jupiter", "is_correct": true, "order_index": 1}
             ]}
        ]
    }))
    .unwrap()
}

// --- HTTP mock backend ---

#[derive(Default)]
pub struct MockState {
    pub calls: Mutex<Vec<(String, Value)>>,
    pub user_exists: AtomicBool,
    /// 1-based question create that answers 500.
    pub fail_question: AtomicUsize,
    /// Milliseconds each question create takes.
    pub question_delay_ms: AtomicU64,
    /// Categories and tags answer 500.
    pub fail_listings: AtomicBool,
    questions_seen: AtomicUsize,
}

impl MockState {
    pub fn calls(&self) -> Vec<String> {
        self.calls.lock().unwrap().iter().map(|(c, _)| c.clone()).collect()
    }

    pub fn bodies(&self, call: &str) -> Vec<Value> {
        self.calls
            .lock()
            .unwrap()
            .iter()
            .filter(|(c, _)| c == call)
            .map(|(_, b)| b.clone())
            .collect()
    }

    pub fn clear(&self) {
        self.calls.lock().unwrap().clear();
    }

    fn record(&self, call: String, body: Value) {
        self.calls.lock().unwrap().push((call, body));
    }
}

type Shared = Arc<MockState>;

pub struct MockServer {
    pub url: String,
    pub state: Shared,
}

pub async fn mock_server() -> MockServer {
    let state = Shared::default();
    let app = Router::new()
        .route("/api/users", post(create_user))
        .route("/api/users/:uid", get(find_user))
        .route("/api/categories", get(categories))
        .route("/api/tags", get(tags))
        .route("/api/quizzes", get(list_quizzes).post(create_quiz))
        .route("/api/quizzes/:id", get(get_quiz).delete(delete_quiz))
        .route("/api/quizzes/:id/questions", post(create_question))
        .layer(ServiceBuilder::new().layer(TraceLayer::new_for_http()))
        .with_state(state.clone());

    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });
    MockServer {
        url: format!("http://{addr}/api"),
        state,
    }
}

async fn create_user(
    State(s): State<Shared>,
    Json(body): Json<Value>,
) -> (StatusCode, Json<Value>) {
    s.record("POST /api/users".into(), body.clone());
    if s.user_exists.swap(true, Ordering::SeqCst) {
        return (StatusCode::CONFLICT, Json(json!({"error": "User already exists"})));
    }
    let mut user = body;
    user["id"] = json!(7);
    (StatusCode::CREATED, Json(user))
}

async fn find_user(State(s): State<Shared>, Path(uid): Path<String>) -> Json<Value> {
    s.record(format!("GET /api/users/{uid}"), Value::Null);
    Json(json!({"id": 7, "firebase_uid": uid}))
}

fn listing(s: &MockState, call: &str, items: Value) -> (StatusCode, Json<Value>) {
    s.record(call.into(), Value::Null);
    if s.fail_listings.load(Ordering::SeqCst) {
        return (
            StatusCode::INTERNAL_SERVER_ERROR,
            Json(json!({"error": "listing store down"})),
        );
    }
    (StatusCode::OK, Json(items))
}

async fn categories(State(s): State<Shared>) -> (StatusCode, Json<Value>) {
    listing(&s, "GET /api/categories", json!([{"id": 3, "name": "Geography"}]))
}

async fn tags(State(s): State<Shared>) -> (StatusCode, Json<Value>) {
    listing(&s, "GET /api/tags", json!([{"id": 1, "name": "capitals"}]))
}

async fn list_quizzes(State(s): State<Shared>) -> Json<Value> {
    s.record("GET /api/quizzes".into(), Value::Null);
    Json(json!([
        {"id": 55, "title": "Capitals", "difficulty_level": "easy", "question_count": "2"},
        {"id": 56, "title": "Rivers", "difficulty_level": "hard"}
    ]))
}

async fn get_quiz(State(s): State<Shared>, Path(id): Path<i64>) -> (StatusCode, Json<Value>) {
    s.record(format!("GET /api/quizzes/{id}"), Value::Null);
    if id != 55 {
        return (StatusCode::NOT_FOUND, Json(json!({"error": "Quiz not found"})));
    }
    (StatusCode::OK, Json(json!({"id": 55, "title": "Capitals", "passing_score": "70.00"})))
}

async fn create_quiz(
    State(s): State<Shared>,
    Json(body): Json<Value>,
) -> (StatusCode, Json<Value>) {
    s.record("POST /api/quizzes".into(), body.clone());
    let mut quiz = body;
    quiz["id"] = json!(55);
    (StatusCode::CREATED, Json(quiz))
}

async fn delete_quiz(State(s): State<Shared>, Path(id): Path<i64>) -> StatusCode {
    s.record(format!("DELETE /api/quizzes/{id}"), Value::Null);
    StatusCode::NO_CONTENT
}

async fn create_question(
    State(s): State<Shared>,
    Path(id): Path<i64>,
    Json(body): Json<Value>,
) -> (StatusCode, Json<Value>) {
    s.record(format!("POST /api/quizzes/{id}/questions"), body.clone());
    let delay = s.question_delay_ms.load(Ordering::SeqCst);
    if delay > 0 {
        tokio::time::sleep(Duration::from_millis(delay)).await;
    }
    let n = s.questions_seen.fetch_add(1, Ordering::SeqCst) + 1;
    if s.fail_question.load(Ordering::SeqCst) == n {
        return (
            StatusCode::INTERNAL_SERVER_ERROR,
            Json(json!({"error": "question rejected"})),
        );
    }
    let mut q = body;
    q["id"] = json!(1000 + n);
    (StatusCode::CREATED, Json(q))
}
