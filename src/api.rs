//! HTTP adapter for the quiz backend.
//!
//! Every operation is one JSON request against a fixed base URL. Nothing is
//! retried or cached; callers surface failures to the user.

use async_trait::async_trait;
use percent_encoding::{utf8_percent_encode, AsciiSet, NON_ALPHANUMERIC};
use reqwest::{RequestBuilder, Response};
use serde::{de::DeserializeOwned, Deserialize};
use std::time::Duration;

use crate::{
    config::Config,
    error::{ApiError, ConfigError},
    models::*,
};

const PATH_SEGMENT: &AsciiSet = &NON_ALPHANUMERIC
    .remove(b'-')
    .remove(b'_')
    .remove(b'.')
    .remove(b'~');

/// Operations the client needs from the backend. `ApiClient` is the real
/// implementation; tests swap in fakes.
#[async_trait]
pub trait QuizBackend: Send + Sync + 'static {
    async fn list_quizzes(&self) -> Result<Vec<QuizSummary>, ApiError>;
    async fn get_quiz(&self, id: Id) -> Result<Quiz, ApiError>;
    async fn list_categories(&self) -> Result<Vec<Category>, ApiError>;
    async fn list_tags(&self) -> Result<Vec<Tag>, ApiError>;

    async fn create_user(&self, user: &NewUser) -> Result<BackendUser, ApiError>;
    /// Looks a user up by the identity provider's uid.
    async fn find_user(&self, external_uid: &str) -> Result<BackendUser, ApiError>;

    async fn create_quiz(&self, quiz: &NewQuiz) -> Result<Created, ApiError>;
    async fn create_question(&self, quiz_id: Id, question: &NewQuestion)
        -> Result<Created, ApiError>;
    async fn delete_quiz(&self, id: Id) -> Result<(), ApiError>;

    async fn start_attempt(&self, req: &StartAttempt) -> Result<Attempt, ApiError>;
    async fn submit_answer(&self, attempt_id: Id, answer: &AnswerSubmission)
        -> Result<(), ApiError>;
    async fn complete_attempt(&self, attempt_id: Id) -> Result<QuizResult, ApiError>;
}

#[derive(Clone, Debug)]
pub struct ApiClient {
    http: reqwest::Client,
    base: String,
}

#[derive(Deserialize)]
struct ErrorBody {
    #[serde(default)]
    error: String,
}

impl ApiClient {
    pub fn new(base_url: impl Into<String>, timeout: Duration) -> Result<Self, ConfigError> {
        let http = reqwest::Client::builder().timeout(timeout).build()?;
        let base = base_url.into().trim_end_matches('/').to_string();
        Ok(Self { http, base })
    }

    pub fn from_config(cfg: &Config) -> Result<Self, ConfigError> {
        Self::new(cfg.api_url.clone(), cfg.timeout)
    }

    pub fn base_url(&self) -> &str {
        &self.base
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base, path)
    }

    async fn json<T: DeserializeOwned>(&self, req: RequestBuilder) -> Result<T, ApiError> {
        let resp = check(req.send().await?).await?;
        Ok(resp.json::<T>().await?)
    }

    async fn unit(&self, req: RequestBuilder) -> Result<(), ApiError> {
        check(req.send().await?).await?;
        Ok(())
    }
}

async fn check(resp: Response) -> Result<Response, ApiError> {
    let status = resp.status();
    if status.is_success() {
        return Ok(resp);
    }
    let body = resp.text().await.unwrap_or_default();
    let message = serde_json::from_str::<ErrorBody>(&body)
        .map(|b| b.error)
        .unwrap_or_default();
    tracing::warn!(%status, %message, "backend rejected request");
    Err(ApiError::Status { status, message })
}

#[async_trait]
impl QuizBackend for ApiClient {
    async fn list_quizzes(&self) -> Result<Vec<QuizSummary>, ApiError> {
        tracing::debug!("GET /quizzes");
        self.json(self.http.get(self.url("/quizzes"))).await
    }

    async fn get_quiz(&self, id: Id) -> Result<Quiz, ApiError> {
        tracing::debug!(quiz_id = id, "GET /quizzes/:id");
        self.json(self.http.get(self.url(&format!("/quizzes/{id}")))).await
    }

    async fn list_categories(&self) -> Result<Vec<Category>, ApiError> {
        self.json(self.http.get(self.url("/categories"))).await
    }

    async fn list_tags(&self) -> Result<Vec<Tag>, ApiError> {
        self.json(self.http.get(self.url("/tags"))).await
    }

    async fn create_user(&self, user: &NewUser) -> Result<BackendUser, ApiError> {
        tracing::debug!(uid = %user.firebase_uid, "POST /users");
        self.json(self.http.post(self.url("/users")).json(user)).await
    }

    async fn find_user(&self, external_uid: &str) -> Result<BackendUser, ApiError> {
        let seg = utf8_percent_encode(external_uid, PATH_SEGMENT);
        tracing::debug!(uid = %external_uid, "GET /users/:uid");
        self.json(self.http.get(self.url(&format!("/users/{seg}")))).await
    }

    async fn create_quiz(&self, quiz: &NewQuiz) -> Result<Created, ApiError> {
        tracing::debug!(title = %quiz.title, "POST /quizzes");
        self.json(self.http.post(self.url("/quizzes")).json(quiz)).await
    }

    async fn create_question(
        &self,
        quiz_id: Id,
        question: &NewQuestion,
    ) -> Result<Created, ApiError> {
        tracing::debug!(quiz_id, order = question.order_index, "POST /quizzes/:id/questions");
        let url = self.url(&format!("/quizzes/{quiz_id}/questions"));
        self.json(self.http.post(url).json(question)).await
    }

    async fn delete_quiz(&self, id: Id) -> Result<(), ApiError> {
        tracing::debug!(quiz_id = id, "DELETE /quizzes/:id");
        self.unit(self.http.delete(self.url(&format!("/quizzes/{id}")))).await
    }

    async fn start_attempt(&self, req: &StartAttempt) -> Result<Attempt, ApiError> {
        tracing::debug!(quiz_id = req.quiz_id, user_id = req.user_id, "POST /quiz-attempts");
        self.json(self.http.post(self.url("/quiz-attempts")).json(req)).await
    }

    async fn submit_answer(
        &self,
        attempt_id: Id,
        answer: &AnswerSubmission,
    ) -> Result<(), ApiError> {
        tracing::debug!(attempt_id, question_id = answer.question_id, "POST answer");
        let url = self.url(&format!("/quiz-attempts/{attempt_id}/answers"));
        self.unit(self.http.post(url).json(answer)).await
    }

    async fn complete_attempt(&self, attempt_id: Id) -> Result<QuizResult, ApiError> {
        tracing::debug!(attempt_id, "POST complete");
        let url = self.url(&format!("/quiz-attempts/{attempt_id}/complete"));
        self.json(self.http.post(url)).await
    }
}
