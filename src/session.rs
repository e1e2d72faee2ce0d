//! Taking a quiz: load, start an attempt, answer question by question under
//! a countdown, complete and show the result.
//!
//! User commands (`select`, `next`, `previous`) change state immediately.
//! Network calls and countdown ticks run on their own tasks and report back
//! through an internal channel; `pump` applies the next one. Only one
//! submission is in flight at a time, and a second `next` while it is
//! pending is dropped.

use std::sync::Arc;

use http::StatusCode;
use rand::seq::SliceRandom;
use tokio::sync::mpsc;

use crate::{
    api::QuizBackend,
    config::AnswerFailurePolicy,
    error::{ApiError, SessionError},
    identity::{BackendIdentity, IdentityProvider},
    models::{AnswerSubmission, Attempt, Id, Question, Quiz, QuizResult, StartAttempt},
    scope::Scope,
    timer::{Countdown, Tick},
};

#[derive(Debug, Clone)]
pub enum Phase {
    Loading,
    Failed(String),
    NotAuthenticated,
    /// Loaded, not started.
    Ready,
    InProgress,
    Completed(Completion),
}

#[derive(Debug, Clone)]
pub struct Completion {
    pub result: QuizResult,
    pub passed: bool,
    /// False when the quiz asks not to reveal the score right away.
    pub show_score: bool,
    /// Filled only when the quiz reveals correct answers.
    pub review: Vec<ReviewItem>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReviewItem {
    pub question: String,
    pub correct: Option<String>,
    pub chosen: Option<String>,
    pub explanation: Option<String>,
}

/// What changed after `pump`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Update {
    Tick { remaining: u32 },
    /// The countdown ran out and the current answer went out.
    TimeUp { index: usize },
    /// Moved on to question `index`.
    Advanced { index: usize },
    /// Last answer is in, waiting for the result.
    Finishing,
    /// Answer was rejected and the session is holding on the question.
    AnswerFailed { index: usize, message: String },
    Completed,
    CompletionFailed { message: String },
    /// Stale tick or result; nothing changed.
    Ignored,
}

#[derive(Debug)]
enum Signal {
    Tick(Tick),
    Answered {
        index: usize,
        result: Result<(), ApiError>,
    },
    Finished(Result<QuizResult, ApiError>),
}

impl From<Tick> for Signal {
    fn from(t: Tick) -> Self {
        Signal::Tick(t)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Pending {
    Answer(usize),
    Completion,
}

#[derive(Debug, Default)]
struct Progress {
    index: usize,
    /// First question whose answer has not been accepted yet.
    frontier: usize,
    selections: Vec<Option<Id>>,
    remaining: u32,
}

pub struct QuizSession {
    backend: Arc<dyn QuizBackend>,
    quiz_id: Id,
    policy: AnswerFailurePolicy,
    phase: Phase,
    quiz: Option<Quiz>,
    questions: Vec<Question>,
    identity: Option<Arc<BackendIdentity>>,
    attempt: Option<Attempt>,
    progress: Progress,
    countdown: Option<Countdown>,
    generation: u64,
    pending: Option<Pending>,
    last_error: Option<String>,
    scope: Scope,
    tx: mpsc::UnboundedSender<Signal>,
    rx: mpsc::UnboundedReceiver<Signal>,
}

impl QuizSession {
    pub fn new(backend: Arc<dyn QuizBackend>, quiz_id: Id) -> Self {
        let (tx, rx) = mpsc::unbounded_channel();
        Self {
            backend,
            quiz_id,
            policy: AnswerFailurePolicy::default(),
            phase: Phase::Loading,
            quiz: None,
            questions: Vec::new(),
            identity: None,
            attempt: None,
            progress: Progress::default(),
            countdown: None,
            generation: 0,
            pending: None,
            last_error: None,
            scope: Scope::new(),
            tx,
            rx,
        }
    }

    pub fn with_policy(mut self, policy: AnswerFailurePolicy) -> Self {
        self.policy = policy;
        self
    }

    pub fn phase(&self) -> &Phase {
        &self.phase
    }

    pub fn quiz(&self) -> Option<&Quiz> {
        self.quiz.as_ref()
    }

    pub fn attempt(&self) -> Option<&Attempt> {
        self.attempt.as_ref()
    }

    pub fn index(&self) -> usize {
        self.progress.index
    }

    pub fn question_count(&self) -> usize {
        self.questions.len()
    }

    pub fn current_question(&self) -> Option<&Question> {
        match self.phase {
            Phase::InProgress => self.questions.get(self.progress.index),
            _ => None,
        }
    }

    pub fn selection(&self) -> Option<Id> {
        self.progress
            .selections
            .get(self.progress.index)
            .copied()
            .flatten()
    }

    /// Seconds left on the running countdown.
    pub fn remaining(&self) -> u32 {
        self.progress.remaining
    }

    pub fn is_submitting(&self) -> bool {
        self.pending.is_some()
    }

    pub fn last_error(&self) -> Option<&str> {
        self.last_error.as_deref()
    }

    pub fn completion(&self) -> Option<&Completion> {
        match &self.phase {
            Phase::Completed(c) => Some(c),
            _ => None,
        }
    }

    pub fn is_in_progress(&self) -> bool {
        matches!(self.phase, Phase::InProgress)
    }

    /// Fetches the quiz. Failures land in `Phase::Failed`; there is no retry.
    /// A load cancelled by `teardown` leaves the previous phase in place.
    pub async fn load(&mut self) -> &Phase {
        let previous = std::mem::replace(&mut self.phase, Phase::Loading);
        match self.scope.run(self.backend.get_quiz(self.quiz_id)).await {
            Ok(quiz) => {
                tracing::info!(quiz_id = quiz.id, questions = quiz.questions.len(), "quiz loaded");
                self.quiz = Some(quiz);
                self.phase = Phase::Ready;
            }
            Err(ApiError::Cancelled) => self.phase = previous,
            Err(e) => {
                tracing::error!(quiz_id = self.quiz_id, error = %e, "failed to load quiz");
                let message = match e.status() {
                    Some(StatusCode::NOT_FOUND) => "Quiz not found".to_string(),
                    _ => "Error fetching quiz".to_string(),
                };
                self.phase = Phase::Failed(message);
            }
        }
        &self.phase
    }

    /// Resolves the backend user, opens an attempt and arms the first
    /// countdown.
    pub async fn start(&mut self, provider: &dyn IdentityProvider) -> Result<(), SessionError> {
        if !matches!(self.phase, Phase::Ready) {
            return Err(SessionError::NotReady);
        }
        let Some(user) = provider.current_user() else {
            self.phase = Phase::NotAuthenticated;
            return Err(SessionError::NotAuthenticated);
        };
        let quiz = self.quiz.as_ref().ok_or(SessionError::NotReady)?;
        if quiz.questions.is_empty() {
            return Err(SessionError::NoQuestions);
        }
        let questions = attempt_order(quiz);

        let identity = match &self.identity {
            Some(known) if known.user().uid == user.uid => known.clone(),
            _ => Arc::new(BackendIdentity::new(user)),
        };
        self.identity = Some(identity.clone());

        let backend = self.backend.clone();
        let resolved = self.scope.run(identity.resolve(backend.as_ref())).await;
        let user_id = resolved.map_err(|e| self.start_failed(e))?;
        let req = StartAttempt {
            quiz_id: self.quiz_id,
            user_id,
        };
        let started = self.scope.run(backend.start_attempt(&req)).await;
        let attempt = started.map_err(|e| self.start_failed(e))?;

        tracing::info!(attempt_id = attempt.id, user_id, "attempt started");
        self.progress = Progress {
            selections: vec![None; questions.len()],
            ..Progress::default()
        };
        self.questions = questions;
        self.attempt = Some(attempt);
        self.last_error = None;
        self.phase = Phase::InProgress;
        self.arm();
        Ok(())
    }

    fn start_failed(&mut self, e: ApiError) -> SessionError {
        tracing::warn!(quiz_id = self.quiz_id, error = %e, "could not start attempt");
        let err = match e.status() {
            _ if e.is_cancelled() => SessionError::NotReady,
            Some(StatusCode::UNAUTHORIZED) => {
                self.phase = Phase::NotAuthenticated;
                SessionError::NotAuthenticated
            }
            Some(StatusCode::FORBIDDEN) => SessionError::AttemptsExhausted,
            Some(StatusCode::NOT_FOUND) => SessionError::Backend("Quiz not found".into()),
            _ => SessionError::Backend(
                e.backend_message()
                    .unwrap_or("Failed to start the quiz. Please try again.")
                    .to_string(),
            ),
        };
        self.last_error = Some(err.to_string());
        err
    }

    /// Picks an option for the current question, or clears the pick with
    /// `None`. Unknown options and picks on an answer already in flight are
    /// refused.
    pub fn select(&mut self, option: Option<Id>) -> bool {
        let Some(q) = self.current_question() else {
            return false;
        };
        if let Some(id) = option {
            if q.option(id).is_none() {
                return false;
            }
        }
        let index = self.progress.index;
        if self.pending == Some(Pending::Answer(index)) || index < self.progress.frontier {
            return false;
        }
        self.progress.selections[index] = option;
        true
    }

    /// Explicit advance. Returns false when the request was ignored.
    pub fn next(&mut self) -> bool {
        if !self.is_in_progress() {
            return false;
        }
        if self.pending.is_some() {
            tracing::debug!("advance ignored, submission in flight");
            return false;
        }
        let p = &self.progress;
        if p.frontier >= self.questions.len() {
            // every answer is in; completion failed earlier
            self.finish();
        } else if p.index < p.frontier {
            self.progress.index += 1;
        } else {
            self.submit_frontier();
        }
        true
    }

    /// Steps back one question. Nothing is re-submitted and the countdown
    /// keeps running for the question it was armed for.
    pub fn previous(&mut self) -> bool {
        if !self.is_in_progress() || self.progress.index == 0 {
            return false;
        }
        self.progress.index -= 1;
        true
    }

    /// Applies the next timer tick or request result.
    pub async fn pump(&mut self) -> Update {
        let Some(signal) = self.rx.recv().await else {
            return Update::Ignored;
        };
        self.apply(signal)
    }

    /// Cancels the countdown and every in-flight request. Results that are
    /// still on their way are discarded.
    pub fn teardown(&mut self) {
        self.disarm();
        self.scope.cancel();
        self.pending = None;
        // late results sent before the cancel landed stay in the old channel
        let (tx, rx) = mpsc::unbounded_channel();
        self.tx = tx;
        self.rx = rx;
    }

    /// Drops the current attempt and goes back to a freshly loaded quiz.
    pub async fn restart(&mut self) -> &Phase {
        self.teardown();
        self.scope = Scope::new();
        self.attempt = None;
        self.questions.clear();
        self.progress = Progress::default();
        self.last_error = None;
        self.load().await
    }

    fn apply(&mut self, signal: Signal) -> Update {
        match signal {
            Signal::Tick(t) => self.on_tick(t),
            Signal::Answered { index, result } => self.on_answered(index, result),
            Signal::Finished(result) => self.on_finished(result),
        }
    }

    fn on_tick(&mut self, t: Tick) -> Update {
        if t.generation != self.generation || !self.is_in_progress() {
            return Update::Ignored;
        }
        self.progress.remaining = t.remaining;
        if !t.expired() {
            return Update::Tick {
                remaining: t.remaining,
            };
        }
        self.disarm();
        if self.pending.is_some() {
            return Update::Ignored;
        }
        let index = self.progress.frontier;
        tracing::info!(index, "time is up");
        self.submit_frontier();
        Update::TimeUp { index }
    }

    fn on_answered(&mut self, index: usize, result: Result<(), ApiError>) -> Update {
        if self.pending != Some(Pending::Answer(index)) {
            return Update::Ignored;
        }
        self.pending = None;
        match result {
            Ok(()) => self.last_error = None,
            Err(e) => {
                tracing::warn!(index, error = %e, "answer submission failed");
                let message = e
                    .backend_message()
                    .unwrap_or("Failed to submit answer.")
                    .to_string();
                self.last_error = Some(message.clone());
                if self.policy == AnswerFailurePolicy::Block {
                    return Update::AnswerFailed { index, message };
                }
            }
        }
        self.progress.frontier = index + 1;
        if self.progress.frontier < self.questions.len() {
            self.progress.index = self.progress.frontier;
            self.arm();
            Update::Advanced {
                index: self.progress.index,
            }
        } else {
            self.disarm();
            self.finish();
            Update::Finishing
        }
    }

    fn on_finished(&mut self, result: Result<QuizResult, ApiError>) -> Update {
        if self.pending != Some(Pending::Completion) {
            return Update::Ignored;
        }
        self.pending = None;
        match result {
            Ok(result) => {
                let completion = self.completion_for(result);
                tracing::info!(
                    score = completion.result.score,
                    passed = completion.passed,
                    "attempt completed"
                );
                self.last_error = None;
                self.phase = Phase::Completed(completion);
                Update::Completed
            }
            Err(e) => {
                tracing::error!(error = %e, "failed to complete attempt");
                let message = e
                    .backend_message()
                    .unwrap_or("Failed to finish the quiz. Please try again.")
                    .to_string();
                self.last_error = Some(message.clone());
                Update::CompletionFailed { message }
            }
        }
    }

    fn completion_for(&self, result: QuizResult) -> Completion {
        let (passed, show_score, reveal) = match &self.quiz {
            Some(q) => (q.passed(&result), q.show_score_immediately, q.show_correct_answers),
            None => (false, true, false),
        };
        let review = if reveal {
            self.questions
                .iter()
                .zip(&self.progress.selections)
                .map(|(q, chosen)| ReviewItem {
                    question: q.question_text.clone(),
                    correct: q.correct_option().map(|o| o.option_text.clone()),
                    chosen: chosen
                        .and_then(|id| q.option(id))
                        .map(|o| o.option_text.clone()),
                    explanation: q.explanation.clone(),
                })
                .collect()
        } else {
            Vec::new()
        };
        Completion {
            result,
            passed,
            show_score,
            review,
        }
    }

    fn submit_frontier(&mut self) {
        let (Some(attempt), Some(q)) = (&self.attempt, self.questions.get(self.progress.frontier))
        else {
            return;
        };
        let index = self.progress.frontier;
        let answer = AnswerSubmission {
            question_id: q.id,
            selected_option_id: self.progress.selections[index],
            time_taken: self
                .countdown
                .as_ref()
                .map(Countdown::elapsed_secs)
                .unwrap_or(q.time_limit),
        };
        let attempt_id = attempt.id;
        let backend = self.backend.clone();
        self.pending = Some(Pending::Answer(index));
        self.scope.spawn(
            async move {
                let result = backend.submit_answer(attempt_id, &answer).await;
                Signal::Answered { index, result }
            },
            self.tx.clone(),
        );
    }

    fn finish(&mut self) {
        let Some(attempt_id) = self.attempt.as_ref().map(|a| a.id) else {
            return;
        };
        let backend = self.backend.clone();
        self.pending = Some(Pending::Completion);
        self.scope.spawn(
            async move { Signal::Finished(backend.complete_attempt(attempt_id).await) },
            self.tx.clone(),
        );
    }

    fn arm(&mut self) {
        self.generation += 1;
        let seconds = self
            .questions
            .get(self.progress.frontier)
            .map(|q| q.time_limit)
            .unwrap_or(0);
        self.progress.remaining = seconds;
        self.countdown = Some(Countdown::arm(seconds, self.generation, self.tx.clone()));
    }

    fn disarm(&mut self) {
        self.generation += 1;
        self.countdown = None;
    }
}

/// Question order for one attempt.
fn attempt_order(quiz: &Quiz) -> Vec<Question> {
    let mut questions = quiz.questions.clone();
    questions.sort_by_key(|q| q.order_index);
    if quiz.randomize_questions {
        questions.shuffle(&mut rand::thread_rng());
    }
    questions
}
