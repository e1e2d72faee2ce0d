//! Three-step quiz authoring: basic info, questions, settings, submit.

use std::{sync::Arc, time::Duration};

use tokio::time::Instant;
use uuid::Uuid;

use crate::{
    api::QuizBackend,
    error::{submit_error, ApiError, AuthError, ValidationError, WizardError},
    identity::{BackendIdentity, IdentityProvider},
    models::{Category, Difficulty, Id, NewOption, NewQuestion, NewQuiz, QuestionType, Tag},
    routes::Route,
    scope::Scope,
};

pub const NOTIFICATION_TTL: Duration = Duration::from_secs(5);
pub const REDIRECT_DELAY: Duration = Duration::from_secs(2);

const MIN_TIME_LIMIT: u32 = 10;

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum Step {
    BasicInfo,
    Questions,
    Settings,
}

impl Step {
    pub fn number(self) -> u8 {
        match self {
            Step::BasicInfo => 1,
            Step::Questions => 2,
            Step::Settings => 3,
        }
    }

    pub fn title(self) -> &'static str {
        match self {
            Step::BasicInfo => "Basic Info",
            Step::Questions => "Questions",
            Step::Settings => "Settings",
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct QuizDraft {
    pub title: String,
    pub description: String,
    pub category_id: Option<Id>,
    pub difficulty: Difficulty,
    pub max_attempts: u32,
    pub passing_score: u8,
    pub is_public: bool,
    pub randomize_questions: bool,
    pub show_correct_answers: bool,
    pub show_score_immediately: bool,
}

impl Default for QuizDraft {
    fn default() -> Self {
        Self {
            title: String::new(),
            description: String::new(),
            category_id: None,
            difficulty: Difficulty::Medium,
            max_attempts: 1,
            passing_score: 70,
            is_public: true,
            randomize_questions: false,
            show_correct_answers: true,
            show_score_immediately: true,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OptionDraft {
    pub key: Uuid,
    pub text: String,
    pub is_correct: bool,
}

impl OptionDraft {
    fn new(text: &str) -> Self {
        Self {
            key: Uuid::new_v4(),
            text: text.into(),
            is_correct: false,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct QuestionDraft {
    pub key: Uuid,
    pub text: String,
    pub question_type: QuestionType,
    pub points: u32,
    pub time_limit: u32,
    pub explanation: String,
    pub options: Vec<OptionDraft>,
}

impl Default for QuestionDraft {
    fn default() -> Self {
        Self {
            key: Uuid::new_v4(),
            text: String::new(),
            question_type: QuestionType::MultipleChoice,
            points: 1,
            time_limit: 30,
            explanation: String::new(),
            options: default_options(QuestionType::MultipleChoice),
        }
    }
}

/// Option set a question gets when its type is (re)chosen.
pub fn default_options(t: QuestionType) -> Vec<OptionDraft> {
    match t {
        QuestionType::TrueFalse => vec![OptionDraft::new("True"), OptionDraft::new("False")],
        QuestionType::ShortAnswer | QuestionType::Essay => Vec::new(),
        QuestionType::MultipleChoice => (0..4).map(|_| OptionDraft::new("")).collect(),
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NotificationKind {
    Success,
    Error,
}

#[derive(Debug, Clone)]
pub struct Notification {
    pub kind: NotificationKind,
    pub message: String,
    shown_at: Instant,
}

impl Notification {
    pub fn is_visible(&self) -> bool {
        self.shown_at.elapsed() < NOTIFICATION_TTL
    }
}

/// Navigation scheduled after a successful submit.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Redirect {
    pub to: Route,
    pub after: Duration,
}

impl Redirect {
    pub async fn wait(self) -> Route {
        tokio::time::sleep(self.after).await;
        self.to
    }
}

pub struct QuizWizard {
    backend: Arc<dyn QuizBackend>,
    step: Step,
    draft: QuizDraft,
    questions: Vec<QuestionDraft>,
    categories: Vec<Category>,
    tags: Vec<Tag>,
    author: Option<Arc<BackendIdentity>>,
    notification: Option<Notification>,
    scope: Scope,
}

impl QuizWizard {
    pub fn new(backend: Arc<dyn QuizBackend>) -> Self {
        Self {
            backend,
            step: Step::BasicInfo,
            draft: QuizDraft::default(),
            questions: vec![QuestionDraft::default()],
            categories: Vec::new(),
            tags: Vec::new(),
            author: None,
            notification: None,
            scope: Scope::new(),
        }
    }

    /// Loads categories, tags and the author id side by side. Each failure
    /// only produces a notification; a missing user is refused outright.
    pub async fn initialize(&mut self, provider: &dyn IdentityProvider) -> Result<(), AuthError> {
        let user = provider.current_user().ok_or(AuthError::NotSignedIn)?;
        let author = match &self.author {
            Some(known) if known.user().uid == user.uid => known.clone(),
            _ => Arc::new(BackendIdentity::new(user)),
        };
        self.author = Some(author.clone());

        let backend = self.backend.clone();
        let (categories, tags, author_id) = tokio::join!(
            self.scope.run(backend.list_categories()),
            self.scope.run(backend.list_tags()),
            self.scope.run(author.resolve(backend.as_ref())),
        );
        match categories {
            Ok(c) => self.categories = c,
            Err(e) => self.load_failed("Failed to load categories", e),
        }
        match tags {
            Ok(t) => self.tags = t,
            Err(e) => self.load_failed("Failed to load tags", e),
        }
        if let Err(e) = author_id {
            self.load_failed("Authentication error. Please try again.", e);
        }
        Ok(())
    }

    fn load_failed(&mut self, message: &str, e: ApiError) {
        if e.is_cancelled() {
            return;
        }
        tracing::error!(error = %e, "{message}");
        self.notify(NotificationKind::Error, message);
    }

    pub fn step(&self) -> Step {
        self.step
    }

    pub fn draft(&self) -> &QuizDraft {
        &self.draft
    }

    pub fn questions(&self) -> &[QuestionDraft] {
        &self.questions
    }

    pub fn categories(&self) -> &[Category] {
        &self.categories
    }

    pub fn tags(&self) -> &[Tag] {
        &self.tags
    }

    pub fn author_id(&self) -> Option<Id> {
        self.author.as_ref().and_then(|a| a.cached_id())
    }

    /// The current notification, until it times out.
    pub fn notification(&self) -> Option<&Notification> {
        self.notification.as_ref().filter(|n| n.is_visible())
    }

    fn notify(&mut self, kind: NotificationKind, message: impl Into<String>) {
        self.notification = Some(Notification {
            kind,
            message: message.into(),
            shown_at: Instant::now(),
        });
    }

    // --- steps ---

    pub fn can_advance(&self) -> bool {
        match self.step {
            Step::BasicInfo => {
                !self.draft.title.trim().is_empty() && self.draft.category_id.is_some()
            }
            Step::Questions => true,
            Step::Settings => false,
        }
    }

    pub fn next_step(&mut self) -> Result<Step, WizardError> {
        if !self.can_advance() {
            return Err(WizardError::Step(match self.step {
                Step::BasicInfo => "Enter a title and select a category first",
                _ => "Already on the last step",
            }));
        }
        self.step = match self.step {
            Step::BasicInfo => Step::Questions,
            _ => Step::Settings,
        };
        Ok(self.step)
    }

    pub fn previous_step(&mut self) -> Step {
        self.step = match self.step {
            Step::Settings => Step::Questions,
            _ => Step::BasicInfo,
        };
        self.step
    }

    // --- basic info and settings ---

    pub fn set_title(&mut self, title: impl Into<String>) {
        self.draft.title = title.into();
    }

    pub fn set_description(&mut self, description: impl Into<String>) {
        self.draft.description = description.into();
    }

    pub fn set_category(&mut self, category_id: Option<Id>) {
        self.draft.category_id = category_id;
    }

    pub fn set_difficulty(&mut self, difficulty: Difficulty) {
        self.draft.difficulty = difficulty;
    }

    /// 0 means unlimited.
    pub fn set_max_attempts(&mut self, max_attempts: u32) {
        self.draft.max_attempts = max_attempts;
    }

    pub fn set_passing_score(&mut self, score: u32) -> Result<(), ValidationError> {
        self.draft.passing_score = u8::try_from(score)
            .ok()
            .filter(|s| *s <= 100)
            .ok_or(ValidationError::PassingScoreOutOfRange)?;
        Ok(())
    }

    pub fn set_public(&mut self, on: bool) {
        self.draft.is_public = on;
    }

    pub fn set_randomize_questions(&mut self, on: bool) {
        self.draft.randomize_questions = on;
    }

    pub fn set_show_correct_answers(&mut self, on: bool) {
        self.draft.show_correct_answers = on;
    }

    pub fn set_show_score_immediately(&mut self, on: bool) {
        self.draft.show_score_immediately = on;
    }

    // --- questions ---

    fn question_mut(&mut self, key: Uuid) -> Option<&mut QuestionDraft> {
        self.questions.iter_mut().find(|q| q.key == key)
    }

    pub fn add_question(&mut self) -> Uuid {
        let q = QuestionDraft::default();
        let key = q.key;
        self.questions.push(q);
        key
    }

    pub fn remove_question(&mut self, key: Uuid) -> Result<(), ValidationError> {
        if self.questions.len() <= 1 {
            self.notify(NotificationKind::Error, ValidationError::NoQuestions.to_string());
            return Err(ValidationError::NoQuestions);
        }
        self.questions.retain(|q| q.key != key);
        Ok(())
    }

    pub fn set_question_text(&mut self, key: Uuid, text: impl Into<String>) -> bool {
        self.question_mut(key).map(|q| q.text = text.into()).is_some()
    }

    /// Switching type throws away the current options.
    pub fn set_question_type(&mut self, key: Uuid, t: QuestionType) -> bool {
        self.question_mut(key)
            .map(|q| {
                q.question_type = t;
                q.options = default_options(t);
            })
            .is_some()
    }

    pub fn set_points(&mut self, key: Uuid, points: u32) -> bool {
        self.question_mut(key).map(|q| q.points = points).is_some()
    }

    pub fn set_time_limit(&mut self, key: Uuid, seconds: u32) -> bool {
        self.question_mut(key).map(|q| q.time_limit = seconds).is_some()
    }

    pub fn set_explanation(&mut self, key: Uuid, text: impl Into<String>) -> bool {
        self.question_mut(key).map(|q| q.explanation = text.into()).is_some()
    }

    pub fn add_option(&mut self, key: Uuid) -> Option<Uuid> {
        let q = self.question_mut(key)?;
        let opt = OptionDraft::new("");
        let opt_key = opt.key;
        q.options.push(opt);
        Some(opt_key)
    }

    pub fn remove_option(&mut self, key: Uuid, option: Uuid) -> bool {
        self.question_mut(key)
            .map(|q| q.options.retain(|o| o.key != option))
            .is_some()
    }

    pub fn set_option_text(&mut self, key: Uuid, option: Uuid, text: impl Into<String>) -> bool {
        self.question_mut(key)
            .and_then(|q| q.options.iter_mut().find(|o| o.key == option))
            .map(|o| o.text = text.into())
            .is_some()
    }

    /// Marks one option correct and clears the others.
    pub fn mark_correct(&mut self, key: Uuid, option: Uuid) -> bool {
        let Some(q) = self.question_mut(key) else {
            return false;
        };
        if !q.options.iter().any(|o| o.key == option) {
            return false;
        }
        for o in &mut q.options {
            o.is_correct = o.key == option;
        }
        true
    }

    // --- validation and submit ---

    fn validate_info(&self) -> Result<(), ValidationError> {
        if self.draft.title.trim().is_empty() {
            return Err(ValidationError::MissingTitle);
        }
        if self.draft.category_id.is_none() {
            return Err(ValidationError::MissingCategory);
        }
        Ok(())
    }

    fn validate_questions(&self) -> Result<(), ValidationError> {
        if self.questions.is_empty() {
            return Err(ValidationError::NoQuestions);
        }
        for (i, q) in self.questions.iter().enumerate() {
            let n = i + 1;
            if q.text.trim().is_empty() {
                return Err(ValidationError::EmptyQuestion(n));
            }
            let has_correct = q.options.iter().any(|o| o.is_correct);
            match q.question_type {
                QuestionType::MultipleChoice => {
                    if q.options.len() < 2 {
                        return Err(ValidationError::TooFewOptions(n));
                    }
                    if !has_correct {
                        return Err(ValidationError::NoCorrectOption(n));
                    }
                    if q.options.iter().any(|o| o.text.trim().is_empty()) {
                        return Err(ValidationError::EmptyOption(n));
                    }
                }
                QuestionType::TrueFalse if !has_correct => {
                    return Err(ValidationError::NoCorrectOption(n));
                }
                _ => {}
            }
            if q.points < 1 {
                return Err(ValidationError::TooFewPoints(n));
            }
            if q.time_limit < MIN_TIME_LIMIT {
                return Err(ValidationError::TimeLimitTooShort(n));
            }
        }
        Ok(())
    }

    /// First broken rule across the whole draft, author aside.
    pub fn validate(&self) -> Result<(), ValidationError> {
        self.validate_info()?;
        self.validate_questions()
    }

    /// Creates the quiz, then its questions one at a time in order. If a
    /// question is rejected the quiz is deleted again so no half-built quiz
    /// stays behind. The same happens when the returned future is dropped
    /// after the quiz was created.
    ///
    /// `&mut self` keeps two submissions of one wizard from overlapping.
    pub async fn submit(&mut self) -> Result<Redirect, WizardError> {
        let outcome = self.run_submit().await;
        match &outcome {
            Ok(_) => self.notify(
                NotificationKind::Success,
                "Quiz created successfully! Redirecting...",
            ),
            Err(e) => self.notify(NotificationKind::Error, e.to_string()),
        }
        outcome
    }

    async fn run_submit(&mut self) -> Result<Redirect, WizardError> {
        self.validate_info()?;
        let author = self.author.clone().ok_or(WizardError::NoAuthor)?;
        let backend = self.backend.clone();
        let creator_id = self
            .scope
            .run(author.resolve(backend.as_ref()))
            .await
            .map_err(|e| {
                tracing::warn!(error = %e, "no backend user for author");
                WizardError::NoAuthor
            })?;
        self.validate_questions()?;

        let quiz = self.quiz_payload(creator_id)?;
        let bodies: Vec<NewQuestion> = self
            .questions
            .iter()
            .enumerate()
            .map(|(i, q)| question_payload(i, q))
            .collect();

        let created = self
            .scope
            .run(backend.create_quiz(&quiz))
            .await
            .map_err(submit_error)?;
        let mut orphan = Orphan {
            backend: backend.clone(),
            quiz_id: Some(created.id),
        };
        tracing::info!(quiz_id = created.id, questions = bodies.len(), "quiz created");
        self.notify(NotificationKind::Success, "Quiz created! Adding questions...");

        for body in &bodies {
            let added = self
                .scope
                .run(backend.create_question(created.id, body))
                .await;
            if let Err(e) = added {
                tracing::error!(
                    quiz_id = created.id,
                    order = body.order_index,
                    error = %e,
                    "question create failed"
                );
                // a cancelled submit leaves the delete to the orphan guard
                if !e.is_cancelled() {
                    rollback(backend.as_ref(), created.id).await;
                    orphan.quiz_id = None;
                }
                return Err(submit_error(e));
            }
        }
        orphan.quiz_id = None;

        Ok(Redirect {
            to: Route::Quizzes,
            after: REDIRECT_DELAY,
        })
    }

    fn quiz_payload(&self, creator_id: Id) -> Result<NewQuiz, ValidationError> {
        let d = &self.draft;
        Ok(NewQuiz {
            title: d.title.clone(),
            description: d.description.clone(),
            category_id: d.category_id.ok_or(ValidationError::MissingCategory)?,
            difficulty_level: d.difficulty,
            max_attempts: d.max_attempts,
            passing_score: d.passing_score,
            is_public: d.is_public,
            randomize_questions: d.randomize_questions,
            show_correct_answers: d.show_correct_answers,
            show_score_immediately: d.show_score_immediately,
            creator_id,
        })
    }

    /// Drops in-flight requests, e.g. when the page is left mid-submit.
    pub fn teardown(&mut self) {
        self.scope.cancel();
        self.scope = Scope::new();
    }
}

fn question_payload(index: usize, q: &QuestionDraft) -> NewQuestion {
    let options = if q.question_type.is_free_text() {
        Vec::new()
    } else {
        q.options
            .iter()
            .enumerate()
            .map(|(i, o)| NewOption {
                option_text: o.text.clone(),
                is_correct: o.is_correct,
                order_index: i as u32,
            })
            .collect()
    };
    NewQuestion {
        question_text: q.text.clone(),
        question_type: q.question_type,
        points: q.points,
        time_limit: q.time_limit,
        explanation: Some(q.explanation.clone()).filter(|e| !e.is_empty()),
        order_index: index as u32,
        options,
    }
}

/// A created quiz whose questions are not all in yet. Dropped while still
/// holding an id, it deletes that quiz on a background task.
struct Orphan {
    backend: Arc<dyn QuizBackend>,
    quiz_id: Option<Id>,
}

impl Drop for Orphan {
    fn drop(&mut self) {
        let Some(quiz_id) = self.quiz_id.take() else {
            return;
        };
        match tokio::runtime::Handle::try_current() {
            Ok(rt) => {
                let backend = self.backend.clone();
                rt.spawn(async move { rollback(backend.as_ref(), quiz_id).await });
            }
            Err(_) => tracing::error!(
                quiz_id,
                "submit abandoned without a runtime, quiz left incomplete"
            ),
        }
    }
}

async fn rollback(backend: &dyn QuizBackend, quiz_id: Id) {
    match backend.delete_quiz(quiz_id).await {
        Ok(()) => tracing::info!(quiz_id, "rolled back partially created quiz"),
        Err(e) => tracing::error!(quiz_id, error = %e, "rollback failed, quiz left incomplete"),
    }
}
