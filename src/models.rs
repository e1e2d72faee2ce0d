use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_with::{serde_as, DisplayFromStr, PickFirst};

/// Backend row id. Attempts use it as an opaque token.
pub type Id = i64;

#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq, Default)]
#[serde(rename_all = "snake_case")]
pub enum Difficulty {
    Easy,
    #[default]
    Medium,
    Hard,
}

#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq, Default)]
#[serde(rename_all = "snake_case")]
pub enum QuestionType {
    #[default]
    MultipleChoice,
    TrueFalse,
    ShortAnswer,
    Essay,
}

impl QuestionType {
    pub fn is_free_text(self) -> bool {
        matches!(self, QuestionType::ShortAnswer | QuestionType::Essay)
    }
}

// Postgres NUMERIC and COUNT columns reach us as strings from some backends,
// so the numeric fields below accept either form.

#[serde_as]
#[derive(Serialize, Deserialize, Debug, Clone)]
pub struct Quiz {
    pub id: Id,
    pub title: String,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub category_id: Option<Id>,
    #[serde(rename = "difficulty_level", default)]
    pub difficulty: Difficulty,
    #[serde(default)]
    pub max_attempts: u32,
    #[serde_as(as = "PickFirst<(_, DisplayFromStr)>")]
    #[serde(default)]
    pub passing_score: f64,
    #[serde(default)]
    pub is_public: bool,
    #[serde(default)]
    pub randomize_questions: bool,
    #[serde(default)]
    pub show_correct_answers: bool,
    #[serde(default)]
    pub show_score_immediately: bool,
    #[serde(default)]
    pub questions: Vec<Question>,
}

impl Quiz {
    pub fn passed(&self, result: &QuizResult) -> bool {
        result.score >= self.passing_score
    }

    pub fn unlimited_attempts(&self) -> bool {
        self.max_attempts == 0
    }
}

#[serde_as]
#[derive(Serialize, Deserialize, Debug, Clone)]
pub struct QuizSummary {
    pub id: Id,
    pub title: String,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(rename = "difficulty_level", default)]
    pub difficulty: Difficulty,
    #[serde(default)]
    pub category_name: Option<String>,
    #[serde_as(as = "Option<PickFirst<(_, DisplayFromStr)>>")]
    pub question_count: Option<u32>,
}

#[derive(Serialize, Deserialize, Debug, Clone)]
pub struct Question {
    pub id: Id,
    pub question_text: String,
    pub question_type: QuestionType,
    pub points: u32,
    pub time_limit: u32,
    #[serde(default)]
    pub explanation: Option<String>,
    #[serde(default)]
    pub order_index: u32,
    #[serde(default)]
    pub options: Vec<QuestionOption>,
}

impl Question {
    pub fn option(&self, id: Id) -> Option<&QuestionOption> {
        self.options.iter().find(|o| o.id == id)
    }

    pub fn correct_option(&self) -> Option<&QuestionOption> {
        self.options.iter().find(|o| o.is_correct == Some(true))
    }
}

#[derive(Serialize, Deserialize, Debug, Clone)]
pub struct QuestionOption {
    pub id: Id,
    pub option_text: String,
    // takers usually get options without correctness flags
    #[serde(default)]
    pub is_correct: Option<bool>,
    #[serde(default)]
    pub order_index: u32,
}

#[derive(Serialize, Deserialize, Debug, Clone)]
pub struct Attempt {
    pub id: Id,
    pub quiz_id: Id,
    pub user_id: Id,
    #[serde(default)]
    pub attempt_number: Option<u32>,
    #[serde(default)]
    pub started_at: Option<DateTime<Utc>>,
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
pub struct StartAttempt {
    pub quiz_id: Id,
    pub user_id: Id,
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
pub struct AnswerSubmission {
    pub question_id: Id,
    pub selected_option_id: Option<Id>,
    pub time_taken: u32,
}

#[serde_as]
#[derive(Serialize, Deserialize, Debug, Clone)]
pub struct QuizResult {
    #[serde_as(as = "PickFirst<(_, DisplayFromStr)>")]
    pub score: f64,
    pub earned_points: u32,
    pub total_points: u32,
    pub total_time_taken: u32,
    #[serde(default)]
    pub attempt_number: Option<u32>,
    #[serde(default)]
    pub completed_at: Option<DateTime<Utc>>,
}

#[derive(Serialize, Deserialize, Debug, Clone)]
pub struct Category {
    pub id: Id,
    pub name: String,
    #[serde(default)]
    pub description: Option<String>,
}

#[derive(Serialize, Deserialize, Debug, Clone)]
pub struct Tag {
    pub id: Id,
    pub name: String,
}

#[derive(Serialize, Deserialize, Debug, Clone)]
pub struct BackendUser {
    pub id: Id,
    #[serde(default)]
    pub firebase_uid: Option<String>,
    #[serde(default)]
    pub username: Option<String>,
    #[serde(default)]
    pub email: Option<String>,
    #[serde(default)]
    pub name: Option<String>,
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
pub struct NewUser {
    pub firebase_uid: String,
    pub username: String,
    pub email: String,
    pub name: String,
    pub role: String,
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct NewQuiz {
    pub title: String,
    pub description: String,
    pub category_id: Id,
    pub difficulty_level: Difficulty,
    pub max_attempts: u32,
    pub passing_score: u8,
    pub is_public: bool,
    pub randomize_questions: bool,
    pub show_correct_answers: bool,
    pub show_score_immediately: bool,
    pub creator_id: Id,
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
pub struct NewQuestion {
    pub question_text: String,
    pub question_type: QuestionType,
    pub points: u32,
    pub time_limit: u32,
    pub explanation: Option<String>,
    pub order_index: u32,
    pub options: Vec<NewOption>,
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
pub struct NewOption {
    pub option_text: String,
    pub is_correct: bool,
    pub order_index: u32,
}

/// `{ "id": ... }` is all the client reads back from create calls.
#[derive(Serialize, Deserialize, Debug, Clone, Copy)]
pub struct Created {
    pub id: Id,
}
