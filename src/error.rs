use http::StatusCode;
use thiserror::Error;

/// Failure of a single call to the quiz backend.
#[derive(Error, Debug)]
pub enum ApiError {
    #[error("could not reach the quiz server: {0}")]
    Transport(#[source] reqwest::Error),
    #[error("{}", status_text(.status, .message))]
    Status { status: StatusCode, message: String },
    #[error("unexpected response from the quiz server: {0}")]
    Decode(String),
    #[error("request cancelled")]
    Cancelled,
}

fn status_text(status: &StatusCode, message: &str) -> String {
    if message.is_empty() {
        format!("quiz server answered {status}")
    } else {
        message.to_string()
    }
}

impl ApiError {
    pub fn status(&self) -> Option<StatusCode> {
        match self {
            ApiError::Status { status, .. } => Some(*status),
            _ => None,
        }
    }

    pub fn is_cancelled(&self) -> bool {
        matches!(self, ApiError::Cancelled)
    }

    /// The backend's own `error` text, if it sent one.
    pub fn backend_message(&self) -> Option<&str> {
        match self {
            ApiError::Status { message, .. } if !message.is_empty() => Some(message),
            _ => None,
        }
    }
}

impl From<reqwest::Error> for ApiError {
    fn from(e: reqwest::Error) -> Self {
        if e.is_decode() {
            ApiError::Decode(e.to_string())
        } else {
            ApiError::Transport(e)
        }
    }
}

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum AuthError {
    #[error("This email is already registered. Please use a different email.")]
    EmailInUse,
    #[error("Password is too weak. Please choose a stronger password.")]
    WeakPassword,
    #[error("Invalid email or password.")]
    InvalidCredentials,
    #[error("This sign-in method is not available.")]
    ProviderUnavailable,
    #[error("Please log in to continue.")]
    NotSignedIn,
}

/// Sign-up or sign-in failure, from either the identity provider or the
/// backend user record.
#[derive(Error, Debug)]
pub enum AccountError {
    #[error(transparent)]
    Auth(#[from] AuthError),
    #[error("{}", .0.backend_message().unwrap_or("Failed to create account. Please try again."))]
    Backend(#[source] ApiError),
}

/// First rule the authoring wizard found broken.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ValidationError {
    #[error("Quiz title is required")]
    MissingTitle,
    #[error("Please select a category")]
    MissingCategory,
    #[error("Quiz must have at least one question")]
    NoQuestions,
    #[error("Question {0} must have text")]
    EmptyQuestion(usize),
    #[error("Question {0} must have at least 2 options")]
    TooFewOptions(usize),
    #[error("Question {0} must have a correct answer selected")]
    NoCorrectOption(usize),
    #[error("All options for Question {0} must have text")]
    EmptyOption(usize),
    #[error("Question {0} must have at least 1 point")]
    TooFewPoints(usize),
    #[error("Question {0} must have at least 10 seconds time limit")]
    TimeLimitTooShort(usize),
    #[error("Passing score must be between 0 and 100")]
    PassingScoreOutOfRange,
}

#[derive(Error, Debug)]
pub enum WizardError {
    #[error(transparent)]
    Invalid(#[from] ValidationError),
    #[error("User authentication error. Please refresh and try again.")]
    NoAuthor,
    #[error("{0}")]
    Step(&'static str),
    #[error("{message}")]
    Submit {
        message: String,
        #[source]
        source: ApiError,
    },
}

/// Why a quiz session could not start.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum SessionError {
    #[error("The quiz is not ready to start.")]
    NotReady,
    #[error("This quiz has no questions yet.")]
    NoQuestions,
    #[error("Please log in to take this quiz.")]
    NotAuthenticated,
    #[error("You have reached the maximum number of attempts for this quiz.")]
    AttemptsExhausted,
    #[error("{0}")]
    Backend(String),
}

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("{var} has an invalid value: {value}")]
    Invalid { var: &'static str, value: String },
    #[error("failed to build HTTP client: {0}")]
    Client(#[from] reqwest::Error),
}

pub(crate) fn submit_error(e: ApiError) -> WizardError {
    let message = e
        .backend_message()
        .map(str::to_owned)
        .unwrap_or_else(|| "Failed to create quiz. Please try again.".into());
    WizardError::Submit { message, source: e }
}
