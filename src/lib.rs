//! Client for a remote quiz service: browse quizzes, take them question by
//! question under a countdown, and author new ones through a three-step
//! wizard.

pub mod api;
pub mod catalog;
pub mod config;
pub mod error;
pub mod identity;
pub mod models;
pub mod routes;
pub mod scope;
pub mod session;
pub mod timer;
pub mod wizard;

pub use api::{ApiClient, QuizBackend};
pub use config::{AnswerFailurePolicy, Config};
pub use error::{ApiError, AuthError, SessionError, ValidationError, WizardError};
pub use identity::{IdentityProvider, IdentityUser, LocalIdentity};
pub use routes::Route;
pub use session::{Phase, QuizSession, Update};
pub use wizard::{QuizWizard, Step};
