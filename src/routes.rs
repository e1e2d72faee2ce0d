use std::{fmt, str::FromStr};

use crate::models::Id;

/// Client-side pages.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Route {
    Home,
    SignIn,
    SignUp,
    Quizzes,
    Quiz(Id),
    CreateQuiz,
    Contact,
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("no page at {0}")]
pub struct UnknownRoute(pub String);

impl Route {
    pub fn path(&self) -> String {
        match self {
            Route::Home => "/".into(),
            Route::SignIn => "/signin".into(),
            Route::SignUp => "/signup".into(),
            Route::Quizzes => "/quizzes".into(),
            Route::Quiz(id) => format!("/quiz/{id}"),
            Route::CreateQuiz => "/create-quiz".into(),
            Route::Contact => "/contact".into(),
        }
    }

    /// Pages that need a signed-in user before they do anything.
    pub fn requires_user(&self) -> bool {
        matches!(self, Route::Quiz(_) | Route::CreateQuiz)
    }
}

impl FromStr for Route {
    type Err = UnknownRoute;

    fn from_str(raw: &str) -> Result<Self, Self::Err> {
        // query and fragment never select a page
        let path = raw.split(['?', '#']).next().unwrap_or("");
        let trimmed = path.trim_end_matches('/');
        let segments: Vec<&str> = trimmed.split('/').skip(1).collect();
        let route = match segments.as_slice() {
            [] => Route::Home,
            ["signin"] => Route::SignIn,
            ["signup"] => Route::SignUp,
            ["quizzes"] => Route::Quizzes,
            ["quiz", id] => Route::Quiz(id.parse().map_err(|_| UnknownRoute(raw.into()))?),
            ["create-quiz"] => Route::CreateQuiz,
            ["contact"] => Route::Contact,
            _ => return Err(UnknownRoute(raw.into())),
        };
        if !path.starts_with('/') {
            return Err(UnknownRoute(raw.into()));
        }
        Ok(route)
    }
}

impl fmt::Display for Route {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.path())
    }
}
