use std::sync::Arc;

use crate::{
    api::QuizBackend,
    models::{Id, QuizSummary},
};

#[derive(Debug, Clone)]
pub enum Listing {
    Loading,
    Failed(String),
    Loaded(Vec<QuizSummary>),
}

/// The quiz list page: fetched summaries plus the one opened for details.
pub struct Catalog {
    backend: Arc<dyn QuizBackend>,
    listing: Listing,
    selected: Option<Id>,
}

impl Catalog {
    pub fn new(backend: Arc<dyn QuizBackend>) -> Self {
        Self {
            backend,
            listing: Listing::Loading,
            selected: None,
        }
    }

    pub async fn refresh(&mut self) -> &Listing {
        self.listing = Listing::Loading;
        self.listing = match self.backend.list_quizzes().await {
            Ok(quizzes) => {
                tracing::debug!(count = quizzes.len(), "quizzes fetched");
                Listing::Loaded(quizzes)
            }
            Err(e) => {
                tracing::error!(error = %e, "failed to fetch quizzes");
                Listing::Failed("Error fetching quizzes".into())
            }
        };
        if self.selected().is_none() {
            self.selected = None;
        }
        &self.listing
    }

    pub fn listing(&self) -> &Listing {
        &self.listing
    }

    pub fn quizzes(&self) -> &[QuizSummary] {
        match &self.listing {
            Listing::Loaded(q) => q,
            _ => &[],
        }
    }

    /// Opens the details view. Unknown ids are ignored.
    pub fn select(&mut self, id: Id) -> Option<&QuizSummary> {
        if self.quizzes().iter().any(|q| q.id == id) {
            self.selected = Some(id);
        }
        self.selected()
    }

    pub fn selected(&self) -> Option<&QuizSummary> {
        let id = self.selected?;
        self.quizzes().iter().find(|q| q.id == id)
    }

    pub fn close(&mut self) {
        self.selected = None;
    }
}
