use std::future::Future;

use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;

use crate::error::ApiError;

/// Lifetime of a group of in-flight requests.
///
/// Cancelling (or dropping) the scope stops every request started through it;
/// results that arrive afterwards are thrown away instead of reaching state
/// that has already moved on.
#[derive(Debug, Default)]
pub struct Scope {
    token: CancellationToken,
}

impl Scope {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.token.cancel();
    }

    pub fn is_cancelled(&self) -> bool {
        self.token.is_cancelled()
    }

    /// Awaits `fut` unless the scope is cancelled first.
    pub async fn run<T, F>(&self, fut: F) -> Result<T, ApiError>
    where
        F: Future<Output = Result<T, ApiError>>,
    {
        tokio::select! {
            biased;
            _ = self.token.cancelled() => Err(ApiError::Cancelled),
            r = fut => r,
        }
    }

    /// Runs `fut` on its own task and delivers the output to `sink`.
    pub fn spawn<T, F>(&self, fut: F, sink: mpsc::UnboundedSender<T>)
    where
        F: Future<Output = T> + Send + 'static,
        T: Send + 'static,
    {
        let token = self.token.clone();
        tokio::spawn(async move {
            tokio::select! {
                biased;
                _ = token.cancelled() => {
                    tracing::debug!("dropping in-flight request");
                }
                out = fut => {
                    if !token.is_cancelled() {
                        let _ = sink.send(out);
                    }
                }
            }
        });
    }
}

impl Drop for Scope {
    fn drop(&mut self) {
        self.token.cancel();
    }
}
