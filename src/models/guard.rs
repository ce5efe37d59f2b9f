use std::future::Future;
use std::time::Duration;
use tokio_util::sync::CancellationToken;
use tracing::warn;

use crate::error::{ModelError, Stage};

/// Default budget for a single model call (load + inference)
pub const DEFAULT_MODEL_TIMEOUT: Duration = Duration::from_secs(300);

/// Request-scoped timeout and cancellation around external model calls
#[derive(Debug, Clone)]
pub struct CallGuard {
    timeout: Duration,
    cancel: CancellationToken,
}

impl CallGuard {
    pub fn new(timeout: Duration, cancel: CancellationToken) -> Self {
        Self { timeout, cancel }
    }

    pub fn timeout(&self) -> Duration {
        self.timeout
    }

    pub fn cancel_token(&self) -> &CancellationToken {
        &self.cancel
    }

    /// Run a blocking model call on the blocking pool.
    ///
    /// A timed-out or cancelled call is abandoned; the worker thread finishes
    /// on its own and its result is dropped.
    pub async fn run_blocking<T, F>(&self, stage: Stage, call: F) -> Result<T, ModelError>
    where
        F: FnOnce() -> Result<T, ModelError> + Send + 'static,
        T: Send + 'static,
    {
        if self.cancel.is_cancelled() {
            return Err(ModelError::Cancelled { stage });
        }

        let task = tokio::task::spawn_blocking(call);
        self.run(stage, async move {
            match task.await {
                Ok(result) => result,
                Err(e) => Err(ModelError::inference(stage, format!("model task failed: {}", e))),
            }
        })
        .await
    }

    /// Await `call` unless the request is cancelled or the timeout elapses first
    pub async fn run<T, Fut>(&self, stage: Stage, call: Fut) -> Result<T, ModelError>
    where
        Fut: Future<Output = Result<T, ModelError>>,
    {
        if self.cancel.is_cancelled() {
            return Err(ModelError::Cancelled { stage });
        }

        tokio::select! {
            biased;
            _ = self.cancel.cancelled() => {
                warn!("{} cancelled", stage);
                Err(ModelError::Cancelled { stage })
            }
            result = tokio::time::timeout(self.timeout, call) => match result {
                Ok(result) => result,
                Err(_) => {
                    warn!("{} exceeded {:?}", stage, self.timeout);
                    Err(ModelError::Timeout { stage, after: self.timeout })
                }
            },
        }
    }
}

impl Default for CallGuard {
    fn default() -> Self {
        Self::new(DEFAULT_MODEL_TIMEOUT, CancellationToken::new())
    }
}
