//! Cancellable background task on a dedicated thread.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread::{self, JoinHandle};

use thiserror::Error;

/// Errors of a [`BackgroundTask`].
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum TaskError {
    /// The thread could not be started.
    #[error("failed to spawn task {name}: {reason}")]
    Spawn {
        /// Task name.
        name: String,
        /// OS error.
        reason: String,
    },

    /// The task body panicked.
    #[error("task {0} panicked")]
    Panicked(String),

    /// The task was already joined.
    #[error("task {0} was already joined")]
    AlreadyJoined(String),
}

/// Cooperative cancellation flag shared between a task and its owner.
#[derive(Clone, Debug, Default)]
pub struct CancellationToken(Arc<AtomicBool>);

impl CancellationToken {
    /// Creates a token that is not canceled.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Asks the task to stop.
    pub fn cancel(&self) {
        self.0.store(true, Ordering::Release);
    }

    /// True once cancellation was requested.
    #[must_use]
    pub fn is_canceled(&self) -> bool {
        self.0.load(Ordering::Acquire)
    }
}

/// Work running on its own named thread.
///
/// Dropping the task requests cancellation and waits for the thread.
///
/// # Example
///
/// ```rust,ignore
/// let task = BackgroundTask::spawn("bake", |token| {
///     let mut done = 0;
///     while done < 1_000 && !token.is_canceled() {
///         done += 1;
///     }
///     done
/// })?;
/// let baked = task.join()?;
/// ```
pub struct BackgroundTask<T> {
    name: String,
    token: CancellationToken,
    handle: Option<JoinHandle<T>>,
}

impl<T: Send + 'static> BackgroundTask<T> {
    /// Starts `body` on a new thread named `name`.
    ///
    /// # Errors
    ///
    /// Returns [`TaskError::Spawn`] if the OS refuses the thread.
    pub fn spawn<F>(name: impl Into<String>, body: F) -> Result<Self, TaskError>
    where
        F: FnOnce(CancellationToken) -> T + Send + 'static,
    {
        let name = name.into();
        let token = CancellationToken::new();
        let task_token = token.clone();

        let handle = thread::Builder::new()
            .name(name.clone())
            .spawn(move || body(task_token))
            .map_err(|e| TaskError::Spawn {
                name: name.clone(),
                reason: e.to_string(),
            })?;

        tracing::debug!(task = %name, "background task started");
        Ok(Self {
            name,
            token,
            handle: Some(handle),
        })
    }
}

impl<T> BackgroundTask<T> {
    /// Task name.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Asks the task to stop at its next cancellation check.
    pub fn request_cancel(&self) {
        self.token.cancel();
    }

    /// True once cancellation was requested.
    #[must_use]
    pub fn is_canceled(&self) -> bool {
        self.token.is_canceled()
    }

    /// True once the body has returned.
    #[must_use]
    pub fn is_finished(&self) -> bool {
        self.handle.as_ref().map_or(true, JoinHandle::is_finished)
    }

    /// Waits for the body and returns its result.
    ///
    /// # Errors
    ///
    /// [`TaskError::Panicked`] if the body panicked,
    /// [`TaskError::AlreadyJoined`] on a second join.
    pub fn join(&mut self) -> Result<T, TaskError> {
        let handle = self
            .handle
            .take()
            .ok_or_else(|| TaskError::AlreadyJoined(self.name.clone()))?;
        let result = handle.join().map_err(|_| TaskError::Panicked(self.name.clone()));
        tracing::debug!(task = %self.name, canceled = self.is_canceled(), ok = result.is_ok(), "background task joined");
        result
    }

    /// Requests cancellation, then waits for the body.
    ///
    /// # Errors
    ///
    /// Same as [`join`](Self::join).
    pub fn cancel_and_join(&mut self) -> Result<T, TaskError> {
        self.request_cancel();
        self.join()
    }
}

impl<T> Drop for BackgroundTask<T> {
    fn drop(&mut self) {
        if self.handle.is_some() {
            if let Err(error) = self.cancel_and_join() {
                tracing::warn!(task = %self.name, %error, "background task ended abnormally");
            }
        }
    }
}
