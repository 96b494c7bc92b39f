//! Background task handles.

use std::sync::{Arc, Mutex, PoisonError};
use std::thread::JoinHandle;

use crate::{CancellationToken, GenerationToken};

#[derive(Debug, thiserror::Error)]
pub enum TaskError {
    #[error("failed to spawn worker thread: {0}")]
    Spawn(#[from] std::io::Error),
    #[error("task '{0}' panicked")]
    Panicked(String),
}

/// Run `work` on a named worker thread.
///
/// The closure receives the task's cancellation token; the handle keeps the
/// generation token so the owner can tell whether the result is still wanted.
pub fn spawn_task<T, F>(
    name: &str,
    cancel: CancellationToken,
    generation: GenerationToken,
    work: F,
) -> Result<TaskHandle<T>, TaskError>
where
    T: Send + 'static,
    F: FnOnce(&CancellationToken) -> T + Send + 'static,
{
    let result = Arc::new(Mutex::new(None));
    let result_clone = Arc::clone(&result);
    let worker_cancel = cancel.clone();

    let thread = std::thread::Builder::new().name(format!("docoverlay-{name}")).spawn(move || {
        let output = work(&worker_cancel);
        *result_clone.lock().unwrap_or_else(PoisonError::into_inner) = Some(output);
    })?;

    log::debug!("spawned task '{name}' for generation {}", generation.generation());

    Ok(TaskHandle { name: name.to_string(), thread: Some(thread), result, cancel, generation })
}

/// Handle to a running background task.
pub struct TaskHandle<T> {
    name: String,
    thread: Option<JoinHandle<()>>,
    result: Arc<Mutex<Option<T>>>,
    cancel: CancellationToken,
    generation: GenerationToken,
}

impl<T> TaskHandle<T> {
    pub fn name(&self) -> &str {
        &self.name
    }

    /// True once the task has produced its output or died.
    pub fn is_complete(&self) -> bool {
        self.has_result() || self.thread.as_ref().map_or(true, JoinHandle::is_finished)
    }

    /// True when the session this task was started for has been replaced.
    pub fn is_stale(&self) -> bool {
        !self.generation.is_current()
    }

    pub fn generation(&self) -> &GenerationToken {
        &self.generation
    }

    /// Request cooperative cancellation.
    pub fn cancel(&self) {
        self.cancel.cancel();
    }

    /// Take the output without blocking.
    ///
    /// Returns `None` while the task is still running.
    pub fn try_take(&mut self) -> Option<Result<T, TaskError>> {
        if let Some(output) = self.take_result() {
            self.join();
            return Some(Ok(output));
        }
        let finished = self.thread.as_ref().map_or(true, JoinHandle::is_finished);
        if !finished {
            return None;
        }
        // Finished without storing a result: the worker panicked.
        self.join();
        Some(self.take_result().ok_or_else(|| TaskError::Panicked(self.name.clone())))
    }

    /// Block until the task finishes.
    pub fn wait(mut self) -> Result<T, TaskError> {
        self.join();
        self.take_result().ok_or_else(|| TaskError::Panicked(self.name.clone()))
    }

    fn has_result(&self) -> bool {
        self.result.lock().unwrap_or_else(PoisonError::into_inner).is_some()
    }

    fn take_result(&self) -> Option<T> {
        self.result.lock().unwrap_or_else(PoisonError::into_inner).take()
    }

    fn join(&mut self) {
        if let Some(thread) = self.thread.take() {
            if thread.join().is_err() {
                log::warn!("task '{}' panicked", self.name);
            }
        }
    }
}

impl<T> std::fmt::Debug for TaskHandle<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TaskHandle")
            .field("name", &self.name)
            .field("generation", &self.generation.generation())
            .field("complete", &self.is_complete())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::SessionGeneration;
    use std::time::Duration;

    #[test]
    fn wait_returns_output() {
        let generation = SessionGeneration::new();
        let handle =
            spawn_task("answer", CancellationToken::new(), generation.token(), |_| 42).unwrap();

        assert_eq!(handle.wait().unwrap(), 42);
    }

    #[test]
    fn try_take_eventually_yields_output_once() {
        let generation = SessionGeneration::new();
        let mut handle =
            spawn_task("poll", CancellationToken::new(), generation.token(), |_| "done").unwrap();

        let output = loop {
            if let Some(output) = handle.try_take() {
                break output;
            }
            std::thread::sleep(Duration::from_millis(1));
        };

        assert_eq!(output.unwrap(), "done");
        assert!(handle.is_complete());
    }

    #[test]
    fn worker_observes_cancellation() {
        let generation = SessionGeneration::new();
        let handle = spawn_task("spin", CancellationToken::new(), generation.token(), |cancel| {
            let mut spins = 0u64;
            while !cancel.is_cancelled() {
                spins += 1;
                std::thread::yield_now();
            }
            spins
        })
        .unwrap();

        handle.cancel();
        assert!(handle.wait().is_ok());
    }

    #[test]
    fn panicking_worker_reports_error() {
        let generation = SessionGeneration::new();
        let handle = spawn_task::<(), _>("boom", CancellationToken::new(), generation.token(), |_| {
            panic!("worker failure")
        })
        .unwrap();

        assert!(matches!(handle.wait(), Err(TaskError::Panicked(name)) if name == "boom"));
    }

    #[test]
    fn handle_goes_stale_when_generation_advances() {
        let generation = SessionGeneration::new();
        let handle =
            spawn_task("stale", CancellationToken::new(), generation.token(), |_| ()).unwrap();

        assert!(!handle.is_stale());
        generation.advance();
        assert!(handle.is_stale());
    }
}
