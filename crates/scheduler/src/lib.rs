//! Background task plumbing for the overlay editor.
//!
//! Ingestion and export run on worker threads. Each task carries a
//! [`CancellationToken`] for cooperative cancellation and a
//! [`GenerationToken`] naming the editor session it was started for, so a
//! result that arrives after the session was replaced can be recognised and
//! dropped.
//!
//! # Example
//!
//! ```
//! use docoverlay_scheduler::{spawn_task, CancellationToken, SessionGeneration};
//!
//! let generation = SessionGeneration::new();
//! let handle = spawn_task("sum", CancellationToken::new(), generation.token(), |_cancel| {
//!     (1..=10).sum::<u32>()
//! })
//! .unwrap();
//!
//! // The host replaced the session while the task was running.
//! generation.advance();
//!
//! let stale = handle.is_stale();
//! assert_eq!(handle.wait().unwrap(), 55);
//! assert!(stale);
//! ```

mod cancel;
mod generation;
mod task;

pub use cancel::CancellationToken;
pub use generation::{GenerationToken, SessionGeneration};
pub use task::{spawn_task, TaskError, TaskHandle};
