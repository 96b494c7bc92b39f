use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

/// Monotonic counter identifying the currently loaded session.
///
/// Bumped whenever the session is replaced or closed. Tokens taken before the
/// bump report themselves as stale.
#[derive(Debug, Clone, Default)]
pub struct SessionGeneration {
    current: Arc<AtomicU64>,
}

impl SessionGeneration {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn current(&self) -> u64 {
        self.current.load(Ordering::Acquire)
    }

    /// Start a new generation, invalidating every outstanding token.
    pub fn advance(&self) -> u64 {
        let next = self.current.fetch_add(1, Ordering::AcqRel) + 1;
        log::debug!("session generation advanced to {next}");
        next
    }

    pub fn token(&self) -> GenerationToken {
        GenerationToken { generation: self.current(), source: Arc::clone(&self.current) }
    }
}

/// Snapshot of a [`SessionGeneration`] taken when a task started.
#[derive(Debug, Clone)]
pub struct GenerationToken {
    generation: u64,
    source: Arc<AtomicU64>,
}

impl GenerationToken {
    pub fn generation(&self) -> u64 {
        self.generation
    }

    pub fn is_current(&self) -> bool {
        self.source.load(Ordering::Acquire) == self.generation
    }
}
