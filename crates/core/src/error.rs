use std::fmt;

use docoverlay_scheduler::TaskError;
use pdf_engine::EngineError;

/// Kind of background job run by the editor.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, serde::Serialize)]
#[serde(rename_all = "snake_case")]
pub enum JobKind {
    Ingestion,
    Export,
}

impl fmt::Display for JobKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Ingestion => write!(f, "ingestion"),
            Self::Export => write!(f, "export"),
        }
    }
}

#[derive(Debug, thiserror::Error)]
pub enum EditorError {
    #[error("document could not be parsed: {0}")]
    Parse(String),

    #[error("page {page} could not be rasterized: {reason}")]
    Rasterize { page: u32, reason: String },

    #[error("export failed: {0}")]
    Export(String),

    #[error("invalid mutation: {0}")]
    Validation(String),

    #[error("an {0} is already in progress")]
    Busy(JobKind),

    #[error("{0} was cancelled")]
    Cancelled(JobKind),

    #[error("no {0} in progress")]
    Idle(JobKind),

    #[error("invalid configuration: {0}")]
    Config(String),
}

/// Coarse error class a host UI can branch on.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, serde::Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorCategory {
    Parse,
    Rasterize,
    Export,
    Validation,
    Busy,
    Cancelled,
    Idle,
    Config,
}

impl ErrorCategory {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Parse => "parse",
            Self::Rasterize => "rasterize",
            Self::Export => "export",
            Self::Validation => "validation",
            Self::Busy => "busy",
            Self::Cancelled => "cancelled",
            Self::Idle => "idle",
            Self::Config => "config",
        }
    }
}

impl fmt::Display for ErrorCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl EditorError {
    pub fn category(&self) -> ErrorCategory {
        match self {
            Self::Parse(_) => ErrorCategory::Parse,
            Self::Rasterize { .. } => ErrorCategory::Rasterize,
            Self::Export(_) => ErrorCategory::Export,
            Self::Validation(_) => ErrorCategory::Validation,
            Self::Busy(_) => ErrorCategory::Busy,
            Self::Cancelled(_) => ErrorCategory::Cancelled,
            Self::Idle(_) => ErrorCategory::Idle,
            Self::Config(_) => ErrorCategory::Config,
        }
    }

    /// Short suggestion for the user, suitable for an error banner.
    pub fn recovery_hint(&self) -> &'static str {
        match self.category() {
            ErrorCategory::Parse => "Check that the file is an unencrypted PDF and upload it again.",
            ErrorCategory::Rasterize => "Retry the upload; if it keeps failing, skip unreadable pages.",
            ErrorCategory::Export => "Retry the export; replace any image that cannot be decoded.",
            ErrorCategory::Validation => "Refresh the editor; the item no longer exists.",
            ErrorCategory::Busy => "Wait for the current operation to finish.",
            ErrorCategory::Cancelled => "Start the operation again.",
            ErrorCategory::Idle => "Start a load or export before waiting for it.",
            ErrorCategory::Config => "Fix the configuration file and restart.",
        }
    }

    /// Classify an engine failure raised while loading a document.
    pub(crate) fn from_ingestion(err: EngineError) -> Self {
        match err {
            EngineError::Rasterize { page, reason } => Self::Rasterize { page: page + 1, reason },
            other => Self::Parse(other.to_string()),
        }
    }

    /// Classify an engine failure raised while writing a document.
    pub(crate) fn from_export(err: EngineError) -> Self {
        Self::Export(err.to_string())
    }

    /// A worker that could not start or died before producing a result.
    pub(crate) fn from_task(kind: JobKind, err: TaskError) -> Self {
        match kind {
            JobKind::Ingestion => Self::Parse(err.to_string()),
            JobKind::Export => Self::Export(err.to_string()),
        }
    }
}

pub type Result<T> = std::result::Result<T, EditorError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn every_error_maps_to_a_distinct_category() {
        let errors = [
            EditorError::Parse("bad".into()),
            EditorError::Rasterize { page: 1, reason: "bad".into() },
            EditorError::Export("bad".into()),
            EditorError::Validation("w1".into()),
            EditorError::Busy(JobKind::Export),
            EditorError::Cancelled(JobKind::Ingestion),
            EditorError::Idle(JobKind::Export),
            EditorError::Config("bad".into()),
        ];
        let mut categories: Vec<_> = errors.iter().map(EditorError::category).collect();
        categories.dedup();
        assert_eq!(categories.len(), errors.len());
        assert!(errors.iter().all(|e| !e.recovery_hint().is_empty()));
    }

    #[test]
    fn engine_rasterize_errors_use_one_based_pages() {
        let err = EditorError::from_ingestion(EngineError::Rasterize {
            page: 0,
            reason: "boom".into(),
        });
        assert!(matches!(err, EditorError::Rasterize { page: 1, .. }));
        assert_eq!(
            EditorError::from_ingestion(EngineError::Encrypted).category(),
            ErrorCategory::Parse
        );
    }

    #[test]
    fn dead_workers_keep_the_job_category() {
        let err = EditorError::from_task(JobKind::Export, TaskError::Panicked("export".into()));
        assert_eq!(err.category(), ErrorCategory::Export);
    }

    #[test]
    fn busy_message_names_the_job() {
        assert_eq!(
            EditorError::Busy(JobKind::Ingestion).to_string(),
            "an ingestion is already in progress"
        );
    }
}
