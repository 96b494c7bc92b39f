//! Editor façade: one open document, its session and its background jobs.
//!
//! Ingestion and export run on worker threads. Each job is tagged with the
//! session generation it was started for; results arriving after the
//! generation moved on are dropped in [`DocumentEditor::poll`].

use std::sync::Arc;

use docoverlay_scheduler::{
    spawn_task, CancellationToken, GenerationToken, SessionGeneration, TaskHandle,
};
use pdf_engine::{PlaceholderRasterizer, Rasterizer};

use crate::compositor::DrawList;
use crate::config::EditorConfig;
use crate::error::{EditorError, JobKind, Result};
use crate::export::{self, ExportOutput};
use crate::ingest::{self, IngestOutput, PageWarning};
use crate::interaction::{InteractionController, Key, Modifiers, PointerOutcome, Tool};
use crate::session::EditSession;
use crate::transform::Pixel;

/// Completion of a background job, reported by [`DocumentEditor::poll`].
#[derive(Debug)]
pub enum EditorEvent {
    Loaded(LoadSummary),
    LoadFailed(EditorError),
    Exported(ExportOutput),
    ExportFailed(EditorError),
}

#[derive(Debug, Clone, PartialEq)]
pub struct LoadSummary {
    pub page_count: usize,
    pub word_count: usize,
    pub warnings: Vec<PageWarning>,
}

struct PendingLoad {
    handle: TaskHandle<Result<IngestOutput>>,
    bytes: Arc<Vec<u8>>,
}

pub struct DocumentEditor {
    config: EditorConfig,
    session: EditSession,
    controller: InteractionController,
    rasterizer: Arc<dyn Rasterizer>,
    generation: SessionGeneration,
    original: Option<Arc<Vec<u8>>>,
    loading: Option<PendingLoad>,
    exporting: Option<TaskHandle<Result<ExportOutput>>>,
    warnings: Vec<PageWarning>,
}

impl std::fmt::Debug for DocumentEditor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DocumentEditor")
            .field("rasterizer", &self.rasterizer.name())
            .field("generation", &self.generation.current())
            .field("session", &self.session)
            .field("loading", &self.loading.is_some())
            .field("exporting", &self.exporting.is_some())
            .finish()
    }
}

impl DocumentEditor {
    pub fn new(config: EditorConfig, rasterizer: Arc<dyn Rasterizer>) -> Result<Self> {
        config.validate()?;
        Ok(Self {
            session: EditSession::new(config.text_metrics(), config.history_limit),
            controller: InteractionController::new(&config),
            config,
            rasterizer,
            generation: SessionGeneration::new(),
            original: None,
            loading: None,
            exporting: None,
            warnings: Vec::new(),
        })
    }

    /// Editor backed by [`PlaceholderRasterizer`].
    pub fn with_placeholder(config: EditorConfig) -> Result<Self> {
        Self::new(config, Arc::new(PlaceholderRasterizer::default()))
    }

    pub fn config(&self) -> &EditorConfig {
        &self.config
    }

    pub fn session(&self) -> &EditSession {
        &self.session
    }

    pub fn session_mut(&mut self) -> &mut EditSession {
        &mut self.session
    }

    pub fn controller(&self) -> &InteractionController {
        &self.controller
    }

    /// Controller and session together, for driving gestures directly.
    pub fn parts_mut(&mut self) -> (&mut InteractionController, &mut EditSession) {
        (&mut self.controller, &mut self.session)
    }

    pub fn generation(&self) -> u64 {
        self.generation.current()
    }

    pub fn is_loaded(&self) -> bool {
        self.original.is_some()
    }

    pub fn is_loading(&self) -> bool {
        self.loading.as_ref().is_some_and(|job| !job.handle.is_stale())
    }

    pub fn is_exporting(&self) -> bool {
        self.exporting.as_ref().is_some_and(|job| !job.is_stale())
    }

    /// Pages skipped by the last successful load.
    pub fn warnings(&self) -> &[PageWarning] {
        &self.warnings
    }

    /// Start ingesting `bytes` in the background.
    ///
    /// Rejected with [`EditorError::Busy`] while another load is pending.
    /// Starting a load supersedes the current session, so an export still
    /// in flight for it is discarded.
    pub fn load(&mut self, bytes: Vec<u8>) -> Result<()> {
        if self.is_loading() {
            return Err(EditorError::Busy(JobKind::Ingestion));
        }
        self.cancel_jobs();
        let generation = self.generation.advance();
        log::debug!("loading {} bytes as generation {generation}", bytes.len());

        let bytes = Arc::new(bytes);
        let job_bytes = Arc::clone(&bytes);
        let rasterizer = Arc::clone(&self.rasterizer);
        let config = self.config.clone();
        let handle = spawn_task(
            "ingest",
            CancellationToken::new(),
            self.generation.token(),
            move |cancel| ingest::ingest(&job_bytes, rasterizer.as_ref(), &config, cancel),
        )
        .map_err(|e| EditorError::from_task(JobKind::Ingestion, e))?;

        self.loading = Some(PendingLoad { handle, bytes });
        Ok(())
    }

    /// Start exporting the current session in the background.
    pub fn export(&mut self) -> Result<()> {
        if self.is_exporting() {
            return Err(EditorError::Busy(JobKind::Export));
        }
        if self.is_loading() {
            return Err(EditorError::Busy(JobKind::Ingestion));
        }
        let Some(original) = self.original.clone() else {
            return Err(EditorError::Export("no document is loaded".into()));
        };

        let (plan, manifest) = export::build_plan(&self.session, &self.config);
        let handle = spawn_task(
            "export",
            CancellationToken::new(),
            self.generation.token(),
            move |_| export::render(&original, &plan, manifest),
        )
        .map_err(|e| EditorError::from_task(JobKind::Export, e))?;

        self.exporting = Some(handle);
        Ok(())
    }

    /// Collect finished jobs without blocking.
    pub fn poll(&mut self) -> Vec<EditorEvent> {
        let mut events = Vec::new();

        let finished_load = self.loading.as_mut().and_then(|job| job.handle.try_take());
        if let Some(result) = finished_load {
            if let Some(PendingLoad { handle, bytes }) = self.loading.take() {
                events.extend(self.finish_load(bytes, handle.generation(), result));
            }
        }

        let finished_export = self.exporting.as_mut().and_then(TaskHandle::try_take);
        if let Some(result) = finished_export {
            if let Some(handle) = self.exporting.take() {
                events.extend(self.finish_export(handle.generation(), result));
            }
        }

        events
    }

    /// Block until the pending load finishes and apply it.
    pub fn wait_for_load(&mut self) -> Result<LoadSummary> {
        let Some(PendingLoad { handle, bytes }) = self.loading.take() else {
            return Err(EditorError::Idle(JobKind::Ingestion));
        };
        let generation = handle.generation().clone();
        let result = handle.wait();
        match self.finish_load(bytes, &generation, result) {
            Some(EditorEvent::Loaded(summary)) => Ok(summary),
            Some(EditorEvent::LoadFailed(err)) => Err(err),
            _ => Err(EditorError::Cancelled(JobKind::Ingestion)),
        }
    }

    /// Block until the pending export finishes.
    pub fn wait_for_export(&mut self) -> Result<ExportOutput> {
        let Some(handle) = self.exporting.take() else {
            return Err(EditorError::Idle(JobKind::Export));
        };
        let generation = handle.generation().clone();
        let result = handle.wait();
        match self.finish_export(&generation, result) {
            Some(EditorEvent::Exported(output)) => Ok(output),
            Some(EditorEvent::ExportFailed(err)) => Err(err),
            _ => Err(EditorError::Cancelled(JobKind::Export)),
        }
    }

    /// Drop the document. Jobs still running finish as stale and are discarded.
    pub fn close(&mut self) {
        self.cancel_jobs();
        let generation = self.generation.advance();
        log::debug!("editor closed, generation {generation}");
        self.session.seed(Vec::new(), Vec::new());
        self.original = None;
        self.warnings.clear();
    }

    /// Draw list for the current page.
    pub fn compose(&self) -> DrawList {
        self.controller.compose(&self.session, &self.config)
    }

    pub fn set_tool(&mut self, tool: Tool) {
        self.controller.set_tool(tool);
    }

    pub fn pointer_down(&mut self, pixel: Pixel) -> PointerOutcome {
        self.controller.pointer_down(&mut self.session, pixel)
    }

    pub fn pointer_move(&mut self, pixel: Pixel) -> bool {
        self.controller.pointer_move(pixel)
    }

    pub fn pointer_up(&mut self, pixel: Pixel) -> bool {
        self.controller.pointer_up(&mut self.session, pixel)
    }

    pub fn double_click(&mut self, pixel: Pixel) -> bool {
        self.controller.double_click(&mut self.session, pixel)
    }

    pub fn key_down(&mut self, key: Key, modifiers: Modifiers) -> bool {
        self.controller.key_down(&mut self.session, key, modifiers)
    }

    pub fn undo(&mut self) -> bool {
        self.session.undo()
    }

    pub fn redo(&mut self) -> bool {
        self.session.redo()
    }

    pub fn can_undo(&self) -> bool {
        self.session.can_undo()
    }

    pub fn can_redo(&self) -> bool {
        self.session.can_redo()
    }

    fn finish_load(
        &mut self,
        bytes: Arc<Vec<u8>>,
        generation: &GenerationToken,
        result: std::result::Result<Result<IngestOutput>, docoverlay_scheduler::TaskError>,
    ) -> Option<EditorEvent> {
        if !generation.is_current() {
            log::warn!(
                "discarding ingestion result for superseded generation {}",
                generation.generation()
            );
            return None;
        }
        let output = match result.map_err(|e| EditorError::from_task(JobKind::Ingestion, e)) {
            Ok(Ok(output)) => output,
            Ok(Err(err)) | Err(err) => {
                log::warn!("load failed: {err}");
                return Some(EditorEvent::LoadFailed(err));
            }
        };

        let summary = LoadSummary {
            page_count: output.pages.len(),
            word_count: output.words.len(),
            warnings: output.warnings.clone(),
        };
        self.controller = InteractionController::new(&self.config);
        self.session.seed(output.pages, output.words);
        self.original = Some(bytes);
        self.warnings = output.warnings;
        log::debug!("loaded {} pages, {} words", summary.page_count, summary.word_count);
        Some(EditorEvent::Loaded(summary))
    }

    fn finish_export(
        &mut self,
        generation: &GenerationToken,
        result: std::result::Result<Result<ExportOutput>, docoverlay_scheduler::TaskError>,
    ) -> Option<EditorEvent> {
        if !generation.is_current() {
            log::warn!(
                "discarding export result for superseded generation {}",
                generation.generation()
            );
            return None;
        }
        match result.map_err(|e| EditorError::from_task(JobKind::Export, e)) {
            Ok(Ok(output)) => Some(EditorEvent::Exported(output)),
            Ok(Err(err)) | Err(err) => {
                log::warn!("export failed: {err}");
                Some(EditorEvent::ExportFailed(err))
            }
        }
    }

    fn cancel_jobs(&mut self) {
        if let Some(job) = &self.loading {
            job.handle.cancel();
        }
        if let Some(handle) = &self.exporting {
            handle.cancel();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pdf_engine::test_support::text_pdf;
    use crate::model::{WordId, WordPatch};

    fn editor() -> DocumentEditor {
        DocumentEditor::with_placeholder(EditorConfig::default()).unwrap()
    }

    #[test]
    fn load_seeds_the_session() {
        let mut editor = editor();
        editor.load(text_pdf(&[&["Hello world"]])).unwrap();
        let summary = editor.wait_for_load().unwrap();

        assert_eq!(summary.page_count, 1);
        assert_eq!(summary.word_count, 2);
        assert!(editor.is_loaded());
        assert_eq!(editor.session().get_render_words(1).len(), 2);
    }

    #[test]
    fn second_load_while_pending_is_busy() {
        let mut editor = editor();
        editor.load(text_pdf(&[&["One"]])).unwrap();
        let err = editor.load(text_pdf(&[&["Two"]])).unwrap_err();
        assert!(matches!(err, EditorError::Busy(JobKind::Ingestion)));
        assert!(editor.wait_for_load().is_ok());
    }

    #[test]
    fn close_discards_in_flight_load() {
        let mut editor = editor();
        editor.load(text_pdf(&[&["Hello"]])).unwrap();
        editor.close();
        assert!(!editor.is_loading());

        let err = editor.wait_for_load().unwrap_err();
        assert!(matches!(err, EditorError::Cancelled(JobKind::Ingestion)));
        assert!(!editor.is_loaded());
        assert_eq!(editor.session().page_count(), 0);
    }

    #[test]
    fn waiting_without_a_job_is_idle() {
        let mut editor = editor();
        let err = editor.wait_for_load().unwrap_err();
        assert!(matches!(err, EditorError::Idle(JobKind::Ingestion)));
        assert_eq!(err.category(), crate::error::ErrorCategory::Idle);
        assert!(matches!(editor.wait_for_export(), Err(EditorError::Idle(JobKind::Export))));
    }

    #[test]
    fn export_requires_a_document() {
        let mut editor = editor();
        assert!(matches!(editor.export(), Err(EditorError::Export(_))));
    }

    #[test]
    fn export_round_trip_through_poll() {
        let mut editor = editor();
        editor.load(text_pdf(&[&["Hello world"]])).unwrap();
        editor.wait_for_load().unwrap();
        editor.session_mut().update_word(&WordId::from("p1-w0"), WordPatch::text("Hi"));

        editor.export().unwrap();
        assert!(matches!(editor.export(), Err(EditorError::Busy(JobKind::Export))));

        let output = loop {
            let mut events = editor.poll();
            if let Some(EditorEvent::Exported(output)) = events.pop() {
                break output;
            }
            std::thread::sleep(std::time::Duration::from_millis(1));
        };
        assert_eq!(output.manifest.edited_word_count, 1);
        assert!(output.bytes.starts_with(b"%PDF"));
        assert!(!editor.is_exporting());
    }

    #[test]
    fn failed_load_reports_parse_error() {
        let mut editor = editor();
        editor.load(b"not a pdf".to_vec()).unwrap();
        let err = editor.wait_for_load().unwrap_err();
        assert!(matches!(err, EditorError::Parse(_)));
        assert!(!editor.is_loaded());
    }
}
