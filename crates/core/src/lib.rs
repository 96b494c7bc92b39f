//! Document Overlay Editor Core
//!
//! Edit state, history, composition and export for text and element
//! overlays on top of an existing PDF.

pub mod compositor;
pub mod config;
pub mod editor;
pub mod error;
pub mod export;
mod history;
pub mod ingest;
pub mod interaction;
pub mod model;
pub mod session;
pub mod transform;

pub use compositor::{compose, DrawItem, DrawList, LivePreview};
pub use config::{EditorConfig, ElementDefaults, PageFailurePolicy};
pub use editor::{DocumentEditor, EditorEvent, LoadSummary};
pub use error::{EditorError, ErrorCategory, JobKind, Result};
pub use export::{build_plan, export, ExportManifest, ExportOutput};
pub use ingest::{ingest, IngestOutput, PageWarning};
pub use interaction::{CodeGenerator, InteractionController, Key, Modifiers, PointerOutcome, Tool};
pub use model::{
    Color, Element, ElementId, ElementKind, ImageContent, ImageSource, ItemId, Layer, LayerType,
    Page, ShapeContent, ShapeKind, TextAlign, TextContent, TextMetrics, Word, WordId, WordPatch,
};
pub use session::{EditSession, SessionEvent, SubscriptionId, WordEditView};
pub use transform::{to_document, to_viewport, Pixel, PixelRect, Point, Rect, Viewport};

pub use docoverlay_scheduler::CancellationToken;
pub use pdf_engine::{PlaceholderRasterizer, Rasterizer};
