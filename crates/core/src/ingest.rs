//! Document ingestion: page rasters plus positioned words.

use docoverlay_scheduler::CancellationToken;
use pdf_engine::{ExtractedWord, LoadedDocument, PageSize, Rasterizer};
use serde::Serialize;

use crate::config::{EditorConfig, PageFailurePolicy};
use crate::error::{EditorError, JobKind, Result};
use crate::model::{raster_size, Color, Page, Word, WordId};
use crate::transform::Rect;

/// A page that failed and was skipped under [`PageFailurePolicy::Skip`].
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PageWarning {
    pub page_number: u32,
    pub message: String,
}

#[derive(Debug, Clone)]
pub struct IngestOutput {
    pub pages: Vec<Page>,
    pub words: Vec<Word>,
    pub warnings: Vec<PageWarning>,
}

impl IngestOutput {
    pub fn page_words(&self, page_number: u32) -> impl Iterator<Item = &Word> {
        self.words.iter().filter(move |w| w.page_number == page_number)
    }
}

/// Parse `bytes`, rasterize every page and extract its words.
///
/// Checks `cancel` between pages.
pub fn ingest(
    bytes: &[u8],
    rasterizer: &dyn Rasterizer,
    config: &EditorConfig,
    cancel: &CancellationToken,
) -> Result<IngestOutput> {
    let document = LoadedDocument::load(bytes).map_err(EditorError::from_ingestion)?;
    let page_count = document.page_count();
    log::debug!("ingesting {page_count} pages with the {} rasterizer", rasterizer.name());

    let mut output = IngestOutput { pages: Vec::new(), words: Vec::new(), warnings: Vec::new() };
    for page_index in 0..page_count {
        if cancel.is_cancelled() {
            log::debug!("ingestion cancelled before page {}", page_index + 1);
            return Err(EditorError::Cancelled(JobKind::Ingestion));
        }
        let page_number = page_index + 1;
        let size = document.page_size(page_index).map_err(EditorError::from_ingestion)?;

        match ingest_page(&document, bytes, rasterizer, config, page_index, size) {
            Ok((page, words)) => {
                output.pages.push(page);
                output.words.extend(words);
            }
            Err(err) => match config.page_failure_policy {
                PageFailurePolicy::Abort => {
                    log::warn!("page {page_number} failed, aborting load: {err}");
                    return Err(err);
                }
                PageFailurePolicy::Skip => {
                    log::warn!("page {page_number} failed, skipping: {err}");
                    let mut page = Page::blank(
                        page_number,
                        size.width_pt,
                        size.height_pt,
                        config.raster_scale,
                    );
                    page.origin_x = size.origin_x;
                    page.origin_y = size.origin_y;
                    output.pages.push(page);
                    output.warnings.push(PageWarning { page_number, message: err.to_string() });
                }
            },
        }
    }

    log::debug!(
        "ingested {} pages, {} words, {} skipped",
        output.pages.len(),
        output.words.len(),
        output.warnings.len()
    );
    Ok(output)
}

fn ingest_page(
    document: &LoadedDocument,
    bytes: &[u8],
    rasterizer: &dyn Rasterizer,
    config: &EditorConfig,
    page_index: u32,
    size: PageSize,
) -> Result<(Page, Vec<Word>)> {
    let page_number = page_index + 1;
    let (width_px, height_px) = raster_size(size.width_pt, size.height_pt, config.raster_scale);
    let background = rasterizer
        .rasterize(bytes, page_index, width_px, height_px)
        .map_err(EditorError::from_ingestion)?;
    let text = document.extract_page(page_index).map_err(EditorError::from_ingestion)?;

    let mut page = Page::new(page_number, size.width_pt, size.height_pt, background);
    page.origin_x = size.origin_x;
    page.origin_y = size.origin_y;

    let words = text
        .words
        .into_iter()
        .enumerate()
        .map(|(index, word)| to_word(page_number, index, word))
        .collect();
    Ok((page, words))
}

fn to_word(page_number: u32, index: usize, word: ExtractedWord) -> Word {
    let mut out = Word::new(
        WordId::extracted(page_number, index),
        word.text,
        Rect::new(word.x, word.y, word.width, word.height),
        page_number,
    )
    .with_font(font_family(&word.font_name), word.font_size)
    .with_color(Color::from_array(word.color));
    out.bold = word.bold;
    out.italic = word.italic;
    out.has_trailing_space = word.has_trailing_space;
    out
}

/// Family part of a base font name: `Arial,Bold` and `Helvetica-Oblique` keep
/// only the part before the style suffix.
fn font_family(base_font: &str) -> String {
    let family = base_font.split([',', '-']).next().unwrap_or_default().trim();
    if family.is_empty() {
        "Helvetica".to_string()
    } else {
        family.to_string()
    }
}
