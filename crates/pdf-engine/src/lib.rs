//! Low-level document I/O for the overlay editor.
//!
//! Everything that touches the PDF object model lives here: loading bytes,
//! reading page geometry, interpreting content streams into positioned words,
//! rasterizing page backgrounds and writing an [`EditPlan`] back into a new
//! document. The editor core never sees `lopdf` types.

use image::{ImageBuffer, Rgba};
use lopdf::{Dictionary, Document, Object, ObjectId};

mod extract;
mod metrics;
mod raster;
mod writer;

pub use extract::{ExtractedWord, PageText};
pub use raster::{PlaceholderRasterizer, Rasterizer};
pub use writer::{apply_plan, DrawOp, EditPlan, PathKind, PdfRect, ShapeStyle, TextAlign};

#[cfg(feature = "pdfium")]
pub use raster::pdfium_backend;

pub type RgbaImage = ImageBuffer<Rgba<u8>, Vec<u8>>;

/// Fallback page size (US Letter) when a page carries no usable MediaBox.
const DEFAULT_PAGE_SIZE: PageSize =
    PageSize { width_pt: 612.0, height_pt: 792.0, origin_x: 0.0, origin_y: 0.0 };

/// Page box in PDF user space.
#[derive(Debug, Clone, Copy, PartialEq, serde::Serialize)]
pub struct PageSize {
    pub width_pt: f32,
    pub height_pt: f32,
    /// Lower-left corner of the MediaBox.
    pub origin_x: f32,
    pub origin_y: f32,
}

impl PageSize {
    /// Convert a user-space point into top-left, y-down page coordinates.
    pub fn to_top_left(&self, x: f32, y: f32) -> (f32, f32) {
        (x - self.origin_x, self.origin_y + self.height_pt - y)
    }

    /// Convert a top-left, y-down point back into user space.
    pub fn to_user_space(&self, x: f32, y: f32) -> (f32, f32) {
        (x + self.origin_x, self.origin_y + self.height_pt - y)
    }
}

#[derive(Debug, thiserror::Error)]
pub enum EngineError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
    #[error("PDF parse error: {0}")]
    Parse(#[from] lopdf::Error),
    #[error("encrypted PDFs are not supported")]
    Encrypted,
    #[error("document has no pages")]
    NoPages,
    #[error("page {page} out of range (page_count={page_count})")]
    PageOutOfRange { page: u32, page_count: u32 },
    #[error("malformed content on page {page}: {reason}")]
    Content { page: u32, reason: String },
    #[error("failed to rasterize page {page}: {reason}")]
    Rasterize { page: u32, reason: String },
    #[error("image could not be decoded: {0}")]
    Image(String),
    #[error("failed to write document: {0}")]
    Write(String),
}

impl EngineError {
    /// True for failures caused by the input bytes rather than by a single page.
    pub fn is_document_level(&self) -> bool {
        matches!(self, Self::Io(_) | Self::Parse(_) | Self::Encrypted | Self::NoPages)
    }
}

/// A parsed document ready for per-page extraction.
pub struct LoadedDocument {
    doc: Document,
    page_ids: Vec<ObjectId>,
    page_sizes: Vec<PageSize>,
}

impl LoadedDocument {
    pub fn load(bytes: &[u8]) -> Result<Self, EngineError> {
        let doc = Document::load_mem(bytes).map_err(|err| match err {
            lopdf::Error::Decryption(_) => EngineError::Encrypted,
            other => EngineError::Parse(other),
        })?;

        if doc.trailer.get(b"Encrypt").is_ok() {
            return Err(EngineError::Encrypted);
        }

        let page_ids: Vec<ObjectId> = doc.get_pages().into_values().collect();
        if page_ids.is_empty() {
            return Err(EngineError::NoPages);
        }

        let page_sizes = page_ids.iter().map(|id| read_page_size(&doc, *id)).collect();

        Ok(Self { doc, page_ids, page_sizes })
    }

    pub fn page_count(&self) -> u32 {
        self.page_ids.len() as u32
    }

    pub fn page_sizes(&self) -> &[PageSize] {
        &self.page_sizes
    }

    pub fn page_size(&self, page_index: u32) -> Result<PageSize, EngineError> {
        self.page_sizes.get(page_index as usize).copied().ok_or(EngineError::PageOutOfRange {
            page: page_index,
            page_count: self.page_count(),
        })
    }

    /// Interpret the page's content stream into positioned words.
    pub fn extract_page(&self, page_index: u32) -> Result<PageText, EngineError> {
        let page_id = *self.page_ids.get(page_index as usize).ok_or(
            EngineError::PageOutOfRange { page: page_index, page_count: self.page_count() },
        )?;
        let size = self.page_size(page_index)?;
        extract::extract_page(&self.doc, page_id, page_index, size)
    }
}

fn read_page_size(doc: &Document, page_id: ObjectId) -> PageSize {
    inherited_attribute(doc, page_id, b"MediaBox")
        .and_then(|obj| resolve(doc, obj).as_array().ok())
        .and_then(|array| {
            if array.len() != 4 {
                return None;
            }
            let mut values = [0.0f32; 4];
            for (slot, obj) in values.iter_mut().zip(array.iter()) {
                *slot = number(resolve(doc, obj))?;
            }
            let [x0, y0, x1, y1] = values;
            Some(PageSize {
                width_pt: (x1 - x0).abs(),
                height_pt: (y1 - y0).abs(),
                origin_x: x0.min(x1),
                origin_y: y0.min(y1),
            })
        })
        .unwrap_or(DEFAULT_PAGE_SIZE)
}

/// Look up a page attribute, walking `/Parent` links for inheritable keys.
pub(crate) fn inherited_attribute<'a>(
    doc: &'a Document,
    page_id: ObjectId,
    key: &[u8],
) -> Option<&'a Object> {
    let mut current = doc.get_dictionary(page_id).ok()?;
    // Guard against cyclic page trees.
    for _ in 0..32 {
        if let Ok(value) = current.get(key) {
            return Some(value);
        }
        let parent = current.get(b"Parent").ok()?.as_reference().ok()?;
        current = doc.get_dictionary(parent).ok()?;
    }
    None
}

pub(crate) fn resolve<'a>(doc: &'a Document, obj: &'a Object) -> &'a Object {
    match obj {
        Object::Reference(id) => doc.get_object(*id).unwrap_or(obj),
        _ => obj,
    }
}

pub(crate) fn resolve_dict<'a>(doc: &'a Document, obj: &'a Object) -> Option<&'a Dictionary> {
    match resolve(doc, obj) {
        Object::Dictionary(dict) => Some(dict),
        Object::Stream(stream) => Some(&stream.dict),
        _ => None,
    }
}

pub(crate) fn number(obj: &Object) -> Option<f32> {
    match obj {
        Object::Integer(i) => Some(*i as f32),
        Object::Real(r) => Some(*r),
        _ => None,
    }
}

/// Fixture documents shared by this crate's tests and its dependents' tests.
#[cfg(any(test, feature = "test-support"))]
pub mod test_support {
    use lopdf::content::{Content, Operation};
    use lopdf::{dictionary, Document, Object, Stream};

    /// Build a one-font, multi-page document whose pages show the given lines
    /// of text with Helvetica 12pt, one line per `Td` step starting at y=700.
    pub fn text_pdf(pages: &[&[&str]]) -> Vec<u8> {
        let mut doc = Document::with_version("1.5");
        let pages_id = doc.new_object_id();
        let font_id = doc.add_object(dictionary! {
            "Type" => "Font",
            "Subtype" => "Type1",
            "BaseFont" => "Helvetica",
        });
        let resources_id = doc.add_object(dictionary! {
            "Font" => dictionary! { "F1" => font_id },
        });

        let mut kids: Vec<Object> = Vec::new();
        for lines in pages {
            let mut operations = vec![
                Operation::new("BT", vec![]),
                Operation::new("Tf", vec!["F1".into(), 12.into()]),
                Operation::new("Td", vec![72.into(), 700.into()]),
            ];
            for (index, line) in lines.iter().enumerate() {
                if index > 0 {
                    operations.push(Operation::new("Td", vec![0.into(), (-20).into()]));
                }
                operations.push(Operation::new("Tj", vec![Object::string_literal(*line)]));
            }
            operations.push(Operation::new("ET", vec![]));

            let content = Content { operations };
            let content_id =
                doc.add_object(Stream::new(dictionary! {}, content.encode().unwrap()));
            let page_id = doc.add_object(dictionary! {
                "Type" => "Page",
                "Parent" => pages_id,
                "Contents" => content_id,
            });
            kids.push(page_id.into());
        }

        let count = kids.len() as i64;
        doc.objects.insert(
            pages_id,
            Object::Dictionary(dictionary! {
                "Type" => "Pages",
                "Kids" => kids,
                "Count" => count,
                "Resources" => resources_id,
                "MediaBox" => vec![0.into(), 0.into(), 612.into(), 792.into()],
            }),
        );
        let catalog_id = doc.add_object(dictionary! {
            "Type" => "Catalog",
            "Pages" => pages_id,
        });
        doc.trailer.set("Root", catalog_id);

        let mut bytes = Vec::new();
        doc.save_to(&mut bytes).unwrap();
        bytes
    }
}
