//! Editor data model.
//!
//! All geometry is stored in page-local document points with a top-left
//! origin and y growing downwards. Pixel values are derived by the
//! compositor and never stored here.

use std::fmt;
use std::sync::Arc;

use pdf_engine::RgbaImage;
use serde::{Deserialize, Serialize};

use crate::transform::{Point, Rect};

/// RGB colour with components in `[0, 1]`.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Color {
    pub r: f32,
    pub g: f32,
    pub b: f32,
}

impl Color {
    pub const BLACK: Color = Color { r: 0.0, g: 0.0, b: 0.0 };
    pub const WHITE: Color = Color { r: 1.0, g: 1.0, b: 1.0 };
    pub const YELLOW: Color = Color { r: 1.0, g: 0.92, b: 0.23 };
    pub const BLUE: Color = Color { r: 0.15, g: 0.39, b: 0.92 };

    pub fn new(r: f32, g: f32, b: f32) -> Self {
        Self { r: r.clamp(0.0, 1.0), g: g.clamp(0.0, 1.0), b: b.clamp(0.0, 1.0) }
    }

    pub fn from_array(rgb: [f32; 3]) -> Self {
        Self::new(rgb[0], rgb[1], rgb[2])
    }

    pub fn to_array(self) -> [f32; 3] {
        [self.r, self.g, self.b]
    }
}

/// Stable identifier of an extracted or added word.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct WordId(String);

impl WordId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// Id assigned at ingestion: `p{page}-w{index}`.
    pub fn extracted(page_number: u32, index: usize) -> Self {
        Self(format!("p{page_number}-w{index}"))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for WordId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for WordId {
    fn from(value: &str) -> Self {
        Self(value.to_string())
    }
}

/// Unique identifier for an element, generated with UUID v4.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ElementId(uuid::Uuid);

impl ElementId {
    pub fn new() -> Self {
        Self(uuid::Uuid::new_v4())
    }

    pub fn as_uuid(&self) -> uuid::Uuid {
        self.0
    }
}

impl Default for ElementId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for ElementId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl std::str::FromStr for ElementId {
    type Err = uuid::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        uuid::Uuid::parse_str(s).map(Self)
    }
}

/// Anything that can be selected, dragged or deleted.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize)]
#[serde(tag = "type", content = "id", rename_all = "snake_case")]
pub enum ItemId {
    Word(WordId),
    Element(ElementId),
}

impl fmt::Display for ItemId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Word(id) => write!(f, "word {id}"),
            Self::Element(id) => write!(f, "element {id}"),
        }
    }
}

impl From<WordId> for ItemId {
    fn from(value: WordId) -> Self {
        Self::Word(value)
    }
}

impl From<ElementId> for ItemId {
    fn from(value: ElementId) -> Self {
        Self::Element(value)
    }
}

/// One rendered page of the loaded document.
#[derive(Debug, Clone)]
pub struct Page {
    /// 1-based.
    pub page_number: u32,
    pub width: f32,
    pub height: f32,
    /// Lower-left corner of the page box in the document's native space.
    pub origin_x: f32,
    pub origin_y: f32,
    pub background: Arc<RgbaImage>,
}

impl Page {
    pub fn new(page_number: u32, width: f32, height: f32, background: RgbaImage) -> Self {
        Self {
            page_number,
            width,
            height,
            origin_x: 0.0,
            origin_y: 0.0,
            background: Arc::new(background),
        }
    }

    /// Opaque blank background sized for `scale` pixels per point.
    pub fn blank(page_number: u32, width: f32, height: f32, scale: f32) -> Self {
        let (w, h) = raster_size(width, height, scale);
        Self::new(page_number, width, height, RgbaImage::from_pixel(w, h, image::Rgba([255; 4])))
    }

    pub fn bounds(&self) -> Rect {
        Rect::new(0.0, 0.0, self.width, self.height)
    }
}

/// Pixel size of a page raster at `scale` pixels per point.
pub fn raster_size(width: f32, height: f32, scale: f32) -> (u32, u32) {
    let scale = if scale > 0.0 { scale } else { 1.0 };
    ((width * scale).ceil().max(1.0) as u32, (height * scale).ceil().max(1.0) as u32)
}

/// A positioned run of text; the atomic editable text unit.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Word {
    pub id: WordId,
    pub text: String,
    pub x: f32,
    pub y: f32,
    pub width: f32,
    pub height: f32,
    pub font_size: f32,
    pub font_family: String,
    pub color: Color,
    pub page_number: u32,
    pub bold: bool,
    pub italic: bool,
    pub is_edited: bool,
    pub original_text: String,
    pub has_trailing_space: bool,
}

impl Word {
    /// Unedited word with default styling.
    pub fn new(
        id: impl Into<WordId>,
        text: impl Into<String>,
        bounds: Rect,
        page_number: u32,
    ) -> Self {
        let text = text.into();
        Self {
            id: id.into(),
            original_text: text.clone(),
            text,
            x: bounds.x,
            y: bounds.y,
            width: bounds.width,
            height: bounds.height,
            font_size: 12.0,
            font_family: "Helvetica".to_string(),
            color: Color::BLACK,
            page_number,
            bold: false,
            italic: false,
            is_edited: false,
            has_trailing_space: false,
        }
    }

    pub fn with_font(mut self, family: impl Into<String>, size: f32) -> Self {
        self.font_family = family.into();
        self.font_size = size;
        self
    }

    pub fn with_color(mut self, color: Color) -> Self {
        self.color = color;
        self
    }

    pub fn bounds(&self) -> Rect {
        Rect::new(self.x, self.y, self.width, self.height)
    }

    pub fn set_bounds(&mut self, rect: Rect) {
        self.x = rect.x;
        self.y = rect.y;
        self.width = rect.width;
        self.height = rect.height;
    }

    /// True when the word would render nothing.
    pub fn is_blank(&self) -> bool {
        self.text.trim().is_empty()
    }
}

/// Field-wise update for a word; `None` leaves a field unchanged.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct WordPatch {
    pub text: Option<String>,
    pub x: Option<f32>,
    pub y: Option<f32>,
    pub width: Option<f32>,
    pub height: Option<f32>,
    pub font_size: Option<f32>,
    pub font_family: Option<String>,
    pub color: Option<Color>,
    pub bold: Option<bool>,
    pub italic: Option<bool>,
}

impl WordPatch {
    pub fn text(text: impl Into<String>) -> Self {
        Self { text: Some(text.into()), ..Self::default() }
    }

    pub fn position(point: Point) -> Self {
        Self { x: Some(point.x), y: Some(point.y), ..Self::default() }
    }

    pub fn is_empty(&self) -> bool {
        *self == Self::default()
    }

    /// History label describing the patch.
    pub(crate) fn label(&self) -> &'static str {
        let moves_only = self.text.is_none()
            && (self.x.is_some() || self.y.is_some())
            && Self { x: None, y: None, ..self.clone() }.is_empty();
        if self.text.is_some() {
            "Edit text"
        } else if moves_only {
            "Move"
        } else {
            "Edit word"
        }
    }
}

/// Fixed-ratio text measurement used when text is edited.
///
/// Not real shaping: width follows the longest line, height the line count.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TextMetrics {
    pub glyph_width_ratio: f32,
    pub line_height_ratio: f32,
}

impl Default for TextMetrics {
    fn default() -> Self {
        Self { glyph_width_ratio: 0.6, line_height_ratio: 1.2 }
    }
}

impl TextMetrics {
    /// Size of newline-delimited `text` at `font_size`, in the same unit as the size.
    pub fn measure(&self, text: &str, font_size: f32) -> (f32, f32) {
        let lines: Vec<&str> = text.split('\n').collect();
        let longest = lines.iter().map(|l| l.chars().count()).max().unwrap_or(0);
        (
            longest as f32 * font_size * self.glyph_width_ratio,
            lines.len() as f32 * font_size * self.line_height_ratio,
        )
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TextAlign {
    #[default]
    Left,
    Center,
    Right,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ShapeKind {
    Rectangle,
    Circle,
    Triangle,
    Star,
    Arrow,
    Highlight,
}

/// Image bytes or a remote reference the host resolves.
#[derive(Clone, PartialEq)]
pub enum ImageSource {
    Bytes(Arc<Vec<u8>>),
    Url(String),
}

impl ImageSource {
    pub fn bytes(data: Vec<u8>) -> Self {
        Self::Bytes(Arc::new(data))
    }
}

impl fmt::Debug for ImageSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Bytes(data) => write!(f, "Bytes({} bytes)", data.len()),
            Self::Url(url) => f.debug_tuple("Url").field(url).finish(),
        }
    }
}

impl Serialize for ImageSource {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        use serde::ser::SerializeMap;
        let mut map = serializer.serialize_map(Some(1))?;
        match self {
            Self::Bytes(data) => map.serialize_entry("bytes", &data.len())?,
            Self::Url(url) => map.serialize_entry("url", url)?,
        }
        map.end()
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TextContent {
    pub content: String,
    pub font_family: String,
    pub font_size: f32,
    pub color: Color,
    pub align: TextAlign,
    pub bold: bool,
    pub italic: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ImageContent {
    pub source: ImageSource,
    pub opacity: f32,
    /// Payload a generated code (QR) image encodes, if any.
    pub code_payload: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ShapeContent {
    pub kind: ShapeKind,
    pub fill: Option<Color>,
    pub stroke: Option<Color>,
    pub stroke_width: f32,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ElementKind {
    Text(TextContent),
    Image(ImageContent),
    Shape(ShapeContent),
}

impl ElementKind {
    pub fn label(&self) -> &'static str {
        match self {
            Self::Text(_) => "text",
            Self::Image(image) if image.code_payload.is_some() => "code",
            Self::Image(_) => "image",
            Self::Shape(_) => "shape",
        }
    }
}

/// An explicitly added drawable, independent of extracted words.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Element {
    pub id: ElementId,
    pub page_number: u32,
    pub x: f32,
    pub y: f32,
    pub width: f32,
    pub height: f32,
    /// Clockwise degrees around the centre.
    pub rotation: f32,
    pub visible: bool,
    pub locked: bool,
    pub z_index: i32,
    pub kind: ElementKind,
}

impl Element {
    pub fn new(page_number: u32, bounds: Rect, kind: ElementKind) -> Self {
        Self {
            id: ElementId::new(),
            page_number,
            x: bounds.x,
            y: bounds.y,
            width: bounds.width,
            height: bounds.height,
            rotation: 0.0,
            visible: true,
            locked: false,
            z_index: 0,
            kind,
        }
    }

    pub fn text(page_number: u32, bounds: Rect, content: TextContent) -> Self {
        Self::new(page_number, bounds, ElementKind::Text(content))
    }

    pub fn image(page_number: u32, bounds: Rect, content: ImageContent) -> Self {
        Self::new(page_number, bounds, ElementKind::Image(content))
    }

    pub fn shape(page_number: u32, bounds: Rect, content: ShapeContent) -> Self {
        Self::new(page_number, bounds, ElementKind::Shape(content))
    }

    pub fn bounds(&self) -> Rect {
        Rect::new(self.x, self.y, self.width, self.height)
    }

    pub fn set_bounds(&mut self, rect: Rect) {
        self.x = rect.x;
        self.y = rect.y;
        self.width = rect.width;
        self.height = rect.height;
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum LayerType {
    Word,
    Text,
    Image,
    Code,
    Shape,
}

/// Read-only projection of a word or element for a layer panel.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Layer {
    pub id: ItemId,
    pub name: String,
    pub layer_type: LayerType,
    pub visible: bool,
    pub locked: bool,
    pub page_number: u32,
}

impl Layer {
    pub(crate) fn for_word(word: &Word) -> Self {
        Self {
            id: ItemId::Word(word.id.clone()),
            name: word.text.clone(),
            layer_type: LayerType::Word,
            visible: true,
            locked: false,
            page_number: word.page_number,
        }
    }

    pub(crate) fn for_element(element: &Element) -> Self {
        let (name, layer_type) = match &element.kind {
            ElementKind::Text(text) => (text.content.clone(), LayerType::Text),
            ElementKind::Image(image) => match &image.code_payload {
                Some(payload) => (format!("QR: {payload}"), LayerType::Code),
                None => ("Image".to_string(), LayerType::Image),
            },
            ElementKind::Shape(shape) => (format!("{:?}", shape.kind), LayerType::Shape),
        };
        Self {
            id: ItemId::Element(element.id),
            name,
            layer_type,
            visible: element.visible,
            locked: element.locked,
            page_number: element.page_number,
        }
    }
}
