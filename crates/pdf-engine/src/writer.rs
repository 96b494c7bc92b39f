//! Applies an [`EditPlan`] to a copy of the original document.
//!
//! The original page content is wrapped in `q`/`Q` and a new content stream
//! is appended, so edits always paint above the untouched original. Resource
//! names and object order depend only on the plan, which keeps the output
//! byte-identical across repeated runs.

use std::collections::BTreeMap;
use std::f32::consts::PI;
use std::io::Write;

use flate2::write::ZlibEncoder;
use flate2::Compression;
use lopdf::content::{Content, Operation};
use lopdf::{dictionary, Dictionary, Document, Object, ObjectId, Stream, StringFormat};

use crate::metrics::{StandardFamily, DEFAULT_ASCENT};
use crate::{inherited_attribute, resolve, resolve_dict, EngineError};

/// Cubic Bézier control distance for a quarter ellipse.
const KAPPA: f32 = 0.552_284_8;

/// Inner radius of the star relative to the outer one.
const STAR_INNER_RATIO: f32 = 0.382;

const RESOURCE_PREFIX: &str = "DocOv";

/// Rectangle in PDF user space (y grows upwards).
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PdfRect {
    pub x: f32,
    pub y: f32,
    pub width: f32,
    pub height: f32,
}

impl PdfRect {
    pub fn new(x: f32, y: f32, width: f32, height: f32) -> Self {
        Self { x, y, width, height }
    }

    fn center(&self) -> (f32, f32) {
        (self.x + self.width / 2.0, self.y + self.height / 2.0)
    }

    fn top(&self) -> f32 {
        self.y + self.height
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PathKind {
    Rectangle,
    Ellipse,
    Triangle,
    Star,
    Arrow,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum TextAlign {
    #[default]
    Left,
    Center,
    Right,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ShapeStyle {
    pub fill: Option<[f32; 3]>,
    pub stroke: Option<[f32; 3]>,
    pub stroke_width: f32,
    pub opacity: f32,
}

/// One drawing instruction. Rotations are clockwise degrees as seen on
/// screen, applied around the centre of the op's rectangle.
#[derive(Debug, Clone, PartialEq)]
pub enum DrawOp {
    FillRect {
        rect: PdfRect,
        color: [f32; 3],
    },
    Text {
        rect: PdfRect,
        text: String,
        font_size: f32,
        line_height: f32,
        color: [f32; 3],
        align: TextAlign,
        rotation: f32,
    },
    Image {
        rect: PdfRect,
        data: Vec<u8>,
        opacity: f32,
        rotation: f32,
    },
    Shape {
        kind: PathKind,
        rect: PdfRect,
        style: ShapeStyle,
        rotation: f32,
    },
}

/// Per-page drawing operations to paint over the original document.
#[derive(Debug, Clone, PartialEq)]
pub struct EditPlan {
    base_font: String,
    pages: BTreeMap<u32, Vec<DrawOp>>,
}

impl EditPlan {
    /// `base_font` names the standard Type1 font used for all text ops.
    pub fn new(base_font: impl Into<String>) -> Self {
        Self { base_font: base_font.into(), pages: BTreeMap::new() }
    }

    pub fn push(&mut self, page_index: u32, op: DrawOp) {
        self.pages.entry(page_index).or_default().push(op);
    }

    pub fn page_ops(&self, page_index: u32) -> &[DrawOp] {
        self.pages.get(&page_index).map(Vec::as_slice).unwrap_or(&[])
    }

    pub fn is_empty(&self) -> bool {
        self.pages.values().all(Vec::is_empty)
    }

    pub fn op_count(&self) -> usize {
        self.pages.values().map(Vec::len).sum()
    }
}

/// Reload `original`, paint the plan on top and serialize a new document.
///
/// Either the whole plan is applied or an error is returned; no partially
/// written bytes escape.
pub fn apply_plan(original: &[u8], plan: &EditPlan) -> Result<Vec<u8>, EngineError> {
    let mut doc = Document::load_mem(original).map_err(|err| match err {
        lopdf::Error::Decryption(_) => EngineError::Encrypted,
        other => EngineError::Parse(other),
    })?;
    if doc.trailer.get(b"Encrypt").is_ok() {
        return Err(EngineError::Encrypted);
    }

    let pages = doc.get_pages();
    let page_count = pages.len() as u32;
    let mut font_id: Option<ObjectId> = None;

    for (page_index, ops) in &plan.pages {
        if ops.is_empty() {
            continue;
        }
        let page_id = *pages
            .get(&(page_index + 1))
            .ok_or(EngineError::PageOutOfRange { page: *page_index, page_count })?;

        let mut writer = PageWriter::default();
        for op in ops {
            writer.emit(&mut doc, op, &plan.base_font, &mut font_id)?;
        }
        writer.install(&mut doc, page_id)?;
        log::debug!("page {page_index}: wrote {} edit ops", ops.len());
    }

    let mut output = Vec::new();
    doc.save_to(&mut output).map_err(|err| EngineError::Write(err.to_string()))?;
    Ok(output)
}

#[derive(Default)]
struct PageWriter {
    operations: Vec<Operation>,
    fonts: Vec<(String, ObjectId)>,
    xobjects: Vec<(String, ObjectId)>,
    ext_gstates: Vec<(String, ObjectId)>,
}

impl PageWriter {
    fn emit(
        &mut self,
        doc: &mut Document,
        op: &DrawOp,
        base_font: &str,
        font_id: &mut Option<ObjectId>,
    ) -> Result<(), EngineError> {
        match op {
            DrawOp::FillRect { rect, color } => {
                self.push("q", vec![]);
                self.fill_color(*color);
                self.push("re", rect_operands(rect));
                self.push("f", vec![]);
                self.push("Q", vec![]);
            }
            DrawOp::Text { rect, text, font_size, line_height, color, align, rotation } => {
                let font_name = self.font(doc, base_font, font_id);
                let family = StandardFamily::from_base_font(base_font);

                self.push("q", vec![]);
                self.rotate_about(rect, *rotation);
                self.fill_color(*color);
                self.push("BT", vec![]);
                self.push("Tf", vec![Object::Name(font_name.into_bytes()), (*font_size).into()]);
                for (index, line) in text.split('\n').enumerate() {
                    let encoded = encode_win_ansi(line);
                    let line_width: f32 = encoded
                        .iter()
                        .map(|b| family.width(u32::from(*b)))
                        .sum::<f32>()
                        * font_size
                        / 1000.0;
                    let x = match align {
                        TextAlign::Left => rect.x,
                        TextAlign::Center => rect.x + (rect.width - line_width) / 2.0,
                        TextAlign::Right => rect.x + rect.width - line_width,
                    };
                    let baseline =
                        rect.top() - DEFAULT_ASCENT * font_size - index as f32 * line_height;
                    self.push(
                        "Tm",
                        vec![1.into(), 0.into(), 0.into(), 1.into(), x.into(), baseline.into()],
                    );
                    self.push("Tj", vec![Object::String(encoded, StringFormat::Literal)]);
                }
                self.push("ET", vec![]);
                self.push("Q", vec![]);
            }
            DrawOp::Image { rect, data, opacity, rotation } => {
                let image_id = embed_image(doc, data)?;
                let name = format!("{RESOURCE_PREFIX}Im{}", self.xobjects.len() + 1);
                self.xobjects.push((name.clone(), image_id));

                self.push("q", vec![]);
                self.opacity(doc, *opacity);
                self.rotate_about(rect, *rotation);
                self.push(
                    "cm",
                    vec![
                        rect.width.into(),
                        0.into(),
                        0.into(),
                        rect.height.into(),
                        rect.x.into(),
                        rect.y.into(),
                    ],
                );
                self.push("Do", vec![Object::Name(name.into_bytes())]);
                self.push("Q", vec![]);
            }
            DrawOp::Shape { kind, rect, style, rotation } => {
                self.push("q", vec![]);
                self.opacity(doc, style.opacity);
                self.rotate_about(rect, *rotation);
                if let Some(fill) = style.fill {
                    self.fill_color(fill);
                }
                if let Some(stroke) = style.stroke {
                    self.push("RG", color_operands(stroke));
                    self.push("w", vec![style.stroke_width.max(0.0).into()]);
                }
                self.path(*kind, rect);
                let paint = match (style.fill.is_some(), style.stroke.is_some()) {
                    (true, true) => "B",
                    (true, false) => "f",
                    (false, true) => "S",
                    (false, false) => "n",
                };
                self.push(paint, vec![]);
                self.push("Q", vec![]);
            }
        }
        Ok(())
    }

    fn push(&mut self, operator: &str, operands: Vec<Object>) {
        self.operations.push(Operation::new(operator, operands));
    }

    fn fill_color(&mut self, color: [f32; 3]) {
        self.push("rg", color_operands(color));
    }

    fn font(&mut self, doc: &mut Document, base_font: &str, font_id: &mut Option<ObjectId>) -> String {
        let name = format!("{RESOURCE_PREFIX}F1");
        if self.fonts.is_empty() {
            let id = *font_id.get_or_insert_with(|| {
                doc.add_object(dictionary! {
                    "Type" => "Font",
                    "Subtype" => "Type1",
                    "BaseFont" => Object::Name(base_font.as_bytes().to_vec()),
                    "Encoding" => "WinAnsiEncoding",
                })
            });
            self.fonts.push((name.clone(), id));
        }
        name
    }

    fn opacity(&mut self, doc: &mut Document, opacity: f32) {
        let opacity = opacity.clamp(0.0, 1.0);
        if opacity >= 1.0 {
            return;
        }
        let id = doc.add_object(dictionary! {
            "Type" => "ExtGState",
            "ca" => opacity,
            "CA" => opacity,
        });
        let name = format!("{RESOURCE_PREFIX}Gs{}", self.ext_gstates.len() + 1);
        self.ext_gstates.push((name.clone(), id));
        self.push("gs", vec![Object::Name(name.into_bytes())]);
    }

    fn rotate_about(&mut self, rect: &PdfRect, degrees: f32) {
        if degrees.rem_euclid(360.0) == 0.0 {
            return;
        }
        // Clockwise on screen is counter-clockwise negated in y-up space.
        let theta = -degrees * PI / 180.0;
        let (sin, cos) = theta.sin_cos();
        let (cx, cy) = rect.center();
        self.push(
            "cm",
            vec![
                cos.into(),
                sin.into(),
                (-sin).into(),
                cos.into(),
                (cx - cx * cos + cy * sin).into(),
                (cy - cx * sin - cy * cos).into(),
            ],
        );
    }

    fn path(&mut self, kind: PathKind, rect: &PdfRect) {
        let PdfRect { x, y, width: w, height: h } = *rect;
        match kind {
            PathKind::Rectangle => self.push("re", rect_operands(rect)),
            PathKind::Ellipse => {
                let (cx, cy) = rect.center();
                let (rx, ry) = (w / 2.0, h / 2.0);
                let (ox, oy) = (rx * KAPPA, ry * KAPPA);
                self.push("m", vec![(cx + rx).into(), cy.into()]);
                self.curve([cx + rx, cy + oy, cx + ox, cy + ry, cx, cy + ry]);
                self.curve([cx - ox, cy + ry, cx - rx, cy + oy, cx - rx, cy]);
                self.curve([cx - rx, cy - oy, cx - ox, cy - ry, cx, cy - ry]);
                self.curve([cx + ox, cy - ry, cx + rx, cy - oy, cx + rx, cy]);
                self.push("h", vec![]);
            }
            PathKind::Triangle => {
                self.polygon(&[(x, y), (x + w, y), (x + w / 2.0, y + h)]);
            }
            PathKind::Star => {
                let (cx, cy) = rect.center();
                let points: Vec<(f32, f32)> = (0..10)
                    .map(|i| {
                        let ratio = if i % 2 == 0 { 1.0 } else { STAR_INNER_RATIO };
                        let angle = PI / 2.0 + i as f32 * PI / 5.0;
                        (cx + angle.cos() * w / 2.0 * ratio, cy + angle.sin() * h / 2.0 * ratio)
                    })
                    .collect();
                self.polygon(&points);
            }
            PathKind::Arrow => {
                let shaft_top = y + h * 0.7;
                let shaft_bottom = y + h * 0.3;
                let head_start = x + w * 0.65;
                self.polygon(&[
                    (x, shaft_bottom),
                    (head_start, shaft_bottom),
                    (head_start, y),
                    (x + w, y + h / 2.0),
                    (head_start, y + h),
                    (head_start, shaft_top),
                    (x, shaft_top),
                ]);
            }
        }
    }

    fn curve(&mut self, points: [f32; 6]) {
        self.push("c", points.iter().map(|v| (*v).into()).collect());
    }

    fn polygon(&mut self, points: &[(f32, f32)]) {
        for (index, (px, py)) in points.iter().enumerate() {
            let operator = if index == 0 { "m" } else { "l" };
            self.push(operator, vec![(*px).into(), (*py).into()]);
        }
        self.push("h", vec![]);
    }

    fn install(self, doc: &mut Document, page_id: ObjectId) -> Result<(), EngineError> {
        let mut resources = inherited_attribute(doc, page_id, b"Resources")
            .and_then(|r| resolve_dict(doc, r))
            .cloned()
            .unwrap_or_default();
        merge_resources(doc, &mut resources, b"Font", &self.fonts);
        merge_resources(doc, &mut resources, b"XObject", &self.xobjects);
        merge_resources(doc, &mut resources, b"ExtGState", &self.ext_gstates);

        let existing: Vec<Object> = doc
            .get_dictionary(page_id)?
            .get(b"Contents")
            .ok()
            .map(|contents| match (contents, resolve(doc, contents)) {
                (_, Object::Array(items)) => items.clone(),
                (Object::Reference(id), _) => vec![Object::Reference(*id)],
                _ => Vec::new(),
            })
            .unwrap_or_default();

        let mut overlay = Vec::new();
        let mut contents = Vec::new();
        if !existing.is_empty() {
            let save_id = doc.add_object(Stream::new(dictionary! {}, b"q\n".to_vec()));
            contents.push(Object::Reference(save_id));
            contents.extend(existing);
            overlay.extend_from_slice(b"Q\n");
        }
        let encoded = Content { operations: self.operations }
            .encode()
            .map_err(|err| EngineError::Write(err.to_string()))?;
        overlay.extend_from_slice(&encoded);
        let overlay_id = doc.add_object(Stream::new(dictionary! {}, overlay));
        contents.push(Object::Reference(overlay_id));

        let page = doc.get_object_mut(page_id).and_then(Object::as_dict_mut)?;
        page.set("Contents", Object::Array(contents));
        page.set("Resources", Object::Dictionary(resources));
        Ok(())
    }
}

fn merge_resources(
    doc: &Document,
    resources: &mut Dictionary,
    category: &[u8],
    entries: &[(String, ObjectId)],
) {
    if entries.is_empty() {
        return;
    }
    let mut sub = resources
        .get(category)
        .ok()
        .and_then(|obj| resolve_dict(doc, obj))
        .cloned()
        .unwrap_or_default();
    for (name, id) in entries {
        sub.set(name.as_bytes().to_vec(), Object::Reference(*id));
    }
    resources.set(category.to_vec(), Object::Dictionary(sub));
}

/// Decode raster bytes and add them as an RGB image XObject (plus soft mask).
fn embed_image(doc: &mut Document, data: &[u8]) -> Result<ObjectId, EngineError> {
    let decoded = image::load_from_memory(data).map_err(|err| EngineError::Image(err.to_string()))?;
    let rgb = decoded.to_rgb8();
    let (width, height) = rgb.dimensions();

    let smask = if decoded.color().has_alpha() {
        let alpha: Vec<u8> = decoded.to_rgba8().pixels().map(|p| p.0[3]).collect();
        let id = doc.add_object(Stream::new(
            dictionary! {
                "Type" => "XObject",
                "Subtype" => "Image",
                "Width" => width as i64,
                "Height" => height as i64,
                "ColorSpace" => "DeviceGray",
                "BitsPerComponent" => 8,
                "Filter" => "FlateDecode",
            },
            deflate(&alpha)?,
        ));
        Some(id)
    } else {
        None
    };

    let mut dict = dictionary! {
        "Type" => "XObject",
        "Subtype" => "Image",
        "Width" => width as i64,
        "Height" => height as i64,
        "ColorSpace" => "DeviceRGB",
        "BitsPerComponent" => 8,
        "Filter" => "FlateDecode",
    };
    if let Some(id) = smask {
        dict.set("SMask", Object::Reference(id));
    }
    Ok(doc.add_object(Stream::new(dict, deflate(rgb.as_raw())?)))
}

fn deflate(bytes: &[u8]) -> Result<Vec<u8>, EngineError> {
    let mut encoder = ZlibEncoder::new(Vec::new(), Compression::default());
    encoder.write_all(bytes)?;
    Ok(encoder.finish()?)
}

/// Encode text for a WinAnsi standard font; unmappable characters become `?`.
fn encode_win_ansi(text: &str) -> Vec<u8> {
    text.chars()
        .map(|c| match c as u32 {
            code @ (0x20..=0x7E | 0xA0..=0xFF) => code as u8,
            0x20AC => 0x80,
            0x2026 => 0x85,
            0x2018 => 0x91,
            0x2019 => 0x92,
            0x201C => 0x93,
            0x201D => 0x94,
            0x2022 => 0x95,
            0x2013 => 0x96,
            0x2014 => 0x97,
            0x2122 => 0x99,
            _ => b'?',
        })
        .collect()
}

fn rect_operands(rect: &PdfRect) -> Vec<Object> {
    vec![rect.x.into(), rect.y.into(), rect.width.into(), rect.height.into()]
}

fn color_operands(color: [f32; 3]) -> Vec<Object> {
    color.iter().map(|c| c.clamp(0.0, 1.0).into()).collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::text_pdf;
    use crate::LoadedDocument;
    use std::io::Cursor;

    fn png_bytes(with_alpha: bool) -> Vec<u8> {
        let mut buffer = Vec::new();
        let image = if with_alpha {
            image::DynamicImage::ImageRgba8(image::RgbaImage::from_pixel(
                2,
                2,
                image::Rgba([255, 0, 0, 128]),
            ))
        } else {
            image::DynamicImage::ImageRgb8(image::RgbImage::from_pixel(
                2,
                2,
                image::Rgb([0, 0, 255]),
            ))
        };
        image.write_to(&mut Cursor::new(&mut buffer), image::ImageFormat::Png).unwrap();
        buffer
    }

    fn sample_plan() -> EditPlan {
        let mut plan = EditPlan::new("Helvetica");
        plan.push(
            0,
            DrawOp::FillRect { rect: PdfRect::new(72.0, 690.0, 40.0, 14.0), color: [1.0; 3] },
        );
        plan.push(
            0,
            DrawOp::Text {
                rect: PdfRect::new(72.0, 690.0, 40.0, 14.0),
                text: "Hi there".to_string(),
                font_size: 12.0,
                line_height: 14.4,
                color: [0.0; 3],
                align: TextAlign::Left,
                rotation: 0.0,
            },
        );
        plan.push(
            0,
            DrawOp::Shape {
                kind: PathKind::Star,
                rect: PdfRect::new(200.0, 200.0, 50.0, 50.0),
                style: ShapeStyle {
                    fill: Some([1.0, 0.8, 0.0]),
                    stroke: Some([0.0; 3]),
                    stroke_width: 1.0,
                    opacity: 0.5,
                },
                rotation: 15.0,
            },
        );
        plan
    }

    #[test]
    fn empty_plan_round_trips_text() {
        let original = text_pdf(&[&["Hello world"]]);
        let output = apply_plan(&original, &EditPlan::new("Helvetica")).unwrap();

        let page = LoadedDocument::load(&output).unwrap().extract_page(0).unwrap();
        let texts: Vec<&str> = page.words.iter().map(|w| w.text.as_str()).collect();
        assert_eq!(texts, vec!["Hello", "world"]);
    }

    #[test]
    fn applying_the_same_plan_twice_is_byte_identical() {
        let original = text_pdf(&[&["Hello"]]);
        let plan = sample_plan();

        let first = apply_plan(&original, &plan).unwrap();
        let second = apply_plan(&original, &plan).unwrap();
        assert_eq!(first, second);
    }

    #[test]
    fn drawn_text_is_extractable_above_original() {
        let original = text_pdf(&[&["Hello"]]);
        let output = apply_plan(&original, &sample_plan()).unwrap();

        let page = LoadedDocument::load(&output).unwrap().extract_page(0).unwrap();
        let texts: Vec<&str> = page.words.iter().map(|w| w.text.as_str()).collect();
        assert_eq!(texts, vec!["Hello", "Hi", "there"]);
        // Overlay text starts at the rect's left edge.
        assert!((page.words[1].x - 72.0).abs() < 1e-3);
    }

    #[test]
    fn overlay_registers_resources_without_dropping_originals() {
        let original = text_pdf(&[&["Hello"]]);
        let output = apply_plan(&original, &sample_plan()).unwrap();

        let doc = Document::load_mem(&output).unwrap();
        let page_id = *doc.get_pages().get(&1).unwrap();
        let page = doc.get_dictionary(page_id).unwrap();
        let resources = page.get(b"Resources").unwrap().as_dict().unwrap();
        let fonts = resources.get(b"Font").unwrap().as_dict().unwrap();
        assert!(fonts.has(b"F1"));
        assert!(fonts.has(b"DocOvF1"));
        let gstates = resources.get(b"ExtGState").unwrap().as_dict().unwrap();
        assert!(gstates.has(b"DocOvGs1"));

        let contents = page.get(b"Contents").unwrap().as_array().unwrap();
        assert_eq!(contents.len(), 3);
    }

    #[test]
    fn embeds_png_with_soft_mask() {
        let original = text_pdf(&[&["Hello"]]);
        let mut plan = EditPlan::new("Helvetica");
        plan.push(
            0,
            DrawOp::Image {
                rect: PdfRect::new(10.0, 10.0, 20.0, 20.0),
                data: png_bytes(true),
                opacity: 1.0,
                rotation: 0.0,
            },
        );
        let output = apply_plan(&original, &plan).unwrap();

        let doc = Document::load_mem(&output).unwrap();
        let page_id = *doc.get_pages().get(&1).unwrap();
        let resources =
            doc.get_dictionary(page_id).unwrap().get(b"Resources").unwrap().as_dict().unwrap();
        let xobjects = resources.get(b"XObject").unwrap().as_dict().unwrap();
        let image_id = xobjects.get(b"DocOvIm1").unwrap().as_reference().unwrap();
        let image = doc.get_object(image_id).unwrap().as_stream().unwrap();
        assert!(image.dict.has(b"SMask"));
        assert_eq!(image.dict.get(b"Width").unwrap().as_i64().unwrap(), 2);
    }

    #[test]
    fn opaque_png_has_no_soft_mask() {
        let mut doc = Document::load_mem(&text_pdf(&[&["x"]])).unwrap();
        let id = embed_image(&mut doc, &png_bytes(false)).unwrap();
        let stream = doc.get_object(id).unwrap().as_stream().unwrap();
        assert!(!stream.dict.has(b"SMask"));
    }

    #[test]
    fn undecodable_image_fails_without_output() {
        let original = text_pdf(&[&["Hello"]]);
        let mut plan = EditPlan::new("Helvetica");
        plan.push(
            0,
            DrawOp::Image {
                rect: PdfRect::new(0.0, 0.0, 10.0, 10.0),
                data: b"not an image".to_vec(),
                opacity: 1.0,
                rotation: 0.0,
            },
        );
        assert!(matches!(apply_plan(&original, &plan), Err(EngineError::Image(_))));
    }

    #[test]
    fn plan_for_missing_page_is_rejected() {
        let original = text_pdf(&[&["Hello"]]);
        let mut plan = EditPlan::new("Helvetica");
        plan.push(4, DrawOp::FillRect { rect: PdfRect::new(0.0, 0.0, 1.0, 1.0), color: [0.0; 3] });
        assert!(matches!(
            apply_plan(&original, &plan),
            Err(EngineError::PageOutOfRange { page: 4, page_count: 1 })
        ));
    }

    #[test]
    fn win_ansi_encoding_replaces_unmappable_characters() {
        assert_eq!(encode_win_ansi("Café"), vec![b'C', b'a', b'f', 0xE9]);
        assert_eq!(encode_win_ansi("a\u{2014}b"), vec![b'a', 0x97, b'b']);
        assert_eq!(encode_win_ansi("日本"), b"??".to_vec());
    }
}
