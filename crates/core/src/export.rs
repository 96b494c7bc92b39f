//! Re-serialisation of the original document with the session's edits.
//!
//! Planning reads the session and is cheap; applying the plan reloads the
//! original bytes and can run on a worker thread.

use pdf_engine::{DrawOp, EditPlan, PageSize, PathKind, PdfRect, ShapeStyle};
use serde::Serialize;

use crate::config::EditorConfig;
use crate::error::{EditorError, Result};
use crate::model::{Element, ElementKind, ImageSource, Page, ShapeKind, TextAlign};
use crate::session::EditSession;
use crate::transform::Rect;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
pub struct ExportManifest {
    pub edited_word_count: usize,
    pub added_element_count: usize,
}

#[derive(Debug, Clone)]
pub struct ExportOutput {
    pub bytes: Vec<u8>,
    pub manifest: ExportManifest,
}

/// Collect the drawing operations that reproduce the session on top of the
/// original pages.
///
/// Per page: covers over every changed word's original box, then the
/// replacement text, then visible elements bottom to top.
pub fn build_plan(session: &EditSession, config: &EditorConfig) -> (EditPlan, ExportManifest) {
    let mut plan = EditPlan::new(config.export_font.clone());
    let mut manifest = ExportManifest::default();
    let edits = session.word_edits();
    manifest.edited_word_count = edits.len();

    for page in session.pages() {
        let Some(page_index) = page.page_number.checked_sub(1) else {
            log::warn!("skipping page numbered 0 in export plan");
            continue;
        };

        for original in edits.iter().filter_map(|e| e.original) {
            if original.page_number == page.page_number {
                plan.push(
                    page_index,
                    DrawOp::FillRect {
                        rect: pdf_rect(page, original.bounds().inflate(config.mask_padding)),
                        color: config.cover_color.to_array(),
                    },
                );
            }
        }

        for word in edits.iter().filter_map(|e| e.current) {
            if word.page_number != page.page_number || word.is_blank() {
                continue;
            }
            plan.push(
                page_index,
                DrawOp::Text {
                    rect: pdf_rect(page, word.bounds()),
                    text: word.text.clone(),
                    font_size: word.font_size,
                    line_height: word.font_size * config.line_height_ratio,
                    color: config.export_text_color.to_array(),
                    align: pdf_engine::TextAlign::Left,
                    rotation: 0.0,
                },
            );
        }

        for element in session.page_elements(page.page_number) {
            if !element.visible {
                continue;
            }
            if let Some(op) = element_op(page, element, config) {
                plan.push(page_index, op);
                manifest.added_element_count += 1;
            }
        }
    }

    log::debug!(
        "export plan: {} ops, {} edited words, {} elements",
        plan.op_count(),
        manifest.edited_word_count,
        manifest.added_element_count
    );
    (plan, manifest)
}

/// Apply a prepared plan to the original bytes.
pub fn render(original: &[u8], plan: &EditPlan, manifest: ExportManifest) -> Result<ExportOutput> {
    let bytes = pdf_engine::apply_plan(original, plan).map_err(EditorError::from_export)?;
    Ok(ExportOutput { bytes, manifest })
}

/// Plan and apply in one step.
pub fn export(original: &[u8], session: &EditSession, config: &EditorConfig) -> Result<ExportOutput> {
    let (plan, manifest) = build_plan(session, config);
    render(original, &plan, manifest)
}

fn element_op(page: &Page, element: &Element, config: &EditorConfig) -> Option<DrawOp> {
    let rect = pdf_rect(page, element.bounds());
    let rotation = element.rotation;
    let op = match &element.kind {
        ElementKind::Text(text) => {
            if text.content.trim().is_empty() {
                return None;
            }
            DrawOp::Text {
                rect,
                text: text.content.clone(),
                font_size: text.font_size,
                line_height: text.font_size * config.line_height_ratio,
                color: text.color.to_array(),
                align: match text.align {
                    TextAlign::Left => pdf_engine::TextAlign::Left,
                    TextAlign::Center => pdf_engine::TextAlign::Center,
                    TextAlign::Right => pdf_engine::TextAlign::Right,
                },
                rotation,
            }
        }
        ElementKind::Image(image) => match &image.source {
            ImageSource::Bytes(data) => DrawOp::Image {
                rect,
                data: data.as_ref().clone(),
                opacity: image.opacity.clamp(0.0, 1.0),
                rotation,
            },
            ImageSource::Url(url) => {
                log::warn!("export: image {} references {url}, skipping unresolved source", element.id);
                return None;
            }
        },
        ElementKind::Shape(shape) => {
            let (kind, style) = match shape.kind {
                ShapeKind::Highlight => (
                    PathKind::Rectangle,
                    ShapeStyle {
                        fill: Some(
                            shape.fill.unwrap_or(config.element_defaults.highlight_color).to_array(),
                        ),
                        stroke: None,
                        stroke_width: 0.0,
                        opacity: config.element_defaults.highlight_opacity,
                    },
                ),
                other => (
                    match other {
                        ShapeKind::Circle => PathKind::Ellipse,
                        ShapeKind::Triangle => PathKind::Triangle,
                        ShapeKind::Star => PathKind::Star,
                        ShapeKind::Arrow => PathKind::Arrow,
                        ShapeKind::Rectangle | ShapeKind::Highlight => PathKind::Rectangle,
                    },
                    ShapeStyle {
                        fill: shape.fill.map(|c| c.to_array()),
                        stroke: shape.stroke.map(|c| c.to_array()),
                        stroke_width: shape.stroke_width,
                        opacity: 1.0,
                    },
                ),
            };
            if style.fill.is_none() && style.stroke.is_none() {
                return None;
            }
            DrawOp::Shape { kind, rect, style, rotation }
        }
    };
    Some(op)
}

/// Top-left page rectangle to the page's native user space.
fn pdf_rect(page: &Page, rect: Rect) -> PdfRect {
    let size = PageSize {
        width_pt: page.width,
        height_pt: page.height,
        origin_x: page.origin_x,
        origin_y: page.origin_y,
    };
    let (x, top) = size.to_user_space(rect.x, rect.y);
    PdfRect::new(x, top - rect.height, rect.width, rect.height)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{Color, ImageContent, ShapeContent, Word, WordId, WordPatch};
    use pdf_engine::test_support::text_pdf;
    use crate::transform::Point;

    fn session() -> EditSession {
        let mut session = EditSession::default();
        session.seed(
            vec![Page::blank(1, 612.0, 792.0, 0.1)],
            vec![
                Word::new("w1", "Hello", Rect::new(72.0, 82.4, 28.0, 12.0), 1),
                Word::new("w2", "world", Rect::new(103.0, 82.4, 28.0, 12.0), 1),
            ],
        );
        session
    }

    fn shape(kind: ShapeKind, fill: Option<Color>) -> Element {
        Element::shape(
            1,
            Rect::new(10.0, 10.0, 50.0, 50.0),
            ShapeContent { kind, fill, stroke: None, stroke_width: 1.0 },
        )
    }

    #[test]
    fn rect_conversion_flips_to_user_space() {
        let mut page = Page::blank(1, 612.0, 792.0, 0.1);
        assert_eq!(pdf_rect(&page, Rect::new(10.0, 20.0, 30.0, 40.0)), PdfRect::new(10.0, 732.0, 30.0, 40.0));

        page.origin_x = 5.0;
        page.origin_y = 10.0;
        assert_eq!(pdf_rect(&page, Rect::new(0.0, 0.0, 1.0, 2.0)), PdfRect::new(5.0, 800.0, 1.0, 2.0));
    }

    #[test]
    fn unedited_session_has_an_empty_plan() {
        let (plan, manifest) = build_plan(&session(), &EditorConfig::default());
        assert!(plan.is_empty());
        assert_eq!(manifest, ExportManifest::default());
    }

    #[test]
    fn covers_precede_replacement_text() {
        let mut s = session();
        s.update_word(&WordId::from("w1"), WordPatch::text("Hi"));
        s.delete_word(&WordId::from("w2"));
        s.add_word(1, "New", Point::new(300.0, 300.0), 10.0, Color::BLACK);

        let (plan, manifest) = build_plan(&s, &EditorConfig::default());
        let kinds: Vec<&str> = plan
            .page_ops(0)
            .iter()
            .map(|op| match op {
                DrawOp::FillRect { .. } => "cover",
                DrawOp::Text { .. } => "text",
                DrawOp::Image { .. } => "image",
                DrawOp::Shape { .. } => "shape",
            })
            .collect();
        assert_eq!(kinds, ["cover", "cover", "text", "text"]);
        assert_eq!(manifest.edited_word_count, 3);

        let DrawOp::Text { text, .. } = &plan.page_ops(0)[2] else { unreachable!() };
        assert_eq!(text, "Hi");
    }

    #[test]
    fn page_numbered_zero_is_skipped() {
        let mut s = EditSession::default();
        s.seed(
            vec![Page::blank(0, 612.0, 792.0, 0.1), Page::blank(1, 612.0, 792.0, 0.1)],
            vec![Word::new("w0", "Stray", Rect::new(72.0, 82.4, 28.0, 12.0), 0)],
        );
        s.update_word(&WordId::from("w0"), WordPatch::text("Gone"));
        let mut stray = shape(ShapeKind::Rectangle, Some(Color::BLUE));
        stray.page_number = 0;
        s.add_element(stray);
        s.add_element(shape(ShapeKind::Circle, Some(Color::BLUE)));

        let (plan, manifest) = build_plan(&s, &EditorConfig::default());
        assert_eq!(plan.op_count(), 1);
        assert!(matches!(plan.page_ops(0)[0], DrawOp::Shape { kind: PathKind::Ellipse, .. }));
        assert_eq!(manifest.edited_word_count, 1);
    }

    #[test]
    fn highlight_exports_as_translucent_rectangle() {
        let mut s = session();
        s.add_element(shape(ShapeKind::Highlight, None));
        s.add_element(shape(ShapeKind::Circle, Some(Color::BLUE)));

        let (plan, manifest) = build_plan(&s, &EditorConfig::default());
        assert_eq!(manifest.added_element_count, 2);
        match &plan.page_ops(0)[0] {
            DrawOp::Shape { kind: PathKind::Rectangle, style, .. } => {
                assert_eq!(style.opacity, 0.35);
                assert!(style.fill.is_some());
            }
            other => panic!("unexpected op {other:?}"),
        }
        assert!(matches!(plan.page_ops(0)[1], DrawOp::Shape { kind: PathKind::Ellipse, .. }));
    }

    #[test]
    fn hidden_and_unresolved_elements_are_not_exported() {
        let mut s = session();
        let mut hidden = shape(ShapeKind::Rectangle, Some(Color::BLUE));
        hidden.visible = false;
        s.add_element(hidden);
        s.add_element(Element::image(
            1,
            Rect::new(0.0, 0.0, 10.0, 10.0),
            ImageContent {
                source: ImageSource::Url("https://example.com/logo.png".into()),
                opacity: 1.0,
                code_payload: None,
            },
        ));

        let (plan, manifest) = build_plan(&s, &EditorConfig::default());
        assert!(plan.is_empty());
        assert_eq!(manifest.added_element_count, 0);
    }

    #[test]
    fn undecodable_image_fails_without_output() {
        let original = text_pdf(&[&["Hello world"]]);
        let mut s = session();
        s.add_element(Element::image(
            1,
            Rect::new(0.0, 0.0, 10.0, 10.0),
            ImageContent { source: ImageSource::bytes(vec![0, 1, 2]), opacity: 1.0, code_payload: None },
        ));

        let err = export(&original, &s, &EditorConfig::default()).unwrap_err();
        assert!(matches!(err, EditorError::Export(_)));
    }

    #[test]
    fn repeated_export_is_byte_identical() {
        let original = text_pdf(&[&["Hello world"]]);
        let mut s = session();
        s.update_word(&WordId::from("w1"), WordPatch::text("Hi"));
        s.add_element(shape(ShapeKind::Star, Some(Color::YELLOW)));

        let first = export(&original, &s, &EditorConfig::default()).unwrap();
        let second = export(&original, &s, &EditorConfig::default()).unwrap();
        assert_eq!(first.bytes, second.bytes);
        assert_eq!(first.manifest, ExportManifest { edited_word_count: 1, added_element_count: 1 });
    }

    #[test]
    fn unreadable_original_is_an_export_error() {
        let err = export(b"garbage", &session(), &EditorConfig::default()).unwrap_err();
        assert_eq!(err.category(), crate::error::ErrorCategory::Export);
    }
}
