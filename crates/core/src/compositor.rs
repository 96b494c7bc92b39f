//! Turns the session state for one page into an ordered draw list.
//!
//! The list is consumed by an external surface. Order is significant:
//! background, masks, word overlays, elements (bottom to top), selection.

use std::sync::Arc;

use pdf_engine::RgbaImage;
use serde::Serialize;

use crate::config::EditorConfig;
use crate::model::{Color, ElementId, ElementKind, ItemId, Word, WordId};
use crate::session::EditSession;
use crate::transform::{PixelRect, Rect, Viewport};

/// Side of a square resize handle, in pixels.
pub const HANDLE_SIZE: f32 = 8.0;

/// Transient state owned by the interaction controller that the compositor
/// shows without it being committed to the session.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct LivePreview {
    /// Item being edited inline and its current buffer.
    pub editing: Option<(ItemId, String)>,
    /// Item being dragged or resized and its live bounds.
    pub transform: Option<(ItemId, Rect)>,
}

#[derive(Debug, Clone, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum DrawItem {
    Background {
        #[serde(skip)]
        image: Arc<RgbaImage>,
        rect: PixelRect,
    },
    Mask {
        word_id: WordId,
        rect: PixelRect,
        color: Color,
    },
    WordOverlay {
        word_id: WordId,
        text: String,
        rect: PixelRect,
        /// Already multiplied by zoom.
        font_size: f32,
        font_family: String,
        color: Color,
        bold: bool,
        italic: bool,
        editing: bool,
    },
    Element {
        id: ElementId,
        rect: PixelRect,
        rotation: f32,
        locked: bool,
        kind: ElementKind,
        editing: bool,
    },
    SelectionOutline {
        item: ItemId,
        rect: PixelRect,
        handles: Vec<PixelRect>,
    },
}

/// Page-scoped draw instructions in painting order.
#[derive(Debug, Clone, Serialize)]
pub struct DrawList {
    pub page_number: u32,
    pub zoom: f32,
    pub items: Vec<DrawItem>,
}

impl DrawList {
    pub fn masks(&self) -> impl Iterator<Item = &DrawItem> {
        self.items.iter().filter(|i| matches!(i, DrawItem::Mask { .. }))
    }

    pub fn word_overlays(&self) -> impl Iterator<Item = &DrawItem> {
        self.items.iter().filter(|i| matches!(i, DrawItem::WordOverlay { .. }))
    }

    pub fn elements(&self) -> impl Iterator<Item = &DrawItem> {
        self.items.iter().filter(|i| matches!(i, DrawItem::Element { .. }))
    }
}

/// Build the draw list for `page_number`.
///
/// Returns an empty list for an unknown page.
pub fn compose(
    session: &EditSession,
    page_number: u32,
    viewport: &Viewport,
    config: &EditorConfig,
    live: &LivePreview,
) -> DrawList {
    let mut list = DrawList { page_number, zoom: viewport.zoom(), items: Vec::new() };
    let Some(page) = session.page(page_number) else {
        log::warn!("compose: unknown page {page_number}");
        return list;
    };

    list.items.push(DrawItem::Background {
        image: Arc::clone(&page.background),
        rect: viewport.rect_to_viewport(page.bounds()),
    });

    let metrics = config.text_metrics();
    let words: Vec<(Word, bool)> = session
        .get_render_words(page_number)
        .into_iter()
        .filter_map(|mut word| {
            let item = ItemId::Word(word.id.clone());
            let editing = match &live.editing {
                Some((target, buffer)) if *target == item => {
                    if buffer.trim().is_empty() {
                        return None;
                    }
                    let (width, height) = metrics.measure(buffer, word.font_size);
                    word.text = buffer.clone();
                    word.width = width;
                    word.height = height;
                    true
                }
                _ => false,
            };
            if let Some((target, rect)) = &live.transform {
                if *target == item {
                    word.x = rect.x;
                    word.y = rect.y;
                }
            }
            Some((word, editing))
        })
        .collect();

    for (word, _) in &words {
        let current = word.bounds();
        list.items.push(mask(viewport, config, &word.id, current));
        if let Some(original) = session.original_word(&word.id) {
            let original = original.bounds();
            if original != current {
                list.items.push(mask(viewport, config, &word.id, original));
            }
        }
    }

    for (word, editing) in words {
        list.items.push(DrawItem::WordOverlay {
            rect: viewport.rect_to_viewport(word.bounds()),
            font_size: word.font_size * viewport.zoom(),
            word_id: word.id,
            text: word.text,
            font_family: word.font_family,
            color: word.color,
            bold: word.bold,
            italic: word.italic,
            editing,
        });
    }

    for element in session.page_elements(page_number) {
        if !element.visible {
            continue;
        }
        let item = ItemId::Element(element.id);
        let mut bounds = element.bounds();
        if let Some((target, rect)) = &live.transform {
            if *target == item {
                bounds = *rect;
            }
        }
        let mut kind = element.kind.clone();
        let mut editing = false;
        if let (Some((target, buffer)), ElementKind::Text(text)) = (&live.editing, &mut kind) {
            if *target == item {
                text.content = buffer.clone();
                editing = true;
            }
        }
        list.items.push(DrawItem::Element {
            id: element.id,
            rect: viewport.rect_to_viewport(bounds),
            rotation: element.rotation,
            locked: element.locked,
            kind,
            editing,
        });
    }

    if let Some(outline) = selection_outline(session, page_number, viewport, live) {
        list.items.push(outline);
    }

    list
}

fn mask(viewport: &Viewport, config: &EditorConfig, id: &WordId, bounds: Rect) -> DrawItem {
    DrawItem::Mask {
        word_id: id.clone(),
        rect: viewport.rect_to_viewport(bounds.inflate(config.mask_padding)),
        color: config.mask_color,
    }
}

fn selection_outline(
    session: &EditSession,
    page_number: u32,
    viewport: &Viewport,
    live: &LivePreview,
) -> Option<DrawItem> {
    let item = session.selection()?;
    let (mut bounds, resizable) = match item {
        ItemId::Word(id) => {
            let word = session.word(id)?;
            if word.page_number != page_number {
                return None;
            }
            let mut bounds = word.bounds();
            if let Some((ItemId::Word(target), buffer)) = &live.editing {
                if target == id {
                    if buffer.trim().is_empty() {
                        return None;
                    }
                    let (width, height) = session.metrics().measure(buffer, word.font_size);
                    bounds.width = width;
                    bounds.height = height;
                }
            }
            (bounds, false)
        }
        ItemId::Element(id) => {
            let element = session.element(id)?;
            if element.page_number != page_number || !element.visible {
                return None;
            }
            (element.bounds(), !element.locked)
        }
    };
    if let Some((target, rect)) = &live.transform {
        if target == item {
            bounds = *rect;
        }
    }

    let rect = viewport.rect_to_viewport(bounds);
    let handles = if resizable { corner_handles(rect) } else { Vec::new() };
    Some(DrawItem::SelectionOutline { item: item.clone(), rect, handles })
}

/// Handles centred on each corner: top-left, top-right, bottom-left, bottom-right.
pub fn corner_handles(rect: PixelRect) -> Vec<PixelRect> {
    let half = HANDLE_SIZE / 2.0;
    [
        (rect.x, rect.y),
        (rect.x + rect.width, rect.y),
        (rect.x, rect.y + rect.height),
        (rect.x + rect.width, rect.y + rect.height),
    ]
    .into_iter()
    .map(|(x, y)| PixelRect { x: x - half, y: y - half, width: HANDLE_SIZE, height: HANDLE_SIZE })
    .collect()
}
