//! Pointer and keyboard handling for the editing surface.
//!
//! The controller owns the viewport, the active tool and all transient
//! gesture state (drag origin, live bounds, inline edit buffer). That state
//! is shown through [`LivePreview`] and reaches the session only when a
//! gesture commits, as a single mutation.

use std::sync::Arc;

use crate::compositor::{self, corner_handles, DrawList, LivePreview};
use crate::config::{EditorConfig, ElementDefaults};
use crate::model::{
    Element, ElementId, ElementKind, ImageContent, ImageSource, ItemId, ShapeContent, ShapeKind,
    TextAlign, TextContent, WordPatch,
};
use crate::session::EditSession;
use crate::transform::{Pixel, Point, Rect, Viewport};

/// Smallest width or height an element can be resized to, in points.
const MIN_ELEMENT_SIZE: f32 = 4.0;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Tool {
    #[default]
    Select,
    Text,
    Shape(ShapeKind),
    Image,
    Qr,
    Highlight,
}

/// Produces an encoded raster (PNG) for a code payload such as a URL.
pub trait CodeGenerator: Send + Sync {
    fn generate(&self, payload: &str) -> Result<Vec<u8>, String>;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Key {
    Enter,
    Escape,
    Delete,
    Backspace,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Modifiers {
    pub ctrl: bool,
    pub meta: bool,
    pub shift: bool,
    pub alt: bool,
}

impl Modifiers {
    pub const NONE: Modifiers = Modifiers { ctrl: false, meta: false, shift: false, alt: false };
    pub const CTRL: Modifiers = Modifiers { ctrl: true, meta: false, shift: false, alt: false };

    fn command(&self) -> bool {
        self.ctrl || self.meta
    }
}

/// What a pointer press did.
#[derive(Debug, Clone, PartialEq)]
pub enum PointerOutcome {
    Ignored,
    Selected(Option<ItemId>),
    Created(ElementId),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Corner {
    TopLeft,
    TopRight,
    BottomLeft,
    BottomRight,
}

const CORNERS: [Corner; 4] = [Corner::TopLeft, Corner::TopRight, Corner::BottomLeft, Corner::BottomRight];

#[derive(Debug, Clone, Copy, PartialEq)]
enum DragKind {
    Move,
    Resize(Corner),
}

#[derive(Debug, Clone)]
struct DragState {
    item: ItemId,
    kind: DragKind,
    start: Pixel,
    origin: Rect,
    current: Rect,
}

#[derive(Debug, Clone)]
struct EditState {
    item: ItemId,
    original: String,
    buffer: String,
}

pub struct InteractionController {
    viewport: Viewport,
    tool: Tool,
    drag: Option<DragState>,
    edit: Option<EditState>,
    pending_image: Option<ImageSource>,
    pending_code: Option<String>,
    code_generator: Option<Arc<dyn CodeGenerator>>,
    defaults: ElementDefaults,
    hit_tolerance: f32,
}

impl std::fmt::Debug for InteractionController {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("InteractionController")
            .field("viewport", &self.viewport)
            .field("tool", &self.tool)
            .field("dragging", &self.drag.is_some())
            .field("editing", &self.edit.is_some())
            .finish()
    }
}

impl InteractionController {
    pub fn new(config: &EditorConfig) -> Self {
        Self {
            viewport: Viewport::new(config.min_zoom, config.max_zoom),
            tool: Tool::Select,
            drag: None,
            edit: None,
            pending_image: None,
            pending_code: None,
            code_generator: None,
            defaults: config.element_defaults.clone(),
            hit_tolerance: config.hit_tolerance,
        }
    }

    pub fn viewport(&self) -> &Viewport {
        &self.viewport
    }

    pub fn viewport_mut(&mut self) -> &mut Viewport {
        &mut self.viewport
    }

    pub fn tool(&self) -> Tool {
        self.tool
    }

    pub fn set_tool(&mut self, tool: Tool) {
        self.drag = None;
        self.tool = tool;
    }

    /// Image used by the next click with [`Tool::Image`].
    pub fn set_pending_image(&mut self, source: ImageSource) {
        self.pending_image = Some(source);
    }

    /// Payload encoded by the next click with [`Tool::Qr`].
    pub fn set_pending_code(&mut self, payload: impl Into<String>) {
        self.pending_code = Some(payload.into());
    }

    pub fn set_code_generator(&mut self, generator: Arc<dyn CodeGenerator>) {
        self.code_generator = Some(generator);
    }

    pub fn is_dragging(&self) -> bool {
        self.drag.is_some()
    }

    pub fn is_editing(&self) -> bool {
        self.edit.is_some()
    }

    /// Topmost item under `point` on the current page. Elements rank above words.
    pub fn hit_test(&self, session: &EditSession, point: Point) -> Option<ItemId> {
        let page = session.current_page();
        let element = session
            .page_elements(page)
            .into_iter()
            .rev()
            .filter(|e| e.visible)
            .find(|e| e.bounds().inflate(self.hit_tolerance).contains(point))
            .map(|e| ItemId::Element(e.id));
        element.or_else(|| {
            session
                .get_render_words(page)
                .into_iter()
                .rev()
                .find(|w| w.bounds().inflate(self.hit_tolerance).contains(point))
                .map(|w| ItemId::Word(w.id))
        })
    }

    pub fn pointer_down(&mut self, session: &mut EditSession, pixel: Pixel) -> PointerOutcome {
        let point = self.viewport.to_document(pixel);

        if let Some(edit) = &self.edit {
            if self.hit_test(session, point).as_ref() == Some(&edit.item) {
                return PointerOutcome::Ignored;
            }
            self.commit_edit(session);
        }

        if self.tool != Tool::Select {
            return match self.create_element(session, point) {
                Some(id) => PointerOutcome::Created(id),
                None => PointerOutcome::Ignored,
            };
        }

        if let Some((id, corner)) = self.handle_at(session, pixel) {
            if let Some(element) = session.element(&id) {
                let bounds = element.bounds();
                self.drag = Some(DragState {
                    item: ItemId::Element(id),
                    kind: DragKind::Resize(corner),
                    start: pixel,
                    origin: bounds,
                    current: bounds,
                });
                return PointerOutcome::Selected(Some(ItemId::Element(id)));
            }
        }

        let hit = self.hit_test(session, point);
        session.select(hit.clone());
        if let Some(item) = &hit {
            if let Some((bounds, locked)) = item_bounds(session, item) {
                if !locked {
                    self.drag = Some(DragState {
                        item: item.clone(),
                        kind: DragKind::Move,
                        start: pixel,
                        origin: bounds,
                        current: bounds,
                    });
                }
            }
        }
        PointerOutcome::Selected(hit)
    }

    /// Update the live drag. Nothing is written to the session.
    pub fn pointer_move(&mut self, pixel: Pixel) -> bool {
        let zoom = self.viewport.zoom();
        let Some(drag) = self.drag.as_mut() else {
            return false;
        };
        let dx = (pixel.x - drag.start.x) / zoom;
        let dy = (pixel.y - drag.start.y) / zoom;
        drag.current = match drag.kind {
            DragKind::Move => drag.origin.translate(dx, dy),
            DragKind::Resize(corner) => resize(drag.origin, corner, dx, dy),
        };
        true
    }

    /// Finish the drag, committing it as one history entry.
    pub fn pointer_up(&mut self, session: &mut EditSession, pixel: Pixel) -> bool {
        if self.drag.is_none() {
            return false;
        }
        self.pointer_move(pixel);
        let Some(drag) = self.drag.take() else {
            return false;
        };
        if drag.current == drag.origin {
            return false;
        }
        let rect = drag.current;
        match (&drag.item, drag.kind) {
            (ItemId::Word(id), _) => {
                session.update_word(id, WordPatch::position(Point::new(rect.x, rect.y)))
            }
            (ItemId::Element(id), DragKind::Move) => {
                session.update_element_as("Move", id, |e| {
                    e.x = rect.x;
                    e.y = rect.y;
                })
            }
            (ItemId::Element(id), DragKind::Resize(_)) => {
                session.update_element_as("Resize", id, |e| e.set_bounds(rect))
            }
        }
    }

    /// Open inline editing on a word or text element.
    pub fn double_click(&mut self, session: &mut EditSession, pixel: Pixel) -> bool {
        self.drag = None;
        let point = self.viewport.to_document(pixel);
        match self.hit_test(session, point) {
            Some(item) => self.begin_edit(session, item),
            None => false,
        }
    }

    pub fn begin_edit(&mut self, session: &mut EditSession, item: ItemId) -> bool {
        let text = match &item {
            ItemId::Word(id) => session.word(id).map(|w| w.text.clone()),
            ItemId::Element(id) => match session.element(id) {
                Some(Element { locked: false, kind: ElementKind::Text(text), .. }) => {
                    Some(text.content.clone())
                }
                _ => None,
            },
        };
        let Some(text) = text else {
            return false;
        };
        if let Some(previous) = self.edit.as_ref().map(|e| e.item.clone()) {
            if previous != item {
                self.commit_edit(session);
            }
        }
        session.select(Some(item.clone()));
        self.edit = Some(EditState { item, original: text.clone(), buffer: text });
        true
    }

    pub fn edit_buffer(&self) -> Option<&str> {
        self.edit.as_ref().map(|e| e.buffer.as_str())
    }

    pub fn set_edit_buffer(&mut self, text: impl Into<String>) -> bool {
        match self.edit.as_mut() {
            Some(edit) => {
                edit.buffer = text.into();
                true
            }
            None => false,
        }
    }

    pub fn insert_text(&mut self, text: &str) -> bool {
        match self.edit.as_mut() {
            Some(edit) => {
                edit.buffer.push_str(text);
                true
            }
            None => false,
        }
    }

    /// Write the edit buffer to the session. Unchanged text records nothing.
    pub fn commit_edit(&mut self, session: &mut EditSession) -> bool {
        let Some(edit) = self.edit.take() else {
            return false;
        };
        if edit.buffer == edit.original {
            return false;
        }
        match &edit.item {
            ItemId::Word(id) => session.update_word(id, WordPatch::text(edit.buffer)),
            ItemId::Element(id) if edit.buffer.trim().is_empty() => session.remove_element(id),
            ItemId::Element(id) => session.update_element_as("Edit text", id, |e| {
                if let ElementKind::Text(text) = &mut e.kind {
                    text.content = edit.buffer;
                }
            }),
        }
    }

    /// Drop the edit buffer; the session is left exactly as before the edit.
    pub fn cancel_edit(&mut self) -> bool {
        self.edit.take().is_some()
    }

    pub fn key_down(&mut self, session: &mut EditSession, key: Key, modifiers: Modifiers) -> bool {
        if self.edit.is_some() {
            return match key {
                Key::Enter if modifiers.command() => {
                    self.commit_edit(session);
                    true
                }
                Key::Escape => self.cancel_edit(),
                _ => false,
            };
        }
        if self.drag.is_some() {
            if key == Key::Escape {
                log::debug!("drag cancelled");
                self.drag = None;
                return true;
            }
            return false;
        }
        match key {
            Key::Delete | Key::Backspace => self.delete_selection(session),
            Key::Escape if self.tool != Tool::Select => {
                self.tool = Tool::Select;
                true
            }
            Key::Escape => session.select(None),
            Key::Enter => false,
        }
    }

    pub fn delete_selection(&mut self, session: &mut EditSession) -> bool {
        match session.selection().cloned() {
            Some(ItemId::Word(id)) => session.delete_word(&id),
            Some(ItemId::Element(id)) => session.remove_element(&id),
            None => false,
        }
    }

    pub fn live_preview(&self) -> LivePreview {
        LivePreview {
            editing: self.edit.as_ref().map(|e| (e.item.clone(), e.buffer.clone())),
            transform: self.drag.as_ref().map(|d| (d.item.clone(), d.current)),
        }
    }

    /// Draw list for the session's current page with live gesture state applied.
    pub fn compose(&self, session: &EditSession, config: &EditorConfig) -> DrawList {
        compositor::compose(
            session,
            session.current_page(),
            &self.viewport,
            config,
            &self.live_preview(),
        )
    }

    fn create_element(&mut self, session: &mut EditSession, point: Point) -> Option<ElementId> {
        let page = session.current_page();
        let d = &self.defaults;
        let element = match self.tool {
            Tool::Select => return None,
            Tool::Text => Element::text(
                page,
                Rect::new(point.x, point.y, d.text_width, d.text_height),
                TextContent {
                    content: d.text_content.clone(),
                    font_family: "Helvetica".to_string(),
                    font_size: d.text_font_size,
                    color: d.text_color,
                    align: TextAlign::Left,
                    bold: false,
                    italic: false,
                },
            ),
            Tool::Shape(ShapeKind::Highlight) | Tool::Highlight => highlight(page, point, d),
            Tool::Shape(kind) => Element::shape(
                page,
                Rect::new(point.x, point.y, d.shape_width, d.shape_height),
                ShapeContent {
                    kind,
                    fill: Some(d.shape_fill),
                    stroke: Some(d.shape_stroke),
                    stroke_width: d.shape_stroke_width,
                },
            ),
            Tool::Image => {
                let Some(source) = self.pending_image.take() else {
                    log::warn!("image tool used without a pending image");
                    return None;
                };
                Element::image(
                    page,
                    Rect::new(point.x, point.y, d.image_width, d.image_height),
                    ImageContent { source, opacity: 1.0, code_payload: None },
                )
            }
            Tool::Qr => {
                let (Some(payload), Some(generator)) = (&self.pending_code, &self.code_generator)
                else {
                    log::warn!("code tool used without a payload or generator");
                    return None;
                };
                let bytes = match generator.generate(payload) {
                    Ok(bytes) => bytes,
                    Err(reason) => {
                        log::warn!("code generation failed: {reason}");
                        return None;
                    }
                };
                Element::image(
                    page,
                    Rect::new(point.x, point.y, d.code_size, d.code_size),
                    ImageContent {
                        source: ImageSource::bytes(bytes),
                        opacity: 1.0,
                        code_payload: Some(payload.clone()),
                    },
                )
            }
        };

        let id = session.add_element(element)?;
        session.select(Some(ItemId::Element(id)));
        self.tool = Tool::Select;
        Some(id)
    }

    /// Resize handle of the selected element under `pixel`, if any.
    fn handle_at(&self, session: &EditSession, pixel: Pixel) -> Option<(ElementId, Corner)> {
        let Some(ItemId::Element(id)) = session.selection() else {
            return None;
        };
        let element = session.element(id)?;
        if element.locked || !element.visible || element.page_number != session.current_page() {
            return None;
        }
        let rect = self.viewport.rect_to_viewport(element.bounds());
        corner_handles(rect)
            .into_iter()
            .zip(CORNERS)
            .find(|(handle, _)| {
                pixel.x >= handle.x
                    && pixel.x <= handle.x + handle.width
                    && pixel.y >= handle.y
                    && pixel.y <= handle.y + handle.height
            })
            .map(|(_, corner)| (*id, corner))
    }
}

fn highlight(page: u32, point: Point, d: &ElementDefaults) -> Element {
    Element::shape(
        page,
        Rect::new(point.x, point.y, d.highlight_width, d.highlight_height),
        ShapeContent {
            kind: ShapeKind::Highlight,
            fill: Some(d.highlight_color),
            stroke: None,
            stroke_width: 0.0,
        },
    )
}

fn item_bounds(session: &EditSession, item: &ItemId) -> Option<(Rect, bool)> {
    match item {
        ItemId::Word(id) => session.word(id).map(|w| (w.bounds(), false)),
        ItemId::Element(id) => session.element(id).map(|e| (e.bounds(), e.locked)),
    }
}

fn resize(origin: Rect, corner: Corner, dx: f32, dy: f32) -> Rect {
    let (mut left, mut top, mut right, mut bottom) =
        (origin.x, origin.y, origin.right(), origin.bottom());
    match corner {
        Corner::TopLeft => {
            left = (left + dx).min(right - MIN_ELEMENT_SIZE);
            top = (top + dy).min(bottom - MIN_ELEMENT_SIZE);
        }
        Corner::TopRight => {
            right = (right + dx).max(left + MIN_ELEMENT_SIZE);
            top = (top + dy).min(bottom - MIN_ELEMENT_SIZE);
        }
        Corner::BottomLeft => {
            left = (left + dx).min(right - MIN_ELEMENT_SIZE);
            bottom = (bottom + dy).max(top + MIN_ELEMENT_SIZE);
        }
        Corner::BottomRight => {
            right = (right + dx).max(left + MIN_ELEMENT_SIZE);
            bottom = (bottom + dy).max(top + MIN_ELEMENT_SIZE);
        }
    }
    Rect::new(left, top, right - left, bottom - top)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{Page, Word, WordId};

    struct FixedCode;

    impl CodeGenerator for FixedCode {
        fn generate(&self, payload: &str) -> Result<Vec<u8>, String> {
            Ok(payload.as_bytes().to_vec())
        }
    }

    fn setup() -> (EditSession, InteractionController) {
        let mut session = EditSession::default();
        session.seed(
            vec![Page::blank(1, 400.0, 400.0, 1.0)],
            vec![
                Word::new("w1", "Hello", Rect::new(10.0, 10.0, 50.0, 20.0), 1),
                Word::new("w2", "world", Rect::new(70.0, 10.0, 50.0, 20.0), 1),
            ],
        );
        (session, InteractionController::new(&EditorConfig::default()))
    }

    fn w1() -> ItemId {
        ItemId::Word(WordId::from("w1"))
    }

    #[test]
    fn click_selects_word_and_empty_space_clears() {
        let (mut session, mut ctl) = setup();
        assert_eq!(ctl.pointer_down(&mut session, Pixel::new(20.0, 20.0)), PointerOutcome::Selected(Some(w1())));
        ctl.pointer_up(&mut session, Pixel::new(20.0, 20.0));
        assert_eq!(session.selection(), Some(&w1()));
        assert!(!session.can_undo());

        ctl.pointer_down(&mut session, Pixel::new(300.0, 300.0));
        assert!(session.selection().is_none());
    }

    #[test]
    fn elements_rank_above_words() {
        let (mut session, mut ctl) = setup();
        ctl.set_tool(Tool::Shape(ShapeKind::Rectangle));
        let PointerOutcome::Created(id) = ctl.pointer_down(&mut session, Pixel::new(0.0, 0.0)) else {
            panic!("expected an element");
        };
        assert_eq!(ctl.tool(), Tool::Select);
        assert_eq!(session.selection(), Some(&ItemId::Element(id)));

        let hit = ctl.hit_test(&session, Point::new(20.0, 20.0));
        assert_eq!(hit, Some(ItemId::Element(id)));
    }

    #[test]
    fn drag_is_live_until_release_and_records_one_entry() {
        let (mut session, mut ctl) = setup();
        ctl.viewport_mut().set_zoom(2.0);
        ctl.pointer_down(&mut session, Pixel::new(40.0, 40.0));
        for step in 1..=5 {
            ctl.pointer_move(Pixel::new(40.0 + step as f32 * 10.0, 40.0));
        }
        assert_eq!(session.word(&WordId::from("w1")).unwrap().x, 10.0);
        assert_eq!(ctl.live_preview().transform, Some((w1(), Rect::new(35.0, 10.0, 50.0, 20.0))));

        assert!(ctl.pointer_up(&mut session, Pixel::new(90.0, 40.0)));
        assert_eq!(session.word(&WordId::from("w1")).unwrap().x, 35.0);
        assert_eq!(session.undo_label(), Some("Move"));
        session.undo();
        assert!(!session.can_undo());
        assert_eq!(session.word(&WordId::from("w1")).unwrap().x, 10.0);
    }

    #[test]
    fn escape_during_drag_reverts_without_history() {
        let (mut session, mut ctl) = setup();
        ctl.pointer_down(&mut session, Pixel::new(20.0, 20.0));
        ctl.pointer_move(Pixel::new(80.0, 80.0));
        assert!(ctl.key_down(&mut session, Key::Escape, Modifiers::NONE));
        assert!(!ctl.pointer_up(&mut session, Pixel::new(80.0, 80.0)));
        assert!(!session.can_undo());
        assert_eq!(ctl.live_preview(), LivePreview::default());
    }

    #[test]
    fn locked_elements_select_but_do_not_drag() {
        let (mut session, mut ctl) = setup();
        let mut element = highlight(1, Point::new(200.0, 200.0), &ElementDefaults::default());
        element.locked = true;
        let id = session.add_element(element).unwrap();

        ctl.pointer_down(&mut session, Pixel::new(210.0, 210.0));
        assert_eq!(session.selection(), Some(&ItemId::Element(id)));
        assert!(!ctl.is_dragging());
    }

    #[test]
    fn corner_handle_resizes_as_one_entry() {
        let (mut session, mut ctl) = setup();
        ctl.set_tool(Tool::Highlight);
        let PointerOutcome::Created(id) = ctl.pointer_down(&mut session, Pixel::new(200.0, 200.0)) else {
            panic!("expected an element");
        };
        // bottom-right corner of the 150x24 highlight
        ctl.pointer_down(&mut session, Pixel::new(350.0, 224.0));
        ctl.pointer_move(Pixel::new(360.0, 240.0));
        assert!(ctl.pointer_up(&mut session, Pixel::new(370.0, 250.0)));

        let element = session.element(&id).unwrap();
        assert_eq!(element.bounds(), Rect::new(200.0, 200.0, 170.0, 50.0));
        assert_eq!(session.undo_label(), Some("Resize"));
    }

    #[test]
    fn inline_edit_commits_with_modifier_enter() {
        let (mut session, mut ctl) = setup();
        assert!(ctl.double_click(&mut session, Pixel::new(20.0, 20.0)));
        assert_eq!(ctl.edit_buffer(), Some("Hello"));
        ctl.set_edit_buffer("Hi");
        assert!(!ctl.key_down(&mut session, Key::Enter, Modifiers::NONE));
        assert!(ctl.key_down(&mut session, Key::Enter, Modifiers::CTRL));

        let word = session.word(&WordId::from("w1")).unwrap();
        assert_eq!(word.text, "Hi");
        assert!(word.is_edited);
        assert!(!ctl.is_editing());
    }

    #[test]
    fn escape_cancels_edit_without_mutation() {
        let (mut session, mut ctl) = setup();
        ctl.double_click(&mut session, Pixel::new(20.0, 20.0));
        ctl.set_edit_buffer("");
        assert!(ctl.compose(&session, &EditorConfig::default()).masks().count() == 1);

        assert!(ctl.key_down(&mut session, Key::Escape, Modifiers::NONE));
        assert_eq!(session.word(&WordId::from("w1")).unwrap().text, "Hello");
        assert!(!session.can_undo());
    }

    #[test]
    fn clicking_elsewhere_commits_the_edit() {
        let (mut session, mut ctl) = setup();
        ctl.double_click(&mut session, Pixel::new(20.0, 20.0));
        ctl.insert_text("!");
        ctl.pointer_down(&mut session, Pixel::new(300.0, 300.0));
        assert_eq!(session.word(&WordId::from("w1")).unwrap().text, "Hello!");
    }

    #[test]
    fn text_element_edit_and_empty_commit_removes_it() {
        let (mut session, mut ctl) = setup();
        ctl.set_tool(Tool::Text);
        let PointerOutcome::Created(id) = ctl.pointer_down(&mut session, Pixel::new(100.0, 100.0)) else {
            panic!("expected an element");
        };
        assert!(ctl.double_click(&mut session, Pixel::new(110.0, 110.0)));
        assert_eq!(ctl.edit_buffer(), Some("New text"));
        ctl.set_edit_buffer("Sale");
        ctl.commit_edit(&mut session);
        match &session.element(&id).unwrap().kind {
            ElementKind::Text(text) => assert_eq!(text.content, "Sale"),
            other => panic!("unexpected kind {other:?}"),
        }

        ctl.begin_edit(&mut session, ItemId::Element(id));
        ctl.set_edit_buffer(" ");
        ctl.commit_edit(&mut session);
        assert!(session.element(&id).is_none());
    }

    #[test]
    fn delete_key_removes_selection() {
        let (mut session, mut ctl) = setup();
        ctl.pointer_down(&mut session, Pixel::new(20.0, 20.0));
        ctl.pointer_up(&mut session, Pixel::new(20.0, 20.0));
        assert!(ctl.key_down(&mut session, Key::Delete, Modifiers::NONE));
        assert!(session.word(&WordId::from("w1")).is_none());
    }

    #[test]
    fn qr_tool_uses_generator_and_payload() {
        let (mut session, mut ctl) = setup();
        ctl.set_tool(Tool::Qr);
        assert_eq!(ctl.pointer_down(&mut session, Pixel::new(5.0, 300.0)), PointerOutcome::Ignored);

        ctl.set_code_generator(Arc::new(FixedCode));
        ctl.set_pending_code("https://example.com");
        let PointerOutcome::Created(id) = ctl.pointer_down(&mut session, Pixel::new(5.0, 300.0)) else {
            panic!("expected an element");
        };
        match &session.element(&id).unwrap().kind {
            ElementKind::Image(image) => {
                assert_eq!(image.code_payload.as_deref(), Some("https://example.com"));
                assert_eq!(image.source, ImageSource::bytes(b"https://example.com".to_vec()));
            }
            other => panic!("unexpected kind {other:?}"),
        }
    }

    #[test]
    fn image_tool_requires_pending_source() {
        let (mut session, mut ctl) = setup();
        ctl.set_tool(Tool::Image);
        assert_eq!(ctl.pointer_down(&mut session, Pixel::new(5.0, 300.0)), PointerOutcome::Ignored);
        assert_eq!(ctl.tool(), Tool::Image);

        ctl.set_pending_image(ImageSource::Url("https://example.com/a.png".into()));
        assert!(matches!(
            ctl.pointer_down(&mut session, Pixel::new(5.0, 300.0)),
            PointerOutcome::Created(_)
        ));
    }

    #[test]
    fn resize_respects_minimum_size() {
        let rect = resize(Rect::new(0.0, 0.0, 10.0, 10.0), Corner::TopLeft, 50.0, 50.0);
        assert_eq!(rect, Rect::new(6.0, 6.0, 4.0, 4.0));
    }
}
