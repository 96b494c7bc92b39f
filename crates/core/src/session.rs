//! Edit session: the single source of truth for one open document.
//!
//! Original words are an immutable snapshot taken at ingestion. Edits live in
//! a sparse map keyed by word id, next to the added elements. Every mutation
//! goes through [`History`]; unknown ids are logged and ignored.

use std::collections::HashMap;

use crate::error::{EditorError, Result};
use crate::history::{Change, ElementSlot, History, HistoryEntry, WordEdit, WordSlot};
use crate::model::{
    Color, Element, ElementId, ItemId, Layer, Page, TextMetrics, Word, WordId, WordPatch,
};
use crate::transform::Point;

/// Notification sent to subscribers after the session changes.
#[derive(Debug, Clone, PartialEq)]
pub enum SessionEvent {
    Seeded { page_count: usize, word_count: usize },
    WordChanged(WordId),
    ElementAdded(ElementId),
    ElementChanged(ElementId),
    ElementRemoved(ElementId),
    SelectionChanged(Option<ItemId>),
    PageChanged(u32),
    HistoryChanged { can_undo: bool, can_redo: bool },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SubscriptionId(u64);

type Observer = Box<dyn FnMut(&SessionEvent) + Send>;

/// A word whose rendered state differs from the ingested snapshot.
#[derive(Debug, Clone, Copy)]
pub struct WordEditView<'a> {
    /// `None` for words added in the editor.
    pub original: Option<&'a Word>,
    /// `None` when the word was deleted or emptied.
    pub current: Option<&'a Word>,
}

pub struct EditSession {
    pages: Vec<Page>,
    originals: Vec<Word>,
    original_index: HashMap<WordId, usize>,
    edits: HashMap<WordId, WordSlot>,
    elements: HashMap<ElementId, ElementSlot>,
    next_seq: u64,
    selection: Option<ItemId>,
    current_page: u32,
    metrics: TextMetrics,
    history: History,
    observers: Vec<(SubscriptionId, Observer)>,
    next_subscription: u64,
}

impl std::fmt::Debug for EditSession {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EditSession")
            .field("pages", &self.pages.len())
            .field("words", &self.originals.len())
            .field("edits", &self.edits.len())
            .field("elements", &self.elements.len())
            .field("selection", &self.selection)
            .field("current_page", &self.current_page)
            .finish()
    }
}

impl Default for EditSession {
    fn default() -> Self {
        Self::new(TextMetrics::default(), None)
    }
}

impl EditSession {
    pub fn new(metrics: TextMetrics, history_limit: Option<usize>) -> Self {
        Self {
            pages: Vec::new(),
            originals: Vec::new(),
            original_index: HashMap::new(),
            edits: HashMap::new(),
            elements: HashMap::new(),
            next_seq: 1,
            selection: None,
            current_page: 1,
            metrics,
            history: History::new(history_limit),
            observers: Vec::new(),
            next_subscription: 1,
        }
    }

    /// Replace the whole session with a freshly ingested document.
    ///
    /// Clears edits, elements, selection and history. Subscriptions survive.
    pub fn seed(&mut self, pages: Vec<Page>, words: Vec<Word>) {
        self.originals.clear();
        self.original_index.clear();
        for word in words {
            if self.original_index.contains_key(&word.id) {
                log::warn!("seed: duplicate word id {}, keeping the first", word.id);
                continue;
            }
            self.original_index.insert(word.id.clone(), self.originals.len());
            self.originals.push(word);
        }
        self.pages = pages;
        self.edits.clear();
        self.elements.clear();
        self.next_seq = 1;
        self.selection = None;
        self.current_page = 1;
        self.history.clear();

        let event = SessionEvent::Seeded {
            page_count: self.pages.len(),
            word_count: self.originals.len(),
        };
        self.emit(event);
        self.emit_history();
    }

    pub fn pages(&self) -> &[Page] {
        &self.pages
    }

    pub fn page(&self, page_number: u32) -> Option<&Page> {
        self.pages.iter().find(|p| p.page_number == page_number)
    }

    pub fn page_count(&self) -> usize {
        self.pages.len()
    }

    pub fn metrics(&self) -> TextMetrics {
        self.metrics
    }

    /// Words to draw on `page_number`: originals with edits applied, then
    /// added words in insertion order. Blank words are never returned.
    pub fn get_render_words(&self, page_number: u32) -> Vec<Word> {
        let mut words: Vec<Word> = self
            .originals
            .iter()
            .filter(|w| w.page_number == page_number)
            .filter_map(|w| match self.edits.get(&w.id) {
                None => Some(w),
                Some(WordSlot { edit: WordEdit::Override(edited), .. }) => Some(edited),
                Some(WordSlot { edit: WordEdit::Tombstone, .. }) => None,
            })
            .filter(|w| !w.is_blank())
            .cloned()
            .collect();

        let mut added: Vec<(u64, &Word)> = self
            .edits
            .iter()
            .filter(|(id, _)| !self.original_index.contains_key(*id))
            .filter_map(|(_, slot)| match &slot.edit {
                WordEdit::Override(word) if word.page_number == page_number => {
                    Some((slot.seq, word))
                }
                _ => None,
            })
            .collect();
        added.sort_by_key(|(seq, _)| *seq);
        words.extend(added.into_iter().map(|(_, w)| w).filter(|w| !w.is_blank()).cloned());
        words
    }

    /// Current state of a word; `None` if unknown or deleted.
    pub fn word(&self, id: &WordId) -> Option<&Word> {
        match self.edits.get(id) {
            Some(WordSlot { edit: WordEdit::Override(word), .. }) => Some(word),
            Some(WordSlot { edit: WordEdit::Tombstone, .. }) => None,
            None => self.original_word(id),
        }
    }

    /// The ingested snapshot of a word, ignoring edits.
    pub fn original_word(&self, id: &WordId) -> Option<&Word> {
        self.original_index.get(id).and_then(|&i| self.originals.get(i))
    }

    pub fn original_word_count(&self) -> usize {
        self.originals.len()
    }

    /// Words that differ from the snapshot, originals first in ingestion
    /// order then added words in insertion order.
    pub fn word_edits(&self) -> Vec<WordEditView<'_>> {
        let mut views: Vec<WordEditView<'_>> = self
            .originals
            .iter()
            .filter_map(|original| {
                let slot = self.edits.get(&original.id)?;
                let current = match &slot.edit {
                    WordEdit::Override(word) => Some(word),
                    WordEdit::Tombstone => None,
                };
                Some(WordEditView { original: Some(original), current })
            })
            .collect();

        let mut added: Vec<(u64, &Word)> = self
            .edits
            .iter()
            .filter(|(id, _)| !self.original_index.contains_key(*id))
            .filter_map(|(_, slot)| match &slot.edit {
                WordEdit::Override(word) => Some((slot.seq, word)),
                WordEdit::Tombstone => None,
            })
            .collect();
        added.sort_by_key(|(seq, _)| *seq);
        views.extend(
            added.into_iter().map(|(_, w)| WordEditView { original: None, current: Some(w) }),
        );
        views
    }

    /// Merge `patch` into a word and record it.
    ///
    /// Changing the text or font size re-measures the box. Emptying the text removes the
    /// word from rendering. Editing back to the exact original drops the edit.
    pub fn update_word(&mut self, id: &WordId, patch: WordPatch) -> bool {
        let Some(current) = self.word(id) else {
            absorb("update_word", EditorError::Validation(format!("unknown word {id}")));
            return false;
        };
        if patch.is_empty() {
            return false;
        }
        let label = patch.label();
        let mut next = current.clone();
        let mut remeasure = false;
        if let Some(size) = patch.font_size {
            let size = size.max(1.0);
            remeasure |= size != next.font_size;
            next.font_size = size;
        }
        if let Some(text) = patch.text {
            remeasure |= text != next.text;
            next.text = text;
        }
        if remeasure {
            let (width, height) = match self.original_word(id) {
                Some(original)
                    if original.text == next.text && original.font_size == next.font_size =>
                {
                    (original.width, original.height)
                }
                _ => self.metrics.measure(&next.text, next.font_size),
            };
            next.width = width;
            next.height = height;
        }
        if let Some(x) = patch.x {
            next.x = x;
        }
        if let Some(y) = patch.y {
            next.y = y;
        }
        if let Some(width) = patch.width {
            next.width = width.max(0.0);
        }
        if let Some(height) = patch.height {
            next.height = height.max(0.0);
        }
        if let Some(family) = patch.font_family {
            next.font_family = family;
        }
        if let Some(color) = patch.color {
            next.color = color;
        }
        if let Some(bold) = patch.bold {
            next.bold = bold;
        }
        if let Some(italic) = patch.italic {
            next.italic = italic;
        }
        next.is_edited = next.text != next.original_text;

        if next.is_blank() {
            return self.remove_word(label, id);
        }

        let after = match self.original_word(id) {
            Some(original) if *original == next => None,
            Some(_) => Some(WordSlot { seq: 0, edit: WordEdit::Override(next) }),
            None => {
                let seq = self.edits.get(id).map_or(0, |s| s.seq);
                Some(WordSlot { seq, edit: WordEdit::Override(next) })
            }
        };
        self.commit(label, Change::Word { id: id.clone(), before: self.edits.get(id).cloned(), after })
    }

    pub fn delete_word(&mut self, id: &WordId) -> bool {
        if self.word(id).is_none() {
            absorb("delete_word", EditorError::Validation(format!("unknown word {id}")));
            return false;
        }
        self.remove_word("Delete word", id)
    }

    /// Add an override-only word at `origin` (top-left of its box).
    pub fn add_word(
        &mut self,
        page_number: u32,
        text: &str,
        origin: Point,
        font_size: f32,
        color: Color,
    ) -> Option<WordId> {
        if self.page(page_number).is_none() {
            log::warn!("add_word: unknown page {page_number}");
            return None;
        }
        if text.trim().is_empty() {
            log::warn!("add_word: refusing to add a blank word");
            return None;
        }
        let seq = self.take_seq();
        let id = WordId::new(format!("p{page_number}-n{seq}"));
        let font_size = font_size.max(1.0);
        let (width, height) = self.metrics.measure(text, font_size);
        let mut word = Word::new(
            id.clone(),
            text,
            crate::transform::Rect::new(origin.x, origin.y, width, height),
            page_number,
        )
        .with_font("Helvetica", font_size)
        .with_color(color);
        word.original_text = String::new();
        word.is_edited = true;

        let change = Change::Word {
            id: id.clone(),
            before: None,
            after: Some(WordSlot { seq, edit: WordEdit::Override(word) }),
        };
        self.commit("Add text", change);
        Some(id)
    }

    pub fn element(&self, id: &ElementId) -> Option<&Element> {
        self.elements.get(id).map(|slot| &slot.element)
    }

    /// Elements on a page, bottom to top.
    pub fn page_elements(&self, page_number: u32) -> Vec<&Element> {
        let mut slots: Vec<&ElementSlot> =
            self.elements.values().filter(|s| s.element.page_number == page_number).collect();
        slots.sort_by_key(|s| (s.element.z_index, s.seq));
        slots.into_iter().map(|s| &s.element).collect()
    }

    pub fn element_count(&self) -> usize {
        self.elements.len()
    }

    /// Check that an element's page exists and its box is finite with a
    /// non-negative size.
    pub fn validate_element(&self, element: &Element) -> Result<()> {
        if self.page(element.page_number).is_none() {
            return Err(EditorError::Validation(format!(
                "element {} is on unknown page {}",
                element.id, element.page_number
            )));
        }
        let b = element.bounds();
        let finite = [b.x, b.y, b.width, b.height, element.rotation].iter().all(|v| v.is_finite());
        if !finite || b.width < 0.0 || b.height < 0.0 {
            return Err(EditorError::Validation(format!("element {} has invalid bounds", element.id)));
        }
        Ok(())
    }

    pub fn add_element(&mut self, element: Element) -> Option<ElementId> {
        if let Err(err) = self.validate_element(&element) {
            absorb("add_element", err);
            return None;
        }
        if self.elements.contains_key(&element.id) {
            log::warn!("add_element: element {} already exists", element.id);
            return None;
        }
        let id = element.id;
        let label = format!("Add {}", element.kind.label());
        let seq = self.take_seq();
        self.commit(&label, Change::Element { id, before: None, after: Some(ElementSlot { seq, element }) });
        Some(id)
    }

    pub fn update_element(&mut self, id: &ElementId, edit: impl FnOnce(&mut Element)) -> bool {
        self.update_element_as("Edit element", id, edit)
    }

    /// Like [`Self::update_element`] with a custom history label.
    pub fn update_element_as(
        &mut self,
        label: &str,
        id: &ElementId,
        edit: impl FnOnce(&mut Element),
    ) -> bool {
        let Some(before) = self.elements.get(id).cloned() else {
            absorb("update_element", EditorError::Validation(format!("unknown element {id}")));
            return false;
        };
        let mut after = before.clone();
        edit(&mut after.element);
        after.element.id = *id;
        if let Err(err) = self.validate_element(&after.element) {
            absorb("update_element", err);
            return false;
        }
        self.commit(label, Change::Element { id: *id, before: Some(before), after: Some(after) })
    }

    pub fn remove_element(&mut self, id: &ElementId) -> bool {
        let Some(before) = self.elements.get(id).cloned() else {
            absorb("remove_element", EditorError::Validation(format!("unknown element {id}")));
            return false;
        };
        let label = format!("Delete {}", before.element.kind.label());
        self.commit(&label, Change::Element { id: *id, before: Some(before), after: None })
    }

    pub fn bring_to_front(&mut self, id: &ElementId) -> bool {
        let Some(page) = self.element(id).map(|e| e.page_number) else {
            log::warn!("bring_to_front: unknown element id {id}");
            return false;
        };
        let top = self.page_elements(page).iter().filter(|e| e.id != *id).map(|e| e.z_index).max();
        match top {
            Some(top) => self.update_element_as("Bring to front", id, |e| {
                if e.z_index <= top {
                    e.z_index = top + 1;
                }
            }),
            None => false,
        }
    }

    pub fn send_to_back(&mut self, id: &ElementId) -> bool {
        let Some(page) = self.element(id).map(|e| e.page_number) else {
            log::warn!("send_to_back: unknown element id {id}");
            return false;
        };
        let bottom =
            self.page_elements(page).iter().filter(|e| e.id != *id).map(|e| e.z_index).min();
        match bottom {
            Some(bottom) => self.update_element_as("Send to back", id, |e| {
                if e.z_index >= bottom {
                    e.z_index = bottom - 1;
                }
            }),
            None => false,
        }
    }

    /// Layer panel rows for a page, bottom to top: words, then elements.
    pub fn layers(&self, page_number: u32) -> Vec<Layer> {
        self.get_render_words(page_number)
            .iter()
            .map(Layer::for_word)
            .chain(self.page_elements(page_number).into_iter().map(Layer::for_element))
            .collect()
    }

    pub fn contains(&self, item: &ItemId) -> bool {
        match item {
            ItemId::Word(id) => self.word(id).is_some(),
            ItemId::Element(id) => self.elements.contains_key(id),
        }
    }

    pub fn selection(&self) -> Option<&ItemId> {
        self.selection.as_ref()
    }

    /// Change the selection. Not recorded in history.
    pub fn select(&mut self, item: Option<ItemId>) -> bool {
        if let Some(target) = &item {
            if !self.contains(target) {
                log::warn!("select: unknown {target}");
                return false;
            }
        }
        if self.selection == item {
            return true;
        }
        self.selection = item.clone();
        self.emit(SessionEvent::SelectionChanged(item));
        true
    }

    pub fn current_page(&self) -> u32 {
        self.current_page
    }

    /// Switch the active page. Not recorded in history.
    pub fn set_current_page(&mut self, page_number: u32) -> bool {
        if self.page(page_number).is_none() {
            log::warn!("set_current_page: unknown page {page_number}");
            return false;
        }
        if self.current_page != page_number {
            self.current_page = page_number;
            self.emit(SessionEvent::PageChanged(page_number));
        }
        true
    }

    pub fn undo(&mut self) -> bool {
        let Some(entry) = self.history.take_undo() else {
            return false;
        };
        log::debug!("undo '{}'", entry.label);
        self.revert(&entry);
        self.emit_history();
        true
    }

    pub fn redo(&mut self) -> bool {
        let Some(entry) = self.history.take_redo() else {
            return false;
        };
        log::debug!("redo '{}'", entry.label);
        for change in &entry.changes {
            self.apply(change, true);
        }
        self.prune_selection();
        self.emit_history();
        true
    }

    pub fn can_undo(&self) -> bool {
        self.history.can_undo()
    }

    pub fn can_redo(&self) -> bool {
        self.history.can_redo()
    }

    pub fn undo_label(&self) -> Option<&str> {
        self.history.undo_label()
    }

    pub fn redo_label(&self) -> Option<&str> {
        self.history.redo_label()
    }

    /// Fold the following mutations into a single history entry.
    pub fn begin_batch(&mut self, label: &str) {
        self.history.begin_batch(label);
    }

    /// Close the batch. Returns true when an entry was recorded.
    pub fn end_batch(&mut self) -> bool {
        let recorded = self.history.end_batch();
        if recorded {
            self.emit_history();
        }
        recorded
    }

    /// Abandon the batch and roll back everything it applied.
    pub fn cancel_batch(&mut self) {
        let changes = self.history.cancel_batch();
        if changes.is_empty() {
            return;
        }
        self.revert(&HistoryEntry { label: String::new(), changes });
    }

    pub fn subscribe(&mut self, observer: impl FnMut(&SessionEvent) + Send + 'static) -> SubscriptionId {
        let id = SubscriptionId(self.next_subscription);
        self.next_subscription += 1;
        self.observers.push((id, Box::new(observer)));
        id
    }

    pub fn unsubscribe(&mut self, id: SubscriptionId) -> bool {
        let before = self.observers.len();
        self.observers.retain(|(sub, _)| *sub != id);
        self.observers.len() != before
    }

    fn remove_word(&mut self, label: &str, id: &WordId) -> bool {
        let after = self
            .original_index
            .contains_key(id)
            .then_some(WordSlot { seq: 0, edit: WordEdit::Tombstone });
        let changed = self.commit(label, Change::Word { id: id.clone(), before: self.edits.get(id).cloned(), after });
        if self.selection == Some(ItemId::Word(id.clone())) {
            self.select(None);
        }
        changed
    }

    /// Apply a change and record it. Returns false for a no-op.
    fn commit(&mut self, label: &str, change: Change) -> bool {
        let noop = match &change {
            Change::Word { before, after, .. } => before == after,
            Change::Element { before, after, .. } => before == after,
        };
        if noop {
            return false;
        }
        self.apply(&change, true);
        if let Change::Element { id, after: None, .. } = &change {
            if self.selection == Some(ItemId::Element(*id)) {
                self.select(None);
            }
        }
        if self.history.record(label, change) {
            self.emit_history();
        }
        true
    }

    fn revert(&mut self, entry: &HistoryEntry) {
        for change in entry.changes.iter().rev() {
            self.apply(change, false);
        }
        self.prune_selection();
    }

    /// Write a change's after slot (`forward`) or before slot into the maps.
    fn apply(&mut self, change: &Change, forward: bool) {
        let event = match change {
            Change::Word { id, before, after } => {
                let slot = if forward { after } else { before };
                match slot {
                    Some(slot) => self.edits.insert(id.clone(), slot.clone()),
                    None => self.edits.remove(id),
                };
                SessionEvent::WordChanged(id.clone())
            }
            Change::Element { id, before, after } => {
                let (slot, previous) = if forward { (after, before) } else { (before, after) };
                match (slot, previous) {
                    (Some(slot), prev) => {
                        self.elements.insert(*id, slot.clone());
                        if prev.is_some() {
                            SessionEvent::ElementChanged(*id)
                        } else {
                            SessionEvent::ElementAdded(*id)
                        }
                    }
                    (None, _) => {
                        self.elements.remove(id);
                        SessionEvent::ElementRemoved(*id)
                    }
                }
            }
        };
        self.emit(event);
    }

    fn prune_selection(&mut self) {
        if let Some(item) = &self.selection {
            if !self.contains(item) {
                self.select(None);
            }
        }
    }

    fn take_seq(&mut self) -> u64 {
        let seq = self.next_seq;
        self.next_seq += 1;
        seq
    }

    fn emit_history(&mut self) {
        let event = SessionEvent::HistoryChanged {
            can_undo: self.history.can_undo(),
            can_redo: self.history.can_redo(),
        };
        self.emit(event);
    }

    fn emit(&mut self, event: SessionEvent) {
        for (_, observer) in self.observers.iter_mut() {
            observer(&event);
        }
    }
}

/// Store validation failures are logged and the mutation becomes a no-op.
fn absorb(operation: &str, err: EditorError) {
    log::warn!("{operation}: {err}");
}
