//! Linear undo/redo history.
//!
//! Every store mutation is recorded as a [`Change`] holding the before and
//! after slot for one key. Undo re-applies the before slots in reverse order,
//! redo re-applies the after slots in order. Recording anything new clears the
//! redo stack.

use crate::model::{Element, ElementId, Word, WordId};

/// Stored state of a word id, or `None` in a change when the key had no entry.
#[derive(Debug, Clone, PartialEq)]
pub(crate) struct WordSlot {
    /// Insertion order of override-only words.
    pub seq: u64,
    pub edit: WordEdit,
}

#[derive(Debug, Clone, PartialEq)]
pub(crate) enum WordEdit {
    Override(Word),
    /// An original word whose text was emptied or deleted.
    Tombstone,
}

#[derive(Debug, Clone, PartialEq)]
pub(crate) struct ElementSlot {
    pub seq: u64,
    pub element: Element,
}

#[derive(Debug, Clone, PartialEq)]
pub(crate) enum Change {
    Word { id: WordId, before: Option<WordSlot>, after: Option<WordSlot> },
    Element { id: ElementId, before: Option<ElementSlot>, after: Option<ElementSlot> },
}

#[derive(Debug, Clone, PartialEq, Eq)]
enum ChangeKey {
    Word(WordId),
    Element(ElementId),
}

impl Change {
    fn key(&self) -> ChangeKey {
        match self {
            Self::Word { id, .. } => ChangeKey::Word(id.clone()),
            Self::Element { id, .. } => ChangeKey::Element(*id),
        }
    }

    fn is_noop(&self) -> bool {
        match self {
            Self::Word { before, after, .. } => before == after,
            Self::Element { before, after, .. } => before == after,
        }
    }

    /// Keep this change's before slot and take `later`'s after slot.
    fn absorb(&mut self, later: Change) {
        match (self, later) {
            (Self::Word { after, .. }, Self::Word { after: next, .. }) => *after = next,
            (Self::Element { after, .. }, Self::Element { after: next, .. }) => *after = next,
            _ => {}
        }
    }
}

/// One undoable step.
#[derive(Debug, Clone)]
pub(crate) struct HistoryEntry {
    pub label: String,
    pub changes: Vec<Change>,
}

#[derive(Debug)]
struct Batch {
    label: String,
    changes: Vec<Change>,
    depth: usize,
}

impl Batch {
    fn push(&mut self, change: Change) {
        let key = change.key();
        match self.changes.iter_mut().find(|c| c.key() == key) {
            Some(existing) => existing.absorb(change),
            None => self.changes.push(change),
        }
    }
}

#[derive(Debug, Default)]
pub(crate) struct History {
    undo: Vec<HistoryEntry>,
    redo: Vec<HistoryEntry>,
    batch: Option<Batch>,
    max_entries: Option<usize>,
}

impl History {
    pub fn new(max_entries: Option<usize>) -> Self {
        Self { max_entries, ..Self::default() }
    }

    /// Record a change. Returns true when the undo stack changed.
    pub fn record(&mut self, label: &str, change: Change) -> bool {
        if let Some(batch) = self.batch.as_mut() {
            batch.push(change);
            return false;
        }
        if change.is_noop() {
            return false;
        }
        self.push(HistoryEntry { label: label.to_string(), changes: vec![change] });
        true
    }

    /// Start folding subsequent changes into one entry. Nested calls join the outer batch.
    pub fn begin_batch(&mut self, label: &str) {
        match self.batch.as_mut() {
            Some(batch) => batch.depth += 1,
            None => {
                self.batch =
                    Some(Batch { label: label.to_string(), changes: Vec::new(), depth: 1 })
            }
        }
    }

    /// Close the current batch. Returns true when an entry was recorded.
    pub fn end_batch(&mut self) -> bool {
        let Some(mut batch) = self.batch.take() else {
            log::warn!("end_batch called without an open batch");
            return false;
        };
        if batch.depth > 1 {
            batch.depth -= 1;
            self.batch = Some(batch);
            return false;
        }
        batch.changes.retain(|c| !c.is_noop());
        if batch.changes.is_empty() {
            log::debug!("batch '{}' had no net change", batch.label);
            return false;
        }
        self.push(HistoryEntry { label: batch.label, changes: batch.changes });
        true
    }

    /// Abandon the open batch, returning its changes so the caller can revert them.
    pub fn cancel_batch(&mut self) -> Vec<Change> {
        self.batch.take().map(|b| b.changes).unwrap_or_default()
    }

    #[cfg(test)]
    pub fn in_batch(&self) -> bool {
        self.batch.is_some()
    }

    /// Pop the newest entry onto the redo stack and return it for reverting.
    pub fn take_undo(&mut self) -> Option<HistoryEntry> {
        let entry = self.undo.pop()?;
        self.redo.push(entry.clone());
        Some(entry)
    }

    /// Pop the newest undone entry back onto the undo stack and return it for re-applying.
    pub fn take_redo(&mut self) -> Option<HistoryEntry> {
        let entry = self.redo.pop()?;
        self.undo.push(entry.clone());
        Some(entry)
    }

    pub fn can_undo(&self) -> bool {
        !self.undo.is_empty()
    }

    pub fn can_redo(&self) -> bool {
        !self.redo.is_empty()
    }

    pub fn undo_label(&self) -> Option<&str> {
        self.undo.last().map(|e| e.label.as_str())
    }

    pub fn redo_label(&self) -> Option<&str> {
        self.redo.last().map(|e| e.label.as_str())
    }

    #[cfg(test)]
    pub fn undo_len(&self) -> usize {
        self.undo.len()
    }

    pub fn clear(&mut self) {
        self.undo.clear();
        self.redo.clear();
        self.batch = None;
    }

    fn push(&mut self, entry: HistoryEntry) {
        log::debug!("history: recorded '{}' ({} changes)", entry.label, entry.changes.len());
        self.undo.push(entry);
        self.redo.clear();
        if let Some(max) = self.max_entries {
            if self.undo.len() > max {
                let excess = self.undo.len() - max;
                self.undo.drain(..excess);
            }
        }
    }
}
