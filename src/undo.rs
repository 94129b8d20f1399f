//! Undo and redo of property writes made by actions.

use crate::property::Source;
use crate::scene::{PropertyId, Scene};
use tracing::debug;

/// One recorded write: what defined the property before and after.
#[derive(Debug, Clone)]
pub(crate) struct Change {
    pub(crate) property: PropertyId,
    pub(crate) before: Source,
    pub(crate) after: Source,
    pub(crate) undoable: bool,
}

#[derive(Debug, Clone)]
enum Entry {
    Change(Change),
    Nested(UndoRecord),
}

/// The writes made by one action, in order, including those of actions it triggered.
#[derive(Debug, Clone)]
pub(crate) struct UndoRecord {
    undoable: bool,
    entries: Vec<Entry>,
}

impl UndoRecord {
    fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// The largest undoable records inside this one.
    ///
    /// Changes to non-undoable properties and changes made by non-undoable actions are dropped;
    /// undoable actions nested in a non-undoable one become records of their own.
    fn into_undoable(self) -> Vec<UndoRecord> {
        if !self.undoable {
            return self
                .entries
                .into_iter()
                .flat_map(|entry| match entry {
                    Entry::Change(_) => Vec::new(),
                    Entry::Nested(record) => record.into_undoable(),
                })
                .collect();
        }

        let mut entries = Vec::new();
        for entry in self.entries {
            match entry {
                Entry::Change(change) if change.undoable => entries.push(Entry::Change(change)),
                Entry::Change(_) => (),
                Entry::Nested(record) => entries
                    .extend(record.into_undoable().into_iter().map(Entry::Nested)),
            }
        }
        if entries.is_empty() {
            Vec::new()
        } else {
            vec![UndoRecord {
                undoable: true,
                entries,
            }]
        }
    }

    /// Changes in application order.
    fn changes(&self) -> Vec<&Change> {
        let mut out = Vec::new();
        for entry in &self.entries {
            match entry {
                Entry::Change(change) => out.push(change),
                Entry::Nested(record) => out.extend(record.changes()),
            }
        }
        out
    }
}

/// Undo and redo stacks plus the accumulators of the actions currently running.
#[derive(Debug)]
pub(crate) struct UndoManager {
    undo: Vec<UndoRecord>,
    redo: Vec<UndoRecord>,
    /// One frame per running action, innermost last.
    frames: Vec<UndoRecord>,
    /// Set while an undo, redo or rollback is being applied; nothing is recorded then.
    applying: bool,
    limit: usize,
}

impl UndoManager {
    pub(crate) fn new(limit: usize) -> UndoManager {
        UndoManager {
            undo: Vec::new(),
            redo: Vec::new(),
            frames: Vec::new(),
            applying: false,
            limit,
        }
    }

    pub(crate) fn begin(&mut self, undoable: bool) {
        self.frames.push(UndoRecord {
            undoable,
            entries: Vec::new(),
        });
    }

    /// # Panics
    /// - if there is no frame to end
    pub(crate) fn end(&mut self) -> UndoRecord {
        self.frames.pop().expect("ended an action that never began")
    }

    pub(crate) fn record(&mut self, change: Change) {
        if self.applying {
            return;
        }
        if let Some(frame) = self.frames.last_mut() {
            frame.entries.push(Entry::Change(change));
        }
    }

    /// Files a finished action’s record: into the enclosing action if there is one, otherwise
    /// onto the undo stack.
    pub(crate) fn commit(&mut self, record: UndoRecord) {
        if record.is_empty() {
            return;
        }
        if let Some(outer) = self.frames.last_mut() {
            outer.entries.push(Entry::Nested(record));
            return;
        }
        for record in record.into_undoable() {
            self.undo.push(record);
            self.redo.clear();
        }
        if self.undo.len() > self.limit {
            let excess = self.undo.len() - self.limit;
            self.undo.drain(..excess);
        }
    }

    pub(crate) fn depth(&self) -> usize {
        self.undo.len()
    }

    pub(crate) fn redo_depth(&self) -> usize {
        self.redo.len()
    }
}

impl Scene {
    /// Reverts the most recent undoable action. Returns false if there is nothing to undo.
    pub fn undo(&mut self) -> bool {
        match self.undo.undo.pop() {
            Some(record) => {
                self.apply_changes(&record, true);
                self.undo.redo.push(record);
                true
            }
            None => false,
        }
    }

    /// Reapplies the most recently undone action. Returns false if there is nothing to redo.
    pub fn redo(&mut self) -> bool {
        match self.undo.redo.pop() {
            Some(record) => {
                self.apply_changes(&record, false);
                self.undo.undo.push(record);
                true
            }
            None => false,
        }
    }

    pub fn can_undo(&self) -> bool {
        self.undo.depth() > 0
    }

    pub fn can_redo(&self) -> bool {
        self.undo.redo_depth() > 0
    }

    /// Number of records on the undo stack.
    pub fn undo_depth(&self) -> usize {
        self.undo.depth()
    }

    pub fn redo_depth(&self) -> usize {
        self.undo.redo_depth()
    }

    /// Forgets all undo and redo history.
    pub fn clear_undo(&mut self) {
        self.undo.undo.clear();
        self.undo.redo.clear();
    }

    pub(crate) fn rollback(&mut self, record: UndoRecord) {
        self.apply_changes(&record, true);
    }

    fn apply_changes(&mut self, record: &UndoRecord, backwards: bool) {
        let was_applying = std::mem::replace(&mut self.undo.applying, true);
        let mut changes = record.changes();
        if backwards {
            changes.reverse();
        }
        for change in changes {
            let source = if backwards {
                change.before.clone()
            } else {
                change.after.clone()
            };
            if let Err(err) = self.install(change.property, source, true) {
                debug!(property = %change.property, %err, "skipped undo change");
            }
        }
        self.undo.applying = was_applying;
    }
}
