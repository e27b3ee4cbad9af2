use crate::error::{CoreError, CoreResult};
use crate::model::{ClassKey, Roster, StudentTag};
use crate::roster::MovedStudent;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeSet, VecDeque};

pub const UNDO_LIMIT: usize = 20;

/// Change log plus the changed/moved markers used for row highlighting.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Ledger {
    #[serde(default)]
    pub history: Vec<String>,
    #[serde(default, rename = "changedStudents")]
    pub changed: BTreeSet<StudentTag>,
    #[serde(default, rename = "movedStudents")]
    pub moved: BTreeSet<StudentTag>,
}

/// Row highlight state; a tag in both sets shows as changed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub enum Marker {
    Changed,
    Moved,
}

impl Ledger {
    /// Records a completed swap. `a_name`/`b_name` are the students that were
    /// at positions A and B before the exchange.
    pub fn record_swap(&mut self, a: ClassKey, a_name: &str, b: ClassKey, b_name: &str) {
        self.changed.insert(StudentTag::new(a, b_name));
        self.changed.insert(StudentTag::new(b, a_name));
        self.history.push(format!(
            "(바꿈) {}반 {} ⇔ {}반 {}",
            a.class, a_name, b.class, b_name
        ));
    }

    pub fn record_move(&mut self, moved: &[MovedStudent]) {
        for m in moved {
            self.moved.insert(StudentTag::new(m.to, m.student.name.clone()));
            self.history.push(format!(
                "(이동) {}반 {} → {}반",
                m.from.class, m.student.name, m.to.class
            ));
        }
    }

    pub fn marker(&self, class_key: ClassKey, name: &str) -> Option<Marker> {
        let tag = StudentTag::new(class_key, name);
        if self.changed.contains(&tag) {
            Some(Marker::Changed)
        } else if self.moved.contains(&tag) {
            Some(Marker::Moved)
        } else {
            None
        }
    }

    pub fn clear(&mut self) {
        self.history.clear();
        self.changed.clear();
        self.moved.clear();
    }
}

/// State captured right before a swap or move.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Snapshot {
    pub roster: Roster,
    pub ledger: Ledger,
}

/// Most recent snapshots first out; the oldest is dropped past the limit.
#[derive(Debug, Clone, Default)]
pub struct UndoStack {
    entries: VecDeque<Snapshot>,
}

impl UndoStack {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, snapshot: Snapshot) {
        if self.entries.len() == UNDO_LIMIT {
            self.entries.pop_front();
        }
        self.entries.push_back(snapshot);
    }

    pub fn pop(&mut self) -> CoreResult<Snapshot> {
        self.entries.pop_back().ok_or(CoreError::EmptyUndoStack)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn clear(&mut self) {
        self.entries.clear();
    }
}
