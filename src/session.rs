//! The application state a host drives: roster, change ledger, undo stack and
//! separation constraints, owned together by one controller.

use crate::constraints::{self, ClassViolations, ConstraintBook};
use crate::error::{CoreError, CoreResult};
use crate::ledger::{Ledger, Snapshot, UndoStack};
use crate::model::{ClassKey, Position, Roster};
use crate::parser::{self, ParseSummary};
use crate::roster::MovedStudent;
use crate::stats::{self, RosterStats};
use std::collections::BTreeMap;

#[derive(Debug, Clone, Default)]
pub struct Session {
    roster: Roster,
    ledger: Ledger,
    undo: UndoStack,
    constraints: ConstraintBook,
}

impl Session {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_state(roster: Roster, ledger: Ledger, constraints: ConstraintBook) -> Self {
        Self {
            roster,
            ledger,
            undo: UndoStack::new(),
            constraints,
        }
    }

    pub fn roster(&self) -> &Roster {
        &self.roster
    }

    pub fn ledger(&self) -> &Ledger {
        &self.ledger
    }

    pub fn constraints(&self) -> &ConstraintBook {
        &self.constraints
    }

    /// Constraint edits do not take part in undo.
    pub fn constraints_mut(&mut self) -> &mut ConstraintBook {
        &mut self.constraints
    }

    pub fn undo_depth(&self) -> usize {
        self.undo.len()
    }

    /// Replaces the roster with the parsed text; history, markers and the
    /// undo stack start over. Constraints are kept.
    pub fn import_text(&mut self, text: &str) -> ParseSummary {
        let (roster, summary) = parser::parse_with_summary(text);
        self.roster = roster;
        self.ledger.clear();
        self.undo.clear();
        summary
    }

    /// Replaces roster and ledger wholesale (backup restore, workspace load).
    pub fn restore(&mut self, roster: Roster, ledger: Ledger) {
        self.roster = roster;
        self.ledger = ledger;
        self.undo.clear();
    }

    pub fn replace_constraints(&mut self, book: ConstraintBook) {
        self.constraints = book;
    }

    fn snapshot(&self) -> Snapshot {
        Snapshot {
            roster: self.roster.clone(),
            ledger: self.ledger.clone(),
        }
    }

    pub fn swap(&mut self, a: Position, b: Position) -> CoreResult<()> {
        let a_name = self.roster.get(&a).ok_or_else(|| a.invalid())?.name.clone();
        let b_name = self.roster.get(&b).ok_or_else(|| b.invalid())?.name.clone();

        let before = self.snapshot();
        self.roster.swap(a, b)?;
        self.undo.push(before);
        self.ledger
            .record_swap(a.class_key, &a_name, b.class_key, &b_name);
        Ok(())
    }

    pub fn move_students(
        &mut self,
        positions: &[Position],
        target: ClassKey,
    ) -> CoreResult<Vec<MovedStudent>> {
        let before = self.snapshot();
        let moved = self.roster.move_students(positions, target)?;
        self.undo.push(before);
        self.ledger.record_move(&moved);
        Ok(moved)
    }

    /// Target class by number within the grade of the first selected student.
    pub fn target_in_grade(&self, positions: &[Position], class: u32) -> CoreResult<ClassKey> {
        let first = positions.first().ok_or(CoreError::EmptySelection)?;
        Ok(ClassKey::new(first.class_key.grade, class))
    }

    /// Bulk renumbering; not undoable.
    pub fn sort_by_name(&mut self) {
        self.roster.sort_by_name();
    }

    pub fn set_note(&mut self, pos: Position, text: &str) -> CoreResult<()> {
        self.roster.set_note(pos, text)
    }

    /// Restores the state captured before the latest swap or move.
    pub fn undo(&mut self) -> CoreResult<()> {
        let snap = self.undo.pop()?;
        self.roster = snap.roster;
        self.ledger = snap.ledger;
        Ok(())
    }

    /// Clears roster, history, markers and undo. Constraints survive.
    pub fn reset(&mut self) {
        self.roster = Roster::new();
        self.ledger.clear();
        self.undo.clear();
    }

    pub fn violations_per_class(&self) -> BTreeMap<ClassKey, usize> {
        constraints::violations_per_class(&self.roster, &self.constraints)
    }

    pub fn violation_details(&self, class: &ClassKey) -> Vec<String> {
        constraints::violation_details(&self.roster, &self.constraints, class)
    }

    pub fn violation_report(&self) -> Vec<ClassViolations> {
        constraints::violation_report(&self.roster, &self.constraints)
    }

    pub fn stats(&self) -> RosterStats {
        stats::summarize(&self.roster)
    }
}
