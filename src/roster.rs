use crate::error::{CoreError, CoreResult};
use crate::model::{ClassKey, Position, Roster, Student};
use serde::Serialize;
use std::cmp::Ordering;
use std::collections::HashSet;

/// A student taken out of `from` and appended to `to` by a move.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct MovedStudent {
    pub student: Student,
    pub from: ClassKey,
    pub to: ClassKey,
}

impl Roster {
    /// Exchanges the students at `a` and `b` (same class allowed).
    /// Nothing changes unless both positions exist.
    pub fn swap(&mut self, a: Position, b: Position) -> CoreResult<()> {
        let sa = self.get(&a).cloned().ok_or_else(|| a.invalid())?;
        let sb = self.get(&b).cloned().ok_or_else(|| b.invalid())?;

        if a.class_key == b.class_key {
            let class = self.class_mut(&a.class_key).ok_or_else(|| a.invalid())?;
            class.swap(a.index, b.index);
            return Ok(());
        }

        *self.slot_mut(&a)? = sb;
        *self.slot_mut(&b)? = sa;
        Ok(())
    }

    fn slot_mut(&mut self, pos: &Position) -> CoreResult<&mut Student> {
        self.class_mut(&pos.class_key)
            .and_then(|c| c.get_mut(pos.index))
            .ok_or_else(|| pos.invalid())
    }

    /// Moves the selected students to the end of `target`, in selection order.
    ///
    /// All positions are validated before anything is removed; removal runs in
    /// descending index order per class so pending indices stay valid.
    pub fn move_students(
        &mut self,
        positions: &[Position],
        target: ClassKey,
    ) -> CoreResult<Vec<MovedStudent>> {
        if positions.is_empty() {
            return Err(CoreError::EmptySelection);
        }
        if !self.contains_class(&target) {
            return Err(CoreError::UnknownTargetClass(target));
        }

        let mut seen: HashSet<Position> = HashSet::new();
        let mut moved: Vec<MovedStudent> = Vec::with_capacity(positions.len());
        for pos in positions {
            let student = self.get(pos).ok_or_else(|| pos.invalid())?;
            if !seen.insert(*pos) {
                return Err(pos.invalid());
            }
            moved.push(MovedStudent {
                student: student.clone(),
                from: pos.class_key,
                to: target,
            });
        }

        let mut removal: Vec<Position> = positions.to_vec();
        removal.sort_by(|a, b| {
            a.class_key
                .cmp(&b.class_key)
                .then_with(|| b.index.cmp(&a.index))
        });
        for pos in &removal {
            if let Some(class) = self.class_mut(&pos.class_key) {
                class.remove(pos.index);
            }
        }

        for m in &moved {
            self.push(target, m.student.clone());
        }
        Ok(moved)
    }

    /// Sorts every class by name (Korean collation) and renumbers seats 1..N.
    pub fn sort_by_name(&mut self) {
        for (_, class) in self.classes_mut() {
            class.sort_by(|a, b| korean_cmp(&a.name, &b.name));
            for (i, s) in class.iter_mut().enumerate() {
                s.number = (i + 1).to_string();
            }
        }
    }

    /// Sets or clears (blank text) the note of one student.
    pub fn set_note(&mut self, pos: Position, text: &str) -> CoreResult<()> {
        let slot = self.slot_mut(&pos)?;
        slot.note = if text.trim().is_empty() {
            None
        } else {
            Some(text.to_string())
        };
        Ok(())
    }

    /// Position of every student with this exact name.
    pub fn find_by_name(&self, name: &str) -> Vec<Position> {
        let mut out = Vec::new();
        for (key, class) in self.classes() {
            for (i, s) in class.iter().enumerate() {
                if s.name == name {
                    out.push(Position::new(*key, i));
                }
            }
        }
        out
    }
}

fn collation_key(c: char) -> (u8, u32) {
    let cp = c as u32;
    if c.is_whitespace() || c.is_ascii_punctuation() {
        (0, cp)
    } else if c.is_ascii_digit() {
        (1, cp)
    } else if c.is_ascii_alphabetic() {
        (2, c.to_ascii_lowercase() as u32)
    } else if is_hangul(c) {
        // Syllable code points are laid out in 가나다 order already.
        (3, cp)
    } else {
        (4, cp)
    }
}

fn is_hangul(c: char) -> bool {
    matches!(c as u32, 0x1100..=0x11FF | 0x3131..=0x318E | 0xAC00..=0xD7A3)
}

/// Name ordering used for "sort by name".
pub fn korean_cmp(a: &str, b: &str) -> Ordering {
    a.chars()
        .map(collation_key)
        .cmp(b.chars().map(collation_key))
        .then_with(|| a.cmp(b))
}
