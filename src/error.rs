use crate::model::ClassKey;

/// Errors raised by roster, constraint and undo operations.
///
/// Every variant is reported to the immediate caller; the core never retries
/// or corrects a bad reference on its own.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum CoreError {
    /// A swap/move/note edit referenced a class or index that does not exist.
    #[error("no student at {class_key} index {index}")]
    InvalidPosition { class_key: String, index: usize },

    /// A move targeted a class absent from the roster.
    #[error("unknown target class: {0}")]
    UnknownTargetClass(ClassKey),

    /// A constraint reference matched several students and carried no
    /// (or insufficient) disambiguating attributes.
    #[error("ambiguous student reference: {0}")]
    AmbiguousStudentReference(String),

    #[error("student not found: {0}")]
    StudentNotFound(String),

    #[error("nothing to undo")]
    EmptyUndoStack,

    #[error("unknown constraint: {0}")]
    UnknownConstraint(String),

    #[error("invalid constraint: {0}")]
    InvalidConstraint(String),

    #[error("invalid class key: {0:?}")]
    InvalidClassKey(String),

    #[error("no students selected")]
    EmptySelection,
}

impl CoreError {
    /// Stable code used in IPC error envelopes.
    pub fn code(&self) -> &'static str {
        match self {
            CoreError::InvalidPosition { .. } => "invalid_position",
            CoreError::UnknownTargetClass(_) => "unknown_target_class",
            CoreError::AmbiguousStudentReference(_) => "ambiguous_student_reference",
            CoreError::StudentNotFound(_) => "student_not_found",
            CoreError::EmptyUndoStack => "empty_undo_stack",
            CoreError::UnknownConstraint(_) => "unknown_constraint",
            CoreError::InvalidConstraint(_) => "invalid_constraint",
            CoreError::InvalidClassKey(_) => "invalid_class_key",
            CoreError::EmptySelection => "empty_selection",
        }
    }
}

pub type CoreResult<T> = Result<T, CoreError>;
