//! Class reassignment engine for NU:CLASS.
//!
//! Parses roster text extracted from school PDFs, applies swap/move edits
//! with history and undo, and evaluates separation constraints and class
//! statistics on demand. Everything here is synchronous and in-process; the
//! `nuclassd` binary exposes it to a UI shell over stdio.

pub mod backup;
pub mod constraints;
pub mod error;
pub mod export;
pub mod ledger;
pub mod model;
pub mod parser;
pub mod roster;
pub mod session;
pub mod stats;
pub mod store;

pub use constraints::{ConstraintBook, SeparationGroup, SeparationTeam, StudentRef};
pub use error::{CoreError, CoreResult};
pub use ledger::{Ledger, Marker, UndoStack};
pub use model::{ClassKey, Gender, Position, Roster, Student, StudentTag};
pub use parser::parse;
pub use roster::MovedStudent;
pub use session::Session;
